/*
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Read-only, non-owning descriptor over a contiguous byte region.

use core::fmt::{self, Debug};
use core::marker::PhantomData;
use core::mem;
use core::ops::RangeBounds;
use core::slice;

use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::contract::check;
use crate::resolve_range;
use crate::Span;

/// Errors returned by the fallible typed accessors.
///
/// The panicking accessors treat these conditions as contract violations;
/// the `try_*` variants surface them as values instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastError {
    /// The descriptor's base address is null.
    Null,
    /// The requested elements do not fit within the descriptor's bounds.
    OutOfBounds,
    /// The start address is not aligned for the element type.
    Misaligned,
}

impl fmt::Display for CastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastError::Null => write!(f, "cannot cast through a null descriptor"),
            CastError::OutOfBounds => {
                write!(f, "requested elements exceed the descriptor's bounds")
            }
            CastError::Misaligned => {
                write!(f, "start address is not aligned for the element type")
            }
        }
    }
}

impl std::error::Error for CastError {}

/// Byte size of `count` elements of `T` placed at `offset`, or `None` on
/// arithmetic overflow.
pub(crate) fn array_bytes<T>(offset: usize, count: usize) -> Option<usize> {
    count
        .checked_mul(mem::size_of::<T>())
        .and_then(|bytes| bytes.checked_add(offset))
}

pub(crate) fn is_aligned_for<T>(ptr: *const u8) -> bool {
    ptr as usize % mem::align_of::<T>() == 0
}

/// A read-only view of a region of memory owned elsewhere.
///
/// A `View` is a plain `(pointer, length)` descriptor: copying one duplicates
/// the descriptor, never the bytes. It is empty when its pointer is null *or*
/// its length is zero; both states are legal and constructible.
///
/// The lifetime `'a` is the period for which the referenced memory is valid.
/// Views built from slices or from a [`Buffer`](crate::Buffer) borrow carry
/// it automatically; views built from raw parts put it on the caller.
#[derive(Clone, Copy)]
pub struct View<'a> {
    pub(crate) ptr: *const u8,
    pub(crate) len: usize,
    pub(crate) _marker: PhantomData<&'a [u8]>,
}

impl<'a> View<'a> {
    /// Creates an empty view with a null base address.
    pub const fn new() -> Self {
        Self {
            ptr: core::ptr::null(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Creates a view from a raw base address and byte length.
    ///
    /// The pair is stored verbatim; nothing is validated. A null pointer or a
    /// zero length produce a legal empty view.
    ///
    /// # Safety
    /// If `ptr` is non-null it must reference `len` initialized bytes that
    /// remain valid for reads for `'a`, and no exclusive reference to them
    /// may exist while the view or anything derived from it is in use.
    pub const unsafe fn from_raw_parts(ptr: *const u8, len: usize) -> Self {
        Self {
            ptr,
            len,
            _marker: PhantomData,
        }
    }

    /// Creates a view over the bytes of a slice.
    ///
    /// The length is the element count times the element size. Works for any
    /// contiguous container that dereferences to a slice.
    pub fn from_slice<T>(slice: &'a [T]) -> Self
    where
        T: IntoBytes + Immutable,
    {
        let bytes = IntoBytes::as_bytes(slice);
        Self {
            ptr: bytes.as_ptr(),
            len: bytes.len(),
            _marker: PhantomData,
        }
    }

    /// True if the base address is null or the length is zero.
    pub fn is_empty(&self) -> bool {
        self.ptr.is_null() || self.len == 0
    }

    /// Stored length in bytes.
    ///
    /// Reported even when the view is empty by way of a null base address.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Base address of the region; null for a default view.
    pub const fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Address `offset` bytes past the base.
    ///
    /// `offset` may equal [`len`](Self::len), yielding the one-past-end
    /// address; anything larger is a contract violation.
    pub fn ptr_at(&self, offset: usize) -> *const u8 {
        check!(
            offset <= self.len,
            "offset {} exceeds length {}",
            offset,
            self.len
        );
        self.ptr.wrapping_add(offset)
    }

    /// Typed pointer to the bytes at `offset`.
    ///
    /// Only `offset <= len` is checked; whether a whole `T` fits, and whether
    /// the address is aligned, is the caller's concern when dereferencing.
    pub fn typed_at<T>(&self, offset: usize) -> *const T {
        self.ptr_at(offset).cast()
    }

    /// Reinterprets the bytes at `offset` as a `T`.
    ///
    /// The runtime check is `offset <= len` only, deliberately narrower than
    /// the [`array_view`](Self::array_view) regime.
    ///
    /// # Safety
    /// The base address must be non-null, `offset + size_of::<T>()` must not
    /// exceed [`len`](Self::len), and `ptr_at(offset)` must be aligned for
    /// `T`.
    pub unsafe fn as_ref_at<T>(&self, offset: usize) -> &'a T
    where
        T: FromBytes + Immutable,
    {
        &*self.typed_at::<T>(offset)
    }

    /// Returns a view of a sub-range of this view.
    ///
    /// `slice(offset..)` is the tail from `offset`, `slice(a..b)` the
    /// absolute range `[a, b)`. The resolved bounds must satisfy
    /// `start <= end <= len`; out-of-range requests are contract violations,
    /// never clamped. Slicing at `len` yields an empty view whose address is
    /// the one-past-end address.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> View<'a> {
        let range = resolve_range(range, self.len);
        Self {
            // wrapping: a null descriptor may legally be sliced at offset 0.
            ptr: self.ptr.wrapping_add(range.start),
            len: range.end - range.start,
            _marker: PhantomData,
        }
    }

    /// Reinterprets `count` elements of `T` starting at `offset` as a slice.
    ///
    /// Contract: the base is non-null (when `count > 0`),
    /// `offset + count * size_of::<T>() <= len`, and the start address is
    /// aligned for `T`.
    pub fn array_view<T>(&self, offset: usize, count: usize) -> &'a [T]
    where
        T: FromBytes + Immutable,
    {
        let needed = array_bytes::<T>(offset, count);
        check!(
            needed.is_some_and(|needed| needed <= self.len),
            "{} {}-byte elements at offset {} exceed length {}",
            count,
            mem::size_of::<T>(),
            offset,
            self.len
        );
        if count == 0 {
            return &[];
        }
        check!(!self.ptr.is_null(), "array view over a null descriptor");
        let start = self.ptr.wrapping_add(offset);
        check!(
            is_aligned_for::<T>(start),
            "offset {} is not aligned to {} bytes",
            offset,
            mem::align_of::<T>()
        );
        unsafe { slice::from_raw_parts(start.cast(), count) }
    }

    /// Fallible counterpart of [`array_view`](Self::array_view).
    pub fn try_array_view<T>(&self, offset: usize, count: usize) -> Result<&'a [T], CastError>
    where
        T: FromBytes + Immutable,
    {
        match array_bytes::<T>(offset, count) {
            Some(needed) if needed <= self.len => {}
            _ => return Err(CastError::OutOfBounds),
        }
        if count == 0 {
            return Ok(&[]);
        }
        if self.ptr.is_null() {
            return Err(CastError::Null);
        }
        let start = self.ptr.wrapping_add(offset);
        if !is_aligned_for::<T>(start) {
            return Err(CastError::Misaligned);
        }
        Ok(unsafe { slice::from_raw_parts(start.cast(), count) })
    }

    /// The whole region as a byte slice; empty views yield `&[]`.
    pub fn as_bytes(&self) -> &'a [u8] {
        if self.is_empty() {
            return &[];
        }
        // Non-empty views uphold the construction contract: `len` initialized
        // bytes valid for `'a`.
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl Default for View<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> From<Span<'a>> for View<'a> {
    fn from(span: Span<'a>) -> Self {
        span.as_view()
    }
}

#[cfg(feature = "bytes")]
impl<'a> From<&'a bytes::Bytes> for View<'a> {
    fn from(bytes: &'a bytes::Bytes) -> Self {
        Self::from_slice(bytes.as_ref())
    }
}

// Equality is descriptor identity: same address and same length, never a
// content comparison.
impl PartialEq for View<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.len == other.len
    }
}

impl Eq for View<'_> {}

impl PartialEq<Span<'_>> for View<'_> {
    fn eq(&self, other: &Span<'_>) -> bool {
        self.ptr == other.as_ptr() && self.len == other.len()
    }
}

impl Debug for View<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
