/*
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Read-write, non-owning descriptor over a contiguous byte region.

use core::fmt::{self, Debug};
use core::marker::PhantomData;
use core::mem;
use core::ops::RangeBounds;
use core::slice;

use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::contract::check;
use crate::resolve_range;
use crate::view::{array_bytes, is_aligned_for, CastError};
use crate::View;

/// A read-write view of a region of memory owned elsewhere.
///
/// Same descriptor shape and derivation contract as [`View`], with write
/// access to the referenced memory. A `Span` narrows into a `View` via
/// [`From`]; no conversion exists in the other direction, so a read-only
/// descriptor can never become writable.
///
/// Because a `Span` is `Copy`, several descriptors over the same bytes can
/// coexist. Every mutable projection is therefore `unsafe`: the caller
/// asserts that no other reference or descriptor accesses the bytes while
/// the projection lives. [`Buffer`](crate::Buffer) offers the safe,
/// borrow-checked mutable projections instead.
#[derive(Clone, Copy)]
pub struct Span<'a> {
    pub(crate) ptr: *mut u8,
    pub(crate) len: usize,
    pub(crate) _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> Span<'a> {
    /// Creates an empty span with a null base address.
    pub const fn new() -> Self {
        Self {
            ptr: core::ptr::null_mut(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Creates a span from a raw base address and byte length.
    ///
    /// The pair is stored verbatim; nothing is validated. A null pointer or a
    /// zero length produce a legal empty span.
    ///
    /// # Safety
    /// If `ptr` is non-null it must reference `len` initialized bytes valid
    /// for reads and writes for `'a`, not accessed through any other
    /// reference while the span or anything derived from it is in use.
    pub const unsafe fn from_raw_parts(ptr: *mut u8, len: usize) -> Self {
        Self {
            ptr,
            len,
            _marker: PhantomData,
        }
    }

    /// Creates a span over the bytes of a mutable slice.
    ///
    /// `T` must tolerate arbitrary byte writes (`FromBytes`), expose its own
    /// bytes (`IntoBytes`) and be free of interior mutability (`Immutable`),
    /// so that byte-level access cannot forge invalid element values.
    pub fn from_slice_mut<T>(slice: &'a mut [T]) -> Self
    where
        T: FromBytes + IntoBytes + Immutable,
    {
        Self {
            ptr: slice.as_mut_ptr().cast(),
            len: mem::size_of_val(slice),
            _marker: PhantomData,
        }
    }

    /// True if the base address is null or the length is zero.
    pub fn is_empty(&self) -> bool {
        self.ptr.is_null() || self.len == 0
    }

    /// Stored length in bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Base address of the region; null for a default span.
    pub const fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Mutable base address of the region; null for a default span.
    pub const fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Mutable address `offset` bytes past the base.
    ///
    /// `offset` may equal [`len`](Self::len), yielding the one-past-end
    /// address; anything larger is a contract violation.
    pub fn ptr_at(&self, offset: usize) -> *mut u8 {
        check!(
            offset <= self.len,
            "offset {} exceeds length {}",
            offset,
            self.len
        );
        self.ptr.wrapping_add(offset)
    }

    /// Typed mutable pointer to the bytes at `offset`.
    ///
    /// Only `offset <= len` is checked; whether a whole `T` fits, and whether
    /// the address is aligned, is the caller's concern when dereferencing.
    pub fn typed_at<T>(&self, offset: usize) -> *mut T {
        self.ptr_at(offset).cast()
    }

    /// Reinterprets the bytes at `offset` as a `T`.
    ///
    /// # Safety
    /// Same obligations as [`View::as_ref_at`]: non-null base,
    /// `offset + size_of::<T>() <= len`, aligned address, and no concurrent
    /// writes through another descriptor.
    pub unsafe fn as_ref_at<T>(&self, offset: usize) -> &'a T
    where
        T: FromBytes + Immutable,
    {
        &*self.typed_at::<T>(offset)
    }

    /// Reinterprets the bytes at `offset` as a mutable `T`.
    ///
    /// The runtime check is `offset <= len` only, deliberately narrower than
    /// the [`array_span`](Self::array_span) regime.
    ///
    /// # Safety
    /// Same obligations as [`Span::as_ref_at`], and additionally the
    /// returned reference must be the only access to those bytes while it
    /// lives.
    pub unsafe fn as_mut_at<T>(&self, offset: usize) -> &'a mut T
    where
        T: FromBytes + IntoBytes,
    {
        &mut *self.typed_at::<T>(offset)
    }

    /// Returns a span of a sub-range of this span.
    ///
    /// Same bounds contract as [`View::slice`]: the resolved `start..end`
    /// must satisfy `start <= end <= len`, violations panic.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Span<'a> {
        let range = resolve_range(range, self.len);
        Self {
            ptr: self.ptr.wrapping_add(range.start),
            len: range.end - range.start,
            _marker: PhantomData,
        }
    }

    /// Reinterprets `count` elements of `T` starting at `offset` as a
    /// read-only slice. Same contract as [`View::array_view`].
    pub fn array_view<T>(&self, offset: usize, count: usize) -> &'a [T]
    where
        T: FromBytes + Immutable,
    {
        self.as_view().array_view(offset, count)
    }

    /// Reinterprets `count` elements of `T` starting at `offset` as a
    /// mutable slice.
    ///
    /// Contract: the base is non-null (when `count > 0`),
    /// `offset + count * size_of::<T>() <= len`, and the start address is
    /// aligned for `T`.
    ///
    /// # Safety
    /// The returned slice must be the only access to those bytes while it
    /// lives; the span is `Copy`, so exclusivity is the caller's obligation.
    pub unsafe fn array_span<T>(&self, offset: usize, count: usize) -> &'a mut [T]
    where
        T: FromBytes + IntoBytes,
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
            return &mut [];
        }
        check!(!self.ptr.is_null(), "array span over a null descriptor");
        let start = self.ptr.wrapping_add(offset);
        check!(
            is_aligned_for::<T>(start),
            "offset {} is not aligned to {} bytes",
            offset,
            mem::align_of::<T>()
        );
        slice::from_raw_parts_mut(start.cast(), count)
    }

    /// Fallible counterpart of [`array_span`](Self::array_span).
    ///
    /// # Safety
    /// Same exclusivity obligation as [`array_span`](Self::array_span).
    pub unsafe fn try_array_span<T>(
        &self,
        offset: usize,
        count: usize,
    ) -> Result<&'a mut [T], CastError>
    where
        T: FromBytes + IntoBytes,
    {
        match array_bytes::<T>(offset, count) {
            Some(needed) if needed <= self.len => {}
            _ => return Err(CastError::OutOfBounds),
        }
        if count == 0 {
            return Ok(&mut []);
        }
        if self.ptr.is_null() {
            return Err(CastError::Null);
        }
        let start = self.ptr.wrapping_add(offset);
        if !is_aligned_for::<T>(start) {
            return Err(CastError::Misaligned);
        }
        Ok(slice::from_raw_parts_mut(start.cast(), count))
    }

    /// The whole region as a byte slice; empty spans yield `&[]`.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.as_view().as_bytes()
    }

    /// The whole region as a mutable byte slice; empty spans yield `&mut []`.
    ///
    /// # Safety
    /// The returned slice must be the only access to those bytes while it
    /// lives.
    pub unsafe fn as_bytes_mut(&self) -> &'a mut [u8] {
        if self.is_empty() {
            return &mut [];
        }
        slice::from_raw_parts_mut(self.ptr, self.len)
    }

    /// The read-only narrowing of this span.
    pub fn as_view(&self) -> View<'a> {
        View {
            ptr: self.ptr,
            len: self.len,
            _marker: PhantomData,
        }
    }
}

impl Default for Span<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "bytes")]
impl<'a> From<&'a mut bytes::BytesMut> for Span<'a> {
    fn from(bytes: &'a mut bytes::BytesMut) -> Self {
        Self::from_slice_mut(bytes.as_mut())
    }
}

// Equality is descriptor identity: same address and same length, never a
// content comparison.
impl PartialEq for Span<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.len == other.len
    }
}

impl Eq for Span<'_> {}

impl PartialEq<View<'_>> for Span<'_> {
    fn eq(&self, other: &View<'_>) -> bool {
        self.as_ptr() == other.as_ptr() && self.len == other.len()
    }
}

impl Debug for Span<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
