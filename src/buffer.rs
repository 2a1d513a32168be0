/*
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Owning, move-only memory region.

use core::alloc::Layout;
use core::marker::PhantomData;
use core::mem;
use core::ops::RangeBounds;
use core::ptr;
use core::slice;

use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::contract::check;
use crate::resolve_range;
use crate::view::CastError;
use crate::{Span, View};

/// An exclusively owned region of memory.
///
/// A `Buffer` is the crate's sole allocation point. It is move-only:
/// ordinary duplication does not exist, and [`Clone`] is the explicit deep
/// copy. [`View`]s and [`Span`]s over (portions of) the region are
/// synthesized fresh on every accessor call and borrow the buffer, so they
/// cannot outlive it or witness a `reset`.
///
/// The buffer is either *empty* (`null` base, zero length) or *owning*
/// (non-null base, nonzero length). `mem::take` and `mem::replace` give the
/// move-assignment transfers: the source is left empty, the destination's
/// previous allocation is freed.
pub struct Buffer {
    ptr: *mut u8,
    len: usize,
    // Alignment of the backing allocation; needed to rebuild the layout on
    // free. `ALIGN` except for typed adoption, which keeps the element
    // alignment of the adopted box.
    align: usize,
}

// The buffer is the unique owner of its allocation, like a Box<[u8]>.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    /// Alignment of allocations made by [`with_size`](Self::with_size) and
    /// expected by [`from_raw_parts`](Self::from_raw_parts).
    pub const ALIGN: usize = 16;

    /// Creates an empty buffer that owns nothing.
    pub const fn new() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
            align: Self::ALIGN,
        }
    }

    /// Allocates a buffer of `len` zero-initialized bytes, aligned to
    /// [`ALIGN`](Self::ALIGN).
    ///
    /// Contract: `len != 0` and `len` fits in a valid allocation layout.
    /// Allocation failure is delegated to
    /// [`std::alloc::handle_alloc_error`].
    pub fn with_size(len: usize) -> Self {
        check!(len != 0, "cannot allocate a zero-sized buffer");
        check!(
            Layout::from_size_align(len, Self::ALIGN).is_ok(),
            "allocation of {} bytes overflows the layout limit",
            len
        );
        let layout = Self::layout(len, Self::ALIGN);
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            std::alloc::handle_alloc_error(layout);
        }
        Self {
            ptr,
            len,
            align: Self::ALIGN,
        }
    }

    /// Takes ownership of an already-allocated region.
    ///
    /// Contract: `ptr` is non-null and `len != 0`. Ownership transfers
    /// unconditionally; the previous owner must not free the region.
    ///
    /// # Safety
    /// `ptr` must reference `len` initialized bytes, exclusively owned by
    /// the caller, allocated by the global allocator with
    /// `Layout::from_size_align(len, Buffer::ALIGN)` — for example a pair
    /// previously returned by [`release`](Self::release) on a buffer that
    /// was created with [`with_size`](Self::with_size).
    pub unsafe fn from_raw_parts(ptr: *mut u8, len: usize) -> Self {
        check!(!ptr.is_null(), "cannot adopt a null allocation");
        check!(len != 0, "cannot adopt a zero-sized allocation");
        Self {
            ptr,
            len,
            align: Self::ALIGN,
        }
    }

    /// Takes ownership of a typed owned array.
    ///
    /// The length is the element count times the element size; the
    /// allocation is adopted in place, no bytes are copied. Contract: the
    /// total size is nonzero.
    pub fn from_boxed_slice<T>(elements: Box<[T]>) -> Self
    where
        T: IntoBytes + Immutable,
    {
        let len = mem::size_of_val::<[T]>(&elements);
        check!(len != 0, "cannot adopt a zero-sized array");
        Self {
            ptr: Box::into_raw(elements).cast(),
            len,
            align: mem::align_of::<T>(),
        }
    }

    /// True if the buffer owns nothing.
    pub fn is_empty(&self) -> bool {
        self.ptr.is_null() || self.len == 0
    }

    /// Owned length in bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Base address of the owned region; null when empty.
    pub const fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Mutable base address of the owned region; null when empty.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr
    }

    /// Frees the owned allocation and leaves the buffer empty.
    ///
    /// No-op on an already-empty buffer. Runs on drop.
    pub fn reset(&mut self) {
        if !self.ptr.is_null() {
            unsafe { std::alloc::dealloc(self.ptr, Self::layout(self.len, self.align)) };
        }
        self.ptr = ptr::null_mut();
        self.len = 0;
        self.align = Self::ALIGN;
    }

    /// Hands the owned `(pointer, length)` pair to the caller and leaves the
    /// buffer empty without freeing anything.
    ///
    /// The caller now owns the allocation and must deallocate it with the
    /// layout the buffer was constructed with: for
    /// [`with_size`](Self::with_size) and
    /// [`from_raw_parts`](Self::from_raw_parts) that is
    /// `Layout::from_size_align(len, Buffer::ALIGN)`, for
    /// [`from_boxed_slice`](Self::from_boxed_slice) the adopted box's array
    /// layout. Re-adoption via `from_raw_parts` is the usual way back.
    #[must_use = "the returned allocation must be freed by the caller"]
    pub fn release(&mut self) -> (*mut u8, usize) {
        let parts = (self.ptr, self.len);
        self.ptr = ptr::null_mut();
        self.len = 0;
        self.align = Self::ALIGN;
        parts
    }

    /// Zero-fills the owned region in place; no-op when empty.
    pub fn clear(&mut self) {
        if !self.is_empty() {
            unsafe { ptr::write_bytes(self.ptr, 0, self.len) };
        }
    }

    /// Address `offset` bytes past the base.
    ///
    /// Contract: the buffer is non-empty (a null base is rejected here,
    /// unlike on [`View`]/[`Span`]) and `offset <= len`; `offset == len` is
    /// the one-past-end address.
    pub fn ptr_at(&self, offset: usize) -> *const u8 {
        check!(!self.ptr.is_null(), "buffer owns no memory");
        check!(
            offset <= self.len,
            "offset {} exceeds length {}",
            offset,
            self.len
        );
        self.ptr.wrapping_add(offset)
    }

    /// Mutable address `offset` bytes past the base; same contract as
    /// [`ptr_at`](Self::ptr_at).
    pub fn ptr_at_mut(&mut self, offset: usize) -> *mut u8 {
        self.ptr_at(offset) as *mut u8
    }

    /// Typed pointer to the bytes at `offset`; same contract as
    /// [`ptr_at`](Self::ptr_at), nothing about `T` is checked.
    pub fn typed_at<T>(&self, offset: usize) -> *const T {
        self.ptr_at(offset).cast()
    }

    /// Typed mutable pointer to the bytes at `offset`; same contract as
    /// [`ptr_at`](Self::ptr_at), nothing about `T` is checked.
    pub fn typed_at_mut<T>(&mut self, offset: usize) -> *mut T {
        self.ptr_at_mut(offset).cast()
    }

    /// Reinterprets the bytes at `offset` as a `T`.
    ///
    /// # Safety
    /// `offset + size_of::<T>()` must not exceed [`len`](Self::len) and the
    /// address must be aligned for `T`; only the [`ptr_at`](Self::ptr_at)
    /// contract is checked.
    pub unsafe fn as_ref_at<T>(&self, offset: usize) -> &T
    where
        T: FromBytes + Immutable,
    {
        &*self.typed_at::<T>(offset)
    }

    /// Reinterprets the bytes at `offset` as a mutable `T`.
    ///
    /// # Safety
    /// Same obligations as [`as_ref_at`](Self::as_ref_at).
    pub unsafe fn as_mut_at<T>(&mut self, offset: usize) -> &mut T
    where
        T: FromBytes + IntoBytes,
    {
        &mut *self.typed_at_mut::<T>(offset)
    }

    /// Synthesizes a read-only view over a sub-range of the buffer.
    ///
    /// `view(..)` covers the whole region. Contract: the buffer is non-empty
    /// and the resolved bounds satisfy `start <= end <= len`. The view
    /// borrows the buffer, so it cannot witness a move, `reset` or
    /// `release`.
    pub fn view(&self, range: impl RangeBounds<usize>) -> View<'_> {
        check!(!self.ptr.is_null(), "buffer owns no memory");
        let range = resolve_range(range, self.len);
        View {
            ptr: self.ptr.wrapping_add(range.start),
            len: range.end - range.start,
            _marker: PhantomData,
        }
    }

    /// Synthesizes a read-write span over a sub-range of the buffer.
    ///
    /// Same contract as [`view`](Self::view); takes `&mut self` so the
    /// borrow checker enforces exclusive access for the span's lifetime.
    pub fn span(&mut self, range: impl RangeBounds<usize>) -> Span<'_> {
        check!(!self.ptr.is_null(), "buffer owns no memory");
        let range = resolve_range(range, self.len);
        Span {
            ptr: self.ptr.wrapping_add(range.start),
            len: range.end - range.start,
            _marker: PhantomData,
        }
    }

    /// Reinterprets `count` elements of `T` at `offset` as a slice; same
    /// contract as [`View::array_view`] plus the non-empty requirement.
    pub fn array_view<T>(&self, offset: usize, count: usize) -> &[T]
    where
        T: FromBytes + Immutable,
    {
        self.view(..).array_view(offset, count)
    }

    /// Reinterprets `count` elements of `T` at `offset` as a mutable slice.
    ///
    /// Safe on `Buffer`: the exclusive borrow rules out aliasing.
    pub fn array_span<T>(&mut self, offset: usize, count: usize) -> &mut [T]
    where
        T: FromBytes + IntoBytes,
    {
        let span = self.span(..);
        // Exclusive for the returned lifetime via &mut self.
        unsafe { span.array_span(offset, count) }
    }

    /// Fallible counterpart of [`array_view`](Self::array_view); an empty
    /// buffer fails with [`CastError::OutOfBounds`] for any nonzero request.
    pub fn try_array_view<T>(&self, offset: usize, count: usize) -> Result<&[T], CastError>
    where
        T: FromBytes + Immutable,
    {
        View {
            ptr: self.ptr,
            len: self.len,
            _marker: PhantomData,
        }
        .try_array_view(offset, count)
    }

    /// Fallible counterpart of [`array_span`](Self::array_span).
    pub fn try_array_span<T>(&mut self, offset: usize, count: usize) -> Result<&mut [T], CastError>
    where
        T: FromBytes + IntoBytes,
    {
        let span = Span {
            ptr: self.ptr,
            len: self.len,
            _marker: PhantomData,
        };
        // Exclusive for the returned lifetime via &mut self.
        unsafe { span.try_array_span(offset, count) }
    }

    /// The owned region as a byte slice; empty buffers yield `&[]`.
    pub fn as_slice(&self) -> &[u8] {
        if self.is_empty() {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    /// The owned region as a mutable byte slice; empty buffers yield
    /// `&mut []`.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.is_empty() {
            return &mut [];
        }
        unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    fn layout(len: usize, align: usize) -> Layout {
        // Size and alignment were validated when the allocation was made:
        // `with_size` checks the pair above, `from_boxed_slice` adopts a
        // layout the box was allocated with, and `from_raw_parts` puts the
        // validity in its safety contract.
        unsafe { Layout::from_size_align_unchecked(len, align) }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.reset();
    }
}

// The explicit deep copy: a fresh allocation with the same length and byte
// content. Cloning an empty buffer yields an empty buffer.
impl Clone for Buffer {
    fn clone(&self) -> Self {
        if self.is_empty() {
            return Self::new();
        }
        let layout = Self::layout(self.len, Self::ALIGN);
        let ptr = unsafe { std::alloc::alloc(layout) };
        if ptr.is_null() {
            std::alloc::handle_alloc_error(layout);
        }
        unsafe { ptr::copy_nonoverlapping(self.ptr, ptr, self.len) };
        Self {
            ptr,
            len: self.len,
            align: Self::ALIGN,
        }
    }
}

impl core::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Buffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: &[u32]) -> Buffer {
        let mut buf = Buffer::with_size(values.len() * 4);
        buf.array_span::<u32>(0, values.len()).copy_from_slice(values);
        buf
    }

    #[test]
    fn default_buffer_is_empty() {
        let buf = Buffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
        assert!(buf.as_ptr().is_null());
    }

    #[test]
    fn with_size_allocates_zeroed_aligned_memory() {
        let buf = Buffer::with_size(12);
        assert!(!buf.is_empty());
        assert_eq!(buf.len(), 12);
        assert!(!buf.as_ptr().is_null());
        assert_eq!(buf.as_ptr() as usize % Buffer::ALIGN, 0);
        assert_eq!(buf.as_slice(), &[0; 12]);
    }

    #[test]
    #[should_panic(expected = "zero-sized buffer")]
    fn zero_size_allocation_violates_contract() {
        let _ = Buffer::with_size(0);
    }

    #[test]
    #[should_panic(expected = "overflows the layout limit")]
    fn oversized_allocation_violates_contract() {
        let _ = Buffer::with_size(usize::MAX);
    }

    #[test]
    #[should_panic(expected = "null allocation")]
    fn adopting_null_violates_contract() {
        let _ = unsafe { Buffer::from_raw_parts(ptr::null_mut(), 8) };
    }

    #[test]
    #[should_panic(expected = "zero-sized allocation")]
    fn adopting_zero_length_violates_contract() {
        let mut byte = 0u8;
        let _ = unsafe { Buffer::from_raw_parts(&mut byte as *mut u8, 0) };
    }

    #[test]
    #[should_panic(expected = "zero-sized array")]
    fn adopting_empty_array_violates_contract() {
        let _ = Buffer::from_boxed_slice(Vec::<u32>::new().into_boxed_slice());
    }

    #[test]
    fn adopts_typed_byte_array() {
        let boxed: Box<[u8]> = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10].into_boxed_slice();
        let data = boxed.as_ptr();
        let buf = Buffer::from_boxed_slice(boxed);
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.as_ptr(), data);
    }

    #[test]
    fn adopts_typed_u64_array() {
        let boxed: Box<[u64]> = vec![0; 8].into_boxed_slice();
        let data = boxed.as_ptr() as *const u8;
        let buf = Buffer::from_boxed_slice(boxed);
        assert_eq!(buf.len(), 8 * 8);
        assert_eq!(buf.as_ptr(), data);
    }

    #[test]
    fn adopts_released_allocation() {
        let mut source = filled(&[1, 2, 3, 4, 5]);
        let expected_ptr = source.as_ptr();
        let (ptr, len) = source.release();
        let buf = unsafe { Buffer::from_raw_parts(ptr, len) };
        assert_eq!(buf.as_ptr(), expected_ptr);
        assert_eq!(buf.len(), 20);
        assert_eq!(buf.array_view::<u32>(0, 5), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn release_empties_without_freeing() {
        let mut buf = Buffer::with_size(12);
        let expected_ptr = buf.as_ptr();
        let (ptr, len) = buf.release();

        assert!(buf.is_empty());
        assert!(buf.as_ptr().is_null());
        assert_eq!(buf.len(), 0);
        assert_eq!(ptr as *const u8, expected_ptr);
        assert_eq!(len, 12);

        // Take the allocation back so it is freed.
        let _ = unsafe { Buffer::from_raw_parts(ptr, len) };
    }

    #[test]
    fn reset_empties_the_buffer() {
        let mut buf = Buffer::with_size(12);
        buf.reset();
        assert!(buf.is_empty());
        // Resetting an empty buffer is a no-op.
        buf.reset();
        assert!(buf.is_empty());
    }

    #[test]
    fn take_transfers_ownership_without_copying() {
        let mut a = filled(&[1, 2, 3, 4, 5]);
        let ptr = a.as_ptr();

        let b = core::mem::take(&mut a);
        assert!(a.is_empty());
        assert!(a.as_ptr().is_null());
        assert_eq!(b.as_ptr(), ptr);
        assert_eq!(b.len(), 20);
    }

    #[test]
    fn swap_exchanges_descriptors() {
        let mut a = Buffer::with_size(4);
        let ptr_a = a.as_ptr();
        let mut b = Buffer::with_size(7);
        let ptr_b = b.as_ptr();

        core::mem::swap(&mut a, &mut b);

        assert_eq!(a.as_ptr(), ptr_b);
        assert_eq!(a.len(), 7);
        assert_eq!(b.as_ptr(), ptr_a);
        assert_eq!(b.len(), 4);
    }

    #[test]
    fn clone_is_an_independent_deep_copy() {
        let buf = filled(&[1, 2, 3, 4, 5]);
        let copy = buf.clone();
        assert_eq!(copy.len(), buf.len());
        assert_eq!(copy.as_slice(), buf.as_slice());
        assert_ne!(copy.as_ptr(), buf.as_ptr());

        let empty = Buffer::new();
        assert!(empty.clone().is_empty());
    }

    #[test]
    fn clear_zero_fills_in_place() {
        let mut buf = filled(&[1, 2, 3, 4, 5]);
        let ptr = buf.as_ptr();
        buf.clear();
        assert_eq!(buf.as_ptr(), ptr);
        assert_eq!(buf.len(), 20);
        assert_eq!(buf.as_slice(), &[0; 20]);

        // No-op on an empty buffer.
        Buffer::new().clear();
    }

    #[test]
    fn view_covers_whole_buffer() {
        let buf = filled(&[1, 2, 3, 4, 5]);
        let view = buf.view(..);
        assert_eq!(view.as_ptr(), buf.as_ptr());
        assert_eq!(view.len(), buf.len());
    }

    #[test]
    fn view_at_end_is_empty() {
        let buf = filled(&[1, 2, 3, 4, 5]);
        let view = buf.view(20..);
        assert!(view.is_empty());
        assert_eq!(view.len(), 0);
        assert_eq!(view.as_ptr(), buf.ptr_at(20));
    }

    #[test]
    fn views_of_sub_ranges() {
        let buf = filled(&[1, 2, 3, 4, 5]);

        let tail = buf.view(4..);
        assert_eq!(tail.len(), 16);
        assert_eq!(tail.as_ptr(), buf.ptr_at(4));

        let front = buf.view(0..8);
        assert_eq!(front.len(), 8);
        assert_eq!(front.as_ptr(), buf.as_ptr());

        let middle = buf.view(8..16);
        assert_eq!(middle.len(), 8);
        assert_eq!(middle.as_ptr(), buf.ptr_at(8));

        let end = buf.view(12..20);
        assert_eq!(end.len(), 8);
        assert_eq!(end.as_ptr(), buf.ptr_at(12));
    }

    #[test]
    fn spans_of_sub_ranges() {
        let mut buf = filled(&[1, 2, 3, 4, 5]);
        let base = buf.as_ptr();

        let span = buf.span(..);
        assert_eq!(span.as_ptr(), base);
        assert_eq!(span.len(), 20);

        let tail = buf.span(4..);
        assert_eq!(tail.len(), 16);

        let end = buf.span(20..);
        assert!(end.is_empty());
    }

    #[test]
    fn span_writes_are_visible_through_views() {
        let mut buf = Buffer::with_size(8);
        {
            let span = buf.span(4..);
            unsafe { *span.as_mut_at::<u32>(0) = 0xdead_beef };
        }
        assert_eq!(unsafe { *buf.view(..).as_ref_at::<u32>(4) }, 0xdead_beef);
    }

    #[test]
    #[should_panic(expected = "owns no memory")]
    fn view_of_empty_buffer_violates_contract() {
        let buf = Buffer::new();
        let _ = buf.view(..);
    }

    #[test]
    #[should_panic(expected = "exceeds length")]
    fn view_past_end_violates_contract() {
        let buf = Buffer::with_size(8);
        let _ = buf.view(0..9);
    }

    #[test]
    fn typed_access_matches_layout() {
        let mut buf = filled(&[1, 2, 3, 4, 5]);
        unsafe {
            assert_eq!(*buf.as_ref_at::<u32>(0), 1);
            assert_eq!(*buf.as_ref_at::<u32>(4), 2);
            assert_eq!(*buf.as_ref_at::<u32>(16), 5);
            *buf.as_mut_at::<u32>(8) = 33;
        }
        assert_eq!(buf.array_view::<u32>(0, 5), &[1, 2, 33, 4, 5]);
        assert_eq!(buf.typed_at::<u32>(4) as *const u8, buf.ptr_at(4));
    }

    #[test]
    #[cfg(target_endian = "little")]
    fn typed_read_of_larger_type() {
        let buf = filled(&[1, 2, 3, 4, 5]);
        assert_eq!(unsafe { *buf.as_ref_at::<u64>(0) }, 0x0000_0002_0000_0001);
    }

    #[test]
    fn fallible_casts_report_failures_as_values() {
        let mut buf = filled(&[1, 2, 3, 4, 5]);
        assert_eq!(buf.try_array_view::<u32>(0, 5).unwrap(), &[1, 2, 3, 4, 5]);
        assert_eq!(buf.try_array_view::<u32>(4, 5), Err(CastError::OutOfBounds));
        assert_eq!(buf.try_array_view::<u32>(2, 1), Err(CastError::Misaligned));
        buf.try_array_span::<u32>(0, 2).unwrap().fill(0);
        assert_eq!(buf.array_view::<u32>(0, 5), &[0, 0, 3, 4, 5]);

        let empty = Buffer::new();
        assert_eq!(empty.try_array_view::<u32>(0, 1), Err(CastError::OutOfBounds));
    }
}
