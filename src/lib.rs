/*
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod contract;

/// The owning, move-only memory region.
pub mod buffer;
/// The read-write non-owning descriptor.
pub mod span;
/// The read-only non-owning descriptor.
pub mod view;

pub use crate::buffer::Buffer;
pub use crate::span::Span;
pub use crate::view::CastError;
pub use crate::view::View;

use core::ops::{Bound, Range, RangeBounds};

/// Resolves a range argument against a descriptor of `len` bytes.
///
/// Shared bounds contract for every sub-range derivation: the resolved
/// `start..end` must satisfy `start <= end <= len`.
pub(crate) fn resolve_range(range: impl RangeBounds<usize>, len: usize) -> Range<usize> {
    let start = match range.start_bound() {
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n + 1,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&n) => n + 1,
        Bound::Excluded(&n) => n,
        Bound::Unbounded => len,
    };
    contract::check!(start <= end, "invalid slice {}..{}", start, end);
    contract::check!(end <= len, "{} exceeds length {}", end, len);
    start..end
}
