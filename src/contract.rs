/*
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Contract checking for descriptor preconditions.
//!
//! Every bounds and state precondition in the crate runs through [`check!`],
//! so there is a single point where the failure policy lives. A violated
//! check is a programming error, not a recoverable condition: it panics at
//! the offending call and there is no sentinel or error value to catch.

macro_rules! check {
    ($cond:expr, $($arg:tt)+) => {
        assert!($cond, $($arg)+)
    };
}

pub(crate) use check;
