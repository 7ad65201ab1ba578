//! Stack safety for the recursive parser and evaluator.
//!
//! Nested source maps onto nested Rust calls, so deep programs grow the stack on demand instead
//! of overflowing the thread they happen to run on.

const RED_ZONE: usize = 100 * 1024; // 100KB
const STACK_PER_RECURSION: usize = 1024 * 1024; // 1MB

/// Runs `f`, first moving onto a freshly allocated stack segment if less than the red zone is
/// left on the current one.
#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
