//! Thread-safe memoizing cells with selectable resolution strategies.
//!
//! This crate provides two wrappers around a caller-supplied, zero-argument
//! value producer:
//!
//! - [`Memo<T, F>`]: memoizes an infallible `Fn() -> T`.
//! - [`TryMemo<T, E, F>`]: memoizes a fallible `Fn() -> Result<T, E>`,
//!   propagating errors verbatim and leaving the cell unresolved on failure.
//!
//! Both resolve the producer's value on first access and return the same
//! resolved value to every caller thereafter. How the first access behaves
//! under contention is chosen at construction through [`Strategy`]:
//!
//! - [`Strategy::DoubleChecked`] guarantees the producer runs **exactly
//!   once** for the lifetime of the cell. Threads that lose the resolution
//!   race park on a `parking_lot_core` futex until the winner publishes.
//! - [`Strategy::NonBlocking`] never blocks. Threads racing the first access
//!   may each run the producer; a compare-and-swap publish-if-absent decides
//!   which result survives, and losers discard their candidate and adopt the
//!   winner's.
//!
//! # Features
//!
//! - **Lock-free fast path**: Reading a resolved cell is a single atomic
//!   load under either strategy.
//! - **Per-instance storage**: Each cell owns its one resolved slot; nothing
//!   is process-global.
//! - **No failure caching**: A producer error (or panic) leaves the cell
//!   unresolved, so the next call simply retries.
//! - **`const` construction**: Cells can live in `static` position.
//!
//! # Examples
//!
//! ## Exactly-once resolution
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use memo_cell::{Memo, Strategy};
//!
//! let runs = AtomicUsize::new(0);
//! let memo = Memo::new(Strategy::DoubleChecked, || {
//!    runs.fetch_add(1, Ordering::Relaxed);
//!    117
//! });
//!
//! assert_eq!(*memo.get(), 117);
//! assert_eq!(*memo.get(), 117);
//! assert_eq!(*memo.get(), 117);
//! assert_eq!(runs.load(Ordering::Relaxed), 1); // Producer ran only once
//! ```
//!
//! ## Racy resolution
//!
//! ```rust
//! use memo_cell::Memo;
//!
//! // Under contention the producer may run more than once, but every caller
//! // sees the single published value.
//! let memo = Memo::non_blocking(|| "expensive".to_string());
//! assert_eq!(memo.get(), "expensive");
//! assert!(memo.is_resolved());
//! ```

/// Memoizing wrappers and the strategy selector.
mod memo;

/// Exactly-once storage for the double-checked strategy.
mod locked;

/// First-publish-wins storage for the non-blocking strategy.
mod racy;

/// Internal synchronization state management.
mod state;

pub use memo::{Memo, Strategy, TryMemo};

/// [`Memo`] over an `i32` producer.
///
/// Monomorphization already specializes [`Memo`] per value type; this alias
/// and [`MemoI64`] just keep the common primitive cases nameable.
pub type MemoI32<F = fn() -> i32> = Memo<i32, F>;

/// [`Memo`] over an `i64` producer.
pub type MemoI64<F = fn() -> i64> = Memo<i64, F>;
