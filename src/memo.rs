//! Memoizing wrappers pairing a producer with a resolution slot.
//!
//! This module provides the public surface of the crate: [`Memo<T, F>`] for
//! infallible producers, [`TryMemo<T, E, F>`] for producers that can fail,
//! and the [`Strategy`] selector that fixes the resolution discipline at
//! construction time.
//!
//! Both wrappers hold the producer immutably for the lifetime of the cell
//! and funnel every access through a single per-instance slot; which slot
//! implementation backs them is the only thing the strategy decides.

use core::fmt;
use core::marker::PhantomData;

use crate::locked::LockedCell;
use crate::racy::RacyCell;

/// Concurrency discipline used to resolve the first access to a memo.
///
/// The set is closed by design; there are exactly two disciplines and the
/// choice is fixed at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
   /// Lock-free resolution. Threads racing the first access may each invoke
   /// the producer; an atomic publish-if-absent decides which result the
   /// cell keeps, and losers adopt the winner's value. No thread ever
   /// blocks on another.
   NonBlocking,
   /// Double-checked locking. The producer is invoked exactly once for the
   /// lifetime of the cell; threads contending for the first access park
   /// until the winner publishes (with no timeout, so a hanging producer
   /// stalls them indefinitely).
   #[default]
   DoubleChecked,
}

/// Storage for the resolved value, selected by [`Strategy`] at construction.
enum Slot<T> {
   Racy(RacyCell<T>),
   Locked(LockedCell<T>),
}

impl<T> Slot<T> {
   const fn for_strategy(strategy: Strategy) -> Self {
      match strategy {
         Strategy::NonBlocking => Self::Racy(RacyCell::new()),
         Strategy::DoubleChecked => Self::Locked(LockedCell::new()),
      }
   }

   const fn strategy(&self) -> Strategy {
      match self {
         Self::Racy(_) => Strategy::NonBlocking,
         Self::Locked(_) => Strategy::DoubleChecked,
      }
   }

   #[inline]
   fn is_resolved(&self) -> bool {
      match self {
         Self::Racy(cell) => cell.is_resolved(),
         Self::Locked(cell) => cell.is_resolved(),
      }
   }

   #[inline]
   fn get(&self) -> Option<&T> {
      match self {
         Self::Racy(cell) => cell.get(),
         Self::Locked(cell) => cell.get(),
      }
   }

   #[inline]
   fn get_or_init<F>(&self, f: F) -> &T
   where
      F: FnOnce() -> T,
   {
      match self {
         Self::Racy(cell) => cell.get_or_init(f),
         Self::Locked(cell) => cell.get_or_init(f),
      }
   }

   #[inline]
   fn get_or_try_init<F, E>(&self, f: F) -> Result<&T, E>
   where
      F: FnOnce() -> Result<T, E>,
   {
      match self {
         Self::Racy(cell) => cell.get_or_try_init(f),
         Self::Locked(cell) => cell.get_or_try_init(f),
      }
   }
}

/// A memoizing cell over an infallible producer.
///
/// Wraps a `Fn() -> T` and a [`Strategy`]; the first call to [`get`] resolves
/// the value per the strategy, and every call thereafter returns a reference
/// to the same value without invoking the producer again. Resolution is a
/// one-way transition: once any call has returned, the value never changes
/// for the lifetime of the cell.
///
/// Construction is `const`, so a `Memo` can live in a `static`:
///
/// ```rust
/// use memo_cell::{Memo, Strategy};
///
/// static ANSWER: Memo<i32> = Memo::new(Strategy::DoubleChecked, || 117);
///
/// assert_eq!(*ANSWER.get(), 117);
/// ```
///
/// Calling [`get`] from within the producer of a [`Strategy::DoubleChecked`]
/// memo deadlocks, as with `std::sync::OnceLock`.
///
/// [`get`]: Memo::get
pub struct Memo<T, F = fn() -> T> {
   slot: Slot<T>,
   producer: F,
}

impl<T, F: Fn() -> T> Memo<T, F> {
   /// Creates a new, unresolved memo over `producer`.
   #[inline]
   #[must_use]
   pub const fn new(strategy: Strategy, producer: F) -> Self {
      Self {
         slot: Slot::for_strategy(strategy),
         producer,
      }
   }

   /// Shorthand for [`Memo::new`] with [`Strategy::NonBlocking`].
   #[inline]
   #[must_use]
   pub const fn non_blocking(producer: F) -> Self {
      Self::new(Strategy::NonBlocking, producer)
   }

   /// Shorthand for [`Memo::new`] with [`Strategy::DoubleChecked`].
   #[inline]
   #[must_use]
   pub const fn double_checked(producer: F) -> Self {
      Self::new(Strategy::DoubleChecked, producer)
   }

   /// Reports the strategy this memo was constructed with.
   #[inline]
   pub const fn strategy(&self) -> Strategy {
      self.slot.strategy()
   }

   /// Checks if the memo has been resolved. Never blocks, never resolves.
   #[inline]
   pub fn is_resolved(&self) -> bool {
      self.slot.is_resolved()
   }

   /// Returns the resolved value without forcing resolution.
   ///
   /// Never blocks and never invokes the producer; returns `None` while the
   /// memo is unresolved.
   #[inline]
   pub fn peek(&self) -> Option<&T> {
      self.slot.get()
   }

   /// Returns the memoized value, invoking the producer if needed.
   ///
   /// Under [`Strategy::DoubleChecked`] concurrent first accesses run the
   /// producer exactly once and the rest park until it publishes. Under
   /// [`Strategy::NonBlocking`] each concurrent first access may run the
   /// producer, but all of them return the single published value.
   #[inline]
   pub fn get(&self) -> &T {
      self.slot.get_or_init(&self.producer)
   }
}

impl<T: fmt::Debug, F> fmt::Debug for Memo<T, F> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut d = f.debug_tuple("Memo");
      match self.slot.get() {
         Some(v) => d.field(v),
         None => d.field(&format_args!("<unresolved>")),
      };
      d.finish()
   }
}

impl<T: fmt::Display, F> fmt::Display for Memo<T, F> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self.slot.get() {
         Some(v) => fmt::Display::fmt(v, f),
         None => f.write_str("<unresolved>"),
      }
   }
}

/// A memoizing cell over a fallible producer.
///
/// Like [`Memo`], but the producer returns `Result<T, E>` and [`get`]
/// surfaces its error verbatim. Failures are not cached: an `Err` leaves the
/// cell unresolved, and the next call runs the producer again. Under
/// [`Strategy::DoubleChecked`] a failing producer releases the lock and
/// wakes any parked threads so one of them retries.
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use memo_cell::{Strategy, TryMemo};
///
/// let attempts = AtomicUsize::new(0);
/// let memo = TryMemo::new(Strategy::DoubleChecked, || {
///    if attempts.fetch_add(1, Ordering::Relaxed) == 0 {
///       Err("transient")
///    } else {
///       Ok(7)
///    }
/// });
///
/// assert_eq!(memo.get(), Err("transient"));
/// assert!(!memo.is_resolved());
/// assert_eq!(memo.get(), Ok(&7)); // retried and resolved
/// ```
///
/// [`get`]: TryMemo::get
pub struct TryMemo<T, E, F = fn() -> Result<T, E>> {
   slot: Slot<T>,
   producer: F,
   marker: PhantomData<fn() -> E>,
}

impl<T, E, F: Fn() -> Result<T, E>> TryMemo<T, E, F> {
   /// Creates a new, unresolved memo over fallible `producer`.
   #[inline]
   #[must_use]
   pub const fn new(strategy: Strategy, producer: F) -> Self {
      Self {
         slot: Slot::for_strategy(strategy),
         producer,
         marker: PhantomData,
      }
   }

   /// Reports the strategy this memo was constructed with.
   #[inline]
   pub const fn strategy(&self) -> Strategy {
      self.slot.strategy()
   }

   /// Checks if the memo has been resolved. Never blocks, never resolves.
   #[inline]
   pub fn is_resolved(&self) -> bool {
      self.slot.is_resolved()
   }

   /// Returns the resolved value without forcing resolution.
   #[inline]
   pub fn peek(&self) -> Option<&T> {
      self.slot.get()
   }

   /// Returns the memoized value, invoking the producer if needed.
   ///
   /// On `Err` the cell stays unresolved and the error is returned to the
   /// caller that triggered this invocation; later calls retry.
   #[inline]
   pub fn get(&self) -> Result<&T, E> {
      self.slot.get_or_try_init(&self.producer)
   }
}

impl<T: fmt::Debug, E, F> fmt::Debug for TryMemo<T, E, F> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut d = f.debug_tuple("TryMemo");
      match self.slot.get() {
         Some(v) => d.field(v),
         None => d.field(&format_args!("<unresolved>")),
      };
      d.finish()
   }
}

impl<T: fmt::Display, E, F> fmt::Display for TryMemo<T, E, F> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self.slot.get() {
         Some(v) => fmt::Display::fmt(v, f),
         None => f.write_str("<unresolved>"),
      }
   }
}
