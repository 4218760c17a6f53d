//! Exactly-once slot resolution behind a per-instance lock.
//!
//! [`LockedCell<T>`] is the storage behind [`Strategy::DoubleChecked`]: the
//! resolved value lives inline as a `MaybeUninit<T>` and the producer runs
//! while holding the [`SlotState`] lock, so it executes at most once for the
//! lifetime of the cell regardless of how many threads race the first
//! access. The classic double-checked shape: an unsynchronized check on the
//! way in, a second check under the lock.
//!
//! [`Strategy::DoubleChecked`]: crate::Strategy::DoubleChecked

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::Ordering;

use crate::state::SlotState;

pub(crate) struct LockedCell<T> {
   value: UnsafeCell<MaybeUninit<T>>,
   state: SlotState,
}

impl<T> LockedCell<T> {
   /// Creates a new, unresolved cell.
   #[inline]
   pub(crate) const fn new() -> Self {
      Self {
         value: UnsafeCell::new(MaybeUninit::uninit()),
         state: SlotState::new(),
      }
   }

   /// Checks if the cell holds a resolved value. Never blocks.
   #[inline]
   pub(crate) fn is_resolved(&self) -> bool {
      // Acquire pairs with the Release in SlotGuard::commit, so an observed
      // SET flag implies the slot write is visible too.
      self.state.is_set(Ordering::Acquire)
   }

   /// Returns the resolved value, or `None` without blocking.
   #[inline]
   pub(crate) fn get(&self) -> Option<&T> {
      if self.is_resolved() {
         // SAFETY: is_resolved() observed SET with Acquire ordering, so the
         // winner's write of the value happens-before this read.
         Some(unsafe { self.get_unchecked() })
      } else {
         None
      }
   }

   /// Returns a reference to the value without checking resolution.
   ///
   /// # Safety
   ///
   /// The cell must be resolved, and that resolution must have been
   /// acquired by this thread.
   #[inline]
   unsafe fn get_unchecked(&self) -> &T {
      debug_assert!(self.state.is_set(Ordering::Relaxed));
      (*self.value.get()).assume_init_ref()
   }

   /// Returns the value, running `f` to resolve it if needed.
   ///
   /// If several threads call this concurrently, exactly one `f()` execution
   /// happens; the rest park until the winner publishes.
   #[inline]
   pub(crate) fn get_or_init<F>(&self, f: F) -> &T
   where
      F: FnOnce() -> T,
   {
      if let Some(value) = self.get() {
         return value;
      }
      self.resolve(f);
      // SAFETY: resolve() guarantees the cell is resolved on return.
      unsafe { self.get_unchecked() }
   }

   /// Returns the value, running fallible `f` to resolve it if needed.
   ///
   /// On `Err` the cell stays unresolved and the error is handed to the
   /// caller; a later call will run its producer again.
   pub(crate) fn get_or_try_init<F, E>(&self, f: F) -> Result<&T, E>
   where
      F: FnOnce() -> Result<T, E>,
   {
      if let Some(value) = self.get() {
         return Ok(value);
      }
      self.try_resolve(f)?;
      debug_assert!(self.is_resolved());
      // SAFETY: try_resolve() succeeded, so the cell is resolved.
      Ok(unsafe { self.get_unchecked() })
   }

   /// Cold path for `get_or_init`: take the lock, re-check, run the producer.
   #[cold]
   fn resolve<F>(&self, f: F)
   where
      F: FnOnce() -> T,
   {
      let Some(guard) = self.state.lock() else {
         return; // Another thread resolved the slot while we contended
      };
      // SAFETY: We hold the lock, so we have exclusive access to the slot.
      unsafe { (*self.value.get()).write(f()) };
      guard.commit();
   }

   /// Cold path for `get_or_try_init`. If the producer fails (or panics),
   /// the guard drop resets the state so the slot can be retried.
   #[cold]
   fn try_resolve<F, E>(&self, f: F) -> Result<(), E>
   where
      F: FnOnce() -> Result<T, E>,
   {
      let Some(guard) = self.state.lock() else {
         return Ok(()); // Another thread resolved the slot while we contended
      };
      let value = f()?;
      // SAFETY: We hold the lock, so we have exclusive access to the slot.
      unsafe { (*self.value.get()).write(value) };
      guard.commit();
      Ok(())
   }
}

// SAFETY:
// `&LockedCell<T>` hands out `&T` across threads, requiring `T: Sync`.
// `T: Send` is also required because the value produced on one thread may be
// dropped by another.
unsafe impl<T: Sync + Send> Sync for LockedCell<T> {}
// SAFETY: `LockedCell<T>` owns a `T`, so it is `Send` iff `T` is.
unsafe impl<T: Send> Send for LockedCell<T> {}

impl<T> Drop for LockedCell<T> {
   #[inline]
   fn drop(&mut self) {
      if self.state.is_set(Ordering::Relaxed) {
         // SAFETY: The slot is resolved and we have exclusive access.
         unsafe { self.value.get_mut().assume_init_drop() };
      }
   }
}
