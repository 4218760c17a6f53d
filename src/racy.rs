//! Non-blocking, first-publish-wins slot resolution.
//!
//! [`RacyCell<T>`] is the storage behind [`Strategy::NonBlocking`]: the
//! resolved value is heap-allocated and published by a single
//! compare-and-swap of the null pointer. Threads racing the first access may
//! each run the producer, but exactly one result is kept; losers free their
//! candidate box and adopt the winner's value. No thread ever parks, no lock
//! is ever taken, so a stalled producer on one thread never holds up reads
//! or competing resolutions on another.
//!
//! [`Strategy::NonBlocking`]: crate::Strategy::NonBlocking

use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

pub(crate) struct RacyCell<T> {
   slot: AtomicPtr<T>,
   /// Logically owns a `Box<T>` once a value is published.
   ghost: PhantomData<Option<Box<T>>>,
}

impl<T> RacyCell<T> {
   /// Creates a new, unresolved cell.
   #[inline]
   pub(crate) const fn new() -> Self {
      Self {
         slot: AtomicPtr::new(ptr::null_mut()),
         ghost: PhantomData,
      }
   }

   /// Checks if the cell holds a published value. Never blocks.
   #[inline]
   pub(crate) fn is_resolved(&self) -> bool {
      !self.slot.load(Ordering::Acquire).is_null()
   }

   /// Returns the published value, or `None` without blocking.
   #[inline]
   pub(crate) fn get(&self) -> Option<&T> {
      let ptr = self.slot.load(Ordering::Acquire);
      // SAFETY: A non-null pointer was published with Release ordering and
      // is neither replaced nor freed for as long as `&self` lives.
      unsafe { ptr.as_ref() }
   }

   /// Returns the value, running `f` to resolve it if needed.
   ///
   /// `f` runs outside any critical section, so concurrent callers may each
   /// invoke their producer; the publish below decides whose result the cell
   /// keeps.
   #[inline]
   pub(crate) fn get_or_init<F>(&self, f: F) -> &T
   where
      F: FnOnce() -> T,
   {
      if let Some(value) = self.get() {
         return value;
      }
      self.publish(Box::new(f()))
   }

   /// Returns the value, running fallible `f` to resolve it if needed.
   ///
   /// On `Err` nothing is published and the error is handed to the caller;
   /// a later call will run its producer again.
   pub(crate) fn get_or_try_init<F, E>(&self, f: F) -> Result<&T, E>
   where
      F: FnOnce() -> Result<T, E>,
   {
      if let Some(value) = self.get() {
         return Ok(value);
      }
      Ok(self.publish(Box::new(f()?)))
   }

   /// Publish-if-absent: installs `candidate` if the slot is still empty,
   /// otherwise frees it and returns the previously published value.
   #[cold]
   fn publish(&self, candidate: Box<T>) -> &T {
      let candidate = Box::into_raw(candidate);
      match self.slot.compare_exchange(
         ptr::null_mut(),
         candidate,
         // Success publishes our write of the pointee; failure must acquire
         // the winner's Release store before we read through its pointer.
         Ordering::Release,
         Ordering::Acquire,
      ) {
         // SAFETY: We won the race; the cell owns `candidate` from here on.
         Ok(_) => unsafe { &*candidate },
         Err(winner) => {
            // SAFETY: The exchange failed, so `candidate` was never shared
            // and we still own it; `winner` is the published pointer.
            unsafe {
               drop(Box::from_raw(candidate));
               &*winner
            }
         }
      }
   }
}

// SAFETY:
// `&RacyCell<T>` hands out `&T` across threads, requiring `T: Sync`.
// `T: Send` is also required because the box published by one thread may be
// dropped by another.
unsafe impl<T: Sync + Send> Sync for RacyCell<T> {}
// SAFETY: `RacyCell<T>` owns a `Box<T>`, so it is `Send` iff `T` is.
unsafe impl<T: Send> Send for RacyCell<T> {}

impl<T> Drop for RacyCell<T> {
   #[inline]
   fn drop(&mut self) {
      let ptr = *self.slot.get_mut();
      if !ptr.is_null() {
         // SAFETY: We have exclusive access and the cell owns the box.
         unsafe { drop(Box::from_raw(ptr)) };
      }
   }
}
