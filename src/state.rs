//! Internal synchronization state for the locked slot.
//!
//! This is the machinery behind the double-checked resolution strategy: a
//! state machine packed into a single `AtomicU8`, with futex-based waiting
//! via `parking_lot_core` for threads that lose the resolution race.
//!
//! State layout:
//! - Bit 0: SET - Slot holds a resolved value
//! - Bit 1: LOCKED - A thread holds the resolution lock
//! - Bit 2: WAITING - At least one thread is parked
//! - Bits 3-7: EPOCH - Generation counter to prevent missed wakeups
//!
//! Reading a resolved slot needs nothing beyond an `Acquire` load of this
//! word; parking only ever happens while the slot is unresolved.

use core::mem;
use core::sync::atomic::{AtomicU8, Ordering};

use parking_lot_core::{DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};

/// Atomic state word for [`LockedCell`](crate::locked::LockedCell).
#[repr(transparent)]
pub(crate) struct SlotState(AtomicU8);

impl SlotState {
   /// Bit flag: slot holds a resolved value.
   const SET: u8 = 1;
   /// Bit flag: a thread holds the resolution lock.
   const LOCKED: u8 = 2;
   /// Bit flag: at least one thread is parked waiting for resolution.
   const WAITING: u8 = 4;
   /// Start of the epoch bits.
   const EPOCH_1: u8 = 8;
   /// Mask covering the epoch bits.
   const EPOCH_MASK: u8 = !(Self::SET | Self::LOCKED | Self::WAITING);

   /// Calculates the next epoch value based on the current state.
   #[inline(always)]
   const fn next_epoch(current: u8) -> u8 {
      (current & Self::EPOCH_MASK).wrapping_add(Self::EPOCH_1) & Self::EPOCH_MASK
   }

   /// Creates the state of an unresolved slot.
   #[inline]
   pub(crate) const fn new() -> Self {
      Self(AtomicU8::new(0))
   }

   /// Checks whether the SET flag is up.
   #[inline]
   pub(crate) fn is_set(&self, ordering: Ordering) -> bool {
      self.0.load(ordering) & Self::SET != 0
   }

   /// Wakes every parked thread. Uses `parking_lot_core` futex wait/wake.
   #[inline]
   fn notify_all(&self) {
      // SAFETY: The address passed to unpark must match the address used for
      // park. We consistently use the address of the AtomicU8.
      unsafe {
         parking_lot_core::unpark_all(self.0.as_ptr() as usize, DEFAULT_UNPARK_TOKEN);
      }
   }

   /// Parks the current thread until the state changes from `expected`.
   #[inline]
   fn wait(&self, expected: u8) {
      // SAFETY: See safety comment in `notify_all`.
      unsafe {
         // park() validates the condition closure *before* sleeping; it only
         // sleeps while the state still equals `expected`.
         let _ = parking_lot_core::park(
            self.0.as_ptr() as usize,
            || self.0.load(Ordering::Acquire) == expected,
            || {},
            |_, _| {},
            DEFAULT_PARK_TOKEN,
            None,
         );
         // Wake-ups may be spurious; callers loop and re-check the state.
      }
   }

   /// Marks the slot as resolved, bumps the epoch, and wakes waiters.
   ///
   /// Only reachable through [`SlotGuard::commit`], i.e. while holding the
   /// resolution lock.
   #[inline]
   fn set_resolved(&self) {
      // Relaxed read is fine; the swap below carries the Release.
      let current = self.0.load(Ordering::Relaxed);
      let new_state = Self::SET | Self::next_epoch(current);

      // Release ordering makes the winner's write of the slot value
      // happen-before any Acquire load that observes SET.
      let prev = self.0.swap(new_state, Ordering::Release);
      if prev & Self::WAITING != 0 {
         self.notify_all();
      }
   }

   /// Returns the slot to unresolved, bumps the epoch, and wakes waiters.
   ///
   /// Runs when a guard is dropped without committing, i.e. the producer
   /// failed or panicked; waking the parked threads lets one of them retry.
   #[inline]
   fn reset(&self) {
      let current = self.0.load(Ordering::Relaxed);
      // The new state is just the next epoch; SET, LOCKED and WAITING clear.
      let prev = self.0.swap(Self::next_epoch(current), Ordering::Release);
      if prev & Self::WAITING != 0 {
         self.notify_all();
      }
   }

   /// One attempt at acquiring the resolution lock.
   ///
   /// Returns:
   ///   - `Ok(None)`: slot is already resolved.
   ///   - `Ok(Some(guard))`: lock acquired.
   ///   - `Err(state)`: lock held by another thread; `state` is the observed
   ///     word with WAITING raised, suitable for passing to `wait`.
   #[inline]
   fn lock_step(&self) -> Result<Option<SlotGuard<'_>>, u8> {
      loop {
         // Acquire pairs with the Release in set_resolved: when this load
         // observes SET and lock() returns None, the caller reads the slot
         // value directly, so the winner's write must be visible here too.
         let current = self.0.load(Ordering::Acquire);
         // Fast path: already resolved?
         if current & Self::SET != 0 {
            return Ok(None);
         }

         // Try to take the lock if nobody holds it. Epoch is unchanged here.
         if current & Self::LOCKED == 0 {
            match self.0.compare_exchange_weak(
               current,
               current | Self::LOCKED,
               Ordering::Acquire,
               Ordering::Relaxed,
            ) {
               Ok(_) => return Ok(Some(SlotGuard::new(self))),
               Err(_) => {
                  std::hint::spin_loop();
                  continue;
               }
            }
         }

         // Lock is held; make sure the holder will wake us before we park.
         if current & Self::WAITING == 0 {
            match self.0.compare_exchange_weak(
               current,
               current | Self::WAITING,
               Ordering::Relaxed,
               Ordering::Relaxed,
            ) {
               Ok(_) => return Err(current | Self::WAITING),
               Err(_) => {
                  // State moved under us (possibly to SET); retry the loop.
                  std::hint::spin_loop();
                  continue;
               }
            }
         }
         return Err(current);
      }
   }

   /// Acquires the resolution lock, parking if another thread holds it.
   ///
   /// Returns `Some(guard)` if the lock was acquired (slot still unresolved),
   /// `None` if the slot was resolved while we contended for the lock.
   #[inline]
   pub(crate) fn lock(&self) -> Option<SlotGuard<'_>> {
      match self.lock_step() {
         Ok(guard_opt) => guard_opt,
         Err(mut observed) => loop {
            // Park only while the state still matches what lock_step saw.
            self.wait(observed);
            match self.lock_step() {
               Ok(guard_opt) => return guard_opt,
               Err(new_state) => observed = new_state,
            }
         },
      }
   }
}

/// RAII guard over the LOCKED state.
///
/// Must be `commit()`ed to mark the slot resolved; dropping it instead
/// rolls the state back to unresolved so another thread can retry.
pub(crate) struct SlotGuard<'a> {
   state: &'a SlotState,
}

impl<'a> SlotGuard<'a> {
   /// Creates a new guard. Assumes the LOCKED flag is already set on `state`.
   #[inline(always)]
   const fn new(state: &'a SlotState) -> Self {
      Self { state }
   }

   /// Marks resolution as complete, consumes the guard, and wakes waiters.
   #[inline(always)]
   pub(crate) fn commit(self) {
      self.state.set_resolved();
      mem::forget(self); // Prevent Drop from rolling the state back
   }
}

impl Drop for SlotGuard<'_> {
   /// Runs when resolution is abandoned (producer error or panic). Clears
   /// LOCKED and wakes waiters so one of them can take over.
   #[inline(always)]
   fn drop(&mut self) {
      self.state.reset();
   }
}
