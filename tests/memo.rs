use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use memo_cell::{Memo, MemoI32, MemoI64, Strategy};

/// Increments a shared counter when dropped.
struct DropTracker(Arc<AtomicUsize>);

impl Drop for DropTracker {
   fn drop(&mut self) {
      self.0.fetch_add(1, Ordering::Relaxed);
   }
}

#[test]
fn test_new_is_unresolved() {
   for strategy in [Strategy::NonBlocking, Strategy::DoubleChecked] {
      let memo = Memo::new(strategy, || 42);
      assert!(!memo.is_resolved());
      assert_eq!(memo.peek(), None);
      assert_eq!(memo.strategy(), strategy);
   }
}

#[test]
fn test_get_returns_producer_value() {
   for strategy in [Strategy::NonBlocking, Strategy::DoubleChecked] {
      let memo = Memo::new(strategy, || 117);
      assert_eq!(*memo.get(), 117);
      assert!(memo.is_resolved());
      assert_eq!(memo.peek(), Some(&117));
   }
}

#[test]
fn test_producer_runs_once_across_calls() {
   for strategy in [Strategy::NonBlocking, Strategy::DoubleChecked] {
      let runs = AtomicUsize::new(0);
      let memo = Memo::new(strategy, || {
         // A second invocation would fail the test on its own.
         assert_eq!(runs.fetch_add(1, Ordering::SeqCst), 0, "producer re-invoked");
         117
      });
      assert_eq!(*memo.get(), 117);
      assert_eq!(*memo.get(), 117);
      assert_eq!(*memo.get(), 117);
      assert_eq!(runs.load(Ordering::SeqCst), 1);
   }
}

#[test]
fn test_peek_does_not_resolve() {
   let memo = Memo::double_checked(|| panic!("peek must not run the producer"));
   assert_eq!(memo.peek(), None::<&i32>);
   assert!(!memo.is_resolved());
}

#[test]
fn test_static_memo() {
   static ANSWER: Memo<i32> = Memo::new(Strategy::DoubleChecked, || 42);

   let threads: Vec<_> = (0..4)
      .map(|_| thread::spawn(|| *ANSWER.get()))
      .collect();
   for handle in threads {
      assert_eq!(handle.join().unwrap(), 42);
   }
   assert_eq!(ANSWER.peek(), Some(&42));
}

#[test]
fn test_primitive_aliases() {
   static SMALL: MemoI32 = Memo::new(Strategy::NonBlocking, || 7);
   static LARGE: MemoI64 = Memo::new(Strategy::DoubleChecked, || 1 << 40);

   assert_eq!(*SMALL.get(), 7);
   assert_eq!(*LARGE.get(), 1 << 40);
}

#[test]
fn test_double_checked_concurrent_first_access() {
   let runs = Arc::new(AtomicUsize::new(0));
   let memo = {
      let runs = Arc::clone(&runs);
      Arc::new(Memo::new(Strategy::DoubleChecked, move || {
         runs.fetch_add(1, Ordering::SeqCst);
         // Hold the lock long enough that the others really contend.
         thread::sleep(Duration::from_millis(20));
         42
      }))
   };

   let barrier = Arc::new(Barrier::new(100));
   let threads: Vec<_> = (0..100)
      .map(|_| {
         let memo = Arc::clone(&memo);
         let barrier = Arc::clone(&barrier);
         thread::spawn(move || {
            barrier.wait();
            *memo.get()
         })
      })
      .collect();

   // All threads observe the same value...
   for handle in threads {
      assert_eq!(handle.join().unwrap(), 42);
   }
   // ...and the producer ran exactly once despite 100-way contention.
   assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_non_blocking_concurrent_first_access() {
   const THREADS: usize = 16;

   let runs = Arc::new(AtomicUsize::new(0));
   let memo = {
      let runs = Arc::clone(&runs);
      Arc::new(Memo::new(Strategy::NonBlocking, move || {
         // Every invocation yields a distinct candidate value, so the test
         // can tell whether any two threads adopted different results.
         runs.fetch_add(1, Ordering::SeqCst)
      }))
   };

   let barrier = Arc::new(Barrier::new(THREADS));
   let threads: Vec<_> = (0..THREADS)
      .map(|_| {
         let memo = Arc::clone(&memo);
         let barrier = Arc::clone(&barrier);
         thread::spawn(move || {
            barrier.wait();
            let value = memo.get();
            (*value, value as *const usize as usize)
         })
      })
      .collect();

   let results: Vec<_> = threads.into_iter().map(|h| h.join().unwrap()).collect();

   // The producer ran somewhere between once and once per thread.
   let invocations = runs.load(Ordering::SeqCst);
   assert!((1..=THREADS).contains(&invocations));

   // Whichever publish won, every thread adopted the same value, and the
   // references all point into the single published slot.
   let (winner_value, winner_addr) = results[0];
   for (value, addr) in &results {
      assert_eq!(*value, winner_value);
      assert_eq!(*addr, winner_addr);
   }
   assert_eq!(memo.peek(), Some(&winner_value));
}

#[test]
fn test_double_checked_value_visible_to_lock_losers() {
   // Threads that enter the cold path but find the slot resolved while
   // contending for the lock must observe the fully written value, not just
   // the resolved flag.
   for _ in 0..50 {
      let memo = Arc::new(Memo::new(Strategy::DoubleChecked, || vec![7u8; 1024]));
      let barrier = Arc::new(Barrier::new(4));
      let threads: Vec<_> = (0..4)
         .map(|_| {
            let memo = Arc::clone(&memo);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
               barrier.wait();
               let value = memo.get();
               assert_eq!(value.len(), 1024);
               assert!(value.iter().all(|&b| b == 7));
            })
         })
         .collect();
      for handle in threads {
         handle.join().unwrap();
      }
   }
}

#[test]
fn test_resolved_reference_is_stable() {
   for strategy in [Strategy::NonBlocking, Strategy::DoubleChecked] {
      let memo = Memo::new(strategy, || String::from("stable"));
      let first = memo.get() as *const String;
      let second = memo.get() as *const String;
      assert_eq!(first, second);
   }
}

#[test]
fn test_drop_releases_resolved_value() {
   for strategy in [Strategy::NonBlocking, Strategy::DoubleChecked] {
      let drops = Arc::new(AtomicUsize::new(0));
      let memo = {
         let drops = Arc::clone(&drops);
         Memo::new(strategy, move || DropTracker(Arc::clone(&drops)))
      };

      memo.get();
      assert_eq!(drops.load(Ordering::Relaxed), 0);
      drop(memo);
      assert_eq!(drops.load(Ordering::Relaxed), 1);
   }
}

#[test]
fn test_drop_unresolved_drops_nothing() {
   let drops = Arc::new(AtomicUsize::new(0));
   let memo = {
      let drops = Arc::clone(&drops);
      Memo::double_checked(move || DropTracker(Arc::clone(&drops)))
   };
   // Never resolved; the producer never ran, so there is nothing to drop.
   drop(memo);
   assert_eq!(drops.load(Ordering::Relaxed), 0);
}

#[test]
fn test_panicking_producer_allows_retry() {
   for strategy in [Strategy::NonBlocking, Strategy::DoubleChecked] {
      let attempts = AtomicUsize::new(0);
      let memo = Memo::new(strategy, || {
         if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("first attempt fails");
         }
         5
      });

      let result = panic::catch_unwind(AssertUnwindSafe(|| *memo.get()));
      assert!(result.is_err());
      assert!(!memo.is_resolved()); // Panic left the slot unresolved

      // The next call retries the producer and succeeds.
      assert_eq!(*memo.get(), 5);
      assert_eq!(attempts.load(Ordering::SeqCst), 2);
   }
}

#[test]
fn test_panicking_producer_wakes_waiters() {
   let attempts = Arc::new(AtomicUsize::new(0));
   let memo = {
      let attempts = Arc::clone(&attempts);
      Arc::new(Memo::new(Strategy::DoubleChecked, move || {
         if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            // Give the other threads time to park on the lock before the
            // panic forces a state reset.
            thread::sleep(Duration::from_millis(20));
            panic!("winner bails out");
         }
         9
      }))
   };

   let barrier = Arc::new(Barrier::new(4));
   let threads: Vec<_> = (0..4)
      .map(|_| {
         let memo = Arc::clone(&memo);
         let barrier = Arc::clone(&barrier);
         thread::spawn(move || {
            barrier.wait();
            loop {
               match panic::catch_unwind(AssertUnwindSafe(|| *memo.get())) {
                  Ok(value) => break value,
                  Err(_) => continue, // We were the panicking resolver; retry
               }
            }
         })
      })
      .collect();

   for handle in threads {
      assert_eq!(handle.join().unwrap(), 9);
   }
   // One panicked attempt, then exactly one successful one under the lock.
   assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_debug_and_display() {
   let memo = Memo::double_checked(|| 42);
   assert_eq!(format!("{memo:?}"), "Memo(<unresolved>)");
   assert_eq!(format!("{memo}"), "<unresolved>");

   memo.get();
   assert_eq!(format!("{memo:?}"), "Memo(42)");
   assert_eq!(format!("{memo}"), "42");
}

#[test]
fn test_strategy_default_and_shorthands() {
   assert_eq!(Strategy::default(), Strategy::DoubleChecked);

   let racy = Memo::non_blocking(|| 1);
   assert_eq!(racy.strategy(), Strategy::NonBlocking);

   let locked = Memo::double_checked(|| 1);
   assert_eq!(locked.strategy(), Strategy::DoubleChecked);
}
