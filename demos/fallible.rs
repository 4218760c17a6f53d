use std::sync::atomic::{AtomicUsize, Ordering};

use memo_cell::{Strategy, TryMemo};

static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);
static DATA: TryMemo<String, &str> = TryMemo::new(Strategy::DoubleChecked, || {
   let attempt = ATTEMPTS.fetch_add(1, Ordering::Relaxed);
   println!("Attempting resolution (attempt {attempt})...");
   if attempt == 0 {
      Err("transient failure")
   } else {
      Ok("Recovered data".to_string())
   }
});

fn main() {
   // The first call fails and leaves the cell unresolved.
   assert_eq!(DATA.get(), Err("transient failure"));
   assert!(!DATA.is_resolved());

   // The next call retries the producer and succeeds.
   let value = DATA.get().expect("retry should succeed");
   println!("Resolved: {value}");
   assert_eq!(ATTEMPTS.load(Ordering::Relaxed), 2);

   // Further calls return the memoized value without another attempt.
   assert_eq!(DATA.get(), Ok(&"Recovered data".to_string()));
   assert_eq!(ATTEMPTS.load(Ordering::Relaxed), 2);
}
