use std::sync::atomic::{AtomicUsize, Ordering};

use memo_cell::{Memo, Strategy};

static COUNTER: AtomicUsize = AtomicUsize::new(0);
static DATA: Memo<String> = Memo::new(Strategy::DoubleChecked, || {
   // This producer runs only once
   COUNTER.fetch_add(1, Ordering::Relaxed);
   println!("Resolving data...");
   // Simulate work
   std::thread::sleep(std::time::Duration::from_millis(50));
   "Expensive data".to_string()
});

fn main() {
   let threads: Vec<_> = (0..5)
      .map(|_| {
         std::thread::spawn(|| {
            println!("Thread access: {}", DATA.get());
         })
      })
      .collect();

   for t in threads {
      t.join().unwrap();
   }

   assert_eq!(DATA.peek(), Some(&"Expensive data".to_string()));
   assert_eq!(COUNTER.load(Ordering::Relaxed), 1); // Producer ran only once
   println!("Final data: {}", DATA.get());
}
