use std::time::Duration;

use futures::executor::ThreadPool;
use once_cell::sync::Lazy;

use super::{Scheduler, SchedulerId, Task, TaskHandle, ThreadPoolScheduler};

static MAIN: Lazy<ThreadPoolScheduler> = Lazy::new(|| {
  let pool = ThreadPool::builder()
    .pool_size(1)
    .name_prefix("rxflow-main")
    .create()
    .expect("failed to start the rxflow main worker");
  ThreadPoolScheduler::from_pool(pool, SchedulerId::MAIN)
});

/// The "primary" execution context: one dedicated worker thread.
///
/// Tasks without delay run strictly in the order they were scheduled, which
/// makes it the place to deliver values that must be observed from a single
/// thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct MainScheduler;

impl Scheduler for MainScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle { MAIN.schedule(task, delay) }

  fn id(&self) -> SchedulerId { SchedulerId::MAIN }
}

#[cfg(test)]
mod tests {
  use std::sync::mpsc::channel;

  use super::*;

  #[rxflow_macro::test]
  fn tasks_run_in_schedule_order_on_one_thread() {
    let (tx, rx) = channel();
    for i in 0..20 {
      let tx = tx.clone();
      MainScheduler.schedule(Task::once(move || tx.send((i, std::thread::current().id())).unwrap()), None);
    }
    let received: Vec<_> = (0..20)
      .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
      .collect();
    let order: Vec<_> = received.iter().map(|(i, _)| *i).collect();
    assert_eq!(order, (0..20).collect::<Vec<_>>());
    assert!(received.iter().all(|(_, t)| *t == received[0].1));
  }
}
