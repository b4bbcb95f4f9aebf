use std::time::Duration;

use tokio::runtime::Handle;

use super::{Scheduler, SchedulerId, Task, TaskHandle};

/// Runs tasks on a tokio runtime.
#[derive(Clone)]
pub struct TokioScheduler {
  runtime: Handle,
  id: SchedulerId,
}

impl TokioScheduler {
  pub fn new(runtime: Handle) -> Self { TokioScheduler { runtime, id: SchedulerId::unique() } }

  /// The runtime the caller is running on.
  ///
  /// # Panics
  ///
  /// Panics when called outside a tokio runtime.
  pub fn current() -> Self { Self::new(Handle::current()) }
}

impl Scheduler for TokioScheduler {
  fn schedule(&self, mut task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let running = handle.clone();
    self.runtime.spawn(async move {
      if let Some(delay) = delay.filter(|d| !d.is_zero()) {
        tokio::time::sleep(delay).await;
      }
      while let Some(next) = running.run(&mut task) {
        if next.is_zero() {
          tokio::task::yield_now().await;
        } else {
          tokio::time::sleep(next).await;
        }
      }
    });
    handle
  }

  fn id(&self) -> SchedulerId { self.id }
}
