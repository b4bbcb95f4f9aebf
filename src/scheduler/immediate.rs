use std::time::Duration;

use super::{Scheduler, SchedulerId, Task, TaskHandle};

/// Runs every task synchronously on the calling thread.
///
/// Delays block the caller. A repeating task keeps the caller busy until it
/// finishes or its handle is cancelled from inside the task.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
  fn schedule(&self, mut task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    if let Some(delay) = delay.filter(|d| !d.is_zero()) {
      std::thread::sleep(delay);
    }
    while let Some(next) = handle.run(&mut task) {
      if !next.is_zero() {
        std::thread::sleep(next);
      }
    }
    handle
  }

  fn id(&self) -> SchedulerId { SchedulerId::IMMEDIATE }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use super::*;
  use crate::scheduler::{TaskState, TaskStatus};

  #[rxflow_macro::test]
  fn runs_before_schedule_returns() {
    let hits = Arc::new(AtomicUsize::new(0));
    let c = hits.clone();
    let handle = ImmediateScheduler.schedule(
      Task::once(move || {
        c.fetch_add(1, Ordering::SeqCst);
      }),
      None,
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status(), TaskStatus::Done);
  }

  #[rxflow_macro::test]
  fn repeating_task_runs_until_finished() {
    let hits = Arc::new(AtomicUsize::new(0));
    let c = hits.clone();
    ImmediateScheduler.schedule(
      Task::repeating(move || {
        if c.fetch_add(1, Ordering::SeqCst) == 2 {
          TaskState::Finished
        } else {
          TaskState::Yield
        }
      }),
      Some(Duration::from_millis(1)),
    );
    assert_eq!(hits.load(Ordering::SeqCst), 3);
  }
}
