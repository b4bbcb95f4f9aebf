//! Schedulers: where and when work runs.
//!
//! A [`Scheduler`] accepts a [`Task`] and an optional delay and returns a
//! [`TaskHandle`] to observe or cancel it. Operators that cross execution
//! contexts (`subscribe_on`, `receive_on`) and operators that wait
//! (`debounce`, `throttle`, `timer`, `interval`) are generic over it.
//!
//! | Scheduler | Runs on | Delay |
//! |-----------|---------|-------|
//! | [`ImmediateScheduler`] | the calling thread, synchronously | blocks the caller |
//! | [`ThreadPoolScheduler`] | a shared background pool | async timer |
//! | [`MainScheduler`] | one dedicated worker, FIFO | async timer |
//! | [`TestScheduler`] | the test thread, in virtual time | virtual |
//! | `TokioScheduler` | a tokio runtime (feature `tokio-scheduler`) | tokio timer |
//!
//! [`AnyScheduler`] hides the concrete type when the choice is made at
//! runtime.

use std::{
  fmt,
  sync::{
    atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
    Arc,
  },
  time::Duration,
};

mod immediate;
#[cfg(feature = "futures-scheduler")]
mod main_thread;
mod test_scheduler;
#[cfg(feature = "futures-scheduler")]
mod thread_pool;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;

pub use immediate::ImmediateScheduler;
#[cfg(feature = "futures-scheduler")]
pub use main_thread::MainScheduler;
pub use test_scheduler::TestScheduler;
#[cfg(feature = "futures-scheduler")]
pub use thread_pool::{ThreadPoolScheduler, ThreadPoolSchedulerBuilder};
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// A Scheduler orders tasks and runs them on its execution context.
pub trait Scheduler: Clone + Send + Sync + 'static {
  /// Run `task` after `delay` (or as soon as possible). Repeating tasks are
  /// re-armed by the scheduler for as long as they ask for it.
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle;

  /// Identity of the execution context. Clones share it.
  fn id(&self) -> SchedulerId;
}

/// Object-safe face of a scheduler, used behind [`AnyScheduler`].
trait DynScheduler: Send + Sync {
  fn schedule_dyn(&self, task: Task, delay: Option<Duration>) -> TaskHandle;

  fn id_dyn(&self) -> SchedulerId;
}

impl<S: Scheduler> DynScheduler for S {
  fn schedule_dyn(&self, task: Task, delay: Option<Duration>) -> TaskHandle { self.schedule(task, delay) }

  fn id_dyn(&self) -> SchedulerId { self.id() }
}

/// A scheduler whose concrete type is hidden, for configuration that is
/// picked at runtime.
#[derive(Clone)]
pub struct AnyScheduler(Arc<dyn DynScheduler>);

impl AnyScheduler {
  pub fn new(scheduler: impl Scheduler) -> Self { AnyScheduler(Arc::new(scheduler)) }
}

impl Scheduler for AnyScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle { self.0.schedule_dyn(task, delay) }

  fn id(&self) -> SchedulerId { self.0.id_dyn() }
}

impl fmt::Debug for AnyScheduler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("AnyScheduler").field(&self.id()).finish()
  }
}

/// Opaque identity of an execution context, compared by identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SchedulerId(usize);

impl SchedulerId {
  pub(crate) const IMMEDIATE: SchedulerId = SchedulerId(0);
  pub(crate) const MAIN: SchedulerId = SchedulerId(1);
  pub(crate) const TEST: SchedulerId = SchedulerId(2);

  /// A fresh identity, distinct from every other.
  pub(crate) fn unique() -> Self {
    static NEXT: AtomicUsize = AtomicUsize::new(3);
    SchedulerId(NEXT.fetch_add(1, Ordering::Relaxed))
  }
}

/// What a task wants after one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
  Finished,
  /// Run again as soon as possible.
  Yield,
  /// Run again after the given duration.
  Sleeping(Duration),
}

/// A unit of schedulable work.
pub struct Task(Box<dyn FnMut() -> TaskState + Send>);

impl Task {
  /// A task that runs `f` once.
  pub fn once(f: impl FnOnce() + Send + 'static) -> Self {
    let mut f = Some(f);
    Task(Box::new(move || {
      if let Some(f) = f.take() {
        f();
      }
      TaskState::Finished
    }))
  }

  /// A task that keeps running for as long as `f` does not return
  /// `TaskState::Finished`.
  pub fn repeating(f: impl FnMut() -> TaskState + Send + 'static) -> Self { Task(Box::new(f)) }

  #[inline]
  pub(crate) fn step(&mut self) -> TaskState { (self.0)() }
}

impl fmt::Debug for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Task") }
}

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;

/// Lifecycle of a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
  Pending,
  Running,
  Done,
  Cancelled,
}

/// Handle to a scheduled task.
///
/// A task moves `Pending -> Running -> Done`, or `Pending -> Cancelled`.
/// Repeating tasks return to `Pending` between runs. Cancelling a pending task
/// prevents its callback entirely; cancelling a running task lets the
/// in-flight call finish and only stops it from being re-armed.
#[derive(Clone, Default)]
pub struct TaskHandle(Arc<HandleState>);

#[derive(Default)]
struct HandleState {
  status: AtomicU8,
  cancel_requested: AtomicBool,
}

impl TaskHandle {
  pub fn new() -> Self { Self::default() }

  pub fn status(&self) -> TaskStatus {
    match self.0.status.load(Ordering::Acquire) {
      PENDING => TaskStatus::Pending,
      RUNNING => TaskStatus::Running,
      DONE => TaskStatus::Done,
      _ => TaskStatus::Cancelled,
    }
  }

  /// `true` once the task is done or cancelled.
  pub fn is_closed(&self) -> bool { matches!(self.status(), TaskStatus::Done | TaskStatus::Cancelled) }

  pub fn cancel(&self) {
    self.0.cancel_requested.store(true, Ordering::Release);
    let _ = self
      .0
      .status
      .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire);
  }

  /// Run one step of `task` under this handle.
  ///
  /// Returns the delay before the next step, or `None` when the task must not
  /// run again.
  pub(crate) fn run(&self, task: &mut Task) -> Option<Duration> {
    if self
      .0
      .status
      .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      return None;
    }
    let next = match task.step() {
      TaskState::Finished => None,
      TaskState::Yield => Some(Duration::ZERO),
      TaskState::Sleeping(d) => Some(d),
    };
    match next {
      None => {
        self.0.status.store(DONE, Ordering::Release);
        None
      }
      Some(_) if self.0.cancel_requested.load(Ordering::Acquire) => {
        self.0.status.store(CANCELLED, Ordering::Release);
        None
      }
      Some(delay) => {
        self.0.status.store(PENDING, Ordering::Release);
        // A cancel that raced the store above still has to win.
        if self.0.cancel_requested.load(Ordering::Acquire) {
          self.cancel();
          return None;
        }
        Some(delay)
      }
    }
  }
}

impl fmt::Debug for TaskHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("TaskHandle").field(&self.status()).finish()
  }
}

#[cfg(feature = "futures-scheduler")]
async fn sleep(duration: Duration) {
  #[cfg(feature = "timer")]
  futures_time::task::sleep(futures_time::time::Duration::from(duration)).await;
  #[cfg(not(feature = "timer"))]
  std::thread::sleep(duration);
}

/// Drive `task` to completion on the current async worker.
#[cfg(feature = "futures-scheduler")]
pub(crate) async fn drive(mut task: Task, handle: TaskHandle, delay: Option<Duration>) {
  if let Some(delay) = delay.filter(|d| !d.is_zero()) {
    sleep(delay).await;
  }
  while let Some(next) = handle.run(&mut task) {
    if !next.is_zero() {
      sleep(next).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use super::*;

  #[rxflow_macro::test]
  fn cancel_before_run_skips_the_callback() {
    let hits = Arc::new(AtomicUsize::new(0));
    let c = hits.clone();
    let mut task = Task::once(move || {
      c.fetch_add(1, Ordering::SeqCst);
    });
    let handle = TaskHandle::new();
    handle.cancel();
    assert_eq!(handle.run(&mut task), None);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(handle.status(), TaskStatus::Cancelled);
  }

  #[rxflow_macro::test]
  fn cancel_while_running_only_stops_rearming() {
    let handle = TaskHandle::new();
    let inner = handle.clone();
    let runs = Arc::new(AtomicUsize::new(0));
    let c = runs.clone();
    let mut task = Task::repeating(move || {
      c.fetch_add(1, Ordering::SeqCst);
      assert_eq!(inner.status(), TaskStatus::Running);
      inner.cancel();
      TaskState::Sleeping(Duration::from_millis(10))
    });
    assert_eq!(handle.run(&mut task), None);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status(), TaskStatus::Cancelled);
  }

  #[rxflow_macro::test]
  fn finished_task_is_done() {
    let handle = TaskHandle::new();
    let mut task = Task::once(|| {});
    assert_eq!(handle.run(&mut task), None);
    assert_eq!(handle.status(), TaskStatus::Done);
    handle.cancel();
    assert_eq!(handle.status(), TaskStatus::Done);
  }

  #[rxflow_macro::test]
  fn scheduler_ids_compare_by_identity() {
    assert_eq!(ImmediateScheduler.id(), ImmediateScheduler.id());
    assert_ne!(SchedulerId::unique(), SchedulerId::unique());
    assert_ne!(ImmediateScheduler.id(), TestScheduler.id());
    assert_eq!(AnyScheduler::new(TestScheduler).id(), TestScheduler.id());
  }
}
