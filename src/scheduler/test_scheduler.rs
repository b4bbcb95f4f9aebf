//! Test Scheduler for deterministic testing of time-based operators.
//!
//! Provides virtual time that only advances when explicitly instructed,
//! enabling deterministic testing of `debounce`, `throttle`, `timer` and
//! `interval`.
//!
//! # Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use rxflow::prelude::*;
//!
//! // Initialize the test scheduler (required before use)
//! TestScheduler::init();
//!
//! let hits = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
//! let c = hits.clone();
//! timer(Duration::from_millis(100), TestScheduler).sink(move |v| c.lock().unwrap().push(v));
//!
//! TestScheduler::advance_by(Duration::from_millis(99));
//! assert!(hits.lock().unwrap().is_empty());
//!
//! // Or execute all pending tasks
//! TestScheduler::flush();
//! assert_eq!(*hits.lock().unwrap(), vec![0]);
//! ```
//!
//! # Thread Safety
//!
//! TestScheduler uses thread-local storage, so each thread has its own
//! independent virtual time and task queue. This ensures test isolation when
//! running tests in parallel across different threads.

use std::{cell::RefCell, cmp::Ordering, collections::BinaryHeap, time::Duration};

use super::{Scheduler, SchedulerId, Task, TaskHandle};

struct TestSchedulerState {
  virtual_time: Duration,
  task_queue: BinaryHeap<ScheduledTask>,
  next_task_id: usize,
  initialized: bool,
}

impl Default for TestSchedulerState {
  fn default() -> Self {
    Self {
      virtual_time: Duration::ZERO,
      task_queue: BinaryHeap::new(),
      next_task_id: 0,
      initialized: false,
    }
  }
}

struct ScheduledTask {
  scheduled_time: Duration,
  task_id: usize,
  task: Task,
  handle: TaskHandle,
}

impl PartialEq for ScheduledTask {
  fn eq(&self, other: &Self) -> bool {
    self.scheduled_time == other.scheduled_time && self.task_id == other.task_id
  }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledTask {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by task_id
    other
      .scheduled_time
      .cmp(&self.scheduled_time)
      .then_with(|| other.task_id.cmp(&self.task_id))
  }
}

thread_local! {
  static TEST_SCHEDULER_STATE: RefCell<TestSchedulerState>
    = RefCell::new(TestSchedulerState::default());
}

/// A virtual time scheduler for deterministic testing.
///
/// This is a zero-sized type that accesses thread-local state.
/// All instances in the same thread share the same virtual time and task queue.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestScheduler;

impl TestScheduler {
  /// Initialize or reset the test scheduler state.
  ///
  /// This method must be called at the start of each test to ensure clean
  /// state.
  ///
  /// # Panics
  ///
  /// Other methods will panic if `init()` has not been called first.
  pub fn init() {
    TEST_SCHEDULER_STATE.with(|state| {
      let mut state = state.borrow_mut();
      state.virtual_time = Duration::ZERO;
      state.task_queue.clear();
      state.next_task_id = 0;
      state.initialized = true;
    });
  }

  fn ensure_initialized() {
    TEST_SCHEDULER_STATE.with(|state| {
      assert!(
        state.borrow().initialized,
        "TestScheduler::init() must be called before using the scheduler"
      );
    });
  }

  /// Get the current virtual time.
  ///
  /// # Panics
  ///
  /// Panics if `init()` has not been called first.
  pub fn now() -> Duration {
    Self::ensure_initialized();
    TEST_SCHEDULER_STATE.with(|state| state.borrow().virtual_time)
  }

  /// Number of tasks still waiting to run. Cancelled tasks are not counted.
  ///
  /// # Panics
  ///
  /// Panics if `init()` has not been called first.
  pub fn pending_count() -> usize {
    Self::ensure_initialized();
    TEST_SCHEDULER_STATE.with(|state| {
      state
        .borrow()
        .task_queue
        .iter()
        .filter(|t| !t.handle.is_closed())
        .count()
    })
  }

  fn execute_tasks_until(target_time: Option<Duration>) {
    loop {
      let task = TEST_SCHEDULER_STATE.with(|state| {
        let mut state = state.borrow_mut();
        let due = state
          .task_queue
          .peek()
          .is_some_and(|peek| target_time.is_none_or(|limit| peek.scheduled_time <= limit));
        if !due {
          return None;
        }
        let scheduled_task = state.task_queue.pop()?;
        state.virtual_time = state.virtual_time.max(scheduled_task.scheduled_time);
        Some(scheduled_task)
      });

      let Some(mut scheduled_task) = task else {
        break;
      };

      // Runs outside the borrow so the task may schedule more work.
      if let Some(delay) = scheduled_task.handle.run(&mut scheduled_task.task) {
        TEST_SCHEDULER_STATE.with(|state| {
          let mut state = state.borrow_mut();
          let task_id = state.next_task_id;
          state.next_task_id += 1;
          scheduled_task.scheduled_time = state.virtual_time + delay;
          scheduled_task.task_id = task_id;
          state.task_queue.push(scheduled_task);
        });
      }
    }
  }

  /// Advance virtual time by the specified duration and execute due tasks.
  ///
  /// Tasks are executed in order of their scheduled time, with FIFO ordering
  /// for tasks scheduled at the same time.
  ///
  /// # Panics
  ///
  /// Panics if `init()` has not been called first.
  pub fn advance_by(duration: Duration) {
    Self::ensure_initialized();
    let target_time = TEST_SCHEDULER_STATE.with(|state| state.borrow().virtual_time + duration);

    Self::execute_tasks_until(Some(target_time));

    TEST_SCHEDULER_STATE.with(|state| {
      state.borrow_mut().virtual_time = target_time;
    });
  }

  /// Execute all pending tasks by advancing time to each task's scheduled time.
  ///
  /// A repeating task that never finishes keeps this call running; cancel it
  /// first or use `advance_by`.
  ///
  /// # Panics
  ///
  /// Panics if `init()` has not been called first.
  pub fn flush() {
    Self::ensure_initialized();
    Self::execute_tasks_until(None);
  }
}

impl Scheduler for TestScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    TestScheduler::ensure_initialized();
    TEST_SCHEDULER_STATE.with(|state| {
      let mut state = state.borrow_mut();
      let scheduled_time = state.virtual_time + delay.unwrap_or(Duration::ZERO);
      let handle = TaskHandle::new();
      let task_id = state.next_task_id;
      state.next_task_id += 1;
      state
        .task_queue
        .push(ScheduledTask { scheduled_time, task_id, task, handle: handle.clone() });
      handle
    })
  }

  fn id(&self) -> SchedulerId { SchedulerId::TEST }
}
