use std::{
  convert::Infallible,
  sync::{Arc, Mutex},
  time::Duration,
};

use crate::{
  demand::Demand,
  publisher::Publisher,
  relay::{Backpressure, Relay},
  scheduler::{Scheduler, Task, TaskHandle, TaskState},
  subscriber::{Completion, Subscriber},
  subscription::Subscription,
};

/// Emits `0` once after a delay, then completes.
#[derive(Clone)]
pub struct Timer<S> {
  pub(crate) delay: Duration,
  pub(crate) scheduler: S,
}

/// Emits `0, 1, 2, ...` every `period`. Never completes.
///
/// Ticks that fire while the subscriber has no outstanding demand are
/// dropped.
#[derive(Clone)]
pub struct Interval<S> {
  pub(crate) period: Duration,
  pub(crate) scheduler: S,
}

/// Subscription of a publisher whose values come from one scheduled task.
struct ScheduledSubscription<T, E> {
  relay: Relay<T, E>,
  task: Mutex<TaskSlot>,
}

#[derive(Default)]
struct TaskSlot {
  handle: Option<TaskHandle>,
  cancelled: bool,
}

impl<T, E> ScheduledSubscription<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn new(relay: Relay<T, E>) -> Arc<Self> {
    Arc::new(ScheduledSubscription { relay, task: Mutex::new(TaskSlot::default()) })
  }

  fn attach(&self, handle: TaskHandle) {
    let mut slot = self.task.lock().unwrap();
    if slot.cancelled {
      drop(slot);
      handle.cancel();
    } else {
      slot.handle = Some(handle);
    }
  }
}

impl<T, E> Subscription for ScheduledSubscription<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn request(&self, demand: Demand) { self.relay.request(demand) }

  fn cancel(&self) {
    self.relay.cancel();
    let handle = {
      let mut slot = self.task.lock().unwrap();
      slot.cancelled = true;
      slot.handle.take()
    };
    if let Some(handle) = handle {
      handle.cancel();
    }
  }
}

impl<S: Scheduler> Publisher for Timer<S> {
  type Item = usize;
  type Err = Infallible;

  fn actual_subscribe<O: Subscriber<usize, Infallible>>(self, subscriber: O) {
    let relay = Relay::new(subscriber, Backpressure::Buffer);
    let subscription = ScheduledSubscription::new(relay.clone());
    relay.start(subscription.clone());
    if relay.is_closed() {
      return;
    }
    let handle = self.scheduler.schedule(
      Task::once(move || {
        relay.enqueue(0);
        relay.complete(Completion::Completed);
      }),
      Some(self.delay),
    );
    subscription.attach(handle);
  }
}

impl<S: Scheduler> Publisher for Interval<S> {
  type Item = usize;
  type Err = Infallible;

  fn actual_subscribe<O: Subscriber<usize, Infallible>>(self, subscriber: O) {
    let relay = Relay::new(subscriber, Backpressure::Drop);
    let subscription = ScheduledSubscription::new(relay.clone());
    relay.start(subscription.clone());
    if relay.is_closed() {
      return;
    }
    let period = self.period;
    let mut tick = 0;
    let handle = self.scheduler.schedule(
      Task::repeating(move || {
        if relay.is_closed() {
          return TaskState::Finished;
        }
        relay.push(tick);
        tick += 1;
        TaskState::Sleeping(period)
      }),
      Some(period),
    );
    subscription.attach(handle);
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use crate::{prelude::*, subscriber::recorder::Recorder};

  #[rxflow_macro::test]
  fn timer_fires_once_after_delay() {
    TestScheduler::init();
    let recorder = Recorder::unlimited();
    timer(Duration::from_millis(100), TestScheduler).subscribe(recorder.clone());

    TestScheduler::advance_by(Duration::from_millis(99));
    assert!(recorder.events().is_empty());
    TestScheduler::advance_by(Duration::from_millis(1));
    assert_eq!(recorder.events(), vec![Event::Value(0), Event::Completed]);
  }

  #[rxflow_macro::test]
  fn cancelled_timer_never_fires() {
    TestScheduler::init();
    let recorder = Recorder::<usize, Infallible>::unlimited();
    let token = timer(Duration::from_millis(10), TestScheduler).subscribe(recorder.clone());
    token.cancel();
    assert_eq!(TestScheduler::pending_count(), 0);
    TestScheduler::flush();
    assert!(recorder.events().is_empty());
  }

  #[rxflow_macro::test]
  fn interval_ticks_and_drops_without_demand() {
    TestScheduler::init();
    let recorder = Recorder::with_demand(Demand::max(2));
    let token = interval(Duration::from_millis(10), TestScheduler).subscribe(recorder.clone());

    TestScheduler::advance_by(Duration::from_millis(40));
    assert_eq!(recorder.values(), vec![0, 1]);

    recorder.request(1);
    TestScheduler::advance_by(Duration::from_millis(10));
    assert_eq!(recorder.values(), vec![0, 1, 4]);

    token.cancel();
    TestScheduler::advance_by(Duration::from_millis(100));
    assert_eq!(recorder.values(), vec![0, 1, 4]);
  }
}
