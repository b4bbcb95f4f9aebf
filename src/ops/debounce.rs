use std::{
  sync::{Arc, Mutex},
  time::Duration,
};

use crate::{
  demand::Demand,
  publisher::Publisher,
  relay::{Backpressure, Relay},
  scheduler::{Scheduler, Task, TaskHandle},
  subscriber::{Completion, Subscriber},
  subscription::{SerialSubscription, Subscription, SubscriptionRef},
};

/// Publisher returned by [`debounce`](crate::ops::PublisherExt::debounce).
#[derive(Clone)]
pub struct Debounce<P, S> {
  pub(crate) source: P,
  pub(crate) duration: Duration,
  pub(crate) scheduler: S,
}

struct DebounceCore<T, E, S> {
  relay: Relay<T, E>,
  upstream: SerialSubscription,
  state: Mutex<DebounceState<T>>,
  duration: Duration,
  scheduler: S,
}

struct DebounceState<T> {
  pending: Option<T>,
  /// Bumped on every value; a timer only fires for the generation it was
  /// scheduled for.
  generation: u64,
  timer: Option<TaskHandle>,
}

impl<T, E, S> DebounceCore<T, E, S>
where
  T: Send + 'static,
  E: Send + 'static,
  S: Scheduler,
{
  fn fire(&self, generation: u64) {
    {
      let mut state = self.state.lock().unwrap();
      if state.generation != generation {
        tracing::trace!(generation, "stale debounce timer ignored");
        return;
      }
      state.timer = None;
      // queued under the state lock so a racing completion cannot overtake it
      if let Some(value) = state.pending.take() {
        self.relay.enqueue(value);
      }
    }
    self.relay.drain();
  }

  /// Forget the pending value and stop its timer. Returns the value.
  fn take_pending(&self) -> Option<T> {
    let (value, timer) = {
      let mut state = self.state.lock().unwrap();
      state.generation += 1;
      (state.pending.take(), state.timer.take())
    };
    if let Some(timer) = timer {
      timer.cancel();
    }
    value
  }
}

impl<T, E, S> Subscription for DebounceCore<T, E, S>
where
  T: Send + 'static,
  E: Send + 'static,
  S: Scheduler,
{
  fn request(&self, demand: Demand) { self.relay.request(demand) }

  fn cancel(&self) {
    self.relay.cancel();
    self.upstream.cancel();
    self.take_pending();
  }
}

struct DebounceSubscriber<T, E, S> {
  core: Arc<DebounceCore<T, E, S>>,
}

impl<T, E, S> Subscriber<T, E> for DebounceSubscriber<T, E, S>
where
  T: Send + 'static,
  E: Send + 'static,
  S: Scheduler,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    // time decides what survives, so upstream is never throttled by demand
    self.core.upstream.replace(subscription, Demand::unlimited());
  }

  fn on_value(&mut self, value: T) -> Demand {
    let (generation, previous) = {
      let mut state = self.core.state.lock().unwrap();
      state.pending = Some(value);
      state.generation += 1;
      (state.generation, state.timer.take())
    };
    if let Some(previous) = previous {
      previous.cancel();
    }

    let core = self.core.clone();
    let timer = self
      .core
      .scheduler
      .schedule(Task::once(move || core.fire(generation)), Some(self.core.duration));

    let stale = {
      let mut state = self.core.state.lock().unwrap();
      if state.generation == generation && state.pending.is_some() {
        state.timer = Some(timer);
        None
      } else {
        Some(timer)
      }
    };
    if let Some(stale) = stale {
      stale.cancel();
    }
    Demand::none()
  }

  fn on_completed(&mut self) {
    if let Some(value) = self.core.take_pending() {
      self.core.relay.enqueue(value);
    }
    self.core.relay.complete(Completion::Completed);
  }

  fn on_failed(&mut self, err: E) {
    self.core.take_pending();
    self.core.relay.complete(Completion::Failed(err));
  }
}

impl<P, S> Publisher for Debounce<P, S>
where
  P: Publisher,
  S: Scheduler,
{
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<O: Subscriber<P::Item, P::Err>>(self, subscriber: O) {
    let core = Arc::new(DebounceCore {
      relay: Relay::new(subscriber, Backpressure::Latest),
      upstream: SerialSubscription::default(),
      state: Mutex::new(DebounceState { pending: None, generation: 0, timer: None }),
      duration: self.duration,
      scheduler: self.scheduler,
    });
    core.relay.start(core.clone());
    if core.relay.is_closed() {
      return;
    }
    self.source.actual_subscribe(DebounceSubscriber { core });
  }
}
