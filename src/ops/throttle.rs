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

/// Publisher returned by [`throttle`](crate::ops::PublisherExt::throttle).
#[derive(Clone)]
pub struct Throttle<P, S> {
  pub(crate) source: P,
  pub(crate) duration: Duration,
  pub(crate) scheduler: S,
  pub(crate) latest: bool,
}

struct ThrottleCore<T, E, S> {
  relay: Relay<T, E>,
  upstream: SerialSubscription,
  state: Mutex<Window<T>>,
  duration: Duration,
  scheduler: S,
  latest: bool,
}

struct Window<T> {
  open: bool,
  /// Newest value seen in the open window, `latest` mode only.
  pending: Option<T>,
  generation: u64,
  timer: Option<TaskHandle>,
}

impl<T, E, S> ThrottleCore<T, E, S>
where
  T: Send + 'static,
  E: Send + 'static,
  S: Scheduler,
{
  fn close(&self, generation: u64) {
    {
      let mut window = self.state.lock().unwrap();
      if window.generation != generation {
        tracing::trace!(generation, "stale throttle timer ignored");
        return;
      }
      window.open = false;
      window.timer = None;
      if let Some(value) = window.pending.take() {
        self.relay.enqueue(value);
      }
    }
    self.relay.drain();
  }

  /// Close the window for good. Returns the value still waiting in it.
  fn shut(&self) -> Option<T> {
    let (value, timer) = {
      let mut window = self.state.lock().unwrap();
      window.generation += 1;
      window.open = false;
      (window.pending.take(), window.timer.take())
    };
    if let Some(timer) = timer {
      timer.cancel();
    }
    value
  }

  fn open_window(self: &Arc<Self>, generation: u64) {
    let core = self.clone();
    let timer = self
      .scheduler
      .schedule(Task::once(move || core.close(generation)), Some(self.duration));
    let stale = {
      let mut window = self.state.lock().unwrap();
      if window.generation == generation && window.open {
        window.timer = Some(timer);
        None
      } else {
        Some(timer)
      }
    };
    if let Some(stale) = stale {
      stale.cancel();
    }
  }
}

impl<T, E, S> Subscription for ThrottleCore<T, E, S>
where
  T: Send + 'static,
  E: Send + 'static,
  S: Scheduler,
{
  fn request(&self, demand: Demand) { self.relay.request(demand) }

  fn cancel(&self) {
    self.relay.cancel();
    self.upstream.cancel();
    self.shut();
  }
}

struct ThrottleSubscriber<T, E, S> {
  core: Arc<ThrottleCore<T, E, S>>,
}

enum Admit<T> {
  /// First value of a new window in leading mode: send it now.
  Emit(T, u64),
  /// A new window opened in latest mode; the value waits for its end.
  Opened(u64),
  Absorbed,
}

impl<T, E, S> Subscriber<T, E> for ThrottleSubscriber<T, E, S>
where
  T: Send + 'static,
  E: Send + 'static,
  S: Scheduler,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.core.upstream.replace(subscription, Demand::unlimited());
  }

  fn on_value(&mut self, value: T) -> Demand {
    let admit = {
      let mut window = self.core.state.lock().unwrap();
      if window.open {
        if self.core.latest {
          window.pending = Some(value);
        } else {
          tracing::trace!("value dropped inside throttle window");
        }
        Admit::Absorbed
      } else {
        window.open = true;
        window.generation += 1;
        if self.core.latest {
          window.pending = Some(value);
          Admit::Opened(window.generation)
        } else {
          Admit::Emit(value, window.generation)
        }
      }
    };
    match admit {
      Admit::Emit(value, generation) => {
        self.core.open_window(generation);
        self.core.relay.push(value);
      }
      Admit::Opened(generation) => self.core.open_window(generation),
      Admit::Absorbed => {}
    }
    Demand::none()
  }

  fn on_completed(&mut self) {
    if let Some(value) = self.core.shut() {
      self.core.relay.enqueue(value);
    }
    self.core.relay.complete(Completion::Completed);
  }

  fn on_failed(&mut self, err: E) {
    self.core.shut();
    self.core.relay.complete(Completion::Failed(err));
  }
}

impl<P, S> Publisher for Throttle<P, S>
where
  P: Publisher,
  S: Scheduler,
{
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<O: Subscriber<P::Item, P::Err>>(self, subscriber: O) {
    let core = Arc::new(ThrottleCore {
      relay: Relay::new(subscriber, Backpressure::Latest),
      upstream: SerialSubscription::default(),
      state: Mutex::new(Window { open: false, pending: None, generation: 0, timer: None }),
      duration: self.duration,
      scheduler: self.scheduler,
      latest: self.latest,
    });
    core.relay.start(core.clone());
    if core.relay.is_closed() {
      return;
    }
    self.source.actual_subscribe(ThrottleSubscriber { core });
  }
}
