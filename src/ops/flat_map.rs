use std::sync::{Arc, Mutex};

use crate::{
  demand::Demand,
  publisher::Publisher,
  relay::{Backpressure, Relay},
  subscriber::{Completion, Subscriber},
  subscription::{SerialSubscription, Subscription, SubscriptionRef, UpstreamSet},
};

/// Publisher returned by [`flat_map`](crate::ops::PublisherExt::flat_map) and
/// [`flat_map_max`](crate::ops::PublisherExt::flat_map_max).
#[derive(Clone)]
pub struct FlatMap<P, F> {
  pub(crate) source: P,
  pub(crate) func: F,
  pub(crate) max_publishers: Demand,
}

struct FlatMapCore<T, E> {
  relay: Relay<T, E>,
  outer: SerialSubscription,
  inners: UpstreamSet,
  state: Mutex<FlatMapState>,
  max_publishers: Demand,
}

#[derive(Default)]
struct FlatMapState {
  outer_done: bool,
  active: usize,
}

impl<T, E> FlatMapCore<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn fail(&self, err: E) {
    self.outer.cancel();
    self.inners.cancel_all();
    self.relay.complete(Completion::Failed(err));
  }
}

impl<T, E> Subscription for FlatMapCore<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn request(&self, demand: Demand) {
    self.relay.request(demand);
    self.inners.request_all(demand);
  }

  fn cancel(&self) {
    self.relay.cancel();
    self.outer.cancel();
    self.inners.cancel_all();
  }
}

struct OuterSubscriber<T, E, F> {
  core: Arc<FlatMapCore<T, E>>,
  func: F,
}

impl<A, T, E, F, P> Subscriber<A, E> for OuterSubscriber<T, E, F>
where
  T: Send + 'static,
  E: Send + 'static,
  F: FnMut(A) -> P + Send + 'static,
  P: Publisher<Item = T, Err = E>,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.core.outer.replace(subscription, self.core.max_publishers);
  }

  fn on_value(&mut self, value: A) -> Demand {
    if self.core.relay.is_closed() {
      return Demand::none();
    }
    let inner = (self.func)(value);
    self.core.state.lock().unwrap().active += 1;
    let id = self.core.inners.reserve();
    inner.actual_subscribe(InnerSubscriber { core: self.core.clone(), id });
    Demand::none()
  }

  fn on_completed(&mut self) {
    let finished = {
      let mut state = self.core.state.lock().unwrap();
      state.outer_done = true;
      state.active == 0
    };
    self.core.outer.clear();
    if finished {
      self.core.relay.complete(Completion::Completed);
    }
  }

  fn on_failed(&mut self, err: E) { self.core.fail(err) }
}

struct InnerSubscriber<T, E> {
  core: Arc<FlatMapCore<T, E>>,
  id: usize,
}

impl<T, E> Subscriber<T, E> for InnerSubscriber<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let initial = self.core.relay.unfulfilled();
    self.core.inners.attach(self.id, subscription, initial);
  }

  fn on_value(&mut self, value: T) -> Demand {
    self.core.relay.push(value);
    Demand::none()
  }

  fn on_completed(&mut self) {
    self.core.inners.remove(self.id);
    let finished = {
      let mut state = self.core.state.lock().unwrap();
      state.active -= 1;
      state.active == 0 && state.outer_done
    };
    if finished {
      self.core.relay.complete(Completion::Completed);
    } else if !self.core.max_publishers.is_unlimited() {
      // a slot became free
      self.core.outer.request(Demand::max(1));
    }
  }

  fn on_failed(&mut self, err: E) { self.core.fail(err) }
}

impl<P, F, Q> Publisher for FlatMap<P, F>
where
  P: Publisher,
  F: FnMut(P::Item) -> Q + Send + 'static,
  Q: Publisher<Err = P::Err>,
{
  type Item = Q::Item;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<Q::Item, P::Err>>(self, subscriber: S) {
    let core = Arc::new(FlatMapCore {
      relay: Relay::new(subscriber, Backpressure::Buffer),
      outer: SerialSubscription::default(),
      inners: UpstreamSet::default(),
      state: Mutex::new(FlatMapState::default()),
      max_publishers: self.max_publishers,
    });
    core.relay.start(core.clone());
    if core.relay.is_closed() {
      return;
    }
    self.source.actual_subscribe(OuterSubscriber { core, func: self.func });
  }
}
