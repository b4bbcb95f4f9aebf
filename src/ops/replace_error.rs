use std::{convert::Infallible, sync::Arc};

use crate::{
  demand::Demand,
  publisher::Publisher,
  relay::{Backpressure, Relay},
  subscriber::{Completion, Subscriber},
  subscription::{SerialSubscription, Subscription, SubscriptionRef},
};

/// Publisher returned by [`replace_error`](crate::ops::PublisherExt::replace_error).
#[derive(Clone)]
pub struct ReplaceError<P, T> {
  pub(crate) source: P,
  pub(crate) value: T,
}

struct ReplaceCore<T> {
  relay: Relay<T, Infallible>,
  upstream: SerialSubscription,
}

impl<T: Send + 'static> Subscription for ReplaceCore<T> {
  fn request(&self, demand: Demand) {
    self.relay.request(demand);
    self.upstream.request(demand);
  }

  fn cancel(&self) {
    self.relay.cancel();
    self.upstream.cancel();
  }
}

struct ReplaceSubscriber<T> {
  core: Arc<ReplaceCore<T>>,
  value: Option<T>,
}

impl<T, E> Subscriber<T, E> for ReplaceSubscriber<T>
where
  T: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let outstanding = self.core.relay.unfulfilled();
    self.core.upstream.replace(subscription, outstanding);
  }

  fn on_value(&mut self, value: T) -> Demand {
    self.core.relay.push(value);
    Demand::none()
  }

  fn on_completed(&mut self) { self.core.relay.complete(Completion::Completed) }

  fn on_failed(&mut self, _err: E) {
    // the replacement still waits for demand like any other value
    if let Some(value) = self.value.take() {
      self.core.relay.enqueue(value);
    }
    self.core.relay.complete(Completion::Completed);
  }
}

impl<P> Publisher for ReplaceError<P, P::Item>
where
  P: Publisher,
{
  type Item = P::Item;
  type Err = Infallible;

  fn actual_subscribe<S: Subscriber<P::Item, Infallible>>(self, subscriber: S) {
    let core = Arc::new(ReplaceCore {
      relay: Relay::new(subscriber, Backpressure::Buffer),
      upstream: SerialSubscription::default(),
    });
    core.relay.start(core.clone());
    if core.relay.is_closed() {
      return;
    }
    self.source.actual_subscribe(ReplaceSubscriber { core, value: Some(self.value) });
  }
}
