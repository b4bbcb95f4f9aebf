use std::sync::{Arc, Mutex};

use crate::{
  demand::Demand,
  publisher::Publisher,
  relay::{Backpressure, Relay},
  subscriber::{Completion, Subscriber},
  subscription::{SerialSubscription, Subscription, SubscriptionRef},
};

/// Publisher returned by [`catch`](crate::ops::PublisherExt::catch).
///
/// The output fails only if the recovery publisher does, so recovering with a
/// publisher that cannot fail yields a chain whose error type is
/// [`Infallible`](std::convert::Infallible).
#[derive(Clone)]
pub struct Catch<P, F> {
  pub(crate) source: P,
  pub(crate) handler: F,
}

struct CatchCore<T, E, F> {
  relay: Relay<T, E>,
  upstream: SerialSubscription,
  handler: Mutex<Option<F>>,
}

impl<T, E, F> Subscription for CatchCore<T, E, F>
where
  T: Send + 'static,
  E: Send + 'static,
  F: Send,
{
  fn request(&self, demand: Demand) {
    self.relay.request(demand);
    self.upstream.request(demand);
  }

  fn cancel(&self) {
    self.relay.cancel();
    self.upstream.cancel();
    self.handler.lock().unwrap().take();
  }
}

impl<T, E, F> CatchCore<T, E, F>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn attach(&self, subscription: SubscriptionRef) {
    let outstanding = self.relay.unfulfilled();
    self.upstream.replace(subscription, outstanding);
  }
}

/// Subscribed to the source until it fails.
struct PrimarySubscriber<T, E, F> {
  core: Arc<CatchCore<T, E, F>>,
}

/// Subscribed to the recovery publisher.
struct RecoverySubscriber<T, E, F> {
  core: Arc<CatchCore<T, E, F>>,
}

impl<T, E, E2, F, R> Subscriber<T, E> for PrimarySubscriber<T, E2, F>
where
  T: Send + 'static,
  E2: Send + 'static,
  F: FnOnce(E) -> R + Send + 'static,
  R: Publisher<Item = T, Err = E2>,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.core.attach(subscription) }

  fn on_value(&mut self, value: T) -> Demand {
    self.core.relay.push(value);
    Demand::none()
  }

  fn on_completed(&mut self) { self.core.relay.complete(Completion::Completed) }

  fn on_failed(&mut self, err: E) {
    self.core.upstream.clear();
    let handler = self.core.handler.lock().unwrap().take();
    let Some(handler) = handler else {
      return;
    };
    if self.core.relay.is_closed() {
      return;
    }
    tracing::debug!("upstream failed, switching to the recovery publisher");
    handler(err).actual_subscribe(RecoverySubscriber { core: self.core.clone() });
  }
}

impl<T, E, F> Subscriber<T, E> for RecoverySubscriber<T, E, F>
where
  T: Send + 'static,
  E: Send + 'static,
  F: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.core.attach(subscription) }

  fn on_value(&mut self, value: T) -> Demand {
    self.core.relay.push(value);
    Demand::none()
  }

  fn on_completed(&mut self) { self.core.relay.complete(Completion::Completed) }

  fn on_failed(&mut self, err: E) { self.core.relay.complete(Completion::Failed(err)) }
}

impl<P, F, R> Publisher for Catch<P, F>
where
  P: Publisher,
  F: FnOnce(P::Err) -> R + Send + 'static,
  R: Publisher<Item = P::Item>,
{
  type Item = P::Item;
  type Err = R::Err;

  fn actual_subscribe<S: Subscriber<P::Item, R::Err>>(self, subscriber: S) {
    let core = Arc::new(CatchCore {
      relay: Relay::new(subscriber, Backpressure::Buffer),
      upstream: SerialSubscription::default(),
      handler: Mutex::new(Some(self.handler)),
    });
    core.relay.start(core.clone());
    if core.relay.is_closed() {
      return;
    }
    self.source.actual_subscribe(PrimarySubscriber { core });
  }
}
