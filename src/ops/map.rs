use crate::{
  demand::Demand, publisher::Publisher, subscriber::Subscriber, subscription::SubscriptionRef,
};

/// Publisher returned by [`map`](crate::ops::PublisherExt::map).
#[derive(Clone)]
pub struct Map<P, F> {
  pub(crate) source: P,
  pub(crate) func: F,
}

impl<P, F, B> Publisher for Map<P, F>
where
  P: Publisher,
  F: FnMut(P::Item) -> B + Send + 'static,
  B: Send + 'static,
{
  type Item = B;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<B, P::Err>>(self, subscriber: S) {
    self
      .source
      .actual_subscribe(MapSubscriber { downstream: subscriber, func: self.func })
  }
}

pub struct MapSubscriber<S, F> {
  downstream: S,
  func: F,
}

impl<S, F, A, B, E> Subscriber<A, E> for MapSubscriber<S, F>
where
  S: Subscriber<B, E>,
  F: FnMut(A) -> B + Send + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.downstream.on_subscribe(subscription) }

  #[inline]
  fn on_value(&mut self, value: A) -> Demand { self.downstream.on_value((self.func)(value)) }

  #[inline]
  fn on_completed(&mut self) { self.downstream.on_completed() }

  #[inline]
  fn on_failed(&mut self, err: E) { self.downstream.on_failed(err) }
}
