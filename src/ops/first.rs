use crate::{
  demand::Demand, publisher::Publisher, subscriber::Subscriber, subscription::SubscriptionRef,
};

/// Publisher returned by [`first_where`](crate::ops::PublisherExt::first_where)
/// and [`first`](crate::ops::PublisherExt::first).
#[derive(Clone)]
pub struct FirstWhere<P, F> {
  pub(crate) source: P,
  pub(crate) predicate: F,
}

impl<P, F> Publisher for FirstWhere<P, F>
where
  P: Publisher,
  F: FnMut(&P::Item) -> bool + Send + 'static,
{
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<P::Item, P::Err>>(self, subscriber: S) {
    self.source.actual_subscribe(FirstWhereSubscriber {
      downstream: subscriber,
      predicate: self.predicate,
      upstream: None,
      done: false,
    })
  }
}

pub struct FirstWhereSubscriber<S, F> {
  downstream: S,
  predicate: F,
  upstream: Option<SubscriptionRef>,
  done: bool,
}

impl<S, F, Item, Err> Subscriber<Item, Err> for FirstWhereSubscriber<S, F>
where
  S: Subscriber<Item, Err>,
  F: FnMut(&Item) -> bool + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.upstream = Some(subscription.clone());
    self.downstream.on_subscribe(subscription);
  }

  fn on_value(&mut self, value: Item) -> Demand {
    if self.done {
      return Demand::none();
    }
    if !(self.predicate)(&value) {
      return Demand::max(1);
    }
    self.done = true;
    // cancel before delivering so upstream stops producing right away
    if let Some(upstream) = self.upstream.take() {
      upstream.cancel();
    }
    self.downstream.on_value(value);
    self.downstream.on_completed();
    Demand::none()
  }

  fn on_completed(&mut self) {
    if !self.done {
      self.done = true;
      self.upstream = None;
      self.downstream.on_completed();
    }
  }

  fn on_failed(&mut self, err: Err) {
    if !self.done {
      self.done = true;
      self.upstream = None;
      self.downstream.on_failed(err);
    }
  }
}
