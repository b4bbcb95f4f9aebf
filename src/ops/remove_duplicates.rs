use crate::{
  demand::Demand, publisher::Publisher, subscriber::Subscriber, subscription::SubscriptionRef,
};

/// Publisher returned by
/// [`remove_duplicates`](crate::ops::PublisherExt::remove_duplicates).
#[derive(Clone)]
pub struct RemoveDuplicates<P, F> {
  pub(crate) source: P,
  pub(crate) eq: F,
}

impl<P, F> Publisher for RemoveDuplicates<P, F>
where
  P: Publisher,
  P::Item: Clone,
  F: FnMut(&P::Item, &P::Item) -> bool + Send + 'static,
{
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<P::Item, P::Err>>(self, subscriber: S) {
    self.source.actual_subscribe(RemoveDuplicatesSubscriber {
      downstream: subscriber,
      eq: self.eq,
      last: None,
    })
  }
}

pub struct RemoveDuplicatesSubscriber<S, F, Item> {
  downstream: S,
  eq: F,
  last: Option<Item>,
}

impl<S, F, Item, Err> Subscriber<Item, Err> for RemoveDuplicatesSubscriber<S, F, Item>
where
  S: Subscriber<Item, Err>,
  F: FnMut(&Item, &Item) -> bool + Send + 'static,
  Item: Clone + Send + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.downstream.on_subscribe(subscription) }

  fn on_value(&mut self, value: Item) -> Demand {
    if let Some(last) = &self.last {
      if (self.eq)(last, &value) {
        return Demand::max(1);
      }
    }
    self.last = Some(value.clone());
    self.downstream.on_value(value)
  }

  #[inline]
  fn on_completed(&mut self) { self.downstream.on_completed() }

  #[inline]
  fn on_failed(&mut self, err: Err) { self.downstream.on_failed(err) }
}
