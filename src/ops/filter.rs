use crate::{
  demand::Demand, publisher::Publisher, subscriber::Subscriber, subscription::SubscriptionRef,
};

/// Publisher returned by [`filter`](crate::ops::PublisherExt::filter).
#[derive(Clone)]
pub struct Filter<P, F> {
  pub(crate) source: P,
  pub(crate) predicate: F,
}

impl<P, F> Publisher for Filter<P, F>
where
  P: Publisher,
  F: FnMut(&P::Item) -> bool + Send + 'static,
{
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<P::Item, P::Err>>(self, subscriber: S) {
    self
      .source
      .actual_subscribe(FilterSubscriber { downstream: subscriber, predicate: self.predicate })
  }
}

pub struct FilterSubscriber<S, F> {
  downstream: S,
  predicate: F,
}

impl<S, F, Item, Err> Subscriber<Item, Err> for FilterSubscriber<S, F>
where
  S: Subscriber<Item, Err>,
  F: FnMut(&Item) -> bool + Send + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.downstream.on_subscribe(subscription) }

  fn on_value(&mut self, value: Item) -> Demand {
    if (self.predicate)(&value) {
      self.downstream.on_value(value)
    } else {
      // the dropped value consumed one unit of demand; ask for a replacement
      Demand::max(1)
    }
  }

  #[inline]
  fn on_completed(&mut self) { self.downstream.on_completed() }

  #[inline]
  fn on_failed(&mut self, err: Err) { self.downstream.on_failed(err) }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, subscriber::recorder::Recorder};

  #[rxflow_macro::test]
  fn fork_and_shared() {
    let evens = from_iter(0..10).filter(|v| v % 2 == 0);
    let recorder = Recorder::unlimited();
    evens.clone().subscribe(recorder.clone());
    evens.subscribe(recorder.clone());
    assert_eq!(recorder.values().len(), 10);
  }

  #[rxflow_macro::test]
  fn bounded_demand_counts_only_forwarded_values() {
    let recorder = Recorder::with_demand(Demand::max(3));
    from_iter(0..).filter(|v| v % 5 == 0).subscribe(recorder.clone());
    assert_eq!(recorder.values(), vec![0, 5, 10]);
    assert!(!recorder.is_completed());
  }

  #[rxflow_macro::test]
  fn failure_passes_through() {
    let recorder = Recorder::<i32, &str>::unlimited();
    fail("bad").filter(|_: &i32| true).subscribe(recorder.clone());
    assert_eq!(recorder.failure(), Some("bad"));
  }
}
