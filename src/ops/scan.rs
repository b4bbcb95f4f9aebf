use crate::{
  demand::Demand, publisher::Publisher, subscriber::Subscriber, subscription::SubscriptionRef,
};

/// Publisher returned by [`scan`](crate::ops::PublisherExt::scan).
#[derive(Clone)]
pub struct Scan<P, F, B> {
  pub(crate) source: P,
  pub(crate) initial: B,
  pub(crate) func: F,
}

impl<P, F, B> Publisher for Scan<P, F, B>
where
  P: Publisher,
  F: FnMut(B, P::Item) -> B + Send + 'static,
  B: Clone + Send + 'static,
{
  type Item = B;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<B, P::Err>>(self, subscriber: S) {
    self.source.actual_subscribe(ScanSubscriber {
      downstream: subscriber,
      func: self.func,
      acc: self.initial,
    })
  }
}

pub struct ScanSubscriber<S, F, B> {
  downstream: S,
  func: F,
  acc: B,
}

impl<S, F, B, Item, Err> Subscriber<Item, Err> for ScanSubscriber<S, F, B>
where
  S: Subscriber<B, Err>,
  F: FnMut(B, Item) -> B + Send + 'static,
  B: Clone + Send + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.downstream.on_subscribe(subscription) }

  fn on_value(&mut self, value: Item) -> Demand {
    self.acc = (self.func)(self.acc.clone(), value);
    self.downstream.on_value(self.acc.clone())
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
  fn running_sum() {
    let recorder = Recorder::unlimited();
    from_iter(1..=4).scan(0, |acc, v| acc + v).subscribe(recorder.clone());
    assert_eq!(recorder.events(), vec![
      Event::Value(1),
      Event::Value(3),
      Event::Value(6),
      Event::Value(10),
      Event::Completed
    ]);
  }

  #[rxflow_macro::test]
  fn every_subscription_starts_from_the_seed() {
    let lengths = from_iter(["a", "bb"]).scan(String::new(), |mut acc, v| {
      acc.push_str(v);
      acc
    });
    let recorder = Recorder::unlimited();
    lengths.clone().subscribe(recorder.clone());
    lengths.subscribe(recorder.clone());
    assert_eq!(recorder.values(), vec!["a", "abb", "a", "abb"]);
  }
}
