use crate::{
  demand::Demand, publisher::Publisher, subscriber::Subscriber, subscription::SubscriptionRef,
};

/// Publisher returned by [`prefix`](crate::ops::PublisherExt::prefix).
#[derive(Clone)]
pub struct Prefix<P> {
  pub(crate) source: P,
  pub(crate) count: usize,
}

impl<P: Publisher> Publisher for Prefix<P> {
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<P::Item, P::Err>>(self, subscriber: S) {
    self.source.actual_subscribe(PrefixSubscriber {
      downstream: subscriber,
      remaining: self.count,
      upstream: None,
      done: false,
    })
  }
}

pub struct PrefixSubscriber<S> {
  downstream: S,
  remaining: usize,
  upstream: Option<SubscriptionRef>,
  done: bool,
}

impl<S> PrefixSubscriber<S> {
  fn finish<Item, Err>(&mut self)
  where
    S: Subscriber<Item, Err>,
  {
    self.done = true;
    if let Some(upstream) = self.upstream.take() {
      upstream.cancel();
    }
    self.downstream.on_completed();
  }
}

impl<S, Item, Err> Subscriber<Item, Err> for PrefixSubscriber<S>
where
  S: Subscriber<Item, Err>,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.upstream = Some(subscription.clone());
    self.downstream.on_subscribe(subscription);
    if self.remaining == 0 && !self.done {
      self.finish::<Item, Err>();
    }
  }

  fn on_value(&mut self, value: Item) -> Demand {
    if self.done {
      return Demand::none();
    }
    self.remaining -= 1;
    if self.remaining > 0 {
      return self.downstream.on_value(value);
    }
    self.done = true;
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
