use std::sync::{Arc, Mutex};

use crate::{
  demand::Demand,
  publisher::Publisher,
  relay::{Backpressure, Relay},
  subscriber::{Completion, Subscriber},
  subscription::{Subscription, SubscriptionRef, UpstreamSet},
};

/// Publisher returned by [`merge`](crate::ops::PublisherExt::merge).
#[derive(Clone)]
pub struct Merge<A, B> {
  pub(crate) a: A,
  pub(crate) b: B,
}

/// Publisher returned by [`merge_all`](crate::ops::PublisherExt::merge_all).
#[derive(Clone)]
pub struct MergeAll<P> {
  pub(crate) sources: Vec<P>,
}

/// Shared state of one merge subscription.
///
/// Values from every source are pushed into one relay, which serializes them
/// towards the downstream subscriber and buffers what it cannot take yet.
struct MergeCore<T, E> {
  relay: Relay<T, E>,
  upstreams: UpstreamSet,
  active: Mutex<usize>,
}

impl<T, E> MergeCore<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  /// Start the downstream side. Returns `None` if it cancelled during
  /// `on_subscribe`, in which case no source needs to be subscribed.
  fn start(subscriber: impl Subscriber<T, E>, sources: usize) -> Option<Arc<Self>> {
    let core = Arc::new(MergeCore {
      relay: Relay::new(subscriber, Backpressure::Buffer),
      upstreams: UpstreamSet::default(),
      active: Mutex::new(sources),
    });
    core.relay.start(core.clone());
    if sources == 0 {
      core.relay.complete(Completion::Completed);
    }
    (!core.relay.is_closed()).then_some(core)
  }

  fn source(self: &Arc<Self>) -> MergeSource<T, E> {
    MergeSource { core: self.clone(), id: self.upstreams.reserve() }
  }
}

impl<T, E> Subscription for MergeCore<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn request(&self, demand: Demand) {
    self.relay.request(demand);
    self.upstreams.request_all(demand);
  }

  fn cancel(&self) {
    self.relay.cancel();
    self.upstreams.cancel_all();
  }
}

struct MergeSource<T, E> {
  core: Arc<MergeCore<T, E>>,
  id: usize,
}

impl<T, E> Subscriber<T, E> for MergeSource<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let initial = self.core.relay.unfulfilled();
    self.core.upstreams.attach(self.id, subscription, initial);
  }

  fn on_value(&mut self, value: T) -> Demand {
    self.core.relay.push(value);
    Demand::none()
  }

  fn on_completed(&mut self) {
    self.core.upstreams.remove(self.id);
    let last = {
      let mut active = self.core.active.lock().unwrap();
      *active -= 1;
      *active == 0
    };
    if last {
      self.core.relay.complete(Completion::Completed);
    }
  }

  fn on_failed(&mut self, err: E) {
    self.core.upstreams.cancel_others(self.id);
    self.core.relay.complete(Completion::Failed(err));
  }
}

impl<A, B> Publisher for Merge<A, B>
where
  A: Publisher,
  B: Publisher<Item = A::Item, Err = A::Err>,
{
  type Item = A::Item;
  type Err = A::Err;

  fn actual_subscribe<S: Subscriber<A::Item, A::Err>>(self, subscriber: S) {
    let Some(core) = MergeCore::start(subscriber, 2) else {
      return;
    };
    // reserve both slots first so a synchronous failure of `a` also reaches `b`
    let (first, second) = (core.source(), core.source());
    self.a.actual_subscribe(first);
    self.b.actual_subscribe(second);
  }
}

impl<P: Publisher> Publisher for MergeAll<P> {
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<P::Item, P::Err>>(self, subscriber: S) {
    let Some(core) = MergeCore::start(subscriber, self.sources.len()) else {
      return;
    };
    let sources: Vec<_> = self.sources.into_iter().map(|p| (p, core.source())).collect();
    for (publisher, source) in sources {
      publisher.actual_subscribe(source);
    }
  }
}
