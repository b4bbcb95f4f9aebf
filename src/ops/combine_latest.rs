use std::{
  marker::PhantomData,
  sync::{Arc, Mutex},
};

use crate::{
  demand::Demand,
  publisher::Publisher,
  relay::{Backpressure, Relay},
  subscriber::{Completion, Subscriber},
  subscription::{Subscription, SubscriptionRef, UpstreamSet},
};

/// Publisher returned by [`combine_latest`](crate::ops::PublisherExt::combine_latest).
#[derive(Clone)]
pub struct CombineLatest<A, B> {
  pub(crate) a: A,
  pub(crate) b: B,
}

/// Publisher returned by
/// [`combine_latest_all`](crate::ops::PublisherExt::combine_latest_all).
#[derive(Clone)]
pub struct CombineLatestAll<P> {
  pub(crate) sources: Vec<P>,
}

/// Latest value of every source, and the combination once all are present.
trait Slots: Send + 'static {
  type Output: Send + 'static;

  fn snapshot(&self) -> Option<Self::Output>;
}

impl<A, B> Slots for (Option<A>, Option<B>)
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
{
  type Output = (A, B);

  fn snapshot(&self) -> Option<(A, B)> {
    match self {
      (Some(a), Some(b)) => Some((a.clone(), b.clone())),
      _ => None,
    }
  }
}

impl<T: Clone + Send + 'static> Slots for Vec<Option<T>> {
  type Output = Vec<T>;

  fn snapshot(&self) -> Option<Vec<T>> { self.iter().cloned().collect() }
}

struct CombineCore<L: Slots, E> {
  relay: Relay<L::Output, E>,
  upstreams: UpstreamSet,
  state: Mutex<CombineState<L>>,
}

struct CombineState<L> {
  slots: L,
  active: usize,
  emitted: bool,
}

impl<L: Slots, E: Send + 'static> CombineCore<L, E> {
  fn start(subscriber: impl Subscriber<L::Output, E>, slots: L, sources: usize) -> Option<Arc<Self>> {
    let core = Arc::new(CombineCore {
      relay: Relay::new(subscriber, Backpressure::Buffer),
      upstreams: UpstreamSet::default(),
      state: Mutex::new(CombineState { slots, active: sources, emitted: false }),
    });
    core.relay.start(core.clone());
    (!core.relay.is_closed()).then_some(core)
  }

  fn source<T, F>(self: &Arc<Self>, write: F) -> CombineSource<L, E, T, F>
  where
    F: FnMut(&mut L, T),
  {
    CombineSource { core: self.clone(), id: self.upstreams.reserve(), write, _marker: PhantomData }
  }
}

impl<L: Slots, E: Send + 'static> Subscription for CombineCore<L, E> {
  fn request(&self, demand: Demand) {
    self.relay.request(demand);
    self.upstreams.request_all(demand);
  }

  fn cancel(&self) {
    self.relay.cancel();
    self.upstreams.cancel_all();
  }
}

struct CombineSource<L: Slots, E, T, F> {
  core: Arc<CombineCore<L, E>>,
  id: usize,
  write: F,
  _marker: PhantomData<fn(T)>,
}

impl<L, E, T, F> Subscriber<T, E> for CombineSource<L, E, T, F>
where
  L: Slots,
  E: Send + 'static,
  T: Send + 'static,
  F: FnMut(&mut L, T) + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let initial = self.core.relay.unfulfilled();
    self.core.upstreams.attach(self.id, subscription, initial);
  }

  fn on_value(&mut self, value: T) -> Demand {
    let produced = {
      let mut state = self.core.state.lock().unwrap();
      (self.write)(&mut state.slots, value);
      match state.slots.snapshot() {
        Some(combined) => {
          state.emitted = true;
          self.core.relay.enqueue(combined);
          true
        }
        None => false,
      }
    };
    if produced {
      self.core.relay.drain();
      Demand::none()
    } else {
      // nothing reached downstream, keep this source flowing
      Demand::max(1)
    }
  }

  fn on_completed(&mut self) {
    self.core.upstreams.remove(self.id);
    let finished = {
      let mut state = self.core.state.lock().unwrap();
      state.active -= 1;
      state.active == 0 && state.emitted
    };
    if finished {
      self.core.relay.complete(Completion::Completed);
    }
  }

  fn on_failed(&mut self, err: E) {
    self.core.upstreams.cancel_others(self.id);
    self.core.relay.complete(Completion::Failed(err));
  }
}

impl<A, B> Publisher for CombineLatest<A, B>
where
  A: Publisher,
  B: Publisher<Err = A::Err>,
  A::Item: Clone,
  B::Item: Clone,
{
  type Item = (A::Item, B::Item);
  type Err = A::Err;

  fn actual_subscribe<S: Subscriber<Self::Item, A::Err>>(self, subscriber: S) {
    let slots: (Option<A::Item>, Option<B::Item>) = (None, None);
    let Some(core) = CombineCore::start(subscriber, slots, 2) else {
      return;
    };
    let first = core.source(|slots: &mut (Option<A::Item>, Option<B::Item>), v: A::Item| {
      slots.0 = Some(v)
    });
    let second = core.source(|slots: &mut (Option<A::Item>, Option<B::Item>), v: B::Item| {
      slots.1 = Some(v)
    });
    self.a.actual_subscribe(first);
    self.b.actual_subscribe(second);
  }
}

impl<P> Publisher for CombineLatestAll<P>
where
  P: Publisher,
  P::Item: Clone,
{
  type Item = Vec<P::Item>;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<Vec<P::Item>, P::Err>>(self, subscriber: S) {
    let count = self.sources.len();
    let slots: Vec<Option<P::Item>> = (0..count).map(|_| None).collect();
    let Some(core) = CombineCore::start(subscriber, slots, count) else {
      return;
    };
    let sources: Vec<_> = self
      .sources
      .into_iter()
      .enumerate()
      .map(|(i, p)| {
        let source = core.source(move |slots: &mut Vec<Option<P::Item>>, v: P::Item| slots[i] = Some(v));
        (p, source)
      })
      .collect();
    for (publisher, source) in sources {
      publisher.actual_subscribe(source);
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, subscriber::recorder::Recorder};

  #[rxflow_macro::test]
  fn waits_for_both_then_tracks_latest() {
    let numbers = PassthroughSubject::<i32, Infallible>::new();
    let letters = PassthroughSubject::<&str, Infallible>::new();
    let recorder = Recorder::unlimited();
    numbers.clone().combine_latest(letters.clone()).subscribe(recorder.clone());

    numbers.send(1);
    assert!(recorder.values().is_empty());
    letters.send("A");
    numbers.send(2);
    letters.send("B");
    assert_eq!(recorder.values(), vec![(1, "A"), (2, "A"), (2, "B")]);

    numbers.send_completion(Completion::Completed);
    assert!(!recorder.is_completed());
    letters.send_completion(Completion::Completed);
    assert!(recorder.is_completed());
  }

  #[rxflow_macro::test]
  fn silent_source_means_no_completion() {
    let recorder = Recorder::unlimited();
    from_iter([1, 2]).combine_latest(empty::<i32, Infallible>()).subscribe(recorder.clone());
    assert!(recorder.events().is_empty());
  }

  #[rxflow_macro::test]
  fn failure_is_fast() {
    let a = PassthroughSubject::<i32, &str>::new();
    let b = PassthroughSubject::<i32, &str>::new();
    let recorder = Recorder::unlimited();
    a.clone().combine_latest(b.clone()).subscribe(recorder.clone());
    b.send_completion(Completion::Failed("lost"));
    assert_eq!(recorder.events(), vec![Event::Failed("lost")]);
    assert_eq!(a.subscriber_count(), 0);
  }

  #[rxflow_macro::test]
  fn many_sources() {
    let recorder = Recorder::unlimited();
    from_iter(vec![1, 2])
      .combine_latest_all(vec![from_iter(vec![10]), from_iter(vec![20, 30])])
      .subscribe(recorder.clone());
    assert_eq!(recorder.events(), vec![
      Event::Value(vec![2, 10, 20]),
      Event::Value(vec![2, 10, 30]),
      Event::Completed
    ]);
  }
}
