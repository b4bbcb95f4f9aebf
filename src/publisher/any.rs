//! Type erasure for publishers.

use std::fmt;

use super::Publisher;
use crate::subscriber::{BoxedSubscriber, Subscriber};

/// Object-safe publisher, used behind [`AnyPublisher`].
trait DynPublisher<T, E>: Send {
  fn clone_box(&self) -> Box<dyn DynPublisher<T, E>>;

  fn subscribe_box(self: Box<Self>, subscriber: BoxedSubscriber<T, E>);
}

impl<P> DynPublisher<P::Item, P::Err> for P
where
  P: Publisher + Clone,
{
  fn clone_box(&self) -> Box<dyn DynPublisher<P::Item, P::Err>> { Box::new(self.clone()) }

  fn subscribe_box(self: Box<Self>, subscriber: BoxedSubscriber<P::Item, P::Err>) {
    (*self).actual_subscribe(subscriber)
  }
}

/// A publisher whose concrete chain type is hidden.
///
/// Created with [`PublisherExt::erase`](crate::ops::PublisherExt::erase).
/// It stays `Clone`, so it can still be retried or subscribed many times.
pub struct AnyPublisher<T, E>(Box<dyn DynPublisher<T, E>>);

impl<T, E> AnyPublisher<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  pub fn new<P>(publisher: P) -> Self
  where
    P: Publisher<Item = T, Err = E> + Clone,
  {
    AnyPublisher(Box::new(publisher))
  }
}

impl<T, E> Clone for AnyPublisher<T, E> {
  fn clone(&self) -> Self { AnyPublisher(self.0.clone_box()) }
}

impl<T, E> fmt::Debug for AnyPublisher<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("AnyPublisher") }
}

impl<T, E> Publisher for AnyPublisher<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  type Item = T;
  type Err = E;

  fn actual_subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<T, E>,
  {
    self.0.subscribe_box(Box::new(subscriber))
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, subscriber::recorder::Recorder};

  #[rxflow_macro::test]
  fn erased_chains_are_interchangeable() {
    let chains: Vec<AnyPublisher<i32, Infallible>> =
      vec![from_iter(vec![1, 2]).erase(), just(5).map(|v| v * 10).erase(), empty().erase()];

    let recorder = Recorder::unlimited();
    for chain in chains {
      chain.subscribe(recorder.clone());
    }
    assert_eq!(recorder.values(), vec![1, 2, 50]);
  }

  #[rxflow_macro::test]
  fn clones_subscribe_independently() {
    let erased = from_iter(1..=3).erase();
    let a = Recorder::unlimited();
    let b = Recorder::unlimited();
    erased.clone().subscribe(a.clone());
    erased.subscribe(b.clone());
    assert_eq!(a.values(), vec![1, 2, 3]);
    assert_eq!(b.values(), vec![1, 2, 3]);
  }
}
