//! Async adapters
//!
//! [`PublisherStream`] turns a publisher into a `futures::Stream` of
//! `Result<T, E>`, and [`FirstValue`] into a `Future` of its first value.
//! Both subscribe as soon as they are created and drive demand from the async
//! side: the stream requests one value per poll that finds its buffer empty.
//!
//! ```rust
//! use futures::{executor::block_on, StreamExt};
//! use rxflow::prelude::*;
//!
//! let values: Vec<_> = block_on(from_iter(1..=3).map(|v| v * 10).into_stream().collect());
//! assert_eq!(values, vec![Ok(10), Ok(20), Ok(30)]);
//!
//! assert_eq!(block_on(from_iter(7..).first_value()), Ok(7));
//! ```

use std::{
  collections::VecDeque,
  future::Future,
  pin::Pin,
  sync::{Arc, Mutex},
  task::{Context, Poll, Waker},
};

use futures::Stream;

use crate::{
  demand::Demand,
  error::StreamError,
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::SubscriptionRef,
};

struct StreamState<T, E> {
  queue: VecDeque<Result<T, E>>,
  waker: Option<Waker>,
  subscription: Option<SubscriptionRef>,
  /// One value was requested and has not arrived yet.
  requested: bool,
  closed: bool,
}

/// A `Stream` over the events of a publisher.
///
/// Yields `Ok(value)` for every value, `Err(err)` once if the publisher fails,
/// and ends after the terminal event. Dropping the stream cancels the
/// subscription.
pub struct PublisherStream<T, E> {
  state: Arc<Mutex<StreamState<T, E>>>,
}

impl<T, E> PublisherStream<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  pub(crate) fn new<P>(publisher: P) -> Self
  where
    P: Publisher<Item = T, Err = E>,
  {
    let state = Arc::new(Mutex::new(StreamState {
      queue: VecDeque::new(),
      waker: None,
      subscription: None,
      requested: false,
      closed: false,
    }));
    publisher.actual_subscribe(StreamSubscriber { state: state.clone() });
    PublisherStream { state }
  }

  fn ready(&self) -> Option<Option<Result<T, E>>> {
    let mut state = self.state.lock().unwrap();
    match state.queue.pop_front() {
      Some(item) => Some(Some(item)),
      None if state.closed => Some(None),
      None => None,
    }
  }
}

impl<T, E> Stream for PublisherStream<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  type Item = Result<T, E>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    if let Some(item) = self.ready() {
      return Poll::Ready(item);
    }
    let request = {
      let mut state = self.state.lock().unwrap();
      state.waker = Some(cx.waker().clone());
      if state.requested {
        None
      } else {
        state.requested = true;
        state.subscription.clone()
      }
    };
    if let Some(subscription) = request {
      subscription.request(Demand::max(1));
      // synchronous publishers answer inside `request`
      if let Some(item) = self.ready() {
        return Poll::Ready(item);
      }
    }
    Poll::Pending
  }
}

impl<T, E> Drop for PublisherStream<T, E> {
  fn drop(&mut self) {
    let subscription = self.state.lock().unwrap().subscription.take();
    if let Some(subscription) = subscription {
      subscription.cancel();
    }
  }
}

struct StreamSubscriber<T, E> {
  state: Arc<Mutex<StreamState<T, E>>>,
}

impl<T, E> StreamSubscriber<T, E> {
  fn push(&self, item: Option<Result<T, E>>) {
    let waker = {
      let mut state = self.state.lock().unwrap();
      match item {
        Some(item) => {
          state.requested = false;
          state.queue.push_back(item);
        }
        None => state.closed = true,
      }
      state.waker.take()
    };
    if let Some(waker) = waker {
      waker.wake();
    }
  }
}

impl<T, E> Subscriber<T, E> for StreamSubscriber<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let polled_early = {
      let mut state = self.state.lock().unwrap();
      state.subscription = Some(subscription.clone());
      state.requested
    };
    if polled_early {
      subscription.request(Demand::max(1));
    }
  }

  fn on_value(&mut self, value: T) -> Demand {
    self.push(Some(Ok(value)));
    Demand::none()
  }

  fn on_completed(&mut self) { self.push(None) }

  fn on_failed(&mut self, err: E) {
    self.push(Some(Err(err)));
    self.push(None);
  }
}

struct FirstState<T, E> {
  outcome: Option<Result<T, StreamError<E>>>,
  waker: Option<Waker>,
  subscription: Option<SubscriptionRef>,
}

/// A `Future` resolving to the first value of a publisher.
///
/// Resolves to [`StreamError::Empty`] when the publisher completes without a
/// value and to [`StreamError::Failed`] when it fails first. The subscription
/// is cancelled once the value arrived, or when the future is dropped.
pub struct FirstValue<T, E> {
  state: Arc<Mutex<FirstState<T, E>>>,
}

impl<T, E> FirstValue<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  pub(crate) fn new<P>(publisher: P) -> Self
  where
    P: Publisher<Item = T, Err = E>,
  {
    let state = Arc::new(Mutex::new(FirstState { outcome: None, waker: None, subscription: None }));
    publisher.actual_subscribe(FirstSubscriber { state: state.clone() });
    FirstValue { state }
  }
}

impl<T, E> Future for FirstValue<T, E> {
  type Output = Result<T, StreamError<E>>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut state = self.state.lock().unwrap();
    match state.outcome.take() {
      Some(outcome) => Poll::Ready(outcome),
      None => {
        state.waker = Some(cx.waker().clone());
        Poll::Pending
      }
    }
  }
}

impl<T, E> Drop for FirstValue<T, E> {
  fn drop(&mut self) {
    let subscription = self.state.lock().unwrap().subscription.take();
    if let Some(subscription) = subscription {
      subscription.cancel();
    }
  }
}

struct FirstSubscriber<T, E> {
  state: Arc<Mutex<FirstState<T, E>>>,
}

impl<T, E> FirstSubscriber<T, E> {
  fn settle(&self, outcome: Result<T, StreamError<E>>) {
    let (waker, subscription) = {
      let mut state = self.state.lock().unwrap();
      if state.outcome.is_some() || state.subscription.is_none() {
        return;
      }
      state.outcome = Some(outcome);
      (state.waker.take(), state.subscription.take())
    };
    if let Some(subscription) = subscription {
      subscription.cancel();
    }
    if let Some(waker) = waker {
      waker.wake();
    }
  }
}

impl<T, E> Subscriber<T, E> for FirstSubscriber<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.state.lock().unwrap().subscription = Some(subscription.clone());
    subscription.request(Demand::max(1));
  }

  fn on_value(&mut self, value: T) -> Demand {
    self.settle(Ok(value));
    Demand::none()
  }

  fn on_completed(&mut self) { self.settle(Err(StreamError::Empty)) }

  fn on_failed(&mut self, err: E) { self.settle(Err(StreamError::Failed(err))) }
}
