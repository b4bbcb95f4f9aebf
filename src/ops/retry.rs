//! Retry operator
//!
//! `retry(n)` re-subscribes to a fresh clone of the source after each
//! failure, up to `n` times, and forwards the last failure once the budget is
//! spent. Nothing of the failed attempt carries over except the downstream
//! demand that was still outstanding.
//!
//! ```rust
//! use std::sync::{
//!   atomic::{AtomicUsize, Ordering},
//!   Arc, Mutex,
//! };
//!
//! use rxflow::prelude::*;
//!
//! let attempts = Arc::new(AtomicUsize::new(0));
//! let counter = attempts.clone();
//! let flaky = create(move |emitter: Emitter<i32, &str>| {
//!   if counter.fetch_add(1, Ordering::SeqCst) < 2 {
//!     emitter.error("unavailable");
//!   } else {
//!     emitter.next(1);
//!     emitter.complete();
//!   }
//! });
//!
//! let seen = Arc::new(Mutex::new(vec![]));
//! let c = seen.clone();
//! flaky.retry(3).sink(move |v| c.lock().unwrap().push(v));
//! assert_eq!(*seen.lock().unwrap(), vec![1]);
//! assert_eq!(attempts.load(Ordering::SeqCst), 3);
//! ```

use std::sync::{Arc, Mutex};

use crate::{
  demand::Demand,
  publisher::Publisher,
  relay::{Backpressure, Relay},
  subscriber::{Completion, Subscriber},
  subscription::{SerialSubscription, Subscription, SubscriptionRef},
};

/// Publisher returned by [`retry`](crate::ops::PublisherExt::retry).
#[derive(Clone)]
pub struct Retry<P> {
  pub(crate) source: P,
  pub(crate) count: usize,
}

struct RetryCore<P: Publisher> {
  relay: Relay<P::Item, P::Err>,
  upstream: SerialSubscription,
  budget: Mutex<Budget<P>>,
}

struct Budget<P> {
  source: P,
  remaining: usize,
}

impl<P: Publisher> Subscription for RetryCore<P> {
  fn request(&self, demand: Demand) {
    self.relay.request(demand);
    self.upstream.request(demand);
  }

  fn cancel(&self) {
    self.relay.cancel();
    self.upstream.cancel();
  }
}

struct RetrySubscriber<P: Publisher> {
  core: Arc<RetryCore<P>>,
}

impl<P: Publisher + Clone> Subscriber<P::Item, P::Err> for RetrySubscriber<P> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let outstanding = self.core.relay.unfulfilled();
    self.core.upstream.replace(subscription, outstanding);
  }

  fn on_value(&mut self, value: P::Item) -> Demand {
    self.core.relay.push(value);
    Demand::none()
  }

  fn on_completed(&mut self) { self.core.relay.complete(Completion::Completed) }

  fn on_failed(&mut self, err: P::Err) {
    self.core.upstream.clear();
    if self.core.relay.is_closed() {
      return;
    }
    let next = {
      let mut budget = self.core.budget.lock().unwrap();
      if budget.remaining > 0 {
        budget.remaining -= 1;
        Some((budget.source.clone(), budget.remaining))
      } else {
        None
      }
    };
    match next {
      Some((source, remaining)) => {
        tracing::debug!(remaining, "upstream failed, subscribing again");
        source.actual_subscribe(RetrySubscriber { core: self.core.clone() });
      }
      None => self.core.relay.complete(Completion::Failed(err)),
    }
  }
}

impl<P: Publisher + Clone> Publisher for Retry<P> {
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<P::Item, P::Err>>(self, subscriber: S) {
    let core = Arc::new(RetryCore {
      relay: Relay::new(subscriber, Backpressure::Buffer),
      upstream: SerialSubscription::default(),
      budget: Mutex::new(Budget { source: self.source.clone(), remaining: self.count }),
    });
    core.relay.start(core.clone());
    if core.relay.is_closed() {
      return;
    }
    self.source.actual_subscribe(RetrySubscriber { core });
  }
}
