use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex,
};

use crate::{
  demand::Demand,
  pipeline,
  publisher::Publisher,
  subject::PassthroughSubject,
  subscriber::Subscriber,
  subscription::{CancellationToken, Subscription, SubscriptionRef},
};

/// Publisher returned by [`share`](crate::ops::PublisherExt::share).
///
/// All clones feed from one upstream subscription, made when the first
/// subscriber arrives. Subscribers joining later only see what is sent after
/// they joined, and after the upstream terminated they only receive the
/// terminal event. Each subscriber drops values it has no demand for.
///
/// When the last subscriber cancels, the upstream is cancelled too and the
/// next subscriber connects afresh.
pub struct Share<P: Publisher> {
  inner: Arc<ShareInner<P>>,
}

struct ShareInner<P: Publisher> {
  source: Mutex<P>,
  connection: Mutex<Connection<P::Item, P::Err>>,
}

struct Connection<T, E> {
  subject: PassthroughSubject<T, E>,
  subscribers: usize,
  connected: bool,
  /// Bumped on every disconnect; a connect that finishes late for an older
  /// generation cancels itself.
  generation: u64,
  upstream: Option<CancellationToken>,
}

impl<P: Publisher> Clone for Share<P> {
  fn clone(&self) -> Self { Share { inner: self.inner.clone() } }
}

impl<P> Share<P>
where
  P: Publisher + Clone,
  P::Item: Clone,
  P::Err: Clone,
{
  pub(crate) fn new(source: P) -> Self {
    Share {
      inner: Arc::new(ShareInner {
        source: Mutex::new(source),
        connection: Mutex::new(Connection {
          subject: PassthroughSubject::new(),
          subscribers: 0,
          connected: false,
          generation: 0,
          upstream: None,
        }),
      }),
    }
  }
}

impl<P> ShareInner<P>
where
  P: Publisher + Clone,
  P::Item: Clone,
  P::Err: Clone,
{
  fn release(&self) {
    let upstream = {
      let mut connection = self.connection.lock().unwrap();
      connection.subscribers -= 1;
      if connection.subscribers > 0 || !connection.connected {
        return;
      }
      connection.connected = false;
      connection.generation += 1;
      connection.subject = PassthroughSubject::new();
      connection.upstream.take()
    };
    tracing::trace!("last subscriber left, disconnecting the shared upstream");
    if let Some(upstream) = upstream {
      upstream.cancel();
    }
  }
}

impl<P> Publisher for Share<P>
where
  P: Publisher + Clone,
  P::Item: Clone,
  P::Err: Clone,
{
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<P::Item, P::Err>>(self, subscriber: S) {
    let (subject, connect) = {
      let mut connection = self.inner.connection.lock().unwrap();
      connection.subscribers += 1;
      let connect = (!connection.connected).then_some(connection.generation);
      connection.connected = true;
      (connection.subject.clone(), connect)
    };
    subject
      .clone()
      .actual_subscribe(ShareSubscriber { downstream: subscriber, share: self.inner.clone() });

    if let Some(generation) = connect {
      tracing::trace!("first subscriber arrived, connecting the shared upstream");
      let source = self.inner.source.lock().unwrap().clone();
      let upstream = pipeline::subscribe(source, subject);
      let stale = {
        let mut connection = self.inner.connection.lock().unwrap();
        if connection.generation == generation {
          connection.upstream = Some(upstream);
          None
        } else {
          Some(upstream)
        }
      };
      if let Some(stale) = stale {
        stale.cancel();
      }
    }
  }
}

/// Counts one subscriber of the share until it cancels.
struct ShareSubscriber<S, P: Publisher> {
  downstream: S,
  share: Arc<ShareInner<P>>,
}

impl<S, P> Subscriber<P::Item, P::Err> for ShareSubscriber<S, P>
where
  S: Subscriber<P::Item, P::Err>,
  P: Publisher + Clone,
  P::Item: Clone,
  P::Err: Clone,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.downstream.on_subscribe(Arc::new(ShareSubscription {
      inner: subscription,
      share: self.share.clone(),
      released: AtomicBool::new(false),
    }));
  }

  #[inline]
  fn on_value(&mut self, value: P::Item) -> Demand { self.downstream.on_value(value) }

  fn on_completed(&mut self) { self.downstream.on_completed() }

  fn on_failed(&mut self, err: P::Err) { self.downstream.on_failed(err) }
}

struct ShareSubscription<P: Publisher> {
  inner: SubscriptionRef,
  share: Arc<ShareInner<P>>,
  released: AtomicBool,
}

impl<P> Subscription for ShareSubscription<P>
where
  P: Publisher + Clone,
  P::Item: Clone,
  P::Err: Clone,
{
  fn request(&self, demand: Demand) { self.inner.request(demand) }

  fn cancel(&self) {
    self.inner.cancel();
    if !self.released.swap(true, Ordering::SeqCst) {
      self.share.release();
    }
  }
}
