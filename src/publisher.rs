//! Publisher trait and the built-in sources
//!
//! A Publisher produces a sequence of values followed by at most one terminal
//! event, under the demand its subscriber grants. Publishers are plain values:
//! `actual_subscribe` consumes the publisher, so re-subscribing means cloning
//! it first. Cold sources restart from scratch for every subscription.
//!
//! Operators live on [`PublisherExt`](crate::ops::PublisherExt), which every
//! publisher implements.

use crate::subscriber::Subscriber;

pub mod any;
pub mod create;
pub mod defer;
pub mod from_iter;
pub mod future;
pub mod timer;
pub mod trivial;

pub use any::AnyPublisher;

/// The source side of a chain.
///
/// # Contract
///
/// - `on_subscribe` is called exactly once, before anything else.
/// - No value is delivered before the subscriber requested demand, and never
///   more values than the demand it granted.
/// - Nothing is delivered from inside the subscriber's own `on_subscribe`;
///   demand requested there is served right after it returns.
/// - At most one terminal event, after which nothing follows. Failures do not
///   need demand.
pub trait Publisher: Send + 'static {
  type Item: Send + 'static;
  type Err: Send + 'static;

  /// Attach `subscriber`. Prefer [`PublisherExt::subscribe`], which also
  /// returns a cancellation token.
  ///
  /// [`PublisherExt::subscribe`]: crate::ops::PublisherExt::subscribe
  fn actual_subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Self::Item, Self::Err>;
}
