//! Subscription: the live link between one publisher and one subscriber.
//!
//! A subscription is handed to the subscriber in `on_subscribe` as a shared
//! [`SubscriptionRef`]. The subscriber uses it to signal demand upstream and to
//! cancel. Both calls may arrive from any thread and at any time, including
//! re-entrantly from inside a delivery callback.

use std::sync::Arc;

use crate::demand::Demand;

mod dynamic;
mod serial;
mod token;

pub use dynamic::UpstreamSet;
pub use serial::SerialSubscription;
pub use token::{CancellationGuard, CancellationToken};

/// Control handle of a running subscription.
///
/// Implementations must be idempotent: requesting after termination and
/// cancelling twice are no-ops.
pub trait Subscription: Send + Sync {
  /// Grant the publisher permission to deliver `demand` more values.
  fn request(&self, demand: Demand);

  /// Stop all future delivery and release upstream resources.
  fn cancel(&self);
}

/// Shared handle to a type-erased subscription.
pub type SubscriptionRef = Arc<dyn Subscription>;

/// A subscription with nothing behind it.
///
/// Used by publishers that terminate without ever producing values.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptySubscription;

impl EmptySubscription {
  pub fn shared() -> SubscriptionRef { Arc::new(EmptySubscription) }
}

impl Subscription for EmptySubscription {
  #[inline]
  fn request(&self, _demand: Demand) {}

  #[inline]
  fn cancel(&self) {}
}

impl<T: Subscription + ?Sized> Subscription for Arc<T> {
  #[inline]
  fn request(&self, demand: Demand) { (**self).request(demand) }

  #[inline]
  fn cancel(&self) { (**self).cancel() }
}
