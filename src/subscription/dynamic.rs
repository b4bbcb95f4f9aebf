use std::sync::Mutex;

use smallvec::SmallVec;

use super::{Subscription, SubscriptionRef};
use crate::demand::Demand;

/// A set of upstream subscriptions owned by one combinator.
///
/// Merge, combine-latest and flat-map hold several upstreams at once. This
/// container gives each upstream an ID before it has subscribed, stores its
/// subscription once `on_subscribe` arrives, forwards downstream demand to all
/// of them, and tears them all down together.
///
/// # Design
///
/// - **SmallVec Optimization**: Uses `SmallVec<[_; 2]>` to avoid heap
///   allocation for the common case of 0-2 upstreams.
/// - **Pre-allocation Pattern**: `reserve()` hands out the ID first, `attach()`
///   fills it later. This resolves the cycle where the upstream subscriber needs
///   its ID before the subscription exists.
/// - **Cancel wins**: attaching to a cancelled set cancels the newcomer
///   immediately.
///
/// # Examples
///
/// ```rust
/// use rxflow::prelude::*;
///
/// let upstreams = UpstreamSet::default();
/// let id = upstreams.reserve();
/// assert!(upstreams.attach(id, EmptySubscription::shared(), Demand::none()));
/// assert_eq!(upstreams.len(), 1);
///
/// upstreams.cancel_all();
/// assert!(!upstreams.attach(upstreams.reserve(), EmptySubscription::shared(), Demand::none()));
/// ```
#[derive(Default)]
pub struct UpstreamSet {
  inner: Mutex<Upstreams>,
}

#[derive(Default)]
struct Upstreams {
  next_id: usize,
  items: SmallVec<[(usize, Option<SubscriptionRef>); 2]>,
  cancelled: bool,
}

impl UpstreamSet {
  /// Reserve an ID for an upstream that is about to subscribe.
  pub fn reserve(&self) -> usize {
    let mut inner = self.inner.lock().unwrap();
    let id = inner.next_id;
    inner.next_id += 1;
    if !inner.cancelled {
      inner.items.push((id, None));
    }
    id
  }

  /// Store the subscription for a reserved ID and request `initial` from it.
  ///
  /// Returns `false` (after cancelling `subscription`) when the set was
  /// cancelled or the ID was removed in the meantime.
  pub fn attach(&self, id: usize, subscription: SubscriptionRef, initial: Demand) -> bool {
    let attached = {
      let mut inner = self.inner.lock().unwrap();
      let cancelled = inner.cancelled;
      match inner.items.iter_mut().find(|(i, _)| *i == id) {
        Some(slot) if !cancelled => {
          slot.1 = Some(subscription.clone());
          true
        }
        _ => false,
      }
    };
    if !attached {
      subscription.cancel();
    } else if !initial.is_none() {
      subscription.request(initial);
    }
    attached
  }

  /// Forget an upstream that terminated on its own.
  pub fn remove(&self, id: usize) -> Option<SubscriptionRef> {
    let mut inner = self.inner.lock().unwrap();
    let pos = inner.items.iter().position(|(i, _)| *i == id)?;
    inner.items.remove(pos).1
  }

  /// Forward `demand` to every attached upstream.
  pub fn request_all(&self, demand: Demand) {
    if demand.is_none() {
      return;
    }
    for subscription in self.snapshot() {
      subscription.request(demand);
    }
  }

  /// Cancel every upstream and refuse future attachments.
  pub fn cancel_all(&self) {
    let drained: SmallVec<[SubscriptionRef; 2]> = {
      let mut inner = self.inner.lock().unwrap();
      inner.cancelled = true;
      inner.items.drain(..).filter_map(|(_, s)| s).collect()
    };
    for subscription in drained {
      subscription.cancel();
    }
  }

  /// Cancel every upstream except `keep`.
  pub fn cancel_others(&self, keep: usize) {
    let drained: SmallVec<[SubscriptionRef; 2]> = {
      let mut inner = self.inner.lock().unwrap();
      inner.cancelled = true;
      inner
        .items
        .drain(..)
        .filter(|(i, _)| *i != keep)
        .filter_map(|(_, s)| s)
        .collect()
    };
    for subscription in drained {
      subscription.cancel();
    }
  }

  #[inline]
  pub fn len(&self) -> usize { self.inner.lock().unwrap().items.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.len() == 0 }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.inner.lock().unwrap().cancelled }

  fn snapshot(&self) -> SmallVec<[SubscriptionRef; 2]> {
    let inner = self.inner.lock().unwrap();
    inner.items.iter().filter_map(|(_, s)| s.clone()).collect()
  }
}
