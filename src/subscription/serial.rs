use std::sync::Mutex;

use super::{Subscription, SubscriptionRef};
use crate::demand::Demand;

/// A slot holding one upstream at a time.
///
/// `retry` and `catch` swap the upstream after a failure without the
/// downstream noticing: demand and cancel always go to whichever upstream is
/// current. Once cancelled, every later `replace` cancels the newcomer.
#[derive(Default)]
pub struct SerialSubscription {
  inner: Mutex<SerialState>,
}

#[derive(Default)]
struct SerialState {
  current: Option<SubscriptionRef>,
  cancelled: bool,
}

impl SerialSubscription {
  /// Install `subscription` as the current upstream and request `initial`
  /// from it.
  pub fn replace(&self, subscription: SubscriptionRef, initial: Demand) -> bool {
    let accepted = {
      let mut inner = self.inner.lock().unwrap();
      if inner.cancelled {
        false
      } else {
        inner.current = Some(subscription.clone());
        true
      }
    };
    if !accepted {
      subscription.cancel();
    } else if !initial.is_none() {
      subscription.request(initial);
    }
    accepted
  }

  /// Drop the current upstream after it terminated.
  pub fn clear(&self) { self.inner.lock().unwrap().current = None; }

  pub fn is_cancelled(&self) -> bool { self.inner.lock().unwrap().cancelled }
}

impl Subscription for SerialSubscription {
  fn request(&self, demand: Demand) {
    let current = self.inner.lock().unwrap().current.clone();
    if let Some(current) = current {
      current.request(demand);
    }
  }

  fn cancel(&self) {
    let current = {
      let mut inner = self.inner.lock().unwrap();
      inner.cancelled = true;
      inner.current.take()
    };
    if let Some(current) = current {
      current.cancel();
    }
  }
}
