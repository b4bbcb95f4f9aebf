use std::{
  fmt,
  sync::{Arc, Mutex},
};

use super::SubscriptionRef;

type Teardown = Box<dyn FnOnce() + Send>;

enum TokenState {
  /// Returned to the caller but the chain has not handed out its subscription
  /// yet.
  Idle,
  Armed(Teardown),
  /// The chain terminated on its own; cancelling is a no-op.
  Released,
  Cancelled,
}

/// The handle returned by `subscribe`.
///
/// Cancelling the token tears down every live subscription of the chain
/// exactly once. Cancelling twice, or after the chain completed or failed on
/// its own, does nothing.
///
/// Tokens are cheap to clone; all clones control the same chain.
///
/// ```rust
/// use std::sync::{
///   atomic::{AtomicUsize, Ordering},
///   Arc,
/// };
///
/// use rxflow::prelude::*;
///
/// let released = Arc::new(AtomicUsize::new(0));
/// let c = released.clone();
/// let token = CancellationToken::from_fn(move || {
///   c.fetch_add(1, Ordering::SeqCst);
/// });
///
/// token.cancel();
/// token.cancel();
/// assert_eq!(released.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct CancellationToken {
  state: Arc<Mutex<TokenState>>,
}

impl CancellationToken {
  pub(crate) fn new() -> Self { CancellationToken { state: Arc::new(Mutex::new(TokenState::Idle)) } }

  /// A token that runs `teardown` the first time it is cancelled.
  pub fn from_fn(teardown: impl FnOnce() + Send + 'static) -> Self {
    CancellationToken { state: Arc::new(Mutex::new(TokenState::Armed(Box::new(teardown)))) }
  }

  /// Attach the head subscription of the chain.
  ///
  /// A token that was cancelled before the subscription arrived cancels it
  /// on the spot.
  pub(crate) fn bind(&self, subscription: SubscriptionRef) {
    let mut state = self.state.lock().unwrap();
    match *state {
      TokenState::Idle => {
        *state = TokenState::Armed(Box::new(move || subscription.cancel()));
      }
      TokenState::Cancelled => {
        drop(state);
        subscription.cancel();
      }
      TokenState::Armed(_) | TokenState::Released => {}
    }
  }

  /// Mark the chain as terminated without cancellation.
  pub(crate) fn release(&self) {
    let mut state = self.state.lock().unwrap();
    if !matches!(*state, TokenState::Cancelled) {
      *state = TokenState::Released;
    }
  }

  /// Tear down the chain. Idempotent.
  pub fn cancel(&self) {
    let teardown = {
      let mut state = self.state.lock().unwrap();
      match std::mem::replace(&mut *state, TokenState::Cancelled) {
        TokenState::Armed(teardown) => Some(teardown),
        TokenState::Released => {
          *state = TokenState::Released;
          None
        }
        TokenState::Idle | TokenState::Cancelled => None,
      }
    };
    if let Some(teardown) = teardown {
      teardown();
    }
  }

  /// `true` once `cancel` has been called on an unterminated chain.
  pub fn is_cancelled(&self) -> bool { matches!(*self.state.lock().unwrap(), TokenState::Cancelled) }

  /// `true` once the chain is over, by cancellation or by its own terminal
  /// event.
  pub fn is_closed(&self) -> bool {
    matches!(*self.state.lock().unwrap(), TokenState::Cancelled | TokenState::Released)
  }

  /// Activates "RAII" behavior: the chain is cancelled when the returned
  /// guard goes out of scope.
  ///
  /// **Attention:** If you don't assign the return value to a variable, the
  /// chain is cancelled immediately.
  pub fn guard(self) -> CancellationGuard { CancellationGuard(self) }
}

impl fmt::Debug for CancellationToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = match *self.state.lock().unwrap() {
      TokenState::Idle => "idle",
      TokenState::Armed(_) => "armed",
      TokenState::Released => "released",
      TokenState::Cancelled => "cancelled",
    };
    f.debug_struct("CancellationToken").field("state", &state).finish()
  }
}

/// Cancels its token when dropped.
#[derive(Debug)]
#[must_use]
pub struct CancellationGuard(CancellationToken);

impl CancellationGuard {
  pub fn token(&self) -> &CancellationToken { &self.0 }
}

impl Drop for CancellationGuard {
  #[inline]
  fn drop(&mut self) { self.0.cancel() }
}
