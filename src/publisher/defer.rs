use crate::{publisher::Publisher, subscriber::Subscriber};

/// Builds a fresh publisher for every subscription.
#[derive(Clone)]
pub struct Defer<F>(pub(crate) F);

impl<F, P> Publisher for Defer<F>
where
  F: FnOnce() -> P + Send + 'static,
  P: Publisher,
{
  type Item = P::Item;
  type Err = P::Err;

  fn actual_subscribe<S: Subscriber<P::Item, P::Err>>(self, subscriber: S) {
    (self.0)().actual_subscribe(subscriber)
  }
}
