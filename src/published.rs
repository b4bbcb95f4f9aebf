//! Observable value cells.

use std::{convert::Infallible, fmt};

use crate::subject::CurrentValueSubject;

/// A value that announces every change.
///
/// `Published` is a thin face over a [`CurrentValueSubject`] that cannot
/// fail: [`publisher`](Published::publisher) replays the current value and
/// then every `set`. It is the target of
/// [`assign`](crate::ops::PublisherExt::assign).
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxflow::prelude::*;
///
/// let name = Published::new(String::from("draft"));
/// let titles = Arc::new(Mutex::new(vec![]));
/// let c = titles.clone();
/// name.publisher().map(|n| n.to_uppercase()).sink(move |t| c.lock().unwrap().push(t));
///
/// just(String::from("final")).assign(&name);
/// assert_eq!(name.get(), "final");
/// assert_eq!(*titles.lock().unwrap(), vec!["DRAFT", "FINAL"]);
/// ```
pub struct Published<T> {
  subject: CurrentValueSubject<T, Infallible>,
}

impl<T> Clone for Published<T> {
  fn clone(&self) -> Self { Published { subject: self.subject.clone() } }
}

impl<T> Published<T>
where
  T: Clone + Send + 'static,
{
  pub fn new(initial: T) -> Self { Published { subject: CurrentValueSubject::new(initial) } }

  pub fn get(&self) -> T { self.subject.value() }

  pub fn set(&self, value: T) { self.subject.send(value) }

  /// Replays the current value, then every change.
  pub fn publisher(&self) -> CurrentValueSubject<T, Infallible> { self.subject.clone() }
}

impl<T: Clone + Send + fmt::Debug + 'static> fmt::Debug for Published<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Published").field(&self.get()).finish()
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, subscriber::recorder::Recorder};

  #[rxflow_macro::test]
  fn set_reaches_subscribers() {
    let count = Published::new(0);
    let recorder = Recorder::unlimited();
    count.publisher().subscribe(recorder.clone());
    count.set(1);
    count.set(2);
    assert_eq!(recorder.values(), vec![0, 1, 2]);
    assert_eq!(count.get(), 2);
  }

  #[rxflow_macro::test]
  fn assign_writes_every_value() {
    let total = Published::new(0);
    let token = from_iter([1, 2, 3]).scan(0, |acc, v| acc + v).assign(&total);
    assert_eq!(total.get(), 6);
    assert!(token.is_closed());
  }

  #[rxflow_macro::test]
  fn cancelled_assignment_stops_writing() {
    let level = Published::new(0);
    let source = PassthroughSubject::<i32, Infallible>::new();
    let token = source.clone().assign(&level);
    source.send(4);
    token.cancel();
    source.send(9);
    assert_eq!(level.get(), 4);
    assert_eq!(format!("{level:?}"), "Published(4)");
  }
}
