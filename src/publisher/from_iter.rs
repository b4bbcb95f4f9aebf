use std::{
  convert::Infallible,
  sync::{Arc, Mutex},
};

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// Publisher over the items of an iterator.
///
/// Pull-driven: items are taken from the iterator only as demand arrives, so
/// infinite iterators are fine under bounded demand. Every subscription
/// iterates a fresh copy.
#[derive(Clone)]
pub struct FromIter<I>(pub(crate) I);

/// A publisher of exactly one value.
pub type Just<T> = FromIter<Option<T>>;

impl<I> Publisher for FromIter<I>
where
  I: IntoIterator + Send + 'static,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
{
  type Item = I::Item;
  type Err = Infallible;

  fn actual_subscribe<S>(self, mut subscriber: S)
  where
    S: Subscriber<I::Item, Infallible>,
  {
    let subscription = Arc::new(IterSubscription {
      state: Mutex::new(IterState {
        iter: self.0.into_iter(),
        subscriber: None,
        demand: Demand::none(),
        draining: true,
        closed: false,
      }),
    });
    subscriber.on_subscribe(subscription.clone());
    {
      let mut state = subscription.state.lock().unwrap();
      state.draining = false;
      if state.closed {
        return;
      }
      state.subscriber = Some(subscriber);
    }
    subscription.drain();
  }
}

struct IterSubscription<It: Iterator, S> {
  state: Mutex<IterState<It, S>>,
}

struct IterState<It: Iterator, S> {
  iter: It,
  subscriber: Option<S>,
  demand: Demand,
  draining: bool,
  closed: bool,
}

enum Step<T> {
  Value(T),
  Done,
}

impl<It, S> IterSubscription<It, S>
where
  It: Iterator,
  S: Subscriber<It::Item, Infallible>,
{
  fn drain(&self) {
    let mut subscriber = {
      let mut state = self.state.lock().unwrap();
      if state.draining || state.closed {
        return;
      }
      match state.subscriber.take() {
        Some(subscriber) => {
          state.draining = true;
          subscriber
        }
        None => return,
      }
    };

    loop {
      let step = {
        let mut state = self.state.lock().unwrap();
        if state.closed {
          state.draining = false;
          return;
        }
        if state.iter.size_hint().1 == Some(0) {
          state.closed = true;
          Step::Done
        } else if state.demand.consume_one() {
          match state.iter.next() {
            Some(value) => Step::Value(value),
            None => {
              state.closed = true;
              Step::Done
            }
          }
        } else {
          state.subscriber = Some(subscriber);
          state.draining = false;
          return;
        }
      };
      match step {
        Step::Value(value) => {
          let more = subscriber.on_value(value);
          if !more.is_none() {
            self.state.lock().unwrap().demand += more;
          }
        }
        Step::Done => {
          subscriber.on_completed();
          self.state.lock().unwrap().draining = false;
          return;
        }
      }
    }
  }
}

impl<It, S> Subscription for IterSubscription<It, S>
where
  It: Iterator + Send,
  It::Item: Send,
  S: Subscriber<It::Item, Infallible>,
{
  fn request(&self, demand: Demand) {
    {
      let mut state = self.state.lock().unwrap();
      if state.closed || demand.is_none() {
        return;
      }
      state.demand += demand;
    }
    self.drain();
  }

  fn cancel(&self) {
    let discarded = {
      let mut state = self.state.lock().unwrap();
      state.closed = true;
      state.subscriber.take()
    };
    drop(discarded);
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, subscriber::recorder::Recorder};

  #[rxflow_macro::test]
  fn from_range() {
    let recorder = Recorder::unlimited();
    from_iter(0..100).subscribe(recorder.clone());
    assert_eq!(recorder.values(), (0..100).collect::<Vec<_>>());
    assert!(recorder.is_completed());
  }

  #[rxflow_macro::test]
  fn emits_only_what_was_requested() {
    let recorder = Recorder::with_demand(Demand::max(2));
    from_iter(0..).subscribe(recorder.clone());
    assert_eq!(recorder.values(), vec![0, 1]);

    recorder.request(3);
    assert_eq!(recorder.values(), vec![0, 1, 2, 3, 4]);
    assert!(!recorder.is_completed());
  }

  #[rxflow_macro::test]
  fn iterator_is_not_pulled_ahead_of_demand() {
    let pulled = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let c = pulled.clone();
    let counted = (0..).map(move |v| {
      c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
      v
    });
    let recorder = Recorder::with_demand(Demand::max(2));
    from_iter(counted).subscribe(recorder.clone());
    assert_eq!(recorder.values(), vec![0, 1]);
    assert_eq!(pulled.load(std::sync::atomic::Ordering::SeqCst), 2);

    recorder.request(1);
    assert_eq!(pulled.load(std::sync::atomic::Ordering::SeqCst), 3);
  }

  #[rxflow_macro::test]
  fn completes_once_a_lazy_iterator_runs_dry() {
    let recorder = Recorder::with_demand(Demand::max(5));
    from_iter((1..=2).filter(|v| v % 2 == 0)).subscribe(recorder.clone());
    assert_eq!(recorder.events(), vec![Event::Value(2), Event::Completed]);
  }

  #[rxflow_macro::test]
  fn completes_without_demand_once_exhausted() {
    let empty = Recorder::with_demand(Demand::none());
    from_iter(Vec::<i32>::new()).subscribe(empty.clone());
    assert_eq!(empty.events(), vec![Event::Completed]);

    let exact = Recorder::with_demand(Demand::max(2));
    from_iter(vec![1, 2]).subscribe(exact.clone());
    assert_eq!(exact.events(), vec![Event::Value(1), Event::Value(2), Event::Completed]);
  }

  #[rxflow_macro::test]
  fn cold_resubscription_restarts() {
    let source = from_iter(vec!['a', 'b', 'c']);
    let slow = Recorder::with_demand(Demand::max(1));
    let fast = Recorder::unlimited();
    source.clone().subscribe(slow.clone());
    source.subscribe(fast.clone());
    assert_eq!(slow.values(), vec!['a']);
    assert_eq!(fast.values(), vec!['a', 'b', 'c']);
  }

  #[rxflow_macro::test]
  fn cancel_stops_delivery() {
    let recorder = Recorder::with_demand(Demand::max(1));
    from_iter(0..10).subscribe(recorder.clone());
    recorder.cancel();
    recorder.request(5);
    assert_eq!(recorder.values(), vec![0]);
  }

  #[rxflow_macro::test]
  fn refill_from_on_value_keeps_flowing() {
    let seen = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
    let c = seen.clone();
    from_iter(1..=4).subscribe(
      Sink::new(move |v| c.lock().unwrap().push(v), |_: Completion<Infallible>| {}).with_demand(1, 1),
    );
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
  }
}
