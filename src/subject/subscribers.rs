use smallvec::SmallVec;

use crate::{relay::Relay, subscriber::Completion};

/// Relays that just received something and need a drain outside the lock.
pub(crate) type Pending<T, E> = SmallVec<[Relay<T, E>; 2]>;

/// The subscribers of one subject, in subscription order.
///
/// Slots are addressed by a monotonically increasing ID. Removing a subscriber
/// leaves a tombstone; tombstones are swept once they outnumber the live
/// slots, so cancellation during a fan-out never shifts the slots being
/// iterated.
pub(crate) struct Subscribers<T, E> {
  slots: Vec<(usize, Option<Relay<T, E>>)>,
  next_id: usize,
  tombstones: usize,
}

impl<T, E> Default for Subscribers<T, E> {
  fn default() -> Self { Subscribers { slots: vec![], next_id: 0, tombstones: 0 } }
}

impl<T, E> Subscribers<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  pub(crate) fn add(&mut self, relay: Relay<T, E>) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    self.slots.push((id, Some(relay)));
    id
  }

  pub(crate) fn remove(&mut self, id: usize) -> Option<Relay<T, E>> {
    // IDs are handed out in increasing order and slots keep that order.
    let pos = self.slots.binary_search_by_key(&id, |(i, _)| *i).ok()?;
    let relay = self.slots[pos].1.take()?;
    self.tombstones += 1;
    if self.tombstones > self.len() {
      self.compact();
    }
    Some(relay)
  }

  #[inline]
  pub(crate) fn len(&self) -> usize { self.slots.len() - self.tombstones }

  /// Queue `value` for every live subscriber: a clone each, the last one gets
  /// the original.
  pub(crate) fn broadcast(&mut self, value: T) -> Pending<T, E>
  where
    T: Clone,
  {
    let mut pending = Pending::new();
    let mut live = self.slots.iter().filter_map(|(_, relay)| relay.as_ref()).peekable();
    while let Some(relay) = live.next() {
      let queued = if live.peek().is_some() {
        relay.enqueue(value.clone())
      } else {
        relay.enqueue(value);
        pending.push(relay.clone());
        break;
      };
      if queued {
        pending.push(relay.clone());
      }
    }
    pending
  }

  /// Record `completion` for every subscriber and forget them all.
  pub(crate) fn finish(&mut self, completion: &Completion<E>) -> Pending<T, E>
  where
    E: Clone,
  {
    self.tombstones = 0;
    self
      .slots
      .drain(..)
      .filter_map(|(_, relay)| relay)
      .map(|relay| {
        relay.enqueue_completion(completion.clone());
        relay
      })
      .collect()
  }

  fn compact(&mut self) {
    self.slots.retain(|(_, relay)| relay.is_some());
    self.tombstones = 0;
  }
}
