use std::{io, sync::Arc, time::Duration};

use futures::executor::ThreadPool;
use once_cell::sync::Lazy;

use super::{drive, Scheduler, SchedulerId, Task, TaskHandle};

static GLOBAL: Lazy<ThreadPoolScheduler> = Lazy::new(|| {
  ThreadPoolScheduler::builder()
    .name_prefix("rxflow-pool-")
    .create()
    .expect("failed to start the global rxflow pool")
});

/// Background scheduler backed by a `futures` thread pool.
///
/// Several workers run tasks concurrently, so two tasks scheduled back to back
/// may run in either order. Use [`receive_on`](crate::ops::PublisherExt::receive_on)
/// when order matters, it serializes events through its own queue.
#[derive(Clone)]
pub struct ThreadPoolScheduler {
  inner: Arc<PoolInner>,
}

struct PoolInner {
  pool: ThreadPool,
  id: SchedulerId,
}

impl ThreadPoolScheduler {
  /// The process-wide background pool.
  pub fn global() -> Self { GLOBAL.clone() }

  pub fn builder() -> ThreadPoolSchedulerBuilder { ThreadPoolSchedulerBuilder::default() }

  pub(crate) fn from_pool(pool: ThreadPool, id: SchedulerId) -> Self {
    ThreadPoolScheduler { inner: Arc::new(PoolInner { pool, id }) }
  }
}

impl Scheduler for ThreadPoolScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    self.inner.pool.spawn_ok(drive(task, handle.clone(), delay));
    handle
  }

  fn id(&self) -> SchedulerId { self.inner.id }
}

/// Configuration for a dedicated [`ThreadPoolScheduler`].
#[derive(Default)]
pub struct ThreadPoolSchedulerBuilder {
  pool_size: Option<usize>,
  name_prefix: Option<String>,
}

impl ThreadPoolSchedulerBuilder {
  /// Number of worker threads. Defaults to the number of CPUs.
  pub fn pool_size(mut self, size: usize) -> Self {
    self.pool_size = Some(size);
    self
  }

  pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.name_prefix = Some(prefix.into());
    self
  }

  pub fn create(self) -> io::Result<ThreadPoolScheduler> {
    let mut builder = ThreadPool::builder();
    if let Some(size) = self.pool_size {
      builder.pool_size(size);
    }
    if let Some(prefix) = self.name_prefix {
      builder.name_prefix(prefix);
    }
    let pool = builder.create()?;
    Ok(ThreadPoolScheduler::from_pool(pool, SchedulerId::unique()))
  }
}
