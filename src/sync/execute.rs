//! Submitting a batch of cache operations and waiting for it to finish.
//!
//! A batch moves `Submitted -> Pending -> Done`: every operation is submitted,
//! then the cache server is polled at a fixed interval until it reports no
//! outstanding tasks. The loop is bounded by `max_polls`.

use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::{SyncError, SyncResult};
use crate::gwc::{CacheOperation, OperationHandle, Status};

use super::traits::CacheExecutor;

/// How often, and how many times, to ask the server about a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
  pub interval: Duration,
  pub max_polls: u32,
}

/// The state of a submitted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
  /// Operations sent, not yet polled
  Submitted,
  /// Server still reports running tasks
  Pending,
  /// Nothing outstanding
  Done,
}

/// An operation the server refused.
#[derive(Debug, Clone)]
pub struct FailedOperation {
  pub operation: CacheOperation,
  pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
  pub submitted: usize,
  pub failures: Vec<FailedOperation>,
  pub polls: u32,
}

/// Submit `ops` in order, then block until the server has finished them.
///
/// A rejected submission is logged and recorded; the rest of the batch still
/// goes out. Poll failures and running out of polls abort.
pub async fn run_batch<E>(
  executor: &E,
  ops: &[CacheOperation],
  policy: PollPolicy,
) -> SyncResult<BatchReport>
where
  E: CacheExecutor + ?Sized,
{
  let mut report = BatchReport::default();
  let mut handles: Vec<OperationHandle> = Vec::new();

  for op in ops {
    info!(operation = %op, "Submitting cache operation");
    match executor.submit(op).await {
      Ok(handle) => {
        report.submitted += 1;
        if !handles.contains(&handle) {
          handles.push(handle);
        }
      }
      Err(e) => {
        error!(operation = %op, error = %e, "Cache operation rejected");
        report.failures.push(FailedOperation {
          operation: op.clone(),
          error: e.to_string(),
        });
      }
    }
  }

  report.polls = wait_until_done(executor, handles, policy).await?;
  Ok(report)
}

async fn wait_until_done<E>(
  executor: &E,
  mut handles: Vec<OperationHandle>,
  policy: PollPolicy,
) -> SyncResult<u32>
where
  E: CacheExecutor + ?Sized,
{
  let mut state = if handles.is_empty() {
    BatchState::Done
  } else {
    BatchState::Submitted
  };
  let mut polls = 0u32;

  loop {
    if state == BatchState::Done {
      return Ok(polls);
    }
    if polls >= policy.max_polls {
      return Err(SyncError::PollTimeout { polls });
    }
    if state == BatchState::Pending {
      tokio::time::sleep(policy.interval).await;
    }

    polls += 1;
    let mut outstanding = Vec::with_capacity(handles.len());
    for handle in handles.drain(..) {
      match executor.poll(&handle).await? {
        Status::Done => {}
        Status::Pending { tasks } => {
          debug!(layer = %handle.layer, kind = %handle.kind, tasks, "Cache tasks still running");
          outstanding.push(handle);
        }
      }
    }
    handles = outstanding;

    state = if handles.is_empty() {
      BatchState::Done
    } else {
      BatchState::Pending
    };
  }
}
