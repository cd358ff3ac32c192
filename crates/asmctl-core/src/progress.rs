//! Progress tracking and status polling for long-running operations
//!
//! Mutating management calls return an [`OperationId`] which must be polled
//! until the backend reports a terminal status. This module provides that
//! await loop with optional progress callbacks for UI or log updates.

use std::time::Duration;

use crate::client::ManagementClient;
use crate::error::{CoreError, Result};
use crate::operation::{CompletedOperation, OperationId, OperationStatus};
use crate::wait::{PollBudget, WaitOptions};

/// Progress events emitted while awaiting an operation
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Waiting has started for this operation
    Started { operation_id: OperationId },
    /// One status query returned
    Polling {
        operation_id: OperationId,
        status: String,
        polls: u32,
        elapsed: Duration,
    },
    /// Operation completed successfully
    Completed {
        operation_id: OperationId,
        polls: u32,
    },
    /// Operation failed or could not be observed
    Failed {
        operation_id: OperationId,
        error: String,
    },
}

/// Callback type for progress updates
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Poll an operation until it reaches a terminal status
///
/// # Arguments
///
/// * `client` - The management API client
/// * `operation_id` - Handle returned by the mutating call
/// * `options` - Poll interval and deadline
/// * `on_progress` - Optional callback for progress updates
///
/// # Returns
///
/// The completed operation, or an error if the operation failed, a status
/// read failed, or the deadline elapsed. Status reads are never retried; a
/// failed read ends the wait. With [`Deadline::After`](crate::Deadline) a
/// pending read or sleep is cut short when the deadline passes.
///
/// # Example
///
/// ```rust,ignore
/// use asmctl_core::{wait_for_operation, WaitOptions};
/// use std::time::Duration;
///
/// let op = client.submit(&request).await?;
/// let done = wait_for_operation(
///     &client,
///     &op,
///     &WaitOptions::with_timeout(Duration::from_secs(10), Duration::from_secs(600)),
///     None,
/// )
/// .await?;
/// println!("finished after {} polls", done.polls);
/// ```
pub async fn wait_for_operation<C>(
    client: &C,
    operation_id: &OperationId,
    options: &WaitOptions,
    on_progress: Option<ProgressCallback>,
) -> Result<CompletedOperation>
where
    C: ManagementClient + ?Sized,
{
    let mut budget = PollBudget::start(options);

    emit(
        &on_progress,
        ProgressEvent::Started {
            operation_id: operation_id.clone(),
        },
    );

    loop {
        let polls = match budget.next_poll(operation_id.as_str()) {
            Ok(polls) => polls,
            Err(e) => {
                emit_failed(&on_progress, operation_id, &e);
                return Err(e);
            }
        };

        let read = budget
            .read(operation_id.as_str(), client.operation_status(operation_id))
            .await;
        let status = match read {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                let err = CoreError::PollTransport {
                    target: operation_id.to_string(),
                    source,
                };
                emit_failed(&on_progress, operation_id, &err);
                return Err(err);
            }
            Err(timeout) => {
                emit_failed(&on_progress, operation_id, &timeout);
                return Err(timeout);
            }
        };

        emit(
            &on_progress,
            ProgressEvent::Polling {
                operation_id: operation_id.clone(),
                status: status.label().to_string(),
                polls,
                elapsed: budget.elapsed(),
            },
        );

        match status {
            OperationStatus::Succeeded => {
                emit(
                    &on_progress,
                    ProgressEvent::Completed {
                        operation_id: operation_id.clone(),
                        polls,
                    },
                );
                return Ok(CompletedOperation {
                    id: operation_id.clone(),
                    polls,
                    elapsed: budget.elapsed(),
                });
            }
            OperationStatus::Failed(error) => {
                let err = CoreError::OperationFailed {
                    operation_id: operation_id.clone(),
                    error,
                };
                emit_failed(&on_progress, operation_id, &err);
                return Err(err);
            }
            OperationStatus::InProgress => {
                budget.pause(options.poll_interval).await;
            }
        }
    }
}

fn emit_failed(callback: &Option<ProgressCallback>, operation_id: &OperationId, err: &CoreError) {
    emit(
        callback,
        ProgressEvent::Failed {
            operation_id: operation_id.clone(),
            error: err.to_string(),
        },
    );
}

/// Helper to emit progress events
fn emit(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}
