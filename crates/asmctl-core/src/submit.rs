//! Submit-then-await for every mutating endpoint
//!
//! Each endpoint is a typed [`Submission`] value. [`submit_and_wait`] is the
//! single waiting path they all share.

use crate::client::{ManagementClient, RequestDescription};
use crate::error::{CoreError, Result};
use crate::operation::{CompletedOperation, OperationId};
use crate::progress::{ProgressCallback, wait_for_operation};
use crate::wait::WaitOptions;

/// A mutating call that yields an operation handle when submitted
pub trait Submission: Send + Sync {
    /// The request to hand to the collaborator
    fn request(&self) -> RequestDescription;

    /// Short human-readable label, used in errors and logs
    fn describe(&self) -> String;
}

impl<T: Submission + ?Sized> Submission for &T {
    fn request(&self) -> RequestDescription {
        (**self).request()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Submit without waiting; the caller owns the returned handle
pub async fn submit_only<C, S>(client: &C, submission: &S) -> Result<OperationId>
where
    C: ManagementClient + ?Sized,
    S: Submission + ?Sized,
{
    client
        .submit(&submission.request())
        .await
        .map_err(|source| CoreError::Submission {
            request: submission.describe(),
            source,
        })
}

/// Submit a mutating call and wait for its operation to finish
///
/// A failed submission is returned as [`CoreError::Submission`] and no status
/// query is made. Otherwise the handle goes straight to
/// [`wait_for_operation`].
///
/// # Example
///
/// ```rust,ignore
/// use asmctl_core::requests::ShutdownRole;
/// use asmctl_core::{submit_and_wait, RoleInstanceKey, WaitOptions};
///
/// let key = RoleInstanceKey::single_role("sdkvm01");
/// submit_and_wait(&client, &ShutdownRole::new(key), &WaitOptions::default(), None).await?;
/// ```
pub async fn submit_and_wait<C, S>(
    client: &C,
    submission: &S,
    options: &WaitOptions,
    on_progress: Option<ProgressCallback>,
) -> Result<CompletedOperation>
where
    C: ManagementClient + ?Sized,
    S: Submission + ?Sized,
{
    let operation_id = submit_only(client, submission).await?;
    wait_for_operation(client, &operation_id, options, on_progress).await
}
