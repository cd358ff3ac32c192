//! Convergence polling for resource state
//!
//! An operation being marked complete does not mean the resource has reached
//! the state the caller wants. Some transitions (a role instance reaching
//! `Stopped`) are only visible by re-reading the resource, so this module
//! fetches fresh snapshots until the observed state matches a target.

use std::fmt::{Debug, Display};
use std::time::Duration;

use crate::client::StateSource;
use crate::error::{CoreError, Result};
use crate::operation::{
    DeploymentKey, DeploymentStatus, PowerState, ResourceStateSnapshot, RoleInstanceKey,
};
use crate::wait::{PollBudget, WaitOptions};

/// Events emitted while waiting for convergence
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// One fetch returned this observed state
    Observed {
        resource: String,
        observed: String,
        target: String,
        fetch: u32,
        elapsed: Duration,
    },
    /// The resource reached the target state
    Converged { resource: String, fetches: u32 },
}

/// Callback type for convergence updates
pub type StateCallback = Box<dyn Fn(StateEvent) + Send + Sync>;

/// Re-fetch a resource until its observed state equals `target`
///
/// Every fetch is a fresh read; nothing is cached between polls. A fetch
/// error is returned immediately as [`CoreError::PollTransport`]. A time
/// deadline also bounds a fetch that never answers.
pub async fn wait_for_state<K, S, Src>(
    source: &Src,
    key: &K,
    target: S,
    options: &WaitOptions,
    on_state: Option<StateCallback>,
) -> Result<ResourceStateSnapshot<K, S>>
where
    K: Clone + Display + Send + Sync,
    S: PartialEq + Debug,
    Src: StateSource<K, S> + ?Sized,
{
    let resource = key.to_string();
    let mut budget = PollBudget::start(options);

    loop {
        let fetch = budget.next_poll(&resource)?;

        let state = budget
            .read(&resource, source.fetch_state(key))
            .await?
            .map_err(|source| CoreError::PollTransport {
                target: resource.clone(),
                source,
            })?;

        emit(
            &on_state,
            StateEvent::Observed {
                resource: resource.clone(),
                observed: format!("{state:?}"),
                target: format!("{target:?}"),
                fetch,
                elapsed: budget.elapsed(),
            },
        );

        if state == target {
            emit(
                &on_state,
                StateEvent::Converged {
                    resource,
                    fetches: fetch,
                },
            );
            return Ok(ResourceStateSnapshot {
                key: key.clone(),
                state,
                fetch,
            });
        }

        budget.pause(options.poll_interval).await;
    }
}

/// Wait until a role instance reports the given power state
pub async fn wait_for_power_state<Src>(
    source: &Src,
    key: &RoleInstanceKey,
    target: PowerState,
    options: &WaitOptions,
    on_state: Option<StateCallback>,
) -> Result<ResourceStateSnapshot<RoleInstanceKey, PowerState>>
where
    Src: StateSource<RoleInstanceKey, PowerState> + ?Sized,
{
    wait_for_state(source, key, target, options, on_state).await
}

/// Wait until a deployment reports the given status
pub async fn wait_for_deployment_status<Src>(
    source: &Src,
    key: &DeploymentKey,
    target: DeploymentStatus,
    options: &WaitOptions,
    on_state: Option<StateCallback>,
) -> Result<ResourceStateSnapshot<DeploymentKey, DeploymentStatus>>
where
    Src: StateSource<DeploymentKey, DeploymentStatus> + ?Sized,
{
    wait_for_state(source, key, target, options, on_state).await
}

fn emit(callback: &Option<StateCallback>, event: StateEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Sequenced {
        states: Mutex<VecDeque<std::result::Result<PowerState, ApiError>>>,
        fetches: AtomicU32,
    }

    impl Sequenced {
        fn new(states: Vec<std::result::Result<PowerState, ApiError>>) -> Self {
            Self {
                states: Mutex::new(states.into()),
                fetches: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl StateSource<RoleInstanceKey, PowerState> for Sequenced {
        async fn fetch_state(
            &self,
            _key: &RoleInstanceKey,
        ) -> std::result::Result<PowerState, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.states
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(PowerState::Unknown))
        }
    }

    fn options() -> WaitOptions {
        WaitOptions::with_max_polls(Duration::from_secs(2), 20)
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_on_first_matching_snapshot() {
        let source = Sequenced::new(vec![
            Ok(PowerState::Running),
            Ok(PowerState::Stopping),
            Ok(PowerState::Stopped),
            Ok(PowerState::Running),
        ]);
        let key = RoleInstanceKey::single_role("vm");

        let snapshot = wait_for_power_state(&source, &key, PowerState::Stopped, &options(), None)
            .await
            .unwrap();

        assert_eq!(snapshot.state, PowerState::Stopped);
        assert_eq!(snapshot.fetch, 3);
        assert_eq!(snapshot.key, key);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_is_returned_without_more_polls() {
        let source = Sequenced::new(vec![
            Ok(PowerState::Running),
            Err(ApiError::http(500, "InternalError", "boom")),
            Ok(PowerState::Stopped),
        ]);

        let err = wait_for_power_state(
            &source,
            &RoleInstanceKey::single_role("vm"),
            PowerState::Stopped,
            &options(),
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::PollTransport { .. }));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_polls_bounds_convergence() {
        let source = Sequenced::new(vec![Ok(PowerState::Running); 10]);

        let err = wait_for_power_state(
            &source,
            &RoleInstanceKey::single_role("vm"),
            PowerState::Stopped,
            &WaitOptions::with_max_polls(Duration::from_secs(1), 4),
            None,
        )
        .await
        .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_inside_poll_interval() {
        let source = Sequenced::new(vec![Ok(PowerState::Running); 10]);
        let options = WaitOptions::with_timeout(Duration::from_secs(1800), Duration::from_secs(10));

        let err = wait_for_power_state(
            &source,
            &RoleInstanceKey::single_role("vm"),
            PowerState::Stopped,
            &options,
            None,
        )
        .await
        .unwrap_err();

        match err {
            CoreError::Timeout { polls, waited, .. } => {
                assert_eq!(polls, 1);
                assert_eq!(waited, Duration::from_secs(10));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    struct Unresponsive;

    #[async_trait]
    impl StateSource<RoleInstanceKey, PowerState> for Unresponsive {
        async fn fetch_state(
            &self,
            _key: &RoleInstanceKey,
        ) -> std::result::Result<PowerState, ApiError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_fetch_times_out() {
        let options = WaitOptions::with_timeout(Duration::from_secs(1), Duration::from_secs(60));
        let key = RoleInstanceKey::single_role("vm");
        let wait = wait_for_power_state(
            &Unresponsive,
            &key,
            PowerState::Stopped,
            &options,
            None,
        );

        let err = tokio::time::timeout(Duration::from_secs(24 * 3600), wait)
            .await
            .expect("wait returned within the deadline")
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(!matches!(err, CoreError::PollTransport { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_events() {
        let source = Sequenced::new(vec![Ok(PowerState::Stopping), Ok(PowerState::Stopped)]);
        let events = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&events);

        wait_for_power_state(
            &source,
            &RoleInstanceKey::single_role("vm"),
            PowerState::Stopped,
            &options(),
            Some(Box::new(move |e| sink.lock().unwrap().push(e))),
        )
        .await
        .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            StateEvent::Observed { observed, target, fetch: 1, .. }
                if observed == "Stopping" && target == "Stopped"
        ));
        assert!(matches!(&events[2], StateEvent::Converged { fetches: 2, .. }));
    }
}
