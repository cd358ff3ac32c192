//! Poll interval and deadline configuration shared by every wait
//!
//! A deadline is always explicit. Waiting forever is possible, but only by
//! asking for [`Deadline::Unbounded`].

use std::time::Duration;
use tokio::time::Instant;

use crate::error::{CoreError, Result};

/// Poll interval used when nothing else is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Wait budget used when nothing else is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// When a wait gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Give up once elapsed time reaches this much, cutting short a pending
    /// read or sleep
    After(Duration),
    /// Give up instead of issuing more than this many reads
    ///
    /// The first read is always issued, so `MaxPolls(0)` behaves like
    /// `MaxPolls(1)`. A read in flight is not time-bounded.
    MaxPolls(u32),
    /// Never give up; only a terminal state or a read error ends the wait
    Unbounded,
}

/// How often to poll and when to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    pub deadline: Deadline,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            deadline: Deadline::After(DEFAULT_TIMEOUT),
        }
    }
}

impl WaitOptions {
    pub fn new(poll_interval: Duration, deadline: Deadline) -> Self {
        Self {
            poll_interval,
            deadline,
        }
    }

    pub fn with_timeout(poll_interval: Duration, timeout: Duration) -> Self {
        Self::new(poll_interval, Deadline::After(timeout))
    }

    /// Bound the wait by reads issued; `0` still allows the first read
    pub fn with_max_polls(poll_interval: Duration, max_polls: u32) -> Self {
        Self::new(poll_interval, Deadline::MaxPolls(max_polls))
    }

    /// Opt in to waiting without any deadline
    pub fn unbounded(poll_interval: Duration) -> Self {
        Self::new(poll_interval, Deadline::Unbounded)
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Tracks elapsed time and reads issued for one wait sequence
#[derive(Debug)]
pub(crate) struct PollBudget {
    start: Instant,
    polls: u32,
    deadline: Deadline,
    expires_at: Option<Instant>,
}

impl PollBudget {
    pub(crate) fn start(options: &WaitOptions) -> Self {
        let start = Instant::now();
        let expires_at = match options.deadline {
            Deadline::After(timeout) => Some(start + timeout),
            Deadline::MaxPolls(_) | Deadline::Unbounded => None,
        };
        Self {
            start,
            polls: 0,
            deadline: options.deadline,
            expires_at,
        }
    }

    pub(crate) fn polls(&self) -> u32 {
        self.polls
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Account for the next read, or fail if the deadline has passed.
    ///
    /// The first read is always allowed.
    pub(crate) fn next_poll(&mut self, target: &str) -> Result<u32> {
        if self.polls > 0 {
            let exhausted = match self.deadline {
                Deadline::After(_) => self.expired(),
                Deadline::MaxPolls(max) => self.polls >= max,
                Deadline::Unbounded => false,
            };
            if exhausted {
                return Err(self.timeout(target));
            }
        }
        self.polls += 1;
        Ok(self.polls)
    }

    /// Await one read, giving up when a time deadline passes first
    pub(crate) async fn read<F: Future>(&self, target: &str, read: F) -> Result<F::Output> {
        match self.expires_at {
            Some(at) => tokio::time::timeout_at(at, read)
                .await
                .map_err(|_| self.timeout(target)),
            None => Ok(read.await),
        }
    }

    /// Sleep one poll interval, waking early at a time deadline
    pub(crate) async fn pause(&self, interval: Duration) {
        let next = Instant::now() + interval;
        let wake = match self.expires_at {
            Some(at) => next.min(at),
            None => next,
        };
        tokio::time::sleep_until(wake).await;
    }

    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    fn timeout(&self, target: &str) -> CoreError {
        CoreError::Timeout {
            target: target.to_string(),
            waited: self.elapsed(),
            polls: self.polls(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_bounded() {
        let options = WaitOptions::default();
        assert_eq!(options.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(options.deadline, Deadline::After(DEFAULT_TIMEOUT));
    }

    #[test]
    fn test_builder_methods() {
        let options = WaitOptions::default()
            .poll_interval(Duration::from_secs(1))
            .deadline(Deadline::MaxPolls(4));
        assert_eq!(options, WaitOptions::with_max_polls(Duration::from_secs(1), 4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_polls_budget() {
        let mut budget = PollBudget::start(&WaitOptions::with_max_polls(Duration::ZERO, 2));
        assert_eq!(budget.next_poll("op").unwrap(), 1);
        assert_eq!(budget.next_poll("op").unwrap(), 2);
        let err = budget.next_poll("op").unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(budget.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_always_allowed() {
        let mut budget = PollBudget::start(&WaitOptions::with_timeout(
            Duration::from_secs(1),
            Duration::ZERO,
        ));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(budget.next_poll("op").is_ok());
        assert!(budget.next_poll("op").unwrap_err().is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_polls_allows_one_read() {
        let mut budget = PollBudget::start(&WaitOptions::with_max_polls(Duration::ZERO, 0));
        assert_eq!(budget.next_poll("op").unwrap(), 1);
        assert!(budget.next_poll("op").unwrap_err().is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_wakes_at_deadline() {
        let options = WaitOptions::with_timeout(Duration::from_secs(1800), Duration::from_secs(10));
        let mut budget = PollBudget::start(&options);
        budget.next_poll("op").unwrap();

        budget.pause(options.poll_interval).await;

        assert_eq!(budget.elapsed(), Duration::from_secs(10));
        assert!(budget.next_poll("op").unwrap_err().is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_cut_short_at_deadline() {
        let options = WaitOptions::with_timeout(Duration::from_secs(1), Duration::from_secs(60));
        let mut budget = PollBudget::start(&options);
        budget.next_poll("op").unwrap();

        let err = budget
            .read("op", std::future::pending::<()>())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(budget.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_read_passes_through() {
        let budget = PollBudget::start(&WaitOptions::with_timeout(
            Duration::from_secs(1),
            Duration::ZERO,
        ));
        assert_eq!(budget.read("op", async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_never_exhausts() {
        let mut budget = PollBudget::start(&WaitOptions::unbounded(Duration::from_secs(1)));
        for _ in 0..1000 {
            budget.next_poll("op").unwrap();
        }
        tokio::time::advance(Duration::from_secs(86_400)).await;
        assert!(budget.next_poll("op").is_ok());
    }
}
