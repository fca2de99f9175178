//! Page fetching with bounded retries and failure backoff.

use std::time::Duration;

use tracing::warn;

use super::http_client::PageSource;
use super::pacing::Pacer;
use super::retry::{retry, Attempt, RetryError, RetryPolicy};

/// Outcome of fetching one logical page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 200 response body, uninterpreted.
    Success(String),
    /// Every attempt failed (or the request was unusable); the failure
    /// backoff has already been slept.
    Failed { attempts: u32 },
    /// Shutdown was requested mid-fetch.
    Cancelled,
}

/// Retrying front for a [`PageSource`].
pub struct PageFetcher<'a> {
    source: &'a dyn PageSource,
    pacer: &'a Pacer,
    policy: RetryPolicy,
    failure_delay: Duration,
}

impl<'a> PageFetcher<'a> {
    pub fn new(
        source: &'a dyn PageSource,
        pacer: &'a Pacer,
        policy: RetryPolicy,
        failure_delay: Duration,
    ) -> Self {
        Self {
            source,
            pacer,
            policy,
            failure_delay,
        }
    }

    /// Fetch one page. Non-200 responses and transport errors are retried up
    /// to the policy's attempt count; after the last failure the jittered
    /// failure delay is slept before returning [`FetchOutcome::Failed`].
    pub async fn fetch(&self, url: &str, user_agent: &str) -> FetchOutcome {
        let result = retry(&self.policy, self.pacer, url, |_attempt| async move {
            match self.source.get_page(url, user_agent).await {
                Ok(body) => Attempt::Done(body),
                Err(e) if e.is_retryable() => Attempt::Retry(e),
                Err(e) => Attempt::Terminal(e),
            }
        })
        .await;

        let attempts = match result {
            Ok(body) => return FetchOutcome::Success(body),
            Err(RetryError::Cancelled) => return FetchOutcome::Cancelled,
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!("Giving up on {} after {} attempts: {}", url, attempts, last);
                attempts
            }
            Err(RetryError::Terminal(e)) => {
                warn!("Cannot fetch {}: {}", url, e);
                1
            }
        };

        match self
            .pacer
            .pause(self.failure_delay, "after repeated failures")
            .await
        {
            Ok(()) => FetchOutcome::Failed { attempts },
            Err(_) => FetchOutcome::Cancelled,
        }
    }
}
