//! Rate limiting and retry wrapped around a single connector call

use std::future::Future;
use std::time::Duration;
use log::{debug, warn};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

// ===== Retry =====

/// Retry policy for failed requests
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy
{   pub max_retries: usize
  , pub backoff_multiplier: f32
  , pub initial_backoff: Duration
}

impl RetryPolicy
{   /// Create a new retry policy
    pub fn new(
      max_retries: usize
    , backoff_multiplier: f32
    , initial_backoff_ms: u64
    ) -> Self
    {   RetryPolicy
        {   max_retries
          , backoff_multiplier
          , initial_backoff: Duration::from_millis(
              initial_backoff_ms
            )
        }
    }

    /// Single attempt, no retries
    pub fn disabled() -> Self
    {   RetryPolicy::new(0, 1.0, 0)
    }

    /// Calculate backoff duration for attempt number
    pub fn backoff_for_attempt(
      &self
    , attempt: usize
    ) -> Duration
    {   let multiplier
          = self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(
          (self.initial_backoff.as_millis() as f32
            * multiplier) as u64
        )
    }

    /// Run `call`, re-invoking it after a backoff while it fails with a
    /// retryable error. The last error is returned as is.
    pub async fn run<F, Fut, T>(&self, mut call: F)
      -> Result<T, crate::error::Error>
    where
      F: FnMut() -> Fut
    , Fut: Future<Output = Result<T, crate::error::Error>>
    {   let mut attempt = 0;
        loop
        {   match call().await
            {   Ok(value) => return Ok(value)
              , Err(e) if e.is_retryable()
                  && attempt < self.max_retries => {
                  let backoff = self.backoff_for_attempt(attempt);
                  warn!(
                    "Attempt {} failed: {} - retrying in {:?}",
                    attempt + 1, e, backoff
                  );
                  tokio::time::sleep(backoff).await;
                  attempt += 1;
                }
              , Err(e) => return Err(e)
            }
        }
    }
}

impl Default for RetryPolicy
{   fn default() -> Self
    {   RetryPolicy::new(3, 2.0, 1000)
    }
}

// ===== Rate Limiting =====

/// Bounds calls in flight and spaces call starts evenly.
pub struct RateLimiter
{   permits: Semaphore
  , max_concurrency: usize
  , interval: Duration
  , next_slot: Mutex<Instant>
}

impl RateLimiter
{   pub fn new(max_calls_per_second: u32, max_concurrency: u32)
      -> Self
    {   let calls = max_calls_per_second.max(1);
        let concurrency = max_concurrency.max(1);
        debug!(
          "Creating RateLimiter: {}/s, {} concurrent",
          calls, concurrency
        );
        RateLimiter
        {   permits: Semaphore::new(concurrency as usize)
          , max_concurrency: concurrency as usize
          , interval: Duration::from_secs(1) / calls
          , next_slot: Mutex::new(Instant::now())
        }
    }

    pub fn max_concurrency(&self) -> usize
    {   self.max_concurrency
    }

    pub fn interval(&self) -> Duration
    {   self.interval
    }

    /// Wait for a slot, then run `call` while holding a permit.
    pub async fn run<F, Fut, T>(&self, call: F)
      -> Result<T, crate::error::Error>
    where
      F: FnOnce() -> Fut
    , Fut: Future<Output = Result<T, crate::error::Error>>
    {   let _permit = self.permits.acquire().await
          .map_err(|_| {
            crate::error::Error::Other(
              "Rate limiter closed".to_string()
            )
          })?;

        let start_at = {
          let mut next = self.next_slot.lock().await;
          let now = Instant::now();
          let start_at = (*next).max(now);
          *next = start_at + self.interval;
          start_at
        };
        tokio::time::sleep_until(start_at).await;

        call().await
    }
}

impl Default for RateLimiter
{   fn default() -> Self
    {   RateLimiter::new(1, 1)
    }
}
