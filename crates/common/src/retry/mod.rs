use std::{future::Future, time::Duration};

use tracing::{error, warn};

pub mod policies;

/// Delay policy between attempts of a fallible operation.
pub trait Backoff {
    /// Base delay in ms.
    fn base_delay_ms(&self) -> u64;

    /// Generates next delay given current delay.
    fn next_delay_ms(&self, curr_delay_ms: u64) -> u64;
}

/// Runs an async fallible operation, retrying up to `max_retries` times with
/// delays taken from `backoff`.
///
/// Logs a warning on each failure and an error once retries are exhausted,
/// returning the last error.
pub async fn retry_with_backoff<R, E, F, Fut>(
    name: &str,
    max_retries: u16,
    backoff: &impl Backoff,
    operation: F,
) -> Result<R, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: std::fmt::Display,
{
    retry_with_backoff_inner(name, max_retries, backoff, operation, tokio::time::sleep).await
}

/// Does the actual retrying, generic over the sleep function.
async fn retry_with_backoff_inner<R, E, F, Fut, S, SFut>(
    name: &str,
    max_retries: u16,
    backoff: &impl Backoff,
    mut operation: F,
    mut sleep_fn: S,
) -> Result<R, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: std::fmt::Display,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    let mut delay = backoff.base_delay_ms();
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_retries => {
                attempt += 1;
                warn!(%name, %attempt, err = %err, delay_ms = %delay, "operation failed, retrying");
                sleep_fn(Duration::from_millis(delay)).await;
                delay = backoff.next_delay_ms(delay);
            }
            Err(err) => {
                error!(%name, err = %err, "max retries exceeded");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::ready,
        sync::{Arc, Mutex},
    };

    use super::{policies::ExponentialBackoff, *};

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let backoff = ExponentialBackoff::new(100, 2, 1, 1_000);
        let calls = Arc::new(Mutex::new(0));
        let sleeps = Arc::new(Mutex::new(Vec::new()));

        let result: Result<(), &str> = retry_with_backoff_inner(
            "always_fails",
            3,
            &backoff,
            || {
                *calls.lock().unwrap() += 1;
                ready(Err("nope"))
            },
            |d| {
                sleeps.lock().unwrap().push(d.as_millis() as u64);
                ready(())
            },
        )
        .await;

        assert_eq!(result, Err("nope"));
        assert_eq!(*calls.lock().unwrap(), 4);
        assert_eq!(*sleeps.lock().unwrap(), vec![100, 200, 400]);
    }

    #[tokio::test]
    async fn test_returns_first_success() {
        let backoff = ExponentialBackoff::new(100, 2, 1, 1_000);
        let calls = Arc::new(Mutex::new(0));
        let sleeps = Arc::new(Mutex::new(Vec::new()));

        let result: Result<&str, &str> = retry_with_backoff_inner(
            "eventually_ok",
            5,
            &backoff,
            || {
                let mut n = calls.lock().unwrap();
                *n += 1;
                ready(if *n == 3 { Ok("done") } else { Err("not yet") })
            },
            |d| {
                sleeps.lock().unwrap().push(d.as_millis() as u64);
                ready(())
            },
        )
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(sleeps.lock().unwrap().len(), 2);
    }
}
