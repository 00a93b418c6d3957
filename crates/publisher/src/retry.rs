//! One retry loop for every retryable call site.
//!
//! Backoff is linear: `base_delay * attempt`.

use std::thread::sleep;
use std::time::Duration;

use tracing::warn;

/// Run `op` up to `max_attempts` times, sleeping `base_delay * attempt`
/// between attempts. `is_retryable` gates which errors are worth retrying;
/// a non-retryable error returns immediately.
pub fn retry_with_backoff<T, E, F, P>(
    mut op: F,
    max_attempts: u32,
    base_delay: Duration,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = base_delay * attempt;
                warn!(attempt, max_attempts, delay_secs = delay.as_secs(), error = %e, "attempt failed, backing off");
                sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn succeeds_first_try_without_sleeping() {
        let result: Result<i32, String> =
            retry_with_backoff(|| Ok(7), 3, Duration::from_millis(1), |_| true);
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn retries_until_success() {
        let calls = Cell::new(0);
        let result: Result<i32, String> = retry_with_backoff(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err("transient".to_string())
                } else {
                    Ok(42)
                }
            },
            5,
            Duration::from_millis(1),
            |_| true,
        );
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhausts_attempts_then_errors() {
        let calls = Cell::new(0);
        let result: Result<(), String> = retry_with_backoff(
            || {
                calls.set(calls.get() + 1);
                Err("always down".to_string())
            },
            3,
            Duration::from_millis(1),
            |_| true,
        );
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn non_retryable_error_returns_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), String> = retry_with_backoff(
            || {
                calls.set(calls.get() + 1);
                Err("auth denied".to_string())
            },
            5,
            Duration::from_millis(1),
            |e| !e.contains("auth"),
        );
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
