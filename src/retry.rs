//! Bounded polling with timeout, used for eventual-consistency waits against
//! the external LB (e.g. waiting for a freshly created pool's metadata to
//! become readable).

use std::time::Duration;

use tokio::time::sleep;

use crate::errors::{Error, Result};

/// Polls `check` every `interval` until it returns `Some`, or until
/// `deadline` elapses, whichever comes first.
pub async fn poll_until<T, F, Fut>(deadline: Duration, interval: Duration, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Option<T>>>,
{
    let start = tokio::time::Instant::now();
    loop {
        if let Some(value) = check().await? {
            return Ok(value);
        }
        if start.elapsed() >= deadline {
            return Err(Error::ExternalTransient(format!(
                "condition not satisfied within {deadline:?}"
            )));
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_as_soon_as_check_succeeds() {
        let attempts = AtomicU32::new(0);
        let result = poll_until(Duration::from_millis(200), Duration::from_millis(1), || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            Ok(if n >= 2 { Some(n) } else { None })
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn times_out_when_condition_never_met() {
        let result: Result<()> =
            poll_until(Duration::from_millis(20), Duration::from_millis(5), || async { Ok(None) }).await;
        assert!(result.is_err());
    }
}
