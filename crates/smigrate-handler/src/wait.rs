use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::HandlerError;

/// Polling parameters for [`wait_for_status`].
#[derive(Debug, Clone, Copy)]
pub struct WaitOpts {
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitOpts {
    pub fn new(interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Default for WaitOpts {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Poll `probe` until the resource reaches `target` status.
///
/// Destination-side creations are asynchronous for several services (volumes,
/// shares, instances, load balancers); handlers must not return until the
/// resource is usable or definitively broken. The probe returns the latest
/// resource snapshot and its status string. Reaching a status listed in
/// `failures` or exhausting `opts.timeout` is an error; the caller decides
/// whether the partially-created resource needs destination-side cleanup.
pub async fn wait_for_status<T, F, Fut>(
    mut probe: F,
    target: &str,
    failures: &[&str],
    opts: WaitOpts,
) -> Result<T, HandlerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(T, String), HandlerError>>,
{
    let started = tokio::time::Instant::now();
    loop {
        let (resource, status) = probe().await?;
        if status == target {
            return Ok(resource);
        }
        if failures.iter().any(|f| *f == status) {
            return Err(HandlerError::StatusFailure {
                status,
                expected: target.to_string(),
            });
        }
        if started.elapsed() >= opts.timeout {
            return Err(HandlerError::Timeout(opts.timeout));
        }
        debug!(status = %status, target = %target, "waiting for resource status");
        tokio::time::sleep(opts.interval).await;
    }
}
