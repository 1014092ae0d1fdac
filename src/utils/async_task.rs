use std::future::Future;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::error;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Error;
use crate::NetworkError;
use crate::Result;

/// Runs `task` until it succeeds, each attempt bounded by `policy.timeout()`,
/// sleeping with exponential backoff between attempts. Gives up after
/// `policy.max_retries` attempts (0 = never) and returns the last error.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    task: F,
    policy: BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,
    T: Future<Output = Result<P>>,
{
    let mut retries = 0;
    let mut delay = policy.base_delay();
    loop {
        let last_error = match timeout(policy.timeout(), task()).await {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(error)) => {
                warn!("failed with error: {:?}", &error);
                error
            }
            Err(_) => {
                warn!("task_with_timeout_and_exponential_backoff timeout after {:?}", policy.timeout());
                Error::from(NetworkError::RetryTimeoutError(policy.timeout()))
            }
        };

        retries += 1;
        if policy.max_retries != 0 && retries >= policy.max_retries {
            warn!("Task failed after {} attempts", retries);
            return Err(last_error);
        }
        sleep(delay).await;
        delay = policy.next_delay(delay);
    }
}

/// Spawns a named background task and logs its error, if any.
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    })
}
