//! Bounded-time polling primitive.
//!
//! One place defines what "poll until done" means: immediate first check, a
//! fixed sleep between attempts, a hard deadline, and cancellation honored
//! both between attempts and mid-sleep. Callers supply only the check.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a poll loop stopped without producing a value.
#[derive(Debug, Error)]
pub enum PollError<E> {
    /// The deadline elapsed before the check reported done.
    #[error("timed out after {attempts} attempts over {elapsed:?}")]
    Timeout { attempts: u32, elapsed: Duration },

    /// The cancellation token fired.
    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    /// The check itself failed. The loop propagates the error without
    /// inspecting it; severity is the caller's call.
    #[error(transparent)]
    Check(E),
}

/// Invoke `check` until it reports done, fails, or `deadline` elapses.
///
/// `check` returning `Ok(Some(value))` means done; `Ok(None)` means "not
/// yet, keep going"; `Err(_)` stops the loop immediately.
///
/// The first check runs with no initial sleep. After a "not yet" the loop
/// always sleeps the full `interval` before looking again, which bounds the
/// request rate against the checked service.
pub async fn poll_until<T, E, F, Fut>(
    mut check: F,
    interval: Duration,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled { attempts });
        }

        attempts += 1;
        match check().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) => return Err(PollError::Check(err)),
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(PollError::Cancelled { attempts });
            }
            _ = tokio::time::sleep(interval) => {}
        }

        if started.elapsed() >= deadline {
            return Err(PollError::Timeout {
                attempts,
                elapsed: started.elapsed(),
            });
        }
    }
}
