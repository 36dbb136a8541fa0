//! The generation saga: submit, poll, select, apply, always clean up.
//!
//! One run drives a single remote generation job end to end:
//!
//! ```text
//! GenerationSaga::run(request)
//!     │
//!     ├─► RemoteJobClient::submit          ─► JobHandle
//!     ├─► poll_until(status + select)      ─► Artifact
//!     ├─► ReplacementApplier::apply        ─► applied ref
//!     └─► RemoteJobClient::delete          (always, best-effort)
//! ```
//!
//! The remote job is scratch state, not a durable artifact store, so the
//! delete runs on every path that obtained a handle: success, failure,
//! timeout, and cancellation alike. A failed delete is recorded on the
//! result as a warning and never changes the run's outcome.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::apply::{ApplyError, ReplacementApplier};
use crate::client::{ClientError, RemoteJobClient};
use crate::config::SagaConfig;
use crate::poll::{poll_until, PollError};
use crate::select::select_artifact;
use crate::types::{GenerationRequest, JobHandle};

/// Stage of a run, as carried by failures and observer callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submit,
    Poll,
    Select,
    Apply,
    Compensate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Submit => f.write_str("submit"),
            Stage::Poll => f.write_str("poll"),
            Stage::Select => f.write_str("select"),
            Stage::Apply => f.write_str("apply"),
            Stage::Compensate => f.write_str("compensate"),
        }
    }
}

/// Errors terminal for one saga run. None of them are retried within the
/// run; transient or not, the run is over.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("polling timed out after {attempts} attempts over {elapsed:?}")]
    Timeout { attempts: u32, elapsed: Duration },

    #[error("generation finished with no artifacts")]
    NoArtifacts,

    #[error("chosen artifact lost its download reference")]
    MissingDownload,

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("run cancelled")]
    Cancelled,
}

/// Terminal outcome of a run.
#[derive(Debug)]
pub enum SagaOutcome {
    /// The target resource now reflects the applied artifact.
    Applied {
        artifact_id: String,
        applied_ref: String,
    },
    /// The run failed at `stage`; the target resource is untouched.
    Failed { stage: Stage, error: SagaError },
}

/// What happened to the remote job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    /// No handle was ever obtained; nothing to clean up.
    NotRequired,
    /// The remote job is gone (deleted now, or already absent).
    Deleted,
    /// The delete attempt failed; the remote job may need manual cleanup.
    Failed(String),
}

/// Result of one saga run.
#[derive(Debug)]
pub struct SagaResult {
    pub run_id: Uuid,
    pub outcome: SagaOutcome,
    pub compensation: Compensation,
    /// Poll attempts made, for diagnostics.
    pub attempts: u32,
}

impl SagaResult {
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, SagaOutcome::Applied { .. })
    }

    /// Stage of the failure, if the run failed.
    pub fn failed_stage(&self) -> Option<Stage> {
        match &self.outcome {
            SagaOutcome::Applied { .. } => None,
            SagaOutcome::Failed { stage, .. } => Some(*stage),
        }
    }
}

/// Observe-only progress hook.
///
/// Observers see stage transitions and poll attempts; they can neither
/// decide nor mutate, and correctness never depends on one being installed.
pub trait SagaObserver: Send + Sync {
    /// A stage is about to run.
    fn on_stage(&self, run_id: Uuid, stage: Stage) {
        let _ = (run_id, stage);
    }

    /// A poll attempt finished without a chosen artifact.
    fn on_poll(&self, run_id: Uuid, attempt: u32, ready: usize, pending: usize) {
        let _ = (run_id, attempt, ready, pending);
    }
}

/// Orchestrates generation runs end to end.
///
/// Holds no per-run state; a single saga value can serve any number of
/// concurrent runs for distinct targets.
pub struct GenerationSaga {
    client: Arc<dyn RemoteJobClient>,
    applier: Arc<dyn ReplacementApplier>,
    config: SagaConfig,
    observer: Option<Arc<dyn SagaObserver>>,
}

impl GenerationSaga {
    pub fn new(
        client: Arc<dyn RemoteJobClient>,
        applier: Arc<dyn ReplacementApplier>,
        config: SagaConfig,
    ) -> Self {
        Self {
            client,
            applier,
            config,
            observer: None,
        }
    }

    /// Install a progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn SagaObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run one generation end to end.
    ///
    /// Steps execute strictly in order within the run; the only suspension
    /// points are network calls and the sleep between polls. `cancel` is
    /// honored before every network call and at each poll iteration, and a
    /// cancelled run still deletes the remote job if one was created.
    pub async fn run(&self, request: GenerationRequest, cancel: CancellationToken) -> SagaResult {
        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            target_ref = %request.target,
            role = %request.role,
            "generation run starting"
        );

        // Submit. No handle exists yet, so failure here has nothing to clean up.
        self.notify_stage(run_id, Stage::Submit);
        if cancel.is_cancelled() {
            return SagaResult {
                run_id,
                outcome: SagaOutcome::Failed {
                    stage: Stage::Submit,
                    error: SagaError::Cancelled,
                },
                compensation: Compensation::NotRequired,
                attempts: 0,
            };
        }

        let handle = match self.client.submit(&request).await {
            Ok(handle) => handle,
            Err(err) => {
                error!(run_id = %run_id, error = %err, "submission failed");
                return SagaResult {
                    run_id,
                    outcome: SagaOutcome::Failed {
                        stage: Stage::Submit,
                        error: err.into(),
                    },
                    compensation: Compensation::NotRequired,
                    attempts: 0,
                };
            }
        };
        info!(run_id = %run_id, handle = %handle, "generation submitted");

        let (outcome, attempts) = self.drive(run_id, &request, &handle, &cancel).await;

        self.notify_stage(run_id, Stage::Compensate);
        let compensation = self.compensate(run_id, &handle).await;

        match &outcome {
            SagaOutcome::Applied { applied_ref, .. } => {
                info!(run_id = %run_id, applied_ref = %applied_ref, attempts, "generation run applied");
            }
            SagaOutcome::Failed { stage, error } => {
                error!(run_id = %run_id, stage = %stage, error = %error, attempts, "generation run failed");
            }
        }

        SagaResult {
            run_id,
            outcome,
            compensation,
            attempts,
        }
    }

    /// Poll, select and apply. Runs only once a handle exists; the caller
    /// owns compensation.
    async fn drive(
        &self,
        run_id: Uuid,
        request: &GenerationRequest,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> (SagaOutcome, u32) {
        self.notify_stage(run_id, Stage::Poll);

        let poll_attempts = AtomicU32::new(0);
        let counter = &poll_attempts;
        let poll_result = poll_until(
            move || async move {
                let attempt = counter.fetch_add(1, Ordering::Relaxed) + 1;
                let snapshot = self.client.status(handle).await?;
                let selection = select_artifact(&snapshot);

                if let Some(chosen) = selection.chosen {
                    debug!(run_id = %run_id, artifact = %chosen.id, "artifact ready");
                    return Ok(Some(chosen));
                }
                if selection.is_empty() {
                    return Err(SagaError::NoArtifacts);
                }

                debug!(
                    run_id = %run_id,
                    attempt,
                    ready = selection.ready,
                    pending = selection.pending,
                    "artifacts still rendering"
                );
                self.notify_poll(run_id, attempt, selection.ready, selection.pending);
                Ok(None)
            },
            self.config.poll_interval,
            self.config.deadline,
            cancel,
        )
        .await;

        let attempts = poll_attempts.load(Ordering::Relaxed);
        let chosen = match poll_result {
            Ok(artifact) => artifact,
            Err(PollError::Timeout { attempts, elapsed }) => {
                return (
                    SagaOutcome::Failed {
                        stage: Stage::Poll,
                        error: SagaError::Timeout { attempts, elapsed },
                    },
                    attempts,
                );
            }
            Err(PollError::Cancelled { attempts }) => {
                return (
                    SagaOutcome::Failed {
                        stage: Stage::Poll,
                        error: SagaError::Cancelled,
                    },
                    attempts,
                );
            }
            Err(PollError::Check(err)) => {
                return (
                    SagaOutcome::Failed {
                        stage: Stage::Poll,
                        error: err,
                    },
                    attempts,
                );
            }
        };

        // The selector only hands back downloadable artifacts; anything else
        // here means the snapshot and the chosen artifact drifted apart.
        self.notify_stage(run_id, Stage::Select);
        if !chosen.is_downloadable() {
            return (
                SagaOutcome::Failed {
                    stage: Stage::Select,
                    error: SagaError::MissingDownload,
                },
                attempts,
            );
        }

        self.notify_stage(run_id, Stage::Apply);
        if cancel.is_cancelled() {
            return (
                SagaOutcome::Failed {
                    stage: Stage::Apply,
                    error: SagaError::Cancelled,
                },
                attempts,
            );
        }

        match self
            .applier
            .apply(&request.target, &chosen, self.config.payload_ceiling)
            .await
        {
            Ok(applied_ref) => (
                SagaOutcome::Applied {
                    artifact_id: chosen.id,
                    applied_ref,
                },
                attempts,
            ),
            Err(err) => (
                SagaOutcome::Failed {
                    stage: Stage::Apply,
                    error: err.into(),
                },
                attempts,
            ),
        }
    }

    /// Single best-effort delete of the remote job.
    ///
    /// Exactly one attempt per run, on every path that obtained a handle,
    /// including cancelled runs. The result is recorded, never escalated.
    async fn compensate(&self, run_id: Uuid, handle: &JobHandle) -> Compensation {
        match self.client.delete(handle).await {
            Ok(()) => {
                debug!(run_id = %run_id, handle = %handle, "remote job deleted");
                Compensation::Deleted
            }
            Err(err) if err.is_not_found() => {
                warn!(run_id = %run_id, handle = %handle, "remote job already gone");
                Compensation::Deleted
            }
            Err(err) => {
                warn!(run_id = %run_id, handle = %handle, error = %err, "failed to delete remote job");
                Compensation::Failed(err.to_string())
            }
        }
    }

    fn notify_stage(&self, run_id: Uuid, stage: Stage) {
        if let Some(observer) = &self.observer {
            observer.on_stage(run_id, stage);
        }
    }

    fn notify_poll(&self, run_id: Uuid, attempt: u32, ready: usize, pending: usize) {
        if let Some(observer) = &self.observer {
            observer.on_poll(run_id, attempt, ready, pending);
        }
    }
}

/// One-shot form of [`GenerationSaga::run`] for callers that do not keep a
/// saga value around.
pub async fn run_generation_saga(
    client: Arc<dyn RemoteJobClient>,
    applier: Arc<dyn ReplacementApplier>,
    request: GenerationRequest,
    config: SagaConfig,
    cancel: CancellationToken,
) -> SagaResult {
    GenerationSaga::new(client, applier, config).run(request, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use crate::testing::{pending_artifact, ready_artifact, RecordingApplier, ScriptedClient};
    use crate::types::{ImageRole, TargetRef};

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "a lighthouse at dusk".into(),
            target: TargetRef("posts/lighthouse/hero.png".into()),
            role: ImageRole::Hero,
        }
    }

    fn saga(client: &Arc<ScriptedClient>, applier: &Arc<RecordingApplier>) -> GenerationSaga {
        GenerationSaga::new(client.clone(), applier.clone(), SagaConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_applied_after_pending_polls() {
        let client = Arc::new(ScriptedClient::new("job-h1"));
        client.push_status(vec![pending_artifact("img-1")]);
        client.push_status(vec![pending_artifact("img-1")]);
        client.push_status(vec![ready_artifact("img-1")]);
        let applier = Arc::new(RecordingApplier::succeeding());

        let result = saga(&client, &applier)
            .run(request(), CancellationToken::new())
            .await;

        match result.outcome {
            SagaOutcome::Applied {
                artifact_id,
                applied_ref,
            } => {
                assert_eq!(artifact_id, "img-1");
                assert_eq!(applied_ref, "applied://posts/lighthouse/hero.png");
            }
            other => panic!("expected applied, got {:?}", other),
        }
        assert_eq!(result.attempts, 3);
        assert_eq!(result.compensation, Compensation::Deleted);
        assert_eq!(client.delete_calls(), 1);
        assert_eq!(applier.apply_count(), 1);
        // The configured ceiling reaches the applier unchanged.
        assert_eq!(applier.calls()[0].2, 10 * 1024 * 1024);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_still_compensates() {
        // Unscripted client: every poll answers with a pending artifact.
        let client = Arc::new(ScriptedClient::new("job-h2"));
        let applier = Arc::new(RecordingApplier::succeeding());

        let result = saga(&client, &applier)
            .run(request(), CancellationToken::new())
            .await;

        match result.outcome {
            SagaOutcome::Failed {
                stage: Stage::Poll,
                error: SagaError::Timeout { attempts, .. },
            } => assert_eq!(attempts, 5),
            other => panic!("expected poll timeout, got {:?}", other),
        }
        assert_eq!(client.delete_calls(), 1);
        assert_eq!(applier.apply_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_failure_skips_compensation() {
        let client = Arc::new(ScriptedClient::new("job-h3"));
        client.fail_submit(ClientError::Transport("connection refused".into()));
        let applier = Arc::new(RecordingApplier::succeeding());

        let result = saga(&client, &applier)
            .run(request(), CancellationToken::new())
            .await;

        assert!(matches!(
            result.outcome,
            SagaOutcome::Failed {
                stage: Stage::Submit,
                error: SagaError::Client(ClientError::Transport(_)),
            }
        ));
        assert_eq!(result.compensation, Compensation::NotRequired);
        assert_eq!(client.delete_calls(), 0);
        assert_eq!(applier.apply_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_snapshot_fails_without_more_polling() {
        let client = Arc::new(ScriptedClient::new("job-h4"));
        client.push_status(vec![]);
        let applier = Arc::new(RecordingApplier::succeeding());

        let result = saga(&client, &applier)
            .run(request(), CancellationToken::new())
            .await;

        assert!(matches!(
            result.outcome,
            SagaOutcome::Failed {
                stage: Stage::Poll,
                error: SagaError::NoArtifacts,
            }
        ));
        assert_eq!(client.status_calls(), 1);
        assert_eq!(client.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_apply_failure_still_compensates() {
        let client = Arc::new(ScriptedClient::new("job-h5"));
        client.push_status(vec![ready_artifact("img-1")]);
        let applier = Arc::new(RecordingApplier::failing(ApplyError::PayloadTooLarge {
            actual: 15 * 1024 * 1024,
            ceiling: 10 * 1024 * 1024,
        }));

        let result = saga(&client, &applier)
            .run(request(), CancellationToken::new())
            .await;

        assert!(matches!(
            result.outcome,
            SagaOutcome::Failed {
                stage: Stage::Apply,
                error: SagaError::Apply(ApplyError::PayloadTooLarge { .. }),
            }
        ));
        assert_eq!(client.delete_calls(), 1);
        assert_eq!(applier.apply_count(), 1);
    }

    #[tokio::test]
    async fn test_status_error_stops_polling() {
        let client = Arc::new(ScriptedClient::new("job-h6"));
        client.push_status_error(ClientError::Transport("connection reset".into()));
        let applier = Arc::new(RecordingApplier::succeeding());

        let result = saga(&client, &applier)
            .run(request(), CancellationToken::new())
            .await;

        assert!(matches!(
            result.outcome,
            SagaOutcome::Failed {
                stage: Stage::Poll,
                error: SagaError::Client(_),
            }
        ));
        assert_eq!(client.status_calls(), 1);
        assert_eq!(client.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_failure_never_overrides_success() {
        let client = Arc::new(ScriptedClient::new("job-h7"));
        client.push_status(vec![ready_artifact("img-1")]);
        client.fail_delete(ClientError::Api {
            status: 500,
            message: "server exploded".into(),
        });
        let applier = Arc::new(RecordingApplier::succeeding());

        let result = saga(&client, &applier)
            .run(request(), CancellationToken::new())
            .await;

        assert!(result.is_applied());
        assert!(matches!(result.compensation, Compensation::Failed(_)));
        assert_eq!(client.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_not_found_is_tolerated() {
        let client = Arc::new(ScriptedClient::new("job-h8"));
        client.push_status(vec![ready_artifact("img-1")]);
        client.fail_delete(ClientError::Api {
            status: 404,
            message: "no such generation".into(),
        });
        let applier = Arc::new(RecordingApplier::succeeding());

        let result = saga(&client, &applier)
            .run(request(), CancellationToken::new())
            .await;

        assert!(result.is_applied());
        assert_eq!(result.compensation, Compensation::Deleted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_still_compensates() {
        let client = Arc::new(ScriptedClient::new("job-h9"));
        let applier = Arc::new(RecordingApplier::succeeding());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let sut = saga(&client, &applier);
        let run = sut.run(request(), cancel);
        let canceller = async move {
            tokio::time::sleep(Duration::from_secs(90)).await;
            trigger.cancel();
        };
        let (result, ()) = tokio::join!(run, canceller);

        assert!(matches!(
            result.outcome,
            SagaOutcome::Failed {
                stage: Stage::Poll,
                error: SagaError::Cancelled,
            }
        ));
        assert_eq!(client.delete_calls(), 1);
        assert_eq!(applier.apply_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_before_submit_needs_no_compensation() {
        let client = Arc::new(ScriptedClient::new("job-h10"));
        let applier = Arc::new(RecordingApplier::succeeding());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = saga(&client, &applier).run(request(), cancel).await;

        assert!(matches!(
            result.outcome,
            SagaOutcome::Failed {
                stage: Stage::Submit,
                error: SagaError::Cancelled,
            }
        ));
        assert_eq!(result.compensation, Compensation::NotRequired);
        assert_eq!(client.submit_calls(), 0);
        assert_eq!(client.delete_calls(), 0);
    }

    struct RecordingObserver {
        stages: Mutex<Vec<Stage>>,
    }

    impl SagaObserver for RecordingObserver {
        fn on_stage(&self, _run_id: Uuid, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }
    }

    #[tokio::test]
    async fn test_observer_sees_stage_progression() {
        let client = Arc::new(ScriptedClient::new("job-h11"));
        client.push_status(vec![ready_artifact("img-1")]);
        let applier = Arc::new(RecordingApplier::succeeding());
        let observer = Arc::new(RecordingObserver {
            stages: Mutex::new(Vec::new()),
        });

        let result = saga(&client, &applier)
            .with_observer(observer.clone())
            .run(request(), CancellationToken::new())
            .await;

        assert!(result.is_applied());
        assert_eq!(
            *observer.stages.lock().unwrap(),
            vec![
                Stage::Submit,
                Stage::Poll,
                Stage::Select,
                Stage::Apply,
                Stage::Compensate,
            ]
        );
    }

    #[tokio::test]
    async fn test_one_shot_form() {
        let client = Arc::new(ScriptedClient::new("job-h12"));
        client.push_status(vec![ready_artifact("img-1")]);
        let applier = Arc::new(RecordingApplier::succeeding());

        let result = run_generation_saga(
            client.clone(),
            applier.clone(),
            request(),
            SagaConfig::default(),
            CancellationToken::new(),
        )
        .await;

        assert!(result.is_applied());
        assert_eq!(result.failed_stage(), None);
        assert_eq!(client.delete_calls(), 1);
    }
}
