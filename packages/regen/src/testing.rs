//! Test doubles for saga runs.
//!
//! Scripted fakes for the transport and applier seams, used by this crate's
//! tests and available to downstream test code.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::apply::{ApplyError, ApplyResult, ReplacementApplier};
use crate::client::{ClientError, ClientResult, RemoteJobClient};
use crate::types::{Artifact, GenerationRequest, JobHandle, Readiness, TargetRef};

/// A ready artifact with a download reference.
pub fn ready_artifact(id: &str) -> Artifact {
    Artifact {
        id: id.into(),
        readiness: Readiness::Ready,
        download_url: Some(format!("https://cdn.example/{}.png", id)),
        width: Some(1024),
        height: Some(1024),
    }
}

/// An artifact still rendering.
pub fn pending_artifact(id: &str) -> Artifact {
    Artifact {
        id: id.into(),
        readiness: Readiness::Pending,
        download_url: None,
        width: None,
        height: None,
    }
}

/// Scripted [`RemoteJobClient`].
///
/// `status` pops scripted results in order. Once the script is exhausted it
/// keeps answering with a single pending artifact, so an unscripted client
/// polls until the deadline.
pub struct ScriptedClient {
    handle: JobHandle,
    submit_error: Mutex<Option<ClientError>>,
    statuses: Mutex<VecDeque<ClientResult<Vec<Artifact>>>>,
    delete_error: Mutex<Option<ClientError>>,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(handle: &str) -> Self {
        Self {
            handle: JobHandle(handle.into()),
            submit_error: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            delete_error: Mutex::new(None),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Queue one status snapshot.
    pub fn push_status(&self, snapshot: Vec<Artifact>) {
        self.statuses.lock().unwrap().push_back(Ok(snapshot));
    }

    /// Queue one failing status call.
    pub fn push_status_error(&self, error: ClientError) {
        self.statuses.lock().unwrap().push_back(Err(error));
    }

    /// Make the next `submit` call fail.
    pub fn fail_submit(&self, error: ClientError) {
        *self.submit_error.lock().unwrap() = Some(error);
    }

    /// Make the next `delete` call fail.
    pub fn fail_delete(&self, error: ClientError) {
        *self.delete_error.lock().unwrap() = Some(error);
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::Relaxed)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::Relaxed)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RemoteJobClient for ScriptedClient {
    async fn submit(&self, _request: &GenerationRequest) -> ClientResult<JobHandle> {
        self.submit_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.submit_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.handle.clone())
    }

    async fn status(&self, _handle: &JobHandle) -> ClientResult<Vec<Artifact>> {
        self.status_calls.fetch_add(1, Ordering::Relaxed);
        match self.statuses.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(vec![pending_artifact("img-pending")]),
        }
    }

    async fn delete(&self, _handle: &JobHandle) -> ClientResult<()> {
        self.delete_calls.fetch_add(1, Ordering::Relaxed);
        match self.delete_error.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Recording [`ReplacementApplier`] with a configurable outcome.
pub struct RecordingApplier {
    error: Mutex<Option<ApplyError>>,
    calls: Mutex<Vec<(TargetRef, String, u64)>>,
}

impl RecordingApplier {
    /// Applier that succeeds, answering with an `applied://` reference.
    pub fn succeeding() -> Self {
        Self {
            error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Applier whose next call fails with `error`.
    pub fn failing(error: ApplyError) -> Self {
        Self {
            error: Mutex::new(Some(error)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn apply_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Every `(target, artifact id, max_bytes)` triple seen so far.
    pub fn calls(&self) -> Vec<(TargetRef, String, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplacementApplier for RecordingApplier {
    async fn apply(
        &self,
        target: &TargetRef,
        artifact: &Artifact,
        max_bytes: u64,
    ) -> ApplyResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((target.clone(), artifact.id.clone(), max_bytes));
        if let Some(error) = self.error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(format!("applied://{}", target.0))
    }
}
