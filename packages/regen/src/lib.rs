//! Remote image generation saga.
//!
//! When a page's image needs regeneration, the dance with the remote
//! generation service is always the same: create a job, poll it within a
//! bounded time budget, download the first finished image, replace the
//! existing file, and delete the remote job whatever happened. This crate
//! implements that dance once, as a small saga with explicit compensation,
//! instead of re-growing ad-hoc copies of it at every call site.
//!
//! ```text
//! caller
//!   └─► GenerationSaga::run(request)
//!          ├─► RemoteJobClient::submit      ─► JobHandle
//!          ├─► poll_until(status + select)  ─► Artifact
//!          ├─► ReplacementApplier::apply    ─► applied ref
//!          └─► RemoteJobClient::delete      (always, best-effort)
//! ```
//!
//! A run either ends `Applied`, with the target resource replaced, or
//! `Failed` at a named stage with the target untouched. Either way the
//! remote job is deleted if it was ever created; a failed delete is a
//! warning on the result, never a change of outcome.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use regen::pixelmill::PixelmillBackend;
//! use regen::{
//!     GenerationRequest, GenerationSaga, ImageFileApplier, ImageRole, SagaConfig, TargetRef,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let client = pixelmill_client::PixelmillClient::from_env()?;
//! let saga = GenerationSaga::new(
//!     Arc::new(PixelmillBackend::new(client)),
//!     Arc::new(ImageFileApplier::new("content/")),
//!     SagaConfig::from_env(),
//! );
//!
//! let result = saga
//!     .run(
//!         GenerationRequest {
//!             prompt: "a lighthouse at dusk, oil on canvas".into(),
//!             target: TargetRef("posts/lighthouse/hero.png".into()),
//!             role: ImageRole::Hero,
//!         },
//!         CancellationToken::new(),
//!     )
//!     .await;
//! ```

pub mod apply;
pub mod client;
pub mod config;
pub mod pixelmill;
pub mod poll;
pub mod saga;
pub mod select;
pub mod testing;
pub mod types;

pub use apply::{ApplyError, ApplyResult, ImageFileApplier, ReplacementApplier};
pub use client::{ClientError, ClientResult, RemoteJobClient};
pub use config::SagaConfig;
pub use poll::{poll_until, PollError};
pub use saga::{
    run_generation_saga, Compensation, GenerationSaga, SagaError, SagaObserver, SagaOutcome,
    SagaResult, Stage,
};
pub use select::{select_artifact, Selection};
pub use types::{Artifact, GenerationRequest, ImageRole, JobHandle, Readiness, TargetRef};
