//! Regenerate one image end to end against the real PixelMill API.
//!
//! Usage:
//!
//! ```text
//! PIXELMILL_API_TOKEN=... cargo run --example regenerate -- <content-root> <image-path> "<prompt>"
//! ```
//!
//! Ctrl-C cancels the run; the remote job is still cleaned up.

use std::sync::Arc;

use regen::pixelmill::PixelmillBackend;
use regen::{
    GenerationRequest, GenerationSaga, ImageFileApplier, ImageRole, SagaConfig, SagaOutcome,
    TargetRef,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let usage = "usage: regenerate <content-root> <image-path> <prompt>";
    let root = args.next().ok_or(usage)?;
    let target = args.next().ok_or(usage)?;
    let prompt = args.next().ok_or(usage)?;

    let client = pixelmill_client::PixelmillClient::from_env()?;
    let saga = GenerationSaga::new(
        Arc::new(PixelmillBackend::new(client)),
        Arc::new(ImageFileApplier::new(root)),
        SagaConfig::from_env(),
    );

    let cancel = CancellationToken::new();
    let ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ctrlc.cancel();
    });

    let request = GenerationRequest {
        prompt,
        target: TargetRef(target),
        role: ImageRole::Hero,
    };
    let result = saga.run(request, cancel).await;

    match result.outcome {
        SagaOutcome::Applied {
            artifact_id,
            applied_ref,
        } => {
            println!("applied artifact {} -> {}", artifact_id, applied_ref);
            Ok(())
        }
        SagaOutcome::Failed { stage, error } => {
            eprintln!("failed at {}: {}", stage, error);
            std::process::exit(1);
        }
    }
}
