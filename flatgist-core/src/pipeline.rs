//! Orchestration: preflight → flatten → publish.
//!
//! Fail-fast: the first failing step ends the run with a [`PipelineError`] that
//! names the stage. A flatten run that selects no files is a no-op and nothing
//! is sent to the publisher. No retries happen here; those belong to the
//! [`Publisher`] implementation if anywhere.

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::FlattenConfig;
use crate::contract::{GistPayload, PublishOutcome, Publisher, RateLimit};
use crate::error::FlattenError;
use crate::flatten::{flatten, FlattenOutput};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("GitHub token must not be empty")]
    EmptyToken,

    #[error("flatten failed at {} stage: {}", .0.stage(), .0)]
    Flatten(#[from] FlattenError),

    #[error("{stage} request failed: {message}")]
    Transport { stage: &'static str, message: String },
}

/// API reachability and quota observed before publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preflight {
    pub status: u16,
    pub rate_limit: RateLimit,
}

#[derive(Debug)]
pub struct PublishReport {
    pub flattened: FlattenOutput,
    pub preflight: Option<Preflight>,
    /// `None` when there was nothing to publish.
    pub outcome: Option<PublishOutcome>,
}

/// Per-run publish settings.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub description: String,
    pub token: String,
    pub preflight: bool,
}

/// The one precondition on credentials: the token is not blank.
pub fn validate_token(token: &str) -> Result<(), PipelineError> {
    if token.trim().is_empty() {
        error!("GitHub token is empty");
        return Err(PipelineError::EmptyToken);
    }
    Ok(())
}

/// Query API status and rate limit.
pub async fn preflight<P>(publisher: &P, token: &str) -> Result<Preflight, PipelineError>
where
    P: Publisher + ?Sized,
{
    let status = publisher.check_connection().await.map_err(|e| {
        error!(error = ?e, "API connection check failed");
        PipelineError::Transport {
            stage: "connection check",
            message: e.to_string(),
        }
    })?;
    info!(status, "Test GitHub API connection status code");

    let rate_limit = publisher.rate_limit(token).await.map_err(|e| {
        error!(error = ?e, "Rate limit query failed");
        PipelineError::Transport {
            stage: "rate limit",
            message: e.to_string(),
        }
    })?;
    info!(
        limit = rate_limit.limit,
        remaining = rate_limit.remaining,
        reset = rate_limit.reset,
        "Rate limit status"
    );
    if rate_limit.remaining == 0 {
        warn!(reset = rate_limit.reset, "Rate limit exhausted, publish will likely be rejected");
    }

    Ok(Preflight { status, rate_limit })
}

/// Flatten `config.source_dir` and publish the result as one gist.
pub async fn flatten_and_publish<P>(
    config: &FlattenConfig,
    settings: &PublishSettings,
    publisher: &P,
) -> Result<PublishReport, PipelineError>
where
    P: Publisher + ?Sized,
{
    info!("[PUBLISH] Starting flatten and publish pipeline");
    validate_token(&settings.token)?;

    let preflight = if settings.preflight {
        Some(preflight(publisher, &settings.token).await?)
    } else {
        None
    };

    let flattened = flatten(config)?;
    if flattened.is_empty() {
        info!("[PUBLISH] No files were added to the Gist");
        return Ok(PublishReport {
            flattened,
            preflight,
            outcome: None,
        });
    }

    let payload = GistPayload::new(settings.description.clone(), flattened.files.clone());
    info!(files = payload.files.len(), "[PUBLISH] Attempting to create Gist");
    let outcome = publisher
        .publish(&payload, &settings.token)
        .await
        .map_err(|e| {
            error!(error = ?e, "[PUBLISH][ERROR] Gist request failed");
            PipelineError::Transport {
                stage: "publish",
                message: e.to_string(),
            }
        })?;

    match &outcome {
        PublishOutcome::Created { url } => info!(url = %url, "[PUBLISH] Gist created successfully"),
        PublishOutcome::Rejected { message } => {
            error!(message = %message, "[PUBLISH][ERROR] Gist was rejected")
        }
    }

    Ok(PublishReport {
        flattened,
        preflight,
        outcome: Some(outcome),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_tokens_are_rejected() {
        assert!(matches!(validate_token(""), Err(PipelineError::EmptyToken)));
        assert!(matches!(validate_token("  \n"), Err(PipelineError::EmptyToken)));
        assert!(validate_token("ghp_abc").is_ok());
    }

    #[test]
    fn flatten_errors_convert_and_name_their_stage() {
        let err: PipelineError = FlattenError::NotFound("missing/src".into()).into();
        assert_eq!(
            err.to_string(),
            "flatten failed at source stage: source directory not found: missing/src"
        );
    }
}
