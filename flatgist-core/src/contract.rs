//! # contract: data model and the publishing seam
//!
//! Plain data types shared by the flattener, the pipeline and publisher
//! implementations, plus the [`Publisher`] trait that the CLI implements against
//! the GitHub API and tests replace with [`MockPublisher`].
//!
//! Publishers report HTTP-level rejections as [`PublishOutcome::Rejected`]; only
//! transport faults (timeouts, DNS, refused connections) come back as `Err`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// One walked file. Created during the walk, consumed once its content is staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub source_path: PathBuf,
    /// Path relative to the walk root, OS-separator-delimited.
    pub relative_path: PathBuf,
    pub flat_name: String,
    pub content: String,
}

/// Value side of the gist `files` mapping. `content` is already escaped for a
/// JSON string literal (see [`crate::sanitize::json_safe`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GistFile {
    pub content: String,
}

/// Flat filename to file content. Ordered so payloads are reproducible.
pub type GistFiles = BTreeMap<String, GistFile>;

/// Request for creating a gist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GistPayload {
    pub description: String,
    pub public: bool,
    pub files: GistFiles,
}

impl GistPayload {
    pub fn new(description: impl Into<String>, files: GistFiles) -> Self {
        Self {
            description: description.into(),
            public: true,
            files,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// JSON body for the create request. File contents are embedded verbatim
    /// as string literal bodies, so the API stores the text they were escaped from.
    pub fn to_request_body(&self) -> Result<String, serde_json::Error> {
        let files = self
            .files
            .iter()
            .map(|(name, file)| {
                RawValue::from_string(format!("\"{}\"", file.content))
                    .map(|content| (name.as_str(), RequestFile { content }))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        serde_json::to_string(&RequestBody {
            description: &self.description,
            public: self.public,
            files,
        })
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    description: &'a str,
    public: bool,
    files: BTreeMap<&'a str, RequestFile>,
}

#[derive(Serialize)]
struct RequestFile {
    content: Box<RawValue>,
}

/// Result of a publish attempt that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Created { url: String },
    Rejected { message: String },
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Created { .. })
    }
}

/// Request quota reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    /// Unix timestamp at which the window resets.
    pub reset: u64,
    #[serde(default)]
    pub used: u64,
}

pub type PublishError = Box<dyn std::error::Error + Send + Sync>;

/// Destination for a flattened payload.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Create a gist from the payload, authenticating with `token`.
    async fn publish(
        &self,
        payload: &GistPayload,
        token: &str,
    ) -> Result<PublishOutcome, PublishError>;

    /// HTTP status of the API root, used as a reachability check.
    async fn check_connection(&self) -> Result<u16, PublishError>;

    /// Current request quota for `token`.
    async fn rate_limit(&self, token: &str) -> Result<RateLimit, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of(name: &str, text: &str) -> GistPayload {
        let mut files = GistFiles::new();
        files.insert(
            name.to_string(),
            GistFile {
                content: crate::sanitize::json_safe(text),
            },
        );
        GistPayload::new("demo", files)
    }

    #[test]
    fn request_body_has_gist_api_shape_and_original_text() {
        let text = "print(\"hi\")\n\tcafé 😀\\n";
        let body = payload_of("src_main.py", text).to_request_body().unwrap();

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "description": "demo",
                "public": true,
                "files": { "src_main.py": { "content": text } }
            })
        );
    }

    #[test]
    fn request_body_does_not_escape_content_twice() {
        let body = payload_of("a.txt", "line1\nline2").to_request_body().unwrap();
        assert!(body.contains(r#""content":"line1\nline2""#), "{body}");
        assert!(!body.contains(r"\\n"), "{body}");
    }

    #[test]
    fn rate_limit_tolerates_missing_used_field() {
        let rate: RateLimit =
            serde_json::from_str(r#"{"limit":60,"remaining":59,"reset":1700000000}"#).unwrap();
        assert_eq!(rate.used, 0);
        assert_eq!(rate.remaining, 59);
    }
}
