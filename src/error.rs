use std::path::PathBuf;
use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure to obtain content from a content source.
///
/// A slug that matches no post is not an error; see
/// [`Lookup::NotFound`](crate::content_source::Lookup::NotFound).
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content source request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("content source answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("content source rejected the query: {}", .0.join("; "))]
    Query(Vec<String>),

    #[error("content source returned a malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid front matter in {}: {message}", path.display())]
    FrontMatter { path: PathBuf, message: String },

    /// The same failure handed to every caller that waited on one fetch.
    #[error(transparent)]
    Shared(Arc<ContentError>),
}

impl ContentError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
