// SPDX-License-Identifier: PolyForm-Shield-1.0

use thiserror::Error;

use model_runtime::FetchError;
use protocol::QualifiedName;

/// Why [`crate::LifecycleEngine::activate`] did not end with a ready model.
///
/// `UnknownModel` is a caller mistake and is raised before any side effect.
/// The other two are environment failures; by the time they are returned a
/// download or an eviction may already have happened.
#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("model '{0}' not found in configuration")]
    UnknownModel(String),

    #[error("failed to download {name}: {source}")]
    DownloadFailed {
        name: QualifiedName,
        #[source]
        source: FetchError,
    },

    #[error("{name} failed the readiness probe: {reason}")]
    ProbeFailed { name: QualifiedName, reason: String },
}

impl ActivationError {
    pub fn is_unknown_model(&self) -> bool {
        matches!(self, ActivationError::UnknownModel(_))
    }
}
