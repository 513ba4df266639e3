use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Failure raised after a cluster mutation during an archival run.
///
/// Carries both index names so alerts and logs identify the affected
/// indices without re-deriving them from a backtrace. The wrapped cause is
/// exposed through `source()` and rendered by `anyhow`'s chain formatting.
#[derive(Debug)]
pub struct ArchivalError {
    pub message: String,
    pub index: Option<String>,
    pub new_index: Option<String>,
    pub cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl ArchivalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            index: None,
            new_index: None,
            cause: None,
        }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_new_index(mut self, new_index: impl Into<String>) -> Self {
        self.new_index = Some(new_index.into());
        self
    }

    pub fn with_cause(mut self, cause: anyhow::Error) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for ArchivalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(index) = &self.index {
            write!(f, " | index: {index}")?;
        }
        if let Some(new_index) = &self.new_index {
            write!(f, " | new_index: {new_index}")?;
        }
        Ok(())
    }
}

impl StdError for ArchivalError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

#[derive(Debug, Error)]
pub enum SunsetError {
    /// Bad or missing input, or a failed precondition check. Raised before
    /// any cluster mutation.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Post-reindex document counts diverged. The source index is the only
    /// intact copy at that point and must not be deleted.
    #[error(
        "document count mismatch: {index} holds {source_docs} docs but {new_index} holds {dest_docs}"
    )]
    DataLoss {
        index: String,
        new_index: String,
        source_docs: u64,
        dest_docs: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archival_error_display_names_both_indices() {
        let err = ArchivalError::new("failed to delete index")
            .with_index("telemetry-data")
            .with_new_index("telemetry-data-08062026");
        let rendered = err.to_string();
        assert!(rendered.contains("telemetry-data"));
        assert!(rendered.contains("telemetry-data-08062026"));
    }

    #[test]
    fn archival_error_source_preserves_cause() {
        let err = ArchivalError::new("failed to block writes")
            .with_index("telemetry-data")
            .with_cause(anyhow::anyhow!("connection refused"));
        let source = std::error::Error::source(&err).expect("cause");
        assert!(source.to_string().contains("connection refused"));
    }
}
