use std::fmt;
use thiserror::Error;

/// Fatal failures: any of these aborts the whole report build.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("input error: {0}")]
    Input(String),
    #[error("output error: {0}")]
    Output(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("font error: {0}")]
    Font(String),
    #[error("embedding {path} page {page} failed: {error}")]
    EmbedAborted {
        path: String,
        page: usize,
        error: EmbedError,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Step of the embed pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbedStage {
    Resolve,
    Exists,
    Import,
}

impl EmbedStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedStage::Resolve => "resolve",
            EmbedStage::Exists => "exists",
            EmbedStage::Import => "import",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EmbedStage::Resolve => "resolve absolute path",
            EmbedStage::Exists => "check file existence",
            EmbedStage::Import => "embedding file",
        }
    }
}

impl fmt::Display for EmbedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recoverable failure while embedding one source page. Rendered in place of
/// the page content, never propagated past the document boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error occurred during {}: {cause}.", .stage.description())]
pub struct EmbedError {
    pub stage: EmbedStage,
    pub cause: String,
}

impl EmbedError {
    pub fn new(stage: EmbedStage, cause: impl Into<String>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_error_renders_stage_description() {
        let err = EmbedError::new(EmbedStage::Exists, "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Error occurred during check file existence: No such file or directory."
        );
        assert_eq!(err.stage.to_string(), "exists");
    }

    #[test]
    fn io_errors_convert_into_report_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ReportError = io.into();
        assert!(matches!(err, ReportError::Io(_)));
        assert_eq!(err.to_string(), "io error: denied");
    }
}
