use crate::domain::audio::AssemblyError;
use crate::domain::auth::AuthError;
use crate::domain::pipeline::{PipelineError, RunReport, RunStatus};
use crate::domain::tts::DispatchError;
use crate::infrastructure::config::ConfigError;
use crate::infrastructure::document::DocumentError;
use std::process::ExitCode;

/// Main application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Invalid input: {0}")]
    Input(#[from] DocumentError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Internal error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Process exit statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Internal,
    Usage,
    Setup,
    PartialFailure,
    InputFailure,
    Interrupted,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Internal => 1,
            ExitStatus::Usage => 2,
            ExitStatus::Setup => 3,
            ExitStatus::PartialFailure => 4,
            ExitStatus::InputFailure => 5,
            ExitStatus::Interrupted => 130,
        }
    }

    pub fn from_report(report: &RunReport) -> Self {
        match report.status {
            RunStatus::Completed => ExitStatus::Success,
            RunStatus::PartialFailure => ExitStatus::PartialFailure,
            RunStatus::Cancelled => ExitStatus::Interrupted,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

impl AppError {
    /// Get the exit status for this error
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Config(_) | Self::Auth(_) | Self::Setup(_) => ExitStatus::Setup,
            Self::Input(DocumentError::NotFound(_) | DocumentError::Unsupported { .. }) => ExitStatus::Usage,
            Self::Input(_) => ExitStatus::InputFailure,
            Self::Pipeline(error) => match error {
                PipelineError::Dispatch(DispatchError::Auth(_)) => ExitStatus::Setup,
                PipelineError::Dispatch(DispatchError::Worker(_)) => ExitStatus::Internal,
                PipelineError::Assembly(AssemblyError::UnsupportedFormat(_)) => ExitStatus::Usage,
                PipelineError::Segmentation(_) | PipelineError::Assembly(_) | PipelineError::Io { .. } => {
                    ExitStatus::InputFailure
                }
            },
            Self::Other(_) => ExitStatus::Internal,
        }
    }
}

/// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::text::SegmentationError;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes() {
        let cases = [
            (AppError::Config(ConfigError::Missing("YANDEX_KEY_ID")), 3),
            (AppError::Auth(AuthError::Exchange("down".to_string())), 3),
            (AppError::Input(DocumentError::NotFound(PathBuf::from("a.txt"))), 2),
            (AppError::Input(DocumentError::Encoding(PathBuf::from("a.txt"))), 5),
            (
                AppError::Pipeline(PipelineError::Segmentation(SegmentationError::NotSpeakable(
                    "empty".to_string(),
                ))),
                5,
            ),
            (
                AppError::Pipeline(PipelineError::Dispatch(DispatchError::Auth(
                    AuthError::RefreshLimitExceeded(5),
                ))),
                3,
            ),
            (AppError::Pipeline(PipelineError::Assembly(AssemblyError::NoAudio)), 5),
            (AppError::Other(anyhow::anyhow!("boom")), 1),
        ];

        for (error, code) in cases {
            assert_eq!(error.exit_status().code(), code, "{}", error);
        }
    }

    #[test]
    fn test_interrupted_is_130() {
        assert_eq!(ExitStatus::Interrupted.code(), 130);
        assert_eq!(ExitStatus::PartialFailure.code(), 4);
    }
}
