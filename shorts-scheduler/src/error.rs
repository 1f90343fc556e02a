use std::path::PathBuf;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that stop a run before or between uploads.
///
/// Failures of an individual upload are not represented here; they end the batch and are
/// reported through [`crate::publish::BatchReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stored credential could not be read, or neither refresh nor consent produced a token.
    #[error("could not obtain YouTube credentials")]
    Auth(#[source] BoxError),

    /// A configuration or state file exists but does not have the expected shape.
    #[error("{} is malformed", path.display())]
    Configuration {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Reading or writing local state failed.
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn auth(report: eyre::Report) -> Self {
        Self::Auth(report.into())
    }

    pub(crate) fn configuration(path: impl Into<PathBuf>, report: eyre::Report) -> Self {
        Self::Configuration {
            path: path.into(),
            source: report.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, report: eyre::Report) -> Self {
        Self::Io {
            context: context.into(),
            source: report.into(),
        }
    }
}
