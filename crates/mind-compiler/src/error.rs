//! Errors raised while compiling and (de)serializing target databases.

use mind_core::InputError;

/// Failure writing or reading a `.mind` buffer.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to encode database: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode database: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("unsupported database version {found}")]
    UnsupportedVersion { found: u32 },
}

/// Failure of a compile job.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Input image `index`, or a keyframe built from it, is malformed.
    #[error("input image {index} is invalid: {source}")]
    Input {
        index: usize,
        #[source]
        source: InputError,
    },

    /// The job's cancel token was triggered.
    #[error("compilation was cancelled")]
    Cancelled,

    /// The job was driven out of order.
    #[error("cannot {action} while the job is {stage:?}")]
    InvalidStage {
        action: &'static str,
        stage: crate::compiler::CompileStage,
    },

    #[error(transparent)]
    Export(#[from] ExportError),
}
