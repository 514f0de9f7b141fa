//! Error types for the hazard pipelines.

use thiserror::Error;

/// Errors produced by a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{pipeline} pipeline failed at {stage}: {source}")]
    Stage {
        pipeline: &'static str,
        stage: &'static str,
        #[source]
        source: georisk_core::Error,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// The underlying core error, if any
    pub fn core(&self) -> Option<&georisk_core::Error> {
        match self {
            PipelineError::Stage { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.core(), Some(georisk_core::Error::Cancelled))
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Attach the pipeline and stage to a core error.
pub(crate) trait StageContext<T> {
    fn stage(self, pipeline: &'static str, stage: &'static str) -> Result<T>;
}

impl<T> StageContext<T> for georisk_core::Result<T> {
    fn stage(self, pipeline: &'static str, stage: &'static str) -> Result<T> {
        self.map_err(|source| PipelineError::Stage {
            pipeline,
            stage,
            source,
        })
    }
}
