use std::path::PathBuf;

use crate::types::ShaderStageKind;

/// Failures that abort pipeline startup.
///
/// None of these are retried; the render loop never starts once one is
/// returned.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to compile {stage} shader:\n{log}")]
    CompileFailure {
        stage: ShaderStageKind,
        log: String,
    },

    #[error("failed to link shader program:\n{log}")]
    LinkFailure { log: String },

    #[error("rendering context unavailable: {reason}")]
    ContextUnavailable { reason: String },

    #[error("failed to create {resource}: {reason}")]
    ResourceCreationFailure {
        resource: &'static str,
        reason: String,
    },

    #[error("failed to read {stage} shader source at {}: {source}", path.display())]
    ShaderSourceUnavailable {
        stage: ShaderStageKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn compile(stage: ShaderStageKind, log: impl Into<String>) -> Self {
        PipelineError::CompileFailure {
            stage,
            log: non_empty_log(log.into(), "compiler reported no diagnostics"),
        }
    }

    pub(crate) fn link(log: impl Into<String>) -> Self {
        PipelineError::LinkFailure {
            log: non_empty_log(log.into(), "linker reported no diagnostics"),
        }
    }

    pub(crate) fn context(reason: impl Into<String>) -> Self {
        PipelineError::ContextUnavailable {
            reason: reason.into(),
        }
    }

    pub(crate) fn resource(resource: &'static str, reason: impl Into<String>) -> Self {
        PipelineError::ResourceCreationFailure {
            resource,
            reason: reason.into(),
        }
    }

    /// Diagnostic text attached to compile and link failures.
    pub fn log(&self) -> Option<&str> {
        match self {
            PipelineError::CompileFailure { log, .. } | PipelineError::LinkFailure { log } => {
                Some(log)
            }
            _ => None,
        }
    }
}

fn non_empty_log(log: String, fallback: &str) -> String {
    if log.trim().is_empty() {
        fallback.to_string()
    } else {
        log
    }
}
