//! Error types for ccontext.

use crate::builder::BuildError;
use crate::chunker::PackError;
use crate::config::ConfigError;
use crate::exclude::ExcludeError;
use crate::output::OutputError;

/// Top-level error type for ccontext operations.
#[derive(Debug, thiserror::Error)]
pub enum CcontextError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("exclusion error: {0}")]
    Exclude(#[from] ExcludeError),

    #[error("walk error: {0}")]
    Build(#[from] BuildError),

    #[error("packing error: {0}")]
    Pack(#[from] PackError),

    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// Map an error to its exit code.
pub fn exit_code(error: &CcontextError) -> i32 {
    match error {
        CcontextError::Io(_) => 1,
        CcontextError::Config(_) => 2,
        CcontextError::Exclude(_) => 2,
        CcontextError::Build(_) => 3,
        CcontextError::Pack(_) => 4,
        CcontextError::Output(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes_distinguish_phases() {
        let config_err = CcontextError::Config(ConfigError::InvalidMaxTokens(0));
        let walk_err = CcontextError::Build(BuildError::NotFound(PathBuf::from("/missing")));
        assert_ne!(exit_code(&config_err), exit_code(&walk_err));
    }

    #[test]
    fn test_display_includes_cause() {
        let err = CcontextError::Build(BuildError::NotFound(PathBuf::from("/missing")));
        assert!(err.to_string().contains("/missing"));
    }
}
