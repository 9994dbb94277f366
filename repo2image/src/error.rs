use thiserror::Error;

/// Everything a build request can end in besides a built image.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Missing repo_url")]
    MissingRepoUrl,

    #[error("Invalid repository URL")]
    InvalidUrl,

    #[error("Docker service not available")]
    EngineUnavailable,

    #[error("Repository not found or private (needs access token)")]
    NotFoundOrPrivate,

    #[error("Authentication failed - use HTTPS with token")]
    AuthenticationFailed,

    #[error("Git clone failed: {0}")]
    CloneFailed(String),

    #[error("Image build failed: {0}")]
    BuildFailed(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    ServiceUnavailable,
    Fetch,
    Build,
    Unexpected,
}

impl BuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::MissingRepoUrl | BuildError::InvalidUrl => ErrorKind::Validation,
            BuildError::EngineUnavailable => ErrorKind::ServiceUnavailable,
            BuildError::NotFoundOrPrivate
            | BuildError::AuthenticationFailed
            | BuildError::CloneFailed(_) => ErrorKind::Fetch,
            BuildError::BuildFailed(_) => ErrorKind::Build,
            BuildError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// The HTTP status an inbound adapter should answer with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::ServiceUnavailable => 503,
            ErrorKind::Fetch | ErrorKind::Build | ErrorKind::Unexpected => 500,
        }
    }

    /// Message safe to hand back to the caller. Unexpected faults are
    /// reported generically; their details only go to the log.
    pub fn public_message(&self) -> String {
        match self {
            BuildError::Unexpected(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(BuildError::MissingRepoUrl.status_code(), 400);
        assert_eq!(BuildError::InvalidUrl.status_code(), 400);
        assert_eq!(BuildError::EngineUnavailable.status_code(), 503);
        assert_eq!(BuildError::NotFoundOrPrivate.status_code(), 500);
        assert_eq!(BuildError::CloneFailed("boom".into()).status_code(), 500);
        assert_eq!(BuildError::BuildFailed("boom".into()).status_code(), 500);
        assert_eq!(BuildError::Unexpected(anyhow!("boom")).status_code(), 500);
    }

    #[test]
    fn unexpected_errors_hide_details() {
        let err = BuildError::Unexpected(anyhow!("/var/lib/secret exploded"));
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn fetch_errors_keep_diagnostics() {
        let err = BuildError::CloneFailed("fatal: unable to access".into());
        assert_eq!(err.public_message(), "Git clone failed: fatal: unable to access");
        assert!(BuildError::NotFoundOrPrivate
            .public_message()
            .contains("not found or private"));
    }
}
