use thiserror::Error;

/// A rejection the remote service made on purpose. Surfaced to the caller
/// verbatim; never a reason to fall back to the local store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// The remote, or the data store behind it, could not serve the request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectivityFailure {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Unparseable response: {0}")]
    Unparseable(String),

    #[error("Remote data store unavailable: {0}")]
    StoreDisconnected(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error(transparent)]
    Connectivity(#[from] ConnectivityFailure),

    #[error(transparent)]
    Rejected(#[from] ApiError),
}

impl RemoteError {
    pub fn is_connectivity_failure(&self) -> bool {
        matches!(self, RemoteError::Connectivity(_))
    }
}

impl From<reqwest::Error> for ConnectivityFailure {
    fn from(e: reqwest::Error) -> Self {
        ConnectivityFailure::Transport(e.to_string())
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Map a non-success status and the server's message to a rejection
    pub fn from_status(status: reqwest::StatusCode, message: &str) -> Self {
        let truncated = Self::truncate_body(message);
        match status.as_u16() {
            400 | 422 => ApiError::Validation(truncated),
            401 => ApiError::Unauthorized(truncated),
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            409 => ApiError::Conflict(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert_eq!(
            ApiError::from_status(StatusCode::CONFLICT, "Email already registered"),
            ApiError::Conflict("Email already registered".to_string())
        );
        assert_eq!(
            ApiError::from_status(StatusCode::BAD_REQUEST, "bad"),
            ApiError::Validation("bad".to_string())
        );
        assert_eq!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        );
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "oops"),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, "tea"),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let long = "é".repeat(400);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));

        assert_eq!(ApiError::truncate_body("short"), "short");
    }

    #[test]
    fn test_classification_flag() {
        let down = RemoteError::from(ConnectivityFailure::StoreDisconnected("x".to_string()));
        let rejected = RemoteError::from(ApiError::NotFound("meal".to_string()));
        assert!(down.is_connectivity_failure());
        assert!(!rejected.is_connectivity_failure());
    }
}
