use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl HarnessError {
    /// True when the harness understood the request but refused the event
    /// for its current state (unknown element, wrong element kind).
    pub fn is_rejection(&self) -> bool {
        matches!(self, HarnessError::Api { status, .. } if matches!(status, 404 | 409 | 422))
    }
}

impl From<reqwest::Error> for HarnessError {
    fn from(err: reqwest::Error) -> Self {
        HarnessError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_about_state_are_rejections() {
        for status in [404, 409, 422] {
            let err = HarnessError::Api {
                status,
                message: "nope".to_string(),
            };
            assert!(err.is_rejection(), "status {status}");
        }
    }

    #[test]
    fn server_and_network_errors_are_not_rejections() {
        let err = HarnessError::Api {
            status: 503,
            message: "down".to_string(),
        };
        assert!(!err.is_rejection());
        assert!(!HarnessError::Network("refused".to_string()).is_rejection());
    }
}
