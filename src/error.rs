use crate::database::error::DatabaseError;
use std::fmt;

/// Top level error kinds for the gateway service
#[derive(Debug, Clone)]
pub enum AppErrorKind {
    /// Missing or invalid configuration
    Configuration {
        message: String,
    },
    /// The payment processor rejected the request or was unreachable
    RemoteRequestFailed {
        provider: String,
        message: String,
    },
    /// The payment processor returned a response we could not decode
    RemoteProtocolError {
        provider: String,
    },
    /// Inbound webhook signature did not match the mode secret
    WebhookValidationFailed,
    /// Return-redirect token hash did not match
    IntegrityCheckFailed,
    /// No submission or correlation record matches the event
    SubmissionNotFound {
        submission: String,
    },
    /// A correlation record already exists for the submission
    DuplicateSubmission {
        submission: String,
    },
    /// Storage layer failure
    Database(DatabaseError),
    /// Anything else
    Internal {
        message: String,
    },
}

/// Result type for gateway operations
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
    pub is_retryable: bool,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        let is_retryable = match &kind {
            AppErrorKind::RemoteRequestFailed { .. } => true,
            AppErrorKind::Database(db) => db.is_retryable(),
            _ => false,
        };

        Self {
            kind,
            context: None,
            is_retryable,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::new(AppErrorKind::Configuration {
            message: message.into(),
        })
    }

    pub fn remote_request<S: Into<String>>(provider: &str, message: S) -> Self {
        Self::new(AppErrorKind::RemoteRequestFailed {
            provider: provider.to_string(),
            message: message.into(),
        })
    }

    pub fn remote_protocol(provider: &str) -> Self {
        Self::new(AppErrorKind::RemoteProtocolError {
            provider: provider.to_string(),
        })
    }

    pub fn submission_not_found<S: fmt::Display>(submission: S) -> Self {
        Self::new(AppErrorKind::SubmissionNotFound {
            submission: submission.to_string(),
        })
    }

    pub fn duplicate_submission<S: fmt::Display>(submission: S) -> Self {
        Self::new(AppErrorKind::DuplicateSubmission {
            submission: submission.to_string(),
        })
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(AppErrorKind::Internal {
            message: message.into(),
        })
    }

    pub fn is_retryable(&self) -> bool {
        self.is_retryable
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, AppErrorKind::SubmissionNotFound { .. })
    }

    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self.kind,
            AppErrorKind::WebhookValidationFailed | AppErrorKind::IntegrityCheckFailed
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            AppErrorKind::Configuration { message } => {
                format!("Configuration error: {}", message)
            }
            AppErrorKind::RemoteRequestFailed { provider, message } => {
                format!("{} request failed: {}", provider, message)
            }
            AppErrorKind::RemoteProtocolError { provider } => {
                format!(
                    "There was an issue connecting with {}. The response could not be decoded.",
                    provider
                )
            }
            AppErrorKind::WebhookValidationFailed => {
                "Webhook signature validation failed".to_string()
            }
            AppErrorKind::IntegrityCheckFailed => {
                "Return token integrity check failed".to_string()
            }
            AppErrorKind::SubmissionNotFound { submission } => {
                format!("Submission '{}' was not found", submission)
            }
            AppErrorKind::DuplicateSubmission { submission } => {
                format!(
                    "A correlation record for submission '{}' already exists",
                    submission
                )
            }
            AppErrorKind::Database(db) => db.to_string(),
            AppErrorKind::Internal { message } => {
                format!("Internal error: {}", message)
            }
        };

        if let Some(context) = &self.context {
            write!(f, "{} ({})", message, context)
        } else {
            write!(f, "{}", message)
        }
    }
}

impl std::error::Error for AppError {}

impl From<DatabaseError> for AppError {
    fn from(error: DatabaseError) -> Self {
        Self::new(AppErrorKind::Database(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_request_is_retryable() {
        let err = AppError::remote_request("PayFlexi", "connection reset");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_failures_are_not_retryable() {
        let err = AppError::new(AppErrorKind::WebhookValidationFailed);
        assert!(!err.is_retryable());
        assert!(err.is_validation_failure());
    }

    #[test]
    fn test_display_includes_context() {
        let err = AppError::submission_not_found(42).with_context("webhook callback");
        let rendered = err.to_string();
        assert!(rendered.contains("42"));
        assert!(rendered.contains("webhook callback"));
    }
}
