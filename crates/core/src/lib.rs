//! Shared primitives for all Rust crates in adtune.

#![forbid(unsafe_code)]

/// Ads-platform OAuth credential primitives.
pub mod credentials;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use credentials::{ApiCredentials, RefreshGrant};

/// Result type used across adtune crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Identifier of one optimization run, shared by every audit record it writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a random run identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a run identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RunId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Stable error classification used for retry decisions and alert routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Platform 5xx, timeout or rate limit. Safe to retry.
    TransientPlatform,
    /// Credential rejected by the platform.
    Auth,
    /// Malformed input, misconfigured thresholds or a rejected request.
    Validation,
    /// The audit log could not be written.
    AuditWrite,
    /// Secret stage labels changed underneath a rotation step.
    RotationConflict,
    /// Requested resource does not exist.
    NotFound,
    /// Unexpected failure.
    Internal,
}

impl ErrorKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransientPlatform => "transient_platform",
            Self::Auth => "auth",
            Self::Validation => "validation",
            Self::AuditWrite => "audit_write",
            Self::RotationConflict => "rotation_conflict",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "transient_platform" => Ok(Self::TransientPlatform),
            "auth" => Ok(Self::Auth),
            "validation" => Ok(Self::Validation),
            "audit_write" => Ok(Self::AuditWrite),
            "rotation_conflict" => Ok(Self::RotationConflict),
            "not_found" => Ok(Self::NotFound),
            "internal" => Ok(Self::Internal),
            _ => Err(AppError::Validation(format!("unknown error kind '{value}'"))),
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Credential is missing, expired or rejected by the platform.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Upstream failure expected to clear on retry (5xx, timeout).
    #[error("transient error: {0}")]
    Transient(String),

    /// Upstream rate limit was hit.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Audit log append failed. Fatal for the run.
    #[error("audit write error: {0}")]
    AuditWrite(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the taxonomy bucket for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::RotationConflict,
            Self::Unauthorized(_) => ErrorKind::Auth,
            Self::Transient(_) | Self::RateLimited(_) => ErrorKind::TransientPlatform,
            Self::AuditWrite(_) => ErrorKind::AuditWrite,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true when the operation may succeed if repeated later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited(_))
    }
}
