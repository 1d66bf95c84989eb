//! The error-code/error-string pair used across Attribute, Tree, Link and
//! Root (spec.md §7). Recoverable failures return `bool`/`Option` and log a
//! warning through this module's helpers; only an unrecognized Seed task tag
//! is escalated to a caller-visible, latched error (see `trees::Tree::get_error`,
//! which `node::Root::get_error` delegates to).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    NotFound,
    TypeMismatch,
    InvalidPath,
    NameCollision,
    StaleTimestamp,
    Locked,
    Timeout,
    TransportClosed,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{code:?}] {message}")]
pub struct SplashError {
    pub code: ErrorCode,
    pub message: String,
}

impl SplashError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        SplashError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TypeMismatch, message)
    }

    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPath, message)
    }

    pub fn name_collision(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NameCollision, message)
    }

    pub fn locked(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Locked, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

pub type SplashResult<T> = Result<T, SplashError>;

pub trait ErrExt<T> {
    fn splash_err(self, code: ErrorCode) -> SplashResult<T>;
}

impl<T, E: fmt::Display> ErrExt<T> for Result<T, E> {
    fn splash_err(self, code: ErrorCode) -> SplashResult<T> {
        self.map_err(|e| SplashError::new(code, e.to_string()))
    }
}

impl From<std::io::Error> for SplashError {
    fn from(err: std::io::Error) -> Self {
        SplashError::internal(err.to_string())
    }
}

impl<T> From<crossbeam::channel::SendError<T>> for SplashError {
    fn from(err: crossbeam::channel::SendError<T>) -> Self {
        SplashError::new(ErrorCode::TransportClosed, err.to_string())
    }
}

impl From<crossbeam::channel::RecvError> for SplashError {
    fn from(err: crossbeam::channel::RecvError) -> Self {
        SplashError::new(ErrorCode::TransportClosed, err.to_string())
    }
}
