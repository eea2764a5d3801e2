//! Response bodies written back to the caller

use crate::validation::{BatchError, ValidationError};
use serde::{Deserialize, Serialize};

/// Code carried by every error body; callers distinguish failures by message
pub const ERROR_CODE: i32 = 0;

/// Success body: `{"puppy":true}`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub puppy: bool,
}

impl Verdict {
    pub const fn accepted() -> Self {
        Self { puppy: true }
    }
}

/// Failure body: `{"code":0,"message":"..."}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: ERROR_CODE,
            message: message.into(),
        }
    }
}

impl From<&ValidationError> for ErrorBody {
    fn from(err: &ValidationError) -> Self {
        Self::new(err.to_string())
    }
}

/// The record index stays out of the body; only the defect is reported.
impl From<&BatchError> for ErrorBody {
    fn from(err: &BatchError) -> Self {
        Self::from(&err.error)
    }
}
