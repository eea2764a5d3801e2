//! Record validation rules

use crate::record::{ActivityType, CheckType, KeyValueEntry, Record, ValueKind};
use std::collections::HashSet;
use thiserror::Error;

/// Validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid checkType")]
    InvalidCheckType(String),

    #[error("invalid activityType")]
    InvalidActivityType(String),

    #[error("duplicate activityData key")]
    DuplicateKey(String),

    #[error("activityData value does not match its type")]
    TypeMismatch { key: String, kind: ValueKind },

    #[error("unsupported activityData type")]
    UnsupportedType { key: String, tag: String },
}

impl ValidationError {
    /// Short stable label for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::InvalidCheckType(_) => "check_type",
            ValidationError::InvalidActivityType(_) => "activity_type",
            ValidationError::DuplicateKey(_) => "duplicate_key",
            ValidationError::TypeMismatch { .. } => "type_mismatch",
            ValidationError::UnsupportedType { .. } => "unsupported_type",
        }
    }
}

/// A rejected batch: which record failed and why
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("record {index}: {error}")]
pub struct BatchError {
    pub index: usize,
    pub error: ValidationError,
}

/// Validate a checkType token
pub fn validate_check_type(value: &str) -> Result<CheckType, ValidationError> {
    CheckType::from_token(value).ok_or_else(|| ValidationError::InvalidCheckType(value.to_string()))
}

/// Validate an activityType token
pub fn validate_activity_type(value: &str) -> Result<ActivityType, ValidationError> {
    ActivityType::from_token(value)
        .ok_or_else(|| ValidationError::InvalidActivityType(value.to_string()))
}

/// Validate an activityData list
///
/// Entries are checked in order; the first duplicate key or badly typed
/// value rejects the whole list.
pub fn validate_activity_data(data: &[KeyValueEntry]) -> Result<(), ValidationError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(data.len());

    for entry in data {
        if !seen.insert(entry.key.as_str()) {
            return Err(ValidationError::DuplicateKey(entry.key.clone()));
        }

        let kind = ValueKind::from_tag(&entry.kind).ok_or_else(|| ValidationError::UnsupportedType {
            key: entry.key.clone(),
            tag: entry.kind.clone(),
        })?;

        if !kind.accepts(&entry.value) {
            return Err(ValidationError::TypeMismatch {
                key: entry.key.clone(),
                kind,
            });
        }
    }

    Ok(())
}

/// Validate a single record
///
/// checkType, then activityType, then activityData; the first failure wins.
pub fn validate_record(record: &Record) -> Result<(), ValidationError> {
    validate_check_type(&record.check_type)?;
    validate_activity_type(&record.activity_type)?;
    validate_activity_data(&record.activity_data)?;
    Ok(())
}

/// Validate a batch, stopping at the first invalid record
pub fn validate_batch(records: &[Record]) -> Result<(), BatchError> {
    for (index, record) in records.iter().enumerate() {
        validate_record(record).map_err(|error| BatchError { index, error })?;
    }
    Ok(())
}
