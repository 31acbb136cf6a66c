// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors for typed field extraction.

use thiserror::Error;

/// Errors raised when pulling typed scalars out of an untyped task map.
///
/// Only the strict extraction mode produces these; the lenient
/// float-with-default mode silently falls back instead (see
/// [`crate::extract::extract_float_or`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The field is absent from the map.
    #[error("missing field '{field}'")]
    Missing {
        /// Name of the absent field.
        field: String,
    },

    /// The field is present but its representation cannot be converted.
    #[error("field '{field}' has unsupported value: {detail}")]
    InvalidType {
        /// Name of the offending field.
        field: String,
        /// What was found instead of a convertible value.
        detail: String,
    },
}

impl ExtractError {
    /// Creates a missing-field error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    /// Creates an invalid-type error.
    pub fn invalid_type(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidType {
            field: field.into(),
            detail: detail.into(),
        }
    }

    /// Returns the name of the field the error refers to.
    pub fn field(&self) -> &str {
        match self {
            Self::Missing { field } | Self::InvalidType { field, .. } => field,
        }
    }
}
