// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `homefleet` library.
//!
//! This module provides the error hierarchy for failures across the library:
//! durable store access, integration communication, command validation, and
//! device lookups. Each error maps to a [`StatusClass`] so a transport layer
//! can answer with the right kind of status without inspecting variants.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Device was not found in the registry.
    #[error("device not found")]
    DeviceNotFound,

    /// A command payload failed validation for the target device.
    #[error("{message}")]
    Validation {
        /// Human-readable description of the rejected payload.
        message: String,
    },

    /// Error occurred while accessing the durable device store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error occurred while talking to a physical integration.
    #[error("integration error: {0}")]
    Integration(#[from] IntegrationError),
}

impl Error {
    /// Creates a validation error with the given message.
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns the status class a transport layer should answer with.
    #[must_use]
    pub fn status_class(&self) -> StatusClass {
        match self {
            Self::DeviceNotFound => StatusClass::NotFound,
            Self::Validation { .. } => StatusClass::ClientError,
            Self::Store(_) | Self::Integration(_) => StatusClass::ServerError,
        }
    }
}

/// Coarse status classification for callers that translate errors into
/// transport responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The request itself was invalid (bad payload, unsupported action).
    ClientError,
    /// The addressed device does not exist.
    NotFound,
    /// The store or an upstream integration failed.
    ServerError,
}

/// Errors related to the durable device store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file could not be read.
    #[error("failed to read device store: {0}")]
    Read(#[source] std::io::Error),

    /// The store content is not well-formed JSON or not an array of devices.
    #[error("device store must contain an array of devices: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The store file could not be written.
    #[error("failed to persist device store: {0}")]
    Persist(#[source] std::io::Error),
}

/// Errors related to integration communication.
///
/// `Unreachable` and `Protocol` are recoverable at the caller's discretion:
/// reconciliation skips the device, the command path surfaces them as an
/// upstream failure. `Configuration` means retrying is pointless until the
/// device record is fixed.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// The device record's integration configuration is invalid.
    #[error("invalid integration configuration: {0}")]
    Configuration(String),

    /// The physical device could not be reached (connect failure or timeout).
    #[error("integration unreachable: {0}")]
    Unreachable(String),

    /// The physical device answered, but not with a usable response.
    #[error("integration protocol error: {0}")]
    Protocol(String),
}

impl IntegrationError {
    /// Classifies a `reqwest` failure: timeouts and connect errors mean the
    /// device is unreachable, anything else is a protocol-level failure.
    pub(crate) fn from_request(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Protocol(err.to_string())
        }
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
