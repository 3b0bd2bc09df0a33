// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Custom application error with conversions from common Rust and 3rd-party errors.

use actix::MailboxError;
use actix_web::error::BlockingError;
use awc::error::{PayloadError, SendRequestError};
use derive_builder::UninitializedFieldError;
use derive_more::Display;
use log::error;

#[derive(Debug, Display, PartialEq)]
pub enum ServiceError {
    #[display("Internal server error: {_0}")]
    InternalServerError(String),

    #[display("Internal serialization error: {_0}")]
    SerializationError(String),

    #[display("BadRequest: {_0}")]
    BadRequest(String),

    /// Missing or invalid configuration, e.g. no language model credential.
    #[display("Configuration error: {_0}")]
    Configuration(String),

    /// Settings storage could not be read or written.
    #[display("Storage error: {_0}")]
    Storage(String),

    /// The language model request failed or returned an unusable response.
    #[display("Language model error: {_0}")]
    LanguageModel(String),

    /// Network error while talking to a remote endpoint.
    #[display("Transport error: {_0}")]
    Transport(String),
}

impl std::error::Error for ServiceError {}

impl From<std::io::Error> for ServiceError {
    fn from(e: std::io::Error) -> Self {
        ServiceError::Storage(e.to_string())
    }
}

impl From<MailboxError> for ServiceError {
    fn from(e: MailboxError) -> Self {
        ServiceError::InternalServerError(format!("Internal message error: {e:?}"))
    }
}

impl From<BlockingError> for ServiceError {
    fn from(e: BlockingError) -> Self {
        ServiceError::InternalServerError(format!("Blocking task error: {e}"))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        error!("{e:?}");
        ServiceError::SerializationError(e.to_string())
    }
}

impl From<SendRequestError> for ServiceError {
    fn from(e: SendRequestError) -> Self {
        ServiceError::Transport(e.to_string())
    }
}

impl From<PayloadError> for ServiceError {
    fn from(e: PayloadError) -> Self {
        ServiceError::Transport(format!("Error reading response body: {e}"))
    }
}

impl From<UninitializedFieldError> for ServiceError {
    fn from(e: UninitializedFieldError) -> Self {
        ServiceError::Configuration(format!("Missing field: {}", e.field_name()))
    }
}

impl From<url::ParseError> for ServiceError {
    fn from(e: url::ParseError) -> Self {
        ServiceError::Configuration(format!("Invalid URL: {e}"))
    }
}
