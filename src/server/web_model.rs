// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! REST API request and response models.

use crate::controller::ControllerConfig;
use crate::errors::ServiceError;
use crate::registry::{self, DeviceRegistry};
use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::{Error, HttpRequest, HttpResponse, ResponseError, error};
use serde::{Deserialize, Serialize};

/// Rest API response
#[derive(Debug, Serialize)]
pub struct ApiResponse<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
}

impl<'a> ApiResponse<'a> {
    pub fn new(code: &'a str, message: &'a str) -> ApiResponse<'a> {
        ApiResponse {
            code: Some(code),
            message: Some(message),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeviceAddress {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceList {
    pub devices: Vec<String>,
    pub count: usize,
    pub summary: String,
}

impl From<Vec<String>> for DeviceList {
    fn from(devices: Vec<String>) -> Self {
        Self {
            count: devices.len(),
            summary: registry::summary(&devices),
            devices,
        }
    }
}

impl From<&DeviceRegistry> for DeviceList {
    /// Snapshot of the registry. All fields are derived from a single read.
    fn from(registry: &DeviceRegistry) -> Self {
        Self::from(registry.list())
    }
}

#[derive(Debug, Deserialize)]
pub struct MoodRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigUpdate {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub model: String,
    pub url: String,
    pub api_key_set: bool,
}

impl From<ControllerConfig> for ConfigResponse {
    fn from(config: ControllerConfig) -> Self {
        Self {
            model: config.model().to_string(),
            url: config.base_url().to_string(),
            api_key_set: config.has_api_key(),
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::LanguageModel(_) | ServiceError::Transport(_) => StatusCode::BAD_GATEWAY,
            ServiceError::InternalServerError(_)
            | ServiceError::SerializationError(_)
            | ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = match self {
            ServiceError::BadRequest(_) => "BAD_REQUEST",
            ServiceError::Configuration(_) => "CONFIGURATION_ERROR",
            ServiceError::LanguageModel(_) => "LANGUAGE_MODEL_ERROR",
            ServiceError::Transport(_) => "TRANSPORT_ERROR",
            ServiceError::Storage(_) => "STORAGE_ERROR",
            ServiceError::InternalServerError(_) | ServiceError::SerializationError(_) => {
                "INTERNAL_ERROR"
            }
        };
        HttpResponse::build(self.status_code()).json(ApiResponse::new(code, &self.to_string()))
    }
}

pub fn json_error_handler(err: error::JsonPayloadError, _: &HttpRequest) -> Error {
    let message = err.to_string();

    let resp = match &err {
        JsonPayloadError::ContentType => HttpResponse::UnsupportedMediaType()
            .json(ApiResponse::new("UNSUPPORTED_MEDIA_TYPE", &message[..])),
        JsonPayloadError::Deserialize(json_err) if json_err.is_data() => {
            HttpResponse::UnprocessableEntity().json(ApiResponse::new("INVALID_JSON", &message[..]))
        }
        _ => HttpResponse::BadRequest().json(ApiResponse::new("BAD_REQUEST", &message[..])),
    };

    error::InternalError::from_response(err, resp).into()
}
