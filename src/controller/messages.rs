// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Actix actor message definitions used to communicate with the [`MoodController`].
//!
//! Requests return their result directly. Progress notifications of a request are sent as
//! [`MoodEvent`] messages to the optional recipient of the request.

#[allow(unused_imports)] // used for doc links
use crate::controller::MoodController;
use crate::client::DispatchSummary;
use crate::command::{LightingCommand, Preset};
use crate::controller::ControllerConfig;
use crate::errors::ServiceError;
use crate::util::color::Rgb;
use actix::prelude::{Message, Recipient};
use serde::Serialize;

/// Translate a mood description into a lighting command and send it to all registered devices.
#[derive(Message)]
#[rtype(result = "Result<MoodOutcome, ServiceError>")]
pub struct ProcessMood {
    pub text: String,
    /// Receiver of the progress notifications.
    pub recipient: Option<Recipient<MoodEvent>>,
}

/// Send a fixed lighting preset to all registered devices.
#[derive(Message)]
#[rtype(result = "Result<MoodOutcome, ServiceError>")]
pub struct SendPreset {
    pub preset: Preset,
    pub recipient: Option<Recipient<MoodEvent>>,
}

/// Replace the language model configuration.
///
/// `None` values keep the current setting. Returns the new configuration.
#[derive(Message, Default)]
#[rtype(result = "ControllerConfig")]
pub struct Reconfigure {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Get the current language model configuration.
#[derive(Message)]
#[rtype(result = "ControllerConfig")]
pub struct GetConfig;

/// Successful result of a mood or preset request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodOutcome {
    pub command: LightingCommand,
    /// Human readable dispatch status.
    pub status: String,
    pub explanation: String,
    /// Display color of the command.
    pub color: Rgb,
    /// Accent color standing out on [`MoodOutcome::color`].
    pub accent: Rgb,
    /// Number of devices the command is being sent to.
    pub devices: usize,
}

/// Progress notification of a request.
///
/// A request produces at most one `ColorReady` followed by exactly one terminal `Completed` or
/// `Failed` event. A `DispatchReport` follows the terminal event once all device requests finished.
#[derive(Debug, Clone, PartialEq, Message)]
#[rtype(result = "()")]
pub enum MoodEvent {
    /// Command and color are known, devices have not been contacted yet.
    ColorReady { command: LightingCommand, color: Rgb },
    Completed(MoodOutcome),
    Failed { message: String },
    DispatchReport(DispatchSummary),
}
