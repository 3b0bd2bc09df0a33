// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Central controller translating moods into lighting commands and sending them to the devices.

mod config;
mod handler;
mod messages;

pub use config::*;
pub use messages::*;

#[cfg(test)]
pub(crate) use handler::tests as handler_tests;

use crate::client::{DeviceClient, LanguageModelClient};
use crate::configuration::Settings;
use crate::registry::DeviceRegistry;
use actix::prelude::{Actor, Context};
use log::info;

pub struct MoodController {
    /// Active language model configuration. Replaced, never modified.
    config: ControllerConfig,
    registry: DeviceRegistry,
    llm: LanguageModelClient,
    devices: DeviceClient,
}

impl MoodController {
    pub fn new(
        config: ControllerConfig,
        registry: DeviceRegistry,
        llm: LanguageModelClient,
        devices: DeviceClient,
    ) -> Self {
        Self {
            config,
            registry,
            llm,
            devices,
        }
    }

    /// Create a controller with clients from the given settings.
    pub fn from_settings(
        settings: &Settings,
        config: ControllerConfig,
        registry: DeviceRegistry,
    ) -> Self {
        Self::new(
            config,
            registry,
            LanguageModelClient::new(&settings.llm),
            DeviceClient::new(&settings.devices),
        )
    }
}

impl Actor for MoodController {
    type Context = Context<Self>;

    fn started(&mut self, _: &mut Self::Context) {
        info!("Mood controller started: {}", self.config);
    }
}
