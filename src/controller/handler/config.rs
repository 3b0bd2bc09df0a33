// Copyright (c) 2025 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Actix message handlers for [Reconfigure] and [GetConfig].

use crate::controller::{ControllerConfig, GetConfig, MoodController, Reconfigure};
use actix::{Handler, MessageResult};
use log::info;

impl Handler<Reconfigure> for MoodController {
    type Result = MessageResult<Reconfigure>;

    fn handle(&mut self, msg: Reconfigure, _ctx: &mut Self::Context) -> Self::Result {
        self.config = self.config.reconfigure(msg.api_key, msg.model);
        info!("Language model configuration changed: {}", self.config);
        MessageResult(self.config.clone())
    }
}

impl Handler<GetConfig> for MoodController {
    type Result = MessageResult<GetConfig>;

    fn handle(&mut self, _: GetConfig, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.config.clone())
    }
}
