// Copyright (c) 2025 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Actix message handler for [SendPreset].

use crate::command::LightingCommand;
use crate::controller::handler::{notify, report_dispatch, start_dispatch};
use crate::controller::{MoodController, MoodEvent, MoodOutcome, SendPreset};
use crate::errors::ServiceError;
use crate::util::color::contrasting_color;
use actix::prelude::Recipient;
use actix::{Handler, ResponseFuture, fut};
use actix_web::web;
use log::{info, warn};

const PRESET_EXPLANATION: &str = "Preset applied";

impl Handler<SendPreset> for MoodController {
    type Result = ResponseFuture<Result<MoodOutcome, ServiceError>>;

    fn handle(&mut self, msg: SendPreset, _ctx: &mut Self::Context) -> Self::Result {
        let recipient = msg.recipient;
        if let Err(e) = msg.preset.validate() {
            return Box::pin(fut::err(failure(recipient.as_ref(), e)));
        }
        let registry = self.registry.clone();
        let devices = self.devices.clone();

        Box::pin(async move {
            // registry access is file I/O
            let addresses = match web::block(move || registry.list()).await {
                Ok(addresses) => addresses,
                Err(e) => return Err(failure(recipient.as_ref(), e.into())),
            };
            if addresses.is_empty() {
                let e = ServiceError::BadRequest("No device addresses registered".into());
                return Err(failure(recipient.as_ref(), e));
            }

            let command = LightingCommand::from(&msg.preset);
            let color = command.color();
            info!("Sending preset: {command}");
            let (status, handle) = start_dispatch(&devices, &command, &addresses);

            let outcome = MoodOutcome {
                command,
                status,
                explanation: PRESET_EXPLANATION.to_string(),
                color,
                accent: contrasting_color(color),
                devices: addresses.len(),
            };
            notify(recipient.as_ref(), MoodEvent::Completed(outcome.clone()));
            if let Some(handle) = handle {
                report_dispatch(handle, recipient);
            }

            Ok(outcome)
        })
    }
}

fn failure(recipient: Option<&Recipient<MoodEvent>>, error: ServiceError) -> ServiceError {
    warn!("Preset failed: {error}");
    notify(
        recipient,
        MoodEvent::Failed {
            message: error.to_string(),
        },
    );
    error
}
