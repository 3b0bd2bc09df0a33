// Copyright (c) 2025 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Actix message handler for [ProcessMood].

use crate::command::{extract_command, extract_explanation, mood_prompt};
use crate::controller::handler::{
    MoodPipelineInput, RequestProgress, report_dispatch, start_dispatch,
};
use crate::controller::{MoodController, MoodEvent, MoodOutcome, ProcessMood};
use crate::errors::ServiceError;
use crate::util::color::contrasting_color;
use actix::{Handler, ResponseFuture};
use actix_web::web;
use log::{debug, info};

impl Handler<ProcessMood> for MoodController {
    type Result = ResponseFuture<Result<MoodOutcome, ServiceError>>;

    fn handle(&mut self, msg: ProcessMood, _ctx: &mut Self::Context) -> Self::Result {
        // snapshot: a reconfiguration doesn't affect this request
        let config = self.config.clone();
        let registry = self.registry.clone();
        let llm = self.llm.clone();
        let devices = self.devices.clone();

        Box::pin(async move {
            let mut progress = RequestProgress::new(msg.recipient);
            debug!("Processing mood: {}", msg.text);

            progress.advance(MoodPipelineInput::Request);
            let response = match llm.generate(&config, &mood_prompt(&msg.text)).await {
                Ok(response) => response,
                Err(e) => return Err(progress.fail(None, e)),
            };
            progress.advance(MoodPipelineInput::Response);

            let command = extract_command(&response);
            let explanation = extract_explanation(&response, &command);
            let color = command.color();
            info!("Lighting command: {command}, color: {color}");
            // registry access is file I/O
            let addresses = match web::block(move || registry.list()).await {
                Ok(addresses) => addresses,
                Err(e) => return Err(progress.fail(Some(&command), e.into())),
            };
            progress.advance(MoodPipelineInput::Parsed);
            progress.notify(MoodEvent::ColorReady {
                command: command.clone(),
                color,
            });

            let (status, handle) = start_dispatch(&devices, &command, &addresses);
            progress.advance(MoodPipelineInput::Dispatched);

            let outcome = MoodOutcome {
                command,
                status,
                explanation,
                color,
                accent: contrasting_color(color),
                devices: addresses.len(),
            };
            progress.notify(MoodEvent::Completed(outcome.clone()));
            if let Some(handle) = handle {
                report_dispatch(handle, progress.recipient);
            }

            Ok(outcome)
        })
    }
}
