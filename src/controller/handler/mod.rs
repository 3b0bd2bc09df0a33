// Copyright (c) 2023 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Actix message handlers.

mod config;
mod mood;
mod preset;

use crate::client::{DeviceClient, DispatchHandle};
use crate::command::LightingCommand;
use crate::controller::MoodEvent;
use crate::errors::ServiceError;
use actix::prelude::Recipient;
use log::{error, info, warn};
use rust_fsm::*;

/// Status text if there are no devices to send the command to.
pub const STATUS_NO_DEVICES: &str = "No registered devices: dispatch skipped";

state_machine! {
    derive(Debug)
    MoodPipeline(Idle)

    Idle(Request) => Requesting,
    Requesting => {
        Response => Parsing,
        Error => Failed,
    },
    Parsing => {
        Parsed => Dispatching,
        Error => Failed,
    },
    Dispatching(Dispatched) => Completed,
}

/// Progress tracking and event notification of a single request.
struct RequestProgress {
    machine: StateMachine<MoodPipeline>,
    recipient: Option<Recipient<MoodEvent>>,
}

impl RequestProgress {
    fn new(recipient: Option<Recipient<MoodEvent>>) -> Self {
        Self {
            machine: StateMachine::new(),
            recipient,
        }
    }

    fn advance(&mut self, input: MoodPipelineInput) {
        if self.machine.consume(&input).is_err() {
            error!(
                "Invalid mood pipeline transition {input:?} in state {:?}",
                self.machine.state()
            );
        }
    }

    fn notify(&self, event: MoodEvent) {
        notify(self.recipient.as_ref(), event);
    }

    /// Terminate the request with a failure notification and return the error.
    fn fail(&mut self, command: Option<&LightingCommand>, error: ServiceError) -> ServiceError {
        self.advance(MoodPipelineInput::Error);
        let command = command.map(|c| c.as_str()).unwrap_or("N/A");
        warn!("Mood request failed: {error}");
        self.notify(MoodEvent::Failed {
            message: format!("Command: {command} / Error: {error}"),
        });
        error
    }
}

fn notify(recipient: Option<&Recipient<MoodEvent>>, event: MoodEvent) {
    if let Some(recipient) = recipient
        && let Err(e) = recipient.try_send(event)
    {
        error!("Error sending mood event: {e}");
    }
}

/// Start sending the command to the given devices and return the status text.
///
/// The dispatch is skipped if there are no addresses.
fn start_dispatch(
    devices: &DeviceClient,
    command: &LightingCommand,
    addresses: &[String],
) -> (String, Option<DispatchHandle>) {
    if addresses.is_empty() {
        warn!("{STATUS_NO_DEVICES}");
        return (STATUS_NO_DEVICES.to_string(), None);
    }
    let handle = devices.dispatch(command, addresses);
    (
        format!("OK: command sent to {} device(s)", handle.attempted()),
        Some(handle),
    )
}

/// Send a [`MoodEvent::DispatchReport`] once all device requests finished.
fn report_dispatch(handle: DispatchHandle, recipient: Option<Recipient<MoodEvent>>) {
    actix::spawn(async move {
        let summary = handle.summary().await;
        info!("Command dispatch finished: {summary}");
        notify(recipient.as_ref(), MoodEvent::DispatchReport(summary));
    });
}
