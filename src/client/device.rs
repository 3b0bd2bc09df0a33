// Copyright (c) 2025 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Smart bulb command client.
//!
//! Commands are sent with the Tasmota HTTP API: `GET http://<address>/cm?cmnd=<command>`.

use crate::client::{new_http_client, with_retry};
use crate::command::LightingCommand;
use crate::configuration::{DeviceSettings, RetrySettings};
use crate::errors::ServiceError;
use actix_web::rt::task::JoinHandle;
use derive_more::Display;
use futures::future::join_all;
use log::{debug, error, info};
use serde::Serialize;
use url::form_urlencoded::byte_serialize;

/// Max accepted device response size.
const MAX_RESPONSE_SIZE: usize = 64 * 1024;

/// Delivery counts of a command dispatch.
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[display("attempted={attempted}, succeeded={succeeded}, failed={failed}")]
pub struct DispatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Handle of a running dispatch.
///
/// Dropping the handle doesn't cancel the device requests.
pub struct DispatchHandle {
    tasks: Vec<JoinHandle<bool>>,
}

impl DispatchHandle {
    pub fn attempted(&self) -> usize {
        self.tasks.len()
    }

    /// Wait until all device requests finished and count the results.
    pub async fn summary(self) -> DispatchSummary {
        let attempted = self.tasks.len();
        let succeeded = join_all(self.tasks)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(true)))
            .count();
        DispatchSummary {
            attempted,
            succeeded,
            failed: attempted - succeeded,
        }
    }
}

#[derive(Clone)]
pub struct DeviceClient {
    client: awc::Client,
    port: u16,
    retry: RetrySettings,
}

impl DeviceClient {
    pub fn new(settings: &DeviceSettings) -> Self {
        Self {
            client: new_http_client(settings.connection_timeout, settings.request_timeout),
            port: settings.port,
            retry: settings.retry,
        }
    }

    /// Device command URL. The command is form-urlencoded.
    pub fn command_url(&self, address: &str, command: &LightingCommand) -> String {
        let cmnd: String = byte_serialize(command.as_str().as_bytes()).collect();
        if self.port == 80 {
            format!("http://{address}/cm?cmnd={cmnd}")
        } else {
            format!("http://{address}:{}/cm?cmnd={cmnd}", self.port)
        }
    }

    /// Send the command to all addresses concurrently.
    ///
    /// Every address is handled in its own task and doesn't affect the others. Failures are only
    /// logged, the returned handle may be used to retrieve the delivery counts.
    pub fn dispatch(&self, command: &LightingCommand, addresses: &[String]) -> DispatchHandle {
        info!("Sending command '{command}' to {} device(s)", addresses.len());

        let tasks = addresses
            .iter()
            .map(|address| {
                let client = self.clone();
                let address = address.clone();
                let url = self.command_url(&address, command);
                actix_web::rt::spawn(async move {
                    match client.send(&address, &url).await {
                        Ok(delivered) => delivered,
                        Err(e) => {
                            error!("[{address}] Device command failed: {e}");
                            false
                        }
                    }
                })
            })
            .collect();

        DispatchHandle { tasks }
    }

    /// Send a single command request.
    ///
    /// Only transport errors are retried, including failures while reading the response body.
    /// Returns false if the device answered with an error status.
    async fn send(&self, address: &str, url: &str) -> Result<bool, ServiceError> {
        let name = format!("device {address}");
        with_retry(self.retry, &name, |_| self.request(address, url)).await
    }

    async fn request(&self, address: &str, url: &str) -> Result<bool, ServiceError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        // content is irrelevant, but an incomplete response is a transport error
        let body = response.body().limit(MAX_RESPONSE_SIZE).await?;
        if status.is_success() {
            debug!("[{address}] Command sent (response length: {})", body.len());
            Ok(true)
        } else {
            error!("[{address}] Device returned HTTP {}", status.as_u16());
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockServer;
    use crate::command::extract_command;
    use std::time::Duration;

    fn client(port: u16) -> DeviceClient {
        DeviceClient::new(&DeviceSettings {
            port,
            connection_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
            retry: RetrySettings {
                attempts: 2,
                delay: Duration::from_millis(10),
            },
            defaults: vec![],
        })
    }

    fn command() -> LightingCommand {
        extract_command("[COMMAND: HSBCOLOR 60,100,100;Dimmer 70;CT 250]")
    }

    #[test]
    fn command_url_encodes_command() {
        assert_eq!(
            "http://192.168.0.50/cm?cmnd=HSBCOLOR+60%2C100%2C100%3BDimmer+70%3BCT+250",
            client(80).command_url("192.168.0.50", &command())
        );
    }

    #[test]
    fn command_url_contains_custom_port() {
        assert!(
            client(8080)
                .command_url("10.0.0.1", &command())
                .starts_with("http://10.0.0.1:8080/cm?cmnd=")
        );
    }

    #[actix_web::test]
    async fn dispatch_sends_command_to_device() {
        let server = MockServer::respond_with(200, r#"{"POWER":"ON"}"#);

        let summary = client(server.port())
            .dispatch(&command(), &["127.0.0.1".to_string()])
            .summary()
            .await;

        assert_eq!(
            DispatchSummary {
                attempted: 1,
                succeeded: 1,
                failed: 0
            },
            summary
        );
        assert_eq!(
            vec!["GET /cm?cmnd=HSBCOLOR+60%2C100%2C100%3BDimmer+70%3BCT+250".to_string()],
            server.requests()
        );
    }

    #[actix_web::test]
    async fn error_status_is_not_retried() {
        let server = MockServer::respond_with(500, "");

        let summary = client(server.port())
            .dispatch(&command(), &["127.0.0.1".to_string()])
            .summary()
            .await;

        assert_eq!(1, summary.failed);
        assert_eq!(1, server.requests().len());
    }

    #[actix_web::test]
    async fn unreadable_response_is_retried_and_counted_as_failure() {
        let server = MockServer::respond_with(200, "x".repeat(MAX_RESPONSE_SIZE + 1));

        let summary = client(server.port())
            .dispatch(&command(), &["127.0.0.1".to_string()])
            .summary()
            .await;

        assert_eq!(
            DispatchSummary {
                attempted: 1,
                succeeded: 0,
                failed: 1
            },
            summary
        );
        assert_eq!(2, server.requests().len());
    }

    #[actix_web::test]
    async fn unreachable_device_does_not_affect_others() {
        let server = MockServer::respond_with(200, "{}");

        // the mock server only listens on 127.0.0.1
        let handle = client(server.port()).dispatch(
            &command(),
            &["127.0.0.2".to_string(), "127.0.0.1".to_string()],
        );
        assert_eq!(2, handle.attempted());
        let summary = handle.summary().await;

        assert_eq!(
            DispatchSummary {
                attempted: 2,
                succeeded: 1,
                failed: 1
            },
            summary
        );
        assert_eq!(1, server.requests().len());
    }

    #[actix_web::test]
    async fn dispatch_without_addresses_is_empty() {
        let summary = client(80).dispatch(&command(), &[]).summary().await;
        assert_eq!(DispatchSummary::default(), summary);
    }
}
