// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! HTTP clients for the generative language API and the smart bulbs.

mod device;
mod llm;
#[cfg(test)]
pub(crate) mod mock;

pub use device::{DeviceClient, DispatchHandle, DispatchSummary};
pub use llm::LanguageModelClient;

use crate::USER_AGENT;
use crate::configuration::RetrySettings;
use crate::errors::ServiceError;
use actix_web::rt::time::sleep;
use log::warn;
use std::future::Future;
use std::time::Duration;

/// Create a new HTTP client.
///
/// - `connection_timeout`: max time to connect to the host, including TLS handshake.
/// - `request_timeout`: max time for the complete request.
///
/// TLS uses the rustls connector of awc with the webpki root certificates.
pub fn new_http_client(connection_timeout: Duration, request_timeout: Duration) -> awc::Client {
    awc::ClientBuilder::new()
        .connector(awc::Connector::new().timeout(connection_timeout))
        .timeout(request_timeout)
        .add_default_header(("User-Agent", USER_AGENT))
        .finish()
}

/// Call `operation` until it succeeds or the configured number of attempts is exhausted.
///
/// The delay between attempts is fixed. The error of the last attempt is returned.
pub async fn with_retry<T, F, Fut>(
    retry: RetrySettings,
    name: &str,
    mut operation: F,
) -> Result<T, ServiceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let attempts = retry.attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                warn!("[{name}] attempt {attempt}/{attempts} failed: {e}");
                sleep(retry.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn retry(attempts: u32) -> RetrySettings {
        RetrySettings {
            attempts,
            delay: Duration::from_millis(1),
        }
    }

    #[actix_web::test]
    async fn with_retry_returns_first_success() {
        let calls = Cell::new(0);
        let result = with_retry(retry(3), "test", |attempt| {
            calls.set(calls.get() + 1);
            async move {
                if attempt < 2 {
                    Err(ServiceError::Transport("refused".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(Ok(2), result);
        assert_eq!(2, calls.get());
    }

    #[actix_web::test]
    async fn with_retry_returns_last_error() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(retry(2), "test", |attempt| {
            calls.set(calls.get() + 1);
            async move { Err(ServiceError::Transport(format!("attempt {attempt}"))) }
        })
        .await;

        assert_eq!(Err(ServiceError::Transport("attempt 2".into())), result);
        assert_eq!(2, calls.get());
    }

    #[actix_web::test]
    async fn with_retry_makes_at_least_one_attempt() {
        let calls = Cell::new(0);
        let _ = with_retry(retry(0), "test", |_| {
            calls.set(calls.get() + 1);
            async { Err::<(), _>(ServiceError::Transport("refused".into())) }
        })
        .await;

        assert_eq!(1, calls.get());
    }
}
