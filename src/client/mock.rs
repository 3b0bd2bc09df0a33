// Copyright (c) 2025 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! In-process HTTP mock server for client tests.

use actix_web::http::StatusCode;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use std::net::SocketAddr;
use std::sync::Mutex;

struct MockState {
    /// Canned responses. The last one is repeated once all others have been returned.
    responses: Vec<(u16, String)>,
    /// Received requests as `METHOD path?query`, followed by the request body if not empty.
    requests: Mutex<Vec<String>>,
}

pub(crate) struct MockServer {
    pub addr: SocketAddr,
    state: web::Data<MockState>,
}

impl MockServer {
    /// Start a mock server on a random local port, answering requests with the given responses.
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        assert!(!responses.is_empty(), "at least one response required");
        let state = web::Data::new(MockState {
            responses,
            requests: Mutex::new(Vec::new()),
        });

        let server = HttpServer::new({
            let state = state.clone();
            move || {
                App::new()
                    .app_data(state.clone())
                    .default_service(web::to(respond))
            }
        })
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .expect("bind mock server");
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());

        Self { addr, state }
    }

    /// Mock server answering every request with `status` and `body`.
    pub fn respond_with(status: u16, body: impl Into<String>) -> Self {
        Self::start(vec![(status, body.into())])
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn respond(req: HttpRequest, body: web::Bytes, state: web::Data<MockState>) -> HttpResponse {
    let index = {
        let mut requests = state.requests.lock().unwrap();
        let mut request = format!("{} {}", req.method(), req.uri());
        if !body.is_empty() {
            request.push(' ');
            request.push_str(&String::from_utf8_lossy(&body));
        }
        requests.push(request);
        requests.len() - 1
    };

    let (status, body) = &state.responses[index.min(state.responses.len() - 1)];
    HttpResponse::build(StatusCode::from_u16(*status).unwrap())
        .content_type("application/json")
        .body(body.clone())
}
