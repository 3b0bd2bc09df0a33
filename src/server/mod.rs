// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! REST API for device management and mood requests.
//!
//! Registry access is file I/O and runs on the blocking thread pool.

use crate::command::Preset;
use crate::controller::{GetConfig, MoodController, ProcessMood, Reconfigure, SendPreset};
use crate::errors::ServiceError;
use crate::registry::DeviceRegistry;
use actix::Addr;
use actix_web::{HttpResponse, delete, get, post, put, web};
use log::debug;
use web_model::{
    ApiResponse, ConfigResponse, ConfigUpdate, DeviceAddress, DeviceList, MoodRequest,
};

pub mod web_model;

pub use web_model::json_error_handler;

/// Register all REST API services.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(get_devices)
            .service(add_device)
            .service(set_devices)
            .service(remove_device)
            .service(post_mood)
            .service(post_preset)
            .service(get_config)
            .service(put_config),
    );
}

/// JSON payload configuration with the API error response format.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(16 * 1024) // limit size of the payload (global configuration)
        .error_handler(json_error_handler)
}

#[get("/devices")]
async fn get_devices(registry: web::Data<DeviceRegistry>) -> Result<HttpResponse, ServiceError> {
    let devices = web::block(move || DeviceList::from(registry.get_ref())).await?;
    Ok(HttpResponse::Ok().json(devices))
}

#[post("/devices")]
async fn add_device(
    registry: web::Data<DeviceRegistry>,
    device: web::Json<DeviceAddress>,
) -> Result<HttpResponse, ServiceError> {
    let address = device.into_inner().address;
    let (added, devices) = web::block(move || {
        let added = registry.add(&address)?;
        Ok::<_, ServiceError>((added, DeviceList::from(registry.get_ref())))
    })
    .await??;

    if added {
        Ok(HttpResponse::Created().json(devices))
    } else {
        Ok(HttpResponse::UnprocessableEntity().json(ApiResponse::new(
            "INVALID_ADDRESS",
            "Address is empty, not a valid IPv4 address or already registered",
        )))
    }
}

#[put("/devices")]
async fn set_devices(
    registry: web::Data<DeviceRegistry>,
    addresses: web::Json<Vec<String>>,
) -> Result<HttpResponse, ServiceError> {
    let addresses = addresses.into_inner();
    let devices = web::block(move || {
        registry.replace_all(&addresses)?;
        Ok::<_, ServiceError>(DeviceList::from(registry.get_ref()))
    })
    .await??;
    Ok(HttpResponse::Ok().json(devices))
}

#[delete("/devices/{address}")]
async fn remove_device(
    registry: web::Data<DeviceRegistry>,
    address: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let address = address.into_inner();
    if web::block(move || registry.remove(&address)).await?? {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Ok(HttpResponse::NotFound().json(ApiResponse::new("NOT_FOUND", "Address not registered")))
    }
}

#[post("/mood")]
async fn post_mood(
    controller: web::Data<Addr<MoodController>>,
    request: web::Json<MoodRequest>,
) -> Result<HttpResponse, ServiceError> {
    let text = request.into_inner().text;
    if text.trim().is_empty() {
        return Err(ServiceError::BadRequest("Mood text must not be empty".into()));
    }
    debug!("Mood request: {text}");
    let outcome = controller
        .send(ProcessMood {
            text,
            recipient: None,
        })
        .await??;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/preset")]
async fn post_preset(
    controller: web::Data<Addr<MoodController>>,
    preset: web::Json<Preset>,
) -> Result<HttpResponse, ServiceError> {
    let outcome = controller
        .send(SendPreset {
            preset: preset.into_inner(),
            recipient: None,
        })
        .await??;
    Ok(HttpResponse::Ok().json(outcome))
}

#[get("/config")]
async fn get_config(
    controller: web::Data<Addr<MoodController>>,
) -> Result<HttpResponse, ServiceError> {
    let config = controller.send(GetConfig).await?;
    Ok(HttpResponse::Ok().json(ConfigResponse::from(config)))
}

#[put("/config")]
async fn put_config(
    controller: web::Data<Addr<MoodController>>,
    update: web::Json<ConfigUpdate>,
) -> Result<HttpResponse, ServiceError> {
    let update = update.into_inner();
    let config = controller
        .send(Reconfigure {
            api_key: update.api_key,
            model: update.model,
        })
        .await?;
    Ok(HttpResponse::Ok().json(ConfigResponse::from(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::handler_tests::{UNREACHABLE_URL, controller};
    use actix::Actor;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::{Value, json};

    macro_rules! init_app {
        ($addresses:expr) => {{
            let (controller, registry) = controller(UNREACHABLE_URL, "", 80, $addresses);
            test::init_service(
                App::new()
                    .app_data(json_config())
                    .app_data(web::Data::new(registry))
                    .app_data(web::Data::new(controller.start()))
                    .configure(configure),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn device_list_contains_summary() {
        let app = init_app!(&["10.0.0.1", "10.0.0.2"]);

        let resp: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/devices").to_request(),
        )
        .await;

        assert_eq!(
            json!({
                "devices": ["10.0.0.1", "10.0.0.2"],
                "count": 2,
                "summary": "10.0.0.1 (+1 more)"
            }),
            resp
        );
    }

    #[actix_web::test]
    async fn add_device() {
        let app = init_app!(&[]);

        let req = test::TestRequest::post()
            .uri("/api/devices")
            .set_json(json!({ "address": "192.168.1.20" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(StatusCode::CREATED, resp.status());

        let req = test::TestRequest::post()
            .uri("/api/devices")
            .set_json(json!({ "address": "192.168.1.20" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, resp.status());
    }

    #[actix_web::test]
    async fn add_invalid_device_address_is_rejected() {
        let app = init_app!(&[]);

        let req = test::TestRequest::post()
            .uri("/api/devices")
            .set_json(json!({ "address": "999.1.1.1" }))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!("INVALID_ADDRESS", resp["code"]);
    }

    #[actix_web::test]
    async fn invalid_json_payload_returns_error_code() {
        let app = init_app!(&[]);

        let req = test::TestRequest::post()
            .uri("/api/devices")
            .set_json(json!({ "ip": "192.168.1.20" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, resp.status());
        let body: Value = test::read_body_json(resp).await;
        assert_eq!("INVALID_JSON", body["code"]);
    }

    #[actix_web::test]
    async fn remove_device() {
        let app = init_app!(&["10.0.0.1"]);

        let req = test::TestRequest::delete()
            .uri("/api/devices/10.0.0.1")
            .to_request();
        assert_eq!(StatusCode::NO_CONTENT, test::call_service(&app, req).await.status());

        let req = test::TestRequest::delete()
            .uri("/api/devices/10.0.0.1")
            .to_request();
        assert_eq!(StatusCode::NOT_FOUND, test::call_service(&app, req).await.status());
    }

    #[actix_web::test]
    async fn replace_devices() {
        let app = init_app!(&["10.0.0.1"]);

        let req = test::TestRequest::put()
            .uri("/api/devices")
            .set_json(json!(["10.0.0.7", "10.0.0.8"]))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(json!(["10.0.0.7", "10.0.0.8"]), resp["devices"]);
    }

    #[actix_web::test]
    async fn mood_without_api_key_returns_configuration_error() {
        let app = init_app!(&[]);

        let req = test::TestRequest::post()
            .uri("/api/mood")
            .set_json(json!({ "text": "sleepy" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::SERVICE_UNAVAILABLE, resp.status());
        let body: Value = test::read_body_json(resp).await;
        assert_eq!("CONFIGURATION_ERROR", body["code"]);
    }

    #[actix_web::test]
    async fn empty_mood_is_rejected() {
        let app = init_app!(&[]);

        let req = test::TestRequest::post()
            .uri("/api/mood")
            .set_json(json!({ "text": "  " }))
            .to_request();

        assert_eq!(StatusCode::BAD_REQUEST, test::call_service(&app, req).await.status());
    }

    #[actix_web::test]
    async fn preset_without_devices_returns_bad_request() {
        let app = init_app!(&[]);

        let req = test::TestRequest::post()
            .uri("/api/preset")
            .set_json(json!({
                "hue": 30,
                "saturation": 80,
                "brightness": 90,
                "dimmer": 60,
                "ct": 350
            }))
            .to_request();

        assert_eq!(StatusCode::BAD_REQUEST, test::call_service(&app, req).await.status());
    }

    #[actix_web::test]
    async fn update_config() {
        let app = init_app!(&[]);

        let req = test::TestRequest::put()
            .uri("/api/config")
            .set_json(json!({ "api_key": "secret", "model": "gemini-2.5-pro" }))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!("gemini-2.5-pro", resp["model"]);
        assert_eq!(true, resp["api_key_set"]);
        assert!(resp.get("api_key").is_none());

        let req = test::TestRequest::get().uri("/api/config").to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!("gemini-2.5-pro", resp["model"]);
    }
}
