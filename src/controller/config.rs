// Copyright (c) 2025 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Immutable language model configuration of the mood controller.

use crate::configuration::LanguageModelSettings;
use crate::errors::ServiceError;
use derive_builder::Builder;
use std::fmt::{Debug, Display, Formatter};
use url::Url;

const MODEL_PREFIX: &str = "models/";

/// Language model credential and endpoint.
///
/// A configuration value is never modified. [`ControllerConfig::reconfigure`] returns a new value,
/// requests in progress keep using the configuration they were started with.
#[derive(Clone, PartialEq, Builder)]
#[builder(setter(into), build_fn(error = "ServiceError"))]
pub struct ControllerConfig {
    /// API credential, sent as `key` query parameter.
    #[builder(default)]
    api_key: String,
    /// Model identifier, with or without `models/` prefix.
    model: String,
    /// Base URL of the generative language API.
    base_url: Url,
}

impl ControllerConfig {
    pub fn from_settings(settings: &LanguageModelSettings) -> Result<Self, ServiceError> {
        ControllerConfigBuilder::default()
            .api_key(settings.get_api_key())
            .model(settings.model.trim())
            .base_url(settings.url.clone())
            .build()
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Create a new configuration with the given changes.
    ///
    /// A blank `model` is ignored, the API key is taken as is.
    pub fn reconfigure(&self, api_key: Option<String>, model: Option<String>) -> Self {
        let mut config = self.clone();
        if let Some(api_key) = api_key {
            config.api_key = api_key;
        }
        if let Some(model) = model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            config.model = model.to_string();
        }
        config
    }

    /// Full `generateContent` endpoint URL including the credential.
    ///
    /// The path of the base URL is kept, e.g. for a proxy at `https://proxy/gemini`.
    ///
    /// E.g. `<base>/v1/models/gemini-2.5-flash-lite:generateContent?key=...`
    pub fn generate_content_url(&self) -> Result<Url, ServiceError> {
        let model = if self.model.starts_with(MODEL_PREFIX) {
            self.model.clone()
        } else {
            format!("{MODEL_PREFIX}{}", self.model)
        };
        // a base path without trailing slash would be replaced by the join
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let mut url = base.join(&format!("v1/{model}:generateContent"))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

impl Display for ControllerConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "model={}, url={}, api_key={}",
            self.model,
            self.base_url,
            if self.has_api_key() { "***" } else { "<not set>" }
        )
    }
}

impl Debug for ControllerConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ControllerConfig({self})")
    }
}
