// Copyright (c) 2025 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Lighting command handling: language model prompt, response parsing and presets.
//!
//! A lighting command is a Tasmota backlog string like `HSBCOLOR 60,100,100;Dimmer 70;CT 250`.

use crate::errors::ServiceError;
use crate::util::color::Rgb;
use derive_more::Display;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Command used if the language model response doesn't contain a command block.
pub const FALLBACK_NO_COMMAND: &str = "HSBCOLOR 0,0,0;Dimmer 0;CT 500";
/// Command used if the command block doesn't contain a color clause.
pub const FALLBACK_NO_COLOR: &str = "HSBCOLOR 60,100,100;Dimmer 70;CT 250";

pub const HUE_RANGE: RangeInclusive<u16> = 0..=359;
pub const PERCENT_RANGE: RangeInclusive<u8> = 0..=100;
/// Color temperature range in mired.
pub const CT_RANGE: RangeInclusive<u16> = 153..=500;

lazy_static! {
    static ref COMMAND_BLOCK: Regex = Regex::new(r"(?s)\[COMMAND:\s*(.*?)\]").expect("valid regex");
    static ref EXPLANATION_BLOCK: Regex =
        Regex::new(r"(?s)\[EXPLANATION:\s*(.*?)\]").expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
    static ref DISALLOWED_CHARS: Regex = Regex::new(r"[^A-Za-z0-9,;\s]").expect("valid regex");
    static ref HSB_CLAUSE: Regex =
        Regex::new(r"(?i)HSBCOLOR\s*(\d+),(\d+),(\d+)").expect("valid regex");
}

/// Sanitized device command.
///
/// Only contains ASCII letters, digits, `,`, `;` and whitespace.
#[derive(Debug, Display, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LightingCommand(String);

impl LightingCommand {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hue, saturation and brightness values of the first `HSBCOLOR` clause.
    pub fn hsb(&self) -> Option<(u32, u32, u32)> {
        let captures = HSB_CLAUSE.captures(&self.0)?;
        let value = |i: usize| captures.get(i)?.as_str().parse::<u32>().ok();
        Some((value(1)?, value(2)?, value(3)?))
    }

    /// Display color of the command, [`Rgb::FALLBACK`] if it can't be derived.
    pub fn color(&self) -> Rgb {
        match self.hsb() {
            Some((h, s, b)) => Rgb::from_hsv(h as f32, s as f32 / 100.0, b as f32 / 100.0),
            None => {
                warn!("No HSB color in command '{}', using fallback color", self.0);
                Rgb::FALLBACK
            }
        }
    }
}

impl From<&Preset> for LightingCommand {
    fn from(preset: &Preset) -> Self {
        LightingCommand(preset.to_string())
    }
}

/// Build the language model prompt for the given mood description.
pub fn mood_prompt(mood: &str) -> String {
    format!(
        "User mood: '{mood}'. Convert it into a Tasmota light bulb command. \
        Output the result only in the format \
        [COMMAND: HSBCOLOR hue,saturation,brightness;Dimmer value;CT temperature] \
        using only this combination of three commands, \
        followed by [EXPLANATION: a short explanation of the mood change]. \
        (hue:0-359, saturation/brightness:0-100, Dimmer:0-100, CT:153-500). \
        Example: [COMMAND: HSBCOLOR 60,100,100;Dimmer 70;CT 250] \
        [EXPLANATION: A bright, warm yellow to lift your energy.]"
    )
}

/// Extract the device command from a language model response.
///
/// The `[COMMAND: ...]` block is cleaned from whitespace runs and any character except letters,
/// digits, `,`, `;` and whitespace. Fallback commands are returned if there's no command block
/// or if it doesn't contain a `HSBCOLOR` clause.
pub fn extract_command(response: &str) -> LightingCommand {
    let Some(raw) = COMMAND_BLOCK.captures(response).and_then(|c| c.get(1)) else {
        warn!("No command block in language model response, using fallback");
        return LightingCommand(FALLBACK_NO_COMMAND.to_string());
    };

    let cleaned = WHITESPACE.replace_all(raw.as_str().trim(), " ");
    let cleaned = DISALLOWED_CHARS.replace_all(&cleaned, "");
    if !cleaned.to_uppercase().contains("HSBCOLOR") {
        warn!("No HSBCOLOR clause in command '{cleaned}', using fallback");
        return LightingCommand(FALLBACK_NO_COLOR.to_string());
    }

    LightingCommand(cleaned.into_owned())
}

/// Extract the explanation text, or describe the command if there's no explanation block.
pub fn extract_explanation(response: &str, command: &LightingCommand) -> String {
    EXPLANATION_BLOCK
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| format!("{command} command generated (no explanation)"))
}

/// Fixed lighting preset.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[display("HSBCOLOR {hue},{saturation},{brightness};Dimmer {dimmer};CT {ct}")]
pub struct Preset {
    pub hue: u16,
    pub saturation: u8,
    pub brightness: u8,
    pub dimmer: u8,
    /// Color temperature in mired.
    pub ct: u16,
}

impl Preset {
    /// Create a validated preset.
    pub fn new(hsb: Hsb, dimmer: u8, ct: u16) -> Result<Self, ServiceError> {
        let preset = Self {
            hue: hsb.hue,
            saturation: hsb.saturation,
            brightness: hsb.brightness,
            dimmer,
            ct,
        };
        preset.validate()?;
        Ok(preset)
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if !HUE_RANGE.contains(&self.hue) {
            return Err(ServiceError::BadRequest(format!(
                "Invalid hue {}: valid range 0-359",
                self.hue
            )));
        }
        for (name, value) in [
            ("saturation", self.saturation),
            ("brightness", self.brightness),
            ("dimmer", self.dimmer),
        ] {
            if !PERCENT_RANGE.contains(&value) {
                return Err(ServiceError::BadRequest(format!(
                    "Invalid {name} {value}: valid range 0-100"
                )));
            }
        }
        if !CT_RANGE.contains(&self.ct) {
            return Err(ServiceError::BadRequest(format!(
                "Invalid color temperature {}: valid range 153-500",
                self.ct
            )));
        }
        Ok(())
    }
}

/// Hue, saturation, brightness triple in the `h,s,b` notation of the `HSBCOLOR` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsb {
    pub hue: u16,
    pub saturation: u8,
    pub brightness: u8,
}

impl FromStr for Hsb {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || ServiceError::BadRequest(format!("Invalid HSB value '{s}', expected h,s,b"));
        let mut parts = s.split(',').map(str::trim);
        let (Some(h), Some(sat), Some(b), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        Ok(Self {
            hue: h.parse().map_err(|_| invalid())?,
            saturation: sat.parse().map_err(|_| invalid())?,
            brightness: b.parse().map_err(|_| invalid())?,
        })
    }
}
