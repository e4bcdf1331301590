//! Generation parameters and the domains their editors enforce.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::UnknownParameter;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TOP_P: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParameterRange {
    const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Clamps, then rounds to the nearest slider step measured from `min`.
    pub fn snap(&self, value: f64) -> f64 {
        let clamped = self.clamp(value);
        let steps = ((clamped - self.min) / self.step).round();
        // Round away float noise such as 0.30000000000000004.
        let snapped = ((self.min + steps * self.step) * 1e6).round() / 1e6;
        self.clamp(snapped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterField {
    Temperature,
    MaxTokens,
    TopP,
    FrequencyPenalty,
    PresencePenalty,
}

impl ParameterField {
    pub const ALL: [ParameterField; 5] = [
        ParameterField::Temperature,
        ParameterField::MaxTokens,
        ParameterField::TopP,
        ParameterField::FrequencyPenalty,
        ParameterField::PresencePenalty,
    ];

    pub fn range(self) -> ParameterRange {
        match self {
            ParameterField::Temperature => ParameterRange::new(0.0, 2.0, 0.1),
            ParameterField::MaxTokens => ParameterRange::new(1.0, 4096.0, 1.0),
            ParameterField::TopP => ParameterRange::new(0.0, 1.0, 0.05),
            ParameterField::FrequencyPenalty => ParameterRange::new(-2.0, 2.0, 0.1),
            ParameterField::PresencePenalty => ParameterRange::new(-2.0, 2.0, 0.1),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ParameterField::Temperature => "Temperature",
            ParameterField::MaxTokens => "Max Tokens",
            ParameterField::TopP => "Top P",
            ParameterField::FrequencyPenalty => "Frequency Penalty",
            ParameterField::PresencePenalty => "Presence Penalty",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            ParameterField::Temperature => "temperature",
            ParameterField::MaxTokens => "max_tokens",
            ParameterField::TopP => "top_p",
            ParameterField::FrequencyPenalty => "frequency_penalty",
            ParameterField::PresencePenalty => "presence_penalty",
        }
    }
}

impl fmt::Display for ParameterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ParameterField {
    type Err = UnknownParameter;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "temperature" => Ok(ParameterField::Temperature),
            "max_tokens" | "maxtokens" => Ok(ParameterField::MaxTokens),
            "top_p" | "topp" => Ok(ParameterField::TopP),
            "frequency_penalty" | "frequencypenalty" => Ok(ParameterField::FrequencyPenalty),
            "presence_penalty" | "presencepenalty" => Ok(ParameterField::PresencePenalty),
            _ => Err(UnknownParameter(raw.to_string())),
        }
    }
}

/// Always within every field's domain; only a [`ParameterPatch`] merge changes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

impl Parameters {
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn top_p(&self) -> f64 {
        self.top_p
    }

    pub fn frequency_penalty(&self) -> f64 {
        self.frequency_penalty
    }

    pub fn presence_penalty(&self) -> f64 {
        self.presence_penalty
    }

    pub fn get(&self, field: ParameterField) -> f64 {
        match field {
            ParameterField::Temperature => self.temperature,
            ParameterField::MaxTokens => f64::from(self.max_tokens),
            ParameterField::TopP => self.top_p,
            ParameterField::FrequencyPenalty => self.frequency_penalty,
            ParameterField::PresencePenalty => self.presence_penalty,
        }
    }

    /// Field-wise last-write-wins merge. Supplied values are clamped to their
    /// domain; non-finite values leave the field untouched.
    pub fn merge(&mut self, patch: &ParameterPatch) {
        if let Some(value) = finite_in(ParameterField::Temperature, patch.temperature) {
            self.temperature = value;
        }
        if let Some(value) = finite_in(ParameterField::MaxTokens, patch.max_tokens) {
            self.max_tokens = value.round() as u32;
        }
        if let Some(value) = finite_in(ParameterField::TopP, patch.top_p) {
            self.top_p = value;
        }
        if let Some(value) = finite_in(ParameterField::FrequencyPenalty, patch.frequency_penalty) {
            self.frequency_penalty = value;
        }
        if let Some(value) = finite_in(ParameterField::PresencePenalty, patch.presence_penalty) {
            self.presence_penalty = value;
        }
    }

    pub fn merged(mut self, patch: &ParameterPatch) -> Self {
        self.merge(patch);
        self
    }

    pub fn is_within_domain(&self) -> bool {
        ParameterField::ALL
            .iter()
            .all(|field| field.range().contains(self.get(*field)))
    }
}

fn finite_in(field: ParameterField, value: Option<f64>) -> Option<f64> {
    let value = value.filter(|v| v.is_finite())?;
    let range = field.range();
    if field == ParameterField::MaxTokens {
        return Some(range.clamp(value.round()));
    }
    Some(range.clamp(value))
}

/// A partial update; absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ParameterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "maxTokens")]
    pub max_tokens: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "topP")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "frequencyPenalty")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "presencePenalty")]
    pub presence_penalty: Option<f64>,
}

impl ParameterPatch {
    pub fn field(field: ParameterField, value: f64) -> Self {
        Self::default().with(field, value)
    }

    pub fn with(mut self, field: ParameterField, value: f64) -> Self {
        let slot = match field {
            ParameterField::Temperature => &mut self.temperature,
            ParameterField::MaxTokens => &mut self.max_tokens,
            ParameterField::TopP => &mut self.top_p,
            ParameterField::FrequencyPenalty => &mut self.frequency_penalty,
            ParameterField::PresencePenalty => &mut self.presence_penalty,
        };
        *slot = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
