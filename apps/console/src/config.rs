use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use shared::parameters::ParameterPatch;
use studio_core::{
    mock::{MockCatalog, MockResponder},
    ControllerOptions,
};

const ENV_PREFIX: &str = "STUDIO__";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model_latency_ms: u64,
    pub template_latency_ms: u64,
    pub response_latency_ms: u64,
    pub response_timeout_ms: Option<u64>,
    pub single_flight: bool,
    pub export_dir: PathBuf,
    pub log_filter: String,
    pub default_model: Option<String>,
    pub parameters: ParameterPatch,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_latency_ms: 800,
            template_latency_ms: 600,
            response_latency_ms: 2000,
            response_timeout_ms: None,
            single_flight: true,
            export_dir: PathBuf::from("."),
            log_filter: "info".into(),
            default_model: None,
            parameters: ParameterPatch::default(),
        }
    }
}

impl Settings {
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            single_flight: self.single_flight,
            response_timeout: self.response_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn catalog(&self) -> MockCatalog {
        MockCatalog::new().with_latency(
            Duration::from_millis(self.model_latency_ms),
            Duration::from_millis(self.template_latency_ms),
        )
    }

    pub fn responder(&self) -> MockResponder {
        MockResponder::new().with_latency(Duration::from_millis(self.response_latency_ms))
    }

    pub fn without_latency(mut self) -> Self {
        self.model_latency_ms = 0;
        self.template_latency_ms = 0;
        self.response_latency_ms = 0;
        self
    }
}

/// Reads `path` if it exists, then layers `STUDIO__*` environment variables on top.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => parse_settings(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Settings::default(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    Ok(toml::from_str(raw)?)
}

fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

    if let Some(v) = var("MODEL_LATENCY_MS").and_then(|v| v.parse().ok()) {
        settings.model_latency_ms = v;
    }
    if let Some(v) = var("TEMPLATE_LATENCY_MS").and_then(|v| v.parse().ok()) {
        settings.template_latency_ms = v;
    }
    if let Some(v) = var("RESPONSE_LATENCY_MS").and_then(|v| v.parse().ok()) {
        settings.response_latency_ms = v;
    }
    if let Some(v) = var("RESPONSE_TIMEOUT_MS") {
        settings.response_timeout_ms = v.parse().ok().filter(|ms| *ms > 0);
    }
    if let Some(v) = var("SINGLE_FLIGHT").and_then(|v| parse_bool(&v)) {
        settings.single_flight = v;
    }
    if let Some(v) = var("EXPORT_DIR") {
        settings.export_dir = PathBuf::from(v);
    }
    if let Some(v) = var("LOG_FILTER") {
        settings.log_filter = v;
    }
    if let Some(v) = var("DEFAULT_MODEL") {
        settings.default_model = Some(v).filter(|id| !id.trim().is_empty());
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
