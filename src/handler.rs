// src/handler.rs
//! Invocation surface of the method: event in, `{success, data | error}` out.
use crate::config::MethodConfig;
use crate::dataset;
use crate::error::{ConfigError, MethodError};
use crate::strata::classify;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

pub const CURRENT_MODULE: &str = "Strata - Method";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MethodResponse {
    pub fn ok(data: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Values read from `event["RuntimeVariables"]`.
#[derive(Debug, Clone)]
pub struct RuntimeVariables {
    pub data: Value,
    pub survey_column: String,
    pub region_column: String,
}

fn key<'a>(obj: &'a Value, name: &str) -> Result<&'a Value, MethodError> {
    obj.get(name)
        .ok_or_else(|| MethodError::Key(format!("missing key '{}'", name)))
}

fn string_key(obj: &Value, name: &str) -> Result<String, MethodError> {
    key(obj, name)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MethodError::Input(format!("'{}' must be a string", name)))
}

impl RuntimeVariables {
    pub fn from_event(event: &Value) -> Result<Self, MethodError> {
        let vars = key(event, "RuntimeVariables")?;
        Ok(Self {
            data: key(vars, "data")?.clone(),
            survey_column: string_key(vars, "survey_column")?,
            region_column: string_key(vars, "region_column")?,
        })
    }
}

fn run<F>(event: &Value, load_config: F) -> Result<String, MethodError>
where
    F: FnOnce() -> Result<MethodConfig, ConfigError>,
{
    let config = load_config()?;
    info!("Validated params");

    let vars = RuntimeVariables::from_event(event)?;
    info!("Successfully retrieved data from event");

    // `data` normally arrives as a JSON string; an inline table is accepted too.
    let rows = match vars.data {
        Value::String(payload) => dataset::decode(&payload),
        Value::Null => return Err(MethodError::Input("'data' is null".to_string())),
        inline => dataset::decode_value(inline),
    }
    .map_err(|e| MethodError::Input(e.to_string()))?;

    let columns = config.columns(&vars.survey_column, &vars.region_column);
    let classified = classify(&rows, &columns)?;
    info!(rows = classified.len(), "Successfully ran calculation");

    dataset::encode(&classified).map_err(|e| MethodError::General {
        kind: "EncodeError",
        detail: e.to_string(),
    })
}

/// Handle one invocation with an explicit configuration source.
#[instrument(level = "info", skip_all, fields(request_id = %request_id))]
pub fn handle_with<F>(event: &Value, load_config: F, request_id: &str) -> MethodResponse
where
    F: FnOnce() -> Result<MethodConfig, ConfigError>,
{
    info!("Strata Method Begun");
    match run(event, load_config) {
        Ok(data) => {
            info!("Successfully completed module: {}", CURRENT_MODULE);
            MethodResponse::ok(data)
        }
        Err(e) => {
            let message = e.response_message(CURRENT_MODULE, request_id);
            error!("{}", message);
            MethodResponse::failure(message)
        }
    }
}

/// Handle one invocation, reading column configuration from the environment.
pub fn lambda_handler(event: &Value, request_id: &str) -> MethodResponse {
    handle_with(event, MethodConfig::from_env, request_id)
}
