//! Boolean request parameters
//!
//! Form fields, query strings and JSON bodies all accept the same spellings
//! for a flag: `true/false`, `1/0`, `yes/no` and `on/off`, any case.

use serde::Deserialize;

use crate::error::{ApiError, ApiResult};

/// Parse a form boolean (`true/false`, `1/0`, `yes/no`, `on/off`)
pub fn parse_form_bool(name: &str, value: &str) -> ApiResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ApiError::Validation(format!(
            "{} must be a boolean (got '{}')",
            name, other
        ))),
    }
}

/// A flag as it arrives in a query string or JSON body
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl Flag {
    /// Resolve to a boolean, naming `name` in the error
    pub fn resolve(&self, name: &str) -> ApiResult<bool> {
        match self {
            Flag::Bool(value) => Ok(*value),
            Flag::Number(1) => Ok(true),
            Flag::Number(0) => Ok(false),
            Flag::Number(other) => parse_form_bool(name, &other.to_string()),
            Flag::Text(text) => parse_form_bool(name, text),
        }
    }
}

/// Resolve an optional flag, `default` when absent
pub fn flag_or(flag: Option<&Flag>, name: &str, default: bool) -> ApiResult<bool> {
    flag.map_or(Ok(default), |f| f.resolve(name))
}
