//! VelaQL statements: `view{key1=value1,key2="value2"}.export`

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{CoreError, Result};

/// Field exported when the statement does not name one
pub const DEFAULT_EXPORT: &str = "status";

static STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<view>[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?)(?P<parameter>\{.*\})?(?:\.(?P<export>[_a-zA-Z][._a-zA-Z0-9\[\]]*))?$",
    )
    .expect("valid regex")
});

static VIEW_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z\d]+(-[a-z\d]+)*$").expect("valid regex"));

/// A parsed query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryView {
    pub view: String,
    pub parameter: Map<String, JsonValue>,
    pub export: String,
}

impl QueryView {
    /// Parse a VelaQL statement
    pub fn parse(statement: &str) -> Result<Self> {
        let statement = statement.trim();
        let caps = STATEMENT.captures(statement).ok_or_else(|| CoreError::InvalidQuery {
            statement: statement.to_string(),
            message: "expected view{key=value,...}.export".to_string(),
        })?;

        let view = caps["view"].to_string();
        let export = caps
            .name("export")
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| DEFAULT_EXPORT.to_string());

        let mut parameter = Map::new();
        if let Some(body) = caps.name("parameter") {
            let body = body.as_str();
            let inner = &body[1..body.len() - 1];
            for pair in split_parameters(inner) {
                let (key, value) = pair.split_once('=').ok_or_else(|| CoreError::InvalidQuery {
                    statement: statement.to_string(),
                    message: format!("parameter {:?} is not key=value", pair),
                })?;
                let key = key.trim();
                if key.is_empty() {
                    return Err(CoreError::InvalidQuery {
                        statement: statement.to_string(),
                        message: "parameter key must not be empty".to_string(),
                    });
                }
                parameter.insert(key.to_string(), parse_parameter_value(value.trim()));
            }
        }

        Ok(Self {
            view,
            parameter,
            export,
        })
    }
}

/// Split on commas outside of double quotes
fn split_parameters(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

fn parse_parameter_value(value: &str) -> JsonValue {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return JsonValue::String(value[1..value.len() - 1].to_string());
    }
    crate::values::infer_value(value)
}

/// Whether `name` can be used as a stored view name
pub fn is_valid_view_name(name: &str) -> bool {
    VIEW_NAME.is_match(name)
}
