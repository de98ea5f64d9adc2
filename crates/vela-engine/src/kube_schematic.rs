//! Rendering of kube schematics: a literal object with parameters
//! written at their field paths

use serde_json::Value as JsonValue;
use vela_core::KubeSchematic;

use crate::error::{EngineError, Result};
use crate::fieldpath;

/// Render the template of `definition` with `properties`
///
/// Every property must be a declared parameter, every required parameter
/// must be present and values must match the declared type.
pub fn render(definition: &str, schematic: &KubeSchematic, properties: Option<&JsonValue>) -> Result<JsonValue> {
    let empty = serde_json::Map::new();
    let properties = match properties {
        None | Some(JsonValue::Null) => &empty,
        Some(JsonValue::Object(map)) => map,
        Some(_) => {
            return Err(EngineError::Render {
                component: definition.to_string(),
                message: "properties must be an object".to_string(),
            });
        }
    };

    for name in properties.keys() {
        if !schematic.parameters.iter().any(|p| &p.name == name) {
            return Err(EngineError::UnsupportedParameter {
                definition: definition.to_string(),
                name: name.clone(),
            });
        }
    }

    let mut object = schematic.template.clone();

    for parameter in &schematic.parameters {
        let Some(value) = properties.get(&parameter.name) else {
            if parameter.required.unwrap_or(false) {
                return Err(EngineError::MissingParameter {
                    definition: definition.to_string(),
                    name: parameter.name.clone(),
                });
            }
            continue;
        };

        if !parameter.value_type.accepts(value) {
            return Err(EngineError::ParameterType {
                definition: definition.to_string(),
                name: parameter.name.clone(),
                expected: format!("{:?}", parameter.value_type).to_lowercase(),
            });
        }

        for path in &parameter.field_paths {
            fieldpath::set(&mut object, path, value.clone())?;
        }
    }

    Ok(object)
}
