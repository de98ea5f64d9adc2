//! Field paths into JSON objects: `spec.template.spec.containers[0].image`

use serde_json::{Map, Value as JsonValue};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// Parse a dotted path with optional `[n]` indices and `["quoted.key"]` fields
pub fn parse(path: &str) -> Result<Vec<Segment>> {
    let invalid = |message: &str| EngineError::FieldPath {
        path: path.to_string(),
        message: message.to_string(),
    };

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    segments.push(Segment::Field(std::mem::take(&mut current)));
                } else if !matches!(segments.last(), Some(Segment::Index(_)) | Some(Segment::Field(_))) {
                    return Err(invalid("empty field name"));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(Segment::Field(std::mem::take(&mut current)));
                }
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed {
                    return Err(invalid("unclosed bracket"));
                }
                let inner = inner.trim();
                if let Some(quoted) = inner
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
                {
                    segments.push(Segment::Field(quoted.to_string()));
                } else {
                    let index = inner
                        .parse::<usize>()
                        .map_err(|_| invalid("index must be a non-negative integer"))?;
                    segments.push(Segment::Index(index));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        segments.push(Segment::Field(current));
    }
    if segments.is_empty() {
        return Err(invalid("empty path"));
    }

    Ok(segments)
}

/// Set `value` at `path`, creating intermediate objects
///
/// An index may address an existing item or append one right after the last.
pub fn set(target: &mut JsonValue, path: &str, value: JsonValue) -> Result<()> {
    let segments = parse(path)?;
    let mut current = target;

    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        current = match segment {
            Segment::Field(name) => {
                if current.is_null() {
                    *current = JsonValue::Object(Map::new());
                }
                let map = current.as_object_mut().ok_or_else(|| EngineError::FieldPath {
                    path: path.to_string(),
                    message: format!("{} is not an object", name),
                })?;
                map.entry(name.clone()).or_insert(JsonValue::Null)
            }
            Segment::Index(index) => {
                if current.is_null() {
                    *current = JsonValue::Array(Vec::new());
                }
                let items = current.as_array_mut().ok_or_else(|| EngineError::FieldPath {
                    path: path.to_string(),
                    message: format!("cannot index non-array with [{}]", index),
                })?;
                if *index > items.len() {
                    return Err(EngineError::FieldPath {
                        path: path.to_string(),
                        message: format!("index [{}] out of range for array of length {}", index, items.len()),
                    });
                }
                if *index == items.len() {
                    items.push(JsonValue::Null);
                }
                &mut items[*index]
            }
        };
        if last {
            *current = value;
            return Ok(());
        }
    }

    Ok(())
}

/// Read the value at `path`
pub fn get<'a>(target: &'a JsonValue, path: &str) -> Result<Option<&'a JsonValue>> {
    let segments = parse(path)?;
    let mut current = target;
    for segment in &segments {
        let next = match segment {
            Segment::Field(name) => current.get(name),
            Segment::Index(index) => current.get(*index),
        };
        match next {
            Some(v) => current = v,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}
