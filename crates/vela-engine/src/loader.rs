//! Turning raw input files into canonical documents

use serde::Deserialize;
use serde_json::Value as JsonValue;
use vela_core::InputDocument;

use crate::cue::CueRuntime;
use crate::error::Result;

/// Whether a file name denotes CUE source
pub fn is_cue_file(name: &str) -> bool {
    name.ends_with(".cue")
}

/// Decode one file into a single canonical document
///
/// `.cue` files are exported by the CUE evaluator; everything else is YAML.
pub fn decode_document(name: &str, data: &[u8], cue: &dyn CueRuntime) -> Result<InputDocument> {
    if is_cue_file(name) {
        let source = String::from_utf8_lossy(data);
        let content = cue.export(&source, None)?;
        return Ok(InputDocument::new(name, content));
    }
    Ok(InputDocument::from_yaml(name, data)?)
}

/// Decode a file that may hold several `---` separated YAML documents
///
/// Empty documents are skipped.
pub fn decode_documents(name: &str, data: &[u8], cue: &dyn CueRuntime) -> Result<Vec<InputDocument>> {
    if is_cue_file(name) {
        return Ok(vec![decode_document(name, data, cue)?]);
    }

    let mut docs = Vec::new();
    for de in serde_yaml::Deserializer::from_slice(data) {
        let content = JsonValue::deserialize(de)?;
        if !content.is_null() {
            docs.push(InputDocument::new(name, content));
        }
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use serde_json::json;

    struct StaticCue(JsonValue);

    impl CueRuntime for StaticCue {
        fn export(&self, _source: &str, _expression: Option<&str>) -> Result<JsonValue> {
            Ok(self.0.clone())
        }
    }

    struct NoCue;

    impl CueRuntime for NoCue {
        fn export(&self, _source: &str, _expression: Option<&str>) -> Result<JsonValue> {
            Err(EngineError::Cue {
                message: "unexpected".to_string(),
            })
        }
    }

    #[test]
    fn test_yaml_and_json() {
        let doc = decode_document("app.yaml", b"apiVersion: v1\nkind: ConfigMap\n", &NoCue).unwrap();
        assert_eq!(doc.type_meta().kind, "ConfigMap");

        let doc = decode_document("app.json", br#"{"kind": "Secret"}"#, &NoCue).unwrap();
        assert_eq!(doc.content, json!({"kind": "Secret"}));
    }

    #[test]
    fn test_cue_goes_through_runtime() {
        let cue = StaticCue(json!({"kind": "Application"}));
        let doc = decode_document("app.cue", b"kind: \"Application\"", &cue).unwrap();
        assert_eq!(doc.name, "app.cue");
        assert_eq!(doc.type_meta().kind, "Application");
    }

    #[test]
    fn test_multi_document() {
        let data = b"kind: A\n---\n---\nkind: B\n";
        let docs = decode_documents("defs.yaml", data, &NoCue).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].type_meta().kind, "B");
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(decode_document("bad.yaml", b"kind: [unclosed", &NoCue).is_err());
    }
}
