//! Input documents and their classification
//!
//! Every input file is first turned into canonical JSON. Only its type
//! metadata is then decoded to pick the matching resource type, and the
//! document is decoded fully into that type.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::application::Application;
use crate::error::{CoreError, Result};
use crate::oam;
use crate::standalone::{Policy, Workflow, POLICY_API_VERSION, POLICY_KIND, WORKFLOW_API_VERSION, WORKFLOW_KIND};

const APPLICATION_API_VERSION: &str = "core.oam.dev/v1beta1";
const APPLICATION_KIND: &str = "Application";

/// A named document in canonical (JSON) form
#[derive(Debug, Clone, PartialEq)]
pub struct InputDocument {
    /// File name or URL the document came from
    pub name: String,
    pub content: JsonValue,
}

impl InputDocument {
    pub fn new(name: impl Into<String>, content: JsonValue) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    /// Parse a single YAML (or JSON) document
    pub fn from_yaml(name: impl Into<String>, data: &[u8]) -> Result<Self> {
        let content: JsonValue = serde_yaml::from_slice(data)?;
        Ok(Self::new(name, content))
    }

    /// Read the type metadata of the document
    pub fn type_meta(&self) -> TypeMeta {
        TypeMeta::deserialize(&self.content).unwrap_or_default()
    }
}

/// `apiVersion` and `kind` of a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

impl TypeMeta {
    /// API group, empty for the core group
    pub fn group(&self) -> &str {
        match self.api_version.split_once('/') {
            Some((group, _)) => group,
            None => "",
        }
    }

    /// API version without the group
    pub fn version(&self) -> &str {
        match self.api_version.split_once('/') {
            Some((_, version)) => version,
            None => &self.api_version,
        }
    }

    pub fn is_oam(&self) -> bool {
        self.group() == oam::GROUP
    }
}

/// A document decoded into one of the three assemblable kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Application(Box<Application>),
    Policy(Policy),
    Workflow(Workflow),
}

impl Document {
    /// Classify a document by group, version and kind
    pub fn classify(doc: &InputDocument) -> Result<Self> {
        let meta = doc.type_meta();
        match (meta.api_version.as_str(), meta.kind.as_str()) {
            (APPLICATION_API_VERSION, APPLICATION_KIND) => {
                let app = decode(doc, APPLICATION_KIND)?;
                Ok(Document::Application(Box::new(app)))
            }
            (POLICY_API_VERSION, POLICY_KIND) => Ok(Document::Policy(decode(doc, POLICY_KIND)?)),
            (WORKFLOW_API_VERSION, WORKFLOW_KIND) => {
                Ok(Document::Workflow(decode(doc, WORKFLOW_KIND)?))
            }
            _ => Err(CoreError::UnrecognizedKind {
                file: doc.name.clone(),
            }),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(doc: &InputDocument, kind: &str) -> Result<T> {
    T::deserialize(&doc.content).map_err(|e| CoreError::InvalidObject {
        kind: kind.to_string(),
        file: doc.name.clone(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> InputDocument {
        InputDocument::from_yaml("test.yaml", yaml.as_bytes()).unwrap()
    }

    #[test]
    fn test_type_meta() {
        let d = doc("apiVersion: core.oam.dev/v1beta1\nkind: Application\n");
        let meta = d.type_meta();
        assert_eq!(meta.group(), "core.oam.dev");
        assert_eq!(meta.version(), "v1beta1");
        assert!(meta.is_oam());

        let d = doc("apiVersion: v1\nkind: ConfigMap\n");
        let meta = d.type_meta();
        assert_eq!(meta.group(), "");
        assert_eq!(meta.version(), "v1");
        assert!(!meta.is_oam());
    }

    #[test]
    fn test_classify_application() {
        let d = doc(
            "apiVersion: core.oam.dev/v1beta1\nkind: Application\nmetadata:\n  name: app\nspec:\n  components: []\n",
        );
        assert!(matches!(Document::classify(&d).unwrap(), Document::Application(_)));
    }

    #[test]
    fn test_classify_policy_and_workflow() {
        let p = doc("apiVersion: core.oam.dev/v1alpha1\nkind: Policy\nmetadata:\n  name: p\ntype: topology\n");
        assert!(matches!(Document::classify(&p).unwrap(), Document::Policy(_)));

        let w = doc("apiVersion: core.oam.dev/v1alpha1\nkind: Workflow\nmetadata:\n  name: w\nsteps: []\n");
        assert!(matches!(Document::classify(&w).unwrap(), Document::Workflow(_)));
    }

    #[test]
    fn test_classify_unrecognized() {
        let d = InputDocument::from_yaml("cm.yaml", b"apiVersion: v1\nkind: ConfigMap\n").unwrap();
        let err = Document::classify(&d).unwrap_err();
        assert_eq!(err.to_string(), "file cm.yaml is not application, policy or workflow");

        // Right kind, wrong version
        let d = InputDocument::from_yaml("old.yaml", b"apiVersion: core.oam.dev/v1alpha2\nkind: Application\n").unwrap();
        assert!(matches!(
            Document::classify(&d),
            Err(CoreError::UnrecognizedKind { .. })
        ));

        // Not even an object
        let d = InputDocument::from_yaml("list.yaml", b"- a\n- b\n").unwrap();
        assert!(matches!(
            Document::classify(&d),
            Err(CoreError::UnrecognizedKind { .. })
        ));
    }

    #[test]
    fn test_classify_invalid_body() {
        let d = doc("apiVersion: core.oam.dev/v1alpha1\nkind: Policy\nmetadata:\n  name: p\n");
        let err = Document::classify(&d).unwrap_err();
        assert!(matches!(err, CoreError::InvalidObject { .. }));
        assert!(err.to_string().contains("invalid Policy in test.yaml"));
    }
}
