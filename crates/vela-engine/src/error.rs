//! Engine error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use vela_core::{CoreError, DefinitionKind};

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error("{kind} definition {name:?} not found")]
    #[diagnostic(code(vela::engine::definition_not_found))]
    DefinitionNotFound {
        kind: DefinitionKind,
        name: String,
        #[help]
        suggestion: Option<String>,
    },

    #[error("require parameter {name}")]
    #[diagnostic(code(vela::engine::missing_parameter))]
    MissingParameter { definition: String, name: String },

    #[error("unsupported parameter {name} for {definition}")]
    #[diagnostic(code(vela::engine::unsupported_parameter))]
    UnsupportedParameter { definition: String, name: String },

    #[error("parameter {name} of {definition} must be a {expected}")]
    #[diagnostic(code(vela::engine::parameter_type))]
    ParameterType {
        definition: String,
        name: String,
        expected: String,
    },

    #[error("invalid field path {path:?}: {message}")]
    #[diagnostic(code(vela::engine::field_path))]
    FieldPath { path: String, message: String },

    #[error("definition {name} has no usable schematic")]
    #[diagnostic(code(vela::engine::schematic))]
    NoSchematic { name: String },

    #[error("cannot render component {component}: {message}")]
    #[diagnostic(code(vela::engine::render))]
    Render { component: String, message: String },

    #[error("trait {trait_type} is not applicable to component {component} of type {component_type}")]
    #[diagnostic(code(vela::engine::validation))]
    TraitNotApplicable {
        trait_type: String,
        component: String,
        component_type: String,
    },

    #[error("duplicated component name {0}")]
    #[diagnostic(code(vela::engine::validation))]
    DuplicateComponent(String),

    #[error("component {component} depends on unknown component {dependency}")]
    #[diagnostic(code(vela::engine::validation))]
    UnknownDependency {
        component: String,
        dependency: String,
    },

    #[error("policy {0} not found")]
    #[diagnostic(code(vela::engine::policy_not_found))]
    PolicyNotFound(String),

    #[error("override policy {0} must not have empty properties")]
    #[diagnostic(code(vela::engine::override_policy))]
    EmptyOverridePolicy(String),

    #[error("failed to parse {policy_type} policy {name}: {message}")]
    #[diagnostic(code(vela::engine::policy))]
    InvalidPolicy {
        name: String,
        policy_type: String,
        message: String,
    },

    #[error("cue evaluation failed: {message}")]
    #[diagnostic(code(vela::engine::cue))]
    Cue { message: String },

    #[error("cue binary {binary:?} could not be started: {message}")]
    #[diagnostic(
        code(vela::engine::cue_missing),
        help("install cue from https://cuelang.org/docs/introduction/installation/ or set VELA_CUE_BINARY")
    )]
    CueUnavailable { binary: String, message: String },

    #[error("Template error")]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    #[diagnostic(code(vela::engine::input))]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    #[diagnostic(code(vela::engine::io))]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    #[diagnostic(code(vela::engine::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(vela::engine::json))]
    Json(#[from] serde_json::Error),
}

/// Addon template error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(vela::template::render))]
pub struct TemplateError {
    pub message: String,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Create a template error from a MiniJinja error
    pub fn from_minijinja(err: minijinja::Error, template_name: &str, template_source: &str) -> Self {
        let span = err
            .line()
            .and_then(|line_num| calculate_span(template_source, line_num));

        let suggestion = match err.kind() {
            minijinja::ErrorKind::UndefinedError => {
                Some("addon arguments are available as `args.<name>`".to_string())
            }
            minijinja::ErrorKind::SyntaxError => {
                Some("addon templates use [[ ]] for expressions and [% %] for blocks".to_string())
            }
            _ => None,
        };

        Self {
            message: err.to_string(),
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
            suggestion,
        }
    }
}

/// Span covering a whole 1-based line
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (index, line) in source.lines().enumerate() {
        if index + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }

    None
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_span() {
        let source = "line1\nline two\nline3";
        let span = calculate_span(source, 2).unwrap();
        assert_eq!(span.offset(), 6);
        assert_eq!(span.len(), 8);
        assert!(calculate_span(source, 9).is_none());
    }

    #[test]
    fn test_error_messages() {
        let err = EngineError::DefinitionNotFound {
            kind: DefinitionKind::Component,
            name: "webservce".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "component definition \"webservce\" not found");

        let err = EngineError::EmptyOverridePolicy("ha".to_string());
        assert_eq!(err.to_string(), "override policy ha must not have empty properties");
    }
}
