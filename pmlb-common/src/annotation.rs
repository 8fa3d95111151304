//! Annotation contract
//!
//! The structured description of an image returned by the vision model.
//! An [`AnnotationResult`] is produced once per successful upstream attempt and
//! is never mutated afterwards; it is either persisted or discarded.
//!
//! Two acceptance modes exist:
//! - [`ValidationMode::Trusting`]: any JSON object is accepted, missing or null
//!   fields become empty text/lists.
//! - [`ValidationMode::Strict`]: every contract key must be present with the
//!   right type, unknown keys are rejected and oversized lists are truncated.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum number of entries kept in `objects`
pub const MAX_OBJECTS: usize = 10;

/// Maximum number of entries kept in `actions`
pub const MAX_ACTIONS: usize = 5;

/// Every key of the annotation contract, in the order the model is asked for them
pub const CONTRACT_KEYS: [&str; 9] = [
    "description",
    "objects",
    "actions",
    "environment",
    "content_type",
    "specific_style",
    "production_quality",
    "summary",
    "logos",
];

/// Structured annotation of one image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationResult {
    /// Factual account of what is visible (at most 4 sentences)
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    /// Visible objects, at most 10
    #[serde(default, deserialize_with = "null_as_default")]
    pub objects: Vec<String>,

    /// Visible actions, at most 5
    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub environment: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub content_type: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub specific_style: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub production_quality: String,

    /// One-sentence summary
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,

    /// Visible logos, empty if none
    #[serde(default, deserialize_with = "null_as_default")]
    pub logos: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl AnnotationResult {
    /// Text fields that are searched for keywords and subject terms, in fixed order:
    /// description, environment, summary, then every object, action and logo.
    pub fn searchable_parts(&self) -> impl Iterator<Item = &str> {
        [
            self.description.as_str(),
            self.environment.as_str(),
            self.summary.as_str(),
        ]
        .into_iter()
        .chain(self.objects.iter().map(String::as_str))
        .chain(self.actions.iter().map(String::as_str))
        .chain(self.logos.iter().map(String::as_str))
    }

    /// Searchable parts joined with single spaces (original case)
    pub fn combined_text(&self) -> String {
        self.searchable_parts().collect::<Vec<_>>().join(" ")
    }
}

/// How strictly upstream content is checked before it is accepted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Require the exact key set and types, truncate oversized lists
    #[default]
    Strict,
    /// Accept any JSON object, defaulting absent fields
    Trusting,
}

/// Reasons upstream content cannot be turned into an [`AnnotationResult`]
#[derive(Debug, Error)]
pub enum AnnotationParseError {
    #[error("content is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("content is not a JSON object")]
    NotAnObject,

    #[error("missing key '{0}'")]
    MissingKey(&'static str),

    #[error("key '{key}' must be {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },

    #[error("unexpected key '{0}'")]
    UnknownKey(String),

    #[error("content does not match the annotation shape: {0}")]
    Shape(serde_json::Error),
}

impl AnnotationParseError {
    /// True when the content was not parseable JSON at all (as opposed to a shape violation)
    pub fn is_syntax(&self) -> bool {
        matches!(self, AnnotationParseError::InvalidJson(_))
    }
}

/// Parse the model's message content into an annotation
pub fn parse_annotation(
    content: &str,
    mode: ValidationMode,
) -> Result<AnnotationResult, AnnotationParseError> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Object(map) = value else {
        return Err(AnnotationParseError::NotAnObject);
    };

    match mode {
        ValidationMode::Trusting => {
            serde_json::from_value(Value::Object(map)).map_err(AnnotationParseError::Shape)
        }
        ValidationMode::Strict => parse_strict(map),
    }
}

fn parse_strict(mut map: Map<String, Value>) -> Result<AnnotationResult, AnnotationParseError> {
    if let Some(unknown) = map
        .keys()
        .find(|k| !CONTRACT_KEYS.contains(&k.as_str()))
    {
        return Err(AnnotationParseError::UnknownKey(unknown.clone()));
    }

    let mut text = |key: &'static str| -> Result<String, AnnotationParseError> {
        match map.remove(key) {
            None => Err(AnnotationParseError::MissingKey(key)),
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(AnnotationParseError::WrongType {
                key,
                expected: "a string",
            }),
        }
    };
    let description = text("description")?;
    let environment = text("environment")?;
    let content_type = text("content_type")?;
    let specific_style = text("specific_style")?;
    let production_quality = text("production_quality")?;
    let summary = text("summary")?;

    let mut objects = string_list(&mut map, "objects")?;
    let mut actions = string_list(&mut map, "actions")?;
    let logos = string_list(&mut map, "logos")?;

    truncate_list(&mut objects, "objects", MAX_OBJECTS);
    truncate_list(&mut actions, "actions", MAX_ACTIONS);

    Ok(AnnotationResult {
        description,
        objects,
        actions,
        environment,
        content_type,
        specific_style,
        production_quality,
        summary,
        logos,
    })
}

fn string_list(
    map: &mut Map<String, Value>,
    key: &'static str,
) -> Result<Vec<String>, AnnotationParseError> {
    let wrong_type = || AnnotationParseError::WrongType {
        key,
        expected: "an array of strings",
    };
    match map.remove(key) {
        None => Err(AnnotationParseError::MissingKey(key)),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(wrong_type()),
            })
            .collect(),
        Some(_) => Err(wrong_type()),
    }
}

fn truncate_list(list: &mut Vec<String>, key: &str, cap: usize) {
    if list.len() > cap {
        tracing::warn!(
            key,
            received = list.len(),
            cap,
            "Annotation list exceeds cap, truncating"
        );
        list.truncate(cap);
    }
}
