//! Config types declared by solids, resources and loggers.
//!
//! A [`ConfigType`] describes the shape a piece of run config must have.
//! Every type has a stable [`key`](ConfigType::key) so it can be looked up
//! individually through the gateway.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Schema of a config value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ConfigType {
    Any,
    Bool,
    Int,
    Float,
    String,
    Array {
        of: Box<ConfigType>,
    },
    Noneable {
        inner: Box<ConfigType>,
    },
    Enum {
        key: String,
        values: Vec<String>,
    },
    Shape {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(default)]
        fields: BTreeMap<String, ConfigField>,
    },
    /// Exactly one of `fields` must be provided.
    Selector {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        fields: BTreeMap<String, ConfigField>,
    },
}

/// A named entry of a [`ConfigType::Shape`] or [`ConfigType::Selector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    #[serde(rename = "type")]
    pub config_type: ConfigType,
    /// Explicit requiredness. When absent the field is required unless it
    /// has a default or its type accepts a missing value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigField {
    pub fn new(config_type: ConfigType) -> Self {
        Self {
            config_type,
            is_required: None,
            default_value: None,
            description: None,
        }
    }

    pub fn optional(config_type: ConfigType) -> Self {
        Self {
            is_required: Some(false),
            ..Self::new(config_type)
        }
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Whether run config must provide this field.
    pub fn is_required(&self) -> bool {
        self.is_required.unwrap_or_else(|| {
            self.default_value.is_none() && !self.config_type.accepts_absent()
        })
    }
}

impl ConfigType {
    /// Build a keyed shape from `(name, field)` pairs.
    pub fn shape(
        key: impl Into<String>,
        fields: impl IntoIterator<Item = (String, ConfigField)>,
    ) -> Self {
        Self::Shape {
            key: Some(key.into()),
            fields: fields.into_iter().collect(),
        }
    }

    /// Stable identifier of this type.
    ///
    /// Scalars use their name, containers derive a key from their inner
    /// type, and shapes without an explicit key hash their field layout.
    pub fn key(&self) -> String {
        match self {
            Self::Any => "Any".into(),
            Self::Bool => "Bool".into(),
            Self::Int => "Int".into(),
            Self::Float => "Float".into(),
            Self::String => "String".into(),
            Self::Array { of } => format!("Array.{}", of.key()),
            Self::Noneable { inner } => format!("Noneable.{}", inner.key()),
            Self::Enum { key, .. } => key.clone(),
            Self::Shape { key, fields } => key
                .clone()
                .unwrap_or_else(|| format!("Shape.{}", layout_hash(fields))),
            Self::Selector { key, fields } => key
                .clone()
                .unwrap_or_else(|| format!("Selector.{}", layout_hash(fields))),
        }
    }

    /// Short name of the type's kind, used in messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Any => "Any",
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::Array { .. } => "Array",
            Self::Noneable { .. } => "Noneable",
            Self::Enum { .. } => "Enum",
            Self::Shape { .. } => "Shape",
            Self::Selector { .. } => "Selector",
        }
    }

    /// Whether a missing value is acceptable for a field of this type.
    pub fn accepts_absent(&self) -> bool {
        match self {
            Self::Any | Self::Noneable { .. } => true,
            Self::Shape { fields, .. } => fields.values().all(|f| !f.is_required()),
            Self::Selector { fields, .. } => {
                fields.len() == 1 && fields.values().all(|f| !f.is_required())
            }
            _ => false,
        }
    }

    /// Directly nested types, in field order.
    pub fn inner_types(&self) -> Vec<&ConfigType> {
        match self {
            Self::Array { of } => vec![of.as_ref()],
            Self::Noneable { inner } => vec![inner.as_ref()],
            Self::Shape { fields, .. } | Self::Selector { fields, .. } => {
                fields.values().map(|f| &f.config_type).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Depth-first search for a type with the given key, this type included.
    pub fn find_by_key(&self, key: &str) -> Option<&ConfigType> {
        if self.key() == key {
            return Some(self);
        }
        self.inner_types()
            .into_iter()
            .find_map(|inner| inner.find_by_key(key))
    }

    /// Human readable rendering, e.g. `{ name: String count?: Int }`.
    pub fn describe(&self) -> String {
        match self {
            Self::Array { of } => format!("[{}]", of.describe()),
            Self::Noneable { inner } => format!("{}?", inner.describe()),
            Self::Enum { key, values } => format!("{key}({})", values.join("|")),
            Self::Shape { fields, .. } | Self::Selector { fields, .. } => {
                let entries: Vec<String> = fields
                    .iter()
                    .map(|(name, f)| {
                        let marker = if f.is_required() { "" } else { "?" };
                        format!("{name}{marker}: {}", f.config_type.describe())
                    })
                    .collect();
                format!("{{ {} }}", entries.join(" "))
            }
            scalar => scalar.kind_name().to_string(),
        }
    }
}

fn layout_hash(fields: &BTreeMap<String, ConfigField>) -> String {
    let mut hasher = Sha256::new();
    for (name, field) in fields {
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(field.config_type.key().as_bytes());
        hasher.update(if field.is_required() { b"!" } else { b"?" });
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
