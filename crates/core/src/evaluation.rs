//! Run config evaluation against a [`ConfigType`].
//!
//! [`evaluate`] either returns the config with defaults applied or every
//! error found. Errors carry the evaluation stack (field names and list
//! indices from the root) that led to them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config_type::{ConfigField, ConfigType};
use crate::define_wire_enum;

define_wire_enum! {
    /// Why a config value failed evaluation.
    EvaluationErrorReason {
        RuntimeTypeMismatch = "RUNTIME_TYPE_MISMATCH",
        MissingRequiredField = "MISSING_REQUIRED_FIELD",
        MissingRequiredFields = "MISSING_REQUIRED_FIELDS",
        FieldNotDefined = "FIELD_NOT_DEFINED",
        FieldsNotDefined = "FIELDS_NOT_DEFINED",
        SelectorFieldError = "SELECTOR_FIELD_ERROR",
    }
}

/// One step on the path from the config root to an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackEntry {
    Field(String),
    ListItem(usize),
}

/// Diagnosis-specific payload of an [`EvaluationError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ErrorData {
    RuntimeMismatch { value_rep: String },
    MissingField { field_name: String },
    MissingFields { field_names: Vec<String> },
    FieldNotDefined { field_name: String },
    FieldsNotDefined { field_names: Vec<String> },
    SelectorType { incoming_fields: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationError {
    pub message: String,
    pub stack: Vec<StackEntry>,
    pub data: ErrorData,
}

impl EvaluationError {
    pub fn reason(&self) -> EvaluationErrorReason {
        match self.data {
            ErrorData::RuntimeMismatch { .. } => EvaluationErrorReason::RuntimeTypeMismatch,
            ErrorData::MissingField { .. } => EvaluationErrorReason::MissingRequiredField,
            ErrorData::MissingFields { .. } => EvaluationErrorReason::MissingRequiredFields,
            ErrorData::FieldNotDefined { .. } => EvaluationErrorReason::FieldNotDefined,
            ErrorData::FieldsNotDefined { .. } => EvaluationErrorReason::FieldsNotDefined,
            ErrorData::SelectorType { .. } => EvaluationErrorReason::SelectorFieldError,
        }
    }

    /// Path segments starting at `root`; list items render as their index.
    pub fn path(&self) -> Vec<String> {
        path_segments(&self.stack)
    }
}

fn path_segments(stack: &[StackEntry]) -> Vec<String> {
    std::iter::once("root".to_string())
        .chain(stack.iter().map(|entry| match entry {
            StackEntry::Field(name) => name.clone(),
            StackEntry::ListItem(index) => index.to_string(),
        }))
        .collect()
}

fn render_path(stack: &[StackEntry]) -> String {
    path_segments(stack).join(":")
}

/// Evaluate `value` against `schema`.
///
/// A `null` root is treated as an empty object.
pub fn evaluate(schema: &ConfigType, value: &Value) -> Result<Value, Vec<EvaluationError>> {
    let mut evaluator = Evaluator::default();
    let mut stack = Vec::new();
    let root = if value.is_null() {
        Value::Object(Map::new())
    } else {
        value.clone()
    };
    let resolved = evaluator.value(schema, &root, &mut stack);
    if evaluator.errors.is_empty() {
        Ok(resolved)
    } else {
        Err(evaluator.errors)
    }
}

#[derive(Default)]
struct Evaluator {
    errors: Vec<EvaluationError>,
}

impl Evaluator {
    fn push(&mut self, stack: &[StackEntry], message: String, data: ErrorData) {
        self.errors.push(EvaluationError {
            message,
            stack: stack.to_vec(),
            data,
        });
    }

    fn mismatch(&mut self, schema: &ConfigType, value: &Value, stack: &[StackEntry]) -> Value {
        let value_rep = serde_json::to_string(value).unwrap_or_default();
        self.push(
            stack,
            format!(
                "Invalid value at path {}. Expected \"{}\", got {value_rep}.",
                render_path(stack),
                schema.describe()
            ),
            ErrorData::RuntimeMismatch { value_rep },
        );
        Value::Null
    }

    fn value(&mut self, schema: &ConfigType, value: &Value, stack: &mut Vec<StackEntry>) -> Value {
        match schema {
            ConfigType::Any => value.clone(),
            ConfigType::Bool if value.is_boolean() => value.clone(),
            ConfigType::Int if value.is_i64() || value.is_u64() => value.clone(),
            ConfigType::Float if value.is_number() => value.clone(),
            ConfigType::String if value.is_string() => value.clone(),
            ConfigType::Enum { values, .. }
                if value.as_str().is_some_and(|v| values.iter().any(|e| e == v)) =>
            {
                value.clone()
            }
            ConfigType::Noneable { inner } => {
                if value.is_null() {
                    Value::Null
                } else {
                    self.value(inner, value, stack)
                }
            }
            ConfigType::Array { of } => match value.as_array() {
                Some(items) => Value::Array(
                    items
                        .iter()
                        .enumerate()
                        .map(|(index, item)| {
                            stack.push(StackEntry::ListItem(index));
                            let resolved = self.value(of, item, stack);
                            stack.pop();
                            resolved
                        })
                        .collect(),
                ),
                None => self.mismatch(schema, value, stack),
            },
            ConfigType::Shape { fields, .. } => match as_object(value) {
                Some(incoming) => self.shape(schema, fields, &incoming, stack),
                None => self.mismatch(schema, value, stack),
            },
            ConfigType::Selector { fields, .. } => match as_object(value) {
                Some(incoming) => self.selector(schema, fields, &incoming, stack),
                None => self.mismatch(schema, value, stack),
            },
            _ => self.mismatch(schema, value, stack),
        }
    }

    fn shape(
        &mut self,
        schema: &ConfigType,
        fields: &std::collections::BTreeMap<String, ConfigField>,
        incoming: &Map<String, Value>,
        stack: &mut Vec<StackEntry>,
    ) -> Value {
        let undefined: Vec<String> = incoming
            .keys()
            .filter(|k| !fields.contains_key(*k))
            .cloned()
            .collect();
        self.report_undefined(schema, undefined, stack);

        let missing: Vec<String> = fields
            .iter()
            .filter(|(name, field)| field.is_required() && !incoming.contains_key(*name))
            .map(|(name, _)| name.clone())
            .collect();
        match missing.len() {
            0 => {}
            1 => {
                let field_name = missing[0].clone();
                self.push(
                    stack,
                    format!(
                        "Missing required config entry \"{field_name}\" at path {}.",
                        render_path(stack)
                    ),
                    ErrorData::MissingField { field_name },
                );
            }
            _ => self.push(
                stack,
                format!(
                    "Missing required config entries {missing:?} at path {}.",
                    render_path(stack)
                ),
                ErrorData::MissingFields {
                    field_names: missing,
                },
            ),
        }

        let mut resolved = Map::new();
        for (name, field) in fields {
            if let Some(value) = incoming.get(name) {
                stack.push(StackEntry::Field(name.clone()));
                let evaluated = self.value(&field.config_type, value, stack);
                stack.pop();
                resolved.insert(name.clone(), evaluated);
            } else if let Some(default) = &field.default_value {
                resolved.insert(name.clone(), default.clone());
            } else if let ConfigType::Shape { .. } = field.config_type {
                if field.config_type.accepts_absent() {
                    stack.push(StackEntry::Field(name.clone()));
                    let evaluated = self.value(&field.config_type, &Value::Null, stack);
                    stack.pop();
                    resolved.insert(name.clone(), evaluated);
                }
            }
        }
        Value::Object(resolved)
    }

    fn selector(
        &mut self,
        schema: &ConfigType,
        fields: &std::collections::BTreeMap<String, ConfigField>,
        incoming: &Map<String, Value>,
        stack: &mut Vec<StackEntry>,
    ) -> Value {
        let chosen: Option<(String, Value)> = match incoming.len() {
            1 => incoming.iter().next().map(|(k, v)| (k.clone(), v.clone())),
            0 if fields.len() == 1 && schema.accepts_absent() => fields
                .keys()
                .next()
                .map(|k| (k.clone(), Value::Null)),
            _ => None,
        };

        let Some((name, value)) = chosen else {
            let incoming_fields: Vec<String> = incoming.keys().cloned().collect();
            let message = if incoming_fields.is_empty() {
                format!(
                    "Must specify exactly one field at path {}. Options are {:?}.",
                    render_path(stack),
                    fields.keys().collect::<Vec<_>>()
                )
            } else {
                format!(
                    "Specified more than one field at path {}: {incoming_fields:?}. \
                     You can only specify one field at this level.",
                    render_path(stack)
                )
            };
            self.push(stack, message, ErrorData::SelectorType { incoming_fields });
            return Value::Null;
        };

        let Some(field) = fields.get(&name) else {
            self.report_undefined(schema, vec![name], stack);
            return Value::Null;
        };

        stack.push(StackEntry::Field(name.clone()));
        let evaluated = self.value(&field.config_type, &value, stack);
        stack.pop();

        let mut resolved = Map::new();
        resolved.insert(name, evaluated);
        Value::Object(resolved)
    }

    fn report_undefined(&mut self, schema: &ConfigType, undefined: Vec<String>, stack: &[StackEntry]) {
        let expected = schema.describe();
        match undefined.len() {
            0 => {}
            1 => {
                let field_name = undefined[0].clone();
                self.push(
                    stack,
                    format!(
                        "Received unexpected config entry \"{field_name}\" at path {}. \
                         Expected: \"{expected}\".",
                        render_path(stack)
                    ),
                    ErrorData::FieldNotDefined { field_name },
                );
            }
            _ => self.push(
                stack,
                format!(
                    "Received unexpected config entries {undefined:?} at path {}. \
                     Expected: \"{expected}\".",
                    render_path(stack)
                ),
                ErrorData::FieldsNotDefined {
                    field_names: undefined,
                },
            ),
        }
    }
}

fn as_object(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::Null => Some(Map::new()),
        _ => None,
    }
}
