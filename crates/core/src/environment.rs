//! The run config schema of a pipeline in a given mode.
//!
//! ```text
//! {
//!   solids:    { <solid>: { config: <solid config> } }
//!   resources: { <resource>: { config: <resource config> } }
//!   loggers:   { <logger>: { config: <logger config> } }
//!   execution: in_process: {} | multiprocess: { max_concurrent?: Int }
//! }
//! ```
//!
//! Container fields are required exactly when something inside them is.

use std::collections::{BTreeMap, BTreeSet};

use crate::config_type::{ConfigField, ConfigType};
use crate::definition::{ModeDef, PipelineDef};

/// Build the root config type for `pipeline` running `mode` with the
/// `selected` solids.
pub fn environment_schema(
    pipeline: &PipelineDef,
    mode: &ModeDef,
    selected: &BTreeSet<String>,
) -> ConfigType {
    let prefix = format!("{}.Mode.{}", pipeline.name, mode.name);

    let solids = pipeline
        .solids
        .iter()
        .filter(|s| selected.contains(&s.name))
        .filter_map(|s| {
            s.config.as_ref().map(|config| {
                (
                    s.name.clone(),
                    wrap_config(format!("{}.SolidConfig.{}", pipeline.name, s.name), config),
                )
            })
        });

    let resources = mode.resources.iter().filter_map(|r| {
        r.config.as_ref().map(|config| {
            (
                r.name.clone(),
                wrap_config(format!("{prefix}.ResourceConfig.{}", r.name), config),
            )
        })
    });

    let loggers = mode.loggers.iter().filter_map(|l| {
        l.config.as_ref().map(|config| {
            (
                l.name.clone(),
                wrap_config(format!("{prefix}.LoggerConfig.{}", l.name), config),
            )
        })
    });

    let mut root = BTreeMap::new();
    root.insert(
        "solids".to_string(),
        container(format!("{prefix}.SolidsConfigDictionary"), solids),
    );
    root.insert(
        "resources".to_string(),
        container(format!("{prefix}.Resources"), resources),
    );
    root.insert(
        "loggers".to_string(),
        container(format!("{prefix}.Loggers"), loggers),
    );
    root.insert("execution".to_string(), execution_field(&prefix));

    ConfigType::Shape {
        key: Some(format!("{prefix}.Environment")),
        fields: root,
    }
}

fn wrap_config(key: String, config: &ConfigType) -> ConfigField {
    let inner = ConfigField::new(config.clone());
    ConfigField::new(ConfigType::shape(key, [("config".to_string(), inner)]))
}

fn container(key: String, entries: impl Iterator<Item = (String, ConfigField)>) -> ConfigField {
    ConfigField::new(ConfigType::shape(key, entries))
}

fn execution_field(prefix: &str) -> ConfigField {
    let in_process = ConfigType::shape(format!("{prefix}.InProcessExecutor"), []);
    let multiprocess = ConfigType::shape(
        format!("{prefix}.MultiprocessExecutor"),
        [(
            "max_concurrent".to_string(),
            ConfigField::optional(ConfigType::Int),
        )],
    );
    let selector = ConfigType::Selector {
        key: Some(format!("{prefix}.ExecutionSelector")),
        fields: BTreeMap::from([
            ("in_process".to_string(), ConfigField::optional(in_process)),
            ("multiprocess".to_string(), ConfigField::optional(multiprocess)),
        ]),
    };
    ConfigField::optional(selector)
}
