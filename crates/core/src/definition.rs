//! Repository, pipeline and solid definitions.
//!
//! A repository location serves one [`RepositoryDef`], usually read from a
//! JSON file. Definitions are validated once at load time so every later
//! lookup can assume names are unique and the dependency graph is acyclic.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config_type::ConfigType;
use crate::error::DefinitionError;
use crate::types::Tags;

/// Name of the mode used when a pipeline declares none.
pub const DEFAULT_MODE: &str = "default";

/// Every pipeline served by one repository location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryDef {
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<PipelineDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub solids: Vec<SolidDef>,
    #[serde(default)]
    pub modes: Vec<ModeDef>,
    #[serde(default)]
    pub presets: Vec<PresetDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigType>,
    #[serde(default)]
    pub inputs: Vec<InputDef>,
    #[serde(default)]
    pub outputs: Vec<OutputDef>,
    /// Asset keys this solid materializes when it succeeds.
    #[serde(default)]
    pub materializes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDef {
    pub name: String,
    pub dagster_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<OutputHandle>,
}

/// Reference to a named output of an upstream solid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputHandle {
    pub solid: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
    pub name: String,
    pub dagster_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
    #[serde(default)]
    pub loggers: Vec<LoggerDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigType>,
}

/// A named, reusable launch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetDef {
    pub name: String,
    #[serde(default = "default_mode_name")]
    pub mode: String,
    #[serde(default)]
    pub run_config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solid_selection: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Tags,
}

fn default_mode_name() -> String {
    DEFAULT_MODE.to_string()
}

impl RepositoryDef {
    /// Parse and validate a repository from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, DefinitionError> {
        let repository: Self = serde_json::from_str(text)?;
        repository.validate()?;
        Ok(repository)
    }

    /// Check name uniqueness, dependency targets, acyclicity and preset modes.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        ensure_unique("pipeline", self.pipelines.iter().map(|p| p.name.as_str()))?;
        for pipeline in &self.pipelines {
            pipeline.validate()?;
        }
        Ok(())
    }

    pub fn pipeline(&self, name: &str) -> Option<&PipelineDef> {
        self.pipelines.iter().find(|p| p.name == name)
    }
}

impl PipelineDef {
    pub fn validate(&self) -> Result<(), DefinitionError> {
        ensure_unique("solid", self.solids.iter().map(|s| s.name.as_str()))?;
        ensure_unique("mode", self.modes.iter().map(|m| m.name.as_str()))?;
        ensure_unique("preset", self.presets.iter().map(|p| p.name.as_str()))?;

        let names: BTreeSet<&str> = self.solids.iter().map(|s| s.name.as_str()).collect();
        for solid in &self.solids {
            for input in &solid.inputs {
                if let Some(handle) = &input.from {
                    if !names.contains(handle.solid.as_str()) {
                        return Err(DefinitionError::UnknownDependency {
                            solid: solid.name.clone(),
                            input: input.name.clone(),
                            upstream: handle.solid.clone(),
                        });
                    }
                }
            }
        }

        self.topological_order()?;

        for preset in &self.presets {
            if self.mode(&preset.mode).is_none() {
                return Err(DefinitionError::UnknownPresetMode {
                    preset: preset.name.clone(),
                    mode: preset.mode.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn solid(&self, name: &str) -> Option<&SolidDef> {
        self.solids.iter().find(|s| s.name == name)
    }

    pub fn preset(&self, name: &str) -> Option<&PresetDef> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Modes of this pipeline; a pipeline without modes gets an empty
    /// `default` mode.
    pub fn effective_modes(&self) -> Vec<ModeDef> {
        if self.modes.is_empty() {
            vec![ModeDef {
                name: DEFAULT_MODE.to_string(),
                description: None,
                resources: Vec::new(),
                loggers: Vec::new(),
            }]
        } else {
            self.modes.clone()
        }
    }

    pub fn mode(&self, name: &str) -> Option<ModeDef> {
        self.effective_modes().into_iter().find(|m| m.name == name)
    }

    /// The mode used when a launch does not name one.
    pub fn default_mode_name(&self) -> String {
        self.modes
            .first()
            .map(|m| m.name.clone())
            .unwrap_or_else(default_mode_name)
    }

    /// Upstream solid names of `solid`, deduplicated.
    pub fn upstream_of(&self, solid: &str) -> BTreeSet<String> {
        self.solid(solid)
            .map(|s| {
                s.inputs
                    .iter()
                    .filter_map(|i| i.from.as_ref().map(|h| h.solid.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Solids that consume an output of `solid`.
    pub fn downstream_of(&self, solid: &str) -> BTreeSet<String> {
        self.solids
            .iter()
            .filter(|s| {
                s.inputs
                    .iter()
                    .any(|i| i.from.as_ref().is_some_and(|h| h.solid == solid))
            })
            .map(|s| s.name.clone())
            .collect()
    }

    /// Solid names ordered so that every solid follows its dependencies.
    ///
    /// Ties are broken by declaration order, which keeps execution order
    /// stable across reloads of an unchanged definition.
    pub fn topological_order(&self) -> Result<Vec<String>, DefinitionError> {
        let mut remaining: HashMap<&str, usize> = self
            .solids
            .iter()
            .map(|s| (s.name.as_str(), self.upstream_of(&s.name).len()))
            .collect();
        let mut order = Vec::with_capacity(self.solids.len());

        while !remaining.is_empty() {
            let ready = self
                .solids
                .iter()
                .map(|s| s.name.as_str())
                .find(|name| remaining.get(name) == Some(&0));

            let Some(ready) = ready else {
                let solid = self
                    .solids
                    .iter()
                    .find(|s| remaining.contains_key(s.name.as_str()))
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                return Err(DefinitionError::Cycle {
                    pipeline: self.name.clone(),
                    solid,
                });
            };

            remaining.remove(ready);
            for downstream in self.downstream_of(ready) {
                if let Some(count) = remaining.get_mut(downstream.as_str()) {
                    *count = count.saturating_sub(1);
                }
            }
            order.push(ready.to_string());
        }
        Ok(order)
    }

    /// Copy of this pipeline restricted to `solids`.
    ///
    /// Inputs wired to solids outside the subset are kept but lose their
    /// upstream handle.
    pub fn subset(&self, solids: &BTreeSet<String>) -> PipelineDef {
        let mut subset = self.clone();
        subset.solids.retain(|s| solids.contains(&s.name));
        for solid in &mut subset.solids {
            for input in &mut solid.inputs {
                if input
                    .from
                    .as_ref()
                    .is_some_and(|h| !solids.contains(&h.solid))
                {
                    input.from = None;
                }
            }
        }
        subset
    }

    /// Content-addressed identifier of this definition.
    pub fn snapshot_id(&self) -> String {
        // Struct fields serialize in declaration order and maps are
        // BTreeMaps, so the JSON text is canonical.
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(&canonical))
    }
}

fn ensure_unique<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), DefinitionError> {
    let mut seen = BTreeMap::new();
    for name in names {
        if seen.insert(name, ()).is_some() {
            return Err(DefinitionError::Duplicate {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::fixtures::etl_pipeline;
    use super::*;

    #[test]
    fn topological_order_respects_dependencies() {
        let order = etl_pipeline().topological_order().unwrap();
        assert_eq!(order, vec!["extract", "transform", "load", "audit"]);
    }

    #[test]
    fn cycle_is_rejected() {
        let mut pipeline = etl_pipeline();
        pipeline.solids[0].inputs.push(InputDef {
            name: "loop".into(),
            dagster_type: "Table".into(),
            from: Some(OutputHandle {
                solid: "load".into(),
                output: "table".into(),
            }),
        });
        assert_matches!(pipeline.validate(), Err(DefinitionError::Cycle { .. }));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut pipeline = etl_pipeline();
        pipeline.solids[3].inputs.push(InputDef {
            name: "x".into(),
            dagster_type: "Any".into(),
            from: Some(OutputHandle {
                solid: "ghost".into(),
                output: "out".into(),
            }),
        });
        assert_matches!(
            pipeline.validate(),
            Err(DefinitionError::UnknownDependency { upstream, .. }) if upstream == "ghost"
        );
    }

    #[test]
    fn duplicate_solid_names_are_rejected() {
        let mut pipeline = etl_pipeline();
        pipeline.solids.push(pipeline.solids[0].clone());
        assert_matches!(
            pipeline.validate(),
            Err(DefinitionError::Duplicate { kind: "solid", .. })
        );
    }

    #[test]
    fn first_mode_is_default() {
        assert_eq!(etl_pipeline().default_mode_name(), "prod");
        let mut bare = etl_pipeline();
        bare.modes.clear();
        assert_eq!(bare.default_mode_name(), DEFAULT_MODE);
        assert!(bare.mode(DEFAULT_MODE).is_some());
    }

    #[test]
    fn subset_drops_handles_to_excluded_solids() {
        let keep: BTreeSet<String> = ["transform", "load"].iter().map(|s| s.to_string()).collect();
        let subset = etl_pipeline().subset(&keep);
        assert_eq!(subset.solids.len(), 2);
        assert!(subset.solid("transform").unwrap().inputs[0].from.is_none());
        assert!(subset.solid("load").unwrap().inputs[0].from.is_some());
    }

    #[test]
    fn snapshot_id_is_content_addressed() {
        let a = etl_pipeline();
        let mut b = etl_pipeline();
        assert_eq!(a.snapshot_id(), b.snapshot_id());
        b.description = Some("changed".into());
        assert_ne!(a.snapshot_id(), b.snapshot_id());
    }
}
