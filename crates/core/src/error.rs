/// A repository definition that cannot be loaded or is internally
/// inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("Failed to read definitions: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse definitions: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate {kind} name '{name}'")]
    Duplicate { kind: &'static str, name: String },

    #[error("Solid '{solid}' input '{input}' depends on unknown solid '{upstream}'")]
    UnknownDependency {
        solid: String,
        input: String,
        upstream: String,
    },

    #[error("Pipeline '{pipeline}' has a dependency cycle through solid '{solid}'")]
    Cycle { pipeline: String, solid: String },

    #[error("Preset '{preset}' references unknown mode '{mode}'")]
    UnknownPresetMode { preset: String, mode: String },
}
