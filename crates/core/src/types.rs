use std::collections::BTreeMap;

/// Runs are identified by a random UUID assigned at launch.
pub type RunId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Free-form key/value tags attached to pipelines, presets and runs.
pub type Tags = BTreeMap<String, String>;
