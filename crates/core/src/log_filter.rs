//! Filtering of run event logs.
//!
//! A filter query is a space separated list of values, each optionally
//! prefixed by a token: `step:transform type:step_failure level:error
//! timeout`. Values sharing a token are alternatives; different tokens and
//! free text must all match.

use std::collections::BTreeSet;

use crate::event::{LogEvent, LogLevel};

const TOKEN_STEP: &str = "step";
const TOKEN_TYPE: &str = "type";
const TOKEN_LEVEL: &str = "level";

/// One term of a filter query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilterValue {
    pub token: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub values: Vec<LogFilterValue>,
    /// Extra level restriction on top of `level:` terms. Empty means all.
    pub levels: BTreeSet<LogLevel>,
}

impl LogFilter {
    /// Parse a filter query. Unknown tokens are kept as free text.
    pub fn parse(query: &str) -> Self {
        let values = query
            .split_whitespace()
            .map(|term| match term.split_once(':') {
                Some((token, value))
                    if [TOKEN_STEP, TOKEN_TYPE, TOKEN_LEVEL]
                        .contains(&token.to_ascii_lowercase().as_str())
                        && !value.is_empty() =>
                {
                    LogFilterValue {
                        token: Some(token.to_ascii_lowercase()),
                        value: value.to_string(),
                    }
                }
                _ => LogFilterValue {
                    token: None,
                    value: term.to_string(),
                },
            })
            .collect();
        Self {
            values,
            levels: BTreeSet::new(),
        }
    }

    pub fn with_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.levels.extend(levels);
        self
    }

    /// Render the query back, `token:value` terms joined by spaces.
    pub fn to_query_string(&self) -> String {
        self.values
            .iter()
            .map(|v| match &v.token {
                Some(token) => format!("{token}:{}", v.value),
                None => v.value.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.levels.is_empty()
    }

    fn tokened(&self, token: &str) -> Vec<&str> {
        self.values
            .iter()
            .filter(|v| v.token.as_deref() == Some(token))
            .map(|v| v.value.as_str())
            .collect()
    }

    pub fn matches(&self, event: &LogEvent) -> bool {
        if !self.levels.is_empty() && !self.levels.contains(&event.level) {
            return false;
        }

        let steps = self.tokened(TOKEN_STEP);
        if !steps.is_empty()
            && !event
                .step_key
                .as_deref()
                .is_some_and(|key| steps.contains(&key))
        {
            return false;
        }

        let types = self.tokened(TOKEN_TYPE);
        if !types.is_empty()
            && !types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(event.event_type().as_str()))
        {
            return false;
        }

        let levels: Vec<LogLevel> = self
            .tokened(TOKEN_LEVEL)
            .iter()
            .filter_map(|l| l.parse().ok())
            .collect();
        if !levels.is_empty() && !levels.contains(&event.level) {
            return false;
        }

        let message = event.message.to_lowercase();
        self.values
            .iter()
            .filter(|v| v.token.is_none())
            .all(|v| message.contains(&v.value.to_lowercase()))
    }
}
