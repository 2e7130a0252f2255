//! Dedupe string post-processing

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Hook applied to every computed dedupe string
pub trait DedupeStringProcessor: Debug + Send + Sync {
    /// Process the dedupe string derived from the alarm name
    fn process_dedupe_string(&self, dedupe_string: &str) -> String;

    /// Process an explicit dedupe string override
    fn process_dedupe_string_override(&self, dedupe_string: &str) -> String;
}

/// Leaves dedupe strings untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct DoNotModifyDedupeString;

impl DedupeStringProcessor for DoNotModifyDedupeString {
    fn process_dedupe_string(&self, dedupe_string: &str) -> String {
        dedupe_string.to_string()
    }

    fn process_dedupe_string_override(&self, dedupe_string: &str) -> String {
        dedupe_string.to_string()
    }
}

/// Wraps dedupe strings with a fixed prefix and suffix, overrides included
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendDedupeString {
    prefix: String,
    suffix: String,
}

impl ExtendDedupeString {
    pub fn new<S: Into<String>>(prefix: S, suffix: S) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    fn extend(&self, dedupe_string: &str) -> String {
        format!("{}{}{}", self.prefix, dedupe_string, self.suffix)
    }
}

impl DedupeStringProcessor for ExtendDedupeString {
    fn process_dedupe_string(&self, dedupe_string: &str) -> String {
        self.extend(dedupe_string)
    }

    fn process_dedupe_string_override(&self, dedupe_string: &str) -> String {
        self.extend(dedupe_string)
    }
}

/// Dedupe processor selection as it appears in configuration files
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DedupeProcessorConfig {
    #[default]
    DoNotModify,
    Extend {
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
    },
}

impl DedupeProcessorConfig {
    pub fn build(&self) -> Arc<dyn DedupeStringProcessor> {
        match self {
            DedupeProcessorConfig::DoNotModify => Arc::new(DoNotModifyDedupeString),
            DedupeProcessorConfig::Extend { prefix, suffix } => {
                Arc::new(ExtendDedupeString::new(prefix.as_str(), suffix.as_str()))
            }
        }
    }
}
