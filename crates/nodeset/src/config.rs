//! Engine configuration
//!
//! Plain data, loadable from JSON. Hooks that are code (synthetic event
//! initializers, the script hook) are installed on the engine instead.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What re-registering the same callback on the same (node, kind) does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Attach another responder sharing the callback's guid
    #[default]
    Allow,
    /// Keep the existing responder, attach nothing
    Ignore,
}

/// Which node `before` / `after` infer their wrap tag from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiblingWrapContext {
    /// The target's parent, whose children the payload joins
    #[default]
    Parent,
    /// The target itself
    Target,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Container tag -> tag its children must have (`ul` -> `li`)
    pub wrap_tags: HashMap<String, String>,
    /// Wrap tag when nothing else can be inferred
    pub fallback_wrap_tag: String,
    pub sibling_wrap_context: SiblingWrapContext,
    pub duplicate_registration: DuplicatePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let wrap_tags = [("ul", "li"), ("dl", "dt"), ("tr", "td")]
            .into_iter()
            .map(|(parent, child)| (parent.to_string(), child.to_string()))
            .collect();
        Self {
            wrap_tags,
            fallback_wrap_tag: "div".to_string(),
            sibling_wrap_context: SiblingWrapContext::default(),
            duplicate_registration: DuplicatePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Required child tag for a container tag, if it has one
    pub fn wrap_tag_for(&self, parent_tag: &str) -> Option<&str> {
        self.wrap_tags
            .iter()
            .find(|(parent, _)| parent.eq_ignore_ascii_case(parent_tag))
            .map(|(_, child)| child.as_str())
    }
}
