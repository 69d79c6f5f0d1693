//! Per-site prompt rules.
//!
//! Rules live in the browser's synced storage under [`CONFIG_KEY`]. They
//! are edited by the options page, so anything read back is normalized
//! before use: older layouts and partially filled entries are repaired
//! rather than rejected.

mod pattern;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

pub use pattern::{MatchResult, UrlPattern, find_matching_group};

use crate::Result;
use crate::host::StorageArea;

/// Storage key of the rule configuration in synced storage.
pub const CONFIG_KEY: &str = "ruleConfig";

pub const DEFAULT_PROMPT: &str = "Please summarize ";

/// One URL pattern, optionally overriding its group's selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url_pattern: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub css_selector: String,
}

/// Patterns sharing one prompt and extraction selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prompt: String,
    /// The catch-all group, consulted after every other group.
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub css_selector: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleGroup {
    #[must_use]
    pub fn new_default() -> Self {
        Self {
            id: generate_id(),
            prompt: DEFAULT_PROMPT.to_string(),
            is_default: true,
            css_selector: String::new(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    #[serde(default)]
    pub rule_groups: Vec<RuleGroup>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            rule_groups: vec![RuleGroup::new_default()],
        }
    }
}

impl RuleConfig {
    /// Interpret whatever is stored under [`CONFIG_KEY`].
    ///
    /// Nothing stored, the legacy array layout, and values that don't parse
    /// all yield a config holding only a default group.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(map)) = value else {
            return Self::default();
        };
        if !map.contains_key("ruleGroups") {
            return Self::default();
        }

        match RuleConfig::deserialize(Value::Object(map.clone())) {
            Ok(config) => config.normalize(),
            Err(e) => {
                warn!("Ignoring unreadable rule config: {e}");
                Self::default()
            }
        }
    }

    /// Fill missing ids and ensure a default group exists.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        for group in &mut self.rule_groups {
            if group.id.is_empty() {
                group.id = generate_id();
            }
            for rule in &mut group.rules {
                if rule.id.is_empty() {
                    rule.id = generate_id();
                }
            }
        }
        if !self.rule_groups.iter().any(|g| g.is_default) {
            self.rule_groups.push(RuleGroup::new_default());
        }
        self
    }

    #[must_use]
    pub fn default_group(&self) -> Option<&RuleGroup> {
        self.rule_groups.iter().find(|g| g.is_default)
    }
}

/// Null reads as empty; the options page writes nulls for cleared fields.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[must_use]
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Durable home of the rule configuration.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// The stored config, normalized.
    async fn load_config(&self) -> Result<RuleConfig>;

    async fn save_config(&self, config: &RuleConfig) -> Result<()>;
}

/// [`SettingsStore`] over one browser storage area.
pub struct StorageSettingsStore {
    area: Arc<dyn StorageArea>,
}

impl StorageSettingsStore {
    #[must_use]
    pub fn new(area: Arc<dyn StorageArea>) -> Self {
        Self { area }
    }
}

#[async_trait]
impl SettingsStore for StorageSettingsStore {
    async fn load_config(&self) -> Result<RuleConfig> {
        let values = self.area.get(&[CONFIG_KEY]).await?;
        Ok(RuleConfig::from_value(values.get(CONFIG_KEY)))
    }

    async fn save_config(&self, config: &RuleConfig) -> Result<()> {
        let value = serde_json::to_value(config)?;
        self.area
            .set(HashMap::from([(CONFIG_KEY.to_string(), value)]))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_config_yields_default_group() {
        let config = RuleConfig::from_value(None);
        assert_eq!(config.rule_groups.len(), 1);
        assert!(config.rule_groups[0].is_default);
        assert_eq!(config.rule_groups[0].prompt, DEFAULT_PROMPT);
    }

    #[test]
    fn test_legacy_array_yields_default_group() {
        let config = RuleConfig::from_value(Some(&json!([{"pattern": "*"}])));
        assert_eq!(config.rule_groups.len(), 1);
        assert!(config.rule_groups[0].is_default);
    }

    #[test]
    fn test_unparsable_config_yields_default_group() {
        let config = RuleConfig::from_value(Some(&json!({"ruleGroups": "nope"})));
        assert_eq!(config.rule_groups.len(), 1);
        assert!(config.rule_groups[0].is_default);
    }

    #[test]
    fn test_normalize_fills_missing_fields() {
        let value = json!({
            "ruleGroups": [{
                "prompt": "Explain",
                "cssSelector": null,
                "rules": [{"urlPattern": "example.com/*"}]
            }]
        });
        let config = RuleConfig::from_value(Some(&value));

        assert_eq!(config.rule_groups.len(), 2);
        let group = &config.rule_groups[0];
        assert!(!group.id.is_empty());
        assert_eq!(group.css_selector, "");
        assert!(!group.rules[0].id.is_empty());
        assert_eq!(group.rules[0].css_selector, "");
        assert!(config.rule_groups[1].is_default);
    }

    #[test]
    fn test_normalize_keeps_existing_default() {
        let value = json!({
            "ruleGroups": [{"id": "d", "prompt": "Hi", "isDefault": true, "rules": []}]
        });
        let config = RuleConfig::from_value(Some(&value));
        assert_eq!(config.rule_groups.len(), 1);
        assert_eq!(config.rule_groups[0].id, "d");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_config_serializes_camel_case() {
        let config = RuleConfig {
            rule_groups: vec![RuleGroup {
                id: "g".to_string(),
                prompt: "P".to_string(),
                is_default: true,
                css_selector: "main".to_string(),
                rules: vec![],
            }],
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["ruleGroups"][0]["isDefault"], json!(true));
        assert_eq!(value["ruleGroups"][0]["cssSelector"], json!("main"));
    }
}
