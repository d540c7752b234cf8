//! Alert rule file rendering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::AlertRule;

/// Name of the single rule group written to the rule file.
pub const RULE_GROUP_NAME: &str = "alert.rules";

/// Top-level document of a rule file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFile {
    /// Rule groups.
    pub groups: Vec<RuleGroup>,
}

/// A named group of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    /// Group name.
    pub name: String,
    /// Rules in the group.
    pub rules: Vec<RuleEntry>,
}

/// A single rendered alerting rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    /// Alert name, the rule's formatted key.
    pub alert: String,
    /// Alert expression.
    pub expr: String,
    /// Pending duration.
    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub for_duration: Option<String>,
    /// Labels attached to fired alerts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations attached to fired alerts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl From<&AlertRule> for RuleEntry {
    fn from(alert: &AlertRule) -> Self {
        Self {
            alert: alert.formatted_key.clone(),
            expr: alert.expression.clone(),
            for_duration: (!alert.for_duration.is_empty()).then(|| alert.for_duration.clone()),
            labels: alert.labels.clone(),
            annotations: alert.annotations.clone(),
        }
    }
}

impl RuleFile {
    /// Builds a rule file from alerts, ordered by formatted key.
    pub fn from_alerts<'a>(alerts: impl IntoIterator<Item = &'a AlertRule>) -> Self {
        let mut rules: Vec<RuleEntry> = alerts.into_iter().map(RuleEntry::from).collect();
        rules.sort_by(|a, b| a.alert.cmp(&b.alert));
        Self {
            groups: vec![RuleGroup {
                name: RULE_GROUP_NAME.to_string(),
                rules,
            }],
        }
    }

    /// Serializes the rule file to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
