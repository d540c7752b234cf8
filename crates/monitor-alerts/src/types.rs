//! Core alert types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::normalize::alert_key;

/// A named alerting rule owned by a service.
///
/// The rule is identified by [`AlertRule::formatted_key`], which is derived
/// from the service and alert names and never set directly by callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertRule {
    /// The service this alert belongs to.
    #[serde(rename = "serviceName")]
    pub service_name: String,
    /// The alert name as submitted.
    #[serde(rename = "alertName")]
    pub alert_name: String,
    /// The alert expression, possibly a `@shortcut` before expansion.
    #[serde(rename = "alertIf", skip_serializing_if = "String::is_empty")]
    pub expression: String,
    /// How long the expression must hold before the alert fires.
    #[serde(rename = "alertFor", skip_serializing_if = "String::is_empty")]
    pub for_duration: String,
    /// Alert annotations.
    #[serde(rename = "alertAnnotations", skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Alert labels.
    #[serde(rename = "alertLabels", skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Expected number of replicas of the service.
    pub replicas: u32,
    /// Whether the alert survives a plain removal of its service.
    #[serde(rename = "alertPersistent")]
    pub persistent: bool,
    /// The derived map key.
    #[serde(rename = "alertNameFormatted")]
    pub formatted_key: String,
}

impl AlertRule {
    /// Creates an alert for a service with the given name and expression.
    #[must_use]
    pub fn new(
        service_name: impl Into<String>,
        alert_name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        let mut alert = Self {
            service_name: service_name.into(),
            alert_name: alert_name.into(),
            expression: expression.into(),
            ..Self::default()
        };
        alert.refresh_key();
        alert
    }

    /// Sets the `for` duration.
    #[must_use]
    pub fn with_for(mut self, for_duration: impl Into<String>) -> Self {
        self.for_duration = for_duration.into();
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Sets the expected replica count.
    #[must_use]
    pub const fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }

    /// Marks the alert as persistent.
    #[must_use]
    pub const fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Recomputes [`AlertRule::formatted_key`] from the current names.
    pub fn refresh_key(&mut self) {
        self.formatted_key = alert_key(&self.service_name, &self.alert_name);
    }

    /// Returns true if the alert has both a name and an expression.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.alert_name.is_empty() && !self.expression.is_empty()
    }

    /// Returns true if the expression is a shortcut reference.
    #[must_use]
    pub fn is_shortcut(&self) -> bool {
        self.expression.starts_with(crate::shortcuts::SHORTCUT_SIGIL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_key() {
        let alert = AlertRule::new("my-service", "my-alert", "up == 0");
        assert_eq!(alert.formatted_key, "myservice_myalert");
    }

    #[test]
    fn same_names_collide() {
        let a = AlertRule::new("svc", "down", "up == 0");
        let b = AlertRule::new("svc", "down", "up < 1").with_for("5m");
        assert_eq!(a.formatted_key, b.formatted_key);
    }

    #[test]
    fn validity_requires_name_and_expression() {
        assert!(AlertRule::new("svc", "down", "up == 0").is_valid());
        assert!(!AlertRule::new("svc", "", "up == 0").is_valid());
        assert!(!AlertRule::new("svc", "down", "").is_valid());
    }

    #[test]
    fn builder_sets_fields() {
        let alert = AlertRule::new("svc", "mem", "@service_mem_limit:0.8")
            .with_for("30s")
            .with_annotation("summary", "high memory")
            .with_label("severity", "page")
            .with_replicas(3)
            .persistent(true);

        assert_eq!(alert.for_duration, "30s");
        assert_eq!(alert.annotations["summary"], "high memory");
        assert_eq!(alert.labels["severity"], "page");
        assert_eq!(alert.replicas, 3);
        assert!(alert.persistent);
        assert!(alert.is_shortcut());
    }

    #[test]
    fn serializes_with_wire_names() {
        let alert = AlertRule::new("svc", "down", "up == 0").with_for("1m");
        let value = serde_yaml::to_value(&alert).unwrap();

        assert_eq!(value["alertName"].as_str(), Some("down"));
        assert_eq!(value["alertIf"].as_str(), Some("up == 0"));
        assert_eq!(value["alertNameFormatted"].as_str(), Some("svc_down"));
        assert!(value.get("alertLabels").is_none());
    }
}
