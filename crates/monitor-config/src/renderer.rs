//! Configuration rendering.
//!
//! [`ConfigRenderer::render`] regenerates every file the daemon reads from
//! the current scrapes, alerts and node labels. Output depends only on that
//! state and the renderer's settings, so repeated renders of the same state
//! produce identical files.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use monitor_alerts::{AlertRule, RuleFile};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ConfigError, Result};
use crate::file_sd::{NodeLabels, file_sd_path, remove_orphans, write_side_file};
use crate::fragments::load_fragments;
use crate::schema::{
    AlertmanagerConfig, Config, DnsSdConfig, FileSdConfig, ScrapeConfig, ServiceDiscoveryConfig,
    TargetGroup,
};
use crate::scrape::{DiscoveryMode, ScrapeTarget};

/// Default path of the main configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/prometheus/prometheus.yml";
/// Default path of the alert rule file.
pub const DEFAULT_ALERT_RULES_PATH: &str = "/etc/prometheus/alert.rules";
/// Default directory of file discovery side files.
pub const DEFAULT_FILE_SD_DIR: &str = "/etc/prometheus/file_sd";

/// DNS name prefix resolving to every task of a swarm service.
const TASKS_PREFIX: &str = "tasks.";
const DNS_RECORD_TYPE: &str = "A";

/// Where and how configuration is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Main configuration file.
    pub config_path: PathBuf,
    /// Alert rule file.
    pub alert_rules_path: PathBuf,
    /// Directory holding file discovery side files.
    pub file_sd_dir: PathBuf,
    /// Directory scanned for `scrape_*` fragments.
    pub secrets_dir: Option<PathBuf>,
    /// Alertmanager to send alerts to.
    pub alertmanager_url: Option<String>,
    /// Passthrough variables applied to every rendered document.
    pub passthrough: BTreeMap<String, String>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            alert_rules_path: PathBuf::from(DEFAULT_ALERT_RULES_PATH),
            file_sd_dir: PathBuf::from(DEFAULT_FILE_SD_DIR),
            secrets_dir: None,
            alertmanager_url: None,
            passthrough: BTreeMap::new(),
        }
    }
}

impl RenderSettings {
    /// Creates settings that place every file under `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config_path: dir.join("prometheus.yml"),
            alert_rules_path: dir.join("alert.rules"),
            file_sd_dir: dir.join("file_sd"),
            ..Self::default()
        }
    }

    /// Sets the main configuration file path.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Sets the alert rule file path.
    #[must_use]
    pub fn with_alert_rules_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.alert_rules_path = path.into();
        self
    }

    /// Sets the file discovery directory.
    #[must_use]
    pub fn with_file_sd_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.file_sd_dir = dir.into();
        self
    }

    /// Sets the fragment directory.
    #[must_use]
    pub fn with_secrets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.secrets_dir = Some(dir.into());
        self
    }

    /// Sets the alertmanager URL.
    #[must_use]
    pub fn with_alertmanager_url(mut self, url: impl Into<String>) -> Self {
        self.alertmanager_url = Some(url.into());
        self
    }

    /// Adds a passthrough variable.
    #[must_use]
    pub fn with_passthrough(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.passthrough.insert(key.into(), value.into());
        self
    }

    /// Returns how the main file refers to the rule file.
    ///
    /// A rule file next to the main file is referenced by name only.
    #[must_use]
    pub fn rule_file_reference(&self) -> String {
        let same_dir = self.alert_rules_path.parent() == self.config_path.parent();
        match self.alert_rules_path.file_name() {
            Some(name) if same_dir => name.to_string_lossy().into_owned(),
            _ => self.alert_rules_path.display().to_string(),
        }
    }
}

/// What a render produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Scrape jobs in the main file.
    pub scrape_jobs: usize,
    /// Rules in the rule file.
    pub alert_rules: usize,
    /// Side files written.
    pub file_sd_files: Vec<PathBuf>,
    /// Orphaned side files removed.
    pub removed_files: Vec<PathBuf>,
}

/// Builds the alertmanager section for a URL.
///
/// # Errors
///
/// Returns an error if the URL does not parse or has no host.
pub fn alertmanager_config(url: &str) -> Result<AlertmanagerConfig> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| invalid("missing host".to_string()))?;
    let target = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let path = parsed.path().trim_end_matches('/');

    Ok(AlertmanagerConfig {
        scheme: Some(parsed.scheme().to_string()),
        path_prefix: (!path.is_empty()).then(|| path.to_string()),
        service_discovery: ServiceDiscoveryConfig {
            static_configs: vec![TargetGroup {
                targets: vec![target],
                ..TargetGroup::default()
            }],
            ..ServiceDiscoveryConfig::default()
        },
        ..AlertmanagerConfig::default()
    })
}

/// Renders configuration files from scrape, alert and node label state.
#[derive(Debug, Clone, Default)]
pub struct ConfigRenderer {
    settings: RenderSettings,
}

impl ConfigRenderer {
    /// Creates a renderer.
    #[must_use]
    pub const fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Builds the scrape job of one target.
    #[must_use]
    pub fn scrape_job(&self, target: &ScrapeTarget) -> ScrapeConfig {
        let mut job = ScrapeConfig::new(&target.service_name);
        job.metrics_path = Some(target.metrics_path_or_default().to_string());
        job.scrape_interval = (!target.interval.is_empty()).then(|| target.interval.clone());
        job.scrape_timeout = (!target.timeout.is_empty()).then(|| target.timeout.clone());

        let sd = &mut job.service_discovery;
        if target.has_nodes() {
            let path = file_sd_path(&self.settings.file_sd_dir, &target.service_name);
            sd.file_sd_configs.push(FileSdConfig {
                files: vec![path.display().to_string()],
                ..FileSdConfig::default()
            });
        } else if target.discovery_mode == DiscoveryMode::Static {
            sd.static_configs.push(TargetGroup {
                targets: vec![format!("{}:{}", target.service_name, target.port)],
                labels: target.extra_labels.clone(),
            });
        } else {
            sd.dns_sd_configs.push(DnsSdConfig {
                names: vec![format!("{TASKS_PREFIX}{}", target.service_name)],
                record_type: Some(DNS_RECORD_TYPE.to_string()),
                port: Some(target.port),
                ..DnsSdConfig::default()
            });
        }
        job
    }

    /// Builds the main document without touching the filesystem.
    ///
    /// Passthrough variables are applied first in key order, then one job per
    /// valid scrape is appended in service name order.
    #[must_use]
    pub fn build_config(&self, scrapes: &BTreeMap<String, ScrapeTarget>, has_alerts: bool) -> Config {
        let mut config = Config::default();

        for (key, value) in &self.settings.passthrough {
            if let Err(e) = config.insert_env(key, value) {
                warn!(key = %key, error = %e, "ignoring passthrough variable");
            }
        }

        for target in scrapes.values() {
            if target.is_valid() {
                config.scrape_configs.push(self.scrape_job(target));
            } else {
                warn!(service = %target.service_name, port = target.port, "skipping invalid scrape");
            }
        }

        if let Some(url) = &self.settings.alertmanager_url {
            match alertmanager_config(url) {
                Ok(am) => config.alerting.alertmanagers.push(am),
                Err(e) => warn!(url = %url, error = %e, "ignoring alertmanager url"),
            }
        }

        if has_alerts {
            config.rule_files.push(self.settings.rule_file_reference());
        }
        config
    }

    /// Writes the main file, the rule file and the side files.
    ///
    /// # Errors
    ///
    /// Returns the first I/O or serialization error. Files written before
    /// the failure are left in place.
    pub fn render(
        &self,
        scrapes: &BTreeMap<String, ScrapeTarget>,
        alerts: &BTreeMap<String, AlertRule>,
        node_labels: &NodeLabels,
    ) -> Result<RenderSummary> {
        let settings = &self.settings;
        for dir in [
            settings.config_path.parent(),
            settings.alert_rules_path.parent(),
            Some(settings.file_sd_dir.as_path()),
        ]
        .into_iter()
        .flatten()
        .filter(|dir| !dir.as_os_str().is_empty())
        {
            fs::create_dir_all(dir).map_err(|e| ConfigError::io(dir, e))?;
        }

        let mut config = self.build_config(scrapes, !alerts.is_empty());
        if let Some(dir) = &settings.secrets_dir {
            config.scrape_configs.extend(load_fragments(dir)?);
        }

        let mut file_sd_files = Vec::new();
        for target in scrapes.values().filter(|t| t.has_nodes() && t.is_valid()) {
            file_sd_files.push(write_side_file(&settings.file_sd_dir, target, node_labels)?);
        }

        self.write_rules(alerts)?;

        let yaml = serde_yaml::to_string(&config)?;
        fs::write(&settings.config_path, yaml)
            .map_err(|e| ConfigError::io(&settings.config_path, e))?;

        let keep: BTreeSet<PathBuf> = file_sd_files.iter().cloned().collect();
        let removed_files = remove_orphans(&settings.file_sd_dir, &keep)?;

        let summary = RenderSummary {
            scrape_jobs: config.scrape_configs.len(),
            alert_rules: alerts.len(),
            file_sd_files,
            removed_files,
        };
        info!(
            path = %settings.config_path.display(),
            scrape_jobs = summary.scrape_jobs,
            alert_rules = summary.alert_rules,
            file_sd_files = summary.file_sd_files.len(),
            "wrote daemon configuration"
        );
        Ok(summary)
    }

    fn write_rules(&self, alerts: &BTreeMap<String, AlertRule>) -> Result<()> {
        let path = &self.settings.alert_rules_path;
        if alerts.is_empty() {
            return match fs::remove_file(path) {
                Ok(()) => {
                    debug!(path = %path.display(), "removed empty alert rule file");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(ConfigError::io(path, e)),
            };
        }

        let yaml = RuleFile::from_alerts(alerts.values()).to_yaml()?;
        fs::write(path, yaml).map_err(|e| ConfigError::io(path, e))?;
        debug!(path = %path.display(), rules = alerts.len(), "wrote alert rules");
        Ok(())
    }
}
