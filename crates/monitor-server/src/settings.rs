//! Command line and environment settings of the `monitor` binary.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use monitor_config::{RenderSettings, passthrough_vars};

use crate::config::ServerConfig;

/// Monitor sidecar settings.
#[derive(Debug, Clone, Parser)]
#[command(name = "monitor")]
#[command(about = "Configures and reloads a metrics daemon from HTTP requests")]
#[command(version)]
pub struct Settings {
    /// Address of the HTTP control surface.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Main configuration file of the daemon.
    #[arg(long, env = "ARG_CONFIG_FILE", default_value = "/etc/prometheus/prometheus.yml")]
    pub config_file: PathBuf,

    /// Alert rule file.
    #[arg(long, env = "ALERT_RULES_PATH", default_value = "/etc/prometheus/alert.rules")]
    pub alert_rules_path: PathBuf,

    /// Directory of file discovery side files.
    #[arg(long, env = "FILE_SD_DIR", default_value = "/etc/prometheus/file_sd")]
    pub file_sd_dir: PathBuf,

    /// Directory of scrape fragments and shortcut overrides.
    #[arg(long, env = "CONFIGS_DIR", default_value = "/run/secrets")]
    pub configs_dir: PathBuf,

    /// Alertmanager URL.
    #[arg(long, env = "ARG_ALERTMANAGER_URL")]
    pub alertmanager_url: Option<String>,

    /// Address of the service inventory.
    #[arg(long, env = "LISTENER_ADDRESS")]
    pub listener_address: Option<String>,

    /// Timeout of each inventory request, in seconds.
    #[arg(long, env = "INVENTORY_TIMEOUT_SECS", default_value_t = 30)]
    pub inventory_timeout_secs: u64,

    /// Comma-separated node label names to keep.
    #[arg(long, env = "NODE_TARGET_LABELS", default_value = "")]
    pub node_target_labels: String,

    /// Comma-separated request parameters copied into scrape labels.
    #[arg(long, env = "SCRAPE_TARGET_LABELS", default_value = "")]
    pub scrape_target_labels: String,

    /// Do not start the daemon.
    #[arg(long, env = "SKIP_DAEMON")]
    pub skip_daemon: bool,
}

/// Splits a comma-separated list, dropping empty entries.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl Settings {
    /// Build the server configuration.
    ///
    /// Passthrough sections are taken from `env`.
    #[must_use]
    pub fn server_config(&self, env: &BTreeMap<String, String>) -> ServerConfig {
        let mut render = RenderSettings::default()
            .with_config_path(&self.config_file)
            .with_alert_rules_path(&self.alert_rules_path)
            .with_file_sd_dir(&self.file_sd_dir)
            .with_secrets_dir(&self.configs_dir);
        if let Some(url) = self.alertmanager_url.as_deref().filter(|u| !u.is_empty()) {
            render = render.with_alertmanager_url(url);
        }
        for (key, value) in passthrough_vars(env.iter().map(|(k, v)| (k.as_str(), v.as_str()))) {
            render = render.with_passthrough(key, value);
        }

        let mut config = ServerConfig::new(self.listen_addr)
            .with_render(render)
            .with_inventory_timeout(Duration::from_secs(self.inventory_timeout_secs));
        config.node_target_labels = split_list(&self.node_target_labels);
        config.scrape_target_labels = split_list(&self.scrape_target_labels);
        if let Some(address) = self.listener_address.as_deref().filter(|a| !a.is_empty()) {
            config = config.with_inventory_url(address);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn parse(args: &[&str]) -> Settings {
        Settings::try_parse_from(std::iter::once("monitor").chain(args.iter().copied())).unwrap()
    }

    #[test_case("", 0 ; "empty")]
    #[test_case("a", 1 ; "single")]
    #[test_case("a, b ,,c", 3 ; "spaces and gaps")]
    fn list_sizes(value: &str, expected: usize) {
        assert_eq!(split_list(value).len(), expected);
    }

    #[test]
    fn flags_override_defaults() {
        let settings = parse(&[
            "--listen-addr",
            "127.0.0.1:9000",
            "--node-target-labels",
            "aws_region,role",
            "--listener-address",
            "swarm-listener",
            "--alertmanager-url",
            "http://alertmanager:9093",
            "--skip-daemon",
        ]);
        let config = settings.server_config(&BTreeMap::new());

        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.node_target_labels, vec!["aws_region", "role"]);
        assert_eq!(config.inventory_url.as_deref(), Some("swarm-listener"));
        assert_eq!(
            config.render.alertmanager_url.as_deref(),
            Some("http://alertmanager:9093")
        );
        assert!(settings.skip_daemon);
    }

    #[test]
    fn passthrough_env_reaches_render_settings() {
        let settings = parse(&[]);
        let env = BTreeMap::from([
            ("GLOBAL__SCRAPE_INTERVAL".to_string(), "10s".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ]);

        let config = settings.server_config(&env);

        assert_eq!(config.render.passthrough.len(), 1);
        assert_eq!(config.render.config_path, PathBuf::from("/etc/prometheus/prometheus.yml"));
    }
}
