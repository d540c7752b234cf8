//! Environment variable passthrough into the configuration document.
//!
//! A variable such as `SCRAPE_CONFIGS_2__STATIC_CONFIGS_1__TARGETS_1=db:9104`
//! is lowercased and split on `__` into a path. The path is walked over the
//! statically declared schema one segment at a time:
//!
//! - a segment equal to a field name descends into that field,
//! - a segment `name_N` selects the N-th (1-based) element of list `name`,
//!   growing the list as needed,
//! - maps take a `key=value` value and accumulate one entry per variable,
//! - flattened sections are tried when no field of the outer struct matches.
//!
//! Older single-underscore keys (`GLOBAL_SCRAPE_INTERVAL`,
//! `REMOTE_WRITE_URL`, `GLOBAL_EXTERNAL_LABELS-NAME=value`) are upgraded to
//! this form first.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConfigError, Result};
use crate::schema::{
    AlertingConfig, AlertmanagerConfig, BasicAuth, Config, DnsSdConfig, FileSdConfig,
    GlobalConfig, HttpClientConfig, QueueConfig, RelabelConfig, RemoteReadConfig,
    RemoteWriteConfig, ScrapeConfig, ServiceDiscoveryConfig, TargetGroup, TlsConfig,
};

/// Variable prefixes that are passed through into the config document.
pub const PASSTHROUGH_PREFIXES: [&str; 5] = [
    "GLOBAL_",
    "ALERTING_",
    "SCRAPE_CONFIGS_",
    "REMOTE_WRITE_",
    "REMOTE_READ_",
];

/// Separator between path segments in a variable name.
pub const PATH_SEPARATOR: &str = "__";

/// Regex for indexed list segments (`name_N`).
static LIST_SEGMENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)_(\d+)$").unwrap_or_else(|_| unreachable!()));

/// Returns true if `key` is a passthrough variable.
#[must_use]
pub fn is_passthrough_key(key: &str) -> bool {
    PASSTHROUGH_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Selects the passthrough variables out of an environment snapshot.
pub fn passthrough_vars<I, K, V>(vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    vars.into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .filter(|(k, _)| is_passthrough_key(k))
        .collect()
}

/// Upgrades a single-underscore key to the double-underscore form.
///
/// Keys that already contain `__` are returned unchanged.
#[must_use]
pub fn upgrade_legacy_key(key: &str, value: &str) -> (String, String) {
    if key.contains(PATH_SEPARATOR) {
        return (key.to_string(), value.to_string());
    }

    let mut key = key
        .replacen("GLOBAL_", "GLOBAL__", 1)
        .replacen("REMOTE_WRITE_", "REMOTE_WRITE_1__", 1)
        .replacen("REMOTE_READ_", "REMOTE_READ_1__", 1);
    let mut value = value.to_string();

    if key.starts_with("GLOBAL__EXTERNAL_LABELS") {
        if let Some((base, label)) = key.split_once('-') {
            if !label.contains('-') {
                value = format!("{}={value}", label.to_lowercase());
                key = base.to_string();
            }
        }
    }
    (key, value)
}

/// Splits `name_N` into the list name and its 1-based index.
fn list_segment(segment: &str) -> Option<(&str, usize)> {
    let caps = LIST_SEGMENT_REGEX.captures(segment)?;
    let name = caps.get(1)?.as_str();
    let index = caps.get(2)?.as_str().parse().ok()?;
    Some((name, index))
}

/// A node of the configuration schema that can absorb an environment value.
pub trait EnvNode {
    /// Stores `value` at `path` below this node.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist in the schema or the value
    /// cannot be converted.
    fn insert_at(&mut self, path: &[String], value: &str) -> Result<()>;
}

impl EnvNode for String {
    fn insert_at(&mut self, path: &[String], value: &str) -> Result<()> {
        if let Some(extra) = path.first() {
            return Err(ConfigError::InvalidPath(extra.clone()));
        }
        *self = value.to_string();
        Ok(())
    }
}

macro_rules! parsed_scalar {
    ($($ty:ty => $expected:literal),* $(,)?) => {
        $(
            impl EnvNode for $ty {
                fn insert_at(&mut self, path: &[String], value: &str) -> Result<()> {
                    if let Some(extra) = path.first() {
                        return Err(ConfigError::InvalidPath(extra.clone()));
                    }
                    *self = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                        value: value.to_string(),
                        expected: $expected,
                    })?;
                    Ok(())
                }
            }
        )*
    };
}

parsed_scalar!(bool => "bool", u16 => "port number", u64 => "unsigned integer");

impl<T: EnvNode + Default + Clone> EnvNode for Option<T> {
    fn insert_at(&mut self, path: &[String], value: &str) -> Result<()> {
        let mut inner = self.clone().unwrap_or_default();
        inner.insert_at(path, value)?;
        *self = Some(inner);
        Ok(())
    }
}

/// Highest 1-based index a list entry may use.
pub const MAX_LIST_INDEX: usize = 1000;

/// Lists are indexed from 1. Entries between the current end and `index`
/// are filled with defaults, but only once the insert succeeds.
impl<T: EnvNode + Default + Clone> EnvNode for Vec<T> {
    fn insert_at(&mut self, path: &[String], value: &str) -> Result<()> {
        let segment = path
            .first()
            .ok_or_else(|| ConfigError::InvalidPath("missing list index".to_string()))?;
        let (_, index) = list_segment(segment)
            .filter(|(_, index)| (1..=MAX_LIST_INDEX).contains(index))
            .ok_or_else(|| ConfigError::InvalidPath(segment.clone()))?;

        let mut entry = self.get(index - 1).cloned().unwrap_or_default();
        entry.insert_at(&path[1..], value)?;

        if self.len() < index {
            self.resize_with(index, T::default);
        }
        self[index - 1] = entry;
        Ok(())
    }
}

fn split_map_value(value: &str) -> Result<(&str, &str)> {
    value
        .split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| ConfigError::InvalidValue {
            value: value.to_string(),
            expected: "key=value",
        })
}

impl EnvNode for BTreeMap<String, String> {
    fn insert_at(&mut self, path: &[String], value: &str) -> Result<()> {
        if let Some(extra) = path.first() {
            return Err(ConfigError::InvalidPath(extra.clone()));
        }
        let (key, value) = split_map_value(value)?;
        self.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Maps of lists take `key_N=value`; a key without index appends.
impl EnvNode for BTreeMap<String, Vec<String>> {
    fn insert_at(&mut self, path: &[String], value: &str) -> Result<()> {
        if let Some(extra) = path.first() {
            return Err(ConfigError::InvalidPath(extra.clone()));
        }
        let (key, value) = split_map_value(value)?;
        match list_segment(key) {
            Some((name, _)) => self
                .entry(name.to_string())
                .or_default()
                .insert_at(&[key.to_string()], value),
            None => {
                self.entry(key.to_string()).or_default().push(value.to_string());
                Ok(())
            }
        }
    }
}

/// Implements [`EnvNode`] for a schema struct from its field table.
///
/// Each field is listed with its config name; `inline` fields are flattened
/// sections tried in order when no named field matches.
macro_rules! env_schema {
    ($ty:ty { $($field:ident => $name:literal),* $(,)? } $(inline { $($inline:ident),* $(,)? })?) => {
        impl EnvNode for $ty {
            fn insert_at(&mut self, path: &[String], value: &str) -> Result<()> {
                let segment = path
                    .first()
                    .ok_or_else(|| ConfigError::InvalidPath("path ends at a section".to_string()))?;
                let list_name = list_segment(segment).map(|(name, _)| name);

                $(
                    if segment == $name {
                        return self.$field.insert_at(&path[1..], value);
                    }
                    if list_name == Some($name) {
                        return self.$field.insert_at(path, value);
                    }
                )*
                $($(
                    if self.$inline.insert_at(path, value).is_ok() {
                        return Ok(());
                    }
                )*)?
                Err(ConfigError::UnknownField(segment.clone()))
            }
        }
    };
}

env_schema!(Config {
    global => "global",
    alerting => "alerting",
    rule_files => "rule_files",
    scrape_configs => "scrape_configs",
    remote_write => "remote_write",
    remote_read => "remote_read",
});

env_schema!(GlobalConfig {
    scrape_interval => "scrape_interval",
    scrape_timeout => "scrape_timeout",
    evaluation_interval => "evaluation_interval",
    external_labels => "external_labels",
});

env_schema!(AlertingConfig {
    alert_relabel_configs => "alert_relabel_configs",
    alertmanagers => "alertmanagers",
});

env_schema!(AlertmanagerConfig {
    scheme => "scheme",
    path_prefix => "path_prefix",
    timeout => "timeout",
    relabel_configs => "relabel_configs",
} inline { service_discovery, http_client });

env_schema!(ServiceDiscoveryConfig {
    static_configs => "static_configs",
    dns_sd_configs => "dns_sd_configs",
    file_sd_configs => "file_sd_configs",
});

env_schema!(TargetGroup {
    targets => "targets",
    labels => "labels",
});

env_schema!(DnsSdConfig {
    names => "names",
    refresh_interval => "refresh_interval",
    record_type => "type",
    port => "port",
});

env_schema!(FileSdConfig {
    files => "files",
    refresh_interval => "refresh_interval",
});

env_schema!(HttpClientConfig {
    basic_auth => "basic_auth",
    bearer_token => "bearer_token",
    bearer_token_file => "bearer_token_file",
    proxy_url => "proxy_url",
    tls_config => "tls_config",
});

env_schema!(BasicAuth {
    username => "username",
    password => "password",
    password_file => "password_file",
});

env_schema!(TlsConfig {
    ca_file => "ca_file",
    cert_file => "cert_file",
    key_file => "key_file",
    server_name => "server_name",
    insecure_skip_verify => "insecure_skip_verify",
});

env_schema!(RelabelConfig {
    source_labels => "source_labels",
    separator => "separator",
    regex => "regex",
    modulus => "modulus",
    target_label => "target_label",
    replacement => "replacement",
    action => "action",
});

env_schema!(ScrapeConfig {
    job_name => "job_name",
    honor_labels => "honor_labels",
    params => "params",
    scrape_interval => "scrape_interval",
    scrape_timeout => "scrape_timeout",
    metrics_path => "metrics_path",
    scheme => "scheme",
    sample_limit => "sample_limit",
    relabel_configs => "relabel_configs",
    metric_relabel_configs => "metric_relabel_configs",
} inline { service_discovery, http_client });

env_schema!(QueueConfig {
    capacity => "capacity",
    max_shards => "max_shards",
    max_samples_per_send => "max_samples_per_send",
    batch_send_deadline => "batch_send_deadline",
    max_retries => "max_retries",
    min_backoff => "min_backoff",
    max_backoff => "max_backoff",
});

env_schema!(RemoteWriteConfig {
    url => "url",
    remote_timeout => "remote_timeout",
    write_relabel_configs => "write_relabel_configs",
    queue_config => "queue_config",
} inline { http_client });

env_schema!(RemoteReadConfig {
    url => "url",
    remote_timeout => "remote_timeout",
    read_recent => "read_recent",
    required_matchers => "required_matchers",
} inline { http_client });

impl Config {
    /// Applies one environment variable to the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not name a schema field or the value
    /// does not fit the field.
    pub fn insert_env(&mut self, key: &str, value: &str) -> Result<()> {
        let (key, value) = upgrade_legacy_key(key, value);
        let path: Vec<String> = key
            .to_lowercase()
            .split(PATH_SEPARATOR)
            .map(str::to_string)
            .collect();
        self.insert_at(&path, &value)
    }
}
