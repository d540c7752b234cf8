//! Configuration rendering for the metrics daemon.
//!
//! `monitor-config` turns the sidecar's live state into the files the daemon
//! reads:
//!
//! - the main YAML configuration ([`Config`]), including passthrough sections
//!   taken from environment variables ([`env`]),
//! - the alert rule file,
//! - one file discovery JSON file per node-bearing scrape ([`file_sd`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! use monitor_config::{ConfigRenderer, NodeLabels, RenderSettings, ScrapeTarget};
//!
//! let renderer = ConfigRenderer::new(RenderSettings::in_dir(Path::new("/tmp/prometheus")));
//! let scrapes = BTreeMap::from([("web".to_string(), ScrapeTarget::new("web", 8080))]);
//!
//! let summary = renderer.render(&scrapes, &BTreeMap::new(), &NodeLabels::new())?;
//! assert_eq!(summary.scrape_jobs, 1);
//! # Ok::<(), monitor_config::ConfigError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod file_sd;
pub mod fragments;
pub mod renderer;
pub mod schema;
pub mod scrape;

pub use env::{EnvNode, is_passthrough_key, passthrough_vars};
pub use error::{ConfigError, Result};
pub use file_sd::NodeLabels;
pub use renderer::{ConfigRenderer, RenderSettings, RenderSummary};
pub use schema::{Config, ScrapeConfig, TargetGroup};
pub use scrape::{DiscoveryMode, NodeTarget, ScrapeTarget, is_safe_service_name};
