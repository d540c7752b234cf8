//! # monitor-server
//!
//! HTTP control surface of the monitor sidecar, built on axum.
//!
//! Each mutation request is decoded into the [`monitor_store`] store, the
//! configuration is re-rendered by [`monitor_config`] and the daemon is told
//! to reload, all under one lock.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! use monitor_server::{DaemonProcess, ServerConfig, bootstrap};
//!
//! # async fn example() -> monitor_server::Result<()> {
//! let config = ServerConfig::default();
//! let runner = Arc::new(DaemonProcess::new(Vec::new()));
//! let server = bootstrap(config, &BTreeMap::new(), runner).await?;
//! server.serve("0.0.0.0:8080".parse().unwrap()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/v1/docker-flow-monitor/reconfigure` | GET, POST | Replace a service's scrape and alerts |
//! | `/v1/docker-flow-monitor/remove` | DELETE, GET | Remove a service |
//! | `/v1/docker-flow-monitor/node/reconfigure` | GET, PUT | Store a node's labels |
//! | `/v1/docker-flow-monitor/node/remove` | DELETE, GET | Drop a node's labels |
//! | `/v1/docker-flow-monitor/ping` | GET | Liveness |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod inventory;
pub mod process;
pub mod routes;
pub mod server;
pub mod settings;
pub mod startup;
pub mod state;
pub mod testing;
pub mod types;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use inventory::InventoryClient;
pub use process::{DaemonProcess, ProcessRunner, daemon_flags};
pub use routes::{API_PREFIX, create_router};
pub use server::MonitorServer;
pub use settings::Settings;
pub use startup::{bootstrap, load_shortcuts};
pub use state::MonitorState;
pub use types::{MutationResponse, NodeResponse};
