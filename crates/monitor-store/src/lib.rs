//! In-memory state of the monitor sidecar.
//!
//! [`ReconciliationStore`] owns the scrapes, alerts and node labels the
//! configuration is rendered from. Requests are decoded from flat parameter
//! maps ([`request`]); startup state comes from the inventory service and
//! the environment ([`inventory`]).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod inventory;
pub mod request;
pub mod store;

pub use error::{Result, StoreError};
pub use inventory::{InventoryNode, scrapes_from_env};
pub use request::{Params, decode_alert, decode_node_labels, decode_scrape, parse_kv_list};
pub use store::{Mutation, ReconciliationStore};
