//! Alert rules and expression shortcuts for the monitor sidecar.
//!
//! `monitor-alerts` owns everything that is specific to alerting rules:
//!
//! - **Keys**: [`alert_key`] derives the identity of a rule from its service
//!   and alert names.
//! - **Shortcuts**: [`ShortcutTable`] holds `@name` macros and expands them
//!   in place, including compound `_and_`/`_or_`/`_unless_` chains.
//! - **Rule files**: [`RuleFile`] renders stored rules into the daemon's rule
//!   file format.
//!
//! # Example
//!
//! ```rust
//! use monitor_alerts::{AlertRule, ShortcutTable};
//!
//! let table = ShortcutTable::builtin().unwrap();
//! let mut alert = AlertRule::new("web", "mem", "@service_mem_limit:0.8");
//!
//! assert!(table.expand(&mut alert));
//! assert!(alert.expression.ends_with("> 0.8"));
//! assert_eq!(alert.labels["service"], "web");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod expander;
pub mod normalize;
pub mod rules;
pub mod shortcuts;
pub mod template;
pub mod types;

pub use error::{AlertError, Result};
pub use normalize::{alert_key, normalize, service_prefix};
pub use rules::{RuleEntry, RuleFile, RuleGroup};
pub use shortcuts::{SHORTCUT_SIGIL, ShortcutDefinition, ShortcutTable};
pub use types::AlertRule;
