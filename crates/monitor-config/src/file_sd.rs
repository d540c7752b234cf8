//! File-based service discovery side files.
//!
//! Every scrape with nodes gets `<dir>/<service>.json`, a JSON array with
//! one target group per node. The directory only ever holds files for the
//! current scrapes; anything else ending in `.json` is removed.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::schema::TargetGroup;
use crate::scrape::{ScrapeTarget, is_safe_service_name};

/// Labels of every known node, keyed by node ID.
pub type NodeLabels = BTreeMap<String, BTreeMap<String, String>>;

/// Label holding the node name in every group.
pub const NODE_LABEL: &str = "node";
/// Label holding the service name in every group.
pub const SERVICE_LABEL: &str = "service";

const FILE_SD_EXTENSION: &str = "json";

/// Returns the side file path for a service.
#[must_use]
pub fn file_sd_path(dir: &Path, service_name: &str) -> PathBuf {
    dir.join(format!("{service_name}.{FILE_SD_EXTENSION}"))
}

/// Builds the target groups of a node-bearing scrape.
///
/// Labels are layered as scrape labels, then `node` and `service`, then the
/// node's own labels looked up by ID.
#[must_use]
pub fn target_groups(target: &ScrapeTarget, node_labels: &NodeLabels) -> Vec<TargetGroup> {
    target
        .nodes
        .iter()
        .map(|node| {
            let mut labels = target.extra_labels.clone();
            labels.insert(NODE_LABEL.to_string(), node.name.clone());
            labels.insert(SERVICE_LABEL.to_string(), target.service_name.clone());
            if !node.id.is_empty() {
                if let Some(extra) = node_labels.get(&node.id) {
                    labels.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            TargetGroup {
                targets: vec![format!("{}:{}", node.addr, target.port)],
                labels,
            }
        })
        .collect()
}

/// Writes the side file of a node-bearing scrape and returns its path.
///
/// Service names that would leave `dir` are refused with
/// [`ConfigError::InvalidPath`].
///
/// # Errors
///
/// Returns an error if the file cannot be serialized or written.
pub fn write_side_file(
    dir: &Path,
    target: &ScrapeTarget,
    node_labels: &NodeLabels,
) -> Result<PathBuf> {
    if !is_safe_service_name(&target.service_name) {
        return Err(ConfigError::InvalidPath(target.service_name.clone()));
    }
    let path = file_sd_path(dir, &target.service_name);
    let groups = target_groups(target, node_labels);
    let json = serde_json::to_vec(&groups)?;
    fs::write(&path, json).map_err(|e| ConfigError::io(&path, e))?;
    debug!(service = %target.service_name, path = %path.display(), groups = groups.len(), "wrote file sd targets");
    Ok(path)
}

/// Removes every `.json` file in `dir` that is not in `keep`.
///
/// Returns the removed paths. A missing directory removes nothing.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or a file cannot be
/// removed.
pub fn remove_orphans(dir: &Path, keep: &BTreeSet<PathBuf>) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ConfigError::io(dir, e)),
    };

    let mut orphans: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == FILE_SD_EXTENSION)
                && path.is_file()
                && !keep.contains(path)
        })
        .collect();
    orphans.sort();

    for path in &orphans {
        fs::remove_file(path).map_err(|e| ConfigError::io(path, e))?;
        info!(path = %path.display(), "removed orphaned file sd targets");
    }
    Ok(orphans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::NodeTarget;
    use tempfile::TempDir;
    use test_case::test_case;

    fn node_scrape() -> ScrapeTarget {
        ScrapeTarget::new("exporter", 9100)
            .with_label("env", "prod")
            .with_node(NodeTarget::new("node-1", "10.0.0.1", "id1"))
            .with_node(NodeTarget::new("node-2", "10.0.0.2", "id2"))
    }

    #[test]
    fn groups_layer_labels() {
        let node_labels = NodeLabels::from([(
            "id1".to_string(),
            BTreeMap::from([("az".to_string(), "a".to_string()), ("node".to_string(), "override".to_string())]),
        )]);

        let groups = target_groups(&node_scrape(), &node_labels);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].targets, vec!["10.0.0.1:9100"]);
        assert_eq!(groups[0].labels["env"], "prod");
        assert_eq!(groups[0].labels["service"], "exporter");
        assert_eq!(groups[0].labels["az"], "a");
        assert_eq!(groups[0].labels["node"], "override");
        assert_eq!(groups[1].labels["node"], "node-2");
        assert!(!groups[1].labels.contains_key("az"));
    }

    #[test]
    fn empty_node_id_skips_lookup() {
        let scrape = ScrapeTarget::new("svc", 80).with_node(NodeTarget::new("n", "1.2.3.4", ""));
        let node_labels =
            NodeLabels::from([(String::new(), BTreeMap::from([("x".to_string(), "y".to_string())]))]);
        let groups = target_groups(&scrape, &node_labels);
        assert!(!groups[0].labels.contains_key("x"));
    }

    #[test]
    fn write_and_remove_orphans() {
        let dir = TempDir::new().unwrap();
        let path = write_side_file(dir.path(), &node_scrape(), &NodeLabels::new()).unwrap();
        fs::write(dir.path().join("stale.json"), "[]").unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        let written: Vec<TargetGroup> =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written.len(), 2);

        let removed = remove_orphans(dir.path(), &BTreeSet::from([path.clone()])).unwrap();
        assert_eq!(removed, vec![dir.path().join("stale.json")]);
        assert!(path.exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test_case("../escaped" ; "parent traversal")]
    #[test_case("nested/name" ; "separator")]
    #[test_case(".hidden" ; "leading dot")]
    fn side_file_refuses_names_leaving_dir(name: &str) {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("file_sd");
        fs::create_dir_all(&dir).unwrap();
        let scrape = ScrapeTarget::new(name, 80).with_node(NodeTarget::new("n", "1.2.3.4", ""));

        let err = write_side_file(&dir, &scrape, &NodeLabels::new()).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidPath(_)));
        assert!(!root.path().join("escaped.json").exists());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn remove_orphans_missing_dir() {
        let dir = TempDir::new().unwrap();
        let removed = remove_orphans(&dir.path().join("absent"), &BTreeSet::new()).unwrap();
        assert!(removed.is_empty());
    }
}
