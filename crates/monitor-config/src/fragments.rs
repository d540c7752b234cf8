//! Scrape job fragments read from the secrets directory.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ConfigError, Result};
use crate::schema::ScrapeConfig;

/// File name prefix of scrape fragments.
pub const FRAGMENT_PREFIX: &str = "scrape_";

/// Removes the indentation of the first non-blank line from every line.
///
/// Older fragments were written pre-indented for splicing into a larger
/// document.
#[must_use]
pub fn dedent(content: &str) -> String {
    let indent = content
        .lines()
        .find(|line| !line.trim().is_empty())
        .map_or(0, |line| line.len() - line.trim_start_matches(' ').len());

    content
        .lines()
        .map(|line| {
            let leading = line.len() - line.trim_start_matches(' ').len();
            &line[leading.min(indent)..]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses one fragment into scrape jobs.
///
/// # Errors
///
/// Returns an error if the fragment is not a YAML list of scrape jobs.
pub fn parse_fragment(content: &str) -> Result<Vec<ScrapeConfig>> {
    Ok(serde_yaml::from_str(&dedent(content))?)
}

/// Reads every fragment in `dir`, in file name order.
///
/// Fragments that fail to parse are skipped with a warning. A missing
/// directory yields no jobs.
///
/// # Errors
///
/// Returns an error if the directory or a fragment cannot be read.
pub fn load_fragments(dir: &Path) -> Result<Vec<ScrapeConfig>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ConfigError::io(dir, e)),
    };

    let mut paths: Vec<_> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(FRAGMENT_PREFIX))
        })
        .collect();
    paths.sort();

    let mut jobs = Vec::new();
    for path in paths {
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::io(&path, e))?;
        match parse_fragment(&content) {
            Ok(parsed) => {
                debug!(path = %path.display(), jobs = parsed.len(), "loaded scrape fragment");
                jobs.extend(parsed);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unparseable scrape fragment"),
        }
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn dedent_strips_first_line_indent() {
        let input = "  - job_name: a\n    metrics_path: /m\n";
        assert_eq!(dedent(input), "- job_name: a\n  metrics_path: /m");
    }

    #[test]
    fn dedent_keeps_flush_content() {
        let input = "- job_name: a\n  scheme: https";
        assert_eq!(dedent(input), input);
    }

    #[test]
    fn parses_indented_fragment() {
        let jobs = parse_fragment(
            "    - job_name: node\n      static_configs:\n        - targets: ['n:9100']\n",
        )
        .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_name, "node");
        assert_eq!(jobs[0].service_discovery.static_configs[0].targets, vec!["n:9100"]);
    }

    #[test]
    fn load_skips_bad_and_unrelated_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("scrape_b"), "- job_name: b\n- job_name: c\n").unwrap();
        fs::write(dir.path().join("scrape_a"), "- job_name: a\n").unwrap();
        fs::write(dir.path().join("scrape_bad"), "job_name: [").unwrap();
        fs::write(dir.path().join("alertif_x"), "- job_name: nope\n").unwrap();

        let jobs = load_fragments(dir.path()).unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.job_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn load_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(load_fragments(&dir.path().join("none")).unwrap().is_empty());
    }
}
