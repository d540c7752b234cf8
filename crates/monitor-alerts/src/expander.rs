//! Shortcut expansion.
//!
//! An expression such as `@service_mem_limit:0.8` is replaced by the
//! definition's rendered template. Several shortcuts can be chained with
//! `_and_`, `_or_` or `_unless_`; every segment is expanded on its own and
//! the results are joined with the matching operator.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::shortcuts::{SHORTCUT_SIGIL, ShortcutTable};
use crate::template::{TemplateContext, render};
use crate::types::AlertRule;

/// Infix operators recognised between chained shortcuts, with their joiners.
const OPERATORS: [(&str, &str); 3] = [
    ("_and_", " and "),
    ("_or_", " or "),
    ("_unless_", " unless "),
];

/// Result of expanding a single segment.
#[derive(Debug, Default)]
struct Expansion {
    expression: String,
    annotations: BTreeMap<String, String>,
    labels: BTreeMap<String, String>,
}

/// Splits a compound expression at the leftmost operator each time.
///
/// Returns the segments and the joiner preceding every segment after the first.
fn split_compound(expression: &str) -> (Vec<&str>, Vec<&'static str>) {
    let mut segments = Vec::new();
    let mut joiners = Vec::new();
    let mut rest = expression;

    loop {
        let next = OPERATORS
            .iter()
            .filter_map(|(op, joiner)| rest.find(op).map(|pos| (pos, *op, *joiner)))
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, op, joiner)) => {
                segments.push(&rest[..pos]);
                joiners.push(joiner);
                rest = &rest[pos + op.len()..];
            }
            None => {
                segments.push(rest);
                return (segments, joiners);
            }
        }
    }
}

/// Splits `@name:a,b` into the name and positional values.
fn parse_segment(segment: &str) -> Option<(&str, Vec<&str>)> {
    let body = segment.trim().strip_prefix(SHORTCUT_SIGIL)?;
    match body.split_once(':') {
        Some((name, args)) => Some((name, args.split(',').collect())),
        None => Some((body, Vec::new())),
    }
}

impl ShortcutTable {
    fn expand_segment(&self, segment: &str, alert: &AlertRule) -> Option<Expansion> {
        let (name, values) = parse_segment(segment)?;
        let definition = self.get(name)?;
        let ctx = TemplateContext::new(&alert.service_name, alert.replicas, &values);

        let render_map = |map: &BTreeMap<String, String>| {
            map.iter()
                .map(|(k, v)| (k.clone(), render(v, &ctx)))
                .collect::<BTreeMap<_, _>>()
        };

        Some(Expansion {
            expression: render(&definition.expression_template, &ctx),
            annotations: render_map(&definition.annotations),
            labels: render_map(&definition.labels),
        })
    }

    /// Expands a shortcut expression on `alert` in place.
    ///
    /// Annotation and label keys already present on the alert are kept; in a
    /// compound expression an earlier segment also wins over a later one.
    /// Returns `false` and leaves the alert untouched when the expression is
    /// not a shortcut or any segment names an unknown shortcut.
    pub fn expand(&self, alert: &mut AlertRule) -> bool {
        if !alert.is_shortcut() {
            return false;
        }

        let (segments, joiners) = split_compound(&alert.expression);
        let mut expansions = Vec::with_capacity(segments.len());
        for segment in &segments {
            let Some(expansion) = self.expand_segment(segment, alert) else {
                warn!(
                    service = %alert.service_name,
                    alert = %alert.alert_name,
                    segment = %segment,
                    "unknown alert shortcut, leaving expression unchanged"
                );
                return false;
            };
            expansions.push(expansion);
        }

        let mut expression = String::new();
        for (i, expansion) in expansions.into_iter().enumerate() {
            if let Some(joiner) = i.checked_sub(1).and_then(|j| joiners.get(j)) {
                expression.push_str(joiner);
            }
            expression.push_str(&expansion.expression);
            for (k, v) in expansion.annotations {
                alert.annotations.entry(k).or_insert(v);
            }
            for (k, v) in expansion.labels {
                alert.labels.entry(k).or_insert(v);
            }
        }

        debug!(
            service = %alert.service_name,
            alert = %alert.alert_name,
            shortcut = %alert.expression,
            "expanded alert shortcut"
        );
        alert.expression = expression;
        true
    }
}
