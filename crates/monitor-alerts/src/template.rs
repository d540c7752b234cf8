//! Placeholder substitution for shortcut templates.
//!
//! Shortcut definitions are written with a small subset of Go template
//! syntax. Only three actions are understood:
//!
//! | Action | Replaced with |
//! |--------|---------------|
//! | `{{ .Alert.ServiceName }}` | the owning service name |
//! | `{{ .Alert.Replicas }}` | the expected replica count |
//! | `{{ index .Values N }}` | the N-th comma-separated shortcut argument |
//!
//! Anything else between braces is copied through unchanged, so rendering
//! never fails and never evaluates arbitrary logic.

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Values available to a template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    /// The owning service name.
    pub service_name: &'a str,
    /// The expected replica count.
    pub replicas: u32,
    /// Positional shortcut arguments.
    pub values: &'a [&'a str],
}

impl<'a> TemplateContext<'a> {
    /// Creates a context.
    #[must_use]
    pub const fn new(service_name: &'a str, replicas: u32, values: &'a [&'a str]) -> Self {
        Self {
            service_name,
            replicas,
            values,
        }
    }

    fn resolve(&self, action: &str) -> Option<String> {
        let words: Vec<&str> = action.split_whitespace().collect();
        match words.as_slice() {
            [".Alert.ServiceName"] => Some(self.service_name.to_string()),
            [".Alert.Replicas"] => Some(self.replicas.to_string()),
            ["index", ".Values", idx] => {
                let idx: usize = idx.parse().ok()?;
                Some(self.values.get(idx).map_or_else(String::new, |v| (*v).to_string()))
            }
            _ => None,
        }
    }
}

/// Renders `template` against `ctx`.
#[must_use]
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };
        let action = &after_open[..end];
        match ctx.resolve(action) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + OPEN.len() + end + CLOSE.len()]),
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}
