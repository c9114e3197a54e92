//! Template interpolation for endpoint paths
//!
//! Handles `{{ variable }}` placeholders in the configured URL templates,
//! e.g. `/orgs/{{ resource_id }}/copilot/usage`.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ name }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").unwrap()
});

/// Variables available to a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    vars: BTreeMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a variable in place
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// Render a template string with the given context
///
/// Every placeholder must be defined; the error names all missing ones.
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match ctx.get(name) {
            Some(value) => value.to_string(),
            None => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_simple() {
        let ctx = TemplateContext::new().with("resource_id", "acme");
        let result = render("/orgs/{{ resource_id }}/copilot/usage", &ctx).unwrap();
        assert_eq!(result, "/orgs/acme/copilot/usage");
    }

    #[test]
    fn test_render_without_spaces() {
        let ctx = TemplateContext::new().with("enterprise", "megacorp");
        let result = render("/enterprises/{{enterprise}}/copilot/usage", &ctx).unwrap();
        assert_eq!(result, "/enterprises/megacorp/copilot/usage");
    }

    #[test]
    fn test_render_repeated_variable() {
        let ctx = TemplateContext::new().with("a", "x");
        assert_eq!(render("{{ a }}/{{ a }}", &ctx).unwrap(), "x/x");
    }

    #[test]
    fn test_render_undefined_lists_all() {
        let ctx = TemplateContext::new().with("a", "x");
        let err = render("{{ a }}/{{ b }}/{{ c }}", &ctx).unwrap_err();
        let message = err.to_string();
        assert!(message.contains('b'));
        assert!(message.contains('c'));
    }

    #[test]
    fn test_render_no_templates() {
        let ctx = TemplateContext::new();
        assert_eq!(render("/plain/path", &ctx).unwrap(), "/plain/path");
    }

    #[test]
    fn test_has_templates() {
        assert!(has_templates("/orgs/{{ resource_id }}"));
        assert!(!has_templates("/orgs/acme"));
        assert!(!has_templates("{{ }}"));
    }

    #[test]
    fn test_extract_variables() {
        let vars = extract_variables("/{{ enterprise }}/x/{{ resource_id }}");
        assert_eq!(vars, vec!["enterprise", "resource_id"]);
    }

    #[test]
    fn test_context_set_overwrites() {
        let mut ctx = TemplateContext::new().with("a", "1");
        ctx.set("a", "2");
        assert_eq!(ctx.get("a"), Some("2"));
        assert_eq!(ctx.get("b"), None);
    }
}
