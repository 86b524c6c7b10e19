//! `{{variable}}` substitution for reply and email templates.
//!
//! Templates authored by creators (and those produced by the workflow
//! generator) reference subscriber-scoped variables such as `{{firstName}}`
//! and `{{storeUrl}}`. Unknown placeholders are left in place so a typo in a
//! template is visible in the delivered text rather than silently dropped.

use std::collections::BTreeMap;

/// Variable name for the recipient's first name.
pub const FIRST_NAME: &str = "firstName";

/// Variable name for the creator's storefront URL.
pub const STORE_URL: &str = "storeUrl";

/// A set of named template variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    values: BTreeMap<String, String>,
}

impl TemplateVars {
    /// Creates an empty variable set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable, replacing any previous value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a variable, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Returns the value for a variable, if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Convenience constructor for the two subscriber-scoped variables.
    ///
    /// Without a store URL, `{{storeUrl}}` is left unset and renders as-is.
    #[must_use]
    pub fn subscriber(first_name: impl Into<String>, store_url: Option<String>) -> Self {
        let vars = Self::new().with(FIRST_NAME, first_name);
        match store_url {
            Some(url) => vars.with(STORE_URL, url),
            None => vars,
        }
    }
}

/// Renders a template by substituting every `{{name}}` with its value.
///
/// A single left-to-right pass: substituted values are copied verbatim and
/// never rescanned for placeholders.
#[must_use]
pub fn render(template: &str, vars: &TemplateVars) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        let (before, tail) = rest.split_at(open);
        result.push_str(before);
        let Some(close) = tail[2..].find("}}") else {
            rest = tail;
            break;
        };
        let name = &tail[2..2 + close];
        let placeholder = &tail[..close + 4];
        match vars.get(name) {
            Some(value) => result.push_str(value),
            None => result.push_str(placeholder),
        }
        rest = &tail[close + 4..];
    }
    result.push_str(rest);
    result
}

/// Derives a display first name from an email address.
///
/// Used when a subscriber record has no first name on file.
#[must_use]
pub fn first_name_from_email(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_variables() {
        let vars = TemplateVars::subscriber("Maya", Some("https://shop.example/maya".to_string()));
        let out = render("Hey {{firstName}}, grab it at {{storeUrl}}", &vars);
        assert_eq!(out, "Hey Maya, grab it at https://shop.example/maya");
    }

    #[test]
    fn substitutes_repeated_placeholders() {
        let vars = TemplateVars::new().with(FIRST_NAME, "Jo");
        assert_eq!(render("{{firstName}}! {{firstName}}!", &vars), "Jo! Jo!");
    }

    #[test]
    fn leaves_unknown_placeholders() {
        let vars = TemplateVars::new().with(FIRST_NAME, "Jo");
        assert_eq!(render("{{coupon}} for {{firstName}}", &vars), "{{coupon}} for Jo");
    }

    #[test]
    fn missing_store_url_leaves_placeholder_visible() {
        let vars = TemplateVars::subscriber("Maya", None);
        assert_eq!(render("Shop: {{storeUrl}}", &vars), "Shop: {{storeUrl}}");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let vars = TemplateVars::subscriber(
            "{{storeUrl}}",
            Some("https://shop.example/maya".to_string()),
        );
        assert_eq!(
            render("Hi {{firstName}} at {{storeUrl}}", &vars),
            "Hi {{storeUrl}} at https://shop.example/maya"
        );
    }

    #[test]
    fn unterminated_placeholder_is_kept() {
        let vars = TemplateVars::new().with(FIRST_NAME, "Jo");
        assert_eq!(render("{{firstName}} {{oops", &vars), "Jo {{oops");
    }

    #[test]
    fn first_name_falls_back_to_local_part() {
        assert_eq!(first_name_from_email("beats@example.com"), "beats");
        assert_eq!(first_name_from_email("no-at-sign"), "no-at-sign");
    }
}
