// Message template rendering
// Rendering is pure: it always produces a fresh string and never writes back
// into the stored campaign message, so one contact's render can never leak
// into another enrollment.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

static NAME_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*name\s*\}\}").expect("valid regex"));
static LINK_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*link\s*\}\}").expect("valid regex"));

/// Render a message body against contact data.
///
/// `{{name}}` becomes the contact's full name and `{{link}}` the resolved
/// (possibly shortened) link. Placeholders tolerate inner whitespace;
/// anything else in double braces is left untouched.
pub fn render(template: &str, full_name: &str, link: Option<&str>) -> String {
    // NoExpand: contact data is literal text, `$` must not be treated as a
    // capture-group reference
    let rendered = NAME_PLACEHOLDER.replace_all(template, NoExpand(full_name));
    match link {
        Some(url) => LINK_PLACEHOLDER
            .replace_all(&rendered, NoExpand(url))
            .into_owned(),
        None => rendered.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_name_and_link() {
        let template = "Hi {{name}}, check {{link}}";
        let out = render(template, "Ana", Some("http://x/y"));
        assert_eq!(out, "Hi Ana, check http://x/y");
        // The input template is untouched
        assert_eq!(template, "Hi {{name}}, check {{link}}");
    }

    #[test]
    fn test_whitespace_tolerant_placeholders() {
        assert_eq!(
            render("Hello {{ name }}!", "Bo", None),
            "Hello Bo!".to_string()
        );
    }

    #[test]
    fn test_repeated_placeholders() {
        assert_eq!(
            render("{{name}} {{name}}", "Ana", None),
            "Ana Ana".to_string()
        );
    }

    #[test]
    fn test_unknown_placeholders_left_intact() {
        assert_eq!(
            render("Hi {{name}}, ref {{order}}", "Ana", None),
            "Hi Ana, ref {{order}}".to_string()
        );
    }

    #[test]
    fn test_dollar_signs_in_values_kept_literal() {
        assert_eq!(
            render("Hi {{name}}!", "Sam $1M Smith", None),
            "Hi Sam $1M Smith!".to_string()
        );
        assert_eq!(
            render("See {{link}}", "Ana", Some("http://x/y?q=$0")),
            "See http://x/y?q=$0".to_string()
        );
    }

    #[test]
    fn test_missing_link_leaves_placeholder() {
        assert_eq!(
            render("See {{link}}", "Ana", None),
            "See {{link}}".to_string()
        );
    }
}
