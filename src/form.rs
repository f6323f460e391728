//! Extraction of submittable form data from server-rendered HTML pages.

use indexmap::IndexMap;
use scraper::{ElementRef, Html, Selector};

/// Target and fields of an HTML form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    /// The form's `action` attribute, empty if the page has no POST form
    pub action: String,
    /// Input values keyed by input name, in document order
    pub fields: IndexMap<String, String>,
}

impl FormData {
    /// Overlay a field, replacing any value the page supplied
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Extract the first POST form of an HTML document.
///
/// Only the first `<form method="post">` is considered. The `<input>`
/// start tags that follow it, up to the next `<form>` start tag, become
/// fields, except `type="submit"` buttons and inputs without a `name`.
/// When an input name repeats, the last value wins.
///
/// Inputs are matched by start-tag position rather than by tree descent:
/// the HTML5 tree builder moves a form opened inside a `<table>` out of
/// the way, leaving its inputs outside of it.
///
/// Malformed markup is tolerated; a page without a POST form yields an
/// empty [`FormData`], which callers must treat as a parse failure.
pub fn extract(html: &str) -> FormData {
    let document = Html::parse_document(html);

    let Ok(selector) = Selector::parse("form, input") else {
        return FormData::default();
    };

    // Html::select yields elements in creation order, i.e. start-tag order.
    let mut data: Option<FormData> = None;
    for element in document.select(&selector) {
        let is_form = element.value().name() == "form";
        match data.as_mut() {
            None if is_form && attr_eq(&element, "method", "post") => {
                data = Some(FormData {
                    action: element.value().attr("action").unwrap_or_default().to_string(),
                    fields: IndexMap::new(),
                });
            }
            None => {}
            Some(_) if is_form => break,
            Some(form) => {
                if attr_eq(&element, "type", "submit") {
                    continue;
                }
                let Some(name) = element.value().attr("name") else {
                    continue;
                };
                form.set(name, element.value().attr("value").unwrap_or_default());
            }
        }
    }

    data.unwrap_or_default()
}

fn attr_eq(element: &ElementRef<'_>, name: &str, expected: &str) -> bool {
    element
        .value()
        .attr(name)
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"
        <!DOCTYPE html>
        <html><body>
        <div class="form_item">
          <form method="post" action="https://login.vk.com/?act=login&amp;soft=1">
            <input type="hidden" name="ip_h" value="2f6a3b" />
            <input type="hidden" name="lg_h" value="9c81de" />
            <input type="hidden" name="_origin" value="https://oauth.vk.com">
            <input type="text" name="email">
            <input type="password" name="pass">
            <input type="submit" value="Log in" name="submit_input">
          </form>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_extract_login_form() {
        let form = extract(LOGIN_PAGE);

        assert_eq!(form.action, "https://login.vk.com/?act=login&soft=1");
        assert_eq!(form.get("ip_h"), Some("2f6a3b"));
        assert_eq!(form.get("lg_h"), Some("9c81de"));
        assert_eq!(form.get("_origin"), Some("https://oauth.vk.com"));
        assert_eq!(form.get("email"), Some(""));
        assert_eq!(form.get("pass"), Some(""));
        assert_eq!(form.get("submit_input"), None);
        assert_eq!(form.fields.len(), 5);
    }

    #[test]
    fn test_submit_input_excluded() {
        let form = extract(
            r#"<form method="post" action="X">
                 <input name="a" value="1">
                 <input name="b" value="2">
                 <input type="SUBMIT" name="go" value="Go">
               </form>"#,
        );

        assert_eq!(form.action, "X");
        let fields: Vec<(&str, &str)> = form
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(fields, vec![("a", "1"), ("b", "2")]);
    }

    #[test]
    fn test_first_post_form_wins() {
        let form = extract(
            r#"<form method="get" action="/search"><input name="q" value="x"></form>
               <form method="POST" action="/first"><input name="a" value="1"></form>
               <form method="post" action="/second"><input name="b" value="2"></form>"#,
        );

        assert_eq!(form.action, "/first");
        assert_eq!(form.get("a"), Some("1"));
        assert_eq!(form.get("b"), None);
        assert_eq!(form.get("q"), None);
    }

    #[test]
    fn test_form_opened_inside_table() {
        let form = extract(
            r#"<table><form method="post" action="/login">
                 <tr><td><input type="hidden" name="ip_h" value="abc"></td></tr>
                 <tr><td><input type="text" name="email"></td></tr>
                 <tr><td><input type="submit" value="Log in"></td></tr>
               </form></table>
               <form method="post" action="/other"><input name="b" value="2"></form>"#,
        );

        assert_eq!(form.action, "/login");
        assert_eq!(form.get("ip_h"), Some("abc"));
        assert_eq!(form.get("email"), Some(""));
        assert_eq!(form.get("b"), None);
        assert_eq!(form.fields.len(), 2);
    }

    #[test]
    fn test_inputs_before_form_ignored() {
        let form = extract(
            r#"<input name="search" value="x">
               <form method="post" action="/grant"><input name="a" value="1"></form>"#,
        );
        assert_eq!(form.get("search"), None);
        assert_eq!(form.get("a"), Some("1"));
    }

    #[test]
    fn test_repeated_name_last_wins() {
        let form = extract(
            r#"<form method="post" action="/grant">
                 <input type="hidden" name="token" value="old">
                 <input type="hidden" name="token" value="new">
               </form>"#,
        );
        assert_eq!(form.get("token"), Some("new"));
        assert_eq!(form.fields.len(), 1);
    }

    #[test]
    fn test_unnamed_input_skipped() {
        let form = extract(
            r#"<form method="post" action="/grant">
                 <input type="hidden" value="orphan">
                 <input type="checkbox" name="remember">
               </form>"#,
        );
        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.get("remember"), Some(""));
    }

    #[test]
    fn test_missing_action_is_empty() {
        let form = extract(r#"<form method="post"><input name="a" value="1"></form>"#);
        assert_eq!(form.action, "");
        assert_eq!(form.get("a"), Some("1"));
    }

    #[test]
    fn test_no_post_form() {
        assert_eq!(extract("<p>Nothing to see</p>"), FormData::default());
        assert_eq!(
            extract(r#"<form action="/x"><input name="a" value="1"></form>"#),
            FormData::default()
        );
    }

    #[test]
    fn test_malformed_html_tolerated() {
        let form = extract(
            r#"<div><form method=post action=/grant_access><input name="a" value="1"
               <input name="b" value="2"><p><span>"#,
        );
        assert_eq!(form.action, "/grant_access");
        assert_eq!(form.get("a"), Some("1"));
    }

    #[test]
    fn test_overlay_fields() {
        let mut form = extract(LOGIN_PAGE);
        form.set("email", "user@example.com");
        form.set("pass", "secret");
        assert_eq!(form.get("email"), Some("user@example.com"));
        assert_eq!(form.get("pass"), Some("secret"));
    }
}
