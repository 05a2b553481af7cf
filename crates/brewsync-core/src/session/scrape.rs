//! Token extraction from the remote service's HTML pages.

use regex::Regex;
use serde_json::Value;

use super::{SessionError, SessionResult};

const METADATA_MARKER: &str = "window.Grainfather";

fn compile(pattern: &str) -> SessionResult<Regex> {
    Regex::new(pattern).map_err(|error| SessionError::Protocol(error.to_string()))
}

/// The anti-forgery `form_key` hidden input of the login form.
pub fn form_key(html: &str) -> SessionResult<String> {
    let input = compile(r"(?is)<input\b[^>]*>")?;
    let name = compile(r#"(?i)\bname\s*=\s*["']form_key["']"#)?;
    let value = compile(r#"(?i)\bvalue\s*=\s*["']([A-Za-z0-9_]+)["']"#)?;

    let key = input
        .find_iter(html)
        .map(|tag| tag.as_str())
        .filter(|tag| name.is_match(tag))
        .find_map(|tag| value.captures(tag).map(|captures| captures[1].to_string()));
    key.ok_or_else(|| SessionError::Protocol("Login form did not contain a form_key".to_string()))
}

/// The JSON object assigned to `window.Grainfather` on authenticated pages.
pub fn page_metadata(html: &str) -> SessionResult<Value> {
    let missing = || SessionError::Protocol("Page did not contain session metadata".to_string());

    let start = html.find(METADATA_MARKER).ok_or_else(missing)?;
    let rest = &html[start + METADATA_MARKER.len()..];
    let rest = rest.trim_start().strip_prefix('=').ok_or_else(missing)?;

    serde_json::Deserializer::from_str(rest.trim_start())
        .into_iter::<Value>()
        .next()
        .and_then(Result::ok)
        .filter(Value::is_object)
        .ok_or_else(missing)
}

/// Tokens carried by the session metadata.
#[derive(Clone, PartialEq, Eq)]
pub struct PageTokens {
    pub csrf_token: String,
    pub api_token: Option<String>,
}

impl PageTokens {
    pub fn from_metadata(metadata: &Value) -> SessionResult<Self> {
        let csrf_token = metadata
            .get("csrfToken")
            .and_then(Value::as_str)
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                SessionError::Protocol("Session metadata did not include a csrfToken".to_string())
            })?
            .to_string();
        let api_token = metadata
            .pointer("/user/api_token")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        Ok(Self {
            csrf_token,
            api_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn finds_form_key_in_either_attribute_order() {
        let html = r#"<form><input name="form_key" type="hidden" value="AbC123xyz" /></form>"#;
        assert_eq!(form_key(html).unwrap(), "AbC123xyz");

        let html = "<input type='hidden'\n value='k3y' name='form_key'>";
        assert_eq!(form_key(html).unwrap(), "k3y");
    }

    #[test]
    fn form_key_skips_unrelated_inputs() {
        let html = r#"<form>
            <input name="login[username]" value="brewer">
            <input name="form_key" value="second">
            <input name="form_key" value="third">
        </form>"#;
        assert_eq!(form_key(html).unwrap(), "second");
    }

    #[test]
    fn missing_form_key_is_protocol_error() {
        let html = r#"<input name="email" value="abc">"#;
        assert!(matches!(form_key(html), Err(SessionError::Protocol(_))));
    }

    #[test]
    fn extracts_metadata_object() {
        let html = r#"<script>
            window.Grainfather = {"csrfToken":"tok","user":{"id":5,"api_token":"api"}};
        </script>"#;
        let metadata = page_metadata(html).unwrap();
        assert_eq!(metadata["user"]["id"], json!(5));

        let tokens = PageTokens::from_metadata(&metadata).unwrap();
        assert_eq!(tokens.csrf_token, "tok");
        assert_eq!(tokens.api_token.as_deref(), Some("api"));
    }

    #[test]
    fn metadata_without_csrf_is_rejected() {
        let metadata = json!({"user": {}});
        assert!(matches!(
            PageTokens::from_metadata(&metadata),
            Err(SessionError::Protocol(_))
        ));
        assert!(page_metadata("<html>login</html>").is_err());
    }
}
