//! Credential extraction.
//!
//! Sources are consulted in a fixed order and each one only overrides the
//! current value when it yields something non-empty, so the last enabled,
//! non-empty source wins: header, then parameter, then cookie.

use axum::http::{header, HeaderMap, Method};

use crate::apidef::AuthSettings;

/// First value of `name` in urlencoded `pairs`.
fn form_lookup(pairs: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(pairs)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Parameter value with request-body values taking precedence over the
/// query string.
pub fn param_value(form_body: Option<&[u8]>, query: Option<&str>, name: &str) -> String {
    form_body
        .and_then(|body| form_lookup(body, name))
        .or_else(|| query.and_then(|q| form_lookup(q.as_bytes(), name)))
        .unwrap_or_default()
}

/// Value of the first cookie called `name`.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .unwrap_or_default()
}

/// Drop a leading case-insensitive `Bearer` word and surrounding whitespace.
pub fn strip_bearer(token: &str) -> String {
    let trimmed = token.trim();
    if let Some(prefix) = trimmed.get(..6) {
        let rest = &trimmed[6..];
        let separated = rest.is_empty() || rest.starts_with(char::is_whitespace);
        if prefix.eq_ignore_ascii_case("bearer") && separated {
            return rest.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Resolve the credential carried by a request. An empty result means no
/// credential was presented.
pub fn extract_credential(
    settings: &AuthSettings,
    headers: &HeaderMap,
    query: Option<&str>,
    form_body: Option<&[u8]>,
) -> String {
    let mut key = headers
        .get(settings.header_name())
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if let Some(name) = settings.param_lookup() {
        let value = param_value(form_body, query, name);
        if !value.is_empty() {
            key = value;
        }
    }

    if let Some(name) = settings.cookie_lookup() {
        let value = cookie_value(headers, name);
        if !value.is_empty() {
            key = value;
        }
    }

    strip_bearer(&key)
}

/// True when the body may carry form parameters worth buffering.
pub fn carries_form(settings: &AuthSettings, method: &Method, headers: &HeaderMap) -> bool {
    settings.param_lookup().is_some()
        && matches!(*method, Method::POST | Method::PUT | Method::PATCH)
        && headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                name.parse::<header::HeaderName>().unwrap(),
                value.parse().unwrap(),
            );
        }
        map
    }

    fn param_and_cookie(use_param: bool, use_cookie: bool) -> AuthSettings {
        AuthSettings {
            use_param,
            param_name: if use_param { "key".into() } else { String::new() },
            use_cookie,
            cookie_name: if use_cookie { "key".into() } else { String::new() },
            ..AuthSettings::default()
        }
    }

    #[test]
    fn test_bearer_header() {
        let settings = AuthSettings::default();
        let h = headers(&[("authorization", "Bearer abc123")]);
        assert_eq!(extract_credential(&settings, &h, None, None), "abc123");
    }

    #[test]
    fn test_param_overrides_header() {
        let settings = param_and_cookie(true, false);
        let h = headers(&[("authorization", "headerval")]);
        assert_eq!(
            extract_credential(&settings, &h, Some("key=paramval"), None),
            "paramval"
        );
    }

    #[test]
    fn test_cookie_overrides_when_param_empty() {
        let settings = param_and_cookie(true, true);
        let h = headers(&[("authorization", "headerval"), ("cookie", "other=1; key=cookieval")]);
        assert_eq!(
            extract_credential(&settings, &h, Some("key="), None),
            "cookieval"
        );
    }

    #[test]
    fn test_empty_sources_keep_header() {
        let settings = param_and_cookie(true, true);
        let h = headers(&[("authorization", "headerval")]);
        assert_eq!(extract_credential(&settings, &h, None, None), "headerval");
    }

    #[test]
    fn test_disabled_param_is_ignored() {
        let settings = AuthSettings::default();
        let h = headers(&[("authorization", "headerval")]);
        assert_eq!(
            extract_credential(&settings, &h, Some("authorization=paramval"), None),
            "headerval"
        );
    }

    #[test]
    fn test_body_param_precedes_query() {
        assert_eq!(param_value(Some(b"key=body"), Some("key=query"), "key"), "body");
        assert_eq!(param_value(Some(b"other=1"), Some("key=query"), "key"), "query");
        assert_eq!(param_value(None, None, "key"), "");
    }

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc"), "abc");
        assert_eq!(strip_bearer("  bearer   abc  "), "abc");
        assert_eq!(strip_bearer("BEARER\tabc"), "abc");
        assert_eq!(strip_bearer("Bearer"), "");
        assert_eq!(strip_bearer("Bearerabc"), "Bearerabc");
        assert_eq!(strip_bearer("abc"), "abc");
        assert_eq!(strip_bearer("ключ"), "ключ");
    }

    #[test]
    fn test_carries_form() {
        let settings = param_and_cookie(true, false);
        let h = headers(&[("content-type", "application/x-www-form-urlencoded")]);
        assert!(carries_form(&settings, &Method::POST, &h));
        assert!(!carries_form(&settings, &Method::GET, &h));
        assert!(!carries_form(&AuthSettings::default(), &Method::POST, &h));
    }
}
