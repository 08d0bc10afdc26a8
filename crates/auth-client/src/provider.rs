//! External-provider sign-in: redirect URL construction and the navigation
//! capability of the host environment.

use crate::ClientResult;
use auth_machine::AuthOptions;
use tracing::debug;
use url::Url;

/// Host capabilities used by provider sign-in.
pub trait Environment: Send + Sync {
    /// Returns true when the host can follow a redirect (a browser or webview).
    fn is_browser(&self) -> bool;

    /// Send the user to `url`.
    fn navigate(&self, url: &str);
}

/// Environment with no way to navigate; provider URLs are only returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct Headless;

impl Environment for Headless {
    fn is_browser(&self) -> bool {
        false
    }

    fn navigate(&self, url: &str) {
        debug!(url = %url, "Headless environment, not navigating");
    }
}

/// Resolve a relative `redirect_to` against the client URL.
pub fn rewrite_redirect_to(client_url: Option<&str>, options: &AuthOptions) -> AuthOptions {
    let mut options = options.clone();
    if let (Some(client_url), Some(redirect)) = (client_url, options.redirect_to.as_ref()) {
        if redirect.starts_with('/') && !client_url.is_empty() {
            options.redirect_to = Some(format!("{}{}", client_url.trim_end_matches('/'), redirect));
        }
    }
    options
}

/// Build `{backend_url}/signin/provider/{provider}` with the options as query
/// parameters. Structured values are JSON-encoded.
pub fn provider_url(
    backend_url: &str,
    client_url: Option<&str>,
    provider: &str,
    options: &AuthOptions,
) -> ClientResult<String> {
    let mut url = Url::parse(&format!(
        "{}/signin/provider/{}",
        backend_url.trim_end_matches('/'),
        provider
    ))?;

    let options = rewrite_redirect_to(client_url, options);
    let mut pairs: Vec<(&str, String)> = Vec::new();
    if let Some(redirect_to) = &options.redirect_to {
        pairs.push(("redirectTo", redirect_to.clone()));
    }
    if let Some(locale) = &options.locale {
        pairs.push(("locale", locale.clone()));
    }
    if let Some(default_role) = &options.default_role {
        pairs.push(("defaultRole", default_role.clone()));
    }
    if let Some(allowed_roles) = &options.allowed_roles {
        pairs.push(("allowedRoles", serde_json::to_string(allowed_roles)?));
    }
    if let Some(display_name) = &options.display_name {
        pairs.push(("displayName", display_name.clone()));
    }
    if let Some(metadata) = &options.metadata {
        pairs.push(("metadata", serde_json::to_string(metadata)?));
    }

    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_provider_url() {
        let url = provider_url(
            "https://auth.example.com/v1/",
            None,
            "github",
            &AuthOptions::default(),
        )
        .unwrap();
        assert_eq!(url, "https://auth.example.com/v1/signin/provider/github");
    }

    #[test]
    fn test_relative_redirect_uses_client_url() {
        let url = provider_url(
            "https://auth.example.com/v1",
            Some("https://app.example.com/"),
            "google",
            &AuthOptions::redirect_to("/welcome"),
        )
        .unwrap();
        assert_eq!(
            url,
            "https://auth.example.com/v1/signin/provider/google?redirectTo=https%3A%2F%2Fapp.example.com%2Fwelcome"
        );
    }

    #[test]
    fn test_absolute_redirect_is_kept() {
        let options = rewrite_redirect_to(
            Some("https://app.example.com"),
            &AuthOptions::redirect_to("https://other.example.com/cb"),
        );
        assert_eq!(
            options.redirect_to.as_deref(),
            Some("https://other.example.com/cb")
        );
    }

    #[test]
    fn test_structured_options_are_json() {
        let options = AuthOptions {
            allowed_roles: Some(vec!["user".to_string(), "me".to_string()]),
            metadata: Some(serde_json::json!({ "plan": "pro" })),
            locale: Some("fr".to_string()),
            ..AuthOptions::default()
        };
        let url = provider_url("https://auth.example.com", None, "github", &options).unwrap();
        let parsed = Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("locale".to_string(), "fr".to_string())));
        assert!(pairs.contains(&("allowedRoles".to_string(), r#"["user","me"]"#.to_string())));
        assert!(pairs.contains(&("metadata".to_string(), r#"{"plan":"pro"}"#.to_string())));
    }

    #[test]
    fn test_headless_is_not_a_browser() {
        assert!(!Headless.is_browser());
    }
}
