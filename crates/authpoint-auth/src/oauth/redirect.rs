//! Redirect URI resolution.
//!
//! Matches a requested `redirect_uri` against the client's registered
//! allow-list. Matching is component-wise: scheme, host, port, userinfo and
//! path must agree, and every query parameter of the registered URI must be
//! present in the requested one with the same values. Fragments are ignored
//! and stripped.
//!
//! `url::Url` normalizes dot segments (including `%2E%2E`), backslashes,
//! host case and default ports away, so traversal, hosts and explicit ports
//! are checked against the raw string instead. Requested URIs containing a
//! backslash or an ASCII tab or newline are never matched.

use std::collections::{BTreeMap, BTreeSet};

use url::Url;

use crate::AuthResult;
use crate::config::RedirectConfig;
use crate::error::AuthError;
use crate::types::RegisteredClient;

/// Message for every comparison failure. Deliberately says nothing about
/// which component differed.
pub const REDIRECT_MISMATCH_MESSAGE: &str =
    "Invalid redirect uri does not match one of the registered values.";

/// Resolves redirect URIs for a client.
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    redirect_grant_types: BTreeSet<String>,
    match_subdomains: bool,
    match_ports: bool,
}

impl Default for RedirectResolver {
    fn default() -> Self {
        Self::new(&RedirectConfig::default())
    }
}

impl RedirectResolver {
    #[must_use]
    pub fn new(config: &RedirectConfig) -> Self {
        Self {
            redirect_grant_types: config.redirect_grant_types.iter().cloned().collect(),
            match_subdomains: config.match_subdomains,
            match_ports: config.match_ports,
        }
    }

    /// Resolves the redirect URI for `client`.
    ///
    /// With no requested URI the single registered URI is returned. With a
    /// requested URI the first matching registration wins and the requested
    /// URI (without fragment) is returned.
    ///
    /// # Errors
    ///
    /// - `InvalidGrant` if the client holds no redirect-based grant type
    /// - `InvalidRequest` if the client has no registered redirect URIs
    /// - `RedirectMismatch` if nothing matches or the default is ambiguous
    pub fn resolve_redirect(
        &self,
        requested: Option<&str>,
        client: &RegisteredClient,
    ) -> AuthResult<String> {
        let redirect_capable = client
            .authorized_grant_types
            .iter()
            .any(|g| self.redirect_grant_types.contains(g));
        if !redirect_capable {
            return Err(AuthError::invalid_grant(
                "A redirect_uri can only be used by implicit or authorization_code grant types.",
            ));
        }

        let registered = &client.registered_redirect_uris;
        if registered.is_empty() {
            return Err(AuthError::invalid_request(
                "At least one redirect_uri must be registered with the client.",
            ));
        }

        let Some(requested) = requested else {
            let mut iter = registered.iter();
            return match (iter.next(), iter.next()) {
                (Some(only), None) => Ok(only.clone()),
                _ => Err(AuthError::redirect_mismatch(
                    "A redirect_uri must be supplied when more than one is registered.",
                )),
            };
        };

        let requested = strip_fragment(requested);
        if has_forbidden_char(requested) || has_dot_segment(requested) {
            tracing::debug!(
                client_id = %client.client_id,
                "Requested redirect_uri is not in normal form"
            );
            return Err(AuthError::redirect_mismatch(REDIRECT_MISMATCH_MESSAGE));
        }

        let Some(requested_parts) = UriParts::parse(requested) else {
            return Err(AuthError::redirect_mismatch(REDIRECT_MISMATCH_MESSAGE));
        };

        let matched = registered
            .iter()
            .filter_map(|r| UriParts::parse(strip_fragment(r)))
            .any(|r| self.matches(&requested_parts, &r));

        if matched {
            Ok(requested.to_string())
        } else {
            tracing::debug!(
                client_id = %client.client_id,
                "Requested redirect_uri matches no registration"
            );
            Err(AuthError::redirect_mismatch(REDIRECT_MISMATCH_MESSAGE))
        }
    }

    fn matches(&self, requested: &UriParts, registered: &UriParts) -> bool {
        requested.scheme == registered.scheme
            && self.host_matches(requested.host.as_deref(), registered.host.as_deref())
            && (!self.match_ports || requested.port == registered.port)
            && requested.userinfo == registered.userinfo
            && requested.path == registered.path
            && registered
                .query
                .iter()
                .all(|(name, values)| requested.query.get(name) == Some(values))
    }

    fn host_matches(&self, requested: Option<&str>, registered: Option<&str>) -> bool {
        match (requested, registered) {
            (Some(req), Some(reg)) => {
                req == reg
                    || (self.match_subdomains
                        && req.len() > reg.len() + 1
                        && req.ends_with(reg)
                        && req.as_bytes()[req.len() - reg.len() - 1] == b'.')
            }
            (None, None) => true,
            _ => false,
        }
    }
}

// =============================================================================
// URI components
// =============================================================================

/// Comparable components of a redirect URI.
#[derive(Debug, PartialEq, Eq)]
struct UriParts {
    scheme: String,
    userinfo: Option<(String, Option<String>)>,
    host: Option<String>,
    port: Option<String>,
    path: String,
    query: BTreeMap<String, BTreeSet<String>>,
}

impl UriParts {
    fn parse(raw: &str) -> Option<Self> {
        let url = Url::parse(raw).ok()?;

        let userinfo = if url.username().is_empty() && url.password().is_none() {
            None
        } else {
            Some((
                url.username().to_string(),
                url.password().map(str::to_string),
            ))
        };

        let mut query: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (name, value) in url.query_pairs() {
            query
                .entry(name.into_owned())
                .or_default()
                .insert(value.into_owned());
        }

        Some(Self {
            scheme: url.scheme().to_string(),
            userinfo,
            host: url.host_str().and(raw_host(raw)).map(str::to_string),
            port: explicit_port(raw),
            path: url.path().to_string(),
            query,
        })
    }
}

fn strip_fragment(uri: &str) -> &str {
    uri.split_once('#').map_or(uri, |(before, _)| before)
}

/// Returns the raw path of a URI without scheme, authority or query.
fn raw_path(uri: &str) -> &str {
    let without_query = uri.split_once('?').map_or(uri, |(before, _)| before);
    match without_query.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => without_query
            .split_once(':')
            .map_or(without_query, |(_, rest)| rest),
    }
}

/// Characters `url::Url` silently drops or rewrites.
fn has_forbidden_char(uri: &str) -> bool {
    uri.contains(['\\', '\t', '\r', '\n'])
}

/// Returns `true` if the raw path contains a `.` or `..` segment, literal
/// or percent-encoded. `\` counts as a separator, as it does for `url`.
fn has_dot_segment(uri: &str) -> bool {
    raw_path(uri).split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

/// Returns the host and port of the authority as written.
fn raw_host_port(uri: &str) -> Option<&str> {
    let (_, rest) = uri.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    Some(authority.rsplit_once('@').map_or(authority, |(_, hp)| hp))
}

/// Returns the host exactly as written, without case folding.
fn raw_host(uri: &str) -> Option<&str> {
    let host_port = raw_host_port(uri)?;
    let host = if host_port.starts_with('[') {
        host_port
            .find(']')
            .map_or(host_port, |i| &host_port[..=i])
    } else {
        host_port.split_once(':').map_or(host_port, |(h, _)| h)
    };
    (!host.is_empty()).then_some(host)
}

/// Returns the port exactly as written in the authority, if any.
fn explicit_port(uri: &str) -> Option<String> {
    let host_port = raw_host_port(uri)?;

    let port = if host_port.starts_with('[') {
        host_port.split_once("]:").map(|(_, p)| p)
    } else {
        host_port.rsplit_once(':').map(|(_, p)| p)
    }?;

    (!port.is_empty()).then(|| port.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(uris: &[&str]) -> RegisteredClient {
        let mut client = RegisteredClient::new("foo")
            .with_grant_type("authorization_code")
            .with_grant_type("implicit");
        for uri in uris {
            client = client.with_redirect_uri(*uri);
        }
        client
    }

    fn resolver() -> RedirectResolver {
        RedirectResolver::default()
    }

    fn assert_mismatch(result: AuthResult<String>) {
        let err = result.unwrap_err();
        assert!(
            matches!(err, AuthError::RedirectMismatch { .. }),
            "expected redirect mismatch, got {err:?}"
        );
    }

    fn assert_resolves(resolver: &RedirectResolver, registered: &[&str], requested: &str) {
        assert_eq!(
            resolver
                .resolve_redirect(Some(requested), &client(registered))
                .unwrap(),
            requested
        );
    }

    // -------------------------------------------------------------------------
    // Registration preconditions
    // -------------------------------------------------------------------------

    #[test]
    fn test_redirect_matches_registered_value() {
        assert_resolves(&resolver(), &["https://anywhere.com"], "https://anywhere.com");
    }

    #[test]
    fn test_redirect_with_no_registered_value() {
        let err = resolver()
            .resolve_redirect(Some("https://anywhere.com/myendpoint"), &client(&[]))
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
    }

    #[test]
    fn test_redirect_with_no_requested_value() {
        let resolved = resolver()
            .resolve_redirect(None, &client(&["https://anywhere.com"]))
            .unwrap();
        assert_eq!(resolved, "https://anywhere.com");
    }

    #[test]
    fn test_redirect_with_no_requested_value_and_multiple_registered() {
        assert_mismatch(
            resolver().resolve_redirect(None, &client(&["https://anywhere.com", "https://nowhere.com"])),
        );
    }

    #[test]
    fn test_no_grant_type() {
        let mut c = client(&["https://anywhere.com", "https://nowhere.com"]);
        c.authorized_grant_types.clear();
        let err = resolver().resolve_redirect(None, &c).unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
    }

    #[test]
    fn test_wrong_grant_type() {
        let mut c = client(&["https://anywhere.com", "https://nowhere.com"]);
        c.authorized_grant_types = ["client_credentials".to_string()].into_iter().collect();
        let err = resolver().resolve_redirect(None, &c).unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
    }

    #[test]
    fn test_wrong_custom_grant_type() {
        let resolver = RedirectResolver::new(&RedirectConfig {
            redirect_grant_types: vec!["foo".to_string()],
            ..RedirectConfig::default()
        });
        let err = resolver
            .resolve_redirect(None, &client(&["https://anywhere.com", "https://nowhere.com"]))
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
    }

    // -------------------------------------------------------------------------
    // Host and path
    // -------------------------------------------------------------------------

    #[test]
    fn test_redirect_not_matching() {
        assert_mismatch(
            resolver().resolve_redirect(
                Some("https://anywhere.com/myendpoint"),
                &client(&["https://nowhere.com"]),
            ),
        );
    }

    #[test]
    fn test_redirect_not_matching_returns_generic_error_message() {
        let err = resolver()
            .resolve_redirect(
                Some("https://anywhere.com/myendpoint"),
                &client(&["https://nowhere.com"]),
            )
            .unwrap_err();
        assert_eq!(err.description(), REDIRECT_MISMATCH_MESSAGE);
    }

    #[test]
    fn test_redirect_not_matching_with_traversal() {
        assert_mismatch(resolver().resolve_redirect(
            Some("https://anywhere.com/foo/../bar"),
            &client(&["https://anywhere.com/foo"]),
        ));
    }

    #[test]
    fn test_redirect_not_matching_with_hex_encoded_traversal() {
        for requested in [
            "https://anywhere.com/foo/%2E%2E",
            "https://anywhere.com/foo/%2e%2e",
            "https://anywhere.com/foo/.%2E/foo",
            "https://anywhere.com/foo/%2E",
        ] {
            assert_mismatch(
                resolver().resolve_redirect(Some(requested), &client(&["https://anywhere.com/foo"])),
            );
        }
    }

    #[test]
    fn test_redirect_not_matching_with_backslash_traversal() {
        for requested in [
            "https://anywhere.com/foo/%2E%2E\\bar",
            "https://anywhere.com/foo\\..\\bar",
            "https://anywhere.com/foo/..\\bar",
        ] {
            assert_mismatch(
                resolver().resolve_redirect(Some(requested), &client(&["https://anywhere.com/bar"])),
            );
        }
    }

    #[test]
    fn test_redirect_not_matching_with_control_characters() {
        for requested in [
            "https://anywhere.com/b\tar",
            "https://anywhere.com/b\nar",
            "https://anywhere.com/b\r\nar",
            "https://any\twhere.com/bar",
        ] {
            assert_mismatch(
                resolver().resolve_redirect(Some(requested), &client(&["https://anywhere.com/bar"])),
            );
        }
    }

    #[test]
    fn test_redirect_not_matching_backslash_separator() {
        assert_mismatch(resolver().resolve_redirect(
            Some("https://anywhere.com\\bar"),
            &client(&["https://anywhere.com/bar"]),
        ));
    }

    #[test]
    fn test_host_is_case_sensitive() {
        assert_mismatch(resolver().resolve_redirect(
            Some("https://ANYWHERE.com/bar"),
            &client(&["https://anywhere.com/bar"]),
        ));
        assert_resolves(
            &resolver(),
            &["https://Anywhere.com/bar"],
            "https://Anywhere.com/bar",
        );
    }

    #[test]
    fn test_ipv6_host_with_port() {
        assert_resolves(&resolver(), &["https://[::1]:8443/cb"], "https://[::1]:8443/cb");
        assert_mismatch(
            resolver().resolve_redirect(Some("https://[::1]:8443/cb"), &client(&["https://[::1]/cb"])),
        );
    }

    #[test]
    fn test_redirect_not_matching_subdomain() {
        let resolver = RedirectResolver::new(&RedirectConfig {
            match_subdomains: true,
            ..RedirectConfig::default()
        });
        assert_mismatch(resolver.resolve_redirect(
            Some("https://2anywhere.com/foo"),
            &client(&["https://anywhere.com/foo"]),
        ));
    }

    #[test]
    fn test_redirect_matching_subdomain() {
        let resolver = RedirectResolver::new(&RedirectConfig {
            match_subdomains: true,
            ..RedirectConfig::default()
        });
        assert_resolves(
            &resolver,
            &["https://anywhere.com/foo"],
            "https://2.anywhere.com/foo",
        );
    }

    #[test]
    fn test_redirect_match_subdomains_defaults_false() {
        assert_mismatch(
            resolver().resolve_redirect(Some("https://2.anywhere.com"), &client(&["https://anywhere.com"])),
        );
    }

    #[test]
    fn test_redirect_no_host() {
        assert_resolves(&resolver(), &["scheme:/path"], "scheme:/path");
    }

    #[test]
    fn test_scheme_must_match() {
        assert_mismatch(
            resolver().resolve_redirect(Some("http://anywhere.com"), &client(&["https://anywhere.com"])),
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let c = client(&["https://anywhere.com/?p1=v1"]);
        let r = resolver();
        let first = r.resolve_redirect(Some("https://anywhere.com/?p1=v1&x=y"), &c).unwrap();
        let second = r.resolve_redirect(Some("https://anywhere.com/?p1=v1&x=y"), &c).unwrap();
        assert_eq!(first, second);
    }

    // -------------------------------------------------------------------------
    // Ports
    // -------------------------------------------------------------------------

    #[test]
    fn test_redirect_not_matching_port() {
        assert_mismatch(resolver().resolve_redirect(
            Some("https://anywhere.com:91/foo"),
            &client(&["https://anywhere.com:90"]),
        ));
    }

    #[test]
    fn test_redirect_matching_port() {
        assert_resolves(&resolver(), &["https://anywhere.com:90"], "https://anywhere.com:90");
    }

    #[test]
    fn test_redirect_registered_port_set_requested_port_not_set() {
        assert_mismatch(resolver().resolve_redirect(
            Some("https://anywhere.com/foo"),
            &client(&["https://anywhere.com:90"]),
        ));
    }

    #[test]
    fn test_redirect_registered_port_not_set_requested_port_set() {
        assert_mismatch(resolver().resolve_redirect(
            Some("https://anywhere.com:8443/foo"),
            &client(&["https://anywhere.com"]),
        ));
    }

    #[test]
    fn test_explicit_default_port_is_not_absent() {
        assert_mismatch(resolver().resolve_redirect(
            Some("https://anywhere.com:443"),
            &client(&["https://anywhere.com"]),
        ));
    }

    #[test]
    fn test_redirect_match_ports_false() {
        let resolver = RedirectResolver::new(&RedirectConfig {
            match_ports: false,
            ..RedirectConfig::default()
        });
        assert_resolves(&resolver, &["https://anywhere.com:90"], "https://anywhere.com:90");
        assert_resolves(&resolver, &["https://anywhere.com:90"], "https://anywhere.com:91");
    }

    // -------------------------------------------------------------------------
    // Userinfo and fragment
    // -------------------------------------------------------------------------

    #[test]
    fn test_redirect_registered_user_info_not_matching() {
        assert_mismatch(resolver().resolve_redirect(
            Some("https://otheruserinfo@anywhere.com"),
            &client(&["https://userinfo@anywhere.com"]),
        ));
    }

    #[test]
    fn test_redirect_registered_no_user_info_not_matching() {
        assert_mismatch(resolver().resolve_redirect(
            Some("https://anywhere.com"),
            &client(&["https://userinfo@anywhere.com"]),
        ));
    }

    #[test]
    fn test_redirect_registered_user_info_matching() {
        assert_resolves(
            &resolver(),
            &["https://userinfo@anywhere.com"],
            "https://userinfo@anywhere.com",
        );
    }

    #[test]
    fn test_redirect_registered_fragment_ignored_and_stripped() {
        let resolved = resolver()
            .resolve_redirect(
                Some("https://userinfo@anywhere.com/foo/bar#bar"),
                &client(&["https://userinfo@anywhere.com/foo/bar#baz"]),
            )
            .unwrap();
        assert_eq!(resolved, "https://userinfo@anywhere.com/foo/bar");
    }

    // -------------------------------------------------------------------------
    // Query parameters
    // -------------------------------------------------------------------------

    #[test]
    fn test_redirect_registered_query_params_matching() {
        assert_resolves(
            &resolver(),
            &["https://anywhere.com/?p1=v1&p2=v2"],
            "https://anywhere.com/?p1=v1&p2=v2",
        );
    }

    #[test]
    fn test_redirect_registered_query_params_matching_ignoring_additional_params() {
        assert_resolves(
            &resolver(),
            &["https://anywhere.com/?p1=v1&p2=v2"],
            "https://anywhere.com/?p1=v1&p2=v2&p3=v3",
        );
    }

    #[test]
    fn test_redirect_registered_query_params_matching_different_order() {
        assert_resolves(
            &resolver(),
            &["https://anywhere.com/?p1=v1&p2=v2"],
            "https://anywhere.com/?p2=v2&p1=v1",
        );
    }

    #[test]
    fn test_redirect_registered_query_params_with_different_values() {
        assert_mismatch(resolver().resolve_redirect(
            Some("https://anywhere.com/?p1=v1&p2=v3"),
            &client(&["https://anywhere.com/?p1=v1&p2=v2"]),
        ));
    }

    #[test]
    fn test_redirect_registered_query_params_not_matching() {
        assert_mismatch(resolver().resolve_redirect(
            Some("https://anywhere.com/?p2=v2"),
            &client(&["https://anywhere.com/?p1=v1"]),
        ));
    }

    #[test]
    fn test_redirect_registered_query_params_partially_matching() {
        assert_mismatch(resolver().resolve_redirect(
            Some("https://anywhere.com/?p2=v2&p3=v3"),
            &client(&["https://anywhere.com/?p1=v1&p2=v2"]),
        ));
    }

    #[test]
    fn test_redirect_registered_query_params_matching_with_multiple_values() {
        assert_resolves(
            &resolver(),
            &["https://anywhere.com/?p1=v11&p1=v12"],
            "https://anywhere.com/?p1=v12&p1=v11",
        );
        assert_mismatch(resolver().resolve_redirect(
            Some("https://anywhere.com/?p1=v11"),
            &client(&["https://anywhere.com/?p1=v11&p1=v12"]),
        ));
    }

    #[test]
    fn test_redirect_registered_query_params_matching_with_param_with_no_value() {
        assert_resolves(
            &resolver(),
            &["https://anywhere.com/?p1&p2=v2"],
            "https://anywhere.com/?p1&p2=v2",
        );
    }

    #[test]
    fn test_second_registration_matches() {
        assert_resolves(
            &resolver(),
            &["https://nowhere.com", "https://anywhere.com/cb"],
            "https://anywhere.com/cb",
        );
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    #[test]
    fn test_explicit_port() {
        assert_eq!(explicit_port("https://anywhere.com:90/x"), Some("90".to_string()));
        assert_eq!(explicit_port("https://u:p@anywhere.com/x"), None);
        assert_eq!(explicit_port("https://u:p@anywhere.com:1/x"), Some("1".to_string()));
        assert_eq!(explicit_port("https://[::1]:8080/"), Some("8080".to_string()));
        assert_eq!(explicit_port("https://[::1]/"), None);
        assert_eq!(explicit_port("scheme:/path"), None);
    }

    #[test]
    fn test_raw_path() {
        assert_eq!(raw_path("https://anywhere.com/foo/bar?x=1"), "/foo/bar");
        assert_eq!(raw_path("https://anywhere.com"), "");
        assert_eq!(raw_path("scheme:/path"), "/path");
    }
}
