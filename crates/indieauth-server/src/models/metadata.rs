//! Authorization server metadata document (RFC 8414 with IndieAuth fields).

use serde::{Deserialize, Serialize};
use url::Url;

/// Server metadata as published at `/.well-known/oauth-authorization-server`
/// and discovered through `rel="indieauth-metadata"`.
///
/// Unknown fields are ignored; every endpoint is optional when parsing a
/// remote document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_types_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grant_types_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_challenge_methods_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_response_iss_parameter_supported: Option<bool>,
}

impl Metadata {
    /// Endpoint advertised for a discovery relation, if present and non-empty.
    #[must_use]
    pub fn endpoint(&self, relation: &str) -> Option<&str> {
        let value = match relation {
            "authorization_endpoint" => self.authorization_endpoint.as_deref(),
            "token_endpoint" => self.token_endpoint.as_deref(),
            "ticket_endpoint" => self.ticket_endpoint.as_deref(),
            "introspection_endpoint" => self.introspection_endpoint.as_deref(),
            "revocation_endpoint" => self.revocation_endpoint.as_deref(),
            "userinfo_endpoint" => self.userinfo_endpoint.as_deref(),
            _ => None,
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }

    /// Metadata describing this server when mounted at `issuer`.
    #[must_use]
    pub fn for_issuer(issuer: &Url, scopes: &[&str], methods: &[&str]) -> Self {
        let at = |path: &str| issuer.join(path).map(String::from).ok();
        let strings = |values: &[&str]| values.iter().map(|v| (*v).to_owned()).collect();

        Self {
            issuer: Some(issuer.to_string()),
            authorization_endpoint: at("authorize"),
            token_endpoint: at("token"),
            ticket_endpoint: at("ticket"),
            introspection_endpoint: at("introspect"),
            revocation_endpoint: at("token"),
            userinfo_endpoint: None,
            scopes_supported: strings(scopes),
            response_types_supported: vec!["code".to_owned()],
            grant_types_supported: vec!["authorization_code".to_owned(), "ticket".to_owned()],
            code_challenge_methods_supported: strings(methods),
            authorization_response_iss_parameter_supported: Some(true),
        }
    }
}
