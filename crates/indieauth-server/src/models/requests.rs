//! Inbound request shapes.
//!
//! Each request is decoded once into an all-optional "params" struct (query
//! string or form body) and validated once into a typed request. Handlers only
//! ever see the typed form.

use serde::{Deserialize, Serialize};
use url::Url;

use super::{Action, ClientId, Decision, GrantType, Me, ResponseType, Scopes, Ticket};
use crate::error::OAuthError;
use crate::oauth::pkce::CodeChallenge;

// ─── Field helpers ─────────────────────────────────────────────────────────

/// A present, non-blank field.
fn required<'a>(value: Option<&'a String>, field: &str) -> Result<&'a str, OAuthError> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuthError::invalid_request(format!("missing {field}")))
}

fn optional(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn client_id(value: Option<&String>) -> Result<ClientId, OAuthError> {
    ClientId::parse(required(value, "client_id")?)
        .map_err(|e| OAuthError::invalid_identifier("client_id", &e))
}

fn me(value: Option<&String>, field: &str) -> Result<Me, OAuthError> {
    Me::parse(required(value, field)?).map_err(|e| OAuthError::invalid_identifier(field, &e))
}

/// An absolute `http`/`https` URL without a fragment.
pub fn absolute_url(raw: &str, field: &str) -> Result<Url, OAuthError> {
    let url = Url::parse(raw)
        .map_err(|e| OAuthError::invalid_request(format!("{field} is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(OAuthError::invalid_request(format!("{field} must use http or https")));
    }
    if url.fragment().is_some() {
        return Err(OAuthError::invalid_request(format!("{field} must not contain a fragment")));
    }
    Ok(url)
}

fn url_field(value: Option<&String>, field: &str) -> Result<Url, OAuthError> {
    absolute_url(required(value, field)?, field)
}

fn scopes(value: Option<&String>) -> Result<Scopes, OAuthError> {
    Ok(optional(value).map(Scopes::parse).transpose()?.unwrap_or_default())
}

// ─── Authorization request ─────────────────────────────────────────────────

/// Raw `GET /authorize` query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizeParams {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub me: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// A validated authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationRequest {
    pub client_id: ClientId,
    pub redirect_uri: Url,
    pub response_type: ResponseType,
    pub me: Me,
    pub state: String,
    pub scope: Scopes,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<CodeChallenge>,
}

impl AuthorizeParams {
    pub fn validate(&self) -> Result<AuthorizationRequest, OAuthError> {
        let response_type: ResponseType = required(self.response_type.as_ref(), "response_type")?.parse()?;
        let code_challenge = CodeChallenge::from_request(
            optional(self.code_challenge.as_ref()),
            optional(self.code_challenge_method.as_ref()),
        )?;

        Ok(AuthorizationRequest {
            client_id: client_id(self.client_id.as_ref())?,
            redirect_uri: url_field(self.redirect_uri.as_ref(), "redirect_uri")?,
            response_type,
            me: me(self.me.as_ref(), "me")?,
            state: required(self.state.as_ref(), "state")?.to_owned(),
            scope: scopes(self.scope.as_ref())?,
            code_challenge,
        })
    }
}

// ─── Consent decision ──────────────────────────────────────────────────────

/// Raw `POST /authorize/verify` form: the original request fields, the
/// user's decision and the scopes they kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsentParams {
    pub authorize: Option<String>,
    pub password: Option<String>,
    /// Subset of `scope` the user approved; all requested scopes when absent.
    pub approved_scope: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub me: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// A validated consent decision. `request.scope` holds the approved scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consent {
    pub decision: Decision,
    pub password: Option<String>,
    pub request: AuthorizationRequest,
}

impl ConsentParams {
    fn authorization(&self) -> AuthorizeParams {
        AuthorizeParams {
            client_id: self.client_id.clone(),
            redirect_uri: self.redirect_uri.clone(),
            response_type: self.response_type.clone(),
            me: self.me.clone(),
            state: self.state.clone(),
            scope: self.scope.clone(),
            code_challenge: self.code_challenge.clone(),
            code_challenge_method: self.code_challenge_method.clone(),
        }
    }

    pub fn validate(&self) -> Result<Consent, OAuthError> {
        let mut request = self.authorization().validate()?;
        let decision: Decision = required(self.authorize.as_ref(), "authorize")?.parse()?;

        if self.approved_scope.is_some() {
            let approved = scopes(self.approved_scope.as_ref())?;
            if !approved.is_subset_of(&request.scope) {
                return Err(OAuthError::invalid_request("approved scope exceeds the requested scope"));
            }
            request.scope = approved;
        }

        Ok(Consent { decision, password: optional(self.password.as_ref()).map(str::to_owned), request })
    }
}

// ─── Code exchange ─────────────────────────────────────────────────────────

/// Raw code redemption form (`POST /authorize`, and the authorization-code
/// fields of `POST /token`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeParams {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
}

/// A validated code redemption.
#[derive(Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub code: String,
    pub client_id: ClientId,
    pub redirect_uri: Url,
    pub code_verifier: Option<String>,
}

impl std::fmt::Debug for ExchangeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRequest")
            .field("client_id", &self.client_id.as_str())
            .field("redirect_uri", &self.redirect_uri.as_str())
            .finish()
    }
}

impl ExchangeParams {
    pub fn validate(&self) -> Result<ExchangeRequest, OAuthError> {
        if let Some(grant_type) = optional(self.grant_type.as_ref()) {
            if grant_type.parse::<GrantType>()? != GrantType::AuthorizationCode {
                return Err(OAuthError::unsupported_grant_type(format!(
                    "grant_type {grant_type} is not accepted here"
                )));
            }
        }

        Ok(ExchangeRequest {
            code: required(self.code.as_ref(), "code")?.to_owned(),
            client_id: client_id(self.client_id.as_ref())?,
            redirect_uri: url_field(self.redirect_uri.as_ref(), "redirect_uri")?,
            code_verifier: optional(self.code_verifier.as_ref()).map(str::to_owned),
        })
    }
}

// ─── Token endpoint ────────────────────────────────────────────────────────

/// Raw `POST /token` form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenParams {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub ticket: Option<String>,
    pub action: Option<String>,
    pub token: Option<String>,
}

/// What a `POST /token` call asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRequest {
    AuthorizationCode(ExchangeRequest),
    Ticket { ticket: String },
    Revoke { token: String },
}

impl TokenParams {
    pub fn validate(&self) -> Result<TokenRequest, OAuthError> {
        if let Some(action) = optional(self.action.as_ref()) {
            return match action.parse::<Action>()? {
                Action::Revoke => Ok(TokenRequest::Revoke {
                    token: required(self.token.as_ref(), "token")?.to_owned(),
                }),
            };
        }

        match required(self.grant_type.as_ref(), "grant_type")?.parse::<GrantType>()? {
            GrantType::AuthorizationCode => {
                let exchange = ExchangeParams {
                    grant_type: None,
                    code: self.code.clone(),
                    client_id: self.client_id.clone(),
                    redirect_uri: self.redirect_uri.clone(),
                    code_verifier: self.code_verifier.clone(),
                };
                Ok(TokenRequest::AuthorizationCode(exchange.validate()?))
            }
            GrantType::Ticket => Ok(TokenRequest::Ticket {
                ticket: required(self.ticket.as_ref(), "ticket")?.to_owned(),
            }),
        }
    }
}

/// Raw `POST /introspect` form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntrospectParams {
    pub token: Option<String>,
}

impl IntrospectParams {
    pub fn validate(&self) -> Result<String, OAuthError> {
        Ok(required(self.token.as_ref(), "token")?.to_owned())
    }
}

// ─── Tickets ───────────────────────────────────────────────────────────────

/// Raw `POST /ticket/send` form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketSendParams {
    pub subject: Option<String>,
    pub resource: Option<String>,
}

/// A validated request to grant `subject` access to `resource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketSendRequest {
    pub subject: Me,
    pub resource: Url,
}

impl TicketSendParams {
    pub fn validate(&self) -> Result<TicketSendRequest, OAuthError> {
        Ok(TicketSendRequest {
            subject: me(self.subject.as_ref(), "subject")?,
            resource: url_field(self.resource.as_ref(), "resource")?,
        })
    }
}

/// Raw ticket delivery form received at `POST /ticket`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketParams {
    pub ticket: Option<String>,
    pub subject: Option<String>,
    pub resource: Option<String>,
}

impl TicketParams {
    pub fn validate(&self) -> Result<Ticket, OAuthError> {
        Ok(Ticket::new(
            required(self.ticket.as_ref(), "ticket")?,
            url_field(self.resource.as_ref(), "resource")?,
            me(self.subject.as_ref(), "subject")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::Scope;

    fn authorize() -> AuthorizeParams {
        AuthorizeParams {
            client_id: Some("https://app.example.com/".into()),
            redirect_uri: Some("https://app.example.com/callback".into()),
            response_type: Some("code".into()),
            me: Some("https://user.example.net/".into()),
            state: Some("xyz".into()),
            scope: Some("create update".into()),
            code_challenge: Some("OfYAxt8zU2dAPDWQxTAUIteRzMsoj9QBdMIVEDOErUo".into()),
            code_challenge_method: Some("S256".into()),
        }
    }

    #[test]
    fn test_authorize_valid() {
        let request = authorize().validate().unwrap();
        assert_eq!(request.client_id.as_str(), "https://app.example.com/");
        assert_eq!(request.scope.len(), 2);
        assert!(request.code_challenge.is_some());
    }

    #[test]
    fn test_authorize_missing_state() {
        let mut params = authorize();
        params.state = Some("  ".into());
        let err = params.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
        assert!(err.description.contains("state"));
    }

    #[test]
    fn test_authorize_unknown_response_type() {
        let mut params = authorize();
        params.response_type = Some("token".into());
        assert_eq!(params.validate().unwrap_err().kind, ErrorKind::UnsupportedResponseType);
    }

    #[test]
    fn test_authorize_rejects_me_with_port() {
        let mut params = authorize();
        params.me = Some("https://user.example.net:8443/".into());
        let err = params.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
        assert!(err.description.contains("me"));
    }

    #[test]
    fn test_authorize_half_pkce_rejected() {
        let mut params = authorize();
        params.code_challenge_method = None;
        assert_eq!(params.validate().unwrap_err().kind, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_redirect_uri_with_fragment_rejected() {
        let mut params = authorize();
        params.redirect_uri = Some("https://app.example.com/callback#x".into());
        assert_eq!(params.validate().unwrap_err().kind, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_consent_narrows_scope() {
        let a = authorize();
        let consent = ConsentParams {
            authorize: Some("allow".into()),
            approved_scope: Some("create".into()),
            client_id: a.client_id,
            redirect_uri: a.redirect_uri,
            response_type: a.response_type,
            me: a.me,
            state: a.state,
            scope: a.scope,
            ..ConsentParams::default()
        }
        .validate()
        .unwrap();

        assert_eq!(consent.decision, Decision::Allow);
        assert_eq!(consent.request.scope, Scopes::from(vec![Scope::Create]));
    }

    #[test]
    fn test_consent_cannot_widen_scope() {
        let a = authorize();
        let err = ConsentParams {
            authorize: Some("allow".into()),
            approved_scope: Some("create delete".into()),
            client_id: a.client_id,
            redirect_uri: a.redirect_uri,
            response_type: a.response_type,
            me: a.me,
            state: a.state,
            scope: a.scope,
            ..ConsentParams::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_token_params_dispatch() {
        let revoke = TokenParams { action: Some("revoke".into()), token: Some("t".into()), ..TokenParams::default() };
        assert_eq!(revoke.validate().unwrap(), TokenRequest::Revoke { token: "t".into() });

        let ticket = TokenParams { grant_type: Some("ticket".into()), ticket: Some("abc".into()), ..TokenParams::default() };
        assert_eq!(ticket.validate().unwrap(), TokenRequest::Ticket { ticket: "abc".into() });

        let code = TokenParams {
            grant_type: Some("authorization_code".into()),
            code: Some("c".into()),
            client_id: Some("https://app.example.com/".into()),
            redirect_uri: Some("https://app.example.com/cb".into()),
            ..TokenParams::default()
        };
        assert!(matches!(code.validate().unwrap(), TokenRequest::AuthorizationCode(_)));
    }

    #[test]
    fn test_token_params_errors() {
        let unknown = TokenParams { grant_type: Some("password".into()), ..TokenParams::default() };
        assert_eq!(unknown.validate().unwrap_err().kind, ErrorKind::UnsupportedGrantType);

        let missing = TokenParams::default();
        assert_eq!(missing.validate().unwrap_err().kind, ErrorKind::InvalidRequest);

        let bad_action = TokenParams { action: Some("delete".into()), ..TokenParams::default() };
        assert_eq!(bad_action.validate().unwrap_err().kind, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_ticket_params() {
        let ticket = TicketParams {
            ticket: Some("32985723984723985792834".into()),
            subject: Some("https://bob.example.com/".into()),
            resource: Some("https://alice.example.com/private/".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(ticket.subject.as_str(), "https://bob.example.com/");

        let err = TicketSendParams { subject: Some("https://bob.example.com/".into()), resource: None }
            .validate()
            .unwrap_err();
        assert!(err.description.contains("resource"));
    }
}
