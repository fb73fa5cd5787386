//! Endpoint discovery.
//!
//! Relations are collected from one fetch of the target: `Link` headers
//! first, then `rel` markup in the body. A linked `indieauth-metadata`
//! document overrides both for the endpoints it defines. Among direct
//! values the last one declared wins.

pub mod html;
pub mod link;

use std::sync::Arc;

use url::Url;

use crate::client::{Document, Transport};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{ClientId, Metadata};

/// Relation names understood by the resolver.
pub mod relations {
    pub const METADATA: &str = "indieauth-metadata";
    pub const AUTHORIZATION_ENDPOINT: &str = "authorization_endpoint";
    pub const TOKEN_ENDPOINT: &str = "token_endpoint";
    pub const TICKET_ENDPOINT: &str = "ticket_endpoint";
    pub const INTROSPECTION_ENDPOINT: &str = "introspection_endpoint";
    pub const REVOCATION_ENDPOINT: &str = "revocation_endpoint";
    pub const USERINFO_ENDPOINT: &str = "userinfo_endpoint";
    pub const REDIRECT_URI: &str = "redirect_uri";

    /// Endpoint relations a metadata document may define.
    pub const ENDPOINTS: [&str; 6] = [
        AUTHORIZATION_ENDPOINT,
        TOKEN_ENDPOINT,
        TICKET_ENDPOINT,
        INTROSPECTION_ENDPOINT,
        REVOCATION_ENDPOINT,
        USERINFO_ENDPOINT,
    ];
}

/// Resolves endpoints advertised by profile and client pages.
#[derive(Clone)]
pub struct Resolver {
    transport: Arc<dyn Transport>,
}

impl Resolver {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Resolve the `relation` endpoint advertised by `url`.
    ///
    /// Transport failures are errors in their own right; a page that simply
    /// does not advertise the relation yields [`DiscoveryError::EndpointNotFound`].
    pub async fn resolve(&self, url: &Url, relation: &str) -> DiscoveryResult<Url> {
        let page = self.transport.get(url).await?;

        if relation != relations::METADATA {
            if let Some((metadata_url, metadata)) = self.linked_metadata(&page).await? {
                if let Some(endpoint) = metadata.endpoint(relation) {
                    let resolved = join(&metadata_url, endpoint, relation)?;
                    tracing::debug!(url = %url, relation, endpoint = %resolved, "Resolved from metadata");
                    return Ok(resolved);
                }
            }
        }

        match values(&page, relation).last() {
            Some(value) => {
                let resolved = join(&page.url, value, relation)?;
                tracing::debug!(url = %url, relation, endpoint = %resolved, "Resolved from page");
                Ok(resolved)
            }
            None => {
                tracing::debug!(url = %url, relation, "Relation not advertised");
                Err(DiscoveryError::not_found(relation, url.as_str()))
            }
        }
    }

    /// Every value of `relation` on `url`, header values first. Values that
    /// are not valid URLs are skipped.
    pub async fn resolve_all(&self, url: &Url, relation: &str) -> DiscoveryResult<Vec<Url>> {
        let page = self.transport.get(url).await?;
        Ok(values(&page, relation).iter().filter_map(|v| page.url.join(v).ok()).collect())
    }

    /// Redirect URIs a client publishes on its `client_id` page.
    pub async fn redirect_uris(&self, client_id: &ClientId) -> DiscoveryResult<Vec<Url>> {
        self.resolve_all(client_id.as_url(), relations::REDIRECT_URI).await
    }

    /// The full endpoint set advertised by `url`.
    ///
    /// A linked metadata document is returned as is, with relative endpoints
    /// made absolute. Without one, a document is assembled from the page's
    /// direct relations; a page advertising none of them is not found.
    pub async fn metadata(&self, url: &Url) -> DiscoveryResult<Metadata> {
        let page = self.transport.get(url).await?;

        if let Some((metadata_url, mut metadata)) = self.linked_metadata(&page).await? {
            absolutize(&metadata_url, &mut metadata);
            return Ok(metadata);
        }

        let mut metadata = Metadata::default();
        let mut found = false;
        for relation in relations::ENDPOINTS {
            if let Some(value) = values(&page, relation).last() {
                let endpoint = join(&page.url, value, relation)?.to_string();
                set_endpoint(&mut metadata, relation, endpoint);
                found = true;
            }
        }

        if found {
            Ok(metadata)
        } else {
            Err(DiscoveryError::not_found(relations::METADATA, url.as_str()))
        }
    }

    /// Fetch and parse a metadata document.
    pub async fn fetch_metadata(&self, url: &Url) -> DiscoveryResult<Metadata> {
        let document = self.transport.get(url).await?;
        Ok(document.json()?)
    }

    async fn linked_metadata(&self, page: &Document) -> DiscoveryResult<Option<(Url, Metadata)>> {
        let Some(value) = values(page, relations::METADATA).pop() else {
            return Ok(None);
        };
        let metadata_url = join(&page.url, &value, relations::METADATA)?;
        let metadata = self.fetch_metadata(&metadata_url).await?;
        Ok(Some((metadata_url, metadata)))
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish()
    }
}

/// Raw values of `relation`: `Link` headers, then body markup.
fn values(page: &Document, relation: &str) -> Vec<String> {
    let mut values = link::targets(page.links.iter().map(String::as_str), relation);
    if page.is_html() || page.content_type.is_none() {
        values.extend(html::rel_values(&page.body, relation));
    }
    values
}

fn join(base: &Url, value: &str, relation: &str) -> DiscoveryResult<Url> {
    base.join(value).map_err(|source| DiscoveryError::InvalidEndpoint {
        relation: relation.to_owned(),
        value: value.to_owned(),
        source,
    })
}

fn set_endpoint(metadata: &mut Metadata, relation: &str, endpoint: String) {
    let slot = match relation {
        relations::AUTHORIZATION_ENDPOINT => &mut metadata.authorization_endpoint,
        relations::TOKEN_ENDPOINT => &mut metadata.token_endpoint,
        relations::TICKET_ENDPOINT => &mut metadata.ticket_endpoint,
        relations::INTROSPECTION_ENDPOINT => &mut metadata.introspection_endpoint,
        relations::REVOCATION_ENDPOINT => &mut metadata.revocation_endpoint,
        relations::USERINFO_ENDPOINT => &mut metadata.userinfo_endpoint,
        _ => return,
    };
    *slot = Some(endpoint);
}

fn absolutize(base: &Url, metadata: &mut Metadata) {
    for relation in relations::ENDPOINTS {
        let absolute = metadata.endpoint(relation).and_then(|v| base.join(v).ok()).map(String::from);
        if let Some(endpoint) = absolute {
            set_endpoint(metadata, relation, endpoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StaticTransport;
    use crate::error::ClientError;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    fn resolver(transport: &StaticTransport) -> Resolver {
        Resolver::new(Arc::new(transport.clone()))
    }

    #[tokio::test]
    async fn test_last_value_wins_header_then_body() {
        let transport = StaticTransport::new();
        transport.serve(
            Document::new(
                url("https://user.example.net/"),
                "text/html",
                r#"<link rel="token_endpoint" href="/body-token">"#,
            )
            .with_link(r#"<https://header.example/token>; rel="token_endpoint""#),
        );

        let endpoint = resolver(&transport)
            .resolve(&url("https://user.example.net/"), relations::TOKEN_ENDPOINT)
            .await
            .unwrap();
        assert_eq!(endpoint.as_str(), "https://user.example.net/body-token");
    }

    #[tokio::test]
    async fn test_metadata_takes_precedence() {
        let transport = StaticTransport::new();
        transport.serve(
            Document::new(url("https://user.example.net/"), "text/html", "")
                .with_link(r#"<https://direct.example/token>; rel="token_endpoint""#)
                .with_link(r#"</.well-known/oauth-authorization-server>; rel="indieauth-metadata""#),
        );
        transport.serve(Document::new(
            url("https://user.example.net/.well-known/oauth-authorization-server"),
            "application/json",
            r#"{"issuer":"https://user.example.net/","token_endpoint":"https://meta.example/token"}"#,
        ));

        let resolver = resolver(&transport);
        let me = url("https://user.example.net/");
        assert_eq!(
            resolver.resolve(&me, relations::TOKEN_ENDPOINT).await.unwrap().as_str(),
            "https://meta.example/token"
        );
        // The document omits the ticket endpoint and the page has none either.
        assert!(resolver.resolve(&me, relations::TICKET_ENDPOINT).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_metadata_without_relation_falls_back() {
        let transport = StaticTransport::new();
        transport.serve(
            Document::new(
                url("https://user.example.net/"),
                "text/html",
                r#"<link rel="indieauth-metadata" href="/meta"><link rel="ticket_endpoint" href="/ticket">"#,
            ),
        );
        transport.serve(Document::new(url("https://user.example.net/meta"), "application/json", "{}"));

        let endpoint = resolver(&transport)
            .resolve(&url("https://user.example.net/"), relations::TICKET_ENDPOINT)
            .await
            .unwrap();
        assert_eq!(endpoint.as_str(), "https://user.example.net/ticket");
    }

    #[tokio::test]
    async fn test_not_found_is_distinct_from_transport_failure() {
        let transport = StaticTransport::new();
        transport.serve(Document::new(url("https://empty.example/"), "text/html", "<p>hi</p>"));
        transport.time_out(&url("https://slow.example/"));
        let resolver = resolver(&transport);

        let missing = resolver.resolve(&url("https://empty.example/"), relations::TICKET_ENDPOINT).await;
        assert!(missing.unwrap_err().is_not_found());

        let slow = resolver.resolve(&url("https://slow.example/"), relations::TICKET_ENDPOINT).await;
        assert!(matches!(slow, Err(DiscoveryError::Client(ClientError::Timeout(_)))));

        let gone = resolver.resolve(&url("https://gone.example/"), relations::TICKET_ENDPOINT).await;
        assert!(matches!(gone, Err(DiscoveryError::Client(ClientError::UnexpectedStatus { status: 404, .. }))));
    }

    #[tokio::test]
    async fn test_broken_metadata_document_is_an_error() {
        let transport = StaticTransport::new();
        transport.serve(
            Document::new(url("https://user.example.net/"), "text/html", "")
                .with_link("</meta>; rel=indieauth-metadata"),
        );
        transport.serve(Document::new(url("https://user.example.net/meta"), "application/json", "not json"));

        let err = resolver(&transport)
            .resolve(&url("https://user.example.net/"), relations::TOKEN_ENDPOINT)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Client(ClientError::Parse(_))));
    }

    #[tokio::test]
    async fn test_metadata_from_direct_relations() {
        let transport = StaticTransport::new();
        transport.serve(Document::new(
            url("https://user.example.net/"),
            "text/html",
            r#"<link rel="authorization_endpoint" href="/auth"><link rel="token_endpoint" href="/token">"#,
        ));

        let metadata = resolver(&transport).metadata(&url("https://user.example.net/")).await.unwrap();
        assert_eq!(metadata.authorization_endpoint.as_deref(), Some("https://user.example.net/auth"));
        assert_eq!(metadata.token_endpoint.as_deref(), Some("https://user.example.net/token"));
        assert!(metadata.ticket_endpoint.is_none());
    }

    #[tokio::test]
    async fn test_redirect_uris() {
        let transport = StaticTransport::new();
        transport.serve(
            Document::new(
                url("https://app.example.com/"),
                "text/html",
                r#"<link rel="redirect_uri" href="https://callback.example.org/cb">"#,
            )
            .with_link("</local-cb>; rel=redirect_uri"),
        );

        let client_id = ClientId::parse("https://app.example.com/").unwrap();
        let uris = resolver(&transport).redirect_uris(&client_id).await.unwrap();
        assert_eq!(
            uris.iter().map(Url::as_str).collect::<Vec<_>>(),
            vec!["https://app.example.com/local-cb", "https://callback.example.org/cb"]
        );
    }
}
