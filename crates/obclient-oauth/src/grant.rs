//! OAuth2 client-credentials grant.

use std::future::Future;

use http::{Method, Request, header};
use smol_str::SmolStr;

use crate::request::{ObRequest, Result, decode_json, ob_request};
use crate::transport::Transport;
use crate::types::{Client, ClientCredentialsParameters, GrantToken, TokenGrantType};

pub const CREDENTIALS_GRANT_SCOPE: &str = "accounts openid";

#[trait_variant::make(Send)]
pub trait CredentialsGranter {
    fn request(&self) -> impl Future<Output = Result<GrantToken>>;
}

/// Client-credentials grant against the token endpoint, authenticated with
/// the client's basic auth header.
#[derive(Debug)]
pub struct CredentialsGrant<T> {
    transport: T,
    token_endpoint: SmolStr,
    client: Client,
}

impl<T: Transport + Sync> CredentialsGrant<T> {
    pub fn new(transport: T, token_endpoint: impl Into<SmolStr>, client: Client) -> Self {
        Self {
            transport,
            token_endpoint: token_endpoint.into(),
            client,
        }
    }

    async fn send_grant(&self) -> Result<GrantToken> {
        let http = self.transport.client().await?;
        let body = serde_html_form::to_string(ClientCredentialsParameters {
            grant_type: TokenGrantType::ClientCredentials,
            scope: CREDENTIALS_GRANT_SCOPE,
        })?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.token_endpoint.as_str())
            .header(header::AUTHORIZATION, self.client.auth_header())
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "application/json")
            .body(body.into_bytes())?;
        let res = ob_request(http, ObRequest::CredentialsGrant, req).await?;
        decode_json(&res)
    }
}

impl<T: Transport + Sync> CredentialsGranter for CredentialsGrant<T> {
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(endpoint = %self.token_endpoint)))]
    async fn request(&self) -> Result<GrantToken> {
        self.send_grant()
            .await
            .map_err(|e| e.with_context(ObRequest::CredentialsGrant.name()))
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::request::RequestErrorKind;
    use crate::test_util::{MockTransport, client, response};

    const TOKEN_ENDPOINT: &str = "https://aspsp.example/token";

    #[tokio::test]
    async fn form_and_basic_auth() {
        let transport = MockTransport::default();
        transport
            .0
            .push_json(
                StatusCode::OK,
                serde_json::json!({"access_token": "g1", "token_type": "Bearer", "expires_in": 3600}),
            )
            .await;
        let grant = CredentialsGrant::new(transport.clone(), TOKEN_ENDPOINT, client())
            .request()
            .await
            .unwrap();
        assert_eq!(grant.access_token, "g1");
        assert_eq!(grant.expires_in, Some(3600));

        let sent = transport.0.requests().await;
        assert_eq!(sent[0].method(), Method::POST);
        assert_eq!(sent[0].uri(), TOKEN_ENDPOINT);
        assert_eq!(sent[0].headers()[header::AUTHORIZATION], "Basic YzE6czE=");
        assert_eq!(
            std::str::from_utf8(sent[0].body()).unwrap(),
            "grant_type=client_credentials&scope=accounts+openid"
        );
    }

    #[tokio::test]
    async fn status_is_preserved() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::CREATED, StatusCode::BAD_GATEWAY] {
            let transport = MockTransport::default();
            transport.0.push(response(status, "nope")).await;
            let err = CredentialsGrant::new(transport, TOKEN_ENDPOINT, client())
                .request()
                .await
                .unwrap_err();
            assert_eq!(err.status(), Some(status));
            assert_eq!(err.context(), Some("getting credentials grant"));
        }
    }

    #[tokio::test]
    async fn garbage_body_is_a_decode_error() {
        let transport = MockTransport::default();
        transport.0.push(response(StatusCode::OK, "{")).await;
        let err = CredentialsGrant::new(transport, TOKEN_ENDPOINT, client())
            .request()
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), RequestErrorKind::SerdeJson));
    }
}
