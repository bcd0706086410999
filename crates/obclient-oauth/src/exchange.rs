//! Authorization code exchange.

use std::future::Future;

use http::{Method, Request, header};
use smol_str::SmolStr;

use crate::request::{ObRequest, Result, decode_json, ob_request};
use crate::transport::Transport;
use crate::types::{AuthorizationCodeParameters, Client, Code, Token, TokenGrantType};

pub const TOKEN_EXCHANGE_SCOPE: &str = "accounts";

#[trait_variant::make(Send)]
pub trait TokenGenerator {
    fn request(&self, code: Code) -> impl Future<Output = Result<Token>>;
}

#[derive(Debug)]
pub struct TokenExchange<T> {
    transport: T,
    token_endpoint: SmolStr,
    redirect_url: SmolStr,
    client: Client,
}

impl<T: Transport + Sync> TokenExchange<T> {
    pub fn new(
        transport: T,
        token_endpoint: impl Into<SmolStr>,
        redirect_url: impl Into<SmolStr>,
        client: Client,
    ) -> Self {
        Self {
            transport,
            token_endpoint: token_endpoint.into(),
            redirect_url: redirect_url.into(),
            client,
        }
    }

    async fn send_exchange(&self, code: Code) -> Result<Token> {
        let http = self.transport.client().await?;
        let body = serde_html_form::to_string(AuthorizationCodeParameters {
            grant_type: TokenGrantType::AuthorizationCode,
            scope: TOKEN_EXCHANGE_SCOPE,
            code: &code.value,
            redirect_uri: &self.redirect_url,
        })?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.token_endpoint.as_str())
            .header(header::AUTHORIZATION, self.client.auth_header())
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "application/json")
            .body(body.into_bytes())?;
        let res = ob_request(http, ObRequest::TokenExchange, req).await?;
        decode_json(&res)
    }
}

impl<T: Transport + Sync> TokenGenerator for TokenExchange<T> {
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(endpoint = %self.token_endpoint)))]
    async fn request(&self, code: Code) -> Result<Token> {
        self.send_exchange(code)
            .await
            .map_err(|e| e.with_context(ObRequest::TokenExchange.name()))
    }
}
