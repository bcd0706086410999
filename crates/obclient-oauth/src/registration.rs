//! Dynamic client registration.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use http::{Method, Request, header};
use serde::Serialize;
use smol_str::SmolStr;

use crate::jose::{Audience, Claims, RegisteredClaims};
use crate::request::{ObRequest, Result, decode_json, ob_request};
use crate::signer::{Signer, SigningAlgorithm};
use crate::software_statement::SoftwareStatement;
use crate::transport::Transport;
use crate::types::{Client, ClientRegistrationResponse, Configuration, TokenGrantType};

/// Lifetime of the registration assertion.
pub const ASSERTION_LIFETIME: Duration = Duration::hours(1);

pub const REGISTRATION_SCOPES: [&str; 3] = ["openid", "accounts", "payments"];

#[trait_variant::make(Send)]
pub trait ClientRegister {
    /// Register the software with the ASPSP and return the issued client.
    fn register(&self) -> impl Future<Output = Result<Client>>;
}

/// Client metadata carried in the registration assertion.
// https://datatracker.ietf.org/doc/html/rfc7591#section-2
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RegistrationMetadata<'a> {
    pub token_endpoint_auth_signing_alg: SigningAlgorithm,
    pub id_token_signed_response_alg: SigningAlgorithm,
    pub grant_types: [TokenGrantType; 3],
    pub subject_type: &'a str,
    pub application_type: &'a str,
    pub redirect_uris: Vec<&'a str>,
    pub token_endpoint_auth_method: &'a str,
    pub software_statement: &'a str,
    pub client_name: &'a str,
    pub scopes: [&'a str; 3],
    pub request_object_signing_alg: &'a str,
    pub response_types: [&'a str; 2],
}

/// Registers a [`SoftwareStatement`] at the discovered registration endpoint.
#[derive(Debug)]
pub struct ClientRegistration<S, T> {
    registration_endpoint: SmolStr,
    issuer: SmolStr,
    statement: SoftwareStatement<S>,
    transport: T,
}

impl<S: Signer, T: Transport> ClientRegistration<S, T> {
    pub fn new(configuration: &Configuration, statement: SoftwareStatement<S>, transport: T) -> Self {
        Self {
            registration_endpoint: configuration.registration_endpoint.clone(),
            issuer: configuration.issuer.clone(),
            statement,
            transport,
        }
    }

    pub fn statement(&self) -> &SoftwareStatement<S> {
        &self.statement
    }

    /// Claim set for an assertion issued at `now`.
    pub fn claims(&self, now: DateTime<Utc>) -> Claims<RegistrationMetadata<'_>> {
        let alg = self.statement.algorithm();
        let registered = RegisteredClaims {
            iss: Some(self.issuer.clone()),
            sub: Some(SmolStr::new(self.statement.id())),
            aud: Some(Audience::Single(self.issuer.clone())),
            iat: Some(now.timestamp()),
            exp: Some((now + ASSERTION_LIFETIME).timestamp()),
            nbf: None,
            jti: Some(smol_str::format_smolstr!("{}", uuid::Uuid::new_v4())),
        };
        let metadata = RegistrationMetadata {
            token_endpoint_auth_signing_alg: alg,
            id_token_signed_response_alg: alg,
            grant_types: [
                TokenGrantType::AuthorizationCode,
                TokenGrantType::RefreshToken,
                TokenGrantType::ClientCredentials,
            ],
            subject_type: "public",
            application_type: "web",
            redirect_uris: vec![self.statement.redirect_url().as_str()],
            token_endpoint_auth_method: "client_secret_basic",
            software_statement: self.statement.name(),
            client_name: self.statement.name(),
            scopes: REGISTRATION_SCOPES,
            request_object_signing_alg: "none",
            response_types: ["code", "code id_token"],
        };
        Claims::new(registered, metadata)
    }
}

impl<S, T> ClientRegistration<S, T>
where
    S: Signer,
    T: Transport + Sync,
{
    async fn send_registration(&self) -> Result<Client> {
        let client = self.transport.client().await?;
        let assertion = self.statement.sign(&self.claims(Utc::now()))?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.registration_endpoint.as_str())
            .header(header::CONTENT_TYPE, "application/jwt")
            .header(header::ACCEPT, "application/json")
            .body(assertion.as_bytes().to_vec())?;
        let res = ob_request(client, ObRequest::Registration, req).await?;
        let registration: ClientRegistrationResponse = decode_json(&res)?;
        Ok(Client::from(registration))
    }
}

impl<S, T> ClientRegister for ClientRegistration<S, T>
where
    S: Signer,
    T: Transport + Sync,
{
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(endpoint = %self.registration_endpoint)))]
    async fn register(&self) -> Result<Client> {
        self.send_registration()
            .await
            .map_err(|e| e.with_context(ObRequest::Registration.name()))
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use http::StatusCode;

    use super::*;
    use crate::keys::PemKeyPair;
    use crate::request::RequestErrorKind;
    use crate::signer::ClaimSigner;
    use crate::test_util::{MockTransport, response};

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    fn registration(
        transport: MockTransport,
    ) -> ClientRegistration<ClaimSigner<PemKeyPair>, MockTransport> {
        let signer = ClaimSigner::new(
            PemKeyPair::new(fixture("signing_pub.pem"), fixture("signing_key.pem")),
            SigningAlgorithm::Ps256,
        );
        let statement = SoftwareStatement::new(
            "ss-id",
            "ss-name",
            url::Url::parse("http://localhost:8081/").unwrap(),
            signer,
        );
        let configuration = Configuration {
            authorization_endpoint: None,
            registration_endpoint: "https://aspsp.example/register".into(),
            token_endpoint: "https://aspsp.example/token".into(),
            issuer: "https://aspsp.example".into(),
        };
        ClientRegistration::new(&configuration, statement, transport)
    }

    #[test]
    fn claim_set() {
        let reg = registration(MockTransport::default());
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let claims = serde_json::to_value(reg.claims(now)).unwrap();
        assert_eq!(claims["iss"], "https://aspsp.example");
        assert_eq!(claims["aud"], "https://aspsp.example");
        assert_eq!(claims["sub"], "ss-id");
        assert_eq!(claims["iat"], 1_700_000_000);
        assert_eq!(claims["exp"], 1_700_003_600);
        assert_eq!(
            claims["grant_types"],
            serde_json::json!(["authorization_code", "refresh_token", "client_credentials"])
        );
        assert_eq!(claims["scopes"], serde_json::json!(["openid", "accounts", "payments"]));
        assert_eq!(claims["redirect_uris"], serde_json::json!(["http://localhost:8081/"]));
        assert_eq!(claims["token_endpoint_auth_signing_alg"], "PS256");
        assert_eq!(claims["software_statement"], "ss-name");
        assert_eq!(claims["response_types"], serde_json::json!(["code", "code id_token"]));

        let other = serde_json::to_value(reg.claims(now)).unwrap();
        assert_ne!(claims["jti"], other["jti"]);
    }

    #[tokio::test]
    async fn posts_signed_assertion() {
        let transport = MockTransport::default();
        transport
            .0
            .push_json(
                StatusCode::CREATED,
                serde_json::json!({"client_id": "c1", "client_secret": "s1"}),
            )
            .await;
        let client = registration(transport.clone()).register().await.unwrap();
        assert_eq!(client, Client::new("c1", "s1"));

        let sent = transport.0.requests().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method(), Method::POST);
        assert_eq!(sent[0].uri(), "https://aspsp.example/register");
        assert_eq!(sent[0].headers()[header::CONTENT_TYPE], "application/jwt");
        let body = std::str::from_utf8(sent[0].body()).unwrap();
        let payload = body.split('.').nth(1).unwrap();
        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        assert_eq!(claims["sub"], "ss-id");
    }

    #[tokio::test]
    async fn ok_status_is_accepted() {
        let transport = MockTransport::default();
        transport
            .0
            .push_json(
                StatusCode::OK,
                serde_json::json!({"client_id": "c2", "client_secret": "s2"}),
            )
            .await;
        let client = registration(transport).register().await.unwrap();
        assert_eq!(client.id, "c2");
    }

    #[tokio::test]
    async fn rejection_keeps_response_body() {
        let transport = MockTransport::default();
        transport
            .0
            .push(response(
                StatusCode::BAD_REQUEST,
                r#"{"error":"invalid_software_statement"}"#,
            ))
            .await;
        let err = registration(transport).register().await.unwrap_err();
        assert_eq!(err.context(), Some("registering client"));
        match err.kind() {
            RequestErrorKind::HttpStatus { status, body } => {
                assert_eq!(*status, StatusCode::BAD_REQUEST);
                assert!(body.contains("invalid_software_statement"));
            }
            other => panic!("unexpected error kind {other:?}"),
        }
    }
}
