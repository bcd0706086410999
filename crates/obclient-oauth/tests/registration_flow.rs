use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http::{Method, StatusCode};
use obclient_oauth::discovery::get_configuration;
use obclient_oauth::http_client::HttpClient;
use obclient_oauth::keys::PemKeyPair;
use obclient_oauth::registration::ClientRegistration;
use obclient_oauth::signer::ClaimSigner;
use obclient_oauth::software_statement::SoftwareStatement;
use obclient_oauth::transport::TransportError;
use obclient_oauth::{Client, ClientRegister, SigningAlgorithm, Transport};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use sha2::Sha256;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct MockClient {
    queue: Arc<Mutex<VecDeque<http::Response<Vec<u8>>>>>,
    log: Arc<Mutex<Vec<http::Request<Vec<u8>>>>>,
}

impl MockClient {
    async fn push(&self, status: StatusCode, body: serde_json::Value) {
        let resp = http::Response::builder()
            .status(status)
            .body(serde_json::to_vec(&body).unwrap())
            .unwrap();
        self.queue.lock().await.push_back(resp);
    }
}

impl HttpClient for MockClient {
    type Error = std::convert::Infallible;
    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl core::future::Future<
        Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>,
    > + Send {
        let log = self.log.clone();
        let queue = self.queue.clone();
        async move {
            log.lock().await.push(request);
            Ok(queue.lock().await.pop_front().expect("no queued response"))
        }
    }
}

struct MockTransport(MockClient);

impl Transport for MockTransport {
    type Client = MockClient;

    async fn client(&self) -> Result<&MockClient, TransportError> {
        Ok(&self.0)
    }
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[tokio::test]
async fn discovery_then_registration() {
    let http = MockClient::default();
    http.push(
        StatusCode::OK,
        serde_json::json!({
            "token_endpoint": "https://aspsp.example/T",
            "registration_endpoint": "https://aspsp.example/R",
            "issuer": "https://aspsp.example/I"
        }),
    )
    .await;
    http.push(
        StatusCode::CREATED,
        serde_json::json!({"client_id": "c1", "client_secret": "s1"}),
    )
    .await;

    let configuration = get_configuration(&http, "https://aspsp.example/.well-known/openid-configuration")
        .await
        .unwrap();
    assert_eq!(configuration.token_endpoint, "https://aspsp.example/T");

    let keys = PemKeyPair::new(fixture("signing_pub.pem"), fixture("signing_key.pem"));
    let statement = SoftwareStatement::new(
        "ss-id",
        "ss-name",
        url::Url::parse("http://localhost:8081/").unwrap(),
        ClaimSigner::new(keys, SigningAlgorithm::Rs256),
    );
    let registration =
        ClientRegistration::new(&configuration, statement, MockTransport(http.clone()));

    let client = registration.register().await.unwrap();
    assert_eq!(client, Client::new("c1", "s1"));

    let log = http.log.lock().await;
    assert_eq!(log.len(), 2);
    let post = &log[1];
    assert_eq!(post.method(), Method::POST);
    assert_eq!(post.uri(), "https://aspsp.example/R");

    // the assertion verifies against the public signing key
    let jwt = std::str::from_utf8(post.body()).unwrap();
    let (message, signature) = jwt.rsplit_once('.').unwrap();
    let public = obclient_oauth::keys::load_public_key(&fixture("signing_pub.pem")).unwrap();
    let signature = Signature::try_from(URL_SAFE_NO_PAD.decode(signature).unwrap().as_slice()).unwrap();
    VerifyingKey::<Sha256>::new(public)
        .verify(message.as_bytes(), &signature)
        .unwrap();

    let payload = message.split('.').nth(1).unwrap();
    let claims: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
    assert_eq!(claims["iss"], "https://aspsp.example/I");
    assert_eq!(claims["sub"], "ss-id");
    assert_eq!(
        claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
        3600
    );
}

#[tokio::test]
async fn rejected_registration_yields_no_client() {
    let http = MockClient::default();
    http.push(
        StatusCode::FORBIDDEN,
        serde_json::json!({"error": "unapproved_software_statement"}),
    )
    .await;
    let configuration = obclient_oauth::Configuration {
        registration_endpoint: "https://aspsp.example/R".into(),
        token_endpoint: "https://aspsp.example/T".into(),
        issuer: "https://aspsp.example/I".into(),
        ..Default::default()
    };
    let statement = SoftwareStatement::new(
        "ss-id",
        "ss-name",
        url::Url::parse("http://localhost:8081/").unwrap(),
        ClaimSigner::new(
            PemKeyPair::new(fixture("signing_pub.pem"), fixture("signing_key.pem")),
            SigningAlgorithm::Rs256,
        ),
    );
    let err = ClientRegistration::new(&configuration, statement, MockTransport(http))
        .register()
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    assert!(err.to_string().contains("unapproved_software_statement"));
}
