use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use obclient_oauth::consent::AccessConsentRequest;
use obclient_oauth::exchange::TokenExchange;
use obclient_oauth::grant::CredentialsGrant;
use obclient_oauth::http_client::HttpClient;
use obclient_oauth::loopback::{CallbackConfig, CallbackPort};
use obclient_oauth::psu::{BrowserOpener, PsuAccessConsent};
use obclient_oauth::transport::TransportError;
use obclient_oauth::{Authenticator, Client, PipelineStep, Transport};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct MockClient {
    queue: Arc<Mutex<VecDeque<http::Response<Vec<u8>>>>>,
    log: Arc<Mutex<Vec<http::Request<Vec<u8>>>>>,
}

impl MockClient {
    async fn push(&self, status: StatusCode, body: impl Into<Vec<u8>>) {
        let resp = http::Response::builder()
            .status(status)
            .body(body.into())
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

#[derive(Clone)]
struct MockTransport(MockClient);

impl Transport for MockTransport {
    type Client = MockClient;

    async fn client(&self) -> Result<&MockClient, TransportError> {
        Ok(&self.0)
    }
}

/// Follows the authorization URL the way the ASPSP's consent page would
/// redirect back.
struct RedirectingBrowser;

impl BrowserOpener for RedirectingBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        let url = url.to_owned();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let _ = reqwest::get(url).await;
            });
        });
        Ok(())
    }
}

fn authenticator(
    transport: MockTransport,
    port: u16,
) -> Authenticator<
    CredentialsGrant<MockTransport>,
    AccessConsentRequest<MockTransport>,
    PsuAccessConsent<MockTransport, RedirectingBrowser>,
    TokenExchange<MockTransport>,
> {
    let client = Client::new("c1", "s1");
    Authenticator::new(
        CredentialsGrant::new(transport.clone(), "https://aspsp.example/T", client.clone()),
        AccessConsentRequest::new(transport.clone(), "https://aspsp.example/ob", "fin-1"),
        PsuAccessConsent::new(transport.clone(), "https://aspsp.example/ob", client.clone())
            .with_callback(CallbackConfig {
                port: CallbackPort::Fixed(port),
                timeout: Some(Duration::from_secs(10)),
                grace: Duration::from_millis(10),
                ..Default::default()
            })
            .with_browser(RedirectingBrowser),
        TokenExchange::new(
            transport,
            "https://aspsp.example/T",
            format!("http://127.0.0.1:{port}/"),
            client,
        ),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn full_consent_pipeline() {
    let http = MockClient::default();
    http.push(StatusCode::OK, r#"{"access_token":"g1","expires_in":3600}"#)
        .await;
    http.push(StatusCode::CREATED, r#"{"Data":{"ConsentId":"k1"}}"#)
        .await;
    http.push(StatusCode::OK, "http://127.0.0.1:38591/?code=abc")
        .await;
    http.push(StatusCode::OK, r#"{"access_token":"tok1","scope":"accounts"}"#)
        .await;

    let token = authenticator(MockTransport(http.clone()), 38591)
        .authenticate()
        .await
        .unwrap();
    assert_eq!(token.access_token, "tok1");
    assert_eq!(token.scope.as_deref(), Some("accounts"));

    let log = http.log.lock().await;
    let uris: Vec<String> = log.iter().map(|r| r.uri().to_string()).collect();
    assert_eq!(
        uris,
        [
            "https://aspsp.example/T",
            "https://aspsp.example/ob/account-access-consents",
            "https://aspsp.example/ob/auth-code-url/k1?scope=openid+accounts",
            "https://aspsp.example/T",
        ]
    );
    assert_eq!(log[1].headers()[http::header::AUTHORIZATION], "Bearer g1");
    let exchange = std::str::from_utf8(log[3].body()).unwrap();
    assert!(exchange.contains("code=abc"));
}

#[tokio::test(flavor = "multi_thread")]
async fn consent_rejection_stops_before_browser() {
    let http = MockClient::default();
    http.push(StatusCode::OK, r#"{"access_token":"g1","expires_in":3600}"#)
        .await;
    http.push(StatusCode::BAD_REQUEST, r#"{"Code":"400 BadRequest"}"#)
        .await;

    let err = authenticator(MockTransport(http.clone()), 38592)
        .authenticate()
        .await
        .unwrap_err();
    assert_eq!(err.step(), PipelineStep::AccessConsent);
    assert_eq!(err.request_error().status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(http.log.lock().await.len(), 2);
}
