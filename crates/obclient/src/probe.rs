//! mTLS self-test: one call to the token endpoint proves the client
//! certificate, key and trust roots are accepted.

use http::{Method, Request, StatusCode};
use obclient_oauth::RequestError;
use obclient_oauth::http_client::HttpClient;
use obclient_oauth::request::Result;
use obclient_oauth::transport::Transport;
use smol_str::SmolStr;

const CONTEXT: &str = "testing transport";

#[derive(Debug)]
pub struct TransportProbe<T> {
    transport: T,
    token_endpoint: SmolStr,
}

impl<T: Transport + Sync> TransportProbe<T> {
    pub fn new(transport: T, token_endpoint: impl Into<SmolStr>) -> Self {
        Self {
            transport,
            token_endpoint: token_endpoint.into(),
        }
    }

    /// Any HTTP answer counts as success; only setup, TLS and connection
    /// failures are errors. Returns the status the endpoint answered with.
    #[tracing::instrument(level = "debug", skip_all, fields(endpoint = %self.token_endpoint))]
    pub async fn test(&self) -> Result<StatusCode> {
        self.send_probe().await.map_err(|e| e.with_context(CONTEXT))
    }

    async fn send_probe(&self) -> Result<StatusCode> {
        let http = self.transport.client().await?;
        let req = Request::builder()
            .method(Method::GET)
            .uri(self.token_endpoint.as_str())
            .body(Vec::new())?;
        let res = http
            .send_http(req)
            .await
            .map_err(|e| RequestError::network(e).with_url(self.token_endpoint.clone()))?;
        Ok(res.status())
    }
}

#[cfg(test)]
mod tests {
    use obclient_oauth::SecureTransport;
    use obclient_oauth::RequestErrorKind;
    use obclient_oauth::transport::TransportError;

    use super::*;

    struct Answering(StatusCode);

    impl HttpClient for Answering {
        type Error = std::convert::Infallible;

        async fn send_http(
            &self,
            _request: http::Request<Vec<u8>>,
        ) -> core::result::Result<http::Response<Vec<u8>>, Self::Error> {
            let mut res = http::Response::new(Vec::new());
            *res.status_mut() = self.0;
            Ok(res)
        }
    }

    impl Transport for Answering {
        type Client = Answering;

        async fn client(&self) -> core::result::Result<&Answering, TransportError> {
            Ok(self)
        }
    }

    #[tokio::test]
    async fn any_status_is_success() {
        for status in [StatusCode::OK, StatusCode::METHOD_NOT_ALLOWED, StatusCode::UNAUTHORIZED] {
            let probe = TransportProbe::new(Answering(status), "https://aspsp.example/token");
            assert_eq!(probe.test().await.unwrap(), status);
        }
    }

    #[tokio::test]
    async fn unreadable_certificates_fail_before_connecting() {
        let transport = SecureTransport::new(
            "/nonexistent/transport.pem",
            "/nonexistent/transport.key",
            ["/nonexistent/root.pem"],
        );
        let probe = TransportProbe::new(transport, "https://aspsp.example/token");
        let err = probe.test().await.unwrap_err();
        assert!(matches!(err.kind(), RequestErrorKind::Transport));
        assert_eq!(err.context(), Some(CONTEXT));
    }
}
