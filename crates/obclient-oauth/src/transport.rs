//! Mutually authenticated TLS transport.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;

use crate::http_client::HttpClient;

/// Overall timeout applied to every call made through a [`SecureTransport`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors raised while building the TLS client.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TransportError {
    #[error("error reading {what} {}", path.display())]
    #[diagnostic(code(obclient_oauth::transport::read))]
    Read {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error appending cert {}", path.display())]
    #[diagnostic(
        code(obclient_oauth::transport::trust_root),
        help("trust roots must be PEM encoded X.509 certificates")
    )]
    TrustRoot {
        path: PathBuf,
        #[source]
        source: Option<reqwest::Error>,
    },
    #[error("error loading certFile and keyFile")]
    #[diagnostic(
        code(obclient_oauth::transport::identity),
        help("the client certificate and its private key must both be PEM encoded")
    )]
    Identity(#[source] reqwest::Error),
    #[error("error building http client")]
    #[diagnostic(code(obclient_oauth::transport::build))]
    Build(#[source] reqwest::Error),
}

/// Source of the HTTP client used for ASPSP calls.
#[trait_variant::make(Send)]
pub trait Transport {
    type Client: HttpClient + Sync;

    /// The client to send requests with. Implementations may build it lazily
    /// but hand out the same instance on every call.
    fn client(&self) -> impl Future<Output = Result<&Self::Client, TransportError>>;
}

impl<T: Transport + Send + Sync> Transport for Arc<T> {
    type Client = T::Client;

    fn client(&self) -> impl Future<Output = Result<&Self::Client, TransportError>> + Send {
        self.as_ref().client()
    }
}

/// HTTP client bound to a client certificate and a private set of trust
/// roots. Built on first use and cached for the lifetime of the transport.
#[derive(Debug)]
pub struct SecureTransport {
    cert_file: PathBuf,
    key_file: PathBuf,
    trust_roots: Vec<PathBuf>,
    timeout: Duration,
    client: OnceCell<reqwest::Client>,
}

impl SecureTransport {
    pub fn new<I, P>(cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>, trust_roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            cert_file: cert_file.into(),
            key_file: key_file.into(),
            trust_roots: trust_roots.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            client: OnceCell::new(),
        }
    }

    /// Override the overall request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_client(&self) -> Result<reqwest::Client, TransportError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .timeout(self.timeout);

        for root in &self.trust_roots {
            let pem = read_file(root, "cert")?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                TransportError::TrustRoot {
                    path: root.clone(),
                    source: Some(e),
                }
            })?;
            if certs.is_empty() {
                return Err(TransportError::TrustRoot {
                    path: root.clone(),
                    source: None,
                });
            }
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        let mut identity = read_file(&self.cert_file, "certFile")?;
        identity.push(b'\n');
        identity.extend(read_file(&self.key_file, "keyFile")?);
        let identity = reqwest::Identity::from_pem(&identity).map_err(TransportError::Identity)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            cert = %self.cert_file.display(),
            trust_roots = self.trust_roots.len(),
            "secure transport built"
        );

        builder
            .identity(identity)
            .build()
            .map_err(TransportError::Build)
    }
}

impl Transport for SecureTransport {
    type Client = reqwest::Client;

    async fn client(&self) -> Result<&reqwest::Client, TransportError> {
        self.client
            .get_or_try_init(|| async { self.build_client() })
            .await
    }
}

fn read_file(path: &Path, what: &'static str) -> Result<Vec<u8>, TransportError> {
    std::fs::read(path).map_err(|source| TransportError::Read {
        what,
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    fn transport() -> SecureTransport {
        SecureTransport::new(
            fixture("client.pem"),
            fixture("client_key.pem"),
            [fixture("ca.pem")],
        )
    }

    #[tokio::test]
    async fn client_is_built_once() {
        let transport = transport();
        let first = transport.client().await.unwrap() as *const reqwest::Client;
        let second = transport.client().await.unwrap() as *const reqwest::Client;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn shared_transport_hands_out_same_client() {
        let transport = Arc::new(transport());
        let other = transport.clone();
        let a = transport.client().await.unwrap() as *const reqwest::Client;
        let b = other.client().await.unwrap() as *const reqwest::Client;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn missing_trust_root_is_a_read_error() {
        let transport = SecureTransport::new(
            fixture("client.pem"),
            fixture("client_key.pem"),
            [fixture("does-not-exist.pem")],
        );
        let err = transport.client().await.unwrap_err();
        assert!(matches!(err, TransportError::Read { what: "cert", .. }));
    }

    #[tokio::test]
    async fn garbage_trust_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.pem");
        std::fs::write(&bogus, b"definitely not a certificate").unwrap();
        let transport =
            SecureTransport::new(fixture("client.pem"), fixture("client_key.pem"), [bogus]);
        let err = transport.client().await.unwrap_err();
        assert!(matches!(err, TransportError::TrustRoot { .. }));
    }

    #[tokio::test]
    async fn missing_key_file_is_a_read_error() {
        let transport = SecureTransport::new(
            fixture("client.pem"),
            fixture("missing_key.pem"),
            [fixture("ca.pem")],
        );
        let err = transport.client().await.unwrap_err();
        assert!(matches!(err, TransportError::Read { what: "keyFile", .. }));
    }

    #[tokio::test]
    async fn failed_build_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root.pem");
        let transport = SecureTransport::new(
            fixture("client.pem"),
            fixture("client_key.pem"),
            [root.clone()],
        );
        assert!(transport.client().await.is_err());

        std::fs::copy(fixture("ca.pem"), &root).unwrap();
        assert!(transport.client().await.is_ok());
    }
}
