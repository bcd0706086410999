use http::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use smol_str::SmolStr;

use crate::{http_client::HttpClient, signer::SignError, transport::TransportError};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error from one of the network steps: registration, grant, consent,
/// PSU redirect or token exchange.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("error {}: {kind}", .context.as_deref().unwrap_or("sending request"))]
pub struct RequestError {
    #[diagnostic_source]
    kind: RequestErrorKind,
    #[source]
    source: Option<BoxError>,
    #[help]
    help: Option<SmolStr>,
    context: Option<SmolStr>,
    url: Option<SmolStr>,
    details: Option<SmolStr>,
}

/// Error categories for request operations
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum RequestErrorKind {
    /// Secure transport could not be set up
    #[error("transport setup failed")]
    #[diagnostic(
        code(obclient_oauth::request::transport),
        help("check the certificate, key and trust root files")
    )]
    Transport,

    /// HTTP request could not be built
    #[error("http build error")]
    #[diagnostic(code(obclient_oauth::request::http_build))]
    HttpBuild,

    /// Connection, TLS or timeout failure
    #[error("network error")]
    #[diagnostic(
        code(obclient_oauth::request::network),
        help("the ASPSP could not be reached; check connectivity and client certificates")
    )]
    Network,

    /// Unexpected HTTP status
    #[error("unexpected status code {status}: {body}")]
    #[diagnostic(
        code(obclient_oauth::request::http_status),
        help("see server response for details")
    )]
    HttpStatus { status: StatusCode, body: SmolStr },

    /// Response body could not be decoded
    #[error("json error")]
    #[diagnostic(code(obclient_oauth::request::serde_json))]
    SerdeJson,

    /// Form serialization error
    #[error("form serialization error")]
    #[diagnostic(code(obclient_oauth::request::serde_form))]
    SerdeHtmlForm,

    /// Claim signing failed
    #[error("signing error")]
    #[diagnostic(code(obclient_oauth::request::signing))]
    Signing,

    /// The authorization URL returned by the ASPSP is unusable
    #[error("invalid authorization url")]
    #[diagnostic(code(obclient_oauth::request::authorization_url))]
    AuthorizationUrl,

    /// System browser could not be started
    #[error("error initiating browser for user consent flow")]
    #[diagnostic(
        code(obclient_oauth::request::browser),
        help("open the authorization url manually or configure a default browser")
    )]
    Browser,

    /// Local callback listener could not be started
    #[error("callback listener error")]
    #[diagnostic(
        code(obclient_oauth::request::listener),
        help("another process may already be bound to the callback port")
    )]
    Listener,

    /// PSU did not complete consent in time
    #[error("timed out waiting for the consent redirect")]
    #[diagnostic(
        code(obclient_oauth::request::callback_timeout),
        help("raise the consent timeout or complete the browser flow sooner")
    )]
    CallbackTimeout,

    /// Callback listener went away before delivering a code
    #[error("callback listener closed without an authorization code")]
    #[diagnostic(code(obclient_oauth::request::callback_closed))]
    CallbackClosed,
}

impl RequestError {
    /// Create a new error with the given kind and optional source
    pub fn new(kind: RequestErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            help: None,
            context: None,
            url: None,
            details: None,
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> &RequestErrorKind {
        &self.kind
    }

    /// Get the source error if present
    pub fn source_err(&self) -> Option<&BoxError> {
        self.source.as_ref()
    }

    /// Get the context string if present
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Get the URL if present
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Get the details if present
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// HTTP status, when the server answered with an unexpected one
    pub fn status(&self) -> Option<StatusCode> {
        match &self.kind {
            RequestErrorKind::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Add help text to this error
    pub fn with_help(mut self, help: impl Into<SmolStr>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add context to this error, keeping any context already set
    pub fn with_context(mut self, context: impl Into<SmolStr>) -> Self {
        if self.context.is_none() {
            self.context = Some(context.into());
        }
        self
    }

    /// Add URL to this error
    pub fn with_url(mut self, url: impl Into<SmolStr>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Add details to this error
    pub fn with_details(mut self, details: impl Into<SmolStr>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Create a network error
    pub fn network(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(RequestErrorKind::Network, Some(Box::new(source)))
    }

    /// Create an HTTP status error, keeping the response body for diagnostics
    pub fn http_status(status: StatusCode, body: &[u8]) -> Self {
        let body = if body.is_empty() {
            SmolStr::new_static("<empty body>")
        } else {
            SmolStr::new(String::from_utf8_lossy(body))
        };
        Self::new(RequestErrorKind::HttpStatus { status, body }, None)
    }

    /// Create an invalid authorization url error
    pub fn authorization_url(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(RequestErrorKind::AuthorizationUrl, Some(Box::new(source)))
    }

    /// Create a browser error
    pub fn browser(source: std::io::Error) -> Self {
        Self::new(RequestErrorKind::Browser, Some(Box::new(source)))
    }

    /// Create a listener error
    pub fn listener(source: BoxError) -> Self {
        Self::new(RequestErrorKind::Listener, Some(source))
    }

    /// Create a callback timeout error
    pub fn callback_timeout() -> Self {
        Self::new(RequestErrorKind::CallbackTimeout, None)
    }

    /// Create a callback closed error
    pub fn callback_closed() -> Self {
        Self::new(RequestErrorKind::CallbackClosed, None)
    }
}

impl From<TransportError> for RequestError {
    fn from(e: TransportError) -> Self {
        let msg = smol_str::format_smolstr!("{}", e);
        Self::new(RequestErrorKind::Transport, Some(Box::new(e))).with_details(msg)
    }
}

impl From<http::Error> for RequestError {
    fn from(e: http::Error) -> Self {
        let msg = smol_str::format_smolstr!("{:?}", e);
        Self::new(RequestErrorKind::HttpBuild, Some(Box::new(e)))
            .with_details(msg)
            .with_help("verify endpoint URLs and header values are valid")
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(e: serde_json::Error) -> Self {
        let msg = smol_str::format_smolstr!("{}", e);
        Self::new(RequestErrorKind::SerdeJson, Some(Box::new(e)))
            .with_details(msg)
            .with_help("verify the response body is the expected JSON document")
    }
}

impl From<serde_html_form::ser::Error> for RequestError {
    fn from(e: serde_html_form::ser::Error) -> Self {
        let msg = smol_str::format_smolstr!("{:?}", e);
        Self::new(RequestErrorKind::SerdeHtmlForm, Some(Box::new(e))).with_details(msg)
    }
}

impl From<SignError> for RequestError {
    fn from(e: SignError) -> Self {
        let msg = smol_str::format_smolstr!("{}", e);
        Self::new(RequestErrorKind::Signing, Some(Box::new(e)))
            .with_details(msg)
            .with_help("check the signing key files and the claim set")
    }
}

pub type Result<T> = core::result::Result<T, RequestError>;

/// The outbound calls this client makes, with the status each must answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObRequest {
    Registration,
    CredentialsGrant,
    AccessConsent,
    AuthorizationUrl,
    TokenExchange,
    Accounts,
}

impl ObRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registration => "registering client",
            Self::CredentialsGrant => "getting credentials grant",
            Self::AccessConsent => "getting access consent",
            Self::AuthorizationUrl => "starting user access consent flow",
            Self::TokenExchange => "getting access token",
            Self::Accounts => "listing accounts",
        }
    }

    pub fn accepts(&self, status: StatusCode) -> bool {
        match self {
            Self::Registration => status == StatusCode::OK || status == StatusCode::CREATED,
            Self::AccessConsent => status == StatusCode::CREATED,
            Self::CredentialsGrant
            | Self::AuthorizationUrl
            | Self::TokenExchange
            | Self::Accounts => status == StatusCode::OK,
        }
    }
}

/// Send `req` and check the status against what `request` must answer.
///
/// The body of a rejected response is kept on the error.
pub async fn ob_request<C>(
    client: &C,
    request: ObRequest,
    req: Request<Vec<u8>>,
) -> Result<Response<Vec<u8>>>
where
    C: HttpClient + Sync,
{
    let url = req.uri().to_string();
    let res = client
        .send_http(req)
        .await
        .map_err(|e| RequestError::network(e).with_url(url.clone()))?;
    if request.accepts(res.status()) {
        Ok(res)
    } else {
        #[cfg(feature = "tracing")]
        tracing::warn!(status = %res.status(), url = %url, "{} rejected", request.name());
        Err(RequestError::http_status(res.status(), res.body()).with_url(url))
    }
}

pub const FAPI_FINANCIAL_ID: &str = "x-fapi-financial-id";
pub const FAPI_INTERACTION_ID: &str = "x-fapi-interaction-id";

/// Add the Open Banking FAPI headers, with a fresh interaction id.
pub fn with_fapi_headers(builder: http::request::Builder, financial_id: &str) -> http::request::Builder {
    builder
        .header(FAPI_FINANCIAL_ID, financial_id)
        .header(FAPI_INTERACTION_ID, uuid::Uuid::new_v4().to_string())
}

/// Decode a JSON response body.
pub fn decode_json<O: DeserializeOwned>(res: &Response<Vec<u8>>) -> Result<O> {
    Ok(serde_json::from_slice(res.body())?)
}
