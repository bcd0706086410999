//! PSU access consent: fetch the authorization URL, send the user to it and
//! capture the redirected authorization code.

use std::future::Future;

use http::{Method, Request, header};
use smol_str::SmolStr;
use url::Url;

use crate::loopback::{CallbackConfig, CallbackListener};
use crate::request::{ObRequest, RequestError, Result, ob_request};
use crate::transport::Transport;
use crate::types::{AccessConsent, AuthorizationUrlQuery, Client, Code};

pub const AUTHORIZATION_SCOPE: &str = "openid accounts";

#[trait_variant::make(Send)]
pub trait PsuAccessConsenter {
    fn request(&self, consent: AccessConsent) -> impl Future<Output = Result<Code>>;
}

/// Something that can show a URL to the user.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Opens URLs in the platform's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    #[cfg(feature = "browser-open")]
    fn open(&self, url: &str) -> std::io::Result<()> {
        webbrowser::open(url)
    }

    #[cfg(not(feature = "browser-open"))]
    fn open(&self, url: &str) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("built without browser support, open {url} manually"),
        ))
    }
}

impl<B: BrowserOpener + ?Sized> BrowserOpener for std::sync::Arc<B> {
    fn open(&self, url: &str) -> std::io::Result<()> {
        self.as_ref().open(url)
    }
}

#[derive(Debug)]
pub struct PsuAccessConsent<T, B = SystemBrowser> {
    transport: T,
    consent_endpoint: SmolStr,
    client: Client,
    callback: CallbackConfig,
    browser: B,
}

impl<T: Transport + Sync> PsuAccessConsent<T, SystemBrowser> {
    pub fn new(transport: T, consent_endpoint: impl Into<SmolStr>, client: Client) -> Self {
        Self {
            transport,
            consent_endpoint: consent_endpoint.into(),
            client,
            callback: CallbackConfig::default(),
            browser: SystemBrowser,
        }
    }
}

impl<T: Transport + Sync, B: BrowserOpener> PsuAccessConsent<T, B> {
    pub fn with_callback(mut self, callback: CallbackConfig) -> Self {
        self.callback = callback;
        self
    }

    pub fn with_browser<B2: BrowserOpener>(self, browser: B2) -> PsuAccessConsent<T, B2> {
        PsuAccessConsent {
            transport: self.transport,
            consent_endpoint: self.consent_endpoint,
            client: self.client,
            callback: self.callback,
            browser,
        }
    }

    pub fn callback(&self) -> &CallbackConfig {
        &self.callback
    }

    async fn authorization_url(&self, consent: &AccessConsent) -> Result<Url> {
        let http = self.transport.client().await?;
        let query = serde_html_form::to_string(AuthorizationUrlQuery {
            scope: AUTHORIZATION_SCOPE,
        })?;
        let req = Request::builder()
            .method(Method::GET)
            .uri(format!(
                "{}/auth-code-url/{}?{query}",
                self.consent_endpoint.trim_end_matches('/'),
                consent.consent_id
            ))
            .header(header::AUTHORIZATION, self.client.auth_header())
            .body(Vec::new())?;
        let res = ob_request(http, ObRequest::AuthorizationUrl, req).await?;
        let body = String::from_utf8_lossy(res.body());
        Url::parse(body.trim()).map_err(|e| {
            RequestError::authorization_url(e).with_details(SmolStr::new(body.trim()))
        })
    }

    async fn capture_code(&self, consent: AccessConsent) -> Result<Code> {
        let url = self.authorization_url(&consent).await?;

        // bound before the browser opens so the redirect cannot be missed
        let mut listener = CallbackListener::bind(&self.callback)?;

        #[cfg(feature = "tracing")]
        tracing::info!(callback = %listener.local_addr(), "opening browser for consent");

        if let Err(e) = self.browser.open(url.as_str()) {
            listener.close().await;
            return Err(RequestError::browser(e));
        }
        let code = listener.wait(self.callback.timeout).await?;
        listener.finish(self.callback.grace);
        Ok(code)
    }
}

impl<T: Transport + Sync, B: BrowserOpener> PsuAccessConsenter for PsuAccessConsent<T, B> {
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(consent_id = %consent.consent_id)))]
    async fn request(&self, consent: AccessConsent) -> Result<Code> {
        self.capture_code(consent)
            .await
            .map_err(|e| e.with_context(ObRequest::AuthorizationUrl.name()))
    }
}
