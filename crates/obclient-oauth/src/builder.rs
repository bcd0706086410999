//! Builders that validate configuration and wire the protocol steps
//! together over one shared [`SecureTransport`].
//!
//! Every required value is checked before anything touches the network.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use smol_str::SmolStr;
use url::Url;

use crate::authenticator::Authenticator;
use crate::consent::AccessConsentRequest;
use crate::discovery::get_configuration;
use crate::error::{BuildError, Result};
use crate::exchange::TokenExchange;
use crate::grant::CredentialsGrant;
use crate::http_client::HttpClient;
use crate::keys::{KeyLoadPolicy, PemKeyPair};
use crate::loopback::CallbackConfig;
use crate::psu::{BrowserOpener, PsuAccessConsent, SystemBrowser};
use crate::registration::ClientRegistration;
use crate::signer::{ClaimSigner, SigningAlgorithm};
use crate::software_statement::SoftwareStatement;
use crate::transport::{DEFAULT_REQUEST_TIMEOUT, SecureTransport, TransportError};
use crate::types::{Client, Configuration};

pub type SharedTransport = Arc<SecureTransport>;

pub type OpenBankingAuthenticator<B = SystemBrowser> = Authenticator<
    CredentialsGrant<SharedTransport>,
    AccessConsentRequest<SharedTransport>,
    PsuAccessConsent<SharedTransport, B>,
    TokenExchange<SharedTransport>,
>;

pub type OpenBankingRegistration = ClientRegistration<ClaimSigner<PemKeyPair>, SharedTransport>;

fn required<'a>(value: &'a Option<SmolStr>, field: &'static str) -> Result<&'a SmolStr> {
    value
        .as_ref()
        .filter(|v| !v.is_empty())
        .ok_or(BuildError::MissingField(field))
}

fn required_path<'a>(value: &'a Option<PathBuf>, field: &'static str) -> Result<&'a PathBuf> {
    value
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(BuildError::MissingField(field))
}

/// Plain client for the unauthenticated discovery request.
fn discovery_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| BuildError::Transport(TransportError::Build(e)))
}

/// Fetch the discovery document at `well_known` over a plain TLS client.
pub async fn fetch_configuration(well_known: &str) -> Result<Configuration> {
    if well_known.is_empty() {
        return Err(BuildError::MissingField("wellKnownEndpoint"));
    }
    let http = discovery_client()?;
    Ok(get_configuration(&http, well_known).await?)
}

/// mTLS settings shared by both builders.
#[derive(Debug, Clone, Default)]
struct TransportSettings {
    cert_file: Option<PathBuf>,
    key_file: Option<PathBuf>,
    root_cas: Vec<PathBuf>,
    timeout: Option<Duration>,
}

impl TransportSettings {
    fn validate(&self) -> Result<()> {
        required_path(&self.cert_file, "certFile")?;
        required_path(&self.key_file, "keyFile")?;
        if self.root_cas.is_empty() {
            return Err(BuildError::MissingField("rootCAs"));
        }
        Ok(())
    }

    fn transport(&self) -> Result<SharedTransport> {
        let transport = SecureTransport::new(
            required_path(&self.cert_file, "certFile")?,
            required_path(&self.key_file, "keyFile")?,
            self.root_cas.iter().cloned(),
        );
        Ok(Arc::new(match self.timeout {
            Some(timeout) => transport.with_timeout(timeout),
            None => transport,
        }))
    }
}

/// Assembles an [`OpenBankingAuthenticator`].
#[derive(Debug, Clone, Default)]
pub struct AuthenticatorBuilder<B = SystemBrowser> {
    client: Option<Client>,
    fapi_financial_id: Option<SmolStr>,
    access_consent_endpoint: Option<SmolStr>,
    well_known_endpoint: Option<SmolStr>,
    redirect_url: Option<SmolStr>,
    transport: TransportSettings,
    callback: Option<CallbackConfig>,
    browser: B,
}

impl AuthenticatorBuilder<SystemBrowser> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: BrowserOpener> AuthenticatorBuilder<B> {
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_fapi_financial_id(mut self, id: impl Into<SmolStr>) -> Self {
        self.fapi_financial_id = Some(id.into());
        self
    }

    pub fn with_access_consent_endpoint(mut self, endpoint: impl Into<SmolStr>) -> Self {
        self.access_consent_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_well_known(mut self, endpoint: impl Into<SmolStr>) -> Self {
        self.well_known_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_redirect_url(mut self, url: impl Into<SmolStr>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    pub fn with_cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.transport.cert_file = Some(path.into());
        self
    }

    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.transport.key_file = Some(path.into());
        self
    }

    pub fn with_root_cas<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.transport.root_cas = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = Some(timeout);
        self
    }

    /// Listener settings for the PSU redirect. Defaults to the redirect
    /// URL's port when it points at this machine.
    pub fn with_callback(mut self, callback: CallbackConfig) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_browser<B2: BrowserOpener>(self, browser: B2) -> AuthenticatorBuilder<B2> {
        AuthenticatorBuilder {
            client: self.client,
            fapi_financial_id: self.fapi_financial_id,
            access_consent_endpoint: self.access_consent_endpoint,
            well_known_endpoint: self.well_known_endpoint,
            redirect_url: self.redirect_url,
            transport: self.transport,
            callback: self.callback,
            browser,
        }
    }

    /// Check every required value, in a fixed order.
    pub fn validate(&self) -> Result<()> {
        if !self.client.as_ref().is_some_and(Client::is_complete) {
            return Err(BuildError::MissingField("client"));
        }
        required(&self.fapi_financial_id, "fapiFinancialId")?;
        required(&self.access_consent_endpoint, "accessConsentEndpoint")?;
        required(&self.well_known_endpoint, "wellKnownEndpoint")?;
        Url::parse(required(&self.redirect_url, "redirectUrl")?)?;
        self.transport.validate()
    }

    /// Validate, fetch the discovery document and build.
    pub async fn build(self) -> Result<OpenBankingAuthenticator<B>> {
        self.validate()?;
        let http = discovery_client()?;
        self.build_with_discovery(&http).await
    }

    /// Like [`build`](Self::build), fetching discovery through `http`.
    pub async fn build_with_discovery<C>(self, http: &C) -> Result<OpenBankingAuthenticator<B>>
    where
        C: HttpClient + Sync,
    {
        self.validate()?;
        let well_known = required(&self.well_known_endpoint, "wellKnownEndpoint")?;
        let configuration = get_configuration(http, well_known).await?;
        self.build_with_configuration(&configuration)
    }

    /// Build against an already fetched discovery document.
    pub fn build_with_configuration(
        self,
        configuration: &Configuration,
    ) -> Result<OpenBankingAuthenticator<B>> {
        self.validate()?;
        let client = self
            .client
            .clone()
            .ok_or(BuildError::MissingField("client"))?;
        let fapi_financial_id = required(&self.fapi_financial_id, "fapiFinancialId")?.clone();
        let consent_endpoint =
            required(&self.access_consent_endpoint, "accessConsentEndpoint")?.clone();
        let redirect = required(&self.redirect_url, "redirectUrl")?.clone();
        let callback = match self.callback {
            Some(callback) => callback,
            None => CallbackConfig::for_redirect_url(&Url::parse(&redirect)?),
        };
        let transport = self.transport.transport()?;

        Ok(Authenticator::new(
            CredentialsGrant::new(
                transport.clone(),
                configuration.token_endpoint.clone(),
                client.clone(),
            ),
            AccessConsentRequest::new(transport.clone(), consent_endpoint.clone(), fapi_financial_id),
            PsuAccessConsent::new(transport.clone(), consent_endpoint, client.clone())
                .with_callback(callback)
                .with_browser(self.browser),
            TokenExchange::new(
                transport,
                configuration.token_endpoint.clone(),
                redirect,
                client,
            ),
        ))
    }
}

/// Assembles an [`OpenBankingRegistration`].
#[derive(Debug, Clone)]
pub struct ClientRegisterBuilder {
    well_known_endpoint: Option<SmolStr>,
    sig_public_key_file: Option<PathBuf>,
    sig_private_key_file: Option<PathBuf>,
    software_statement_id: Option<SmolStr>,
    software_statement_name: Option<SmolStr>,
    redirect_url: Option<SmolStr>,
    transport: TransportSettings,
    signing_algorithm: SigningAlgorithm,
    signing_key_id: Option<SmolStr>,
    key_policy: KeyLoadPolicy,
}

impl Default for ClientRegisterBuilder {
    fn default() -> Self {
        Self {
            well_known_endpoint: None,
            sig_public_key_file: None,
            sig_private_key_file: None,
            software_statement_id: None,
            software_statement_name: None,
            redirect_url: None,
            transport: TransportSettings::default(),
            signing_algorithm: crate::DEFAULT_SIGNING_ALG,
            signing_key_id: None,
            key_policy: KeyLoadPolicy::default(),
        }
    }
}

impl ClientRegisterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_well_known(mut self, endpoint: impl Into<SmolStr>) -> Self {
        self.well_known_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_sig_public_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sig_public_key_file = Some(path.into());
        self
    }

    pub fn with_sig_private_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sig_private_key_file = Some(path.into());
        self
    }

    pub fn with_software_statement_id(mut self, id: impl Into<SmolStr>) -> Self {
        self.software_statement_id = Some(id.into());
        self
    }

    pub fn with_software_statement_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.software_statement_name = Some(name.into());
        self
    }

    pub fn with_redirect_url(mut self, url: impl Into<SmolStr>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    pub fn with_cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.transport.cert_file = Some(path.into());
        self
    }

    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.transport.key_file = Some(path.into());
        self
    }

    pub fn with_root_cas<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.transport.root_cas = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = Some(timeout);
        self
    }

    pub fn with_signing_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.signing_algorithm = algorithm;
        self
    }

    pub fn with_signing_key_id(mut self, key_id: impl Into<SmolStr>) -> Self {
        self.signing_key_id = Some(key_id.into());
        self
    }

    pub fn with_key_policy(mut self, policy: KeyLoadPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        required(&self.well_known_endpoint, "wellKnownEndpoint")?;
        required_path(&self.sig_public_key_file, "sigPublicKeyFile")?;
        required_path(&self.sig_private_key_file, "sigPrivateKeyFile")?;
        required(&self.software_statement_id, "softwareStatementID")?;
        required(&self.software_statement_name, "softwareStatementName")?;
        Url::parse(required(&self.redirect_url, "redirectUrl")?)?;
        self.transport.validate()
    }

    /// The software statement this builder would register.
    pub fn software_statement(&self) -> Result<SoftwareStatement<ClaimSigner<PemKeyPair>>> {
        let keys = PemKeyPair::new(
            required_path(&self.sig_public_key_file, "sigPublicKeyFile")?,
            required_path(&self.sig_private_key_file, "sigPrivateKeyFile")?,
        )
        .with_policy(self.key_policy);
        let signer = ClaimSigner::new(keys, self.signing_algorithm);
        let signer = match &self.signing_key_id {
            Some(kid) => signer.with_key_id(kid.clone()),
            None => signer,
        };
        Ok(SoftwareStatement::new(
            required(&self.software_statement_id, "softwareStatementID")?.clone(),
            required(&self.software_statement_name, "softwareStatementName")?.clone(),
            Url::parse(required(&self.redirect_url, "redirectUrl")?)?,
            signer,
        ))
    }

    pub async fn build(self) -> Result<OpenBankingRegistration> {
        self.validate()?;
        let http = discovery_client()?;
        self.build_with_discovery(&http).await
    }

    pub async fn build_with_discovery<C>(self, http: &C) -> Result<OpenBankingRegistration>
    where
        C: HttpClient + Sync,
    {
        self.validate()?;
        let well_known = required(&self.well_known_endpoint, "wellKnownEndpoint")?;
        let configuration = get_configuration(http, well_known).await?;
        self.build_with_configuration(&configuration)
    }

    pub fn build_with_configuration(
        self,
        configuration: &Configuration,
    ) -> Result<OpenBankingRegistration> {
        self.validate()?;
        Ok(ClientRegistration::new(
            configuration,
            self.software_statement()?,
            self.transport.transport()?,
        ))
    }
}
