//! The `config.json` file the CLI reads its settings from.

use std::path::{Path, PathBuf};
use std::time::Duration;

use obclient_oauth::loopback::{CallbackConfig, CallbackPort};
use obclient_oauth::{AuthenticatorBuilder, Client, ClientRegisterBuilder, SigningAlgorithm};
use serde::Deserialize;
use smol_str::SmolStr;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ConfigError {
    #[error("error reading config file {}", path.display())]
    #[diagnostic(
        code(obclient::config::read),
        help("run from the folder holding config.json or pass --config")
    )]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error parsing config file {}", path.display())]
    #[diagnostic(code(obclient::config::parse))]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    #[diagnostic(transparent)]
    SigningAlgorithm(#[from] obclient_oauth::signer::SignError),
}

/// Settings for every command. Keys are camelCase in the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Well-known OpenID configuration URL of the ASPSP.
    pub openid_configuration: SmolStr,
    /// Base URL of the consent and accounts API.
    pub endpoints: SmolStr,
    pub fapi_financial_id: SmolStr,
    pub redirect_url: SmolStr,
    pub cer_file: PathBuf,
    pub key_file: PathBuf,
    #[serde(rename = "rootCAs")]
    pub root_cas: Vec<PathBuf>,
    pub sig_public_key_file: PathBuf,
    pub sig_private_key_file: PathBuf,
    #[serde(rename = "softwareStatementID")]
    pub software_statement_id: SmolStr,
    pub software_statement_name: SmolStr,
    pub storage_folder: PathBuf,
    pub signing_algorithm: Option<SmolStr>,
    pub signing_key_id: Option<SmolStr>,
    pub callback_port: Option<u16>,
    pub consent_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn signing_algorithm(&self) -> Result<SigningAlgorithm, ConfigError> {
        match &self.signing_algorithm {
            Some(name) => Ok(name.parse()?),
            None => Ok(obclient_oauth::DEFAULT_SIGNING_ALG),
        }
    }

    /// Listener settings derived from the redirect URL, with any explicit
    /// port or timeout from the file applied on top.
    pub fn callback(&self) -> CallbackConfig {
        let mut callback = url::Url::parse(&self.redirect_url)
            .map(|url| CallbackConfig::for_redirect_url(&url))
            .unwrap_or_default();
        if let Some(port) = self.callback_port {
            callback.port = CallbackPort::Fixed(port);
        }
        if let Some(secs) = self.consent_timeout_secs {
            callback.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        callback
    }

    pub fn client_register_builder(&self) -> Result<ClientRegisterBuilder, ConfigError> {
        let builder = ClientRegisterBuilder::new()
            .with_well_known(self.openid_configuration.clone())
            .with_sig_public_key_file(&self.sig_public_key_file)
            .with_sig_private_key_file(&self.sig_private_key_file)
            .with_cert_file(&self.cer_file)
            .with_key_file(&self.key_file)
            .with_root_cas(self.root_cas.iter())
            .with_redirect_url(self.redirect_url.clone())
            .with_software_statement_id(self.software_statement_id.clone())
            .with_software_statement_name(self.software_statement_name.clone())
            .with_signing_algorithm(self.signing_algorithm()?);
        Ok(match &self.signing_key_id {
            Some(kid) => builder.with_signing_key_id(kid.clone()),
            None => builder,
        })
    }

    pub fn authenticator_builder(&self, client: Client) -> AuthenticatorBuilder {
        AuthenticatorBuilder::new()
            .with_client(client)
            .with_fapi_financial_id(self.fapi_financial_id.clone())
            .with_access_consent_endpoint(self.endpoints.clone())
            .with_well_known(self.openid_configuration.clone())
            .with_redirect_url(self.redirect_url.clone())
            .with_cert_file(&self.cer_file)
            .with_key_file(&self.key_file)
            .with_root_cas(self.root_cas.iter())
            .with_callback(self.callback())
    }

    pub fn secure_transport(&self) -> obclient_oauth::SecureTransport {
        obclient_oauth::SecureTransport::new(&self.cer_file, &self.key_file, self.root_cas.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obclient_oauth::BuildError;

    const SAMPLE: &str = r#"{
        "openidConfiguration": "https://aspsp.example/.well-known/openid-configuration",
        "endpoints": "https://aspsp.example/open-banking/v3.1/aisp",
        "fapiFinancialId": "0015800001041REAAY",
        "redirectUrl": "http://localhost:9090/callback",
        "cerFile": "certs/transport.pem",
        "keyFile": "certs/transport.key",
        "rootCAs": ["certs/root.pem", "certs/issuing.pem"],
        "sigPublicKeyFile": "certs/signing.pub",
        "sigPrivateKeyFile": "certs/signing.key",
        "softwareStatementID": "ss-1",
        "softwareStatementName": "tpp app",
        "storageFolder": "data"
    }"#;

    #[test]
    fn reads_camel_case_keys() {
        let config = Config::from_json(SAMPLE).unwrap();
        assert_eq!(config.fapi_financial_id, "0015800001041REAAY");
        assert_eq!(config.root_cas.len(), 2);
        assert_eq!(config.software_statement_id, "ss-1");
        assert_eq!(config.storage_folder, PathBuf::from("data"));
        assert_eq!(config.signing_algorithm().unwrap(), SigningAlgorithm::Rs256);
    }

    #[test]
    fn callback_overrides() {
        let mut config = Config::from_json(SAMPLE).unwrap();
        assert_eq!(config.callback().port, CallbackPort::Fixed(9090));

        config.callback_port = Some(7000);
        config.consent_timeout_secs = Some(0);
        let callback = config.callback();
        assert_eq!(callback.port, CallbackPort::Fixed(7000));
        assert_eq!(callback.timeout, None);
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let mut config = Config::from_json(SAMPLE).unwrap();
        config.signing_algorithm = Some("HS256".into());
        assert!(matches!(
            config.client_register_builder(),
            Err(ConfigError::SigningAlgorithm(_))
        ));
        config.signing_algorithm = Some("ps256".into());
        assert!(config.client_register_builder().is_ok());
    }

    #[test]
    fn empty_file_fails_validation_in_order() {
        let config = Config::from_json("{}").unwrap();
        let err = config.client_register_builder().unwrap().validate().unwrap_err();
        assert!(matches!(err, BuildError::MissingField("wellKnownEndpoint")));

        let err = config
            .authenticator_builder(Client::new("c1", "s1"))
            .validate()
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingField("fapiFinancialId")));
    }

    #[test]
    fn missing_file_names_path() {
        let err = Config::load("/nonexistent/config.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/config.json"));
    }
}
