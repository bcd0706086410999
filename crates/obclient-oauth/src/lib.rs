//! Open Banking OAuth core for obclient.
//!
//! Dynamic client registration, the client-credentials grant, account access
//! consent, the PSU browser redirect and the authorization-code exchange, all
//! over a mutually authenticated TLS transport. Persistence and the CLI live
//! in `obclient`.

pub mod authenticator;
pub mod builder;
pub mod consent;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod grant;
pub mod http_client;
pub mod jose;
pub mod keys;
pub mod loopback;
pub mod psu;
pub mod registration;
pub mod request;
pub mod signer;
pub mod software_statement;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_util;

pub use crate::authenticator::{AuthenticateError, Authenticator, PipelineStep};
pub use crate::builder::{
    AuthenticatorBuilder, ClientRegisterBuilder, OpenBankingAuthenticator, OpenBankingRegistration,
    fetch_configuration,
};
pub use crate::error::BuildError;
pub use crate::registration::ClientRegister;
pub use crate::request::{RequestError, RequestErrorKind};
pub use crate::signer::SigningAlgorithm;
pub use crate::transport::{SecureTransport, Transport};
pub use crate::types::{AccessConsent, Client, Code, Configuration, GrantToken, Token};

/// Algorithm used for the registration assertion unless configured otherwise.
pub const DEFAULT_SIGNING_ALG: SigningAlgorithm = SigningAlgorithm::Rs256;
