//! The consent pipeline: credentials grant, access consent, PSU consent and
//! token exchange, in that order.

use crate::consent::AccessConsenter;
use crate::exchange::TokenGenerator;
use crate::grant::CredentialsGranter;
use crate::psu::PsuAccessConsenter;
use crate::request::RequestError;
use crate::types::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    CredentialsGrant,
    AccessConsent,
    PsuAccessConsent,
    TokenExchange,
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PipelineStep::CredentialsGrant => "credentials grant",
            PipelineStep::AccessConsent => "access consent",
            PipelineStep::PsuAccessConsent => "psu access consent",
            PipelineStep::TokenExchange => "token exchange",
        })
    }
}

/// A pipeline step failed; nothing after it ran.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("error authenticating: {step} failed")]
#[diagnostic(code(obclient_oauth::authenticate))]
pub struct AuthenticateError {
    step: PipelineStep,
    #[source]
    #[diagnostic_source]
    source: RequestError,
}

impl AuthenticateError {
    pub fn step(&self) -> PipelineStep {
        self.step
    }

    pub fn request_error(&self) -> &RequestError {
        &self.source
    }

    pub fn into_request_error(self) -> RequestError {
        self.source
    }
}

fn at(step: PipelineStep) -> impl FnOnce(RequestError) -> AuthenticateError {
    move |source| AuthenticateError { step, source }
}

pub struct Authenticator<G, A, P, T> {
    granter: G,
    consenter: A,
    psu: P,
    tokens: T,
}

impl<G, A, P, T> Authenticator<G, A, P, T>
where
    G: CredentialsGranter + Sync,
    A: AccessConsenter + Sync,
    P: PsuAccessConsenter + Sync,
    T: TokenGenerator + Sync,
{
    pub fn new(granter: G, consenter: A, psu: P, tokens: T) -> Self {
        Self {
            granter,
            consenter,
            psu,
            tokens,
        }
    }

    /// Run the pipeline once. The first failing step aborts it.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip_all))]
    pub async fn authenticate(&self) -> Result<Token, AuthenticateError> {
        let grant = self
            .granter
            .request()
            .await
            .map_err(at(PipelineStep::CredentialsGrant))?;
        let consent = self
            .consenter
            .request(grant)
            .await
            .map_err(at(PipelineStep::AccessConsent))?;

        #[cfg(feature = "tracing")]
        tracing::info!(consent_id = %consent.consent_id, "access consent created");

        let code = self
            .psu
            .request(consent)
            .await
            .map_err(at(PipelineStep::PsuAccessConsent))?;
        self.tokens
            .request(code)
            .await
            .map_err(at(PipelineStep::TokenExchange))
    }
}

impl<G, A, P, T> std::fmt::Debug for Authenticator<G, A, P, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}
