use serde::Serialize;
use smol_str::SmolStr;
use url::Url;

use crate::jose::Claims;
use crate::signer::{SignError, Signer, SigningAlgorithm};

/// Identity of the registering software, bundled with the signer used for
/// its registration assertion.
#[derive(Debug)]
pub struct SoftwareStatement<S> {
    id: SmolStr,
    name: SmolStr,
    redirect_url: Url,
    signer: S,
}

impl<S: Signer> SoftwareStatement<S> {
    pub fn new(
        id: impl Into<SmolStr>,
        name: impl Into<SmolStr>,
        redirect_url: Url,
        signer: S,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            redirect_url,
            signer,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }
}

impl<S: Signer> Signer for SoftwareStatement<S> {
    fn algorithm(&self) -> SigningAlgorithm {
        self.signer.algorithm()
    }

    fn key_id(&self) -> Option<&str> {
        self.signer.key_id()
    }

    fn sign<P: Serialize>(&self, claims: &Claims<P>) -> Result<SmolStr, SignError> {
        self.signer.sign(claims)
    }
}
