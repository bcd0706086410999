//! Account access consent creation.

use std::future::Future;

use chrono::Utc;
use http::{Method, Request, header};
use smol_str::SmolStr;

use crate::request::{ObRequest, Result, decode_json, ob_request, with_fapi_headers};
use crate::transport::Transport;
use crate::types::{AccessConsent, AccessConsentRequestBody, AccessConsentResponse, GrantToken};

#[trait_variant::make(Send)]
pub trait AccessConsenter {
    fn request(&self, grant: GrantToken) -> impl Future<Output = Result<AccessConsent>>;
}

/// Creates an accounts-read consent at `{endpoint}/account-access-consents`.
#[derive(Debug)]
pub struct AccessConsentRequest<T> {
    transport: T,
    endpoint: SmolStr,
    fapi_financial_id: SmolStr,
}

impl<T: Transport + Sync> AccessConsentRequest<T> {
    pub fn new(
        transport: T,
        endpoint: impl Into<SmolStr>,
        fapi_financial_id: impl Into<SmolStr>,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            fapi_financial_id: fapi_financial_id.into(),
        }
    }

    fn consents_url(&self) -> String {
        format!(
            "{}/account-access-consents",
            self.endpoint.trim_end_matches('/')
        )
    }

    async fn send_consent(&self, grant: GrantToken) -> Result<AccessConsent> {
        let http = self.transport.client().await?;
        let body = serde_json::to_vec(&AccessConsentRequestBody::accounts_read(Utc::now()))?;
        let req = with_fapi_headers(Request::builder(), &self.fapi_financial_id)
            .method(Method::POST)
            .uri(self.consents_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", grant.access_token))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(body)?;
        let res = ob_request(http, ObRequest::AccessConsent, req).await?;
        let consent: AccessConsentResponse = decode_json(&res)?;
        Ok(consent.into())
    }
}

impl<T: Transport + Sync> AccessConsenter for AccessConsentRequest<T> {
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(endpoint = %self.endpoint)))]
    async fn request(&self, grant: GrantToken) -> Result<AccessConsent> {
        self.send_consent(grant)
            .await
            .map_err(|e| e.with_context(ObRequest::AccessConsent.name()))
    }
}
