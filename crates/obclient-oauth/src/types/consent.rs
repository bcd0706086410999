use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Reference to an account access consent resource held by the ASPSP.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessConsent {
    pub consent_id: SmolStr,
}

/// Authorization code delivered by the PSU redirect.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Code {
    pub value: SmolStr,
}

impl Code {
    pub fn new(value: impl Into<SmolStr>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Read permissions requested for every account access consent.
pub const ACCOUNTS_READ_PERMISSIONS: [&str; 11] = [
    "ReadAccountsBasic",
    "ReadAccountsDetail",
    "ReadBalances",
    "ReadBeneficiariesBasic",
    "ReadBeneficiariesDetail",
    "ReadDirectDebits",
    "ReadProducts",
    "ReadStandingOrdersDetail",
    "ReadTransactionsCredits",
    "ReadTransactionsDebits",
    "ReadTransactionsDetail",
];

const OB_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+00:00";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessConsentRequestBody {
    #[serde(rename = "Data")]
    pub data: AccessConsentRequestData,
    #[serde(rename = "Risk")]
    pub risk: BTreeMap<String, String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AccessConsentRequestData {
    pub permissions: Vec<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date_time: Option<SmolStr>,
    pub transaction_from_date_time: SmolStr,
    pub transaction_to_date_time: SmolStr,
}

impl AccessConsentRequestBody {
    /// Every read permission over a transaction window of one year either
    /// side of `now`.
    pub fn accounts_read(now: DateTime<Utc>) -> Self {
        let one_year = TimeDelta::days(365);
        Self {
            data: AccessConsentRequestData {
                permissions: ACCOUNTS_READ_PERMISSIONS
                    .into_iter()
                    .map(SmolStr::new_static)
                    .collect(),
                expiration_date_time: None,
                transaction_from_date_time: format_ob_datetime(now - one_year),
                transaction_to_date_time: format_ob_datetime(now + one_year),
            },
            risk: BTreeMap::new(),
        }
    }
}

fn format_ob_datetime(at: DateTime<Utc>) -> SmolStr {
    SmolStr::new(at.format(OB_DATETIME_FORMAT).to_string())
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AccessConsentData {
    pub consent_id: SmolStr,
}

/// Consent creation response. ASPSPs wrap the payload in `Data`; a bare
/// `{"ConsentId": ...}` is accepted as well.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum AccessConsentResponse {
    Wrapped {
        #[serde(rename = "Data")]
        data: AccessConsentData,
    },
    Bare(AccessConsentData),
}

impl From<AccessConsentResponse> for AccessConsent {
    fn from(response: AccessConsentResponse) -> Self {
        let (AccessConsentResponse::Wrapped { data } | AccessConsentResponse::Bare(data)) =
            response;
        AccessConsent {
            consent_id: data.consent_id,
        }
    }
}
