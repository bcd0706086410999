//! Account information: list the PSU's accounts with the stored access token
//! and print them as a table.

use std::future::Future;
use std::io::{self, Write};

use http::{Method, Request, header};
use obclient_oauth::Token;
use obclient_oauth::request::{ObRequest, Result, decode_json, ob_request, with_fapi_headers};
use obclient_oauth::transport::Transport;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Account {
    pub account_id: SmolStr,
    #[serde(default)]
    pub currency: SmolStr,
    #[serde(default)]
    pub nickname: SmolStr,
    #[serde(default)]
    pub account_type: SmolStr,
    #[serde(default)]
    pub account_sub_type: SmolStr,
}

#[derive(Deserialize, Debug)]
struct AccountsResponse {
    #[serde(rename = "Data", alias = "data")]
    data: AccountsData,
}

#[derive(Deserialize, Debug)]
struct AccountsData {
    #[serde(rename = "Account", alias = "account", default)]
    account: Vec<Account>,
}

#[trait_variant::make(Send)]
pub trait AccountLister {
    fn list(&self) -> impl Future<Output = Result<Vec<Account>>>;
}

/// `GET {endpoint}/accounts` with the PSU's access token.
#[derive(Debug)]
pub struct AccountsRequest<T> {
    transport: T,
    endpoint: SmolStr,
    fapi_financial_id: SmolStr,
    token: Token,
}

impl<T: Transport + Sync> AccountsRequest<T> {
    pub fn new(
        transport: T,
        endpoint: impl Into<SmolStr>,
        fapi_financial_id: impl Into<SmolStr>,
        token: Token,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            fapi_financial_id: fapi_financial_id.into(),
            token,
        }
    }

    async fn send_list(&self) -> Result<Vec<Account>> {
        let http = self.transport.client().await?;
        let req = with_fapi_headers(Request::builder(), &self.fapi_financial_id)
            .method(Method::GET)
            .uri(format!("{}/accounts", self.endpoint.trim_end_matches('/')))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token.access_token),
            )
            .header(header::ACCEPT, "application/json")
            .body(Vec::new())?;
        let res = ob_request(http, ObRequest::Accounts, req).await?;
        let body: AccountsResponse = decode_json(&res)?;
        Ok(body.data.account)
    }
}

impl<T: Transport + Sync> AccountLister for AccountsRequest<T> {
    #[tracing::instrument(level = "debug", skip_all)]
    async fn list(&self) -> Result<Vec<Account>> {
        self.send_list()
            .await
            .map_err(|e| e.with_context(ObRequest::Accounts.name()))
    }
}

const HEADERS: [&str; 5] = ["Id", "Currency", "Nickname", "Type", "SubType"];

/// Right-aligned, `|`-separated account table.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccountsPrinter;

impl AccountsPrinter {
    pub fn new() -> Self {
        Self
    }

    pub fn print<W: Write>(&self, out: &mut W, accounts: &[Account]) -> io::Result<()> {
        let rows: Vec<[&str; 5]> = std::iter::once(HEADERS)
            .chain(accounts.iter().map(|a| {
                [
                    a.account_id.as_str(),
                    a.currency.as_str(),
                    a.nickname.as_str(),
                    a.account_type.as_str(),
                    a.account_sub_type.as_str(),
                ]
            }))
            .collect();

        // the last column is left ragged
        let mut widths = [0usize; 4];
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        for row in &rows {
            for (width, cell) in widths.iter().zip(row) {
                write!(out, "{cell:>w$}|", w = width + 1)?;
            }
            writeln!(out, "{}", row[4])?;
        }
        out.flush()
    }
}
