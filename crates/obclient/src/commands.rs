//! The `obclient` subcommands. Each writes its report to `out`; failures are
//! returned for the binary to render.

use std::io::Write;

use obclient_oauth::{
    AuthenticateError, BuildError, Client, ClientRegister, RequestError, Token,
    fetch_configuration,
};

use crate::accounts::{AccountLister, AccountsPrinter, AccountsRequest};
use crate::config::{Config, ConfigError};
use crate::probe::TransportProbe;
use crate::store::{FileStore, StoreError};

pub const BANNER: &str = "Open Banking CLI v0.0.1";

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CommandError {
    #[error("Client already registered, delete first to recreate")]
    #[diagnostic(
        code(obclient::already_registered),
        help("remove client.json from the storage folder to register again")
    )]
    AlreadyRegistered,
    #[error("This software client is not registered yet, register first.")]
    #[diagnostic(code(obclient::not_registered), help("run `obclient register`"))]
    NotRegistered,
    #[error("Token does not exist, auth first to get a token")]
    #[diagnostic(code(obclient::no_token), help("run `obclient auth`"))]
    NoToken,
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(StoreError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Authenticate(#[from] AuthenticateError),
    #[error("error writing output")]
    #[diagnostic(code(obclient::io))]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, CommandError>;

fn stored_client(config: &Config) -> Result<Client> {
    FileStore::<Client>::new(&config.storage_folder)
        .get()
        .map_err(|e| match e {
            e if e.is_not_found() => CommandError::NotRegistered,
            e => CommandError::Store(e),
        })
}

fn stored_token(config: &Config) -> Result<Token> {
    FileStore::<Token>::new(&config.storage_folder)
        .get()
        .map_err(|e| match e {
            e if e.is_not_found() => CommandError::NoToken,
            e => CommandError::Store(e),
        })
}

/// Register a new software client unless one is already stored.
pub async fn register<W: Write>(config: &Config, out: &mut W) -> Result<Client> {
    let store = FileStore::<Client>::new(&config.storage_folder);
    match store.get() {
        Ok(_) => return Err(CommandError::AlreadyRegistered),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(CommandError::Store(e)),
    }

    let registration = config.client_register_builder()?.build().await?;
    let client = registration.register().await?;
    store.store(&client).map_err(CommandError::Store)?;
    writeln!(out, "Client registered id: {}", client.id)?;
    Ok(client)
}

pub fn client<W: Write>(config: &Config, out: &mut W) -> Result<()> {
    let client = stored_client(config)?;
    writeln!(out, "Client details")?;
    writeln!(out, "Client Id: {}", client.id)?;
    Ok(())
}

pub fn statement<W: Write>(config: &Config, out: &mut W) -> Result<()> {
    let statement = config.client_register_builder()?.software_statement()?;
    writeln!(out, "Software Statement")?;
    writeln!(out, "Id: {}", statement.id())?;
    writeln!(out, "Name: {}", statement.name())?;
    Ok(())
}

pub async fn configuration<W: Write>(config: &Config, out: &mut W) -> Result<()> {
    let discovered = fetch_configuration(&config.openid_configuration).await?;
    writeln!(out, "OpenId Configuration")?;
    writeln!(out, "TokenEndpoint: {}", discovered.token_endpoint)?;
    writeln!(
        out,
        "AuthorizationEndpoint: {}",
        discovered.authorization_endpoint.as_deref().unwrap_or("")
    )?;
    writeln!(out, "RegistrationEndpoint: {}", discovered.registration_endpoint)?;
    writeln!(out, "Issuer: {}", discovered.issuer)?;
    Ok(())
}

pub async fn transport<W: Write>(config: &Config, out: &mut W) -> Result<()> {
    let discovered = fetch_configuration(&config.openid_configuration).await?;
    writeln!(out, "Test certificates details")?;
    let probe = TransportProbe::new(config.secure_transport(), discovered.token_endpoint);
    let status = probe.test().await?;
    tracing::debug!(%status, "token endpoint answered");
    writeln!(out, "OK")?;
    Ok(())
}

/// Run the consent pipeline for the stored client and keep the token.
pub async fn auth<W: Write>(config: &Config, out: &mut W) -> Result<Token> {
    writeln!(out, "Authorize")?;
    let client = stored_client(config)?;
    let authenticator = config.authenticator_builder(client).build().await?;
    let token = authenticator.authenticate().await?;
    FileStore::<Token>::new(&config.storage_folder)
        .store(&token)
        .map_err(CommandError::Store)?;
    writeln!(out, "Got valid token")?;
    Ok(token)
}

pub fn token<W: Write>(config: &Config, out: &mut W) -> Result<()> {
    let token = stored_token(config)?;
    writeln!(out, "Token details")?;
    writeln!(out, "Type: {}", token.token_type)?;
    match token.expires_in {
        Some(secs) => writeln!(out, "Expires: {secs}")?,
        None => writeln!(out, "Expires: unknown")?,
    }
    writeln!(out, "Scope: {}", token.scope.as_deref().unwrap_or(""))?;
    Ok(())
}

pub async fn accounts<W: Write>(config: &Config, out: &mut W) -> Result<()> {
    writeln!(out, "Accounts")?;
    let token = stored_token(config)?;
    let lister = AccountsRequest::new(
        config.secure_transport(),
        config.endpoints.clone(),
        config.fapi_financial_id.clone(),
        token,
    );
    let accounts = lister.list().await?;
    AccountsPrinter::new().print(out, &accounts)?;
    Ok(())
}
