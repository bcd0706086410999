//! Local HTTP listener that captures the authorization code from the PSU
//! redirect.
//!
//! Every consent attempt binds its own [`CallbackListener`]; nothing is
//! registered globally. The listener delivers at most one [`Code`] and is
//! stopped when the guard is finished or dropped.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use rouille::{Request, Response, Server};
use tokio::sync::oneshot;

use crate::request::RequestError;
use crate::types::Code;

pub const DEFAULT_CALLBACK_PORT: u16 = 8081;
pub const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackPort {
    Fixed(u16),
    Ephemeral,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackConfig {
    pub host: String,
    pub port: CallbackPort,
    /// How long to wait for the PSU. `None` waits until a code arrives.
    pub timeout: Option<Duration>,
    /// Delay between answering the redirect and stopping the listener, so
    /// the confirmation page reaches the browser.
    pub grace: Duration,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: CallbackPort::Fixed(DEFAULT_CALLBACK_PORT),
            timeout: Some(DEFAULT_CONSENT_TIMEOUT),
            grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl CallbackConfig {
    /// Default settings, listening on the host and port of a loopback
    /// redirect URL.
    pub fn for_redirect_url(redirect_url: &url::Url) -> Self {
        let host = match redirect_url.host() {
            Some(url::Host::Domain("localhost")) => Some("127.0.0.1".to_owned()),
            Some(url::Host::Ipv4(ip)) if ip.is_loopback() => Some(ip.to_string()),
            Some(url::Host::Ipv6(ip)) if ip.is_loopback() => Some(ip.to_string()),
            _ => None,
        };
        match (host, redirect_url.port_or_known_default()) {
            (Some(host), Some(port)) => Self {
                host,
                port: CallbackPort::Fixed(port),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, RequestError> {
        let port = match self.port {
            CallbackPort::Fixed(p) => p,
            CallbackPort::Ephemeral => 0,
        };
        (self.host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| RequestError::listener(Box::new(e)))?
            .next()
            .ok_or_else(|| {
                RequestError::listener(format!("no address for {}:{port}", self.host).into())
            })
    }
}

const AUTHENTICATED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Open Banking Access Consent</title></head>
<body style="text-align: center; color: #330066">
<h2>Authenticated!</h2>
<p>(Please close this window)</p>
</body>
</html>
"#;

const MISSING_CODE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Open Banking Access Consent</title></head>
<body style="text-align: center; color: #330066">
<h2>No authorization code in the redirect</h2>
</body>
</html>
"#;

const ALREADY_CAPTURED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Open Banking Access Consent</title></head>
<body style="text-align: center; color: #330066">
<h2>Consent already captured</h2>
<p>(Please close this window)</p>
</body>
</html>
"#;

/// Single-slot rendezvous between the listener and the waiting flow.
pub type CodeSlot = Mutex<Option<oneshot::Sender<Code>>>;

/// Handle one inbound redirect. Only the first request carrying a `code`
/// fills the slot; later ones get 409 and requests without a code get 400.
pub fn callback_response(request: &Request, slot: &CodeSlot) -> Response {
    if request.method() != "GET" {
        return Response::text("method not allowed").with_status_code(405);
    }
    let Some(code) = request.get_param("code").filter(|c| !c.is_empty()) else {
        return Response::html(MISSING_CODE_PAGE).with_status_code(400);
    };
    let sender = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    match sender {
        Some(tx) => {
            #[cfg(feature = "tracing")]
            tracing::info!("authorization code received");
            // the waiting side may have timed out already
            let _ = tx.send(Code::new(code));
            Response::html(AUTHENTICATED_PAGE)
        }
        None => Response::html(ALREADY_CAPTURED_PAGE).with_status_code(409),
    }
}

/// Scoped listener bound for one consent attempt. Dropping it stops the
/// server and releases the port.
pub struct CallbackListener {
    local_addr: SocketAddr,
    code_rx: Option<oneshot::Receiver<Code>>,
    server_stop: Option<std::sync::mpsc::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for CallbackListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackListener")
            .field("local_addr", &self.local_addr)
            .field("running", &self.server_stop.is_some())
            .finish()
    }
}

impl CallbackListener {
    pub fn bind(config: &CallbackConfig) -> Result<Self, RequestError> {
        let addr = config.bind_addr()?;
        let (tx, code_rx) = oneshot::channel();
        let slot: Arc<CodeSlot> = Arc::new(Mutex::new(Some(tx)));
        let server = Server::new(addr, move |request| callback_response(request, &slot))
            .map_err(|e| RequestError::listener(e).with_details(addr.to_string()))?;
        let local_addr = server.server_addr();
        let (server_handle, server_stop) = server.stoppable();

        #[cfg(feature = "tracing")]
        tracing::debug!(%local_addr, "callback listener started");

        Ok(Self {
            local_addr,
            code_rx: Some(code_rx),
            server_stop: Some(server_stop),
            server_handle: Some(server_handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the redirect. On timeout the listener is stopped before the
    /// error is returned.
    pub async fn wait(&mut self, timeout: Option<Duration>) -> Result<Code, RequestError> {
        let rx = self
            .code_rx
            .take()
            .ok_or_else(RequestError::callback_closed)?;
        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(?limit, "gave up waiting for the consent redirect");
                    self.stop().await;
                    return Err(RequestError::callback_timeout());
                }
            },
            None => rx.await,
        };
        received.map_err(|_| RequestError::callback_closed())
    }

    /// Stop the listener after `grace` without blocking the caller.
    pub fn finish(mut self, grace: Duration) {
        let stop = self.server_stop.take();
        let handle = self.server_handle.take();
        std::thread::spawn(move || {
            std::thread::sleep(grace);
            shutdown(stop, handle);
        });
    }

    /// Stop the listener now. The port is free once this returns.
    pub async fn close(mut self) {
        self.stop().await;
    }

    /// Joins the server thread on the blocking pool; rouille only checks
    /// for the stop signal once a second.
    async fn stop(&mut self) {
        let stop = self.server_stop.take();
        let handle = self.server_handle.take();
        if stop.is_none() && handle.is_none() {
            return;
        }
        let _ = tokio::task::spawn_blocking(move || shutdown(stop, handle)).await;
    }
}

impl Drop for CallbackListener {
    /// Signals the server and joins it off the caller's thread.
    fn drop(&mut self) {
        let stop = self.server_stop.take();
        let handle = self.server_handle.take();
        if stop.is_none() && handle.is_none() {
            return;
        }
        std::thread::spawn(move || shutdown(stop, handle));
    }
}

fn shutdown(stop: Option<std::sync::mpsc::Sender<()>>, handle: Option<JoinHandle<()>>) {
    if let Some(stop) = stop {
        let _ = stop.send(());
    }
    if let Some(handle) = handle {
        let _ = handle.join();
    }
    #[cfg(feature = "tracing")]
    tracing::debug!("callback listener stopped");
}
