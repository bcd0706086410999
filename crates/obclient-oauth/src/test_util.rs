use std::collections::VecDeque;
use std::sync::Arc;

use http::StatusCode;
use tokio::sync::Mutex;

use crate::http_client::HttpClient;
use crate::transport::{Transport, TransportError};
use crate::types::Client;

#[derive(Clone, Default)]
pub(crate) struct MockClient {
    queue: Arc<Mutex<VecDeque<http::Response<Vec<u8>>>>>,
    log: Arc<Mutex<Vec<http::Request<Vec<u8>>>>>,
}

impl MockClient {
    pub(crate) async fn push(&self, resp: http::Response<Vec<u8>>) {
        self.queue.lock().await.push_back(resp);
    }

    pub(crate) async fn push_json(&self, status: StatusCode, body: serde_json::Value) {
        self.push(response(status, serde_json::to_vec(&body).unwrap()))
            .await;
    }

    pub(crate) async fn requests(&self) -> Vec<http::Request<Vec<u8>>> {
        std::mem::take(&mut *self.log.lock().await)
    }
}

impl HttpClient for MockClient {
    type Error = std::convert::Infallible;
    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl core::future::Future<
        Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>,
    > + Send {
        let log = self.log.clone();
        let queue = self.queue.clone();
        async move {
            log.lock().await.push(request);
            Ok(queue.lock().await.pop_front().expect("no queued response"))
        }
    }
}

/// Transport handing out a [`MockClient`].
#[derive(Clone, Default)]
pub(crate) struct MockTransport(pub MockClient);

impl Transport for MockTransport {
    type Client = MockClient;

    async fn client(&self) -> Result<&MockClient, TransportError> {
        Ok(&self.0)
    }
}

pub(crate) fn response(status: StatusCode, body: impl Into<Vec<u8>>) -> http::Response<Vec<u8>> {
    http::Response::builder()
        .status(status)
        .body(body.into())
        .unwrap()
}

pub(crate) fn client() -> Client {
    Client::new("c1", "s1")
}
