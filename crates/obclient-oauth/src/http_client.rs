//! The seam every ASPSP call goes through: a raw `http` request in, a fully
//! buffered response out.

use std::future::Future;
use std::sync::Arc;

/// Request with a buffered body.
pub type HttpRequest = http::Request<Vec<u8>>;
/// Response with a buffered body.
pub type HttpResponse = http::Response<Vec<u8>>;

#[trait_variant::make(Send)]
pub trait HttpClient {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send `request` and read the whole response body.
    fn send_http(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = core::result::Result<HttpResponse, Self::Error>>;
}

fn to_reqwest(client: &reqwest::Client, request: HttpRequest) -> reqwest::RequestBuilder {
    let (parts, body) = request.into_parts();
    client
        .request(parts.method, parts.uri.to_string())
        .headers(parts.headers)
        .body(body)
}

impl HttpClient for reqwest::Client {
    type Error = reqwest::Error;

    async fn send_http(&self, request: HttpRequest) -> core::result::Result<HttpResponse, Self::Error> {
        let res = to_reqwest(self, request).send().await?;
        let status = res.status();
        let headers = res.headers().clone();
        let body = res.bytes().await?.to_vec();

        let mut response = HttpResponse::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

impl<T: HttpClient + Sync> HttpClient for Arc<T> {
    type Error = T::Error;

    fn send_http(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = core::result::Result<HttpResponse, Self::Error>> + Send {
        self.as_ref().send_http(request)
    }
}
