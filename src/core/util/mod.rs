use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http::{header::ACCEPT, Request, Response, StatusCode};
use tracing::debug;

/// Generic HTTP client.
///
/// A trait is used here so to facilitate native HTTP/TLS when compiled for mobile applications.
#[async_trait]
pub trait AsyncHttpClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

pub(crate) fn base_request() -> http::request::Builder {
    Request::builder().header(ACCEPT, "application/json")
}

/// Execute `request` and return the response body, failing on anything other than `200 OK`.
///
/// The error carries the status code and the body so callers can surface them to the user.
pub(crate) async fn fetch<H: AsyncHttpClient + ?Sized>(
    http_client: &H,
    request: Request<Vec<u8>>,
    endpoint_name: &str,
) -> Result<Vec<u8>> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    debug!("{method} {uri} ({endpoint_name})");

    let response = http_client
        .execute(request)
        .await
        .context(format!("failed to make request to the {endpoint_name} at {uri}"))?;

    let status = response.status();
    let body = response.into_body();

    if status != StatusCode::OK {
        bail!(
            "received status code [{}] with body [{}] from the {endpoint_name}",
            status.as_u16(),
            String::from_utf8_lossy(&body)
        )
    }

    Ok(body)
}

#[derive(Debug)]
pub struct ReqwestClient(reqwest::Client);

impl AsRef<reqwest::Client> for ReqwestClient {
    fn as_ref(&self) -> &reqwest::Client {
        &self.0
    }
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .context("unable to build http_client")
            .map(Self)
    }
}

#[async_trait]
impl AsyncHttpClient for ReqwestClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let response = self
            .0
            .execute(request.try_into().context("unable to convert request")?)
            .await
            .context("http request failed")?;

        let mut builder = Response::builder()
            .status(response.status())
            .version(response.version());

        builder
            .headers_mut()
            .context("unable to set headers")?
            .extend(response.headers().clone());

        builder
            .body(
                response
                    .bytes()
                    .await
                    .context("failed to extract response body")?
                    .to_vec(),
            )
            .context("unable to construct response")
    }
}
