use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::BaseUrl;

use super::util::{base_request, fetch, AsyncHttpClient};

const OPENID_CONFIGURATION_PATH: &str = ".well-known/openid-configuration";
const CREDENTIAL_ISSUER_METADATA_PATH: &str = ".well-known/openid-credential-issuer";

/// The subset of the issuer's OpenID configuration used by the pre-authorized code flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdConfiguration {
    pub token_endpoint: Url,
}

/// The subset of the Credential Issuer Metadata used to request credentials.
///
/// See [OID4VCI Section 10.2](https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0-11.html#section-10.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerMetadata {
    pub credential_issuer: String,
    pub credential_endpoint: Url,
}

impl OpenIdConfiguration {
    /// `GET <issuer>/.well-known/openid-configuration`.
    pub async fn fetch<H: AsyncHttpClient + ?Sized>(
        issuer: &BaseUrl,
        http_client: &H,
    ) -> Result<Self> {
        fetch_json(
            issuer,
            OPENID_CONFIGURATION_PATH,
            "issuer's OpenID configuration endpoint",
            http_client,
        )
        .await
    }
}

impl IssuerMetadata {
    /// `GET <issuer>/.well-known/openid-credential-issuer`.
    pub async fn fetch<H: AsyncHttpClient + ?Sized>(
        issuer: &BaseUrl,
        http_client: &H,
    ) -> Result<Self> {
        fetch_json(
            issuer,
            CREDENTIAL_ISSUER_METADATA_PATH,
            "issuer's metadata endpoint",
            http_client,
        )
        .await
    }
}

async fn fetch_json<T, H>(
    issuer: &BaseUrl,
    path: &str,
    endpoint_name: &str,
    http_client: &H,
) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    H: AsyncHttpClient + ?Sized,
{
    let request = base_request()
        .method("GET")
        .uri(issuer.join(path)?.as_str())
        .body(vec![])
        .context(format!("failed to build request to the {endpoint_name}"))?;

    let body = fetch(http_client, request, endpoint_name).await?;

    serde_json::from_slice(&body)
        .context(format!("failed to unmarshal response from the {endpoint_name}"))
}
