use anyhow::{Context, Result};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;

use super::{
    credential_format::{CredentialFormat, OfferedCredential},
    util::{base_request, fetch, AsyncHttpClient},
};

/// A Credential Request.
///
/// See [OID4VCI Section 7.2](https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0-11.html#section-7.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRequest {
    pub types: Vec<String>,
    pub format: CredentialFormat,
    pub proof: Proof,
}

/// Proof of possession of the key the credential will be bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "proof_type")]
pub enum Proof {
    #[serde(rename = "jwt")]
    Jwt { jwt: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialResponse {
    /// The issued credential, serialized as a JWT.
    pub credential: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl CredentialRequest {
    pub fn new(offered: &OfferedCredential, proof_jwt: &str) -> Self {
        Self {
            types: offered.types.clone(),
            format: offered.format,
            proof: Proof::Jwt {
                jwt: proof_jwt.to_owned(),
            },
        }
    }

    /// POST the request to `credential_endpoint`.
    pub async fn send<H: AsyncHttpClient + ?Sized>(
        &self,
        credential_endpoint: &Url,
        access_token: &str,
        http_client: &H,
    ) -> Result<CredentialResponse> {
        let request = base_request()
            .method("POST")
            .uri(credential_endpoint.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("BEARER {access_token}"))
            .body(serde_json::to_vec(self).context("unable to encode credential request")?)
            .context("failed to build credential request")?;

        let body = fetch(http_client, request, "issuer's credential endpoint").await?;

        serde_json::from_slice(&body)
            .context("failed to unmarshal response from the issuer's credential endpoint")
    }
}

/// Request every offered credential in turn, all with the same proof and access token.
///
/// Any failure aborts the remaining requests; the successful responses are dropped.
pub async fn fetch_credentials<H: AsyncHttpClient + ?Sized>(
    offered: &[OfferedCredential],
    credential_endpoint: &Url,
    access_token: &str,
    proof_jwt: &str,
    http_client: &H,
) -> Result<Vec<CredentialResponse>, Error> {
    let mut responses = Vec::with_capacity(offered.len());

    for (index, credential) in offered.iter().enumerate() {
        debug!(
            "requesting credential {index} ({}, {:?})",
            credential.format, credential.types
        );
        let response = CredentialRequest::new(credential, proof_jwt)
            .send(credential_endpoint, access_token, http_client)
            .await
            .map_err(|cause| Error::CredentialFetchFailed { index, cause })?;
        responses.push(response);
    }

    Ok(responses)
}
