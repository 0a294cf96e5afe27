use anyhow::{Context, Result};
use http::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use url::Url;

use super::util::{base_request, fetch, AsyncHttpClient};

/// A Token Request, sent `application/x-www-form-urlencoded` to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "grant_type")]
pub enum TokenRequest {
    #[serde(rename = "urn:ietf:params:oauth:grant-type:pre-authorized_code")]
    PreAuthorizedCode {
        #[serde(rename = "pre-authorized_code")]
        pre_authorized_code: String,
        /// Sent empty when the issuer does not require a PIN.
        user_pin: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Nonce to be signed in the proof of possession, empty when the issuer sends none.
    #[serde(default)]
    pub c_nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_nonce_expires_in: Option<u64>,
}

impl TokenRequest {
    pub fn to_x_www_form_urlencoded(&self) -> Result<String> {
        serde_urlencoded::to_string(self).context("unable to encode token request")
    }

    /// POST the request to `token_endpoint`.
    pub async fn send<H: AsyncHttpClient + ?Sized>(
        &self,
        token_endpoint: &Url,
        http_client: &H,
    ) -> Result<TokenResponse> {
        let request = base_request()
            .method("POST")
            .uri(token_endpoint.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(self.to_x_www_form_urlencoded()?.into_bytes())
            .context("failed to build token request")?;

        let body = fetch(http_client, request, "issuer's token endpoint").await?;

        serde_json::from_slice(&body)
            .context("failed to unmarshal response from the issuer's token endpoint")
    }
}
