use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;
use url::Url;

use crate::error::Error;

use super::util::{base_request, fetch, AsyncHttpClient};

pub mod grant;

pub use grant::{PreAuthorizedCodeGrant, ValidatedOffer, PRE_AUTHORIZED_CODE_GRANT_TYPE};

const CREDENTIAL_OFFER: &str = "credential_offer";
const CREDENTIAL_OFFER_URI: &str = "credential_offer_uri";

/// A Credential Offer, as published by an issuer.
///
/// See [OID4VCI Section 4.1.1](https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0-11.html#section-4.1.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialOffer {
    pub credential_issuer: String,
    pub credentials: Vec<CredentialOfferObject>,
    /// Grant parameters keyed by grant type. Only the pre-authorized code grant is understood,
    /// so the values are kept untyped until [CredentialOffer::validate].
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub grants: BTreeMap<String, Json>,
}

/// An entry of the `credentials` array of a [CredentialOffer].
///
/// The format is kept as a plain string here so that an unsupported value can be reported with
/// its position in the offer.
// TODO: credential offers may also reference `credentials_supported` entries by id (plain JSON
// strings), which currently fail to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialOfferObject {
    pub format: String,
    pub types: Vec<String>,
}

/// The query parameters of an Initiate Issuance URI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitiateIssuanceRequest {
    #[serde(flatten)]
    pub offer_indirection: OfferIndirection,
}

/// A [CredentialOffer], passed by value or by reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OfferIndirection {
    /// The offer as URL-encoded JSON.
    #[serde(rename = "credential_offer")]
    ByValue(String),
    #[serde(rename = "credential_offer_uri")]
    ByReference(Url),
}

impl InitiateIssuanceRequest {
    /// Embed `offer` in the request as JSON.
    pub fn by_value(offer: &CredentialOffer) -> anyhow::Result<Self> {
        Ok(Self {
            offer_indirection: OfferIndirection::ByValue(
                serde_json::to_string(offer).context("unable to serialize credential offer")?,
            ),
        })
    }

    pub fn by_reference(credential_offer_uri: Url) -> Self {
        Self {
            offer_indirection: OfferIndirection::ByReference(credential_offer_uri),
        }
    }

    /// Encode as [Url], using `base` (e.g. `openid-credential-offer://`) for everything but the
    /// query.
    /// ```
    /// # use openid4ci::core::offer::{InitiateIssuanceRequest, OfferIndirection};
    /// # use url::Url;
    /// let base: Url = "openid-credential-offer://".parse().unwrap();
    /// let request = InitiateIssuanceRequest::by_reference(
    ///     "https://issuer.example/offers/1".parse().unwrap(),
    /// );
    ///
    /// let url = request.to_url(base).unwrap();
    ///
    /// assert_eq!(
    ///     url.as_str(),
    ///     "openid-credential-offer://?credential_offer_uri=https%3A%2F%2Fissuer.example%2Foffers%2F1"
    /// );
    /// ```
    pub fn to_url(&self, mut base: Url) -> anyhow::Result<Url> {
        let query = serde_urlencoded::to_string(self)?;
        base.set_query(Some(&query));
        Ok(base)
    }

    /// Parse the query parameters of an Initiate Issuance URI.
    ///
    /// Exactly one of `credential_offer` and `credential_offer_uri` must be present.
    /// ```
    /// # use openid4ci::core::offer::{InitiateIssuanceRequest, OfferIndirection};
    /// let request = InitiateIssuanceRequest::from_url(
    ///     "openid-credential-offer://?credential_offer=%7B%7D",
    /// )
    /// .unwrap();
    ///
    /// let OfferIndirection::ByValue(json) = request.offer_indirection else {
    ///     panic!("expected offer-by-value")
    /// };
    /// assert_eq!(json, "{}");
    /// ```
    pub fn from_url(initiate_issuance_uri: &str) -> Result<Self, Error> {
        let url = Url::parse(initiate_issuance_uri)
            .context("unable to parse initiate issuance URI")
            .map_err(Error::InvalidIssuanceUri)?;

        let mut by_value = None;
        let mut by_reference = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                CREDENTIAL_OFFER => by_value = Some(value.into_owned()),
                CREDENTIAL_OFFER_URI => by_reference = Some(value.into_owned()),
                _ => {}
            }
        }

        let offer_indirection = match (by_value, by_reference) {
            (None, None) => {
                return Err(Error::InvalidIssuanceUri(anyhow!(
                    "credential offer query parameter missing from initiate issuance URI"
                )))
            }
            (Some(_), Some(_)) => {
                return Err(Error::InvalidIssuanceUri(anyhow!(
                    "'{CREDENTIAL_OFFER}' and '{CREDENTIAL_OFFER_URI}' are mutually exclusive"
                )))
            }
            (Some(json), None) => OfferIndirection::ByValue(json),
            (None, Some(uri)) => OfferIndirection::ByReference(
                Url::parse(&uri)
                    .context(format!("'{CREDENTIAL_OFFER_URI}' is not a valid URL"))
                    .map_err(Error::InvalidIssuanceUri)?,
            ),
        };

        Ok(Self { offer_indirection })
    }

    /// Produce the [CredentialOffer], dereferencing `credential_offer_uri` if needed.
    pub async fn resolve<H: AsyncHttpClient + ?Sized>(
        self,
        http_client: &H,
    ) -> Result<CredentialOffer, Error> {
        let offer_json = match self.offer_indirection {
            OfferIndirection::ByValue(json) => json.into_bytes(),
            OfferIndirection::ByReference(url) => {
                debug!("fetching credential offer by reference from {url}");
                let request = base_request()
                    .method("GET")
                    .uri(url.as_str())
                    .body(vec![])
                    .context("failed to build credential offer request")
                    .map_err(Error::InvalidCredentialOffer)?;

                fetch(
                    http_client,
                    request,
                    "endpoint specified in the credential_offer_uri URL query parameter",
                )
                .await
                .context(
                    "failed to get credential offer from the endpoint specified in the \
                     credential_offer_uri URL query parameter",
                )
                .map_err(Error::InvalidCredentialOffer)?
            }
        };

        serde_json::from_slice(&offer_json)
            .context("failed to unmarshal credential offer JSON into a credential offer object")
            .map_err(Error::InvalidCredentialOffer)
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;
    use async_trait::async_trait;
    use http::{Request, Response};
    use serde_json::json;

    use super::*;

    struct OfferServer {
        status: u16,
        body: Vec<u8>,
        calls: AtomicUsize,
    }

    impl OfferServer {
        fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
            Self {
                status,
                body: body.into(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AsyncHttpClient for OfferServer {
        async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.uri(), "https://issuer.example/offers/1");
            Ok(Response::builder()
                .status(self.status)
                .body(self.body.clone())?)
        }
    }

    fn offer() -> CredentialOffer {
        serde_json::from_value(json!({
            "credential_issuer": "https://issuer.example",
            "credentials": [
                {
                    "format": "jwt_vc_json",
                    "types": ["VerifiableCredential", "UniversityDegreeCredential"]
                }
            ],
            "grants": {
                "urn:ietf:params:oauth:grant-type:pre-authorized_code": {
                    "pre-authorized_code": "abc",
                    "user_pin_required": false
                }
            }
        }))
        .unwrap()
    }

    fn base() -> Url {
        "openid-credential-offer://".parse().unwrap()
    }

    #[tokio::test]
    async fn inline_and_by_reference_are_equivalent() {
        let offer = offer();

        let inline = InitiateIssuanceRequest::by_value(&offer)
            .unwrap()
            .to_url(base())
            .unwrap();
        let server = OfferServer::new(200, serde_json::to_vec(&offer).unwrap());
        let inline = InitiateIssuanceRequest::from_url(inline.as_str())
            .unwrap()
            .resolve(&server)
            .await
            .unwrap();
        assert_eq!(server.calls.load(Ordering::SeqCst), 0);

        let by_reference = InitiateIssuanceRequest::by_reference(
            "https://issuer.example/offers/1".parse().unwrap(),
        )
        .to_url(base())
        .unwrap();
        let by_reference = InitiateIssuanceRequest::from_url(by_reference.as_str())
            .unwrap()
            .resolve(&server)
            .await
            .unwrap();
        assert_eq!(server.calls.load(Ordering::SeqCst), 1);

        assert_eq!(inline, by_reference);
        assert_eq!(inline, offer);
    }

    #[test]
    fn missing_offer_parameter() {
        let err =
            InitiateIssuanceRequest::from_url("openid-credential-offer://?foo=bar").unwrap_err();
        assert!(matches!(err, Error::InvalidIssuanceUri(_)), "{err}");
    }

    #[test]
    fn unparsable_uri() {
        let err = InitiateIssuanceRequest::from_url("not a uri").unwrap_err();
        assert!(matches!(err, Error::InvalidIssuanceUri(_)), "{err}");
    }

    #[test]
    fn both_offer_parameters() {
        let err = InitiateIssuanceRequest::from_url(
            "openid-credential-offer://?credential_offer=%7B%7D&credential_offer_uri=https%3A%2F%2Fissuer.example",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidIssuanceUri(_)), "{err}");
    }

    #[tokio::test]
    async fn malformed_inline_json() {
        let server = OfferServer::new(200, "");
        let err =
            InitiateIssuanceRequest::from_url("openid-credential-offer://?credential_offer=%7Bnope")
                .unwrap()
                .resolve(&server)
                .await
                .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentialOffer(_)), "{err}");
    }

    #[tokio::test]
    async fn by_reference_non_ok() {
        let server = OfferServer::new(404, "no such offer");
        let err = InitiateIssuanceRequest::by_reference(
            "https://issuer.example/offers/1".parse().unwrap(),
        )
        .resolve(&server)
        .await
        .unwrap_err();
        let Error::InvalidCredentialOffer(cause) = &err else {
            panic!("unexpected error: {err}")
        };
        let cause = format!("{cause:#}");
        assert!(cause.contains("[404]"), "{cause}");
        assert!(cause.contains("no such offer"), "{cause}");
    }
}
