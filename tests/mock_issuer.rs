use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http::{Method, Request, Response};
use openid4ci::{
    activity::MemoryActivityLogger,
    config::ClientConfig,
    core::{
        credential::KeyResolver,
        offer::{CredentialOffer, InitiateIssuanceRequest},
        proof::{sign_jwt, P256Signer},
        util::AsyncHttpClient,
    },
    interaction::{Created, Interaction},
    Error,
};
use serde_json::{json, Value as Json};
use ssi::jwk::JWK;
use url::Url;

pub const ISSUER: &str = "https://issuer.example";
pub const ISSUER_KID: &str = "did:example:issuer#key-1";
pub const HOLDER_KID: &str = "did:example:holder#key-1";
pub const CLIENT_ID: &str = "wallet-client";
pub const OFFER_URI: &str = "https://issuer.example/offers/1";

pub fn offer(credentials: Json, user_pin_required: bool) -> CredentialOffer {
    serde_json::from_value(json!({
        "credential_issuer": ISSUER,
        "credentials": credentials,
        "grants": {
            "urn:ietf:params:oauth:grant-type:pre-authorized_code": {
                "pre-authorized_code": "abc",
                "user_pin_required": user_pin_required
            }
        }
    }))
    .unwrap()
}

pub fn degree_offer() -> CredentialOffer {
    offer(
        json!([{
            "format": "jwt_vc_json",
            "types": ["VerifiableCredential", "UniversityDegreeCredential"]
        }]),
        false,
    )
}

pub fn pin_offer() -> CredentialOffer {
    let mut offer = degree_offer();
    offer.grants.insert(
        "urn:ietf:params:oauth:grant-type:pre-authorized_code".to_owned(),
        json!({ "pre-authorized_code": "abc", "user_pin_required": true }),
    );
    offer
}

pub fn inline_uri(offer: &CredentialOffer) -> String {
    InitiateIssuanceRequest::by_value(offer)
        .unwrap()
        .to_url("openid-credential-offer://".parse().unwrap())
        .unwrap()
        .to_string()
}

pub fn by_reference_uri() -> String {
    InitiateIssuanceRequest::by_reference(OFFER_URI.parse().unwrap())
        .to_url("openid-credential-offer://".parse().unwrap())
        .unwrap()
        .to_string()
}

/// A request as seen by the [MockIssuer].
#[derive(Debug, Clone)]
pub struct Received {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

impl Received {
    pub fn json(&self) -> Json {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// An issuer serving every endpoint of the pre-authorized code flow.
#[derive(Debug)]
pub struct MockIssuer {
    pub signer: P256Signer,
    pub offer: Option<CredentialOffer>,
    pub openid_configuration_status: u16,
    pub token_status: u16,
    pub metadata_status: u16,
    /// Index of the credential request to answer with an error.
    pub fail_credential_at: Option<usize>,
    received: Mutex<Vec<Received>>,
}

impl MockIssuer {
    pub fn new() -> Self {
        Self {
            signer: P256Signer::generate(ISSUER_KID).unwrap(),
            offer: None,
            openid_configuration_status: 200,
            token_status: 200,
            metadata_status: 200,
            fail_credential_at: None,
            received: Mutex::default(),
        }
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_at(&self, path: &str) -> Vec<Received> {
        self.received()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn key_resolver(&self) -> StaticResolver {
        StaticResolver(BTreeMap::from([(
            ISSUER_KID.to_owned(),
            self.signer.jwk().clone(),
        )]))
    }

    async fn issue(&self, request: &Json) -> Result<Json> {
        let jwt = sign_jwt(
            &json!({ "alg": "ES256", "kid": ISSUER_KID, "typ": "JWT" }),
            &json!({
                "iss": "did:example:issuer",
                "sub": "did:example:holder",
                "vc": {
                    "@context": ["https://www.w3.org/2018/credentials/v1"],
                    "type": request["types"],
                    "issuer": "did:example:issuer",
                    "credentialSubject": { "name": "Alice" }
                }
            }),
            &self.signer,
        )
        .await?;
        Ok(json!({ "credential": jwt, "format": request["format"] }))
    }
}

fn respond(status: u16, body: Json) -> Result<Response<Vec<u8>>> {
    Response::builder()
        .status(status)
        .body(serde_json::to_vec(&body)?)
        .context("failed to build response")
}

#[async_trait]
impl AsyncHttpClient for MockIssuer {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let url: Url = request.uri().to_string().parse()?;
        if url.origin().ascii_serialization() != ISSUER {
            bail!("unexpected host {url}")
        }

        let received = Received {
            method: request.method().clone(),
            path: url.path().to_owned(),
            authorization: request
                .headers()
                .get(http::header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .map(ToOwned::to_owned),
            body: request.into_body(),
        };
        let credential_index = {
            let mut all = self.received.lock().unwrap();
            let index = all.iter().filter(|r| r.path == "/credential").count();
            all.push(received.clone());
            index
        };

        match (received.method.as_str(), received.path.as_str()) {
            ("GET", "/offers/1") => match &self.offer {
                Some(offer) => respond(200, serde_json::to_value(offer)?),
                None => respond(404, json!({ "error": "not_found" })),
            },
            ("GET", "/.well-known/openid-configuration") => respond(
                self.openid_configuration_status,
                json!({
                    "issuer": ISSUER,
                    "token_endpoint": format!("{ISSUER}/token")
                }),
            ),
            ("POST", "/token") => {
                if self.token_status != 200 {
                    return respond(self.token_status, json!({ "error": "invalid_grant" }));
                }
                respond(
                    200,
                    json!({
                        "access_token": "access-token-1",
                        "token_type": "bearer",
                        "expires_in": 300,
                        "c_nonce": "nonce-1",
                        "c_nonce_expires_in": 300
                    }),
                )
            }
            ("GET", "/.well-known/openid-credential-issuer") => respond(
                self.metadata_status,
                json!({
                    "credential_issuer": ISSUER,
                    "credential_endpoint": format!("{ISSUER}/credential")
                }),
            ),
            ("POST", "/credential") => {
                if self.fail_credential_at == Some(credential_index) {
                    return respond(500, json!({ "error": "server_error" }));
                }
                respond(200, self.issue(&received.json()).await?)
            }
            _ => respond(404, json!({ "error": "not_found" })),
        }
    }
}

#[derive(Debug, Default)]
pub struct StaticResolver(BTreeMap<String, JWK>);

#[async_trait]
impl KeyResolver for StaticResolver {
    async fn resolve_key(&self, key_id: &str) -> Result<JWK> {
        self.0.get(key_id).cloned().context("unknown key")
    }
}

pub async fn interaction(
    issuer: Arc<MockIssuer>,
    logger: MemoryActivityLogger,
    initiate_issuance_uri: &str,
) -> Result<Interaction<Created>, Error> {
    let key_resolver = Arc::new(issuer.key_resolver());
    Interaction::builder()
        .with_config(ClientConfig::new(CLIENT_ID))
        .with_http_client(issuer)
        .with_key_resolver(key_resolver)
        .with_activity_logger(Arc::new(logger))
        .build(initiate_issuance_uri)
        .await
}

pub fn holder() -> P256Signer {
    P256Signer::generate(HOLDER_KID).unwrap()
}
