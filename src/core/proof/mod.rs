use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::prelude::*;
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use serde::{Deserialize, Serialize};
use serde_json::json;
use ssi::jwk::JWK;

use crate::error::Error;

/// JOSE `typ` of a proof of possession JWT.
pub const PROOF_JWT_TYPE: &str = "openid4vci-proof+jwt";

/// Signs proof of possession JWTs with a key held by the wallet.
#[async_trait]
pub trait ProofSigner {
    /// The algorithm that will be used to sign.
    fn alg(&self) -> &str;
    /// The key identifier, a DID URL such as `did:example:123#key-1`.
    fn key_id(&self) -> &str;
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

/// ES256 [ProofSigner] backed by an in-memory P-256 key.
#[derive(Debug)]
pub struct P256Signer {
    key: SigningKey,
    key_id: String,
    jwk: JWK,
}

impl P256Signer {
    pub fn new(key: SigningKey, key_id: impl Into<String>) -> Result<Self> {
        let pk: p256::PublicKey = key.verifying_key().into();
        let jwk = serde_json::from_str(&pk.to_jwk_string())?;
        Ok(Self {
            key,
            key_id: key_id.into(),
            jwk,
        })
    }

    /// Create a fresh key pair.
    pub fn generate(key_id: impl Into<String>) -> Result<Self> {
        Self::new(SigningKey::random(&mut rand::thread_rng()), key_id)
    }

    /// The public JWK of the signer.
    pub fn jwk(&self) -> &JWK {
        &self.jwk
    }
}

#[async_trait]
impl ProofSigner for P256Signer {
    fn alg(&self) -> &str {
        "ES256"
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let sig: Signature = self.key.sign(payload);
        Ok(sig.to_vec())
    }
}

/// Claims of the proof of possession JWT.
///
/// See [OID4VCI Section 7.2.1.1](https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0-11.html#section-7.2.1.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofClaims {
    /// The wallet's client id.
    pub iss: String,
    /// The credential issuer.
    pub aud: String,
    pub iat: u64,
    /// The `c_nonce` from the token response.
    pub nonce: String,
}

impl ProofClaims {
    pub fn new(client_id: &str, issuer_uri: &str, nonce: &str) -> Self {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|dur| dur.as_secs())
            .unwrap_or_default();
        Self {
            iss: client_id.to_owned(),
            aud: issuer_uri.to_owned(),
            iat,
            nonce: nonce.to_owned(),
        }
    }
}

/// Split `key_id` into its DID and fragment.
///
/// ```
/// # use openid4ci::core::proof::did_part;
/// assert_eq!(did_part("did:example:123#key-1"), Some("did:example:123"));
/// assert_eq!(did_part("key-1"), None);
/// ```
pub fn did_part(key_id: &str) -> Option<&str> {
    key_id.split_once('#').map(|(did, _fragment)| did)
}

/// Build and sign the proof of possession JWT.
///
/// The signer's key id must be a DID URL; this is checked before anything is signed.
pub async fn build_proof_jwt<S: ProofSigner + Send + Sync + ?Sized>(
    claims: &ProofClaims,
    signer: &S,
) -> Result<String, Error> {
    let key_id = signer.key_id();
    if did_part(key_id).is_none() {
        return Err(Error::KeyIdNotContainDidPart {
            key_id: key_id.to_owned(),
        });
    }

    let header = json!({
        "alg": signer.alg(),
        "kid": key_id,
        "typ": PROOF_JWT_TYPE,
    });

    sign_jwt(&header, claims, signer)
        .await
        .map_err(Error::JwtSigningFailed)
}

/// Produce a compact JWS over `claims`.
pub async fn sign_jwt<T, S>(header: &serde_json::Value, claims: &T, signer: &S) -> Result<String>
where
    T: Serialize + ?Sized,
    S: ProofSigner + Send + Sync + ?Sized,
{
    let header_b64: String = serde_json::to_vec(header)
        .map(|b| BASE64_URL_SAFE_NO_PAD.encode(b))
        .context("unable to encode JWT header")?;
    let body_b64 = serde_json::to_vec(claims)
        .map(|b| BASE64_URL_SAFE_NO_PAD.encode(b))
        .context("unable to encode JWT claims")?;
    let payload = [header_b64.as_bytes(), b".", body_b64.as_bytes()].concat();
    let signature = signer.sign(&payload).await.context("sign token failed")?;
    let signature_b64 = BASE64_URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{header_b64}.{body_b64}.{signature_b64}"))
}
