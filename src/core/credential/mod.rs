use std::fmt::Debug;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use ssi::{
    dids::{DIDKey, VerificationMethodDIDResolver},
    jwk::{JWKResolver, JWK},
    verification_methods::AnyJwkMethod,
};

use crate::error::Error;

use super::{credential_format::CredentialFormat, credential_request::CredentialResponse};

/// Resolves the public key a credential was signed with.
#[async_trait]
pub trait KeyResolver: Debug {
    /// Resolve `key_id` (the JWT `kid` header, a DID URL) to a public key.
    async fn resolve_key(&self, key_id: &str) -> Result<JWK>;
}

/// A [KeyResolver] for `did:key` verification methods.
pub struct DidKeyResolver(VerificationMethodDIDResolver<DIDKey, AnyJwkMethod>);

impl DidKeyResolver {
    pub fn new() -> Self {
        Self(VerificationMethodDIDResolver::new(DIDKey))
    }
}

impl Default for DidKeyResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for DidKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DidKeyResolver")
    }
}

#[async_trait]
impl KeyResolver for DidKeyResolver {
    async fn resolve_key(&self, key_id: &str) -> Result<JWK> {
        let jwk = self
            .0
            .fetch_public_jwk(Some(key_id))
            .await
            .context(format!("unable to resolve key '{key_id}'"))?;
        Ok(jwk.into_owned())
    }
}

/// A Verifiable Credential received from the issuer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// The credential as issued, a compact JWT.
    pub jwt: String,
    pub format: CredentialFormat,
    /// All claims of the JWT, including `vc`.
    pub claims: Map<String, Json>,
    pub id: Option<String>,
    pub issuer: Option<String>,
    pub types: Vec<String>,
    /// The `credentialSubject`, as found in the credential.
    pub subject: Json,
}

/// A single entry of a credential's `credentialSubject`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub claims: Map<String, Json>,
}

impl Credential {
    /// Decode a JWT credential, verifying its signature through `key_resolver` unless
    /// `disable_proof_checks` is set.
    pub async fn parse<R: KeyResolver + Send + Sync + ?Sized>(
        jwt: String,
        format: CredentialFormat,
        key_resolver: &R,
        disable_proof_checks: bool,
    ) -> Result<Self> {
        let (header_b64, payload_b64, _) =
            ssi::claims::jws::split_jws(&jwt).context("credential is not a compact JWS")?;

        let claims: Map<String, Json> = if disable_proof_checks {
            let payload = BASE64_URL_SAFE_NO_PAD
                .decode(payload_b64)
                .context("jwt payload was not valid base64url")?;
            serde_json::from_slice(&payload).context("jwt payload was not a JSON object")?
        } else {
            let header = BASE64_URL_SAFE_NO_PAD
                .decode(header_b64)
                .context("jwt headers were not valid base64url")?;
            let mut header = serde_json::from_slice::<Map<String, Json>>(&header)
                .context("jwt headers were not valid json")?;

            let Json::String(kid) = header
                .remove("kid")
                .context("'kid' was missing from jwt headers")?
            else {
                bail!("'kid' header was not a string")
            };

            let jwk = key_resolver.resolve_key(&kid).await?;

            ssi::claims::jwt::decode_verify(&jwt, &jwk)
                .context("credential signature could not be verified")?
        };

        Self::from_claims(jwt, format, claims)
    }

    fn from_claims(
        jwt: String,
        format: CredentialFormat,
        claims: Map<String, Json>,
    ) -> Result<Self> {
        let Some(Json::Object(vc)) = claims.get("vc") else {
            bail!("'vc' claim is missing or is not an object")
        };

        let id = vc
            .get("id")
            .or_else(|| claims.get("jti"))
            .and_then(Json::as_str)
            .map(ToOwned::to_owned);

        let issuer = match vc.get("issuer") {
            Some(Json::String(issuer)) => Some(issuer.clone()),
            Some(Json::Object(issuer)) => issuer
                .get("id")
                .and_then(Json::as_str)
                .map(ToOwned::to_owned),
            _ => claims
                .get("iss")
                .and_then(Json::as_str)
                .map(ToOwned::to_owned),
        };

        let types = match vc.get("type") {
            Some(Json::String(t)) => vec![t.clone()],
            Some(Json::Array(types)) => types
                .iter()
                .map(|t| t.as_str().map(ToOwned::to_owned).context("'type' entry was not a string"))
                .collect::<Result<_>>()?,
            _ => bail!("'vc.type' is missing"),
        };

        let mut subject = vc.get("credentialSubject").cloned().unwrap_or(Json::Null);
        // A single subject without an id is identified by the JWT `sub` claim.
        if let (Json::Object(s), Some(sub)) = (&mut subject, claims.get("sub")) {
            if !s.contains_key("id") {
                s.insert("id".into(), sub.clone());
            }
        }

        Ok(Self {
            jwt,
            format,
            claims,
            id,
            issuer,
            types,
            subject,
        })
    }

    /// The `credentialSubject` as a list of subjects.
    ///
    /// Returns `None` unless the subject is an object or an array of objects.
    pub fn subjects(&self) -> Option<Vec<Subject>> {
        match &self.subject {
            Json::Object(_) => serde_json::from_value(self.subject.clone())
                .ok()
                .map(|s| vec![s]),
            Json::Array(subjects) if subjects.iter().all(Json::is_object) => {
                serde_json::from_value(self.subject.clone()).ok()
            }
            _ => None,
        }
    }
}

/// Parse every credential response, in order. The first failure fails the whole batch.
pub async fn parse_credentials<R: KeyResolver + Send + Sync + ?Sized>(
    responses: Vec<CredentialResponse>,
    formats: impl IntoIterator<Item = CredentialFormat>,
    key_resolver: &R,
    disable_proof_checks: bool,
) -> Result<Vec<Credential>, Error> {
    let mut credentials = Vec::with_capacity(responses.len());

    for (index, (response, format)) in responses.into_iter().zip(formats).enumerate() {
        let credential =
            Credential::parse(response.credential, format, key_resolver, disable_proof_checks)
                .await
                .map_err(|cause| Error::CredentialParseFailed { index, cause })?;
        credentials.push(credential);
    }

    Ok(credentials)
}

/// Collect the subject ids of every credential, in order.
///
/// Subjects without an `id` are skipped rather than reported as empty strings.
pub fn subject_ids(credentials: &[Credential]) -> Result<Vec<String>, Error> {
    let mut ids = Vec::new();

    for (index, credential) in credentials.iter().enumerate() {
        let subjects = credential
            .subjects()
            .ok_or(Error::UnexpectedSubjectShape { index })?;
        ids.extend(subjects.into_iter().filter_map(|subject| subject.id));
    }

    Ok(ids)
}
