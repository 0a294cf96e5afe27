//! This library provides the wallet side of [OID4VCI], the issuance of Verifiable Credentials
//! over OpenID.
//!
//! [OID4VCI]: <https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0-11.html>
//!
//! # Wallet Usage
//!
//! A wallet receives an Initiate Issuance URI from an issuer (typically as a QR code or deep
//! link) and drives an [`Interaction`] through the flow:
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use openid4ci::{
//!     config::ClientConfig,
//!     core::{credential::DidKeyResolver, proof::P256Signer},
//!     interaction::{CredentialRequestOpts, Interaction},
//! };
//!
//! let signer = P256Signer::generate("did:key:z...#z...")?;
//!
//! let interaction = Interaction::builder()
//!     .with_config(ClientConfig::new("wallet-client-id"))
//!     .with_key_resolver(Arc::new(DidKeyResolver::new()))
//!     .build("openid-credential-offer://?credential_offer=...")
//!     .await?;
//!
//! let (interaction, authorize_result) = interaction.authorize();
//!
//! let credentials = interaction
//!     .request_credential(CredentialRequestOpts::default(), &signer)
//!     .await?;
//! ```
//!
//! The wallet's capabilities are injected as traits: [`AsyncHttpClient`] for transport,
//! [`ProofSigner`] for the key the credentials are bound to, [`KeyResolver`] to verify what the
//! issuer sends back, and [`ActivityLogger`] to record successful issuances.
//!
//! [`Interaction`]: crate::interaction::Interaction
//! [`AsyncHttpClient`]: crate::core::util::AsyncHttpClient
//! [`ProofSigner`]: crate::core::proof::ProofSigner
//! [`KeyResolver`]: crate::core::credential::KeyResolver
//! [`ActivityLogger`]: crate::activity::ActivityLogger
//!
//! # Protocol Overview
//!
//! 1. *Credential offer*: the Initiate Issuance URI carries a [`CredentialOffer`] inline
//!    (`credential_offer`) or by reference (`credential_offer_uri`).
//! 2. *Grant selection*: only the pre-authorized code grant is supported, and only the
//!    `jwt_vc_json` and `jwt_vc_json-ld` formats.
//! 3. *Token*: the wallet discovers the token endpoint from the issuer's OpenID configuration
//!    and redeems the pre-authorized code (and PIN, if required) for an access token and nonce.
//! 4. *Proof of possession*: the wallet signs the nonce, addressed to the issuer, as a JWT.
//! 5. *Credential request*: one request per offered credential is sent to the credential
//!    endpoint from the issuer metadata.
//! 6. *Verification*: received credentials are parsed and their signatures checked.
//!
//! Every failure is reported as an [`Error`], which carries a stable code and category.
//!
//! [`CredentialOffer`]: crate::core::offer::CredentialOffer
//! [`Error`]: crate::error::Error

pub mod activity;
pub mod config;
pub mod core;
pub mod error;
pub mod interaction;

pub use error::Error;
