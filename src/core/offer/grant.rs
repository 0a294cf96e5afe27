use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    core::credential_format::{CredentialFormat, OfferedCredential},
    error::Error,
};

use super::CredentialOffer;

pub const PRE_AUTHORIZED_CODE_GRANT_TYPE: &str =
    "urn:ietf:params:oauth:grant-type:pre-authorized_code";

/// Parameters of the pre-authorized code grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreAuthorizedCodeGrant {
    #[serde(rename = "pre-authorized_code")]
    pub pre_authorized_code: String,
    #[serde(default)]
    pub user_pin_required: bool,
}

/// A [CredentialOffer] that this wallet is able to act upon.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOffer {
    pub credential_issuer: String,
    pub credentials: Vec<OfferedCredential>,
    pub grant: PreAuthorizedCodeGrant,
}

impl CredentialOffer {
    /// Select the pre-authorized code grant and check every offered credential format.
    pub fn validate(self) -> Result<ValidatedOffer, Error> {
        // TODO: determine the grant type from issuer metadata when the offer omits `grants`.
        let grant = self
            .grants
            .get(PRE_AUTHORIZED_CODE_GRANT_TYPE)
            .ok_or(Error::PreAuthorizedGrantTypeRequired)?;

        let grant: PreAuthorizedCodeGrant = serde_json::from_value(grant.clone())
            .context(format!("'{PRE_AUTHORIZED_CODE_GRANT_TYPE}' grant could not be parsed"))
            .map_err(Error::InvalidCredentialOffer)?;

        let credentials = self
            .credentials
            .into_iter()
            .enumerate()
            .map(|(index, credential)| {
                let Ok(format) = credential.format.parse::<CredentialFormat>() else {
                    return Err(Error::UnsupportedCredentialTypeInOffer {
                        index,
                        format: credential.format,
                    });
                };
                Ok(OfferedCredential {
                    format,
                    types: credential.types,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedOffer {
            credential_issuer: self.credential_issuer,
            credentials,
            grant,
        })
    }
}

#[cfg(test)]
mod test {
    use serde_json::{json, Value as Json};

    use super::*;

    fn offer(credentials: Json, grants: Json) -> CredentialOffer {
        serde_json::from_value(json!({
            "credential_issuer": "https://issuer.example",
            "credentials": credentials,
            "grants": grants,
        }))
        .unwrap()
    }

    fn pre_authorized(user_pin_required: bool) -> Json {
        json!({
            "urn:ietf:params:oauth:grant-type:pre-authorized_code": {
                "pre-authorized_code": "abc",
                "user_pin_required": user_pin_required
            }
        })
    }

    #[test]
    fn keeps_offer_order() {
        let validated = offer(
            json!([
                { "format": "jwt_vc_json", "types": ["VerifiableCredential", "A"] },
                { "format": "jwt_vc_json-ld", "types": ["VerifiableCredential", "B"] }
            ]),
            pre_authorized(true),
        )
        .validate()
        .unwrap();

        assert_eq!(
            validated.credentials,
            vec![
                OfferedCredential {
                    format: CredentialFormat::JwtVcJson,
                    types: vec!["VerifiableCredential".into(), "A".into()],
                },
                OfferedCredential {
                    format: CredentialFormat::JwtVcJsonLd,
                    types: vec!["VerifiableCredential".into(), "B".into()],
                },
            ]
        );
        assert_eq!(
            validated.grant,
            PreAuthorizedCodeGrant {
                pre_authorized_code: "abc".into(),
                user_pin_required: true,
            }
        );
    }

    #[test]
    fn pre_authorized_grant_required() {
        let err = offer(
            json!([]),
            json!({ "authorization_code": { "issuer_state": "xyz" } }),
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, Error::PreAuthorizedGrantTypeRequired), "{err}");

        let no_grants: CredentialOffer = serde_json::from_value(json!({
            "credential_issuer": "https://issuer.example",
            "credentials": []
        }))
        .unwrap();
        assert!(matches!(
            no_grants.validate(),
            Err(Error::PreAuthorizedGrantTypeRequired)
        ));
    }

    #[test]
    fn malformed_pre_authorized_grant() {
        let err = offer(
            json!([]),
            json!({
                "urn:ietf:params:oauth:grant-type:pre-authorized_code": {
                    "user_pin_required": true
                }
            }),
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentialOffer(_)), "{err}");
    }

    #[test]
    fn user_pin_not_required_by_default() {
        let validated = offer(
            json!([]),
            json!({
                "urn:ietf:params:oauth:grant-type:pre-authorized_code": {
                    "pre-authorized_code": "abc"
                }
            }),
        )
        .validate()
        .unwrap();
        assert!(!validated.grant.user_pin_required);
    }

    #[test]
    fn unsupported_format_names_index() {
        let err = offer(
            json!([
                { "format": "jwt_vc_json", "types": ["VerifiableCredential"] },
                { "format": "ldp_vc", "types": ["VerifiableCredential"] }
            ]),
            pre_authorized(false),
        )
        .validate()
        .unwrap_err();

        let Error::UnsupportedCredentialTypeInOffer { index, format } = &err else {
            panic!("unexpected error: {err}")
        };
        assert_eq!(*index, 1);
        assert_eq!(format, "ldp_vc");
        assert!(err.to_string().contains("at index 1"));
    }
}
