use core::fmt;
use std::str::FromStr;

use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};

const FORMAT_JWT_VC_JSON: &str = "jwt_vc_json";
const FORMAT_JWT_VC_JSON_LD: &str = "jwt_vc_json-ld";

/// Credential formats a wallet can request from an issuer.
///
/// Both are W3C Verifiable Credentials secured as a JWT, the `-ld` variant additionally being
/// processed as JSON-LD by the issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialFormat {
    #[serde(rename = "jwt_vc_json")]
    JwtVcJson,
    #[serde(rename = "jwt_vc_json-ld")]
    JwtVcJsonLd,
}

impl CredentialFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialFormat::JwtVcJson => FORMAT_JWT_VC_JSON,
            CredentialFormat::JwtVcJsonLd => FORMAT_JWT_VC_JSON_LD,
        }
    }
}

impl FromStr for CredentialFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            FORMAT_JWT_VC_JSON => Ok(CredentialFormat::JwtVcJson),
            FORMAT_JWT_VC_JSON_LD => Ok(CredentialFormat::JwtVcJsonLd),
            _ => bail!("unsupported credential format '{s}'"),
        }
    }
}

impl fmt::Display for CredentialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential from the offer, as it will be requested from the credential endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferedCredential {
    pub format: CredentialFormat,
    /// The credential's type hierarchy, e.g. `["VerifiableCredential", "UniversityDegreeCredential"]`.
    pub types: Vec<String>,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn supported_formats() {
        assert_eq!(
            "jwt_vc_json".parse::<CredentialFormat>().unwrap(),
            CredentialFormat::JwtVcJson
        );
        assert_eq!(
            "jwt_vc_json-ld".parse::<CredentialFormat>().unwrap(),
            CredentialFormat::JwtVcJsonLd
        );
        assert!("ldp_vc".parse::<CredentialFormat>().is_err());
        assert!("mso_mdoc".parse::<CredentialFormat>().is_err());
    }

    #[test]
    fn serializes_as_tag() {
        assert_eq!(
            serde_json::to_value(CredentialFormat::JwtVcJsonLd).unwrap(),
            json!("jwt_vc_json-ld")
        );
        assert_eq!(CredentialFormat::JwtVcJson.to_string(), "jwt_vc_json");
    }
}
