use std::fmt;

/// Module tag carried by every error raised by this crate.
pub const MODULE: &str = "OCI";

/// Whether an error was caused by bad input or by something going wrong while executing the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Malformed or unsupported input, detected before (or instead of) talking to the issuer.
    Validation,
    /// Network, signing or parsing failures that happened while running the flow.
    Execution,
}

impl Category {
    fn digit(self) -> u8 {
        match self {
            Category::Validation => 0,
            Category::Execution => 1,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Validation => write!(f, "validation"),
            Category::Execution => write!(f, "execution"),
        }
    }
}

/// Every failure an [Interaction](crate::interaction::Interaction) can surface.
///
/// Causes are rendered with the alternate `anyhow` format, so status codes and response bodies
/// from the issuer are part of the message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid client configuration: {0:#}")]
    InvalidClientConfig(anyhow::Error),
    #[error("invalid initiate issuance URI: {0:#}")]
    InvalidIssuanceUri(anyhow::Error),
    #[error("invalid credential offer: {0:#}")]
    InvalidCredentialOffer(anyhow::Error),
    #[error(
        "pre-authorized grant type is required in the credential offer (support for other grant types not implemented)"
    )]
    PreAuthorizedGrantTypeRequired,
    #[error(
        "unsupported credential type ({format}) in credential offer at index {index} of credentials object (must be jwt_vc_json or jwt_vc_json-ld)"
    )]
    UnsupportedCredentialTypeInOffer { index: usize, format: String },
    #[error("invalid user PIN")]
    PinCodeRequired,
    #[error("failed to fetch issuer's OpenID configuration: {0:#}")]
    IssuerOpenIdConfigFetchFailed(anyhow::Error),
    #[error("failed to get token response: {0:#}")]
    TokenFetchFailed(anyhow::Error),
    #[error("failed to create JWT: {0:#}")]
    JwtSigningFailed(anyhow::Error),
    #[error("kid not containing did part {key_id}")]
    KeyIdNotContainDidPart { key_id: String },
    #[error("failed to get issuer metadata: {0:#}")]
    MetadataFetchFailed(anyhow::Error),
    #[error("failed to get credential response at index {index}: {cause:#}")]
    CredentialFetchFailed { index: usize, cause: anyhow::Error },
    #[error("failed to parse credential from credential response at index {index}: {cause:#}")]
    CredentialParseFailed { index: usize, cause: anyhow::Error },
    #[error("unexpected VC subject type for credential at index {index}")]
    UnexpectedSubjectShape { index: usize },
    #[error("failed to log activity: {0:#}")]
    ActivityLogFailed(anyhow::Error),
}

impl Error {
    /// Stable numeric code, unique within [MODULE].
    pub fn code(&self) -> u16 {
        match self {
            Error::InvalidIssuanceUri(_) => 0,
            Error::InvalidCredentialOffer(_) => 1,
            Error::PreAuthorizedGrantTypeRequired => 2,
            Error::UnsupportedCredentialTypeInOffer { .. } => 3,
            Error::PinCodeRequired => 4,
            Error::InvalidClientConfig(_) => 5,
            Error::IssuerOpenIdConfigFetchFailed(_) => 6,
            Error::TokenFetchFailed(_) => 7,
            Error::JwtSigningFailed(_) => 8,
            Error::KeyIdNotContainDidPart { .. } => 9,
            Error::MetadataFetchFailed(_) => 10,
            Error::CredentialFetchFailed { .. } => 11,
            Error::CredentialParseFailed { .. } => 12,
            Error::UnexpectedSubjectShape { .. } => 13,
            Error::ActivityLogFailed(_) => 14,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Error::InvalidClientConfig(_)
            | Error::InvalidIssuanceUri(_)
            | Error::InvalidCredentialOffer(_)
            | Error::PreAuthorizedGrantTypeRequired
            | Error::UnsupportedCredentialTypeInOffer { .. }
            | Error::PinCodeRequired => Category::Validation,
            Error::IssuerOpenIdConfigFetchFailed(_)
            | Error::TokenFetchFailed(_)
            | Error::JwtSigningFailed(_)
            | Error::KeyIdNotContainDidPart { .. }
            | Error::MetadataFetchFailed(_)
            | Error::CredentialFetchFailed { .. }
            | Error::CredentialParseFailed { .. }
            | Error::UnexpectedSubjectShape { .. }
            | Error::ActivityLogFailed(_) => Category::Execution,
        }
    }

    /// Human readable category, e.g. `TOKEN_FETCH_FAILED`.
    pub fn category_name(&self) -> &'static str {
        match self {
            Error::InvalidClientConfig(_) => "INVALID_CLIENT_CONFIG",
            Error::InvalidIssuanceUri(_) => "INVALID_ISSUANCE_URI",
            Error::InvalidCredentialOffer(_) => "INVALID_CREDENTIAL_OFFER",
            Error::PreAuthorizedGrantTypeRequired => "PRE_AUTHORIZED_GRANT_TYPE_REQUIRED",
            Error::UnsupportedCredentialTypeInOffer { .. } => {
                "UNSUPPORTED_CREDENTIAL_TYPE_IN_OFFER"
            }
            Error::PinCodeRequired => "PIN_CODE_REQUIRED",
            Error::IssuerOpenIdConfigFetchFailed(_) => "ISSUER_OPENID_CONFIG_FETCH_FAILED",
            Error::TokenFetchFailed(_) => "TOKEN_FETCH_FAILED",
            Error::JwtSigningFailed(_) => "JWT_SIGNING_FAILED",
            Error::KeyIdNotContainDidPart { .. } => "KEY_ID_NOT_CONTAIN_DID_PART",
            Error::MetadataFetchFailed(_) => "METADATA_FETCH_FAILED",
            Error::CredentialFetchFailed { .. } => "CREDENTIAL_FETCH_FAILED",
            Error::CredentialParseFailed { .. } => "CREDENTIAL_PARSE_FAILED",
            Error::UnexpectedSubjectShape { .. } => "UNEXPECTED_SUBJECT_SHAPE",
            Error::ActivityLogFailed(_) => "ACTIVITY_LOG_FAILED",
        }
    }

    /// Identifier combining module, category and code, e.g. `OCI1-0007`.
    pub fn id(&self) -> String {
        format!(
            "{MODULE}{}-{:04}",
            self.category().digit(),
            self.code()
        )
    }

    /// The underlying cause, if the error wraps one.
    pub fn cause(&self) -> Option<&anyhow::Error> {
        match self {
            Error::InvalidClientConfig(e)
            | Error::InvalidIssuanceUri(e)
            | Error::InvalidCredentialOffer(e)
            | Error::IssuerOpenIdConfigFetchFailed(e)
            | Error::TokenFetchFailed(e)
            | Error::JwtSigningFailed(e)
            | Error::MetadataFetchFailed(e)
            | Error::ActivityLogFailed(e)
            | Error::CredentialFetchFailed { cause: e, .. }
            | Error::CredentialParseFailed { cause: e, .. } => Some(e),
            Error::PreAuthorizedGrantTypeRequired
            | Error::UnsupportedCredentialTypeInOffer { .. }
            | Error::PinCodeRequired
            | Error::KeyIdNotContainDidPart { .. }
            | Error::UnexpectedSubjectShape { .. } => None,
        }
    }
}
