use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

/// Wallet-side settings for an issuance [Interaction](crate::interaction::Interaction).
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Identifier the wallet uses as `iss` in proof of possession JWTs.
    pub client_id: String,
    /// Skip signature verification of received credentials.
    #[serde(default)]
    pub disable_vc_proof_checks: bool,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            disable_vc_proof_checks: false,
        }
    }

    pub fn with_disabled_vc_proof_checks(mut self) -> Self {
        self.disable_vc_proof_checks = true;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            bail!("client_id cannot be blank")
        }
        Ok(())
    }
}

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// Resolve a path relative to this base.
    pub fn join(&self, path: &str) -> Result<Url> {
        self.0
            .join(path.trim_start_matches('/'))
            .context(format!("unable to join '{path}' onto '{}'", self.0))
    }
}

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        url.parse().map(Self)
    }
}
