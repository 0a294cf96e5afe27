use std::sync::Arc;

use anyhow::{anyhow, Context};
use serde_json::{json, Map};
use tracing::{debug, info, warn};

use crate::{
    activity::{
        Activity, ActivityData, ActivityLogger, ActivityStatus, ActivityType, NoopActivityLogger,
    },
    config::{BaseUrl, ClientConfig},
    core::{
        credential::{parse_credentials, subject_ids, Credential, KeyResolver},
        credential_format::OfferedCredential,
        credential_request::fetch_credentials,
        metadata::{IssuerMetadata, OpenIdConfiguration},
        offer::{InitiateIssuanceRequest, PreAuthorizedCodeGrant},
        proof::{build_proof_jwt, ProofClaims, ProofSigner},
        token::TokenRequest,
        util::{AsyncHttpClient, ReqwestClient},
    },
    error::Error,
};

const ACTIVITY_LOG_OPERATION: &str = "oidc-issuance";

/// State of an [Interaction] that has been created from an offer but not yet authorized.
#[derive(Debug)]
pub struct Created {
    grant: PreAuthorizedCodeGrant,
}

/// State of an [Interaction] that is ready to request credentials.
#[derive(Debug)]
pub struct Authorized {
    grant: PreAuthorizedCodeGrant,
}

/// Outcome of [Interaction::authorize].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizeResult {
    /// The user must provide a PIN to [Interaction::request_credential].
    pub user_pin_required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRequestOpts {
    pub user_pin: Option<String>,
}

impl CredentialRequestOpts {
    pub fn with_user_pin(user_pin: impl Into<String>) -> Self {
        Self {
            user_pin: Some(user_pin.into()),
        }
    }
}

/// A single OpenID4CI interaction between a wallet and an issuer.
///
/// The interaction walks through the pre-authorized code flow exactly once:
///
/// ```ignore
/// let interaction = Interaction::builder()
///     .with_config(ClientConfig::new("wallet-client-id"))
///     .with_key_resolver(Arc::new(DidKeyResolver::new()))
///     .build(initiate_issuance_uri)
///     .await?;
///
/// let (interaction, authorize_result) = interaction.authorize();
/// let opts = if authorize_result.user_pin_required {
///     CredentialRequestOpts::with_user_pin(ask_user_for_pin())
/// } else {
///     CredentialRequestOpts::default()
/// };
///
/// let credentials = interaction.request_credential(opts, &signer).await?;
/// ```
///
/// [Interaction::request_credential] consumes the interaction, so the grant cannot be redeemed
/// twice. Start a fresh interaction for every offer.
pub struct Interaction<S = Created> {
    issuer_uri: String,
    issuer: BaseUrl,
    credentials: Vec<OfferedCredential>,
    client_id: String,
    http_client: Arc<dyn AsyncHttpClient + Send + Sync>,
    key_resolver: Arc<dyn KeyResolver + Send + Sync>,
    activity_logger: Arc<dyn ActivityLogger + Send + Sync>,
    disable_vc_proof_checks: bool,
    state: S,
}

impl Interaction {
    /// Begin building a new interaction from an Initiate Issuance URI.
    pub fn builder() -> InteractionBuilder {
        InteractionBuilder::default()
    }
}

impl<S> Interaction<S> {
    /// The issuer's URI from the credential offer.
    ///
    /// Worth storing for later, e.g. to refresh credential display data from the issuer.
    pub fn issuer_uri(&self) -> &str {
        &self.issuer_uri
    }

    /// The credentials that will be requested, in offer order.
    pub fn offered_credentials(&self) -> &[OfferedCredential] {
        &self.credentials
    }

    fn map_state<T>(self, f: impl FnOnce(S) -> T) -> Interaction<T> {
        Interaction {
            issuer_uri: self.issuer_uri,
            issuer: self.issuer,
            credentials: self.credentials,
            client_id: self.client_id,
            http_client: self.http_client,
            key_resolver: self.key_resolver,
            activity_logger: self.activity_logger,
            disable_vc_proof_checks: self.disable_vc_proof_checks,
            state: f(self.state),
        }
    }
}

impl Interaction<Created> {
    /// Authorize the issuance request.
    ///
    /// Only the pre-authorized code flow is supported, so this is a local step which reports
    /// whether the user will have to provide a PIN.
    pub fn authorize(self) -> (Interaction<Authorized>, AuthorizeResult) {
        let result = AuthorizeResult {
            user_pin_required: self.state.grant.user_pin_required,
        };
        debug!("authorized interaction with {}", self.issuer_uri);
        (self.map_state(|Created { grant }| Authorized { grant }), result)
    }
}

impl Interaction<Authorized> {
    /// Redeem the grant and receive the offered credentials.
    ///
    /// One credential request is made per offered credential, all bound to a single proof of
    /// possession signed by `signer`. Either every credential is returned, in offer order, or
    /// the whole call fails.
    pub async fn request_credential<S: ProofSigner + Send + Sync + ?Sized>(
        self,
        opts: CredentialRequestOpts,
        signer: &S,
    ) -> Result<Vec<Credential>, Error> {
        let result = self.run(opts, signer).await;
        if let Err(e) = &result {
            warn!("credential issuance from {} failed: {e}", self.issuer_uri);
        }
        result
    }

    async fn run<S: ProofSigner + Send + Sync + ?Sized>(
        &self,
        opts: CredentialRequestOpts,
        signer: &S,
    ) -> Result<Vec<Credential>, Error> {
        let grant = &self.state.grant;
        let user_pin = opts.user_pin.unwrap_or_default();
        if grant.user_pin_required && user_pin.is_empty() {
            return Err(Error::PinCodeRequired);
        }

        let http_client = self.http_client.as_ref();

        let openid_configuration = OpenIdConfiguration::fetch(&self.issuer, http_client)
            .await
            .map_err(Error::IssuerOpenIdConfigFetchFailed)?;

        let token_response = TokenRequest::PreAuthorizedCode {
            pre_authorized_code: grant.pre_authorized_code.clone(),
            user_pin,
        }
        .send(&openid_configuration.token_endpoint, http_client)
        .await
        .map_err(Error::TokenFetchFailed)?;

        let claims = ProofClaims::new(&self.client_id, &self.issuer_uri, &token_response.c_nonce);
        let proof_jwt = build_proof_jwt(&claims, signer).await?;

        let metadata = IssuerMetadata::fetch(&self.issuer, http_client)
            .await
            .map_err(Error::MetadataFetchFailed)?;

        let responses = fetch_credentials(
            &self.credentials,
            &metadata.credential_endpoint,
            &token_response.access_token,
            &proof_jwt,
            http_client,
        )
        .await?;

        let credentials = parse_credentials(
            responses,
            self.credentials.iter().map(|c| c.format),
            self.key_resolver.as_ref(),
            self.disable_vc_proof_checks,
        )
        .await?;

        let subject_ids = subject_ids(&credentials)?;
        info!(
            "received {} credential(s) from {}",
            credentials.len(),
            metadata.credential_issuer
        );

        let mut params = Map::new();
        params.insert("subjectIDs".into(), json!(subject_ids));

        self.activity_logger
            .log(Activity::new(
                ActivityType::Credential,
                ActivityData {
                    client: metadata.credential_issuer,
                    operation: ACTIVITY_LOG_OPERATION.into(),
                    status: ActivityStatus::Success,
                    params,
                },
            ))
            .await
            .map_err(Error::ActivityLogFailed)?;

        Ok(credentials)
    }
}

/// Builder struct for [Interaction].
#[derive(Default)]
pub struct InteractionBuilder {
    config: Option<ClientConfig>,
    http_client: Option<Arc<dyn AsyncHttpClient + Send + Sync>>,
    key_resolver: Option<Arc<dyn KeyResolver + Send + Sync>>,
    activity_logger: Option<Arc<dyn ActivityLogger + Send + Sync>>,
}

impl InteractionBuilder {
    /// Resolve the credential offer from `initiate_issuance_uri` and build the interaction.
    ///
    /// The URI carries the offer in its `credential_offer` (inline JSON) or
    /// `credential_offer_uri` (by reference) query parameter, see
    /// [OID4VCI Section 4.1](https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0-11.html#section-4.1).
    pub async fn build(self, initiate_issuance_uri: &str) -> Result<Interaction<Created>, Error> {
        let Self {
            config,
            http_client,
            key_resolver,
            activity_logger,
        } = self;

        let Some(config) = config else {
            return Err(Error::InvalidClientConfig(anyhow!(
                "client config is required, see `with_config`"
            )));
        };
        config.validate().map_err(Error::InvalidClientConfig)?;

        let Some(key_resolver) = key_resolver else {
            return Err(Error::InvalidClientConfig(anyhow!(
                "key resolver is required, see `with_key_resolver`"
            )));
        };

        let http_client: Arc<dyn AsyncHttpClient + Send + Sync> = match http_client {
            Some(http_client) => http_client,
            None => Arc::new(ReqwestClient::new().map_err(Error::InvalidClientConfig)?),
        };

        let activity_logger = activity_logger.unwrap_or_else(|| Arc::new(NoopActivityLogger));

        let offer = InitiateIssuanceRequest::from_url(initiate_issuance_uri)?
            .resolve(http_client.as_ref())
            .await?
            .validate()?;

        let issuer = BaseUrl::try_from(offer.credential_issuer.clone())
            .context("'credential_issuer' is not a valid URL")
            .map_err(Error::InvalidCredentialOffer)?;

        debug!(
            "created interaction with {} offering {} credential(s)",
            offer.credential_issuer,
            offer.credentials.len()
        );

        Ok(Interaction {
            issuer_uri: offer.credential_issuer,
            issuer,
            credentials: offer.credentials,
            client_id: config.client_id,
            http_client,
            key_resolver,
            activity_logger,
            disable_vc_proof_checks: config.disable_vc_proof_checks,
            state: Created { grant: offer.grant },
        })
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Defaults to a [ReqwestClient].
    pub fn with_http_client(mut self, http_client: Arc<dyn AsyncHttpClient + Send + Sync>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Set the [KeyResolver] used to verify received credentials.
    pub fn with_key_resolver(mut self, key_resolver: Arc<dyn KeyResolver + Send + Sync>) -> Self {
        self.key_resolver = Some(key_resolver);
        self
    }

    /// Defaults to a [NoopActivityLogger].
    pub fn with_activity_logger(
        mut self,
        activity_logger: Arc<dyn ActivityLogger + Send + Sync>,
    ) -> Self {
        self.activity_logger = Some(activity_logger);
        self
    }
}
