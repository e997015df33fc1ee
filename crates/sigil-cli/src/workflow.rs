//! The issuance workflow: issuer identity, receiver identity, one credential.

use anyhow::Context as _;
use chrono::DateTime;
use std::sync::Arc;

use sigil_core::{CredentialStatusType, RevocationOptions, W3CCredential};
use sigil_credentials::{
    CredentialWallet, HttpSchemaLoader, SchemaLoader, VerificationOutcome,
};
use sigil_crypto::{BjjProvider, InMemoryPrivateKeyStore, Kms, KmsKeyType};
use sigil_identity::{CreateIdentityOptions, CreatedIdentity, CredentialRequest, IdentityWallet};
use sigil_status::{
    CredentialStatusResolverRegistry, HttpReverseHashService, IssuerResolver, RhsResolver,
};
use sigil_storage::{
    DataStorage, EthConnectionConfig, EthStateStorage, InMemoryStateStorage, StateStorage,
};

use crate::config::{ChainBackend, SigilConfig, StorageBackend};

/// Shared services, built in dependency order.
pub struct Context {
    pub storage: Arc<DataStorage>,
    pub identity_wallet: IdentityWallet,
    pub credential_wallet: CredentialWallet,
}

impl Context {
    pub fn build(config: &SigilConfig, schemas: Arc<dyn SchemaLoader>) -> anyhow::Result<Self> {
        let kms = Arc::new(Kms::new());
        kms.register_key_provider(
            KmsKeyType::BabyJubJub,
            Arc::new(BjjProvider::new(Arc::new(InMemoryPrivateKeyStore::new()))),
        );

        let states: Arc<dyn StateStorage> = match config.chain.backend {
            ChainBackend::Ethereum => Arc::new(EthStateStorage::new(EthConnectionConfig {
                rpc_url: config.chain.rpc_url.clone(),
                contract_address: config.chain.contract_address.clone(),
                timeout: config.chain_timeout(),
            })?),
            ChainBackend::Memory => Arc::new(InMemoryStateStorage::new()),
        };

        let depth = config.storage.merkle_tree_depth;
        let storage = Arc::new(match config.storage.backend {
            StorageBackend::Memory => DataStorage::in_memory(depth, states.clone())?,
            StorageBackend::Rocksdb => {
                DataStorage::rocksdb(&config.storage.data_dir, depth, states.clone())
                    .with_context(|| {
                        format!("opening {}", config.storage.data_dir.display())
                    })?
            }
        });

        let registry = Arc::new(CredentialStatusResolverRegistry::new());
        registry.register(
            CredentialStatusType::SparseMerkleTreeProof,
            Arc::new(IssuerResolver::new(storage.clone())),
        );
        registry.register(
            CredentialStatusType::Iden3ReverseSparseMerkleTreeProof,
            Arc::new(RhsResolver::new(states, config.rhs_timeout()).with_max_depth(depth)),
        );

        tracing::debug!(types = ?registry.registered_types(), "status resolvers ready");

        let identity_wallet = IdentityWallet::new(kms, storage.clone(), schemas);
        let credential_wallet = CredentialWallet::new(storage.clone(), registry);

        Ok(Self {
            storage,
            identity_wallet,
            credential_wallet,
        })
    }
}

/// Everything the workflow produced.
#[derive(Debug)]
pub struct WorkflowOutput {
    pub issuer: CreatedIdentity,
    pub receiver: CreatedIdentity,
    pub credential: W3CCredential,
    pub verification: Option<VerificationOutcome>,
}

/// Run the workflow with schemas fetched over HTTP.
pub async fn run(config: &SigilConfig) -> anyhow::Result<WorkflowOutput> {
    let schemas = Arc::new(HttpSchemaLoader::new(config.schema_timeout())?);
    let context = Context::build(config, schemas)?;
    run_with(config, &context).await
}

pub async fn run_with(config: &SigilConfig, ctx: &Context) -> anyhow::Result<WorkflowOutput> {
    let revocation_opts = RevocationOptions {
        status_type: config.credential.revocation_type,
        id: config.rhs.url.clone(),
    };
    let identity_options = |seed: &Option<String>| CreateIdentityOptions {
        method: config.identity.method,
        blockchain: config.identity.blockchain,
        network: config.identity.network,
        revocation_opts: revocation_opts.clone(),
        seed: seed.as_ref().map(|s| s.as_bytes().to_vec()),
    };

    let issuer = ctx
        .identity_wallet
        .create_identity(identity_options(&config.identity.issuer_seed))
        .await
        .context("creating issuer identity")?;
    tracing::info!(did = %issuer.did, "issuer ready");

    let receiver = ctx
        .identity_wallet
        .create_identity(identity_options(&config.identity.receiver_seed))
        .await
        .context("creating receiver identity")?;
    tracing::info!(did = %receiver.did, "receiver ready");

    let mut subject = config.credential.subject.clone();
    subject.insert("id".into(), serde_json::json!(receiver.did.to_string()));
    let expiration = match config.credential.expiration {
        Some(secs) => Some(
            DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| anyhow::anyhow!("credential.expiration out of range: {}", secs))?,
        ),
        None => None,
    };

    let credential = ctx
        .identity_wallet
        .issue_credential(
            &issuer.did,
            CredentialRequest {
                credential_schema: config.credential.schema.clone(),
                credential_type: config.credential.credential_type.clone(),
                credential_subject: subject,
                expiration,
                revocation_opts,
            },
        )
        .await
        .context("issuing credential")?;

    ctx.credential_wallet.store(&credential)?;
    tracing::debug!(
        stored = ctx.storage.credential.count()?,
        "credential in receiver wallet"
    );

    if config.workflow.publish_state {
        let state = ctx.identity_wallet.publish_state(&issuer.did).await?;
        let rhs = HttpReverseHashService::new(&config.rhs.url, config.rhs_timeout())?;
        let sent = ctx
            .identity_wallet
            .publish_state_to_rhs(&issuer.did, &rhs)
            .await
            .context("pushing issuer state to the reverse hash service")?;
        tracing::info!(
            state = %sigil_core::hash::to_hex(&state.value),
            nodes = sent,
            "issuer state published"
        );
    }

    let verification = if config.workflow.verify {
        match ctx.credential_wallet.verify(&credential).await {
            Ok(outcome) => Some(outcome),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(id = %credential.id, error = %e, "revocation status unavailable");
                None
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        None
    };

    Ok(WorkflowOutput {
        issuer,
        receiver,
        credential,
        verification,
    })
}
