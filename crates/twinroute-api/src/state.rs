//! Application state shared across API handlers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use amm::{AmmError, FeeTokenCatalog, QuoteEngine, TokenRegistry};
use evm_client::EvmClient;
use evm_tx::{FlowError, FlowOutcome, FlowRequest, FlowTracker, Orchestrator};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use twinroute_core::{parse_address, AppConfig, ProviderError, Session, Token, WalletKind};
use uuid::Uuid;

/// Errors that can occur in the API layer
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Amm(#[from] AmmError),

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("No account available; connect a wallet or pass an account")]
    NoAccount,

    #[error("Flow not found: {0}")]
    FlowNotFound(Uuid),
}

impl StateError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider_unavailable",
            Self::Amm(e) => e.error_code(),
            Self::UnknownToken(_) => "unknown_token",
            Self::InvalidAccount(_) => "invalid_account",
            Self::NoAccount => "no_account",
            Self::FlowNotFound(_) => "not_found",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Provider(_) => 503,
            Self::Amm(e) => e.status_code(),
            Self::UnknownToken(_) | Self::InvalidAccount(_) => 400,
            Self::NoAccount => 409,
            Self::FlowNotFound(_) => 404,
        }
    }
}

/// How often idle flows are swept
pub const FLOW_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// A prepared or running flow
#[derive(Clone)]
pub struct FlowRecord {
    pub id: Uuid,
    pub session: Session,
    pub request: FlowRequest,
    pub tracker: FlowTracker,
    pub outcome: Arc<RwLock<Option<FlowOutcome>>>,
    pub created_at: Instant,
}

impl FlowRecord {
    /// Refuse to confirm a quote older than `ttl`
    pub fn check_fresh(&self, ttl: Duration) -> Result<(), FlowError> {
        let age = self.created_at.elapsed();
        if age > ttl {
            return Err(FlowError::QuoteExpired {
                age_secs: age.as_secs(),
            });
        }
        Ok(())
    }

    /// Not running and older than `retention`
    pub fn is_expired(&self, retention: Duration) -> bool {
        !self.tracker.snapshot().active && self.created_at.elapsed() > retention
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    client: EvmClient,
    engine: QuoteEngine,
    orchestrator: Arc<Orchestrator>,
    fee_catalog: Arc<FeeTokenCatalog>,
    tokens: RwLock<TokenRegistry>,
    flows: RwLock<HashMap<Uuid, FlowRecord>>,
}

impl AppState {
    /// Connect to the configured provider and build the engine over it
    pub async fn connect(config: AppConfig) -> Result<Self, StateError> {
        let client = EvmClient::connect(&config.provider, config.chain.chain_id).await?;
        Self::with_client(config, client)
    }

    /// Build over an existing client
    pub fn with_client(config: AppConfig, client: EvmClient) -> Result<Self, StateError> {
        let fee_catalog = Arc::new(FeeTokenCatalog::from_config(&config.fee_tokens));
        let engine = QuoteEngine::new(client.clone(), &config, fee_catalog.clone());
        let orchestrator = Arc::new(Orchestrator::new(client.clone(), &config));
        let tokens = TokenRegistry::with_defaults(&config.chain)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                client,
                engine,
                orchestrator,
                fee_catalog,
                tokens: RwLock::new(tokens),
                flows: RwLock::new(HashMap::new()),
            }),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &EvmClient {
        &self.inner.client
    }

    pub fn engine(&self) -> &QuoteEngine {
        &self.inner.engine
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        self.inner.orchestrator.clone()
    }

    pub fn fee_catalog(&self) -> &FeeTokenCatalog {
        &self.inner.fee_catalog
    }

    pub async fn tokens(&self) -> Vec<Token> {
        self.inner.tokens.read().await.tokens().to_vec()
    }

    /// Resolve a symbol or address; unknown addresses are imported from chain
    pub async fn resolve_token(&self, key: &str) -> Result<Token, StateError> {
        {
            let registry = self.inner.tokens.read().await;
            if let Some(token) = registry.lookup(key) {
                return Ok(token.clone());
            }
        }

        let address =
            parse_address(key).map_err(|_| StateError::UnknownToken(key.to_string()))?;
        self.import_token(address).await
    }

    pub async fn import_token(&self, address: Address) -> Result<Token, StateError> {
        let mut registry = self.inner.tokens.write().await;
        // Double-check after acquiring write lock
        if let Some(token) = registry.by_address(address) {
            return Ok(token.clone());
        }
        let token = registry.import_from_chain(&self.inner.client, address).await?;
        Ok(token.clone())
    }

    /// Session for an explicit account, or the provider's selected account
    pub async fn session(
        &self,
        account: Option<&str>,
        wallet: Option<WalletKind>,
    ) -> Result<Session, StateError> {
        let wallet = wallet.unwrap_or(WalletKind::Injected);
        if let Some(raw) = account {
            let address =
                parse_address(raw).map_err(|e| StateError::InvalidAccount(e.to_string()))?;
            return Ok(Session::new(address, wallet));
        }

        let caps = match self.inner.client.capabilities().await {
            Some(caps) => caps,
            None => {
                self.inner
                    .client
                    .refresh_capabilities(self.inner.config.chain.chain_id)
                    .await;
                self.inner
                    .client
                    .capabilities()
                    .await
                    .ok_or(StateError::NoAccount)?
            }
        };
        caps.primary_account()
            .map(|account| Session::new(account, wallet))
            .ok_or(StateError::NoAccount)
    }

    pub async fn insert_flow(&self, session: Session, request: FlowRequest) -> FlowRecord {
        let record = FlowRecord {
            id: Uuid::new_v4(),
            session,
            request,
            tracker: FlowTracker::new(),
            outcome: Arc::new(RwLock::new(None)),
            created_at: Instant::now(),
        };
        tracing::debug!(flow = %record.id, kind = record.request.kind(), "Flow prepared");
        self.inner
            .flows
            .write()
            .await
            .insert(record.id, record.clone());
        record
    }

    pub async fn flow(&self, id: Uuid) -> Result<FlowRecord, StateError> {
        self.inner
            .flows
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StateError::FlowNotFound(id))
    }

    pub async fn remove_flow(&self, id: Uuid) -> Option<FlowRecord> {
        self.inner.flows.write().await.remove(&id)
    }

    /// All flows, oldest first
    pub async fn flows(&self) -> Vec<FlowRecord> {
        let mut flows: Vec<FlowRecord> = self.inner.flows.read().await.values().cloned().collect();
        flows.sort_by_key(|f| f.created_at);
        flows
    }

    /// Drop idle flows past the retention window; returns how many went
    pub async fn evict_flows(&self) -> usize {
        let retention = Duration::from_secs(self.inner.config.execution.flow_retention_secs);
        let mut flows = self.inner.flows.write().await;
        let before = flows.len();
        flows.retain(|id, record| {
            let expired = record.is_expired(retention);
            if expired {
                tracing::debug!(flow = %id, step = %record.tracker.snapshot().step, "Evicting flow");
            }
            !expired
        });
        before - flows.len()
    }

    /// Sweep idle flows every [`FLOW_CLEANUP_INTERVAL`] for the life of the process
    pub fn spawn_flow_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(FLOW_CLEANUP_INTERVAL).await;
                let evicted = state.evict_flows().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Cleaned up idle flows");
                }
            }
        })
    }
}
