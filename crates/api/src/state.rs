//! Application state for the API server.

use crate::auth::{ApiKeyConfig, Credentials};
use crate::config::{KeepsakeConfig, SurveyConfig};
use keepsake_common::{DescriptionFuser, RelevanceOracle};
use keepsake_llm::{
    LlmClient, LlmDescriptionFuser, LlmRelevanceOracle, LlmSurveyGenerator, UnavailableOracle,
    build_llm_client,
};
use keepsake_memory::{InMemoryItemStore, ItemStore, SamplingService, WeightEngine};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state for the API server.
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
    pub sampler: SamplingService,
    pub engine: WeightEngine,
    pub oracle: Arc<dyn RelevanceOracle>,
    pub surveys: Option<LlmSurveyGenerator>,
    pub survey_config: SurveyConfig,
    pub caregiver: Credentials,
    pub api_key: Option<ApiKeyConfig>,

    /// Server start time (for health checks)
    pub start_time: std::time::Instant,
}

impl AppState {
    /// State over `store` with no LLM collaborators; weight updates and
    /// surveys report a configuration error until they are attached.
    pub fn new(store: Arc<dyn ItemStore>, config: &KeepsakeConfig) -> Self {
        Self {
            sampler: SamplingService::new(store.clone(), config.sampling.policy()),
            engine: WeightEngine::new(store.clone(), config.weights.clone()),
            store,
            oracle: Arc::new(UnavailableOracle::new(
                "No LLM provider configured; set [llm] and an API key",
            )),
            surveys: None,
            survey_config: config.survey.clone(),
            caregiver: Credentials::new(
                config.server.caregiver_username.clone(),
                config.server.caregiver_password.clone(),
            ),
            api_key: None,
            start_time: std::time::Instant::now(),
        }
    }

    /// Build the store and LLM collaborators described by `config`.
    ///
    /// A missing or unusable LLM provider is logged, not fatal.
    pub async fn from_config(config: &KeepsakeConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn ItemStore> = match &config.store.snapshot_path {
            Some(path) => Arc::new(InMemoryItemStore::with_snapshot(path).await?),
            None => {
                info!("No snapshot path configured; items live in memory only");
                Arc::new(InMemoryItemStore::new())
            }
        };

        let state = Self::new(store, config);

        let Some(llm) = &config.llm else {
            warn!("No [llm] section; weight updates and surveys are disabled");
            return Ok(state);
        };

        match build_llm_client(llm) {
            Ok(client) => {
                info!(provider = %llm.provider, model = %client.model_name(), "LLM provider ready");
                Ok(state.with_llm(client))
            }
            Err(e) => {
                warn!(error = %e, "LLM provider unavailable; weight updates and surveys are disabled");
                Ok(state.with_oracle(Arc::new(UnavailableOracle::new(e.to_string()))))
            }
        }
    }

    /// Use `client` for relevance scoring, description fusion and surveys.
    pub fn with_llm(self, client: Arc<dyn LlmClient>) -> Self {
        self.with_oracle(Arc::new(LlmRelevanceOracle::new(client.clone())))
            .with_fuser(Arc::new(LlmDescriptionFuser::new(client.clone())))
            .with_survey_generator(LlmSurveyGenerator::new(client))
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn RelevanceOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_fuser(mut self, fuser: Arc<dyn DescriptionFuser>) -> Self {
        self.engine = self.engine.with_fuser(fuser);
        self
    }

    pub fn with_survey_generator(mut self, generator: LlmSurveyGenerator) -> Self {
        self.surveys = Some(generator);
        self
    }

    pub fn with_api_key(mut self, api_key: ApiKeyConfig) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn oracle_enabled(&self) -> bool {
        self.oracle.ensure_available().is_ok()
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
