//! LLM adapters for Keepsake's external collaborators.
//!
//! Provider clients (OpenAI-compatible and Anthropic) sit behind the
//! [`LlmClient`] trait and are wrapped with retry and concurrency limits by
//! [`build_llm_client`]. On top of a client this crate implements the
//! relevance oracle, the description fuser, and the recall survey generator.

pub mod anthropic;
pub mod client;
pub mod config;
pub mod describe;
pub mod openai;
pub mod relevance;
pub mod retry;
pub mod survey;

pub use anthropic::AnthropicClient;
pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{LlmConfig, SemaphoredClient, build_llm_client};
pub use describe::LlmDescriptionFuser;
pub use openai::OpenAiClient;
pub use relevance::{LlmRelevanceOracle, UnavailableOracle, parse_relevance};
pub use retry::{RetryConfig, RetryingClient};
pub use survey::{LlmSurveyGenerator, SurveyQuestion, SurveySource, parse_questions};
