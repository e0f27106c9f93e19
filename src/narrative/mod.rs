//! Narrative text for deviations, patterns and stories.
//!
//! A [`NarrativeGenerator`] turns structured facts into user-facing text.
//! [`Narrator`] wraps the configured strategy with a timeout, the tone
//! check, and the templated fallback, so callers always get usable text.

pub mod ai;
pub mod client;
pub mod template;
pub mod tone;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{NarrativeConfig, NarrativeProvider};
use crate::models::{Category, ContextTag, Trend};

pub use ai::AiNarrator;
pub use client::{ChatClient, CompletionRequest, TextGenerator};
pub use template::TemplateNarrator;
pub use tone::{check_tone, ToneViolation};

#[derive(Error, Debug)]
pub enum NarrativeError {
    #[error("Text generator request failed: {0}")]
    Transport(String),

    #[error("Text generator timed out")]
    Timeout,

    #[error("Text generator rate limit exceeded")]
    RateLimited,

    #[error("Text generator quota exhausted")]
    QuotaExceeded,

    #[error("Text generator returned HTTP {0}")]
    Upstream(u16),

    #[error("Malformed text generator response: {0}")]
    Malformed(String),

    #[error("Generated text violates tone policy: {0}")]
    ToneViolation(ToneViolation),
}

/// What the narrative is about
#[derive(Debug, Clone, PartialEq)]
pub enum NarrativeSubject {
    /// A weekly jump over baseline, in whole percent
    Deviation { percentage: i32 },
    /// A detected habit
    Pattern {
        title: String,
        description: String,
        time_range: String,
        average_amount: Decimal,
    },
}

/// Structured facts handed to a generator. Generators never see raw transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeFacts {
    pub subject: NarrativeSubject,
    pub category: Category,
    pub occurrences: i32,
    pub trend: Option<Trend>,
    pub context_tags: Vec<ContextTag>,
}

impl NarrativeFacts {
    pub fn deviation(category: Category, percentage: i32, occurrences: i32) -> Self {
        Self {
            subject: NarrativeSubject::Deviation { percentage },
            category,
            occurrences,
            trend: None,
            context_tags: Vec::new(),
        }
    }
}

/// The external text generator, when the configuration asks for one
pub fn text_generator(
    config: &NarrativeConfig,
) -> Result<Option<Arc<dyn TextGenerator>>, NarrativeError> {
    match config.provider {
        NarrativeProvider::Template => Ok(None),
        NarrativeProvider::Ai => Ok(Some(Arc::new(ChatClient::from_config(config)?))),
    }
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, facts: &NarrativeFacts) -> Result<String, NarrativeError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Narrative strategy plus the guarantees every caller relies on
#[derive(Clone)]
pub struct Narrator {
    primary: Option<Arc<dyn NarrativeGenerator>>,
    fallback: TemplateNarrator,
    timeout: Duration,
}

impl Narrator {
    /// Templates only
    pub fn templated(seed: u64) -> Self {
        Self {
            primary: None,
            fallback: TemplateNarrator::new(seed),
            timeout: Duration::from_millis(0),
        }
    }

    /// Try `generator` first, fall back to templates on failure
    pub fn with_generator(
        generator: Arc<dyn NarrativeGenerator>,
        seed: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            primary: Some(generator),
            fallback: TemplateNarrator::new(seed),
            timeout,
        }
    }

    /// Narrator for the configured strategy. `client` is the shared text
    /// generator from [`text_generator`]; without one only templates are used.
    pub fn from_config(config: &NarrativeConfig, client: Option<Arc<dyn TextGenerator>>) -> Self {
        match (config.provider, client) {
            (NarrativeProvider::Ai, Some(client)) => Self::with_generator(
                Arc::new(AiNarrator::new(client)),
                config.seed,
                config.timeout(),
            ),
            _ => Self::templated(config.seed),
        }
    }

    pub fn strategy(&self) -> &'static str {
        self.primary
            .as_ref()
            .map(|g| g.name())
            .unwrap_or_else(|| self.fallback.name())
    }

    /// Always returns text that passed the tone policy or came from templates
    pub async fn narrate(&self, facts: &NarrativeFacts) -> String {
        if let Some(primary) = &self.primary {
            let attempt = match tokio::time::timeout(self.timeout, primary.generate(facts)).await {
                Ok(result) => result.and_then(|text| match check_tone(&text) {
                    Ok(()) => Ok(text),
                    Err(violation) => Err(NarrativeError::ToneViolation(violation)),
                }),
                Err(_) => Err(NarrativeError::Timeout),
            };

            match attempt {
                Ok(text) => {
                    debug!("{} narrative accepted for {}", primary.name(), facts.category);
                    return text;
                }
                Err(e) => warn!(
                    "{} narrative for {} unavailable ({}), using template",
                    primary.name(),
                    facts.category,
                    e
                ),
            }
        }

        self.fallback.render(facts)
    }
}
