//! Approach settings resolved from [`AppConfig`].

use sourcewell_config::AppConfig;
use sourcewell_core::error::{Error, Result};

use crate::message_builder::BudgetPolicy;
use crate::token::token_limit;

/// Whether an approach can route requests to a vision-capable model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VisionMode {
    #[default]
    Disabled,
    Enabled,
}

impl VisionMode {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// What an approach instance supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub vision: VisionMode,
    pub streaming: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            vision: VisionMode::Disabled,
            streaming: true,
        }
    }
}

/// Models, limits and defaults shared by the chat and ask approaches.
#[derive(Debug, Clone)]
pub struct ApproachSettings {
    pub chat_model: String,
    pub vision_model: String,
    pub embedding_model: String,
    /// Completion tokens reserved out of the model's window
    pub response_token_limit: u32,
    pub query_max_tokens: u32,
    pub chat_temperature: f32,
    pub ask_temperature: f32,
    pub budget_policy: BudgetPolicy,
}

impl Default for ApproachSettings {
    fn default() -> Self {
        Self {
            chat_model: "gpt-35-turbo".into(),
            vision_model: "gpt-4v".into(),
            embedding_model: "text-embedding-ada-002".into(),
            response_token_limit: 1024,
            query_max_tokens: 100,
            chat_temperature: 0.7,
            ask_temperature: 0.3,
            budget_policy: BudgetPolicy::HistoryOnly,
        }
    }
}

impl ApproachSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let budget_policy = config
            .approach
            .budget_policy
            .parse::<BudgetPolicy>()
            .map_err(|message| Error::Config { message })?;

        // Unknown models are reported per request as UnsupportedModel
        let reserved = config.approach.response_token_limit as usize;
        for model in [&config.openai.chat_model, &config.openai.vision_model] {
            match token_limit(model) {
                Ok(limit) if reserved >= limit => {
                    return Err(Error::Config {
                        message: format!(
                            "approach.response_token_limit ({reserved}) must be below the {limit}-token window of '{model}'"
                        ),
                    });
                }
                _ => {}
            }
        }

        Ok(Self {
            chat_model: config.openai.chat_model.clone(),
            vision_model: config.openai.vision_model.clone(),
            embedding_model: config.openai.embedding_model.clone(),
            response_token_limit: config.approach.response_token_limit,
            query_max_tokens: config.approach.query_max_tokens,
            chat_temperature: config.approach.chat_temperature,
            ask_temperature: config.approach.ask_temperature,
            budget_policy,
        })
    }

    /// Capabilities implied by the config: vision when the vectorizer
    /// section is enabled, streaming as configured.
    pub fn capabilities(config: &AppConfig) -> Capabilities {
        Capabilities {
            vision: if config.vision.enabled {
                VisionMode::Enabled
            } else {
                VisionMode::Disabled
            },
            streaming: config.approach.streaming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_default_config() {
        let settings = ApproachSettings::from_config(&AppConfig::default()).unwrap();
        assert_eq!(settings.chat_model, "gpt-35-turbo");
        assert_eq!(settings.response_token_limit, 1024);
        assert_eq!(settings.budget_policy, BudgetPolicy::HistoryOnly);

        let caps = ApproachSettings::capabilities(&AppConfig::default());
        assert_eq!(caps.vision, VisionMode::Disabled);
        assert!(caps.streaming);
    }

    #[test]
    fn everything_policy_from_config() {
        let mut config = AppConfig::default();
        config.approach.budget_policy = "everything".into();
        config.vision.enabled = true;
        let settings = ApproachSettings::from_config(&config).unwrap();
        assert_eq!(settings.budget_policy, BudgetPolicy::Everything);
        assert!(ApproachSettings::capabilities(&config).vision.is_enabled());
    }

    #[test]
    fn reserved_tokens_must_fit_the_window() {
        let mut config = AppConfig::default();
        config.approach.response_token_limit = 4000;
        let err = ApproachSettings::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("gpt-35-turbo"));

        config.openai.chat_model = "gpt-4-32k".into();
        assert!(ApproachSettings::from_config(&config).is_ok());
    }

    #[test]
    fn unknown_policy_is_config_error() {
        let mut config = AppConfig::default();
        config.approach.budget_policy = "most".into();
        assert!(matches!(
            ApproachSettings::from_config(&config),
            Err(Error::Config { .. })
        ));
    }
}
