//! `sourcewell ask`: answer one question without starting the gateway.

use std::path::Path;

use sourcewell_approach::ChatResponse;
use sourcewell_core::overrides::{AuthClaims, RequestOverrides, RetrievalMode};
use tracing::debug;

use super::load_config;

pub struct AskOptions {
    pub top: usize,
    pub mode: RetrievalMode,
    pub exclude_category: Option<String>,
    pub json: bool,
}

impl AskOptions {
    fn overrides(&self) -> RequestOverrides {
        RequestOverrides {
            top: self.top,
            retrieval_mode: self.mode,
            exclude_category: self.exclude_category.clone(),
            ..Default::default()
        }
    }
}

pub async fn run(
    config_path: Option<&Path>,
    question: &str,
    options: AskOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let state = sourcewell_gateway::build_state(&config)?;
    debug!(top = options.top, mode = ?options.mode, "Asking from the command line");

    let response = state
        .ask
        .run(question, &options.overrides(), &AuthClaims::anonymous())
        .await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render(&response));
    }

    Ok(())
}

/// Plain-text rendering: the answer, then the sources it was given.
fn render(response: &ChatResponse) -> String {
    let mut out = format!("{}\n", response.answer.trim());
    if !response.data_points.text.is_empty() {
        out.push_str("\nSources:\n");
        for line in &response.data_points.text {
            out.push_str(&format!("  - {line}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcewell_core::document::DataPoints;

    #[test]
    fn options_become_overrides() {
        let options = AskOptions {
            top: 5,
            mode: RetrievalMode::Text,
            exclude_category: Some("internal".into()),
            json: false,
        };
        let overrides = options.overrides();
        assert_eq!(overrides.top, 5);
        assert_eq!(overrides.retrieval_mode, RetrievalMode::Text);
        assert_eq!(overrides.exclude_category.as_deref(), Some("internal"));
        assert!(!overrides.use_gpt4v);
    }

    #[test]
    fn render_lists_sources() {
        let response = ChatResponse {
            answer: "Yes [a.pdf#page=1].\n".into(),
            data_points: DataPoints {
                text: vec!["a.pdf#page=1: covered".into()],
                images: vec![],
            },
            thoughts: vec![],
            followup_questions: vec![],
            usage: None,
        };
        assert_eq!(
            render(&response),
            "Yes [a.pdf#page=1].\n\nSources:\n  - a.pdf#page=1: covered\n"
        );
    }
}
