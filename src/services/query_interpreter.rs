use std::sync::Arc;

use serde::Deserialize;

use crate::{
    domain::search_intent::SearchIntent,
    services::openai_client::{extract_first_json_object, TextGenerator},
};

/// Roles assumed when no text generator is available to infer better ones.
pub const FALLBACK_TARGET_ROLES: [&str; 5] =
    ["Founder", "CEO", "Owner", "Managing Director", "Marketing Director"];

pub struct QueryInterpreter {
    generator: Option<Arc<dyn TextGenerator>>,
    default_location: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct IntentReply {
    query: String,
    industry: String,
    target_roles: Vec<String>,
    location: String,
}

impl QueryInterpreter {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, default_location: String) -> Self {
        QueryInterpreter {
            generator,
            default_location,
        }
    }

    /// Interpretation never fails the run: any model or parse problem
    /// degrades to the deterministic fallback intent.
    pub async fn interpret(&self, free_text_query: &str) -> SearchIntent {
        let Some(generator) = &self.generator else {
            return self.fallback_intent(free_text_query);
        };

        match self.interpret_with_model(generator.as_ref(), free_text_query).await {
            Ok(intent) => intent,
            Err(e) => {
                log::error!("Query interpretation degraded to fallback: {:?}", e);
                self.fallback_intent(free_text_query)
            }
        }
    }

    async fn interpret_with_model(
        &self,
        generator: &dyn TextGenerator,
        free_text_query: &str,
    ) -> anyhow::Result<SearchIntent> {
        let prompt = format!(
            r#"Convert this B2B target profile description into search parameters.
Respond with strict JSON only, a single object with exactly these fields:
{{"query": "...", "industry": "...", "target_roles": ["..."], "location": "..."}}
Use "{default_location}" as location if the description names none.

Target profile: {free_text_query}"#,
            default_location = self.default_location,
            free_text_query = free_text_query,
        );

        let reply = generator.complete(&prompt).await?;
        let object = extract_first_json_object(&reply)
            .ok_or_else(|| anyhow::anyhow!("No JSON object in reply"))?;
        let parsed: IntentReply = serde_json::from_str(object)?;

        let fallback = self.fallback_intent(free_text_query);
        Ok(SearchIntent {
            query: non_empty_or(parsed.query, fallback.query),
            industry: non_empty_or(parsed.industry, fallback.industry),
            target_roles: match parsed.target_roles.is_empty() {
                true => fallback.target_roles,
                false => parsed.target_roles,
            },
            location: non_empty_or(parsed.location, fallback.location),
        })
    }

    fn fallback_intent(&self, free_text_query: &str) -> SearchIntent {
        SearchIntent {
            query: free_text_query.trim().to_string(),
            industry: free_text_query.trim().to_string(),
            target_roles: FALLBACK_TARGET_ROLES.iter().map(|r| r.to_string()).collect(),
            location: self.default_location.clone(),
        }
    }
}

fn non_empty_or(value: String, fallback: String) -> String {
    let trimmed = value.trim();
    match trimmed.is_empty() {
        true => fallback,
        false => trimmed.to_string(),
    }
}
