use std::{sync::Arc, time::Duration};

use serde::Deserialize;

use crate::{
    domain::lead::{AiAnalysis, ExtendedAnalysis, Lead},
    services::{
        openai_client::{extract_first_json_object, TextGenerator},
        run_control::ProgressSender,
    },
};

/// Produces the sales narrative for one lead. Guaranteed to return a
/// structurally complete result: the model path is retried with a linear
/// backoff and every exhausted or absent path lands on a deterministic
/// fallback built from the lead itself.
pub struct AnalysisEngine {
    generator: Option<Arc<dyn TextGenerator>>,
    progress: ProgressSender,
    retries: u32,
    backoff: Duration,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalysisReply {
    summary: String,
    pain_points: Vec<String>,
    generated_icebreaker: String,
    full_message: String,
    psychological_profile: String,
    business_moment: String,
    sales_angle: String,
    main_obstacle: String,
}

impl AnalysisEngine {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        progress: ProgressSender,
        retries: u32,
        backoff_secs: u64,
    ) -> Self {
        AnalysisEngine {
            generator,
            progress,
            retries,
            backoff: Duration::from_secs(backoff_secs),
        }
    }

    pub async fn analyze(&self, lead: &Lead, context: &str) -> AiAnalysis {
        let Some(generator) = &self.generator else {
            return template_analysis(lead);
        };

        for attempt in 1..=self.retries {
            match self.request_analysis(generator.as_ref(), lead, context).await {
                Ok(analysis) => return analysis,
                Err(e) => {
                    self.progress.emit(format!(
                        "[ANALYZE] Attempt {}/{} failed for {}: {}",
                        attempt, self.retries, lead.company_name, e
                    ));
                    if attempt < self.retries {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
            }
        }

        self.progress.emit(format!(
            "[ANALYZE] Falling back to templated copy for {}",
            lead.company_name
        ));
        fallback_analysis(lead)
    }

    async fn request_analysis(
        &self,
        generator: &dyn TextGenerator,
        lead: &Lead,
        context: &str,
    ) -> anyhow::Result<AiAnalysis> {
        let prompt = build_analysis_prompt(lead, context);
        let reply = generator.complete(&prompt).await?;

        let object = extract_first_json_object(&reply)
            .ok_or_else(|| anyhow::anyhow!("No JSON object in reply"))?;
        let parsed: AnalysisReply = serde_json::from_str(object)?;

        if parsed.summary.trim().is_empty() || parsed.full_message.trim().is_empty() {
            anyhow::bail!("Reply is missing summary or full_message");
        }

        let extended = match parsed.psychological_profile.trim().is_empty()
            && parsed.main_obstacle.trim().is_empty()
        {
            true => None,
            false => Some(ExtendedAnalysis {
                psychological_profile: parsed.psychological_profile,
                business_moment: parsed.business_moment,
                sales_angle: parsed.sales_angle,
                main_obstacle: parsed.main_obstacle,
            }),
        };

        Ok(AiAnalysis {
            summary: parsed.summary,
            pain_points: parsed.pain_points,
            generated_icebreaker: parsed.generated_icebreaker,
            full_message: parsed.full_message,
            extended,
        })
    }
}

fn build_analysis_prompt(lead: &Lead, context: &str) -> String {
    let decision_maker = lead
        .decision_maker
        .as_ref()
        .map(|dm| format!("{} ({})", dm.name, dm.role))
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        r#"You are a B2B sales strategist. Write an outreach narrative for this lead.
Respond with strict JSON only, a single object with exactly these fields:
{{"summary": "...", "pain_points": ["..."], "generated_icebreaker": "...",
"full_message": "...", "psychological_profile": "...", "business_moment": "...",
"sales_angle": "...", "main_obstacle": "..."}}

Company: {company}
Website: {website}
Location: {location}
Decision maker: {decision_maker}
What we know so far: {summary}

Public research context:
{context}"#,
        company = lead.company_name,
        website = lead.website.as_deref().unwrap_or("unknown"),
        location = lead.location.as_deref().unwrap_or("unknown"),
        decision_maker = decision_maker,
        summary = lead.ai_analysis.summary,
        context = context,
    )
}

/// Used when no text generator is configured at all.
fn template_analysis(lead: &Lead) -> AiAnalysis {
    let summary = match lead.ai_analysis.summary.is_empty() {
        true => format!("{} is a {} lead.", lead.company_name, lead.source.as_str()),
        false => lead.ai_analysis.summary.clone(),
    };

    AiAnalysis {
        summary,
        pain_points: vec![
            "Limited online lead flow".to_string(),
            "Manual outreach takes time away from the core business".to_string(),
        ],
        generated_icebreaker: format!("I came across {} recently and was impressed.", lead.company_name),
        full_message: generic_message(lead),
        extended: None,
    }
}

/// Used once model retries are exhausted. Built from the lead's own
/// fields so the pipeline can still ship outreach copy.
fn fallback_analysis(lead: &Lead) -> AiAnalysis {
    let mut analysis = template_analysis(lead);
    if let Some(location) = lead.location.as_deref() {
        analysis.summary = format!("{} Based in {}.", analysis.summary, location);
    }
    analysis
}

fn generic_message(lead: &Lead) -> String {
    format!(
        "Hi,\n\nI came across {company} and wanted to reach out. We help companies \
like yours find qualified customers without adding more manual work. \
Would you be open to a short call this week?\n\nBest regards",
        company = lead.company_name
    )
}
