use itertools::Itertools;
use serde::Deserialize;
use serde_json::json;

use crate::{
    domain::lead::Lead,
    services::job_runner::{RemoteJobRunner, GOOGLE_SEARCH_SCRAPER},
};

/// Gathers public context about a lead through one secondary search job.
/// Research is advisory input to analysis: every failure collapses to an
/// empty context, never to an error.
pub struct DeepResearchAgent<'a> {
    runner: &'a RemoteJobRunner,
    result_cap: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SearchResultRecord {
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrganicResult {
    title: String,
    description: String,
}

impl<'a> DeepResearchAgent<'a> {
    pub fn new(runner: &'a RemoteJobRunner, result_cap: usize) -> Self {
        DeepResearchAgent { runner, result_cap }
    }

    pub async fn research(&self, lead: &Lead) -> String {
        let queries = build_research_queries(lead);
        if queries.is_empty() {
            return String::new();
        }

        let payload = json!({
            "queries": queries.iter().join("\n"),
            "resultsPerPage": self.result_cap,
            "maxPagesPerQuery": 1,
        });

        let records = match self.runner.run(GOOGLE_SEARCH_SCRAPER, payload).await {
            Ok(records) => records,
            Err(e) => {
                log::error!("Research job for {} failed: {:?}", lead.company_name, e);
                return String::new();
            }
        };

        let mut lines: Vec<String> = vec![];
        for value in &records {
            let Ok(record) = serde_json::from_value::<SearchResultRecord>(value.clone()) else {
                continue;
            };
            for result in record.organic_results.into_iter().take(self.result_cap) {
                let title = result.title.trim();
                let description = result.description.trim();
                match (title.is_empty(), description.is_empty()) {
                    (false, false) => lines.push(format!("{}: {}", title, description)),
                    (false, true) => lines.push(title.to_string()),
                    (true, false) => lines.push(description.to_string()),
                    (true, true) => {}
                }
            }
        }

        lines.join("\n")
    }
}

/// Up to four targeted queries; only the ones whose inputs exist are
/// included.
pub fn build_research_queries(lead: &Lead) -> Vec<String> {
    let mut queries = vec![];
    let company = lead.company_name.trim();

    if !company.is_empty() {
        queries.push(format!("\"{}\" company profile", company));
    }

    if let Some(dm_name) = lead.decision_maker_name() {
        if !company.is_empty() {
            queries.push(format!("\"{}\" \"{}\" interview OR announcement", dm_name, company));
        }
        queries.push(format!("site:linkedin.com/in \"{}\"", dm_name));
    }

    if let Some(website) = lead.website.as_deref().filter(|w| !w.is_empty()) {
        queries.push(format!("site:{} about", website));
    }

    queries
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;

    use crate::{
        configuration::SearchPolicy,
        domain::{contact::DecisionMaker, lead::PlatformSource},
        services::{
            job_runner::{JobHandle, JobService, JobStatus},
            run_control::ProgressSender,
        },
    };

    use super::*;

    struct SingleResultService {
        items: Vec<Value>,
        fail: bool,
        submits: AtomicU32,
    }

    #[async_trait]
    impl JobService for SingleResultService {
        async fn submit(&self, _job_type: &str, _payload: &Value) -> anyhow::Result<JobHandle> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("500 Internal Server Error");
            }
            Ok(JobHandle {
                run_id: "run-1".to_string(),
                result_handle: "dataset-1".to_string(),
            })
        }

        async fn status(&self, _run_id: &str) -> anyhow::Result<JobStatus> {
            Ok(JobStatus::Succeeded)
        }

        async fn fetch(&self, _result_handle: &str) -> anyhow::Result<Vec<Value>> {
            Ok(self.items.clone())
        }
    }

    fn full_lead() -> Lead {
        let mut lead = Lead::new("l-1".to_string(), PlatformSource::Gmaps, "Acme".to_string());
        lead.website = Some("acme.com".to_string());
        lead.decision_maker = Some(DecisionMaker {
            name: "Maria Lopez".to_string(),
            email: "maria@acme.com".to_string(),
            ..DecisionMaker::default()
        });
        lead
    }

    fn runner_with(service: Arc<dyn JobService>) -> RemoteJobRunner {
        RemoteJobRunner::new(
            service,
            CancellationToken::new(),
            ProgressSender::log_only(),
            &SearchPolicy::default(),
        )
    }

    #[test]
    fn all_four_queries_built_when_inputs_exist() {
        let queries = build_research_queries(&full_lead());

        assert_eq!(queries.len(), 4);
        assert!(queries[0].contains("Acme"));
        assert!(queries[2].contains("linkedin.com/in"));
        assert!(queries[3].starts_with("site:acme.com"));
    }

    #[test]
    fn queries_without_inputs_are_skipped() {
        let lead = Lead::new("l-1".to_string(), PlatformSource::Gmaps, "Acme".to_string());

        let queries = build_research_queries(&lead);

        assert_eq!(queries.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lead_without_any_inputs_issues_no_job() {
        let service = Arc::new(SingleResultService {
            items: vec![],
            fail: false,
            submits: AtomicU32::new(0),
        });
        let runner = runner_with(service.clone());
        let agent = DeepResearchAgent::new(&runner, 5);

        let lead = Lead::new("l-1".to_string(), PlatformSource::Gmaps, "".to_string());
        let context = agent.research(&lead).await;

        assert!(context.is_empty());
        assert_eq!(service.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn organic_results_become_a_context_blob() {
        let items = vec![serde_json::json!({
            "organicResults": [
                {"title": "Acme raises funding", "description": "Series A round"},
                {"title": "Acme opens Madrid office", "description": ""},
            ]
        })];
        let service = Arc::new(SingleResultService {
            items,
            fail: false,
            submits: AtomicU32::new(0),
        });
        let runner = runner_with(service);
        let agent = DeepResearchAgent::new(&runner, 5);

        let context = agent.research(&full_lead()).await;

        assert!(context.contains("Acme raises funding: Series A round"));
        assert!(context.contains("Acme opens Madrid office"));
    }

    #[tokio::test(start_paused = true)]
    async fn job_failure_collapses_to_empty_context() {
        let service = Arc::new(SingleResultService {
            items: vec![],
            fail: true,
            submits: AtomicU32::new(0),
        });
        let runner = runner_with(service);
        let agent = DeepResearchAgent::new(&runner, 5);

        let context = agent.research(&full_lead()).await;

        assert!(context.is_empty());
    }
}
