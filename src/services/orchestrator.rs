use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::{
    configuration::{SearchPolicy, Settings},
    domain::{
        candidate::CandidateRecord,
        contact::is_personal_email,
        lead::{Lead, LeadStatus, PlatformSource, SearchMode},
        search_intent::SearchIntent,
    },
    services::{
        analysis::AnalysisEngine,
        contact_enricher::ContactEnrichmentBatcher,
        dedup::{DeduplicationFilter, ExclusionSet},
        deep_research::DeepResearchAgent,
        domain_matcher::DomainMatcher,
        job_runner::{
            ApifyClient, JobService, RemoteJobRunner, DECISION_MAKER_FINDER, GOOGLE_MAPS_SCRAPER,
            INSTAGRAM_PROFILE_SCRAPER, LINKEDIN_PROFILE_SCRAPER,
        },
        openai_client::{OpenaiClient, TextGenerator},
        query_interpreter::QueryInterpreter,
        run_control::{ProgressSender, ResultSender},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Job platform API token is missing")]
    MissingJobToken,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub source: PlatformSource,
    #[serde(default = "default_mode")]
    pub mode: SearchMode,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_mode() -> SearchMode {
    SearchMode::Fast
}

fn default_max_results() -> usize {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Completed,
    Stopped,
    Failed,
}

/// Top-level controller. Owns the run from free-text query to delivered
/// lead list: interpretation, the fetch-until-target loop, enrichment,
/// research and analysis, with cooperative cancellation throughout.
pub struct SearchOrchestrator {
    jobs: Option<Arc<dyn JobService>>,
    generator: Option<Arc<dyn TextGenerator>>,
    policy: SearchPolicy,
    default_location: String,
}

impl SearchOrchestrator {
    pub fn new(
        jobs: Option<Arc<dyn JobService>>,
        generator: Option<Arc<dyn TextGenerator>>,
        policy: SearchPolicy,
        default_location: String,
    ) -> Self {
        SearchOrchestrator {
            jobs,
            generator,
            policy,
            default_location,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let jobs = settings
            .api_keys
            .apify()
            .map(|token| Arc::new(ApifyClient::new(token.to_string())) as Arc<dyn JobService>);
        let generator = settings
            .api_keys
            .openai()
            .map(|key| Arc::new(OpenaiClient::new(key.to_string())) as Arc<dyn TextGenerator>);

        SearchOrchestrator::new(
            jobs,
            generator,
            settings.search.policy.clone(),
            settings.search.default_location.clone(),
        )
    }

    /// Runs one search to its terminal state. The result sink receives the
    /// accepted leads exactly once, whatever that terminal state is.
    pub async fn start_search(
        &self,
        request: SearchRequest,
        exclusions: ExclusionSet,
        cancel: CancellationToken,
        progress: ProgressSender,
        results: ResultSender,
    ) -> RunOutcome {
        let (outcome, leads) = self
            .run_pipeline(&request, &exclusions, &cancel, &progress)
            .await;

        let with_email = leads.iter().filter(|l| l.has_email()).count();
        let with_decision_maker = leads
            .iter()
            .filter(|l| l.decision_maker_name().is_some())
            .count();
        progress.emit(format!(
            "[DONE] {} leads delivered ({} with email, {} with a named decision maker)",
            leads.len(),
            with_email,
            with_decision_maker
        ));

        results.deliver(leads);
        outcome
    }

    async fn run_pipeline(
        &self,
        request: &SearchRequest,
        exclusions: &ExclusionSet,
        cancel: &CancellationToken,
        progress: &ProgressSender,
    ) -> (RunOutcome, Vec<Lead>) {
        let Some(jobs) = self.jobs.clone() else {
            progress.emit(format!("[SETUP] {}", SetupError::MissingJobToken));
            return (RunOutcome::Failed, vec![]);
        };

        let target = request.max_results.max(1);
        progress.emit(format!(
            "[START] Searching {} for up to {} leads: \"{}\"",
            request.source.as_str(),
            target,
            request.query
        ));

        let interpreter =
            QueryInterpreter::new(self.generator.clone(), self.default_location.clone());
        let intent = interpreter.interpret(&request.query).await;
        progress.emit(format!(
            "[INTENT] query=\"{}\" industry=\"{}\" location=\"{}\"",
            intent.query, intent.industry, intent.location
        ));

        let runner = RemoteJobRunner::new(jobs, cancel.clone(), progress.clone(), &self.policy);
        let engine = AnalysisEngine::new(
            self.generator.clone(),
            progress.clone(),
            self.policy.analysis_retries,
            self.policy.analysis_backoff_secs,
        );
        let research = DeepResearchAgent::new(&runner, self.policy.research_result_cap);

        let mut dedup = DeduplicationFilter::new(exclusions);
        let mut accepted: Vec<Lead> = vec![];
        let mut stopped = false;
        let mut attempt = 0;

        while accepted.len() < target && attempt < self.policy.attempt_budget {
            if cancel.is_cancelled() {
                stopped = true;
                break;
            }
            attempt += 1;

            let shortfall = target - accepted.len();
            let fetch_count = shortfall * self.policy.overfetch_multiplier;
            progress.emit(format!(
                "[ATTEMPT {}/{}] Requesting {} candidates for {} open slots",
                attempt, self.policy.attempt_budget, fetch_count, shortfall
            ));

            let (actor, payload) = discovery_job(request, &intent, fetch_count);
            let records = match runner.run(actor, payload).await {
                Ok(records) => records,
                Err(e) => {
                    progress.emit(format!(
                        "[ATTEMPT {}] Discovery failed, moving to next attempt: {}",
                        attempt, e
                    ));
                    continue;
                }
            };

            if cancel.is_cancelled() {
                stopped = true;
                break;
            }

            if records.is_empty() {
                progress.emit(format!(
                    "[ATTEMPT {}] Discovery returned nothing, search space exhausted",
                    attempt
                ));
                break;
            }

            let mut fresh: Vec<Lead> = vec![];
            let mut duplicates = 0;
            for value in &records {
                let Some(record) = CandidateRecord::from_value(value) else {
                    continue;
                };
                let Some(lead) = record.into_lead(request.source) else {
                    continue;
                };
                let url = lead.website.as_deref().or(lead.social_url.as_deref());
                if dedup.is_duplicate(&lead.company_name, url) {
                    duplicates += 1;
                    continue;
                }
                dedup.remember(&lead);
                fresh.push(lead);
            }
            progress.emit(format!(
                "[ATTEMPT {}] {} records, {} new after deduplication ({} duplicates)",
                attempt,
                records.len(),
                fresh.len(),
                duplicates
            ));

            if fresh.is_empty() {
                progress.emit(format!(
                    "[ATTEMPT {}] Nothing new left to work, stopping early",
                    attempt
                ));
                break;
            }

            if request.source.requires_email() {
                let batcher = ContactEnrichmentBatcher::new(
                    &runner,
                    cancel,
                    progress,
                    self.policy.enrichment_batch_size,
                );
                batcher.enrich(&mut fresh).await;

                let mut promoted = 0;
                let mut discarded = 0;
                for mut lead in fresh {
                    if accepted.len() >= target {
                        break;
                    }
                    match lead.has_email() {
                        true => {
                            lead.status = LeadStatus::Enriched;
                            accepted.push(lead);
                            promoted += 1;
                        }
                        false => discarded += 1,
                    }
                }
                progress.emit(format!(
                    "[ATTEMPT {}] Accepted {} leads with email, discarded {} without ({}/{} so far)",
                    attempt,
                    promoted,
                    discarded,
                    accepted.len(),
                    target
                ));
            } else {
                // Profile platforms have no email gate; a candidate earns
                // its slot by surviving analysis.
                for mut lead in fresh {
                    if accepted.len() >= target {
                        break;
                    }
                    if cancel.is_cancelled() {
                        stopped = true;
                        break;
                    }
                    let context = match wants_research(request.mode, &lead) {
                        true => research.research(&lead).await,
                        false => String::new(),
                    };
                    let analysis = engine.analyze(&lead, &context).await;
                    lead.ai_analysis = analysis;
                    lead.status = LeadStatus::Ready;
                    accepted.push(lead);
                }
                progress.emit(format!(
                    "[ATTEMPT {}] {}/{} profiles analyzed and accepted",
                    attempt,
                    accepted.len(),
                    target
                ));
                if stopped {
                    break;
                }
            }

            if cancel.is_cancelled() {
                stopped = true;
                break;
            }
        }

        if !stopped && request.source.requires_email() && !accepted.is_empty() {
            self.find_decision_makers(&runner, &mut accepted, cancel, progress)
                .await;
        }

        for lead in accepted.iter_mut() {
            if lead.status == LeadStatus::Ready {
                continue;
            }
            if cancel.is_cancelled() {
                stopped = true;
                break;
            }
            let context = match wants_research(request.mode, lead) {
                true => research.research(lead).await,
                false => String::new(),
            };
            let analysis = engine.analyze(lead, &context).await;
            lead.ai_analysis = analysis;
            lead.status = LeadStatus::Ready;
        }

        let outcome = match stopped || cancel.is_cancelled() {
            true => RunOutcome::Stopped,
            false => RunOutcome::Completed,
        };
        (outcome, accepted)
    }

    /// Puts a name and role on the freshly enriched leads. Capped to the
    /// top few to keep platform credit usage sane.
    async fn find_decision_makers(
        &self,
        runner: &RemoteJobRunner,
        leads: &mut [Lead],
        cancel: &CancellationToken,
        progress: &ProgressSender,
    ) {
        if cancel.is_cancelled() {
            return;
        }

        let targets: Vec<usize> = leads
            .iter()
            .enumerate()
            .filter(|(_, l)| l.has_email() && l.website.is_some())
            .map(|(i, _)| i)
            .take(self.policy.decision_maker_lookup_cap)
            .collect();
        if targets.is_empty() {
            return;
        }

        progress.emit(format!(
            "[RESEARCH] Looking up decision makers for the top {} leads",
            targets.len()
        ));

        let urls: Vec<String> = targets
            .iter()
            .map(|&i| format!("https://{}", leads[i].website.as_ref().unwrap()))
            .collect();
        let payload = json!({ "urls": urls, "maxPagesPerDomain": 5 });

        let records = match runner.run(DECISION_MAKER_FINDER, payload).await {
            Ok(records) => records,
            Err(e) => {
                progress.emit(format!("[RESEARCH] Decision maker lookup failed: {}", e));
                return;
            }
        };

        let matcher = DomainMatcher::build(
            targets
                .iter()
                .map(|&i| (leads[i].website.clone().unwrap(), i)),
        );
        let mut found = 0;
        for value in &records {
            let Some(record) = CandidateRecord::from_value(value) else {
                continue;
            };
            let Some(domain) = record.reported_domain() else {
                continue;
            };
            let Some(idx) = matcher.find(&domain) else {
                continue;
            };
            let Some(top) = record.decision_makers.first() else {
                continue;
            };

            let Some(dm) = leads[idx].decision_maker.as_mut() else {
                continue;
            };
            if let Some(name) = top.name.clone().filter(|n| !n.is_empty()) {
                dm.name = name;
            }
            dm.role = top
                .title
                .clone()
                .or_else(|| top.position.clone())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "Owner".to_string());
            if let Some(email) = top.email.clone().filter(|e| is_personal_email(e)) {
                dm.email = email;
            }
            if let Some(linkedin) = top.linkedin.clone().filter(|l| !l.is_empty()) {
                dm.linkedin = Some(linkedin);
            }
            found += 1;
        }
        progress.emit(format!(
            "[RESEARCH] Decision makers identified for {} leads",
            found
        ));
    }
}

fn wants_research(mode: SearchMode, lead: &Lead) -> bool {
    match mode {
        SearchMode::Deep => true,
        SearchMode::Fast => lead.decision_maker_name().is_some(),
    }
}

fn discovery_job(
    request: &SearchRequest,
    intent: &SearchIntent,
    fetch_count: usize,
) -> (&'static str, Value) {
    match request.source {
        PlatformSource::Gmaps => (
            GOOGLE_MAPS_SCRAPER,
            json!({
                "searchStringsArray": [format!("{} in {}", intent.query, intent.location)],
                "maxCrawledPlacesPerSearch": fetch_count,
                "language": "en",
                "includeWebsiteEmail": true,
                "scrapeContacts": true,
                "maxImages": 0,
                "maxReviews": 0,
            }),
        ),
        PlatformSource::Instagram => (
            INSTAGRAM_PROFILE_SCRAPER,
            json!({
                "search": intent.query,
                "searchType": "user",
                "resultsLimit": fetch_count,
            }),
        ),
        PlatformSource::Linkedin => (
            LINKEDIN_PROFILE_SCRAPER,
            json!({
                "searchQuery": format!(
                    "{} {}",
                    intent.target_roles.first().map(String::as_str).unwrap_or("Founder"),
                    intent.industry
                ),
                "location": intent.location,
                "maxResults": fetch_count,
            }),
        ),
    }
}
