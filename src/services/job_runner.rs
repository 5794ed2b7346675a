use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{configuration::SearchPolicy, services::run_control::ProgressSender};

// Actor identifiers on the job platform.
pub const GOOGLE_MAPS_SCRAPER: &str = "nwua9Gu5YrADL7ZDj";
pub const CONTACT_SCRAPER: &str = "vdrmO1lXCkhbPjE9j";
pub const DECISION_MAKER_FINDER: &str = "curious_coder~decision-maker-email-extractor";
pub const INSTAGRAM_PROFILE_SCRAPER: &str = "apify~instagram-search-scraper";
pub const LINKEDIN_PROFILE_SCRAPER: &str = "harvestapi~linkedin-profile-search";
pub const GOOGLE_SEARCH_SCRAPER: &str = "apify~google-search-scraper";

// Every 4th status check gets a progress line so long jobs stay visible
// without flooding the feed.
const POLL_REPORT_EVERY: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job {job_type} submission rejected: {reason}")]
    Start { job_type: String, reason: String },
    #[error("job {job_type} ended in terminal state: {status}")]
    Execution { job_type: String, status: String },
    #[error("job {job_type} still running after {polls} status checks")]
    Timeout { job_type: String, polls: u32 },
}

#[derive(Debug, Clone)]
pub struct JobHandle {
    pub run_id: String,
    pub result_handle: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
    Aborted,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
            JobStatus::Aborted => "ABORTED",
        }
    }
}

/// Submit/poll/fetch surface of the remote job platform.
#[async_trait]
pub trait JobService: Send + Sync {
    async fn submit(&self, job_type: &str, payload: &Value) -> anyhow::Result<JobHandle>;
    async fn status(&self, run_id: &str) -> anyhow::Result<JobStatus>;
    async fn fetch(&self, result_handle: &str) -> anyhow::Result<Vec<Value>>;
}

pub struct ApifyClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        ApifyClient::with_base_url(token, "https://api.apify.com".to_string())
    }

    pub fn with_base_url(token: String, base_url: String) -> Self {
        ApifyClient {
            client: Client::new(),
            base_url,
            token,
        }
    }
}

#[derive(Deserialize)]
struct RunEnvelope {
    data: RunData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunData {
    id: String,
    #[serde(default)]
    default_dataset_id: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl JobService for ApifyClient {
    async fn submit(&self, job_type: &str, payload: &Value) -> anyhow::Result<JobHandle> {
        let url = format!(
            "{}/v2/acts/{}/runs?token={}",
            self.base_url, job_type, self.token
        );
        let response = self.client.post(url).json(payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{}: {}", status, body);
        }

        let envelope = response.json::<RunEnvelope>().await?;
        Ok(JobHandle {
            run_id: envelope.data.id,
            result_handle: envelope.data.default_dataset_id,
        })
    }

    async fn status(&self, run_id: &str) -> anyhow::Result<JobStatus> {
        let url = format!(
            "{}/v2/actor-runs/{}?token={}",
            self.base_url, run_id, self.token
        );
        let envelope = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<RunEnvelope>()
            .await?;

        let status = match envelope.data.status.as_str() {
            "SUCCEEDED" => JobStatus::Succeeded,
            "FAILED" => JobStatus::Failed,
            "ABORTED" | "TIMED-OUT" => JobStatus::Aborted,
            _ => JobStatus::Pending,
        };
        Ok(status)
    }

    async fn fetch(&self, result_handle: &str) -> anyhow::Result<Vec<Value>> {
        let url = format!(
            "{}/v2/datasets/{}/items?token={}",
            self.base_url, result_handle, self.token
        );
        let items = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Value>>()
            .await?;
        Ok(items)
    }
}

/// Drives one remote job from submission to its result set, checking for
/// cancellation on every status poll.
pub struct RemoteJobRunner {
    service: Arc<dyn JobService>,
    cancel: CancellationToken,
    progress: ProgressSender,
    poll_interval: Duration,
    poll_cap: u32,
}

impl RemoteJobRunner {
    pub fn new(
        service: Arc<dyn JobService>,
        cancel: CancellationToken,
        progress: ProgressSender,
        policy: &SearchPolicy,
    ) -> Self {
        RemoteJobRunner {
            service,
            cancel,
            progress,
            poll_interval: Duration::from_secs(policy.poll_interval_secs),
            poll_cap: policy.poll_cap,
        }
    }

    /// Returns the job's records, or an empty list when the run was
    /// cancelled while waiting. A cancelled job is abandoned, never resumed.
    pub async fn run(&self, job_type: &str, payload: Value) -> Result<Vec<Value>, JobError> {
        let handle = self
            .service
            .submit(job_type, &payload)
            .await
            .map_err(|e| JobError::Start {
                job_type: job_type.to_string(),
                reason: e.to_string(),
            })?;

        self.progress
            .emit(format!("[JOB] {} started (run {})", job_type, handle.run_id));

        let mut polls = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                self.progress
                    .emit(format!("[JOB] {} abandoned, run was stopped", job_type));
                return Ok(vec![]);
            }
            if polls >= self.poll_cap {
                return Err(JobError::Timeout {
                    job_type: job_type.to_string(),
                    polls,
                });
            }

            tokio::time::sleep(self.poll_interval).await;
            polls += 1;

            let status = match self.service.status(&handle.run_id).await {
                Ok(status) => status,
                Err(e) => {
                    log::error!("Status check failed for run {}: {:?}", handle.run_id, e);
                    continue;
                }
            };

            match status {
                JobStatus::Succeeded => break,
                JobStatus::Failed | JobStatus::Aborted => {
                    return Err(JobError::Execution {
                        job_type: job_type.to_string(),
                        status: status.as_str().to_string(),
                    })
                }
                JobStatus::Pending => {
                    if polls % POLL_REPORT_EVERY == 0 {
                        self.progress.emit(format!(
                            "[JOB] {} still running after {} checks",
                            job_type, polls
                        ));
                    }
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Ok(vec![]);
        }

        self.service
            .fetch(&handle.result_handle)
            .await
            .map_err(|e| JobError::Execution {
                job_type: job_type.to_string(),
                status: format!("result fetch failed: {}", e),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicU32, Ordering},
            Mutex,
        },
    };

    use serde_json::json;

    use super::*;

    struct ScriptedJobService {
        reject_submit: bool,
        statuses: Mutex<VecDeque<JobStatus>>,
        items: Vec<Value>,
        status_calls: AtomicU32,
        fetch_calls: AtomicU32,
        cancel_on_status_call: Option<(u32, CancellationToken)>,
    }

    impl ScriptedJobService {
        fn succeeding_after(pending_polls: usize, items: Vec<Value>) -> Self {
            let mut statuses: VecDeque<JobStatus> =
                std::iter::repeat(JobStatus::Pending).take(pending_polls).collect();
            statuses.push_back(JobStatus::Succeeded);
            ScriptedJobService {
                reject_submit: false,
                statuses: Mutex::new(statuses),
                items,
                status_calls: AtomicU32::new(0),
                fetch_calls: AtomicU32::new(0),
                cancel_on_status_call: None,
            }
        }
    }

    #[async_trait]
    impl JobService for ScriptedJobService {
        async fn submit(&self, job_type: &str, _payload: &Value) -> anyhow::Result<JobHandle> {
            if self.reject_submit {
                anyhow::bail!("402 Payment Required");
            }
            Ok(JobHandle {
                run_id: format!("run-{}", job_type),
                result_handle: "dataset-1".to_string(),
            })
        }

        async fn status(&self, _run_id: &str) -> anyhow::Result<JobStatus> {
            let calls = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((cancel_at, token)) = &self.cancel_on_status_call {
                if calls >= *cancel_at {
                    token.cancel();
                }
            }
            let next = self.statuses.lock().unwrap().pop_front();
            Ok(next.unwrap_or(JobStatus::Pending))
        }

        async fn fetch(&self, _result_handle: &str) -> anyhow::Result<Vec<Value>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.clone())
        }
    }

    fn runner(service: Arc<dyn JobService>, cancel: CancellationToken) -> RemoteJobRunner {
        RemoteJobRunner::new(
            service,
            cancel,
            ProgressSender::log_only(),
            &SearchPolicy::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_submission_is_a_start_error() {
        let service = Arc::new(ScriptedJobService {
            reject_submit: true,
            statuses: Mutex::new(VecDeque::new()),
            items: vec![],
            status_calls: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
            cancel_on_status_call: None,
        });
        let runner = runner(service, CancellationToken::new());

        let result = runner.run("actor-x", json!({})).await;

        assert!(matches!(result, Err(JobError::Start { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_terminal_state_is_an_execution_error() {
        let service = Arc::new(ScriptedJobService {
            reject_submit: false,
            statuses: Mutex::new(VecDeque::from([JobStatus::Pending, JobStatus::Failed])),
            items: vec![],
            status_calls: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
            cancel_on_status_call: None,
        });
        let runner = runner(service, CancellationToken::new());

        let result = runner.run("actor-x", json!({})).await;

        match result {
            Err(JobError::Execution { status, .. }) => assert_eq!(status, "FAILED"),
            other => panic!("expected execution error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_finishing_job_times_out_at_the_poll_cap() {
        let service = Arc::new(ScriptedJobService {
            reject_submit: false,
            statuses: Mutex::new(VecDeque::new()),
            items: vec![],
            status_calls: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
            cancel_on_status_call: None,
        });
        let runner = runner(service.clone(), CancellationToken::new());

        let result = runner.run("actor-x", json!({})).await;

        match result {
            Err(JobError::Timeout { polls, .. }) => assert_eq!(polls, 60),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(service.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_while_polling_returns_empty_without_fetching() {
        let cancel = CancellationToken::new();
        let service = Arc::new(ScriptedJobService {
            reject_submit: false,
            statuses: Mutex::new(VecDeque::new()),
            items: vec![json!({"title": "never delivered"})],
            status_calls: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
            cancel_on_status_call: Some((3, cancel.clone())),
        });
        let runner = runner(service.clone(), cancel);

        let result = runner.run("actor-x", json!({})).await.unwrap();

        assert!(result.is_empty());
        assert_eq!(service.status_calls.load(Ordering::SeqCst), 3);
        assert_eq!(service.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeded_job_yields_its_records() {
        let service = Arc::new(ScriptedJobService::succeeding_after(
            5,
            vec![json!({"title": "Acme"}), json!({"title": "Fresh"})],
        ));
        let runner = runner(service, CancellationToken::new());

        let result = runner.run("actor-x", json!({})).await.unwrap();

        assert_eq!(result.len(), 2);
    }
}
