use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{candidate::CandidateRecord, lead::{Lead, LeadStatus}},
    services::{
        domain_matcher::DomainMatcher,
        job_runner::{RemoteJobRunner, CONTACT_SCRAPER},
        run_control::ProgressSender,
    },
};

/// Crawls the websites of leads that came out of discovery without an
/// email, in bounded batches, and merges whatever contact data the lookup
/// job reports back onto the originating leads.
pub struct ContactEnrichmentBatcher<'a> {
    runner: &'a RemoteJobRunner,
    cancel: &'a CancellationToken,
    progress: &'a ProgressSender,
    batch_size: usize,
}

impl<'a> ContactEnrichmentBatcher<'a> {
    pub fn new(
        runner: &'a RemoteJobRunner,
        cancel: &'a CancellationToken,
        progress: &'a ProgressSender,
        batch_size: usize,
    ) -> Self {
        ContactEnrichmentBatcher {
            runner,
            cancel,
            progress,
            batch_size,
        }
    }

    /// Best effort per batch: a failed batch is logged and skipped, the
    /// remaining batches still run.
    pub async fn enrich(&self, leads: &mut [Lead]) {
        let targets: Vec<usize> = leads
            .iter()
            .enumerate()
            .filter(|(_, lead)| !lead.has_email() && lead.website.is_some())
            .map(|(i, _)| i)
            .collect();

        if targets.is_empty() {
            return;
        }

        self.progress.emit(format!(
            "[ENRICH] Looking up contact data for {} leads without an email",
            targets.len()
        ));

        let matcher = DomainMatcher::build(
            targets
                .iter()
                .map(|&i| (leads[i].website.clone().unwrap(), i)),
        );

        for (batch_number, batch) in targets.chunks(self.batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                self.progress.emit("[ENRICH] Stopped before next batch");
                return;
            }

            let start_urls: Vec<Value> = batch
                .iter()
                .map(|&i| json!({ "url": format!("https://{}", leads[i].website.as_ref().unwrap()) }))
                .collect();
            let payload = json!({
                "startUrls": start_urls,
                "maxRequestsPerWebsite": 3,
                "sameDomainOnly": true,
            });

            match self.runner.run(CONTACT_SCRAPER, payload).await {
                Ok(records) => {
                    let merged = merge_contact_records(leads, &matcher, &records);
                    self.progress.emit(format!(
                        "[ENRICH] Batch {}: {} records, {} leads updated",
                        batch_number + 1,
                        records.len(),
                        merged
                    ));
                }
                Err(e) => {
                    self.progress.emit(format!(
                        "[ENRICH] Batch {} failed, moving on: {}",
                        batch_number + 1,
                        e
                    ));
                }
            }
        }
    }
}

fn merge_contact_records(leads: &mut [Lead], matcher: &DomainMatcher, records: &[Value]) -> usize {
    let mut merged = 0;

    for value in records {
        let Some(record) = CandidateRecord::from_value(value) else {
            continue;
        };
        let Some(domain) = record.reported_domain() else {
            continue;
        };
        let Some(idx) = matcher.find(&domain) else {
            continue;
        };

        let lead = &mut leads[idx];
        let mut updated = false;

        if !lead.has_email() {
            if let Some(email) = record.first_email() {
                lead.set_email(email);
                lead.status = LeadStatus::Enriched;
                updated = true;
            }
        }

        if let Some(dm) = lead.decision_maker.as_mut() {
            if dm.phone.is_none() {
                dm.phone = record.first_phone();
            }
            if dm.linkedin.is_none() {
                dm.linkedin = record.linked_in.clone().filter(|s| !s.is_empty());
            }
            if dm.facebook.is_none() {
                dm.facebook = record.facebook.clone().filter(|s| !s.is_empty());
            }
            if dm.instagram.is_none() {
                dm.instagram = record.instagram.clone().filter(|s| !s.is_empty());
            }
        }

        if updated {
            merged += 1;
        }
    }

    merged
}
