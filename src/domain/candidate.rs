use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::{
        contact::{first_personal_email, DecisionMaker},
        lead::{Lead, LeadStatus, PlatformSource},
    },
    services::dedup::normalize_key,
};

/// Raw record surfaced by a discovery or lookup job, before acceptance as a
/// Lead. The remote actors are not consistent about field names, so most
/// fields are optional and a few carry aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CandidateRecord {
    pub place_id: Option<String>,
    pub id: Option<String>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub website: Option<String>,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub address: Option<String>,
    pub full_address: Option<String>,
    pub email: Option<String>,
    pub emails: Vec<String>,
    pub phone: Option<String>,
    pub phones: Vec<String>,
    pub linked_in: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub category_name: Option<String>,
    pub reviews_count: Option<i64>,
    pub total_score: Option<f64>,
    pub decision_makers: Vec<DecisionMakerRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DecisionMakerRecord {
    pub name: Option<String>,
    pub title: Option<String>,
    pub position: Option<String>,
    pub email: Option<String>,
    pub linkedin: Option<String>,
}

impl CandidateRecord {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn display_name(&self) -> Option<String> {
        [&self.title, &self.name, &self.full_name, &self.username]
            .into_iter()
            .flatten()
            .map(|n| n.trim())
            .find(|n| !n.is_empty())
            .map(|n| n.to_string())
    }

    pub fn first_email(&self) -> Option<String> {
        let single = self.email.iter().map(|e| e.as_str());
        let listed = self.emails.iter().map(|e| e.as_str());
        first_personal_email(single.chain(listed))
    }

    pub fn first_phone(&self) -> Option<String> {
        self.phone
            .clone()
            .or_else(|| self.phones.first().cloned())
            .filter(|p| !p.is_empty())
    }

    /// Domain the lookup job says this record belongs to. The actors do not
    /// echo our input identifier, so this is all the join key we get.
    pub fn reported_domain(&self) -> Option<String> {
        self.domain
            .clone()
            .or_else(|| self.url.clone())
            .or_else(|| self.website.clone())
            .filter(|d| !d.is_empty())
    }

    /// Promote the raw record into a Lead. Records without any usable name
    /// are dropped here rather than surfacing as empty leads.
    pub fn into_lead(self, source: PlatformSource) -> Option<Lead> {
        let company_name = self.display_name()?;

        let id = self
            .place_id
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| format!("lead-{}", Uuid::new_v4()));

        let website = self
            .website
            .as_deref()
            .map(normalize_key)
            .filter(|w| !w.is_empty());
        let social_url = match source {
            PlatformSource::Gmaps => None,
            _ => self
                .url
                .clone()
                .or_else(|| {
                    self.username
                        .as_ref()
                        .map(|u| format!("instagram.com/{}", u))
                        .filter(|_| source == PlatformSource::Instagram)
                })
                .filter(|u| !u.is_empty()),
        };

        let email = self.first_email();
        let decision_maker = email.map(|email| DecisionMaker {
            email,
            phone: self.first_phone(),
            linkedin: self.linked_in.clone().filter(|s| !s.is_empty()),
            facebook: self.facebook.clone().filter(|s| !s.is_empty()),
            instagram: self.instagram.clone().filter(|s| !s.is_empty()),
            ..DecisionMaker::default()
        });

        let status = match decision_maker {
            Some(_) => LeadStatus::Enriched,
            None => LeadStatus::Scraped,
        };

        let mut lead = Lead::new(id, source, company_name);
        lead.website = website;
        lead.social_url = social_url;
        lead.location = self.address.clone().or(self.full_address.clone());
        lead.ai_analysis.summary = self.seed_summary();
        lead.decision_maker = decision_maker;
        lead.status = status;

        Some(lead)
    }

    fn seed_summary(&self) -> String {
        let category = self.category_name.as_deref().unwrap_or("Company");
        match (self.reviews_count, self.total_score) {
            (Some(reviews), Some(score)) => {
                format!("{} with {} reviews ({}/5 rating)", category, reviews, score)
            }
            (Some(reviews), None) => format!("{} with {} reviews", category, reviews),
            _ => category.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn gmaps_record_becomes_enriched_lead() {
        let value = json!({
            "placeId": "place-77",
            "title": "Acme Bakery",
            "website": "https://www.acme-bakery.es/",
            "address": "Calle Mayor 1, Madrid",
            "email": "hola@acme-bakery.es",
            "phone": "+34 600 000 000",
            "categoryName": "Bakery",
            "reviewsCount": 42,
            "totalScore": 4.6
        });

        let record = CandidateRecord::from_value(&value).unwrap();
        let lead = record.into_lead(PlatformSource::Gmaps).unwrap();

        assert_eq!(lead.id, "place-77");
        assert_eq!(lead.company_name, "Acme Bakery");
        assert_eq!(lead.website.as_deref(), Some("acme-bakery.es"));
        assert_eq!(lead.email(), Some("hola@acme-bakery.es"));
        assert_eq!(lead.status, LeadStatus::Enriched);
        assert_eq!(lead.ai_analysis.summary, "Bakery with 42 reviews (4.6/5 rating)");
    }

    #[test]
    fn record_without_email_stays_scraped() {
        let value = json!({
            "title": "Acme Bakery",
            "website": "acme-bakery.es",
            "emails": ["noreply@acme-bakery.es"]
        });

        let lead = CandidateRecord::from_value(&value)
            .unwrap()
            .into_lead(PlatformSource::Gmaps)
            .unwrap();

        assert_eq!(lead.status, LeadStatus::Scraped);
        assert!(lead.decision_maker.is_none());
    }

    #[test]
    fn nameless_record_is_dropped() {
        let value = json!({ "website": "acme.es" });
        let record = CandidateRecord::from_value(&value).unwrap();

        assert!(record.into_lead(PlatformSource::Gmaps).is_none());
    }

    #[test]
    fn instagram_record_gets_social_url() {
        let value = json!({ "username": "acme.studio", "fullName": "Acme Studio" });
        let lead = CandidateRecord::from_value(&value)
            .unwrap()
            .into_lead(PlatformSource::Instagram)
            .unwrap();

        assert_eq!(lead.company_name, "Acme Studio");
        assert_eq!(lead.social_url.as_deref(), Some("instagram.com/acme.studio"));
        assert!(lead.id.starts_with("lead-"));
    }
}
