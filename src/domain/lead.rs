use serde::{Deserialize, Serialize};

use crate::domain::contact::DecisionMaker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformSource {
    Gmaps,
    Instagram,
    Linkedin,
}

impl PlatformSource {
    /// Gmaps leads are worthless without an email; profile platforms are
    /// accepted once analysis has produced outreach copy for them.
    pub fn requires_email(&self) -> bool {
        matches!(self, PlatformSource::Gmaps)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformSource::Gmaps => "gmaps",
            PlatformSource::Instagram => "instagram",
            PlatformSource::Linkedin => "linkedin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Fast,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    Scraped,
    Enriched,
    Ready,
    // Contacted and Replied are set by the outreach side, never by this
    // pipeline.
    Contacted,
    Replied,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub summary: String,
    pub pain_points: Vec<String>,
    pub generated_icebreaker: String,
    pub full_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedAnalysis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedAnalysis {
    pub psychological_profile: String,
    pub business_moment: String,
    pub sales_angle: String,
    pub main_obstacle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub source: PlatformSource,
    pub company_name: String,
    /// Normalized: no scheme, no leading www., no trailing slash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_maker: Option<DecisionMaker>,
    pub ai_analysis: AiAnalysis,
    pub status: LeadStatus,
}

impl Lead {
    pub fn new(id: String, source: PlatformSource, company_name: String) -> Self {
        Lead {
            id,
            source,
            company_name,
            website: None,
            social_url: None,
            location: None,
            decision_maker: None,
            ai_analysis: AiAnalysis::default(),
            status: LeadStatus::Scraped,
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.decision_maker
            .as_ref()
            .map(|dm| dm.email.as_str())
            .filter(|e| !e.is_empty())
    }

    pub fn has_email(&self) -> bool {
        self.email().is_some()
    }

    /// Supplying an email is what brings the decision maker record into
    /// existence in the first place.
    pub fn set_email(&mut self, email: String) {
        match self.decision_maker.as_mut() {
            Some(dm) => dm.email = email,
            None => {
                self.decision_maker = Some(DecisionMaker {
                    email,
                    ..DecisionMaker::default()
                })
            }
        }
    }

    pub fn decision_maker_name(&self) -> Option<&str> {
        self.decision_maker
            .as_ref()
            .map(|dm| dm.name.as_str())
            .filter(|n| !n.is_empty())
    }
}
