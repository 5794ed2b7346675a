use serde_aux::field_attributes::deserialize_number_from_string;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub api_keys: ApiKeySettings,
    pub search: SearchSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApiKeySettings {
    /// Job platform token. Required before any remote work can start.
    #[serde(default)]
    pub apify: String,
    /// Text generation key. Optional: components fall back to their
    /// deterministic paths without it.
    #[serde(default)]
    pub openai: String,
}

impl ApiKeySettings {
    pub fn apify(&self) -> Option<&str> {
        Some(self.apify.as_str()).filter(|k| !k.is_empty())
    }

    pub fn openai(&self) -> Option<&str> {
        Some(self.openai.as_str()).filter(|k| !k.is_empty())
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct SearchSettings {
    pub default_location: String,
    #[serde(default)]
    pub policy: SearchPolicy,
}

/// Every tuning knob of the smart loop in one place, so policy changes do
/// not touch control flow.
#[derive(serde::Deserialize, Clone)]
#[serde(default)]
pub struct SearchPolicy {
    /// Discovery requests this multiple of the current shortfall to absorb
    /// losses to deduplication and missing contact data.
    pub overfetch_multiplier: usize,
    pub attempt_budget: usize,
    pub enrichment_batch_size: usize,
    pub analysis_retries: u32,
    pub analysis_backoff_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_cap: u32,
    /// Organic results folded into one research context blob.
    pub research_result_cap: usize,
    /// Enriched leads sent to the decision maker finder per run.
    pub decision_maker_lookup_cap: usize,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        SearchPolicy {
            overfetch_multiplier: 4,
            attempt_budget: 10,
            enrichment_batch_size: 10,
            analysis_retries: 3,
            analysis_backoff_secs: 1,
            poll_interval_secs: 5,
            poll_cap: 60,
            research_result_cap: 5,
            decision_maker_lookup_cap: 5,
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
