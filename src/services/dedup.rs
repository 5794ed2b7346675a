use std::collections::HashSet;

use crate::domain::lead::Lead;

/// Canonical form used on BOTH sides of every duplicate comparison:
/// lowercase, no scheme, no leading www., at most one trailing slash
/// removed, trimmed.
pub fn normalize_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let stripped = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let stripped = stripped.strip_prefix("www.").unwrap_or(stripped);
    let stripped = stripped.strip_suffix('/').unwrap_or(stripped);
    stripped.trim().to_string()
}

/// Company names and cleaned URLs the caller has already worked in earlier
/// runs. Owned and persisted outside the pipeline; read-only here.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    entries: Vec<String>,
}

impl ExclusionSet {
    pub fn new(entries: impl IntoIterator<Item = String>) -> Self {
        ExclusionSet {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct DeduplicationFilter {
    excluded: HashSet<String>,
    // Members that look like URLs, kept for the fallback equality pass.
    excluded_urls: Vec<String>,
    session_names: HashSet<String>,
    session_websites: HashSet<String>,
}

impl DeduplicationFilter {
    pub fn new(exclusions: &ExclusionSet) -> Self {
        let excluded: HashSet<String> = exclusions
            .entries()
            .iter()
            .map(|e| normalize_key(e))
            .collect();
        let excluded_urls = excluded
            .iter()
            .filter(|e| e.contains('.'))
            .cloned()
            .collect();

        DeduplicationFilter {
            excluded,
            excluded_urls,
            session_names: HashSet::new(),
            session_websites: HashSet::new(),
        }
    }

    /// True when the candidate was already worked in a previous run.
    pub fn is_excluded(&self, name: &str, url_or_handle: Option<&str>) -> bool {
        let name_key = normalize_key(name);
        if !name_key.is_empty() && self.excluded.contains(&name_key) {
            return true;
        }

        if let Some(url) = url_or_handle {
            let url_key = normalize_key(url);
            if !url_key.is_empty() {
                if self.excluded.contains(&url_key) {
                    return true;
                }
                if self.excluded_urls.iter().any(|member| *member == url_key) {
                    return true;
                }
            }
        }

        false
    }

    /// True when another candidate with the same company name or website
    /// was already queued in this run. Independent of the exclusion set.
    pub fn is_session_duplicate(&self, name: &str, url_or_handle: Option<&str>) -> bool {
        let name_key = normalize_key(name);
        if !name_key.is_empty() && self.session_names.contains(&name_key) {
            return true;
        }

        match url_or_handle.map(normalize_key).filter(|u| !u.is_empty()) {
            Some(url_key) => self.session_websites.contains(&url_key),
            None => false,
        }
    }

    pub fn is_duplicate(&self, name: &str, url_or_handle: Option<&str>) -> bool {
        self.is_excluded(name, url_or_handle) || self.is_session_duplicate(name, url_or_handle)
    }

    pub fn remember(&mut self, lead: &Lead) {
        let name_key = normalize_key(&lead.company_name);
        if !name_key.is_empty() {
            self.session_names.insert(name_key);
        }
        for url in [lead.website.as_deref(), lead.social_url.as_deref()]
            .into_iter()
            .flatten()
        {
            let url_key = normalize_key(url);
            if !url_key.is_empty() {
                self.session_websites.insert(url_key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::lead::{Lead, PlatformSource};

    use super::*;

    fn filter_with(entries: &[&str]) -> DeduplicationFilter {
        DeduplicationFilter::new(&ExclusionSet::new(
            entries.iter().map(|e| e.to_string()),
        ))
    }

    #[test]
    fn normalize_key_strips_scheme_www_and_trailing_slash() {
        let variants = [
            "acme.com",
            "http://acme.com",
            "https://acme.com",
            "https://www.acme.com",
            "https://www.acme.com/",
            "  WWW.ACME.COM/  ",
        ];

        for variant in variants {
            assert_eq!(normalize_key(variant), "acme.com", "from {:?}", variant);
        }
    }

    #[test]
    fn excluded_by_name_and_by_url() {
        let filter = filter_with(&["acme corp", "acme.com"]);

        assert!(filter.is_duplicate("ACME Corp", None));
        assert!(filter.is_duplicate("Other Co", Some("https://www.acme.com/")));
        assert!(filter.is_duplicate("ACME Corp", Some("https://www.acme.com/")));
        assert!(!filter.is_duplicate("Fresh Co", Some("fresh.com")));
    }

    #[test]
    fn fallback_pass_matches_dotted_members() {
        let filter = filter_with(&["https://www.acme.com/"]);

        assert!(filter.is_duplicate("Whatever", Some("acme.com")));
    }

    #[test]
    fn is_duplicate_is_idempotent() {
        let filter = filter_with(&["acme corp"]);

        let first = filter.is_duplicate("Acme Corp", Some("acme.com"));
        let second = filter.is_duplicate("Acme Corp", Some("acme.com"));

        assert_eq!(first, second);
    }

    #[test]
    fn session_duplicates_are_independent_of_exclusions() {
        let mut filter = filter_with(&[]);

        let mut lead = Lead::new("l-1".to_string(), PlatformSource::Gmaps, "Acme".to_string());
        lead.website = Some("acme.com".to_string());
        filter.remember(&lead);

        assert!(filter.is_session_duplicate("acme", None));
        assert!(filter.is_session_duplicate("Other", Some("https://www.acme.com")));
        assert!(!filter.is_session_duplicate("Other", Some("fresh.com")));
        assert!(!filter.is_excluded("acme", Some("acme.com")));
    }

    #[test]
    fn empty_fields_never_match() {
        let mut filter = filter_with(&[""]);

        let lead = Lead::new("l-1".to_string(), PlatformSource::Gmaps, "".to_string());
        filter.remember(&lead);

        assert!(!filter.is_duplicate("", None));
        assert!(!filter.is_duplicate("", Some("")));
    }
}
