use std::collections::HashMap;

use strsim::jaro_winkler;

use crate::services::dedup::normalize_key;

/// Joins lookup-job results back onto the leads that triggered them. The
/// remote actors report a domain of their own choosing rather than echoing
/// our input key, so an exact lookup is tried first and a substring pass
/// second, with jaro-winkler deciding between several substring hits.
pub struct DomainMatcher {
    exact: HashMap<String, usize>,
    keys: Vec<(String, usize)>,
}

impl DomainMatcher {
    pub fn build<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, usize)>,
    {
        let mut exact = HashMap::new();
        let mut keys = Vec::new();

        for (raw, idx) in entries {
            let key = normalize_key(&raw);
            if key.is_empty() {
                continue;
            }
            exact.entry(key.clone()).or_insert(idx);
            keys.push((key, idx));
        }

        DomainMatcher { exact, keys }
    }

    pub fn find(&self, reported_domain: &str) -> Option<usize> {
        let reported = normalize_key(reported_domain);
        if reported.is_empty() {
            return None;
        }

        if let Some(&idx) = self.exact.get(&reported) {
            return Some(idx);
        }

        self.keys
            .iter()
            .filter(|(key, _)| reported.contains(key.as_str()) || key.contains(&reported))
            .max_by(|(a, _), (b, _)| {
                jaro_winkler(&reported, a)
                    .partial_cmp(&jaro_winkler(&reported, b))
                    .unwrap()
            })
            .map(|&(_, idx)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(keys: &[&str]) -> DomainMatcher {
        DomainMatcher::build(
            keys.iter()
                .enumerate()
                .map(|(i, k)| (k.to_string(), i)),
        )
    }

    #[test]
    fn exact_normalized_match_wins() {
        let matcher = matcher(&["acme.com", "fresh.es"]);

        assert_eq!(matcher.find("https://www.acme.com/"), Some(0));
        assert_eq!(matcher.find("fresh.es"), Some(1));
    }

    #[test]
    fn substring_fallback_joins_reported_subdomains() {
        let matcher = matcher(&["acme.com"]);

        assert_eq!(matcher.find("shop.acme.com"), Some(0));
    }

    #[test]
    fn closest_substring_candidate_is_picked() {
        let matcher = matcher(&["acme.com", "acme.com.es"]);

        assert_eq!(matcher.find("www.acme.com.es"), Some(1));
    }

    #[test]
    fn unrelated_domains_do_not_match() {
        let matcher = matcher(&["acme.com"]);

        assert_eq!(matcher.find("other.org"), None);
        assert_eq!(matcher.find(""), None);
    }
}
