use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionMaker {
    pub name: String,
    pub role: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
}

/// Addresses carrying these markers belong to mailers or hosting
/// infrastructure, not to a person we could write to.
const NON_PERSONAL_EMAIL_MARKERS: [&str; 9] = [
    "noreply",
    "no-reply",
    "donotreply",
    "do-not-reply",
    "example.com",
    "sentry.io",
    "wixpress.com",
    "godaddy.com",
    "cloudflare.com",
];

pub fn is_personal_email(email: &str) -> bool {
    let email = email.trim().to_lowercase();

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || !domain.contains('.') {
        return false;
    }

    !NON_PERSONAL_EMAIL_MARKERS
        .iter()
        .any(|marker| email.contains(marker))
}

/// First usable address out of a scraped candidate list.
pub fn first_personal_email<'a, I>(emails: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    emails
        .into_iter()
        .map(|e| e.trim())
        .find(|e| is_personal_email(e))
        .map(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_infrastructure_addresses() {
        let emails = [
            "noreply@acme.com",
            "no-reply@acme.com",
            "info@sentry.io",
            "clientes@wixpress.com",
            "donotreply@store.es",
        ];

        for email in emails {
            assert!(!is_personal_email(email), "{} should be rejected", email);
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_personal_email("not-an-email"));
        assert!(!is_personal_email("@acme.com"));
        assert!(!is_personal_email("info@localhost"));
    }

    #[test]
    fn first_personal_email_skips_filtered() {
        let emails = ["noreply@acme.com", "maria@acme.com", "info@acme.com"];
        let result = first_personal_email(emails.iter().copied());

        assert_eq!(result, Some("maria@acme.com".to_string()));
    }

    #[test]
    fn first_personal_email_empty_when_none_qualify() {
        let emails = ["noreply@acme.com", "bounce@sentry.io"];

        assert_eq!(first_personal_email(emails.iter().copied()), None);
    }
}
