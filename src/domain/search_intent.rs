/// Structured search parameters derived once per run from the free-text
/// target profile. Immutable after interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchIntent {
    pub query: String,
    pub industry: String,
    pub target_roles: Vec<String>,
    pub location: String,
}
