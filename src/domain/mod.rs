pub mod candidate;
pub mod contact;
pub mod lead;
pub mod search_intent;
