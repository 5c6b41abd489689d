pub mod json;
pub mod search;
