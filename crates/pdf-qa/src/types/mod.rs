//! Wire types for the HTTP routes

pub mod query;
pub mod response;

pub use query::PromptRequest;
pub use response::PromptResponse;
