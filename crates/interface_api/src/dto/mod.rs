//! Request/response DTOs
//!
//! Field names are camelCase on the wire and money goes out as a JSON
//! number in major units.

pub mod orders;
pub mod payments;
pub mod settlements;
pub mod webhooks;
