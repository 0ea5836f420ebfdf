//! Command implementations for rare-cli

pub mod classify;
pub mod generate;
pub mod health;
pub mod smoke;
pub mod upload;

pub use classify::{classify, describe};
pub use generate::generate;
pub use health::{health, info};
pub use smoke::smoke;
pub use upload::upload;

use rare_client::{ErrorCategory, RareClientError};

/// Message shown to the user when a client call fails
pub fn failure_message(err: &RareClientError, action: &str) -> String {
    match err.category() {
        ErrorCategory::InvalidInput => err.to_string(),
        ErrorCategory::Connection => {
            format!("Failed to {}. Make sure the backend is running.", action)
        }
        ErrorCategory::Backend => match err.detail() {
            Some(detail) => format!("Error: {}", detail),
            None => format!("Error: {}", err),
        },
    }
}
