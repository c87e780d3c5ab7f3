// Network configuration module
//
// Shared HTTP configuration for all source adapters: client construction,
// retry with back-off, and User-Agent randomization.

pub mod client;
mod settings;
pub mod user_agent;

pub use settings::NetworkSettings;
pub use user_agent::random_user_agent;
