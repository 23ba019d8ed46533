//! HTTP client for the events backend REST surface.

pub mod config;
pub mod events;
pub mod gateway;

pub use config::ApiConfig;
pub use events::EventsClient;
pub use gateway::EventsGateway;
