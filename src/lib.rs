pub mod app;
pub mod authz;
pub mod config;
pub mod errors;
pub mod models;
pub mod providers;
pub mod provisioning;
pub mod session;
pub mod utils;

// Re-export commonly used items for tests
pub use app::{create_gate, SessionGate};
pub use authz::{decide, NavigationDecision, Route, ScreenRequirement};
pub use session::SessionStore;
