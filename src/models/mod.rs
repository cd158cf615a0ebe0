//! Data models for the client core

pub mod endpoint;
pub mod preferences;
pub mod push;
pub mod session;

// Re-export commonly used types
pub use endpoint::ServerEndpoint;
pub use preferences::DataSource;
pub use push::{PermissionStatus, Platform, PushRegistration, PushState, RegistrationOutcome};
pub use session::{LoginRequest, RegisterProfile, Session, SessionState, UserIdentity};
