//! Push notification registration models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::UserIdentity;

/// Platform tag sent alongside the device token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Web,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Web => "web",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            "web" => Ok(Platform::Web),
            _ => Err(format!("Invalid platform: {}", s)),
        }
    }
}

/// OS notification permission as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// Never asked yet
    Undetermined,
}

/// Device push token held by this installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRegistration {
    pub token: String,
    pub platform: Platform,
    /// Whether the server acknowledged this exact token value
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl PushRegistration {
    pub fn local(token: impl Into<String>, platform: Platform) -> Self {
        Self {
            token: token.into(),
            platform,
            synced: false,
            synced_at: None,
        }
    }

    pub fn mark_synced(&mut self) {
        self.synced = true;
        self.synced_at = Some(Utc::now());
    }

    pub fn state(&self) -> PushState {
        if self.synced {
            PushState::SyncedToken
        } else {
            PushState::LocalToken
        }
    }
}

/// Lifecycle of the push registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    NoToken,
    LocalToken,
    SyncedToken,
}

impl From<Option<&PushRegistration>> for PushState {
    fn from(reg: Option<&PushRegistration>) -> Self {
        reg.map(PushRegistration::state).unwrap_or(PushState::NoToken)
    }
}

/// Outcome of `ensure_registered`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A token was already persisted; nothing was asked of the OS
    AlreadyRegistered(PushRegistration),
    /// Permission granted and a fresh token obtained
    Registered(PushRegistration),
    /// Emulator or simulator, push is not available
    Unsupported,
}

impl RegistrationOutcome {
    pub fn registration(&self) -> Option<&PushRegistration> {
        match self {
            RegistrationOutcome::AlreadyRegistered(reg) | RegistrationOutcome::Registered(reg) => Some(reg),
            RegistrationOutcome::Unsupported => None,
        }
    }
}

/// Body of `POST /users/push-token`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushTokenRequest<'a> {
    pub push_token: &'a str,
    pub platform: Platform,
}

/// Response of `POST /users/push-token`
#[derive(Debug, Clone, Deserialize)]
pub struct PushTokenResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub user: Option<UserIdentity>,
}
