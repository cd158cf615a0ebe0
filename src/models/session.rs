//! Session and user identity models

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Authenticated user identity as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, alias = "student_id")]
    pub student_id: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

/// Bearer credential plus the identity it belongs to.
///
/// Always persisted and restored as a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserIdentity,
}

/// Observable session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated(UserIdentity),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

impl From<Option<&Session>> for SessionState {
    fn from(session: Option<&Session>) -> Self {
        match session {
            Some(session) => SessionState::Authenticated(session.user.clone()),
            None => SessionState::Anonymous,
        }
    }
}

/// Login request
#[derive(Debug, Clone, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Registration profile for a new account
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProfile {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

/// Response body of `/auth/login` and `/auth/register`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserIdentity,
}

impl From<AuthResponse> for Session {
    fn from(resp: AuthResponse) -> Self {
        Session {
            token: resp.token,
            user: resp.user,
        }
    }
}

/// Response body of `/auth/me`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProfileResponse {
    Wrapped { user: UserIdentity },
    Bare(UserIdentity),
}

impl From<ProfileResponse> for UserIdentity {
    fn from(resp: ProfileResponse) -> Self {
        match resp {
            ProfileResponse::Wrapped { user } => user,
            ProfileResponse::Bare(user) => user,
        }
    }
}

/// Shorten a token for log output
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{}…", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_accepts_backend_shapes() {
        let user: UserIdentity = serde_json::from_str(
            r#"{"_id":"u1","name":"Ada","email":"ada@campus.edu","studentId":"S42","department":"CS"}"#,
        )
        .unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.student_id.as_deref(), Some("S42"));

        let user: UserIdentity =
            serde_json::from_str(r#"{"id":"u2","name":"Bob","email":"bob@campus.edu"}"#).unwrap();
        assert!(user.department.is_none());
    }

    #[test]
    fn test_profile_response_shapes() {
        let wrapped: ProfileResponse =
            serde_json::from_str(r#"{"user":{"id":"u1","name":"Ada","email":"a@b.c"}}"#).unwrap();
        let bare: ProfileResponse =
            serde_json::from_str(r#"{"id":"u1","name":"Ada","email":"a@b.c"}"#).unwrap();
        assert_eq!(UserIdentity::from(wrapped), UserIdentity::from(bare));
    }

    #[test]
    fn test_validation() {
        let ok = LoginRequest {
            email: "ada@campus.edu".into(),
            password: "secret".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = LoginRequest {
            email: "not-an-email".into(),
            password: String::new(),
        };
        assert!(bad.validate().is_err());

        let short = RegisterProfile {
            name: "Ada".into(),
            email: "ada@campus.edu".into(),
            password: "123".into(),
            student_id: None,
            department: None,
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_redact_token() {
        assert_eq!(redact_token("abcdefghijkl"), "abcdef…");
        assert_eq!(redact_token("ab"), "ab…");
    }
}
