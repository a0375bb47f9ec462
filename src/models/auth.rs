use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserRole;
use crate::error::AppError;

/// Claims embedded in every signed access token.
///
/// User tokens leave `profile_id` out entirely; profile tokens carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user UUID
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

/// Extracted from a validated access token of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub profile_id: Option<Uuid>,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// A validated token that selected a profile. Built only when the claim is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSession {
    pub user_id: Uuid,
    pub profile_id: Uuid,
    pub role: UserRole,
}

impl TryFrom<AuthenticatedUser> for ProfileSession {
    type Error = AppError;

    fn try_from(user: AuthenticatedUser) -> Result<Self, Self::Error> {
        let profile_id = user
            .profile_id
            .ok_or_else(|| AppError::Unauthorized("Missing profile claim".into()))?;
        Ok(Self {
            user_id: user.user_id,
            profile_id,
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_level_identity_is_not_a_profile_session() {
        let user = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            role: UserRole::User,
            profile_id: None,
        };
        let err = ProfileSession::try_from(user).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn user_claims_omit_profile_id_when_serialized() {
        let claims = Claims {
            sub: Uuid::nil().to_string(),
            role: UserRole::User,
            profile_id: None,
            iss: "reelgate".into(),
            aud: "reelgate-clients".into(),
            iat: 0,
            exp: 60,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("profile_id").is_none());
        assert_eq!(json["role"], "User");
    }
}
