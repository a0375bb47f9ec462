//! Access-token signing and validation, plus opaque refresh and reset secrets.
//!
//! Keys come in through [`TokenService::new`]; every validator in a deployment
//! must be built from the same secret.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{
        auth::{AuthenticatedUser, Claims},
        user::{Profile, User, UserRole},
    },
};

pub struct TokenSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub user_token_ttl: Duration,
    pub profile_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub reset_token_ttl: Duration,
}

impl TokenSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            user_token_ttl: Duration::minutes(config.user_token_ttl_minutes),
            profile_token_ttl: Duration::hours(config.profile_token_ttl_hours),
            refresh_token_ttl: Duration::days(config.refresh_token_ttl_days),
            reset_token_ttl: Duration::minutes(config.reset_token_ttl_minutes),
        }
    }
}

/// A random capability token. Only `hash` is persisted; `value` goes to the client.
#[derive(Debug, Clone)]
pub struct OpaqueToken {
    pub value: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    user_token_ttl: Duration,
    profile_token_ttl: Duration,
    refresh_token_ttl: Duration,
    reset_token_ttl: Duration,
}

impl TokenService {
    pub fn new(settings: TokenSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&settings.issuer]);
        validation.set_audience(&[&settings.audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
            issuer: settings.issuer,
            audience: settings.audience,
            user_token_ttl: settings.user_token_ttl,
            profile_token_ttl: settings.profile_token_ttl,
            refresh_token_ttl: settings.refresh_token_ttl,
            reset_token_ttl: settings.reset_token_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(TokenSettings::from_config(config))
    }

    fn sign(
        &self,
        user_id: Uuid,
        role: UserRole,
        profile_id: Option<Uuid>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AppResult<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            profile_id: profile_id.map(|id| id.to_string()),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: (now + ttl).timestamp() as usize,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// User-level token: `{sub, role}`.
    pub fn issue_user_token(&self, user: &User, now: DateTime<Utc>) -> AppResult<String> {
        self.sign(user.id, user.role(), None, now, self.user_token_ttl)
    }

    /// Profile-level token: `{sub = owner, profile_id, role = owner's role}`.
    pub fn issue_profile_token(
        &self,
        profile: &Profile,
        owner_role: UserRole,
        now: DateTime<Utc>,
    ) -> AppResult<String> {
        self.sign(
            profile.user_id,
            owner_role,
            Some(profile.id),
            now,
            self.profile_token_ttl,
        )
    }

    pub fn issue_refresh_token(&self, now: DateTime<Utc>) -> OpaqueToken {
        opaque_token(now + self.refresh_token_ttl)
    }

    pub fn issue_reset_token(&self, now: DateTime<Utc>) -> OpaqueToken {
        opaque_token(now + self.reset_token_ttl)
    }

    /// Verify signature, algorithm, issuer, audience and expiry, then read the claims.
    ///
    /// A `profile_id` claim that is present but unparseable rejects the token.
    pub fn validate(&self, token: &str) -> AppResult<AuthenticatedUser> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;
        let claims = data.claims;

        let user_id: Uuid = claims
            .sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid subject claim".into()))?;
        let profile_id = claims
            .profile_id
            .map(|raw| raw.parse::<Uuid>())
            .transpose()
            .map_err(|_| AppError::Unauthorized("Invalid profile claim".into()))?;

        Ok(AuthenticatedUser {
            user_id,
            role: claims.role,
            profile_id,
        })
    }
}

/// SHA-256 hex digest used to store and look up opaque tokens.
pub fn hash_opaque_token(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

fn opaque_token(expires_at: DateTime<Utc>) -> OpaqueToken {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let value = hex::encode(bytes);
    let hash = hash_opaque_token(&value);
    OpaqueToken {
        value,
        hash,
        expires_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(secret: &str) -> TokenSettings {
        TokenSettings {
            secret: secret.into(),
            issuer: "reelgate".into(),
            audience: "reelgate-clients".into(),
            user_token_ttl: Duration::minutes(60),
            profile_token_ttl: Duration::hours(6),
            refresh_token_ttl: Duration::days(7),
            reset_token_ttl: Duration::hours(1),
        }
    }

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@x.com".into(),
            phone: None,
            password_hash: String::new(),
            role: role.to_string(),
            avatar: None,
            last_login_ip: None,
            refresh_token_hash: None,
            refresh_token_expires_at: None,
            reset_token_hash: None,
            reset_token_expires_at: None,
            is_subscribed: false,
            subscription_expires_at: None,
            created_at: Utc::now(),
        }
    }

    fn profile(owner: &User) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            user_id: owner.id,
            name: owner.username.clone(),
            avatar: "default_avatar.png".into(),
            is_kids_profile: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn user_token_carries_subject_and_role_only() {
        let tokens = TokenService::new(settings("k1"));
        let admin = user(UserRole::Admin);
        let token = tokens.issue_user_token(&admin, Utc::now()).unwrap();

        let identity = tokens.validate(&token).unwrap();
        assert_eq!(identity.user_id, admin.id);
        assert_eq!(identity.role, UserRole::Admin);
        assert_eq!(identity.profile_id, None);
    }

    #[test]
    fn profile_token_carries_profile_claim() {
        let tokens = TokenService::new(settings("k1"));
        let owner = user(UserRole::User);
        let p = profile(&owner);
        let token = tokens.issue_profile_token(&p, owner.role(), Utc::now()).unwrap();

        let identity = tokens.validate(&token).unwrap();
        assert_eq!(identity.user_id, owner.id);
        assert_eq!(identity.profile_id, Some(p.id));
    }

    #[test]
    fn expiry_is_embedded_per_token_kind() {
        let tokens = TokenService::new(settings("k1"));
        let owner = user(UserRole::User);
        let issued_at = Utc::now() - Duration::minutes(90);

        let user_token = tokens.issue_user_token(&owner, issued_at).unwrap();
        let profile_token = tokens
            .issue_profile_token(&profile(&owner), owner.role(), issued_at)
            .unwrap();

        // 60 minutes have passed for the user token, not 6 hours for the profile token.
        assert!(tokens.validate(&user_token).is_err());
        assert!(tokens.validate(&profile_token).is_ok());
    }

    #[test]
    fn rejects_foreign_key_and_garbage() {
        let issuer = TokenService::new(settings("k1"));
        let other = TokenService::new(settings("k2"));
        let token = issuer
            .issue_user_token(&user(UserRole::User), Utc::now())
            .unwrap();

        assert!(matches!(other.validate(&token), Err(AppError::Unauthorized(_))));
        assert!(matches!(issuer.validate("not.a.jwt"), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn rejects_wrong_audience() {
        let issuer = TokenService::new(settings("k1"));
        let mut elsewhere = settings("k1");
        elsewhere.audience = "admin-console".into();
        let validator = TokenService::new(elsewhere);

        let token = issuer
            .issue_user_token(&user(UserRole::User), Utc::now())
            .unwrap();
        assert!(validator.validate(&token).is_err());
    }

    #[test]
    fn zero_profile_claim_is_not_a_profile() {
        let tokens = TokenService::new(settings("k1"));
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: UserRole::User,
            profile_id: Some("0".into()),
            iss: "reelgate".into(),
            aud: "reelgate-clients".into(),
            iat: now,
            exp: now + 600,
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"k1"),
        )
        .unwrap();

        assert!(matches!(tokens.validate(&forged), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn refresh_tokens_are_random_and_stored_hashed() {
        let tokens = TokenService::new(settings("k1"));
        let now = Utc::now();
        let a = tokens.issue_refresh_token(now);
        let b = tokens.issue_refresh_token(now);

        assert_ne!(a.value, b.value);
        assert_eq!(a.value.len(), 64);
        assert_ne!(a.hash, a.value);
        assert_eq!(a.hash, hash_opaque_token(&a.value));
        assert_eq!(a.expires_at, now + Duration::days(7));
        assert_eq!(tokens.issue_reset_token(now).expires_at, now + Duration::hours(1));
    }
}
