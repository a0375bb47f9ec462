//! Session lifecycle: registration, login, refresh rotation, logout,
//! password reset and self-service account changes.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::store::CredentialStore,
    error::{AppError, AppResult},
    models::{
        auth::AuthenticatedUser,
        user::{
            CreateProfileRequest, LoginRequest, LoginResponse, MessageResponse, NewProfile,
            NewUser, Profile, ProfileSummary, ProfileTokenResponse, RefreshResponse,
            RegisterRequest, RegisterResponse, UpdateOutcome, UpdateUserRequest, User,
            UserChanges, UserPublic, UserRole,
        },
    },
    services::{
        email::EmailService,
        metrics::{LOGINS_COUNTER, PASSWORD_RESETS_COUNTER, REFRESH_COUNTER, REGISTRATIONS_COUNTER},
        notify::{self, Notification},
        tokens::{hash_opaque_token, TokenService},
    },
};

/// Applies to registration, reset and self-service password change alike.
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const DEFAULT_AVATAR: &str = "default_avatar.png";

/// Returned by every password-reset request, whether or not the email is known.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent.";

fn build_reset_url(base_url: &str, token: &str) -> String {
    format!("{}/reset-password?token={token}", base_url.trim_end_matches('/'))
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> AppResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::BadRequest("A valid email address is required".into())),
    }
}

async fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_owned();
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

/// A malformed stored hash counts as a mismatch.
async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?;
    Ok(verified.unwrap_or(false))
}

pub struct SessionManager<S> {
    store: S,
    tokens: TokenService,
    email: Option<Arc<EmailService>>,
    bcrypt_cost: u32,
    app_base_url: String,
    /// Verified against when no account matches a login identifier.
    dummy_hash: String,
}

impl<S: CredentialStore> SessionManager<S> {
    pub fn new(
        store: S,
        tokens: TokenService,
        email: Option<Arc<EmailService>>,
        bcrypt_cost: u32,
        app_base_url: impl Into<String>,
    ) -> AppResult<Self> {
        // Fails on a cost bcrypt rejects, so login never compares against an empty hash.
        let dummy_hash = bcrypt::hash("reelgate-unknown-account", bcrypt_cost)?;
        Ok(Self {
            store,
            tokens,
            email,
            bcrypt_cost,
            app_base_url: app_base_url.into(),
            dummy_hash,
        })
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Validate input, hash the password and insert the account with its default profile.
    /// A refresh token digest given here is written by the same insert.
    async fn create_account(
        &self,
        req: RegisterRequest,
        role: UserRole,
        refresh_token: Option<(String, DateTime<Utc>)>,
    ) -> AppResult<(User, Profile)> {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_string();
        if username.is_empty() {
            return Err(AppError::BadRequest("Username is required".into()));
        }
        validate_email(&email)?;
        validate_password(&req.password)?;

        if self.store.username_taken(&username, None).await?
            || self.store.email_taken(&email, None).await?
        {
            return Err(AppError::Conflict("Username or email already exists.".into()));
        }

        let password_hash = hash_password(&req.password, self.bcrypt_cost).await?;
        let avatar = req
            .avatar
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AVATAR.to_string());

        self.store
            .create_user(
                NewUser {
                    username: username.clone(),
                    email,
                    phone: req.phone.filter(|p| !p.trim().is_empty()),
                    password_hash,
                    role,
                    avatar: avatar.clone(),
                    refresh_token,
                },
                NewProfile {
                    name: username,
                    avatar,
                    is_kids_profile: false,
                },
            )
            .await
    }

    pub async fn register(&self, req: RegisterRequest) -> AppResult<RegisterResponse> {
        let now = Utc::now();
        let refresh = self.tokens.issue_refresh_token(now);
        let (user, profile) = self
            .create_account(
                req,
                UserRole::User,
                Some((refresh.hash.clone(), refresh.expires_at)),
            )
            .await?;

        let user_token = self.tokens.issue_user_token(&user, now)?;
        let profile_token = self.tokens.issue_profile_token(&profile, user.role(), now)?;

        REGISTRATIONS_COUNTER.inc();
        tracing::info!(user_id = %user.id, "user registered");

        notify::dispatch(
            self.email.clone(),
            Notification::Welcome {
                to: user.email.clone(),
                username: user.username.clone(),
            },
        );

        Ok(RegisterResponse {
            message: "User registered and default profile created successfully.".into(),
            user_id: user.id,
            username: user.username,
            user_token,
            profile_token,
            refresh_token: refresh.value,
            default_profile: profile.into(),
        })
    }

    /// Operator path used by `seed-admin`. Issues no tokens.
    pub async fn create_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AppResult<UserPublic> {
        let (user, _) = self
            .create_account(
                RegisterRequest {
                    username: username.to_string(),
                    email: email.to_string(),
                    password: password.to_string(),
                    avatar: None,
                    phone: None,
                },
                UserRole::Admin,
                None,
            )
            .await?;
        tracing::info!(user_id = %user.id, "admin account created");
        Ok(user.into())
    }

    /// Both failure paths return the same `Unauthorized` and both pay one bcrypt verification.
    pub async fn login(&self, req: LoginRequest, client_ip: Option<IpAddr>) -> AppResult<LoginResponse> {
        let identifier = req.login_identifier.trim();

        let user = match self.store.find_by_username_or_email(identifier).await? {
            Some(user) => user,
            None => {
                verify_password(&req.password, &self.dummy_hash).await?;
                LOGINS_COUNTER.with_label_values(&["failed"]).inc();
                return Err(AppError::invalid_credentials());
            }
        };

        if !verify_password(&req.password, &user.password_hash).await? {
            LOGINS_COUNTER.with_label_values(&["failed"]).inc();
            tracing::info!(user_id = %user.id, "login rejected");
            return Err(AppError::invalid_credentials());
        }

        if let Some(ip) = client_ip {
            let ip = ip.to_string();
            if user.last_login_ip.as_deref() != Some(ip.as_str()) {
                notify::dispatch(
                    self.email.clone(),
                    Notification::LoginAlert {
                        to: user.email.clone(),
                        ip: ip.clone(),
                    },
                );
                if let Err(e) = self.store.record_login_ip(user.id, &ip).await {
                    tracing::warn!(user_id = %user.id, "could not record login address: {e}");
                }
            }
        }

        let now = Utc::now();
        let role = user.role();
        let token = self.tokens.issue_user_token(&user, now)?;
        let refresh = self.tokens.issue_refresh_token(now);
        self.store
            .store_refresh_token(user.id, &refresh.hash, refresh.expires_at)
            .await?;

        let profiles = match role {
            UserRole::Admin => None,
            UserRole::User => Some(
                self.store
                    .list_profiles(user.id)
                    .await?
                    .into_iter()
                    .map(ProfileSummary::from)
                    .collect(),
            ),
        };

        LOGINS_COUNTER.with_label_values(&["success"]).inc();
        tracing::info!(user_id = %user.id, %role, "login succeeded");

        Ok(LoginResponse {
            token,
            refresh_token: refresh.value,
            role,
            profiles,
        })
    }

    /// Rotate the presented refresh token. The old value is dead as soon as this returns.
    pub async fn refresh(&self, presented: &str) -> AppResult<RefreshResponse> {
        let presented = presented.trim();
        let rejected = || AppError::Unauthorized("Invalid or expired refresh token.".into());
        if presented.is_empty() {
            return Err(rejected());
        }

        let now = Utc::now();
        let next = self.tokens.issue_refresh_token(now);
        let rotated = self
            .store
            .rotate_refresh_token(&hash_opaque_token(presented), &next.hash, next.expires_at, now)
            .await?;

        let Some(user) = rotated else {
            REFRESH_COUNTER.with_label_values(&["rejected"]).inc();
            tracing::warn!("refresh rejected: unknown, already rotated or expired token");
            return Err(rejected());
        };

        let token = self.tokens.issue_user_token(&user, now)?;
        REFRESH_COUNTER.with_label_values(&["rotated"]).inc();

        Ok(RefreshResponse {
            token,
            refresh_token: next.value,
        })
    }

    pub async fn logout(&self, user_id: Uuid) -> AppResult<()> {
        self.store.clear_refresh_token(user_id).await?;
        tracing::info!(user_id = %user_id, "refresh token revoked");
        Ok(())
    }

    /// Always answers [`RESET_REQUESTED_MESSAGE`].
    pub async fn request_password_reset(&self, email: &str) -> AppResult<MessageResponse> {
        if let Some(user) = self.store.find_by_email(email.trim()).await? {
            let reset = self.tokens.issue_reset_token(Utc::now());
            self.store
                .store_reset_token(user.id, &reset.hash, reset.expires_at)
                .await?;

            notify::dispatch(
                self.email.clone(),
                Notification::PasswordReset {
                    to: user.email.clone(),
                    username: user.username.clone(),
                    reset_url: build_reset_url(&self.app_base_url, &reset.value),
                },
            );
            PASSWORD_RESETS_COUNTER.with_label_values(&["requested"]).inc();
        }

        Ok(MessageResponse::new(RESET_REQUESTED_MESSAGE))
    }

    /// Single use: success clears the reset token and also revokes the refresh token.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<MessageResponse> {
        let invalid = || AppError::BadRequest("Invalid or expired reset token.".into());
        let token_hash = hash_opaque_token(token.trim());

        let user = match self.store.find_by_reset_token(&token_hash).await? {
            Some(user) if user.reset_token_expires_at.is_some_and(|exp| exp > Utc::now()) => user,
            _ => {
                PASSWORD_RESETS_COUNTER.with_label_values(&["rejected"]).inc();
                return Err(invalid());
            }
        };

        validate_password(new_password)?;
        let password_hash = hash_password(new_password, self.bcrypt_cost).await?;

        if !self
            .store
            .consume_reset_token(user.id, &token_hash, &password_hash, Utc::now())
            .await?
        {
            PASSWORD_RESETS_COUNTER.with_label_values(&["rejected"]).inc();
            return Err(invalid());
        }

        PASSWORD_RESETS_COUNTER.with_label_values(&["completed"]).inc();
        tracing::info!(user_id = %user.id, "password reset completed");
        Ok(MessageResponse::new("Password has been reset successfully."))
    }

    /// Each field is optional; uniqueness is checked against other accounts only.
    pub async fn update_user(&self, user_id: Uuid, req: UpdateUserRequest) -> AppResult<UpdateOutcome> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".into()))?;

        let mut changes = UserChanges::default();

        if let Some(username) = req.username.as_deref().map(str::trim) {
            if !username.is_empty() && username != user.username {
                if self.store.username_taken(username, Some(user_id)).await? {
                    return Err(AppError::Conflict("New username is already taken.".into()));
                }
                changes.username = Some(username.to_string());
            }
        }

        if let Some(email) = req.email.as_deref().map(str::trim) {
            if !email.is_empty() && email != user.email {
                validate_email(email)?;
                if self.store.email_taken(email, Some(user_id)).await? {
                    return Err(AppError::Conflict("New email is already taken.".into()));
                }
                changes.email = Some(email.to_string());
            }
        }

        if let Some(new_password) = req.new_password.as_deref().filter(|p| !p.is_empty()) {
            let current = req
                .current_password
                .as_deref()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    AppError::BadRequest("Current password is required to change password.".into())
                })?;
            if !verify_password(current, &user.password_hash).await? {
                return Err(AppError::Unauthorized("Incorrect current password.".into()));
            }
            validate_password(new_password)?;
            changes.password_hash = Some(hash_password(new_password, self.bcrypt_cost).await?);
        }

        if changes.is_empty() {
            return Ok(UpdateOutcome::NoChanges);
        }

        self.store
            .update_user(user_id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".into()))?;
        tracing::info!(user_id = %user_id, "account updated");
        Ok(UpdateOutcome::Updated)
    }

    pub async fn me(&self, user_id: Uuid) -> AppResult<UserPublic> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(UserPublic::from)
            .ok_or_else(|| AppError::NotFound("User not found.".into()))
    }

    pub async fn list_users(&self, caller: &AuthenticatedUser) -> AppResult<Vec<UserPublic>> {
        if !caller.is_admin() {
            return Err(AppError::Forbidden("Admin role required".into()));
        }
        Ok(self
            .store
            .list_users()
            .await?
            .into_iter()
            .map(UserPublic::from)
            .collect())
    }

    pub async fn list_profiles(&self, user_id: Uuid) -> AppResult<Vec<ProfileSummary>> {
        Ok(self
            .store
            .list_profiles(user_id)
            .await?
            .into_iter()
            .map(ProfileSummary::from)
            .collect())
    }

    /// Issue a profile token for a profile the caller owns.
    pub async fn select_profile(
        &self,
        caller: &AuthenticatedUser,
        profile_id: Uuid,
    ) -> AppResult<ProfileTokenResponse> {
        let profile = self
            .store
            .find_profile(caller.user_id, profile_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found or access denied.".into()))?;

        let token = self
            .tokens
            .issue_profile_token(&profile, caller.role, Utc::now())?;
        Ok(ProfileTokenResponse {
            token,
            profile: profile.into(),
        })
    }

    pub async fn create_profile(
        &self,
        user_id: Uuid,
        req: CreateProfileRequest,
    ) -> AppResult<ProfileSummary> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Profile name is required".into()));
        }
        let avatar = req
            .avatar
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AVATAR.to_string());

        let profile = self
            .store
            .create_profile(
                user_id,
                NewProfile {
                    name: name.to_string(),
                    avatar,
                    is_kids_profile: req.is_kids_profile,
                },
            )
            .await?;
        Ok(profile.into())
    }
}
