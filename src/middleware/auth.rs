use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};

use crate::{
    error::AppError,
    models::auth::{AuthenticatedUser, ProfileSession},
    services::tokens::TokenService,
    AppState,
};

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header format".into()))
}

/// Accepts both user-level and profile-level tokens.
///
/// The validator travels in request extensions; see `routes::router`.
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let tokens = parts
            .extensions
            .get::<TokenService>()
            .ok_or_else(|| AppError::Internal("token service not configured".into()))?;

        tokens.validate(token)
    }
}

/// Only profile-level tokens pass; a user-level token is `Unauthorized`.
impl<S> FromRequestParts<S> for ProfileSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        ProfileSession::try_from(user)
    }
}

/// Best-effort client address. With `trust_proxy_headers` set: X-Real-IP, then
/// the first X-Forwarded-For hop, then the socket peer. Otherwise only the peer,
/// since any client can write those headers.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIp(resolve_client_ip(
            &parts.headers,
            peer,
            state.config.trust_proxy_headers,
        )))
    }
}

fn resolve_client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy_headers: bool) -> Option<IpAddr> {
    if trust_proxy_headers {
        forwarded_ip(headers).or(peer)
    } else {
        peer
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
    {
        return Some(ip);
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .and_then(|first| first.trim().parse().ok())
}
