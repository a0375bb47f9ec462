use redis::aio::MultiplexedConnection;

use crate::error::{AppError, AppResult};

/// Fixed-window attempt counter stored in Redis.
#[derive(Clone)]
pub struct RateLimiter {
    conn: MultiplexedConnection,
}

impl RateLimiter {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// INCR the counter for `key`; the window starts on the first increment.
    /// Redis errors let the request through.
    pub async fn check(&self, key: &str, max_attempts: u64, window_secs: u64) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let count: u64 = match redis::cmd("INCR").arg(key).query_async(&mut conn).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(key, "rate limiter unavailable: {e}");
                return Ok(());
            }
        };

        if count == 1 {
            let _: Result<(), _> = redis::cmd("EXPIRE")
                .arg(key)
                .arg(window_secs)
                .query_async(&mut conn)
                .await;
        }

        if count > max_attempts {
            tracing::info!(key, count, "rate limit exceeded");
            return Err(AppError::TooManyRequests);
        }

        Ok(())
    }
}

/// Attempts are keyed per identifier, case-insensitively.
pub fn attempt_key(scope: &str, identifier: &str) -> String {
    format!("rate:{scope}:{}", identifier.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_ignore_case_and_padding() {
        assert_eq!(attempt_key("login", " Alice@X.com "), "rate:login:alice@x.com");
    }
}
