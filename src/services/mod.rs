pub mod email;
pub mod metrics;
pub mod notify;
pub mod session;
pub mod subscription;
pub mod tokens;
