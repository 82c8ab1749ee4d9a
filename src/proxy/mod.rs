//! Outbound proxy pool
//!
//! [`ProxyRotator`] owns the pool and picks the identity requests go out
//! through, biased toward proxies that have been succeeding.

pub mod rotator;
pub mod score;

pub use rotator::ProxyRotator;
pub use score::HealthScore;
