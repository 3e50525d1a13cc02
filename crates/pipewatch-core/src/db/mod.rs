//! Redis-backed persistence
//!
//! Used when the notification dedup store must survive restarts.

mod redis;

pub use self::redis::{RedisNotifiedStore, RedisPool};
