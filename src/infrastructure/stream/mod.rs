//! Durable click log on Redis Streams.

pub mod redis_click_log;

pub use redis_click_log::RedisClickLog;
