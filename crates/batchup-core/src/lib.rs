//! batchup core: adaptive-concurrency batch upload scheduler.
//!
//! The [`scheduler`] module is the engine; [`http_put`] is a ready-made
//! executor for plain HTTP PUT endpoints. Everything else is ambient support
//! (config, logging, retry).

pub mod config;
pub mod logging;

pub mod http_put;
pub mod item;
pub mod retry;
pub mod scheduler;
pub mod tier;
