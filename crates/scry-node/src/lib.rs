//! # scry-node — Projection runtime: configuration and publishing.
//!
//! Composes the engine into a long-running service:
//! - [`config::ProjectorConfig`] — run limits and capacity ceilings
//! - [`service::Projector`] — runs the engine on a blocking thread under a
//!   timeout and publishes completed templates through a watch channel

pub mod config;
pub mod service;

pub use config::ProjectorConfig;
pub use service::Projector;
