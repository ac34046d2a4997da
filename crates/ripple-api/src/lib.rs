//! # ripple-api
//!
//! HTTP platform API for the Ripple realtime data engine.
//!
//! This crate owns every HTTP concern of a component's boot sequence:
//!
//! - **PlatformApi / HttpApi** - key validation, usage limits, secret-to-key
//!   exchange, fire-and-forget telemetry
//! - **AuthService** - "is this apiKey valid", with 404 meaning invalid
//!   rather than failed
//! - **RemoteConfig** - environment-specific API base URL resolution, with a
//!   bundled configuration for the `local` environment
//!
//! [`PlatformApi`] is a trait so component tests boot against a scripted
//! implementation instead of the network.

pub mod auth;
pub mod client;
pub mod error;
pub mod limits;
pub mod remote_config;

pub use auth::{AuthError, AuthService};
pub use client::{create_url, HttpApi, PlatformApi, DEFAULT_REQUEST_TIMEOUT};
pub use error::ApiError;
pub use limits::{MaxParticipants, RealtimeLimits};
pub use remote_config::{bundled_local_config, RemoteConfig, LOCAL_API_URL, REMOTE_CONFIG_BASE_URL};
