//! stak - stacked branches for Git with GitHub/GitLab support
//!
//! Tracks a forest of branches, each stacked on a parent, keeps every branch
//! rebased onto its parent's latest state, and lands review requests
//! bottom-up while re-parenting what sits above them.
//!
//! The engines ([`sync`], [`merge`], [`conflict`]) talk to the outside world
//! only through three collaborators: [`vcs::Vcs`], [`tracking::MetadataStore`]
//! and [`platform::PlatformService`].

pub mod auth;
pub mod comments;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod fold;
pub mod error;
pub mod merge;
pub mod platform;
pub mod progress;
pub mod stack;
pub mod sync;
pub mod tracking;
pub mod types;
pub mod vcs;

pub use error::{Error, ErrorCategory, Result};
