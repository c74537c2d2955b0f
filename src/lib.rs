//! Keeps a pull request review draft in sync with the live comment session it belongs to.

pub mod binder;
pub mod collaborators;
pub mod config;
pub mod editor;
pub mod error;
pub mod filter;
pub mod github;
pub mod model;
pub mod orchestrator;
pub mod projector;
pub mod report;
pub mod service;
pub mod session;
pub mod state;
