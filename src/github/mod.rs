mod client;
mod comment;
mod pr;
mod service;
mod session;

pub use comment::{group_into_files, ReviewComment};
pub use pr::detect_local_repository;
pub use service::{GhModelService, GhModelServiceFactory};
pub use session::GhSessionManager;
