use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::model::{Connection, PullRequest};

/// Read access to pull request data on one remote.
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn get_pull_request(&self, owner: &str, repo: &str, number: u32)
        -> Result<PullRequest>;
}

#[async_trait]
pub trait ModelServiceFactory: Send + Sync {
    async fn create_model_service(&self, connection: &Connection)
        -> Result<Arc<dyn ModelService>>;
}
