use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::pr::fetch_pull_request;
use crate::model::{Connection, PullRequest, PullRequestKey};
use crate::service::{ModelService, ModelServiceFactory};

/// Creates `gh`-backed services, one per host.
#[derive(Debug, Default, Clone, Copy)]
pub struct GhModelServiceFactory;

#[async_trait]
impl ModelServiceFactory for GhModelServiceFactory {
    async fn create_model_service(
        &self,
        connection: &Connection,
    ) -> Result<Arc<dyn ModelService>> {
        Ok(Arc::new(GhModelService {
            host: connection.host.clone(),
        }))
    }
}

#[derive(Debug, Clone)]
pub struct GhModelService {
    host: String,
}

#[async_trait]
impl ModelService for GhModelService {
    async fn get_pull_request(&self, owner: &str, repo: &str, number: u32) -> Result<PullRequest> {
        fetch_pull_request(&self.host, &PullRequestKey::new(owner, repo, number)).await
    }
}
