//! Builds per-run [`GithubClient`]s from installation credentials.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    Authenticator, InstallationId, IssueTracker, Repository, TrackerConnector, TrackerError,
};

use crate::{GithubApiConfig, GithubClient};

/// [`TrackerConnector`] that requests a fresh installation token for every
/// run and scopes the resulting client to the event's repository.
pub struct GithubConnector {
    authenticator: Arc<dyn Authenticator>,
    config: GithubApiConfig,
}

impl GithubConnector {
    pub fn new(authenticator: Arc<dyn Authenticator>, config: GithubApiConfig) -> Self {
        Self {
            authenticator,
            config,
        }
    }

    /// Like [`TrackerConnector::connect`] but returns the concrete client,
    /// which also exposes issue and repository lookups.
    pub async fn client_for(
        &self,
        installation: InstallationId,
        owner: &str,
        name: &str,
    ) -> Result<GithubClient, TrackerError> {
        let token = self.authenticator.token_for(installation).await?;
        GithubClient::new(self.config.clone(), token, owner, name)
    }
}

#[async_trait]
impl TrackerConnector for GithubConnector {
    async fn connect(
        &self,
        installation: InstallationId,
        repository: &Repository,
    ) -> Result<Arc<dyn IssueTracker>, TrackerError> {
        let client = self
            .client_for(installation, &repository.owner, &repository.name)
            .await?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
#[path = "connector_tests.rs"]
mod tests;
