//! Single entry point tying authentication, search and normalization together.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::auth::{
    AccessToken, AuthStatus, AuthStatusChecker, AzureCli, CredentialSource, TokenProvider,
};
use crate::config::Config;
use crate::error::{GraphError, SearchError};
use crate::graph::{normalize, EntityType, GraphSearchClient, SearchRequest, SearchResult};

/// Owns one of each component and runs the search control flow.
pub struct ObjectSeeker {
    config: Config,
    tokens: TokenProvider,
    status: AuthStatusChecker,
    client: GraphSearchClient,
}

impl ObjectSeeker {
    /// Build the production stack backed by the Azure CLI.
    pub fn new(config: Config) -> Result<Self, SearchError> {
        let cli = AzureCli::new(config.cli_program(), config.cli_timeout());
        Self::with_source(config, Arc::new(cli))
    }

    /// Build with an explicit credential source.
    pub fn with_source(
        config: Config,
        source: Arc<dyn CredentialSource>,
    ) -> Result<Self, SearchError> {
        let client = GraphSearchClient::from_config(&config)?;
        let tokens = TokenProvider::new(Arc::clone(&source), config.expiry_margin());
        let status = AuthStatusChecker::new(source, config.cli_timeout());

        Ok(Self {
            config,
            tokens,
            status,
            client,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Advisory sign-in check. Never fails.
    pub async fn check_auth(&self) -> AuthStatus {
        self.status.check().await
    }

    /// Current Graph token, from cache when still fresh.
    pub async fn token(&self) -> Result<AccessToken, SearchError> {
        Ok(self.tokens.get_token(&self.config.auth.resource).await?)
    }

    /// Search using the configured result cap and timeout.
    pub async fn search(
        &self,
        entity_type: EntityType,
        query: &str,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let request = SearchRequest::new(
            entity_type,
            query,
            self.config.search.max_results,
            self.config.search_timeout(),
        )?;
        self.search_request(&request).await
    }

    /// Search with an explicit request.
    ///
    /// Input is validated before the CLI or network is touched. A 401 from
    /// Graph drops the cached token so the next search fetches a new one.
    pub async fn search_request(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<SearchResult>, SearchError> {
        // Fields are public, so re-check what `SearchRequest::new` guarantees.
        let request = SearchRequest::new(
            request.entity_type,
            &request.query,
            request.max_results,
            request.timeout,
        )?;

        let resource = &self.config.auth.resource;
        let token = self.tokens.get_token(resource).await?;

        debug!(
            "Searching {} for '{}' (max {})",
            request.entity_type, request.query, request.max_results
        );

        let records = match self.client.search(&request, &token).await {
            Ok(records) => records,
            Err(GraphError::Unauthenticated(detail)) => {
                warn!("Graph rejected the cached token, discarding it");
                self.tokens.invalidate(resource).await;
                return Err(GraphError::Unauthenticated(detail).into());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(normalize(request.entity_type, records))
    }
}
