//! AWS providers and the provider server factory
//!
//! Resource types are split across two providers: `aws/classic` carries
//! the ECR pull through cache rule and the Route 53 Resolver rules data
//! source, `aws/framework` carries the EKS cluster. Both are served
//! behind one [`ProviderServer`].

use crate::conns::{AwsClient, AwsConfig};
use crate::error::{AwsError, Result};
use crate::service::ecr::{EcrApi, PullThroughCacheRuleResource};
use crate::service::eks::{ClusterResource, EksApi};
use crate::service::route53resolver::{ResolverRulesDataSource, Route53ResolverApi};
use crate::tags::Tags;
use awsflow_cloud::{DataSourceAdapter, Provider, ProviderServer, ResourceAdapter, RetryConfig};
use std::sync::Arc;
use tracing::info;

pub const CLASSIC_PROVIDER: &str = "aws/classic";
pub const FRAMEWORK_PROVIDER: &str = "aws/framework";

pub struct ClassicProvider {
    ecr: Arc<dyn EcrApi>,
    route53resolver: Arc<dyn Route53ResolverApi>,
    region: String,
}

impl ClassicProvider {
    pub fn new(client: &AwsClient) -> Self {
        Self::with_apis(
            Arc::new(client.ecr()),
            Arc::new(client.route53resolver()),
            client.region(),
        )
    }

    pub fn with_apis(
        ecr: Arc<dyn EcrApi>,
        route53resolver: Arc<dyn Route53ResolverApi>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            ecr,
            route53resolver,
            region: region.into(),
        }
    }
}

impl Provider for ClassicProvider {
    fn name(&self) -> &str {
        CLASSIC_PROVIDER
    }

    fn resources(&self) -> Vec<Arc<dyn ResourceAdapter>> {
        vec![Arc::new(PullThroughCacheRuleResource::new(self.ecr.clone()))]
    }

    fn data_sources(&self) -> Vec<Arc<dyn DataSourceAdapter>> {
        vec![Arc::new(ResolverRulesDataSource::new(
            self.route53resolver.clone(),
            self.region.clone(),
        ))]
    }
}

pub struct FrameworkProvider {
    eks: Arc<dyn EksApi>,
    default_tags: Tags,
    retry: RetryConfig,
}

impl FrameworkProvider {
    pub fn new(client: &AwsClient) -> Self {
        Self::with_api(Arc::new(client.eks()), client.default_tags().clone())
    }

    pub fn with_api(eks: Arc<dyn EksApi>, default_tags: Tags) -> Self {
        Self {
            eks,
            default_tags,
            retry: RetryConfig::default(),
        }
    }

    /// Overrides the backoff used while waiting on cluster status
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Provider for FrameworkProvider {
    fn name(&self) -> &str {
        FRAMEWORK_PROVIDER
    }

    fn resources(&self) -> Vec<Arc<dyn ResourceAdapter>> {
        let cluster = ClusterResource::new(self.eks.clone(), self.default_tags.clone())
            .with_retry(self.retry.clone());
        vec![Arc::new(cluster)]
    }

    fn data_sources(&self) -> Vec<Arc<dyn DataSourceAdapter>> {
        Vec::new()
    }
}

/// Serves both providers against one configured client
pub fn provider_server(client: &AwsClient) -> Result<ProviderServer> {
    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(ClassicProvider::new(client)),
        Arc::new(FrameworkProvider::new(client)),
    ];
    ProviderServer::mux(providers).map_err(AwsError::from)
}

/// Loads the AWS configuration and builds the multiplexed provider server
pub async fn provider_server_factory(config: &AwsConfig) -> Result<ProviderServer> {
    let client = AwsClient::load(config).await?;
    let server = provider_server(&client)?;

    info!(
        "AWS providers ready in {} ({} resource types, {} data sources)",
        client.region(),
        server.resource_types().len(),
        server.data_source_types().len()
    );
    Ok(server)
}
