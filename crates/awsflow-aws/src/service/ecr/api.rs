//! ECR operations used by the adapters
//!
//! The adapters talk to [`EcrApi`]; the SDK client implements it and
//! tests substitute an in-memory fake.

use crate::errs::classify;
use crate::error::{AwsError, Result};
use async_trait::async_trait;

const RULE_NOT_FOUND: &str = "PullThroughCacheRuleNotFoundException";

/// A pull through cache rule as ECR describes it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullThroughCacheRule {
    pub ecr_repository_prefix: String,
    pub registry_id: Option<String>,
    pub upstream_registry_url: Option<String>,
    pub credential_arn: Option<String>,
}

#[async_trait]
pub trait EcrApi: Send + Sync {
    async fn create_pull_through_cache_rule(
        &self,
        ecr_repository_prefix: &str,
        upstream_registry_url: &str,
        credential_arn: Option<&str>,
    ) -> Result<()>;

    /// Fails with [`AwsError::NotFound`] when no rule has this prefix
    async fn describe_pull_through_cache_rule(
        &self,
        ecr_repository_prefix: &str,
    ) -> Result<PullThroughCacheRule>;

    async fn update_pull_through_cache_rule(
        &self,
        ecr_repository_prefix: &str,
        registry_id: Option<&str>,
        credential_arn: Option<&str>,
    ) -> Result<()>;

    async fn delete_pull_through_cache_rule(
        &self,
        ecr_repository_prefix: &str,
        registry_id: Option<&str>,
    ) -> Result<()>;
}

#[async_trait]
impl EcrApi for aws_sdk_ecr::Client {
    async fn create_pull_through_cache_rule(
        &self,
        ecr_repository_prefix: &str,
        upstream_registry_url: &str,
        credential_arn: Option<&str>,
    ) -> Result<()> {
        self.create_pull_through_cache_rule()
            .ecr_repository_prefix(ecr_repository_prefix)
            .upstream_registry_url(upstream_registry_url)
            .set_credential_arn(credential_arn.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify(e, &[]))?;
        Ok(())
    }

    async fn describe_pull_through_cache_rule(
        &self,
        ecr_repository_prefix: &str,
    ) -> Result<PullThroughCacheRule> {
        let output = self
            .describe_pull_through_cache_rules()
            .ecr_repository_prefixes(ecr_repository_prefix)
            .send()
            .await
            .map_err(|e| classify(e, &[RULE_NOT_FOUND]))?;

        output
            .pull_through_cache_rules()
            .iter()
            .find(|rule| rule.ecr_repository_prefix() == Some(ecr_repository_prefix))
            .map(|rule| PullThroughCacheRule {
                ecr_repository_prefix: ecr_repository_prefix.to_string(),
                registry_id: rule.registry_id().map(str::to_string),
                upstream_registry_url: rule.upstream_registry_url().map(str::to_string),
                credential_arn: rule.credential_arn().map(str::to_string),
            })
            .ok_or_else(|| {
                AwsError::NotFound(format!(
                    "{}: no rule with prefix {}",
                    RULE_NOT_FOUND, ecr_repository_prefix
                ))
            })
    }

    async fn update_pull_through_cache_rule(
        &self,
        ecr_repository_prefix: &str,
        registry_id: Option<&str>,
        credential_arn: Option<&str>,
    ) -> Result<()> {
        self.update_pull_through_cache_rule()
            .ecr_repository_prefix(ecr_repository_prefix)
            .set_registry_id(registry_id.map(str::to_string))
            .set_credential_arn(credential_arn.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify(e, &[RULE_NOT_FOUND]))?;
        Ok(())
    }

    async fn delete_pull_through_cache_rule(
        &self,
        ecr_repository_prefix: &str,
        registry_id: Option<&str>,
    ) -> Result<()> {
        self.delete_pull_through_cache_rule()
            .ecr_repository_prefix(ecr_repository_prefix)
            .set_registry_id(registry_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify(e, &[RULE_NOT_FOUND]))?;
        Ok(())
    }
}
