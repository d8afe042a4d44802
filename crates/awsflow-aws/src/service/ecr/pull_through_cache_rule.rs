//! aws_ecr_pull_through_cache_rule
//!
//! A rule caches images from an upstream registry under a repository
//! prefix. The prefix is the identifier; only the credential can change
//! in place.

use super::api::{EcrApi, PullThroughCacheRule};
use async_trait::async_trait;
use awsflow_cloud::{
    Attribute, AttributeKind, CloudError, OperationContext, ResourceAdapter, Result, Schema,
    State, StateExt, Validator,
};
use std::sync::Arc;
use tracing::{debug, info};

pub const TYPE_NAME: &str = "aws_ecr_pull_through_cache_rule";

/// Unanchored: a prefix passes when any part of it matches
const REPOSITORY_PREFIX_PATTERN: &str =
    r"(?:[a-z0-9]+(?:[._-][a-z0-9]+)*/)*[a-z0-9]+(?:[._-][a-z0-9]+)*";

pub struct PullThroughCacheRuleResource {
    conn: Arc<dyn EcrApi>,
}

impl PullThroughCacheRuleResource {
    pub fn new(conn: Arc<dyn EcrApi>) -> Self {
        Self { conn }
    }
}

fn prefix_of(state: &State) -> Result<&str> {
    state
        .get_str("ecr_repository_prefix")
        .or_else(|| state.get_str("id"))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CloudError::InvalidConfig("ecr_repository_prefix is not set".to_string()))
}

fn flatten(rule: &PullThroughCacheRule, state: &mut State) {
    state.set_value("id", rule.ecr_repository_prefix.as_str());
    state.set_value("ecr_repository_prefix", rule.ecr_repository_prefix.as_str());
    state.set_opt_str("registry_id", rule.registry_id.as_deref());
    state.set_opt_str("upstream_registry_url", rule.upstream_registry_url.as_deref());
    state.set_opt_str("credential_arn", rule.credential_arn.as_deref());
}

#[async_trait]
impl ResourceAdapter for PullThroughCacheRuleResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new(0)
            .describe("Provides an Elastic Container Registry Pull Through Cache Rule.")
            .attribute("id", Attribute::id())
            .attribute(
                "ecr_repository_prefix",
                Attribute::required(AttributeKind::String)
                    .requires_replace()
                    .validator(Validator::All(vec![
                        Validator::StringLenBetween(2, 30),
                        Validator::regex_matches(
                            REPOSITORY_PREFIX_PATTERN,
                            "must only include alphanumeric, underscore, period, hyphen, or slash characters",
                        ),
                    ])),
            )
            .attribute("registry_id", Attribute::computed(AttributeKind::String))
            .attribute(
                "upstream_registry_url",
                Attribute::required(AttributeKind::String).requires_replace(),
            )
            .attribute(
                "credential_arn",
                Attribute::optional(AttributeKind::String).validator(Validator::ValidArn),
            )
    }

    async fn create(&self, _ctx: &OperationContext, planned: &State) -> Result<State> {
        let prefix = prefix_of(planned)?;
        let upstream = planned.get_str("upstream_registry_url").ok_or_else(|| {
            CloudError::InvalidConfig("upstream_registry_url is not set".to_string())
        })?;

        debug!("Creating ECR Pull Through Cache Rule: {}", prefix);
        self.conn
            .create_pull_through_cache_rule(prefix, upstream, planned.get_str("credential_arn"))
            .await
            .map_err(|e| {
                e.into_cloud(format!("creating ECR Pull Through Cache Rule ({})", prefix))
            })?;
        info!("ECR Pull Through Cache Rule created: {}", prefix);

        let mut state = planned.clone();
        state.set_value("id", prefix);
        Ok(state)
    }

    async fn read(&self, _ctx: &OperationContext, state: &State) -> Result<State> {
        let prefix = prefix_of(state)?;

        let rule = self
            .conn
            .describe_pull_through_cache_rule(prefix)
            .await
            .map_err(|e| {
                e.into_cloud(format!("reading ECR Pull Through Cache Rule ({})", prefix))
            })?;

        let mut refreshed = state.clone();
        flatten(&rule, &mut refreshed);
        Ok(refreshed)
    }

    async fn update(
        &self,
        _ctx: &OperationContext,
        prior: &State,
        planned: &State,
    ) -> Result<State> {
        let prefix = prefix_of(prior)?;

        debug!("Updating ECR Pull Through Cache Rule: {}", prefix);
        self.conn
            .update_pull_through_cache_rule(
                prefix,
                prior.get_str("registry_id"),
                planned.get_str("credential_arn"),
            )
            .await
            .map_err(|e| {
                e.into_cloud(format!("updating ECR Pull Through Cache Rule ({})", prefix))
            })?;

        let mut state = planned.clone();
        state.set_value("id", prefix);
        Ok(state)
    }

    async fn delete(&self, _ctx: &OperationContext, state: &State) -> Result<()> {
        let prefix = prefix_of(state)?;

        info!("Deleting ECR Pull Through Cache Rule: {}", prefix);
        self.conn
            .delete_pull_through_cache_rule(prefix, state.get_str("registry_id"))
            .await
            .map_err(|e| {
                e.into_cloud(format!("deleting ECR Pull Through Cache Rule ({})", prefix))
            })
    }
}
