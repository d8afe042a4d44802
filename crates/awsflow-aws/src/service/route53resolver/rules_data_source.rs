//! aws_route53_resolver_rules
//!
//! Lists resolver rule IDs matching every filter that is set. The
//! listing is paginated until the service stops returning a token.

use super::api::{ResolverRule, Route53ResolverApi};
use async_trait::async_trait;
use awsflow_cloud::{
    Attribute, AttributeKind, CloudError, DataSourceAdapter, OperationContext, Result, Schema,
    State, StateExt, Validator, value::non_empty,
};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub const TYPE_NAME: &str = "aws_route53_resolver_rules";

/// Owner of the rules AWS creates for every VPC
const AWS_OWNER: &str = "Route 53 Resolver";

pub struct ResolverRulesDataSource {
    conn: Arc<dyn Route53ResolverApi>,
    region: String,
}

impl ResolverRulesDataSource {
    pub fn new(conn: Arc<dyn Route53ResolverApi>, region: impl Into<String>) -> Self {
        Self {
            conn,
            region: region.into(),
        }
    }
}

/// Filters taken from the configuration; unset filters match everything
struct RuleFilter {
    name_regex: Option<Regex>,
    owner_id: Option<String>,
    resolver_endpoint_id: Option<String>,
    rule_type: Option<String>,
    share_status: Option<String>,
}

impl RuleFilter {
    fn from_config(config: &State) -> Result<Self> {
        let name_regex = non_empty(config, "name_regex")
            .map(Regex::new)
            .transpose()
            .map_err(|e| CloudError::InvalidConfig(format!("name_regex: {}", e)))?;

        let owned = |key: &str| non_empty(config, key).map(str::to_string);

        Ok(Self {
            name_regex,
            owner_id: owned("owner_id"),
            resolver_endpoint_id: owned("resolver_endpoint_id"),
            rule_type: owned("rule_type"),
            share_status: owned("share_status"),
        })
    }

    fn matches(&self, rule: &ResolverRule) -> bool {
        fn field(wanted: &Option<String>, actual: &Option<String>) -> bool {
            wanted.is_none() || wanted == actual
        }

        let name_ok = match &self.name_regex {
            Some(re) => re.is_match(rule.name.as_deref().unwrap_or("")),
            None => true,
        };

        name_ok
            && field(&self.owner_id, &rule.owner_id)
            && field(&self.resolver_endpoint_id, &rule.resolver_endpoint_id)
            && field(&self.rule_type, &rule.rule_type)
            && field(&self.share_status, &rule.share_status)
    }
}

#[async_trait]
impl DataSourceAdapter for ResolverRulesDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new(0)
            .describe("Provides the IDs of Route 53 Resolver rules matching the given filters.")
            .attribute("id", Attribute::computed(AttributeKind::String))
            .attribute(
                "name_regex",
                Attribute::optional(AttributeKind::String).validator(Validator::IsValidRegex),
            )
            .attribute(
                "owner_id",
                Attribute::optional(AttributeKind::String).validator(Validator::Any(vec![
                    Validator::ValidAccountId,
                    Validator::one_of(&[AWS_OWNER]),
                ])),
            )
            .attribute(
                "resolver_endpoint_id",
                Attribute::optional(AttributeKind::String),
            )
            .attribute(
                "resolver_rule_ids",
                Attribute::computed(AttributeKind::SetOfString),
            )
            .attribute(
                "rule_type",
                Attribute::optional(AttributeKind::String)
                    .validator(Validator::one_of(&["FORWARD", "SYSTEM", "RECURSIVE"])),
            )
            .attribute(
                "share_status",
                Attribute::optional(AttributeKind::String).validator(Validator::one_of(&[
                    "NOT_SHARED",
                    "SHARED_WITH_ME",
                    "SHARED_BY_ME",
                ])),
            )
    }

    async fn read(&self, _ctx: &OperationContext, config: &State) -> Result<State> {
        let filter = RuleFilter::from_config(config)?;
        let mut ids = BTreeSet::new();
        let mut next_token = None;

        loop {
            let page = self
                .conn
                .list_resolver_rules(next_token)
                .await
                .map_err(|e| e.into_cloud("listing Route 53 Resolver Rules"))?;

            ids.extend(
                page.rules
                    .iter()
                    .filter(|rule| filter.matches(rule))
                    .map(|rule| rule.id.clone()),
            );

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        debug!("Found {} matching Route 53 Resolver Rules", ids.len());

        let ids: Vec<String> = ids.into_iter().collect();
        let mut state = config.clone();
        state.set_value("id", self.region.as_str());
        state.set_string_list("resolver_rule_ids", &ids);
        Ok(state)
    }
}
