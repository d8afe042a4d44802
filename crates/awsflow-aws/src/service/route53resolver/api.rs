//! Route 53 Resolver operations used by the adapters

use crate::errs::classify;
use crate::error::Result;
use async_trait::async_trait;

/// The fields of a resolver rule the data source filters on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverRule {
    pub id: String,
    pub name: Option<String>,
    pub owner_id: Option<String>,
    pub resolver_endpoint_id: Option<String>,
    pub rule_type: Option<String>,
    pub share_status: Option<String>,
}

/// One page of `ListResolverRules`
#[derive(Debug, Clone, Default)]
pub struct ResolverRulePage {
    pub rules: Vec<ResolverRule>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait Route53ResolverApi: Send + Sync {
    async fn list_resolver_rules(&self, next_token: Option<String>) -> Result<ResolverRulePage>;
}

#[async_trait]
impl Route53ResolverApi for aws_sdk_route53resolver::Client {
    async fn list_resolver_rules(&self, next_token: Option<String>) -> Result<ResolverRulePage> {
        let output = self
            .list_resolver_rules()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| classify(e, &[]))?;

        let rules = output
            .resolver_rules()
            .iter()
            .filter_map(|rule| {
                Some(ResolverRule {
                    id: rule.id()?.to_string(),
                    name: rule.name().map(str::to_string),
                    owner_id: rule.owner_id().map(str::to_string),
                    resolver_endpoint_id: rule.resolver_endpoint_id().map(str::to_string),
                    rule_type: rule.rule_type().map(|t| t.as_str().to_string()),
                    share_status: rule.share_status().map(|s| s.as_str().to_string()),
                })
            })
            .collect();

        Ok(ResolverRulePage {
            rules,
            next_token: output.next_token().map(str::to_string),
        })
    }
}
