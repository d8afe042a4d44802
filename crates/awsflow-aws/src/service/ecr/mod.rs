//! Amazon ECR

pub mod api;
pub mod pull_through_cache_rule;

pub use api::{EcrApi, PullThroughCacheRule};
pub use pull_through_cache_rule::PullThroughCacheRuleResource;
