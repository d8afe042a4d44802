//! Amazon Route 53 Resolver

pub mod api;
pub mod rules_data_source;

pub use api::{ResolverRule, ResolverRulePage, Route53ResolverApi};
pub use rules_data_source::ResolverRulesDataSource;
