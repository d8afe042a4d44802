//! AWS resource adapters for awsflow
//!
//! Implements three AWS object types on top of `awsflow-cloud`:
//!
//! | Type                              | Kind        | Provider        |
//! |-----------------------------------|-------------|-----------------|
//! | `aws_ecr_pull_through_cache_rule` | resource    | `aws/classic`   |
//! | `aws_route53_resolver_rules`      | data source | `aws/classic`   |
//! | `aws_eks_cluster`                 | resource    | `aws/framework` |
//!
//! Each service is reached through a small trait (`EcrApi`, `EksApi`,
//! `Route53ResolverApi`) implemented by the matching SDK client.

pub mod conns;
pub mod error;
mod errs;
pub mod provider;
pub mod service;
pub mod tags;

pub use conns::{AwsClient, AwsConfig};
pub use error::{AwsError, Result};
pub use provider::{
    ClassicProvider, FrameworkProvider, provider_server, provider_server_factory,
};
pub use tags::Tags;
