//! Amazon EKS

pub mod api;
pub mod cluster;

pub use api::{Cluster, EksApi};
pub use cluster::ClusterResource;
