//! Service adapters, one module per AWS service

pub mod ecr;
pub mod eks;
pub mod route53resolver;
