//! awsflow resource adapter framework
//!
//! This crate provides the pieces every resource adapter shares: the
//! schema model, schema-declared validators, the per-resource planner,
//! and the provider server that dispatches create / read / update /
//! delete to adapters by type name.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  awsflow CLI                     │
//! │          (validate / plan / apply / ...)         │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                awsflow-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │     ProviderServer (mux of providers)    │   │
//! │  │  trait ResourceAdapter / DataSource...   │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌────────────┐ ┌────────────┐     │
//! │  │  Schema  │ │ Validation │ │ State Mgmt │     │
//! │  └──────────┘ └────────────┘ └────────────┘     │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │  aws/classic  │ │ aws/framework │
//! │   provider    │ │   provider    │
//! └───────────────┘ └───────────────┘
//! ```

pub mod action;
pub mod diagnostics;
pub mod error;
pub mod provider;
pub mod schema;
pub mod server;
pub mod state;
pub mod validation;
pub mod value;
pub mod waiter;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary, plan_resource};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{CloudError, Result};
pub use provider::{
    DataSourceAdapter, OperationContext, Provider, ReadOutcome, ResourceAdapter, RetryConfig,
};
pub use schema::{Attribute, AttributeKind, Block, PlanModifier, Schema, Timeouts};
pub use server::{ProviderSchemas, ProviderServer};
pub use state::{GlobalState, ResourceState, StateLock, StateManager};
pub use validation::{Validator, validate_config};
pub use value::{State, StateExt};
pub use waiter::{WaitStatus, wait_until};
