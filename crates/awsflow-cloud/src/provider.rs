//! Adapter and provider traits
//!
//! Every remote object type is one [`ResourceAdapter`] (schema + CRUD) or
//! one [`DataSourceAdapter`] (schema + read). A [`Provider`] groups the
//! adapters that share a configured client.

use crate::error::Result;
use crate::schema::Schema;
use crate::value::State;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-call context handed to adapters
///
/// Carries the deadline derived from the schema's timeouts and whether
/// the call belongs to a resource created in this same operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationContext {
    deadline: Option<Instant>,
    new_resource: bool,
}

impl OperationContext {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            deadline: timeout.and_then(|t| Instant::now().checked_add(t)),
            new_resource: false,
        }
    }

    pub fn for_new_resource(mut self) -> Self {
        self.new_resource = true;
        self
    }

    pub fn is_new_resource(&self) -> bool {
        self.new_resource
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

/// Outcome of refreshing a resource
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The remote object exists; the refreshed record
    Found(State),
    /// The remote object is gone; the record must be dropped from state
    Removed,
}

impl ReadOutcome {
    pub fn into_state(self) -> Option<State> {
        match self {
            ReadOutcome::Found(state) => Some(state),
            ReadOutcome::Removed => None,
        }
    }
}

/// Schema and CRUD handlers for one remote resource type
///
/// `read` and `delete` report the type's "resource absent" condition as
/// [`CloudError::ResourceNotFound`](crate::CloudError::ResourceNotFound);
/// the server turns it into state removal or success.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Type name used in configuration (e.g., "aws_eks_cluster")
    fn type_name(&self) -> &str;

    fn schema(&self) -> Schema;

    /// Creates the remote object and returns a record carrying at least its `id`
    async fn create(&self, ctx: &OperationContext, planned: &State) -> Result<State>;

    /// Fetches the remote object identified by `state`
    async fn read(&self, ctx: &OperationContext, state: &State) -> Result<State>;

    /// Applies in-place changes; immutable attributes never reach here
    async fn update(&self, ctx: &OperationContext, prior: &State, planned: &State)
    -> Result<State>;

    async fn delete(&self, ctx: &OperationContext, state: &State) -> Result<()>;

    /// Attribute that receives the identifier on import
    fn import_attribute(&self) -> &str {
        "id"
    }

    /// Seeds the record that the post-import read starts from
    fn import_state(&self, id: &str) -> State {
        let mut state = State::new();
        state.insert("id".to_string(), id.into());
        state.insert(self.import_attribute().to_string(), id.into());
        state
    }

    /// Adjusts a planned record before it is shown or applied
    fn modify_plan(&self, _planned: &mut State) {}
}

/// Schema and read handler for one data source type
#[async_trait]
pub trait DataSourceAdapter: Send + Sync {
    fn type_name(&self) -> &str;

    fn schema(&self) -> Schema;

    async fn read(&self, ctx: &OperationContext, config: &State) -> Result<State>;
}

/// A set of adapters sharing one configured client
pub trait Provider: Send + Sync {
    /// Returns the provider name (e.g., "aws/classic")
    fn name(&self) -> &str;

    fn resources(&self) -> Vec<Arc<dyn ResourceAdapter>>;

    fn data_sources(&self) -> Vec<Arc<dyn DataSourceAdapter>>;
}

/// Backoff configuration for status polling
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Initial delay between polls
    pub initial_delay: Duration,

    /// Maximum delay between polls
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Delay before poll `attempt + 1`, never above `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if secs.is_finite() && secs < self.max_delay.as_secs_f64() {
            Duration::from_secs_f64(secs.max(0.0))
        } else {
            self.max_delay
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}
