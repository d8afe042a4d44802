//! Provider server and multiplexer
//!
//! The server owns the adapters of one or more providers and dispatches
//! each operation by type name. It is also where the contract shared by
//! every adapter is enforced: create is followed by a read, a vanished
//! resource is dropped from state on read, and delete of an absent
//! resource succeeds.

use crate::action::{Action, ActionType, plan_resource};
use crate::diagnostics::Diagnostics;
use crate::error::{CloudError, Result};
use crate::provider::{
    DataSourceAdapter, OperationContext, Provider, ReadOutcome, ResourceAdapter,
};
use crate::schema::{Schema, Timeouts};
use crate::validation::validate_config;
use crate::value::State;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

struct Registered<T: ?Sized> {
    provider: String,
    adapter: Arc<T>,
}

/// Schemas of every registered type, as served to the host
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSchemas {
    pub resources: BTreeMap<String, Schema>,
    pub data_sources: BTreeMap<String, Schema>,
}

pub struct ProviderServer {
    resources: HashMap<String, Registered<dyn ResourceAdapter>>,
    data_sources: HashMap<String, Registered<dyn DataSourceAdapter>>,
}

impl ProviderServer {
    /// Serves a single provider
    pub fn new(provider: Arc<dyn Provider>) -> Result<Self> {
        Self::mux(vec![provider])
    }

    /// Combines several providers behind one server
    ///
    /// Fails when two providers register the same resource or data source type.
    pub fn mux(providers: Vec<Arc<dyn Provider>>) -> Result<Self> {
        let mut resources: HashMap<String, Registered<dyn ResourceAdapter>> = HashMap::new();
        let mut data_sources: HashMap<String, Registered<dyn DataSourceAdapter>> = HashMap::new();

        for provider in &providers {
            for adapter in provider.resources() {
                let type_name = adapter.type_name().to_string();
                if let Some(existing) = resources.get(&type_name) {
                    return Err(CloudError::DuplicateTypeName {
                        type_name,
                        first: existing.provider.clone(),
                        second: provider.name().to_string(),
                    });
                }
                resources.insert(
                    type_name,
                    Registered {
                        provider: provider.name().to_string(),
                        adapter,
                    },
                );
            }

            for adapter in provider.data_sources() {
                let type_name = adapter.type_name().to_string();
                if let Some(existing) = data_sources.get(&type_name) {
                    return Err(CloudError::DuplicateTypeName {
                        type_name,
                        first: existing.provider.clone(),
                        second: provider.name().to_string(),
                    });
                }
                data_sources.insert(
                    type_name,
                    Registered {
                        provider: provider.name().to_string(),
                        adapter,
                    },
                );
            }
        }

        tracing::debug!(
            "Serving {} resource types and {} data source types from {} providers",
            resources.len(),
            data_sources.len(),
            providers.len()
        );

        Ok(Self {
            resources,
            data_sources,
        })
    }

    pub fn schemas(&self) -> ProviderSchemas {
        ProviderSchemas {
            resources: self
                .resources
                .iter()
                .map(|(name, r)| (name.clone(), r.adapter.schema()))
                .collect(),
            data_sources: self
                .data_sources
                .iter()
                .map(|(name, d)| (name.clone(), d.adapter.schema()))
                .collect(),
        }
    }

    pub fn resource_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn data_source_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.data_sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Name of the provider that registered `type_name`
    pub fn provider_of(&self, type_name: &str) -> Option<&str> {
        self.resources
            .get(type_name)
            .map(|r| r.provider.as_str())
            .or_else(|| self.data_sources.get(type_name).map(|d| d.provider.as_str()))
    }

    fn resource(&self, type_name: &str) -> Result<&Arc<dyn ResourceAdapter>> {
        self.resources
            .get(type_name)
            .map(|r| &r.adapter)
            .ok_or_else(|| CloudError::UnknownResourceType(type_name.to_string()))
    }

    fn data_source(&self, type_name: &str) -> Result<&Arc<dyn DataSourceAdapter>> {
        self.data_sources
            .get(type_name)
            .map(|d| &d.adapter)
            .ok_or_else(|| CloudError::UnknownDataSourceType(type_name.to_string()))
    }

    pub fn validate_resource_config(&self, type_name: &str, config: &State) -> Result<Diagnostics> {
        let adapter = self.resource(type_name)?;
        Ok(validate_config(&adapter.schema(), config))
    }

    pub fn validate_data_source_config(
        &self,
        type_name: &str,
        config: &State,
    ) -> Result<Diagnostics> {
        let adapter = self.data_source(type_name)?;
        Ok(validate_config(&adapter.schema(), config))
    }

    /// Plans one resource instance and lets the adapter adjust the planned record
    pub fn plan_resource(
        &self,
        type_name: &str,
        address: &str,
        prior: Option<&State>,
        config: Option<&State>,
    ) -> Result<Action> {
        let adapter = self.resource(type_name)?;
        let mut action = plan_resource(&adapter.schema(), address, type_name, prior, config);

        if let Some(planned) = action.planned_state.as_mut() {
            adapter.modify_plan(planned);
        }

        // Computed-only adjustments (tags_all) can turn a no-op into an update.
        if action.action_type == ActionType::NoOp {
            if let (Some(prior), Some(planned)) = (prior, action.planned_state.as_ref()) {
                let schema = adapter.schema();
                let drifted: Vec<String> = planned
                    .iter()
                    .filter(|(k, v)| !v.is_null() && prior.get(k.as_str()) != Some(*v))
                    .filter(|(k, _)| {
                        schema
                            .get_attribute(k.as_str())
                            .is_some_and(|a| a.is_computed_only())
                    })
                    .map(|(k, _)| k.clone())
                    .collect();
                if !drifted.is_empty() {
                    action.changed = drifted;
                    action.action_type = ActionType::Update;
                }
            }
        }

        Ok(action)
    }

    /// Plans a data source read
    pub fn plan_data_source(&self, type_name: &str, address: &str, config: &State) -> Result<Action> {
        self.data_source(type_name)?;
        Ok(Action {
            address: address.to_string(),
            action_type: ActionType::Read,
            resource_type: type_name.to_string(),
            prior_state: None,
            planned_state: Some(config.clone()),
            changed: Vec::new(),
            requires_replace: Vec::new(),
        })
    }

    /// Creates the resource, then reads it back to reconcile computed fields
    ///
    /// The resource is new, so a "not found" on the follow-up read is an error.
    pub async fn create_resource(&self, type_name: &str, planned: &State) -> Result<State> {
        let adapter = self.resource(type_name)?;
        let timeouts = resolve_timeouts(&adapter.schema().timeouts, planned)?;
        let ctx = OperationContext::new(timeouts.create).for_new_resource();

        bounded(timeouts.create, type_name, "create", async {
            let created = adapter.create(&ctx, planned).await?;
            let mut state = adapter.read(&ctx, &created).await?;
            keep_config_only(planned, &mut state);
            Ok(state)
        })
        .await
    }

    /// Refreshes a resource; a vanished remote object yields [`ReadOutcome::Removed`]
    pub async fn read_resource(&self, type_name: &str, state: &State) -> Result<ReadOutcome> {
        let adapter = self.resource(type_name)?;
        let timeouts = resolve_timeouts(&adapter.schema().timeouts, state)?;
        let ctx = OperationContext::new(timeouts.read);

        let result = bounded(timeouts.read, type_name, "read", adapter.read(&ctx, state)).await;
        match result {
            Ok(mut refreshed) => {
                keep_config_only(state, &mut refreshed);
                Ok(ReadOutcome::Found(refreshed))
            }
            Err(e) if e.is_not_found() && !ctx.is_new_resource() => {
                tracing::warn!(
                    "{} ({}) not found, removing from state",
                    type_name,
                    id_of(state)
                );
                Ok(ReadOutcome::Removed)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn update_resource(
        &self,
        type_name: &str,
        prior: &State,
        planned: &State,
    ) -> Result<State> {
        let adapter = self.resource(type_name)?;
        let timeouts = resolve_timeouts(&adapter.schema().timeouts, planned)?;
        let ctx = OperationContext::new(timeouts.update);

        bounded(timeouts.update, type_name, "update", async {
            let updated = adapter.update(&ctx, prior, planned).await?;
            let mut state = adapter.read(&ctx, &updated).await?;
            keep_config_only(planned, &mut state);
            Ok(state)
        })
        .await
    }

    /// Deletes a resource; an already-absent resource counts as deleted
    pub async fn delete_resource(&self, type_name: &str, state: &State) -> Result<()> {
        let adapter = self.resource(type_name)?;
        let timeouts = resolve_timeouts(&adapter.schema().timeouts, state)?;
        let ctx = OperationContext::new(timeouts.delete);

        match bounded(timeouts.delete, type_name, "delete", adapter.delete(&ctx, state)).await {
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} ({}) already gone", type_name, id_of(state));
                Ok(())
            }
            other => other,
        }
    }

    /// Imports an existing remote object by identifier
    pub async fn import_resource(&self, type_name: &str, id: &str) -> Result<State> {
        let adapter = self.resource(type_name)?;
        let seed = adapter.import_state(id);
        let ctx = OperationContext::new(adapter.schema().timeouts.read).for_new_resource();

        adapter.read(&ctx, &seed).await.map_err(|e| {
            if e.is_not_found() {
                CloudError::ResourceNotFound(format!(
                    "cannot import non-existent remote object {} ({})",
                    type_name, id
                ))
            } else {
                e
            }
        })
    }

    pub async fn read_data_source(&self, type_name: &str, config: &State) -> Result<State> {
        let adapter = self.data_source(type_name)?;
        let timeouts = resolve_timeouts(&adapter.schema().timeouts, config)?;
        let ctx = OperationContext::new(timeouts.read);

        bounded(timeouts.read, type_name, "read", adapter.read(&ctx, config)).await
    }
}

fn resolve_timeouts(defaults: &Timeouts, state: &State) -> Result<Timeouts> {
    defaults.resolve(state)
}

async fn bounded<T>(
    limit: Option<Duration>,
    type_name: &str,
    operation: &str,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await.map_err(|_| {
            CloudError::Timeout(format!(
                "{} {} did not finish within {}",
                type_name,
                operation,
                crate::schema::format_duration(limit)
            ))
        })?,
        None => future.await,
    }
}

/// The `timeouts` block is config-only; carry it from the input record
fn keep_config_only(from: &State, into: &mut State) {
    if let Some(timeouts) = from.get(crate::schema::TIMEOUTS_BLOCK) {
        into.insert(crate::schema::TIMEOUTS_BLOCK.to_string(), timeouts.clone());
    }
}

fn id_of(state: &State) -> &str {
    state.get("id").and_then(|v| v.as_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeKind, Timeouts};
    use crate::state;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory resource keyed by `name`
    #[derive(Default)]
    struct Widgets {
        remote: Mutex<HashMap<String, String>>,
        /// Creates report success but never store the widget
        lose_creates: bool,
    }

    #[async_trait]
    impl ResourceAdapter for Widgets {
        fn type_name(&self) -> &str {
            "test_widget"
        }

        fn schema(&self) -> Schema {
            Schema::new(0)
                .attribute("id", Attribute::id())
                .attribute(
                    "name",
                    Attribute::required(AttributeKind::String).requires_replace(),
                )
                .attribute("color", Attribute::optional(AttributeKind::String))
                .attribute("serial", Attribute::computed(AttributeKind::String))
                .with_timeouts(Timeouts {
                    create: Some(Duration::from_secs(60)),
                    ..Default::default()
                })
        }

        async fn create(&self, _ctx: &OperationContext, planned: &State) -> Result<State> {
            let name = id_or(planned, "name");
            let color = id_or(planned, "color");
            if !self.lose_creates {
                self.remote.lock().unwrap().insert(name.clone(), color);
            }
            Ok(state! { "id" => (name) })
        }

        async fn read(&self, _ctx: &OperationContext, state: &State) -> Result<State> {
            let id = id_of(state).to_string();
            let remote = self.remote.lock().unwrap();
            let color = remote
                .get(&id)
                .ok_or_else(|| CloudError::ResourceNotFound(id.clone()))?;
            Ok(state! {
                "id" => (id),
                "name" => (id),
                "color" => (color),
                "serial" => "sn-1",
            })
        }

        async fn update(
            &self,
            _ctx: &OperationContext,
            prior: &State,
            planned: &State,
        ) -> Result<State> {
            let id = id_of(prior).to_string();
            let color = id_or(planned, "color");
            self.remote.lock().unwrap().insert(id, color);
            Ok(prior.clone())
        }

        async fn delete(&self, _ctx: &OperationContext, state: &State) -> Result<()> {
            let id = id_of(state).to_string();
            self.remote
                .lock()
                .unwrap()
                .remove(&id)
                .map(|_| ())
                .ok_or(CloudError::ResourceNotFound(id))
        }
    }

    fn id_or(state: &State, key: &str) -> String {
        state
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    struct Lookup;

    #[async_trait]
    impl DataSourceAdapter for Lookup {
        fn type_name(&self) -> &str {
            "test_lookup"
        }

        fn schema(&self) -> Schema {
            Schema::new(0)
                .attribute("id", Attribute::computed(AttributeKind::String))
                .attribute("value", Attribute::computed(AttributeKind::String))
        }

        async fn read(&self, _ctx: &OperationContext, _config: &State) -> Result<State> {
            Ok(state! { "id" => "us-east-1", "value" => "42" })
        }
    }

    struct TestProvider {
        name: &'static str,
        widgets: Arc<Widgets>,
    }

    impl Provider for TestProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn resources(&self) -> Vec<Arc<dyn ResourceAdapter>> {
            vec![self.widgets.clone() as Arc<dyn ResourceAdapter>]
        }

        fn data_sources(&self) -> Vec<Arc<dyn DataSourceAdapter>> {
            vec![Arc::new(Lookup)]
        }
    }

    fn server() -> (ProviderServer, Arc<Widgets>) {
        let widgets = Arc::new(Widgets::default());
        let provider = TestProvider {
            name: "test",
            widgets: widgets.clone(),
        };
        (ProviderServer::new(Arc::new(provider)).unwrap(), widgets)
    }

    #[test]
    fn test_mux_rejects_duplicate_type_names() {
        let a = TestProvider {
            name: "a",
            widgets: Arc::default(),
        };
        let b = TestProvider {
            name: "b",
            widgets: Arc::default(),
        };

        let err = ProviderServer::mux(vec![Arc::new(a), Arc::new(b)])
            .err()
            .unwrap();
        assert!(matches!(
            err,
            CloudError::DuplicateTypeName { ref type_name, .. } if type_name == "test_widget"
        ));
    }

    #[test]
    fn test_schemas_and_type_lookup() {
        let (server, _) = server();
        let schemas = server.schemas();

        assert!(schemas.resources.contains_key("test_widget"));
        assert!(schemas.data_sources.contains_key("test_lookup"));
        assert_eq!(server.provider_of("test_widget"), Some("test"));
        assert!(matches!(
            server.validate_resource_config("nope", &State::new()),
            Err(CloudError::UnknownResourceType(_))
        ));
    }

    #[tokio::test]
    async fn test_create_reads_back_computed_fields() {
        let (server, _) = server();
        let planned = state! { "name" => "w1", "color" => "red" };

        let state = server.create_resource("test_widget", &planned).await.unwrap();
        assert_eq!(state["id"], "w1");
        assert_eq!(state["serial"], "sn-1");
    }

    #[tokio::test]
    async fn test_create_followed_by_missing_read_is_an_error() {
        let widgets = Arc::new(Widgets {
            lose_creates: true,
            ..Default::default()
        });
        let provider = TestProvider {
            name: "test",
            widgets,
        };
        let server = ProviderServer::new(Arc::new(provider)).unwrap();

        let err = server
            .create_resource("test_widget", &state! { "name" => "w1" })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_invalid_timeouts_fail_before_create() {
        let (server, widgets) = server();

        for timeout in ["30x", "9999999999999999h"] {
            let planned = state! { "name" => "w1", "timeouts" => { "create": timeout } };

            let diags = server.validate_resource_config("test_widget", &planned).unwrap();
            assert!(diags.has_errors(), "{} should not validate", timeout);

            let err = server
                .create_resource("test_widget", &planned)
                .await
                .unwrap_err();
            assert!(matches!(err, CloudError::InvalidConfig(_)));
        }
        assert!(widgets.remote.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_removes_vanished_resource() {
        let (server, widgets) = server();
        let state = server
            .create_resource("test_widget", &state! { "name" => "w1" })
            .await
            .unwrap();

        widgets.remote.lock().unwrap().clear();

        let outcome = server.read_resource("test_widget", &state).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Removed);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (server, _) = server();
        let state = server
            .create_resource("test_widget", &state! { "name" => "w1" })
            .await
            .unwrap();

        server.delete_resource("test_widget", &state).await.unwrap();
        server.delete_resource("test_widget", &state).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_then_read() {
        let (server, _) = server();
        let prior = server
            .create_resource("test_widget", &state! { "name" => "w1", "color" => "red" })
            .await
            .unwrap();

        let action = server
            .plan_resource(
                "test_widget",
                "test_widget.w1",
                Some(&prior),
                Some(&state! { "name" => "w1", "color" => "blue" }),
            )
            .unwrap();
        assert_eq!(action.action_type, ActionType::Update);

        let planned = action.planned_state.unwrap();
        let state = server
            .update_resource("test_widget", &prior, &planned)
            .await
            .unwrap();
        assert_eq!(state["color"], "blue");
    }

    #[tokio::test]
    async fn test_import_missing_resource_is_an_error() {
        let (server, _) = server();
        let err = server.import_resource("test_widget", "ghost").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("cannot import"));
    }

    #[tokio::test]
    async fn test_read_data_source() {
        let (server, _) = server();
        let state = server
            .read_data_source("test_lookup", &State::new())
            .await
            .unwrap();
        assert_eq!(state["value"], "42");
    }
}
