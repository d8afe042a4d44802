//! Planned actions for managed resources
//!
//! Planning is per resource instance: the prior state and the desired
//! config of one block are compared attribute by attribute. Whether a
//! change is applied in place or forces replacement is read from the
//! schema's plan modifiers, never inferred.

use crate::schema::{Attribute, AttributeKind, Block, PlanModifier, Schema, TIMEOUTS_BLOCK};
use crate::value::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Represents a planned action for a single resource or data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Block address (`type.name`, or `data.type.name` for data sources)
    pub address: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource type name (e.g., "aws_eks_cluster")
    pub resource_type: String,

    /// State recorded before this plan, if any
    pub prior_state: Option<State>,

    /// State the apply is expected to produce; computed values may be unset
    pub planned_state: Option<State>,

    /// Attribute paths whose change differs from the prior state
    pub changed: Vec<String>,

    /// Changed attribute paths that force replacement
    pub requires_replace: Vec<String>,
}

impl Action {
    pub fn description(&self) -> String {
        match self.action_type {
            ActionType::Create => format!("{} will be created", self.address),
            ActionType::Update => format!(
                "{} will be updated in-place ({})",
                self.address,
                self.changed.join(", ")
            ),
            ActionType::Replace => format!(
                "{} must be replaced ({} forces replacement)",
                self.address,
                self.requires_replace.join(", ")
            ),
            ActionType::Delete => format!("{} will be destroyed", self.address),
            ActionType::Read => format!("{} will be read", self.address),
            ActionType::NoOp => format!("{} is up to date", self.address),
        }
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource in place
    Update,
    /// Destroy and re-create because an immutable attribute changed
    Replace,
    /// Delete a resource
    Delete,
    /// Read a data source
    Read,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::Read => write!(f, "read"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Plans one resource instance
///
/// `config` is `None` when the block was removed from the manifest.
pub fn plan_resource(
    schema: &Schema,
    address: &str,
    resource_type: &str,
    prior: Option<&State>,
    config: Option<&State>,
) -> Action {
    let mut action = Action {
        address: address.to_string(),
        action_type: ActionType::NoOp,
        resource_type: resource_type.to_string(),
        prior_state: prior.cloned(),
        planned_state: None,
        changed: Vec::new(),
        requires_replace: Vec::new(),
    };

    match (prior, config) {
        (None, None) => {}
        (Some(_), None) => action.action_type = ActionType::Delete,
        (None, Some(config)) => {
            action.planned_state = Some(propose_block(&schema.block, None, config));
            action.action_type = ActionType::Create;
        }
        (Some(prior), Some(config)) => {
            let planned = propose_block(&schema.block, Some(prior), config);
            let mut changes = Vec::new();
            diff_block(&schema.block, Some(prior), Some(&planned), "", &mut changes);

            action.changed = changes.iter().map(|(path, _)| path.clone()).collect();
            action.requires_replace = changes
                .iter()
                .filter(|(_, replace)| *replace)
                .map(|(path, _)| path.clone())
                .collect();
            action.action_type = if !action.requires_replace.is_empty() {
                ActionType::Replace
            } else if !action.changed.is_empty() {
                ActionType::Update
            } else {
                ActionType::NoOp
            };

            if action.action_type == ActionType::Replace {
                // A replacement starts from scratch: nothing carries over
                action.planned_state = Some(propose_block(&schema.block, None, config));
            } else {
                action.planned_state = Some(planned);
            }
        }
    }

    action
}

/// Builds the planned record: config values, then defaults, then carried-over computed values
pub fn propose_block(block: &Block, prior: Option<&State>, config: &State) -> State {
    let mut planned = State::new();

    for (name, attribute) in &block.attributes {
        let configured = config.get(name).filter(|v| !v.is_null());
        let prior_value = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());

        let value = match configured {
            Some(v) => Some(v.clone()),
            None => attribute
                .default
                .clone()
                .or_else(|| carry_over(attribute, prior_value)),
        };

        planned.insert(name.clone(), value.unwrap_or(Value::Null));
    }

    for (name, nested) in &block.blocks {
        let nested_config = config.get(name).and_then(Value::as_object);
        let nested_prior = prior.and_then(|p| p.get(name)).and_then(Value::as_object);

        let value = match (nested_config, nested_prior) {
            (Some(c), p) => Some(propose_block(nested, p, c)),
            (None, Some(p)) if nested.is_computed_only() => Some(p.clone()),
            (None, Some(p)) => Some(propose_block(nested, Some(p), &State::new())),
            (None, None) => None,
        };

        planned.insert(name.clone(), value.map_or(Value::Null, Value::Object));
    }

    planned
}

fn carry_over(attribute: &Attribute, prior: Option<&Value>) -> Option<Value> {
    if !attribute.computed {
        return None;
    }
    // Optional+computed values left unset keep whatever the remote reported.
    if attribute.optional || attribute.has_modifier(PlanModifier::UseStateForUnknown) {
        return prior.cloned();
    }
    None
}

fn diff_block(
    block: &Block,
    prior: Option<&State>,
    planned: Option<&State>,
    prefix: &str,
    changes: &mut Vec<(String, bool)>,
) {
    let path = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        }
    };

    for (name, attribute) in &block.attributes {
        if !attribute.is_configurable() {
            continue;
        }
        let before = prior.and_then(|p| p.get(name)).unwrap_or(&Value::Null);
        let after = planned.and_then(|p| p.get(name)).unwrap_or(&Value::Null);

        if !values_equal(attribute.kind, before, after) {
            changes.push((
                path(name),
                attribute.has_modifier(PlanModifier::RequiresReplace),
            ));
        }
    }

    for (name, nested) in &block.blocks {
        if name == TIMEOUTS_BLOCK || nested.is_computed_only() {
            continue;
        }
        let before = prior.and_then(|p| p.get(name)).and_then(Value::as_object);
        let after = planned.and_then(|p| p.get(name)).and_then(Value::as_object);
        diff_block(nested, before, after, &path(name), changes);
    }
}

/// Sets compare without order; an empty collection equals null
fn values_equal(kind: AttributeKind, a: &Value, b: &Value) -> bool {
    let empty = |v: &Value| match v {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty(a) && empty(b) {
        return true;
    }

    match (kind, a, b) {
        (AttributeKind::SetOfString, Value::Array(x), Value::Array(y)) => {
            let mut x: Vec<_> = x.iter().filter_map(Value::as_str).collect();
            let mut y: Vec<_> = y.iter().filter_map(Value::as_str).collect();
            x.sort_unstable();
            x.dedup();
            y.sort_unstable();
            y.dedup();
            x == y
        }
        _ => a == b,
    }
}

/// Result of applying actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Successfully applied actions
    pub succeeded: Vec<ActionResult>,

    /// Failed actions
    pub failed: Vec<ActionResult>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, address: String, message: String) {
        self.succeeded.push(ActionResult {
            address,
            success: true,
            message,
            error: None,
        });
    }

    pub fn add_failure(&mut self, address: String, error: String) {
        self.failed.push(ActionResult {
            address,
            success: false,
            message: String::new(),
            error: Some(error),
        });
    }
}

impl Default for ApplyResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// Address of the block the action applied to
    pub address: String,

    /// Whether the action succeeded
    pub success: bool,

    /// Success message
    pub message: String,

    /// Error message if failed
    pub error: Option<String>,
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions
            .iter()
            .any(|a| !matches!(a.action_type, ActionType::NoOp | ActionType::Read));
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            has_changes: false,
        }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            replace: self.actions_by_type(ActionType::Replace).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}
