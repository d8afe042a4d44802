//! Schema model for resources and data sources
//!
//! A schema is a tree of typed attributes and single nested blocks. Each
//! attribute declares whether config must, may or cannot set it, its
//! validators, and the plan modifiers that decide how a change is applied.

use crate::validation::Validator;
use crate::value::{State, StateExt};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Name of the block carrying per-operation timeout overrides
pub const TIMEOUTS_BLOCK: &str = "timeouts";

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub block: Block,
    #[serde(skip_serializing_if = "Timeouts::is_empty")]
    pub timeouts: Timeouts,
}

impl Schema {
    pub fn new(version: i64) -> Self {
        Self {
            version,
            description: None,
            block: Block::new(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn attribute(mut self, name: &str, attribute: Attribute) -> Self {
        self.block.attributes.insert(name.to_string(), attribute);
        self
    }

    pub fn block(mut self, name: &str, block: Block) -> Self {
        self.block.blocks.insert(name.to_string(), block);
        self
    }

    /// Declares default timeouts and adds the `timeouts` block that overrides them
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        let mut block = Block::new();
        for (name, value) in [
            ("create", timeouts.create),
            ("read", timeouts.read),
            ("update", timeouts.update),
            ("delete", timeouts.delete),
        ] {
            if value.is_some() {
                block = block.attribute(
                    name,
                    Attribute::optional(AttributeKind::String).validator(Validator::Duration),
                );
            }
        }
        self.block.blocks.insert(TIMEOUTS_BLOCK.to_string(), block);
        self.timeouts = timeouts;
        self
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.get(name)
    }

    pub fn get_block(&self, name: &str) -> Option<&Block> {
        self.block.blocks.get(name)
    }
}

/// A single nested block
#[derive(Debug, Clone, Default, Serialize)]
pub struct Block {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, Block>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<BlockValidator>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    pub fn block(mut self, name: &str, block: Block) -> Self {
        self.blocks.insert(name.to_string(), block);
        self
    }

    /// The block may not be configured together with sibling block `other`
    pub fn conflicts_with(mut self, other: &str) -> Self {
        self.validators
            .push(BlockValidator::ConflictsWith(other.to_string()));
        self
    }

    /// Every attribute in this block (and its nested blocks) is computed-only
    pub fn is_computed_only(&self) -> bool {
        self.attributes.values().all(|a| a.is_computed_only())
            && self.blocks.values().all(Block::is_computed_only)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum BlockValidator {
    ConflictsWith(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    String,
    Bool,
    Int,
    ListOfString,
    SetOfString,
    MapOfString,
}

impl AttributeKind {
    /// `value` has this kind's JSON shape; null always matches
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (AttributeKind::String, Value::String(_)) => true,
            (AttributeKind::Bool, Value::Bool(_)) => true,
            (AttributeKind::Int, Value::Number(n)) => n.is_i64(),
            (AttributeKind::ListOfString | AttributeKind::SetOfString, Value::Array(items)) => {
                items.iter().all(Value::is_string)
            }
            (AttributeKind::MapOfString, Value::Object(map)) => map.values().all(Value::is_string),
            _ => false,
        }
    }
}

impl std::fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeKind::String => write!(f, "string"),
            AttributeKind::Bool => write!(f, "bool"),
            AttributeKind::Int => write!(f, "number"),
            AttributeKind::ListOfString => write!(f, "list of string"),
            AttributeKind::SetOfString => write!(f, "set of string"),
            AttributeKind::MapOfString => write!(f, "map of string"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanModifier {
    /// The attribute is immutable: a change forces replacement
    RequiresReplace,
    /// An unset computed value keeps the prior state's value
    UseStateForUnknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    pub kind: AttributeKind,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip)]
    pub validators: Vec<Validator>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plan_modifiers: Vec<PlanModifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Attribute {
    fn new(kind: AttributeKind, required: bool, optional: bool, computed: bool) -> Self {
        Self {
            kind,
            required,
            optional,
            computed,
            sensitive: false,
            default: None,
            validators: Vec::new(),
            plan_modifiers: Vec::new(),
            description: None,
        }
    }

    pub fn required(kind: AttributeKind) -> Self {
        Self::new(kind, true, false, false)
    }

    pub fn optional(kind: AttributeKind) -> Self {
        Self::new(kind, false, true, false)
    }

    pub fn computed(kind: AttributeKind) -> Self {
        Self::new(kind, false, false, true)
    }

    pub fn optional_computed(kind: AttributeKind) -> Self {
        Self::new(kind, false, true, true)
    }

    /// Computed `id` attribute carried over between plans
    pub fn id() -> Self {
        Self::computed(AttributeKind::String).use_state_for_unknown()
    }

    pub fn requires_replace(mut self) -> Self {
        self.plan_modifiers.push(PlanModifier::RequiresReplace);
        self
    }

    pub fn use_state_for_unknown(mut self) -> Self {
        self.plan_modifiers.push(PlanModifier::UseStateForUnknown);
        self
    }

    /// Static default used when config leaves the attribute unset
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    pub fn is_configurable(&self) -> bool {
        self.required || self.optional
    }

    pub fn has_modifier(&self, modifier: PlanModifier) -> bool {
        self.plan_modifiers.contains(&modifier)
    }
}

/// Per-operation timeouts; `None` means unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Timeouts {
    #[serde(serialize_with = "serialize_duration", skip_serializing_if = "Option::is_none")]
    pub create: Option<Duration>,
    #[serde(serialize_with = "serialize_duration", skip_serializing_if = "Option::is_none")]
    pub read: Option<Duration>,
    #[serde(serialize_with = "serialize_duration", skip_serializing_if = "Option::is_none")]
    pub update: Option<Duration>,
    #[serde(serialize_with = "serialize_duration", skip_serializing_if = "Option::is_none")]
    pub delete: Option<Duration>,
}

impl Timeouts {
    pub fn is_empty(&self) -> bool {
        self.create.is_none() && self.read.is_none() && self.update.is_none() && self.delete.is_none()
    }

    /// Applies the overrides found in the record's `timeouts` block
    pub fn resolve(&self, state: &State) -> crate::Result<Timeouts> {
        let Some(block) = state.get_block(TIMEOUTS_BLOCK) else {
            return Ok(*self);
        };

        let pick = |name: &str, default: Option<Duration>| -> crate::Result<Option<Duration>> {
            match block.get_str(name) {
                Some(text) => parse_duration(text).map(Some),
                None => Ok(default),
            }
        };

        Ok(Timeouts {
            create: pick("create", self.create)?,
            read: pick("read", self.read)?,
            update: pick("update", self.update)?,
            delete: pick("delete", self.delete)?,
        })
    }
}

/// Parses durations such as `30m`, `1h30m`, `90s` or `2h`
pub fn parse_duration(text: &str) -> crate::Result<Duration> {
    let invalid = || crate::CloudError::InvalidConfig(format!("invalid duration: {:?}", text));

    let text = text.trim();
    if text.is_empty() {
        return Err(invalid());
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let amount: u64 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        let unit: u64 = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        total = amount
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| {
                crate::CloudError::InvalidConfig(format!("duration {:?} is too large", text))
            })?;
    }
    if !digits.is_empty() {
        return Err(invalid());
    }

    Ok(Duration::from_secs(total))
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{}h", h));
    }
    if m > 0 {
        out.push_str(&format!("{}m", m));
    }
    if s > 0 || out.is_empty() {
        out.push_str(&format!("{}s", s));
    }
    out
}

fn serialize_duration<S: Serializer>(
    value: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_str(&format_duration(*d)),
        None => serializer.serialize_none(),
    }
}
