//! Per-instance hook registry (observable extension points).
//!
//! # Responsibility
//! - Hold handlers attached to named extension points of one entity.
//! - Run value-transform handlers on every property read/write.
//! - Run lifecycle notifications around validation and persistence.
//!
//! # Invariants
//! - Handlers for one point run synchronously in registration order.
//! - No ordering is defined across different points.
//! - Lifecycle handlers observe their payload and cannot alter control flow.

use crate::model::value::Value;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};

/// Lifecycle notification points fired by the save protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifecycle {
    BeforeValidate,
    AfterValidate,
    BeforeSave,
    AfterSave,
}

impl Lifecycle {
    pub const ALL: [Lifecycle; 4] = [
        Self::BeforeValidate,
        Self::AfterValidate,
        Self::BeforeSave,
        Self::AfterSave,
    ];

    /// Stable hook name, e.g. `before_save`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeValidate => "before_validate",
            Self::AfterValidate => "after_validate",
            Self::BeforeSave => "before_save",
            Self::AfterSave => "after_save",
        }
    }
}

/// Direction of a value-transform point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Access {
    Get,
    Set,
}

/// Any extension point an entity exposes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookPoint {
    /// `get_<field>` / `set_<field>` value transform.
    Value(Access, String),
    Lifecycle(Lifecycle),
}

impl HookPoint {
    pub fn get(field: impl Into<String>) -> Self {
        Self::Value(Access::Get, field.into())
    }

    pub fn set(field: impl Into<String>) -> Self {
        Self::Value(Access::Set, field.into())
    }

    /// Parses the conventional string name (`get_title`, `after_save`, ...).
    ///
    /// Lifecycle names take precedence, so a field literally named `validate`
    /// cannot be addressed as `before_validate`.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some(point) = Lifecycle::ALL.iter().find(|point| point.as_str() == name) {
            return Some(Self::Lifecycle(*point));
        }
        if let Some(field) = name.strip_prefix("get_").filter(|f| !f.is_empty()) {
            return Some(Self::get(field));
        }
        if let Some(field) = name.strip_prefix("set_").filter(|f| !f.is_empty()) {
            return Some(Self::set(field));
        }
        None
    }
}

impl Display for HookPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(Access::Get, field) => write!(f, "get_{field}"),
            Self::Value(Access::Set, field) => write!(f, "set_{field}"),
            Self::Lifecycle(point) => f.write_str(point.as_str()),
        }
    }
}

/// Handle returned by registration; used to detach a handler later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookKey(u64);

/// Value-transform handler: receives the current value, returns the next one.
pub type ValueHook = Box<dyn Fn(Value) -> Value>;

/// Lifecycle handler receiving the payload (the entity) by reference.
pub type LifecycleHook<P> = Box<dyn Fn(&P)>;

/// Hook registry owned by one payload instance.
pub struct Hooks<P> {
    next_key: u64,
    value_hooks: BTreeMap<(Access, String), Vec<(HookKey, ValueHook)>>,
    lifecycle_hooks: BTreeMap<Lifecycle, Vec<(HookKey, LifecycleHook<P>)>>,
}

impl<P> Default for Hooks<P> {
    fn default() -> Self {
        Self {
            next_key: 0,
            value_hooks: BTreeMap::new(),
            lifecycle_hooks: BTreeMap::new(),
        }
    }
}

impl<P> Debug for Hooks<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("value_points", &self.value_hooks.len())
            .field("lifecycle_points", &self.lifecycle_hooks.len())
            .finish()
    }
}

impl<P> Hooks<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a transform to `get_<field>`.
    pub fn on_get<F>(&mut self, field: impl Into<String>, handler: F) -> HookKey
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.register_value(Access::Get, field.into(), Box::new(handler))
    }

    /// Attaches a transform to `set_<field>`.
    pub fn on_set<F>(&mut self, field: impl Into<String>, handler: F) -> HookKey
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.register_value(Access::Set, field.into(), Box::new(handler))
    }

    /// Attaches a lifecycle notification handler.
    pub fn on<F>(&mut self, point: Lifecycle, handler: F) -> HookKey
    where
        F: Fn(&P) + 'static,
    {
        let key = self.next_key();
        self.lifecycle_hooks
            .entry(point)
            .or_default()
            .push((key, Box::new(handler)));
        key
    }

    /// Detaches one handler. Returns `false` when the key is unknown.
    pub fn remove(&mut self, key: HookKey) -> bool {
        for handlers in self.value_hooks.values_mut() {
            if let Some(index) = handlers.iter().position(|(k, _)| *k == key) {
                drop(handlers.remove(index));
                return true;
            }
        }
        for handlers in self.lifecycle_hooks.values_mut() {
            if let Some(index) = handlers.iter().position(|(k, _)| *k == key) {
                drop(handlers.remove(index));
                return true;
            }
        }
        false
    }

    /// Number of handlers attached to one point.
    pub fn handler_count(&self, point: &HookPoint) -> usize {
        match point {
            HookPoint::Value(access, field) => self
                .value_hooks
                .get(&(*access, field.clone()))
                .map_or(0, Vec::len),
            HookPoint::Lifecycle(point) => self.lifecycle_hooks.get(point).map_or(0, Vec::len),
        }
    }

    /// Threads `value` through every transform registered for the point.
    ///
    /// With no handlers attached the value is returned unchanged.
    pub fn transform(&self, access: Access, field: &str, value: Value) -> Value {
        let Some(handlers) = self.value_hooks.get(&(access, field.to_string())) else {
            return value;
        };
        handlers
            .iter()
            .fold(value, |current, (_, handler)| handler(current))
    }

    /// Runs the transforms registered under a conventional name (`set_email`).
    ///
    /// Lifecycle and unrecognized names hand `value` back unchanged; lifecycle
    /// handlers receive their payload through `notify`.
    pub fn trigger(&self, name: &str, value: Value) -> Value {
        match HookPoint::parse(name) {
            Some(HookPoint::Value(access, field)) => self.transform(access, &field, value),
            Some(HookPoint::Lifecycle(_)) | None => value,
        }
    }

    /// Fires a lifecycle notification.
    pub fn notify(&self, point: Lifecycle, payload: &P) {
        if let Some(handlers) = self.lifecycle_hooks.get(&point) {
            for (_, handler) in handlers {
                handler(payload);
            }
        }
    }

    fn register_value(&mut self, access: Access, field: String, handler: ValueHook) -> HookKey {
        let key = self.next_key();
        self.value_hooks
            .entry((access, field))
            .or_default()
            .push((key, handler));
        key
    }

    fn next_key(&mut self) -> HookKey {
        self.next_key += 1;
        HookKey(self.next_key)
    }
}
