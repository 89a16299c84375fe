//! Operations synthesized from mapping entries on first use.
//!
//! # Design
//! The shared `MappingTable` is never mutated. `OperationRegistry::resolve`
//! builds an `Operation` the first time a name is requested and caches it;
//! the cache lock is held across lookup and insert so each name is built at
//! most once. `Operation::bind` works on a fresh copy of the template, so two
//! calls, concurrent or not, never see each other's bound values.
//!
//! Binding is path-first: an argument whose `[name]` placeholder changes the
//! path is consumed there and never considered as a body attribute, even
//! when the template has an attribute of the same name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Map, Value};

use crate::args::CallArgs;
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::mapping::{EndpointMapping, MappingTable};

/// One mapping entry after argument binding, owned by a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOperation {
    pub name: String,
    pub method: HttpMethod,
    /// Path with placeholders substituted, still relative to the base path.
    pub path: String,
    /// Bound body attributes; `None` when the endpoint takes no body.
    pub attributes: Option<Map<String, Value>>,
}

impl ResolvedOperation {
    /// JSON body `{"data":{"attributes":{...}}}`, if the endpoint has one.
    pub fn body(&self) -> Result<Option<String>, ApiError> {
        let Some(attributes) = &self.attributes else {
            return Ok(None);
        };
        let payload = json!({ "data": { "attributes": attributes } });
        serde_json::to_string(&payload)
            .map(Some)
            .map_err(ApiError::Serialization)
    }
}

/// A callable endpoint. Cheap to share; binding never touches `self`.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    name: String,
    template: EndpointMapping,
}

impl Operation {
    pub fn new(name: impl Into<String>, template: EndpointMapping) -> Self {
        Self {
            name: name.into(),
            template,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &EndpointMapping {
        &self.template
    }

    /// Bind `args` to path placeholders and body attributes.
    pub fn bind(&self, args: &CallArgs) -> Result<ResolvedOperation, ApiError> {
        let mut path = self.template.path.clone();
        let mut attributes = self.template.body_template().cloned();

        for (name, value) in args.iter() {
            let bound = path.replace(&format!("[{name}]"), &path_segment(value));
            if bound != path {
                path = bound;
                continue;
            }

            match attributes.as_mut().and_then(|attrs| attrs.get_mut(name)) {
                Some(slot) => *slot = value.clone(),
                None => {
                    return Err(ApiError::UnboundArgument {
                        operation: self.name.clone(),
                        argument: name.to_string(),
                    })
                }
            }
        }

        Ok(ResolvedOperation {
            name: self.name.clone(),
            method: self.template.method,
            path,
            attributes,
        })
    }
}

/// Strings go into paths verbatim, everything else as its JSON text.
fn path_segment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Name-to-operation lookup over an immutable mapping table.
#[derive(Debug)]
pub struct OperationRegistry {
    table: Arc<MappingTable>,
    cache: Mutex<HashMap<String, Arc<Operation>>>,
}

impl OperationRegistry {
    pub fn new(table: Arc<MappingTable>) -> Self {
        Self {
            table,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The operation for `name`, built on first request and reused afterwards.
    pub fn resolve(&self, name: &str) -> Result<Arc<Operation>, ApiError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(operation) = cache.get(name) {
            return Ok(Arc::clone(operation));
        }

        let template = self.table.get(name).ok_or_else(|| ApiError::UnknownOperation {
            name: name.to_string(),
        })?;
        tracing::debug!(operation = name, path = %template.path, "synthesized operation");
        let operation = Arc::new(Operation::new(name, template.clone()));
        cache.insert(name.to_string(), Arc::clone(&operation));
        Ok(operation)
    }

    /// Whether `name` is a known operation, without synthesizing it.
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains(name)
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    /// Number of operations synthesized so far.
    pub fn cached(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
