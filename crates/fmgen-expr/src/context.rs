//! What a template can see.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};

use fmgen_core::{Document, Metadata, QueryApi, Value};

/// Read-only bindings for one evaluation.
///
/// Bindings shadow built-ins of the same name. `dv` is always bound: to
/// the query API when one is attached, to `undefined` otherwise.
#[derive(Clone)]
pub struct EvaluationContext {
    bindings: BTreeMap<String, Value>,
    query: Option<Arc<dyn QueryApi>>,
    clock: DateTime<FixedOffset>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self {
            bindings: BTreeMap::new(),
            query: None,
            clock: Local::now().fixed_offset(),
        }
    }

    /// Context with `file` bound to the document facts.
    pub fn for_document(document: &Document, tags: &[String], properties: Option<&Metadata>) -> Self {
        Self::new().with_binding("file", document.facts(tags, properties))
    }

    pub fn with_binding(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind(name, value);
        self
    }

    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn with_query(mut self, query: Arc<dyn QueryApi>) -> Self {
        self.query = Some(query);
        self
    }

    /// Fix the instant `now()`, `today()` and `Date.now()` report.
    pub fn with_clock(mut self, clock: DateTime<FixedOffset>) -> Self {
        self.clock = clock;
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn query(&self) -> Option<&Arc<dyn QueryApi>> {
        self.query.as_ref()
    }

    pub fn clock(&self) -> DateTime<FixedOffset> {
        self.clock
    }
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("bindings", &self.bindings)
            .field("query", &self.query.is_some())
            .field("clock", &self.clock)
            .finish()
    }
}
