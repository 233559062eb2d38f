//! Value generators and their registry.
//!
//! A generator is a named strategy producing one cell value per invocation
//! from a seeded RNG stream and a per-row context. Dispatch is by registry
//! name to a trait object; generator parameters stay opaque JSON and each
//! generator checks its own at schema time via [`Generator::validate`].

mod choice;
mod constant;
mod faker;
mod fk;
mod normal;
mod time_series;
mod uniform_float;
mod uniform_int;
mod uuid4;

pub use choice::ChoiceGenerator;
pub use constant::ConstGenerator;
pub use faker::{FakerCityGenerator, FakerDeviceNameGenerator, FakerNameGenerator};
pub use fk::FkGenerator;
pub use normal::NormalGenerator;
pub use time_series::TimeSeriesGenerator;
pub use uniform_float::UniformFloatGenerator;
pub use uniform_int::UniformIntGenerator;
pub use uuid4::Uuid4Generator;

use std::collections::HashMap;
use std::sync::Arc;

use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::domain::{ColumnType, GeneratorSpec, Value};

/// Errors raised by generator validation or value production.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator not found: {0}")]
    NotRegistered(String),

    #[error("{generator} requires '{param}' param")]
    MissingParam {
        generator: &'static str,
        param: &'static str,
    },

    #[error("invalid '{param}' param: {reason}")]
    InvalidParam { param: String, reason: String },

    #[error("no values found for FK reference: {0}")]
    MissingReference(String),

    #[error("empty values for FK reference: {0}")]
    EmptyReference(String),
}

/// Per-row generation context.
///
/// `entity_values` is the run-local map of already produced values keyed by
/// `"<entity>.<column>"`; FK generators read it, nothing else writes through
/// this view.
pub struct GeneratorContext<'a> {
    pub row_index: i64,
    pub entity_values: &'a HashMap<String, Vec<Value>>,
}

/// A single value-production strategy.
pub trait Generator: Send + Sync + std::fmt::Debug {
    /// Schema-time check of the spec's params against the declared column
    /// type.
    fn validate(&self, spec: &GeneratorSpec, column_type: ColumnType) -> Result<(), GeneratorError>;

    /// Produce one value. Consumes at most O(1) draws from `rng`.
    fn generate(
        &self,
        rng: &mut ChaCha8Rng,
        spec: &GeneratorSpec,
        ctx: &GeneratorContext<'_>,
    ) -> Result<Value, GeneratorError>;
}

/// Name-to-generator mapping. Read-only after construction and therefore
/// safe to share across concurrent runs.
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn Generator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, gen: Arc<dyn Generator>) {
        self.generators.insert(name.into(), gen);
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn Generator>, GeneratorError> {
        self.generators
            .get(name)
            .ok_or_else(|| GeneratorError::NotRegistered(name.to_string()))
    }

    /// Registered generator names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.generators.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with the built-in generator set.
pub fn default_registry() -> GeneratorRegistry {
    let mut r = GeneratorRegistry::new();
    r.register("const", Arc::new(ConstGenerator));
    r.register("uuid4", Arc::new(Uuid4Generator));
    r.register("uniform_int", Arc::new(UniformIntGenerator));
    r.register("uniform_float", Arc::new(UniformFloatGenerator));
    r.register("normal", Arc::new(NormalGenerator));
    r.register("choice", Arc::new(ChoiceGenerator));
    r.register("time_series", Arc::new(TimeSeriesGenerator));
    r.register("fk", Arc::new(FkGenerator));
    r.register("faker_name", Arc::new(FakerNameGenerator));
    r.register("faker_city", Arc::new(FakerCityGenerator));
    r.register("faker_device_name", Arc::new(FakerDeviceNameGenerator));
    r
}

type Params = serde_json::Map<String, serde_json::Value>;

/// Numeric param coercion: integers pass through, floats truncate.
pub(crate) fn param_i64(params: &Params, key: &str) -> Option<i64> {
    match params.get(key)? {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

pub(crate) fn param_f64(params: &Params, key: &str) -> Option<f64> {
    match params.get(key)? {
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

pub(crate) fn param_str<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}
