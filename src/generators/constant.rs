//! Constant value generator.

use rand_chacha::ChaCha8Rng;

use super::{Generator, GeneratorContext, GeneratorError};
use crate::domain::{ColumnType, GeneratorSpec, Value};

/// Emits the configured `value` param for every row.
#[derive(Debug)]
pub struct ConstGenerator;

impl Generator for ConstGenerator {
    fn validate(&self, spec: &GeneratorSpec, _column_type: ColumnType) -> Result<(), GeneratorError> {
        if !spec.params.contains_key("value") {
            return Err(GeneratorError::MissingParam {
                generator: "const",
                param: "value",
            });
        }
        Ok(())
    }

    fn generate(
        &self,
        _rng: &mut ChaCha8Rng,
        spec: &GeneratorSpec,
        _ctx: &GeneratorContext<'_>,
    ) -> Result<Value, GeneratorError> {
        let value = spec.params.get("value").ok_or(GeneratorError::MissingParam {
            generator: "const",
            param: "value",
        })?;
        Ok(Value::from_json(value))
    }
}
