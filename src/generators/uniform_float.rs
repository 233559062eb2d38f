//! Uniform float generator.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::{param_f64, Generator, GeneratorContext, GeneratorError};
use crate::domain::{ColumnType, GeneratorSpec, Value};

/// Uniform float in `[min, max)`.
#[derive(Debug)]
pub struct UniformFloatGenerator;

impl Generator for UniformFloatGenerator {
    fn validate(&self, spec: &GeneratorSpec, _column_type: ColumnType) -> Result<(), GeneratorError> {
        if !spec.params.contains_key("min") {
            return Err(GeneratorError::MissingParam {
                generator: "uniform_float",
                param: "min",
            });
        }
        if !spec.params.contains_key("max") {
            return Err(GeneratorError::MissingParam {
                generator: "uniform_float",
                param: "max",
            });
        }
        Ok(())
    }

    fn generate(
        &self,
        rng: &mut ChaCha8Rng,
        spec: &GeneratorSpec,
        _ctx: &GeneratorContext<'_>,
    ) -> Result<Value, GeneratorError> {
        let min = param_f64(&spec.params, "min").ok_or(GeneratorError::MissingParam {
            generator: "uniform_float",
            param: "min",
        })?;
        let max = param_f64(&spec.params, "max").ok_or(GeneratorError::MissingParam {
            generator: "uniform_float",
            param: "max",
        })?;

        Ok(Value::Float(min + rng.random::<f64>() * (max - min)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn stays_in_range() {
        let spec = GeneratorSpec::new("uniform_float")
            .with_param("min", 1.0)
            .with_param("max", 2.0);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let values = std::collections::HashMap::new();
        let ctx = GeneratorContext {
            row_index: 0,
            entity_values: &values,
        };
        for _ in 0..100 {
            match UniformFloatGenerator.generate(&mut rng, &spec, &ctx).unwrap() {
                Value::Float(v) => assert!((1.0..2.0).contains(&v)),
                other => panic!("expected float, got {other:?}"),
            }
        }
    }
}
