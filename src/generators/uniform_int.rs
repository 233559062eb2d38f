//! Uniform integer generator.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::{param_i64, Generator, GeneratorContext, GeneratorError};
use crate::domain::{ColumnType, GeneratorSpec, Value};

/// Uniform integer in `[min, max)`.
#[derive(Debug)]
pub struct UniformIntGenerator;

impl Generator for UniformIntGenerator {
    fn validate(&self, spec: &GeneratorSpec, _column_type: ColumnType) -> Result<(), GeneratorError> {
        if !spec.params.contains_key("min") {
            return Err(GeneratorError::MissingParam {
                generator: "uniform_int",
                param: "min",
            });
        }
        if !spec.params.contains_key("max") {
            return Err(GeneratorError::MissingParam {
                generator: "uniform_int",
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
        let min = param_i64(&spec.params, "min").ok_or(GeneratorError::MissingParam {
            generator: "uniform_int",
            param: "min",
        })?;
        let max = param_i64(&spec.params, "max").ok_or(GeneratorError::MissingParam {
            generator: "uniform_int",
            param: "max",
        })?;

        if max <= min {
            return Err(GeneratorError::InvalidParam {
                param: "max".into(),
                reason: format!("max ({max}) must be greater than min ({min})"),
            });
        }

        Ok(Value::Int(rng.random_range(min..max)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn ctx() -> GeneratorContext<'static> {
        static EMPTY: std::sync::OnceLock<std::collections::HashMap<String, Vec<Value>>> =
            std::sync::OnceLock::new();
        GeneratorContext {
            row_index: 0,
            entity_values: EMPTY.get_or_init(std::collections::HashMap::new),
        }
    }

    #[test]
    fn stays_in_half_open_range() {
        let spec = GeneratorSpec::new("uniform_int")
            .with_param("min", 5)
            .with_param("max", 8);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            match UniformIntGenerator.generate(&mut rng, &spec, &ctx()).unwrap() {
                Value::Int(v) => assert!((5..8).contains(&v)),
                other => panic!("expected int, got {other:?}"),
            }
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let spec = GeneratorSpec::new("uniform_int")
            .with_param("min", 0)
            .with_param("max", 1_000_000);
        let draw = |seed: u64| -> Vec<Value> {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..16)
                .map(|_| UniformIntGenerator.generate(&mut rng, &spec, &ctx()).unwrap())
                .collect()
        };
        assert_eq!(draw(42), draw(42));
        assert_ne!(draw(42), draw(43));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let spec = GeneratorSpec::new("uniform_int")
            .with_param("min", 9)
            .with_param("max", 9);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(UniformIntGenerator.generate(&mut rng, &spec, &ctx()).is_err());
    }
}
