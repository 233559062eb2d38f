//! Foreign-key sampling generator.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::{param_str, Generator, GeneratorContext, GeneratorError};
use crate::domain::{ColumnType, GeneratorSpec, Value};

/// Uniformly samples an already-produced value from the referenced
/// entity's column stream. Execution order guarantees the stream exists by
/// the time a dependent entity generates.
#[derive(Debug)]
pub struct FkGenerator;

impl Generator for FkGenerator {
    fn validate(&self, spec: &GeneratorSpec, _column_type: ColumnType) -> Result<(), GeneratorError> {
        if !spec.params.contains_key("entity") {
            return Err(GeneratorError::MissingParam {
                generator: "fk",
                param: "entity",
            });
        }
        if !spec.params.contains_key("column") {
            return Err(GeneratorError::MissingParam {
                generator: "fk",
                param: "column",
            });
        }
        Ok(())
    }

    fn generate(
        &self,
        rng: &mut ChaCha8Rng,
        spec: &GeneratorSpec,
        ctx: &GeneratorContext<'_>,
    ) -> Result<Value, GeneratorError> {
        let entity = param_str(&spec.params, "entity").ok_or_else(|| {
            GeneratorError::InvalidParam {
                param: "entity".into(),
                reason: "must be a string".into(),
            }
        })?;
        let column = param_str(&spec.params, "column").ok_or_else(|| {
            GeneratorError::InvalidParam {
                param: "column".into(),
                reason: "must be a string".into(),
            }
        })?;

        let key = format!("{entity}.{column}");
        let values = ctx
            .entity_values
            .get(&key)
            .ok_or_else(|| GeneratorError::MissingReference(key.clone()))?;
        if values.is_empty() {
            return Err(GeneratorError::EmptyReference(key));
        }

        let idx = rng.random_range(0..values.len());
        Ok(values[idx].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn spec() -> GeneratorSpec {
        GeneratorSpec::new("fk")
            .with_param("entity", "users")
            .with_param("column", "id")
    }

    #[test]
    fn samples_from_the_referenced_stream() {
        let mut values = HashMap::new();
        values.insert(
            "users.id".to_string(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)],
        );
        let ctx = GeneratorContext {
            row_index: 0,
            entity_values: &values,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..50 {
            match FkGenerator.generate(&mut rng, &spec(), &ctx).unwrap() {
                Value::Int(v) => assert!((1..=3).contains(&v)),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn fails_on_absent_or_empty_stream() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        let values = HashMap::new();
        let ctx = GeneratorContext {
            row_index: 0,
            entity_values: &values,
        };
        assert!(matches!(
            FkGenerator.generate(&mut rng, &spec(), &ctx),
            Err(GeneratorError::MissingReference(_))
        ));

        let mut values = HashMap::new();
        values.insert("users.id".to_string(), vec![]);
        let ctx = GeneratorContext {
            row_index: 0,
            entity_values: &values,
        };
        assert!(matches!(
            FkGenerator.generate(&mut rng, &spec(), &ctx),
            Err(GeneratorError::EmptyReference(_))
        ));
    }
}
