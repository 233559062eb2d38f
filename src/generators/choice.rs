//! Categorical choice generator.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::{Generator, GeneratorContext, GeneratorError};
use crate::domain::{ColumnType, GeneratorSpec, Value};

/// Uniform or weighted pick from a fixed `values` list.
#[derive(Debug)]
pub struct ChoiceGenerator;

fn values_param(spec: &GeneratorSpec) -> Result<&Vec<serde_json::Value>, GeneratorError> {
    let values = spec
        .params
        .get("values")
        .ok_or(GeneratorError::MissingParam {
            generator: "choice",
            param: "values",
        })?
        .as_array()
        .ok_or_else(|| GeneratorError::InvalidParam {
            param: "values".into(),
            reason: "must be a list".into(),
        })?;
    if values.is_empty() {
        return Err(GeneratorError::InvalidParam {
            param: "values".into(),
            reason: "cannot be empty".into(),
        });
    }
    Ok(values)
}

fn weights_param(
    spec: &GeneratorSpec,
    values_len: usize,
) -> Result<Option<Vec<f64>>, GeneratorError> {
    let Some(raw) = spec.params.get("weights") else {
        return Ok(None);
    };
    let list = raw.as_array().ok_or_else(|| GeneratorError::InvalidParam {
        param: "weights".into(),
        reason: "must be a list".into(),
    })?;
    if list.len() != values_len {
        return Err(GeneratorError::InvalidParam {
            param: "weights".into(),
            reason: "'weights' and 'values' must have the same length".into(),
        });
    }
    let mut weights = Vec::with_capacity(list.len());
    for w in list {
        let w = w.as_f64().unwrap_or(0.0);
        if w < 0.0 {
            return Err(GeneratorError::InvalidParam {
                param: "weights".into(),
                reason: format!("negative weight: {w}"),
            });
        }
        weights.push(w);
    }
    Ok(Some(weights))
}

impl Generator for ChoiceGenerator {
    fn validate(&self, spec: &GeneratorSpec, _column_type: ColumnType) -> Result<(), GeneratorError> {
        let values = values_param(spec)?;
        weights_param(spec, values.len())?;
        Ok(())
    }

    fn generate(
        &self,
        rng: &mut ChaCha8Rng,
        spec: &GeneratorSpec,
        _ctx: &GeneratorContext<'_>,
    ) -> Result<Value, GeneratorError> {
        let values = values_param(spec)?;

        let Some(weights) = weights_param(spec, values.len())? else {
            let idx = rng.random_range(0..values.len());
            return Ok(Value::from_json(&values[idx]));
        };

        let total: f64 = weights.iter().sum();
        if total == 0.0 {
            return Err(GeneratorError::InvalidParam {
                param: "weights".into(),
                reason: "total weight is zero".into(),
            });
        }

        let r = rng.random::<f64>() * total;
        let mut cumulative = 0.0;
        for (value, weight) in values.iter().zip(&weights) {
            cumulative += weight;
            if r < cumulative {
                return Ok(Value::from_json(value));
            }
        }
        Ok(Value::from_json(&values[values.len() - 1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use serde_json::json;

    fn generate(spec: &GeneratorSpec, seed: u64) -> Value {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let values = std::collections::HashMap::new();
        let ctx = GeneratorContext {
            row_index: 0,
            entity_values: &values,
        };
        ChoiceGenerator.generate(&mut rng, spec, &ctx).unwrap()
    }

    #[test]
    fn picks_from_the_list() {
        let spec = GeneratorSpec::new("choice").with_param("values", json!(["a", "b", "c"]));
        for seed in 0..20 {
            match generate(&spec, seed) {
                Value::Text(s) => assert!(["a", "b", "c"].contains(&s.as_str())),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn zero_weight_excludes_a_value() {
        let spec = GeneratorSpec::new("choice")
            .with_param("values", json!(["hot", "cold"]))
            .with_param("weights", json!([1.0, 0.0]));
        for seed in 0..50 {
            assert_eq!(generate(&spec, seed), Value::Text("hot".into()));
        }
    }

    #[test]
    fn rejects_mismatched_weights() {
        let spec = GeneratorSpec::new("choice")
            .with_param("values", json!(["a", "b"]))
            .with_param("weights", json!([1.0]));
        assert!(ChoiceGenerator.validate(&spec, ColumnType::String).is_err());
    }

    #[test]
    fn rejects_all_zero_weights() {
        let spec = GeneratorSpec::new("choice")
            .with_param("values", json!(["a", "b"]))
            .with_param("weights", json!([0.0, 0.0]));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let values = std::collections::HashMap::new();
        let ctx = GeneratorContext {
            row_index: 0,
            entity_values: &values,
        };
        assert!(ChoiceGenerator.generate(&mut rng, &spec, &ctx).is_err());
    }

    #[test]
    fn rejects_empty_values() {
        let spec = GeneratorSpec::new("choice").with_param("values", json!([]));
        assert!(ChoiceGenerator.validate(&spec, ColumnType::String).is_err());
    }
}
