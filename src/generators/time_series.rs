//! Time-series timestamp generator.

use chrono::{Duration, Utc};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::{param_i64, param_str, Generator, GeneratorContext, GeneratorError};
use crate::domain::{ColumnType, GeneratorSpec, Value};
use crate::timeutil;

/// Produces `start + row_index * step`, optionally jittered.
///
/// `start` is RFC3339 or relative (`-7d`, `+1h`) resolved against the wall
/// clock at generation time; `step` uses the same duration grammar. An
/// optional `jitter_seconds` adds a uniform signed offset in
/// `[-jitter, +jitter)`.
#[derive(Debug)]
pub struct TimeSeriesGenerator;

impl Generator for TimeSeriesGenerator {
    fn validate(&self, spec: &GeneratorSpec, _column_type: ColumnType) -> Result<(), GeneratorError> {
        if !spec.params.contains_key("start") {
            return Err(GeneratorError::MissingParam {
                generator: "time_series",
                param: "start",
            });
        }
        if !spec.params.contains_key("step") {
            return Err(GeneratorError::MissingParam {
                generator: "time_series",
                param: "step",
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
        let start_raw = param_str(&spec.params, "start").ok_or_else(|| {
            GeneratorError::InvalidParam {
                param: "start".into(),
                reason: "must be a string".into(),
            }
        })?;
        let step_raw = param_str(&spec.params, "step").ok_or_else(|| {
            GeneratorError::InvalidParam {
                param: "step".into(),
                reason: "must be a string".into(),
            }
        })?;

        let start = timeutil::parse_relative_time(start_raw, Utc::now()).map_err(|e| {
            GeneratorError::InvalidParam {
                param: "start".into(),
                reason: e.to_string(),
            }
        })?;
        let step = timeutil::parse_duration(step_raw).map_err(|e| GeneratorError::InvalidParam {
            param: "step".into(),
            reason: e.to_string(),
        })?;

        let offset_ms = step.num_milliseconds().saturating_mul(ctx.row_index);
        let mut timestamp = start + Duration::milliseconds(offset_ms);

        if let Some(jitter) = param_i64(&spec.params, "jitter_seconds") {
            if jitter > 0 {
                let offset = rng.random_range(-jitter..jitter);
                timestamp = timestamp + Duration::seconds(offset);
            }
        }

        Ok(Value::Timestamp(timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn generate(spec: &GeneratorSpec, row_index: i64) -> Value {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let values = std::collections::HashMap::new();
        let ctx = GeneratorContext {
            row_index,
            entity_values: &values,
        };
        TimeSeriesGenerator.generate(&mut rng, spec, &ctx).unwrap()
    }

    #[test]
    fn steps_advance_with_row_index() {
        let spec = GeneratorSpec::new("time_series")
            .with_param("start", "2024-01-01T00:00:00Z")
            .with_param("step", "1h");
        let (Value::Timestamp(t0), Value::Timestamp(t3)) = (generate(&spec, 0), generate(&spec, 3))
        else {
            panic!("expected timestamps");
        };
        assert_eq!(t3 - t0, Duration::hours(3));
    }

    #[test]
    fn jitter_stays_bounded() {
        let spec = GeneratorSpec::new("time_series")
            .with_param("start", "2024-01-01T00:00:00Z")
            .with_param("step", "1h")
            .with_param("jitter_seconds", 30);
        let base = match generate(
            &GeneratorSpec::new("time_series")
                .with_param("start", "2024-01-01T00:00:00Z")
                .with_param("step", "1h"),
            10,
        ) {
            Value::Timestamp(t) => t,
            other => panic!("unexpected {other:?}"),
        };

        let mut rng = ChaCha8Rng::seed_from_u64(77);
        let values = std::collections::HashMap::new();
        for _ in 0..100 {
            let ctx = GeneratorContext {
                row_index: 10,
                entity_values: &values,
            };
            match TimeSeriesGenerator.generate(&mut rng, &spec, &ctx).unwrap() {
                Value::Timestamp(t) => {
                    let delta = (t - base).num_seconds();
                    assert!((-30..30).contains(&delta), "jitter {delta}s out of bounds");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn validate_requires_start_and_step() {
        let spec = GeneratorSpec::new("time_series").with_param("start", "-1d");
        assert!(TimeSeriesGenerator.validate(&spec, ColumnType::Timestamp).is_err());
    }
}
