//! Gaussian generator.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use super::{param_f64, Generator, GeneratorContext, GeneratorError};
use crate::domain::{ColumnType, GeneratorSpec, Value};

/// Unbounded Gaussian with the given `mean` and `std`.
#[derive(Debug)]
pub struct NormalGenerator;

impl Generator for NormalGenerator {
    fn validate(&self, spec: &GeneratorSpec, _column_type: ColumnType) -> Result<(), GeneratorError> {
        if !spec.params.contains_key("mean") {
            return Err(GeneratorError::MissingParam {
                generator: "normal",
                param: "mean",
            });
        }
        if !spec.params.contains_key("std") {
            return Err(GeneratorError::MissingParam {
                generator: "normal",
                param: "std",
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
        let mean = param_f64(&spec.params, "mean").ok_or(GeneratorError::MissingParam {
            generator: "normal",
            param: "mean",
        })?;
        let std = param_f64(&spec.params, "std").ok_or(GeneratorError::MissingParam {
            generator: "normal",
            param: "std",
        })?;

        let z: f64 = rng.sample(StandardNormal);
        Ok(Value::Float(z * std + mean))
    }
}
