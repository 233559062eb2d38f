//! Faker-style categorical generators.
//!
//! Fixed word lists sampled from the seeded stream; unlike free-form faker
//! libraries these stay reproducible for a given seed.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::{Generator, GeneratorContext, GeneratorError};
use crate::domain::{ColumnType, GeneratorSpec, Value};

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen", "Carlos", "Sofia", "Yuki", "Wei", "Amara", "Lars", "Ingrid", "Mateo",
    "Fatima", "Ravi",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Tanaka", "Kim", "Nguyen", "Müller", "Rossi", "Silva",
    "Kowalski", "Andersson", "Okafor", "Patel",
];

const CITIES: &[&str] = &[
    "New York", "Los Angeles", "Chicago", "Houston", "Phoenix", "Philadelphia", "San Antonio",
    "San Diego", "Dallas", "San Jose", "Austin", "Jacksonville", "Fort Worth", "Columbus",
    "Charlotte", "San Francisco", "Indianapolis", "Seattle", "Denver", "Washington", "Boston",
    "Nashville", "Detroit", "Portland", "Las Vegas", "London", "Paris", "Tokyo", "Berlin",
    "Madrid", "Rome", "Amsterdam", "Vienna", "Prague", "Barcelona", "Munich", "Milan",
    "Stockholm", "Copenhagen", "Oslo",
];

const DEVICE_PREFIXES: &[&str] = &[
    "Sensor", "Device", "Meter", "Gauge", "Monitor", "Detector", "Reader", "Tracker",
];

const DEVICE_SUFFIXES: &[&str] = &[
    "Alpha", "Beta", "Gamma", "Delta", "Prime", "Pro", "Max", "Plus",
];

fn pick<'a>(rng: &mut ChaCha8Rng, list: &[&'a str]) -> &'a str {
    list[rng.random_range(0..list.len())]
}

/// Full personal names.
#[derive(Debug)]
pub struct FakerNameGenerator;

impl Generator for FakerNameGenerator {
    fn validate(&self, _spec: &GeneratorSpec, _column_type: ColumnType) -> Result<(), GeneratorError> {
        Ok(())
    }

    fn generate(
        &self,
        rng: &mut ChaCha8Rng,
        _spec: &GeneratorSpec,
        _ctx: &GeneratorContext<'_>,
    ) -> Result<Value, GeneratorError> {
        let first = pick(rng, FIRST_NAMES);
        let last = pick(rng, LAST_NAMES);
        Ok(Value::Text(format!("{first} {last}")))
    }
}

/// City names.
#[derive(Debug)]
pub struct FakerCityGenerator;

impl Generator for FakerCityGenerator {
    fn validate(&self, _spec: &GeneratorSpec, _column_type: ColumnType) -> Result<(), GeneratorError> {
        Ok(())
    }

    fn generate(
        &self,
        rng: &mut ChaCha8Rng,
        _spec: &GeneratorSpec,
        _ctx: &GeneratorContext<'_>,
    ) -> Result<Value, GeneratorError> {
        Ok(Value::Text(pick(rng, CITIES).to_string()))
    }
}

/// Device-style identifiers like `Sensor-Gamma-0042`.
#[derive(Debug)]
pub struct FakerDeviceNameGenerator;

impl Generator for FakerDeviceNameGenerator {
    fn validate(&self, _spec: &GeneratorSpec, _column_type: ColumnType) -> Result<(), GeneratorError> {
        Ok(())
    }

    fn generate(
        &self,
        rng: &mut ChaCha8Rng,
        _spec: &GeneratorSpec,
        _ctx: &GeneratorContext<'_>,
    ) -> Result<Value, GeneratorError> {
        let prefix = pick(rng, DEVICE_PREFIXES);
        let suffix = pick(rng, DEVICE_SUFFIXES);
        let number = rng.random_range(0..10_000);
        Ok(Value::Text(format!("{prefix}-{suffix}-{number:04}")))
    }
}
