#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::atomic::{AtomicUsize, Ordering};

use minibars::{HostAccessError, HostObject, Value};
use rand::Rng;

pub fn generate_random_whitespace() -> String {
    let mut rng = rand::rng();
    let length = rng.random_range(0..10);
    (0..length).map(|_| ' ').collect()
}

pub fn generate_random_whitespace_at_least_one() -> String {
    let mut rng = rand::rng();
    let length = rng.random_range(1..10);
    (0..length).map(|_| ' ').collect()
}

/// A helper name no other test uses, for tests that touch the global
/// execution context.
pub fn unique_name(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!("{prefix}_{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// A host type readable by field name, with a private field kept out of
/// templates.
#[derive(Debug, Clone)]
pub struct Person {
    pub name: String,
    pub age: u32,
    pub secret: String,
}

impl Person {
    pub fn new(name: &str, age: u32) -> Self {
        Self {
            name: name.to_string(),
            age,
            secret: format!("{name}'s secret"),
        }
    }
}

impl HostObject for Person {
    fn type_name(&self) -> &str {
        "Person"
    }

    fn valid_keys(&self) -> Option<&[&str]> {
        Some(&["name", "age"])
    }

    fn field_names(&self) -> &[&str] {
        &["name", "age", "secret"]
    }

    fn read_field(&self, key: &str) -> Result<Option<Value>, HostAccessError> {
        Ok(match key {
            "name" => Some(Value::from(self.name.as_str())),
            "age" => Some(Value::from(self.age)),
            "secret" => Some(Value::from(self.secret.as_str())),
            _ => None,
        })
    }

    fn to_display(&self) -> Option<String> {
        Some(format!("{} ({})", self.name, self.age))
    }
}

/// A host collection enumerable as a sequence.
#[derive(Debug)]
pub struct Team(pub Vec<Person>);

impl HostObject for Team {
    fn as_sequence(&self) -> Option<Vec<Value>> {
        Some(self.0.iter().cloned().map(Value::host).collect())
    }
}

/// A host type whose `broken` field faults when read.
#[derive(Debug)]
pub struct Faulty;

impl HostObject for Faulty {
    fn type_name(&self) -> &str {
        "Faulty"
    }

    fn field_names(&self) -> &[&str] {
        &["ok", "broken"]
    }

    fn read_field(&self, key: &str) -> Result<Option<Value>, HostAccessError> {
        match key {
            "broken" => Err(HostAccessError::new("Faulty", key, "backing store unavailable")),
            _ => Ok(Some(Value::from("fine"))),
        }
    }
}
