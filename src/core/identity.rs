//! Id, reference, hashing and clock collaborators

use chrono::{DateTime, Timelike, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub trait IdGenerator: Send + Sync {
    /// A fresh opaque identifier
    fn new_id(&self) -> String;

    /// A shareable reference: `<label lowercased>-<nanoseconds>`
    fn new_reference(&self, label: &str) -> String;
}

pub trait Hasher: Send + Sync {
    /// Hex digest of `input`
    fn hash(&self, input: &str) -> String;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    fn new_reference(&self, label: &str) -> String {
        format!("{}-{}", label.to_lowercase(), Utc::now().nanosecond())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn hash(&self, input: &str) -> String {
        hex::encode(Sha256::digest(input.as_bytes()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
