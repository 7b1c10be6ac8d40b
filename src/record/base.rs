//! Key-value records of training metrics.
use crate::error::DqnAtariError;
use chrono::prelude::{DateTime, Local};
use std::collections::{hash_map::Iter, HashMap};

/// A value stored in a [`Record`].
#[derive(Debug, Clone)]
pub enum RecordValue {
    /// A single floating point value, typically a metric.
    Scalar(f32),

    /// A timestamp.
    DateTime(DateTime<Local>),

    /// A text value.
    String(String),
}

/// A set of named values produced during training or evaluation.
#[derive(Debug, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record holding a single scalar.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Inserts a value.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns the value for a key, if present.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Merges two records; on key collision the entry of `record` wins.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Returns a scalar value.
    pub fn get_scalar(&self, k: &str) -> Result<f32, DqnAtariError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(DqnAtariError::RecordValueType("Scalar".to_string())),
            None => Err(DqnAtariError::RecordKey(k.to_string())),
        }
    }

    /// Returns if the record holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_roundtrip_and_merge() {
        let mut r1 = Record::from_scalar("loss", 0.25);
        r1.insert("note", RecordValue::String("warmup".into()));
        let r2 = Record::from_scalar("loss", 0.5);

        assert_eq!(r1.get_scalar("loss").unwrap(), 0.25);
        assert!(r1.get_scalar("note").is_err());
        assert!(r1.get_scalar("missing").is_err());

        let merged = r1.merge(r2);
        assert_eq!(merged.get_scalar("loss").unwrap(), 0.5);
        assert!(!merged.is_empty());
    }
}
