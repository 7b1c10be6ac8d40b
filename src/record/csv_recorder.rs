//! Line-oriented training log.
use super::{Record, RecordValue, Recorder};
use anyhow::Result;
use log::warn;
use std::{collections::HashMap, fs::File, path::Path};

/// Writes records to a CSV file with `step,key,value` rows.
///
/// Scalars stored between two flushes are aggregated to their mean, so the
/// log stays one line per metric per flush interval regardless of how often
/// metrics are produced.
pub struct CsvRecorder {
    wtr: csv::Writer<File>,
    stored: Vec<Record>,
}

impl CsvRecorder {
    /// Creates the log file, truncating an existing one.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut wtr = csv::Writer::from_path(path.as_ref())?;
        wtr.write_record(&["step", "key", "value"])?;
        Ok(Self {
            wtr,
            stored: Vec::new(),
        })
    }

    fn write_row(&mut self, step: usize, key: &str, value: String) {
        let step = step.to_string();
        if let Err(e) = self.wtr.write_record(&[step.as_str(), key, value.as_str()]) {
            warn!("Failed to write a log row: {}", e);
        }
    }
}

impl Recorder for CsvRecorder {
    fn write(&mut self, step: usize, record: Record) {
        for (k, v) in record.iter() {
            let value = match v {
                RecordValue::Scalar(v) => v.to_string(),
                RecordValue::DateTime(t) => t.to_rfc3339(),
                RecordValue::String(s) => s.clone(),
            };
            let k = k.clone();
            self.write_row(step, &k, value);
        }
        let _ = self.wtr.flush();
    }

    fn store(&mut self, record: Record) {
        self.stored.push(record);
    }

    fn flush(&mut self, step: usize) {
        // Mean over the scalars stored since the previous flush.
        let mut sums: HashMap<String, (f32, usize)> = HashMap::new();
        for record in self.stored.drain(..) {
            for (k, v) in record.iter() {
                if let RecordValue::Scalar(v) = v {
                    let e = sums.entry(k.clone()).or_insert((0.0, 0));
                    e.0 += v;
                    e.1 += 1;
                }
            }
        }

        let mut keys: Vec<_> = sums.keys().cloned().collect();
        keys.sort();
        for k in keys {
            let (sum, n) = sums[&k];
            self.write_row(step, &k, (sum / n as f32).to_string());
        }
        let _ = self.wtr.flush();
    }
}
