//! Running statistics over temperature values.

use std::ops::AddAssign;

use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Count, extrema, mean and spread of the values added so
/// far. `NaN`s (pixels without a reading) are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    count: usize,
    min: f64,
    max: f64,
    sum: f64,
    sum_sq: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.,
            sum_sq: 0.,
        }
    }
}

impl Stats {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then(|| self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then(|| self.max)
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let var = self.sum_sq / self.count as f64 - mean * mean;
        Some(var.max(0.).sqrt())
    }
}

impl AddAssign<f64> for Stats {
    fn add_assign(&mut self, val: f64) {
        if val.is_nan() {
            return;
        }
        self.count += 1;
        self.min = self.min.min(val);
        self.max = self.max.max(val);
        self.sum += val;
        self.sum_sq += val * val;
    }
}

impl AddAssign<&Stats> for Stats {
    fn add_assign(&mut self, other: &Stats) {
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }
}

impl Serialize for Stats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("Stats", 5)?;
        st.serialize_field("count", &self.count)?;
        st.serialize_field("min", &self.min())?;
        st.serialize_field("max", &self.max())?;
        st.serialize_field("mean", &self.mean())?;
        st.serialize_field("std_dev", &self.std_dev())?;
        st.end()
    }
}
