//! Sparse feature vectors: the currency of both scoring and learning.
//!
//! # Examples
//!
//! ```
//! use semparse::features::FeatureVector;
//!
//! let a: FeatureVector = vec![("LEX#boston", 1.0), ("LEX#city", 2.0)].into_iter().collect();
//! let b: FeatureVector = vec![("LEX#city", 0.5), ("XEME#pp", -1.0)].into_iter().collect();
//!
//! assert_eq!(a.dot(&b), 1.0);
//! let delta = a.add_times(-1.0, &b);
//! assert_eq!(delta.l1_norm(), 1.0 + 1.5 + 1.0);
//! ```

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64;
use std::fmt;
use std::iter::FromIterator;

use crate::utils::logsumexp2;

/// Entries whose magnitude falls below this are removed by [`FeatureVector::drop_noise`].
///
/// [`FeatureVector::drop_noise`]: struct.FeatureVector.html#method.drop_noise
pub const NOISE: f64 = 1e-4;

/// A feature identifier: a path of tags joined by `#`, e.g. `LEX#boston`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureKey(String);
impl FeatureKey {
    pub fn new(tags: &[&str]) -> Self {
        FeatureKey(tags.join("#"))
    }
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.0.split('#')
    }
    /// The leading tag, which names the feature set the key belongs to.
    pub fn prefix(&self) -> &str {
        self.0.split('#').next().unwrap_or("")
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for FeatureKey {
    fn from(s: &str) -> Self {
        FeatureKey(String::from(s))
    }
}
impl From<String> for FeatureKey {
    fn from(s: String) -> Self {
        FeatureKey(s)
    }
}
impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A sparse map from [`FeatureKey`] to weight. Absent keys have weight `0.0`.
///
/// [`FeatureKey`]: struct.FeatureKey.html
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(HashMap<FeatureKey, f64>);
impl FeatureVector {
    pub fn new() -> Self {
        FeatureVector(HashMap::new())
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn get(&self, key: &FeatureKey) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }
    /// Like [`get`], but distinguishes absent keys. Log-space vectors need this, since an absent
    /// key there stands for `-inf` rather than `0.0`.
    ///
    /// [`get`]: #method.get
    pub fn value(&self, key: &FeatureKey) -> Option<f64> {
        self.0.get(key).copied()
    }
    pub fn contains(&self, key: &FeatureKey) -> bool {
        self.0.contains_key(key)
    }
    pub fn set(&mut self, key: FeatureKey, value: f64) {
        self.0.insert(key, value);
    }
    pub fn remove(&mut self, key: &FeatureKey) -> Option<f64> {
        self.0.remove(key)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&FeatureKey, f64)> {
        self.0.iter().map(|(k, &v)| (k, v))
    }
    pub fn keys(&self) -> impl Iterator<Item = &FeatureKey> {
        self.0.keys()
    }
    /// `target += factor * self`, inserting keys missing from `target`.
    pub fn add_times_into(&self, factor: f64, target: &mut FeatureVector) {
        for (k, &v) in &self.0 {
            *target.0.entry(k.clone()).or_insert(0.0) += factor * v;
        }
    }
    /// `self + factor * other` as a new vector.
    pub fn add_times(&self, factor: f64, other: &FeatureVector) -> FeatureVector {
        let mut sum = self.clone();
        other.add_times_into(factor, &mut sum);
        sum
    }
    pub fn dot(&self, other: &FeatureVector) -> f64 {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .0
            .iter()
            .filter_map(|(k, v)| large.0.get(k).map(|w| v * w))
            .sum()
    }
    pub fn l1_norm(&self) -> f64 {
        self.0.values().map(|v| v.abs()).sum()
    }
    /// Remove every entry whose magnitude is below [`NOISE`].
    ///
    /// [`NOISE`]: constant.NOISE.html
    pub fn drop_noise(&mut self) {
        self.0.retain(|_, v| v.abs() >= NOISE)
    }
    /// Accumulate `self`, weighted by `exp(log_weight)`, into a log-space vector:
    /// `target[k] = logsumexp(target[k], log_weight + ln(self[k]))`, where a key absent from
    /// `target` stands for `-inf`. Entries of `self` must be non-negative; zero entries
    /// contribute nothing.
    pub fn log_sum_exp_add_into(&self, log_weight: f64, target: &mut FeatureVector) {
        for (k, &v) in &self.0 {
            let contribution = log_weight + v.ln();
            if contribution == f64::NEG_INFINITY {
                continue;
            }
            let entry = target.0.entry(k.clone()).or_insert(f64::NEG_INFINITY);
            *entry = logsumexp2(*entry, contribution);
        }
    }
}
impl<K: Into<FeatureKey>> FromIterator<(K, f64)> for FeatureVector {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        FeatureVector(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let entries = self
            .0
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(k, v)| format!("{}={}", k, v))
            .join(", ");
        write!(f, "{{{}}}", entries)
    }
}
