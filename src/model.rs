//! The linear scoring model and its weight vector.

use std::collections::HashSet;
use std::fmt;

use crate::features::{FeatureKey, FeatureVector};
use crate::mr::Term;

/// A source of features for scoring a logical form in the context of a sample.
///
/// Closures of the form `Fn(&S, &Term, &mut FeatureVector)` are feature sets that accept any
/// weight update.
pub trait FeatureSet<S>: Send + Sync {
    /// Add this set's features for `term` into `features`.
    fn set_features(&self, sample: &S, term: &Term, features: &mut FeatureVector);
    /// Whether `update` respects the constraints this feature set places on the weights.
    fn is_valid_weight_vector(&self, _update: &FeatureVector) -> bool {
        true
    }
}
impl<S, F> FeatureSet<S> for F
where
    F: Fn(&S, &Term, &mut FeatureVector) + Send + Sync,
{
    fn set_features(&self, sample: &S, term: &Term, features: &mut FeatureVector) {
        self(sample, term, features)
    }
}

/// One `CONST#name:type` feature per constant occurrence in the logical form.
///
/// # Examples
///
/// ```
/// use semparse::features::{FeatureKey, FeatureVector};
/// use semparse::model::{ConstantCounts, FeatureSet};
/// use semparse::mr::Term;
///
/// let term = Term::parse("(lambda $0:e (and:<t,<t,t>> (city:<e,t> $0) (city:<e,t> $0)))")
///     .unwrap();
/// let mut features = FeatureVector::new();
/// ConstantCounts.set_features(&(), &term, &mut features);
/// assert_eq!(features.get(&FeatureKey::new(&["CONST", "city:<e,t>"])), 2.0);
/// assert_eq!(features.len(), 2);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantCounts;
impl ConstantCounts {
    pub const TAG: &'static str = "CONST";
}
impl<S> FeatureSet<S> for ConstantCounts {
    fn set_features(&self, sample: &S, term: &Term, features: &mut FeatureVector) {
        match term {
            Term::Constant(c) => {
                let key = FeatureKey::new(&[Self::TAG, &c.to_string()]);
                let count = features.get(&key);
                features.set(key, count + 1.0)
            }
            Term::Variable(_) => (),
            Term::Lambda(lambda) => self.set_features(sample, &lambda.body, features),
            Term::Literal(literal) => {
                self.set_features(sample, &literal.predicate, features);
                for arg in &literal.arguments {
                    self.set_features(sample, arg, features)
                }
            }
        }
    }
}

/// Owns the weight vector `theta` and the constraints updates to it must respect.
///
/// A model is passed by reference through training, so independent models can be trained side
/// by side in one process.
pub struct Model<S> {
    theta: FeatureVector,
    feature_sets: Vec<Box<dyn FeatureSet<S>>>,
    fixed: HashSet<FeatureKey>,
}
impl<S> Default for Model<S> {
    fn default() -> Self {
        Model {
            theta: FeatureVector::new(),
            feature_sets: Vec::new(),
            fixed: HashSet::new(),
        }
    }
}
impl<S> Model<S> {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_feature_set<F: FeatureSet<S> + 'static>(mut self, feature_set: F) -> Self {
        self.add_feature_set(feature_set);
        self
    }
    pub fn add_feature_set<F: FeatureSet<S> + 'static>(&mut self, feature_set: F) {
        self.feature_sets.push(Box::new(feature_set))
    }
    /// Pin a feature: its weight can be set directly on `theta`, but no update may move it.
    pub fn fix(&mut self, key: FeatureKey) {
        self.fixed.insert(key);
    }
    pub fn is_fixed(&self, key: &FeatureKey) -> bool {
        self.fixed.contains(key)
    }
    pub fn theta(&self) -> &FeatureVector {
        &self.theta
    }
    pub fn theta_mut(&mut self) -> &mut FeatureVector {
        &mut self.theta
    }
    /// Whether `update` may be added into `theta`: it must leave every fixed feature untouched
    /// and be accepted by every feature set.
    ///
    /// # Examples
    ///
    /// ```
    /// use semparse::features::{FeatureKey, FeatureVector};
    /// use semparse::model::Model;
    ///
    /// let mut model = Model::<()>::new();
    /// model.fix(FeatureKey::from("BIAS"));
    ///
    /// let update: FeatureVector = vec![("LEX#boston", 0.5)].into_iter().collect();
    /// assert!(model.is_valid_weight_vector(&update));
    /// let update: FeatureVector = vec![("BIAS", 0.5)].into_iter().collect();
    /// assert!(!model.is_valid_weight_vector(&update));
    /// ```
    pub fn is_valid_weight_vector(&self, update: &FeatureVector) -> bool {
        update
            .iter()
            .all(|(k, v)| v == 0.0 || !self.fixed.contains(k))
            && self
                .feature_sets
                .iter()
                .all(|fs| fs.is_valid_weight_vector(update))
    }
    /// The scoring context for a single sample, handed to the parser.
    pub fn create_data_item_model<'a>(&'a self, sample: &'a S) -> DataItemModel<'a, S> {
        DataItemModel {
            model: self,
            sample,
        }
    }
}
impl<S> fmt::Debug for Model<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Model")
            .field("theta", &self.theta)
            .field("feature_sets", &self.feature_sets.len())
            .field("fixed", &self.fixed)
            .finish()
    }
}

/// A [`Model`] bound to one sample.
///
/// [`Model`]: struct.Model.html
pub struct DataItemModel<'a, S> {
    model: &'a Model<S>,
    sample: &'a S,
}
impl<'a, S> DataItemModel<'a, S> {
    pub fn model(&self) -> &'a Model<S> {
        self.model
    }
    pub fn sample(&self) -> &'a S {
        self.sample
    }
    pub fn theta(&self) -> &'a FeatureVector {
        &self.model.theta
    }
    /// Features of a logical form from every feature set of the model.
    pub fn features(&self, term: &Term) -> FeatureVector {
        let mut features = FeatureVector::new();
        for fs in &self.model.feature_sets {
            fs.set_features(self.sample, term, &mut features)
        }
        features
    }
    pub fn score(&self, features: &FeatureVector) -> f64 {
        self.model.theta.dot(features)
    }
    pub fn score_term(&self, term: &Term) -> f64 {
        self.score(&self.features(term))
    }
}
