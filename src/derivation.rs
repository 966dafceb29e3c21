//! Scored hypotheses produced by a parser.

use std::collections::HashSet;
use std::f64;

use crate::features::FeatureVector;
use crate::mr::Term;
use crate::utils::logsumexp;

/// One scored hypothesis mapping an input to a logical form.
///
/// Several internal parses may yield the same logical form. `averaged_max_features` is the
/// feature vector averaged over only the maximal-scoring of those parses, and
/// `log_inside_score` is the log-sum-exp of the scores of all of them. Both are computed by the
/// parser and are treated as opaque here.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    pub semantics: Term,
    pub score: f64,
    pub log_inside_score: f64,
    pub averaged_max_features: FeatureVector,
}
impl Derivation {
    /// A derivation whose log-inside score is its own score, as for a logical form with a single
    /// internal parse.
    pub fn new(semantics: Term, score: f64, averaged_max_features: FeatureVector) -> Self {
        Derivation {
            semantics,
            score,
            log_inside_score: score,
            averaged_max_features,
        }
    }
    pub fn with_log_inside_score(mut self, log_inside_score: f64) -> Self {
        self.log_inside_score = log_inside_score;
        self
    }
}

/// A fully materialized set of derivations for one sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParserOutput {
    derivations: Vec<Derivation>,
    exact: bool,
}
impl ParserOutput {
    pub fn new(derivations: Vec<Derivation>) -> Self {
        ParserOutput {
            derivations,
            exact: false,
        }
    }
    /// Mark the output as exhaustive, i.e. no derivation was pruned.
    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }
    pub fn is_exact(&self) -> bool {
        self.exact
    }
    pub fn all_derivations(&self) -> &[Derivation] {
        &self.derivations
    }
    pub fn len(&self) -> usize {
        self.derivations.len()
    }
    pub fn is_empty(&self) -> bool {
        self.derivations.is_empty()
    }
    /// Every derivation tied for the highest score.
    ///
    /// # Examples
    ///
    /// ```
    /// use semparse::derivation::{Derivation, ParserOutput};
    /// use semparse::features::FeatureVector;
    /// use semparse::mr::Term;
    ///
    /// let d = |s: &str, score| {
    ///     Derivation::new(Term::parse(s).unwrap(), score, FeatureVector::new())
    /// };
    /// let output = ParserOutput::new(vec![d("a:e", 1.0), d("b:e", 2.0), d("c:e", 2.0)]);
    /// let best: Vec<String> = output
    ///     .best_derivations()
    ///     .iter()
    ///     .map(|d| d.semantics.to_string())
    ///     .collect();
    /// assert_eq!(best, vec!["b:e", "c:e"]);
    /// ```
    pub fn best_derivations(&self) -> Vec<&Derivation> {
        let best = self
            .derivations
            .iter()
            .map(|d| d.score)
            .fold(f64::NEG_INFINITY, f64::max);
        self.derivations
            .iter()
            .filter(|d| d.score == best)
            .collect()
    }
    /// Derivations whose logical form is `semantics`.
    pub fn derivations_for<'a>(
        &'a self,
        semantics: &'a Term,
    ) -> impl Iterator<Item = &'a Derivation> {
        self.derivations
            .iter()
            .filter(move |d| &d.semantics == semantics)
    }
    /// Every distinct logical form, in order of first appearance.
    pub fn semantics(&self) -> Vec<&Term> {
        let mut seen = HashSet::new();
        self.derivations
            .iter()
            .map(|d| &d.semantics)
            .filter(|t| seen.insert(*t))
            .collect()
    }
    /// The log partition function over all derivations.
    pub fn log_norm(&self) -> f64 {
        let scores: Vec<f64> = self.derivations.iter().map(|d| d.log_inside_score).collect();
        logsumexp(&scores)
    }
}
impl From<Vec<Derivation>> for ParserOutput {
    fn from(derivations: Vec<Derivation>) -> Self {
        ParserOutput::new(derivations)
    }
}
