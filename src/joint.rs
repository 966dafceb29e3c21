//! (inference) Joint parsing and execution.
//!
//! A logical form is often only a means to an end: it is executed, and what matters is the
//! result. A [`JointGraphOutput`] groups the (derivation, evaluation) pairs of a parse forest by
//! execution result, and computes the normalizer and expected feature counts of the joint
//! distribution over results in log space.
//!
//! # Examples
//!
//! ```
//! use semparse::derivation::{Derivation, ParserOutput};
//! use semparse::features::FeatureVector;
//! use semparse::joint::{Evaluation, JointGraphOutput};
//! use semparse::mr::Term;
//!
//! let d = |s: &str, score| Derivation::new(Term::parse(s).unwrap(), score, FeatureVector::new());
//! let base = ParserOutput::new(vec![
//!     d("boston:e", -1.0),
//!     d("austin:e", -2.0),
//!     d("paris:e", -3.0),
//! ]);
//!
//! // both american cities execute to the same answer
//! let executor = |term: &Term| {
//!     let result = if term.to_string() == "paris:e" { "france" } else { "usa" };
//!     vec![Evaluation::new(result, 0.0, FeatureVector::new())]
//! };
//! let joint: JointGraphOutput<_, &str> = JointGraphOutput::execute(&base, &executor);
//!
//! assert_eq!(joint.derivations().len(), 2);
//! let usa = joint.log_norm_filtered(|r| *r == "usa");
//! assert!((usa - ((-1f64).exp() + (-2f64).exp()).ln()).abs() < 1e-12);
//! assert_eq!(joint.max_derivations()[0].result(), &"usa");
//! ```
//!
//! [`JointGraphOutput`]: struct.JointGraphOutput.html

use std::collections::HashMap;
use std::f64;
use std::hash::Hash;

use crate::derivation::Derivation;
use crate::features::FeatureVector;
use crate::mr::Term;
use crate::parser::GraphParserOutput;
use crate::utils::logsumexp;

/// The outcome of executing a logical form.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation<R> {
    pub result: R,
    /// Log-probability of this outcome under the executor.
    pub log_score: f64,
    /// Features of the execution step. Entries must be non-negative.
    pub features: FeatureVector,
}
impl<R> Evaluation<R> {
    pub fn new(result: R, log_score: f64, features: FeatureVector) -> Self {
        Evaluation {
            result,
            log_score,
            features,
        }
    }
}

/// Executes logical forms, possibly with several weighted outcomes each.
///
/// Closures of the form `Fn(&Term) -> Vec<Evaluation<R>>` are executors.
pub trait Executor<R> {
    fn execute(&self, term: &Term) -> Vec<Evaluation<R>>;
    /// Whether every possible outcome is returned, i.e. none is pruned.
    fn is_exact(&self) -> bool {
        false
    }
}
impl<R, F> Executor<R> for F
where
    F: Fn(&Term) -> Vec<Evaluation<R>>,
{
    fn execute(&self, term: &Term) -> Vec<Evaluation<R>> {
        self(term)
    }
}

/// All (derivation, evaluation) pairs that share one execution result.
#[derive(Debug, Clone)]
pub struct JointDerivation<'a, R> {
    result: R,
    pairs: Vec<(&'a Derivation, Evaluation<R>)>,
    log_inside_score: f64,
    score: f64,
}
impl<'a, R> JointDerivation<'a, R> {
    fn new(result: R, pairs: Vec<(&'a Derivation, Evaluation<R>)>) -> Self {
        let inside: Vec<f64> = pairs
            .iter()
            .map(|(d, e)| d.log_inside_score + e.log_score)
            .collect();
        let score = pairs
            .iter()
            .map(|(d, e)| d.score + e.log_score)
            .fold(f64::NEG_INFINITY, f64::max);
        JointDerivation {
            result,
            log_inside_score: logsumexp(&inside),
            score,
            pairs,
        }
    }
    pub fn result(&self) -> &R {
        &self.result
    }
    pub fn pairs(&self) -> &[(&'a Derivation, Evaluation<R>)] {
        &self.pairs
    }
    /// Log-sum-exp over pairs of the derivation's log-inside score plus the evaluation's log
    /// score.
    pub fn log_inside_score(&self) -> f64 {
        self.log_inside_score
    }
    /// The Viterbi score: the best derivation score plus evaluation log score over pairs.
    pub fn score(&self) -> f64 {
        self.score
    }
}

/// Accumulates (derivation, evaluation) pairs for a [`JointGraphOutput`].
///
/// Evaluations are per logical form: derivations sharing semantics should be paired with the
/// same evaluations, as [`JointGraphOutput::execute`] does.
///
/// [`JointGraphOutput`]: struct.JointGraphOutput.html
/// [`JointGraphOutput::execute`]: struct.JointGraphOutput.html#method.execute
pub struct JointGraphOutputBuilder<'a, B, R> {
    base: &'a B,
    pairs: Vec<(&'a Derivation, Evaluation<R>)>,
    exact_evaluation: bool,
}
impl<'a, B, R> JointGraphOutputBuilder<'a, B, R>
where
    B: GraphParserOutput,
    R: Eq + Hash + Clone,
{
    pub fn new(base: &'a B) -> Self {
        JointGraphOutputBuilder {
            base,
            pairs: Vec::new(),
            exact_evaluation: false,
        }
    }
    pub fn add_pair(mut self, derivation: &'a Derivation, evaluation: Evaluation<R>) -> Self {
        self.pairs.push((derivation, evaluation));
        self
    }
    pub fn add_pairs<I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a Derivation, Evaluation<R>)>,
    {
        self.pairs.extend(pairs);
        self
    }
    pub fn exact_evaluation(mut self, exact: bool) -> Self {
        self.exact_evaluation = exact;
        self
    }
    /// Group pairs by result. Joint derivations are ordered by the first pair bearing their
    /// result.
    pub fn build(self) -> JointGraphOutput<'a, B, R> {
        let mut index: HashMap<R, usize> = HashMap::new();
        let mut groups: Vec<(R, Vec<(&'a Derivation, Evaluation<R>)>)> = Vec::new();
        for (derivation, evaluation) in self.pairs {
            let i = *index.entry(evaluation.result.clone()).or_insert_with(|| {
                groups.push((evaluation.result.clone(), Vec::new()));
                groups.len() - 1
            });
            groups[i].1.push((derivation, evaluation));
        }
        let derivations = groups
            .into_iter()
            .map(|(result, pairs)| JointDerivation::new(result, pairs))
            .collect();
        JointGraphOutput {
            exact: self.exact_evaluation && self.base.is_exact(),
            base: self.base,
            derivations,
        }
    }
}

/// Joint distribution over execution results for a parse forest.
pub struct JointGraphOutput<'a, B, R> {
    base: &'a B,
    derivations: Vec<JointDerivation<'a, R>>,
    exact: bool,
}
impl<'a, B, R> JointGraphOutput<'a, B, R>
where
    B: GraphParserOutput,
    R: Eq + Hash + Clone,
{
    pub fn builder(base: &'a B) -> JointGraphOutputBuilder<'a, B, R> {
        JointGraphOutputBuilder::new(base)
    }
    /// Execute every distinct logical form of `base` once, pair its evaluations with each of
    /// its derivations, and group the outcomes.
    pub fn execute<E: Executor<R> + ?Sized>(base: &'a B, executor: &E) -> Self {
        let mut evaluations: HashMap<&'a Term, Vec<Evaluation<R>>> = HashMap::new();
        let mut pairs = Vec::new();
        for derivation in base.derivations() {
            let term_evaluations = evaluations
                .entry(&derivation.semantics)
                .or_insert_with(|| executor.execute(&derivation.semantics));
            pairs.extend(term_evaluations.iter().cloned().map(|e| (derivation, e)));
        }
        JointGraphOutputBuilder::new(base)
            .add_pairs(pairs)
            .exact_evaluation(executor.is_exact())
            .build()
    }
    pub fn base(&self) -> &'a B {
        self.base
    }
    pub fn derivations(&self) -> &[JointDerivation<'a, R>] {
        &self.derivations
    }
    /// Every joint derivation tied for the highest Viterbi score.
    pub fn max_derivations(&self) -> Vec<&JointDerivation<'a, R>> {
        let best = self
            .derivations
            .iter()
            .map(|d| d.score)
            .fold(f64::NEG_INFINITY, f64::max);
        self.derivations.iter().filter(|d| d.score == best).collect()
    }
    /// Exact if the executor and the base forest both are.
    pub fn is_exact(&self) -> bool {
        self.exact
    }
    /// Pairs whose result passes `filter`.
    pub fn executions<F>(&self, filter: F) -> Vec<(&'a Derivation, &Evaluation<R>)>
    where
        F: Fn(&R) -> bool,
    {
        self.derivations
            .iter()
            .filter(|d| filter(&d.result))
            .flat_map(|d| d.pairs.iter().map(|(p, e)| (*p, e)))
            .collect()
    }
    /// Pairs that executed to `label`.
    pub fn executions_for(&self, label: &R) -> Vec<(&'a Derivation, &Evaluation<R>)> {
        self.executions(|r| r == label)
    }
    pub fn log_norm(&self) -> f64 {
        self.log_norm_filtered(|_| true)
    }
    /// The log of the total inside mass of joint derivations whose result passes `filter`.
    /// `-inf` if there are none.
    pub fn log_norm_filtered<F>(&self, filter: F) -> f64
    where
        F: Fn(&R) -> bool,
    {
        let scores: Vec<f64> = self
            .derivations
            .iter()
            .filter(|d| filter(&d.result))
            .map(|d| d.log_inside_score)
            .collect();
        logsumexp(&scores)
    }
    pub fn log_expected_features(&self) -> FeatureVector {
        self.log_expected_features_filtered(|_| true)
    }
    /// Unnormalized expected features, in log space, of joint derivations whose result passes
    /// `filter`.
    ///
    /// Each joint derivation has an implicit outside score of `0.0`. The outside score of a
    /// logical form in the base forest is the log-sum-exp of the log scores of its accepted
    /// evaluations, or `-inf` if it has none. A logical form with several derivations counts
    /// its evaluations once, so every derivation of it must be paired with the same ones.
    /// Execution features are added on top of the base forest's expected features, weighted by
    /// the evaluation log score plus the derivation's log-inside score.
    pub fn log_expected_features_filtered<F>(&self, filter: F) -> FeatureVector
    where
        F: Fn(&R) -> bool,
    {
        let accepted: Vec<&JointDerivation<'a, R>> = self
            .derivations
            .iter()
            .filter(|d| filter(&d.result))
            .collect();

        // evaluations belong to logical forms: count them once per term, through the first
        // derivation paired with it
        let mut first: HashMap<&Term, &Derivation> = HashMap::new();
        let mut outside: HashMap<&Term, f64> = HashMap::new();
        for (derivation, evaluation) in accepted.iter().flat_map(|d| &d.pairs) {
            let representative = *first.entry(&derivation.semantics).or_insert(*derivation);
            if !std::ptr::eq(representative, *derivation) {
                continue;
            }
            let score = outside
                .entry(&derivation.semantics)
                .or_insert(f64::NEG_INFINITY);
            *score = logsumexp(&[*score, evaluation.log_score]);
        }
        let mut expected = self.base.log_expected_features(&|term: &Term| {
            outside.get(term).copied().unwrap_or(f64::NEG_INFINITY)
        });

        for (derivation, evaluation) in accepted.iter().flat_map(|d| &d.pairs) {
            let log_weight = evaluation.log_score + derivation.log_inside_score + 0.0;
            evaluation
                .features
                .log_sum_exp_add_into(log_weight, &mut expected);
        }
        expected
    }
}
