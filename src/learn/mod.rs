//! (learning) Validation-driven parameter estimation.
//!
//! Training data carries no gold logical forms. Instead, a [`Validator`] judges whether a
//! logical form is acceptable for a data item, and the learner pushes the weights of the model
//! so that acceptable derivations outscore unacceptable ones by a margin. See
//! [`ValidationPerceptron`].
//!
//! [`Validator`]: trait.Validator.html
//! [`ValidationPerceptron`]: struct.ValidationPerceptron.html

mod validation;
pub use self::validation::{
    construct_update, margin_violating_sets, ValidationParams, ValidationPerceptron,
};

use serde::Serialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;

use crate::derivation::Derivation;
use crate::features::FeatureVector;
use crate::model::Model;
use crate::mr::Term;

/// A training example.
pub trait DataItem {
    /// What the parser reads, e.g. a sentence.
    type Sample;
    fn sample(&self) -> &Self::Sample;
}

/// Judges whether a logical form is acceptable for a data item, for instance by executing it
/// against a database and comparing with a labeled answer.
///
/// Closures of the form `Fn(&DI, &Term) -> bool` are validators.
pub trait Validator<DI> {
    fn is_valid(&self, item: &DI, term: &Term) -> bool;
}
impl<DI, F> Validator<DI> for F
where
    F: Fn(&DI, &Term) -> bool,
{
    fn is_valid(&self, item: &DI, term: &Term) -> bool {
        self(item, term)
    }
}

/// Lexical induction: proposes entries for a data item and commits those that proved useful.
pub trait LexiconGenerator<DI: DataItem, L> {
    fn generate(&self, item: &DI, model: &Model<DI::Sample>) -> L;
    /// Add to the model whatever lexical entries the given (valid, max-scoring) derivations use.
    fn adopt(&self, item: &DI, derivations: &[&Derivation], model: &mut Model<DI::Sample>);
}

#[derive(Debug)]
pub enum LearningError {
    /// An update was rejected by the model. Training cannot continue.
    InvalidUpdate(FeatureVector),
    /// An update was requested from an empty set of violating derivations.
    EmptyViolatingSet,
    /// The parser failed.
    Parser(Box<dyn Error + Send + Sync>),
}
impl fmt::Display for LearningError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            LearningError::InvalidUpdate(update) => write!(f, "invalid update: {}", update),
            LearningError::EmptyViolatingSet => {
                write!(f, "cannot construct an update without violating derivations")
            }
            LearningError::Parser(err) => write!(f, "parser failed: {}", err),
        }
    }
}
impl Error for LearningError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LearningError::Parser(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Per-epoch tallies from [`LearningStats`].
///
/// [`LearningStats`]: struct.LearningStats.html
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EpochStats {
    pub has_valid_parse: usize,
    pub triggered_update: usize,
    pub skipped: usize,
}
impl fmt::Display for EpochStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} with valid parse, {} updates, {} skipped",
            self.has_valid_parse, self.triggered_update, self.skipped
        )
    }
}

/// What happened to each data item during training, keyed by `(item index, epoch)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LearningStats {
    epochs: usize,
    has_valid_parse: BTreeSet<(usize, usize)>,
    triggered_update: BTreeSet<(usize, usize)>,
    skipped: BTreeSet<(usize, usize)>,
}
impl LearningStats {
    pub fn new() -> Self {
        Self::default()
    }
    /// Number of epochs that have been started.
    pub fn epochs(&self) -> usize {
        self.epochs
    }
    pub fn begin_epoch(&mut self, epoch: usize) {
        self.epochs = self.epochs.max(epoch + 1)
    }
    pub fn record_has_valid_parse(&mut self, item: usize, epoch: usize) {
        self.begin_epoch(epoch);
        self.has_valid_parse.insert((item, epoch));
    }
    pub fn record_triggered_update(&mut self, item: usize, epoch: usize) {
        self.begin_epoch(epoch);
        self.triggered_update.insert((item, epoch));
    }
    pub fn record_skipped(&mut self, item: usize, epoch: usize) {
        self.begin_epoch(epoch);
        self.skipped.insert((item, epoch));
    }
    pub fn has_valid_parse(&self, item: usize, epoch: usize) -> bool {
        self.has_valid_parse.contains(&(item, epoch))
    }
    pub fn triggered_update(&self, item: usize, epoch: usize) -> bool {
        self.triggered_update.contains(&(item, epoch))
    }
    pub fn skipped(&self, item: usize, epoch: usize) -> bool {
        self.skipped.contains(&(item, epoch))
    }
    pub fn epoch(&self, epoch: usize) -> EpochStats {
        let count = |set: &BTreeSet<(usize, usize)>| set.iter().filter(|k| k.1 == epoch).count();
        EpochStats {
            has_valid_parse: count(&self.has_valid_parse),
            triggered_update: count(&self.triggered_update),
            skipped: count(&self.skipped),
        }
    }
}
impl fmt::Display for LearningStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for epoch in 0..self.epochs {
            writeln!(f, "epoch {}: {}", epoch, self.epoch(epoch))?;
        }
        Ok(())
    }
}
