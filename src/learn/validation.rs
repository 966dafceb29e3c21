use log::{debug, info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64;

use super::{DataItem, LearningError, LearningStats, LexiconGenerator, Validator};
use crate::derivation::{Derivation, ParserOutput};
use crate::features::FeatureVector;
use crate::model::Model;
use crate::mr::Term;
use crate::parser::{ParseRequest, Parser};

/// Parameters for the [`ValidationPerceptron`]. Every field has a default, so a partial
/// configuration can be deserialized.
///
/// # Examples
///
/// ```
/// use semparse::learn::ValidationParams;
///
/// let params: ValidationParams = serde_json::from_str(r#"{"epochs": 10, "hard_updates": true}"#)
///     .unwrap();
/// assert_eq!(params.epochs, 10);
/// assert!(params.hard_updates);
/// assert_eq!(params.margin, 1.0);
/// assert_eq!(params.lexicon_generation_beam_size, 20);
/// ```
///
/// [`ValidationPerceptron`]: struct.ValidationPerceptron.html
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationParams {
    /// Number of passes over the training data.
    pub epochs: usize,
    /// A valid derivation must outscore an invalid one by `margin` times the L1 norm of the
    /// difference of their features, or the pair is a violation.
    pub margin: f64,
    /// Only the highest-scoring valid derivations (all of them, if tied) take part in updates.
    pub hard_updates: bool,
    /// Beam size for parsing with a generated lexicon.
    pub lexicon_generation_beam_size: usize,
    /// Reuse the output of lexical induction as the validity-biased parse.
    pub conflate_parses: bool,
    /// Only run lexical induction on items whose best parse is not valid.
    pub error_driven: bool,
}
impl Default for ValidationParams {
    fn default() -> Self {
        ValidationParams {
            epochs: 4,
            margin: 1.0,
            hard_updates: false,
            lexicon_generation_beam_size: 20,
            conflate_parses: false,
            error_driven: false,
        }
    }
}

/// A perceptron that learns from a validation signal rather than from gold logical forms.
///
/// For each data item, the parser runs twice: once under the current model and once biased
/// towards valid logical forms. Derivations are split into valid and invalid sets according to
/// the [`Validator`], and every valid/invalid pair that fails to be separated by the margin
/// contributes to an additive update of the model weights.
///
/// # Examples
///
/// ```
/// use semparse::derivation::{Derivation, ParserOutput};
/// use semparse::features::FeatureVector;
/// use semparse::learn::{DataItem, ValidationParams, ValidationPerceptron};
/// use semparse::model::{DataItemModel, Model};
/// use semparse::mr::Term;
/// use semparse::parser::{ParseRequest, Parser};
/// use std::convert::Infallible;
///
/// struct Question(&'static str);
/// impl DataItem for Question {
///     type Sample = &'static str;
///     fn sample(&self) -> &&'static str {
///         &self.0
///     }
/// }
///
/// /// Proposes the same two readings for every sample, one per lexical feature.
/// struct TwoReadings;
/// impl Parser<&'static str> for TwoReadings {
///     type Lexicon = ();
///     type Error = Infallible;
///     fn parse(
///         &self,
///         _sample: &&'static str,
///         model: &DataItemModel<'_, &'static str>,
///         request: &ParseRequest<'_, ()>,
///     ) -> Result<ParserOutput, Infallible> {
///         let derivations = [("boston:e", "LEX#boston"), ("austin:e", "LEX#austin")]
///             .iter()
///             .map(|&(term, feature)| {
///                 let features: FeatureVector = vec![(feature, 1.0)].into_iter().collect();
///                 let score = model.score(&features);
///                 Derivation::new(Term::parse(term).unwrap(), score, features)
///             })
///             .filter(|d| request.admits(&d.semantics))
///             .collect();
///         Ok(ParserOutput::new(derivations))
///     }
/// }
///
/// let validator = |_: &Question, term: &Term| term.to_string() == "boston:e";
/// let learner = ValidationPerceptron::new(ValidationParams::default(), TwoReadings, validator);
///
/// let mut model = Model::new();
/// let stats = learner
///     .train(&[Question("largest city in massachusetts")], &mut model)
///     .unwrap();
///
/// assert!(stats.triggered_update(0, 0));
/// assert!(!stats.triggered_update(0, 1));
/// assert!(model.theta().get(&"LEX#boston".into()) > model.theta().get(&"LEX#austin".into()));
/// ```
///
/// [`Validator`]: trait.Validator.html
pub struct ValidationPerceptron<'a, DI, P, V>
where
    DI: DataItem,
    P: Parser<DI::Sample>,
{
    params: ValidationParams,
    parser: P,
    validator: V,
    processing_filter: Option<Box<dyn Fn(&DI) -> bool + 'a>>,
    genlex: Option<Box<dyn LexiconGenerator<DI, P::Lexicon> + 'a>>,
    output_logger: Option<Box<dyn Fn(&DI, &ParserOutput) + 'a>>,
}
impl<'a, DI, P, V> ValidationPerceptron<'a, DI, P, V>
where
    DI: DataItem,
    P: Parser<DI::Sample>,
    V: Validator<DI>,
{
    pub fn new(params: ValidationParams, parser: P, validator: V) -> Self {
        info!(
            "init validation perceptron: epochs={}, margin={}, hard_updates={}",
            params.epochs, params.margin, params.hard_updates
        );
        info!(
            "init validation perceptron: lexicon_generation_beam_size={}, conflate_parses={}, error_driven={}",
            params.lexicon_generation_beam_size, params.conflate_parses, params.error_driven
        );
        ValidationPerceptron {
            params,
            parser,
            validator,
            processing_filter: None,
            genlex: None,
            output_logger: None,
        }
    }
    /// Only data items accepted by `filter` are trained on. The others are recorded as skipped.
    pub fn with_processing_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&DI) -> bool + 'a,
    {
        self.processing_filter = Some(Box::new(filter));
        self
    }
    /// Enable lexical induction with the given generator.
    pub fn with_lexicon_generator<G>(mut self, genlex: G) -> Self
    where
        G: LexiconGenerator<DI, P::Lexicon> + 'a,
    {
        self.genlex = Some(Box::new(genlex));
        self
    }
    /// Called with every parser output the learner obtains.
    pub fn with_output_logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(&DI, &ParserOutput) + 'a,
    {
        self.output_logger = Some(Box::new(logger));
        self
    }
    pub fn params(&self) -> &ValidationParams {
        &self.params
    }

    /// Run every epoch over `data`, updating `model` in place. Updates made for one item are
    /// visible when parsing the next.
    pub fn train(
        &self,
        data: &[DI],
        model: &mut Model<DI::Sample>,
    ) -> Result<LearningStats, LearningError> {
        let mut stats = LearningStats::new();
        for epoch in 0..self.params.epochs {
            stats.begin_epoch(epoch);
            info!("epoch {}: {} data items", epoch, data.len());
            for (index, item) in data.iter().enumerate() {
                info!("epoch {}, item {}", epoch, index);
                self.train_item(item, model, index, epoch, &mut stats)?;
            }
            info!("epoch {} done: {}", epoch, stats.epoch(epoch));
        }
        Ok(stats)
    }

    fn train_item(
        &self,
        item: &DI,
        model: &mut Model<DI::Sample>,
        index: usize,
        epoch: usize,
        stats: &mut LearningStats,
    ) -> Result<(), LearningError> {
        if let Some(filter) = &self.processing_filter {
            if !filter(item) {
                info!("item {} rejected by processing filter -- skipping", index);
                stats.record_skipped(index, epoch);
                return Ok(());
            }
        }
        let is_valid = |term: &Term| self.validator.is_valid(item, term);

        // an unbiased parse from before lexical induction stays current if induction is skipped
        let mut real_output = None;
        let mut generated_output = None;
        if let Some(genlex) = &self.genlex {
            if self.params.error_driven {
                let output = self.parse(item, model, &ParseRequest::default())?;
                let best = output.best_derivations();
                if !best.is_empty() && best.iter().all(|d| is_valid(&d.semantics)) {
                    info!("best parse is valid -- skipping lexical induction");
                    real_output = Some(output);
                }
            }
            if real_output.is_none() {
                let lexicon = genlex.generate(item, model);
                let request = ParseRequest {
                    pruning_filter: Some(&is_valid),
                    generated_lexicon: Some(&lexicon),
                    beam_size: Some(self.params.lexicon_generation_beam_size),
                };
                let output = self.parse(item, model, &request)?;
                let best_valid = max_scoring(
                    output
                        .all_derivations()
                        .iter()
                        .filter(|d| is_valid(&d.semantics)),
                );
                info!(
                    "lexical induction: {} derivations, {} max-scoring valid",
                    output.len(),
                    best_valid.len()
                );
                if !best_valid.is_empty() {
                    genlex.adopt(item, &best_valid, model);
                }
                generated_output = Some(output);
            }
        }

        let real_output = match real_output {
            Some(output) => output,
            None => self.parse(item, model, &ParseRequest::default())?,
        };
        let good_output = match generated_output {
            Some(output) if self.params.conflate_parses => output,
            _ => {
                let request = ParseRequest {
                    pruning_filter: Some(&is_valid),
                    ..ParseRequest::default()
                };
                self.parse(item, model, &request)?
            }
        };
        self.parameter_update(item, &real_output, &good_output, model, index, epoch, stats)?;
        Ok(())
    }

    fn parse(
        &self,
        item: &DI,
        model: &Model<DI::Sample>,
        request: &ParseRequest<'_, P::Lexicon>,
    ) -> Result<ParserOutput, LearningError> {
        let data_item_model = model.create_data_item_model(item.sample());
        let output = self
            .parser
            .parse(item.sample(), &data_item_model, request)
            .map_err(|err| LearningError::Parser(Box::new(err)))?;
        if let Some(logger) = &self.output_logger {
            logger(item, &output)
        }
        Ok(output)
    }

    /// Update `model` from one data item given its unbiased and validity-biased parser outputs.
    /// Returns whether an update was made.
    ///
    /// An item without valid derivations, without invalid derivations, or whose violating sets
    /// are not both non-empty leaves the model untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn parameter_update(
        &self,
        item: &DI,
        real_output: &ParserOutput,
        good_output: &ParserOutput,
        model: &mut Model<DI::Sample>,
        index: usize,
        epoch: usize,
        stats: &mut LearningStats,
    ) -> Result<bool, LearningError> {
        let (valid, invalid) = self.create_valid_invalid_sets(item, real_output, good_output);
        info!("{} valid parses, {} invalid parses", valid.len(), invalid.len());
        for d in &valid {
            debug!("valid: [{}] {}", d.score, d.semantics)
        }
        if !valid.is_empty() {
            stats.record_has_valid_parse(index, epoch)
        }
        if valid.is_empty() || invalid.is_empty() {
            info!("no valid/invalid parses -- skipping");
            return Ok(false);
        }

        let (violating_valid, violating_invalid) =
            margin_violating_sets(model.theta(), self.params.margin, &valid, &invalid);
        info!(
            "{} violating valid parses, {} violating invalid parses",
            violating_valid.len(),
            violating_invalid.len()
        );
        if violating_valid.is_empty() || violating_invalid.is_empty() {
            info!("no violating valid/invalid parses -- skipping");
            return Ok(false);
        }
        for d in &violating_valid {
            debug!("violating valid: [{}] {}", d.score, d.semantics)
        }
        for d in &violating_invalid {
            debug!("violating invalid: [{}] {}", d.score, d.semantics)
        }

        let update = construct_update(&violating_valid, &violating_invalid, model)?;
        info!("update: {}", update);
        update.add_times_into(1.0, model.theta_mut());
        stats.record_triggered_update(index, epoch);
        Ok(true)
    }

    /// Split derivations into valid and invalid ones.
    ///
    /// Invalid derivations come from `real_output`, followed by those of `good_output` whose
    /// logical form was not already rejected in `real_output`. Valid derivations come from
    /// `good_output` only; with hard updates, just those tied at the highest score are kept.
    pub fn create_valid_invalid_sets<'o>(
        &self,
        item: &DI,
        real_output: &'o ParserOutput,
        good_output: &'o ParserOutput,
    ) -> (Vec<&'o Derivation>, Vec<&'o Derivation>) {
        let mut invalid = Vec::new();
        let mut invalid_semantics = HashSet::new();
        for d in real_output.all_derivations() {
            if !self.validator.is_valid(item, &d.semantics) {
                invalid.push(d);
                invalid_semantics.insert(&d.semantics);
            }
        }

        let mut valid = Vec::new();
        let mut valid_score = -f64::MAX;
        for d in good_output.all_derivations() {
            if self.validator.is_valid(item, &d.semantics) {
                if !self.params.hard_updates {
                    valid.push(d)
                } else if d.score > valid_score {
                    valid_score = d.score;
                    valid.clear();
                    valid.push(d);
                } else if d.score == valid_score {
                    valid.push(d)
                }
            } else if !invalid_semantics.contains(&d.semantics) {
                invalid.push(d)
            }
        }
        (valid, invalid)
    }
}

fn max_scoring<'o>(derivations: impl Iterator<Item = &'o Derivation>) -> Vec<&'o Derivation> {
    let mut best = Vec::new();
    let mut best_score = f64::NEG_INFINITY;
    for d in derivations {
        if best.is_empty() || d.score > best_score {
            best_score = d.score;
            best.clear();
            best.push(d);
        } else if d.score == best_score {
            best.push(d)
        }
    }
    best
}

/// Find the derivations that take part in a margin violation.
///
/// A valid derivation `v` and an invalid derivation `w` violate the margin when
/// `theta · δ < margin · ‖δ‖₁` with `δ = v.averaged_max_features - w.averaged_max_features`.
/// Each derivation appears at most once in the output. Violating valid derivations keep their
/// input order; violating invalid derivations are ordered by their first violation, scanning
/// valid derivations in the outer loop.
///
/// # Examples
///
/// ```
/// use semparse::derivation::Derivation;
/// use semparse::features::FeatureVector;
/// use semparse::learn::margin_violating_sets;
/// use semparse::mr::Term;
///
/// let d = |term: &str, feature: &str| {
///     let features: FeatureVector = vec![(feature, 1.0)].into_iter().collect();
///     Derivation::new(Term::parse(term).unwrap(), 0.0, features)
/// };
/// let good = d("boston:e", "LEX#boston");
/// let bad = d("austin:e", "LEX#austin");
///
/// // with zero weights every pair violates a positive margin
/// let theta = FeatureVector::new();
/// let (vv, vi) = margin_violating_sets(&theta, 1.0, &[&good], &[&bad]);
/// assert_eq!((vv.len(), vi.len()), (1, 1));
///
/// // theta·δ = 3 ≥ 1.0 · ‖δ‖₁ = 2
/// let theta: FeatureVector = vec![("LEX#boston", 2.0), ("LEX#austin", -1.0)]
///     .into_iter()
///     .collect();
/// let (vv, vi) = margin_violating_sets(&theta, 1.0, &[&good], &[&bad]);
/// assert!(vv.is_empty() && vi.is_empty());
/// ```
pub fn margin_violating_sets<'a>(
    theta: &FeatureVector,
    margin: f64,
    valid: &[&'a Derivation],
    invalid: &[&'a Derivation],
) -> (Vec<&'a Derivation>, Vec<&'a Derivation>) {
    // for each valid derivation, the indices of the invalid ones it violates the margin with
    let rows: Vec<Vec<usize>> = valid
        .par_iter()
        .map(|v| {
            invalid
                .iter()
                .enumerate()
                .filter(|(_, w)| violates_margin(theta, margin, v, w))
                .map(|(j, _)| j)
                .collect::<Vec<usize>>()
        })
        .collect();

    let mut violating_valid = Vec::new();
    let mut violating_invalid = Vec::new();
    let mut seen = vec![false; invalid.len()];
    for (v, row) in valid.iter().zip(&rows) {
        if !row.is_empty() {
            violating_valid.push(*v)
        }
        for &j in row {
            if !seen[j] {
                seen[j] = true;
                violating_invalid.push(invalid[j])
            }
        }
    }
    (violating_valid, violating_invalid)
}

fn violates_margin(
    theta: &FeatureVector,
    margin: f64,
    valid: &Derivation,
    invalid: &Derivation,
) -> bool {
    let delta = valid
        .averaged_max_features
        .add_times(-1.0, &invalid.averaged_max_features);
    let delta_score = delta.dot(theta);
    let bound = margin * delta.l1_norm();
    trace!(
        "margin test {} vs {}: {} < {}",
        valid.semantics,
        invalid.semantics,
        delta_score,
        bound
    );
    delta_score < bound
}

/// The mean features of the violating valid derivations minus the mean features of the
/// violating invalid ones, with entries below [`NOISE`] dropped.
///
/// Fails if either set is empty or if `model` rejects the update.
///
/// [`NOISE`]: ../features/constant.NOISE.html
pub fn construct_update<S>(
    violating_valid: &[&Derivation],
    violating_invalid: &[&Derivation],
    model: &Model<S>,
) -> Result<FeatureVector, LearningError> {
    if violating_valid.is_empty() || violating_invalid.is_empty() {
        return Err(LearningError::EmptyViolatingSet);
    }
    let mut update = FeatureVector::new();
    let valid_weight = 1.0 / violating_valid.len() as f64;
    for d in violating_valid {
        d.averaged_max_features
            .add_times_into(valid_weight, &mut update)
    }
    let invalid_weight = -1.0 / violating_invalid.len() as f64;
    for d in violating_invalid {
        d.averaged_max_features
            .add_times_into(invalid_weight, &mut update)
    }
    update.drop_noise();
    if !model.is_valid_weight_vector(&update) {
        return Err(LearningError::InvalidUpdate(update));
    }
    Ok(update)
}
