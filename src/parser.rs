//! The parser capability consumed by learning and joint inference.
//!
//! Parsing itself lives outside this crate: anything that can turn a sample into a
//! [`ParserOutput`] under a [`DataItemModel`] implements [`Parser`].
//!
//! [`ParserOutput`]: ../derivation/struct.ParserOutput.html
//! [`DataItemModel`]: ../model/struct.DataItemModel.html
//! [`Parser`]: trait.Parser.html

use std::error::Error;
use std::f64;

use crate::derivation::{Derivation, ParserOutput};
use crate::features::FeatureVector;
use crate::model::DataItemModel;
use crate::mr::Term;

/// Options for a single parser invocation.
pub struct ParseRequest<'a, L> {
    /// Derivations whose logical form is rejected are pruned from the search.
    pub pruning_filter: Option<&'a dyn Fn(&Term) -> bool>,
    /// Lexical entries to use in addition to the model's lexicon.
    pub generated_lexicon: Option<&'a L>,
    /// Overrides the parser's own beam size.
    pub beam_size: Option<usize>,
}
impl<'a, L> Default for ParseRequest<'a, L> {
    fn default() -> Self {
        ParseRequest {
            pruning_filter: None,
            generated_lexicon: None,
            beam_size: None,
        }
    }
}
impl<'a, L> ParseRequest<'a, L> {
    /// Whether `term` survives the pruning filter, if there is one.
    pub fn admits(&self, term: &Term) -> bool {
        self.pruning_filter.map_or(true, |f| f(term))
    }
}

/// A semantic parser over samples of type `S`.
pub trait Parser<S> {
    /// Lexical entries a [`LexiconGenerator`] can propose for a single parse.
    ///
    /// [`LexiconGenerator`]: ../learn/trait.LexiconGenerator.html
    type Lexicon;
    type Error: Error + Send + Sync + 'static;
    fn parse(
        &self,
        sample: &S,
        model: &DataItemModel<'_, S>,
        request: &ParseRequest<'_, Self::Lexicon>,
    ) -> Result<ParserOutput, Self::Error>;
}

/// A parse forest that can report expected feature counts.
pub trait GraphParserOutput {
    fn derivations(&self) -> &[Derivation];
    /// Expected features in log space, with the outside score of each root derivation given by
    /// `initial_outside`. A term mapped to `-inf` contributes nothing.
    fn log_expected_features(&self, initial_outside: &dyn Fn(&Term) -> f64) -> FeatureVector;
    /// Whether the forest holds every derivation, i.e. nothing was pruned.
    fn is_exact(&self) -> bool {
        false
    }
}

/// A flat output is a forest of depth one: each derivation's features are weighted by its
/// outside score plus its log-inside score.
impl GraphParserOutput for ParserOutput {
    fn derivations(&self) -> &[Derivation] {
        self.all_derivations()
    }
    fn log_expected_features(&self, initial_outside: &dyn Fn(&Term) -> f64) -> FeatureVector {
        let mut expected = FeatureVector::new();
        for derivation in self.all_derivations() {
            let outside = initial_outside(&derivation.semantics);
            if outside == f64::NEG_INFINITY {
                continue;
            }
            derivation
                .averaged_max_features
                .log_sum_exp_add_into(outside + derivation.log_inside_score, &mut expected);
        }
        expected
    }
    fn is_exact(&self) -> bool {
        ParserOutput::is_exact(self)
    }
}
