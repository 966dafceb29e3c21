//! A library for learning semantic parsers from validation signals.
//!
//! Logical forms are typed lambda-calculus [`Term`]s. A parser, supplied by the user, proposes
//! scored [`Derivation`]s for each sample under a linear [`Model`]. The
//! [`ValidationPerceptron`] learns the model weights from a [`Validator`] instead of gold
//! logical forms, and [`JointGraphOutput`] combines a parse forest with the execution of its
//! logical forms for log-space joint inference.
//!
//! Good places to look are [`learn`] and [`joint`].
//!
//! [`Term`]: mr/enum.Term.html
//! [`Derivation`]: derivation/struct.Derivation.html
//! [`Model`]: model/struct.Model.html
//! [`ValidationPerceptron`]: learn/struct.ValidationPerceptron.html
//! [`Validator`]: learn/trait.Validator.html
//! [`JointGraphOutput`]: joint/struct.JointGraphOutput.html
//! [`learn`]: learn/index.html
//! [`joint`]: joint/index.html

pub mod derivation;
pub mod features;
pub mod joint;
pub mod learn;
pub mod model;
pub mod mr;
pub mod parser;
mod utils;

pub use crate::derivation::{Derivation, ParserOutput};
pub use crate::features::{FeatureKey, FeatureVector};
pub use crate::model::{DataItemModel, Model};
pub use crate::utils::logsumexp;
