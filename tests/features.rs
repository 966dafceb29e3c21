extern crate semparse;

use semparse::derivation::{Derivation, ParserOutput};
use semparse::features::{FeatureKey, FeatureVector, NOISE};
use semparse::model::{ConstantCounts, FeatureSet, Model};
use semparse::mr::Term;
use semparse::parser::GraphParserOutput;
use std::f64;

fn fv(entries: &[(&str, f64)]) -> FeatureVector {
    entries.iter().map(|&(k, v)| (k, v)).collect()
}

fn key(s: &str) -> FeatureKey {
    FeatureKey::from(s)
}

#[test]
fn features_key_tags() {
    let k = FeatureKey::new(&["LEX", "boston", "NP"]);
    assert_eq!(k.as_str(), "LEX#boston#NP");
    assert_eq!(k.prefix(), "LEX");
    assert_eq!(k.tags().collect::<Vec<_>>(), vec!["LEX", "boston", "NP"]);
    assert_eq!(k, key("LEX#boston#NP"));
}

#[test]
fn features_absent_keys_are_zero() {
    let v = fv(&[("LEX#boston", 2.0)]);
    assert_eq!(v.get(&key("LEX#boston")), 2.0);
    assert_eq!(v.get(&key("LEX#austin")), 0.0);
    assert_eq!(v.value(&key("LEX#austin")), None);
    assert!(FeatureVector::new().is_empty());
}

#[test]
fn features_arithmetic() {
    let a = fv(&[("a", 1.0), ("b", 2.0)]);
    let b = fv(&[("b", 3.0), ("c", -4.0)]);
    assert_eq!(a.dot(&b), 6.0);
    assert_eq!(b.dot(&a), 6.0);
    assert_eq!(a.dot(&FeatureVector::new()), 0.0);
    assert_eq!(b.l1_norm(), 7.0);

    let delta = a.add_times(-1.0, &b);
    assert_eq!(delta, fv(&[("a", 1.0), ("b", -1.0), ("c", 4.0)]));
    // operands are untouched
    assert_eq!(a, fv(&[("a", 1.0), ("b", 2.0)]));

    let mut target = fv(&[("a", 10.0)]);
    b.add_times_into(0.5, &mut target);
    assert_eq!(target, fv(&[("a", 10.0), ("b", 1.5), ("c", -2.0)]));
}

#[test]
fn features_drop_noise() {
    let mut v = fv(&[
        ("big", 1.0),
        ("tiny", NOISE / 2.0),
        ("tiny_negative", -NOISE / 2.0),
        ("edge", NOISE),
        ("negative", -0.5),
    ]);
    v.drop_noise();
    assert_eq!(v, fv(&[("big", 1.0), ("edge", NOISE), ("negative", -0.5)]));
}

#[test]
fn features_log_sum_exp_add_into() {
    let v = fv(&[("a", 1.0), ("b", 2.0), ("zero", 0.0)]);
    let mut target = fv(&[("a", -1.0)]);
    v.log_sum_exp_add_into(-2.0, &mut target);

    let expected_a = ((-1f64).exp() + (-2f64).exp()).ln();
    assert!((target.get(&key("a")) - expected_a).abs() < 1e-12);
    assert!((target.get(&key("b")) - (-2.0 + 2f64.ln())).abs() < 1e-12);
    // zero entries contribute nothing, so the key stays absent (i.e. -inf)
    assert_eq!(target.value(&key("zero")), None);

    let mut untouched = FeatureVector::new();
    v.log_sum_exp_add_into(f64::NEG_INFINITY, &mut untouched);
    assert!(untouched.is_empty());
}

#[test]
fn features_serde() {
    let v = fv(&[("LEX#boston", 0.5), ("XEME#pp", -1.0)]);
    let json = serde_json::to_string(&v).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["LEX#boston"], 0.5);
    assert_eq!(value["XEME#pp"], -1.0);
    let back: FeatureVector = serde_json::from_str(&json).unwrap();
    assert_eq!(back, v);
}

#[test]
fn features_display_is_sorted() {
    let v = fv(&[("b", 2.0), ("a", 1.0)]);
    assert_eq!(v.to_string(), "{a=1, b=2}");
}

struct NonNegative;
impl FeatureSet<()> for NonNegative {
    fn set_features(&self, _: &(), _: &Term, _: &mut FeatureVector) {}
    fn is_valid_weight_vector(&self, update: &FeatureVector) -> bool {
        update.iter().all(|(_, v)| v >= 0.0)
    }
}

#[test]
fn model_fixed_features_reject_updates() {
    let mut model = Model::<()>::new();
    model.fix(key("BIAS"));
    assert!(model.is_fixed(&key("BIAS")));

    assert!(model.is_valid_weight_vector(&fv(&[("LEX#boston", 1.0)])));
    assert!(!model.is_valid_weight_vector(&fv(&[("LEX#boston", 1.0), ("BIAS", -0.2)])));
    // an explicit zero does not move the weight
    assert!(model.is_valid_weight_vector(&fv(&[("BIAS", 0.0)])));

    // fixed weights can still be set directly
    model.theta_mut().set(key("BIAS"), 3.0);
    assert_eq!(model.theta().get(&key("BIAS")), 3.0);
}

#[test]
fn model_feature_sets_constrain_updates() {
    let model = Model::<()>::new().with_feature_set(NonNegative);
    assert!(model.is_valid_weight_vector(&fv(&[("a", 1.0)])));
    assert!(!model.is_valid_weight_vector(&fv(&[("a", 1.0), ("b", -1.0)])));
}

#[test]
fn model_scores_terms_with_feature_sets() {
    let mut model: Model<&'static str> = Model::new()
        .with_feature_set(ConstantCounts)
        .with_feature_set(|sample: &&str, _: &Term, features: &mut FeatureVector| {
            features.set(FeatureKey::new(&["LEN"]), sample.len() as f64)
        });
    model
        .theta_mut()
        .set(FeatureKey::new(&["CONST", "city:<e,t>"]), 0.5);
    model.theta_mut().set(key("LEN"), 0.1);

    let term = Term::parse("(lambda $0:e (and:<t,<t,t>> (city:<e,t> $0) (city:<e,t> $0)))")
        .unwrap();
    let sample = "cities";
    let data_item_model = model.create_data_item_model(&sample);
    let features = data_item_model.features(&term);
    assert_eq!(features.get(&key("CONST#city:<e,t>")), 2.0);
    assert_eq!(features.get(&key("CONST#and:<t,<t,t>>")), 1.0);
    assert_eq!(features.get(&key("LEN")), 6.0);
    assert!((data_item_model.score_term(&term) - (1.0 + 0.6)).abs() < 1e-12);
}

#[test]
fn parser_output_queries() {
    let boston = Term::parse("boston:e").unwrap();
    let austin = Term::parse("austin:e").unwrap();
    let output = ParserOutput::new(vec![
        Derivation::new(boston.clone(), 1.0, fv(&[("a", 1.0)])),
        Derivation::new(austin.clone(), 2.0, fv(&[("b", 1.0)])),
        Derivation::new(boston.clone(), 2.0, fv(&[("c", 1.0)])).with_log_inside_score(2.5),
    ]);
    assert_eq!(output.len(), 3);
    assert_eq!(output.best_derivations().len(), 2);
    assert_eq!(output.derivations_for(&boston).count(), 2);
    assert_eq!(output.semantics(), vec![&boston, &austin]);
    assert!(!output.is_exact());
    assert!(output.clone().exact(true).is_exact());

    assert!(ParserOutput::default().best_derivations().is_empty());
    assert_eq!(ParserOutput::default().log_norm(), f64::NEG_INFINITY);
}

#[test]
fn parser_output_log_expected_features() {
    let boston = Term::parse("boston:e").unwrap();
    let austin = Term::parse("austin:e").unwrap();
    let output = ParserOutput::new(vec![
        Derivation::new(boston.clone(), -1.0, fv(&[("a", 1.0), ("shared", 2.0)])),
        Derivation::new(austin.clone(), -2.0, fv(&[("b", 1.0), ("shared", 1.0)])),
    ]);

    let expected = output.log_expected_features(&|t: &Term| if *t == boston { 0.0 } else { -0.5 });
    assert!((expected.get(&key("a")) - -1.0).abs() < 1e-12);
    assert!((expected.get(&key("b")) - -2.5).abs() < 1e-12);
    let shared = (2.0 * (-1f64).exp() + (-2.5f64).exp()).ln();
    assert!((expected.get(&key("shared")) - shared).abs() < 1e-12);

    // terms with an outside score of -inf contribute nothing
    let only_boston = output.log_expected_features(&|t: &Term| {
        if *t == boston {
            0.0
        } else {
            f64::NEG_INFINITY
        }
    });
    assert_eq!(only_boston.value(&key("b")), None);
    let none = output.log_expected_features(&|_: &Term| f64::NEG_INFINITY);
    assert!(none.is_empty());
}
