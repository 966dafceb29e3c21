extern crate semparse;

use semparse::derivation::{Derivation, ParserOutput};
use semparse::features::{FeatureKey, FeatureVector};
use semparse::joint::*;
use semparse::logsumexp;
use semparse::mr::Term;
use std::cell::Cell;
use std::collections::HashMap;
use std::f64;

fn fv(entries: &[(&str, f64)]) -> FeatureVector {
    entries.iter().map(|&(k, v)| (k, v)).collect()
}

fn key(s: &str) -> FeatureKey {
    FeatureKey::from(s)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Looks up evaluations by the printed logical form.
struct TableExecutor {
    table: HashMap<String, Vec<Evaluation<&'static str>>>,
    exact: bool,
}
impl TableExecutor {
    fn new(entries: Vec<(&str, Vec<Evaluation<&'static str>>)>) -> Self {
        TableExecutor {
            table: entries
                .into_iter()
                .map(|(term, evals)| (String::from(term), evals))
                .collect(),
            exact: true,
        }
    }
}
impl Executor<&'static str> for TableExecutor {
    fn execute(&self, term: &Term) -> Vec<Evaluation<&'static str>> {
        self.table
            .get(&term.to_string())
            .cloned()
            .unwrap_or_default()
    }
    fn is_exact(&self) -> bool {
        self.exact
    }
}

fn eval(
    result: &'static str,
    log_score: f64,
    features: &[(&str, f64)],
) -> Evaluation<&'static str> {
    Evaluation::new(result, log_score, fv(features))
}

fn execute<'a>(
    base: &'a ParserOutput,
    executor: &TableExecutor,
) -> JointGraphOutput<'a, ParserOutput, &'static str> {
    JointGraphOutput::execute(base, executor)
}

/// Two derivations, one of which executes two ways.
fn forest() -> (ParserOutput, TableExecutor) {
    let base = ParserOutput::new(vec![
        Derivation::new(
            Term::parse("boston:e").unwrap(),
            -1.0,
            fv(&[("p", 1.0)]),
        ),
        Derivation::new(
            Term::parse("austin:e").unwrap(),
            -2.0,
            fv(&[("p", 2.0), ("q", 1.0)]),
        ),
    ]);
    let executor = TableExecutor::new(vec![
        ("boston:e", vec![eval("r1", -0.5, &[("x", 1.0)])]),
        (
            "austin:e",
            vec![eval("r1", -1.0, &[("x", 2.0)]), eval("r2", -0.3, &[("y", 1.0)])],
        ),
    ]);
    (base, executor)
}

#[test]
fn joint_groups_by_result_in_first_seen_order() {
    let base = ParserOutput::new(vec![
        Derivation::new(Term::parse("boston:e").unwrap(), -1.0, FeatureVector::new()),
        Derivation::new(Term::parse("austin:e").unwrap(), -2.0, FeatureVector::new()),
        Derivation::new(Term::parse("paris:e").unwrap(), -3.0, FeatureVector::new()),
        Derivation::new(Term::parse("atlantis:e").unwrap(), -0.5, FeatureVector::new()),
    ]);
    let executor = TableExecutor::new(vec![
        ("boston:e", vec![eval("usa", -0.1, &[]), eval("mass", -2.0, &[])]),
        ("austin:e", vec![eval("usa", -0.2, &[])]),
        ("paris:e", vec![eval("france", 0.0, &[])]),
    ]);
    let joint = execute(&base, &executor);

    let results: Vec<&str> = joint.derivations().iter().map(|d| *d.result()).collect();
    assert_eq!(results, vec!["usa", "mass", "france"]);
    let sizes: Vec<usize> = joint.derivations().iter().map(|d| d.pairs().len()).collect();
    assert_eq!(sizes, vec![2, 1, 1]);

    let usa = &joint.derivations()[0];
    assert!(close(
        usa.log_inside_score(),
        logsumexp(&[-1.0 - 0.1, -2.0 - 0.2])
    ));
    assert!(close(usa.score(), -1.1));
}

#[test]
fn joint_log_norm_is_stable() {
    let base = ParserOutput::new(vec![
        Derivation::new(Term::parse("boston:e").unwrap(), -1000.0, FeatureVector::new()),
        Derivation::new(Term::parse("austin:e").unwrap(), -1000.1, FeatureVector::new()),
    ]);
    let executor = |term: &Term| {
        let result = if term.to_string() == "boston:e" { "a" } else { "b" };
        vec![Evaluation::new(result, 0.0, FeatureVector::new())]
    };
    let joint: JointGraphOutput<_, &str> = JointGraphOutput::execute(&base, &executor);

    let z = joint.log_norm();
    assert!(z.is_finite());
    assert!(close(z, -1000.0 + (1.0 + (-0.1f64).exp()).ln()));
    assert!(close(joint.log_norm_filtered(|r| *r == "b"), -1000.1));
}

#[test]
fn joint_empty_selection() {
    let (base, executor) = forest();
    let joint = execute(&base, &executor);
    assert_eq!(joint.log_norm_filtered(|_| false), f64::NEG_INFINITY);
    assert!(joint.log_expected_features_filtered(|_| false).is_empty());
    assert!(joint.executions(|_| false).is_empty());

    let empty = ParserOutput::default();
    let joint = execute(&empty, &executor);
    assert!(joint.derivations().is_empty());
    assert_eq!(joint.log_norm(), f64::NEG_INFINITY);
    assert!(joint.log_expected_features().is_empty());
    assert!(joint.max_derivations().is_empty());
}

#[test]
fn joint_log_expected_features() {
    let (base, executor) = forest();
    let joint = execute(&base, &executor);

    assert!(close(joint.log_norm(), logsumexp(&[-1.5, -3.0, -2.3])));

    let expected = joint.log_expected_features();
    let austin_outside = logsumexp(&[-1.0, -0.3]);
    assert!(close(
        expected.get(&key("p")),
        logsumexp(&[-1.5, austin_outside - 2.0 + 2f64.ln()])
    ));
    assert!(close(expected.get(&key("q")), austin_outside - 2.0));
    assert!(close(
        expected.get(&key("x")),
        logsumexp(&[-1.5, -3.0 + 2f64.ln()])
    ));
    assert!(close(expected.get(&key("y")), -2.3));
    assert_eq!(expected.len(), 4);

    // only r2: boston has no accepted evaluation, so its outside score is -inf
    let expected = joint.log_expected_features_filtered(|r| *r == "r2");
    assert!(close(expected.get(&key("p")), -0.3 - 2.0 + 2f64.ln()));
    assert!(close(expected.get(&key("q")), -2.3));
    assert!(close(expected.get(&key("y")), -2.3));
    assert_eq!(expected.value(&key("x")), None);
}

#[test]
fn joint_shared_semantics_execute_once() {
    let base = ParserOutput::new(vec![
        Derivation::new(Term::parse("boston:e").unwrap(), 0.0, fv(&[("p", 1.0)])),
        Derivation::new(Term::parse("boston:e").unwrap(), 0.0, fv(&[("p", 1.0)])),
    ]);
    let calls = Cell::new(0);
    let executor = |_: &Term| {
        calls.set(calls.get() + 1);
        vec![eval("r", 0.0, &[])]
    };
    let joint: JointGraphOutput<_, &str> = JointGraphOutput::execute(&base, &executor);
    assert_eq!(calls.get(), 1);
    assert_eq!(joint.derivations()[0].pairs().len(), 2);

    let log_norm = joint.log_norm();
    assert!(close(log_norm, 2f64.ln()));
    // p fires in every derivation, so its normalized expectation is exactly one
    let expected = joint.log_expected_features();
    assert!(close((expected.get(&key("p")) - log_norm).exp(), 1.0));
}

#[test]
fn joint_shared_semantics_expected_features() {
    let base = ParserOutput::new(vec![
        Derivation::new(Term::parse("boston:e").unwrap(), -1.0, fv(&[("p", 1.0)])),
        Derivation::new(Term::parse("boston:e").unwrap(), -2.0, fv(&[("p", 2.0)])),
    ]);
    let executor = TableExecutor::new(vec![(
        "boston:e",
        vec![eval("r1", -0.5, &[("x", 1.0)]), eval("r2", -1.0, &[])],
    )]);
    let joint = execute(&base, &executor);
    assert!(close(joint.log_norm(), logsumexp(&[-1.5, -2.5, -2.0, -3.0])));

    let outside = logsumexp(&[-0.5, -1.0]);
    let expected = joint.log_expected_features();
    assert!(close(
        expected.get(&key("p")),
        logsumexp(&[outside - 1.0, outside - 2.0 + 2f64.ln()])
    ));
    assert!(close(expected.get(&key("x")), logsumexp(&[-1.5, -2.5])));

    let expected = joint.log_expected_features_filtered(|r| *r == "r2");
    assert!(close(
        expected.get(&key("p")),
        logsumexp(&[-2.0, -3.0 + 2f64.ln()])
    ));
    assert_eq!(expected.value(&key("x")), None);
}

#[test]
fn joint_max_derivations() {
    let (base, executor) = forest();
    let joint = execute(&base, &executor);
    // r1: max(-1 - 0.5, -2 - 1) = -1.5, r2: -2 - 0.3 = -2.3
    let max = joint.max_derivations();
    assert_eq!(max.len(), 1);
    assert_eq!(max[0].result(), &"r1");
    assert!(close(max[0].score(), -1.5));

    // viterbi scores use derivation scores, not log-inside scores
    let base = ParserOutput::new(vec![
        Derivation::new(Term::parse("boston:e").unwrap(), -1.0, FeatureVector::new())
            .with_log_inside_score(-0.2),
        Derivation::new(Term::parse("austin:e").unwrap(), -1.0, FeatureVector::new()),
    ]);
    let executor = TableExecutor::new(vec![
        ("boston:e", vec![eval("a", 0.0, &[])]),
        ("austin:e", vec![eval("b", 0.0, &[])]),
    ]);
    let joint = execute(&base, &executor);
    let results: Vec<&str> = joint.max_derivations().iter().map(|d| *d.result()).collect();
    assert_eq!(results, vec!["a", "b"]);
    assert!(close(joint.derivations()[0].log_inside_score(), -0.2));
}

#[test]
fn joint_executions() {
    let (base, executor) = forest();
    let joint = execute(&base, &executor);

    let r1 = joint.executions_for(&"r1");
    assert_eq!(r1.len(), 2);
    assert!(std::ptr::eq(r1[0].0, &base.all_derivations()[0]));
    assert!(std::ptr::eq(r1[1].0, &base.all_derivations()[1]));
    assert!(close(r1[1].1.log_score, -1.0));

    let not_r1 = joint.executions(|r| *r != "r1");
    assert_eq!(not_r1.len(), 1);
    assert_eq!(not_r1[0].1.result, "r2");
    assert!(joint.executions_for(&"r3").is_empty());
}

#[test]
fn joint_exactness() {
    let (base, mut executor) = forest();
    assert!(!execute(&base, &executor).is_exact());

    let base = base.exact(true);
    assert!(execute(&base, &executor).is_exact());
    executor.exact = false;
    assert!(!execute(&base, &executor).is_exact());

    let closure = |_: &Term| vec![eval("r", 0.0, &[])];
    let joint: JointGraphOutput<_, &str> = JointGraphOutput::execute(&base, &closure);
    assert!(!joint.is_exact());
}

#[test]
fn joint_builder() {
    let (base, _) = forest();
    let ds = base.all_derivations();
    let joint = JointGraphOutput::builder(&base)
        .add_pair(&ds[1], eval("r", -1.0, &[]))
        .add_pair(&ds[0], eval("s", -1.0, &[]))
        .add_pair(&ds[0], eval("r", -2.0, &[]))
        .exact_evaluation(true)
        .build();
    let results: Vec<&str> = joint.derivations().iter().map(|d| *d.result()).collect();
    assert_eq!(results, vec!["r", "s"]);
    assert!(close(
        joint.derivations()[0].log_inside_score(),
        logsumexp(&[-2.0 - 1.0, -1.0 - 2.0])
    ));
    assert!(!joint.is_exact());
}
