use std::collections::HashSet;

use super::{Term, Variable};

/// Put a term in normal form.
///
/// Literals are simplified bottom-up, predicate first and then each argument. A lambda whose
/// argument does not occur in its simplified body is kept unless `strip_lambdas` is set, in which
/// case the binder is dropped and the body takes its place. Unchanged sub-terms are shared with
/// the input rather than rebuilt.
///
/// `simplify` is idempotent: `simplify(&simplify(t, s), s) == simplify(t, s)`.
///
/// # Examples
///
/// ```
/// use semparse::mr::{simplify, Term};
///
/// let term = Term::parse("(lambda $0:e (lambda $1:e (city:<e,t> $1)))").unwrap();
/// assert_eq!(simplify(&term, false), term);
/// assert_eq!(
///     simplify(&term, true).to_string(),
///     "(lambda $0:e (city:<e,t> $0))"
/// );
/// ```
pub fn simplify(term: &Term, strip_lambdas: bool) -> Term {
    rewrite(term, strip_lambdas).unwrap_or_else(|| term.clone())
}

/// Variables bound by a lambda in `term` that no variable leaf refers to.
///
/// Each binder is assumed vacuous when its lambda is visited and loses that status the first
/// time a reference to it is seen. Literals visit their predicate, then their arguments in order.
pub fn vacuous_variables(term: &Term) -> HashSet<Variable> {
    let mut vacuous = HashSet::new();
    collect_vacuous(term, &mut vacuous);
    vacuous
}

fn collect_vacuous(term: &Term, vacuous: &mut HashSet<Variable>) {
    match term {
        Term::Constant(_) => (),
        Term::Variable(v) => {
            vacuous.remove(v);
        }
        Term::Lambda(lambda) => {
            vacuous.insert(lambda.argument.clone());
            collect_vacuous(&lambda.body, vacuous)
        }
        Term::Literal(literal) => {
            collect_vacuous(&literal.predicate, vacuous);
            for arg in &literal.arguments {
                collect_vacuous(arg, vacuous)
            }
        }
    }
}

/// `None` means the term is already in normal form.
fn rewrite(term: &Term, strip_lambdas: bool) -> Option<Term> {
    match term {
        Term::Constant(_) | Term::Variable(_) => None,
        Term::Literal(literal) => {
            let predicate = rewrite(&literal.predicate, strip_lambdas);
            let arguments: Vec<Option<Term>> = literal
                .arguments
                .iter()
                .map(|arg| rewrite(arg, strip_lambdas))
                .collect();
            if predicate.is_none() && arguments.iter().all(Option::is_none) {
                return None;
            }
            let predicate = predicate.unwrap_or_else(|| literal.predicate.clone());
            let arguments = arguments
                .into_iter()
                .zip(&literal.arguments)
                .map(|(new, old)| new.unwrap_or_else(|| old.clone()))
                .collect();
            Some(Term::literal(predicate, arguments))
        }
        Term::Lambda(lambda) => {
            let body = rewrite(&lambda.body, strip_lambdas);
            if strip_lambdas && !body.as_ref().unwrap_or(&lambda.body).mentions(&lambda.argument)
            {
                return Some(body.unwrap_or_else(|| lambda.body.clone()));
            }
            body.map(|body| Term::lambda(lambda.argument.clone(), body))
        }
    }
}
