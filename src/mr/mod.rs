//! (representation) Typed logical forms.
//!
//! A [`Term`] is a constant, a variable, a lambda abstraction, or a literal (the application of a
//! predicate term to ordered argument terms). Terms are immutable and share sub-terms through
//! [`Arc`], so cloning a term is cheap and terms may be handed to parallel parser workers.
//!
//! # Examples
//!
//! ```
//! use semparse::mr::{simplify, vacuous_variables, Term};
//!
//! let term = Term::parse("(lambda $0:e (lambda $1:e (boston:<e,t> $0)))").unwrap();
//! assert_eq!(vacuous_variables(&term).len(), 1);
//!
//! let open = simplify(&term, true);
//! assert_eq!(open.to_string(), "(lambda $0:e (boston:<e,t> $0))");
//! ```
//!
//! [`Arc`]: https://doc.rust-lang.org/std/sync/struct.Arc.html

mod parser;
mod simplify;
pub use self::parser::{read_constants, read_constants_file, ParseError, ReadError};
pub use self::simplify::{simplify, vacuous_variables};

use once_cell::sync::Lazy;
use polytype::Type;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

static SYMBOLS: Lazy<Mutex<HashSet<&'static str>>> = Lazy::new(|| Mutex::new(HashSet::new()));
static NEXT_VARIABLE: AtomicUsize = AtomicUsize::new(0);

/// Intern a symbol in the process-wide symbol table. Equal strings always yield the same
/// `&'static str`.
pub fn intern(symbol: &str) -> &'static str {
    let mut symbols = SYMBOLS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(&interned) = symbols.get(symbol) {
        return interned;
    }
    let interned: &'static str = Box::leak(symbol.to_owned().into_boxed_str());
    symbols.insert(interned);
    interned
}

/// An atomic type tag such as `e` or `t`.
pub fn atomic_type(name: &str) -> Type {
    Type::Constructed(intern(name), vec![])
}

/// Show a type tag in the `<arg,ret>` notation used by logical-form text.
pub fn show_type(tp: &Type) -> String {
    if let Some((arg, ret)) = tp.as_arrow() {
        format!("<{},{}>", show_type(arg), show_type(ret))
    } else {
        match tp {
            Type::Constructed(name, args) if args.is_empty() => name.to_string(),
            _ => tp.to_string(),
        }
    }
}

/// A named, interned symbol with a type tag. Two constants are equal iff they share both name
/// and type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constant {
    name: &'static str,
    tp: Type,
}
impl Constant {
    pub fn new(name: &str, tp: Type) -> Self {
        Constant {
            name: intern(name),
            tp,
        }
    }
    /// Read a constant written as `name:type`, e.g. `next:<e,t>`.
    pub fn parse(inp: &str) -> Result<Self, ParseError> {
        parser::parse_constant(inp.trim())
    }
    pub fn name(&self) -> &'static str {
        self.name
    }
    pub fn tp(&self) -> &Type {
        &self.tp
    }
}
impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.name, show_type(&self.tp))
    }
}

/// A variable is identified by a process-unique id rather than by name, so renaming never
/// changes which binder a variable belongs to.
#[derive(Debug, Clone)]
pub struct Variable {
    id: usize,
    tp: Type,
}
impl Variable {
    pub fn new(tp: Type) -> Self {
        Variable {
            id: NEXT_VARIABLE.fetch_add(1, Ordering::Relaxed),
            tp,
        }
    }
    pub fn id(&self) -> usize {
        self.id
    }
    pub fn tp(&self) -> &Type {
        &self.tp
    }
}
impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Variable {}
impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lambda {
    pub argument: Variable,
    pub body: Term,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    pub predicate: Term,
    pub arguments: Vec<Term>,
}

/// A logical form.
///
/// Equality is structural, with variables compared by identity: two lambdas binding different
/// variables are unequal even if they would be alpha-equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Constant(Constant),
    Variable(Variable),
    Lambda(Arc<Lambda>),
    Literal(Arc<Literal>),
}
impl Term {
    pub fn constant(name: &str, tp: Type) -> Self {
        Term::Constant(Constant::new(name, tp))
    }
    pub fn lambda(argument: Variable, body: Term) -> Self {
        Term::Lambda(Arc::new(Lambda { argument, body }))
    }
    pub fn literal(predicate: Term, arguments: Vec<Term>) -> Self {
        Term::Literal(Arc::new(Literal {
            predicate,
            arguments,
        }))
    }
    /// Read a single term. The inverse of the `Display` implementation, up to variable identity.
    ///
    /// # Examples
    ///
    /// ```
    /// use semparse::mr::Term;
    ///
    /// let term = Term::parse("(lambda $0:e (and:<t,<t,t>> (city:<e,t> $0) (big:<e,t> $0)))")
    ///     .unwrap();
    /// assert_eq!(
    ///     term.to_string(),
    ///     "(lambda $0:e (and:<t,<t,t>> (city:<e,t> $0) (big:<e,t> $0)))"
    /// );
    /// assert!(Term::parse("(lambda $0:e)").is_err());
    /// assert!(Term::parse("(city:<e,t> $1)").is_err());
    /// ```
    pub fn parse(inp: &str) -> Result<Self, ParseError> {
        parser::parse_term(inp)
    }
    /// Whether a `Variable` leaf referencing `var` appears anywhere in this term.
    pub fn mentions(&self, var: &Variable) -> bool {
        match self {
            Term::Constant(_) => false,
            Term::Variable(v) => v == var,
            Term::Lambda(lambda) => lambda.body.mentions(var),
            Term::Literal(literal) => {
                literal.predicate.mentions(var)
                    || literal.arguments.iter().any(|arg| arg.mentions(var))
            }
        }
    }
    /// See [`simplify`](fn.simplify.html).
    pub fn simplify(&self, strip_lambdas: bool) -> Term {
        simplify(self, strip_lambdas)
    }
    fn show(&self, f: &mut fmt::Formatter, names: &mut VariableNames) -> fmt::Result {
        match self {
            Term::Constant(c) => write!(f, "{}", c),
            Term::Variable(v) => {
                if let Some(n) = names.get(v) {
                    write!(f, "${}", n)
                } else {
                    // free variables are declared where they first appear
                    let n = names.bind(v);
                    write!(f, "${}:{}", n, show_type(&v.tp))
                }
            }
            Term::Lambda(lambda) => {
                let n = names.bind(&lambda.argument);
                write!(f, "(lambda ${}:{} ", n, show_type(&lambda.argument.tp))?;
                lambda.body.show(f, names)?;
                write!(f, ")")
            }
            Term::Literal(literal) => {
                write!(f, "(")?;
                literal.predicate.show(f, names)?;
                for arg in &literal.arguments {
                    write!(f, " ")?;
                    arg.show(f, names)?;
                }
                write!(f, ")")
            }
        }
    }
}
impl From<Constant> for Term {
    fn from(c: Constant) -> Self {
        Term::Constant(c)
    }
}
impl From<Variable> for Term {
    fn from(v: Variable) -> Self {
        Term::Variable(v)
    }
}
impl FromStr for Term {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Term::parse(s)
    }
}
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.show(f, &mut VariableNames::default())
    }
}

#[derive(Default)]
struct VariableNames {
    names: HashMap<usize, usize>,
    next: usize,
}
impl VariableNames {
    fn get(&self, v: &Variable) -> Option<usize> {
        self.names.get(&v.id).copied()
    }
    fn bind(&mut self, v: &Variable) -> usize {
        let n = self.next;
        self.next += 1;
        self.names.insert(v.id, n);
        n
    }
}
