use itertools::Itertools;
use polytype::Type;
use std::collections::HashMap;
use std::path::Path;
use std::{error, fmt, fs, io};
use winnow::{
    ascii::multispace0,
    combinator::{alt, delimited, preceded, repeat, separated_pair},
    prelude::*,
    token::take_while,
};

use super::{atomic_type, Constant, Term, Variable};

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Unbalanced parentheses or otherwise unreadable text.
    Syntax(String),
    /// A type tag that is neither atomic nor of the form `<arg,ret>`.
    Type(String),
    /// A constant that is not of the form `name:type`.
    Constant(String),
    /// A lambda that is not of the form `(lambda $n:type BODY)`.
    Lambda(String),
    /// A variable reference without a binder or type declaration.
    UnboundVariable(String),
    /// A literal needs a predicate and at least one argument.
    EmptyLiteral(String),
}
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match *self {
            ParseError::Syntax(ref err) => write!(f, "could not read expression: {}", err),
            ParseError::Type(ref s) => write!(f, "invalid type tag: {}", s),
            ParseError::Constant(ref s) => write!(f, "invalid constant: {}", s),
            ParseError::Lambda(ref s) => write!(f, "invalid lambda: {}", s),
            ParseError::UnboundVariable(ref s) => write!(f, "unbound variable: {}", s),
            ParseError::EmptyLiteral(ref s) => write!(f, "literal without arguments: {}", s),
        }
    }
}
impl error::Error for ParseError {
    fn description(&self) -> &str {
        "could not parse logical form"
    }
}

/// Failure to load a symbol table.
#[derive(Debug)]
pub enum ReadError {
    Io(io::Error),
    Parse(ParseError),
}
impl From<io::Error> for ReadError {
    fn from(err: io::Error) -> Self {
        ReadError::Io(err)
    }
}
impl From<ParseError> for ReadError {
    fn from(err: ParseError) -> Self {
        ReadError::Parse(err)
    }
}
impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            ReadError::Io(err) => write!(f, "could not read constants file: {}", err),
            ReadError::Parse(err) => write!(f, "could not read constants: {}", err),
        }
    }
}
impl error::Error for ReadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ReadError::Io(err) => Some(err),
            ReadError::Parse(err) => Some(err),
        }
    }
}

/// Read a symbol table: one constant per line, `//` starts a comment, blank lines are ignored.
///
/// # Examples
///
/// ```
/// use semparse::mr::read_constants;
///
/// let constants = read_constants(
///     "// cities\n\
///      boston:e   // the one in massachusetts\n\
///      \n\
///      next_to:<e,<e,t>>\n",
/// )
/// .unwrap();
/// assert_eq!(constants.len(), 2);
/// assert_eq!(constants[1].to_string(), "next_to:<e,<e,t>>");
/// ```
pub fn read_constants(inp: &str) -> Result<Vec<Constant>, ParseError> {
    let stripped = inp
        .lines()
        .map(|line| {
            let line = line.trim();
            match line.find("//") {
                Some(i) => line[..i].trim_end(),
                None => line,
            }
        })
        .filter(|line| !line.is_empty())
        .join(" ");
    parse_sexps
        .parse(stripped.as_str())
        .map_err(|err| ParseError::Syntax(err.to_string()))?
        .into_iter()
        .map(|sexp| match sexp {
            Sexp::Atom(ref atom) => parse_constant(atom),
            Sexp::List(_) => Err(ParseError::Constant(sexp.to_string())),
        })
        .collect()
}

/// Like [`read_constants`], reading from a file.
///
/// [`read_constants`]: fn.read_constants.html
pub fn read_constants_file<P: AsRef<Path>>(path: P) -> Result<Vec<Constant>, ReadError> {
    let contents = fs::read_to_string(path)?;
    Ok(read_constants(&contents)?)
}

pub fn parse_term(inp: &str) -> Result<Term, ParseError> {
    let sexps = parse_sexps
        .parse(inp)
        .map_err(|err| ParseError::Syntax(err.to_string()))?;
    match sexps.as_slice() {
        [sexp] => sexp.to_term(&mut Scope::default()),
        _ => Err(ParseError::Syntax(format!(
            "expected exactly one expression, found {}",
            sexps.len()
        ))),
    }
}

pub fn parse_constant(atom: &str) -> Result<Constant, ParseError> {
    match atom.rsplit_once(':') {
        Some((name, tp)) if !name.is_empty() && !name.starts_with('$') => {
            Ok(Constant::new(name, parse_type_tag(tp)?))
        }
        _ => Err(ParseError::Constant(String::from(atom))),
    }
}

pub fn parse_type_tag(inp: &str) -> Result<Type, ParseError> {
    parse_type
        .parse(inp)
        .map_err(|_| ParseError::Type(String::from(inp)))
}

#[derive(Debug, Clone, PartialEq)]
enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}
impl Sexp {
    fn to_term(&self, scope: &mut Scope) -> Result<Term, ParseError> {
        match self {
            Sexp::Atom(atom) if atom.starts_with('$') => scope.reference(atom),
            Sexp::Atom(atom) => parse_constant(atom).map(Term::Constant),
            Sexp::List(items) => match items.as_slice() {
                [Sexp::Atom(head), rest @ ..] if head == "lambda" => {
                    let (decl, body) = match rest {
                        [Sexp::Atom(decl), body] => (decl, body),
                        _ => return Err(ParseError::Lambda(self.to_string())),
                    };
                    let (name, tp) = match decl.split_once(':') {
                        Some((name, tp)) if name.starts_with('$') => (name, parse_type_tag(tp)?),
                        _ => return Err(ParseError::Lambda(self.to_string())),
                    };
                    let argument = Variable::new(tp);
                    scope.push(name, argument.clone());
                    let body = body.to_term(scope);
                    scope.pop(name);
                    Ok(Term::lambda(argument, body?))
                }
                [predicate, arguments @ ..] if !arguments.is_empty() => {
                    let predicate = predicate.to_term(scope)?;
                    let arguments = arguments
                        .iter()
                        .map(|arg| arg.to_term(scope))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Term::literal(predicate, arguments))
                }
                _ => Err(ParseError::EmptyLiteral(self.to_string())),
            },
        }
    }
}
impl fmt::Display for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Sexp::Atom(atom) => write!(f, "{}", atom),
            Sexp::List(items) => write!(f, "({})", items.iter().join(" ")),
        }
    }
}

/// Variable names in scope while reading a term. Lambda binders shadow; a typed reference to an
/// unknown name introduces a free variable shared by later references.
#[derive(Default)]
struct Scope {
    bound: HashMap<String, Vec<Variable>>,
    free: HashMap<String, Variable>,
}
impl Scope {
    fn push(&mut self, name: &str, var: Variable) {
        self.bound.entry(String::from(name)).or_default().push(var)
    }
    fn pop(&mut self, name: &str) {
        if let Some(vars) = self.bound.get_mut(name) {
            vars.pop();
        }
    }
    fn reference(&mut self, atom: &str) -> Result<Term, ParseError> {
        let (name, tp) = match atom.split_once(':') {
            Some((name, tp)) => (name, Some(tp)),
            None => (atom, None),
        };
        if let Some(var) = self.bound.get(name).and_then(|vars| vars.last()) {
            return Ok(Term::Variable(var.clone()));
        }
        if let Some(var) = self.free.get(name) {
            return Ok(Term::Variable(var.clone()));
        }
        match tp {
            Some(tp) => {
                let var = Variable::new(parse_type_tag(tp)?);
                self.free.insert(String::from(name), var.clone());
                Ok(Term::Variable(var))
            }
            None => Err(ParseError::UnboundVariable(String::from(atom))),
        }
    }
}

fn atom_char(c: char) -> bool {
    !(c.is_whitespace() || c == '(' || c == ')')
}

fn type_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '[' || c == ']'
}

fn parse_atom(input: &mut &str) -> PResult<Sexp> {
    let atom = take_while(1.., atom_char).parse_next(input)?;
    Ok(Sexp::Atom(atom.to_owned()))
}

fn parse_list(input: &mut &str) -> PResult<Sexp> {
    let items: Vec<Sexp> =
        delimited("(", repeat(0.., parse_sexp), (multispace0, ")")).parse_next(input)?;
    Ok(Sexp::List(items))
}

fn parse_sexp(input: &mut &str) -> PResult<Sexp> {
    delimited(multispace0, alt((parse_list, parse_atom)), multispace0).parse_next(input)
}

fn parse_sexps(input: &mut &str) -> PResult<Vec<Sexp>> {
    preceded(multispace0, repeat(0.., parse_sexp)).parse_next(input)
}

fn parse_atomic_type(input: &mut &str) -> PResult<Type> {
    let name = take_while(1.., type_name_char).parse_next(input)?;
    Ok(atomic_type(name))
}

fn parse_function_type(input: &mut &str) -> PResult<Type> {
    let (arg, ret) =
        delimited("<", separated_pair(parse_type, ",", parse_type), ">").parse_next(input)?;
    Ok(Type::arrow(arg, ret))
}

fn parse_type(input: &mut &str) -> PResult<Type> {
    alt((parse_function_type, parse_atomic_type)).parse_next(input)
}
