//! # Term Model
//!
//! Decoded, structurally typed message values exchanged between nodes.
//!
//! `Term` is a closed sum type: every payload a peer can send is one of its
//! variants, and consumers match on it exhaustively instead of probing shapes
//! at runtime. The accessor helpers return `Option` so that "wrong shape" is
//! an ordinary value rather than a failure.
//!
//! ```rust
//! use types::{Atom, Pid, Term};
//!
//! let pid = Pid::new(Atom::from("peer@localhost"), 7, 0, 1);
//! let ping = Term::tuple(vec![Term::atom("ping"), Term::Pid(pid.clone())]);
//!
//! let rest = ping.tagged("ping").unwrap();
//! assert_eq!(rest[0].as_pid(), Some(&pid));
//! assert_eq!(ping.to_string(), "{ping,<peer@localhost.7.0>}");
//! ```
//!
//! # Nesting limit
//!
//! Deserialization refuses tuples and lists nested deeper than
//! [`MAX_TERM_DEPTH`], so a hostile peer cannot exhaust the decoding stack.
//! Every term that decodes successfully can also be displayed, compared and
//! dropped without deep recursion.

use crate::identifiers::{Atom, Pid, Reference};
use serde::de::{self, DeserializeSeed, EnumAccess, SeqAccess, VariantAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Deepest tuple/list nesting accepted from the wire
pub const MAX_TERM_DEPTH: usize = 256;

/// Error message when a decoded term exceeds [`MAX_TERM_DEPTH`]
pub const TERM_TOO_DEEP: &str = "term nesting too deep";

/// A decoded message value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Term {
    Atom(Atom),
    Integer(i64),
    Float(f64),
    Binary(Vec<u8>),
    Pid(Pid),
    Reference(Reference),
    Tuple(Vec<Term>),
    List(Vec<Term>),
}

impl Term {
    pub fn atom(name: impl Into<Atom>) -> Self {
        Term::Atom(name.into())
    }

    pub fn tuple(elements: Vec<Term>) -> Self {
        Term::Tuple(elements)
    }

    pub fn list(elements: Vec<Term>) -> Self {
        Term::List(elements)
    }

    pub fn nil() -> Self {
        Term::List(Vec::new())
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Term::Atom(atom) => Some(atom),
            _ => None,
        }
    }

    pub fn as_pid(&self) -> Option<&Pid> {
        match self {
            Term::Pid(pid) => Some(pid),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Term::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Term]> {
        match self {
            Term::Tuple(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Term]> {
        match self {
            Term::List(elements) => Some(elements),
            _ => None,
        }
    }

    /// True when the term is exactly the atom `name`
    pub fn is_atom(&self, name: &str) -> bool {
        matches!(self, Term::Atom(atom) if atom == name)
    }

    /// Elements after the tag of a `{tag, ...}` tuple
    ///
    /// Returns `None` unless the term is a non-empty tuple whose first element
    /// is the atom `tag`.
    pub fn tagged(&self, tag: &str) -> Option<&[Term]> {
        match self.as_tuple()? {
            [head, rest @ ..] if head.is_atom(tag) => Some(rest),
            _ => None,
        }
    }

    /// Take ownership of the elements of a tuple
    pub fn into_tuple(self) -> Result<Vec<Term>, Term> {
        match self {
            Term::Tuple(elements) => Ok(elements),
            other => Err(other),
        }
    }
}

const VARIANTS: &[&str] = &[
    "Atom",
    "Integer",
    "Float",
    "Binary",
    "Pid",
    "Reference",
    "Tuple",
    "List",
];

#[derive(Deserialize)]
#[serde(variant_identifier)]
enum TermTag {
    Atom,
    Integer,
    Float,
    Binary,
    Pid,
    Reference,
    Tuple,
    List,
}

/// Decodes one term with at most `remaining` levels of tuple/list nesting
struct TermSeed {
    remaining: usize,
}

impl<'de> DeserializeSeed<'de> for TermSeed {
    type Value = Term;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Term, D::Error> {
        deserializer.deserialize_enum("Term", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for TermSeed {
    type Value = Term;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a term")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Term, A::Error> {
        let (tag, variant) = data.variant::<TermTag>()?;
        match tag {
            TermTag::Atom => variant.newtype_variant().map(Term::Atom),
            TermTag::Integer => variant.newtype_variant().map(Term::Integer),
            TermTag::Float => variant.newtype_variant().map(Term::Float),
            TermTag::Binary => variant.newtype_variant().map(Term::Binary),
            TermTag::Pid => variant.newtype_variant().map(Term::Pid),
            TermTag::Reference => variant.newtype_variant().map(Term::Reference),
            TermTag::Tuple => variant
                .newtype_variant_seed(ElementsSeed::nested::<A::Error>(self.remaining)?)
                .map(Term::Tuple),
            TermTag::List => variant
                .newtype_variant_seed(ElementsSeed::nested::<A::Error>(self.remaining)?)
                .map(Term::List),
        }
    }
}

/// Elements of a tuple or list, one level below their container
struct ElementsSeed {
    remaining: usize,
}

impl ElementsSeed {
    fn nested<E: de::Error>(remaining: usize) -> Result<Self, E> {
        match remaining.checked_sub(1) {
            Some(remaining) => Ok(Self { remaining }),
            None => Err(E::custom(TERM_TOO_DEEP)),
        }
    }
}

impl<'de> DeserializeSeed<'de> for ElementsSeed {
    type Value = Vec<Term>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Vec<Term>, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ElementsSeed {
    type Value = Vec<Term>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence of terms")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<Term>, A::Error> {
        let mut elements = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(element) = seq.next_element_seed(TermSeed {
            remaining: self.remaining,
        })? {
            elements.push(element);
        }
        Ok(elements)
    }
}

impl<'de> Deserialize<'de> for Term {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        TermSeed {
            remaining: MAX_TERM_DEPTH,
        }
        .deserialize(deserializer)
    }
}

impl From<Atom> for Term {
    fn from(atom: Atom) -> Self {
        Term::Atom(atom)
    }
}

impl From<Pid> for Term {
    fn from(pid: Pid) -> Self {
        Term::Pid(pid)
    }
}

impl From<Reference> for Term {
    fn from(reference: Reference) -> Self {
        Term::Reference(reference)
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Term::Integer(value)
    }
}

impl From<usize> for Term {
    fn from(value: usize) -> Self {
        Term::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<Vec<Term>> for Term {
    fn from(elements: Vec<Term>) -> Self {
        Term::List(elements)
    }
}

fn write_sequence(f: &mut fmt::Formatter<'_>, elements: &[Term]) -> fmt::Result {
    for (index, element) in elements.iter().enumerate() {
        if index > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", element)?;
    }
    Ok(())
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(atom) => write!(f, "{}", atom),
            Term::Integer(value) => write!(f, "{}", value),
            Term::Float(value) => write!(f, "{:?}", value),
            Term::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => write!(f, "<<{:?}>>", text),
                Err(_) => {
                    f.write_str("<<")?;
                    for (index, byte) in bytes.iter().enumerate() {
                        if index > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{}", byte)?;
                    }
                    f.write_str(">>")
                }
            },
            Term::Pid(pid) => write!(f, "{}", pid),
            Term::Reference(reference) => write!(f, "{}", reference),
            Term::Tuple(elements) => {
                f.write_str("{")?;
                write_sequence(f, elements)?;
                f.write_str("}")
            }
            Term::List(elements) => {
                f.write_str("[")?;
                write_sequence(f, elements)?;
                f.write_str("]")
            }
        }
    }
}
