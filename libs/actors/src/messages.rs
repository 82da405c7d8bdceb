//! Mailbox Message Classification
//!
//! Everything that reaches a mailbox is a plain [`Term`]. The gen-server
//! convention wraps requests in tagged tuples:
//!
//! | shape                                   | event                |
//! |-----------------------------------------|----------------------|
//! | `{'$gen_cast', Msg}`                    | [`MailboxEvent::Cast`] |
//! | `{'$gen_call', {FromPid, Ref}, Msg}`    | [`MailboxEvent::Call`] |
//! | anything else                           | [`MailboxEvent::Info`] |
//!
//! A call is answered by sending `{Ref, Reply}` to `FromPid`.

use std::fmt;
use types::{Atom, Pid, Reference, Term};

pub const GEN_CAST_TAG: &str = "$gen_cast";
pub const GEN_CALL_TAG: &str = "$gen_call";

/// Item queued in a process mailbox
#[derive(Debug, Clone)]
pub(crate) enum Envelope {
    Message(Term),
    Exit(crate::system::ExitReason),
}

/// Correlation context of a request
///
/// Produced by the runtime for every call and handed to the handler only so
/// the runtime can route the reply; handlers have no reason to look inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrom {
    pid: Pid,
    tag: Reference,
}

impl CallFrom {
    pub fn new(pid: Pid, tag: Reference) -> Self {
        Self { pid, tag }
    }

    /// Caller mailbox the reply is routed to
    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    pub(crate) fn tag(&self) -> &Reference {
        &self.tag
    }

    pub fn from_term(term: &Term) -> Option<Self> {
        match term.as_tuple()? {
            [Term::Pid(pid), Term::Reference(tag)] => Some(Self::new(pid.clone(), tag.clone())),
            _ => None,
        }
    }

    pub fn to_term(&self) -> Term {
        Term::tuple(vec![
            Term::Pid(self.pid.clone()),
            Term::Reference(self.tag.clone()),
        ])
    }
}

impl fmt::Display for CallFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{}}}", self.pid, self.tag)
    }
}

/// Decoded form of an inbound mailbox term
#[derive(Debug, Clone, PartialEq)]
pub enum MailboxEvent {
    /// Fire-and-forget request
    Cast(Term),
    /// Request expecting exactly one reply
    Call { from: CallFrom, message: Term },
    /// Anything outside the gen-server convention
    Info(Term),
}

impl MailboxEvent {
    pub fn classify(term: Term) -> Self {
        match term.as_tuple() {
            Some([tag, message]) if tag.is_atom(GEN_CAST_TAG) => {
                return MailboxEvent::Cast(message.clone());
            }
            Some([tag, from, message]) if tag.is_atom(GEN_CALL_TAG) => {
                if let Some(from) = CallFrom::from_term(from) {
                    return MailboxEvent::Call {
                        from,
                        message: message.clone(),
                    };
                }
            }
            _ => {}
        }
        MailboxEvent::Info(term)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MailboxEvent::Cast(_) => "cast",
            MailboxEvent::Call { .. } => "call",
            MailboxEvent::Info(_) => "info",
        }
    }
}

/// `{'$gen_cast', Msg}`
pub fn cast_envelope(message: Term) -> Term {
    Term::tuple(vec![Term::Atom(Atom::from(GEN_CAST_TAG)), message])
}

/// `{'$gen_call', {FromPid, Ref}, Msg}`
pub fn call_envelope(from: &CallFrom, message: Term) -> Term {
    Term::tuple(vec![
        Term::Atom(Atom::from(GEN_CALL_TAG)),
        from.to_term(),
        message,
    ])
}

/// `{Ref, Reply}`
pub fn reply_envelope(from: &CallFrom, reply: Term) -> Term {
    Term::tuple(vec![Term::Reference(from.tag.clone()), reply])
}

/// Reply carried by `term` if it answers the call tagged `tag`
pub(crate) fn match_reply<'a>(term: &'a Term, tag: &Reference) -> Option<&'a Term> {
    match term.as_tuple()? {
        [Term::Reference(candidate), reply] if candidate == tag => Some(reply),
        _ => None,
    }
}
