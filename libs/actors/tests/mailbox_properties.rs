//! Classification properties for arbitrary mailbox terms

use messaging_actors::messages::{GEN_CALL_TAG, GEN_CAST_TAG};
use messaging_actors::{MailboxEvent, Term};
use proptest::prelude::*;

fn term_strategy() -> impl Strategy<Value = Term> {
    let leaf = prop_oneof![
        "[a-z][a-z0-9_]{0,8}".prop_map(Term::atom),
        any::<i64>().prop_map(Term::Integer),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Term::Binary),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Term::Tuple),
            prop::collection::vec(inner, 0..4).prop_map(Term::List),
        ]
    })
}

proptest! {
    #[test]
    fn untagged_terms_are_info(term in term_strategy()) {
        prop_assert_eq!(MailboxEvent::classify(term.clone()), MailboxEvent::Info(term));
    }

    #[test]
    fn casts_carry_any_payload(payload in term_strategy()) {
        let term = Term::tuple(vec![Term::atom(GEN_CAST_TAG), payload.clone()]);
        prop_assert_eq!(MailboxEvent::classify(term), MailboxEvent::Cast(payload));
    }

    #[test]
    fn calls_without_a_valid_from_are_info(from in term_strategy(), payload in term_strategy()) {
        let term = Term::tuple(vec![Term::atom(GEN_CALL_TAG), from, payload]);
        prop_assert_eq!(MailboxEvent::classify(term.clone()), MailboxEvent::Info(term));
    }
}
