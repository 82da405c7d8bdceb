//! Frame Codec Property Tests
//!
//! Properties the codec must hold for any input a peer could put on the wire.

use network::protocol::{decode_frame, encode_frame};
use network::{Destination, Frame, WireFormat};
use proptest::prelude::*;
use types::{Atom, Pid, Term, MAX_TERM_DEPTH};

fn atom_strategy() -> impl Strategy<Value = Atom> {
    "[a-z][a-z0-9_]{0,12}".prop_map(Atom::from)
}

fn pid_strategy() -> impl Strategy<Value = Pid> {
    (atom_strategy(), any::<u32>(), any::<u32>(), 0u32..4)
        .prop_map(|(node, id, serial, creation)| Pid::new(node, id, serial, creation))
}

fn term_strategy() -> impl Strategy<Value = Term> {
    let leaf = prop_oneof![
        atom_strategy().prop_map(Term::Atom),
        any::<i64>().prop_map(Term::Integer),
        (-1.0e9f64..1.0e9).prop_map(Term::Float),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Term::Binary),
        pid_strategy().prop_map(Term::Pid),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Term::Tuple),
            prop::collection::vec(inner, 0..6).prop_map(Term::List),
        ]
    })
}

proptest! {
    #[test]
    fn decoding_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_frame(&bytes);
    }

    #[test]
    fn send_frames_preserve_their_term(message in term_strategy(), to in atom_strategy()) {
        let frame = Frame::Send { to: Destination::Name(to), message };
        let body = encode_frame(&frame).unwrap();

        prop_assert_eq!(body[0], WireFormat::VERSION);
        prop_assert!(body.len() <= WireFormat::MAX_FRAME_SIZE);
        prop_assert_eq!(decode_frame(&body).unwrap(), frame);
    }
}

/// `Send` frame to the name `go_srv` whose message is `depth` nested
/// one-element tuples around `0`, written byte by byte so no deep `Term` is
/// ever built on the sending side
fn nested_send_body(depth: usize) -> Vec<u8> {
    let mut body = vec![WireFormat::VERSION];
    body.extend_from_slice(&3u32.to_le_bytes()); // Frame::Send
    body.extend_from_slice(&1u32.to_le_bytes()); // Destination::Name
    body.extend_from_slice(&6u64.to_le_bytes());
    body.extend_from_slice(b"go_srv");
    for _ in 0..depth {
        body.extend_from_slice(&6u32.to_le_bytes()); // Term::Tuple
        body.extend_from_slice(&1u64.to_le_bytes());
    }
    body.extend_from_slice(&1u32.to_le_bytes()); // Term::Integer
    body.extend_from_slice(&0i64.to_le_bytes());
    body
}

#[test]
fn deeply_nested_terms_are_rejected_without_overflow() {
    let body = nested_send_body(200_000);
    assert!(body.len() <= WireFormat::MAX_FRAME_SIZE);

    let err = decode_frame(&body).unwrap_err();
    assert_eq!(err.category(), "protocol");
    assert!(err.to_string().contains("term nesting too deep"));
}

#[test]
fn nesting_up_to_the_limit_is_accepted() {
    match decode_frame(&nested_send_body(MAX_TERM_DEPTH)).unwrap() {
        Frame::Send { to, message } => {
            assert_eq!(to, Destination::Name(Atom::from("go_srv")));
            let mut depth = 0;
            let mut term = &message;
            while let Some([inner]) = term.as_tuple() {
                depth += 1;
                term = inner;
            }
            assert_eq!(depth, MAX_TERM_DEPTH);
            assert_eq!(term, &Term::Integer(0));
        }
        other => panic!("Expected send frame, got {:?}", other),
    }

    let err = decode_frame(&nested_send_body(MAX_TERM_DEPTH + 1)).unwrap_err();
    assert_eq!(err.category(), "protocol");
}
