//! Stream-level invariants for the lexer

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rill_alloc::HeapAlloc;
use rill_common::SourceBuffer;
use rill_lexer::{lex, TokenIdx, TokenKind};

#[test]
fn offsets_are_nondecreasing_and_in_bounds() {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new(
        "<test>",
        "fun main(a: int) int {\n    b := a + 1.5\n    return b\n}\nmain(41)\n",
    );
    let stream = lex(&source, &heap).expect("lexes");
    let mut previous = 0;
    for index in 0..stream.len() as TokenIdx {
        let offset = stream.offset(index);
        assert!(offset >= previous, "offsets must be nondecreasing");
        assert!(offset as usize <= source.len(), "offset {offset} outside the buffer");
        previous = offset;
    }
    assert_eq!(stream.kind(stream.len() as TokenIdx - 1), TokenKind::Eof);
}

#[test]
fn payload_tokens_resolve_to_their_lexeme() {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new("<test>", "count := count + 12");
    let stream = lex(&source, &heap).expect("lexes");
    assert_eq!(stream.text(0), "count");
    assert_eq!(stream.text(2), "count");
    assert_eq!(stream.text(4), "12");
    assert_eq!(stream.payload(0), stream.payload(2));
}

proptest! {
    /// Any identifier/number soup lexes, ends in Eof, and keeps offsets ordered.
    #[test]
    fn arbitrary_identifier_soup_lexes(words in proptest::collection::vec("[a-z_][a-z0-9_]{0,8}|[0-9]{1,6}", 1..40)) {
        let text = words.join(" ");
        let heap = HeapAlloc::new();
        let source = SourceBuffer::new("<prop>", text);
        let stream = lex(&source, &heap).unwrap();
        prop_assert_eq!(stream.kind(stream.len() as TokenIdx - 1), TokenKind::Eof);
        let offsets: Vec<u32> = (0..stream.len() as TokenIdx).map(|i| stream.offset(i)).collect();
        prop_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
    }

    /// Interning equal byte sequences yields equal offsets.
    #[test]
    fn interning_is_idempotent(word in "[a-z][a-z0-9_]{0,8}") {
        let text = format!("{word} other {word}");
        let heap = HeapAlloc::new();
        let source = SourceBuffer::new("<prop>", text);
        let stream = lex(&source, &heap).unwrap();
        prop_assert_eq!(stream.payload(0), stream.payload(2));
    }
}
