//! Property-based tests for the conversation state machine

use super::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Submit(String),
    Chunk(String),
    Complete,
    Cancel,
    Attach(String),
    Detach,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        "[a-z ]{0,12}".prop_map(Op::Submit),
        "[a-zA-Z0-9 ]{0,8}".prop_map(Op::Chunk),
        Just(Op::Complete),
        Just(Op::Cancel),
        "[a-z ]{0,20}".prop_map(Op::Attach),
        Just(Op::Detach),
    ]
}

fn apply(conv: &mut Conversation, op: &Op) {
    match op {
        Op::Submit(text) => {
            let _ = conv.submit(text);
        }
        Op::Chunk(chunk) => {
            conv.append_chunk(chunk);
        }
        Op::Complete => conv.finish(&StreamOutcome::Completed),
        Op::Cancel => conv.finish(&StreamOutcome::Cancelled),
        Op::Attach(text) => {
            let _ = conv.attach_document("doc.pdf", text.as_str());
        }
        Op::Detach => {
            conv.detach_document();
        }
    }
}

proptest! {
    #[test]
    fn chunks_concatenate_in_order(chunks in prop::collection::vec("[a-zA-Z0-9 .,]{0,10}", 0..20)) {
        let mut conv = Conversation::new();
        conv.submit("question").unwrap();
        for chunk in &chunks {
            prop_assert!(conv.append_chunk(chunk));
        }
        conv.finish(&StreamOutcome::Completed);

        let expected = chunks.concat();
        let last = conv.messages().last().unwrap();
        if expected.is_empty() {
            prop_assert_eq!(last.role, Role::User);
        } else {
            prop_assert_eq!(last.role, Role::Assistant);
            prop_assert_eq!(&last.content, &expected);
        }
        prop_assert!(!conv.is_streaming());
    }

    #[test]
    fn whitespace_submit_is_noop(text in "[ \t\n]{0,10}", ops in prop::collection::vec(arb_op(), 0..10)) {
        let mut conv = Conversation::new();
        for op in &ops {
            apply(&mut conv, op);
        }
        let before: Vec<_> = conv.messages().iter().map(|m| m.id.clone()).collect();
        let state = conv.state();

        prop_assert_eq!(conv.submit(&text).unwrap_err(), ConversationError::EmptyMessage);

        let after: Vec<_> = conv.messages().iter().map(|m| m.id.clone()).collect();
        prop_assert_eq!(before, after);
        prop_assert_eq!(conv.state(), state);
    }

    #[test]
    fn streaming_iff_reply_in_flight(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut conv = Conversation::new();
        for op in &ops {
            apply(&mut conv, op);
            prop_assert_eq!(conv.is_streaming(), conv.in_flight().is_some());
            if let Some(reply) = conv.in_flight() {
                prop_assert_eq!(reply.role, Role::Assistant);
            }
        }
    }

    #[test]
    fn log_only_grows_except_empty_replies(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut conv = Conversation::new();
        for op in &ops {
            let before: Vec<Message> = conv.messages().to_vec();
            let placeholder = conv
                .in_flight()
                .filter(|m| m.content.is_empty())
                .map(|m| m.id.clone());
            apply(&mut conv, op);

            for old in &before {
                match conv.messages().iter().find(|m| m.id == old.id) {
                    Some(now) => {
                        prop_assert!(now.content.starts_with(&old.content));
                    }
                    None => {
                        prop_assert_eq!(Some(&old.id), placeholder.as_ref());
                    }
                }
            }
        }
    }
}
