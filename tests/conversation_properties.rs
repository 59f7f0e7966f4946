//! Property tests for the send cycle

use proptest::prelude::*;
use std::time::Instant;

use docsite_assist::config::AssistConfig;
use docsite_assist::conversation::{HistoryEntry, Sender};
use docsite_assist::dispatch::{ChatReply, DispatchError};
use docsite_assist::panel::MemoryPreferenceStore;
use docsite_assist::Widget;

fn widget() -> Widget {
    Widget::new(
        &AssistConfig::default(),
        Box::new(MemoryPreferenceStore::new()),
        None,
    )
}

fn question() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ?]{0,40}[a-zA-Z0-9?]"
}

proptest! {
    #[test]
    fn blank_input_changes_nothing(blank in "[ \t\n\r]{0,12}") {
        let mut w = widget();
        prop_assert!(w.begin_send(&blank).is_none());
        prop_assert!(w.conversation().is_empty());
        prop_assert!(!w.is_loading());
        prop_assert!(w.take_effects().is_empty());
    }

    #[test]
    fn sends_alternate_and_carry_prior_turns(
        turns in prop::collection::vec((question(), any::<bool>()), 1..8)
    ) {
        let mut w = widget();

        for (k, (text, fails)) in turns.iter().enumerate() {
            let pending = w.begin_send(text).unwrap();

            let expected: Vec<HistoryEntry> = w.conversation().messages()[..2 * k]
                .iter()
                .map(|m| HistoryEntry {
                    role: m.sender().role().to_string(),
                    content: m.text().to_string(),
                })
                .collect();
            prop_assert_eq!(pending.request.history(), expected.as_slice());
            prop_assert_eq!(pending.request.text(), text.trim());

            let result = if *fails {
                Err(DispatchError::Transport("connection refused".into()))
            } else {
                Ok(ChatReply::new(format!("reply {}", k), vec![]))
            };
            prop_assert!(w.complete_send(pending.ticket, result, Instant::now()));
        }

        let messages = w.conversation().messages();
        prop_assert_eq!(messages.len(), 2 * turns.len());
        for (i, message) in messages.iter().enumerate() {
            let expected = if i % 2 == 0 { Sender::User } else { Sender::Assistant };
            prop_assert_eq!(message.sender(), expected);
        }
        for pair in messages.windows(2) {
            prop_assert!(pair[0].id() < pair[1].id());
        }
        prop_assert!(!w.is_loading());
    }
}
