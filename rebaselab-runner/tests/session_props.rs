//! Property tests for the tracked ticker list.

use proptest::prelude::*;
use rebaselab_runner::{AddOutcome, Session};

fn arb_entry() -> impl Strategy<Value = String> {
    "[a-zA-Z]{1,5}"
}

fn arb_input() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_entry(), 0..6).prop_map(|entries| entries.join(", "))
}

proptest! {
    /// The list never holds the same symbol twice and is always upper-case.
    #[test]
    fn list_stays_unique_and_uppercase(inputs in prop::collection::vec(arb_input(), 0..10)) {
        let mut session = Session::new();
        for input in &inputs {
            session.add(input);
        }
        let tickers = session.tickers();
        for (i, t) in tickers.iter().enumerate() {
            prop_assert_eq!(t, &t.to_uppercase());
            prop_assert!(!tickers[i + 1..].contains(t));
        }
    }

    /// Re-adding anything already tracked never grows the list.
    #[test]
    fn re_adding_is_a_no_op(input in arb_input()) {
        let mut session = Session::new();
        session.add(&input);
        let before = session.tickers().to_vec();

        let outcome = session.add(&input.to_lowercase());
        prop_assert_eq!(session.tickers(), before.as_slice());
        prop_assert!(matches!(outcome, AddOutcome::Duplicate(_) | AddOutcome::Ignored));
    }
}
