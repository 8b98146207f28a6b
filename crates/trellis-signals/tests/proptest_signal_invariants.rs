//! Property-based invariant tests for `Signal` notification and dedup.
//!
//! These must hold for **any** sequence of writes:
//!
//! 1. Notification count equals the number of value transitions (equal
//!    writes are invisible).
//! 2. Subscribers observe exactly the deduplicated write sequence, in write
//!    order.
//! 3. `version()` equals the transition count.
//! 4. After `dispose()`, no write is observed.
//! 5. Every subscriber observes the same sequence (delivery is uniform).

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use trellis_signals::Signal;

/// Writes drawn from a small domain so consecutive duplicates are common.
fn writes() -> impl Strategy<Value = Vec<i8>> {
    proptest::collection::vec(-3i8..=3, 0..60)
}

/// The sequence a subscriber should observe: the writes with consecutive
/// duplicates (relative to the running value) removed.
fn transitions(initial: i8, writes: &[i8]) -> Vec<i8> {
    let mut current = initial;
    let mut out = Vec::new();
    for &w in writes {
        if w != current {
            current = w;
            out.push(w);
        }
    }
    out
}

proptest! {
    #[test]
    fn notifications_match_value_transitions(initial in -3i8..=3, writes in writes()) {
        let signal = Signal::new(initial);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = signal.subscribe(move |v: &i8| sink.borrow_mut().push(*v));

        for &w in &writes {
            signal.set(w);
        }

        let expected = transitions(initial, &writes);
        prop_assert_eq!(&*seen.borrow(), &expected);
        prop_assert_eq!(signal.version(), expected.len() as u64);
    }

    #[test]
    fn all_subscribers_observe_the_same_sequence(initial in -3i8..=3, writes in writes()) {
        let signal = Signal::new(initial);
        let first = Rc::new(RefCell::new(Vec::new()));
        let second = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&first);
        let _a = signal.subscribe(move |v: &i8| sink.borrow_mut().push(*v));
        let sink = Rc::clone(&second);
        let _b = signal.subscribe(move |v: &i8| sink.borrow_mut().push(*v));

        for &w in &writes {
            signal.set(w);
        }

        prop_assert_eq!(&*first.borrow(), &*second.borrow());
    }

    #[test]
    fn nothing_is_delivered_after_dispose(
        initial in -3i8..=3,
        before in writes(),
        after in writes(),
    ) {
        let signal = Signal::new(initial);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = signal.subscribe(move |v: &i8| sink.borrow_mut().push(*v));

        for &w in &before {
            signal.set(w);
        }
        let version_at_dispose = signal.version();
        signal.dispose();
        for &w in &after {
            signal.set(w);
        }

        prop_assert_eq!(&*seen.borrow(), &transitions(initial, &before));
        prop_assert_eq!(signal.version(), version_at_dispose);
    }
}
