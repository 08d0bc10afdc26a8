//! Snapshot sequencing and observer delivery tests.

use super::{record, wait_until, Harness};
use crate::{AuthEvent, AuthEventKind, AuthMachine};
use parking_lot::Mutex;
use std::sync::Arc;

#[tokio::test]
async fn sequences_are_contiguous_and_increasing() {
    let harness = Harness::new();
    let seen = record(&harness.machine);
    harness.start().await;

    harness.machine.send(AuthEvent::SignInAnonymous);
    wait_until(&harness.machine, |s| !s.is_loading()).await;
    harness.machine.send(AuthEvent::SignOut { all: false });
    wait_until(&harness.machine, |s| !s.is_loading()).await;

    let sequences: Vec<u64> = seen.lock().iter().map(|s| s.sequence).collect();
    let expected: Vec<u64> = (1..=sequences.len() as u64).collect();
    assert_eq!(sequences, expected);
    assert_eq!(
        harness.machine.snapshot().sequence,
        *sequences.last().unwrap()
    );
}

#[tokio::test]
async fn rejected_event_emits_nothing() {
    let harness = Harness::new();
    harness.start().await;
    let seen = record(&harness.machine);

    let outcome = harness.machine.send(AuthEvent::Deanonymized);
    assert!(!outcome.changed);
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn reentrant_send_is_delivered_in_order() {
    let harness = Harness::new();
    let seen = record(&harness.machine);

    // Sign in anonymously as soon as the machine reports no session
    let machine: AuthMachine = harness.machine.clone();
    let _subscription = harness.machine.subscribe(move |snapshot| {
        if snapshot.event == AuthEventKind::SessionUnavailable {
            machine.send(AuthEvent::SignInAnonymous);
        }
    });

    harness.machine.start().unwrap();
    wait_until(&harness.machine, |s| s.matches("authentication.signedIn")).await;

    let events: Vec<AuthEventKind> = seen.lock().iter().map(|s| s.event).collect();
    assert_eq!(
        events,
        vec![
            AuthEventKind::SessionUnavailable,
            AuthEventKind::SignInAnonymous,
            AuthEventKind::SignedIn
        ]
    );
}

#[tokio::test]
async fn every_observer_sees_the_same_order() {
    let harness = Harness::new();
    let first = record(&harness.machine);
    let second = record(&harness.machine);

    harness.start().await;
    harness.machine.send(AuthEvent::SignInAnonymous);
    wait_until(&harness.machine, |s| !s.is_loading()).await;

    let first: Vec<u64> = first.lock().iter().map(|s| s.sequence).collect();
    let second: Vec<u64> = second.lock().iter().map(|s| s.sequence).collect();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let harness = Harness::new();
    let count = Arc::new(Mutex::new(0usize));
    let counter = count.clone();
    let subscription = harness.machine.subscribe(move |_| *counter.lock() += 1);

    harness.start().await;
    let delivered = *count.lock();
    assert_eq!(delivered, 1);

    assert!(subscription.unsubscribe());
    assert!(!subscription.unsubscribe());

    harness.machine.send(AuthEvent::SignInAnonymous);
    wait_until(&harness.machine, |s| !s.is_loading()).await;
    assert_eq!(*count.lock(), delivered);
}

#[tokio::test]
async fn dropping_subscription_keeps_observer() {
    let harness = Harness::new();
    let count = Arc::new(Mutex::new(0usize));
    let counter = count.clone();
    drop(harness.machine.subscribe(move |_| *counter.lock() += 1));

    harness.start().await;
    assert_eq!(*count.lock(), 1);
    assert_eq!(harness.machine.observer_count(), 1);
}
