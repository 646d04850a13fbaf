//! Merge laws and convergence over random operation histories.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::json;
use uncorded_common::SetState;

use super::{ExpiringSet, ManualClock, ReplicatedSet, Set};

const REPLICAS: usize = 3;
const TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy)]
enum Op {
    Add { replica: usize, value: u8 },
    Remove { replica: usize, pick: usize },
    RemoveUnknown { replica: usize },
    Sync { from: usize, to: usize },
    Advance(u64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..REPLICAS, any::<u8>()).prop_map(|(replica, value)| Op::Add { replica, value }),
        2 => (0..REPLICAS, any::<usize>()).prop_map(|(replica, pick)| Op::Remove { replica, pick }),
        1 => (0..REPLICAS).prop_map(|replica| Op::RemoveUnknown { replica }),
        2 => (0..REPLICAS, 0..REPLICAS).prop_map(|(from, to)| Op::Sync { from, to }),
        1 => (1..1_000u64).prop_map(Op::Advance),
    ]
}

/// Histories stay well inside `TTL`, so nothing expires while replaying
fn arb_history() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(arb_op(), 0..48)
}

fn replay<S: ReplicatedSet>(ops: &[Op], clock: &ManualClock, make: &impl Fn() -> S) -> Vec<S> {
    let mut replicas: Vec<S> = (0..REPLICAS).map(|_| make()).collect();

    for op in ops {
        match *op {
            Op::Add { replica, value } => {
                replicas[replica].add(&json!({ "value": value }));
            }
            Op::Remove { replica, pick } => {
                let mut ids: Vec<String> = replicas[replica].state().adds.keys().cloned().collect();
                if ids.is_empty() {
                    continue;
                }
                ids.sort();
                let id = ids[pick % ids.len()].clone();
                replicas[replica].remove(&id);
            }
            Op::RemoveUnknown { replica } => {
                replicas[replica].remove("never-added");
            }
            Op::Sync { from, to } => {
                let state = replicas[from].state().clone();
                replicas[to].merge(state);
            }
            Op::Advance(ms) => clock.advance(Duration::from_millis(ms)),
        }
    }
    replicas
}

fn join<S: ReplicatedSet>(make: &impl Fn() -> S, parts: &[&SetState]) -> SetState {
    let mut set = make();
    for part in parts {
        set.merge((*part).clone());
    }
    set.state().clone()
}

fn check_laws<S: ReplicatedSet>(
    make: &impl Fn() -> S,
    replicas: &[S],
) -> Result<(), TestCaseError> {
    let [a, b, c] = [0, 1, 2].map(|i| replicas[i].state());

    prop_assert_eq!(join(make, &[a, b]), join(make, &[b, a]), "merge must be commutative");

    let left = join(make, &[&join(make, &[a, b]), c]);
    let right = join(make, &[a, &join(make, &[b, c])]);
    prop_assert_eq!(left, right, "merge must be associative");

    prop_assert_eq!(&join(make, &[a, a]), a, "merge must be idempotent");
    Ok(())
}

/// Pairwise exchange between the first two replicas, then a full round
fn exchange<S: ReplicatedSet>(replicas: &mut [S]) -> Result<(), TestCaseError> {
    let first = replicas[0].state().clone();
    let second = replicas[1].state().clone();
    replicas[0].merge(second);
    replicas[1].merge(first);
    prop_assert_eq!(replicas[0].state().live_ids(), replicas[1].state().live_ids());

    for i in 1..replicas.len() {
        let state = replicas[i].state().clone();
        replicas[0].merge(state);
    }
    let merged = replicas[0].state().clone();
    for replica in replicas.iter_mut().skip(1) {
        replica.merge(merged.clone());
    }

    let expected = replicas[0].state().live_ids();
    for replica in replicas.iter() {
        prop_assert_eq!(&replica.state().live_ids(), &expected);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_set_merge_laws(ops in arb_history()) {
        let clock = ManualClock::new(0);
        let replicas = replay(&ops, &clock, &Set::new);
        check_laws(&Set::new, &replicas)?;
    }

    #[test]
    fn prop_set_replicas_converge(ops in arb_history()) {
        let clock = ManualClock::new(0);
        let mut replicas = replay(&ops, &clock, &Set::new);
        exchange(&mut replicas)?;

        let state = replicas[0].state().clone();
        for replica in &replicas {
            prop_assert_eq!(replica.state(), &state);
        }
    }

    #[test]
    fn prop_expiring_set_merge_laws(ops in arb_history()) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let make = || ExpiringSet::with_clock(TTL, clock.clone());
        let replicas = replay(&ops, &clock, &make);
        check_laws(&make, &replicas)?;
    }

    #[test]
    fn prop_expiring_set_replicas_converge_then_expire(ops in arb_history()) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let make = || ExpiringSet::with_clock(TTL, clock.clone());
        let mut replicas = replay(&ops, &clock, &make);
        exchange(&mut replicas)?;

        clock.advance(TTL);
        for replica in replicas.iter_mut() {
            replica.gc();
            prop_assert!(replica.state().adds.is_empty());
            prop_assert!(replica.state().live_ids().is_empty());
        }
    }
}
