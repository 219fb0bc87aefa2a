//! Property-based tests for the reactive graph
//!
//! These tests build random DAGs of computeds over a handful of signals,
//! apply random writes, and compare every value the graph reports against a
//! from-scratch evaluation of the same DAG.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use signals_core::reactive::{batch, computed, effect, signal, Computed, Signal};

// =============================================================================
// Helper Functions
// =============================================================================

/// One computed: the indices of the nodes it sums, and the modulus applied to
/// the sum. Small moduli make equal results (and thus short circuits) common.
#[derive(Debug, Clone)]
struct Derivation {
    inputs: Vec<usize>,
    modulus: i64,
}

#[derive(Debug, Clone)]
struct Shape {
    signals: usize,
    derivations: Vec<Derivation>,
}

fn shape() -> impl Strategy<Value = Shape> {
    (
        1usize..5,
        prop::collection::vec(
            (prop::collection::vec(any::<usize>(), 1..4), 2i64..6),
            1..12,
        ),
    )
        .prop_map(|(signals, raw)| Shape {
            signals,
            derivations: raw
                .into_iter()
                .enumerate()
                .map(|(k, (inputs, modulus))| Derivation {
                    // Only earlier nodes, so the graph is acyclic.
                    inputs: inputs.into_iter().map(|i| i % (signals + k)).collect(),
                    modulus,
                })
                .collect(),
        })
}

fn writes() -> impl Strategy<Value = Vec<(usize, i64)>> {
    prop::collection::vec((any::<usize>(), -5i64..5), 1..20)
}

/// Evaluate every node of `shape` from scratch.
fn oracle(shape: &Shape, values: &[i64]) -> Vec<i64> {
    let mut all = values.to_vec();
    for d in &shape.derivations {
        let sum: i64 = d.inputs.iter().map(|&i| all[i]).sum();
        all.push(sum.rem_euclid(d.modulus));
    }
    all
}

#[derive(Clone)]
enum Node {
    Source(Signal<i64>),
    Derived(Computed<i64>),
}

impl Node {
    fn get(&self) -> i64 {
        match self {
            Node::Source(s) => s.get(),
            Node::Derived(c) => c.get(),
        }
    }
}

/// Build the reactive version of `shape`, with one run counter per computed.
fn build(shape: &Shape) -> (Vec<Node>, Vec<Rc<Cell<usize>>>) {
    let mut nodes: Vec<Node> = (0..shape.signals)
        .map(|_| Node::Source(signal(0)))
        .collect();
    let mut runs = Vec::new();
    for d in &shape.derivations {
        let inputs: Vec<Node> = d.inputs.iter().map(|&i| nodes[i].clone()).collect();
        let counter = Rc::new(Cell::new(0));
        let modulus = d.modulus;
        let c = computed({
            let counter = counter.clone();
            move |_| {
                counter.set(counter.get() + 1);
                inputs.iter().map(Node::get).sum::<i64>().rem_euclid(modulus)
            }
        });
        nodes.push(Node::Derived(c));
        runs.push(counter);
    }
    (nodes, runs)
}

fn set(nodes: &[Node], index: usize, value: i64) {
    if let Node::Source(s) = &nodes[index] {
        s.set(value);
    }
}

// =============================================================================
// Graph Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_reads_match_oracle(shape in shape(), writes in writes()) {
        let (nodes, runs) = build(&shape);
        let mut values = vec![0i64; shape.signals];

        for (raw, value) in writes {
            let index = raw % shape.signals;
            values[index] = value;
            set(&nodes, index, value);

            for counter in &runs {
                counter.set(0);
            }
            let expected = oracle(&shape, &values);
            for (i, node) in nodes.iter().enumerate() {
                prop_assert_eq!(node.get(), expected[i], "node {}", i);
            }
            // Glitch-free: no getter runs twice for one write.
            for counter in &runs {
                prop_assert!(counter.get() <= 1);
            }
        }
    }

    #[test]
    fn prop_effect_sees_final_values(shape in shape(), writes in writes()) {
        let (nodes, _runs) = build(&shape);
        let mut values = vec![0i64; shape.signals];

        let seen = Rc::new(Cell::new(i64::MIN));
        let sink = nodes.last().cloned();
        let e = effect({
            let seen = seen.clone();
            move || {
                if let Some(node) = &sink {
                    seen.set(node.get());
                }
            }
        });

        for chunk in writes.chunks(3) {
            batch(|| {
                for &(raw, value) in chunk {
                    let index = raw % shape.signals;
                    values[index] = value;
                    set(&nodes, index, value);
                }
            });
            let expected = oracle(&shape, &values);
            prop_assert_eq!(seen.get(), *expected.last().unwrap());
        }

        e.dispose();
    }

    #[test]
    fn prop_unread_computeds_never_run(shape in shape(), writes in writes()) {
        let (nodes, runs) = build(&shape);
        for (raw, value) in writes {
            set(&nodes, raw % shape.signals, value);
        }
        for counter in &runs {
            prop_assert_eq!(counter.get(), 0);
        }
    }
}
