//! Integration Tests for the Evaluation Engine
//!
//! These tests exercise the engine the way a solver does: build a model
//! once, then drive a state through mutate / propagate / commit / revert
//! cycles and check the transactional guarantees hold across every node
//! family at once.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ripple_core::{BinaryOp, Graph, QuadraticModel, ReduceOp, State, UnaryOp};

/// A model that runs every node family through a shared set of decision
/// variables, so one random walk exercises the whole engine.
struct Model {
    graph: Graph,
    x: ripple_core::IntegerVar,
    y: ripple_core::IntegerVar,
    b: ripple_core::BinaryVar,
    s: ripple_core::SetVar,
    route: ripple_core::ListVar,
    parts: ripple_core::DisjointBitSetsVar,
    dl: ripple_core::DisjointListsVar,
}

fn build_model() -> Model {
    let mut graph = Graph::new();
    let x = graph.integer(4, -5.0, 5.0).unwrap();
    let y = graph.integer(4, 0.0, 9.0).unwrap();
    let b = graph.binary(4);
    let s = graph.set(6);
    let route = graph.list(5);
    let parts = graph.disjoint_bit_sets(4, 2).unwrap();
    let dl = graph.disjoint_lists(4, 2).unwrap();

    // Elementwise layer.
    let add = graph.binary_op(BinaryOp::Add, x.node(), y.node()).unwrap();
    let sub = graph.binary_op(BinaryOp::Subtract, x.node(), y.node()).unwrap();
    let mul = graph.binary_op(BinaryOp::Multiply, x.node(), y.node()).unwrap();
    let hi = graph.binary_op(BinaryOp::Maximum, x.node(), y.node()).unwrap();
    let lo = graph.binary_op(BinaryOp::Minimum, x.node(), y.node()).unwrap();
    let eq = graph.binary_op(BinaryOp::Equal, x.node(), y.node()).unwrap();
    let le = graph.binary_op(BinaryOp::LessEqual, x.node(), y.node()).unwrap();
    let conj = graph.binary_op(BinaryOp::And, b.node(), le).unwrap();
    let disj = graph.binary_op(BinaryOp::Or, b.node(), eq).unwrap();
    let stacked = graph.nary(BinaryOp::Add, &[x.node(), y.node(), x.node()]).unwrap();
    let dist = graph.unary(UnaryOp::Absolute, sub).unwrap();
    let flipped = graph.unary(UnaryOp::Negative, x.node()).unwrap();
    let sq = graph.unary(UnaryOp::Square, sub).unwrap();

    // Reductions over fixed arrays.
    for node in [add, mul, hi, lo, conj, disj, stacked, dist, flipped, sq] {
        graph.reduce(ReduceOp::Sum, node, None).unwrap();
    }
    graph.reduce(ReduceOp::Max, x.node(), None).unwrap();
    graph.reduce(ReduceOp::Min, y.node(), None).unwrap();
    graph.reduce(ReduceOp::All, b.node(), None).unwrap();
    graph.reduce(ReduceOp::Prod, y.node(), None).unwrap();

    // Dynamic-shape chain over the set.
    let s_sq = graph.unary(UnaryOp::Square, s.node()).unwrap();
    graph.reduce(ReduceOp::Sum, s_sq, None).unwrap();
    graph.reduce(ReduceOp::Sum, s.node(), None).unwrap();
    graph.reduce(ReduceOp::Max, s.node(), Some(0.0)).unwrap();
    graph.reduce(ReduceOp::Prod, s.node(), None).unwrap();

    // Permutation consumers.
    let pos = graph.constant(&[0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
    let weighted = graph.binary_op(BinaryOp::Multiply, route.node(), pos).unwrap();
    graph.reduce(ReduceOp::Sum, weighted, None).unwrap();

    // Partition consumers.
    for class in 0..2 {
        graph.reduce(ReduceOp::Sum, parts.set_node(class), None).unwrap();
        graph.reduce(ReduceOp::Sum, dl.list_node(class), None).unwrap();
    }

    // Quadratic energy over the binary variable.
    let mut model = QuadraticModel::new(4);
    model.set_linear(0, 2.0).unwrap();
    model.set_linear(3, -1.0).unwrap();
    model.set_quadratic(0, 1, 3.0).unwrap();
    model.set_quadratic(2, 3, -4.0).unwrap();
    graph.quadratic(b.node(), model).unwrap();

    Model { graph, x, y, b, s, route, parts, dl }
}

/// One decision-variable mutation, replayable on any state of the model.
#[derive(Debug, Clone, Copy)]
enum Move {
    X(usize, f64),
    Y(usize, f64),
    Flip(usize),
    SetAdd(usize),
    SetDiscard(usize),
    RouteSwap(usize, usize),
    PartMove(usize, usize, usize),
    DlSwap(usize, usize, usize, usize),
    DlRelocate(usize, usize, usize),
}

fn apply(model: &Model, state: &mut State, mv: Move) -> bool {
    let result = match mv {
        Move::X(i, v) => model.x.set(state, i, v),
        Move::Y(i, v) => model.y.set(state, i, v),
        Move::Flip(i) => model.b.flip(state, i),
        Move::SetAdd(v) => model.s.add(state, v),
        Move::SetDiscard(v) => model.s.discard(state, v),
        Move::RouteSwap(i, j) => model.route.swap(state, i, j),
        Move::PartMove(e, from, to) => model.parts.move_element(state, e, from, to),
        Move::DlSwap(al, ai, bl, bi) => model.dl.swap(state, al, ai, bl, bi),
        Move::DlRelocate(l, i, to) => model.dl.relocate(state, l, i, to),
    };
    result.is_ok()
}

fn random_move(rng: &mut StdRng) -> Move {
    match rng.gen_range(0..9) {
        0 => Move::X(rng.gen_range(0..4), rng.gen_range(-5..=5) as f64),
        1 => Move::Y(rng.gen_range(0..4), rng.gen_range(0..=9) as f64),
        2 => Move::Flip(rng.gen_range(0..4)),
        3 => Move::SetAdd(rng.gen_range(0..6)),
        4 => Move::SetDiscard(rng.gen_range(0..6)),
        5 => Move::RouteSwap(rng.gen_range(0..5), rng.gen_range(0..5)),
        6 => Move::PartMove(rng.gen_range(0..4), rng.gen_range(0..2), rng.gen_range(0..2)),
        7 => Move::DlSwap(
            rng.gen_range(0..2),
            rng.gen_range(0..4),
            rng.gen_range(0..2),
            rng.gen_range(0..4),
        ),
        _ => Move::DlRelocate(rng.gen_range(0..2), rng.gen_range(0..4), rng.gen_range(0..2)),
    }
}

fn assert_states_match(graph: &Graph, a: &State, b: &State) {
    for id in graph.node_ids() {
        assert_eq!(
            a.buff(id),
            b.buff(id),
            "node {} ({:?}) diverged",
            id.index(),
            graph.shape(id)
        );
    }
}

/// Driving a trajectory through accepted and rejected moves must land on
/// exactly the state produced by applying only the accepted moves.
#[test]
fn incremental_evaluation_matches_accepted_move_replay() {
    let model = build_model();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    let mut live = model.graph.initialize_state();
    let mut committed_rounds: Vec<Vec<Move>> = Vec::new();

    for _ in 0..60 {
        let mut round = Vec::new();
        for _ in 0..rng.gen_range(1..=3) {
            let mv = random_move(&mut rng);
            if apply(&model, &mut live, mv) {
                round.push(mv);
            }
        }
        model.graph.propagate(&mut live);
        if rng.gen_bool(0.6) {
            live.commit();
            committed_rounds.push(round);
        } else {
            live.revert();
        }
    }

    let mut replay = model.graph.initialize_state();
    for round in &committed_rounds {
        for &mv in round {
            assert!(apply(&model, &mut replay, mv), "accepted move failed on replay");
        }
        model.graph.propagate(&mut replay);
        replay.commit();
    }

    assert_states_match(&model.graph, &live, &replay);
}

/// A fresh state seeded with the final decision-variable values must agree
/// with the incrementally maintained one on every node.
#[test]
fn fresh_state_from_final_values_matches_incremental() {
    let model = build_model();
    let mut rng = StdRng::seed_from_u64(42);

    let mut live = model.graph.initialize_state();
    for _ in 0..40 {
        for _ in 0..rng.gen_range(1..=2) {
            // Restrict the walk to variables that can be re-seeded with a
            // single assignment.
            let mv = loop {
                let mv = random_move(&mut rng);
                if !matches!(mv, Move::PartMove(..) | Move::DlSwap(..) | Move::DlRelocate(..)) {
                    break mv;
                }
            };
            apply(&model, &mut live, mv);
        }
        model.graph.propagate(&mut live);
        live.commit();
    }

    let mut fresh = model.graph.initialize_state();
    model.x.assign(&mut fresh, live.buff(model.x.node())).unwrap();
    model.y.assign(&mut fresh, live.buff(model.y.node())).unwrap();
    model.b.assign(&mut fresh, live.buff(model.b.node())).unwrap();
    let members: Vec<usize> = live.buff(model.s.node()).iter().map(|&v| v as usize).collect();
    model.s.assign(&mut fresh, &members).unwrap();
    let order: Vec<usize> = live.buff(model.route.node()).iter().map(|&v| v as usize).collect();
    model.route.assign(&mut fresh, &order).unwrap();
    model.graph.propagate(&mut fresh);
    fresh.commit();

    assert_states_match(&model.graph, &live, &fresh);
}

#[test]
fn commit_twice_changes_nothing() {
    let model = build_model();
    let mut state = model.graph.initialize_state();

    model.x.set(&mut state, 0, 3.0).unwrap();
    model.graph.propagate(&mut state);
    state.commit();

    let snapshot: Vec<Vec<f64>> =
        model.graph.node_ids().map(|id| state.buff(id).to_vec()).collect();
    state.commit();

    for (id, before) in model.graph.node_ids().zip(&snapshot) {
        assert_eq!(state.buff(id), before.as_slice());
        assert!(state.diff(id).is_empty());
    }
}

#[test]
fn revert_restores_pre_round_buffers_bit_for_bit() {
    let model = build_model();
    let mut rng = StdRng::seed_from_u64(7);
    let mut state = model.graph.initialize_state();

    // Put the state somewhere non-trivial first.
    for _ in 0..10 {
        apply(&model, &mut state, random_move(&mut rng));
        model.graph.propagate(&mut state);
        state.commit();
    }
    let snapshot: Vec<Vec<f64>> =
        model.graph.node_ids().map(|id| state.buff(id).to_vec()).collect();

    for _ in 0..5 {
        apply(&model, &mut state, random_move(&mut rng));
    }
    model.graph.propagate(&mut state);
    state.revert();

    for (id, before) in model.graph.node_ids().zip(&snapshot) {
        assert_eq!(state.buff(id), before.as_slice());
        assert!(state.diff(id).is_empty());
    }
}

#[test]
fn writes_within_a_round_coalesce() {
    let mut graph = Graph::new();
    let x = graph.integer(3, 0.0, 10.0).unwrap();
    let mut state = graph.initialize_state();

    x.set(&mut state, 1, 4.0).unwrap();
    x.set(&mut state, 1, 9.0).unwrap();
    let diff = state.diff(x.node());
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0].value(), Some(9.0));

    // Returning to the committed value cancels the record.
    x.set(&mut state, 1, 0.0).unwrap();
    assert!(state.diff(x.node()).is_empty());
}

/// Every buffer value stays inside the bounds its node declared at
/// construction, across random in-domain assignments.
#[test]
fn buffers_respect_declared_bounds() {
    let model = build_model();
    let mut rng = StdRng::seed_from_u64(1234);
    let mut state = model.graph.initialize_state();

    for _ in 0..50 {
        for _ in 0..rng.gen_range(1..=4) {
            apply(&model, &mut state, random_move(&mut rng));
        }
        model.graph.propagate(&mut state);
        state.commit();

        for id in model.graph.node_ids() {
            let bounds = model.graph.bounds(id);
            for &value in state.buff(id) {
                assert!(
                    bounds.contains(value),
                    "node {} value {} escapes [{}, {}]",
                    id.index(),
                    value,
                    bounds.min,
                    bounds.max
                );
                if bounds.integral {
                    assert_eq!(value.fract(), 0.0);
                }
            }
        }
    }
}

/// The worked vector-addition example: initialize, mutate one index,
/// propagate, inspect the diff, commit.
#[test]
fn vector_addition_walkthrough() {
    let mut graph = Graph::new();
    let lhs = graph.integer(3, 0.0, 100.0).unwrap();
    let rhs = graph.integer(3, 0.0, 100.0).unwrap();
    let sum = graph.binary_op(BinaryOp::Add, lhs.node(), rhs.node()).unwrap();

    let mut state = graph.initialize_state();
    lhs.assign(&mut state, &[1.0, 2.0, 3.0]).unwrap();
    rhs.assign(&mut state, &[10.0, 20.0, 30.0]).unwrap();
    graph.propagate(&mut state);
    state.commit();
    assert_eq!(state.buff(sum), &[11.0, 22.0, 33.0]);

    lhs.set(&mut state, 1, 5.0).unwrap();
    graph.propagate(&mut state);
    assert_eq!(state.buff(sum), &[11.0, 25.0, 33.0]);
    let diff = state.diff(sum);
    assert_eq!(diff.len(), 1);
    assert_eq!((diff[0].index(), diff[0].value()), (1, Some(25.0)));

    state.commit();
    assert!(state.diff(sum).is_empty());
    assert_eq!(state.buff(sum), &[11.0, 25.0, 33.0]);
}

/// The worked dynamic-set example: a sum tracks element removal through
/// its diff alone.
#[test]
fn set_sum_walkthrough() {
    let mut graph = Graph::new();
    let s = graph.set(8);
    let total = graph.reduce(ReduceOp::Sum, s.node(), Some(0.0)).unwrap();

    let mut state = graph.initialize_state();
    s.add(&mut state, 2).unwrap();
    s.add(&mut state, 4).unwrap();
    graph.propagate(&mut state);
    state.commit();
    assert_eq!(state.scalar(total), 6.0);

    s.discard(&mut state, 2).unwrap();
    graph.propagate(&mut state);
    assert_eq!(state.scalar(total), 4.0);
}

/// Several states evaluate one graph without observing each other.
#[test]
fn states_over_one_graph_are_independent() {
    let model = build_model();
    let mut a = model.graph.initialize_state();
    let mut b = model.graph.initialize_state();

    model.x.set(&mut a, 0, 5.0).unwrap();
    model.graph.propagate(&mut a);
    a.commit();

    model.x.set(&mut b, 0, -5.0).unwrap();
    model.graph.propagate(&mut b);

    assert_eq!(a.buff(model.x.node())[0], 5.0);
    assert_eq!(b.buff(model.x.node())[0], -5.0);

    b.revert();
    assert_eq!(b.buff(model.x.node())[0], 0.0);
    assert_eq!(a.buff(model.x.node())[0], 5.0);
}
