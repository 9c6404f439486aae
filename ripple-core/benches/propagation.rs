//! Propagation micro-benchmarks: the cost of one trial (mutate,
//! propagate, revert) against graph depth and against diff size.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ripple_core::{Graph, ReduceOp, UnaryOp};

fn deep_chain(c: &mut Criterion) {
    let mut graph = Graph::new();
    let x = graph.integer(128, -100.0, 100.0).unwrap();
    let mut node = x.node();
    for _ in 0..50 {
        node = graph.unary(UnaryOp::Negative, node).unwrap();
    }
    let objective = graph.reduce(ReduceOp::Sum, node, None).unwrap();
    let mut state = graph.initialize_state();
    graph.propagate(&mut state);
    state.commit();

    c.bench_function("single_move_through_50_node_chain", |b| {
        b.iter(|| {
            x.set(&mut state, 7, 42.0).unwrap();
            graph.propagate(&mut state);
            black_box(state.scalar(objective));
            state.revert();
        })
    });
}

fn wide_fanout(c: &mut Criterion) {
    let mut graph = Graph::new();
    let x = graph.integer(64, -10.0, 10.0).unwrap();
    let squared = graph.unary(UnaryOp::Square, x.node()).unwrap();
    let mut objectives = Vec::new();
    for _ in 0..32 {
        objectives.push(graph.reduce(ReduceOp::Sum, squared, None).unwrap());
    }
    let mut state = graph.initialize_state();
    graph.propagate(&mut state);
    state.commit();

    c.bench_function("single_move_fanning_out_to_32_reductions", |b| {
        b.iter(|| {
            x.set(&mut state, 3, 9.0).unwrap();
            graph.propagate(&mut state);
            black_box(state.scalar(objectives[0]));
            state.revert();
        })
    });
}

criterion_group!(benches, deep_chain, wide_fanout);
criterion_main!(benches);
