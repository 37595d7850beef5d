//! Propagation over realistic graph shapes.

use reason_common::{EntityKind, PropagationConfig, RelationKind};
use reason_kg::{Direction, Entity, EvidenceGraph, ImpactPropagator, Interaction};
use reason_test_utils::chain_graph;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_chain_scores_in_seed_units() {
    let result = ImpactPropagator::new(PropagationConfig::default())
        .unwrap()
        .propagate(&chain_graph())
        .unwrap();

    assert!(close(result.score("A").unwrap(), 1.0));
    assert!(close(result.score("B").unwrap(), 0.85));
    assert!(close(result.score("C").unwrap(), 0.85 * 0.85));
    assert_eq!(result.iterations, 3);
    assert!(result.converged);
}

#[test]
fn test_frozen_graph_shared_across_threads() {
    let graph = chain_graph();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let g = graph.clone();
            std::thread::spawn(move || {
                ImpactPropagator::new(PropagationConfig::default())
                    .unwrap()
                    .propagate(&g)
                    .unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_large_graph_parallel_matches_sequential() {
    let n = 2_000;
    let mut g = EvidenceGraph::with_capacity(n, n * 3);
    for i in 0..n {
        g.add_entity(Entity::new(format!("N{i}"), EntityKind::Protein)).unwrap();
    }
    for i in 0..n {
        let w = if i % 3 == 0 { -0.4 } else { 0.6 };
        let kind = if w < 0.0 { RelationKind::Inhibits } else { RelationKind::Activates };
        g.add_interaction(Interaction::directed(format!("N{i}"), format!("N{}", (i + 1) % n), kind, w))
            .unwrap();
        g.add_interaction(Interaction::undirected(
            format!("N{i}"),
            format!("N{}", (i * 7 + 3) % n),
            RelationKind::Binds,
            0.2,
        ))
        .unwrap();
    }
    for i in (0..n).step_by(97) {
        g.seed(&format!("N{i}"), 1.0 + (i % 5) as f64, 0.9).unwrap();
    }
    let graph = g.freeze();

    let parallel = ImpactPropagator::new(PropagationConfig::default()).unwrap().propagate(&graph).unwrap();
    let sequential = ImpactPropagator::new(PropagationConfig { parallel: false, ..Default::default() })
        .unwrap()
        .propagate(&graph)
        .unwrap();

    assert_eq!(parallel, sequential);
    assert!(parallel.iterations <= 100);
    assert_eq!(parallel.len(), n);
}

fn ring_graph(reversed: bool) -> reason_kg::SeededGraph {
    let n = 50;
    let mut ids: Vec<usize> = (0..n).collect();
    let mut edges: Vec<(usize, usize, f64)> = Vec::new();
    for i in 0..n {
        edges.push((i, (7 * i + 1) % n, 0.5));
        edges.push((i, (7 * i + 3) % n, -0.3));
    }
    if reversed {
        ids.reverse();
        edges.reverse();
    }

    let mut g = EvidenceGraph::with_capacity(n, edges.len());
    for i in &ids {
        g.add_entity(Entity::new(format!("N{i}"), EntityKind::Protein)).unwrap();
    }
    for (from, to, w) in edges {
        let kind = if w < 0.0 { RelationKind::Inhibits } else { RelationKind::Activates };
        g.add_interaction(Interaction::directed(format!("N{from}"), format!("N{to}"), kind, w))
            .unwrap();
    }
    for i in ids.iter().filter(|i| *i % 5 == 0) {
        g.seed(&format!("N{i}"), 1.0 + (*i % 3) as f64, 0.8).unwrap();
    }
    g.freeze()
}

#[test]
fn test_scores_independent_of_insertion_order() {
    let propagator = ImpactPropagator::new(PropagationConfig::default()).unwrap();
    let forward = propagator.propagate(&ring_graph(false)).unwrap();
    let reversed = propagator.propagate(&ring_graph(true)).unwrap();

    assert_eq!(forward.len(), 50);
    assert_eq!(forward.scores.keys().collect::<Vec<_>>(), reversed.scores.keys().collect::<Vec<_>>());
    for (id, score) in &forward.scores {
        let other = reversed.score(id).unwrap();
        assert!((score - other).abs() < 1e-6, "{id}: {score} vs {other}");
    }
}

#[test]
fn test_neighbors_iterator_restarts() {
    let graph = chain_graph();
    let it = graph.neighbors("B", Direction::Both).unwrap();
    let first: Vec<&str> = it.clone().map(|(e, _)| e.id.as_str()).collect();
    let second: Vec<&str> = it.map(|(e, _)| e.id.as_str()).collect();
    assert_eq!(first, vec!["C", "A"]);
    assert_eq!(first, second);
}
