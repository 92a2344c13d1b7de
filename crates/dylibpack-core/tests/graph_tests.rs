//! Dependency graph properties over random reference graphs

use dylibpack_core::{ClosedGraph, DependencyNode, GraphBuilder, NodeId, SystemLibraries};
use dylibpack_test_utils::FakeInspector;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SYSTEM_LIB: &str = "/usr/lib/libSystem.B.dylib";

fn lib_path(index: usize) -> PathBuf {
    if index == 0 {
        PathBuf::from("/b/bin/app")
    } else {
        PathBuf::from(format!("/l/lib{index}.dylib"))
    }
}

fn reference_string(index: usize, absolute: bool) -> String {
    if absolute {
        lib_path(index).display().to_string()
    } else {
        format!("@rpath/lib{index}.dylib")
    }
}

/// Edge list: (consumer, dependency, use absolute reference string)
type Edges = Vec<(usize, usize, bool)>;

fn inspector_for(edges: &Edges, with_system: bool) -> FakeInspector {
    let mut inspector = FakeInspector::new();
    for &(from, to, absolute) in edges {
        inspector = inspector.reference(lib_path(from), &reference_string(to, absolute), lib_path(to));
        if with_system {
            inspector = inspector.reference(lib_path(from), SYSTEM_LIB, SYSTEM_LIB);
        }
    }
    inspector
}

fn reachable(edges: &Edges) -> HashSet<usize> {
    let mut seen = HashSet::from([0]);
    let mut queue = VecDeque::from([0]);
    while let Some(node) = queue.pop_front() {
        for &(from, to, _) in edges {
            if from == node && seen.insert(to) {
                queue.push_back(to);
            }
        }
    }
    seen
}

fn build(inspector: Arc<FakeInspector>) -> ClosedGraph {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    runtime.block_on(async {
        GraphBuilder::new(inspector, SystemLibraries::default())
            .build(DependencyNode::new(lib_path(0)))
            .await
            .graph
    })
}

fn edge_strategy() -> impl Strategy<Value = Edges> {
    (1..12usize).prop_flat_map(|n| {
        proptest::collection::vec((0..n, 0..n, any::<bool>()), 0..40)
    })
}

proptest! {
    #[test]
    fn prop_closure_is_complete_and_single_instance(edges in edge_strategy(), with_system in any::<bool>()) {
        let inspector = Arc::new(inspector_for(&edges, with_system));
        let graph = build(inspector.clone());

        let expected: BTreeSet<PathBuf> = reachable(&edges).into_iter().map(lib_path).collect();
        let actual: BTreeSet<PathBuf> = graph
            .nodes()
            .map(|(_, node)| node.canonical_path().to_path_buf())
            .collect();

        // closure completeness and no aliasing duplicates
        prop_assert_eq!(&actual, &expected);
        prop_assert_eq!(graph.len(), expected.len());
        prop_assert!(graph.find(Path::new(SYSTEM_LIB)).is_none());

        // every node is expanded exactly once, cycles included
        for path in &expected {
            prop_assert_eq!(inspector.call_count(path), 1);
        }
    }

    #[test]
    fn prop_edges_and_references_are_merged(edges in edge_strategy()) {
        let graph = build(Arc::new(inspector_for(&edges, false)));
        let live = reachable(&edges);

        let mut expected_edges: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut expected_refs: HashMap<usize, BTreeSet<String>> = HashMap::new();
        for &(from, to, absolute) in edges.iter().filter(|(from, to, _)| live.contains(from) && from != to) {
            let list = expected_edges.entry(from).or_default();
            if !list.contains(&to) {
                list.push(to);
            }
            expected_refs.entry(to).or_default().insert(reference_string(to, absolute));
        }

        for index in &live {
            let id = graph.find(&lib_path(*index)).expect("reachable node present");
            let node = graph.node(id);

            let edges: Vec<PathBuf> = node
                .edges()
                .iter()
                .map(|edge| graph.node(*edge).canonical_path().to_path_buf())
                .collect();
            let wanted: Vec<PathBuf> = expected_edges
                .get(index)
                .map(|list| list.iter().copied().map(lib_path).collect())
                .unwrap_or_default();
            prop_assert_eq!(edges, wanted);

            let refs: BTreeSet<String> = node.referred_as().iter().cloned().collect();
            prop_assert_eq!(refs, expected_refs.get(index).cloned().unwrap_or_default());
        }
    }
}

#[tokio::test]
async fn two_node_cycle_yields_one_node_each() {
    let inspector = Arc::new(
        FakeInspector::new()
            .reference("/b/bin/app", "@rpath/libA.dylib", "/l/libA.dylib")
            .reference("/l/libA.dylib", "@rpath/libB.dylib", "/l/libB.dylib")
            .reference("/l/libB.dylib", "@rpath/libA.dylib", "/l/libA.dylib"),
    );

    let graph = GraphBuilder::new(inspector.clone(), SystemLibraries::default())
        .build(DependencyNode::new("/b/bin/app"))
        .await
        .graph;

    assert_eq!(graph.dependency_count(), 2);
    assert_eq!(inspector.call_count(Path::new("/l/libA.dylib")), 1);
    assert_eq!(inspector.call_count(Path::new("/l/libB.dylib")), 1);
}

#[tokio::test]
async fn waves_complete_before_next_frontier() {
    let inspector = Arc::new(
        FakeInspector::new()
            .reference("/b/bin/app", "@rpath/libA.dylib", "/l/libA.dylib")
            .reference("/b/bin/app", "@rpath/libB.dylib", "/l/libB.dylib")
            .reference("/l/libA.dylib", "@rpath/libC.dylib", "/l/libC.dylib")
            .reference("/l/libB.dylib", "@rpath/libD.dylib", "/l/libD.dylib")
            .reference("/l/libC.dylib", "@rpath/libE.dylib", "/l/libE.dylib"),
    );

    let graph = GraphBuilder::new(inspector.clone(), SystemLibraries::default())
        .build(DependencyNode::new("/b/bin/app"))
        .await
        .graph;

    let calls: Vec<String> = inspector
        .calls()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(calls, vec!["app", "libA.dylib", "libB.dylib", "libC.dylib", "libD.dylib", "libE.dylib"]);

    let order: Vec<&str> = graph.dependencies().map(|(_, node)| node.declared_name()).collect();
    assert_eq!(order, vec!["libA.dylib", "libB.dylib", "libC.dylib", "libD.dylib", "libE.dylib"]);
    assert_eq!(graph.find(Path::new("/l/libA.dylib")), Some(NodeId(1)));
}

#[tokio::test]
async fn library_queued_twice_in_one_wave_is_merged() {
    // libA and libB are in the same wave and both discover libC
    let inspector = Arc::new(
        FakeInspector::new()
            .reference("/b/bin/app", "@rpath/libA.dylib", "/l/libA.dylib")
            .reference("/b/bin/app", "@rpath/libB.dylib", "/l/libB.dylib")
            .reference("/l/libA.dylib", "@rpath/libC.dylib", "/l/libC.dylib")
            .reference("/l/libB.dylib", "@loader_path/libC.dylib", "/l/libC.dylib"),
    );

    let graph = GraphBuilder::new(inspector.clone(), SystemLibraries::default())
        .build(DependencyNode::new("/b/bin/app"))
        .await
        .graph;

    let c = graph.find(Path::new("/l/libC.dylib")).unwrap();
    let a = graph.find(Path::new("/l/libA.dylib")).unwrap();
    let b = graph.find(Path::new("/l/libB.dylib")).unwrap();
    assert_eq!(graph.direct_dependencies(a), &[c]);
    assert_eq!(graph.direct_dependencies(b), &[c]);
    assert_eq!(inspector.call_count(Path::new("/l/libC.dylib")), 1);

    let refs: Vec<&str> = graph.node(c).referred_as().iter().map(String::as_str).collect();
    assert_eq!(refs, vec!["@rpath/libC.dylib", "@loader_path/libC.dylib"]);
}
