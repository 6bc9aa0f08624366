//! Performance benchmarks for NodeStage core operations
//!
//! Run with: `cargo bench -p nodestage-core`
//!
//! These benchmarks measure the paths run on every store mutation or form
//! render:
//! - Projecting a long snapshot stack across many change-sets
//! - Flattening the largest built-in schema into form fields
//! - Listing visible nodes in a large store

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nodestage_core::projection::project;
use nodestage_core::{
    BuiltinType, Node, NodeKind, NodeStore, PropertyResolver, SchemaRegistry, Snapshot,
};
use serde_json::json;

const DEPLOYMENT: &str = "kubernetesDeploymentEntity";

/// A stack with `entries` snapshots spread over ten change-sets plus saves
fn generate_stack(entries: u64) -> Vec<Snapshot> {
    (0..entries)
        .map(|i| {
            let body = json!({"name": format!("web-{}", i), "kubernetesObject": {"spec": {"replicas": i}}});
            if i % 10 == 0 {
                Snapshot::saved(format!("saved-{}", i), DEPLOYMENT, body)
            } else {
                Snapshot::in_change_set(
                    format!("entry-{}", i),
                    DEPLOYMENT,
                    format!("changeSet:{}", i % 10),
                    i,
                    body,
                )
            }
        })
        .collect()
}

fn bench_project(c: &mut Criterion) {
    let stack = generate_stack(1000);

    c.bench_function("project_1000_snapshots", |b| {
        b.iter(|| project(black_box(&stack)))
    });
}

fn bench_resolve_fields(c: &mut Criterion) {
    let registry = SchemaRegistry::with_builtins();
    let resolver = PropertyResolver::new(&registry);

    c.bench_function("resolve_deployment_fields", |b| {
        b.iter(|| {
            resolver
                .resolve_fields(black_box(BuiltinType::KubernetesDeploymentEntity.as_str()))
                .unwrap()
        })
    });
}

fn bench_list(c: &mut Criterion) {
    let mut store = NodeStore::new();
    store.upsert_snapshots((0..500).map(|i| {
        let mut node = Node::new(format!("node:{}", i), NodeKind::Entity);
        node.stack = generate_stack(20);
        node
    }));

    c.bench_function("list_500_nodes_in_change_set", |b| {
        b.iter(|| store.list(black_box(Some("changeSet:3"))).len())
    });
}

criterion_group!(benches, bench_project, bench_resolve_fields, bench_list);
criterion_main!(benches);
