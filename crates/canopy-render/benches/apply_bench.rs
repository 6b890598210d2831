//! Benchmarks for mounting and patch application on the headless surface.
//!
//! Each iteration mounts the old tree on a fresh surface, so the numbers
//! include the mount; `mount` alone is measured as the baseline.
//!
//! Run with: cargo bench -p canopy-render --bench apply_bench

use std::rc::Rc;

use canopy_core::{EventScope, VNode};
use canopy_diff::diff;
use canopy_render::{HeadlessDom, apply_patches, mount};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

type N = VNode<()>;

fn item(i: usize, label: &str) -> N {
    N::element("li", [], vec![N::text(format!("{i}: {label}"))])
}

fn list(len: usize, label: &str) -> N {
    N::element("ul", [], (0..len).map(|i| item(i, label)).collect())
}

fn keyed_list(order: &[usize]) -> N {
    N::keyed(
        "ul",
        [],
        order.iter().map(|&i| (format!("k{i}"), item(i, "x"))).collect(),
    )
}

fn mount_and_apply(old: &N, new: &N) -> usize {
    let scope = EventScope::root(|_: ()| {});
    let mut dom = HeadlessDom::<()>::new();
    let root = mount(&mut dom, old, &scope).expect("mount");
    let patches = diff(old, new);
    let root = apply_patches(&mut dom, root, old, &patches, &scope).expect("apply");
    dom.children(root).len()
}

// =============================================================================
// Baseline
// =============================================================================

fn bench_mount(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply/mount");

    for len in [100, 1_000] {
        group.throughput(Throughput::Elements(len as u64));
        let tree = list(len, "a");
        group.bench_with_input(BenchmarkId::new("list", len), &tree, |b, tree| {
            b.iter(|| {
                let scope: Rc<EventScope<()>> = EventScope::root(|_| {});
                let mut dom = HeadlessDom::<()>::new();
                black_box(mount(&mut dom, tree, &scope).expect("mount"))
            })
        });
    }

    group.finish();
}

// =============================================================================
// Diff + apply
// =============================================================================

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply/patch");

    for len in [100, 1_000] {
        group.throughput(Throughput::Elements(len as u64));

        let old = list(len, "a");
        let new = list(len, "b");
        group.bench_with_input(
            BenchmarkId::new("all_text", len),
            &(old, new),
            |b, (old, new)| b.iter(|| black_box(mount_and_apply(old, new))),
        );

        let order: Vec<usize> = (0..len).collect();
        let old = keyed_list(&order);
        let reversed: Vec<usize> = order.iter().rev().copied().collect();
        let new = keyed_list(&reversed);
        group.bench_with_input(
            BenchmarkId::new("keyed_reverse", len),
            &(old, new),
            |b, (old, new)| b.iter(|| black_box(mount_and_apply(old, new))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_mount, bench_apply);
criterion_main!(benches);
