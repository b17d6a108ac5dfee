//! Benchmarks for live view maintenance through the registry.
//!
//! Run with: cargo bench -p horizon-database

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use horizon_core::schema::{Aggregator, ColumnDef};
use horizon_core::{RowInput, Value};
use horizon_database::{DataRequest, Registry, RegistryConfig, SessionConfig};
use horizon_incremental::{Filter, SortSpec};
use horizon_reactive::ManualClock;
use horizon_storage::TableOptions;
use std::rc::Rc;

const DEPARTMENTS: [&str; 5] = ["Engineering", "Sales", "Marketing", "HR", "Finance"];

fn employee(i: i64) -> RowInput {
    RowInput::named([
        ("id", Value::Int64(i)),
        ("name", Value::String(format!("User {}", i))),
        ("department", Value::from(DEPARTMENTS[(i as usize) % DEPARTMENTS.len()])),
        ("salary", Value::Int64(50_000 + (i % 100) * 1_000)),
    ])
}

fn create_registry(rows: i64) -> Registry {
    let mut registry = Registry::new(RegistryConfig::default(), Rc::new(ManualClock::new()));
    registry
        .create_table(
            "employees",
            vec![
                ColumnDef::new("id").primary_key(),
                ColumnDef::new("name"),
                ColumnDef::new("department").secondary_key(),
                ColumnDef::new("salary").aggregator(Aggregator::Sum),
            ],
            TableOptions::default(),
        )
        .unwrap();
    registry.add("employees", (1..=rows).map(employee).collect()).unwrap();
    registry
}

fn with_views(rows: i64, views: usize) -> Registry {
    let mut registry = create_registry(rows);
    for v in 0..views {
        let config = SessionConfig::new("employees")
            .id(format!("view{}", v))
            .filter(vec![Filter::eq("department", DEPARTMENTS[v % DEPARTMENTS.len()])])
            .sort(vec![SortSpec::desc("salary")]);
        registry.create_session(config, false).unwrap();
    }
    registry
}

/// Benchmark: one row update fanned out to many filtered views
fn update_fanout_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_fanout");
    for views in [1usize, 10, 50].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(views), views, |b, &views| {
            b.iter_batched(
                || with_views(10_000, views),
                |mut registry| {
                    registry.update("employees", vec![employee(42)]).unwrap();
                    black_box(registry)
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

/// Benchmark: sorted read after a burst of inserts
fn sorted_read_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("sorted_read");
    for rows in [1_000i64, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, &rows| {
            b.iter_batched(
                || {
                    let mut registry = with_views(rows, 1);
                    registry
                        .add("employees", (rows + 1..=rows + 100).map(employee).collect())
                        .unwrap();
                    registry
                },
                |mut registry| black_box(registry.get_data("view0", &DataRequest::default()).unwrap()),
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

/// Benchmark: grouped view refreshed by single-row changes
fn grouped_update_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("grouped_update");
    for rows in [1_000i64, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, &rows| {
            b.iter_batched(
                || {
                    let mut registry = create_registry(rows);
                    registry
                        .create_session(
                            SessionConfig::new("employees").id("by_department").group_by(["department"]),
                            false,
                        )
                        .unwrap();
                    registry
                },
                |mut registry| {
                    registry.update("employees", vec![employee(7)]).unwrap();
                    black_box(registry)
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    update_fanout_benchmark,
    sorted_read_benchmark,
    grouped_update_benchmark
);
criterion_main!(benches);
