//! Benchmarks for Table mutations and compaction.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use horizon_core::schema::ColumnDef;
use horizon_core::{RowInput, Value};
use horizon_storage::{Origin, Table, TableOptions, Unresolved};

fn create_table() -> Table {
    Table::new(
        "bench",
        "quotes",
        vec![
            ColumnDef::new("id").primary_key(),
            ColumnDef::new("price"),
            ColumnDef::new("symbol").secondary_key(),
            ColumnDef::new("sector").secondary_key(),
        ],
        TableOptions::default(),
        None,
    )
    .unwrap()
}

fn quote(i: i64) -> RowInput {
    let sectors = ["Tech", "Finance", "Health", "Energy", "Consumer"];
    RowInput::named([
        ("id", Value::Int64(i)),
        ("price", Value::Float64(100.0 + (i as f64) * 0.1)),
        ("symbol", Value::String(format!("SYM{}", i))),
        ("sector", Value::from(sectors[(i as usize) % sectors.len()])),
    ])
}

fn populate(table: &mut Table, count: i64) {
    table.add((1..=count).map(quote).collect(), Origin::local(), &Unresolved);
}

/// Benchmark: bulk add into an empty table
fn table_add_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_add");
    for count in [1_000i64, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_batched(
                create_table,
                |mut table| {
                    populate(&mut table, count);
                    black_box(table)
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Benchmark: tombstoning rows, then one compacting read
fn table_remove_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_remove");
    let total = 100_000i64;
    for remove_count in [100i64, 1_000, 10_000].iter() {
        group.bench_with_input(
            BenchmarkId::new("remove_then_compact", remove_count),
            remove_count,
            |b, &remove_count| {
                b.iter_batched(
                    || {
                        let mut table = create_table();
                        populate(&mut table, total);
                        table
                    },
                    |mut table| {
                        let ids: Vec<Value> = (1..=remove_count).map(Value::Int64).collect();
                        table.remove(&ids, Origin::local());
                        black_box(table.get_all().len())
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

/// Benchmark: updates that move rows between index buckets
fn table_update_benchmark(c: &mut Criterion) {
    c.bench_function("table_update_sector", |b| {
        b.iter_batched(
            || {
                let mut table = create_table();
                populate(&mut table, 10_000);
                table
            },
            |mut table| {
                let updates = (1..=10_000i64)
                    .map(|i| RowInput::named([("id", Value::Int64(i)), ("sector", Value::from("Utilities"))]))
                    .collect();
                table.update(updates, Origin::local(), &Unresolved);
                black_box(table)
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    table_add_benchmark,
    table_remove_benchmark,
    table_update_benchmark
);
criterion_main!(benches);
