//! Property-based tests for horizon-storage using proptest.

use horizon_core::schema::ColumnDef;
use horizon_core::{RowInput, Value};
use horizon_storage::{Origin, Table, TableOptions, Unresolved};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug)]
enum Op {
    Add(i64, u8),
    Update(i64, u8),
    Remove(i64),
    Compact,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..20, 0u8..4).prop_map(|(id, s)| Op::Add(id, s)),
        (0i64..20, 0u8..4).prop_map(|(id, s)| Op::Update(id, s)),
        (0i64..20).prop_map(Op::Remove),
        Just(Op::Compact),
    ]
}

fn status(s: u8) -> Value {
    Value::String(format!("s{}", s))
}

fn input(id: i64, s: u8) -> RowInput {
    RowInput::named([("id", Value::Int64(id)), ("status", status(s))])
}

fn table() -> Table {
    Table::new(
        "test",
        "items",
        vec![ColumnDef::new("id").primary_key(), ColumnDef::new("status").secondary_key()],
        TableOptions::default(),
        None,
    )
    .unwrap()
}

proptest! {
    /// After any sequence of mutations the table agrees with a map model:
    /// one live row per key, and every secondary bucket holds exactly the
    /// live rows with that value.
    #[test]
    fn table_matches_model(ops in prop::collection::vec(op(), 1..120)) {
        let mut table = table();
        let mut model: BTreeMap<i64, u8> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Add(id, s) => {
                    table.add(vec![input(id, s)], Origin::local(), &Unresolved);
                    model.entry(id).or_insert(s);
                }
                Op::Update(id, s) => {
                    table.update(vec![input(id, s)], Origin::local(), &Unresolved);
                    model.insert(id, s);
                }
                Op::Remove(id) => {
                    table.remove(&[Value::Int64(id)], Origin::local());
                    model.remove(&id);
                }
                Op::Compact => table.compact(),
            }
        }

        prop_assert_eq!(table.len(), model.len());
        for s in 0u8..4 {
            let bucket: BTreeSet<i64> = table
                .index_bucket("status", &status(s))
                .iter()
                .filter_map(Value::as_i64)
                .collect();
            let expected: BTreeSet<i64> =
                model.iter().filter(|(_, v)| **v == s).map(|(k, _)| *k).collect();
            prop_assert_eq!(bucket.len(), table.index_bucket("status", &status(s)).len());
            prop_assert_eq!(bucket, expected);
        }

        let live: Vec<i64> = table.get_all().iter().filter_map(|r| r.get(0)?.as_i64()).collect();
        let unique: BTreeSet<i64> = live.iter().copied().collect();
        prop_assert_eq!(live.len(), unique.len());
        prop_assert_eq!(unique, model.keys().copied().collect::<BTreeSet<_>>());
    }

    /// Removing an id twice leaves the same visible rows as removing it once.
    #[test]
    fn remove_is_idempotent(ids in prop::collection::vec(0i64..10, 1..10), victim in 0i64..10) {
        let mut once = table();
        let mut twice = table();
        let inputs: Vec<RowInput> = ids.iter().map(|&id| input(id, 0)).collect();
        once.add(inputs.clone(), Origin::local(), &Unresolved);
        twice.add(inputs, Origin::local(), &Unresolved);

        once.remove(&[Value::Int64(victim)], Origin::local());
        twice.remove(&[Value::Int64(victim)], Origin::local());
        prop_assert!(twice.remove(&[Value::Int64(victim)], Origin::local()).is_none());

        let a: Vec<_> = once.get_all().iter().map(|r| r.values().to_vec()).collect();
        let b: Vec<_> = twice.get_all().iter().map(|r| r.values().to_vec()).collect();
        prop_assert_eq!(a, b);
    }
}
