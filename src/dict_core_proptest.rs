#![cfg(test)]

// Property tests for DictCore kept inside the crate so they can reach the
// internal slot accessors without feature gates.

use crate::dict_core::DictCore;
use core::hash::{BuildHasher, Hasher};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys, pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Remove(usize),
    GetOrInsert(usize, i32),
    Get(usize),
    Contains(String),
    Clear,
    Compact,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            3 => idx.clone().prop_map(OpI::Remove),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::GetOrInsert(i, v)),
            2 => idx.clone().prop_map(OpI::Get),
            2 => prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Compact),
            2 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// One scenario run against a model map. Invariants exercised across random
// operation sequences:
// - insert/overwrite/remove/get/contains parity with std::collections::HashMap.
// - `get_or_insert_with` never overwrites a present key and lands the
//   inserted value in a slot whose key matches.
// - slot-scan iteration yields each live entry exactly once, values
//   matching the model.
// - compaction leaves no holes (`top_slot == len`) and changes nothing
//   observable.
// - `len` parity after every op.
fn run_scenario<S>(pool: Vec<String>, ops: Vec<OpI>, hasher: S) -> Result<(), TestCaseError>
where
    S: BuildHasher + Clone + Default,
{
    let mut sut: DictCore<String, i32, S> = DictCore::with_hasher(hasher);
    let mut model: HashMap<String, i32> = HashMap::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = pool[i].clone();
                let prev = sut.insert(k.clone(), v);
                let model_prev = model.insert(k, v);
                prop_assert_eq!(prev, model_prev);
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                let got = sut.remove(k.as_str());
                let model_got = model.remove(k);
                match (&got, &model_got) {
                    (Some((kk, _)), Some(_)) => prop_assert_eq!(kk, k),
                    (None, None) => {}
                    _ => prop_assert!(false, "remove presence mismatch"),
                }
                prop_assert_eq!(got.map(|(_, v)| v), model_got);
            }
            OpI::GetOrInsert(i, v) => {
                let k = pool[i].clone();
                let slot = sut.get_or_insert_with(k.clone(), || v);
                let expected = *model.entry(k.clone()).or_insert(v);
                prop_assert_eq!(sut.value_at(slot).copied(), Some(expected));
                prop_assert_eq!(sut.key_at(slot), Some(&k));
            }
            OpI::Get(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.get(k.as_str()), model.get(k));
            }
            OpI::Contains(s) => {
                prop_assert_eq!(sut.contains(s.as_str()), model.contains_key(&s));
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.top_slot(), 0);
            }
            OpI::Compact => {
                sut.compact();
                prop_assert_eq!(sut.top_slot(), sut.len());
            }
            OpI::Iterate => {
                let mut seen: BTreeSet<String> = BTreeSet::new();
                let mut count = 0;
                for slot in 0..sut.top_slot() {
                    if let Some((k, v)) = sut.entry_at(slot) {
                        prop_assert_eq!(model.get(k), Some(v));
                        seen.insert(k.clone());
                        count += 1;
                    }
                }
                prop_assert_eq!(count, model.len(), "each live entry exactly once");
                prop_assert_eq!(count, seen.len(), "no duplicate keys in a scan");
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(pool, ops, std::collections::hash_map::RandomState::new())?;
    }
}

// Collision variant using a constant hasher to stress equality resolution,
// tombstone chains, and growth under worst-case bucket contention.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(pool, ops, ConstBuildHasher)?;
    }
}
