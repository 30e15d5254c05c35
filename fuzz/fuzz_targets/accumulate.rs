#![no_main]

use std::collections::HashSet;

use count_distinct::{accumulate, combine, finalize, State, ValueType};
use libfuzzer_sys::fuzz_target;
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let width = [1, 2, 4, 8][data[0] as usize % 4];
    let ty = ValueType::fixed(width as u16);
    let split_index = wyhash(data, 0) as usize % data.len();
    let (first_half, second_half) = data.split_at(split_index);

    let mut expected = HashSet::new();
    let mut state1: State = None;
    for chunk in first_half.chunks_exact(width) {
        state1 = accumulate(state1, Some(chunk), ty).unwrap();
        expected.insert(chunk);
        assert_eq!(finalize(state1.as_ref()), Some(expected.len() as i64));
    }

    let mut state2: State = None;
    for chunk in second_half.chunks_exact(width) {
        // every zero-led value is treated as null
        let value = (chunk[0] != 0).then_some(chunk);
        state2 = accumulate(state2, value, ty).unwrap();
        if let Some(value) = value {
            expected.insert(value);
        }
    }

    let merged = combine(state1, state2.as_ref()).unwrap();
    let expected = (!expected.is_empty()).then_some(expected.len() as i64);
    assert_eq!(finalize(merged.as_ref()), expected);
});
