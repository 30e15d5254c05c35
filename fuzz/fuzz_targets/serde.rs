#![no_main]

use count_distinct::{Representation, RepresentationTrait};
use libfuzzer_sys::fuzz_target;
use wyhash::WyHash;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut set) = serde_json::from_slice::<Representation<WyHash>>(data) {
        let len = set.len();
        let value = vec![0xff; set.value_length()];
        let inserted = set.insert_bytes(&value).unwrap();
        assert_eq!(set.len(), len + usize::from(inserted));
        assert!(set.contains_bytes(&value));
    }
});
