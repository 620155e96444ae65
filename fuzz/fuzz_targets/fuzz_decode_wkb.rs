#![no_main]

use libfuzzer_sys::fuzz_target;

use cutter_geom::{coord_count, is_valid, wkb};

/// Blobs stored in real layers rarely exceed a few KiB; larger inputs only slow the fuzzer down.
const MAX_INPUT_BYTES: usize = 64 * 1024;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    // Headers are decoded on their own when checking registered layer types.
    let _ = wkb::peek_type(data);

    let shape = match wkb::decode(data) {
        Ok(shape) => shape,
        Err(_) => return,
    };

    let _ = shape.bbox();
    let _ = shape.elevation();
    std::hint::black_box(is_valid(shape.geometry()));

    // Whatever decodes must survive a re-encode with the same structure.
    let bytes = wkb::encode(&shape);
    let again = wkb::decode(&bytes).expect("re-encoded blob must decode");
    assert_eq!(again.kind(), shape.kind());
    assert_eq!(again.dimension(), shape.dimension());
    assert_eq!(
        coord_count(again.geometry()),
        coord_count(shape.geometry()),
        "coordinate count changed across re-encode"
    );
});
