#![no_main]

use libfuzzer_sys::fuzz_target;

use cutter_geom::{parse_wkt, to_wkt, wkb};

const MAX_INPUT_BYTES: usize = 16 * 1024;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    let input = String::from_utf8_lossy(data);
    let geometry = match parse_wkt(&input) {
        Ok(geometry) => geometry,
        Err(_) => return,
    };

    std::hint::black_box(to_wkt(&geometry));
    let blob = wkb::encode_geometry(&geometry);
    wkb::decode(&blob).expect("encoded geometry must decode");
});
