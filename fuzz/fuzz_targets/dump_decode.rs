#![no_main]

use libfuzzer_sys::fuzz_target;
use kotekan_runner_core::dump::{decode_records, encode_record};

fuzz_target!(|data: &[u8]| {
    // 디코딩된 프레임은 다시 인코딩한 뒤에도 같은 개수로 디코딩되어야 함
    if let Ok(frames) = decode_records(data) {
        let mut encoded = Vec::with_capacity(data.len());
        for frame in &frames {
            let record = encode_record(frame).expect("decoded frame must re-encode");
            encoded.extend_from_slice(&record);
        }
        assert_eq!(decode_records(&encoded).map(|f| f.len()).ok(), Some(frames.len()));
    }
});
