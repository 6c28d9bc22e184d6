#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4_serialize::stream::Feed;
use lz4_serialize::{decompress_block, unserialize_stream_from_slice, LZ4StreamReader};

fuzz_target!(|data: &[u8]| {
    // random bytes are not valid streams or blocks, so errors are expected here; panics are not
    let _ = unserialize_stream_from_slice::<Vec<(u64, f64)>>(data, None);
    let _ = decompress_block(data);

    if let Ok(mut reader) = LZ4StreamReader::new(Feed::from_slice(data), None) {
        let mut buf = [0u8; 4096];
        while reader.consume(&mut buf).is_ok() {}
    }
});
