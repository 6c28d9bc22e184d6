#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4_serialize::stream::{Feed, Sink};
use lz4_serialize::{compress_block, decompress_block, CompressionSettings, ElementType, LZ4StreamReader, LZ4StreamWriter};

fuzz_target!(|data: &[u8]| {
    let settings = CompressionSettings::default();
    let mut writer = LZ4StreamWriter::new(Sink::memory().unwrap(), &settings).unwrap();
    // the first byte picks the span size, so appends land at varying offsets
    let span = data.first().map_or(1, |&b| b as usize + 1);
    for piece in data.chunks(span) {
        writer.append(piece).expect("Could not append to stream");
    }
    let stream = writer.finish().expect("Could not finish stream").unwrap();

    let mut reader = LZ4StreamReader::new(Feed::from_slice(&stream), None).expect("Could not read stream header");
    let mut roundtripped = vec![0u8; data.len()];
    reader.consume(&mut roundtripped).expect("Could not read decompressed data");
    assert!(roundtripped == data);

    let framed = compress_block(data).expect("Could not compress block");
    assert_eq!(decompress_block(&framed).expect("Could not decompress block"), (ElementType::Raw, data.to_vec()));
});
