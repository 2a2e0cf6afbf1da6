// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

fn block(last: bool, block_type: u8, data: &[u8]) -> Vec<u8> {
    let mut block = vec![(u8::from(last) << 7) | block_type];
    block.extend_from_slice(&u32::try_from(data.len()).unwrap().to_be_bytes()[1..]);
    block.extend_from_slice(data);
    block
}

// returns file and the size of its metadata area
fn sample_flac() -> (Vec<u8>, usize) {
    let comment: &[u8] = &[
        0x04, 0x00, 0x00, 0x00, b't', b'e', b's', b't', // vendor
        0x02, 0x00, 0x00, 0x00, // 2 entries
        0x0a, 0x00, 0x00, 0x00, b'T', b'I', b'T', b'L', b'E', b'=', b'S', b'o', b'n', b'g',
        0x08, 0x00, 0x00, 0x00, b'A', b'R', b'T', b'I', b'S', b'T', b'=', b'A',
    ];

    let mut flac = b"fLaC".to_vec();
    flac.extend(block(false, 0, &[0x10; 34]));
    flac.extend(block(false, 4, comment));
    flac.extend(block(false, 3, &[0x00; 18]));
    flac.extend(block(true, 1, &[0x00; 16]));
    let metadata = flac.len();
    flac.extend((0..64).map(|i| i as u8));
    (flac, metadata)
}

#[test]
fn test_truncation() {
    use flac_meta::parse;

    let (flac, metadata) = sample_flac();

    // cutting the metadata area anywhere is an error
    for len in 0..metadata {
        assert!(parse(&flac[0..len]).is_err());
    }

    // cutting the frame data just leaves less of it
    for len in metadata..=flac.len() {
        assert_eq!(parse(&flac[0..len]).unwrap().frames, &flac[metadata..len]);
    }
}

#[test]
fn test_metadata_corruption() {
    use flac_meta::{WriteOptions, parse};

    let (flac, metadata) = sample_flac();

    // ensure test file is okay
    assert!(parse(flac.as_slice()).is_ok());

    // flipping bits in the metadata area may or may not
    // produce a valid stream, but whatever parses
    // must survive a round trip
    for _ in 0..1000 {
        let mut flac = flac.clone();
        flac[fastrand::usize(0..metadata)] ^= 1 << fastrand::u32(0..8);

        if let Ok(stream) = parse(flac.as_slice()) {
            let mut output = vec![];
            stream
                .write_with(&mut output, &WriteOptions::default())
                .unwrap();
            assert_eq!(parse(output.as_slice()).unwrap(), stream);
        }
    }
}
