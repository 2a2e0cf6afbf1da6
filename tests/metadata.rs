use flac_meta::Error;
use flac_meta::metadata::{
    Block, BlockType, Opaque, Streaminfo, VorbisComment, read_blocks, write_blocks,
};

fn block(last: bool, block_type: u8, data: &[u8]) -> Vec<u8> {
    let mut block = vec![(u8::from(last) << 7) | block_type];
    block.extend_from_slice(&u32::try_from(data.len()).unwrap().to_be_bytes()[1..]);
    block.extend_from_slice(data);
    block
}

fn comment(vendor: &[u8], entries: &[&[u8]]) -> Vec<u8> {
    let mut data = vec![];
    data.extend_from_slice(&u32::try_from(vendor.len()).unwrap().to_le_bytes());
    data.extend_from_slice(vendor);
    data.extend_from_slice(&u32::try_from(entries.len()).unwrap().to_le_bytes());
    for entry in entries {
        data.extend_from_slice(&u32::try_from(entry.len()).unwrap().to_le_bytes());
        data.extend_from_slice(entry);
    }
    data
}

fn sample_flac() -> Vec<u8> {
    let mut flac = b"fLaC".to_vec();
    flac.extend(block(false, 0, &[0x10; 34]));
    flac.extend(block(false, 3, &[0x00; 18]));
    flac.extend(block(
        false,
        4,
        &comment(
            b"reference libFLAC 1.4.3 20230623",
            &[b"TITLE=Testing", b"ARTIST=Artist 1", b"artist=Artist 2"],
        ),
    ));
    flac.extend(block(false, 2, b"riffsome application data"));
    flac.extend(block(false, 100, &[1, 2, 3]));
    flac.extend(block(true, 1, &[0x00; 8]));
    flac.extend([0xFF, 0xF8, 0x69, 0x08, 0x00, 0x12, 0x34]);
    flac
}

// returns (last, type, size) of each block header, and frame data offset
fn headers(flac: &[u8]) -> (Vec<(bool, u8, usize)>, usize) {
    assert_eq!(&flac[0..4], b"fLaC");
    let mut offset = 4;
    let mut headers = vec![];
    loop {
        let last = flac[offset] & 0x80 != 0;
        let block_type = flac[offset] & 0x7F;
        let size = u32::from_be_bytes([0, flac[offset + 1], flac[offset + 2], flac[offset + 3]]);
        let size = usize::try_from(size).unwrap();
        headers.push((last, block_type, size));
        offset += 4 + size;
        assert!(offset <= flac.len());
        if last {
            return (headers, offset);
        }
    }
}

fn roundtrip_test(flac: &[u8]) {
    use std::io::Read;

    let mut data = std::io::Cursor::new(flac);
    let blocks = dbg!(
        read_blocks(data.by_ref())
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    );
    let mut output = Vec::new();
    write_blocks(&mut output, blocks).unwrap();
    std::io::copy(&mut data, &mut output).unwrap();
    assert_eq!(flac.len(), output.len());
    assert_eq!(flac, output.as_slice());
}

#[test]
fn test_block_roundtrips() {
    roundtrip_test(&sample_flac());

    // STREAMINFO only
    let mut flac = b"fLaC".to_vec();
    flac.extend(block(true, 0, &[0x10; 34]));
    roundtrip_test(&flac);

    // empty STREAMINFO
    let mut flac = b"fLaC".to_vec();
    flac.extend(block(true, 0, &[]));
    roundtrip_test(&flac);

    // empty comment
    let mut flac = b"fLaC".to_vec();
    flac.extend(block(false, 0, &[0x10; 34]));
    flac.extend(block(true, 4, &comment(b"", &[])));
    flac.extend([0xFF, 0xF8]);
    roundtrip_test(&flac);
}

#[test]
fn test_read_blocks() {
    let blocks = read_blocks(sample_flac().as_slice())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(
        blocks.iter().map(|b| b.block_type()).collect::<Vec<_>>(),
        vec![
            BlockType::Streaminfo,
            BlockType::SeekTable,
            BlockType::VorbisComment,
            BlockType::Application,
            BlockType::Reserved(100),
            BlockType::Padding,
        ],
    );

    assert_eq!(blocks[0], Block::Streaminfo(Streaminfo { data: vec![0x10; 34] }));
    assert_eq!(
        blocks[4],
        Block::Opaque(Opaque {
            block_type: BlockType::Reserved(100),
            data: vec![1, 2, 3],
        }),
    );

    match &blocks[2] {
        Block::VorbisComment(comment) => {
            assert_eq!(comment.vendor_string, b"reference libFLAC 1.4.3 20230623");
            assert_eq!(comment.get("title"), Some(b"Testing".as_slice()));
            assert_eq!(comment.all("ARTIST").count(), 2);
        }
        other => panic!("unexpected block {other:?}"),
    }
}

#[test]
fn test_reader_stops_at_last_block() {
    use std::io::Read;

    let flac = sample_flac();
    let mut reader = read_blocks(flac.as_slice());
    assert_eq!(reader.by_ref().count(), 6);
    assert!(reader.next().is_none());

    let mut frames = vec![];
    reader.into_inner().read_to_end(&mut frames).unwrap();
    assert_eq!(frames, [0xFF, 0xF8, 0x69, 0x08, 0x00, 0x12, 0x34]);
}

#[test]
fn test_first_block_is_streaminfo() {
    // whatever type the first block claims to be
    let mut flac = b"fLaC".to_vec();
    flac.extend(block(true, 4, b"not a comment"));

    assert_eq!(
        read_blocks(flac.as_slice())
            .collect::<Result<Vec<_>, _>>()
            .unwrap(),
        vec![Block::Streaminfo(Streaminfo {
            data: b"not a comment".to_vec()
        })],
    );
}

#[test]
fn test_reader_stops_after_error() {
    let mut flac = b"fLaC".to_vec();
    flac.extend(block(false, 0, &[0x10; 34]));
    flac.extend(block(true, 4, b"NOEQUALSHERE"));

    let mut reader = read_blocks(flac.as_slice());
    assert!(matches!(reader.next(), Some(Ok(Block::Streaminfo(_)))));
    assert!(matches!(reader.next(), Some(Err(Error::Truncated(_)))));
    assert!(reader.next().is_none());
}

#[test]
fn test_write_headers() {
    let blocks = read_blocks(sample_flac().as_slice())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    let mut output = vec![];
    write_blocks(&mut output, &blocks).unwrap();

    let (headers, frames) = headers(&output);
    assert_eq!(frames, output.len());
    assert_eq!(headers.iter().filter(|(last, _, _)| *last).count(), 1);
    assert!(headers.last().unwrap().0);
    assert_eq!(
        headers.iter().map(|(_, t, _)| *t).collect::<Vec<_>>(),
        vec![0, 3, 4, 2, 100, 1],
    );
}

fn perform_test(f: impl FnOnce(&mut Vec<Block>)) -> Result<(), Error> {
    let mut blocks = read_blocks(sample_flac().as_slice())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    f(&mut blocks);

    write_blocks(std::io::sink(), blocks)
}

#[test]
fn test_write_metadata() {
    use flac_meta::metadata::fields::TITLE;

    assert!(matches!(perform_test(|_| { /* do nothing */ }), Ok(())));

    // STREAMINFO must be present
    assert!(matches!(
        perform_test(|blocks| {
            blocks.remove(0);
        }),
        Err(Error::MissingStreaminfo)
    ));

    assert!(matches!(
        perform_test(|blocks| blocks.clear()),
        Err(Error::MissingStreaminfo)
    ));

    // only one STREAMINFO allowed
    assert!(matches!(
        perform_test(|blocks| {
            let streaminfo = blocks[0].clone();
            blocks.push(streaminfo);
        }),
        Err(Error::MultipleStreaminfo)
    ));

    // though an opaque block of type 0 is carried as-is
    assert!(matches!(
        perform_test(|blocks| {
            blocks.push(
                Opaque {
                    block_type: BlockType::Streaminfo,
                    data: vec![],
                }
                .into(),
            );
        }),
        Ok(())
    ));

    // only one VORBIS_COMMENT allowed
    assert!(matches!(
        perform_test(|blocks| {
            let mut comment = VorbisComment::default();
            comment.insert(TITLE, "Test Title");
            blocks.push(comment.into());
        }),
        Err(Error::MultipleVorbisComment)
    ));

    // VORBIS_COMMENT must not be opaque
    assert!(matches!(
        perform_test(|blocks| {
            blocks.push(
                Opaque {
                    block_type: BlockType::VorbisComment,
                    data: vec![],
                }
                .into(),
            );
        }),
        Err(Error::OpaqueVorbisComment)
    ));

    assert!(matches!(
        perform_test(|blocks| {
            blocks.push(
                Opaque {
                    block_type: BlockType::Reserved(4),
                    data: vec![],
                }
                .into(),
            );
        }),
        Err(Error::OpaqueVorbisComment)
    ));

    // blocks must fit in 24 bits
    assert!(matches!(
        perform_test(|blocks| {
            blocks.push(
                Opaque {
                    block_type: BlockType::Padding,
                    data: vec![0; 1 << 24],
                }
                .into(),
            );
        }),
        Err(Error::BlockTooLarge(BlockType::Padding))
    ));
}

#[test]
fn test_reserved_block_types() {
    fn write_reserved(t: u8) -> (Result<(), Error>, Vec<u8>) {
        let mut output = vec![];
        let result = write_blocks(
            &mut output,
            [
                Block::Streaminfo(Streaminfo::default()),
                Block::Opaque(Opaque {
                    block_type: BlockType::Reserved(t),
                    data: vec![0x01; 4],
                }),
            ],
        );
        (result, output)
    }

    for t in [7, 100, 127] {
        let (result, output) = write_reserved(t);
        assert!(result.is_ok());
        assert_eq!(
            read_blocks(output.as_slice())
                .nth(1)
                .unwrap()
                .unwrap()
                .block_type(),
            BlockType::Reserved(t)
        );
    }

    // these would read back as a defined type, or not fit in 7 bits,
    // so the block isn't started
    for t in [0, 5, 6, 128, 200, 255] {
        let (result, output) = write_reserved(t);
        assert!(matches!(result, Err(Error::InvalidBlockType(i)) if i == t));
        assert_eq!(output, b"fLaC\x00\x00\x00\x00");
    }
}

#[test]
fn test_largest_block() {
    let streaminfo = Streaminfo {
        data: vec![0; (1 << 24) - 1],
    };

    let mut output = vec![];
    write_blocks(&mut output, [Block::Streaminfo(streaminfo)]).unwrap();
    assert_eq!(&output[4..8], &[0b1_0000000, 0xFF, 0xFF, 0xFF]);
    assert_eq!(output.len(), 4 + 4 + (1 << 24) - 1);
}
