// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling a FLAC file's metadata blocks
//!
//! Many items are capitalized simply because they were capitalized
//! in the original FLAC format documentation.
//!
//! # Metadata Blocks
//!
//! FLAC defines seven different metadata block types
//!
//! | Block Type | Handling |
//! |-----------:|----------|
//! | STREAMINFO | carried as opaque data, always first
//! | PADDING | carried as opaque data
//! | APPLICATION | carried as opaque data
//! | SEEKTABLE | carried as opaque data
//! | VORBIS_COMMENT | decoded into a [`VorbisComment`]
//! | CUESHEET | carried as opaque data
//! | PICTURE | carried as opaque data
//!
//! Reserved block types 7 through 127 are also carried
//! as opaque data.

use crate::Error;
use bitstream_io::{
    BigEndian, BitRead, BitReader, BitWrite, FromBitStream, ToBitStream, ToBitStreamUsing,
};
use tracing::debug;

mod comment;

pub use comment::{Tag, VorbisComment, fields};

/// The marker which must start every FLAC stream
pub const FLAC_TAG: &[u8; 4] = b"fLaC";

/// A FLAC metadata block header
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 1    | `last` | final metadata block in file |
/// | 7    | `block_type` | type of block |
/// | 24   | `size` | block size, in bytes |
///
/// # Example
/// ```
/// use bitstream_io::{BitReader, BitRead, BigEndian};
/// use flac_meta::metadata::{BlockHeader, BlockType};
///
/// let data: &[u8] = &[0b1_0000100, 0x00, 0x01, 0x02];
/// let mut r = BitReader::endian(data, BigEndian);
/// assert_eq!(
///     r.parse::<BlockHeader>().unwrap(),
///     BlockHeader {
///         last: true,
///         block_type: BlockType::VorbisComment,
///         size: 0x00_01_02u16.into(),
///     },
/// );
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockHeader {
    /// Whether we are the final block
    pub last: bool,
    /// Our block type
    pub block_type: BlockType,
    /// Our block size, in bytes
    pub size: BlockSize,
}

impl BlockHeader {
    /// Builds header for the given block data
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlockTooLarge`] if the data
    /// does not fit in a 24-bit size field,
    /// or [`Error::InvalidBlockType`] if the block type
    /// is [`BlockType::Reserved`] with a value outside 7 to 127.
    pub fn new(last: bool, block_type: BlockType, data: &[u8]) -> Result<Self, Error> {
        if let BlockType::Reserved(t @ (0..=6 | 128..)) = block_type {
            return Err(Error::InvalidBlockType(t));
        }

        Ok(Self {
            last,
            block_type,
            size: data
                .len()
                .try_into()
                .map_err(|BlockSizeOverflow| Error::BlockTooLarge(block_type))?,
        })
    }
}

impl FromBitStream for BlockHeader {
    type Error = std::io::Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            last: r.read::<1, _>()?,
            block_type: r.parse()?,
            size: r.parse()?,
        })
    }
}

impl ToBitStream for BlockHeader {
    type Error = std::io::Error;

    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> std::io::Result<()> {
        w.write::<1, _>(self.last)?;
        w.build(&self.block_type)?;
        w.build(&self.size)
    }
}

/// A FLAC metadata block type
///
/// Only STREAMINFO and VORBIS_COMMENT have any
/// meaning to this library, but the remaining
/// defined types are named for convenience.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum BlockType {
    /// The STREAMINFO block
    Streaminfo,
    /// The PADDING block
    Padding,
    /// The APPLICATION block
    Application,
    /// The SEEKTABLE block
    SeekTable,
    /// The VORBIS_COMMENT block
    VorbisComment,
    /// The CUESHEET block
    Cuesheet,
    /// The PICTURE block
    Picture,
    /// A reserved block type, from 7 to 127
    ///
    /// Other values would not read back as the same type,
    /// so writing them fails with [`Error::InvalidBlockType`].
    Reserved(u8),
}

impl From<u8> for BlockType {
    fn from(t: u8) -> Self {
        match t {
            0 => Self::Streaminfo,
            1 => Self::Padding,
            2 => Self::Application,
            3 => Self::SeekTable,
            4 => Self::VorbisComment,
            5 => Self::Cuesheet,
            6 => Self::Picture,
            t => Self::Reserved(t),
        }
    }
}

impl From<BlockType> for u8 {
    fn from(t: BlockType) -> Self {
        match t {
            BlockType::Streaminfo => 0,
            BlockType::Padding => 1,
            BlockType::Application => 2,
            BlockType::SeekTable => 3,
            BlockType::VorbisComment => 4,
            BlockType::Cuesheet => 5,
            BlockType::Picture => 6,
            BlockType::Reserved(t) => t,
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Streaminfo => "STREAMINFO".fmt(f),
            Self::Padding => "PADDING".fmt(f),
            Self::Application => "APPLICATION".fmt(f),
            Self::SeekTable => "SEEKTABLE".fmt(f),
            Self::VorbisComment => "VORBIS_COMMENT".fmt(f),
            Self::Cuesheet => "CUESHEET".fmt(f),
            Self::Picture => "PICTURE".fmt(f),
            Self::Reserved(t) => write!(f, "reserved type {t}"),
        }
    }
}

impl FromBitStream for BlockType {
    type Error = std::io::Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> std::io::Result<Self> {
        r.read::<7, u8>().map(Self::from)
    }
}

impl ToBitStream for BlockType {
    type Error = std::io::Error;

    // reserved values over 127 are rejected by the 7-bit write
    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> std::io::Result<()> {
        w.write::<7, u8>((*self).into())
    }
}

/// A 24-bit block size value, with safeguards against overflow
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct BlockSize(u32);

impl BlockSize {
    /// The largest possible block size, in bytes
    pub const MAX: u32 = (1 << 24) - 1;

    /// Our current value as a u32
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl FromBitStream for BlockSize {
    type Error = std::io::Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> Result<Self, Self::Error> {
        r.read::<24, _>().map(Self)
    }
}

impl ToBitStream for BlockSize {
    type Error = std::io::Error;

    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> Result<(), Self::Error> {
        w.write::<24, _>(self.0)
    }
}

impl From<u8> for BlockSize {
    fn from(u: u8) -> Self {
        Self(u.into())
    }
}

impl From<u16> for BlockSize {
    fn from(u: u16) -> Self {
        Self(u.into())
    }
}

impl From<BlockSize> for usize {
    fn from(BlockSize(u): BlockSize) -> Self {
        // 24 bits always fit
        u as usize
    }
}

impl TryFrom<usize> for BlockSize {
    type Error = BlockSizeOverflow;

    fn try_from(u: usize) -> Result<Self, Self::Error> {
        u32::try_from(u)
            .map_err(|_| BlockSizeOverflow)
            .and_then(|s| (s <= Self::MAX).then_some(Self(s)).ok_or(BlockSizeOverflow))
    }
}

impl TryFrom<u32> for BlockSize {
    type Error = BlockSizeOverflow;

    fn try_from(u: u32) -> Result<Self, Self::Error> {
        (u <= Self::MAX).then_some(Self(u)).ok_or(BlockSizeOverflow)
    }
}

/// An error that occurs when trying to build an overly large `BlockSize`
#[derive(Copy, Clone, Debug)]
pub struct BlockSizeOverflow;

impl std::error::Error for BlockSizeOverflow {}

impl std::fmt::Display for BlockSizeOverflow {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        "value too large for BlockSize".fmt(f)
    }
}

/// A STREAMINFO metadata block
///
/// This block must *always* be present in a FLAC file
/// and must *always* be the first metadata block in the stream.
/// Its contents are not interpreted, only carried
/// through unchanged.
///
/// # Important
///
/// Changing this block's data to something that differs
/// from the file's frame headers will render it unplayable.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Streaminfo {
    /// The block's raw data
    pub data: Vec<u8>,
}

/// Any metadata block whose contents are carried as raw bytes
///
/// PADDING, APPLICATION, SEEKTABLE, CUESHEET, PICTURE
/// and reserved blocks are all stored this way,
/// in whatever order they appear in the stream.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Opaque {
    /// The block's type, as read
    pub block_type: BlockType,
    /// The block's raw data
    pub data: Vec<u8>,
}

/// Any possible FLAC metadata block
///
/// Each block consists of a [`BlockHeader`] followed by the block's contents.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Block {
    /// The STREAMINFO block
    Streaminfo(Streaminfo),
    /// The VORBIS_COMMENT block
    VorbisComment(VorbisComment),
    /// Any other block
    Opaque(Opaque),
}

impl Block {
    /// Our block type
    pub fn block_type(&self) -> BlockType {
        match self {
            Self::Streaminfo(_) => BlockType::Streaminfo,
            Self::VorbisComment(_) => BlockType::VorbisComment,
            Self::Opaque(o) => o.block_type,
        }
    }
}

impl From<Streaminfo> for Block {
    fn from(streaminfo: Streaminfo) -> Self {
        Self::Streaminfo(streaminfo)
    }
}

impl From<VorbisComment> for Block {
    fn from(comment: VorbisComment) -> Self {
        Self::VorbisComment(comment)
    }
}

impl From<Opaque> for Block {
    fn from(opaque: Opaque) -> Self {
        Self::Opaque(opaque)
    }
}

/// A shared reference to a metadata block
#[derive(Debug, Copy, Clone)]
pub enum BlockRef<'b> {
    /// The STREAMINFO block
    Streaminfo(&'b Streaminfo),
    /// The VORBIS_COMMENT block
    VorbisComment(&'b VorbisComment),
    /// Any other block
    Opaque(&'b Opaque),
}

/// A trait for items which can make cheap [`BlockRef`] values.
pub trait AsBlockRef {
    /// Returns fresh reference to ourself.
    fn as_block_ref(&self) -> BlockRef<'_>;
}

impl AsBlockRef for BlockRef<'_> {
    fn as_block_ref(&self) -> BlockRef<'_> {
        *self
    }
}

impl AsBlockRef for Block {
    fn as_block_ref(&self) -> BlockRef<'_> {
        match self {
            Self::Streaminfo(s) => BlockRef::Streaminfo(s),
            Self::VorbisComment(v) => BlockRef::VorbisComment(v),
            Self::Opaque(o) => BlockRef::Opaque(o),
        }
    }
}

impl<T: AsBlockRef> AsBlockRef for &T {
    fn as_block_ref(&self) -> BlockRef<'_> {
        <T as AsBlockRef>::as_block_ref(*self)
    }
}

impl ToBitStreamUsing for BlockRef<'_> {
    type Context = bool;
    type Error = Error;

    // builds to writer with header
    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W, is_last: bool) -> Result<(), Error> {
        fn write_block<W: BitWrite + ?Sized>(
            w: &mut W,
            is_last: bool,
            block_type: BlockType,
            data: &[u8],
        ) -> Result<(), Error> {
            let header = BlockHeader::new(is_last, block_type, data)?;
            debug!(%block_type, size = header.size.get(), last = is_last, "writing block");
            w.build(&header)?;
            w.write_bytes(data)?;
            Ok(())
        }

        match self {
            Self::Streaminfo(streaminfo) => {
                write_block(w, is_last, BlockType::Streaminfo, &streaminfo.data)
            }
            Self::VorbisComment(comment) => {
                write_block(w, is_last, BlockType::VorbisComment, &comment.encode()?)
            }
            Self::Opaque(Opaque { block_type, data }) => {
                // re-reading this would attempt to decode it as a comment
                match u8::from(*block_type) {
                    4 => Err(Error::OpaqueVorbisComment),
                    _ => write_block(w, is_last, *block_type, data),
                }
            }
        }
    }
}

/// An iterator over FLAC metadata blocks
///
/// The first block is always returned as [`Block::Streaminfo`],
/// whatever type its header declares.
/// After that, VORBIS_COMMENT blocks are decoded
/// and everything else is returned as [`Block::Opaque`].
/// Once the block flagged as last has been returned,
/// the wrapped reader is positioned at the start of
/// the stream's frame data.
pub struct BlockReader<R: std::io::Read> {
    reader: R,
    failed: bool,
    tag_read: bool,
    streaminfo_read: bool,
    finished: bool,
}

impl<R: std::io::Read> BlockReader<R> {
    /// Creates an iterator over something that implements `Read`.
    /// Because this may perform many small reads,
    /// performance is greatly improved by buffering reads
    /// when reading from a raw `File`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            failed: false,
            tag_read: false,
            streaminfo_read: false,
            finished: false,
        }
    }

    /// Returns the wrapped reader
    ///
    /// Once all blocks have been read, this is
    /// positioned at the start of the frame data.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_tag(&mut self) -> Result<(), Error> {
        let mut tag = [0; 4];
        match self.reader.read_exact(&mut tag) {
            Ok(()) if &tag == FLAC_TAG => Ok(()),
            Ok(()) => Err(Error::BadMarker),
            Err(err) => Err(eof_as(err, Error::BadMarker)),
        }
    }

    fn read_block(&mut self) -> Result<(BlockHeader, Vec<u8>), Error> {
        let mut r = BitReader::endian(&mut self.reader, BigEndian);

        let header = r
            .parse::<BlockHeader>()
            .map_err(|err| eof_as(err, Error::TruncatedHeader))?;

        let data = r
            .read_to_vec(header.size.into())
            .map_err(|err| eof_as(err, Error::TruncatedBlockData(header.block_type)))?;

        debug!(
            block_type = %header.block_type,
            size = header.size.get(),
            last = header.last,
            "read block"
        );

        self.finished = header.last;
        Ok((header, data))
    }

    fn next_block(&mut self) -> Result<Block, Error> {
        if !self.tag_read {
            // "fLaC" tag must come before anything else
            self.read_tag()?;
            self.tag_read = true;
        }

        let (header, data) = self.read_block()?;

        if !self.streaminfo_read {
            // the first block is STREAMINFO by construction,
            // so its declared type isn't checked
            self.streaminfo_read = true;
            return Ok(Block::Streaminfo(Streaminfo { data }));
        }

        match header.block_type {
            BlockType::VorbisComment => VorbisComment::decode(&data).map(Block::VorbisComment),
            block_type => Ok(Block::Opaque(Opaque { block_type, data })),
        }
    }
}

impl<R: std::io::Read> Iterator for BlockReader<R> {
    type Item = Result<Block, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.finished {
            // once we hit an error, stop any further reads
            None
        } else {
            Some(self.next_block().inspect_err(|_| self.failed = true))
        }
    }
}

// a premature end of stream becomes the given error
fn eof_as(err: std::io::Error, truncated: Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::UnexpectedEof => truncated,
        _ => Error::Io(err),
    }
}

/// Returns iterator of blocks from the given reader
///
/// Because this may perform many small reads,
/// using a buffered reader may greatly improve performance
/// when reading from a raw `File`.
///
/// # Example
///
/// ```
/// use flac_meta::metadata::{Block, BlockType, Opaque, Streaminfo, read_blocks};
///
/// let flac: &[u8] = &[
///     b'f', b'L', b'a', b'C',
///     0b0_0000000, 0x00, 0x00, 0x01,  // STREAMINFO, 1 byte
///     0x01,
///     0b1_0000001, 0x00, 0x00, 0x02,  // last PADDING, 2 bytes
///     0x00, 0x00,
/// ];
///
/// assert_eq!(
///     read_blocks(flac).collect::<Result<Vec<_>, _>>().unwrap(),
///     vec![
///         Block::Streaminfo(Streaminfo { data: vec![0x01] }),
///         Block::Opaque(Opaque {
///             block_type: BlockType::Padding,
///             data: vec![0x00, 0x00],
///         }),
///     ],
/// );
/// ```
pub fn read_blocks<R: std::io::Read>(r: R) -> BlockReader<R> {
    BlockReader::new(r)
}

/// Writes the `fLaC` tag and iterator of blocks to the given writer.
///
/// The final block is flagged as last,
/// and every block's size is taken from its current data.
///
/// Because this may perform many small writes,
/// buffering writes may greatly improve performance
/// when writing to a raw `File`.
///
/// # Errors
///
/// Passes along any I/O errors from the underlying stream.
/// May also generate an error if any of the blocks are invalid
/// (e.g. STREAMINFO not being the first block, any block is too large, etc.).
pub fn write_blocks<B: AsBlockRef>(
    mut w: impl std::io::Write,
    blocks: impl IntoIterator<Item = B>,
) -> Result<(), Error> {
    fn iter_last<T>(i: impl Iterator<Item = T>) -> impl Iterator<Item = (bool, T)> {
        struct LastIterator<I: std::iter::Iterator> {
            iter: std::iter::Peekable<I>,
        }

        impl<T, I: std::iter::Iterator<Item = T>> Iterator for LastIterator<I> {
            type Item = (bool, T);

            fn next(&mut self) -> Option<Self::Item> {
                let item = self.iter.next()?;
                Some((self.iter.peek().is_none(), item))
            }
        }

        LastIterator { iter: i.peekable() }
    }

    w.write_all(FLAC_TAG)?;

    let mut w = bitstream_io::BitWriter::endian(w, BigEndian);
    let mut blocks = iter_last(blocks.into_iter());

    // STREAMINFO block must be present and must be first in file,
    // and is only the last block when nothing else follows it
    let next = blocks.next();
    match next.as_ref().map(|(last, b)| (last, b.as_block_ref())) {
        Some((last, streaminfo @ BlockRef::Streaminfo(_))) => w.build_using(&streaminfo, *last)?,
        _ => return Err(Error::MissingStreaminfo),
    }

    let mut vorbiscomment_written = false;

    blocks.try_for_each(|(last, block)| match block.as_block_ref() {
        BlockRef::Streaminfo(_) => Err(Error::MultipleStreaminfo),
        vorbiscomment @ BlockRef::VorbisComment(_) => match vorbiscomment_written {
            false => {
                vorbiscomment_written = true;
                w.build_using(&vorbiscomment, last)
            }
            true => Err(Error::MultipleVorbisComment),
        },
        block => w.build_using(&block, last),
    })
}
