// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A library for reading, editing and rewriting the metadata
//! layer of FLAC files.
//!
//! A FLAC stream begins with the `fLaC` marker, followed by a chain
//! of metadata blocks, followed by audio frames.
//! This crate parses the block chain, decodes the VORBIS_COMMENT
//! block's tags, and writes the whole stream back out again.
//! All other blocks (and the audio frames themselves) are carried
//! through as opaque bytes.
//!
//! # Example
//!
//! ```
//! use flac_meta::{parse, serialize, metadata::fields::TITLE};
//!
//! let flac: &[u8] = &[
//!     b'f', b'L', b'a', b'C',
//!     0b1_0000000, 0x00, 0x00, 0x02,  // last STREAMINFO, 2 bytes
//!     0xAB, 0xCD,
//!     0xFF, 0xF8,                     // frame data
//! ];
//!
//! let mut stream = parse(flac).unwrap();
//! stream.update_comment(|comment| comment.set(TITLE, "Track Title"));
//!
//! let mut rewritten = vec![];
//! serialize(&stream, &mut rewritten).unwrap();
//!
//! let stream = parse(rewritten.as_slice()).unwrap();
//! assert_eq!(
//!     stream.vorbis_comment.unwrap().get(TITLE),
//!     Some(b"Track Title".as_slice()),
//! );
//! assert_eq!(stream.frames, [0xFF, 0xF8]);
//! ```

#![warn(missing_docs)]

pub mod metadata;
pub mod stream;

pub use stream::{Stream, WriteOptions, parse, serialize};

use metadata::BlockType;

/// A possible error when reading or writing FLAC metadata
#[derive(Debug)]
pub enum Error {
    /// An I/O error from the underlying stream
    Io(std::io::Error),
    /// The stream does not start with the `fLaC` marker
    BadMarker,
    /// The stream ended in the middle of a metadata block header
    TruncatedHeader,
    /// The stream ended in the middle of a metadata block's data
    TruncatedBlockData(BlockType),
    /// A Vorbis comment field's length exceeds the remaining data
    Truncated(CommentField),
    /// A Vorbis comment entry with the given index has no `=`
    MissingSeparator(u32),
    /// A block's data is too large for its 24-bit size field
    BlockTooLarge(BlockType),
    /// A reserved block type outside the range 7 to 127
    InvalidBlockType(u8),
    /// A Vorbis comment string is too large for its 32-bit length
    ExcessiveStringLength,
    /// A Vorbis comment has too many entries for its 32-bit count
    ExcessiveVorbisEntries,
    /// STREAMINFO is not the first block written
    MissingStreaminfo,
    /// More than one STREAMINFO block written
    MultipleStreaminfo,
    /// More than one VORBIS_COMMENT block written
    MultipleVorbisComment,
    /// An opaque block is tagged as VORBIS_COMMENT
    OpaqueVorbisComment,
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),
            Self::BadMarker => "missing fLaC marker".fmt(f),
            Self::TruncatedHeader => "truncated metadata block header".fmt(f),
            Self::TruncatedBlockData(t) => write!(f, "truncated {t} block data"),
            Self::Truncated(field) => write!(f, "truncated Vorbis comment {field}"),
            Self::MissingSeparator(index) => {
                write!(f, "Vorbis comment entry {index} missing '=' separator")
            }
            Self::BlockTooLarge(t) => write!(f, "{t} block too large for 24-bit size"),
            Self::InvalidBlockType(t) => write!(f, "invalid reserved block type {t}"),
            Self::ExcessiveStringLength => "Vorbis comment string too large".fmt(f),
            Self::ExcessiveVorbisEntries => "too many Vorbis comment entries".fmt(f),
            Self::MissingStreaminfo => "STREAMINFO block not first in file".fmt(f),
            Self::MultipleStreaminfo => "multiple STREAMINFO blocks found in file".fmt(f),
            Self::MultipleVorbisComment => "multiple VORBIS_COMMENT blocks found in file".fmt(f),
            Self::OpaqueVorbisComment => "VORBIS_COMMENT block stored as opaque data".fmt(f),
        }
    }
}

/// The Vorbis comment field being read when data ran out
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommentField {
    /// The vendor string's length
    VendorLength,
    /// The vendor string itself
    VendorString,
    /// The number of entries
    EntryCount,
    /// The length of the entry with the given index
    EntryLength(u32),
    /// The entry with the given index
    Entry(u32),
}

impl std::fmt::Display for CommentField {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::VendorLength => "vendor string length".fmt(f),
            Self::VendorString => "vendor string".fmt(f),
            Self::EntryCount => "entry count".fmt(f),
            Self::EntryLength(index) => write!(f, "entry {index} length"),
            Self::Entry(index) => write!(f, "entry {index}"),
        }
    }
}
