// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling the VORBIS_COMMENT metadata block

use crate::{CommentField, Error};
use bitstream_io::{BitWrite, BitWriter, ByteRead, ByteReader, LittleEndian, ToBitStream};
use tracing::{debug, trace};

/// A VORBIS_COMMENT metadata block
///
/// # Byte Order
///
/// Unlike the rest of a FLAC file, the Vorbis comment's
/// length fields are stored in little-endian byte order.
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 32   | vendor string len | length of vendor string, in bytes
/// | `vendor string len`×8 | `vendor_string` | vendor string
/// | 32   | field count | number of entries
/// | 32   | entry₀ len | length of entry₀, in bytes
/// | `entry₀ len`×8 | entry₀ | first `KEY=value` entry
/// | 32   | entry₁ len | length of entry₁, in bytes
/// | `entry₁ len`×8 | entry₁ | second `KEY=value` entry
/// | | | ⋮
///
/// Strings are carried as raw bytes,
/// so no particular text encoding is enforced.
/// Entries are kept in the order they were read,
/// including any repeated keys, so an unedited
/// comment encodes back to exactly the same bytes.
/// Any bytes following the final entry (such as the framing
/// bit of a comment lifted from an Ogg Vorbis stream)
/// are kept and written back after the entries.
///
/// # Example
/// ```
/// use flac_meta::metadata::VorbisComment;
///
/// let data: &[u8] = &[
///     0x04, 0x00, 0x00, 0x00,  // 4 byte vendor string
///     0x74, 0x65, 0x73, 0x74,
///     0x02, 0x00, 0x00, 0x00,  // 2 entries
///     0x0a, 0x00, 0x00, 0x00,  // 10 byte entry 0
///     0x54, 0x49, 0x54, 0x4c, 0x45, 0x3d, 0x53, 0x6f,
///     0x6e, 0x67,
///     0x08, 0x00, 0x00, 0x00,  // 8 byte entry 1
///     0x41, 0x52, 0x54, 0x49, 0x53, 0x54, 0x3d, 0x41,
/// ];
///
/// let comment = VorbisComment::decode(data).unwrap();
/// assert_eq!(comment.vendor_string, b"test");
/// assert_eq!(comment.get("TITLE"), Some(b"Song".as_slice()));
/// assert_eq!(comment.get("artist"), Some(b"A".as_slice()));
/// assert_eq!(comment.encode().unwrap(), data);
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VorbisComment {
    /// The vendor string
    pub vendor_string: Vec<u8>,
    tags: Vec<Tag>,
    trailing: Vec<u8>,
}

impl Default for VorbisComment {
    fn default() -> Self {
        Self::new(concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")))
    }
}

/// A single `KEY=value` comment entry
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Tag {
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Tag {
    /// Splits entry on its first `=`, if any
    fn split(entry: &[u8]) -> Option<Self> {
        let separator = entry.iter().position(|b| *b == b'=')?;
        Some(Self {
            key: entry[..separator].to_vec(),
            value: entry[separator + 1..].to_vec(),
        })
    }

    /// The tag's key, which never contains `=`
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The tag's value, which may contain `=`
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    fn matches(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key.as_bytes())
    }

    // length of "key=value"
    fn entry_len(&self) -> usize {
        self.key.len() + 1 + self.value.len()
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}={}",
            String::from_utf8_lossy(&self.key),
            String::from_utf8_lossy(&self.value)
        )
    }
}

impl VorbisComment {
    /// Creates empty comment with the given vendor string
    pub fn new(vendor_string: impl Into<Vec<u8>>) -> Self {
        Self {
            vendor_string: vendor_string.into(),
            tags: vec![],
            trailing: vec![],
        }
    }

    /// Decodes comment from a VORBIS_COMMENT block's data
    ///
    /// # Errors
    ///
    /// Returns [`Error::Truncated`] if any length exceeds
    /// the remaining data, or [`Error::MissingSeparator`] if
    /// any entry lacks a `=`.
    pub fn decode(mut data: &[u8]) -> Result<Self, Error> {
        fn read_len(data: &mut &[u8], field: CommentField) -> Result<usize, Error> {
            ByteReader::endian(&mut *data, LittleEndian)
                .read::<u32>()
                .map(|len| len as usize)
                .map_err(|_| Error::Truncated(field))
        }

        fn take<'d>(
            data: &mut &'d [u8],
            len: usize,
            field: CommentField,
        ) -> Result<&'d [u8], Error> {
            let remaining: &'d [u8] = data;
            let (taken, rest) = remaining
                .split_at_checked(len)
                .ok_or(Error::Truncated(field))?;
            *data = rest;
            Ok(taken)
        }

        let vendor_len = read_len(&mut data, CommentField::VendorLength)?;
        let vendor_string = take(&mut data, vendor_len, CommentField::VendorString)?.to_vec();

        let count = read_len(&mut data, CommentField::EntryCount)?;

        // each entry needs at least its 4 byte length
        let mut tags = Vec::with_capacity(count.min(data.len() / 4));

        for index in 0..count {
            // count came from a u32
            let index = index as u32;
            let len = read_len(&mut data, CommentField::EntryLength(index))?;
            let entry = take(&mut data, len, CommentField::Entry(index))?;
            let tag = Tag::split(entry).ok_or(Error::MissingSeparator(index))?;
            trace!(%tag, "decoded entry");
            tags.push(tag);
        }

        if !data.is_empty() {
            debug!(bytes = data.len(), "keeping data after final entry");
        }

        Ok(Self {
            vendor_string,
            tags,
            trailing: data.to_vec(),
        })
    }

    /// Encodes comment to a VORBIS_COMMENT block's data
    ///
    /// # Errors
    ///
    /// Returns an error if any string or the number of entries
    /// exceeds the size of a 32-bit length field.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let mut data = Vec::with_capacity(self.encoded_len());
        BitWriter::endian(&mut data, LittleEndian).build(self)?;
        Ok(data)
    }

    /// The size of our encoded data, in bytes
    pub fn encoded_len(&self) -> usize {
        4 + self.vendor_string.len()
            + 4
            + self.tags.iter().map(|t| 4 + t.entry_len()).sum::<usize>()
            + self.trailing.len()
    }

    /// Iterates over all tags, in order
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    /// Any bytes which followed the final entry when decoded
    pub fn trailing(&self) -> &[u8] {
        &self.trailing
    }

    /// The number of tags
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether we have no tags
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Given a field name, returns first matching value, if any
    ///
    /// Fields are matched case-insensitively
    ///
    /// # Example
    ///
    /// ```
    /// use flac_meta::metadata::{VorbisComment, fields::{ARTIST, TITLE}};
    ///
    /// let mut comment = VorbisComment::default();
    /// comment.insert(ARTIST, "Artist 1");
    /// comment.insert(ARTIST, "Artist 2");
    ///
    /// assert_eq!(comment.get(ARTIST), Some(b"Artist 1".as_slice()));
    /// assert_eq!(comment.get(TITLE), None);
    /// ```
    pub fn get(&self, field: &str) -> Option<&[u8]> {
        self.all(field).next()
    }

    /// Given a field name, returns last matching value, if any
    ///
    /// Fields are matched case-insensitively.
    /// This is the value a tool which keeps only
    /// one value per field would see.
    pub fn get_last(&self, field: &str) -> Option<&[u8]> {
        self.all(field).next_back()
    }

    /// Given a field name, iterates over any matching values
    ///
    /// Fields are matched case-insensitively
    pub fn all(&self, field: &str) -> impl DoubleEndedIterator<Item = &[u8]> {
        self.tags
            .iter()
            .filter(move |t| t.matches(field))
            .map(|t| t.value())
    }

    /// Adds new instance of field with the given value
    ///
    /// # Panics
    ///
    /// Panics if field contains the `=` character.
    pub fn insert<V: AsRef<[u8]>>(&mut self, field: &str, value: V) {
        assert!(!field.contains('='), "field must not contain '='");

        self.tags.push(Tag {
            key: field.as_bytes().to_vec(),
            value: value.as_ref().to_vec(),
        });
    }

    /// Removes any matching instances of the given field
    ///
    /// Fields are matched case-insensitively
    pub fn remove(&mut self, field: &str) {
        self.tags.retain(|t| !t.matches(field));
    }

    /// Replaces any instances of the given field with value
    ///
    /// Fields are matched case-insensitively
    ///
    /// # Panics
    ///
    /// Panics if field contains the `=` character.
    ///
    /// # Example
    ///
    /// ```
    /// use flac_meta::metadata::{VorbisComment, fields::ARTIST};
    ///
    /// let mut comment = VorbisComment::default();
    /// comment.insert(ARTIST, "Artist 1");
    /// comment.insert("artist", "Artist 2");
    ///
    /// comment.set(ARTIST, "Artist 3");
    ///
    /// assert_eq!(
    ///     comment.all(ARTIST).collect::<Vec<_>>(),
    ///     vec![b"Artist 3".as_slice()],
    /// );
    /// ```
    pub fn set<V: AsRef<[u8]>>(&mut self, field: &str, value: V) {
        self.set_all(field, std::iter::once(value));
    }

    /// Replaces any instances of the given field with the given values
    ///
    /// Fields are matched case-insensitively
    ///
    /// # Panics
    ///
    /// Panics if field contains the `=` character
    pub fn set_all<V, I>(&mut self, field: &str, values: I)
    where
        V: AsRef<[u8]>,
        I: IntoIterator<Item = V>,
    {
        assert!(!field.contains('='), "field must not contain '='");

        self.remove(field);
        for value in values {
            self.insert(field, value);
        }
    }
}

impl ToBitStream for VorbisComment {
    type Error = Error;

    // the whole payload is little-endian
    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> Result<(), Self::Error> {
        fn write_len<W: BitWrite + ?Sized>(w: &mut W, len: usize) -> Result<(), Error> {
            w.write_as_from::<LittleEndian, u32>(
                len.try_into().map_err(|_| Error::ExcessiveStringLength)?,
            )?;
            Ok(())
        }

        write_len(w, self.vendor_string.len())?;
        w.write_bytes(&self.vendor_string)?;
        w.write_as_from::<LittleEndian, u32>(
            self.tags
                .len()
                .try_into()
                .map_err(|_| Error::ExcessiveVorbisEntries)?,
        )?;
        self.tags.iter().try_for_each(|tag| -> Result<(), Error> {
            write_len(w, tag.entry_len())?;
            w.write_bytes(&tag.key)?;
            w.write_bytes(b"=")?;
            w.write_bytes(&tag.value)?;
            Ok(())
        })?;
        w.write_bytes(&self.trailing)?;
        Ok(())
    }
}

/// Vorbis comment metadata tag fields
///
/// Not all of these fields are officially defined by the Vorbis comment format,
/// but they are in common use.
pub mod fields {
    /// Name of current work
    pub const TITLE: &str = "TITLE";

    /// Name of the artist generally responsible for the current work
    pub const ARTIST: &str = "ARTIST";

    /// Name of the collection the current work belongs to
    pub const ALBUM: &str = "ALBUM";

    /// The work's original composer
    pub const COMPOSER: &str = "COMPOSER";

    /// The current work's performer(s)
    pub const PERFORMER: &str = "PERFORMER";

    /// Release date of work
    pub const DATE: &str = "DATE";

    /// Music genre
    pub const GENRE: &str = "GENRE";

    /// Generic comment
    pub const COMMENT: &str = "COMMENT";

    /// Track number in album
    pub const TRACK_NUMBER: &str = "TRACKNUMBER";

    /// Total tracks in album
    pub const TRACK_TOTAL: &str = "TRACKTOTAL";
}
