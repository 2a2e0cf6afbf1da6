// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling a whole FLAC stream

use crate::Error;
use crate::metadata::{
    Block, BlockRef, FLAC_TAG, Opaque, Streaminfo, VorbisComment, read_blocks, write_blocks,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A FLAC stream, split into its metadata blocks and frame data
///
/// The STREAMINFO block, all opaque blocks and the frame data
/// are kept exactly as read.
/// The VORBIS_COMMENT block, if any, is decoded so that its
/// tags may be edited before the stream is written back out.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Stream {
    /// The mandatory STREAMINFO block
    pub streaminfo: Streaminfo,
    /// All other blocks besides VORBIS_COMMENT, in stream order
    pub blocks: Vec<Opaque>,
    /// The stream's Vorbis comment, if any
    pub vorbis_comment: Option<VorbisComment>,
    /// Everything following the metadata blocks
    pub frames: Vec<u8>,
}

impl Stream {
    /// Creates stream with the given STREAMINFO and nothing else
    pub fn new(streaminfo: Streaminfo) -> Self {
        Self {
            streaminfo,
            blocks: vec![],
            vorbis_comment: None,
            frames: vec![],
        }
    }

    /// The marker every FLAC stream starts with
    pub fn marker(&self) -> &'static [u8; 4] {
        FLAC_TAG
    }

    /// Reads entire stream from the given reader
    ///
    /// If more than one VORBIS_COMMENT block is present,
    /// the last one read is kept.
    ///
    /// # Errors
    ///
    /// Returns any error from reading metadata blocks,
    /// or any I/O error reading the frame data.
    pub fn read<R: Read>(mut r: R) -> Result<Self, Error> {
        let mut blocks = read_blocks(r.by_ref());

        let mut stream = match blocks.next() {
            Some(Ok(Block::Streaminfo(streaminfo))) => Self::new(streaminfo),
            Some(Err(err)) => return Err(err),
            Some(Ok(_)) | None => return Err(Error::MissingStreaminfo),
        };

        for block in blocks {
            match block? {
                Block::VorbisComment(comment) => {
                    if stream.vorbis_comment.replace(comment).is_some() {
                        warn!("replacing earlier VORBIS_COMMENT block");
                    }
                }
                Block::Opaque(opaque) => stream.blocks.push(opaque),
                Block::Streaminfo(_) => return Err(Error::MultipleStreaminfo),
            }
        }

        r.read_to_end(&mut stream.frames)?;
        debug!(bytes = stream.frames.len(), "read frame data");

        Ok(stream)
    }

    /// Writes entire stream to the given writer, using default options
    ///
    /// # Errors
    ///
    /// Passes along any I/O errors, or any error
    /// from writing the metadata blocks.
    pub fn write<W: Write>(&self, w: W) -> Result<(), Error> {
        self.write_with(w, &WriteOptions::default())
    }

    /// Writes entire stream to the given writer
    ///
    /// Blocks are written in the order given by [`Stream::layout`]
    /// and the physically final block is flagged as last.
    ///
    /// # Errors
    ///
    /// Passes along any I/O errors, or any error
    /// from writing the metadata blocks.
    pub fn write_with<W: Write>(&self, mut w: W, options: &WriteOptions) -> Result<(), Error> {
        write_blocks(w.by_ref(), self.layout(options))?;
        w.write_all(&self.frames)?;
        debug!(bytes = self.frames.len(), "wrote frame data");
        Ok(())
    }

    /// Returns our metadata blocks in the order they will be written
    ///
    /// STREAMINFO is always first.
    /// The VORBIS_COMMENT block, if any, is placed at
    /// the position given by [`WriteOptions::comment_position`]
    /// among the remaining blocks.
    ///
    /// # Example
    ///
    /// ```
    /// use flac_meta::{Stream, WriteOptions};
    /// use flac_meta::metadata::{BlockRef, BlockType, Opaque, Streaminfo, VorbisComment};
    ///
    /// let mut stream = Stream::new(Streaminfo::default());
    /// stream.blocks.push(Opaque { block_type: BlockType::Padding, data: vec![0; 4] });
    /// stream.vorbis_comment = Some(VorbisComment::default());
    ///
    /// assert!(matches!(
    ///     stream.layout(&WriteOptions::default()).as_slice(),
    ///     [BlockRef::Streaminfo(_), BlockRef::VorbisComment(_), BlockRef::Opaque(_)],
    /// ));
    ///
    /// assert!(matches!(
    ///     stream.layout(&WriteOptions::default().comment_position(1)).as_slice(),
    ///     [BlockRef::Streaminfo(_), BlockRef::Opaque(_), BlockRef::VorbisComment(_)],
    /// ));
    /// ```
    pub fn layout(&self, options: &WriteOptions) -> Vec<BlockRef<'_>> {
        let mut blocks = Vec::with_capacity(self.blocks.len() + 2);
        blocks.push(BlockRef::Streaminfo(&self.streaminfo));
        blocks.extend(self.blocks.iter().map(BlockRef::Opaque));

        if let Some(comment) = &self.vorbis_comment {
            let position = options.comment_position.min(self.blocks.len());
            blocks.insert(position + 1, BlockRef::VorbisComment(comment));
        }

        blocks
    }

    /// Updates Vorbis comment, creating a new block if necessary
    pub fn update_comment(&mut self, f: impl FnOnce(&mut VorbisComment)) {
        f(self.vorbis_comment.get_or_insert_with(VorbisComment::default))
    }
}

/// Options for writing a [`Stream`]
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    comment_position: usize,
}

impl WriteOptions {
    /// Where to place the VORBIS_COMMENT block
    ///
    /// This is an index among the blocks following STREAMINFO.
    /// 0 (the default) places it directly after STREAMINFO,
    /// while any position past the final block places it last.
    pub fn comment_position(self, comment_position: usize) -> Self {
        Self { comment_position }
    }
}

/// Reads entire FLAC stream from the given reader
///
/// Because this may perform many small reads,
/// using a buffered reader may greatly improve performance
/// when reading from a raw `File`.
///
/// # Errors
///
/// Returns an error if the stream lacks the `fLaC` marker,
/// if any metadata block is truncated or invalid,
/// or if any I/O error occurs.
pub fn parse<R: Read>(r: R) -> Result<Stream, Error> {
    Stream::read(r)
}

/// Writes entire FLAC stream to the given writer
///
/// Because this may perform many small writes,
/// buffering writes may greatly improve performance
/// when writing to a raw `File`.
///
/// # Errors
///
/// Returns an error if any block is too large
/// or if any I/O error occurs.
pub fn serialize<W: Write>(stream: &Stream, w: W) -> Result<(), Error> {
    stream.write(w)
}

/// Reads entire FLAC stream from the given path
///
/// # Errors
///
/// Returns any error from opening the path,
/// or from parsing its contents.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Stream, Error> {
    File::open(path.as_ref())
        .map_err(Error::Io)
        .and_then(|f| parse(BufReader::new(f)))
}

/// Writes entire FLAC stream to the given path
///
/// The stream is first written to a temporary file
/// alongside `path`, which then replaces it.
/// If writing fails, the temporary file is removed
/// and `path` is left as it was.
///
/// # Errors
///
/// Returns any error from creating, writing
/// or renaming the temporary file.
pub fn write_file<P: AsRef<Path>>(path: P, stream: &Stream) -> Result<(), Error> {
    fn temporary_path(path: &Path) -> PathBuf {
        let mut name = std::ffi::OsString::from(".");
        name.push(path.file_name().unwrap_or_default());
        name.push(".tmp");
        path.with_file_name(name)
    }

    fn write_to(tmp: &Path, stream: &Stream) -> Result<(), Error> {
        let mut w = BufWriter::new(File::create(tmp)?);
        stream.write(&mut w)?;
        w.into_inner()
            .map_err(|err| Error::Io(err.into_error()))?
            .sync_all()?;
        Ok(())
    }

    let path = path.as_ref();
    let tmp = temporary_path(path);

    let result = write_to(&tmp, stream).and_then(|()| std::fs::rename(&tmp, path).map_err(Error::Io));

    if result.is_err()
        && let Err(err) = std::fs::remove_file(&tmp)
    {
        warn!(path = %tmp.display(), %err, "unable to remove temporary file");
    }

    result
}

/// Whether to perform or rollback stream changes
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Save {
    /// Commit changes to disk
    Commit,
    /// Abort changes
    Rollback,
}

/// Given a Path, attempts to update its FLAC stream
///
/// Applies closure `f` to the stream and writes it back
/// with [`write_file`] if `Save::Commit` is returned.
///
/// Returns `true` if the file was rewritten.
///
/// # Errors
///
/// Returns any error from reading or writing the file,
/// or any error returned by `f`.
pub fn update<P, E>(path: P, f: impl FnOnce(&mut Stream) -> Result<Save, E>) -> Result<bool, E>
where
    P: AsRef<Path>,
    E: From<Error>,
{
    let path = path.as_ref();
    let mut stream = read_file(path)?;

    match f(&mut stream)? {
        Save::Commit => {
            write_file(path, &stream)?;
            Ok(true)
        }
        Save::Rollback => Ok(false),
    }
}
