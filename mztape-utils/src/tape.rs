/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of MZTAPE, a Rust library for recovering Sharp MZ cassette files.

    For the full copyright notice, see the lib.rs file.
*/
//! A tape session: demodulate a recorded tape side once, then extract every file stored on it.
use core::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use mztape_core::audio::SampleSource;
use mztape_core::pulse::{DemodConfig, TapeBitVec, demodulate};
use mztape_formats::tape::{FileHeader, ReaderConfig, TapeBlockReader, TapeError};

/// The number of files recorded on a tape side by default.
pub const DEFAULT_FILES: usize = 2;

/// The configuration of the [TapeSession].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SessionConfig {
    pub demod: DemodConfig,
    pub reader: ReaderConfig,
    /// The maximum number of files to extract.
    pub files: usize,
}

/// A file recovered from the tape.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecoveredFile {
    /// The position of the file on the tape, starting from 1.
    pub ordinal: usize,
    pub header: FileHeader,
    /// All the data blocks concatenated.
    pub data: Vec<u8>
}

/// The destination of recovered files.
pub trait FileSink {
    fn store(&mut self, file: &RecoveredFile) -> io::Result<()>;
}

/// Writes recovered files into a directory, named by [RecoveredFile::file_name].
#[derive(Clone, Debug)]
pub struct DirSink {
    dir: PathBuf
}

/// The error returned by [TapeSession::extract].
#[derive(Debug)]
pub enum SessionError {
    /// The tape could not be read.
    Tape(TapeError),
    /// The file sink failed.
    Io(io::Error)
}

/// Holds the demodulated bits of a tape side.
#[derive(Clone, Debug, Default)]
pub struct TapeSession {
    config: SessionConfig,
    bits: TapeBitVec,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            demod: DemodConfig::default(),
            reader: ReaderConfig::default(),
            files: DEFAULT_FILES
        }
    }
}

impl SessionConfig {
    /// Creates a default configuration for the given `sample_rate`.
    pub fn from_sample_rate(sample_rate: u32) -> Self {
        SessionConfig { demod: DemodConfig::from_sample_rate(sample_rate), ..Default::default() }
    }
    /// Changes the demodulator configuration, builder style.
    pub fn with_demod(mut self, demod: DemodConfig) -> Self {
        self.demod = demod;
        self
    }
    /// Changes the reader configuration, builder style.
    pub fn with_reader(mut self, reader: ReaderConfig) -> Self {
        self.reader = reader;
        self
    }
    /// Changes the number of files to extract, builder style.
    pub fn with_files(mut self, files: usize) -> Self {
        self.files = files;
        self
    }
}

impl RecoveredFile {
    /// Returns the name under which the file should be stored: `{filename}{ordinal}.dat`.
    ///
    /// Path separators and control characters in the filename are replaced with `_`.
    pub fn file_name(&self) -> String {
        let name: String = self.header.filename.chars()
            .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
            .collect();
        format!("{}{}.dat", name, self.ordinal)
    }
}

impl FileSink for Vec<RecoveredFile> {
    fn store(&mut self, file: &RecoveredFile) -> io::Result<()> {
        self.push(file.clone());
        Ok(())
    }
}

impl<S: FileSink + ?Sized> FileSink for &mut S {
    #[inline]
    fn store(&mut self, file: &RecoveredFile) -> io::Result<()> {
        (**self).store(file)
    }
}

impl DirSink {
    /// Creates a sink writing into `dir`. The directory is created if it doesn't exist.
    pub fn create<P: Into<PathBuf>>(dir: P) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(DirSink { dir })
    }
    /// Returns the target directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl FileSink for DirSink {
    fn store(&mut self, file: &RecoveredFile) -> io::Result<()> {
        let path = self.dir.join(file.file_name());
        debug!("writing {} bytes to {}", file.data.len(), path.display());
        fs::write(path, &file.data)
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Tape(err) => Some(err),
            SessionError::Io(err) => Some(err)
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Tape(err) => err.fmt(f),
            SessionError::Io(err) => write!(f, "can't store the file: {}", err)
        }
    }
}

impl From<TapeError> for SessionError {
    fn from(err: TapeError) -> Self {
        SessionError::Tape(err)
    }
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        SessionError::Io(err)
    }
}

impl TapeSession {
    pub fn new(config: SessionConfig) -> Self {
        TapeSession { config, bits: TapeBitVec::new() }
    }
    /// Replaces the demodulated bits, builder style.
    pub fn with_bits(mut self, bits: TapeBitVec) -> Self {
        self.bits = bits;
        self
    }
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
    /// Returns the demodulated bits.
    pub fn bits(&self) -> &TapeBitVec {
        &self.bits
    }
    /// Demodulates the whole `src`, replacing previously demodulated bits.
    ///
    /// `progress` receives the fraction of the consumed samples, see [demodulate].
    /// Returns the number of demodulated bits.
    pub fn demodulate<S, F>(&mut self, src: S, progress: F) -> usize
        where S: SampleSource, F: FnMut(f32)
    {
        self.bits = demodulate(src, self.config.demod, progress);
        info!("demodulated {} bits", self.bits.len());
        self.bits.len()
    }
    /// Reads up to [SessionConfig::files] files from the demodulated bits handing each one
    /// to the `sink`.
    ///
    /// The tape ending before the expected number of files is found is not an error.
    /// Returns the number of stored files.
    pub fn extract<K: FileSink + ?Sized>(&self, sink: &mut K) -> Result<usize, SessionError> {
        let mut reader = TapeBlockReader::new(&self.bits, self.config.reader);
        let mut count = 0;
        while count < self.config.files {
            let (header, data) = match reader.read_file()? {
                Some(file) => file,
                None => {
                    warn!("the tape ended after {} of {} files", count, self.config.files);
                    break
                }
            };
            count += 1;
            info!("file {}:\n{}", count, header);
            if data.len() < usize::from(header.size) {
                warn!("file {}: {} bytes recovered, {} declared", count, data.len(), header.size);
            }
            let file = RecoveredFile { ordinal: count, header, data };
            sink.store(&file)?;
        }
        debug!("stopped at bit {} of {}", reader.position(), self.bits.len());
        Ok(count)
    }
    /// Reads files from the demodulated bits into a vector.
    pub fn recover(&self) -> Result<Vec<RecoveredFile>, SessionError> {
        let mut files = Vec::with_capacity(self.config.files);
        self.extract(&mut files)?;
        Ok(files)
    }
}
