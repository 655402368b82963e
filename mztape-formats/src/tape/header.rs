/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of MZTAPE, a Rust library for recovering Sharp MZ cassette files.

    For the full copyright notice, see the lib.rs file.
*/
use core::convert::TryFrom;
use core::fmt;

use memchr::memchr;
use nom::bytes::complete::take;
use nom::combinator::rest;
use nom::number::complete::{le_u16, le_u8};
use nom::sequence::tuple;
use nom::IResult;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use super::charset;

/// The size of the header without the comment area.
pub const HEADER_FIXED_SIZE: usize = 24;
/// The size of the comment area written by the MZ-700 monitor.
pub const DEFAULT_COMMENT_SIZE: usize = 104;
/// The size of the filename field.
pub const FILENAME_SIZE: usize = 17;
/// The filename terminator.
pub const FILENAME_END: u8 = 0x0D;

/// The type of the file described by a [FileHeader], from the attribute byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FileType {
    Unspecified,
    MachineCode,
    Mz80Basic,
    Mz80Data,
    Mz700Data,
    Mz700Basic,
    /// An attribute outside of the known range.
    UnknownType(u8)
}

/// Represents the tape file header.
///
/// The structure of the header is as follows.
///
/// | offset | size | description                           |
/// |--------|------|---------------------------------------|
/// |    0   |    1 | attribute, see [FileType]             |
/// |    1   |   17 | filename (terminated with `0x0D`)     |
/// |   18   |    2 | size of the file data (LSB first)     |
/// |   20   |    2 | load address (LSB first)              |
/// |   22   |    2 | execution address (LSB first)         |
/// |   24   |    * | comment                               |
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileHeader {
    pub file_type: FileType,
    /// The decoded and trimmed name of the file.
    pub filename: String,
    pub size: u16,
    pub load: u16,
    pub exec: u16,
    /// The raw comment area.
    pub comment: Vec<u8>
}

/// The error returned when the header is too short to be parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderParseError {
    /// The size of the provided data.
    pub size: usize
}

impl From<u8> for FileType {
    fn from(attr: u8) -> Self {
        match attr {
            0 => FileType::Unspecified,
            1 => FileType::MachineCode,
            2 => FileType::Mz80Basic,
            3 => FileType::Mz80Data,
            4 => FileType::Mz700Data,
            5 => FileType::Mz700Basic,
            attr => FileType::UnknownType(attr)
        }
    }
}

impl From<FileType> for u8 {
    fn from(file_type: FileType) -> u8 {
        match file_type {
            FileType::Unspecified => 0,
            FileType::MachineCode => 1,
            FileType::Mz80Basic => 2,
            FileType::Mz80Data => 3,
            FileType::Mz700Data => 4,
            FileType::Mz700Basic => 5,
            FileType::UnknownType(attr) => attr
        }
    }
}

impl Default for FileType {
    fn default() -> Self {
        FileType::Unspecified
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Unspecified => f.write_str("unknown"),
            FileType::MachineCode => f.write_str("Machine code program"),
            FileType::Mz80Basic => f.write_str("MZ-80 BASIC program"),
            FileType::Mz80Data => f.write_str("MZ-80 data"),
            FileType::Mz700Data => f.write_str("MZ-700 data"),
            FileType::Mz700Basic => f.write_str("MZ-700 BASIC program"),
            FileType::UnknownType(attr) => write!(f, "unknown type ${:02x}", attr)
        }
    }
}

impl std::error::Error for HeaderParseError {}

impl fmt::Display for HeaderParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Not a proper tape header: {} bytes, at least {} expected",
                self.size, HEADER_FIXED_SIZE)
    }
}

fn parse_header(raw: &[u8]) -> IResult<&[u8], FileHeader> {
    let (inp, (attr, name, size, load, exec)) = tuple((
        le_u8, take(FILENAME_SIZE), le_u16, le_u16, le_u16
    ))(raw)?;
    let (inp, comment) = rest(inp)?;
    let name = memchr(FILENAME_END, name).map_or(name, |end| &name[..end]);
    let filename = charset::decode(name)
                   .trim_matches(|c: char| c.is_whitespace() || c.is_ascii_control())
                   .to_string();
    let header = FileHeader {
        file_type: attr.into(),
        filename,
        size, load, exec,
        comment: comment.to_vec()
    };
    Ok((inp, header))
}

impl FileHeader {
    /// Parses the header from the raw bytes: [HEADER_FIXED_SIZE] bytes followed by the comment area.
    pub fn parse(raw: &[u8]) -> Result<Self, HeaderParseError> {
        parse_header(raw).map(|(_, header)| header)
                         .map_err(|_| HeaderParseError { size: raw.len() })
    }
    /// Returns the comment with the trailing padding removed.
    pub fn comment_trimmed(&self) -> &[u8] {
        let end = self.comment.iter().rposition(|&b| b != 0 && b != FILENAME_END)
                                     .map_or(0, |n| n + 1);
        &self.comment[..end]
    }
}

impl TryFrom<&'_[u8]> for FileHeader {
    type Error = HeaderParseError;

    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        FileHeader::parse(raw)
    }
}

impl fmt::Display for FileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Type:     {}", self.file_type)?;
        writeln!(f, "Filename: {}", self.filename)?;
        writeln!(f, "Size:     ${:04x}", self.size)?;
        writeln!(f, "Load:     ${:04x}", self.load)?;
        writeln!(f, "Exec:     ${:04x}", self.exec)?;
        write!(f, "Comment:  {}", self.comment_trimmed().escape_ascii())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_header(attr: u8, name: &[u8], size: u16, load: u16, exec: u16) -> Vec<u8> {
        let mut raw = vec![attr];
        let mut fname = [FILENAME_END; FILENAME_SIZE];
        fname[..name.len()].copy_from_slice(name);
        raw.extend_from_slice(&fname);
        raw.extend_from_slice(&size.to_le_bytes());
        raw.extend_from_slice(&load.to_le_bytes());
        raw.extend_from_slice(&exec.to_le_bytes());
        raw.resize(HEADER_FIXED_SIZE + DEFAULT_COMMENT_SIZE, 0);
        raw
    }

    #[test]
    fn parse_header_works() {
        let raw = raw_header(1, b"TEST\r", 0x0010, 0x1200, 0x1200);
        let header = FileHeader::parse(&raw).unwrap();
        assert_eq!(FileType::MachineCode, header.file_type);
        assert_eq!("TEST", header.filename);
        assert_eq!(0x0010, header.size);
        assert_eq!(0x1200, header.load);
        assert_eq!(0x1200, header.exec);
        assert_eq!(DEFAULT_COMMENT_SIZE, header.comment.len());
        assert_eq!(&[0u8; 0][..], header.comment_trimmed());
        assert_eq!("Type:     Machine code program\n\
                    Filename: TEST\n\
                    Size:     $0010\n\
                    Load:     $1200\n\
                    Exec:     $1200\n\
                    Comment:  ", header.to_string());
    }

    #[test]
    fn parse_header_name_works() {
        // sharp lower case and space padding
        let raw = raw_header(5, &[b' ', 183, 157, b'E', b' ', b' '], 0x1234, 0xABCD, 0);
        let header = FileHeader::try_from(&raw[..]).unwrap();
        assert_eq!(FileType::Mz700Basic, header.file_type);
        assert_eq!("orE", header.filename);
        assert_eq!((0x1234, 0xABCD, 0), (header.size, header.load, header.exec));
        // anything past the terminator is ignored
        let raw = raw_header(2, b"AB\rGARBAGE", 0, 0, 0);
        assert_eq!("AB", FileHeader::parse(&raw).unwrap().filename);
        // the name may fill the whole field
        let raw = raw_header(3, b"ABCDEFGHIJKLMNOPQ", 0, 0, 0);
        assert_eq!("ABCDEFGHIJKLMNOPQ", FileHeader::parse(&raw).unwrap().filename);
        // unmapped characters at both ends are kept
        let raw = raw_header(1, &[0x85, b'A', b'B', 0x90], 0, 0, 0);
        assert_eq!("\u{85}AB\u{90}", FileHeader::parse(&raw).unwrap().filename);
    }

    #[test]
    fn parse_header_comment_works() {
        let mut raw = raw_header(4, b"DATA\r", 1, 2, 3);
        raw[HEADER_FIXED_SIZE..HEADER_FIXED_SIZE + 3].copy_from_slice(b"hi\x01");
        let header = FileHeader::parse(&raw).unwrap();
        assert_eq!(b"hi\x01", header.comment_trimmed());
        assert!(header.to_string().ends_with("Comment:  hi\\x01"));
        let header = FileHeader::parse(&raw[..HEADER_FIXED_SIZE]).unwrap();
        assert!(header.comment.is_empty());
        assert_eq!(Err(HeaderParseError { size: 23 }), FileHeader::parse(&raw[..23]));
        assert_eq!(Err(HeaderParseError { size: 0 }), FileHeader::parse(&[]));
    }

    #[test]
    fn file_type_works() {
        let names: Vec<String> = (0..=6u8).map(|n| FileType::from(n).to_string()).collect();
        assert_eq!(vec!["unknown", "Machine code program", "MZ-80 BASIC program", "MZ-80 data",
                        "MZ-700 data", "MZ-700 BASIC program", "unknown type $06"], names);
        for n in 0..=255u8 {
            assert_eq!(n, u8::from(FileType::from(n)));
        }
        assert_eq!(FileType::UnknownType(0xff), FileType::from(0xff));
        assert_eq!(FileType::Unspecified, FileType::default());
    }
}
