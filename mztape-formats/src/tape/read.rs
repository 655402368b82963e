/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of MZTAPE, a Rust library for recovering Sharp MZ cassette files.

    For the full copyright notice, see the lib.rs file.
*/
use core::fmt;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use mztape_core::bitvec::prelude::*;

use super::*;

/// The current state of the [TapeBlockReader].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadState {
    /// Initial state, waiting for the leader and the long gap.
    AwaitHeaderGap,
    /// Reading the header tape mark.
    ReadHeaderSync,
    /// Reading the header.
    ReadHeaderPrimary,
    /// Reading the header checksum and the validity field.
    ReadHeaderChecksum,
    /// Reading the header copy.
    ReadHeaderDuplicate,
    /// Reading the checksum of the header copy.
    ReadHeaderChecksum2,
    /// The header has been read, the data region is expected.
    HeaderDone,
    /// Waiting for the short gap preceding a data block.
    AwaitDataGap,
    /// Reading the data tape mark and the block number.
    ReadDataSync,
    /// Reading a data block.
    ReadBlock {
        block: u16
    },
    /// Reading a data block copy.
    ReadBlockCopy {
        block: u16
    },
    /// The end block has been read.
    DataDone
}

/// Reads files from the demodulated tape bits.
///
/// Each file is read in two steps: [TapeBlockReader::read_header] followed by
/// [TapeBlockReader::read_data], or at once with [TapeBlockReader::read_file].
///
/// Short gaps and a non-blank validity field are only logged. A stored checksum mismatch
/// is logged or reported as an error depending on [ReaderConfig::checksum].
#[derive(Debug)]
pub struct TapeBlockReader<'a> {
    bits: TapeBits<'a>,
    config: ReaderConfig,
    state: ReadState,
    short_gaps: usize,
}

impl ReadState {
    /// Returns `true` if reading the header region.
    pub fn is_header(&self) -> bool {
        matches!(self,
            ReadState::ReadHeaderSync|
            ReadState::ReadHeaderPrimary|
            ReadState::ReadHeaderChecksum|
            ReadState::ReadHeaderDuplicate|
            ReadState::ReadHeaderChecksum2)
    }
    /// Returns `true` if reading the data region.
    pub fn is_data(&self) -> bool {
        matches!(self,
            ReadState::AwaitDataGap|
            ReadState::ReadDataSync|
            ReadState::ReadBlock {..}|
            ReadState::ReadBlockCopy {..})
    }
}

impl fmt::Display for ReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadState::AwaitHeaderGap => f.write_str("header gap"),
            ReadState::ReadHeaderSync => f.write_str("header tape mark"),
            ReadState::ReadHeaderPrimary => f.write_str("header"),
            ReadState::ReadHeaderChecksum => f.write_str("header checksum"),
            ReadState::ReadHeaderDuplicate => f.write_str("header copy"),
            ReadState::ReadHeaderChecksum2 => f.write_str("header copy checksum"),
            ReadState::HeaderDone => f.write_str("end of header"),
            ReadState::AwaitDataGap => f.write_str("data gap"),
            ReadState::ReadDataSync => f.write_str("data tape mark"),
            ReadState::ReadBlock { block } => write!(f, "data block {}", block),
            ReadState::ReadBlockCopy { block } => write!(f, "data block {} copy", block),
            ReadState::DataDone => f.write_str("end of data")
        }
    }
}

impl<'a> TapeBlockReader<'a> {
    /// Creates a new `TapeBlockReader` over the demodulated bits.
    pub fn new(bits: &'a BitSlice<u8, Lsb0>, config: ReaderConfig) -> Self {
        TapeBlockReader {
            bits: TapeBits::from(bits),
            config,
            state: ReadState::AwaitHeaderGap,
            short_gaps: 0
        }
    }
    /// Returns the current state.
    pub fn state(&self) -> ReadState {
        self.state
    }
    /// Returns the configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }
    /// Returns the current bit position.
    pub fn position(&self) -> usize {
        self.bits.position()
    }
    /// Returns the number of gaps shorter than configured in [ReaderConfig] found so far.
    pub fn short_gaps(&self) -> usize {
        self.short_gaps
    }
    /// Returns the number of bits left.
    pub fn remaining(&self) -> usize {
        self.bits.remaining()
    }
    /// Reads the next file: its header followed by the data region.
    ///
    /// Returns `Ok(None)` if the tape ended before the next header.
    pub fn read_file(&mut self) -> Result<Option<(FileHeader, Vec<u8>)>, TapeError> {
        match self.read_header()? {
            Some(header) => {
                let data = self.read_data()?;
                Ok(Some((header, data)))
            }
            None => Ok(None)
        }
    }
    /// Reads the header region of the next file. Only the primary header copy is returned.
    ///
    /// Returns `Ok(None)` if the tape ended while waiting for the leader or the gap.
    pub fn read_header(&mut self) -> Result<Option<FileHeader>, TapeError> {
        self.state = ReadState::AwaitHeaderGap;
        let gap = match self.bits.skip_leader() {
            Ok(gap) => gap,
            Err(e) => {
                debug!("no more files: {}", e);
                return Ok(None)
            }
        };
        if gap < self.config.header_gap_min {
            self.short_gaps += 1;
            warn!("header gap was {} pulses", gap);
        }
        trace!("header gap {} pulses at bit {}", gap, self.position());

        self.state = ReadState::ReadHeaderSync;
        self.with_state(|bits| bits.read_bits(HEADER_SYNC_BITS))?;
        self.with_state(|bits| bits.read_bit())?;

        self.state = ReadState::ReadHeaderPrimary;
        let mut raw = vec![0u8; self.config.header_size()];
        self.with_state(|bits| bits.read_bytes(&mut raw))?;
        let header = FileHeader::parse(&raw)?;

        self.state = ReadState::ReadHeaderChecksum;
        let stored = self.with_state(|bits| bits.read_u16())?;
        self.with_state(|bits| bits.read_bit())?;
        self.verify_checksum(stored, &raw)?;
        self.read_validity()?;

        self.state = ReadState::ReadHeaderDuplicate;
        let mut copy = vec![0u8; raw.len()];
        self.with_state(|bits| bits.read_bytes(&mut copy))?;
        if copy != raw {
            debug!("header copy differs from the header");
        }

        self.state = ReadState::ReadHeaderChecksum2;
        self.with_state(|bits| bits.read_u16())?;
        self.with_state(|bits| bits.read_bit())?;

        self.state = ReadState::HeaderDone;
        debug!("header: {:?} {:?} at bit {}", header.file_type, header.filename, self.position());
        Ok(Some(header))
    }
    /// Reads data blocks until the end block, returning the concatenated payloads.
    ///
    /// Must be called right after a successful [TapeBlockReader::read_header].
    pub fn read_data(&mut self) -> Result<Vec<u8>, TapeError> {
        if self.state != ReadState::HeaderDone {
            return Err(TapeError::MissingHeader)
        }
        let mut data = Vec::new();
        loop {
            self.state = ReadState::AwaitDataGap;
            let gap = self.with_state(|bits| bits.skip_leader())?;
            if gap < self.config.data_gap_min {
                self.short_gaps += 1;
                warn!("data gap was {} pulses", gap);
            }

            self.state = ReadState::ReadDataSync;
            self.with_state(|bits| bits.read_bits(DATA_SYNC_BITS))?;
            self.with_state(|bits| bits.read_bit())?;
            let block = self.with_state(|bits| bits.read_u16())?;

            if block == END_BLOCK {
                match self.read_block_body(block, false) {
                    Err(e @ TapeError::Truncated {..}) => warn!("end block: {}", e),
                    res => { res?; }
                }
                break
            }

            let payload = self.read_block_body(block, true)?;
            data.extend_from_slice(&payload);
            debug!("block {} read, {} bytes total", block, data.len());
        }
        self.state = ReadState::DataDone;
        Ok(data)
    }

    /// Reads the rest of a block following its number, returning the primary payload.
    fn read_block_body(&mut self, block: u16, verify: bool) -> Result<[u8; BLOCK_SIZE], TapeError> {
        self.state = ReadState::ReadBlock { block };
        let mut payload = [0u8; BLOCK_SIZE];
        self.with_state(|bits| bits.read_bytes(&mut payload))?;
        let stored = self.with_state(|bits| bits.read_u16())?;
        self.with_state(|bits| bits.read_bit())?;
        if verify {
            self.verify_checksum(stored, &payload)?;
        }
        self.read_validity()?;

        self.state = ReadState::ReadBlockCopy { block };
        let copy_no = self.with_state(|bits| bits.read_u16())?;
        if copy_no != block {
            debug!("block {} copy is numbered {}", block, copy_no);
        }
        let mut copy = [0u8; BLOCK_SIZE];
        self.with_state(|bits| bits.read_bytes(&mut copy))?;
        self.with_state(|bits| bits.read_u16())?;
        self.with_state(|bits| bits.read_bit())?;
        Ok(payload)
    }

    fn read_validity(&mut self) -> Result<(), TapeError> {
        let position = self.position();
        let validity = self.with_state(|bits| bits.read_bits(VALIDITY_BITS))?;
        if validity.any() {
            warn!("validity field is not blank in {} at bit {}: {} bits set",
                    self.state, position, validity.count_ones());
        }
        Ok(())
    }

    fn verify_checksum(&self, stored: u16, data: &[u8]) -> Result<(), TapeError> {
        let computed = checksum(data);
        if stored == computed {
            return Ok(())
        }
        match self.config.checksum {
            ChecksumMode::Lenient => {
                warn!("checksum mismatch in {}: stored ${:04x}, computed ${:04x}",
                        self.state, stored, computed);
                Ok(())
            }
            ChecksumMode::Strict => Err(TapeError::Checksum { state: self.state, stored, computed })
        }
    }

    /// Tags the bit cursor error with the current state.
    #[inline]
    fn with_state<T, F>(&mut self, f: F) -> Result<T, TapeError>
        where F: FnOnce(&mut TapeBits<'a>) -> Result<T, StreamExhausted>
    {
        let state = self.state;
        f(&mut self.bits).map_err(|StreamExhausted { position }| TapeError::Truncated { state, position })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    #[derive(Default)]
    struct BitWriter {
        bits: BitVec<u8, Lsb0>
    }

    impl BitWriter {
        fn repeat(&mut self, bit: bool, count: usize) -> &mut Self {
            for _ in 0..count {
                self.bits.push(bit);
            }
            self
        }

        fn byte(&mut self, byte: u8) -> &mut Self {
            self.bits.push(true);
            for n in (0..8).rev() {
                self.bits.push(byte & (1 << n) != 0);
            }
            self
        }

        fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
            for &b in bytes {
                self.byte(b);
            }
            self
        }

        fn word(&mut self, word: u16) -> &mut Self {
            self.byte((word >> 8) as u8).byte(word as u8)
        }

        fn header(&mut self, raw: &[u8], chk: u16) -> &mut Self {
            self.repeat(true, 100).repeat(false, HEADER_GAP_MIN as usize)
                .repeat(true, 40).repeat(false, 40).repeat(true, 1)
                .bytes(raw).word(chk).repeat(true, 1)
                .repeat(false, VALIDITY_BITS)
                .bytes(raw).word(chk).repeat(true, 1)
        }

        fn block(&mut self, block: u16, payload: &[u8], chk: u16) -> &mut Self {
            self.repeat(false, DATA_GAP_MIN as usize)
                .repeat(true, 20).repeat(false, 20).repeat(true, 1)
                .word(block).bytes(payload).word(chk).repeat(true, 1)
                .repeat(false, VALIDITY_BITS)
                .word(block).bytes(payload).word(chk).repeat(true, 1)
        }
    }

    fn raw_header(name: &[u8], size: u16) -> Vec<u8> {
        let mut raw = vec![0u8; HEADER_FIXED_SIZE + DEFAULT_COMMENT_SIZE];
        raw[0] = 1;
        raw[1..18].iter_mut().for_each(|p| *p = FILENAME_END);
        raw[1..1 + name.len()].copy_from_slice(name);
        raw[18..20].copy_from_slice(&size.to_le_bytes());
        raw[20..22].copy_from_slice(&0x1200u16.to_le_bytes());
        raw[22..24].copy_from_slice(&0x1200u16.to_le_bytes());
        raw
    }

    fn payloads(count: usize) -> Vec<Vec<u8>> {
        let mut rng = SmallRng::seed_from_u64(700);
        (0..count).map(|_| (0..BLOCK_SIZE).map(|_| rng.gen()).collect()).collect()
    }

    fn write_file(wr: &mut BitWriter, name: &[u8], blocks: &[Vec<u8>]) {
        let raw = raw_header(name, (blocks.len() * BLOCK_SIZE) as u16);
        wr.header(&raw, checksum(&raw));
        for (n, payload) in blocks.iter().enumerate() {
            wr.block(n as u16 + 1, payload, checksum(payload));
        }
        wr.block(END_BLOCK, &[0u8; BLOCK_SIZE], 0);
    }

    #[test]
    fn read_file_works() {
        let blocks = payloads(2);
        let mut wr = BitWriter::default();
        write_file(&mut wr, b"TEST\r", &blocks);
        let mut reader = TapeBlockReader::new(&wr.bits, ReaderConfig::default());
        assert_eq!(ReadState::AwaitHeaderGap, reader.state());
        let header = reader.read_header().unwrap().unwrap();
        assert_eq!(ReadState::HeaderDone, reader.state());
        assert_eq!("TEST", header.filename);
        assert_eq!(FileType::MachineCode, header.file_type);
        assert_eq!((512, 0x1200, 0x1200), (header.size, header.load, header.exec));
        let data = reader.read_data().unwrap();
        assert_eq!(ReadState::DataDone, reader.state());
        assert_eq!(2 * BLOCK_SIZE, data.len());
        assert_eq!(&blocks[0][..], &data[..BLOCK_SIZE]);
        assert_eq!(&blocks[1][..], &data[BLOCK_SIZE..]);
        assert_eq!(0, reader.remaining());
        assert_eq!(Ok(None), reader.read_file());
    }

    #[test]
    fn read_two_files_works() {
        let blocks = payloads(3);
        let mut wr = BitWriter::default();
        write_file(&mut wr, b"FIRST\r", &blocks[..1]);
        wr.repeat(true, 5000);
        write_file(&mut wr, b"SECOND\r", &blocks[1..]);
        let mut reader = TapeBlockReader::new(&wr.bits, ReaderConfig::default());
        let (header, data) = reader.read_file().unwrap().unwrap();
        assert_eq!("FIRST", header.filename);
        assert_eq!(blocks[0], data);
        let (header, data) = reader.read_file().unwrap().unwrap();
        assert_eq!("SECOND", header.filename);
        assert_eq!(blocks[1..].concat(), data);
        assert_eq!(Ok(None), reader.read_file());
    }

    #[test]
    fn read_empty_works() {
        let bits = BitVec::<u8, Lsb0>::new();
        let mut reader = TapeBlockReader::new(&bits, ReaderConfig::default());
        assert_eq!(Ok(None), reader.read_header());
        assert_eq!(Err(TapeError::MissingHeader), reader.read_data());
        // leader only
        let mut wr = BitWriter::default();
        wr.repeat(true, 10).repeat(false, 10);
        let mut reader = TapeBlockReader::new(&wr.bits, ReaderConfig::default());
        assert_eq!(Ok(None), reader.read_file());
    }

    #[test]
    fn read_truncated_works() {
        let blocks = payloads(2);
        let mut wr = BitWriter::default();
        write_file(&mut wr, b"CUT\r", &blocks);
        let primary = 100 + HEADER_GAP_MIN as usize + 81;
        let header_end = primary + 2 * (128 * 9 + 18 + 1) + VALIDITY_BITS;
        let block_size = DATA_GAP_MIN as usize + 41 + 2 * (18 + 256 * 9 + 18 + 1) + VALIDITY_BITS;

        // a cut within the leader or gap is a clean end of tape
        let mut reader = TapeBlockReader::new(&wr.bits[..1000], ReaderConfig::default());
        assert_eq!(Ok(None), reader.read_header());

        let mut reader = TapeBlockReader::new(&wr.bits[..primary + 500], ReaderConfig::default());
        assert!(matches!(reader.read_header(),
                         Err(TapeError::Truncated { state: ReadState::ReadHeaderPrimary, .. })));

        let mut reader = TapeBlockReader::new(&wr.bits[..header_end - 1], ReaderConfig::default());
        assert!(matches!(reader.read_header(),
                         Err(TapeError::Truncated { state: ReadState::ReadHeaderChecksum2, .. })));

        let mut reader = TapeBlockReader::new(&wr.bits[..header_end], ReaderConfig::default());
        assert!(reader.read_header().unwrap().is_some());
        assert!(matches!(reader.read_data(),
                         Err(TapeError::Truncated { state: ReadState::AwaitDataGap, .. })));

        let end = header_end + block_size + DATA_GAP_MIN as usize + 41 + 18 + 100;
        let mut reader = TapeBlockReader::new(&wr.bits[..end], ReaderConfig::default());
        assert!(matches!(reader.read_file(),
                         Err(TapeError::Truncated { state: ReadState::ReadBlock { block: 2 }, .. })));

        let end = header_end + 3 * block_size - 2000;
        let mut reader = TapeBlockReader::new(&wr.bits[..end], ReaderConfig::default());
        let (_, data) = reader.read_file().unwrap().unwrap();
        assert_eq!(blocks.concat(), data);
        assert_eq!(ReadState::DataDone, reader.state());
    }

    #[test]
    fn read_checksum_works() {
        let blocks = payloads(1);
        let raw = raw_header(b"CHK\r", 256);
        let mut wr = BitWriter::default();
        wr.header(&raw, checksum(&raw) + 1)
          .block(1, &blocks[0], checksum(&blocks[0]) ^ 0x8000)
          .block(END_BLOCK, &[0u8; BLOCK_SIZE], 12345);
        let mut reader = TapeBlockReader::new(&wr.bits, ReaderConfig::default());
        let (_, data) = reader.read_file().unwrap().unwrap();
        assert_eq!(blocks[0], data);

        let config = ReaderConfig::default().with_checksum(ChecksumMode::Strict);
        let mut reader = TapeBlockReader::new(&wr.bits, config);
        let computed = checksum(&raw);
        assert_eq!(Err(TapeError::Checksum {
                        state: ReadState::ReadHeaderChecksum,
                        stored: computed + 1,
                        computed }), reader.read_header());

        let mut wr = BitWriter::default();
        wr.header(&raw, checksum(&raw))
          .block(1, &blocks[0], checksum(&blocks[0]) ^ 0x8000);
        let mut reader = TapeBlockReader::new(&wr.bits, config);
        assert!(reader.read_header().unwrap().is_some());
        assert!(matches!(reader.read_data(),
                         Err(TapeError::Checksum { state: ReadState::ReadBlock { block: 1 }, .. })));
    }

    #[test]
    fn read_noisy_works() {
        let blocks = payloads(1);
        let raw = raw_header(b"NOISE\r", 256);
        let mut wr = BitWriter::default();
        // short gaps and a non-blank validity field are tolerated
        wr.repeat(false, 100).repeat(true, 40).repeat(false, 40).repeat(true, 1)
          .bytes(&raw).word(checksum(&raw)).repeat(true, 1)
          .repeat(false, VALIDITY_BITS - 3).repeat(true, 3)
          .bytes(&raw).word(checksum(&raw)).repeat(true, 1);
        wr.repeat(false, 10).repeat(true, 20).repeat(false, 20).repeat(true, 1)
          .word(1).bytes(&blocks[0]).word(checksum(&blocks[0])).repeat(true, 1)
          .repeat(true, VALIDITY_BITS)
          .word(1).bytes(&blocks[0]).word(checksum(&blocks[0])).repeat(true, 1);
        wr.block(END_BLOCK, &[0xAA; BLOCK_SIZE], 0);
        let config = ReaderConfig::default().with_checksum(ChecksumMode::Strict);
        let mut reader = TapeBlockReader::new(&wr.bits, config);
        let (header, data) = reader.read_file().unwrap().unwrap();
        assert_eq!("NOISE", header.filename);
        assert_eq!(blocks[0], data);
        assert_eq!(2, reader.short_gaps());
        // both gaps are long enough for a relaxed configuration
        let mut reader = TapeBlockReader::new(&wr.bits, config.with_gaps(100, 10));
        assert_eq!(blocks[0], reader.read_file().unwrap().unwrap().1);
        assert_eq!(0, reader.short_gaps());
        let mut reader = TapeBlockReader::new(&wr.bits, config.with_gaps(101, 10));
        reader.read_file().unwrap().unwrap();
        assert_eq!(1, reader.short_gaps());
    }

    #[test]
    fn read_state_works() {
        assert!(ReadState::ReadHeaderDuplicate.is_header());
        assert!(!ReadState::HeaderDone.is_header());
        assert!(ReadState::ReadBlockCopy { block: 7 }.is_data());
        assert!(!ReadState::DataDone.is_data());
        assert_eq!("data block 7 copy", ReadState::ReadBlockCopy { block: 7 }.to_string());
    }
}
