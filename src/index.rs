//! Physical and logical record framing.
//!
//! A tape is a sequence of physical blocks. A logical record is a chain of
//! one or more blocks linked by the successor bit of `attr2`. The index is
//! built with two sequential walks: the first sizes the arenas, the second
//! fills them. All scan state lives in a [`ChainWalker`] local to one walk.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use log::{debug, warn};
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::models::{LogicalRecord, PhysicalRecord, RecordType};
use crate::progress::{NoProgress, ProgressSink, Stage};

const TAPE_BLOCK_LEN: usize = 12;

/// Physical framing convention of a tape file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Every block is preceded by a 12-byte tape position block
    Blocked,
    /// Bare physical blocks
    Unblocked,
}

impl Dialect {
    /// Sniff the dialect from the first four bytes.
    ///
    /// Tape-image files start with a zero block type; a bare LIS stream
    /// starts with a non-zero record length.
    pub fn detect(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::InvalidFormat(format!(
                "file is {} bytes, too short to hold a record header",
                data.len()
            )));
        }
        let mut cursor = Cursor::new(&data[..4]);
        if cursor.read_u32::<LittleEndian>()? == 0 {
            Ok(Dialect::Blocked)
        } else {
            Ok(Dialect::Unblocked)
        }
    }

    pub fn position_block_len(self) -> usize {
        match self {
            Dialect::Blocked => TAPE_BLOCK_LEN,
            Dialect::Unblocked => 0,
        }
    }

    /// Bytes of end-of-tape padding that never hold another record.
    pub fn trailing_margin(self) -> usize {
        match self {
            Dialect::Blocked => TAPE_BLOCK_LEN,
            Dialect::Unblocked => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Blocked => "blocked",
            Dialect::Unblocked => "unblocked",
        }
    }
}

/// Tape position block of the blocked dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapeBlock {
    pub previous: u32,
    pub next: u32,
}

/// Shape of one logical record as seen by a walk.
#[derive(Debug, Clone, Copy)]
struct ChainSummary {
    record_type: RecordType,
    total_length: u32,
    blocks: usize,
}

struct ChainWalker<'a> {
    data: &'a [u8],
    dialect: Dialect,
    pos: usize,
}

impl<'a> ChainWalker<'a> {
    fn new(data: &'a [u8], dialect: Dialect) -> Self {
        Self {
            data,
            dialect,
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos + self.dialect.trailing_margin() >= self.data.len()
    }

    fn malformed(&self, offset: usize, reason: impl Into<String>) -> Error {
        Error::MalformedHeader {
            offset: offset as u64,
            reason: reason.into(),
        }
    }

    fn read_tape_block(&mut self) -> Result<Option<TapeBlock>> {
        if self.dialect != Dialect::Blocked {
            return Ok(None);
        }
        let bytes = self
            .data
            .get(self.pos..self.pos + TAPE_BLOCK_LEN)
            .ok_or_else(|| self.malformed(self.pos, "tape position block cut off"))?;
        let mut cursor = Cursor::new(&bytes[4..]);
        let block = TapeBlock {
            previous: cursor.read_u32::<LittleEndian>()?,
            next: cursor.read_u32::<LittleEndian>()?,
        };
        self.pos += TAPE_BLOCK_LEN;
        Ok(Some(block))
    }

    /// Read one block header and step over the block.
    fn read_block(&mut self, first: bool) -> Result<(PhysicalRecord, Option<RecordType>)> {
        let tape_block = self.read_tape_block()?;

        let offset = self.pos;
        let header_len = PhysicalRecord::header_len(first);
        let header = self
            .data
            .get(offset..offset + header_len)
            .ok_or_else(|| self.malformed(offset, "header cut off by end of file"))?;

        let mut cursor = Cursor::new(header);
        let length = cursor.read_u16::<BigEndian>()?;
        let attr1 = cursor.read_u8()?;
        let attr2 = cursor.read_u8()?;
        let record_type = if first {
            Some(RecordType::from(cursor.read_u8()?))
        } else {
            None
        };

        let block = PhysicalRecord {
            offset: offset as u64,
            length: length as u32,
            attr1,
            attr2,
        };

        if (length as usize) < header_len + block.trailer_len() {
            return Err(self.malformed(
                offset,
                format!("block length {} shorter than its header", length),
            ));
        }
        if offset + length as usize > self.data.len() {
            return Err(self.malformed(
                offset,
                format!(
                    "block length {} runs past end of file ({} bytes)",
                    length,
                    self.data.len()
                ),
            ));
        }

        self.pos = offset + length as usize;
        if let Some(tape_block) = tape_block {
            if tape_block.next as usize != self.pos {
                debug!(
                    "Tape block at {} points to {}, next block starts at {}",
                    offset - TAPE_BLOCK_LEN,
                    tape_block.next,
                    self.pos
                );
            }
        }
        Ok((block, record_type))
    }

    /// Walk one continuation chain.
    ///
    /// Returns `Ok(None)` once the trailing margin is reached. Blocks are
    /// pushed to `arena` when one is given.
    fn next_record(
        &mut self,
        mut arena: Option<&mut Vec<PhysicalRecord>>,
    ) -> Result<Option<ChainSummary>> {
        if self.at_end() {
            return Ok(None);
        }

        let (first, record_type) = self.read_block(true)?;
        let mut summary = ChainSummary {
            record_type: record_type.unwrap_or(RecordType::Other(0)),
            total_length: first.payload_len(true) as u32,
            blocks: 1,
        };
        let mut successor = first.has_successor();
        if let Some(arena) = arena.as_deref_mut() {
            arena.push(first);
        }

        while successor {
            if self.pos >= self.data.len() {
                return Err(self.malformed(self.pos, "continuation chain cut off by end of file"));
            }
            let (block, _) = self.read_block(false)?;
            summary.total_length += block.payload_len(false) as u32;
            summary.blocks += 1;
            successor = block.has_successor();
            if let Some(arena) = arena.as_deref_mut() {
                arena.push(block);
            }
        }

        Ok(Some(summary))
    }
}

/// Ordered logical records of one tape, with their blocks in one arena.
#[derive(Debug)]
pub struct RecordIndex {
    dialect: Dialect,
    records: Vec<LogicalRecord>,
    blocks: Vec<PhysicalRecord>,
    scan_error: Option<Error>,
}

impl RecordIndex {
    pub fn build(data: &[u8], dialect: Dialect) -> Self {
        Self::build_with_progress(data, dialect, &mut NoProgress)
    }

    /// Index `data`.
    ///
    /// Indexing never fails outright: a malformed header ends the scan, the
    /// records completed before it are kept, and the error is available from
    /// [`RecordIndex::scan_error`].
    pub fn build_with_progress(
        data: &[u8],
        dialect: Dialect,
        progress: &mut dyn ProgressSink,
    ) -> Self {
        let len = data.len() as u64;
        progress.start(Stage::Indexing, len * 2);

        // Pass 1: count.
        let mut walker = ChainWalker::new(data, dialect);
        let mut record_count = 0usize;
        let mut block_count = 0usize;
        while let Ok(Some(summary)) = walker.next_record(None) {
            record_count += 1;
            block_count += summary.blocks;
            progress.advance(Stage::Indexing, walker.pos as u64);
        }

        // Pass 2: fill exactly sized arenas.
        let mut records = Vec::with_capacity(record_count);
        let mut blocks = Vec::with_capacity(block_count);
        let mut walker = ChainWalker::new(data, dialect);
        let mut scan_error = None;
        loop {
            let first_block = blocks.len();
            match walker.next_record(Some(&mut blocks)) {
                Ok(Some(summary)) => {
                    records.push(LogicalRecord {
                        record_type: summary.record_type,
                        total_length: summary.total_length,
                        first_block,
                        block_count: summary.blocks,
                    });
                    progress.advance(Stage::Indexing, len + walker.pos as u64);
                }
                Ok(None) => break,
                Err(err) => {
                    blocks.truncate(first_block);
                    warn!(
                        "Stopped indexing after {} logical records: {}",
                        records.len(),
                        err
                    );
                    scan_error = Some(err);
                    break;
                }
            }
        }
        progress.advance(Stage::Indexing, len * 2);

        debug!(
            "Indexed {} logical records in {} physical blocks ({} dialect)",
            records.len(),
            blocks.len(),
            dialect.name()
        );

        Self {
            dialect,
            records,
            blocks,
            scan_error,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn records(&self) -> &[LogicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, i: usize) -> Option<&LogicalRecord> {
        self.records.get(i)
    }

    pub fn record_type(&self, i: usize) -> Option<RecordType> {
        self.records.get(i).map(|r| r.record_type)
    }

    /// Blocks of logical record `i`, first block first.
    pub fn blocks(&self, i: usize) -> &[PhysicalRecord] {
        match self.records.get(i) {
            Some(record) => &self.blocks[record.first_block..record.first_block + record.block_count],
            None => &[],
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// File position of the first block header of record `i`.
    pub fn address(&self, i: usize) -> Option<u64> {
        self.blocks(i).first().map(|block| block.offset)
    }

    /// The error that ended the scan early, if any.
    pub fn scan_error(&self) -> Option<&Error> {
        self.scan_error.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.scan_error.is_none()
    }

    /// Reassemble the payload of record `i` into `buf`, replacing its content.
    ///
    /// `buf` is reused across calls by the frame extractor.
    pub fn read_payload(&self, data: &[u8], i: usize, buf: &mut Vec<u8>) -> Result<()> {
        let record = self
            .records
            .get(i)
            .ok_or_else(|| Error::Other(format!("logical record {} out of range", i)))?;

        buf.clear();
        buf.reserve(record.total_length as usize);
        for (n, block) in self.blocks(i).iter().enumerate() {
            let range = block.payload_range(n == 0);
            let span = data.get(range.clone()).ok_or(Error::TruncatedRecord {
                needed: range.end,
                available: data.len(),
            })?;
            buf.extend_from_slice(span);
        }
        Ok(())
    }

    pub fn payload(&self, data: &[u8], i: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_payload(data, i, &mut buf)?;
        Ok(buf)
    }

    /// Per-type record counts in first-seen order.
    pub fn type_counts(&self) -> Vec<(RecordType, usize)> {
        let mut counts: Vec<(RecordType, usize)> = Vec::new();
        for record in &self.records {
            match counts.iter_mut().find(|(t, _)| *t == record.record_type) {
                Some((_, n)) => *n += 1,
                None => counts.push((record.record_type, 1)),
            }
        }
        counts
    }
}
