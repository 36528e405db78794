use shared_types::SignedBlock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

const HEADER_LEN: u64 = 4;
const TRAILER_LEN: u64 = 8;
const INDEX_ENTRY_LEN: u64 = 8;

#[derive(Debug, Error)]
pub enum BlockLogError {
    #[error("block log i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("block log decode error: {0}")]
    Decode(#[from] bincode::Error),

    #[error("block {got} appended out of order, expected {expected}")]
    OutOfOrder { expected: u32, got: u32 },

    #[error("block {0} is not in the log")]
    NotFound(u32),

    #[error("corrupt record at offset {0}")]
    Corrupt(u64),
}

/// The append-only block log. Blocks are appended strictly in height order
/// as they become irreversible.
pub struct BlockLog {
    log_file: File,
    index_file: File,
    log_path: PathBuf,
    head: Option<SignedBlock>,
}

impl BlockLog {
    /// Open (or create) the log pair under `dir`, repairing a torn tail.
    pub fn open(dir: &Path) -> Result<Self, BlockLogError> {
        std::fs::create_dir_all(dir)?;
        let log_path = dir.join("block_log");
        let index_path = dir.join("block_log.index");

        let mut log_file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&log_path)?;
        let mut index_file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&index_path)?;

        Self::repair(&mut log_file, &mut index_file, &log_path, &index_path)?;

        let mut log = BlockLog {
            log_file,
            index_file,
            log_path,
            head: None,
        };
        log.head = log.read_head()?;
        Ok(log)
    }

    /// Truncate a partial tail record left by a crash.
    fn repair(
        log_file: &mut File,
        index_file: &mut File,
        log_path: &Path,
        index_path: &Path,
    ) -> Result<(), BlockLogError> {
        let log_len = log_file.metadata()?.len();
        let index_len = index_file.metadata()?.len();
        let mut entries = index_len / INDEX_ENTRY_LEN;

        // Walk the index backward to the last entry whose record is whole.
        let mut good_log_len = 0;
        while entries > 0 {
            let mut buf = [0u8; 8];
            log_seek_read(index_file, (entries - 1) * INDEX_ENTRY_LEN, &mut buf)?;
            let start = u64::from_le_bytes(buf);
            if start + HEADER_LEN <= log_len {
                let mut len_buf = [0u8; 4];
                log_seek_read(log_file, start, &mut len_buf)?;
                let payload = u64::from(u32::from_le_bytes(len_buf));
                let end = start + HEADER_LEN + payload + TRAILER_LEN;
                if end <= log_len {
                    good_log_len = end;
                    break;
                }
            }
            warn!(entry = entries - 1, "truncating torn block log record");
            entries -= 1;
        }

        if good_log_len != log_len || entries * INDEX_ENTRY_LEN != index_len {
            let log_trunc = OpenOptions::new().write(true).open(log_path)?;
            log_trunc.set_len(good_log_len)?;
            let index_trunc = OpenOptions::new().write(true).open(index_path)?;
            index_trunc.set_len(entries * INDEX_ENTRY_LEN)?;
        }
        Ok(())
    }

    fn read_head(&mut self) -> Result<Option<SignedBlock>, BlockLogError> {
        let len = self.log_file.metadata()?.len();
        if len == 0 {
            return Ok(None);
        }
        let mut buf = [0u8; 8];
        log_seek_read(&mut self.log_file, len - TRAILER_LEN, &mut buf)?;
        let start = u64::from_le_bytes(buf);
        let (block, _) = self.read_block(start)?;
        Ok(Some(block))
    }

    /// The newest block in the log, if any.
    pub fn head(&self) -> Option<&SignedBlock> {
        self.head.as_ref()
    }

    /// Append the next irreversible block. Returns its record offset.
    pub fn append(&mut self, block: &SignedBlock) -> Result<u64, BlockLogError> {
        let expected = self.head.as_ref().map(|h| h.block_num() + 1).unwrap_or(1);
        if block.block_num() != expected {
            return Err(BlockLogError::OutOfOrder {
                expected,
                got: block.block_num(),
            });
        }

        let start = self.log_file.metadata()?.len();
        let payload = bincode::serialize(block)?;

        self.log_file.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.log_file.write_all(&payload)?;
        self.log_file.write_all(&start.to_le_bytes())?;
        self.index_file.write_all(&start.to_le_bytes())?;

        self.head = Some(block.clone());
        Ok(start)
    }

    /// Read the record starting at `offset`. Returns the block and the
    /// offset of the next record.
    pub fn read_block(&mut self, offset: u64) -> Result<(SignedBlock, u64), BlockLogError> {
        let mut len_buf = [0u8; 4];
        log_seek_read(&mut self.log_file, offset, &mut len_buf)?;
        let payload_len = u64::from(u32::from_le_bytes(len_buf));

        let mut payload = vec![0u8; payload_len as usize];
        self.log_file.read_exact(&mut payload)?;
        let block: SignedBlock =
            bincode::deserialize(&payload).map_err(|_| BlockLogError::Corrupt(offset))?;

        Ok((block, offset + HEADER_LEN + payload_len + TRAILER_LEN))
    }

    /// Read a block by height, `None` if beyond the head.
    pub fn read_block_by_num(&mut self, block_num: u32) -> Result<Option<SignedBlock>, BlockLogError> {
        if block_num == 0 {
            return Ok(None);
        }
        let entry = u64::from(block_num - 1) * INDEX_ENTRY_LEN;
        if entry + INDEX_ENTRY_LEN > self.index_file.metadata()?.len() {
            return Ok(None);
        }
        let mut buf = [0u8; 8];
        log_seek_read(&mut self.index_file, entry, &mut buf)?;
        let start = u64::from_le_bytes(buf);
        let (block, _) = self.read_block(start)?;
        Ok(Some(block))
    }

    pub fn flush(&mut self) -> Result<(), BlockLogError> {
        self.log_file.sync_data()?;
        self.index_file.sync_data()?;
        Ok(())
    }

    pub fn close(mut self) -> Result<(), BlockLogError> {
        self.flush()
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

fn log_seek_read(file: &mut File, offset: u64, buf: &mut [u8]) -> Result<(), BlockLogError> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{
        AccountName, BlockHeader, Signature, SignedBlock, TimePointSec,
    };

    fn make_block(num: u32) -> SignedBlock {
        let mut previous = [0u8; 20];
        previous[..4].copy_from_slice(&(num - 1).to_be_bytes());
        SignedBlock {
            header: BlockHeader {
                previous,
                timestamp: TimePointSec::new(num * 3),
                witness: AccountName::new("genesis").unwrap(),
                transaction_merkle_root: [0u8; 20],
                extensions: Vec::new(),
            },
            witness_signature: Signature::empty(),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BlockLog::open(dir.path()).unwrap();
        assert!(log.head().is_none());

        for n in 1..=5 {
            log.append(&make_block(n)).unwrap();
        }
        assert_eq!(log.head().unwrap().block_num(), 5);

        let b3 = log.read_block_by_num(3).unwrap().unwrap();
        assert_eq!(b3.block_num(), 3);
        assert!(log.read_block_by_num(6).unwrap().is_none());
        assert!(log.read_block_by_num(0).unwrap().is_none());
    }

    #[test]
    fn test_sequential_walk_via_next_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BlockLog::open(dir.path()).unwrap();
        for n in 1..=4 {
            log.append(&make_block(n)).unwrap();
        }

        let mut offset = 0;
        for n in 1..=4 {
            let (block, next) = log.read_block(offset).unwrap();
            assert_eq!(block.block_num(), n);
            offset = next;
        }
    }

    #[test]
    fn test_out_of_order_append_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BlockLog::open(dir.path()).unwrap();
        log.append(&make_block(1)).unwrap();
        let err = log.append(&make_block(3)).unwrap_err();
        assert!(matches!(err, BlockLogError::OutOfOrder { expected: 2, got: 3 }));
    }

    #[test]
    fn test_reopen_preserves_head() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = BlockLog::open(dir.path()).unwrap();
            for n in 1..=3 {
                log.append(&make_block(n)).unwrap();
            }
            log.flush().unwrap();
        }
        let log = BlockLog::open(dir.path()).unwrap();
        assert_eq!(log.head().unwrap().block_num(), 3);
    }

    #[test]
    fn test_torn_tail_is_truncated_on_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = BlockLog::open(dir.path()).unwrap();
            for n in 1..=3 {
                log.append(&make_block(n)).unwrap();
            }
            log.flush().unwrap();
        }
        // Chop bytes off the last record.
        let log_path = dir.path().join("block_log");
        let len = std::fs::metadata(&log_path).unwrap().len();
        let f = OpenOptions::new().write(true).open(&log_path).unwrap();
        f.set_len(len - 5).unwrap();

        let mut log = BlockLog::open(dir.path()).unwrap();
        assert_eq!(log.head().unwrap().block_num(), 2);
        assert!(log.read_block_by_num(3).unwrap().is_none());
        // And the log keeps appending cleanly from there.
        log.append(&make_block(3)).unwrap();
        assert_eq!(log.head().unwrap().block_num(), 3);
    }
}
