// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Append-only log of irreversible blocks. The log file is a sequence of
//! length-prefixed canonical block encodings; a sidecar index file holds
//! one u64 offset per height for random access. Only blocks past the
//! irreversibility boundary are ever written here.

use crate::blocks::SignedBlock;
use crate::encoding;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("block log io: {0}")]
    Io(#[from] std::io::Error),
    #[error("block log encoding: {0}")]
    Encoding(#[from] encoding::Error),
    #[error("block {0} is not in the log (head {1})")]
    OutOfRange(u32, u32),
    #[error("appended block {0} does not follow head {1}")]
    NonSequentialAppend(u32, u32),
    #[error("block log is corrupt: {0}")]
    Corrupt(String),
}

pub struct BlockLog {
    log: File,
    index: File,
    head_num: u32,
    path: PathBuf,
}

impl BlockLog {
    /// Open (or create) the log in `dir`. A stale or truncated index is
    /// rebuilt from the log body.
    pub fn open(dir: &Path) -> Result<BlockLog, Error> {
        std::fs::create_dir_all(dir)?;
        let log_path = dir.join("block_log");
        let index_path = dir.join("block_log.index");
        let log = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&log_path)?;
        let index = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&index_path)?;

        let mut this = BlockLog {
            log,
            index,
            head_num: 0,
            path: dir.to_owned(),
        };
        let log_len = this.log.metadata()?.len();
        let index_len = this.index.metadata()?.len();
        if index_len % 8 != 0 {
            tracing::warn!("block log index length is not a multiple of 8, rebuilding");
            this.rebuild_index()?;
        } else {
            this.head_num = (index_len / 8) as u32;
            if !this.tail_matches(log_len)? {
                tracing::warn!("block log index does not match log tail, rebuilding");
                this.rebuild_index()?;
            }
        }
        Ok(this)
    }

    pub fn head_block_num(&self) -> u32 {
        self.head_num
    }

    pub fn is_empty(&self) -> bool {
        self.head_num == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the next irreversible block. Blocks must arrive in height
    /// order with no gaps.
    pub fn append(&mut self, block: &SignedBlock) -> Result<(), Error> {
        let num = block.block_num();
        if num != self.head_num + 1 {
            return Err(Error::NonSequentialAppend(num, self.head_num));
        }
        let bytes = encoding::to_vec(block)?;
        let offset = self.log.seek(SeekFrom::End(0))?;
        self.log.write_u64::<BigEndian>(bytes.len() as u64)?;
        self.log.write_all(&bytes)?;
        self.index.seek(SeekFrom::End(0))?;
        self.index.write_u64::<BigEndian>(offset)?;
        self.head_num = num;
        Ok(())
    }

    pub fn read_block(&mut self, num: u32) -> Result<SignedBlock, Error> {
        if num == 0 || num > self.head_num {
            return Err(Error::OutOfRange(num, self.head_num));
        }
        self.index.seek(SeekFrom::Start(u64::from(num - 1) * 8))?;
        let offset = self.index.read_u64::<BigEndian>()?;
        self.read_at(offset)
    }

    pub fn head(&mut self) -> Result<Option<SignedBlock>, Error> {
        if self.head_num == 0 {
            return Ok(None);
        }
        Ok(Some(self.read_block(self.head_num)?))
    }

    /// Sequential replay over `[from, to]`.
    pub fn iter_from(
        &mut self,
        from: u32,
    ) -> impl Iterator<Item = Result<SignedBlock, Error>> + '_ {
        let to = self.head_num;
        (from..=to).map(move |num| self.read_block(num))
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.log.sync_data()?;
        self.index.sync_data()?;
        Ok(())
    }

    fn read_at(&mut self, offset: u64) -> Result<SignedBlock, Error> {
        self.log.seek(SeekFrom::Start(offset))?;
        let len = self.log.read_u64::<BigEndian>()?;
        if len > (1 << 27) {
            return Err(Error::Corrupt(format!("entry length {len} at {offset}")));
        }
        let mut bytes = vec![0u8; len as usize];
        self.log.read_exact(&mut bytes)?;
        Ok(encoding::from_slice(&bytes)?)
    }

    /// Scan the whole log and rewrite the offset index. Truncated tail
    /// entries are dropped.
    fn rebuild_index(&mut self) -> Result<(), Error> {
        let log_len = self.log.metadata()?.len();
        let mut offsets: Vec<u64> = Vec::new();
        let mut pos = 0u64;
        while pos + 8 <= log_len {
            self.log.seek(SeekFrom::Start(pos))?;
            let len = self.log.read_u64::<BigEndian>()?;
            if pos + 8 + len > log_len {
                tracing::warn!("dropping truncated block log entry at {pos}");
                break;
            }
            offsets.push(pos);
            pos += 8 + len;
        }
        self.index.set_len(0)?;
        self.index.seek(SeekFrom::Start(0))?;
        for offset in &offsets {
            self.index.write_u64::<BigEndian>(*offset)?;
        }
        self.head_num = offsets.len() as u32;
        Ok(())
    }

    /// True when the last index entry points at the last log entry.
    fn tail_matches(&mut self, log_len: u64) -> Result<bool, Error> {
        if self.head_num == 0 {
            return Ok(log_len == 0);
        }
        self.index
            .seek(SeekFrom::Start(u64::from(self.head_num - 1) * 8))?;
        let offset = self.index.read_u64::<BigEndian>()?;
        if offset + 8 > log_len {
            return Ok(false);
        }
        self.log.seek(SeekFrom::Start(offset))?;
        let len = self.log.read_u64::<BigEndian>()?;
        Ok(offset + 8 + len == log_len)
    }
}

/// Delete both files. Used by `wipe`.
pub fn wipe(dir: &Path) -> std::io::Result<()> {
    for name in ["block_log", "block_log.index"] {
        let path = dir.join(name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{BlockHeader, BlockId};
    use crate::crypto::{sha256, SecretKey, Signature};
    use crate::types::{AccountName, Timestamp};

    fn block(num: u32, previous: BlockId) -> SignedBlock {
        let header = BlockHeader {
            previous,
            timestamp: Timestamp(num * 3),
            witness: AccountName::from("initwitness"),
            transaction_merkle_root: Default::default(),
            extensions: Vec::new(),
        };
        let key = SecretKey::from_seed("w");
        let sig = SignedBlock::sign(header.clone(), &key, &sha256(b"t")).unwrap();
        SignedBlock {
            header,
            witness_signature: sig,
            transactions: Vec::new(),
        }
    }

    fn chain_of(n: u32) -> Vec<SignedBlock> {
        let mut blocks = Vec::new();
        let mut previous = BlockId::default();
        for num in 1..=n {
            let b = block(num, previous);
            previous = b.id().unwrap();
            blocks.push(b);
        }
        blocks
    }

    #[test]
    fn append_and_random_access() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BlockLog::open(dir.path()).unwrap();
        for b in chain_of(5) {
            log.append(&b).unwrap();
        }
        assert_eq!(log.head_block_num(), 5);
        assert_eq!(log.read_block(3).unwrap().block_num(), 3);
        assert_eq!(log.head().unwrap().unwrap().block_num(), 5);
        assert!(log.read_block(6).is_err());
    }

    #[test]
    fn rejects_gap() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BlockLog::open(dir.path()).unwrap();
        let blocks = chain_of(3);
        log.append(&blocks[0]).unwrap();
        assert!(matches!(
            log.append(&blocks[2]),
            Err(Error::NonSequentialAppend(3, 1))
        ));
    }

    #[test]
    fn reopen_preserves_head() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = BlockLog::open(dir.path()).unwrap();
            for b in chain_of(4) {
                log.append(&b).unwrap();
            }
        }
        let mut log = BlockLog::open(dir.path()).unwrap();
        assert_eq!(log.head_block_num(), 4);
        assert_eq!(log.read_block(2).unwrap().block_num(), 2);
    }

    #[test]
    fn stale_index_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = BlockLog::open(dir.path()).unwrap();
            for b in chain_of(4) {
                log.append(&b).unwrap();
            }
        }
        // Truncate the index to two entries; reopening must restore all
        // four from the log body.
        let index_path = dir.path().join("block_log.index");
        let index = OpenOptions::new().write(true).open(index_path).unwrap();
        index.set_len(16).unwrap();
        let mut log = BlockLog::open(dir.path()).unwrap();
        assert_eq!(log.head_block_num(), 4);
        assert_eq!(log.read_block(4).unwrap().block_num(), 4);
    }

    #[test]
    fn sequential_replay() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BlockLog::open(dir.path()).unwrap();
        for b in chain_of(6) {
            log.append(&b).unwrap();
        }
        let nums: Vec<u32> = log
            .iter_from(2)
            .map(|b| b.unwrap().block_num())
            .collect();
        assert_eq!(nums, vec![2, 3, 4, 5, 6]);
    }
}
