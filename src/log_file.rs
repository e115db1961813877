use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::error::DbResult;
use crate::page_id::PageId;
use crate::transaction::TransactionId;

/// Write-ahead log: one record per page update, recording the before- and
/// after-images so a crash mid-write can be diagnosed or replayed. The
/// buffer pool calls `log_write` before ever writing a dirty page to disk,
/// and `force` before releasing any lock at commit, so the record for a
/// change is always durable before the change itself (or its release) is.
pub struct LogFile {
    inner: Mutex<Inner>,
}

struct Inner {
    file: File,
    next_lsn: u64,
}

/// A single WAL record: the page a transaction modified, and its contents
/// immediately before and after the modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub lsn: u64,
    pub tid: TransactionId,
    pub pid: PageId,
    pub before_image: Vec<u8>,
    pub after_image: Vec<u8>,
}

impl LogFile {
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        let next_lsn = {
            let mut f = &file;
            f.seek(SeekFrom::Start(0))?;
            let mut buf = vec![];
            f.read_to_end(&mut buf)?;
            let mut offset = 0;
            let mut last_lsn = 0u64;
            while offset < buf.len() {
                let (record, size) = decode_record(&buf[offset..]);
                last_lsn = record.lsn;
                offset += size;
            }
            if last_lsn == 0 { 1 } else { last_lsn + 1 }
        };
        Ok(LogFile {
            inner: Mutex::new(Inner { file, next_lsn }),
        })
    }

    /// Appends a record to the in-process buffer. Not durable until `force`.
    pub fn log_write(
        &self,
        tid: TransactionId,
        pid: PageId,
        before_image: Vec<u8>,
        after_image: Vec<u8>,
    ) -> DbResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        let lsn = inner.next_lsn;
        inner.next_lsn += 1;
        let record = LogRecord {
            lsn,
            tid,
            pid,
            before_image,
            after_image,
        };
        let bytes = encode_record(&record);
        inner.file.seek(SeekFrom::End(0))?;
        inner.file.write_all(&bytes)?;
        Ok(lsn)
    }

    /// Forces every buffered record to stable storage.
    pub fn force(&self) -> DbResult<()> {
        let inner = self.inner.lock().unwrap();
        inner.file.sync_data()?;
        Ok(())
    }

    pub fn read_all(&self) -> DbResult<Vec<LogRecord>> {
        let mut inner = self.inner.lock().unwrap();
        inner.file.seek(SeekFrom::Start(0))?;
        let mut buf = vec![];
        inner.file.read_to_end(&mut buf)?;
        let mut records = vec![];
        let mut offset = 0;
        while offset < buf.len() {
            let (record, size) = decode_record(&buf[offset..]);
            records.push(record);
            offset += size;
        }
        Ok(records)
    }
}

fn encode_record(r: &LogRecord) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&r.lsn.to_be_bytes());
    buf.extend_from_slice(&r.tid.get_tid().to_be_bytes());
    buf.extend_from_slice(&r.pid.table_id().to_be_bytes());
    buf.extend_from_slice(&(r.pid.page_number() as u64).to_be_bytes());
    buf.extend_from_slice(&(r.before_image.len() as u32).to_be_bytes());
    buf.extend_from_slice(&r.before_image);
    buf.extend_from_slice(&(r.after_image.len() as u32).to_be_bytes());
    buf.extend_from_slice(&r.after_image);
    buf
}

fn decode_record(bytes: &[u8]) -> (LogRecord, usize) {
    let mut offset = 0;
    let lsn = u64::from_be_bytes(bytes[offset..offset + 8].try_into().unwrap());
    offset += 8;
    let tid_raw = u64::from_be_bytes(bytes[offset..offset + 8].try_into().unwrap());
    offset += 8;
    let table_id = i64::from_be_bytes(bytes[offset..offset + 8].try_into().unwrap());
    offset += 8;
    let page_number = u64::from_be_bytes(bytes[offset..offset + 8].try_into().unwrap()) as usize;
    offset += 8;
    let before_len = u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
    offset += 4;
    let before_image = bytes[offset..offset + before_len].to_vec();
    offset += before_len;
    let after_len = u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
    offset += 4;
    let after_image = bytes[offset..offset + after_len].to_vec();
    offset += after_len;
    (
        LogRecord {
            lsn,
            tid: TransactionId::from_raw(tid_raw),
            pid: PageId::new(table_id, page_number),
            before_image,
            after_image,
        },
        offset,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let log = LogFile::open(&path).unwrap();
        let tid = TransactionId::new();
        let pid = PageId::new(7, 0);
        log.log_write(tid, pid, vec![0; 4], vec![1; 4]).unwrap();
        log.force().unwrap();

        let reopened = LogFile::open(&path).unwrap();
        let records = reopened.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pid, pid);
        assert_eq!(records[0].after_image, vec![1; 4]);
    }

    #[test]
    fn next_lsn_resumes_after_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let log = LogFile::open(&path).unwrap();
        let tid = TransactionId::new();
        let pid = PageId::new(1, 0);
        let lsn1 = log.log_write(tid, pid, vec![], vec![]).unwrap();
        log.force().unwrap();
        drop(log);

        let reopened = LogFile::open(&path).unwrap();
        let lsn2 = reopened.log_write(tid, pid, vec![], vec![]).unwrap();
        assert_eq!(lsn2, lsn1 + 1);
    }
}
