//! Per-instruction trace records.
//!
//! When tracing is enabled each instruction collects its access metadata
//! and predicate outcome, and hands the record to a [`TraceSink`] when it
//! leaves the window. Whether a sink is installed never affects execution.

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::common::{InstSeqNum, PhysAddr, RequestFlags, ThreadId, VirtAddr};

/// Access metadata of a memory instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemRecord {
    /// Virtual address of the access.
    pub vaddr: VirtAddr,
    /// Size in bytes.
    pub size: u32,
    /// Flags supplied by the instruction.
    pub flags: RequestFlags,
    /// Physical address of the first byte, once translated.
    pub paddr: Option<PhysAddr>,
}

/// Trace record of one instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstRecord {
    /// Sequence number.
    pub seq: InstSeqNum,
    /// Owning thread.
    pub tid: ThreadId,
    /// Instruction address.
    pub pc: u64,
    /// Mnemonic of the static form.
    pub mnemonic: &'static str,
    /// Access metadata, for memory instructions.
    pub mem: Option<MemRecord>,
    /// Predicate snapshot, if the predicate was written.
    pub predicate: Option<bool>,
    /// `"committed"` or `"squashed"`, filled in on removal.
    pub outcome: Option<&'static str>,
    /// Fault recorded on the instruction, rendered.
    pub fault: Option<String>,
}

impl InstRecord {
    /// Creates an empty record.
    pub const fn new(seq: InstSeqNum, tid: ThreadId, pc: u64, mnemonic: &'static str) -> Self {
        Self {
            seq,
            tid,
            pc,
            mnemonic,
            mem: None,
            predicate: None,
            outcome: None,
            fault: None,
        }
    }

    pub(crate) fn set_mem(&mut self, vaddr: VirtAddr, size: u32, flags: RequestFlags) {
        self.mem = Some(MemRecord {
            vaddr,
            size,
            flags,
            paddr: None,
        });
    }

    pub(crate) fn set_paddr(&mut self, paddr: Option<PhysAddr>) {
        if let Some(mem) = self.mem.as_mut() {
            mem.paddr = paddr;
        }
    }
}

/// Receiver of finished trace records.
pub trait TraceSink {
    /// Consumes one record.
    fn record(&mut self, rec: &InstRecord);
}

/// Writes one JSON object per line.
///
/// Write errors are logged and otherwise ignored.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wraps a writer.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TraceSink for JsonLinesSink<W> {
    fn record(&mut self, rec: &InstRecord) {
        let res = serde_json::to_writer(&mut self.out, rec)
            .map_err(std::io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"));
        if let Err(e) = res {
            tracing::warn!(seq = %rec.seq, error = %e, "trace sink write failed");
        }
    }
}

/// Collects records in memory behind a shared handle.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    records: Arc<Mutex<Vec<InstRecord>>>,
}

impl CollectingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record collected so far.
    pub fn records(&self) -> Vec<InstRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl TraceSink for CollectingSink {
    fn record(&mut self, rec: &InstRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(rec.clone());
        }
    }
}
