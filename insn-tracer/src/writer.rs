//! Streaming trace document writer
//!
//! Writes the document piecewise so that nothing but the current record is
//! held in memory. Once the footer is written the document is valid JSON no
//! matter how many records the body holds, including none.

use crate::config::TraceConfig;
use crate::error::TraceError;
use crate::trace::{StopReason, TraceRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Invocation arguments recorded in the `info` section
#[derive(Debug, Serialize)]
struct SessionInfo<'a> {
    disassemble: bool,
    output: &'a Path,
    breakpoint: &'a str,
    limit: Option<u64>,
    target: &'a [String],
    date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Fresh,
    Body,
    Finished,
}

/// Append-only writer over a byte sink
pub struct TraceWriter<W: Write> {
    sink: W,
    state: WriterState,
    records: u64,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            state: WriterState::Fresh,
            records: 0,
        }
    }

    /// Number of records appended so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Write the `info` section and open the `trace` array. Allowed once.
    pub fn write_header(
        &mut self,
        config: &TraceConfig,
        started_at: DateTime<Utc>,
    ) -> Result<(), TraceError> {
        if self.state != WriterState::Fresh {
            return Err(TraceError::Misuse("header written twice"));
        }
        let info = SessionInfo {
            disassemble: config.disassemble,
            output: &config.output,
            breakpoint: &config.breakpoint,
            limit: config.effective_limit(),
            target: &config.target,
            date: timestamp(started_at),
        };
        self.sink.write_all(b"{\n\"info\":")?;
        serde_json::to_writer(&mut self.sink, &info)?;
        self.sink.write_all(b",\n\"trace\":[\n")?;
        self.sink.flush()?;
        self.state = WriterState::Body;
        Ok(())
    }

    /// Append one record and flush it to the sink
    pub fn append_record(&mut self, record: &TraceRecord) -> Result<(), TraceError> {
        match self.state {
            WriterState::Fresh => return Err(TraceError::Misuse("record before header")),
            WriterState::Finished => return Err(TraceError::Misuse("record after footer")),
            WriterState::Body => {}
        }
        if self.records > 0 {
            self.sink.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut self.sink, record)?;
        self.sink.flush()?;
        self.records += 1;
        Ok(())
    }

    /// Close the `trace` array and write the end-of-trace fields
    pub fn write_footer(
        &mut self,
        count: u64,
        ended_at: DateTime<Utc>,
        reason: &StopReason,
    ) -> Result<(), TraceError> {
        match self.state {
            WriterState::Fresh => return Err(TraceError::Misuse("footer before header")),
            WriterState::Finished => return Err(TraceError::Misuse("footer written twice")),
            WriterState::Body => {}
        }
        if self.records > 0 {
            self.sink.write_all(b"\n")?;
        }
        self.sink.write_all(b"],\n\"eot\":")?;
        serde_json::to_writer(&mut self.sink, &timestamp(ended_at))?;
        write!(self.sink, ",\n\"length\":{},\n\"reason\":", count)?;
        serde_json::to_writer(&mut self.sink, reason.as_str())?;
        if let Some(detail) = reason.detail() {
            self.sink.write_all(b",\n\"detail\":")?;
            serde_json::to_writer(&mut self.sink, &detail)?;
        }
        self.sink.write_all(b"\n}\n")?;
        self.state = WriterState::Finished;
        Ok(())
    }

    /// Flush and release the sink
    pub fn close(mut self) -> Result<(), TraceError> {
        if self.state != WriterState::Finished {
            tracing::warn!("Closing trace sink without a footer");
        }
        self.sink.flush()?;
        Ok(())
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn record(address: &str, bytes: &str) -> TraceRecord {
        TraceRecord {
            address: address.to_string(),
            raw_bytes: bytes.to_string(),
            mnemonic: None,
            label: None,
        }
    }

    #[test]
    fn test_empty_body_is_well_formed() {
        let mut out = Vec::new();
        let mut writer = TraceWriter::new(&mut out);
        writer.write_header(&TraceConfig::default(), Utc::now()).unwrap();
        writer.write_footer(0, Utc::now(), &StopReason::LimitReached).unwrap();
        writer.close().unwrap();

        let doc: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["trace"].as_array().unwrap().len(), 0);
        assert_eq!(doc["length"], 0);
        assert_eq!(doc["info"]["breakpoint"], "main");
        assert_eq!(doc["reason"], "limit reached");
        assert!(doc.get("detail").is_none());
    }

    #[test]
    fn test_records_keep_execution_order() {
        let mut out = Vec::new();
        let mut writer = TraceWriter::new(&mut out);
        writer.write_header(&TraceConfig::default(), Utc::now()).unwrap();
        // Same address twice, as in a loop
        writer.append_record(&record("0x1000", "0x90")).unwrap();
        writer.append_record(&record("0x1001", "0xeb")).unwrap();
        writer.append_record(&record("0x1000", "0x90")).unwrap();
        assert_eq!(writer.records(), 3);
        let reason = StopReason::BoundaryReached {
            address: 0x2000,
            cause: "breakpoint *0x2000 has been reached".to_string(),
        };
        writer.write_footer(3, Utc::now(), &reason).unwrap();
        writer.close().unwrap();

        let doc: Value = serde_json::from_slice(&out).unwrap();
        let addrs: Vec<&str> = doc["trace"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["addr"].as_str().unwrap())
            .collect();
        assert_eq!(addrs, vec!["0x1000", "0x1001", "0x1000"]);
        assert_eq!(doc["length"], 3);
        assert_eq!(doc["detail"], "breakpoint *0x2000 has been reached");
    }

    #[test]
    fn test_contract_violations() {
        let mut out = Vec::new();
        let mut writer = TraceWriter::new(&mut out);
        assert!(matches!(
            writer.append_record(&record("0x1", "0x90")),
            Err(TraceError::Misuse(_))
        ));
        assert!(matches!(
            writer.write_footer(0, Utc::now(), &StopReason::LimitReached),
            Err(TraceError::Misuse(_))
        ));

        writer.write_header(&TraceConfig::default(), Utc::now()).unwrap();
        assert!(writer.write_header(&TraceConfig::default(), Utc::now()).is_err());

        writer.write_footer(0, Utc::now(), &StopReason::LimitReached).unwrap();
        assert!(writer.append_record(&record("0x1", "0x90")).is_err());
        assert!(writer.write_footer(0, Utc::now(), &StopReason::LimitReached).is_err());
    }

    #[test]
    fn test_escapes_strings() {
        let mut out = Vec::new();
        let mut writer = TraceWriter::new(&mut out);
        writer.write_header(&TraceConfig::default(), Utc::now()).unwrap();
        writer.append_record(&record("0x1 \"odd\"", "0x90")).unwrap();
        writer
            .write_footer(
                1,
                Utc::now(),
                &StopReason::Interrupted { cause: "ctrl+c \"now\"".to_string() },
            )
            .unwrap();
        writer.close().unwrap();

        let doc: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["trace"][0]["addr"], "0x1 \"odd\"");
        assert_eq!(doc["detail"], "ctrl+c \"now\"");
    }
}
