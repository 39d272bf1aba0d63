//! Append-only JSONL event log.
//!
//! One event per `\n`-terminated line. A final line without its newline is a
//! torn write: readers ignore it, and the next append truncates it away before
//! writing. Existing complete lines are never rewritten.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::{StoreError, io_err};
use crate::core::Event;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventLog {
    path: PathBuf,
}

/// A complete line that did not parse as an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MalformedLine {
    /// 1-based line number.
    pub line: usize,
    pub error: String,
}

/// Everything readable from the log in file order.
#[derive(Clone, Debug, Default)]
pub struct LogScan {
    /// `(line number, event)`.
    pub events: Vec<(usize, Event)>,
    pub malformed: Vec<MalformedLine>,
    pub torn_tail: bool,
}

impl LogScan {
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, event)| event)
    }
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty log if none exists.
    pub fn touch(&self) -> Result<(), StoreError> {
        self.ensure_parent()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| io_err(&self.path, source))?;
        Ok(())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(source) => Err(io_err(&self.path, source)),
        }
    }

    /// Stream the log. Blank lines are skipped; a missing file reads as empty.
    pub fn scan(&self) -> Result<LogScan, StoreError> {
        let mut scan = LogScan::default();
        self.for_each_line(|line_no, text, terminated| {
            match serde_json::from_str::<Event>(text) {
                Ok(event) => scan.events.push((line_no, event)),
                Err(_) if !terminated => {
                    tracing::warn!(line = line_no, path = %self.path.display(), "ignoring torn tail");
                    scan.torn_tail = true;
                }
                Err(err) => scan.malformed.push(MalformedLine {
                    line: line_no,
                    error: err.to_string(),
                }),
            }
        })?;
        Ok(scan)
    }

    /// Every complete line that is valid JSON, untouched. Used by export so
    /// records from newer builds survive the round trip.
    pub fn read_values(&self) -> Result<Vec<Value>, StoreError> {
        let mut out = Vec::new();
        self.for_each_line(|_, text, terminated| {
            if let Ok(value) = serde_json::from_str::<Value>(text)
                && (terminated || value.is_object())
            {
                out.push(value);
            }
        })?;
        Ok(out)
    }

    pub fn append(&self, event: &Event) -> Result<(), StoreError> {
        self.append_events(std::slice::from_ref(event))
    }

    /// Append a batch with one write and one sync.
    pub fn append_events(&self, events: &[Event]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut lines = Vec::with_capacity(events.len());
        for event in events {
            lines.push(serde_json::to_string(event).map_err(|source| StoreError::Encode {
                what: "event",
                source,
            })?);
        }
        self.append_lines(lines)
    }

    /// Append raw records verbatim, one per line.
    pub fn append_values(&self, values: &[Value]) -> Result<(), StoreError> {
        let mut lines = Vec::with_capacity(values.len());
        for value in values {
            lines.push(serde_json::to_string(value).map_err(|source| StoreError::Encode {
                what: "event",
                source,
            })?);
        }
        self.append_lines(lines)
    }

    fn append_lines(&self, lines: impl IntoIterator<Item = String>) -> Result<(), StoreError> {
        self.ensure_parent()?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|source| io_err(&self.path, source))?;
        self.repair_tail(&mut file)?;
        file.seek(SeekFrom::End(0))
            .map_err(|source| io_err(&self.path, source))?;
        let mut buf = String::new();
        for line in lines {
            buf.push_str(&line);
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())
            .map_err(|source| io_err(&self.path, source))?;
        file.sync_all().map_err(|source| io_err(&self.path, source))
    }

    /// Make the file end with `\n`. An unterminated final line that parses as
    /// an event is kept and terminated; anything else is cut off.
    fn repair_tail(&self, file: &mut File) -> Result<(), StoreError> {
        let len = file
            .metadata()
            .map_err(|source| io_err(&self.path, source))?
            .len();
        if len == 0 {
            return Ok(());
        }
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))
            .map_err(|source| io_err(&self.path, source))?;
        file.read_exact(&mut last)
            .map_err(|source| io_err(&self.path, source))?;
        if last[0] == b'\n' {
            return Ok(());
        }
        let mut contents = Vec::with_capacity(len as usize);
        file.seek(SeekFrom::Start(0))
            .map_err(|source| io_err(&self.path, source))?;
        file.read_to_end(&mut contents)
            .map_err(|source| io_err(&self.path, source))?;
        let start = contents
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |pos| pos + 1);
        let tail = &contents[start..];
        if serde_json::from_slice::<Event>(tail).is_ok() {
            file.seek(SeekFrom::End(0))
                .map_err(|source| io_err(&self.path, source))?;
            file.write_all(b"\n")
                .map_err(|source| io_err(&self.path, source))?;
        } else {
            tracing::warn!(
                path = %self.path.display(),
                bytes = tail.len(),
                "truncating torn tail before append"
            );
            file.set_len(start as u64)
                .map_err(|source| io_err(&self.path, source))?;
        }
        file.sync_all().map_err(|source| io_err(&self.path, source))
    }

    fn for_each_line(
        &self,
        mut visit: impl FnMut(usize, &str, bool),
    ) -> Result<(), StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(io_err(&self.path, source)),
        };
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut line_no = 0;
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| io_err(&self.path, source))?;
            if read == 0 {
                break;
            }
            line_no += 1;
            let terminated = buf.last() == Some(&b'\n');
            let text = String::from_utf8_lossy(&buf);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            visit(line_no, text, terminated);
        }
        Ok(())
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|source| io_err(dir, source))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActorId, EventId};
    use time::OffsetDateTime;

    fn event(n: u64) -> Event {
        Event {
            id: EventId::from_counter(n),
            ts: OffsetDateTime::UNIX_EPOCH,
            actor_id: ActorId::from_counter(1),
            kind: "project.create".into(),
            entity_id: format!("proj-{n}"),
            payload: serde_json::json!({"name": "p"}),
        }
    }

    fn log_in(dir: &Path) -> EventLog {
        EventLog::new(dir.join("events").join("events.r1.jsonl"))
    }

    #[test]
    fn append_then_scan_preserves_order() {
        let tmp = tempfile::tempdir().unwrap();
        let log = log_in(tmp.path());
        for n in 1..=3 {
            log.append(&event(n)).unwrap();
        }
        let scan = log.scan().unwrap();
        let ids: Vec<&str> = scan.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["evt-1", "evt-2", "evt-3"]);
        assert_eq!(scan.events[2].0, 3);
        assert!(!scan.torn_tail);
    }

    #[test]
    fn torn_tail_is_ignored_then_truncated() {
        let tmp = tempfile::tempdir().unwrap();
        let log = log_in(tmp.path());
        log.append(&event(1)).unwrap();
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        file.write_all(br#"{"id":"evt-2","ts":"#).unwrap();
        drop(file);

        let scan = log.scan().unwrap();
        assert_eq!(scan.events.len(), 1);
        assert!(scan.torn_tail);
        assert!(scan.malformed.is_empty());

        log.append(&event(3)).unwrap();
        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(!text.contains("evt-2"));
        let scan = log.scan().unwrap();
        assert!(!scan.torn_tail);
        assert_eq!(scan.events.len(), 2);
    }

    #[test]
    fn unterminated_valid_line_is_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let log = log_in(tmp.path());
        fs::create_dir_all(log.path().parent().unwrap()).unwrap();
        fs::write(log.path(), serde_json::to_string(&event(1)).unwrap()).unwrap();
        log.append(&event(2)).unwrap();
        assert_eq!(log.scan().unwrap().events.len(), 2);
    }

    #[test]
    fn malformed_lines_are_reported_with_line_numbers() {
        let tmp = tempfile::tempdir().unwrap();
        let log = log_in(tmp.path());
        log.append(&event(1)).unwrap();
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        file.write_all(b"not json\n\n").unwrap();
        drop(file);
        log.append(&event(2)).unwrap();
        let scan = log.scan().unwrap();
        assert_eq!(scan.events.len(), 2);
        assert_eq!(scan.malformed.len(), 1);
        assert_eq!(scan.malformed[0].line, 2);
        assert_eq!(scan.events[1].0, 4);
    }

    #[test]
    fn appending_to_a_clean_log_leaves_earlier_bytes_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let log = log_in(tmp.path());
        log.append(&event(1)).unwrap();
        let before = fs::read(log.path()).unwrap();
        log.append_events(&[event(2), event(3)]).unwrap();
        let after = fs::read(log.path()).unwrap();
        assert!(after.starts_with(&before));
        assert_eq!(after.iter().filter(|b| **b == b'\n').count(), 3);
        let scan = log.scan().unwrap();
        assert_eq!(scan.events.len(), 3);
        assert!(!scan.torn_tail);
    }

    #[test]
    fn empty_batch_writes_nothing_new() {
        let tmp = tempfile::tempdir().unwrap();
        let log = log_in(tmp.path());
        log.append(&event(1)).unwrap();
        let before = fs::read(log.path()).unwrap();
        log.append_events(&[]).unwrap();
        assert_eq!(fs::read(log.path()).unwrap(), before);
    }

    #[test]
    fn missing_log_reads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let log = log_in(tmp.path());
        assert!(log.is_empty().unwrap());
        assert!(log.scan().unwrap().events.is_empty());
    }
}
