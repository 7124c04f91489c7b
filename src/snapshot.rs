//! Snapshot line codec and in-memory snapshot map
//!
//! A snapshot is persisted as UTF-8 text, one record per line:
//!
//! ```text
//! <flags>:<path>|<created>|<accessed>|<modified>|<size>|<hash>
//! ```
//!
//! `<flags>` is the 3-character status prefix described on
//! [`StatusFlags::to_prefix`]. Timestamps are RFC 3339 in UTC with
//! nanosecond precision, `size` and `hash` are unsigned decimals.
//!
//! Decoding is strict. One malformed line makes the whole snapshot unusable,
//! so [`Snapshot::load`] stops at the first bad line instead of skipping it.
//! Encoding is strict too: a path holding `|` or a line break has no
//! representation, and [`encode`] refuses it rather than write a line the
//! loader would reject.
//!
//! ## Examples
//!
//! ```rust
//! use filecrc::snapshot::{decode, encode};
//! use filecrc::types::FileRecord;
//! use chrono::{TimeZone, Utc};
//!
//! let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
//! let record = FileRecord::new("/srv/a.txt", 100, 42, t, t, t);
//!
//! let line = encode(&record).unwrap();
//! assert!(line.starts_with("---:/srv/a.txt|2024-05-01T12:00:00.000000000Z|"));
//! assert_eq!(decode(&line).unwrap(), record);
//! ```

use crate::collections::{HashMap, HashMapExt};
use crate::error::{FileCrcError, Result};
use crate::types::{FileRecord, StatusFlags};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, trace};

/// Separator between the status prefix and the record fields
pub const PREFIX_SEPARATOR: char = ':';
/// Separator between record fields
pub const FIELD_SEPARATOR: char = '|';
/// Number of `|`-separated fields after the prefix
pub const FIELD_COUNT: usize = 6;

/// Encode one record as a newline-terminated snapshot line
///
/// # Errors
///
/// [`FileCrcError::UnstorablePath`] when the path contains the field
/// separator or a line break.
pub fn encode(record: &FileRecord) -> Result<String> {
    if !is_storable(&record.path) {
        return Err(FileCrcError::UnstorablePath(record.path.clone()));
    }

    Ok(format!(
        "{}{}{}|{}|{}|{}|{}|{}\n",
        record.flags.to_prefix(),
        PREFIX_SEPARATOR,
        record.path,
        encode_time(&record.created),
        encode_time(&record.accessed),
        encode_time(&record.modified),
        record.size,
        record.content_hash,
    ))
}

/// Whether `path` can be written as a snapshot line and read back
pub fn is_storable(path: &str) -> bool {
    !path.contains([FIELD_SEPARATOR, '\n', '\r'])
}

/// Decode one snapshot line
///
/// A trailing `\n` or `\r\n` is accepted. Flags are taken from the prefix
/// as stored; callers that use the record as a baseline clear them.
///
/// # Errors
///
/// [`FileCrcError::Format`] when the prefix is malformed, the field count
/// is not exactly six, or a timestamp or number fails to parse.
pub fn decode(line: &str) -> Result<FileRecord> {
    let line = line.trim_end_matches(['\n', '\r']);

    let (prefix, rest) = split_prefix(line)
        .ok_or_else(|| FileCrcError::format(line, "missing 3-character status prefix"))?;
    let flags = StatusFlags::from_prefix(prefix)
        .ok_or_else(|| FileCrcError::format(line, "invalid status prefix"))?;

    let fields: Vec<&str> = rest.split(FIELD_SEPARATOR).collect();
    if fields.len() != FIELD_COUNT {
        return Err(FileCrcError::format(
            line,
            format!("expected {} fields, found {}", FIELD_COUNT, fields.len()),
        ));
    }

    let created = decode_time(line, "created", fields[1])?;
    let accessed = decode_time(line, "accessed", fields[2])?;
    let modified = decode_time(line, "modified", fields[3])?;
    let size = fields[4]
        .parse::<u64>()
        .map_err(|e| FileCrcError::format(line, format!("bad size '{}': {}", fields[4], e)))?;
    let content_hash = fields[5]
        .parse::<u64>()
        .map_err(|e| FileCrcError::format(line, format!("bad hash '{}': {}", fields[5], e)))?;

    let mut record = FileRecord::new(fields[0], size, content_hash, created, accessed, modified);
    record.flags = flags;
    Ok(record)
}

/// Split `"SMN:rest"` into `("SMN", "rest")`
fn split_prefix(line: &str) -> Option<(&str, &str)> {
    let (sep_index, sep) = line.char_indices().nth(3)?;
    if sep != PREFIX_SEPARATOR {
        return None;
    }
    Some((&line[..sep_index], &line[sep_index + sep.len_utf8()..]))
}

fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(line: &str, field: &str, text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| FileCrcError::format(line, format!("bad {} time '{}': {}", field, text, e)))
}

/// Mapping of lowercase path to [`FileRecord`]
///
/// Keys are unique; inserting a record whose path differs from an existing
/// one only by case replaces it.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: HashMap<String, FileRecord>,
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.records.len() == other.records.len()
            && self
                .records
                .iter()
                .all(|(key, record)| other.records.get(key) == Some(record))
    }
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Create an empty snapshot with room for `capacity` records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: HashMap::with_capacity(capacity),
        }
    }

    /// Decode a full snapshot from its serialized bytes
    ///
    /// With `clear_flags` set, the persisted findings are dropped so the
    /// snapshot can serve as a baseline. Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// [`FileCrcError::Format`] for the first undecodable line, or when the
    /// content is not UTF-8.
    pub fn load(bytes: &[u8], clear_flags: bool) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            FileCrcError::format(
                String::from_utf8_lossy(&bytes[..e.valid_up_to().min(64)]).into_owned(),
                format!("snapshot is not valid UTF-8: {}", e),
            )
        })?;

        let mut snapshot = Snapshot::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let mut record = decode(line)?;
            if clear_flags {
                record.flags.clear();
            }
            if let Some(previous) = snapshot.insert(record) {
                debug!("Duplicate snapshot entry replaced: {}", previous.path);
            }
        }

        trace!("Loaded snapshot with {} records", snapshot.len());
        Ok(snapshot)
    }

    /// Serialize every record, one line each, ordered by key
    ///
    /// # Errors
    ///
    /// [`FileCrcError::UnstorablePath`] for the first record whose path
    /// cannot be encoded; nothing is returned in that case.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut keys: Vec<&String> = self.records.keys().collect();
        keys.sort();

        let mut out = String::with_capacity(self.records.len() * 128);
        for key in keys {
            out.push_str(&encode(&self.records[key])?);
        }
        Ok(out.into_bytes())
    }

    /// Insert a record under its lowercase key, returning any replaced record
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        self.records.insert(record.key(), record)
    }

    /// Look up a record by path (case-insensitive)
    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.records.get(&path.to_lowercase())
    }

    /// Whether a record exists for `path` (case-insensitive)
    pub fn contains(&self, path: &str) -> bool {
        self.records.contains_key(&path.to_lowercase())
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the records in no particular order
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    /// Iterate over the lowercase keys in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Clear the status flags of every record
    pub fn clear_flags(&mut self) {
        for record in self.records.values_mut() {
            record.flags.clear();
        }
    }
}

impl FromIterator<FileRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}
