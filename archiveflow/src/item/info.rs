//! The info file written next to every WARC.

use super::WorkItem;
use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, PrettyFormatter};
use std::io;

/// Metadata record persisted as `<base>.json`.
///
/// This field set is read by external tools. New fields may be added;
/// existing ones keep their name and meaning. Absent values serialize as
/// `null` so every key is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoRecord {
    /// Whether the job was aborted before finishing.
    pub aborted: bool,
    /// Requested fetch depth.
    pub fetch_depth: Option<String>,
    /// Pipeline that ran the job.
    pub pipeline_id: Option<String>,
    /// When the job was queued.
    pub queued_at: Option<serde_json::Value>,
    /// Who queued the job.
    pub started_by: Option<String>,
    /// Where the job was queued from.
    pub started_in: Option<String>,
    /// Seed URL.
    pub url: Option<String>,
}

impl InfoRecord {
    /// Builds the record from an item's current attributes.
    #[must_use]
    pub fn from_item(item: &WorkItem) -> Self {
        let job = &item.job;
        Self {
            aborted: item.aborted,
            fetch_depth: job.fetch_depth.clone(),
            pipeline_id: job.pipeline_id.clone(),
            queued_at: job.queued_at.clone(),
            started_by: job.started_by.clone(),
            started_in: job.started_in.clone(),
            url: job.url.clone(),
        }
    }

    /// Renders the record as JSON indented by one space, with every
    /// non-ASCII character escaped as `\uXXXX`.
    ///
    /// Existing info files are written this way and some consumers compare
    /// them byte for byte.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut out = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut out, InfoFormatter::new());
        self.serialize(&mut ser)?;
        // The formatter only ever writes ASCII.
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// One-space pretty printing with ASCII-only string output.
struct InfoFormatter {
    pretty: PrettyFormatter<'static>,
}

impl InfoFormatter {
    fn new() -> Self {
        Self {
            pretty: PrettyFormatter::with_indent(b" "),
        }
    }
}

impl Formatter for InfoFormatter {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.pretty.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.pretty.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        for ch in fragment.chars() {
            if ch.is_ascii() {
                let mut buf = [0u8; 4];
                writer.write_all(ch.encode_utf8(&mut buf).as_bytes())?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}
