/*!
 * Structured output writers
 *
 * The text layout lives in `concat`; these writers emit the same discovery
 * result as an XML document or a JSON object.
 */

use std::io::{self, Write};

use chrono::Local;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;

use crate::concat::{ConcatStats, Concatenator};
use crate::types::{Entry, EntryKind, EntrySource};

/// Host the dump was produced on
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
    pub kernel: String,
}

impl SystemInfo {
    pub fn current() -> Self {
        Self {
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            os: std::env::consts::OS.to_string(),
            kernel: std::env::consts::FAMILY.to_string(),
        }
    }
}

/// XML writer for discovery results
pub struct XmlWriter<'a> {
    concatenator: &'a Concatenator<'a>,
}

impl<'a> XmlWriter<'a> {
    pub fn new(concatenator: &'a Concatenator<'a>) -> Self {
        Self { concatenator }
    }

    /// Write every entry, with file contents, as one `<directory_scan>` document
    pub fn write<W: Write>(&self, entries: &[Entry], out: W) -> io::Result<ConcatStats> {
        let mut stats = ConcatStats::default();
        let loaded = self.concatenator.load(entries);
        let mut writer = Writer::new_with_indent(out, b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut scan = BytesStart::new("directory_scan");
        let timestamp = Local::now().to_rfc3339();
        scan.push_attribute(("timestamp", timestamp.as_str()));
        writer.write_event(Event::Start(scan))?;

        write_system_info(&mut writer, &SystemInfo::current())?;

        writer.write_event(Event::Start(BytesStart::new("entries")))?;
        let mut files = loaded.iter();
        for entry in entries {
            match entry.kind {
                EntryKind::Directory => {
                    let tag = entry_tag("directory", entry);
                    writer.write_event(Event::Empty(tag))?;
                }
                EntryKind::File => {
                    let Some(file) = files.next() else {
                        continue;
                    };
                    let display = entry.display();
                    let mut tag = entry_tag("file", entry);

                    match &file.content {
                        Ok(content) => {
                            let tokens = self.concatenator.count_tokens(content);
                            let recorded = stats.record_file(display, content, tokens);
                            tag.push_attribute(("chars", recorded.chars.to_string().as_str()));
                            tag.push_attribute(("tokens", recorded.tokens.to_string().as_str()));
                            writer.write_event(Event::Start(tag))?;
                            write_text_element(&mut writer, "content", content)?;
                        }
                        Err(message) => {
                            stats.record_error(&display, message);
                            writer.write_event(Event::Start(tag))?;
                            write_text_element(&mut writer, "error", message)?;
                        }
                    }

                    writer.write_event(Event::End(BytesEnd::new("file")))?;
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new("entries")))?;

        let mut summary = BytesStart::new("summary");
        summary.push_attribute(("files_processed", stats.files_processed.to_string().as_str()));
        summary.push_attribute(("files_skipped", stats.files_skipped.to_string().as_str()));
        summary.push_attribute(("total_chars", stats.total_chars.to_string().as_str()));
        summary.push_attribute(("total_tokens", stats.total_tokens.to_string().as_str()));
        writer.write_event(Event::Empty(summary))?;

        writer.write_event(Event::End(BytesEnd::new("directory_scan")))?;
        writer.into_inner().flush()?;

        Ok(stats)
    }
}

fn entry_tag<'t>(name: &'t str, entry: &Entry) -> BytesStart<'t> {
    let mut tag = BytesStart::new(name);
    tag.push_attribute(("path", entry.display().as_str()));
    tag.push_attribute(("depth", entry.depth.to_string().as_str()));
    tag.push_attribute(("source", entry.source.to_string().as_str()));
    tag
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_system_info<W: Write>(writer: &mut Writer<W>, info: &SystemInfo) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("system_info")))?;
    write_text_element(writer, "hostname", &info.hostname)?;
    write_text_element(writer, "os", &info.os)?;
    write_text_element(writer, "kernel", &info.kernel)?;
    writer.write_event(Event::End(BytesEnd::new("system_info")))?;
    Ok(())
}

#[derive(Serialize)]
struct JsonEntry<'e> {
    path: String,
    kind: EntryKind,
    depth: usize,
    source: EntrySource,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'e str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'e str>,
}

#[derive(Serialize)]
struct JsonDump<'e> {
    generated_at: String,
    system: SystemInfo,
    entries: Vec<JsonEntry<'e>>,
    summary: &'e ConcatStats,
}

/// JSON writer for discovery results
pub struct JsonWriter<'a> {
    concatenator: &'a Concatenator<'a>,
}

impl<'a> JsonWriter<'a> {
    pub fn new(concatenator: &'a Concatenator<'a>) -> Self {
        Self { concatenator }
    }

    /// Write entries, contents and totals as a single pretty-printed object
    pub fn write<W: Write>(&self, entries: &[Entry], mut out: W) -> io::Result<ConcatStats> {
        let mut stats = ConcatStats::default();
        let loaded = self.concatenator.load(entries);

        for file in &loaded {
            let display = file.entry.display();
            match &file.content {
                Ok(content) => {
                    let tokens = self.concatenator.count_tokens(content);
                    stats.record_file(display, content, tokens);
                }
                Err(message) => stats.record_error(&display, message),
            }
        }

        let mut files = loaded.iter();
        let json_entries = entries
            .iter()
            .filter_map(|entry| {
                let (content, error) = match entry.kind {
                    EntryKind::Directory => (None, None),
                    EntryKind::File => match &files.next()?.content {
                        Ok(content) => (Some(content.as_str()), None),
                        Err(message) => (None, Some(message.as_str())),
                    },
                };
                Some(JsonEntry {
                    path: entry.display(),
                    kind: entry.kind,
                    depth: entry.depth,
                    source: entry.source,
                    content,
                    error,
                })
            })
            .collect();

        let dump = JsonDump {
            generated_at: Local::now().to_rfc3339(),
            system: SystemInfo::current(),
            entries: json_entries,
            summary: &stats,
        };
        serde_json::to_writer_pretty(&mut out, &dump)?;
        out.write_all(b"\n")?;
        out.flush()?;

        Ok(stats)
    }
}
