//! Dump journal command implementation.

use outbox_core::{Frame, FrameIter};
use outbox_storage::{FileBackend, StorageBackend};
use serde::Serialize;
use std::path::Path;

/// Journal frame representation for output.
#[derive(Debug, Serialize)]
pub struct FrameInfo {
    /// Offset in the journal file.
    pub offset: u64,
    /// Frame type.
    pub frame_type: String,
    /// Record id (append and delete frames).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<u64>,
    /// Client temp id (append frames).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_temp_id: Option<String>,
    /// Staging time (append frames).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Id high-water mark (sequence frames).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_id: Option<u64>,
}

impl FrameInfo {
    fn new(offset: u64, frame: &Frame) -> Self {
        let mut info = Self {
            offset,
            frame_type: frame.frame_type().name().to_string(),
            record_id: None,
            client_temp_id: None,
            timestamp: None,
            next_id: None,
        };
        match frame {
            Frame::Append(record) => {
                info.record_id = Some(record.id.as_u64());
                info.client_temp_id = Some(record.client_temp_id.clone());
                info.timestamp = Some(record.timestamp.clone());
            }
            Frame::Delete(id) => info.record_id = Some(id.as_u64()),
            Frame::Sequence { next_id } => info.next_id = Some(*next_id),
        }
        info
    }
}

/// Frames read plus how the scan ended.
#[derive(Debug, Serialize)]
pub struct JournalDump {
    /// Frames in journal order.
    pub frames: Vec<FrameInfo>,
    /// Bytes covered by intact frames.
    pub valid_bytes: u64,
    /// Bytes after the last frame read.
    pub trailing_bytes: u64,
    /// Corruption that stopped the scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the dump-journal command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err("Journal file not found".into());
    }

    let backend = FileBackend::open(path)?;
    let dump = read_frames(&backend, limit)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&dump)?),
        _ => print_text_output(&dump),
    }
    Ok(())
}

/// Scans the journal without modifying it.
pub fn read_frames(
    backend: &dyn StorageBackend,
    limit: Option<usize>,
) -> Result<JournalDump, Box<dyn std::error::Error>> {
    let size = backend.size()?;
    let max_frames = limit.unwrap_or(usize::MAX);
    let mut frames = Vec::new();
    let mut error = None;

    let mut iter = FrameIter::new(backend)?;
    while frames.len() < max_frames {
        match iter.next() {
            Some(Ok((offset, frame))) => frames.push(FrameInfo::new(offset, &frame)),
            Some(Err(e)) => {
                error = Some(e.to_string());
                break;
            }
            None => break,
        }
    }

    let valid_bytes = iter.valid_len();
    Ok(JournalDump {
        frames,
        valid_bytes,
        trailing_bytes: size - valid_bytes,
        error,
    })
}

fn print_text_output(dump: &JournalDump) {
    println!("{:>10}  {:<9}  {:>8}  DETAILS", "OFFSET", "TYPE", "ID");
    for frame in &dump.frames {
        let id = frame
            .record_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        let details = match (&frame.timestamp, &frame.client_temp_id, frame.next_id) {
            (Some(ts), Some(temp), _) => format!("{ts} {temp}"),
            (_, _, Some(next)) => format!("next id {next}"),
            _ => String::new(),
        };
        println!("{:>10}  {:<9}  {:>8}  {}", frame.offset, frame.frame_type, id, details);
    }
    println!();
    println!(
        "{} frame(s), {} valid bytes, {} trailing bytes",
        dump.frames.len(),
        dump.valid_bytes,
        dump.trailing_bytes
    );
    if let Some(error) = &dump.error {
        println!("Scan stopped: {error}");
    }
}
