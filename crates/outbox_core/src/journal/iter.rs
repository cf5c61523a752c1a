//! Frame-by-frame journal reader.

use super::frame::{compute_crc32, Frame, FrameType, CRC_SIZE, HEADER_SIZE, JOURNAL_MAGIC, JOURNAL_VERSION};
use crate::error::{CoreError, CoreResult};
use outbox_storage::StorageBackend;

/// Iterator over the frames of a journal.
///
/// Yields `(offset, Frame)` pairs. A torn tail ends iteration cleanly;
/// corruption yields one error and then ends. After iteration,
/// [`valid_len`](Self::valid_len) is the offset just past the last good
/// frame, which is where the next append must go.
pub struct FrameIter<'a> {
    backend: &'a dyn StorageBackend,
    size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> FrameIter<'a> {
    /// Creates an iterator starting at the beginning of the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(backend: &'a dyn StorageBackend) -> CoreResult<Self> {
        Ok(Self {
            backend,
            size: backend.size()?,
            offset: 0,
            finished: false,
        })
    }

    /// Offset just past the last frame read successfully.
    #[must_use]
    pub fn valid_len(&self) -> u64 {
        self.offset
    }

    /// True if bytes remain after the last good frame.
    #[must_use]
    pub fn has_torn_tail(&self) -> bool {
        self.offset < self.size
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, Frame)>> {
        let offset = self.offset;
        let remaining = self.size - offset;
        if remaining < HEADER_SIZE as u64 {
            return Ok(None);
        }

        let header = self.backend.read_at(offset, HEADER_SIZE)?;
        if header[0..4] != JOURNAL_MAGIC {
            return Err(CoreError::corruption(offset, "bad frame magic"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != JOURNAL_VERSION {
            return Err(CoreError::corruption(
                offset,
                format!("unsupported journal version {version}"),
            ));
        }
        let frame_type = FrameType::from_byte(header[6]).ok_or_else(|| {
            CoreError::corruption(offset, format!("unknown frame type {:#04x}", header[6]))
        })?;
        let len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;

        let total = HEADER_SIZE + len + CRC_SIZE;
        if remaining < total as u64 {
            return Ok(None);
        }

        let frame_bytes = self.backend.read_at(offset, total)?;
        let body_end = total - CRC_SIZE;
        let expected = u32::from_le_bytes([
            frame_bytes[body_end],
            frame_bytes[body_end + 1],
            frame_bytes[body_end + 2],
            frame_bytes[body_end + 3],
        ]);
        let actual = compute_crc32(&frame_bytes[..body_end]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch {
                offset,
                expected,
                actual,
            });
        }

        let frame = Frame::decode_payload(frame_type, &frame_bytes[HEADER_SIZE..body_end], offset)?;
        self.offset += total as u64;
        Ok(Some((offset, frame)))
    }
}

impl Iterator for FrameIter<'_> {
    type Item = CoreResult<(u64, Frame)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
