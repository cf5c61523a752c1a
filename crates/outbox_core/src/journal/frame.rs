//! Journal frame types and serialization.

use crate::error::{CoreError, CoreResult};
use crate::record::{ChangeRecord, RecordId};

/// Magic bytes opening every frame.
pub const JOURNAL_MAGIC: [u8; 4] = *b"OBXJ";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub const HEADER_SIZE: usize = 11;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 4;

/// Type of journal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// A record was staged.
    Append = 1,
    /// A record was removed.
    Delete = 2,
    /// Id high-water mark, written at the head of a compacted journal.
    Sequence = 3,
}

impl FrameType {
    /// Converts a byte to a frame type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Append),
            2 => Some(Self::Delete),
            3 => Some(Self::Sequence),
            _ => None,
        }
    }

    /// Converts the frame type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Upper-case name used by diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Append => "APPEND",
            Self::Delete => "DELETE",
            Self::Sequence => "SEQUENCE",
        }
    }
}

/// One journal entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A record was staged. The payload is the CBOR encoding of the record.
    Append(ChangeRecord),
    /// A record was removed.
    Delete(RecordId),
    /// The next id to assign is at least `next_id`.
    Sequence {
        /// Next id to assign.
        next_id: u64,
    },
}

impl Frame {
    /// Returns the frame type.
    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        match self {
            Self::Append(_) => FrameType::Append,
            Self::Delete(_) => FrameType::Delete,
            Self::Sequence { .. } => FrameType::Sequence,
        }
    }

    /// Serializes the frame payload (without envelope).
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        match self {
            Self::Append(record) => {
                let mut buf = Vec::new();
                ciborium::into_writer(record, &mut buf)
                    .map_err(|e| CoreError::Codec(format!("failed to encode record {}: {e}", record.id)))?;
                Ok(buf)
            }
            Self::Delete(id) => Ok(id.as_u64().to_le_bytes().to_vec()),
            Self::Sequence { next_id } => Ok(next_id.to_le_bytes().to_vec()),
        }
    }

    /// Deserializes a frame from its type and payload.
    ///
    /// `offset` is only used for error reporting.
    pub fn decode_payload(frame_type: FrameType, payload: &[u8], offset: u64) -> CoreResult<Self> {
        let read_u64 = || -> CoreResult<u64> {
            let bytes: [u8; 8] = payload.try_into().map_err(|_| {
                CoreError::corruption(
                    offset,
                    format!(
                        "{} frame must carry 8 bytes, got {}",
                        frame_type.name(),
                        payload.len()
                    ),
                )
            })?;
            Ok(u64::from_le_bytes(bytes))
        };

        match frame_type {
            FrameType::Append => {
                let record: ChangeRecord = ciborium::from_reader(payload)
                    .map_err(|e| CoreError::corruption(offset, format!("undecodable record: {e}")))?;
                Ok(Self::Append(record))
            }
            FrameType::Delete => Ok(Self::Delete(RecordId::new(read_u64()?))),
            FrameType::Sequence => Ok(Self::Sequence {
                next_id: read_u64()?,
            }),
        }
    }

    /// Encodes the full frame: header, payload and checksum.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::Codec("journal frame payload too large".into()))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&JOURNAL_MAGIC);
        data.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        data.push(self.frame_type().as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }
}

/// Computes the CRC-32 (IEEE polynomial) of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
