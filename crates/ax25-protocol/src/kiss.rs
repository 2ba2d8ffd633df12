//! KISS TNC framing
//!
//! KISS wraps each AX.25 frame between `FEND` bytes and escapes any `FEND`
//! or `FESC` inside the payload. The first byte of a frame is the type
//! byte: high nibble = TNC port, low nibble = command (0 = data).
//!
//! # Format
//! - Frame: `FEND type payload... FEND`
//! - `FEND` in payload → `FESC TFEND`
//! - `FESC` in payload → `FESC TFESC`

use tracing::debug;

/// Frame end
pub const FEND: u8 = 0xC0;
/// Frame escape
pub const FESC: u8 = 0xDB;
/// Transposed frame end
pub const TFEND: u8 = 0xDC;
/// Transposed frame escape
pub const TFESC: u8 = 0xDD;

/// Maximum unescaped frame length accepted from a TNC
const MAX_FRAME_LEN: usize = 2048;

/// KISS command carried in the low nibble of the type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KissCommand {
    /// Data frame to/from the radio
    Data,
    /// TX delay parameter
    TxDelay,
    /// Persistence parameter
    Persistence,
    /// Slot time parameter
    SlotTime,
    /// TX tail parameter
    TxTail,
    /// Full duplex flag
    FullDuplex,
    /// Hardware-specific setting
    SetHardware,
    /// Exit KISS mode (type byte 0xFF)
    Return,
}

impl KissCommand {
    fn from_type_byte(byte: u8) -> Option<Self> {
        if byte == 0xFF {
            return Some(Self::Return);
        }
        match byte & 0x0F {
            0 => Some(Self::Data),
            1 => Some(Self::TxDelay),
            2 => Some(Self::Persistence),
            3 => Some(Self::SlotTime),
            4 => Some(Self::TxTail),
            5 => Some(Self::FullDuplex),
            6 => Some(Self::SetHardware),
            _ => None,
        }
    }
}

/// One decoded KISS frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KissFrame {
    /// TNC port (0-15)
    pub port: u8,
    /// Command
    pub command: KissCommand,
    /// Unescaped payload
    pub data: Vec<u8>,
}

/// Streaming KISS decoder
///
/// Bytes are pushed as they arrive from the transport; complete frames are
/// pulled out with [`KissCodec::next_frame`].
pub struct KissCodec {
    buffer: Vec<u8>,
}

impl KissCodec {
    /// Create a new KISS codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(512),
        }
    }

    /// Push raw bytes into the codec buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete frame, if any
    pub fn next_frame(&mut self) -> Option<KissFrame> {
        loop {
            let Some(start) = self.buffer.iter().position(|&b| b == FEND) else {
                // Noise between frames
                self.buffer.clear();
                return None;
            };
            self.buffer.drain(..start);

            let Some(offset) = self.buffer[1..].iter().position(|&b| b == FEND) else {
                if self.buffer.len() > 2 * MAX_FRAME_LEN {
                    debug!("KISS buffer overflow, discarding {} bytes", self.buffer.len());
                    self.buffer.clear();
                }
                return None;
            };

            // Keep the closing FEND: it may open the next frame
            let raw: Vec<u8> = self.buffer.drain(..offset + 1).skip(1).collect();
            if raw.is_empty() {
                continue;
            }

            let Some(bytes) = unescape(&raw) else {
                debug!("Dropping KISS frame with bad escape sequence");
                continue;
            };
            if bytes.len() > MAX_FRAME_LEN {
                debug!("Dropping oversized KISS frame ({} bytes)", bytes.len());
                continue;
            }

            let type_byte = bytes[0];
            let Some(command) = KissCommand::from_type_byte(type_byte) else {
                debug!("Ignoring unknown KISS command 0x{:02X}", type_byte);
                continue;
            };

            return Some(KissFrame {
                port: type_byte >> 4,
                command,
                data: bytes[1..].to_vec(),
            });
        }
    }
}

impl Default for KissCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn unescape(raw: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter();
    while let Some(&b) = iter.next() {
        if b == FESC {
            match iter.next() {
                Some(&TFEND) => out.push(FEND),
                Some(&TFESC) => out.push(FESC),
                _ => return None,
            }
        } else {
            out.push(b);
        }
    }
    Some(out)
}

/// Encode a data frame for the given TNC port
pub fn encode_data_frame(port: u8, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 4);
    out.push(FEND);
    out.push((port & 0x0F) << 4);
    for &b in data {
        match b {
            FEND => out.extend_from_slice(&[FESC, TFEND]),
            FESC => out.extend_from_slice(&[FESC, TFESC]),
            _ => out.push(b),
        }
    }
    out.push(FEND);
    out
}
