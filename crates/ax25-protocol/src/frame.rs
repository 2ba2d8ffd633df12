//! AX.25 frame codec
//!
//! Frames arrive without flags or FCS (KISS strips both), so the layout is:
//!
//! ```text
//! | Dest (7) | Source (7) | Digipeaters (0-56) | Control (1) | PID (0-1) | Info (N) |
//! ```
//!
//! Only the framing is handled here; connected-mode sequencing is not.

use std::fmt;

use crate::address::{Address, ADDRESS_LEN};
use crate::error::ParseError;

/// Unnumbered Information control byte (poll/final clear)
pub const CONTROL_UI: u8 = 0x03;

/// "No layer 3" protocol identifier used by APRS and plain text UI frames
pub const PID_NO_LAYER3: u8 = 0xF0;

/// AX.25 allows at most eight digipeaters
pub const MAX_DIGIPEATERS: usize = 8;

/// A decoded AX.25 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Destination address
    pub dest: Address,
    /// Source address
    pub source: Address,
    /// Digipeater path
    pub path: Vec<Address>,
    /// Raw control byte
    pub control: u8,
    /// Protocol identifier (I and UI frames only)
    pub pid: Option<u8>,
    /// Information field
    pub info: Vec<u8>,
}

impl Frame {
    /// Build a UI frame with PID 0xF0
    pub fn ui(source: Address, dest: Address, path: Vec<Address>, info: Vec<u8>) -> Self {
        Self {
            dest,
            source,
            path,
            control: CONTROL_UI,
            pid: Some(PID_NO_LAYER3),
            info,
        }
    }

    /// Check if this is a UI frame (poll/final bit ignored)
    pub fn is_ui(&self) -> bool {
        self.control & !0x10 == CONTROL_UI
    }

    /// Check if this is a UI frame carrying no layer 3 protocol
    pub fn is_text_ui(&self) -> bool {
        self.is_ui() && self.pid == Some(PID_NO_LAYER3)
    }

    /// Info field as text, lossy, with trailing line endings removed
    pub fn info_text(&self) -> String {
        String::from_utf8_lossy(&self.info)
            .trim_end_matches(['\r', '\n'])
            .to_string()
    }

    /// Whether a frame with this control byte carries a PID byte
    fn has_pid(control: u8) -> bool {
        // I frames (bit 0 clear) and UI frames
        control & 0x01 == 0 || control & !0x10 == CONTROL_UI
    }

    /// Decode a frame from raw bytes (no flags, no FCS)
    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < 2 * ADDRESS_LEN + 1 {
            return Err(ParseError::TooShort { len: data.len() });
        }

        let (mut dest, last) = Address::decode(&data[..ADDRESS_LEN])?;
        if last {
            return Err(ParseError::InvalidAddress(
                "address field ends after destination".into(),
            ));
        }
        let (mut source, mut last) = Address::decode(&data[ADDRESS_LEN..2 * ADDRESS_LEN])?;

        // The high bit is the command/response bit here, not "repeated"
        dest.repeated = false;
        source.repeated = false;

        let mut pos = 2 * ADDRESS_LEN;
        let mut path = Vec::new();
        while !last {
            if path.len() == MAX_DIGIPEATERS {
                return Err(ParseError::TooManyDigipeaters(path.len() + 1));
            }
            if data.len() < pos + ADDRESS_LEN {
                return Err(ParseError::TooShort { len: data.len() });
            }
            let (digi, is_last) = Address::decode(&data[pos..pos + ADDRESS_LEN])?;
            path.push(digi);
            last = is_last;
            pos += ADDRESS_LEN;
        }

        let Some(&control) = data.get(pos) else {
            return Err(ParseError::TooShort { len: data.len() });
        };
        pos += 1;

        let pid = if Self::has_pid(control) {
            let Some(&pid) = data.get(pos) else {
                return Err(ParseError::TooShort { len: data.len() });
            };
            pos += 1;
            Some(pid)
        } else {
            None
        };

        Ok(Self {
            dest,
            source,
            path,
            control,
            pid,
            info: data[pos..].to_vec(),
        })
    }

    /// Encode this frame to raw bytes (no flags, no FCS)
    pub fn encode(&self) -> Result<Vec<u8>, ParseError> {
        if self.path.len() > MAX_DIGIPEATERS {
            return Err(ParseError::TooManyDigipeaters(self.path.len()));
        }

        let mut out =
            Vec::with_capacity((2 + self.path.len()) * ADDRESS_LEN + 2 + self.info.len());
        out.extend_from_slice(&self.dest.encode(true, false));
        out.extend_from_slice(&self.source.encode(false, self.path.is_empty()));
        for (i, digi) in self.path.iter().enumerate() {
            out.extend_from_slice(&digi.encode(digi.repeated, i + 1 == self.path.len()));
        }
        out.push(self.control);
        if let Some(pid) = self.pid {
            out.push(pid);
        }
        out.extend_from_slice(&self.info);
        Ok(out)
    }

    /// Parse a TNC2 monitor line: `SRC>DEST,PATH1,PATH2*:info`
    pub fn from_tnc2(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (header, info) = line
            .split_once(':')
            .ok_or_else(|| ParseError::InvalidTnc2("missing ':'".into()))?;
        let (source, rest) = header
            .split_once('>')
            .ok_or_else(|| ParseError::InvalidTnc2("missing '>'".into()))?;

        let mut fields = rest.split(',');
        let dest = fields
            .next()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ParseError::InvalidTnc2("missing destination".into()))?;

        let path = fields
            .map(str::parse::<Address>)
            .collect::<Result<Vec<_>, _>>()?;
        if path.len() > MAX_DIGIPEATERS {
            return Err(ParseError::TooManyDigipeaters(path.len()));
        }

        Ok(Self::ui(
            source.parse()?,
            dest.parse()?,
            path,
            info.as_bytes().to_vec(),
        ))
    }
}

impl fmt::Display for Frame {
    /// Render in TNC2 monitor format
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", self.source, self.dest)?;
        for digi in &self.path {
            write!(f, ",{}", digi)?;
            if digi.repeated {
                write!(f, "*")?;
            }
        }
        write!(f, ":{}", self.info_text())
    }
}
