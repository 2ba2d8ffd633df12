//! Classified packets
//!
//! Every decoded frame is classified into exactly one [`Packet`] variant.
//! The gateway routes on the variant; backends encode outgoing packets
//! back into frames with [`Packet::to_frame`].

use std::fmt;

use crate::address::Address;
use crate::aprs::{looks_like_aprs, AprsData};
use crate::error::ParseError;
use crate::frame::Frame;

/// Info-field prefix marking a file transfer chunk
pub const FILE_TRANSFER_PREFIX: &[u8] = b"#FILE:";

/// Kind tag of a packet, for logging and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Plain AX.25 chat text
    Chat,
    /// APRS report or message
    Aprs,
    /// File transfer chunk
    FileTransfer,
    /// Anything the gateway cannot route
    Other,
}

impl PacketKind {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chat => "AX.25 chat",
            Self::Aprs => "APRS",
            Self::FileTransfer => "AX.25 file transfer",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Plain text UI frame between stations
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPacket {
    /// Sending station
    pub source: Address,
    /// Destination station or broadcast address such as `CQ`
    pub dest: Address,
    /// Digipeater path
    pub path: Vec<Address>,
    /// Message text
    pub text: String,
}

/// APRS packet
#[derive(Debug, Clone, PartialEq)]
pub struct AprsPacket {
    /// Sending station
    pub source: Address,
    /// Destination (usually a tocall such as `APRS`)
    pub dest: Address,
    /// Digipeater path
    pub path: Vec<Address>,
    /// Raw information field
    pub info: String,
    /// Decoded information field
    pub data: AprsData,
}

impl AprsPacket {
    /// Create an APRS packet and decode its information field
    pub fn new(source: Address, dest: Address, path: Vec<Address>, info: impl Into<String>) -> Self {
        let info = info.into();
        let data = AprsData::parse(&info);
        Self {
            source,
            dest,
            path,
            info,
            data,
        }
    }
}

/// Header of a file transfer chunk: `#FILE:<name>:<offset>:<total>:`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// File name
    pub name: String,
    /// Byte offset of this chunk
    pub offset: u64,
    /// Total file size in bytes
    pub total: u64,
}

impl FileHeader {
    /// Split an info field into header and chunk bytes
    pub fn parse(info: &[u8]) -> Result<(Self, Vec<u8>), ParseError> {
        let rest = info
            .strip_prefix(FILE_TRANSFER_PREFIX)
            .ok_or_else(|| ParseError::InvalidFileHeader("missing prefix".into()))?;

        let mut fields = rest.splitn(4, |&b| b == b':');
        let mut next_field = |what: &str| {
            fields
                .next()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .ok_or_else(|| ParseError::InvalidFileHeader(format!("missing {}", what)))
        };

        let name = next_field("name")?;
        let offset = next_field("offset")?;
        let total = next_field("total")?;
        let data = fields.next().map(<[u8]>::to_vec).ok_or_else(|| {
            ParseError::InvalidFileHeader("missing terminator after total".into())
        })?;

        if name.is_empty() {
            return Err(ParseError::InvalidFileHeader("empty name".into()));
        }
        let offset = offset
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidFileHeader(format!("offset {:?}", offset)))?;
        let total = total
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidFileHeader(format!("total {:?}", total)))?;

        Ok((
            Self {
                name,
                offset,
                total,
            },
            data,
        ))
    }

    /// Encode the header (without chunk bytes)
    pub fn encode(&self) -> Vec<u8> {
        let mut out = FILE_TRANSFER_PREFIX.to_vec();
        out.extend_from_slice(format!("{}:{}:{}:", self.name, self.offset, self.total).as_bytes());
        out
    }
}

/// File transfer chunk
#[derive(Debug, Clone, PartialEq)]
pub struct FileTransferPacket {
    /// Sending station
    pub source: Address,
    /// Receiving station
    pub dest: Address,
    /// Digipeater path
    pub path: Vec<Address>,
    /// Transfer metadata
    pub header: FileHeader,
    /// Chunk bytes
    pub data: Vec<u8>,
}

/// A classified packet
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// AX.25 chat text
    Chat(ChatPacket),
    /// APRS
    Aprs(AprsPacket),
    /// AX.25 file transfer chunk
    FileTransfer(FileTransferPacket),
    /// Unroutable frame, kept verbatim
    Other(Frame),
}

impl Packet {
    /// Classify a decoded frame
    pub fn from_frame(frame: Frame) -> Self {
        if !frame.is_text_ui() {
            return Packet::Other(frame);
        }

        if frame.info.starts_with(FILE_TRANSFER_PREFIX) {
            return match FileHeader::parse(&frame.info) {
                Ok((header, data)) => Packet::FileTransfer(FileTransferPacket {
                    source: frame.source,
                    dest: frame.dest,
                    path: frame.path,
                    header,
                    data,
                }),
                Err(_) => Packet::Other(frame),
            };
        }

        if frame.dest.callsign.starts_with("AP") || looks_like_aprs(&frame.info) {
            let info = frame.info_text();
            return Packet::Aprs(AprsPacket::new(frame.source, frame.dest, frame.path, info));
        }

        let text = frame.info_text();
        Packet::Chat(ChatPacket {
            source: frame.source,
            dest: frame.dest,
            path: frame.path,
            text,
        })
    }

    /// Decode and classify raw frame bytes
    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        Frame::decode(data).map(Self::from_frame)
    }

    /// Get the kind tag
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Chat(_) => PacketKind::Chat,
            Packet::Aprs(_) => PacketKind::Aprs,
            Packet::FileTransfer(_) => PacketKind::FileTransfer,
            Packet::Other(_) => PacketKind::Other,
        }
    }

    /// Sending station
    pub fn source(&self) -> &Address {
        match self {
            Packet::Chat(p) => &p.source,
            Packet::Aprs(p) => &p.source,
            Packet::FileTransfer(p) => &p.source,
            Packet::Other(f) => &f.source,
        }
    }

    /// Rebuild the frame for transmission
    pub fn to_frame(&self) -> Frame {
        match self {
            Packet::Chat(p) => Frame::ui(
                p.source.clone(),
                p.dest.clone(),
                p.path.clone(),
                p.text.as_bytes().to_vec(),
            ),
            Packet::Aprs(p) => Frame::ui(
                p.source.clone(),
                p.dest.clone(),
                p.path.clone(),
                p.info.as_bytes().to_vec(),
            ),
            Packet::FileTransfer(p) => {
                let mut info = p.header.encode();
                info.extend_from_slice(&p.data);
                Frame::ui(p.source.clone(), p.dest.clone(), p.path.clone(), info)
            }
            Packet::Other(f) => f.clone(),
        }
    }

    /// Encode to raw frame bytes
    pub fn encode(&self) -> Result<Vec<u8>, ParseError> {
        self.to_frame().encode()
    }
}

impl fmt::Display for Packet {
    /// TNC2 monitor format
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CONTROL_UI;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn ui(dest: &str, info: &[u8]) -> Frame {
        Frame::ui(addr("N0CALL-1"), addr(dest), vec![], info.to_vec())
    }

    #[test]
    fn test_classify_aprs_by_tocall() {
        let packet = Packet::from_frame(ui("APDW16", b"hello"));
        assert_eq!(packet.kind(), PacketKind::Aprs);
    }

    #[test]
    fn test_classify_aprs_by_data_type() {
        let packet = Packet::from_frame(ui("KB1ABC", b":KB1ABC   :hi{1"));
        match packet {
            Packet::Aprs(p) => assert!(matches!(p.data, AprsData::Message { .. })),
            other => panic!("Expected Aprs, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_chat() {
        let packet = Packet::from_frame(ui("CQ", b"Hello from the field\r"));
        match packet {
            Packet::Chat(p) => {
                assert_eq!(p.text, "Hello from the field");
                assert_eq!(p.dest.callsign, "CQ");
            }
            other => panic!("Expected Chat, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_file_transfer() {
        let packet = Packet::from_frame(ui("KB1ABC", b"#FILE:notes.txt:0:11:hello world"));
        match packet {
            Packet::FileTransfer(p) => {
                assert_eq!(p.header.name, "notes.txt");
                assert_eq!(p.header.total, 11);
                assert_eq!(p.data, b"hello world");
            }
            other => panic!("Expected FileTransfer, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_file_header_is_other() {
        let packet = Packet::from_frame(ui("KB1ABC", b"#FILE:notes.txt:zero"));
        assert_eq!(packet.kind(), PacketKind::Other);
    }

    #[test]
    fn test_non_ui_is_other() {
        let mut frame = ui("KB1ABC", b"data");
        frame.control = 0x00; // I frame
        assert_eq!(Packet::from_frame(frame).kind(), PacketKind::Other);

        let mut frame = ui("KB1ABC", b"data");
        frame.pid = Some(0xCC); // IP
        assert_eq!(Packet::from_frame(frame).kind(), PacketKind::Other);
    }

    #[test]
    fn test_file_transfer_frame_rebuild() {
        let original = ui("KB1ABC", b"#FILE:a.bin:16:32:\x00\x01\x02");
        let packet = Packet::from_frame(original.clone());
        assert_eq!(packet.to_frame(), original);
        assert_eq!(packet.to_frame().control, CONTROL_UI);
    }

    #[test]
    fn test_display_is_tnc2() {
        let packet = Packet::from_frame(ui("APRS", b">status"));
        assert_eq!(packet.to_string(), "N0CALL-1>APRS:>status");
    }
}
