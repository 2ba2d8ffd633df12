//! AX.25 Protocol Library
//!
//! This crate provides parsing and encoding for the packet-radio formats a
//! gateway sees on the air:
//!
//! - **AX.25**: address fields and UI frames (no flags or FCS, as delivered by KISS)
//! - **KISS**: FEND/FESC framing between a host and a TNC
//! - **TNC2**: the `SRC>DEST,PATH:info` monitor text format
//! - **APRS**: summary-level decoding of positions, messages, status reports,
//!   objects and telemetry
//!
//! # Architecture
//!
//! Raw bytes flow through a [`KissCodec`], are decoded into a [`Frame`] and
//! then classified into exactly one [`Packet`] variant. Outgoing packets go
//! the other way with [`Packet::encode`] and [`kiss::encode_data_frame`].
//!
//! # Example
//!
//! ```rust
//! use ax25_protocol::{Frame, KissCodec, Packet, PacketKind};
//! use ax25_protocol::kiss::encode_data_frame;
//!
//! let frame = Frame::from_tnc2("N0CALL>APRS:>On the air").unwrap();
//! let wire = encode_data_frame(0, &frame.encode().unwrap());
//!
//! let mut codec = KissCodec::new();
//! codec.push_bytes(&wire);
//!
//! if let Some(kiss) = codec.next_frame() {
//!     let packet = Packet::decode(&kiss.data).unwrap();
//!     assert_eq!(packet.kind(), PacketKind::Aprs);
//! }
//! ```

pub mod address;
pub mod aprs;
pub mod error;
pub mod frame;
pub mod kiss;
pub mod packet;

pub use address::Address;
pub use aprs::AprsData;
pub use error::ParseError;
pub use frame::Frame;
pub use kiss::{KissCodec, KissCommand, KissFrame};
pub use packet::{
    AprsPacket, ChatPacket, FileHeader, FileTransferPacket, Packet, PacketKind,
};

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_address() -> impl Strategy<Value = Address> {
        ("[A-Z0-9]{1,6}", 0u8..16).prop_map(|(call, ssid)| Address::new(&call, ssid).unwrap())
    }

    proptest! {
        #[test]
        fn kiss_stream_survives_arbitrary_payloads(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..300), 1..5)
        ) {
            let mut codec = KissCodec::new();
            for payload in &payloads {
                codec.push_bytes(&kiss::encode_data_frame(0, payload));
            }
            for payload in &payloads {
                let frame = codec.next_frame().unwrap();
                prop_assert_eq!(&frame.data, payload);
            }
            prop_assert!(codec.next_frame().is_none());
        }

        #[test]
        fn frame_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..200)) {
            let _ = Packet::decode(&data);
        }

        #[test]
        fn aprs_parse_never_panics(info in "\\PC{0,80}") {
            let _ = AprsData::parse(&info).summary();
        }

        #[test]
        fn ui_frame_wire_format_is_stable(
            source in arb_address(),
            dest in arb_address(),
            path in prop::collection::vec(arb_address(), 0..4),
            text in "[ -~]{0,100}",
        ) {
            let frame = Frame::ui(source, dest, path, text.into_bytes());
            let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
            prop_assert_eq!(decoded, frame);
        }
    }
}
