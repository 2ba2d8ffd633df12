//! AX.25 station addresses
//!
//! An address is a callsign of up to six characters plus a 4-bit SSID.
//! On the wire each character is shifted left by one bit and the seventh
//! byte carries the SSID, the reserved bits and the extension bit.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Encoded length of one address field
pub const ADDRESS_LEN: usize = 7;

/// Maximum callsign length
pub const MAX_CALLSIGN_LEN: usize = 6;

/// AX.25 station address (callsign + SSID)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    /// Callsign, uppercase, without padding
    pub callsign: String,
    /// Secondary station identifier (0-15)
    pub ssid: u8,
    /// Has-been-repeated bit (digipeater path entries only)
    pub repeated: bool,
}

impl Address {
    /// Create an address after validating the callsign and SSID
    pub fn new(callsign: &str, ssid: u8) -> Result<Self, ParseError> {
        let callsign = callsign.trim().to_ascii_uppercase();
        if callsign.is_empty()
            || callsign.len() > MAX_CALLSIGN_LEN
            || !callsign.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(ParseError::InvalidCallsign(callsign));
        }
        if ssid > 15 {
            return Err(ParseError::InvalidSsid(ssid.to_string()));
        }
        Ok(Self {
            callsign,
            ssid,
            repeated: false,
        })
    }

    /// Decode an address from its 7-byte wire form
    ///
    /// Returns the address and whether the extension bit marks it as the
    /// last address of the header.
    pub fn decode(bytes: &[u8]) -> Result<(Self, bool), ParseError> {
        if bytes.len() < ADDRESS_LEN {
            return Err(ParseError::InvalidAddress(format!(
                "need {} bytes, got {}",
                ADDRESS_LEN,
                bytes.len()
            )));
        }

        // Only the extension bit of the final byte may be set in callsign bytes
        if bytes[..MAX_CALLSIGN_LEN].iter().any(|b| b & 0x01 != 0) {
            return Err(ParseError::InvalidAddress(
                "extension bit set inside callsign".into(),
            ));
        }

        let callsign: String = bytes[..MAX_CALLSIGN_LEN]
            .iter()
            .map(|&b| (b >> 1) as char)
            .collect::<String>()
            .trim_end()
            .to_string();

        if callsign.is_empty() || !callsign.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ParseError::InvalidAddress(format!("{:?}", callsign)));
        }

        let ssid_byte = bytes[MAX_CALLSIGN_LEN];
        let address = Self {
            callsign,
            ssid: (ssid_byte >> 1) & 0x0F,
            repeated: ssid_byte & 0x80 != 0,
        };

        Ok((address, ssid_byte & 0x01 != 0))
    }

    /// Encode this address into its 7-byte wire form
    ///
    /// `high_bit` is the command/response bit for destination and source,
    /// and the has-been-repeated bit for digipeaters.
    pub fn encode(&self, high_bit: bool, last: bool) -> [u8; ADDRESS_LEN] {
        let mut out = [b' ' << 1; ADDRESS_LEN];
        for (slot, b) in out.iter_mut().zip(self.callsign.bytes().take(MAX_CALLSIGN_LEN)) {
            *slot = b.to_ascii_uppercase() << 1;
        }

        let mut ssid_byte = 0x60 | ((self.ssid & 0x0F) << 1);
        if high_bit {
            ssid_byte |= 0x80;
        }
        if last {
            ssid_byte |= 0x01;
        }
        out[MAX_CALLSIGN_LEN] = ssid_byte;
        out
    }

    /// Check whether this is a generic broadcast destination such as `CQ`
    pub fn is_broadcast(&self) -> bool {
        matches!(
            self.callsign.as_str(),
            "CQ" | "QST" | "ALL" | "BEACON" | "ID" | "MAIL"
        )
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid > 0 {
            write!(f, "{}-{}", self.callsign, self.ssid)
        } else {
            write!(f, "{}", self.callsign)
        }
    }
}

impl FromStr for Address {
    type Err = ParseError;

    /// Parse `CALL`, `CALL-SSID` or a path entry such as `WIDE1-1*`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (s, repeated) = match s.strip_suffix('*') {
            Some(rest) => (rest, true),
            None => (s, false),
        };

        let mut address = match s.split_once('-') {
            Some((call, ssid)) => {
                let ssid = ssid
                    .parse::<u8>()
                    .map_err(|_| ParseError::InvalidSsid(ssid.to_string()))?;
                Address::new(call, ssid)?
            }
            None => Address::new(s, 0)?,
        };
        address.repeated = repeated;
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_ssid() {
        let addr: Address = "n0call-7".parse().unwrap();
        assert_eq!(addr.callsign, "N0CALL");
        assert_eq!(addr.ssid, 7);
        assert!(!addr.repeated);
        assert_eq!(addr.to_string(), "N0CALL-7");
    }

    #[test]
    fn test_parse_repeated_path_entry() {
        let addr: Address = "WIDE1-1*".parse().unwrap();
        assert_eq!(addr.callsign, "WIDE1");
        assert!(addr.repeated);
    }

    #[test]
    fn test_reject_invalid() {
        assert!("TOOLONGCALL".parse::<Address>().is_err());
        assert!("N0CALL-16".parse::<Address>().is_err());
        assert!("alice_".parse::<Address>().is_err());
        assert!("".parse::<Address>().is_err());
    }

    #[test]
    fn test_wire_format() {
        let addr: Address = "N0CALL".parse().unwrap();
        let bytes = addr.encode(false, true);
        assert_eq!(bytes, [0x9C, 0x60, 0x86, 0x82, 0x98, 0x98, 0x61]);

        let (decoded, last) = Address::decode(&bytes).unwrap();
        assert_eq!(decoded, addr);
        assert!(last);
    }

    #[test]
    fn test_short_callsign_is_space_padded() {
        let addr: Address = "CQ".parse().unwrap();
        let bytes = addr.encode(true, false);
        assert_eq!(&bytes[2..6], &[0x40, 0x40, 0x40, 0x40]);
        assert_eq!(bytes[6] & 0x80, 0x80);
        assert!(addr.is_broadcast());
    }
}
