//! Value types with a dedicated wire form.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::text::string::hex_value;

/// Arbitrary binary content, written as a base64 string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob(pub Vec<u8>);

/// Seconds since the Unix epoch, written as a plain integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixTime(pub i64);

/// 128-bit identifier written as `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Guid(pub [u8; 16]);

/// 128-bit digest written as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Hash128(pub [u8; 16]);

/// 256-bit digest written as 64 lowercase hex digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Hash256(pub [u8; 32]);

const GUID_GROUPS: [usize; 5] = [4, 2, 2, 2, 6];

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut offset = 0;
        for (group, len) in GUID_GROUPS.iter().enumerate() {
            if group > 0 {
                f.write_str("-")?;
            }
            for byte in &self.0[offset..offset + len] {
                write!(f, "{byte:02X}")?;
            }
            offset += len;
        }
        Ok(())
    }
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s
            .strip_prefix('{')
            .and_then(|inner| inner.strip_suffix('}'))
            .unwrap_or(s);
        let mut bytes = [0u8; 16];
        let mut offset = 0;
        let mut groups = text.split('-');
        for len in GUID_GROUPS {
            let group = groups
                .next()
                .ok_or_else(|| Error::domain(format!("invalid GUID: {s}")))?;
            if group.len() != len * 2 {
                return Err(Error::domain(format!("invalid GUID: {s}")));
            }
            decode_hex_into(group.as_bytes(), &mut bytes[offset..offset + len])
                .ok_or_else(|| Error::domain(format!("invalid GUID: {s}")))?;
            offset += len;
        }
        if groups.next().is_some() {
            return Err(Error::domain(format!("invalid GUID: {s}")));
        }
        Ok(Guid(bytes))
    }
}

pub(crate) fn decode_hex_into(text: &[u8], out: &mut [u8]) -> Option<()> {
    if text.len() != out.len() * 2 {
        return None;
    }
    for (slot, pair) in out.iter_mut().zip(text.chunks_exact(2)) {
        *slot = hex_value(pair[0])? << 4 | hex_value(pair[1])?;
    }
    Some(())
}

pub(crate) fn write_hex(out: &mut Vec<u8>, bytes: &[u8]) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize]);
        out.push(HEX[(byte & 0x0F) as usize]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    fn test_guid_text_roundtrip() {
        let guid = Guid([
            0x3F, 0x25, 0x04, 0xE0, 0x4F, 0x89, 0x11, 0xD3, 0x9A, 0x0C, 0x03, 0x05, 0xE8, 0x2C,
            0x33, 0x01,
        ]);
        let text = guid.to_string();
        assert_eq!(text, "3F2504E0-4F89-11D3-9A0C-0305E82C3301");
        assert_eq!(text.parse::<Guid>().unwrap(), guid);
        assert_eq!(format!("{{{text}}}").parse::<Guid>().unwrap(), guid);
        assert_eq!(text.to_lowercase().parse::<Guid>().unwrap(), guid);
    }

    #[rstest::rstest]
    #[case("3F2504E0-4F89-11D3-9A0C")]
    #[case("3F2504E04F8911D39A0C0305E82C3301")]
    #[case("3F2504E0-4F89-11D3-9A0C-0305E82C3301-00")]
    #[case("ZF2504E0-4F89-11D3-9A0C-0305E82C3301")]
    fn test_guid_rejects(#[case] text: &str) {
        assert!(text.parse::<Guid>().is_err());
    }

    #[rstest::rstest]
    fn test_hex_helpers() {
        let mut out = Vec::new();
        write_hex(&mut out, &[0x00, 0xAB, 0x7F]);
        assert_eq!(out, b"00ab7f");
        let mut bytes = [0u8; 3];
        assert!(decode_hex_into(b"00AB7f", &mut bytes).is_some());
        assert_eq!(bytes, [0x00, 0xAB, 0x7F]);
        assert!(decode_hex_into(b"00AB7", &mut bytes).is_none());
    }
}
