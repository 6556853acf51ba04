//! Transfer mode strings from RFC 1350.

use std::fmt;
use std::str::FromStr;

use crate::core::DecodeError;

/// The three transfer modes defined by RFC 1350.
///
/// Mode strings are case-insensitive on the wire; encoding always emits
/// the lowercase form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    /// 8-bit raw bytes. The only mode modern implementations use.
    #[default]
    Octet,
    /// 7-bit ASCII with CR/LF line-ending translation.
    Netascii,
    /// Obsolete mail delivery mode, kept for wire compatibility.
    Mail,
}

impl TransferMode {
    /// Wire representation of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Octet => "octet",
            TransferMode::Netascii => "netascii",
            TransferMode::Mail => "mail",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferMode {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("octet") {
            Ok(TransferMode::Octet)
        } else if s.eq_ignore_ascii_case("netascii") {
            Ok(TransferMode::Netascii)
        } else if s.eq_ignore_ascii_case("mail") {
            Ok(TransferMode::Mail)
        } else {
            Err(DecodeError::UnknownMode(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_case_insensitive() {
        assert_eq!("OCTET".parse::<TransferMode>().unwrap(), TransferMode::Octet);
        assert_eq!("NetAscii".parse::<TransferMode>().unwrap(), TransferMode::Netascii);
        assert_eq!("mail".parse::<TransferMode>().unwrap(), TransferMode::Mail);
    }

    #[test]
    fn test_mode_unknown() {
        let err = "binary".parse::<TransferMode>().unwrap_err();
        assert!(matches!(err, DecodeError::UnknownMode(m) if m == "binary"));
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(TransferMode::Octet.to_string(), "octet");
        assert_eq!(TransferMode::Netascii.to_string(), "netascii");
    }
}
