//! Error types for the `fanslink-models` crate.
//!
//! Fallible constructors and `TryFrom` implementations return
//! [`ModelError`]; the wire codecs return [`DecodeError`].

/// Errors produced when constructing or validating model types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// A callsign was empty, too long, or contained invalid characters.
    #[error("invalid callsign \"{value}\": {reason}")]
    InvalidCallsign {
        /// The value that failed validation.
        value: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// An altitude was outside the representable range.
    #[error("invalid altitude {value}: {reason}")]
    InvalidAltitude {
        /// The value that failed validation, in feet (or metres if metric).
        value: i32,
        /// Human-readable explanation.
        reason: String,
    },

    /// A numeric argument was outside its permitted range.
    #[error("{what} out of range: {value}")]
    OutOfRange {
        /// What kind of value was being validated.
        what: &'static str,
        /// The offending value, rendered.
        value: String,
    },

    /// A segment was built with the wrong argument count or kinds.
    #[error("segment {id}: {reason}")]
    BadSegmentArgs {
        /// Catalog id, e.g. `"UM20"`.
        id: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// Segments of both directions were mixed in one message.
    #[error("message mixes uplink and downlink segments")]
    MixedDirections,

    /// A logon/logoff message carried segments, or both flags at once.
    #[error("logon/logoff is mutually exclusive with message segments")]
    LogonExclusivity,

    /// More than five segments in one message.
    #[error("too many segments ({count}, max 5)")]
    TooManySegments {
        /// The attempted segment count.
        count: usize,
    },

    /// No catalog entry for the given message type.
    #[error("unknown message type {id}")]
    UnknownMessageType {
        /// The identifier that failed lookup, e.g. `"UM999"`.
        id: String,
    },
}

/// Errors produced when decoding wire data (text or ARINC 622 form).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// The input line was structurally malformed.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A required header was missing.
    #[error("missing required header {0}")]
    MissingHeader(&'static str),

    /// A header value failed to parse.
    #[error("bad {header} value \"{value}\"")]
    BadHeader {
        /// The header key.
        header: &'static str,
        /// The offending value.
        value: String,
    },

    /// An escape sequence was invalid (`%` not followed by two hex
    /// digits, or `%00`).
    #[error("invalid percent escape in \"{0}\"")]
    BadEscape(String),

    /// An argument failed to parse or was out of range.
    #[error("bad {kind} argument \"{value}\"")]
    BadArgument {
        /// Argument kind name.
        kind: &'static str,
        /// The offending token.
        value: String,
    },

    /// The ARINC 622 frame failed CRC verification.
    #[error("CRC mismatch: computed {computed:04x}, frame carries {carried:04x}")]
    CrcMismatch {
        /// CRC computed over the frame contents.
        computed: u16,
        /// CRC carried in the frame trailer.
        carried: u16,
    },

    /// The ARINC 622 hex payload had odd length or non-hex characters.
    #[error("invalid hex payload: {0}")]
    BadHex(String),

    /// The ARINC 622 frame was too short or carried an unknown IMI.
    #[error("invalid ARINC 622 frame: {0}")]
    BadFrame(String),

    /// The PER payload ran out of bits or carried an invalid value.
    #[error("invalid PER payload: {0}")]
    BadPer(String),

    /// A model-level invariant was violated by decoded content.
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_callsign() {
        let err = ModelError::InvalidCallsign {
            value: "".into(),
            reason: "must not be empty".into(),
        };
        assert_eq!(err.to_string(), "invalid callsign \"\": must not be empty");
    }

    #[test]
    fn error_display_crc() {
        let err = DecodeError::CrcMismatch {
            computed: 0xbeef,
            carried: 0xdead,
        };
        assert_eq!(
            err.to_string(),
            "CRC mismatch: computed beef, frame carries dead"
        );
    }
}
