//! The CPDLC message: packet header plus up to five typed segments.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arg::Arg;
use crate::catalog::{find_entry, CatalogEntry, MessageDirection, ResponseClass};
use crate::error::ModelError;
use crate::types::{Callsign, PacketType, Timestamp};

/// Maximum number of segments in one message.
pub const MAX_SEGMENTS: usize = 5;

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// One message element: a catalog entry plus its concrete arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// The static catalog row describing this element.
    pub entry: &'static CatalogEntry,
    /// Argument values matching `entry.args`, in order.
    pub args: Vec<Arg>,
}

impl Segment {
    /// Build a segment, validating argument count and kinds against the
    /// catalog entry.
    pub fn new(entry: &'static CatalogEntry, args: Vec<Arg>) -> Result<Self, ModelError> {
        if args.len() != entry.args.len() {
            return Err(ModelError::BadSegmentArgs {
                id: entry.id(),
                reason: format!("expected {} arguments, got {}", entry.args.len(), args.len()),
            });
        }
        for (idx, (arg, want)) in args.iter().zip(entry.args).enumerate() {
            if arg.kind() != *want {
                return Err(ModelError::BadSegmentArgs {
                    id: entry.id(),
                    reason: format!("argument {idx} must be {want:?}, got {:?}", arg.kind()),
                });
            }
        }
        Ok(Self { entry, args })
    }

    /// Build a segment by `(direction, type_num, subtype)` lookup.
    pub fn by_type(
        direction: MessageDirection,
        type_num: u16,
        subtype: u8,
        args: Vec<Arg>,
    ) -> Result<Self, ModelError> {
        let entry = find_entry(direction, type_num, subtype).ok_or_else(|| {
            ModelError::UnknownMessageType {
                id: format!("{direction}{type_num}"),
            }
        })?;
        Self::new(entry, args)
    }

    /// Render this segment to human-readable text.
    pub fn render(&self) -> String {
        self.entry.render(&self.args)
    }
}

// Serde support goes through the conventional id so the static catalog
// reference never hits the wire.
impl Serialize for Segment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Segment", 2)?;
        s.serialize_field("id", &self.entry.id())?;
        s.serialize_field("args", &self.args)?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            id: String,
            args: Vec<Arg>,
        }
        let raw = Raw::deserialize(deserializer)?;
        let entry = crate::catalog::find_entry_by_id(&raw.id)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown message type {}", raw.id)))?;
        Segment::new(entry, raw.args).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A complete wire message.
///
/// # Examples
///
/// ```
/// use fanslink_models::{Altitude, Arg, Message, MessageDirection, Segment};
///
/// let mut msg = Message::cpdlc();
/// msg.min = Some(5);
/// msg.add_segment(
///     Segment::by_type(
///         MessageDirection::Uplink,
///         20,
///         0,
///         vec![Arg::Altitude(Altitude::flight_level(350).unwrap())],
///     )
///     .unwrap(),
/// )
/// .unwrap();
/// assert_eq!(msg.render(), "CLIMB TO AND MAINTAIN FL350");
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub packet_type: PacketType,
    /// Creation time, stamped by the sender.
    pub timestamp: Timestamp,
    /// Message identification number; required on all non-PING/PONG
    /// messages.
    pub min: Option<u32>,
    /// Message reference number: the MIN of the message being answered.
    pub mrn: Option<u32>,
    pub from: Option<Callsign>,
    pub to: Option<Callsign>,
    /// Logon request data, opaque to the broker. Mutually exclusive
    /// with segments and with `logoff`.
    pub logon: Option<String>,
    pub logoff: bool,
    pub segments: Vec<Segment>,
}

impl Message {
    /// A new message of the given packet type, stamped with the current
    /// time.
    pub fn new(packet_type: PacketType) -> Self {
        Self {
            packet_type,
            timestamp: Timestamp::now(),
            min: None,
            mrn: None,
            from: None,
            to: None,
            logon: None,
            logoff: false,
            segments: Vec::new(),
        }
    }

    /// A new CPDLC message.
    pub fn cpdlc() -> Self {
        Self::new(PacketType::Cpdlc)
    }

    /// A new PING probe with the given MIN.
    pub fn ping(min: u32) -> Self {
        let mut msg = Self::new(PacketType::Ping);
        msg.min = Some(min);
        msg
    }

    /// The PONG answer to a PING, echoing its MIN as MRN.
    pub fn pong(ping: &Message) -> Self {
        let mut msg = Self::new(PacketType::Pong);
        msg.mrn = ping.min;
        msg
    }

    /// A LOGON request.
    pub fn logon(data: &str, min: u32) -> Self {
        let mut msg = Self::cpdlc();
        msg.logon = Some(data.to_string());
        msg.min = Some(min);
        msg
    }

    /// A LOGOFF notification.
    pub fn logoff(min: u32) -> Self {
        let mut msg = Self::cpdlc();
        msg.logoff = true;
        msg.min = Some(min);
        msg
    }

    /// Append a segment, enforcing the segment-count limit, direction
    /// homogeneity, and logon/logoff exclusivity.
    pub fn add_segment(&mut self, seg: Segment) -> Result<(), ModelError> {
        if self.logon.is_some() || self.logoff {
            return Err(ModelError::LogonExclusivity);
        }
        if self.segments.len() >= MAX_SEGMENTS {
            return Err(ModelError::TooManySegments {
                count: self.segments.len() + 1,
            });
        }
        if let Some(dir) = self.direction() {
            if dir != seg.entry.direction {
                return Err(ModelError::MixedDirections);
            }
        }
        self.segments.push(seg);
        Ok(())
    }

    /// The direction of this message's segments, or `None` when it has
    /// no segments.
    pub fn direction(&self) -> Option<MessageDirection> {
        self.segments.first().map(|s| s.entry.direction)
    }

    /// Whether this is a logon or logoff handshake message.
    pub fn is_session_mgmt(&self) -> bool {
        self.logon.is_some() || self.logoff
    }

    /// The strongest response class across all segments
    /// (`WU > AN > R > NE > Y > N`).
    pub fn response_class(&self) -> ResponseClass {
        fn rank(r: ResponseClass) -> u8 {
            match r {
                ResponseClass::Wu => 5,
                ResponseClass::An => 4,
                ResponseClass::R => 3,
                ResponseClass::Ne => 2,
                ResponseClass::Y => 1,
                ResponseClass::N => 0,
            }
        }
        self.segments
            .iter()
            .map(|s| s.entry.response)
            .max_by_key(|r| rank(*r))
            .unwrap_or(ResponseClass::N)
    }

    /// The longest answer timeout across all segments.
    pub fn timeout_secs(&self) -> Option<u16> {
        self.segments
            .iter()
            .filter_map(|s| s.entry.timeout_secs)
            .max()
    }

    /// Render all segments to one human-readable line, joined with
    /// `" / "`.
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(Segment::render)
            .collect::<Vec<_>>()
            .join(" / ")
    }

    /// Validate the cross-field invariants the codecs rely on. Called
    /// by both encoders before emitting anything.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.logon.is_some() && self.logoff {
            return Err(ModelError::LogonExclusivity);
        }
        if self.is_session_mgmt() && !self.segments.is_empty() {
            return Err(ModelError::LogonExclusivity);
        }
        if self.segments.len() > MAX_SEGMENTS {
            return Err(ModelError::TooManySegments {
                count: self.segments.len(),
            });
        }
        if self
            .segments
            .windows(2)
            .any(|w| w[0].entry.direction != w[1].entry.direction)
        {
            return Err(ModelError::MixedDirections);
        }
        Ok(())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(data) = &self.logon {
            write!(f, "LOGON {data}")
        } else if self.logoff {
            write!(f, "LOGOFF")
        } else if self.segments.is_empty() {
            write!(f, "{}", self.packet_type.as_str())
        } else {
            write!(f, "{}", self.render())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Altitude;

    fn climb(level: u32) -> Segment {
        Segment::by_type(
            MessageDirection::Uplink,
            20,
            0,
            vec![Arg::Altitude(Altitude::flight_level(level).unwrap())],
        )
        .unwrap()
    }

    fn wilco() -> Segment {
        Segment::by_type(MessageDirection::Downlink, 0, 0, vec![]).unwrap()
    }

    #[test]
    fn segment_arity_checked() {
        let err = Segment::by_type(MessageDirection::Uplink, 20, 0, vec![]).unwrap_err();
        assert!(matches!(err, ModelError::BadSegmentArgs { .. }));

        let err = Segment::by_type(
            MessageDirection::Uplink,
            20,
            0,
            vec![Arg::Freetext("X".into())],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::BadSegmentArgs { .. }));
    }

    #[test]
    fn direction_homogeneity_enforced() {
        let mut msg = Message::cpdlc();
        msg.add_segment(climb(350)).unwrap();
        let err = msg.add_segment(wilco()).unwrap_err();
        assert!(matches!(err, ModelError::MixedDirections));
    }

    #[test]
    fn logon_excludes_segments() {
        let mut msg = Message::logon("SECRET", 1);
        let err = msg.add_segment(wilco()).unwrap_err();
        assert!(matches!(err, ModelError::LogonExclusivity));
    }

    #[test]
    fn segment_limit() {
        let mut msg = Message::cpdlc();
        for _ in 0..MAX_SEGMENTS {
            msg.add_segment(climb(350)).unwrap();
        }
        assert!(matches!(
            msg.add_segment(climb(360)),
            Err(ModelError::TooManySegments { .. })
        ));
    }

    #[test]
    fn response_class_precedence() {
        let mut msg = Message::cpdlc();
        // UM169 free text is R; UM20 is WU; WU wins.
        msg.add_segment(
            Segment::by_type(
                MessageDirection::Uplink,
                169,
                0,
                vec![Arg::Freetext("CHECK".into())],
            )
            .unwrap(),
        )
        .unwrap();
        assert_eq!(msg.response_class(), ResponseClass::R);
        msg.add_segment(climb(350)).unwrap();
        assert_eq!(msg.response_class(), ResponseClass::Wu);
    }

    #[test]
    fn pong_echoes_min() {
        let ping = Message::ping(17);
        let pong = Message::pong(&ping);
        assert_eq!(pong.mrn, Some(17));
        assert_eq!(pong.packet_type, PacketType::Pong);
    }

    #[test]
    fn serde_round_trip() {
        let mut msg = Message::cpdlc();
        msg.min = Some(3);
        msg.add_segment(climb(310)).unwrap();
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
