//! The keyed-field text wire form.
//!
//! A message is one LF-terminated line of `/`-separated `KEY=VALUE`
//! fields. Values that can carry reserved characters are
//! percent-escaped (see [`crate::wire`]). Header order is free except
//! that `PKT=` must precede any `MSG=`/`ASN1=` field.

use crate::arg::Arg;
use crate::catalog::{find_entry, MessageDirection};
use crate::error::{DecodeError, ModelError};
use crate::message::{Message, Segment};
use crate::types::{Callsign, PacketType, Timestamp};
use crate::wire;

/// Encode a message to its LF-terminated text wire line.
///
/// # Examples
///
/// ```
/// use fanslink_models::{text, Altitude, Arg, Message, MessageDirection, Segment};
///
/// let mut msg = Message::cpdlc();
/// msg.min = Some(5);
/// msg.to = Some("ACA123".parse().unwrap());
/// msg.add_segment(Segment::by_type(
///     MessageDirection::Uplink, 20, 0,
///     vec![Arg::Altitude(Altitude::flight_level(350).unwrap())],
/// ).unwrap()).unwrap();
///
/// let line = text::encode(&msg).unwrap();
/// assert!(line.starts_with("PKT=CPDLC/TS="));
/// assert!(line.ends_with("/TO=ACA123/MIN=5/MSG=UM20 FL350\n"));
/// ```
pub fn encode(msg: &Message) -> Result<String, ModelError> {
    msg.validate()?;
    let mut out = String::with_capacity(64);
    out.push_str("PKT=");
    out.push_str(msg.packet_type.as_str());
    out.push_str(&format!("/TS={}", msg.timestamp));
    if let Some(to) = &msg.to {
        out.push_str(&format!("/TO={}", wire::escape_percent(to.as_str())));
    }
    if let Some(min) = msg.min {
        out.push_str(&format!("/MIN={min}"));
    }
    if let Some(mrn) = msg.mrn {
        out.push_str(&format!("/MRN={mrn}"));
    }
    if let Some(logon) = &msg.logon {
        out.push_str(&format!("/LOGON={}", wire::escape_percent(logon)));
    } else if msg.logoff {
        out.push_str("/LOGOFF");
    }
    if let Some(from) = &msg.from {
        out.push_str(&format!("/FROM={}", wire::escape_percent(from.as_str())));
    }
    for seg in &msg.segments {
        out.push_str("/MSG=");
        out.push_str(&encode_segment(seg));
    }
    out.push('\n');
    Ok(out)
}

/// Encode a message with its payload in the ARINC 622 binary form: the
/// segments travel inside one `ASN1=` field instead of `MSG=` fields.
/// Headers stay textual so the broker can route without touching the
/// binary payload.
pub fn encode_asn1(msg: &Message, callsign: &str) -> Result<String, ModelError> {
    msg.validate()?;
    let frame = crate::arinc622::encode_frame(msg, callsign)?;
    let mut out = String::with_capacity(64 + frame.len());
    out.push_str("PKT=");
    out.push_str(msg.packet_type.as_str());
    out.push_str(&format!("/TS={}", msg.timestamp));
    if let Some(to) = &msg.to {
        out.push_str(&format!("/TO={}", wire::escape_percent(to.as_str())));
    }
    if let Some(min) = msg.min {
        out.push_str(&format!("/MIN={min}"));
    }
    if let Some(mrn) = msg.mrn {
        out.push_str(&format!("/MRN={mrn}"));
    }
    if let Some(from) = &msg.from {
        out.push_str(&format!("/FROM={}", wire::escape_percent(from.as_str())));
    }
    out.push_str("/ASN1=");
    out.push_str(&frame);
    out.push('\n');
    Ok(out)
}

/// Encode one segment to its `MSG=` value form.
pub fn encode_segment(seg: &Segment) -> String {
    let mut out = seg.entry.id();
    for arg in &seg.args {
        out.push(' ');
        out.push_str(&wire::arg_token(arg));
    }
    out
}

/// Parse the value of one `MSG=` field into a segment.
pub fn parse_segment(value: &str) -> Result<Segment, DecodeError> {
    let mut tokens = value.split(' ');
    let head = tokens
        .next()
        .ok_or_else(|| DecodeError::Malformed("empty MSG value".to_string()))?;
    let (direction, rest) = if let Some(rest) = head.strip_prefix("UM") {
        (MessageDirection::Uplink, rest)
    } else if let Some(rest) = head.strip_prefix("DM") {
        (MessageDirection::Downlink, rest)
    } else {
        return Err(DecodeError::Malformed(format!(
            "MSG value must start with UM or DM, got \"{head}\""
        )));
    };
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return Err(DecodeError::Malformed(format!("bad message id \"{head}\"")));
    }
    let type_num: u16 = rest[..digits_end]
        .parse()
        .map_err(|_| DecodeError::Malformed(format!("bad message id \"{head}\"")))?;
    let subtype = match &rest[digits_end..] {
        "" => 0,
        s if s.len() == 1 => s.as_bytes()[0],
        _ => {
            return Err(DecodeError::Malformed(format!("bad message id \"{head}\"")));
        }
    };
    let entry = find_entry(direction, type_num, subtype).ok_or_else(|| {
        DecodeError::Model(ModelError::UnknownMessageType {
            id: head.to_string(),
        })
    })?;
    let mut args: Vec<Arg> = Vec::with_capacity(entry.args.len());
    for kind in entry.args {
        let token = tokens.next().ok_or_else(|| {
            DecodeError::Malformed(format!("{}: missing argument", entry.id()))
        })?;
        args.push(wire::parse_arg(*kind, token)?);
    }
    if tokens.next().is_some() {
        return Err(DecodeError::Malformed(format!(
            "{}: surplus arguments",
            entry.id()
        )));
    }
    Segment::new(entry, args).map_err(DecodeError::Model)
}

/// Parse one complete line (without the trailing LF).
pub fn decode_line(line: &str) -> Result<Message, DecodeError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut packet_type: Option<PacketType> = None;
    let mut timestamp: Option<Timestamp> = None;
    let mut min: Option<u32> = None;
    let mut mrn: Option<u32> = None;
    let mut to: Option<Callsign> = None;
    let mut from: Option<Callsign> = None;
    let mut logon: Option<String> = None;
    let mut logoff = false;
    let mut segments: Vec<Segment> = Vec::new();
    let mut asn1_segments: Option<Message> = None;

    for field in line.split('/') {
        if let Some(value) = field.strip_prefix("PKT=") {
            packet_type = Some(
                value
                    .parse()
                    .map_err(|_| DecodeError::BadHeader {
                        header: "PKT",
                        value: value.to_string(),
                    })?,
            );
        } else if let Some(value) = field.strip_prefix("TS=") {
            if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(DecodeError::BadHeader {
                    header: "TS",
                    value: value.to_string(),
                });
            }
            let h: u8 = value[..2].parse().unwrap_or(255);
            let m: u8 = value[2..4].parse().unwrap_or(255);
            let s: u8 = value[4..].parse().unwrap_or(255);
            timestamp = Some(Timestamp::new(h, m, s).map_err(|_| DecodeError::BadHeader {
                header: "TS",
                value: value.to_string(),
            })?);
        } else if let Some(value) = field.strip_prefix("MIN=") {
            min = Some(value.parse().map_err(|_| DecodeError::BadHeader {
                header: "MIN",
                value: value.to_string(),
            })?);
        } else if let Some(value) = field.strip_prefix("MRN=") {
            mrn = Some(value.parse().map_err(|_| DecodeError::BadHeader {
                header: "MRN",
                value: value.to_string(),
            })?);
        } else if let Some(value) = field.strip_prefix("TO=") {
            let raw = wire::unescape_percent(value)?;
            to = Some(raw.parse().map_err(|_| DecodeError::BadHeader {
                header: "TO",
                value: raw.clone(),
            })?);
        } else if let Some(value) = field.strip_prefix("FROM=") {
            let raw = wire::unescape_percent(value)?;
            from = Some(raw.parse().map_err(|_| DecodeError::BadHeader {
                header: "FROM",
                value: raw.clone(),
            })?);
        } else if let Some(value) = field.strip_prefix("LOGON=") {
            logon = Some(wire::unescape_percent(value)?);
        } else if field == "LOGOFF" {
            logoff = true;
        } else if let Some(value) = field.strip_prefix("MSG=") {
            if packet_type.is_none() {
                return Err(DecodeError::Malformed(
                    "MSG= before PKT=".to_string(),
                ));
            }
            segments.push(parse_segment(value)?);
        } else if let Some(value) = field.strip_prefix("ASN1=") {
            if packet_type.is_none() {
                return Err(DecodeError::Malformed(
                    "ASN1= before PKT=".to_string(),
                ));
            }
            asn1_segments = Some(crate::arinc622::decode_frame(value)?);
        } else {
            return Err(DecodeError::Malformed(format!(
                "unrecognized field \"{field}\""
            )));
        }
    }

    let packet_type = packet_type.ok_or(DecodeError::MissingHeader("PKT"))?;
    let timestamp = timestamp.ok_or(DecodeError::MissingHeader("TS"))?;

    // Fold an ASN1= payload into the message: segments come from the
    // frame, and its header fills anything the text headers left unset.
    if let Some(frame) = asn1_segments {
        if !segments.is_empty() {
            return Err(DecodeError::Malformed(
                "both MSG= and ASN1= present".to_string(),
            ));
        }
        segments = frame.segments;
        if min.is_none() {
            min = frame.min;
        }
        if mrn.is_none() {
            mrn = frame.mrn;
        }
        if frame.logon.is_some() && logon.is_none() {
            logon = frame.logon;
        }
        if from.is_none() {
            from = frame.from;
        }
        logoff = logoff || frame.logoff;
    }

    match packet_type {
        PacketType::Ping => {
            if mrn.is_some() {
                return Err(DecodeError::Malformed("PING with MRN".to_string()));
            }
        }
        PacketType::Pong => {}
        PacketType::Cpdlc => {
            if min.is_none() {
                return Err(DecodeError::MissingHeader("MIN"));
            }
            if (logon.is_some() || logoff) && !segments.is_empty() {
                return Err(DecodeError::Model(ModelError::LogonExclusivity));
            }
            if logon.is_none() && !logoff && segments.is_empty() {
                return Err(DecodeError::Malformed(
                    "CPDLC message without segments".to_string(),
                ));
            }
        }
    }

    let msg = Message {
        packet_type,
        timestamp,
        min,
        mrn,
        from,
        to,
        logon,
        logoff,
        segments,
    };
    msg.validate().map_err(DecodeError::Model)?;
    Ok(msg)
}

/// Try to decode one message from the front of an append-only buffer.
///
/// Returns `Ok(Some((msg, consumed)))` when a complete LF-terminated
/// line was parsed, `Ok(None)` when more bytes are needed, and
/// `Err(_)` when the line was malformed (the consumer decides whether
/// to drop the connection).
pub fn decode_buf(buf: &[u8]) -> Result<Option<(Message, usize)>, DecodeError> {
    let Some(idx) = buf.iter().position(|&b| b == b'\n') else {
        return Ok(None);
    };
    let line = std::str::from_utf8(&buf[..idx])
        .map_err(|_| DecodeError::Malformed("non-UTF8 input".to_string()))?;
    let msg = decode_line(line)?;
    Ok(Some((msg, idx + 1)))
}

/// Incremental decoder over an internally-owned append buffer.
#[derive(Debug, Default)]
pub struct Decoder {
    buf: Vec<u8>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes received from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes currently buffered without a complete line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete message, if any. On error the offending
    /// line has been consumed; the caller usually closes the link
    /// anyway.
    pub fn next(&mut self) -> Result<Option<Message>, DecodeError> {
        match decode_buf(&self.buf) {
            Ok(Some((msg, consumed))) => {
                self.buf.drain(..consumed);
                Ok(Some(msg))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                if let Some(idx) = self.buf.iter().position(|&b| b == b'\n') {
                    self.buf.drain(..=idx);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Altitude;

    fn climb_msg() -> Message {
        let mut msg = Message::cpdlc();
        msg.min = Some(5);
        msg.from = Some("CTR01".parse().unwrap());
        msg.to = Some("ACA123".parse().unwrap());
        msg.add_segment(
            Segment::by_type(
                MessageDirection::Uplink,
                20,
                0,
                vec![Arg::Altitude(Altitude::flight_level(350).unwrap())],
            )
            .unwrap(),
        )
        .unwrap();
        msg
    }

    #[test]
    fn encode_decode_round_trip() {
        let msg = climb_msg();
        let line = encode(&msg).unwrap();
        let (back, consumed) = decode_buf(line.as_bytes()).unwrap().unwrap();
        assert_eq!(consumed, line.len());
        assert_eq!(back, msg);
    }

    #[test]
    fn round_trip_across_catalog_samples() {
        use crate::arg::ArgKind;
        use crate::catalog::{DOWNLINK_CATALOG, UPLINK_CATALOG};
        use crate::wire;

        fn sample(kind: ArgKind) -> Arg {
            use crate::pdc::*;
            use crate::posreport::PositionReport;
            use crate::route::{Route, RouteEntry};
            use crate::types::*;
            match kind {
                ArgKind::Altitude => Arg::Altitude(Altitude::flight_level(310).unwrap()),
                ArgKind::Speed => Arg::Speed(Speed::knots(280).unwrap()),
                ArgKind::Time => Arg::Time(CpdlcTime::utc(12, 30).unwrap()),
                ArgKind::TimeDur => Arg::TimeDur(15),
                ArgKind::Position => Arg::Position(Position::Fix("ELN".into())),
                ArgKind::Direction => Arg::Direction(Direction::Left),
                ArgKind::Distance => Arg::Distance(25.0),
                ArgKind::DistanceOffset => Arg::DistanceOffset(10.0),
                ArgKind::Vvi => Arg::Vvi(1000),
                ArgKind::ToFrom => Arg::ToFrom(true),
                ArgKind::Route => {
                    let mut r = Route::default();
                    r.orig_icao = Some("KSEA".into());
                    r.entries.push(RouteEntry::Airway("J5".into()));
                    Arg::Route(Box::new(r))
                }
                ArgKind::Procedure => Arg::Procedure(Procedure {
                    kind: ProcedureKind::Arrival,
                    name: "GLASR1".into(),
                    transition: String::new(),
                }),
                ArgKind::Squawk => Arg::Squawk(0o4571),
                ArgKind::IcaoId => Arg::IcaoId("KZSE".into()),
                ArgKind::IcaoName => Arg::IcaoName(IcaoName {
                    is_name: false,
                    text: "KZSE".into(),
                    function: FacilityFunction::Center,
                }),
                ArgKind::Frequency => Arg::Frequency(128.35),
                ArgKind::Degrees => Arg::Degrees(Degrees::new(90, false).unwrap()),
                ArgKind::Baro => Arg::Baro(Baro {
                    hpa: true,
                    value: 1013.0,
                }),
                ArgKind::Freetext => Arg::Freetext("FREE TEXT SAMPLE".into()),
                ArgKind::Persons => Arg::Persons(101),
                ArgKind::PosReport => Arg::PosReport(Box::new(PositionReport::basic(
                    Position::Fix("OKG".into()),
                    CpdlcTime::utc(1, 2).unwrap(),
                    Altitude::flight_level(330).unwrap(),
                ))),
                ArgKind::Pdc => Arg::Pdc(Box::new(DepartureClearance {
                    acf_id: "ACA123".into(),
                    acf_type: None,
                    equipment: EquipmentCode::default(),
                    time_dep: (9, 15),
                    route: Route::default(),
                    alt_restr: None,
                    freq: 121.7,
                    squawk: 0o2341,
                    revision: 1,
                })),
                ArgKind::Tp4Table => Arg::Tp4Table(Tp4Label::A),
                ArgKind::ErrInfo => Arg::ErrInfo("UNKNOWN MESSAGE".into()),
                ArgKind::Version => Arg::Version(1),
                ArgKind::AtisCode => Arg::AtisCode("Q".into()),
                ArgKind::LegType => Arg::LegType(LegType::Time(1.5)),
            }
        }
        // Exercise every catalog entry with canonical sample arguments.
        for entry in UPLINK_CATALOG.iter().chain(DOWNLINK_CATALOG) {
            let args: Vec<Arg> = entry.args.iter().map(|k| sample(*k)).collect();
            let seg = Segment::new(entry, args).unwrap();
            let value = encode_segment(&seg);
            let back = parse_segment(&value).unwrap();
            assert_eq!(back, seg, "entry {}", entry.id());
            // Tokens must survive the outer escape discipline too.
            for arg in &seg.args {
                let tok = wire::arg_token(arg);
                assert!(!tok.contains(' ') && !tok.contains('/'), "{tok}");
            }
        }
    }

    #[test]
    fn incomplete_line_waits() {
        assert!(decode_buf(b"PKT=CPDLC/TS=1230").unwrap().is_none());
    }

    #[test]
    fn crlf_accepted() {
        let msg = climb_msg();
        let mut line = encode(&msg).unwrap();
        line.pop();
        line.push_str("\r\n");
        let (back, _) = decode_buf(line.as_bytes()).unwrap().unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn missing_pkt_rejected() {
        assert!(matches!(
            decode_buf(b"TS=123000/MIN=1\n"),
            Err(DecodeError::MissingHeader("PKT"))
        ));
    }

    #[test]
    fn msg_before_pkt_rejected() {
        assert!(decode_buf(b"MSG=DM0/PKT=CPDLC/TS=123000/MIN=1\n").is_err());
    }

    #[test]
    fn min_required_on_cpdlc() {
        assert!(matches!(
            decode_buf(b"PKT=CPDLC/TS=123000/MSG=DM0\n"),
            Err(DecodeError::MissingHeader("MIN"))
        ));
    }

    #[test]
    fn ping_must_not_carry_mrn() {
        assert!(decode_buf(b"PKT=PING/TS=123000/MIN=1/MRN=2\n").is_err());
        assert!(decode_buf(b"PKT=PING/TS=123000/MIN=1\n").unwrap().is_some());
    }

    #[test]
    fn logon_excludes_segments() {
        let line = b"PKT=CPDLC/TS=123000/MIN=1/LOGON=DATA/MSG=DM0\n";
        assert!(decode_buf(line).is_err());
    }

    #[test]
    fn mixed_directions_rejected() {
        let line = b"PKT=CPDLC/TS=123000/MIN=1/MSG=DM0/MSG=UM0\n";
        assert!(decode_buf(line).is_err());
    }

    #[test]
    fn bad_timestamp_rejected() {
        assert!(decode_buf(b"PKT=CPDLC/TS=256161/MIN=1/MSG=DM0\n").is_err());
        assert!(decode_buf(b"PKT=CPDLC/TS=12300/MIN=1/MSG=DM0\n").is_err());
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(decode_buf(b"PKT=CPDLC/TS=123000/MIN=1/XXX=1/MSG=DM0\n").is_err());
    }

    #[test]
    fn logoff_round_trip() {
        let mut msg = Message::logoff(9);
        msg.from = Some("ACA123".parse().unwrap());
        let line = encode(&msg).unwrap();
        assert!(line.contains("/LOGOFF"));
        let (back, _) = decode_buf(line.as_bytes()).unwrap().unwrap();
        assert!(back.logoff);
        assert_eq!(back.min, Some(9));
    }

    #[test]
    fn escaped_callsign_round_trip() {
        let mut msg = Message::logon("SECRET TOKEN/1", 2);
        msg.from = Some(Callsign::new("N1-2"));
        let line = encode(&msg).unwrap();
        let (back, _) = decode_buf(line.as_bytes()).unwrap().unwrap();
        assert_eq!(back.logon.as_deref(), Some("SECRET TOKEN/1"));
        assert_eq!(back.from.as_ref().unwrap().as_str(), "N1-2");
    }

    #[test]
    fn incremental_decoder_across_chunks() {
        let msg = climb_msg();
        let line = encode(&msg).unwrap();
        let mut dec = Decoder::new();
        let (a, b) = line.as_bytes().split_at(line.len() / 2);
        dec.push(a);
        assert!(dec.next().unwrap().is_none());
        dec.push(b);
        assert_eq!(dec.next().unwrap().unwrap(), msg);
        assert!(dec.next().unwrap().is_none());
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn decoder_consumes_bad_line_and_continues() {
        let msg = climb_msg();
        let mut dec = Decoder::new();
        dec.push(b"GARBAGE\n");
        dec.push(encode(&msg).unwrap().as_bytes());
        assert!(dec.next().is_err());
        assert_eq!(dec.next().unwrap().unwrap(), msg);
    }

    #[test]
    fn asn1_form_round_trips_through_text_frame() {
        let msg = climb_msg();
        let line = encode_asn1(&msg, "ACA123").unwrap();
        assert!(line.contains("/ASN1=AT1.ACA123"));
        let (back, _) = decode_buf(line.as_bytes()).unwrap().unwrap();
        assert_eq!(back.segments, msg.segments);
        assert_eq!(back.min, msg.min);
        assert_eq!(back.to, msg.to);
    }

    #[test]
    fn dm67_subtype_round_trip() {
        let mut msg = Message::cpdlc();
        msg.min = Some(11);
        msg.add_segment(
            Segment::by_type(
                MessageDirection::Downlink,
                67,
                b'e',
                vec![Arg::Altitude(Altitude::flight_level(390).unwrap())],
            )
            .unwrap(),
        )
        .unwrap();
        let line = encode(&msg).unwrap();
        assert!(line.contains("MSG=DM67e FL390"));
        let (back, _) = decode_buf(line.as_bytes()).unwrap().unwrap();
        assert_eq!(back, msg);
    }
}
