//! The ARINC 622 binary wire form.
//!
//! A frame is `IMI(3) || callsign(7, dot-padded) || hex(PER || CRC16)`,
//! where the CRC covers `IMI || callsign || PER`. The PER payload
//! carries the message header (MIN, optional MRN, optional timestamp)
//! and each segment as a catalog choice tag followed by its arguments.
//! Both directions of the codec walk the same catalog descriptor, so a
//! new message type is a new catalog row and nothing else.

use crc::{Crc, CRC_16_IBM_3740};

use crate::arg::{Arg, ArgKind};
use crate::catalog::{find_entry, MessageDirection};
use crate::error::{DecodeError, ModelError};
use crate::message::{Message, Segment, MAX_SEGMENTS};
use crate::per::{BitReader, BitWriter};
use crate::types::{
    Altitude, Baro, Callsign, CpdlcTime, Degrees, Direction, LegType, PacketType, Speed,
    Timestamp, Tp4Label,
};
use crate::wire;

/// CCITT-16 as used by the ARINC 622 trailer.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Length of the IMI prefix.
const IMI_LEN: usize = 3;
/// Length of the padded callsign field.
const CALLSIGN_LEN: usize = 7;

/// The Imbedded Message Identifier of an ARINC 622 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Imi {
    /// `CR1` — connection request (logon).
    ConnRequest,
    /// `CC1` — connection confirm.
    ConnConfirm,
    /// `AT1` — data.
    Data,
    /// `DR1` — disconnect request (logoff).
    DiscRequest,
}

impl Imi {
    fn as_str(self) -> &'static str {
        match self {
            Imi::ConnRequest => "CR1",
            Imi::ConnConfirm => "CC1",
            Imi::Data => "AT1",
            Imi::DiscRequest => "DR1",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "CR1" => Imi::ConnRequest,
            "CC1" => Imi::ConnConfirm,
            "AT1" => Imi::Data,
            "DR1" => Imi::DiscRequest,
            _ => return None,
        })
    }
}

/// Right-justify a callsign into the 7-character frame field, padding
/// with `.` on the left.
fn pad_callsign(callsign: &str) -> Result<String, ModelError> {
    if callsign.is_empty() || callsign.len() > CALLSIGN_LEN {
        return Err(ModelError::InvalidCallsign {
            value: callsign.to_string(),
            reason: format!("ARINC 622 callsign must be 1-{CALLSIGN_LEN} chars"),
        });
    }
    Ok(format!("{callsign:.>CALLSIGN_LEN$}"))
}

/// Encode a message into an ARINC 622 frame string (the `ASN1=` value
/// form). The IMI is derived from the message: logon → `CR1`, logoff →
/// `DR1`, otherwise `AT1`.
pub fn encode_frame(msg: &Message, callsign: &str) -> Result<String, ModelError> {
    let imi = if msg.logon.is_some() {
        Imi::ConnRequest
    } else if msg.logoff {
        Imi::DiscRequest
    } else {
        Imi::Data
    };
    encode_frame_with_imi(msg, callsign, imi)
}

/// Encode with an explicit IMI (`CC1` answers use this).
pub fn encode_frame_with_imi(
    msg: &Message,
    callsign: &str,
    imi: Imi,
) -> Result<String, ModelError> {
    msg.validate()?;
    if msg.packet_type != PacketType::Cpdlc {
        return Err(ModelError::OutOfRange {
            what: "packet type",
            value: msg.packet_type.as_str().to_string(),
        });
    }
    let cs = pad_callsign(callsign)?;
    let payload = per_encode(msg)?;

    let mut crc_input = Vec::with_capacity(IMI_LEN + CALLSIGN_LEN + payload.len());
    crc_input.extend_from_slice(imi.as_str().as_bytes());
    crc_input.extend_from_slice(cs.as_bytes());
    crc_input.extend_from_slice(&payload);
    let crc = CRC16.checksum(&crc_input);

    Ok(format!(
        "{}{}{}{:04x}",
        imi.as_str(),
        cs,
        hex::encode(&payload),
        crc
    ))
}

/// Decode an ARINC 622 frame string back into a message.
///
/// The CRC is verified before any payload parsing; a `DR1` frame sets
/// the logoff flag and a `CR1` frame marks the message as a logon.
pub fn decode_frame(value: &str) -> Result<Message, DecodeError> {
    if value.len() < IMI_LEN + CALLSIGN_LEN + 4 {
        return Err(DecodeError::BadFrame("frame too short".to_string()));
    }
    if !value.is_ascii() {
        return Err(DecodeError::BadFrame("non-ASCII frame".to_string()));
    }
    let imi = Imi::from_str(&value[..IMI_LEN])
        .ok_or_else(|| DecodeError::BadFrame(format!("unknown IMI \"{}\"", &value[..IMI_LEN])))?;
    let cs_padded = &value[IMI_LEN..IMI_LEN + CALLSIGN_LEN];
    let callsign = cs_padded.trim_start_matches('.');

    let hex_part = &value[IMI_LEN + CALLSIGN_LEN..];
    if hex_part.len() % 2 != 0 {
        return Err(DecodeError::BadHex("odd hex length".to_string()));
    }
    let bytes = hex::decode(hex_part).map_err(|e| DecodeError::BadHex(e.to_string()))?;
    if bytes.len() < 2 {
        return Err(DecodeError::BadFrame("missing CRC".to_string()));
    }
    let (payload, crc_bytes) = bytes.split_at(bytes.len() - 2);
    let carried = u16::from_be_bytes([crc_bytes[0], crc_bytes[1]]);

    let mut crc_input = Vec::with_capacity(IMI_LEN + CALLSIGN_LEN + payload.len());
    crc_input.extend_from_slice(value[..IMI_LEN + CALLSIGN_LEN].as_bytes());
    crc_input.extend_from_slice(payload);
    let computed = CRC16.checksum(&crc_input);
    if computed != carried {
        return Err(DecodeError::CrcMismatch { computed, carried });
    }

    let mut msg = per_decode(payload)?;
    match imi {
        Imi::DiscRequest => msg.logoff = true,
        Imi::ConnRequest => {
            if msg.logon.is_none() {
                msg.logon = Some(String::new());
            }
        }
        Imi::ConnConfirm | Imi::Data => {}
    }
    if !callsign.is_empty() {
        msg.from = Some(Callsign::new(callsign));
    }
    msg.validate().map_err(DecodeError::Model)?;
    Ok(msg)
}

// ---------------------------------------------------------------------------
// PER payload
// ---------------------------------------------------------------------------

fn per_encode(msg: &Message) -> Result<Vec<u8>, ModelError> {
    let mut w = BitWriter::new();
    // Header: MIN, optional MRN, optional timestamp.
    let min = msg.min.ok_or(ModelError::OutOfRange {
        what: "MIN",
        value: "missing".to_string(),
    })?;
    w.put_bits(min & 0x3f, 6);
    match msg.mrn {
        Some(mrn) => {
            w.put_bit(true);
            w.put_bits(mrn & 0x3f, 6);
        }
        None => w.put_bit(false),
    }
    w.put_bit(true);
    w.put_bits(u32::from(msg.timestamp.hours), 5);
    w.put_bits(u32::from(msg.timestamp.minutes), 6);
    w.put_bits(u32::from(msg.timestamp.seconds), 6);

    // Segment list: direction flag, count, then each element as a
    // catalog choice tag plus its arguments.
    let is_dl = msg.direction() == Some(MessageDirection::Downlink);
    w.put_bit(is_dl);
    w.put_bits(msg.segments.len() as u32, 3);
    for seg in &msg.segments {
        w.put_bits(u32::from(seg.entry.type_num), 8);
        let sub_tag = if seg.entry.subtype == 0 {
            0
        } else {
            u32::from(seg.entry.subtype - b'a')
        };
        w.put_bits(sub_tag, 4);
        for arg in &seg.args {
            encode_arg(&mut w, arg);
        }
    }
    Ok(w.finish())
}

fn per_decode(payload: &[u8]) -> Result<Message, DecodeError> {
    let mut r = BitReader::new(payload);
    let min = r.get_bits(6)?;
    let mrn = if r.get_bit()? {
        Some(r.get_bits(6)?)
    } else {
        None
    };
    let timestamp = if r.get_bit()? {
        let h = r.get_bits(5)? as u8;
        let m = r.get_bits(6)? as u8;
        let s = r.get_bits(6)? as u8;
        Timestamp::new(h, m, s).map_err(|_| DecodeError::BadPer("bad timestamp".to_string()))?
    } else {
        Timestamp::now()
    };

    let is_dl = r.get_bit()?;
    let direction = if is_dl {
        MessageDirection::Downlink
    } else {
        MessageDirection::Uplink
    };
    let count = r.get_bits(3)? as usize;
    if count > MAX_SEGMENTS {
        return Err(DecodeError::BadPer(format!("segment count {count}")));
    }
    let mut segments = Vec::with_capacity(count);
    for _ in 0..count {
        let type_num = r.get_bits(8)? as u16;
        let sub_tag = r.get_bits(4)? as u8;
        let subtype = if sub_tag == 0 { 0 } else { b'a' + sub_tag };
        let entry = find_entry(direction, type_num, subtype).ok_or_else(|| {
            DecodeError::BadPer(format!("unknown element {direction}{type_num}"))
        })?;
        let mut args = Vec::with_capacity(entry.args.len());
        for kind in entry.args {
            args.push(decode_arg(&mut r, *kind)?);
        }
        segments.push(Segment::new(entry, args).map_err(DecodeError::Model)?);
    }

    let mut msg = Message::cpdlc();
    msg.timestamp = timestamp;
    msg.min = Some(min);
    msg.mrn = mrn;
    msg.segments = segments;
    Ok(msg)
}

fn encode_arg(w: &mut BitWriter, arg: &Arg) {
    match arg {
        Arg::Altitude(alt) => {
            w.put_bit(alt.fl);
            w.put_bit(alt.metric);
            w.put_bits((alt.value + 1500) as u32, 17);
        }
        Arg::Speed(spd) => {
            w.put_bit(spd.mach);
            w.put_bit(spd.true_air);
            w.put_bit(spd.ground);
            w.put_bits(spd.value, 14);
        }
        Arg::Time(time) => match time {
            CpdlcTime::Now => w.put_bit(true),
            CpdlcTime::Utc { hours, minutes } => {
                w.put_bit(false);
                w.put_bits(u32::from(*hours), 5);
                w.put_bits(u32::from(*minutes), 6);
            }
        },
        Arg::TimeDur(mins) => w.put_bits(u32::from(*mins), 11),
        Arg::Position(pos) => w.put_str(&wire::position_token(pos)),
        Arg::Direction(dir) => w.put_bits(u32::from(dir.index()), 4),
        Arg::Distance(nm) | Arg::DistanceOffset(nm) => {
            w.put_bits((nm * 10.0).round() as u32, 18);
        }
        Arg::Vvi(v) => w.put_bits(*v as u32, 14),
        Arg::ToFrom(to) => w.put_bit(*to),
        Arg::Route(route) => w.put_str(&wire::route_fields(route)),
        Arg::Procedure(proc) => w.put_str(&wire::procedure_token(proc)),
        Arg::Squawk(code) => w.put_bits(u32::from(*code), 12),
        Arg::IcaoId(id) => w.put_str(id),
        Arg::IcaoName(name) => w.put_str(&wire::icao_name_token(name)),
        Arg::Frequency(mhz) => w.put_bits((mhz * 10_000.0).round() as u32, 24),
        Arg::Degrees(deg) => {
            w.put_bits(u32::from(deg.degrees), 9);
            w.put_bit(deg.true_north);
        }
        Arg::Baro(baro) => {
            w.put_bit(baro.hpa);
            w.put_bits((baro.value * 100.0).round() as u32, 18);
        }
        Arg::Freetext(text) | Arg::ErrInfo(text) | Arg::AtisCode(text) => w.put_str(text),
        Arg::Persons(pob) => w.put_bits(*pob, 11),
        Arg::PosReport(rep) => w.put_str(&wire::posreport_fields(rep)),
        Arg::Pdc(pdc) => w.put_str(&wire::pdc_fields(pdc)),
        Arg::Tp4Table(label) => w.put_bit(*label == Tp4Label::B),
        Arg::Version(v) => w.put_bits(*v, 8),
        Arg::LegType(leg) => match leg {
            LegType::Distance(nm) => {
                w.put_bit(false);
                w.put_bits((nm * 10.0).round() as u32, 10);
            }
            LegType::Time(min) => {
                w.put_bit(true);
                w.put_bits((min * 10.0).round() as u32, 10);
            }
        },
    }
}

fn decode_arg(r: &mut BitReader<'_>, kind: ArgKind) -> Result<Arg, DecodeError> {
    fn per_err(what: &str) -> DecodeError {
        DecodeError::BadPer(format!("bad {what} value"))
    }
    Ok(match kind {
        ArgKind::Altitude => {
            let fl = r.get_bit()?;
            let metric = r.get_bit()?;
            let value = r.get_bits(17)? as i32 - 1500;
            let alt = match (fl, metric) {
                (true, false) => {
                    if value % 100 != 0 {
                        return Err(per_err("altitude"));
                    }
                    Altitude::flight_level((value / 100) as u32)
                }
                (true, true) => Altitude::metric_flight_level(value),
                (false, true) => Altitude::metres(value),
                (false, false) => Altitude::feet(value),
            };
            Arg::Altitude(alt.map_err(|_| per_err("altitude"))?)
        }
        ArgKind::Speed => {
            let mach = r.get_bit()?;
            let true_air = r.get_bit()?;
            let ground = r.get_bit()?;
            let value = r.get_bits(14)?;
            Arg::Speed(Speed {
                mach,
                true_air,
                ground,
                value,
            })
        }
        ArgKind::Time => {
            if r.get_bit()? {
                Arg::Time(CpdlcTime::Now)
            } else {
                let hours = r.get_bits(5)? as u8;
                let minutes = r.get_bits(6)? as u8;
                Arg::Time(CpdlcTime::utc(hours, minutes).map_err(|_| per_err("time"))?)
            }
        }
        ArgKind::TimeDur => {
            let mins = r.get_bits(11)?;
            if mins > 1440 {
                return Err(per_err("duration"));
            }
            Arg::TimeDur(mins as u16)
        }
        ArgKind::Position => Arg::Position(wire::parse_position(&r.get_str()?)?),
        ArgKind::Direction => Arg::Direction(
            Direction::from_index(r.get_bits(4)? as u8).ok_or_else(|| per_err("direction"))?,
        ),
        ArgKind::Distance | ArgKind::DistanceOffset => {
            let nm = f64::from(r.get_bits(18)?) / 10.0;
            if nm > 20_000.0 {
                return Err(per_err("distance"));
            }
            if kind == ArgKind::Distance {
                Arg::Distance(nm)
            } else {
                Arg::DistanceOffset(nm)
            }
        }
        ArgKind::Vvi => {
            let v = r.get_bits(14)? as i32;
            if v > 10_000 {
                return Err(per_err("vvi"));
            }
            Arg::Vvi(v)
        }
        ArgKind::ToFrom => Arg::ToFrom(r.get_bit()?),
        ArgKind::Route => Arg::Route(Box::new(wire::parse_route(&r.get_str()?)?)),
        ArgKind::Procedure => Arg::Procedure(wire::parse_procedure(&r.get_str()?)?),
        ArgKind::Squawk => {
            let code = r.get_bits(12)? as u16;
            if code > 0o7777 {
                return Err(per_err("squawk"));
            }
            Arg::Squawk(code)
        }
        ArgKind::IcaoId => Arg::IcaoId(r.get_str()?),
        ArgKind::IcaoName => Arg::IcaoName(wire::parse_icao_name(&r.get_str()?)?),
        ArgKind::Frequency => Arg::Frequency(f64::from(r.get_bits(24)?) / 10_000.0),
        ArgKind::Degrees => {
            let degrees = r.get_bits(9)? as u16;
            let true_north = r.get_bit()?;
            Arg::Degrees(Degrees::new(degrees, true_north).map_err(|_| per_err("degrees"))?)
        }
        ArgKind::Baro => {
            let hpa = r.get_bit()?;
            let value = f64::from(r.get_bits(18)?) / 100.0;
            Arg::Baro(Baro { hpa, value })
        }
        ArgKind::Freetext => Arg::Freetext(r.get_str()?),
        ArgKind::ErrInfo => Arg::ErrInfo(r.get_str()?),
        ArgKind::AtisCode => Arg::AtisCode(r.get_str()?),
        ArgKind::Persons => Arg::Persons(r.get_bits(11)?),
        ArgKind::PosReport => Arg::PosReport(Box::new(wire::parse_posreport(&r.get_str()?)?)),
        ArgKind::Pdc => Arg::Pdc(Box::new(wire::parse_pdc(&r.get_str()?)?)),
        ArgKind::Tp4Table => Arg::Tp4Table(if r.get_bit()? {
            Tp4Label::B
        } else {
            Tp4Label::A
        }),
        ArgKind::Version => Arg::Version(r.get_bits(8)?),
        ArgKind::LegType => {
            let time = r.get_bit()?;
            let tenths = f64::from(r.get_bits(10)?) / 10.0;
            Arg::LegType(if time {
                LegType::Time(tenths)
            } else {
                LegType::Distance(tenths)
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Altitude;

    fn freetext_msg(text: &str, min: u32) -> Message {
        let mut msg = Message::cpdlc();
        msg.min = Some(min);
        msg.add_segment(
            Segment::by_type(
                MessageDirection::Downlink,
                67,
                0,
                vec![Arg::Freetext(text.to_string())],
            )
            .unwrap(),
        )
        .unwrap();
        msg
    }

    #[test]
    fn frame_round_trip() {
        let msg = freetext_msg("TEST", 1);
        let frame = encode_frame(&msg, "ACA123").unwrap();
        assert!(frame.starts_with("AT1.ACA123"));
        let back = decode_frame(&frame).unwrap();
        assert_eq!(back.min, Some(1));
        assert_eq!(back.segments, msg.segments);
        assert_eq!(back.timestamp, msg.timestamp);
        assert_eq!(back.from.as_ref().unwrap().as_str(), "ACA123");
    }

    #[test]
    fn corrupted_payload_fails_crc() {
        let msg = freetext_msg("TEST", 1);
        let frame = encode_frame(&msg, "ACA123").unwrap();
        // Flip one payload nibble past the header.
        let mut bytes: Vec<u8> = frame.into_bytes();
        let idx = IMI_LEN + CALLSIGN_LEN + 2;
        bytes[idx] = if bytes[idx] == b'0' { b'1' } else { b'0' };
        let corrupted = String::from_utf8(bytes).unwrap();
        assert!(matches!(
            decode_frame(&corrupted),
            Err(DecodeError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn odd_hex_rejected() {
        let msg = freetext_msg("TEST", 1);
        let mut frame = encode_frame(&msg, "ACA123").unwrap();
        frame.pop();
        assert!(matches!(
            decode_frame(&frame),
            Err(DecodeError::BadHex(_))
        ));
    }

    #[test]
    fn callsign_padding() {
        let msg = freetext_msg("X", 2);
        let frame = encode_frame(&msg, "UAL1").unwrap();
        assert!(frame.starts_with("AT1...UAL1"));
        let back = decode_frame(&frame).unwrap();
        assert_eq!(back.from.as_ref().unwrap().as_str(), "UAL1");
        assert!(encode_frame(&msg, "TOOLONGCS").is_err());
    }

    #[test]
    fn disconnect_sets_logoff() {
        let mut msg = Message::logoff(3);
        msg.from = Some(Callsign::new("ACA123"));
        let frame = encode_frame(&msg, "ACA123").unwrap();
        assert!(frame.starts_with("DR1"));
        let back = decode_frame(&frame).unwrap();
        assert!(back.logoff);
    }

    #[test]
    fn header_mrn_round_trip() {
        let mut msg = Message::cpdlc();
        msg.min = Some(7);
        msg.mrn = Some(5);
        msg.add_segment(Segment::by_type(MessageDirection::Downlink, 0, 0, vec![]).unwrap())
            .unwrap();
        let frame = encode_frame(&msg, "ACA123").unwrap();
        let back = decode_frame(&frame).unwrap();
        assert_eq!(back.min, Some(7));
        assert_eq!(back.mrn, Some(5));
    }

    #[test]
    fn dm67_subtype_round_trip() {
        let mut msg = Message::cpdlc();
        msg.min = Some(8);
        msg.add_segment(
            Segment::by_type(
                MessageDirection::Downlink,
                67,
                b'h',
                vec![Arg::Altitude(Altitude::flight_level(370).unwrap())],
            )
            .unwrap(),
        )
        .unwrap();
        let frame = encode_frame(&msg, "ACA123").unwrap();
        let back = decode_frame(&frame).unwrap();
        assert_eq!(back.segments, msg.segments);
    }

    #[test]
    fn per_round_trip_across_catalog() {
        use crate::arg::ArgKind;
        use crate::catalog::{DOWNLINK_CATALOG, UPLINK_CATALOG};
        use crate::pdc::*;
        use crate::posreport::PositionReport;
        use crate::route::Route;
        use crate::types::*;

        fn sample(kind: ArgKind) -> Arg {
            match kind {
                ArgKind::Altitude => Arg::Altitude(Altitude::flight_level(310).unwrap()),
                ArgKind::Speed => Arg::Speed(Speed::knots(280).unwrap()),
                ArgKind::Time => Arg::Time(CpdlcTime::utc(12, 30).unwrap()),
                ArgKind::TimeDur => Arg::TimeDur(15),
                ArgKind::Position => Arg::Position(Position::Fix("ELN".into())),
                ArgKind::Direction => Arg::Direction(Direction::Right),
                ArgKind::Distance => Arg::Distance(25.0),
                ArgKind::DistanceOffset => Arg::DistanceOffset(10.0),
                ArgKind::Vvi => Arg::Vvi(1000),
                ArgKind::ToFrom => Arg::ToFrom(true),
                ArgKind::Route => Arg::Route(Box::new(Route::default())),
                ArgKind::Procedure => Arg::Procedure(Procedure {
                    kind: ProcedureKind::Departure,
                    name: "HAROB6".into(),
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
                ArgKind::Freetext => Arg::Freetext("FREE TEXT".into()),
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
                ArgKind::ErrInfo => Arg::ErrInfo("UNKNOWN".into()),
                ArgKind::Version => Arg::Version(1),
                ArgKind::AtisCode => Arg::AtisCode("Q".into()),
                ArgKind::LegType => Arg::LegType(LegType::Time(1.5)),
            }
        }

        for entry in UPLINK_CATALOG.iter().chain(DOWNLINK_CATALOG) {
            let args: Vec<Arg> = entry.args.iter().map(|k| sample(*k)).collect();
            let seg = Segment::new(entry, args).unwrap();
            let mut msg = Message::cpdlc();
            msg.min = Some(1);
            msg.segments.push(seg);
            let frame = encode_frame(&msg, "ACA123").unwrap();
            let back = decode_frame(&frame).unwrap();
            assert_eq!(back.segments, msg.segments, "entry {}", entry.id());
        }
    }
}
