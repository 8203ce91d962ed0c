//! Small value types shared across the CPDLC message model.
//!
//! Every type here follows the same construction discipline: an
//! unchecked `new` for values already known to be valid, and a
//! validated [`TryFrom`] / [`FromStr`] path for untrusted input.
//! Wire serialisation of these types lives in the codec modules
//! ([`crate::text`], [`crate::arinc622`]); this module only defines the
//! values, their ranges, and their human-readable `Display` forms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

// ---------------------------------------------------------------------------
// PacketType
// ---------------------------------------------------------------------------

/// The outermost packet discriminator of a wire message.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// A CPDLC message (logon, logoff, or operational segments).
    Cpdlc,
    /// Keepalive probe.
    Ping,
    /// Keepalive answer; carries the probe's MIN as its MRN.
    Pong,
}

impl PacketType {
    /// Wire keyword used in the `PKT=` header.
    pub fn as_str(self) -> &'static str {
        match self {
            PacketType::Cpdlc => "CPDLC",
            PacketType::Ping => "PING",
            PacketType::Pong => "PONG",
        }
    }
}

impl FromStr for PacketType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CPDLC" => Ok(PacketType::Cpdlc),
            "PING" => Ok(PacketType::Ping),
            "PONG" => Ok(PacketType::Pong),
            _ => Err(ModelError::OutOfRange {
                what: "packet type",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Callsign
// ---------------------------------------------------------------------------

/// A validated callsign-style identifier (aircraft or ground station).
///
/// At most 15 bytes, printable ASCII, no `/` (which delimits wire
/// fields) and no whitespace.
///
/// # Examples
///
/// ```
/// use fanslink_models::Callsign;
///
/// let cs: Callsign = "ACA123".parse().unwrap();
/// assert_eq!(cs.as_str(), "ACA123");
/// assert!("WAY/TOO/LONG/CALLSIGN".parse::<Callsign>().is_err());
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Callsign(String);

/// Maximum callsign length in bytes.
pub const CALLSIGN_MAX_LEN: usize = 15;

impl Callsign {
    /// Create a callsign **without validation**.
    pub fn new(s: &str) -> Self {
        Self(s.to_string())
    }

    /// Return the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ModelError> {
        if s.is_empty() || s.len() > CALLSIGN_MAX_LEN {
            return Err(ModelError::InvalidCallsign {
                value: s.to_string(),
                reason: format!("length must be 1-{CALLSIGN_MAX_LEN} bytes"),
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_graphic() && b != b'/')
        {
            return Err(ModelError::InvalidCallsign {
                value: s.to_string(),
                reason: "must be printable ASCII without '/'".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Callsign {
    type Error = ModelError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::validate(s)?;
        Ok(Self(s.to_string()))
    }
}

impl FromStr for Callsign {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Message creation time, UTC, second resolution (`TS=HHMMSS` on the wire).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl Timestamp {
    /// Build a timestamp, validating field ranges.
    pub fn new(hours: u8, minutes: u8, seconds: u8) -> Result<Self, ModelError> {
        if hours > 23 || minutes > 59 || seconds > 59 {
            return Err(ModelError::OutOfRange {
                what: "timestamp",
                value: format!("{hours:02}{minutes:02}{seconds:02}"),
            });
        }
        Ok(Self {
            hours,
            minutes,
            seconds,
        })
    }

    /// The current UTC time.
    pub fn now() -> Self {
        use chrono::Timelike;
        let now = chrono::Utc::now();
        Self {
            hours: now.hour() as u8,
            minutes: now.minute() as u8,
            seconds: now.second() as u8,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}{:02}", self.hours, self.minutes, self.seconds)
    }
}

// ---------------------------------------------------------------------------
// Altitude
// ---------------------------------------------------------------------------

/// An altitude or flight level.
///
/// `value` is in feet, or metres when `metric` is set. Flight levels
/// store the underlying altitude (FL350 stores 35 000).
///
/// # Examples
///
/// ```
/// use fanslink_models::Altitude;
///
/// let fl = Altitude::flight_level(350).unwrap();
/// assert_eq!(fl.to_string(), "FL350");
/// assert_eq!(fl.value, 35_000);
///
/// // Plain altitudes go down to 1500 ft below sea level.
/// assert!(Altitude::feet(-1500).is_ok());
/// assert!(Altitude::feet(-1501).is_err());
/// assert!(Altitude::feet(100_001).is_err());
///
/// // Flight level zero is meaningless.
/// assert!(Altitude::flight_level(0).is_err());
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Altitude {
    /// Flight level rather than plain altitude.
    pub fl: bool,
    /// Metric (`value` in metres) rather than feet.
    pub metric: bool,
    /// Feet, or metres when `metric`.
    pub value: i32,
}

impl Altitude {
    /// Lowest representable plain altitude, feet.
    pub const MIN_FEET: i32 = -1500;
    /// Highest representable plain altitude, feet.
    pub const MAX_FEET: i32 = 100_000;
    /// Highest representable flight level, feet (FL600).
    pub const MAX_FL_FEET: i32 = 60_000;
    /// Highest representable metric flight level, metres.
    pub const MAX_FL_METRES: i32 = 20_000;

    /// A plain altitude in feet.
    pub fn feet(value: i32) -> Result<Self, ModelError> {
        if !(Self::MIN_FEET..=Self::MAX_FEET).contains(&value) {
            return Err(ModelError::InvalidAltitude {
                value,
                reason: format!("feet must be {}..={}", Self::MIN_FEET, Self::MAX_FEET),
            });
        }
        Ok(Self {
            fl: false,
            metric: false,
            value,
        })
    }

    /// A flight level; `level` is in hundreds of feet (FL350 → 350).
    pub fn flight_level(level: u32) -> Result<Self, ModelError> {
        let feet = level as i32 * 100;
        if feet <= 0 || feet > Self::MAX_FL_FEET {
            return Err(ModelError::InvalidAltitude {
                value: feet,
                reason: "flight level must be FL001..=FL600".to_string(),
            });
        }
        Ok(Self {
            fl: true,
            metric: false,
            value: feet,
        })
    }

    /// A metric flight level in metres.
    pub fn metric_flight_level(metres: i32) -> Result<Self, ModelError> {
        if metres <= 0 || metres > Self::MAX_FL_METRES {
            return Err(ModelError::InvalidAltitude {
                value: metres,
                reason: format!("metric FL must be 1..={} m", Self::MAX_FL_METRES),
            });
        }
        Ok(Self {
            fl: true,
            metric: true,
            value: metres,
        })
    }

    /// A plain metric altitude in metres.
    pub fn metres(value: i32) -> Result<Self, ModelError> {
        if !(-500..=30_000).contains(&value) {
            return Err(ModelError::InvalidAltitude {
                value,
                reason: "metres must be -500..=30000".to_string(),
            });
        }
        Ok(Self {
            fl: false,
            metric: true,
            value,
        })
    }
}

impl fmt::Display for Altitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.fl, self.metric) {
            (true, false) => write!(f, "FL{}", self.value / 100),
            (true, true) => write!(f, "FL{} M", self.value),
            (false, true) => write!(f, "{} M", self.value),
            (false, false) => write!(f, "{} FT", self.value),
        }
    }
}

// ---------------------------------------------------------------------------
// Speed
// ---------------------------------------------------------------------------

/// A speed: knots (IAS, TAS or ground) or Mach number ×1000.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Speed {
    /// `value` is Mach ×1000 rather than knots.
    pub mach: bool,
    /// True airspeed rather than indicated.
    pub true_air: bool,
    /// Ground speed rather than airspeed.
    pub ground: bool,
    /// Knots, or thousandths of Mach.
    pub value: u32,
}

impl Speed {
    /// An indicated airspeed in knots.
    pub fn knots(value: u32) -> Result<Self, ModelError> {
        if value > 2000 {
            return Err(ModelError::OutOfRange {
                what: "speed",
                value: value.to_string(),
            });
        }
        Ok(Self {
            mach: false,
            true_air: false,
            ground: false,
            value,
        })
    }

    /// A Mach number in thousandths (M0.82 → 820).
    pub fn mach_thousandths(value: u32) -> Result<Self, ModelError> {
        if value == 0 || value > 5000 {
            return Err(ModelError::OutOfRange {
                what: "mach",
                value: value.to_string(),
            });
        }
        Ok(Self {
            mach: true,
            true_air: false,
            ground: false,
            value,
        })
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mach {
            if self.value < 1000 {
                write!(f, "M.{:02}", self.value / 10)
            } else {
                write!(f, "M{}.{:02}", self.value / 1000, (self.value % 1000) / 10)
            }
        } else {
            write!(f, "{} KT", self.value)
        }
    }
}

// ---------------------------------------------------------------------------
// CpdlcTime / TimeDur
// ---------------------------------------------------------------------------

/// A point in time: either a UTC hour/minute, or the sentinel "NOW".
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpdlcTime {
    /// A concrete UTC time of day.
    Utc {
        hours: u8,
        minutes: u8,
    },
    /// Immediately.
    Now,
}

impl CpdlcTime {
    /// A concrete UTC time, validated.
    pub fn utc(hours: u8, minutes: u8) -> Result<Self, ModelError> {
        if hours > 23 || minutes > 59 {
            return Err(ModelError::OutOfRange {
                what: "time",
                value: format!("{hours:02}{minutes:02}"),
            });
        }
        Ok(CpdlcTime::Utc { hours, minutes })
    }
}

impl fmt::Display for CpdlcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpdlcTime::Utc { hours, minutes } => write!(f, "{hours:02}{minutes:02}Z"),
            CpdlcTime::Now => write!(f, "NOW"),
        }
    }
}

// ---------------------------------------------------------------------------
// LatLon / Position
// ---------------------------------------------------------------------------

/// A geographic coordinate, decimal degrees.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    /// Validated constructor.
    pub fn new(lat: f64, lon: f64) -> Result<Self, ModelError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(ModelError::OutOfRange {
                what: "lat/lon",
                value: format!("{lat},{lon}"),
            });
        }
        Ok(Self { lat, lon })
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat, self.lon)
    }
}

/// A place/bearing/distance position: a fix, a magnetic bearing from it,
/// and a distance along that bearing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlaceBearingDistance {
    pub fix: String,
    /// Optional resolved coordinates of the fix.
    pub lat_lon: Option<LatLon>,
    /// Degrees, 1-360.
    pub degrees: u16,
    pub dist_nm: f64,
}

/// A place/bearing pair (half of a place-bearing/place-bearing fix).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlaceBearing {
    pub fix: String,
    pub lat_lon: Option<LatLon>,
    /// Degrees, 1-360.
    pub degrees: u16,
}

/// A position reference, one of the five concrete shapes the protocol
/// distinguishes, plus a free-string fallback for unparseable input.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Position {
    /// A named waypoint/fix.
    Fix(String),
    /// A navaid identifier.
    Navaid(String),
    /// An airport identifier.
    Airport(String),
    /// Raw coordinates.
    LatLon(LatLon),
    /// Place/bearing/distance.
    Pbd(PlaceBearingDistance),
    /// Anything the parser could not classify; carried verbatim.
    Unparsed(String),
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Fix(s) | Position::Navaid(s) | Position::Airport(s) => f.write_str(s),
            Position::LatLon(ll) => write!(f, "{ll}"),
            Position::Pbd(pbd) => {
                write!(f, "{}/{:03}/{}", pbd.fix, pbd.degrees, pbd.dist_nm)
            }
            Position::Unparsed(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// A turn or offset direction.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
)]
pub enum Direction {
    #[strum(serialize = "LEFT")]
    Left,
    #[strum(serialize = "RIGHT")]
    Right,
    #[strum(serialize = "EITHER")]
    Either,
    #[strum(serialize = "NORTH")]
    North,
    #[strum(serialize = "SOUTH")]
    South,
    #[strum(serialize = "EAST")]
    East,
    #[strum(serialize = "WEST")]
    West,
    #[strum(serialize = "NORTHEAST")]
    NorthEast,
    #[strum(serialize = "NORTHWEST")]
    NorthWest,
    #[strum(serialize = "SOUTHEAST")]
    SouthEast,
    #[strum(serialize = "SOUTHWEST")]
    SouthWest,
}

impl Direction {
    /// Compact wire token (`L`, `R`, `-`, compass abbreviations).
    pub fn wire_token(self) -> &'static str {
        match self {
            Direction::Left => "L",
            Direction::Right => "R",
            Direction::Either => "-",
            Direction::North => "N",
            Direction::South => "S",
            Direction::East => "E",
            Direction::West => "W",
            Direction::NorthEast => "NE",
            Direction::NorthWest => "NW",
            Direction::SouthEast => "SE",
            Direction::SouthWest => "SW",
        }
    }

    /// Parse the compact wire token.
    pub fn from_wire_token(s: &str) -> Option<Self> {
        Some(match s {
            "L" => Direction::Left,
            "R" => Direction::Right,
            "-" => Direction::Either,
            "N" => Direction::North,
            "S" => Direction::South,
            "E" => Direction::East,
            "W" => Direction::West,
            "NE" => Direction::NorthEast,
            "NW" => Direction::NorthWest,
            "SE" => Direction::SouthEast,
            "SW" => Direction::SouthWest,
            _ => return None,
        })
    }

    /// Stable numeric tag used by the binary codec.
    pub fn index(self) -> u8 {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
            Direction::Either => 2,
            Direction::North => 3,
            Direction::South => 4,
            Direction::East => 5,
            Direction::West => 6,
            Direction::NorthEast => 7,
            Direction::NorthWest => 8,
            Direction::SouthEast => 9,
            Direction::SouthWest => 10,
        }
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(idx: u8) -> Option<Self> {
        Some(match idx {
            0 => Direction::Left,
            1 => Direction::Right,
            2 => Direction::Either,
            3 => Direction::North,
            4 => Direction::South,
            5 => Direction::East,
            6 => Direction::West,
            7 => Direction::NorthEast,
            8 => Direction::NorthWest,
            9 => Direction::SouthEast,
            10 => Direction::SouthWest,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Procedure
// ---------------------------------------------------------------------------

/// Which family a published procedure belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcedureKind {
    Unknown,
    Arrival,
    Approach,
    Departure,
}

/// A published procedure with optional transition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Procedure {
    pub kind: ProcedureKind,
    pub name: String,
    pub transition: String,
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.transition.is_empty() {
            f.write_str(&self.name)
        } else {
            match self.kind {
                // Departures read name-then-transition, everything else
                // transition-then-name.
                ProcedureKind::Departure => write!(f, "{}.{}", self.name, self.transition),
                _ => write!(f, "{}.{}", self.transition, self.name),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// IcaoName / FacilityFunction
// ---------------------------------------------------------------------------

/// The operational function of an ATS facility.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
)]
pub enum FacilityFunction {
    #[strum(serialize = "CENTER")]
    Center,
    #[strum(serialize = "APPROACH")]
    Approach,
    #[strum(serialize = "TOWER")]
    Tower,
    #[strum(serialize = "FINAL")]
    Final,
    #[strum(serialize = "GROUND")]
    Ground,
    #[strum(serialize = "CLEARANCE")]
    Clearance,
    #[strum(serialize = "DEPARTURE")]
    Departure,
    #[strum(serialize = "CONTROL")]
    Control,
}

impl FacilityFunction {
    /// Stable numeric tag used by the wire codecs.
    pub fn index(self) -> u8 {
        match self {
            FacilityFunction::Center => 0,
            FacilityFunction::Approach => 1,
            FacilityFunction::Tower => 2,
            FacilityFunction::Final => 3,
            FacilityFunction::Ground => 4,
            FacilityFunction::Clearance => 5,
            FacilityFunction::Departure => 6,
            FacilityFunction::Control => 7,
        }
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(idx: u8) -> Option<Self> {
        Some(match idx {
            0 => FacilityFunction::Center,
            1 => FacilityFunction::Approach,
            2 => FacilityFunction::Tower,
            3 => FacilityFunction::Final,
            4 => FacilityFunction::Ground,
            5 => FacilityFunction::Clearance,
            6 => FacilityFunction::Departure,
            7 => FacilityFunction::Control,
            _ => return None,
        })
    }
}

/// A facility reference: either its 4-letter ICAO id or a plain-language
/// name, plus the facility function.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct IcaoName {
    /// `true` when `text` is a plain-language name rather than an ICAO id.
    pub is_name: bool,
    pub text: String,
    pub function: FacilityFunction,
}

impl fmt::Display for IcaoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.text, self.function)
    }
}

// ---------------------------------------------------------------------------
// Degrees / Baro / Tp4 / LegType
// ---------------------------------------------------------------------------

/// A heading or track, magnetic unless `true_north`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Degrees {
    /// 1-360.
    pub degrees: u16,
    pub true_north: bool,
}

impl Degrees {
    /// Validated constructor; headings run 1-360.
    pub fn new(degrees: u16, true_north: bool) -> Result<Self, ModelError> {
        if degrees == 0 || degrees > 360 {
            return Err(ModelError::OutOfRange {
                what: "degrees",
                value: degrees.to_string(),
            });
        }
        Ok(Self {
            degrees,
            true_north,
        })
    }
}

impl fmt::Display for Degrees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}{}", self.degrees, if self.true_north { " TRUE" } else { "" })
    }
}

/// An altimeter setting, inches of mercury or hectopascals.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Baro {
    pub hpa: bool,
    pub value: f64,
}

impl Baro {
    /// Interpret a bare numeric altimeter value by its range:
    /// 2200-3100 is inHg ×100, 22-31 is inHg, 745-1100 is hPa.
    pub fn from_unlabeled(value: f64) -> Result<Self, ModelError> {
        if (2200.0..=3100.0).contains(&value) {
            Ok(Self {
                hpa: false,
                value: value / 100.0,
            })
        } else if (22.0..=31.0).contains(&value) {
            Ok(Self { hpa: false, value })
        } else if (745.0..=1100.0).contains(&value) {
            Ok(Self { hpa: true, value })
        } else {
            Err(ModelError::OutOfRange {
                what: "altimeter",
                value: value.to_string(),
            })
        }
    }
}

impl fmt::Display for Baro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hpa {
            write!(f, "{:.0} HPA", self.value)
        } else {
            write!(f, "{:.2} IN", self.value)
        }
    }
}

/// Transport-protocol label carried by UM163 FACILITY messages.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tp4Label {
    A,
    B,
}

/// A holding-pattern leg length, by distance or by time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum LegType {
    /// 0.1 - 99.9 NM.
    Distance(f64),
    /// 0.1 - 9.9 minutes.
    Time(f64),
}

// ---------------------------------------------------------------------------
// Weather scales (position reports)
// ---------------------------------------------------------------------------

/// Reported turbulence intensity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Turbulence {
    Light,
    Moderate,
    Severe,
}

/// Reported icing intensity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Icing {
    Trace,
    Light,
    Moderate,
    Severe,
}

/// Reported wind, direction 1-360 / speed in knots.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Wind {
    pub direction: u16,
    pub speed: u16,
}

impl fmt::Display for Wind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}/{}", self.direction, self.speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn altitude_boundaries() {
        assert!(Altitude::feet(-1500).is_ok());
        assert!(Altitude::feet(-1501).is_err());
        assert!(Altitude::feet(100_000).is_ok());
        assert!(Altitude::feet(100_001).is_err());
        assert!(Altitude::flight_level(600).is_ok());
        assert!(Altitude::flight_level(601).is_err());
        assert!(Altitude::flight_level(0).is_err());
        assert!(Altitude::metric_flight_level(20_000).is_ok());
        assert!(Altitude::metric_flight_level(20_001).is_err());
    }

    #[test]
    fn altitude_display() {
        assert_eq!(Altitude::flight_level(350).unwrap().to_string(), "FL350");
        assert_eq!(Altitude::feet(12_000).unwrap().to_string(), "12000 FT");
    }

    #[test]
    fn fl600_is_60000_ft() {
        assert_eq!(Altitude::flight_level(600).unwrap().value, 60_000);
    }

    #[test]
    fn speed_display() {
        assert_eq!(Speed::knots(250).unwrap().to_string(), "250 KT");
        assert_eq!(Speed::mach_thousandths(820).unwrap().to_string(), "M.82");
        assert_eq!(
            Speed::mach_thousandths(1200).unwrap().to_string(),
            "M1.20"
        );
    }

    #[test]
    fn callsign_limits() {
        assert!("A".parse::<Callsign>().is_ok());
        assert!("ABCDEFGHIJKLMNO".parse::<Callsign>().is_ok());
        assert!("ABCDEFGHIJKLMNOP".parse::<Callsign>().is_err());
        assert!("".parse::<Callsign>().is_err());
        assert!("A/B".parse::<Callsign>().is_err());
        assert!("A B".parse::<Callsign>().is_err());
    }

    #[test]
    fn direction_tokens_round_trip() {
        for idx in 0..=10 {
            let dir = Direction::from_index(idx).unwrap();
            assert_eq!(Direction::from_wire_token(dir.wire_token()), Some(dir));
            assert_eq!(Direction::from_index(dir.index()), Some(dir));
        }
        assert_eq!(Direction::from_wire_token("X"), None);
    }

    #[test]
    fn degrees_range() {
        assert!(Degrees::new(0, false).is_err());
        assert!(Degrees::new(1, false).is_ok());
        assert!(Degrees::new(360, true).is_ok());
        assert!(Degrees::new(361, false).is_err());
    }

    #[test]
    fn baro_disambiguation() {
        let b = Baro::from_unlabeled(2992.0).unwrap();
        assert!(!b.hpa);
        assert!((b.value - 29.92).abs() < 1e-9);

        let b = Baro::from_unlabeled(29.92).unwrap();
        assert!(!b.hpa);

        let b = Baro::from_unlabeled(1013.0).unwrap();
        assert!(b.hpa);

        assert!(Baro::from_unlabeled(5000.0).is_err());
        assert!(Baro::from_unlabeled(100.0).is_err());
    }

    #[test]
    fn timestamp_ranges() {
        assert!(Timestamp::new(23, 59, 59).is_ok());
        assert!(Timestamp::new(24, 0, 0).is_err());
        assert!(Timestamp::new(0, 60, 0).is_err());
        assert_eq!(Timestamp::new(1, 2, 3).unwrap().to_string(), "010203");
    }
}
