//! Typed message arguments.
//!
//! A catalog entry names the [`ArgKind`]s it expects; a segment carries
//! matching [`Arg`] values. The two enums are kept in lock-step via
//! [`Arg::kind`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pdc::DepartureClearance;
use crate::posreport::PositionReport;
use crate::route::Route;
use crate::types::{
    Altitude, Baro, CpdlcTime, Degrees, Direction, IcaoName, LegType, Position, Procedure,
    Speed, Tp4Label,
};

/// The kind of argument a catalog entry's template placeholder expects.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Altitude,
    Speed,
    Time,
    TimeDur,
    Position,
    Direction,
    Distance,
    DistanceOffset,
    Vvi,
    ToFrom,
    Route,
    Procedure,
    Squawk,
    IcaoId,
    IcaoName,
    Frequency,
    Degrees,
    Baro,
    Freetext,
    Persons,
    PosReport,
    Pdc,
    Tp4Table,
    ErrInfo,
    Version,
    AtisCode,
    LegType,
}

/// A concrete argument value filling one template placeholder.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum Arg {
    Altitude(Altitude),
    Speed(Speed),
    Time(CpdlcTime),
    /// A duration in minutes.
    TimeDur(u16),
    Position(Position),
    Direction(Direction),
    /// Nautical miles.
    Distance(f64),
    /// Nautical miles, lateral offset.
    DistanceOffset(f64),
    /// Feet per minute.
    Vvi(i32),
    /// `true` = TO, `false` = FROM.
    ToFrom(bool),
    Route(Box<Route>),
    Procedure(Procedure),
    /// Octal transponder code, `0o0000..=0o7777`.
    Squawk(u16),
    IcaoId(String),
    IcaoName(IcaoName),
    /// MHz.
    Frequency(f64),
    Degrees(Degrees),
    Baro(Baro),
    Freetext(String),
    /// Persons on board.
    Persons(u32),
    PosReport(Box<PositionReport>),
    Pdc(Box<DepartureClearance>),
    Tp4Table(Tp4Label),
    /// Error description carried by UM159 / DM62.
    ErrInfo(String),
    /// Protocol version number (DM73).
    Version(u32),
    /// ATIS information code.
    AtisCode(String),
    /// Holding leg length.
    LegType(LegType),
}

impl Arg {
    /// The [`ArgKind`] discriminant for this value.
    pub fn kind(&self) -> ArgKind {
        match self {
            Arg::Altitude(_) => ArgKind::Altitude,
            Arg::Speed(_) => ArgKind::Speed,
            Arg::Time(_) => ArgKind::Time,
            Arg::TimeDur(_) => ArgKind::TimeDur,
            Arg::Position(_) => ArgKind::Position,
            Arg::Direction(_) => ArgKind::Direction,
            Arg::Distance(_) => ArgKind::Distance,
            Arg::DistanceOffset(_) => ArgKind::DistanceOffset,
            Arg::Vvi(_) => ArgKind::Vvi,
            Arg::ToFrom(_) => ArgKind::ToFrom,
            Arg::Route(_) => ArgKind::Route,
            Arg::Procedure(_) => ArgKind::Procedure,
            Arg::Squawk(_) => ArgKind::Squawk,
            Arg::IcaoId(_) => ArgKind::IcaoId,
            Arg::IcaoName(_) => ArgKind::IcaoName,
            Arg::Frequency(_) => ArgKind::Frequency,
            Arg::Degrees(_) => ArgKind::Degrees,
            Arg::Baro(_) => ArgKind::Baro,
            Arg::Freetext(_) => ArgKind::Freetext,
            Arg::Persons(_) => ArgKind::Persons,
            Arg::PosReport(_) => ArgKind::PosReport,
            Arg::Pdc(_) => ArgKind::Pdc,
            Arg::Tp4Table(_) => ArgKind::Tp4Table,
            Arg::ErrInfo(_) => ArgKind::ErrInfo,
            Arg::Version(_) => ArgKind::Version,
            Arg::AtisCode(_) => ArgKind::AtisCode,
            Arg::LegType(_) => ArgKind::LegType,
        }
    }
}

impl fmt::Display for Arg {
    /// Human-readable rendering, used when substituting catalog template
    /// placeholders for UI display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Altitude(v) => write!(f, "{v}"),
            Arg::Speed(v) => write!(f, "{v}"),
            Arg::Time(v) => write!(f, "{v}"),
            Arg::TimeDur(mins) => {
                if mins % 60 == 0 && *mins >= 60 {
                    write!(f, "{} HOURS", mins / 60)
                } else {
                    write!(f, "{mins} MINUTES")
                }
            }
            Arg::Position(v) => write!(f, "{v}"),
            Arg::Direction(v) => write!(f, "{v}"),
            Arg::Distance(nm) | Arg::DistanceOffset(nm) => {
                if (nm - nm.trunc()).abs() < 0.01 {
                    write!(f, "{nm:.0} NM")
                } else {
                    write!(f, "{nm:.1} NM")
                }
            }
            Arg::Vvi(v) => write!(f, "{v} FPM"),
            Arg::ToFrom(to) => f.write_str(if *to { "TO" } else { "FROM" }),
            Arg::Route(route) => {
                if route.is_direct() {
                    f.write_str("DIRECT")
                } else {
                    f.write_str("ROUTE CLEARANCE")
                }
            }
            Arg::Procedure(v) => write!(f, "{v}"),
            Arg::Squawk(v) => write!(f, "{v:04o}"),
            Arg::IcaoId(v) | Arg::Freetext(v) | Arg::ErrInfo(v) | Arg::AtisCode(v) => {
                f.write_str(v)
            }
            Arg::IcaoName(v) => write!(f, "{v}"),
            Arg::Frequency(mhz) => {
                // HF frequencies carry an extra digit of precision.
                if *mhz <= 28.0 {
                    write!(f, "{mhz:.4} MHZ")
                } else {
                    write!(f, "{mhz:.3} MHZ")
                }
            }
            Arg::Degrees(v) => write!(f, "{v}"),
            Arg::Baro(v) => write!(f, "{v}"),
            Arg::Persons(v) => write!(f, "{v}"),
            Arg::PosReport(_) => f.write_str("POSITION REPORT"),
            Arg::Pdc(pdc) => write!(f, "PDC {}", pdc.acf_id),
            Arg::Tp4Table(l) => f.write_str(match l {
                Tp4Label::A => "LABEL A",
                Tp4Label::B => "LABEL B",
            }),
            Arg::Version(v) => write!(f, "{v}"),
            Arg::LegType(l) => match l {
                LegType::Distance(nm) => write!(f, "{nm:.1} NM LEGS"),
                LegType::Time(min) => write!(f, "{min:.1} MIN LEGS"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_discriminants_match() {
        assert_eq!(
            Arg::Altitude(Altitude::flight_level(350).unwrap()).kind(),
            ArgKind::Altitude
        );
        assert_eq!(Arg::Freetext("HELLO".into()).kind(), ArgKind::Freetext);
        assert_eq!(Arg::Squawk(0o7421).kind(), ArgKind::Squawk);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Arg::Squawk(0o7421).to_string(), "7421");
        assert_eq!(Arg::Distance(25.0).to_string(), "25 NM");
        assert_eq!(Arg::Distance(2.5).to_string(), "2.5 NM");
        assert_eq!(Arg::TimeDur(90).to_string(), "90 MINUTES");
        assert_eq!(Arg::TimeDur(120).to_string(), "2 HOURS");
        assert_eq!(Arg::Frequency(128.35).to_string(), "128.350 MHZ");
        assert_eq!(Arg::Frequency(8.855).to_string(), "8.8550 MHZ");
    }
}
