//! Route clearances: the waypoint list plus the additional-info bundle.

use serde::{Deserialize, Serialize};

use crate::types::{
    Altitude, CpdlcTime, Direction, LatLon, LegType, PlaceBearing, PlaceBearingDistance,
    Position, Procedure, Speed,
};

/// Maximum number of waypoint entries in one route.
pub const ROUTE_MAX_WAYPOINTS: usize = 128;

/// One waypoint-list entry; the shapes the protocol distinguishes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum RouteEntry {
    /// A published database identifier with optional coordinates.
    PubIdent {
        fix: String,
        lat_lon: Option<LatLon>,
    },
    /// Raw coordinates.
    LatLon(LatLon),
    /// Place-bearing / place-bearing intersection.
    PlaceBearingPair(Box<(PlaceBearing, PlaceBearing)>),
    /// Place/bearing/distance.
    Pbd(PlaceBearingDistance),
    /// An airway designator.
    Airway(String),
    /// A prescribed track: name plus its defining coordinates.
    TrackDetail {
        name: String,
        points: Vec<LatLon>,
    },
    /// Unclassified input, carried verbatim (fix name or airway).
    Unknown(String),
}

/// Altitude-constraint tolerance on a route waypoint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AltToler {
    At,
    AtOrAbove,
    AtOrBelow,
}

/// An altitude constraint: a tolerance and the altitude itself.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AltConstraint {
    pub toler: AltToler,
    pub alt: Altitude,
}

/// An along-track waypoint with optional speed and altitude constraints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AlongTrackWpt {
    pub pos: Position,
    pub dist_nm: f64,
    pub speed: Option<Speed>,
    /// Zero, one, or two (window) constraints.
    pub alt: Vec<AltConstraint>,
}

/// Lat/lon reporting-point policy: report at each crossing of a given
/// latitude or longitude, optionally at a fixed degree increment.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ReportingPoints {
    /// Report on latitude crossings rather than longitude.
    pub lat: bool,
    pub degrees: f64,
    /// Degree increment between reports; `None` = single crossing.
    pub increment: Option<u16>,
}

/// Where an interception course starts from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum InterceptFrom {
    PubIdent { fix: String, lat_lon: Option<LatLon> },
    LatLon(LatLon),
    PlaceBearingPair(Box<(PlaceBearing, PlaceBearing)>),
    Pbd(PlaceBearingDistance),
}

/// An intercept-course-from instruction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InterceptCourse {
    pub from: InterceptFrom,
    /// Course to intercept, degrees 1-360.
    pub degrees: u16,
}

/// A hold-at-waypoint instruction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HoldAtWpt {
    pub pos: Position,
    pub spd_low: Option<Speed>,
    pub alt: Option<AltConstraint>,
    pub spd_high: Option<Speed>,
    pub dir: Option<Direction>,
    /// Inbound course, degrees.
    pub degrees: Option<u16>,
    /// Expect-further-clearance time.
    pub efc: Option<CpdlcTime>,
    pub leg: Option<LegType>,
}

/// A speed/altitude constraint attached to a waypoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WptSpeedAlt {
    pub pos: Position,
    pub speed: Option<Speed>,
    /// Zero, one, or two (window) constraints.
    pub alt: Vec<AltConstraint>,
}

/// Tolerance on a required time of arrival.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeToler {
    At,
    AtOrAfter,
    AtOrBefore,
}

/// A required time of arrival at a position.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Rta {
    pub pos: Position,
    pub time: CpdlcTime,
    pub toler: TimeToler,
}

/// The additional-info bundle attached to a route clearance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RouteAddInfo {
    /// Up to 8.
    pub along_track: Vec<AlongTrackWpt>,
    pub reporting_points: Option<ReportingPoints>,
    /// Up to 4.
    pub intercept_from: Vec<InterceptCourse>,
    /// Up to 4.
    pub hold_at: Vec<HoldAtWpt>,
    /// Up to 32.
    pub wpt_speed_alt: Vec<WptSpeedAlt>,
    /// Up to 32.
    pub rta: Vec<Rta>,
}

impl RouteAddInfo {
    /// Whether the bundle carries any information at all.
    pub fn is_empty(&self) -> bool {
        self.along_track.is_empty()
            && self.reporting_points.is_none()
            && self.intercept_from.is_empty()
            && self.hold_at.is_empty()
            && self.wpt_speed_alt.is_empty()
            && self.rta.is_empty()
    }
}

/// A full route clearance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Route {
    pub orig_icao: Option<String>,
    pub dest_icao: Option<String>,
    pub orig_rwy: Option<String>,
    pub dest_rwy: Option<String>,
    pub sid: Option<Procedure>,
    pub star: Option<Procedure>,
    pub appch: Option<Procedure>,
    /// Airway to intercept after departure.
    pub awy_intc: Option<String>,
    /// Ordered waypoint entries, at most [`ROUTE_MAX_WAYPOINTS`].
    pub entries: Vec<RouteEntry>,
    pub add_info: RouteAddInfo,
}

impl Route {
    /// An empty route reads as "DIRECT".
    pub fn is_direct(&self) -> bool {
        self.sid.is_none() && self.star.is_none() && self.appch.is_none() && self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_route_is_direct() {
        assert!(Route::default().is_direct());
    }

    #[test]
    fn route_with_fix_is_not_direct() {
        let mut route = Route::default();
        route.entries.push(RouteEntry::Unknown("OKG".into()));
        assert!(!route.is_direct());
    }

    #[test]
    fn add_info_emptiness() {
        let mut info = RouteAddInfo::default();
        assert!(info.is_empty());
        info.rta.push(Rta {
            pos: Position::Fix("OKG".into()),
            time: CpdlcTime::utc(10, 30).unwrap(),
            toler: TimeToler::AtOrBefore,
        });
        assert!(!info.is_empty());
    }
}
