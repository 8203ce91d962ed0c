//! The CPDLC position report (DM48 payload).

use serde::{Deserialize, Serialize};

use crate::types::{Altitude, CpdlcTime, Icing, Position, Speed, Turbulence, Wind};

/// A pilot position report.
///
/// Current position, its time, and the current altitude are mandatory;
/// every other field is optional. The original wire format encodes
/// absent fields as the `-` sentinel; the model uses `Option`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PositionReport {
    /// Present position. Required.
    pub cur_pos: Option<Position>,
    /// Time over the present position. Required.
    pub cur_pos_time: Option<CpdlcTime>,
    /// Present altitude. Required.
    pub cur_alt: Option<Altitude>,
    /// Next fix on the route.
    pub fix_next: Option<Position>,
    /// ETA at the next fix.
    pub fix_next_time: Option<CpdlcTime>,
    /// The fix after the next one.
    pub fix_next_p1: Option<Position>,
    /// ETA at destination.
    pub time_dest: Option<CpdlcTime>,
    /// Fuel endurance remaining, hours/minutes.
    pub rmng_fuel: Option<(u8, u8)>,
    /// Outside air temperature, °C.
    pub temp: Option<i16>,
    pub wind: Option<Wind>,
    pub turbulence: Option<Turbulence>,
    pub icing: Option<Icing>,
    /// True airspeed.
    pub speed: Option<Speed>,
    /// Ground speed.
    pub speed_gnd: Option<Speed>,
    /// Vertical speed, ft/min (negative when descending).
    pub vvi: Option<i32>,
    /// Ground track, degrees 1-360.
    pub track: Option<u16>,
    /// True heading, degrees 1-360.
    pub hdg_true: Option<u16>,
    /// Distance to go, NM.
    pub dist_nm: Option<f64>,
    /// Free-form remarks.
    pub remarks: Option<String>,
    /// Position of the reported (overflown) waypoint.
    pub rpt_wpt_pos: Option<Position>,
    /// Time over the reported waypoint.
    pub rpt_wpt_time: Option<CpdlcTime>,
    /// Altitude over the reported waypoint.
    pub rpt_wpt_alt: Option<Altitude>,
}

impl PositionReport {
    /// A report with just the three required fields filled in.
    pub fn basic(pos: Position, time: CpdlcTime, alt: Altitude) -> Self {
        Self {
            cur_pos: Some(pos),
            cur_pos_time: Some(time),
            cur_alt: Some(alt),
            ..Self::default()
        }
    }

    /// Whether the three mandatory fields are present.
    pub fn is_complete(&self) -> bool {
        self.cur_pos.is_some() && self.cur_pos_time.is_some() && self.cur_alt.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_report_is_complete() {
        let rep = PositionReport::basic(
            Position::Fix("OKG".into()),
            CpdlcTime::utc(12, 30).unwrap(),
            Altitude::flight_level(350).unwrap(),
        );
        assert!(rep.is_complete());
        assert!(rep.fix_next.is_none());
    }

    #[test]
    fn default_report_is_incomplete() {
        assert!(!PositionReport::default().is_complete());
    }
}
