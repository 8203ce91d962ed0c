//! The static CPDLC message catalog.
//!
//! Every standardized uplink (UM) and downlink (DM) message type is
//! described by one [`CatalogEntry`]: its display template, argument
//! kinds, expected response class, answer timeout, and (for entries
//! expecting an operational response) the message types that close the
//! dialogue. The tables are data, not code — both wire codecs and the
//! dialogue layer drive themselves off these rows, so adding a message
//! type means adding a row here and nothing else.
//!
//! DM67 is the only type with sub-variants (`b`-`i`); everywhere else
//! `subtype` is 0.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arg::{Arg, ArgKind};

// ---------------------------------------------------------------------------
// MessageDirection
// ---------------------------------------------------------------------------

/// Whether a message element travels ground→air (uplink) or air→ground
/// (downlink).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageDirection {
    /// ATC → aircraft (UM).
    Uplink,
    /// Aircraft → ATC (DM).
    Downlink,
}

impl fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageDirection::Uplink => write!(f, "UM"),
            MessageDirection::Downlink => write!(f, "DM"),
        }
    }
}

// ---------------------------------------------------------------------------
// ResponseClass
// ---------------------------------------------------------------------------

/// What kind of reply an element expects; dictates dialogue closure.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseClass {
    /// Wilco / Unable required.
    Wu,
    /// Affirm / Negative required.
    An,
    /// Roger required.
    R,
    /// Operational response: one of the entry's `responses` closes it.
    Ne,
    /// Response required (free-text style).
    Y,
    /// No response required.
    N,
}

impl ResponseClass {
    /// Short class token, as the catalog documentation spells them.
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseClass::Wu => "WU",
            ResponseClass::An => "AN",
            ResponseClass::R => "R",
            ResponseClass::Ne => "NE",
            ResponseClass::Y => "Y",
            ResponseClass::N => "N",
        }
    }
}

impl fmt::Display for ResponseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CatalogEntry
// ---------------------------------------------------------------------------

/// Static description of one standardized message type.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Uplink or downlink.
    pub direction: MessageDirection,
    /// The UM/DM number.
    pub type_num: u16,
    /// Sub-variant letter for DM67 (`b'b'`-`b'i'`), otherwise 0.
    pub subtype: u8,
    /// Human-readable template with `[altitude]`-style placeholders.
    pub template: &'static str,
    /// Expected argument kinds, in placeholder order (at most 5).
    pub args: &'static [ArgKind],
    /// Expected response class.
    pub response: ResponseClass,
    /// Answer timeout in seconds; `None` when no timeout applies.
    pub timeout_secs: Option<u16>,
    /// For [`ResponseClass::Ne`]: the `(type_num, subtype)` pairs of the
    /// opposite-direction messages that satisfy the expected response.
    pub responses: &'static [(u16, u8)],
}

/// Short answer timeout, seconds.
const SHORT: Option<u16> = Some(100);
/// Medium answer timeout, seconds.
const MED: Option<u16> = Some(200);
/// Long answer timeout, seconds.
const LONG: Option<u16> = Some(300);
/// No timeout tracking.
const NONE: Option<u16> = None;

/// Time-to-live of a broker-queued message: the longest catalog timeout
/// plus delivery margin.
pub const DEFERRED_TTL_SECS: u16 = 600;

impl CatalogEntry {
    /// The conventional identifier, e.g. `"UM20"`, `"DM67b"`.
    pub fn id(&self) -> String {
        if self.subtype == 0 {
            format!("{}{}", self.direction, self.type_num)
        } else {
            format!("{}{}{}", self.direction, self.type_num, self.subtype as char)
        }
    }

    /// Whether this entry is a downlink.
    pub fn is_downlink(&self) -> bool {
        self.direction == MessageDirection::Downlink
    }

    /// Render the template by filling `[...]` placeholders with the
    /// given arguments, positionally. Argument kinds have already been
    /// checked against `self.args` at segment construction, so no kind
    /// matching happens here; a placeholder with no argument left is
    /// kept verbatim so truncated input stays visible.
    pub fn render(&self, args: &[Arg]) -> String {
        let mut out = String::with_capacity(self.template.len() + 16);
        let mut fill = args.iter();
        let mut rest = self.template;
        while let Some(open) = rest.find('[') {
            let Some(len) = rest[open..].find(']') else {
                break;
            };
            out.push_str(&rest[..open]);
            match fill.next() {
                Some(arg) => out.push_str(&arg.to_string()),
                None => out.push_str(&rest[open..=open + len]),
            }
            rest = &rest[open + len + 1..];
        }
        out.push_str(rest);
        out
    }
}

const fn ul(
    type_num: u16,
    template: &'static str,
    args: &'static [ArgKind],
    response: ResponseClass,
    timeout_secs: Option<u16>,
    responses: &'static [(u16, u8)],
) -> CatalogEntry {
    CatalogEntry {
        direction: MessageDirection::Uplink,
        type_num,
        subtype: 0,
        template,
        args,
        response,
        timeout_secs,
        responses,
    }
}

const fn dl(
    type_num: u16,
    subtype: u8,
    template: &'static str,
    args: &'static [ArgKind],
    response: ResponseClass,
    timeout_secs: Option<u16>,
    responses: &'static [(u16, u8)],
) -> CatalogEntry {
    CatalogEntry {
        direction: MessageDirection::Downlink,
        type_num,
        subtype,
        template,
        args,
        response,
        timeout_secs,
        responses,
    }
}

use ArgKind as A;
use ResponseClass as R;

/// All standardized uplink message types.
pub static UPLINK_CATALOG: &[CatalogEntry] = &[
    ul(0, "UNABLE", &[], R::Ne, NONE, &[]),
    ul(1, "STANDBY", &[], R::Ne, NONE, &[]),
    ul(2, "REQUEST DEFERRED", &[], R::Ne, NONE, &[]),
    ul(3, "ROGER", &[], R::Ne, NONE, &[]),
    ul(4, "AFFIRM", &[], R::Ne, NONE, &[]),
    ul(5, "NEGATIVE", &[], R::Ne, NONE, &[]),
    ul(6, "EXPECT [altitude]", &[A::Altitude], R::R, LONG, &[]),
    ul(7, "EXPECT CLIMB AT [time]", &[A::Time], R::R, LONG, &[]),
    ul(8, "EXPECT CLIMB AT [position]", &[A::Position], R::R, LONG, &[]),
    ul(9, "EXPECT DESCENT AT [time]", &[A::Time], R::R, LONG, &[]),
    ul(10, "EXPECT DESCENT AT [position]", &[A::Position], R::R, LONG, &[]),
    ul(11, "EXPECT CRUISE CLIMB AT [time]", &[A::Time], R::R, LONG, &[]),
    ul(12, "EXPECT CRUISE CLIMB AT [position]", &[A::Position], R::R, LONG, &[]),
    ul(13, "AT [time] EXPECT CLIMB TO [altitude]", &[A::Time, A::Altitude], R::R, LONG, &[]),
    ul(14, "AT [position] EXPECT CLIMB TO [altitude]", &[A::Position, A::Altitude], R::R, LONG, &[]),
    ul(15, "AT [time] EXPECT DESCENT TO [altitude]", &[A::Time, A::Altitude], R::R, LONG, &[]),
    ul(16, "AT [position] EXPECT DESCENT TO [altitude]", &[A::Position, A::Altitude], R::R, LONG, &[]),
    ul(17, "AT [time] EXPECT CRUISE CLIMB TO [altitude]", &[A::Time, A::Altitude], R::R, LONG, &[]),
    ul(18, "AT [position] EXPECT CRUISE CLIMB TO [altitude]", &[A::Position, A::Altitude], R::R, LONG, &[]),
    ul(19, "MAINTAIN [altitude]", &[A::Altitude], R::Wu, SHORT, &[]),
    ul(20, "CLIMB TO AND MAINTAIN [altitude]", &[A::Altitude], R::Wu, SHORT, &[]),
    ul(21, "AT [time] CLIMB TO AND MAINTAIN [altitude]", &[A::Time, A::Altitude], R::Wu, MED, &[]),
    ul(22, "AT [position] CLIMB TO AND MAINTAIN [altitude]", &[A::Position, A::Altitude], R::Wu, MED, &[]),
    ul(23, "DESCEND TO AND MAINTAIN [altitude]", &[A::Altitude], R::Wu, SHORT, &[]),
    ul(24, "AT [time] DESCEND TO AND MAINTAIN [altitude]", &[A::Time, A::Altitude], R::Wu, MED, &[]),
    ul(25, "AT [position] DESCEND TO AND MAINTAIN [altitude]", &[A::Position, A::Altitude], R::Wu, MED, &[]),
    ul(26, "CLIMB TO REACH [altitude] BY [time]", &[A::Altitude, A::Time], R::Wu, SHORT, &[]),
    ul(27, "CLIMB TO REACH [altitude] BY [position]", &[A::Altitude, A::Position], R::Wu, SHORT, &[]),
    ul(28, "DESCEND TO REACH [altitude] BY [time]", &[A::Altitude, A::Time], R::Wu, SHORT, &[]),
    ul(29, "DESCEND TO REACH [altitude] BY [position]", &[A::Altitude, A::Position], R::Wu, SHORT, &[]),
    ul(30, "MAINTAIN BLOCK [altitude] TO [altitude]", &[A::Altitude, A::Altitude], R::Wu, SHORT, &[]),
    ul(31, "CLIMB TO AND MAINTAIN BLOCK [altitude] TO [altitude]", &[A::Altitude, A::Altitude], R::Wu, SHORT, &[]),
    ul(32, "DESCEND TO AND MAINTAIN BLOCK [altitude] TO [altitude]", &[A::Altitude, A::Altitude], R::Wu, SHORT, &[]),
    ul(33, "CRUISE [altitude]", &[A::Altitude], R::Wu, MED, &[]),
    ul(34, "CRUISE CLIMB TO [altitude]", &[A::Altitude], R::Wu, SHORT, &[]),
    ul(35, "CRUISE CLIMB ABOVE [altitude]", &[A::Altitude], R::Wu, SHORT, &[]),
    ul(36, "EXPEDITE CLIMB TO [altitude]", &[A::Altitude], R::Wu, SHORT, &[]),
    ul(37, "EXPEDITE DESCEND TO [altitude]", &[A::Altitude], R::Wu, SHORT, &[]),
    ul(38, "IMMEDIATELY CLIMB TO [altitude]", &[A::Altitude], R::Wu, SHORT, &[]),
    ul(39, "IMMEDIATELY DESCEND TO [altitude]", &[A::Altitude], R::Wu, SHORT, &[]),
    ul(40, "IMMEDIATELY STOP CLIMB AT [altitude]", &[A::Altitude], R::Wu, SHORT, &[]),
    ul(41, "IMMEDIATELY STOP DESCENT AT [altitude]", &[A::Altitude], R::Wu, SHORT, &[]),
    ul(42, "EXPECT TO CROSS [position] AT [altitude]", &[A::Position, A::Altitude], R::R, LONG, &[]),
    ul(43, "EXPECT TO CROSS [position] AT [altitude] OR ABOVE", &[A::Position, A::Altitude], R::R, LONG, &[]),
    ul(44, "EXPECT TO CROSS [position] AT [altitude] OR BELOW", &[A::Position, A::Altitude], R::R, LONG, &[]),
    ul(45, "EXPECT TO CROSS [position] AT AND MAINTAIN [altitude]", &[A::Position, A::Altitude], R::R, LONG, &[]),
    ul(46, "CROSS [position] AT [altitude]", &[A::Position, A::Altitude], R::Wu, SHORT, &[]),
    ul(47, "CROSS [position] AT OR ABOVE [altitude]", &[A::Position, A::Altitude], R::Wu, SHORT, &[]),
    ul(48, "CROSS [position] AT OR BELOW [altitude]", &[A::Position, A::Altitude], R::Wu, SHORT, &[]),
    ul(49, "CROSS [position] AT AND MAINTAIN [altitude]", &[A::Position, A::Altitude], R::Wu, SHORT, &[]),
    ul(50, "CROSS [position] BETWEEN [altitude] AND [altitude]", &[A::Position, A::Altitude, A::Altitude], R::Wu, SHORT, &[]),
    ul(51, "CROSS [position] AT [time]", &[A::Position, A::Time], R::Wu, SHORT, &[]),
    ul(52, "CROSS [position] AT OR BEFORE [time]", &[A::Position, A::Time], R::Wu, SHORT, &[]),
    ul(53, "CROSS [position] AT OR AFTER [time]", &[A::Position, A::Time], R::Wu, SHORT, &[]),
    ul(54, "CROSS [position] BETWEEN [time] AND [time]", &[A::Position, A::Time, A::Time], R::Wu, SHORT, &[]),
    ul(55, "CROSS [position] AT [speed]", &[A::Position, A::Speed], R::Wu, SHORT, &[]),
    ul(56, "CROSS [position] AT OR LESS THAN [speed]", &[A::Position, A::Speed], R::Wu, SHORT, &[]),
    ul(57, "CROSS [position] AT OR GREATER THAN [speed]", &[A::Position, A::Speed], R::Wu, SHORT, &[]),
    ul(58, "CROSS [position] AT [time] AT [altitude]", &[A::Position, A::Time, A::Altitude], R::Wu, SHORT, &[]),
    ul(59, "CROSS [position] AT OR BEFORE [time] AT [altitude]", &[A::Position, A::Time, A::Altitude], R::Wu, SHORT, &[]),
    ul(60, "CROSS [position] AT OR AFTER [time] AT [altitude]", &[A::Position, A::Time, A::Altitude], R::Wu, SHORT, &[]),
    ul(61, "CROSS [position] AT AND MAINTAIN [altitude] AT [speed]", &[A::Position, A::Altitude, A::Speed], R::Wu, SHORT, &[]),
    ul(62, "AT [time] CROSS [position] AT AND MAINTAIN [altitude]", &[A::Time, A::Position, A::Altitude], R::Wu, SHORT, &[]),
    ul(63, "AT [time] CROSS [position] AT AND MAINTAIN [altitude] ", &[A::Time, A::Position, A::Altitude, A::Speed], R::Wu, SHORT, &[]),
    ul(64, "OFFSET [distance offset] [direction] OF ROUTE", &[A::DistanceOffset, A::Direction], R::Wu, SHORT, &[]),
    ul(65, "AT [position] OFFSET [distance offset] [direction] OF ROUTE", &[A::Position, A::DistanceOffset, A::Direction], R::Wu, SHORT, &[]),
    ul(66, "AT [time] OFFSET [distance offset] [direction] OF ROUTE", &[A::Time, A::DistanceOffset, A::Direction], R::Wu, SHORT, &[]),
    ul(67, "PROCEED BACK ON ROUTE", &[], R::Wu, SHORT, &[]),
    ul(68, "REJOIN ROUTE BY [position]", &[A::Position], R::Wu, SHORT, &[]),
    ul(69, "REJOIN ROUTE BY [time]", &[A::Time], R::Wu, SHORT, &[]),
    ul(70, "EXPECT BACK ON ROUTE BY [position]", &[A::Position], R::R, MED, &[]),
    ul(71, "EXPECT BACK ON ROUTE BY [time]", &[A::Time], R::R, MED, &[]),
    ul(72, "RESUME OWN NAVIGATION", &[], R::Wu, SHORT, &[]),
    ul(73, "[predeparture clearance]", &[A::Pdc], R::Wu, LONG, &[]),
    ul(74, "PROCEED DIRECT TO [position]", &[A::Position], R::Wu, SHORT, &[]),
    ul(75, "WHEN ABLE PROCEED DIRECT TO [position]", &[A::Position], R::Wu, SHORT, &[]),
    ul(76, "AT [time] PROCEED DIRECT TO [position]", &[A::Time, A::Position], R::Wu, SHORT, &[]),
    ul(77, "AT [position] PROCEED DIRECT TO [position]", &[A::Position, A::Position], R::Wu, SHORT, &[]),
    ul(78, "AT [altitude] PROCEED DIRECT TO [position]", &[A::Altitude, A::Position], R::Wu, SHORT, &[]),
    ul(79, "CLEARED TO [position] VIA [route clearance]", &[A::Position, A::Route], R::Wu, MED, &[]),
    ul(80, "CLEARED [route clearance]", &[A::Route], R::Wu, MED, &[]),
    ul(81, "CLEARED [procedure name]", &[A::Procedure], R::Wu, SHORT, &[]),
    ul(82, "CLEARED TO DEVIATE UP TO [distance offset] [direction] ", &[A::DistanceOffset, A::Direction], R::Wu, SHORT, &[]),
    ul(83, "AT [position] CLEARED [route clearance]", &[A::Position, A::Route], R::Wu, SHORT, &[]),
    ul(84, "AT [position] CLEARED [procedure name]", &[A::Position, A::Procedure], R::Wu, SHORT, &[]),
    ul(85, "EXPECT [route clearance]", &[A::Route], R::R, LONG, &[]),
    ul(86, "AT [position] EXPECT [route clearance]", &[A::Position, A::Route], R::R, LONG, &[]),
    ul(87, "EXPECT DIRECT TO [position]", &[A::Position], R::Wu, LONG, &[]),
    ul(88, "AT [position] EXPECT DIRECT TO [position]", &[A::Position, A::Position], R::R, LONG, &[]),
    ul(89, "AT [time] EXPECT DIRECT TO [position]", &[A::Time, A::Position], R::R, LONG, &[]),
    ul(90, "AT [altitude] EXPECT DIRECT TO [position]", &[A::Altitude, A::Position], R::R, LONG, &[]),
    ul(92, "HOLD AT [position] AS PUBLISHED MAINTAIN [altitude]", &[A::Position, A::Altitude], R::Wu, SHORT, &[]),
    ul(93, "EXPECT FURTHER CLEARANCE AT [time]", &[A::Time], R::R, SHORT, &[]),
    ul(94, "TURN [direction] HEADING [degrees]", &[A::Direction, A::Degrees], R::Wu, SHORT, &[]),
    ul(95, "TURN [direction] GROUND TRACK [degrees]", &[A::Direction, A::Degrees], R::Wu, SHORT, &[]),
    ul(96, "FLY PRESENT HEADING", &[], R::Wu, SHORT, &[]),
    ul(97, "AT [position] FLY HEADING [degrees]", &[A::Position, A::Degrees], R::Wu, SHORT, &[]),
    ul(98, "IMMEDIATELY TURN [direction] HEADING [degrees]", &[A::Direction, A::Degrees], R::Wu, SHORT, &[]),
    ul(99, "EXPECT [procedure name]", &[A::Procedure], R::R, LONG, &[]),
    ul(100, "AT [time] EXPECT [speed]", &[A::Time, A::Speed], R::R, LONG, &[]),
    ul(101, "AT [position] EXPECT [speed]", &[A::Position, A::Speed], R::R, LONG, &[]),
    ul(102, "AT [altitude] EXPECT [speed]", &[A::Altitude, A::Speed], R::R, LONG, &[]),
    ul(103, "AT [time] EXPECT [speed] TO [speed]", &[A::Time, A::Speed, A::Speed], R::R, LONG, &[]),
    ul(104, "AT [position] EXPECT [speed] TO [speed]", &[A::Position, A::Speed, A::Speed], R::R, LONG, &[]),
    ul(105, "AT [altitude] EXPECT [speed] TO [speed]", &[A::Altitude, A::Speed, A::Speed], R::R, LONG, &[]),
    ul(106, "MAINTAIN [speed]", &[A::Speed], R::Wu, SHORT, &[]),
    ul(107, "MAINTAIN PRESENT SPEED", &[], R::Wu, SHORT, &[]),
    ul(108, "MAINTAIN [speed] OR GREATER", &[A::Speed], R::Wu, SHORT, &[]),
    ul(109, "MAINTAIN [speed] OR LESS", &[A::Speed], R::Wu, SHORT, &[]),
    ul(110, "MAINTAIN [speed] TO [speed]", &[A::Speed, A::Speed], R::Wu, SHORT, &[]),
    ul(111, "INCREASE SPEED TO [speed]", &[A::Speed], R::Wu, SHORT, &[]),
    ul(112, "INCREASE SPEED TO [speed] OR GREATER", &[A::Speed], R::Wu, SHORT, &[]),
    ul(113, "REDUCE SPEED TO [speed]", &[A::Speed], R::Wu, SHORT, &[]),
    ul(114, "REDUCE SPEED TO [speed] OR LESS", &[A::Speed], R::Wu, SHORT, &[]),
    ul(115, "DO NOT EXCEED [speed]", &[A::Speed], R::Wu, SHORT, &[]),
    ul(116, "RESUME NORMAL SPEED", &[], R::Wu, SHORT, &[]),
    ul(117, "CONTACT [icaounitname] [frequency]", &[A::IcaoName, A::Frequency], R::Wu, SHORT, &[]),
    ul(118, "AT [position] CONTACT [icaounitname] [frequency]", &[A::Position, A::IcaoName, A::Frequency], R::Wu, SHORT, &[]),
    ul(119, "AT [time] CONTACT [icaounitname] [frequency]", &[A::Time, A::IcaoName, A::Frequency], R::Wu, SHORT, &[]),
    ul(120, "MONITOR [icaounitname] [frequency]", &[A::IcaoName, A::Frequency], R::Wu, SHORT, &[]),
    ul(121, "AT [position] MONITOR [icaounitname] [frequency]", &[A::Position, A::IcaoName, A::Frequency], R::Wu, SHORT, &[]),
    ul(122, "AT [time] CONTACT [icaounitname] [frequency]", &[A::Time, A::IcaoName, A::Frequency], R::Wu, SHORT, &[]),
    ul(123, "SQUAWK [beacon code]", &[A::Squawk], R::Wu, SHORT, &[]),
    ul(124, "STOP SQUAWK", &[], R::Wu, SHORT, &[]),
    ul(125, "SQUAWK ALTITUDE", &[], R::Wu, SHORT, &[]),
    ul(126, "STOP ALTITUDE SQUAWK", &[], R::Wu, SHORT, &[]),
    ul(127, "REPORT BACK ON ROUTE", &[], R::R, SHORT, &[]),
    ul(128, "REPORT LEAVING [altitude]", &[A::Altitude], R::R, SHORT, &[]),
    ul(129, "REPORT LEVEL [altitude]", &[A::Altitude], R::R, SHORT, &[]),
    ul(130, "REPORT PASSING [position]", &[A::Position], R::R, SHORT, &[]),
    ul(131, "REPORT REMAINING FUEL AND SOULS ON BOARD", &[], R::Ne, SHORT, &[(68, 0)]),
    ul(132, "CONFIRM POSITION", &[], R::Ne, SHORT, &[(33, 0)]),
    ul(133, "CONFIRM ALTITUDE", &[], R::Ne, SHORT, &[(32, 0)]),
    ul(134, "CONFIRM SPEED", &[], R::Ne, SHORT, &[(34, 0)]),
    ul(135, "CONFIRM ASSIGNED ALTITUDE", &[], R::Ne, SHORT, &[(38, 0)]),
    ul(136, "CONFIRM ASSIGNED SPEED", &[], R::Ne, SHORT, &[(39, 0)]),
    ul(137, "CONFIRM ASSIGNED ROUTE", &[], R::Ne, SHORT, &[(40, 0)]),
    ul(138, "CONFIRM TIME OVER REPORTED WAYPOINT", &[], R::Ne, SHORT, &[]),
    ul(139, "CONFIRM REPORTED WAYPOINT", &[], R::Ne, SHORT, &[]),
    ul(140, "CONFIRM NEXT WAYPOINT", &[], R::Ne, SHORT, &[(42, 0)]),
    ul(141, "CONFIRM NEXT WAYPOINT ETA", &[], R::Ne, SHORT, &[(43, 0)]),
    ul(142, "CONFIRM ENSUING WAYPOINT", &[], R::Ne, SHORT, &[(44, 0)]),
    ul(143, "CONFIRM REQUEST", &[], R::Ne, SHORT, &[]),
    ul(144, "CONFIRM SQUAWK", &[], R::Ne, SHORT, &[(47, 0)]),
    ul(145, "CONFIRM HEADING", &[], R::Ne, SHORT, &[(35, 0)]),
    ul(146, "CONFIRM GROUND TRACK", &[], R::Ne, SHORT, &[(36, 0)]),
    ul(147, "REQUEST POSITION REPORT", &[], R::Ne, MED, &[(48, 0)]),
    ul(148, "WHEN CAN YOU ACCEPT [altitude]", &[A::Altitude], R::Ne, SHORT, &[(67, b'b'), (67, b'e')]),
    ul(149, "CAN YOU ACCEPT [altitude] AT [position]", &[A::Altitude, A::Position], R::An, SHORT, &[]),
    ul(150, "CAN YOU ACCEPT [altitude] AT [time]", &[A::Altitude, A::Time], R::An, SHORT, &[]),
    ul(151, "WHEN CAN YOU ACCEPT [speed]", &[A::Speed], R::Ne, SHORT, &[(67, b'c'), (67, b'f')]),
    ul(152, "WHEN CAN YOU ACCEPT [distance offset] [direction] OFFSET", &[A::DistanceOffset, A::Direction], R::Ne, SHORT, &[(67, b'd'), (67, b'g')]),
    ul(153, "ALTIMETER [altimeter]", &[A::Baro], R::R, SHORT, &[]),
    ul(154, "RADAR SERVICES TERMINATED", &[], R::R, SHORT, &[]),
    ul(155, "RADAR CONTACT [position]", &[A::Position], R::R, MED, &[]),
    ul(156, "RADAR CONTACT LOST", &[], R::R, SHORT, &[]),
    ul(157, "CHECK STUCK MICROPHONE [frequency]", &[A::Frequency], R::R, MED, &[]),
    ul(158, "ATIS [atis code]", &[A::AtisCode], R::R, MED, &[]),
    ul(159, "ERROR [error information]", &[A::ErrInfo], R::Ne, NONE, &[]),
    ul(160, "NEXT DATA AUTHORITY [facility designation]", &[A::IcaoId], R::Ne, NONE, &[]),
    ul(161, "END SERVICE", &[], R::Ne, NONE, &[]),
    ul(162, "SERVICE UNAVAILABLE", &[], R::Ne, NONE, &[]),
    ul(163, "[icao facility designation] [tp4Table]", &[A::IcaoId, A::Tp4Table], R::Ne, NONE, &[]),
    ul(164, "WHEN READY", &[], R::Ne, NONE, &[]),
    ul(165, "THEN", &[], R::Ne, NONE, &[]),
    ul(166, "DUE TO TRAFFIC", &[], R::Ne, NONE, &[]),
    ul(167, "DUE TO AIRSPACE RESTRICTION", &[], R::Ne, NONE, &[]),
    ul(168, "DISREGARD", &[], R::R, NONE, &[]),
    ul(169, "[freetext]", &[A::Freetext], R::R, MED, &[]),
    ul(170, "[freetext]", &[A::Freetext], R::R, SHORT, &[]),
    ul(171, "CLIMB AT [vertical rate] MINIMUM", &[A::Vvi], R::Wu, SHORT, &[]),
    ul(172, "CLIMB AT [vertical rate] MAXIMUM", &[A::Vvi], R::Wu, SHORT, &[]),
    ul(173, "DESCEND AT [vertical rate] MINIMUM", &[A::Vvi], R::Wu, SHORT, &[]),
    ul(174, "DESCEND AT [vertical rate] MAXIMUM", &[A::Vvi], R::Wu, SHORT, &[]),
    ul(175, "REPORT REACHING [altitude]", &[A::Altitude], R::R, SHORT, &[]),
    ul(176, "MAINTAIN OWN SEPARATION AND VMC", &[], R::Wu, SHORT, &[]),
    ul(177, "AT PILOTS DISCRETION", &[], R::R, SHORT, &[]),
    ul(179, "SQUAWK IDENT", &[], R::Wu, SHORT, &[]),
    ul(180, "REPORT REACHING BLOCK [altitude] TO [altitude]", &[A::Altitude, A::Altitude], R::R, SHORT, &[]),
    ul(181, "REPORT DISTANCE [to/from] [position]", &[A::ToFrom, A::Position], R::Ne, SHORT, &[(78, 0)]),
    ul(182, "CONFIRM ATIS CODE", &[], R::Ne, SHORT, &[(79, 0)]),
    ul(183, "[freetext]", &[A::Freetext], R::N, MED, &[]),
    ul(187, "[freetext]", &[A::Freetext], R::N, LONG, &[]),
    ul(194, "[freetext]", &[A::Freetext], R::Y, MED, &[]),
    ul(195, "[freetext]", &[A::Freetext], R::R, LONG, &[]),
    ul(196, "[freetext]", &[A::Freetext], R::Wu, MED, &[]),
    ul(197, "[freetext]", &[A::Freetext], R::Wu, SHORT, &[]),
    ul(198, "[freetext]", &[A::Freetext], R::Wu, SHORT, &[]),
    ul(199, "[freetext]", &[A::Freetext], R::N, MED, &[]),
    ul(201, "[freetext]", &[A::Freetext], R::N, LONG, &[]),
    ul(202, "[freetext]", &[A::Freetext], R::N, LONG, &[]),
    ul(203, "[freetext]", &[A::Freetext], R::R, MED, &[]),
    ul(204, "[freetext]", &[A::Freetext], R::Y, MED, &[]),
    ul(205, "[freetext]", &[A::Freetext], R::An, MED, &[]),
    ul(206, "[freetext]", &[A::Freetext], R::Y, LONG, &[]),
    ul(207, "[freetext]", &[A::Freetext], R::Y, LONG, &[]),
    ul(208, "[freetext]", &[A::Freetext], R::N, LONG, &[]),
];

/// All standardized downlink message types.
pub static DOWNLINK_CATALOG: &[CatalogEntry] = &[
    dl(0, 0, "WILCO", &[], R::N, NONE, &[]),
    dl(1, 0, "UNABLE", &[], R::N, NONE, &[]),
    dl(2, 0, "STANDBY", &[], R::N, NONE, &[]),
    dl(3, 0, "ROGER", &[], R::N, NONE, &[]),
    dl(4, 0, "AFFIRM", &[], R::N, NONE, &[]),
    dl(5, 0, "NEGATIVE", &[], R::N, NONE, &[]),
    dl(6, 0, "REQUEST [altitude]", &[A::Altitude], R::Y, NONE, &[(19, 0)]),
    dl(7, 0, "REQUEST BLOCK [altitude] TO [altitude]", &[A::Altitude, A::Altitude], R::Y, NONE, &[(30, 0)]),
    dl(8, 0, "REQUEST CRUISE CLIMB TO [altitude]", &[A::Altitude], R::Y, NONE, &[(34, 0)]),
    dl(9, 0, "REQUEST CLIMB TO [altitude]", &[A::Altitude], R::Y, NONE, &[(20, 0)]),
    dl(10, 0, "REQUEST DESCENT TO [altitude]", &[A::Altitude], R::Y, NONE, &[(23, 0)]),
    dl(11, 0, "AT [position] REQUEST CLIMB TO [altitude]", &[A::Position, A::Altitude], R::Y, NONE, &[(22, 0)]),
    dl(12, 0, "AT [position] REQUEST DESCENT TO [altitude]", &[A::Position, A::Altitude], R::Y, NONE, &[(25, 0)]),
    dl(13, 0, "AT [time] REQUEST CLIMB TO [altitude]", &[A::Time, A::Altitude], R::Y, NONE, &[(21, 0)]),
    dl(14, 0, "AT [time] REQUEST DESCENT TO [altitude]", &[A::Time, A::Altitude], R::Y, NONE, &[(24, 0)]),
    dl(15, 0, "REQUEST OFFSET [distance offset] [direction] OF ROUTE", &[A::DistanceOffset, A::Direction], R::Y, NONE, &[(64, 0)]),
    dl(16, 0, "AT [position] REQUEST OFFSET [distance offset] ", &[A::Position, A::DistanceOffset, A::Direction], R::Y, NONE, &[(65, 0)]),
    dl(17, 0, "AT [time] REQUEST OFFSET [distance offset] ", &[A::Time, A::DistanceOffset, A::Direction], R::Y, NONE, &[(66, 0)]),
    dl(18, 0, "REQUEST [speed]", &[A::Speed], R::Y, NONE, &[(106, 0)]),
    dl(19, 0, "REQUEST [speed] TO [speed]", &[A::Speed, A::Speed], R::Y, NONE, &[(110, 0)]),
    dl(20, 0, "REQUEST VOICE CONTACT", &[], R::Y, NONE, &[(117, 0)]),
    dl(21, 0, "REQUEST VOICE CONTACT ON [frequency]", &[A::Frequency], R::Y, NONE, &[(117, 0)]),
    dl(22, 0, "REQUEST DIRECT TO [position]", &[A::Position], R::Y, NONE, &[(74, 0)]),
    dl(23, 0, "REQUEST [procedure name]", &[A::Procedure], R::Y, NONE, &[(81, 0)]),
    dl(24, 0, "REQUEST [route clearance]", &[A::Route], R::Y, NONE, &[(80, 0)]),
    dl(25, 0, "REQUEST CLEARANCE", &[], R::Y, NONE, &[(73, 0)]),
    dl(26, 0, "REQUEST WEATHER DEVIATION TO [position] VIA [route clearance]", &[A::Position, A::Route], R::Y, NONE, &[(79, 0)]),
    dl(27, 0, "REQUEST WEATHER DEVIATION UP TO [distance offset] ", &[A::DistanceOffset, A::Direction], R::Y, NONE, &[(82, 0)]),
    dl(28, 0, "LEAVING [altitude]", &[A::Altitude], R::N, NONE, &[]),
    dl(29, 0, "CLIMBING TO [altitude]", &[A::Altitude], R::N, NONE, &[]),
    dl(30, 0, "DESCENDING TO [altitude]", &[A::Altitude], R::N, NONE, &[]),
    dl(31, 0, "PASSING [position]", &[A::Position], R::N, NONE, &[]),
    dl(32, 0, "PASSING [position]", &[A::Altitude], R::N, NONE, &[]),
    dl(33, 0, "PRESENT POSITION [position]", &[A::Position], R::N, NONE, &[]),
    dl(34, 0, "PRESENT SPEED [speed]", &[A::Speed], R::N, NONE, &[]),
    dl(35, 0, "PRESENT HEADING [degrees]", &[A::Degrees], R::N, NONE, &[]),
    dl(36, 0, "PRESENT GROUND TRACK [degrees]", &[A::Degrees], R::N, NONE, &[]),
    dl(37, 0, "LEVEL [altitude]", &[A::Altitude], R::N, NONE, &[]),
    dl(38, 0, "ASSIGNED ALTITUDE [altitude]", &[A::Altitude], R::N, NONE, &[]),
    dl(39, 0, "ASSIGNED SPEED [speed]", &[A::Speed], R::N, NONE, &[]),
    dl(40, 0, "ASSIGNED ROUTE [route]", &[A::Route], R::N, NONE, &[]),
    dl(41, 0, "BACK ON ROUTE", &[], R::N, NONE, &[]),
    dl(42, 0, "NEXT WAYPOINT [position]", &[A::Position], R::N, NONE, &[]),
    dl(43, 0, "NEXT WAYPOINT [time]", &[A::Time], R::N, NONE, &[]),
    dl(44, 0, "ENSUING WAYPOINT [position]", &[A::Position], R::N, NONE, &[]),
    dl(45, 0, "REPORTED WAYPOINT [position]", &[A::Position], R::N, NONE, &[]),
    dl(46, 0, "REPORTED WAYPOINT [time]", &[A::Time], R::N, NONE, &[]),
    dl(47, 0, "SQUAWKING [beacon code]", &[A::Squawk], R::N, NONE, &[]),
    dl(48, 0, "POSITION REPORT [posreport]", &[A::PosReport], R::N, NONE, &[]),
    dl(49, 0, "WHEN CAN WE EXPECT [speed]", &[A::Speed], R::Y, NONE, &[(100, 0), (101, 0), (102, 0)]),
    dl(50, 0, "WHEN CAN WE EXPECT [speed] TO [speed]", &[A::Speed, A::Speed], R::Y, NONE, &[(103, 0), (104, 0), (105, 0)]),
    dl(51, 0, "WHEN CAN WE EXPECT BACK ON ROUTE", &[], R::Y, NONE, &[(70, 0), (71, 0), (67, 0)]),
    dl(52, 0, "WHEN CAN WE EXPECT LOWER ALTITUDE", &[], R::Y, NONE, &[(9, 0), (10, 0), (23, 0)]),
    dl(53, 0, "WHEN CAN WE EXPECT HIGHER ALTITUDE", &[], R::Y, NONE, &[(7, 0), (8, 0), (20, 0)]),
    dl(54, 0, "WHEN CAN WE EXPECT CRUISE CLIMB TO [altitude]", &[A::Altitude], R::Y, NONE, &[(17, 0), (18, 0), (34, 0)]),
    dl(55, 0, "PAN PAN PAN", &[], R::N, NONE, &[]),
    dl(56, 0, "MAYDAY MAYDAY MAYDAY", &[], R::N, NONE, &[]),
    dl(57, 0, "[fuel] OF FUEL REMAINING AND [persons] PERSONS ON BOARD", &[A::TimeDur, A::Persons], R::N, NONE, &[]),
    dl(58, 0, "CANCEL EMERGENCY", &[], R::N, NONE, &[]),
    dl(59, 0, "DIVERTING TO [pos] VIA [route]", &[A::Position, A::Route], R::N, NONE, &[]),
    dl(60, 0, "OFFSETTING [distance offset] [direction] OF ROUTE", &[A::DistanceOffset, A::Direction], R::N, NONE, &[]),
    dl(61, 0, "DESCENDING TO [alt]", &[A::Altitude], R::N, NONE, &[]),
    dl(62, 0, "ERROR [error information]", &[A::ErrInfo], R::N, NONE, &[]),
    dl(63, 0, "NOT CURRENT DATA AUTHORITY", &[], R::N, NONE, &[]),
    dl(64, 0, "[icao facility designation]", &[A::IcaoId], R::N, NONE, &[]),
    dl(65, 0, "DUE TO WEATHER", &[], R::N, NONE, &[]),
    dl(66, 0, "DUE TO AIRCRAFT PERFORMANCE", &[], R::N, NONE, &[]),
    dl(67, 0, "[freetext]", &[A::Freetext], R::N, NONE, &[]),
    dl(67, b'b', "WE CAN ACCEPT [altitude] AT [time]", &[A::Altitude, A::Time], R::N, NONE, &[]),
    dl(67, b'c', "WE CAN ACCEPT [speed] AT [time]", &[A::Speed, A::Time], R::N, NONE, &[]),
    dl(67, b'd', "WE CAN ACCEPT [distance offset] [direction] AT [time]", &[A::DistanceOffset, A::Direction, A::Time], R::N, NONE, &[]),
    dl(67, b'e', "WE CANNOT ACCEPT [altitude]", &[A::Altitude], R::N, NONE, &[]),
    dl(67, b'f', "WE CANNOT ACCEPT [speed]", &[A::Speed], R::N, NONE, &[]),
    dl(67, b'g', "WE CANNOT ACCEPT [distance offset] [direction]", &[A::DistanceOffset, A::Direction], R::N, NONE, &[]),
    dl(67, b'h', "WHEN CAN WE EXPECT CLIMB TO [altitude]", &[A::Altitude], R::N, NONE, &[]),
    dl(67, b'i', "WHEN CAN WE EXPECT DESCENT TO [altitude]", &[A::Altitude], R::N, NONE, &[]),
    dl(68, 0, "[freetext]", &[A::Freetext], R::N, NONE, &[]),
    dl(69, 0, "REQUEST VMC DESCENT", &[], R::Y, NONE, &[]),
    dl(70, 0, "REQUEST HEADING [degrees]", &[A::Degrees], R::Y, NONE, &[(94, 0)]),
    dl(71, 0, "REQUEST GROUND TRACK [degrees]", &[A::Degrees], R::Y, NONE, &[(95, 0)]),
    dl(72, 0, "REACHING [altitude]", &[A::Altitude], R::N, NONE, &[]),
    dl(73, 0, "[version nr]", &[A::Version], R::N, NONE, &[]),
    dl(74, 0, "MAINTAIN OWN SEPARATION AND VMC", &[], R::N, NONE, &[]),
    dl(75, 0, "AT PILOTS DISCRETION", &[], R::N, NONE, &[]),
    dl(76, 0, "REACHING BLOCK [altitude] TO [altitude]", &[A::Altitude, A::Altitude], R::N, NONE, &[]),
    dl(77, 0, "ASSIGNED BLOCK [altitude] TO [altitude]", &[A::Altitude, A::Altitude], R::N, NONE, &[]),
    dl(78, 0, "AT [time] [distance] [to/from] [position]", &[A::Time, A::Distance, A::ToFrom, A::Position], R::N, NONE, &[]),
    dl(79, 0, "ATIS [atis code]", &[A::AtisCode], R::N, NONE, &[]),
    dl(80, 0, "DEVIATING [distance offset] [direction] OF ROUTE", &[A::DistanceOffset, A::Direction], R::N, NONE, &[]),
];

/// Look up a catalog entry by direction, type number, and subtype.
pub fn find_entry(
    direction: MessageDirection,
    type_num: u16,
    subtype: u8,
) -> Option<&'static CatalogEntry> {
    let table = match direction {
        MessageDirection::Uplink => UPLINK_CATALOG,
        MessageDirection::Downlink => DOWNLINK_CATALOG,
    };
    table
        .iter()
        .find(|e| e.type_num == type_num && e.subtype == subtype)
}

/// Look up a catalog entry by its conventional id, e.g. `"UM20"`,
/// `"DM67b"`.
pub fn find_entry_by_id(id: &str) -> Option<&'static CatalogEntry> {
    let (direction, rest) = if let Some(rest) = id.strip_prefix("UM") {
        (MessageDirection::Uplink, rest)
    } else if let Some(rest) = id.strip_prefix("DM") {
        (MessageDirection::Downlink, rest)
    } else {
        return None;
    };
    let (num_part, subtype) = match rest.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) if rest.len() == idx + 1 => (&rest[..idx], rest.as_bytes()[idx]),
        Some(_) => return None,
        None => (rest, 0),
    };
    let type_num: u16 = num_part.parse().ok()?;
    find_entry(direction, type_num, subtype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Altitude;

    #[test]
    fn catalog_sizes() {
        assert_eq!(UPLINK_CATALOG.len(), 197);
        assert_eq!(DOWNLINK_CATALOG.len(), 89);
    }

    #[test]
    fn arities_within_limits() {
        for e in UPLINK_CATALOG.iter().chain(DOWNLINK_CATALOG) {
            assert!(e.args.len() <= 5, "{} has too many args", e.id());
            assert!(e.responses.len() <= 4, "{} has too many responses", e.id());
        }
    }

    #[test]
    fn no_duplicate_keys() {
        let mut seen = std::collections::HashSet::new();
        for e in UPLINK_CATALOG.iter().chain(DOWNLINK_CATALOG) {
            assert!(
                seen.insert((e.is_downlink(), e.type_num, e.subtype)),
                "duplicate entry {}",
                e.id()
            );
        }
    }

    #[test]
    fn lookup_by_id() {
        let e = find_entry_by_id("UM20").unwrap();
        assert_eq!(e.template, "CLIMB TO AND MAINTAIN [altitude]");
        assert_eq!(e.response, ResponseClass::Wu);
        assert_eq!(e.args, &[ArgKind::Altitude]);

        let e = find_entry_by_id("DM67b").unwrap();
        assert_eq!(e.subtype, b'b');
        assert_eq!(e.id(), "DM67b");

        assert!(find_entry_by_id("UM999").is_none());
        assert!(find_entry_by_id("XX1").is_none());
        assert!(find_entry_by_id("DM67bb").is_none());
    }

    #[test]
    fn um159_expects_error_info() {
        let e = find_entry_by_id("UM159").unwrap();
        assert_eq!(e.args, &[ArgKind::ErrInfo]);
    }

    #[test]
    fn ne_entries_list_operational_responses() {
        // CONFIRM ALTITUDE is answered by DM32 PRESENT ALTITUDE.
        let e = find_entry_by_id("UM133").unwrap();
        assert_eq!(e.response, ResponseClass::Ne);
        assert!(e.responses.contains(&(32, 0)));
    }

    #[test]
    fn render_substitutes_in_order() {
        let e = find_entry_by_id("UM20").unwrap();
        let text = e.render(&[Arg::Altitude(Altitude::flight_level(350).unwrap())]);
        assert_eq!(text, "CLIMB TO AND MAINTAIN FL350");

        // Two placeholders, filled positionally.
        let e = find_entry_by_id("UM26").unwrap();
        let text = e.render(&[
            Arg::Altitude(Altitude::flight_level(310).unwrap()),
            Arg::Time(crate::types::CpdlcTime::utc(12, 45).unwrap()),
        ]);
        assert_eq!(text, "CLIMB TO REACH FL310 BY 1245Z");
    }

    #[test]
    fn render_keeps_unfilled_placeholders() {
        let e = find_entry_by_id("UM26").unwrap();
        let text = e.render(&[Arg::Altitude(Altitude::flight_level(310).unwrap())]);
        assert!(text.starts_with("CLIMB TO REACH FL310"));
        assert!(text.contains("[time]"));
    }

    #[test]
    fn response_class_tokens() {
        assert_eq!(ResponseClass::Wu.to_string(), "WU");
        assert_eq!(ResponseClass::An.as_str(), "AN");
        assert_eq!(ResponseClass::Ne.as_str(), "NE");
        assert_eq!(ResponseClass::N.as_str(), "N");
    }

    #[test]
    fn timeouts_are_catalog_tiers() {
        for e in UPLINK_CATALOG.iter().chain(DOWNLINK_CATALOG) {
            if let Some(t) = e.timeout_secs {
                assert!(matches!(t, 100 | 200 | 300), "{} timeout {}", e.id(), t);
            }
        }
        assert!(u32::from(DEFERRED_TTL_SECS) >= 300 + 100);
    }
}
