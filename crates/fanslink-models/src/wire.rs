//! Machine token forms for argument values and the big composites.
//!
//! The text wire form serialises every argument as a single
//! space-free token (composites collapse to one token via percent
//! escaping). This module owns those token grammars; [`crate::text`]
//! owns the line/header grammar on top of them.

use crate::arg::{Arg, ArgKind};
use crate::error::DecodeError;
use crate::pdc::{ComNavEquipment, DepartureClearance, EquipmentCode, SsrEquipment};
use crate::posreport::PositionReport;
use crate::route::{
    AlongTrackWpt, AltConstraint, AltToler, HoldAtWpt, InterceptCourse, InterceptFrom,
    ReportingPoints, Route, RouteAddInfo, RouteEntry, Rta, TimeToler, WptSpeedAlt,
};
use crate::types::{
    Altitude, Baro, CpdlcTime, Degrees, Direction, FacilityFunction, IcaoName, Icing, LatLon,
    LegType, PlaceBearing, PlaceBearingDistance, Position, Procedure, ProcedureKind, Speed,
    Tp4Label, Turbulence, Wind,
};

// ---------------------------------------------------------------------------
// Percent escaping
// ---------------------------------------------------------------------------

/// Percent-escape a string for transport inside a wire field.
///
/// Alphanumerics, `.` and `,` pass through; everything else becomes
/// `%HH` with lowercase hex.
///
/// # Examples
///
/// ```
/// use fanslink_models::wire::{escape_percent, unescape_percent};
///
/// assert_eq!(escape_percent("A.B,C"), "A.B,C");
/// assert_eq!(escape_percent("A B/C"), "A%20B%2fC");
/// assert_eq!(unescape_percent("A%20B%2fC").unwrap(), "A B/C");
/// ```
pub fn escape_percent(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        if b.is_ascii_alphanumeric() || b == b'.' || b == b',' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02x}"));
        }
    }
    out
}

/// Reverse [`escape_percent`]. Rejects truncated escapes, non-hex
/// digits, and the `%00` byte.
pub fn unescape_percent(input: &str) -> Result<String, DecodeError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input
                .get(i + 1..i + 3)
                .ok_or_else(|| DecodeError::BadEscape(input.to_string()))?;
            let v = u8::from_str_radix(hex, 16)
                .map_err(|_| DecodeError::BadEscape(input.to_string()))?;
            if v == 0 {
                return Err(DecodeError::BadEscape(input.to_string()));
            }
            out.push(v);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| DecodeError::BadEscape(input.to_string()))
}

// ---------------------------------------------------------------------------
// Scalar tokens
// ---------------------------------------------------------------------------

fn bad(kind: &'static str, value: &str) -> DecodeError {
    DecodeError::BadArgument {
        kind,
        value: value.to_string(),
    }
}

/// `FL350`, `FL2000M` (metric FL), `12000`, `3500M`.
pub fn altitude_token(alt: &Altitude) -> String {
    match (alt.fl, alt.metric) {
        (true, false) => format!("FL{}", alt.value / 100),
        (true, true) => format!("FL{}M", alt.value),
        (false, true) => format!("{}M", alt.value),
        (false, false) => format!("{}", alt.value),
    }
}

/// Parse [`altitude_token`], enforcing the model ranges.
pub fn parse_altitude(token: &str) -> Result<Altitude, DecodeError> {
    let (fl, rest) = match token.strip_prefix("FL") {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let (metric, digits) = match rest.strip_suffix('M') {
        Some(d) => (true, d),
        None => (false, rest),
    };
    let value: i32 = digits.parse().map_err(|_| bad("altitude", token))?;
    let alt = match (fl, metric) {
        (true, false) => {
            let level = u32::try_from(value).map_err(|_| bad("altitude", token))?;
            Altitude::flight_level(level)
        }
        (true, true) => Altitude::metric_flight_level(value),
        (false, true) => Altitude::metres(value),
        (false, false) => Altitude::feet(value),
    };
    alt.map_err(|_| bad("altitude", token))
}

/// `250`, `M.82`, `M1.20`.
pub fn speed_token(spd: &Speed) -> String {
    if spd.mach {
        if spd.value < 1000 {
            format!("M.{:02}", spd.value / 10)
        } else {
            format!("M{}.{:02}", spd.value / 1000, (spd.value % 1000) / 10)
        }
    } else {
        format!("{}", spd.value)
    }
}

/// Parse [`speed_token`].
pub fn parse_speed(token: &str) -> Result<Speed, DecodeError> {
    if let Some(rest) = token.strip_prefix('M') {
        let (whole, frac) = rest.split_once('.').ok_or_else(|| bad("speed", token))?;
        let whole: u32 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| bad("speed", token))?
        };
        if frac.len() != 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad("speed", token));
        }
        let frac: u32 = frac.parse().map_err(|_| bad("speed", token))?;
        Speed::mach_thousandths(whole * 1000 + frac * 10).map_err(|_| bad("speed", token))
    } else {
        let knots: u32 = token.parse().map_err(|_| bad("speed", token))?;
        Speed::knots(knots).map_err(|_| bad("speed", token))
    }
}

/// `1230` or `NOW`.
pub fn time_token(time: &CpdlcTime) -> String {
    match time {
        CpdlcTime::Utc { hours, minutes } => format!("{hours:02}{minutes:02}"),
        CpdlcTime::Now => "NOW".to_string(),
    }
}

/// Parse [`time_token`].
pub fn parse_time(token: &str) -> Result<CpdlcTime, DecodeError> {
    if token == "NOW" {
        return Ok(CpdlcTime::Now);
    }
    if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad("time", token));
    }
    let hours: u8 = token[..2].parse().map_err(|_| bad("time", token))?;
    let minutes: u8 = token[2..].parse().map_err(|_| bad("time", token))?;
    CpdlcTime::utc(hours, minutes).map_err(|_| bad("time", token))
}

/// `FIX:OKG`, `NAV:SEA`, `ARPT:KJFK`, `LATLON:47.5,-122.3`,
/// `PBD:OKG~120~15.5`, or the escaped free string.
///
/// Single space-free token, usable inside composites without further
/// escaping.
pub fn position_token(pos: &Position) -> String {
    match pos {
        Position::Fix(s) => format!("FIX:{s}"),
        Position::Navaid(s) => format!("NAV:{s}"),
        Position::Airport(s) => format!("ARPT:{s}"),
        Position::LatLon(ll) => format!("LATLON:{}", latlon_token(*ll)),
        Position::Pbd(pbd) => format!(
            "PBD:{}~{}~{}",
            ident_token(&pbd.fix, pbd.lat_lon),
            pbd.degrees,
            fmt_nm(pbd.dist_nm)
        ),
        Position::Unparsed(s) => escape_percent(s),
    }
}

/// Parse [`position_token`].
pub fn parse_position(token: &str) -> Result<Position, DecodeError> {
    if let Some(rest) = token.strip_prefix("FIX:") {
        Ok(Position::Fix(rest.to_string()))
    } else if let Some(rest) = token.strip_prefix("NAV:") {
        Ok(Position::Navaid(rest.to_string()))
    } else if let Some(rest) = token.strip_prefix("ARPT:") {
        Ok(Position::Airport(rest.to_string()))
    } else if let Some(rest) = token.strip_prefix("LATLON:") {
        Ok(Position::LatLon(parse_latlon(rest)?))
    } else if let Some(rest) = token.strip_prefix("PBD:") {
        let mut parts = rest.split('~');
        let (fix, lat_lon) = parse_ident(parts.next().ok_or_else(|| bad("position", token))?)?;
        let degrees: u16 = parts
            .next()
            .ok_or_else(|| bad("position", token))?
            .parse()
            .map_err(|_| bad("position", token))?;
        let dist_nm: f64 = parts
            .next()
            .ok_or_else(|| bad("position", token))?
            .parse()
            .map_err(|_| bad("position", token))?;
        if degrees == 0 || degrees > 360 || !(0.0..=20_000.0).contains(&dist_nm) {
            return Err(bad("position", token));
        }
        Ok(Position::Pbd(PlaceBearingDistance {
            fix,
            lat_lon,
            degrees,
            dist_nm,
        }))
    } else {
        Ok(Position::Unparsed(unescape_percent(token)?))
    }
}

fn latlon_token(ll: LatLon) -> String {
    format!("{},{}", fmt_deg(ll.lat), fmt_deg(ll.lon))
}

fn parse_latlon(s: &str) -> Result<LatLon, DecodeError> {
    let (lat, lon) = s.split_once(',').ok_or_else(|| bad("lat/lon", s))?;
    let lat: f64 = lat.parse().map_err(|_| bad("lat/lon", s))?;
    let lon: f64 = lon.parse().map_err(|_| bad("lat/lon", s))?;
    LatLon::new(lat, lon).map_err(|_| bad("lat/lon", s))
}

/// `fix` or `fix@lat,lon`.
fn ident_token(fix: &str, lat_lon: Option<LatLon>) -> String {
    match lat_lon {
        Some(ll) => format!("{fix}@{}", latlon_token(ll)),
        None => fix.to_string(),
    }
}

fn parse_ident(s: &str) -> Result<(String, Option<LatLon>), DecodeError> {
    match s.split_once('@') {
        Some((fix, ll)) => Ok((fix.to_string(), Some(parse_latlon(ll)?))),
        None => Ok((s.to_string(), None)),
    }
}

/// Trim trailing zeros from coordinate/distance renderings so tokens
/// stay compact and round-trip exactly through `f64` parsing.
fn fmt_deg(v: f64) -> String {
    let mut s = format!("{v:.6}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

fn fmt_nm(v: f64) -> String {
    if (v - v.trunc()).abs() < 0.01 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

/// `A29.92` (inHg) or `Q1013` (hPa); bare values are auto-ranged.
pub fn baro_token(baro: &Baro) -> String {
    if baro.hpa {
        format!("Q{:.0}", baro.value)
    } else {
        format!("A{:.2}", baro.value)
    }
}

/// Parse [`baro_token`] or an unlabeled numeric altimeter.
pub fn parse_baro(token: &str) -> Result<Baro, DecodeError> {
    if let Some(rest) = token.strip_prefix('A') {
        let value: f64 = rest.parse().map_err(|_| bad("altimeter", token))?;
        if !(22.0..=31.0).contains(&value) {
            return Err(bad("altimeter", token));
        }
        Ok(Baro { hpa: false, value })
    } else if let Some(rest) = token.strip_prefix('Q') {
        let value: f64 = rest.parse().map_err(|_| bad("altimeter", token))?;
        if !(745.0..=1100.0).contains(&value) {
            return Err(bad("altimeter", token));
        }
        Ok(Baro { hpa: true, value })
    } else {
        let value: f64 = token.parse().map_err(|_| bad("altimeter", token))?;
        Baro::from_unlabeled(value).map_err(|_| bad("altimeter", token))
    }
}

/// `SID:name[.trans]`, `STAR:name[.trans]`, `APP:name[.trans]`, or a
/// bare name for an unclassified procedure.
pub fn procedure_token(proc: &Procedure) -> String {
    let prefix = match proc.kind {
        ProcedureKind::Unknown => return proc.name.clone(),
        ProcedureKind::Arrival => "STAR:",
        ProcedureKind::Approach => "APP:",
        ProcedureKind::Departure => "SID:",
    };
    if proc.transition.is_empty() {
        format!("{prefix}{}", proc.name)
    } else {
        format!("{prefix}{}.{}", proc.name, proc.transition)
    }
}

/// Parse [`procedure_token`].
pub fn parse_procedure(token: &str) -> Result<Procedure, DecodeError> {
    let (kind, rest) = if let Some(rest) = token.strip_prefix("SID:") {
        (ProcedureKind::Departure, rest)
    } else if let Some(rest) = token.strip_prefix("STAR:") {
        (ProcedureKind::Arrival, rest)
    } else if let Some(rest) = token.strip_prefix("APP:") {
        (ProcedureKind::Approach, rest)
    } else {
        return Ok(Procedure {
            kind: ProcedureKind::Unknown,
            name: token.to_string(),
            transition: String::new(),
        });
    };
    let (name, transition) = match rest.split_once('.') {
        Some((n, t)) => (n.to_string(), t.to_string()),
        None => (rest.to_string(), String::new()),
    };
    if name.is_empty() {
        return Err(bad("procedure", token));
    }
    Ok(Procedure {
        kind,
        name,
        transition,
    })
}

/// `NAME:<escaped>:<func>` or `ID:<escaped>:<func>`.
pub fn icao_name_token(name: &IcaoName) -> String {
    format!(
        "{}:{}:{}",
        if name.is_name { "NAME" } else { "ID" },
        escape_percent(&name.text),
        name.function.index()
    )
}

/// Parse [`icao_name_token`].
pub fn parse_icao_name(token: &str) -> Result<IcaoName, DecodeError> {
    let (is_name, rest) = if let Some(rest) = token.strip_prefix("NAME:") {
        (true, rest)
    } else if let Some(rest) = token.strip_prefix("ID:") {
        (false, rest)
    } else {
        return Err(bad("facility", token));
    };
    let (text, func) = rest.rsplit_once(':').ok_or_else(|| bad("facility", token))?;
    let func: u8 = func.parse().map_err(|_| bad("facility", token))?;
    let function = FacilityFunction::from_index(func).ok_or_else(|| bad("facility", token))?;
    Ok(IcaoName {
        is_name,
        text: unescape_percent(text)?,
        function,
    })
}

// ---------------------------------------------------------------------------
// Position report
// ---------------------------------------------------------------------------

const POSREP_FIELDS: usize = 22;

fn opt<T, F: FnOnce(&T) -> String>(v: &Option<T>, f: F) -> String {
    match v {
        Some(v) => f(v),
        None => "-".to_string(),
    }
}

fn turb_index(t: Option<Turbulence>) -> u8 {
    match t {
        None => 0,
        Some(Turbulence::Light) => 1,
        Some(Turbulence::Moderate) => 2,
        Some(Turbulence::Severe) => 3,
    }
}

fn turb_from_index(idx: u8) -> Result<Option<Turbulence>, ()> {
    Ok(match idx {
        0 => None,
        1 => Some(Turbulence::Light),
        2 => Some(Turbulence::Moderate),
        3 => Some(Turbulence::Severe),
        _ => return Err(()),
    })
}

fn icing_index(i: Option<Icing>) -> u8 {
    match i {
        None => 0,
        Some(Icing::Trace) => 1,
        Some(Icing::Light) => 2,
        Some(Icing::Moderate) => 3,
        Some(Icing::Severe) => 4,
    }
}

fn icing_from_index(idx: u8) -> Result<Option<Icing>, ()> {
    Ok(match idx {
        0 => None,
        1 => Some(Icing::Trace),
        2 => Some(Icing::Light),
        3 => Some(Icing::Moderate),
        4 => Some(Icing::Severe),
        _ => return Err(()),
    })
}

/// Serialise a position report to its 22-field machine form (one
/// space-separated string; callers escape the whole thing).
pub fn posreport_fields(rep: &PositionReport) -> String {
    let fields: [String; POSREP_FIELDS] = [
        opt(&rep.cur_pos, position_token),
        opt(&rep.cur_pos_time, time_token),
        opt(&rep.cur_alt, altitude_token),
        opt(&rep.fix_next, position_token),
        opt(&rep.fix_next_time, time_token),
        opt(&rep.fix_next_p1, position_token),
        opt(&rep.time_dest, time_token),
        opt(&rep.rmng_fuel, |(h, m)| format!("{h:02}{m:02}")),
        opt(&rep.temp, |t| t.to_string()),
        opt(&rep.wind, |w| format!("{:03}/{}", w.direction, w.speed)),
        turb_index(rep.turbulence).to_string(),
        icing_index(rep.icing).to_string(),
        opt(&rep.speed, speed_token),
        opt(&rep.speed_gnd, speed_token),
        opt(&rep.vvi, |v| v.to_string()),
        opt(&rep.track, |t| t.to_string()),
        opt(&rep.hdg_true, |h| h.to_string()),
        opt(&rep.dist_nm, |d| fmt_nm(*d)),
        opt(&rep.remarks, |r| escape_percent(r)),
        opt(&rep.rpt_wpt_pos, position_token),
        opt(&rep.rpt_wpt_time, time_token),
        opt(&rep.rpt_wpt_alt, altitude_token),
    ];
    fields.join(" ")
}

/// Parse the output of [`posreport_fields`].
pub fn parse_posreport(input: &str) -> Result<PositionReport, DecodeError> {
    let fields: Vec<&str> = input.split(' ').collect();
    if fields.len() != POSREP_FIELDS {
        return Err(bad("posreport", input));
    }
    fn maybe<T>(
        tok: &str,
        f: impl FnOnce(&str) -> Result<T, DecodeError>,
    ) -> Result<Option<T>, DecodeError> {
        if tok == "-" {
            Ok(None)
        } else {
            f(tok).map(Some)
        }
    }
    let parse_fuel = |tok: &str| -> Result<(u8, u8), DecodeError> {
        if tok.len() != 4 || !tok.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad("fuel", tok));
        }
        Ok((
            tok[..2].parse().map_err(|_| bad("fuel", tok))?,
            tok[2..].parse().map_err(|_| bad("fuel", tok))?,
        ))
    };
    let parse_wind = |tok: &str| -> Result<Wind, DecodeError> {
        let (dir, spd) = tok.split_once('/').ok_or_else(|| bad("wind", tok))?;
        let direction: u16 = dir.parse().map_err(|_| bad("wind", tok))?;
        let speed: u16 = spd.parse().map_err(|_| bad("wind", tok))?;
        if direction == 0 || direction > 360 {
            return Err(bad("wind", tok));
        }
        Ok(Wind { direction, speed })
    };
    let parse_track = |tok: &str| -> Result<u16, DecodeError> {
        let v: u16 = tok.parse().map_err(|_| bad("track", tok))?;
        if v == 0 || v > 360 {
            return Err(bad("track", tok));
        }
        Ok(v)
    };
    Ok(PositionReport {
        cur_pos: maybe(fields[0], parse_position)?,
        cur_pos_time: maybe(fields[1], parse_time)?,
        cur_alt: maybe(fields[2], parse_altitude)?,
        fix_next: maybe(fields[3], parse_position)?,
        fix_next_time: maybe(fields[4], parse_time)?,
        fix_next_p1: maybe(fields[5], parse_position)?,
        time_dest: maybe(fields[6], parse_time)?,
        rmng_fuel: maybe(fields[7], |t| parse_fuel(t))?,
        temp: maybe(fields[8], |t| {
            t.parse::<i16>().map_err(|_| bad("temperature", t))
        })?,
        wind: maybe(fields[9], |t| parse_wind(t))?,
        turbulence: turb_from_index(
            fields[10].parse().map_err(|_| bad("turbulence", fields[10]))?,
        )
        .map_err(|()| bad("turbulence", fields[10]))?,
        icing: icing_from_index(fields[11].parse().map_err(|_| bad("icing", fields[11]))?)
            .map_err(|()| bad("icing", fields[11]))?,
        speed: maybe(fields[12], parse_speed)?,
        speed_gnd: maybe(fields[13], parse_speed)?,
        vvi: maybe(fields[14], |t| {
            t.parse::<i32>().map_err(|_| bad("vvi", t))
        })?,
        track: maybe(fields[15], |t| parse_track(t))?,
        hdg_true: maybe(fields[16], |t| parse_track(t))?,
        dist_nm: maybe(fields[17], |t| {
            t.parse::<f64>().map_err(|_| bad("distance", t))
        })?,
        remarks: maybe(fields[18], unescape_percent)?,
        rpt_wpt_pos: maybe(fields[19], parse_position)?,
        rpt_wpt_time: maybe(fields[20], parse_time)?,
        rpt_wpt_alt: maybe(fields[21], parse_altitude)?,
    })
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

fn alt_cstr_token(c: &AltConstraint) -> String {
    let sigil = match c.toler {
        AltToler::At => '=',
        AltToler::AtOrAbove => '+',
        AltToler::AtOrBelow => '-',
    };
    format!("{sigil}{}", altitude_token(&c.alt))
}

fn parse_alt_cstr(tok: &str) -> Result<AltConstraint, DecodeError> {
    let mut chars = tok.chars();
    let toler = match chars.next() {
        Some('=') => AltToler::At,
        Some('+') => AltToler::AtOrAbove,
        Some('-') => AltToler::AtOrBelow,
        _ => return Err(bad("alt constraint", tok)),
    };
    Ok(AltConstraint {
        toler,
        alt: parse_altitude(chars.as_str())?,
    })
}

fn place_bearing_token(pb: &PlaceBearing) -> String {
    format!("{}~{}", ident_token(&pb.fix, pb.lat_lon), pb.degrees)
}

fn parse_place_bearing(tok: &str) -> Result<PlaceBearing, DecodeError> {
    let (ident, deg) = tok.rsplit_once('~').ok_or_else(|| bad("place/bearing", tok))?;
    let (fix, lat_lon) = parse_ident(ident)?;
    let degrees: u16 = deg.parse().map_err(|_| bad("place/bearing", tok))?;
    if degrees == 0 || degrees > 360 {
        return Err(bad("place/bearing", tok));
    }
    Ok(PlaceBearing {
        fix,
        lat_lon,
        degrees,
    })
}

fn route_entry_token(entry: &RouteEntry) -> String {
    match entry {
        RouteEntry::PubIdent { fix, lat_lon } => format!("PUB:{}", ident_token(fix, *lat_lon)),
        RouteEntry::LatLon(ll) => format!("LATLON:{}", latlon_token(*ll)),
        RouteEntry::PlaceBearingPair(pair) => format!(
            "PBPB:{};{}",
            place_bearing_token(&pair.0),
            place_bearing_token(&pair.1)
        ),
        RouteEntry::Pbd(pbd) => format!(
            "PBD:{}~{}~{}",
            ident_token(&pbd.fix, pbd.lat_lon),
            pbd.degrees,
            fmt_nm(pbd.dist_nm)
        ),
        RouteEntry::Airway(awy) => format!("AWY:{awy}"),
        RouteEntry::TrackDetail { name, points } => {
            let pts: Vec<String> = points.iter().map(|p| latlon_token(*p)).collect();
            if pts.is_empty() {
                format!("TRK:{name}")
            } else {
                format!("TRK:{name}@{}", pts.join(";"))
            }
        }
        RouteEntry::Unknown(s) => escape_percent(s),
    }
}

fn parse_route_entry(tok: &str) -> Result<RouteEntry, DecodeError> {
    if let Some(rest) = tok.strip_prefix("PUB:") {
        let (fix, lat_lon) = parse_ident(rest)?;
        Ok(RouteEntry::PubIdent { fix, lat_lon })
    } else if let Some(rest) = tok.strip_prefix("LATLON:") {
        Ok(RouteEntry::LatLon(parse_latlon(rest)?))
    } else if let Some(rest) = tok.strip_prefix("PBPB:") {
        let (a, b) = rest.split_once(';').ok_or_else(|| bad("route entry", tok))?;
        Ok(RouteEntry::PlaceBearingPair(Box::new((
            parse_place_bearing(a)?,
            parse_place_bearing(b)?,
        ))))
    } else if let Some(rest) = tok.strip_prefix("PBD:") {
        match parse_position(&format!("PBD:{rest}"))? {
            Position::Pbd(pbd) => Ok(RouteEntry::Pbd(pbd)),
            _ => Err(bad("route entry", tok)),
        }
    } else if let Some(rest) = tok.strip_prefix("AWY:") {
        Ok(RouteEntry::Airway(rest.to_string()))
    } else if let Some(rest) = tok.strip_prefix("TRK:") {
        match rest.split_once('@') {
            Some((name, pts)) => {
                let points = pts
                    .split(';')
                    .map(parse_latlon)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(RouteEntry::TrackDetail {
                    name: name.to_string(),
                    points,
                })
            }
            None => Ok(RouteEntry::TrackDetail {
                name: rest.to_string(),
                points: Vec::new(),
            }),
        }
    } else {
        Ok(RouteEntry::Unknown(unescape_percent(tok)?))
    }
}

fn atk_token(atk: &AlongTrackWpt) -> String {
    let mut out = format!("ATK:{}~{}", position_token(&atk.pos), fmt_nm(atk.dist_nm));
    if let Some(spd) = &atk.speed {
        out.push_str(&format!("~S{}", speed_token(spd)));
    }
    for c in &atk.alt {
        out.push_str(&format!("~A{}", alt_cstr_token(c)));
    }
    out
}

fn parse_atk(rest: &str) -> Result<AlongTrackWpt, DecodeError> {
    let mut parts = rest.split('~');
    let pos = parse_position(parts.next().ok_or_else(|| bad("along-track", rest))?)?;
    let dist_nm: f64 = parts
        .next()
        .ok_or_else(|| bad("along-track", rest))?
        .parse()
        .map_err(|_| bad("along-track", rest))?;
    let mut speed = None;
    let mut alt = Vec::new();
    for p in parts {
        if let Some(s) = p.strip_prefix('S') {
            speed = Some(parse_speed(s)?);
        } else if let Some(a) = p.strip_prefix('A') {
            if alt.len() == 2 {
                return Err(bad("along-track", rest));
            }
            alt.push(parse_alt_cstr(a)?);
        } else {
            return Err(bad("along-track", rest));
        }
    }
    Ok(AlongTrackWpt {
        pos,
        dist_nm,
        speed,
        alt,
    })
}

fn hold_token(hold: &HoldAtWpt) -> String {
    let mut out = format!("HOLD:{}", position_token(&hold.pos));
    if let Some(s) = &hold.spd_low {
        out.push_str(&format!("~SL{}", speed_token(s)));
    }
    if let Some(a) = &hold.alt {
        out.push_str(&format!("~A{}", alt_cstr_token(a)));
    }
    if let Some(s) = &hold.spd_high {
        out.push_str(&format!("~SH{}", speed_token(s)));
    }
    if let Some(d) = hold.dir {
        out.push_str(&format!("~D{}", d.wire_token()));
    }
    if let Some(deg) = hold.degrees {
        out.push_str(&format!("~C{deg}"));
    }
    if let Some(efc) = &hold.efc {
        out.push_str(&format!("~E{}", time_token(efc)));
    }
    if let Some(leg) = &hold.leg {
        match leg {
            LegType::Distance(nm) => out.push_str(&format!("~LD{nm:.1}")),
            LegType::Time(min) => out.push_str(&format!("~LT{min:.1}")),
        }
    }
    out
}

fn parse_hold(rest: &str) -> Result<HoldAtWpt, DecodeError> {
    let mut parts = rest.split('~');
    let pos = parse_position(parts.next().ok_or_else(|| bad("hold", rest))?)?;
    let mut hold = HoldAtWpt {
        pos,
        spd_low: None,
        alt: None,
        spd_high: None,
        dir: None,
        degrees: None,
        efc: None,
        leg: None,
    };
    for p in parts {
        if let Some(s) = p.strip_prefix("SL") {
            hold.spd_low = Some(parse_speed(s)?);
        } else if let Some(s) = p.strip_prefix("SH") {
            hold.spd_high = Some(parse_speed(s)?);
        } else if let Some(a) = p.strip_prefix('A') {
            hold.alt = Some(parse_alt_cstr(a)?);
        } else if let Some(d) = p.strip_prefix('D') {
            hold.dir = Some(Direction::from_wire_token(d).ok_or_else(|| bad("hold", rest))?);
        } else if let Some(c) = p.strip_prefix('C') {
            hold.degrees = Some(c.parse().map_err(|_| bad("hold", rest))?);
        } else if let Some(e) = p.strip_prefix('E') {
            hold.efc = Some(parse_time(e)?);
        } else if let Some(l) = p.strip_prefix("LD") {
            hold.leg = Some(LegType::Distance(
                l.parse().map_err(|_| bad("hold", rest))?,
            ));
        } else if let Some(l) = p.strip_prefix("LT") {
            hold.leg = Some(LegType::Time(l.parse().map_err(|_| bad("hold", rest))?));
        } else {
            return Err(bad("hold", rest));
        }
    }
    Ok(hold)
}

fn wsa_token(wsa: &WptSpeedAlt) -> String {
    let mut out = format!("WSA:{}", position_token(&wsa.pos));
    if let Some(s) = &wsa.speed {
        out.push_str(&format!("~S{}", speed_token(s)));
    }
    for c in &wsa.alt {
        out.push_str(&format!("~A{}", alt_cstr_token(c)));
    }
    out
}

fn parse_wsa(rest: &str) -> Result<WptSpeedAlt, DecodeError> {
    let mut parts = rest.split('~');
    let pos = parse_position(parts.next().ok_or_else(|| bad("wpt spd/alt", rest))?)?;
    let mut speed = None;
    let mut alt = Vec::new();
    for p in parts {
        if let Some(s) = p.strip_prefix('S') {
            speed = Some(parse_speed(s)?);
        } else if let Some(a) = p.strip_prefix('A') {
            if alt.len() == 2 {
                return Err(bad("wpt spd/alt", rest));
            }
            alt.push(parse_alt_cstr(a)?);
        } else {
            return Err(bad("wpt spd/alt", rest));
        }
    }
    Ok(WptSpeedAlt { pos, speed, alt })
}

fn rta_token(rta: &Rta) -> String {
    let tol = match rta.toler {
        TimeToler::At => "AT",
        TimeToler::AtOrAfter => "AFT",
        TimeToler::AtOrBefore => "BEF",
    };
    format!(
        "RTA:{}~{}~{tol}",
        position_token(&rta.pos),
        time_token(&rta.time)
    )
}

fn parse_rta(rest: &str) -> Result<Rta, DecodeError> {
    let mut parts = rest.split('~');
    let pos = parse_position(parts.next().ok_or_else(|| bad("rta", rest))?)?;
    let time = parse_time(parts.next().ok_or_else(|| bad("rta", rest))?)?;
    let toler = match parts.next() {
        Some("AT") => TimeToler::At,
        Some("AFT") => TimeToler::AtOrAfter,
        Some("BEF") => TimeToler::AtOrBefore,
        _ => return Err(bad("rta", rest)),
    };
    Ok(Rta { pos, time, toler })
}

fn intc_token(intc: &InterceptCourse) -> String {
    let from = match &intc.from {
        InterceptFrom::PubIdent { fix, lat_lon } => format!("PUB:{}", ident_token(fix, *lat_lon)),
        InterceptFrom::LatLon(ll) => format!("LATLON:{}", latlon_token(*ll)),
        InterceptFrom::PlaceBearingPair(pair) => format!(
            "PBPB:{};{}",
            place_bearing_token(&pair.0),
            place_bearing_token(&pair.1)
        ),
        InterceptFrom::Pbd(pbd) => format!(
            "PBD:{}~{}~{}",
            ident_token(&pbd.fix, pbd.lat_lon),
            pbd.degrees,
            fmt_nm(pbd.dist_nm)
        ),
    };
    format!("INTC:{from}^{}", intc.degrees)
}

fn parse_intc(rest: &str) -> Result<InterceptCourse, DecodeError> {
    let (from_tok, deg) = rest.rsplit_once('^').ok_or_else(|| bad("intercept", rest))?;
    let degrees: u16 = deg.parse().map_err(|_| bad("intercept", rest))?;
    if degrees == 0 || degrees > 360 {
        return Err(bad("intercept", rest));
    }
    let from = match parse_route_entry(from_tok)? {
        RouteEntry::PubIdent { fix, lat_lon } => InterceptFrom::PubIdent { fix, lat_lon },
        RouteEntry::LatLon(ll) => InterceptFrom::LatLon(ll),
        RouteEntry::PlaceBearingPair(pair) => InterceptFrom::PlaceBearingPair(pair),
        RouteEntry::Pbd(pbd) => InterceptFrom::Pbd(pbd),
        _ => return Err(bad("intercept", rest)),
    };
    Ok(InterceptCourse { from, degrees })
}

/// Serialise a route to its machine form: space-separated prefixed
/// elements. Callers escape the whole string for transport.
pub fn route_fields(route: &Route) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(v) = &route.orig_icao {
        parts.push(format!("ORIG:{v}"));
    }
    if let Some(v) = &route.dest_icao {
        parts.push(format!("DEST:{v}"));
    }
    if let Some(v) = &route.orig_rwy {
        parts.push(format!("ORWY:{v}"));
    }
    if let Some(v) = &route.dest_rwy {
        parts.push(format!("DRWY:{v}"));
    }
    if let Some(p) = &route.sid {
        parts.push(format!("SID:{}", p.name));
        if !p.transition.is_empty() {
            parts.push(format!("SIDTR:{}", p.transition));
        }
    }
    if let Some(p) = &route.star {
        parts.push(format!("STAR:{}", p.name));
        if !p.transition.is_empty() {
            parts.push(format!("STARTR:{}", p.transition));
        }
    }
    if let Some(p) = &route.appch {
        parts.push(format!("APP:{}", p.name));
        if !p.transition.is_empty() {
            parts.push(format!("APPTR:{}", p.transition));
        }
    }
    if let Some(v) = &route.awy_intc {
        parts.push(format!("AWYI:{v}"));
    }
    for entry in &route.entries {
        parts.push(route_entry_token(entry));
    }
    let add = &route.add_info;
    for atk in &add.along_track {
        parts.push(atk_token(atk));
    }
    if let Some(rpt) = &add.reporting_points {
        let mut tok = format!(
            "RPT:{}~{}",
            if rpt.lat { "LAT" } else { "LON" },
            fmt_deg(rpt.degrees)
        );
        if let Some(incr) = rpt.increment {
            tok.push_str(&format!("~{incr}"));
        }
        parts.push(tok);
    }
    for intc in &add.intercept_from {
        parts.push(intc_token(intc));
    }
    for hold in &add.hold_at {
        parts.push(hold_token(hold));
    }
    for wsa in &add.wpt_speed_alt {
        parts.push(wsa_token(wsa));
    }
    for rta in &add.rta {
        parts.push(rta_token(rta));
    }
    parts.join(" ")
}

/// Parse the output of [`route_fields`].
pub fn parse_route(input: &str) -> Result<Route, DecodeError> {
    let mut route = Route::default();
    let mut add = RouteAddInfo::default();
    if input.is_empty() {
        return Ok(route);
    }
    for tok in input.split(' ') {
        if let Some(v) = tok.strip_prefix("ORIG:") {
            route.orig_icao = Some(v.to_string());
        } else if let Some(v) = tok.strip_prefix("DEST:") {
            route.dest_icao = Some(v.to_string());
        } else if let Some(v) = tok.strip_prefix("ORWY:") {
            route.orig_rwy = Some(v.to_string());
        } else if let Some(v) = tok.strip_prefix("DRWY:") {
            route.dest_rwy = Some(v.to_string());
        } else if let Some(v) = tok.strip_prefix("SID:") {
            route.sid = Some(Procedure {
                kind: ProcedureKind::Departure,
                name: v.to_string(),
                transition: String::new(),
            });
        } else if let Some(v) = tok.strip_prefix("SIDTR:") {
            if let Some(p) = &mut route.sid {
                p.transition = v.to_string();
            }
        } else if let Some(v) = tok.strip_prefix("STAR:") {
            route.star = Some(Procedure {
                kind: ProcedureKind::Arrival,
                name: v.to_string(),
                transition: String::new(),
            });
        } else if let Some(v) = tok.strip_prefix("STARTR:") {
            if let Some(p) = &mut route.star {
                p.transition = v.to_string();
            }
        } else if let Some(v) = tok.strip_prefix("APP:") {
            route.appch = Some(Procedure {
                kind: ProcedureKind::Approach,
                name: v.to_string(),
                transition: String::new(),
            });
        } else if let Some(v) = tok.strip_prefix("APPTR:") {
            if let Some(p) = &mut route.appch {
                p.transition = v.to_string();
            }
        } else if let Some(v) = tok.strip_prefix("AWYI:") {
            route.awy_intc = Some(v.to_string());
        } else if let Some(v) = tok.strip_prefix("ATK:") {
            add.along_track.push(parse_atk(v)?);
        } else if let Some(v) = tok.strip_prefix("RPT:") {
            let mut parts = v.split('~');
            let lat = match parts.next() {
                Some("LAT") => true,
                Some("LON") => false,
                _ => return Err(bad("reporting points", tok)),
            };
            let degrees: f64 = parts
                .next()
                .ok_or_else(|| bad("reporting points", tok))?
                .parse()
                .map_err(|_| bad("reporting points", tok))?;
            let increment = match parts.next() {
                Some(i) => Some(i.parse().map_err(|_| bad("reporting points", tok))?),
                None => None,
            };
            add.reporting_points = Some(ReportingPoints {
                lat,
                degrees,
                increment,
            });
        } else if let Some(v) = tok.strip_prefix("INTC:") {
            add.intercept_from.push(parse_intc(v)?);
        } else if let Some(v) = tok.strip_prefix("HOLD:") {
            add.hold_at.push(parse_hold(v)?);
        } else if let Some(v) = tok.strip_prefix("WSA:") {
            add.wpt_speed_alt.push(parse_wsa(v)?);
        } else if let Some(v) = tok.strip_prefix("RTA:") {
            add.rta.push(parse_rta(v)?);
        } else {
            route.entries.push(parse_route_entry(tok)?);
        }
    }
    if route.entries.len() > crate::route::ROUTE_MAX_WAYPOINTS {
        return Err(bad("route", "too many waypoints"));
    }
    route.add_info = add;
    Ok(route)
}

// ---------------------------------------------------------------------------
// PDC
// ---------------------------------------------------------------------------

/// Serialise a pre-departure clearance to its machine field form
/// (space-separated; the route field is internally escaped; callers
/// escape the whole string).
pub fn pdc_fields(pdc: &DepartureClearance) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.push(pdc.acf_id.clone());
    parts.push(pdc.acf_type.clone().unwrap_or_else(|| "-".to_string()));
    parts.push(u8::from(pdc.equipment.com_nav_available).to_string());
    parts.push(pdc.equipment.com_nav.len().to_string());
    for eq in &pdc.equipment.com_nav {
        parts.push(eq.index().to_string());
    }
    parts.push(pdc.equipment.ssr.index().to_string());
    parts.push(format!("{:02}{:02}", pdc.time_dep.0, pdc.time_dep.1));
    parts.push(escape_percent(&route_fields(&pdc.route)));
    parts.push(match &pdc.alt_restr {
        Some(alt) => altitude_token(alt),
        None => "-".to_string(),
    });
    parts.push(format!("{:.3}", pdc.freq));
    parts.push(format!("{:04o}", pdc.squawk));
    parts.push(pdc.revision.to_string());
    parts.join(" ")
}

/// Parse the output of [`pdc_fields`].
pub fn parse_pdc(input: &str) -> Result<DepartureClearance, DecodeError> {
    let mut toks = input.split(' ');
    let mut next = |what: &'static str| -> Result<&str, DecodeError> {
        toks.next().ok_or(DecodeError::BadArgument {
            kind: "pdc",
            value: what.to_string(),
        })
    };
    let acf_id = next("acf_id")?.to_string();
    let acf_type = match next("acf_type")? {
        "-" => None,
        t => Some(t.to_string()),
    };
    let com_nav_available = match next("com_nav_available")? {
        "0" => false,
        "1" => true,
        t => return Err(bad("pdc", t)),
    };
    let n: usize = next("com_nav_count")?
        .parse()
        .map_err(|_| bad("pdc", input))?;
    if n > 16 {
        return Err(bad("pdc", "too many equipment codes"));
    }
    let mut com_nav = Vec::with_capacity(n);
    for _ in 0..n {
        let idx: u8 = next("com_nav")?.parse().map_err(|_| bad("pdc", input))?;
        com_nav.push(ComNavEquipment::from_index(idx).ok_or_else(|| bad("pdc", input))?);
    }
    let ssr_idx: u8 = next("ssr")?.parse().map_err(|_| bad("pdc", input))?;
    let ssr = SsrEquipment::from_index(ssr_idx).ok_or_else(|| bad("pdc", input))?;
    let dep = next("time_dep")?;
    if dep.len() != 4 || !dep.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad("pdc", dep));
    }
    let time_dep = (
        dep[..2].parse().map_err(|_| bad("pdc", dep))?,
        dep[2..].parse().map_err(|_| bad("pdc", dep))?,
    );
    let route = parse_route(&unescape_percent(next("route")?)?)?;
    let alt_restr = match next("alt_restr")? {
        "-" => None,
        t => Some(parse_altitude(t)?),
    };
    let freq: f64 = next("freq")?.parse().map_err(|_| bad("pdc", input))?;
    let squawk_tok = next("squawk")?;
    let squawk = parse_squawk(squawk_tok)?;
    let revision: u32 = next("revision")?.parse().map_err(|_| bad("pdc", input))?;
    if toks.next().is_some() {
        return Err(bad("pdc", "trailing fields"));
    }
    Ok(DepartureClearance {
        acf_id,
        acf_type,
        equipment: EquipmentCode {
            com_nav_available,
            com_nav,
            ssr,
        },
        time_dep,
        route,
        alt_restr,
        freq,
        squawk,
        revision,
    })
}

/// Parse a 4-digit octal squawk token.
pub fn parse_squawk(token: &str) -> Result<u16, DecodeError> {
    if token.len() != 4 || !token.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return Err(bad("squawk", token));
    }
    u16::from_str_radix(token, 8).map_err(|_| bad("squawk", token))
}

// ---------------------------------------------------------------------------
// Argument dispatch
// ---------------------------------------------------------------------------

/// Serialise one argument to its (single) wire token.
pub fn arg_token(arg: &Arg) -> String {
    match arg {
        Arg::Altitude(v) => altitude_token(v),
        Arg::Speed(v) => speed_token(v),
        Arg::Time(v) => time_token(v),
        Arg::TimeDur(mins) => mins.to_string(),
        Arg::Position(v) => escape_percent(&position_token(v)),
        Arg::Direction(v) => v.wire_token().to_string(),
        Arg::Distance(nm) | Arg::DistanceOffset(nm) => fmt_nm(*nm),
        Arg::Vvi(v) => v.to_string(),
        Arg::ToFrom(to) => if *to { "TO" } else { "FROM" }.to_string(),
        Arg::Route(route) => escape_percent(&route_fields(route)),
        Arg::Procedure(v) => procedure_token(v),
        Arg::Squawk(v) => format!("{v:04o}"),
        Arg::IcaoId(v) => escape_percent(v),
        Arg::IcaoName(v) => icao_name_token(v),
        Arg::Frequency(mhz) => {
            if *mhz <= 28.0 {
                format!("{mhz:.4}")
            } else {
                format!("{mhz:.3}")
            }
        }
        Arg::Degrees(v) => format!("{}{}", v.degrees, if v.true_north { "T" } else { "" }),
        Arg::Baro(v) => baro_token(v),
        Arg::Freetext(v) | Arg::ErrInfo(v) | Arg::AtisCode(v) => escape_percent(v),
        Arg::Persons(v) => v.to_string(),
        Arg::PosReport(rep) => escape_percent(&posreport_fields(rep)),
        Arg::Pdc(pdc) => escape_percent(&pdc_fields(pdc)),
        Arg::Tp4Table(l) => match l {
            Tp4Label::A => "A".to_string(),
            Tp4Label::B => "B".to_string(),
        },
        Arg::Version(v) => v.to_string(),
        Arg::LegType(l) => match l {
            LegType::Distance(nm) => format!("D{nm:.1}"),
            LegType::Time(min) => format!("T{min:.1}"),
        },
    }
}

/// Parse one wire token into the argument of the given kind, enforcing
/// the per-kind ranges.
pub fn parse_arg(kind: ArgKind, token: &str) -> Result<Arg, DecodeError> {
    Ok(match kind {
        ArgKind::Altitude => Arg::Altitude(parse_altitude(token)?),
        ArgKind::Speed => Arg::Speed(parse_speed(token)?),
        ArgKind::Time => Arg::Time(parse_time(token)?),
        ArgKind::TimeDur => {
            let mins: u16 = token.parse().map_err(|_| bad("duration", token))?;
            if mins > 1440 {
                return Err(bad("duration", token));
            }
            Arg::TimeDur(mins)
        }
        ArgKind::Position => Arg::Position(parse_position(&unescape_percent(token)?)?),
        ArgKind::Direction => Arg::Direction(
            Direction::from_wire_token(token).ok_or_else(|| bad("direction", token))?,
        ),
        ArgKind::Distance | ArgKind::DistanceOffset => {
            let nm: f64 = token.parse().map_err(|_| bad("distance", token))?;
            if !(0.0..=20_000.0).contains(&nm) {
                return Err(bad("distance", token));
            }
            if kind == ArgKind::Distance {
                Arg::Distance(nm)
            } else {
                Arg::DistanceOffset(nm)
            }
        }
        ArgKind::Vvi => {
            let v: i32 = token.parse().map_err(|_| bad("vvi", token))?;
            if !(0..=10_000).contains(&v) {
                return Err(bad("vvi", token));
            }
            Arg::Vvi(v)
        }
        ArgKind::ToFrom => match token {
            "TO" => Arg::ToFrom(true),
            "FROM" => Arg::ToFrom(false),
            _ => return Err(bad("to/from", token)),
        },
        ArgKind::Route => Arg::Route(Box::new(parse_route(&unescape_percent(token)?)?)),
        ArgKind::Procedure => Arg::Procedure(parse_procedure(token)?),
        ArgKind::Squawk => Arg::Squawk(parse_squawk(token)?),
        ArgKind::IcaoId => Arg::IcaoId(unescape_percent(token)?),
        ArgKind::IcaoName => Arg::IcaoName(parse_icao_name(token)?),
        ArgKind::Frequency => {
            let mhz: f64 = token.parse().map_err(|_| bad("frequency", token))?;
            if !(2.0..=1000.0).contains(&mhz) {
                return Err(bad("frequency", token));
            }
            Arg::Frequency(mhz)
        }
        ArgKind::Degrees => {
            let (digits, true_north) = match token.strip_suffix('T') {
                Some(d) => (d, true),
                None => (token, false),
            };
            let deg: u16 = digits.parse().map_err(|_| bad("degrees", token))?;
            Arg::Degrees(Degrees::new(deg, true_north).map_err(|_| bad("degrees", token))?)
        }
        ArgKind::Baro => Arg::Baro(parse_baro(token)?),
        ArgKind::Freetext => Arg::Freetext(unescape_percent(token)?),
        ArgKind::ErrInfo => Arg::ErrInfo(unescape_percent(token)?),
        ArgKind::AtisCode => Arg::AtisCode(unescape_percent(token)?),
        ArgKind::Persons => {
            let v: u32 = token.parse().map_err(|_| bad("persons", token))?;
            if v > 1024 {
                return Err(bad("persons", token));
            }
            Arg::Persons(v)
        }
        ArgKind::PosReport => {
            Arg::PosReport(Box::new(parse_posreport(&unescape_percent(token)?)?))
        }
        ArgKind::Pdc => Arg::Pdc(Box::new(parse_pdc(&unescape_percent(token)?)?)),
        ArgKind::Tp4Table => match token {
            "A" => Arg::Tp4Table(Tp4Label::A),
            "B" => Arg::Tp4Table(Tp4Label::B),
            _ => return Err(bad("tp4 label", token)),
        },
        ArgKind::Version => {
            let v: u32 = token.parse().map_err(|_| bad("version", token))?;
            if v > 255 {
                return Err(bad("version", token));
            }
            Arg::Version(v)
        }
        ArgKind::LegType => {
            if let Some(nm) = token.strip_prefix('D') {
                Arg::LegType(LegType::Distance(
                    nm.parse().map_err(|_| bad("leg type", token))?,
                ))
            } else if let Some(min) = token.strip_prefix('T') {
                Arg::LegType(LegType::Time(
                    min.parse().map_err(|_| bad("leg type", token))?,
                ))
            } else {
                return Err(bad("leg type", token));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_round_trip() {
        for s in ["", "ABC", "A B/C%", "hello, world.", "x=1/y=2\r\n"] {
            assert_eq!(unescape_percent(&escape_percent(s)).unwrap(), s);
        }
    }

    #[test]
    fn escape_rejects_nul_and_truncation() {
        assert!(unescape_percent("%00").is_err());
        assert!(unescape_percent("%2").is_err());
        assert!(unescape_percent("%zz").is_err());
    }

    #[test]
    fn altitude_tokens() {
        assert_eq!(altitude_token(&Altitude::flight_level(600).unwrap()), "FL600");
        assert_eq!(parse_altitude("FL600").unwrap().value, 60_000);
        assert!(parse_altitude("FL000").is_err());
        assert_eq!(parse_altitude("-1500").unwrap().value, -1500);
        assert!(parse_altitude("-1501").is_err());
        assert!(parse_altitude("100001").is_err());
        assert_eq!(parse_altitude("3500M").unwrap().metric, true);
        assert_eq!(parse_altitude("FL12000M").unwrap().fl, true);
        assert!(parse_altitude("FL20001M").is_err());
    }

    #[test]
    fn speed_tokens() {
        assert_eq!(parse_speed("250").unwrap(), Speed::knots(250).unwrap());
        assert_eq!(
            parse_speed("M.82").unwrap(),
            Speed::mach_thousandths(820).unwrap()
        );
        assert_eq!(speed_token(&Speed::mach_thousandths(1200).unwrap()), "M1.20");
        assert_eq!(
            parse_speed("M1.20").unwrap(),
            Speed::mach_thousandths(1200).unwrap()
        );
        assert!(parse_speed("M.8").is_err());
        assert!(parse_speed("-1").is_err());
    }

    #[test]
    fn squawk_boundaries() {
        assert_eq!(parse_squawk("0000").unwrap(), 0);
        assert_eq!(parse_squawk("7777").unwrap(), 0o7777);
        assert!(parse_squawk("7778").is_err());
        assert!(parse_squawk("777").is_err());
    }

    #[test]
    fn position_tokens() {
        let pos = Position::LatLon(LatLon::new(47.5, -122.25).unwrap());
        let tok = position_token(&pos);
        assert_eq!(tok, "LATLON:47.5,-122.25");
        assert_eq!(parse_position(&tok).unwrap(), pos);

        let pbd = Position::Pbd(PlaceBearingDistance {
            fix: "OKG".into(),
            lat_lon: None,
            degrees: 120,
            dist_nm: 15.5,
        });
        assert_eq!(parse_position(&position_token(&pbd)).unwrap(), pbd);

        let unk = Position::Unparsed("SOME WHERE".into());
        assert_eq!(parse_position(&position_token(&unk)).unwrap(), unk);
    }

    #[test]
    fn posreport_round_trip() {
        let mut rep = PositionReport::basic(
            Position::Fix("OKG".into()),
            CpdlcTime::utc(12, 30).unwrap(),
            Altitude::flight_level(350).unwrap(),
        );
        rep.wind = Some(Wind {
            direction: 270,
            speed: 45,
        });
        rep.temp = Some(-52);
        rep.turbulence = Some(Turbulence::Light);
        rep.vvi = Some(-500);
        rep.remarks = Some("RIDE REPORTS LIGHT CHOP".into());
        rep.dist_nm = Some(123.5);
        let fields = posreport_fields(&rep);
        assert_eq!(parse_posreport(&fields).unwrap(), rep);
    }

    #[test]
    fn route_round_trip() {
        let mut route = Route::default();
        route.orig_icao = Some("KSEA".into());
        route.dest_icao = Some("KLAX".into());
        route.orig_rwy = Some("16L".into());
        route.sid = Some(Procedure {
            kind: ProcedureKind::Departure,
            name: "HAROB6".into(),
            transition: "OLM".into(),
        });
        route.entries.push(RouteEntry::Airway("J5".into()));
        route.entries.push(RouteEntry::PubIdent {
            fix: "OED".into(),
            lat_lon: Some(LatLon::new(42.48, -122.91).unwrap()),
        });
        route.entries.push(RouteEntry::Unknown("DCT".into()));
        route.add_info.hold_at.push(HoldAtWpt {
            pos: Position::Fix("OED".into()),
            spd_low: Some(Speed::knots(210).unwrap()),
            alt: Some(AltConstraint {
                toler: AltToler::AtOrAbove,
                alt: Altitude::flight_level(240).unwrap(),
            }),
            spd_high: None,
            dir: Some(Direction::Right),
            degrees: Some(270),
            efc: Some(CpdlcTime::utc(13, 45).unwrap()),
            leg: Some(LegType::Time(1.5)),
        });
        route.add_info.rta.push(Rta {
            pos: Position::Fix("LMT".into()),
            time: CpdlcTime::utc(14, 10).unwrap(),
            toler: TimeToler::AtOrBefore,
        });
        let fields = route_fields(&route);
        assert_eq!(parse_route(&fields).unwrap(), route);
    }

    #[test]
    fn pdc_round_trip() {
        let mut route = Route::default();
        route.orig_icao = Some("KPDX".into());
        route.dest_icao = Some("KSFO".into());
        route.entries.push(RouteEntry::Unknown("DCT".into()));
        let pdc = DepartureClearance {
            acf_id: "ACA123".into(),
            acf_type: Some("B738".into()),
            equipment: EquipmentCode {
                com_nav_available: true,
                com_nav: vec![ComNavEquipment::Gnss, ComNavEquipment::Ils],
                ssr: SsrEquipment::ModeS,
            },
            time_dep: (14, 25),
            route,
            alt_restr: Some(Altitude::feet(5000).unwrap()),
            freq: 124.2,
            squawk: 0o4201,
            revision: 2,
        };
        let fields = pdc_fields(&pdc);
        assert_eq!(parse_pdc(&fields).unwrap(), pdc);
    }

    #[test]
    fn arg_dispatch_round_trip() {
        let args = [
            Arg::Altitude(Altitude::flight_level(350).unwrap()),
            Arg::Speed(Speed::knots(280).unwrap()),
            Arg::Time(CpdlcTime::Now),
            Arg::TimeDur(45),
            Arg::Position(Position::Fix("ELN".into())),
            Arg::Direction(Direction::Either),
            Arg::Distance(20.0),
            Arg::DistanceOffset(5.5),
            Arg::Vvi(1500),
            Arg::ToFrom(false),
            Arg::Procedure(Procedure {
                kind: ProcedureKind::Arrival,
                name: "GLASR1".into(),
                transition: "MAHTA".into(),
            }),
            Arg::Squawk(0o2000),
            Arg::IcaoId("KZSE".into()),
            Arg::IcaoName(IcaoName {
                is_name: true,
                text: "SEATTLE CENTER".into(),
                function: FacilityFunction::Center,
            }),
            Arg::Frequency(128.35),
            Arg::Degrees(Degrees::new(270, true).unwrap()),
            Arg::Baro(Baro {
                hpa: true,
                value: 1013.0,
            }),
            Arg::Freetext("DUE TO TRAFFIC".into()),
            Arg::Persons(143),
            Arg::Tp4Table(Tp4Label::B),
            Arg::ErrInfo("UNRECOGNIZED MESSAGE".into()),
            Arg::Version(1),
            Arg::AtisCode("K".into()),
            Arg::LegType(LegType::Distance(10.0)),
        ];
        for arg in args {
            let tok = arg_token(&arg);
            assert!(!tok.contains(' '), "token with space: {tok}");
            let back = parse_arg(arg.kind(), &tok).unwrap();
            assert_eq!(back, arg, "token {tok}");
        }
    }

    #[test]
    fn range_rejections() {
        assert!(parse_arg(ArgKind::Vvi, "10001").is_err());
        assert!(parse_arg(ArgKind::Distance, "20001").is_err());
        assert!(parse_arg(ArgKind::Degrees, "0").is_err());
        assert!(parse_arg(ArgKind::Degrees, "361").is_err());
        assert!(parse_arg(ArgKind::Baro, "5000").is_err());
    }

    #[test]
    fn baro_unlabeled_decode() {
        // Scenario: "ALTIMETER 1013" arriving as a bare number.
        let arg = parse_arg(ArgKind::Baro, "1013").unwrap();
        assert_eq!(
            arg,
            Arg::Baro(Baro {
                hpa: true,
                value: 1013.0
            })
        );
        let arg = parse_arg(ArgKind::Baro, "2992").unwrap();
        match arg {
            Arg::Baro(b) => {
                assert!(!b.hpa);
                assert!((b.value - 29.92).abs() < 1e-9);
            }
            _ => unreachable!(),
        }
    }
}
