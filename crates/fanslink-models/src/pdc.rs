//! Pre-departure clearances (UM73 payload).

use serde::{Deserialize, Serialize};

use crate::route::Route;
use crate::types::Altitude;

/// Communication / navigation / approach-aid equipment status codes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComNavEquipment {
    LoranA,
    LoranC,
    Dme,
    Decca,
    Adf,
    Gnss,
    HfRtf,
    Ins,
    Ils,
    Omega,
    Vor,
    Doppler,
    Rnav,
    Tacan,
    UhfRtf,
    VhfRtf,
}

impl ComNavEquipment {
    /// Stable numeric tag used by the wire codecs.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(idx: u8) -> Option<Self> {
        use ComNavEquipment::*;
        Some(match idx {
            0 => LoranA,
            1 => LoranC,
            2 => Dme,
            3 => Decca,
            4 => Adf,
            5 => Gnss,
            6 => HfRtf,
            7 => Ins,
            8 => Ils,
            9 => Omega,
            10 => Vor,
            11 => Doppler,
            12 => Rnav,
            13 => Tacan,
            14 => UhfRtf,
            15 => VhfRtf,
            _ => return None,
        })
    }
}

/// SSR transponder capability.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SsrEquipment {
    #[default]
    Nil,
    ModeA,
    ModeAC,
    ModeS,
    ModeSPressureAlt,
    ModeSId,
    ModeSPressureAltId,
}

impl SsrEquipment {
    /// Stable numeric tag used by the wire codecs.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(idx: u8) -> Option<Self> {
        use SsrEquipment::*;
        Some(match idx {
            0 => Nil,
            1 => ModeA,
            2 => ModeAC,
            3 => ModeS,
            4 => ModeSPressureAlt,
            5 => ModeSId,
            6 => ModeSPressureAltId,
            _ => return None,
        })
    }
}

/// The aircraft equipment-code block of a PDC.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct EquipmentCode {
    /// COM/NAV/approach-aid equipment available and serviceable.
    pub com_nav_available: bool,
    pub com_nav: Vec<ComNavEquipment>,
    pub ssr: SsrEquipment,
}

/// A pre-departure clearance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DepartureClearance {
    /// Aircraft identifier (callsign). Required.
    pub acf_id: String,
    /// Aircraft type designator.
    pub acf_type: Option<String>,
    pub equipment: EquipmentCode,
    /// Proposed departure time, UTC hours/minutes. Required.
    pub time_dep: (u8, u8),
    /// Cleared route. Required.
    pub route: Route,
    /// Initial altitude restriction.
    pub alt_restr: Option<Altitude>,
    /// Departure frequency, MHz. Required.
    pub freq: f64,
    /// Assigned transponder code, octal value. Required.
    pub squawk: u16,
    /// Clearance revision number.
    pub revision: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equipment_indices_round_trip() {
        for idx in 0..16 {
            let eq = ComNavEquipment::from_index(idx).unwrap();
            assert_eq!(eq.index(), idx);
        }
        assert!(ComNavEquipment::from_index(16).is_none());
        for idx in 0..7 {
            let ssr = SsrEquipment::from_index(idx).unwrap();
            assert_eq!(ssr.index(), idx);
        }
        assert!(SsrEquipment::from_index(7).is_none());
    }
}
