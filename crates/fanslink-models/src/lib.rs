//! Shared data model and wire codecs for the fanslink CPDLC stack.
//!
//! This crate defines the message model ([`Message`], [`Segment`],
//! [`Arg`]), the static catalog of standardized message types
//! ([`catalog`]), and the two wire forms: the keyed-field text codec
//! ([`text`]) and the ARINC 622 / PER binary codec ([`arinc622`]).
//!
//! The broker ([`fanslink-server`]) and the client runtime
//! ([`fanslink-sdk`]) both build on this crate; neither defines wire
//! formats of its own.

pub mod arg;
pub mod arinc622;
pub mod catalog;
pub mod error;
pub mod message;
pub mod pdc;
pub mod per;
pub mod posreport;
pub mod route;
pub mod text;
pub mod types;
pub mod wire;

pub use arg::{Arg, ArgKind};
pub use catalog::{
    find_entry, find_entry_by_id, CatalogEntry, MessageDirection, ResponseClass,
    DEFERRED_TTL_SECS, DOWNLINK_CATALOG, UPLINK_CATALOG,
};
pub use error::{DecodeError, ModelError};
pub use message::{Message, Segment, MAX_SEGMENTS};
pub use pdc::{DepartureClearance, EquipmentCode};
pub use posreport::PositionReport;
pub use route::{Route, RouteEntry};
pub use types::{
    Altitude, Baro, Callsign, CpdlcTime, Degrees, Direction, FacilityFunction, IcaoName,
    LatLon, LegType, PacketType, Position, Procedure, ProcedureKind, Speed, Timestamp, Tp4Label,
};
