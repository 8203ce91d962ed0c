//! Client SDK for the fanslink CPDLC network.
//!
//! Two layers:
//!
//! - [`client`] — the link runtime: TLS connection lifecycle, logon
//!   state machine, tokenised sends, non-blocking receive.
//! - [`msglist`] — the dialogue layer: MIN/MRN thread correlation and
//!   per-thread status tracking on top of a client.

pub mod client;
pub mod error;
pub mod msglist;

pub use client::{
    LinkClient, LinkConfig, LogonStatus, MsgStatus, MsgToken, DEFAULT_TLS_PORT,
    INVALID_MSG_TOKEN,
};
pub use error::SdkError;
pub use msglist::{MsgList, ThreadId, ThreadMsg, ThreadStatus, NO_THREAD_ID};
