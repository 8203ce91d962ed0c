//! The message list: groups exchanged messages into threads keyed by
//! the MIN/MRN chain and derives a per-thread status.
//!
//! The state machine itself is transport-free (all inputs are explicit:
//! messages in, clock in), which keeps it unit-testable;
//! [`MsgList::drive`] binds it to a [`LinkClient`](crate::LinkClient).

use std::time::{Duration, Instant};

use fanslink_models::{Message, MessageDirection, ResponseClass};

use crate::client::{LinkClient, MsgStatus, MsgToken};
use crate::error::SdkError;

/// Opaque thread identifier.
pub type ThreadId = u32;

/// Sentinel passed to [`MsgList::send`] to open a new thread.
pub const NO_THREAD_ID: ThreadId = u32::MAX;

/// Derived status of one message thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadStatus {
    /// Awaiting the expected response.
    Open,
    /// Explicitly closed by the application.
    Closed,
    /// Positive closure (WILCO / AFFIRM / ROGER / operational reply).
    Accepted,
    /// Negative closure (UNABLE / NEGATIVE).
    Rejected,
    /// The expected response did not arrive within the catalog timeout.
    TimedOut,
    /// A STANDBY was received; the dialogue stays pending.
    Standby,
    /// A message in this thread failed to transmit.
    Failed,
    /// Awaiting our own response to an incoming message.
    Pending,
    /// The uplink was disregarded.
    Disregard,
    /// Protocol error within the thread.
    Error,
}

impl ThreadStatus {
    /// Terminal states never regress (except via thread removal).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ThreadStatus::Accepted
                | ThreadStatus::Rejected
                | ThreadStatus::TimedOut
                | ThreadStatus::Failed
                | ThreadStatus::Disregard
                | ThreadStatus::Closed
        )
    }
}

/// One message recorded in a thread.
#[derive(Debug, Clone)]
pub struct ThreadMsg {
    pub msg: Message,
    /// `true` when we sent it, `false` when it was received.
    pub sent: bool,
    /// Send token, for sent messages.
    pub token: Option<MsgToken>,
    /// Wall-clock hours/minutes the entry was recorded.
    pub hours: u8,
    pub minutes: u8,
}

#[derive(Debug)]
struct Thread {
    id: ThreadId,
    msgs: Vec<ThreadMsg>,
    status: ThreadStatus,
    dirty: bool,
    /// Response deadline for the head message, when its catalog entry
    /// carries a timeout.
    deadline: Option<Instant>,
}

impl Thread {
    fn set_status(&mut self, status: ThreadStatus) {
        if self.status != status {
            self.status = status;
            self.dirty = true;
        }
    }

    /// MIN of the last message received in this thread.
    fn last_incoming_min(&self) -> Option<u32> {
        self.msgs
            .iter()
            .rev()
            .find(|m| !m.sent)
            .and_then(|m| m.msg.min)
    }

    /// Whether any sent message in this thread carries the given MIN.
    fn contains_sent_min(&self, min: u32) -> bool {
        self.msgs
            .iter()
            .any(|m| m.sent && m.msg.min == Some(min))
    }

    fn head(&self) -> &ThreadMsg {
        &self.msgs[0]
    }
}

/// The thread store.
#[derive(Debug, Default)]
pub struct MsgList {
    threads: Vec<Thread>,
    next_id: ThreadId,
}

impl MsgList {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, id: ThreadId) -> Result<usize, SdkError> {
        self.threads
            .iter()
            .position(|t| t.id == id)
            .ok_or(SdkError::UnknownThread(id))
    }

    /// Record an outbound message and return its thread.
    ///
    /// With [`NO_THREAD_ID`] a new thread is opened. Otherwise the
    /// message's MRN is set to the MIN of the last incoming message in
    /// the addressed thread before it is recorded; the prepared
    /// message (with MRN filled in) is returned for transmission.
    pub fn send(
        &mut self,
        mut msg: Message,
        thr_id: ThreadId,
        token: MsgToken,
        now: Instant,
    ) -> Result<(ThreadId, Message), SdkError> {
        let (hours, minutes) = wall_clock();
        if thr_id == NO_THREAD_ID {
            let id = self.next_id;
            self.next_id += 1;
            let deadline = msg
                .timeout_secs()
                .map(|secs| now + Duration::from_secs(u64::from(secs)));
            self.threads.push(Thread {
                id,
                msgs: vec![ThreadMsg {
                    msg: msg.clone(),
                    sent: true,
                    token: Some(token),
                    hours,
                    minutes,
                }],
                status: ThreadStatus::Open,
                dirty: false,
                deadline,
            });
            Ok((id, msg))
        } else {
            let idx = self.find(thr_id)?;
            if self.threads[idx].status.is_terminal() {
                return Err(SdkError::ThreadTerminal(thr_id));
            }
            if msg.mrn.is_none() {
                msg.mrn = self.threads[idx].last_incoming_min();
            }
            let thread = &mut self.threads[idx];
            thread.msgs.push(ThreadMsg {
                msg: msg.clone(),
                sent: true,
                token: Some(token),
                hours,
                minutes,
            });
            // Our answer settles an incoming request.
            if thread.status == ThreadStatus::Pending {
                thread.set_status(ThreadStatus::Closed);
            }
            Ok((thr_id, msg))
        }
    }

    /// Record an incoming message, correlating by MRN against the
    /// MIN-chain. Unmatched messages open a new thread awaiting our
    /// response. Messages addressed to a terminal thread are dropped
    /// and reported as an error.
    pub fn on_incoming(&mut self, msg: Message, now: Instant) -> Result<ThreadId, SdkError> {
        let (hours, minutes) = wall_clock();
        let matched = msg
            .mrn
            .and_then(|mrn| self.threads.iter().position(|t| t.contains_sent_min(mrn)));
        match matched {
            Some(idx) => {
                let id = self.threads[idx].id;
                if self.threads[idx].status.is_terminal() {
                    return Err(SdkError::ThreadTerminal(id));
                }
                let response = response_status(&self.threads[idx].head().msg, &msg);
                let thread = &mut self.threads[idx];
                thread.msgs.push(ThreadMsg {
                    msg,
                    sent: false,
                    token: None,
                    hours,
                    minutes,
                });
                if let Some(status) = response {
                    thread.set_status(status);
                    if status.is_terminal() || status == ThreadStatus::Standby {
                        thread.deadline = None;
                    }
                } else {
                    thread.dirty = true;
                }
                Ok(id)
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                let needs_answer = msg.response_class() != ResponseClass::N;
                let deadline = msg
                    .timeout_secs()
                    .map(|secs| now + Duration::from_secs(u64::from(secs)));
                self.threads.push(Thread {
                    id,
                    msgs: vec![ThreadMsg {
                        msg,
                        sent: false,
                        token: None,
                        hours,
                        minutes,
                    }],
                    status: if needs_answer {
                        ThreadStatus::Pending
                    } else {
                        ThreadStatus::Open
                    },
                    dirty: true,
                    deadline,
                });
                Ok(id)
            }
        }
    }

    /// Report a send failure for a token; the owning thread fails.
    pub fn on_send_failed(&mut self, token: MsgToken) {
        for thread in &mut self.threads {
            if thread.msgs.iter().any(|m| m.token == Some(token)) {
                if !thread.status.is_terminal() {
                    thread.set_status(ThreadStatus::Failed);
                    thread.deadline = None;
                }
                return;
            }
        }
    }

    /// Expire threads whose response deadline has passed.
    pub fn update(&mut self, now: Instant) {
        for thread in &mut self.threads {
            if thread.status.is_terminal() {
                continue;
            }
            if let Some(deadline) = thread.deadline {
                if now >= deadline {
                    thread.set_status(ThreadStatus::TimedOut);
                    thread.deadline = None;
                }
            }
        }
    }

    /// Pull completed work out of a client: inbound messages and send
    /// failures. Returns the threads touched by inbound traffic.
    pub fn drive(&mut self, client: &LinkClient, now: Instant) -> Vec<ThreadId> {
        let mut touched = Vec::new();
        while let Some(msg) = client.recv() {
            match self.on_incoming(msg, now) {
                Ok(id) => touched.push(id),
                Err(e) => tracing::debug!(error = %e, "dropping stray incoming message"),
            }
        }
        let tokens: Vec<MsgToken> = self
            .threads
            .iter()
            .flat_map(|t| t.msgs.iter().filter_map(|m| m.token))
            .collect();
        for token in tokens {
            if client.msg_status(token) == MsgStatus::SendFailed {
                self.on_send_failed(token);
            }
        }
        self.update(now);
        touched
    }

    /// Thread ids, optionally skipping closed/terminal threads.
    pub fn thread_ids(&self, ignore_closed: bool) -> Vec<ThreadId> {
        self.threads
            .iter()
            .filter(|t| !ignore_closed || !t.status.is_terminal())
            .map(|t| t.id)
            .collect()
    }

    /// Status and dirty flag of a thread.
    pub fn thread_status(&self, id: ThreadId) -> Result<(ThreadStatus, bool), SdkError> {
        let idx = self.find(id)?;
        Ok((self.threads[idx].status, self.threads[idx].dirty))
    }

    /// Clear a thread's dirty flag.
    pub fn mark_seen(&mut self, id: ThreadId) -> Result<(), SdkError> {
        let idx = self.find(id)?;
        self.threads[idx].dirty = false;
        Ok(())
    }

    /// Number of messages recorded in a thread.
    pub fn msg_count(&self, id: ThreadId) -> Result<usize, SdkError> {
        Ok(self.threads[self.find(id)?].msgs.len())
    }

    /// Access one recorded message.
    pub fn msg(&self, id: ThreadId, nr: usize) -> Result<&ThreadMsg, SdkError> {
        let idx = self.find(id)?;
        self.threads[idx]
            .msgs
            .get(nr)
            .ok_or(SdkError::UnknownThread(id))
    }

    /// Close a thread (no-op if already terminal).
    pub fn close(&mut self, id: ThreadId) -> Result<(), SdkError> {
        let idx = self.find(id)?;
        if !self.threads[idx].status.is_terminal() {
            self.threads[idx].set_status(ThreadStatus::Closed);
            self.threads[idx].deadline = None;
        }
        Ok(())
    }

    /// Remove a thread entirely.
    pub fn remove(&mut self, id: ThreadId) -> Result<(), SdkError> {
        let idx = self.find(id)?;
        self.threads.remove(idx);
        Ok(())
    }
}

fn wall_clock() -> (u8, u8) {
    let ts = fanslink_models::Timestamp::now();
    (ts.hours, ts.minutes)
}

/// Map an incoming response onto the thread status dictated by the
/// head message's expected response class.
fn response_status(head: &Message, response: &Message) -> Option<ThreadStatus> {
    let Some(seg) = response.segments.first() else {
        return None;
    };
    let (dir, num) = (seg.entry.direction, seg.entry.type_num);
    let is_wilco = dir == MessageDirection::Downlink && num == 0;
    let is_unable = (dir == MessageDirection::Downlink && num == 1)
        || (dir == MessageDirection::Uplink && num == 0);
    let is_standby = (dir == MessageDirection::Downlink && num == 2)
        || (dir == MessageDirection::Uplink && matches!(num, 1 | 2));
    let is_roger =
        (dir == MessageDirection::Downlink && num == 3) || (dir == MessageDirection::Uplink && num == 3);
    let is_affirm =
        (dir == MessageDirection::Downlink && num == 4) || (dir == MessageDirection::Uplink && num == 4);
    let is_negative =
        (dir == MessageDirection::Downlink && num == 5) || (dir == MessageDirection::Uplink && num == 5);
    let is_disregard = dir == MessageDirection::Uplink && num == 168;

    match head.response_class() {
        ResponseClass::Wu => {
            if is_wilco {
                Some(ThreadStatus::Accepted)
            } else if is_unable {
                Some(ThreadStatus::Rejected)
            } else if is_standby {
                Some(ThreadStatus::Standby)
            } else if is_disregard {
                Some(ThreadStatus::Disregard)
            } else {
                None
            }
        }
        ResponseClass::An => {
            if is_affirm {
                Some(ThreadStatus::Accepted)
            } else if is_negative {
                Some(ThreadStatus::Rejected)
            } else if is_standby {
                Some(ThreadStatus::Standby)
            } else {
                None
            }
        }
        ResponseClass::R => {
            if is_roger {
                Some(ThreadStatus::Accepted)
            } else if is_standby {
                Some(ThreadStatus::Standby)
            } else {
                None
            }
        }
        ResponseClass::Ne => {
            let head_entry = head.segments.first().map(|s| s.entry);
            let allowed = head_entry.map(|e| e.responses).unwrap_or(&[]);
            if allowed
                .iter()
                .any(|(n, sub)| *n == num && *sub == seg.entry.subtype)
            {
                Some(ThreadStatus::Accepted)
            } else if is_standby {
                Some(ThreadStatus::Standby)
            } else {
                None
            }
        }
        ResponseClass::Y => {
            if is_unable {
                Some(ThreadStatus::Rejected)
            } else if is_standby {
                Some(ThreadStatus::Standby)
            } else {
                Some(ThreadStatus::Accepted)
            }
        }
        ResponseClass::N => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanslink_models::{Altitude, Arg, Message, MessageDirection, Segment};

    fn uplink(num: u16, args: Vec<Arg>, min: u32) -> Message {
        let mut msg = Message::cpdlc();
        msg.min = Some(min);
        msg.add_segment(Segment::by_type(MessageDirection::Uplink, num, 0, args).unwrap())
            .unwrap();
        msg
    }

    fn downlink(num: u16, args: Vec<Arg>, min: u32, mrn: Option<u32>) -> Message {
        let mut msg = Message::cpdlc();
        msg.min = Some(min);
        msg.mrn = mrn;
        msg.add_segment(Segment::by_type(MessageDirection::Downlink, num, 0, args).unwrap())
            .unwrap();
        msg
    }

    fn climb(min: u32) -> Message {
        uplink(
            20,
            vec![Arg::Altitude(Altitude::flight_level(350).unwrap())],
            min,
        )
    }

    #[test]
    fn wilco_accepts_thread() {
        let mut list = MsgList::new();
        let now = Instant::now();
        let (id, _) = list.send(climb(5), NO_THREAD_ID, 1, now).unwrap();
        assert_eq!(list.thread_status(id).unwrap(), (ThreadStatus::Open, false));

        // DM0 WILCO answering MIN 5.
        list.on_incoming(downlink(0, vec![], 7, Some(5)), now).unwrap();
        let (status, dirty) = list.thread_status(id).unwrap();
        assert_eq!(status, ThreadStatus::Accepted);
        assert!(dirty);

        list.mark_seen(id).unwrap();
        assert_eq!(
            list.thread_status(id).unwrap(),
            (ThreadStatus::Accepted, false)
        );
    }

    #[test]
    fn unable_rejects_and_standby_holds() {
        let mut list = MsgList::new();
        let now = Instant::now();
        let (id, _) = list.send(climb(5), NO_THREAD_ID, 1, now).unwrap();
        list.on_incoming(downlink(2, vec![], 6, Some(5)), now).unwrap();
        assert_eq!(list.thread_status(id).unwrap().0, ThreadStatus::Standby);

        list.on_incoming(downlink(1, vec![], 7, Some(5)), now).unwrap();
        assert_eq!(list.thread_status(id).unwrap().0, ThreadStatus::Rejected);
    }

    #[test]
    fn terminal_thread_drops_later_messages() {
        let mut list = MsgList::new();
        let now = Instant::now();
        let (id, _) = list.send(climb(5), NO_THREAD_ID, 1, now).unwrap();
        list.on_incoming(downlink(0, vec![], 7, Some(5)), now).unwrap();
        assert_eq!(list.thread_status(id).unwrap().0, ThreadStatus::Accepted);

        let err = list
            .on_incoming(downlink(1, vec![], 8, Some(5)), now)
            .unwrap_err();
        assert!(matches!(err, SdkError::ThreadTerminal(_)));
        assert_eq!(list.msg_count(id).unwrap(), 2);
    }

    #[test]
    fn timeout_marks_thread() {
        let mut list = MsgList::new();
        let now = Instant::now();
        let (id, _) = list.send(climb(5), NO_THREAD_ID, 1, now).unwrap();
        // UM20 carries a short (100 s) timeout.
        list.update(now + Duration::from_secs(99));
        assert_eq!(list.thread_status(id).unwrap().0, ThreadStatus::Open);
        list.update(now + Duration::from_secs(101));
        assert_eq!(list.thread_status(id).unwrap().0, ThreadStatus::TimedOut);
    }

    #[test]
    fn send_failure_fails_thread() {
        let mut list = MsgList::new();
        let now = Instant::now();
        let (id, _) = list.send(climb(5), NO_THREAD_ID, 42, now).unwrap();
        list.on_send_failed(42);
        assert_eq!(list.thread_status(id).unwrap().0, ThreadStatus::Failed);
    }

    #[test]
    fn reply_in_thread_gets_mrn_chained() {
        let mut list = MsgList::new();
        let now = Instant::now();
        // Incoming UM20 (MIN 9) opens a Pending thread.
        let id = list.on_incoming(climb(9), now).unwrap();
        assert_eq!(list.thread_status(id).unwrap().0, ThreadStatus::Pending);

        // Our WILCO gets MRN 9 stamped automatically.
        let reply = downlink(0, vec![], 1, None);
        let (_, prepared) = list.send(reply, id, 2, now).unwrap();
        assert_eq!(prepared.mrn, Some(9));
        assert_eq!(list.thread_status(id).unwrap().0, ThreadStatus::Closed);
    }

    #[test]
    fn ne_class_closes_on_listed_response() {
        let mut list = MsgList::new();
        let now = Instant::now();
        // UM133 CONFIRM ALTITUDE expects DM32 PRESENT ALTITUDE.
        let (id, _) = list
            .send(uplink(133, vec![], 5), NO_THREAD_ID, 1, now)
            .unwrap();
        let reply = downlink(
            32,
            vec![Arg::Altitude(Altitude::flight_level(350).unwrap())],
            6,
            Some(5),
        );
        list.on_incoming(reply, now).unwrap();
        assert_eq!(list.thread_status(id).unwrap().0, ThreadStatus::Accepted);
    }

    #[test]
    fn close_and_remove() {
        let mut list = MsgList::new();
        let now = Instant::now();
        let (id, _) = list.send(climb(5), NO_THREAD_ID, 1, now).unwrap();
        list.close(id).unwrap();
        assert_eq!(list.thread_status(id).unwrap().0, ThreadStatus::Closed);
        assert!(list.thread_ids(true).is_empty());
        assert_eq!(list.thread_ids(false), vec![id]);
        list.remove(id).unwrap();
        assert!(matches!(
            list.thread_status(id),
            Err(SdkError::UnknownThread(_))
        ));
    }
}
