//! The broker core: connection registry, logon handling, routing,
//! store-and-forward, and the periodic maintenance tick.
//!
//! All connection state is owned by the single broker task; listener
//! and per-connection I/O tasks communicate with it exclusively over
//! the [`Event`] channel, so no locks guard the registries. The broker
//! task never awaits the authenticator or the RPC router — both run in
//! spawned tasks that post their results back as events.

use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fanslink_models::{
    text, Arg, Callsign, Message, MessageDirection, PacketType, Segment,
};

use crate::auth::{self, AuthRequest, AuthVerdict};
use crate::blocklist::Blocklist;
use crate::config::Config;
use crate::conn::{
    ConnId, ConnShared, Connection, InputStage, LogonState, PendingLogon, TransportKind,
};
use crate::queue::{DeferredQueue, EnqueueError};
use crate::registry::{run_hook, RegEntry, Registry};
use crate::router::{MsgRouter, RouteRequest, RouteVerdict};

/// Everything the I/O side reports to the broker task.
#[derive(Debug)]
pub enum Event {
    /// A connection finished its TLS (and WebSocket) handshake.
    Accepted {
        id: ConnId,
        kind: TransportKind,
        peer: SocketAddr,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
        shared: Arc<ConnShared>,
    },
    /// One decoded inbound message.
    Inbound { id: ConnId, msg: Message },
    /// Malformed or oversized input; the connection must die.
    InputError { id: ConnId, reason: String },
    /// The transport closed.
    Closed { id: ConnId },
    /// The authenticator answered a pending logon.
    AuthDone { id: ConnId, verdict: AuthVerdict },
    /// The RPC router decided a message's fate.
    RouteDone {
        id: ConnId,
        msg: Message,
        verdict: RouteVerdict,
    },
    /// SIGHUP: reopen the message log.
    ReopenMsgLog,
}

pub struct Broker {
    config: Config,
    conns: HashMap<ConnId, Connection>,
    registry: Registry,
    queue: DeferredQueue,
    blocklist: Arc<RwLock<Blocklist>>,
    router: Option<Arc<MsgRouter>>,
    msglog: Option<std::fs::File>,
    events_tx: mpsc::UnboundedSender<Event>,
    /// Broker-originated replies draw MINs from here.
    next_min: u32,
}

impl Broker {
    pub fn new(
        config: Config,
        blocklist: Arc<RwLock<Blocklist>>,
        events_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let router = MsgRouter::from_config(&config.msg_router).map(Arc::new);
        let msglog = open_msglog(&config);
        Self {
            queue: DeferredQueue::new(config.quota_bytes(), config.queue_max_bytes()),
            config,
            conns: HashMap::new(),
            registry: Registry::new(),
            blocklist,
            router,
            msglog,
            events_tx,
            next_min: 0,
        }
    }

    /// Drive the broker until cancellation. The 500 ms tick performs
    /// queue expiry, blocklist reloads, logon-grace enforcement, and
    /// the logon-list dump.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Event>, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(std::time::Duration::from_millis(500));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_event(event),
                        None => break,
                    }
                }
                _ = tick.tick() => self.handle_tick(Instant::now()),
                () = cancel.cancelled() => break,
            }
        }
        info!("broker loop stopped");
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Accepted {
                id,
                kind,
                peer,
                outbound,
                shared,
            } => {
                debug!(id, %peer, ?kind, "connection accepted");
                self.conns.insert(
                    id,
                    Connection {
                        id,
                        kind,
                        peer,
                        state: LogonState::None,
                        is_atc: false,
                        froms: Vec::new(),
                        to: None,
                        pending: None,
                        outbound,
                        shared,
                        accepted_at: Instant::now(),
                    },
                );
            }
            Event::Inbound { id, msg } => self.handle_inbound(id, msg),
            Event::InputError { id, reason } => {
                warn!(id, %reason, "closing connection on bad input");
                self.close_conn(id);
            }
            Event::Closed { id } => self.close_conn(id),
            Event::AuthDone { id, verdict } => self.finalize_logon(id, verdict),
            Event::RouteDone { id, msg, verdict } => match verdict {
                RouteVerdict::Forward { to } => self.deliver_or_queue(id, msg, &to),
                RouteVerdict::Discard => {
                    debug!(id, "message discarded by router");
                }
            },
            Event::ReopenMsgLog => {
                self.msglog = open_msglog(&self.config);
                info!("message log reopened");
            }
        }
    }

    pub fn handle_tick(&mut self, now: Instant) {
        let dropped = self.queue.expire(now);
        if dropped > 0 {
            debug!(dropped, "deferred messages expired");
        }

        let reloaded = self
            .blocklist
            .write()
            .map(|mut b| b.maybe_reload())
            .unwrap_or(false);
        if reloaded {
            let blocked: Vec<ConnId> = self
                .conns
                .values()
                .filter(|c| {
                    self.blocklist
                        .read()
                        .map(|b| b.is_blocked(c.peer.ip()))
                        .unwrap_or(false)
                })
                .map(|c| c.id)
                .collect();
            for id in blocked {
                info!(id, "closing connection now on blocklist");
                self.close_conn(id);
            }
        }

        let expired: Vec<ConnId> = self
            .conns
            .values()
            .filter(|c| c.state != LogonState::Complete && now >= c.logon_deadline())
            .map(|c| c.id)
            .collect();
        for id in expired {
            info!(id, "logon grace expired");
            self.close_conn(id);
        }

        if let Some(path) = self.config.logon_list_file.clone() {
            self.registry.write_logon_list(&path);
        }
    }

    // ------------------------------------------------------------------
    // Inbound dispatch
    // ------------------------------------------------------------------

    fn handle_inbound(&mut self, id: ConnId, msg: Message) {
        if !self.conns.contains_key(&id) {
            return;
        }
        if msg.logon.is_some() {
            self.handle_logon(id, msg);
        } else if msg.logoff {
            self.handle_logoff(id);
        } else {
            self.handle_message(id, msg);
        }
    }

    fn handle_logon(&mut self, id: ConnId, msg: Message) {
        let conn = &self.conns[&id];
        if matches!(conn.state, LogonState::Started | LogonState::Completing) {
            self.send_error(id, &msg, "LOGON ALREADY IN PROGRESS");
            return;
        }
        let Some(from) = msg.from.clone() else {
            self.send_error(id, &msg, "LOGON REQUIRES FROM= HEADER");
            return;
        };

        // A fresh aircraft logon supersedes its previous identity; ATC
        // only sheds the identity being replaced (multi-logon).
        if self.conns[&id].is_atc {
            self.drop_identity(id, from.as_str());
        } else {
            self.drop_all_identities(id);
        }

        let Some(conn) = self.conns.get_mut(&id) else {
            return;
        };
        conn.pending = Some(PendingLogon {
            from: from.as_str().to_string(),
            to: msg.to.as_ref().map(|c| c.as_str().to_string()),
            min: msg.min,
        });
        conn.state = LogonState::Started;
        conn.shared.set_stage(InputStage::LogonInFlight);

        let request = AuthRequest {
            logon_data: msg.logon.clone().unwrap_or_default(),
            from: from.as_str().to_string(),
            to: msg.to.as_ref().map(|c| c.as_str().to_string()),
            peer: conn.peer,
        };
        let auth_config = self.config.auth.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let verdict = auth::authenticate(&auth_config, request).await;
            let _ = events.send(Event::AuthDone { id, verdict });
        });
    }

    fn finalize_logon(&mut self, id: ConnId, verdict: AuthVerdict) {
        let Some(conn) = self.conns.get_mut(&id) else {
            return;
        };
        if conn.state != LogonState::Started {
            return;
        }
        conn.state = LogonState::Completing;
        let Some(pending) = conn.pending.take() else {
            conn.state = LogonState::None;
            return;
        };

        if !verdict.authorized {
            info!(id, from = %pending.from, "logon refused");
            self.reply_logon(id, "FAILURE", pending.min);
            if let Some(conn) = self.conns.get_mut(&id) {
                conn.state = LogonState::None;
                conn.shared.set_stage(InputStage::PreLogon);
            }
            return;
        }
        if !verdict.is_atc && pending.to.is_none() {
            let reference = Message {
                min: pending.min,
                ..Message::cpdlc()
            };
            self.send_error(id, &reference, "LOGON REQUIRES TO= HEADER");
            if let Some(conn) = self.conns.get_mut(&id) {
                conn.state = LogonState::None;
                conn.shared.set_stage(InputStage::PreLogon);
            }
            return;
        }

        let Some(conn) = self.conns.get_mut(&id) else {
            return;
        };
        conn.is_atc = verdict.is_atc;
        if verdict.is_atc {
            if !conn.has_from(&pending.from) {
                conn.froms.push(pending.from.clone());
            }
        } else {
            conn.froms = vec![pending.from.clone()];
            conn.to = pending.to.clone();
        }
        conn.state = LogonState::Complete;
        conn.shared.set_stage(InputStage::Complete);

        let entry = RegEntry {
            conn: id,
            to: if verdict.is_atc {
                None
            } else {
                pending.to.clone()
            },
            is_atc: verdict.is_atc,
            addr: conn.peer.to_string(),
            kind: conn.kind,
        };
        let addr = entry.addr.clone();
        let kind = entry.kind;
        self.registry.register(&pending.from, entry);
        if let Some(template) = &self.config.logon_cmd {
            run_hook(
                template,
                &pending.from,
                pending.to.as_deref().unwrap_or("-"),
                &addr,
                if verdict.is_atc { "ATC" } else { "ACFT" },
                kind.as_str(),
            );
        }

        info!(id, from = %pending.from, is_atc = verdict.is_atc, "logon complete");
        self.reply_logon(id, "SUCCESS", pending.min);

        // Anything parked for this identity goes out now, in order.
        for line in self.queue.take_for(&pending.from) {
            if let Some(conn) = self.conns.get(&id) {
                conn.send_line(line);
            }
        }
    }

    fn handle_logoff(&mut self, id: ConnId) {
        debug!(id, "logoff");
        self.drop_all_identities(id);
        if let Some(conn) = self.conns.get_mut(&id) {
            conn.state = LogonState::None;
            conn.is_atc = false;
            conn.to = None;
            conn.shared.set_stage(InputStage::PreLogon);
        }
    }

    fn handle_message(&mut self, id: ConnId, mut msg: Message) {
        let conn = &self.conns[&id];
        if conn.state != LogonState::Complete {
            self.send_error(id, &msg, "LOGON REQUIRED");
            return;
        }

        // Keepalives are answered in place and never logged.
        if msg.packet_type == PacketType::Ping {
            let pong = Message::pong(&msg);
            self.write_msg(id, &pong);
            return;
        }
        if msg.packet_type == PacketType::Pong {
            return;
        }

        // Stamp FROM= from the connection identity. ATC may speak as
        // any of its registered identities; AUTO resolves to the
        // recipient aircraft's current data authority.
        let conn = &self.conns[&id];
        if conn.is_atc {
            match msg.from.as_ref().map(|c| c.as_str().to_string()) {
                Some(from) if from == "AUTO" => {
                    let target = msg
                        .to
                        .as_ref()
                        .and_then(|to| self.registry.lookup(to.as_str()).first().cloned())
                        .and_then(|entry| entry.to);
                    match target {
                        Some(cda) => msg.from = Some(Callsign::new(&cda)),
                        None => {
                            self.send_error(id, &msg, "CANNOT RESOLVE AUTO IDENTITY");
                            return;
                        }
                    }
                }
                Some(from) => {
                    if !conn.has_from(&from) {
                        self.send_error(id, &msg, "INVALID FROM= IDENTITY");
                        return;
                    }
                }
                None => {
                    msg.from = conn.primary_from().map(Callsign::new);
                }
            }
        } else {
            // Aircraft always speak as their logged-on identity.
            msg.from = conn.primary_from().map(Callsign::new);
        }

        // Addressing rules differ by connection kind.
        let conn = &self.conns[&id];
        let to = if conn.is_atc {
            match &msg.to {
                Some(to) => to.as_str().to_string(),
                None => {
                    self.send_error(id, &msg, "MESSAGE REQUIRES TO= HEADER");
                    return;
                }
            }
        } else {
            let logon_target = conn.to.clone().unwrap_or_default();
            match &msg.to {
                Some(to) if to.as_str() != logon_target => {
                    // Only NOT CURRENT DATA AUTHORITY may escape to a
                    // station other than the current one.
                    let is_nda = msg
                        .segments
                        .first()
                        .map(|s| {
                            s.entry.direction == MessageDirection::Downlink
                                && s.entry.type_num == 63
                        })
                        .unwrap_or(false);
                    if !is_nda {
                        self.send_error(id, &msg, "MESSAGE CANNOT CARRY TO= HEADER");
                        return;
                    }
                    to.as_str().to_string()
                }
                Some(to) => to.as_str().to_string(),
                None => logon_target,
            }
        };
        msg.to = Some(Callsign::new(&to));

        // Direction vs connection kind.
        match (conn.is_atc, msg.direction()) {
            (false, Some(MessageDirection::Uplink)) => {
                self.send_svc_unavail(id, &msg);
                return;
            }
            (true, Some(MessageDirection::Downlink)) => {
                self.send_error(id, &msg, "INVALID MESSAGE DIRECTION");
                return;
            }
            _ => {}
        }

        self.log_message(&msg);

        if let Some(router) = self.router.clone() {
            let conn = &self.conns[&id];
            let request = RouteRequest {
                from: msg
                    .from
                    .as_ref()
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_default(),
                to: to.clone(),
                is_atc: conn.is_atc,
                is_ws: conn.kind == TransportKind::WebSocket,
                addr: conn.peer.to_string(),
                msgtype: msg
                    .segments
                    .first()
                    .map(|s| s.entry.id())
                    .unwrap_or_default(),
                min: msg.min,
                mrn: msg.mrn,
            };
            let events = self.events_tx.clone();
            tokio::spawn(async move {
                let verdict = router.route(request).await;
                let _ = events.send(Event::RouteDone { id, msg, verdict });
            });
            return;
        }

        self.deliver_or_queue(id, msg, &to);
    }

    /// Final routing step: fan out to every session of the recipient,
    /// or freeze the encoded form into the deferred queue.
    fn deliver_or_queue(&mut self, sender: ConnId, mut msg: Message, to: &str) {
        msg.to = Some(Callsign::new(to));
        let line = match text::encode(&msg) {
            Ok(line) => line.into_bytes(),
            Err(e) => {
                warn!(error = %e, "dropping unencodable message");
                return;
            }
        };
        let sessions: Vec<ConnId> = self.registry.lookup(to).iter().map(|e| e.conn).collect();
        if !sessions.is_empty() {
            for conn_id in sessions {
                if let Some(conn) = self.conns.get(&conn_id) {
                    conn.send_line(line.clone());
                }
            }
            return;
        }

        let Some(sender_conn) = self.conns.get(&sender) else {
            return;
        };
        let from = msg
            .from
            .as_ref()
            .map(|c| c.as_str().to_string())
            .unwrap_or_default();
        match self
            .queue
            .enqueue(&from, to, sender_conn.is_atc, line, Instant::now())
        {
            Ok(()) => {
                debug!(%from, %to, queued = self.queue.len(), "message deferred");
            }
            Err(EnqueueError::SenderQuota | EnqueueError::GlobalCap) => {
                self.send_error(sender, &msg, "TOO MANY QUEUED MESSAGES");
            }
        }
    }

    // ------------------------------------------------------------------
    // Replies
    // ------------------------------------------------------------------

    fn alloc_min(&mut self) -> u32 {
        let min = self.next_min;
        self.next_min = (self.next_min + 1) % 64;
        min
    }

    /// Semantic-error reply: `UM159 ERROR` toward aircraft, `DM62
    /// ERROR` toward ATC, MRN referencing the offending message.
    fn send_error(&mut self, id: ConnId, orig: &Message, reason: &str) {
        let Some(conn) = self.conns.get(&id) else {
            return;
        };
        let (direction, type_num) = if conn.is_atc { (MessageDirection::Downlink, 62) } else { (MessageDirection::Uplink, 159) };
        let mut reply = Message::cpdlc();
        reply.min = Some(self.alloc_min());
        reply.mrn = orig.min;
        match Segment::by_type(direction, type_num, 0, vec![Arg::ErrInfo(reason.to_string())]) {
            Ok(seg) => {
                reply.segments.push(seg);
                self.write_msg(id, &reply);
            }
            Err(e) => warn!(error = %e, "failed to build error reply"),
        }
    }

    /// `UM162 SERVICE UNAVAILABLE` for uplink-shaped traffic from an
    /// aircraft connection.
    fn send_svc_unavail(&mut self, id: ConnId, orig: &Message) {
        let mut reply = Message::cpdlc();
        reply.min = Some(self.alloc_min());
        reply.mrn = orig.min;
        match Segment::by_type(MessageDirection::Uplink, 162, 0, vec![]) {
            Ok(seg) => {
                reply.segments.push(seg);
                self.write_msg(id, &reply);
            }
            Err(e) => warn!(error = %e, "failed to build UM162 reply"),
        }
    }

    /// `LOGON=SUCCESS` / `LOGON=FAILURE`, MRN = the logon's MIN.
    fn reply_logon(&mut self, id: ConnId, verdict: &str, logon_min: Option<u32>) {
        let mut reply = Message::cpdlc();
        reply.min = Some(self.alloc_min());
        reply.mrn = logon_min;
        reply.logon = Some(verdict.to_string());
        self.write_msg(id, &reply);
    }

    fn write_msg(&self, id: ConnId, msg: &Message) {
        let Some(conn) = self.conns.get(&id) else {
            return;
        };
        match text::encode(msg) {
            Ok(line) => {
                conn.send_line(line.into_bytes());
            }
            Err(e) => warn!(error = %e, "failed to encode reply"),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    fn drop_identity(&mut self, id: ConnId, from: &str) {
        if let Some(entry) = self.registry.unregister(from, id) {
            self.fire_logoff_hook(from, &entry);
        }
        if let Some(conn) = self.conns.get_mut(&id) {
            conn.froms.retain(|f| f != from);
        }
    }

    fn drop_all_identities(&mut self, id: ConnId) {
        for (from, entry) in self.registry.unregister_conn(id) {
            self.fire_logoff_hook(&from, &entry);
        }
        if let Some(conn) = self.conns.get_mut(&id) {
            conn.froms.clear();
        }
    }

    fn fire_logoff_hook(&self, from: &str, entry: &RegEntry) {
        if let Some(template) = &self.config.logoff_cmd {
            run_hook(
                template,
                from,
                entry.to.as_deref().unwrap_or("-"),
                &entry.addr,
                if entry.is_atc { "ATC" } else { "ACFT" },
                entry.kind.as_str(),
            );
        }
    }

    fn close_conn(&mut self, id: ConnId) {
        self.drop_all_identities(id);
        if let Some(conn) = self.conns.remove(&id) {
            debug!(id, peer = %conn.peer, "connection closed");
        }
    }

    fn log_message(&mut self, msg: &Message) {
        let Some(log) = self.msglog.as_mut() else {
            return;
        };
        let line = format!(
            "{} {} -> {}: {}\n",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            msg.from.as_ref().map(Callsign::as_str).unwrap_or("-"),
            msg.to.as_ref().map(Callsign::as_str).unwrap_or("-"),
            msg.render(),
        );
        if let Err(e) = log.write_all(line.as_bytes()) {
            warn!(error = %e, "message log write failed");
        }
    }

    /// Number of live connections (tests and stats).
    pub fn conn_count(&self) -> usize {
        self.conns.len()
    }

    /// Deferred-queue depth (tests and stats).
    pub fn queued_msgs(&self) -> usize {
        self.queue.len()
    }
}

fn open_msglog(config: &Config) -> Option<std::fs::File> {
    let path = config.msglog.as_ref()?;
    match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot open message log");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanslink_models::Altitude;
    use std::time::Duration;

    struct TestPeer {
        id: ConnId,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    }

    impl TestPeer {
        /// Decode everything the broker wrote to this peer so far.
        fn drain(&mut self) -> Vec<Message> {
            let mut decoder = text::Decoder::new();
            let mut out = Vec::new();
            while let Ok(bytes) = self.rx.try_recv() {
                decoder.push(&bytes);
                while let Ok(Some(msg)) = decoder.next() {
                    out.push(msg);
                }
            }
            out
        }
    }

    struct Harness {
        broker: Broker,
        rx: mpsc::UnboundedReceiver<Event>,
        next_id: ConnId,
    }

    impl Harness {
        fn new(config: Config) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let blocklist = Arc::new(RwLock::new(Blocklist::new(None)));
            Self {
                broker: Broker::new(config, blocklist, tx),
                rx,
                next_id: 1,
            }
        }

        fn connect(&mut self) -> TestPeer {
            let id = self.next_id;
            self.next_id += 1;
            let (tx, rx) = mpsc::unbounded_channel();
            self.broker.handle_event(Event::Accepted {
                id,
                kind: TransportKind::Tls,
                peer: format!("10.0.0.{id}:40000").parse().unwrap(),
                outbound: tx,
                shared: ConnShared::new(),
            });
            TestPeer { id, rx }
        }

        /// Feed one inbound message and pump any async follow-up
        /// events (auth completions) back into the broker.
        async fn inbound(&mut self, peer: &TestPeer, msg: Message) {
            self.broker.handle_event(Event::Inbound { id: peer.id, msg });
            // Auto-auth completes through the event channel.
            while let Ok(Some(event)) =
                tokio::time::timeout(Duration::from_millis(50), self.rx.recv()).await
            {
                self.broker.handle_event(event);
            }
        }
    }

    fn logon_msg(from: &str, to: Option<&str>, min: u32) -> Message {
        let mut msg = Message::logon("SECRET", min);
        msg.from = Some(Callsign::new(from));
        msg.to = to.map(Callsign::new);
        msg
    }

    fn climb_msg(to: Option<&str>, min: u32) -> Message {
        let mut msg = Message::cpdlc();
        msg.min = Some(min);
        msg.to = to.map(Callsign::new);
        msg.add_segment(
            Segment::by_type(
                MessageDirection::Uplink,
                20,
                0,
                vec![Arg::Altitude(Altitude::flight_level(350).unwrap())],
            )
            .unwrap(),
        )
        .unwrap();
        msg
    }

    fn wilco_msg(min: u32, mrn: u32) -> Message {
        let mut msg = Message::cpdlc();
        msg.min = Some(min);
        msg.mrn = Some(mrn);
        msg.add_segment(Segment::by_type(MessageDirection::Downlink, 0, 0, vec![]).unwrap())
            .unwrap();
        msg
    }

    #[tokio::test]
    async fn logon_and_uplink_routing() {
        let mut h = Harness::new(Config::with_default_listener());
        let mut atc = h.connect();
        let mut acft = h.connect();

        // ATC logs on (no TO => treated as ATC by the auto-authorizer).
        h.inbound(&atc, logon_msg("CTR01", None, 1)).await;
        let replies = atc.drain();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].logon.as_deref(), Some("SUCCESS"));
        assert_eq!(replies[0].mrn, Some(1));

        // Aircraft logs on toward CTR01.
        h.inbound(&acft, logon_msg("ACA123", Some("CTR01"), 1)).await;
        assert_eq!(acft.drain()[0].logon.as_deref(), Some("SUCCESS"));

        // CTR01 sends a climb; it must arrive verbatim at the aircraft.
        h.inbound(&atc, climb_msg(Some("ACA123"), 5)).await;
        let delivered = acft.drain();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].min, Some(5));
        assert_eq!(delivered[0].from.as_ref().unwrap().as_str(), "CTR01");
        assert_eq!(delivered[0].render(), "CLIMB TO AND MAINTAIN FL350");

        // The aircraft's WILCO flows back.
        h.inbound(&acft, wilco_msg(7, 5)).await;
        let back = atc.drain();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].mrn, Some(5));
    }

    #[tokio::test]
    async fn deferred_delivery_on_logon() {
        let mut h = Harness::new(Config::with_default_listener());
        let mut atc = h.connect();
        h.inbound(&atc, logon_msg("CTR01", None, 1)).await;
        atc.drain();

        // No such aircraft yet: message parks in the queue.
        h.inbound(&atc, climb_msg(Some("ACFT99"), 9)).await;
        assert_eq!(h.broker.queued_msgs(), 1);

        // Aircraft connects within the TTL: delivery happens at logon
        // completion, and the queue drains.
        let mut acft = h.connect();
        h.inbound(&acft, logon_msg("ACFT99", Some("CTR01"), 1)).await;
        let msgs = acft.drain();
        assert_eq!(msgs.len(), 2); // LOGON=SUCCESS + the parked uplink
        assert_eq!(msgs[1].min, Some(9));
        assert_eq!(h.broker.queued_msgs(), 0);
    }

    #[tokio::test]
    async fn aircraft_uplink_draws_svc_unavail() {
        let mut h = Harness::new(Config::with_default_listener());
        let mut acft = h.connect();
        h.inbound(&acft, logon_msg("ACA123", Some("CTR01"), 1)).await;
        acft.drain();

        // An uplink-shaped message from an aircraft connection.
        h.inbound(&acft, climb_msg(None, 4)).await;
        let replies = acft.drain();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].segments[0].entry.id(), "UM162");
        assert_eq!(replies[0].mrn, Some(4));
        // Connection survives.
        assert_eq!(h.broker.conn_count(), 1);
    }

    #[tokio::test]
    async fn unlogged_message_rejected() {
        let mut h = Harness::new(Config::with_default_listener());
        let mut acft = h.connect();
        h.inbound(&acft, wilco_msg(1, 0)).await;
        let replies = acft.drain();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].render().contains("LOGON REQUIRED"));
    }

    #[tokio::test]
    async fn atc_message_requires_to() {
        let mut h = Harness::new(Config::with_default_listener());
        let mut atc = h.connect();
        h.inbound(&atc, logon_msg("CTR01", None, 1)).await;
        atc.drain();

        h.inbound(&atc, climb_msg(None, 2)).await;
        let replies = atc.drain();
        assert_eq!(replies[0].segments[0].entry.id(), "DM62");
        assert!(replies[0].render().contains("REQUIRES TO="));
    }

    #[tokio::test]
    async fn aircraft_cannot_address_other_stations() {
        let mut h = Harness::new(Config::with_default_listener());
        let mut acft = h.connect();
        h.inbound(&acft, logon_msg("ACA123", Some("CTR01"), 1)).await;
        acft.drain();

        // Addressing a station other than the CDA is refused...
        let mut msg = wilco_msg(2, 1);
        msg.to = Some(Callsign::new("CTR99"));
        h.inbound(&acft, msg).await;
        let replies = acft.drain();
        assert!(replies[0].render().contains("CANNOT CARRY TO="));

        // ...except for DM63 NOT CURRENT DATA AUTHORITY.
        let mut nda = Message::cpdlc();
        nda.min = Some(3);
        nda.to = Some(Callsign::new("CTR99"));
        nda.add_segment(Segment::by_type(MessageDirection::Downlink, 63, 0, vec![]).unwrap())
            .unwrap();
        h.inbound(&acft, nda).await;
        assert!(acft.drain().is_empty());
        assert_eq!(h.broker.queued_msgs(), 1);
    }

    #[tokio::test]
    async fn quota_overflow_reports_error() {
        let mut config = Config::with_default_listener();
        config.msgqueue.quota = "1k".to_string();
        let mut h = Harness::new(config);
        let mut acft = h.connect();
        h.inbound(&acft, logon_msg("ACA123", Some("CTR01"), 1)).await;
        acft.drain();

        // Undeliverable downlinks pile up against the 1 KiB quota.
        let mut saw_overflow = false;
        for min in 0..30 {
            let mut msg = Message::cpdlc();
            msg.min = Some(min);
            msg.add_segment(
                Segment::by_type(
                    MessageDirection::Downlink,
                    67,
                    0,
                    vec![Arg::Freetext("X".repeat(60))],
                )
                .unwrap(),
            )
            .unwrap();
            h.inbound(&acft, msg).await;
            for reply in acft.drain() {
                if reply.render().contains("TOO MANY QUEUED MESSAGES") {
                    saw_overflow = true;
                }
            }
        }
        assert!(saw_overflow);
        assert!(h.broker.queued_msgs() < 30);
    }

    #[tokio::test]
    async fn ping_answered_with_pong() {
        let mut h = Harness::new(Config::with_default_listener());
        let mut acft = h.connect();
        h.inbound(&acft, logon_msg("ACA123", Some("CTR01"), 1)).await;
        acft.drain();

        h.inbound(&acft, Message::ping(17)).await;
        let replies = acft.drain();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].packet_type, PacketType::Pong);
        assert_eq!(replies[0].mrn, Some(17));
    }

    #[tokio::test]
    async fn refused_logon_reverts_to_none() {
        let mut h = Harness::new(Config::with_default_listener());
        let mut acft = h.connect();
        // Start the logon, then answer it with a refusal as the
        // authenticator would.
        h.broker.handle_event(Event::Inbound {
            id: acft.id,
            msg: logon_msg("ACA123", Some("CTR01"), 6),
        });
        h.broker.handle_event(Event::AuthDone {
            id: acft.id,
            verdict: AuthVerdict {
                authorized: false,
                is_atc: false,
            },
        });
        let replies = acft.drain();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].logon.as_deref(), Some("FAILURE"));
        assert_eq!(replies[0].mrn, Some(6));

        // Connection is back to square one: a new logon is accepted.
        h.inbound(&acft, logon_msg("ACA123", Some("CTR01"), 7)).await;
        let replies = acft.drain();
        assert_eq!(replies.last().unwrap().logon.as_deref(), Some("SUCCESS"));
    }

    #[tokio::test]
    async fn logon_grace_closes_idle_connections() {
        let mut h = Harness::new(Config::with_default_listener());
        let _peer = h.connect();
        assert_eq!(h.broker.conn_count(), 1);
        h.broker.handle_tick(Instant::now() + Duration::from_secs(31));
        assert_eq!(h.broker.conn_count(), 0);
    }

    #[tokio::test]
    async fn repeated_logon_while_pending_is_refused() {
        let mut h = Harness::new(Config::with_default_listener());
        let mut acft = h.connect();
        // Feed the logon without pumping auth completion: state stays
        // Started, and a second logon must bounce.
        h.broker.handle_event(Event::Inbound {
            id: acft.id,
            msg: logon_msg("ACA123", Some("CTR01"), 1),
        });
        h.broker.handle_event(Event::Inbound {
            id: acft.id,
            msg: logon_msg("ACA123", Some("CTR01"), 2),
        });
        let replies = acft.drain();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].render().contains("ALREADY IN PROGRESS"));
    }
}
