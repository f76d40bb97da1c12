//! Authoritative in-memory registry of clients and channels.
//!
//! The store owns every [`Client`] and [`Channel`] record; handlers borrow
//! them for the duration of one dispatch. Channel membership is indexed both
//! ways (channel holds member ids, client holds folded channel names) and
//! every mutation here keeps the two sides consistent.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use super::message::Message;
use super::modes::ChannelModes;

/// Opaque per-connection identity, stable for the session's lifetime.
pub type ClientId = u64;

/// Soft bound on a client's outbound queue. A client whose queue would grow
/// past this is dropped with `ERROR :SendQ exceeded`.
pub const SENDQ_LIMIT: usize = 64 * 1024;

/// Normalize for case-insensitive comparison (CASEMAPPING=ascii). Applied to
/// nicks and channel names alike.
pub fn fold(s: &str) -> String {
    s.to_ascii_lowercase()
}

/// Nickname grammar: a letter or special opener, then letters, digits,
/// specials, or `-`, at most 30 bytes.
pub fn is_valid_nick(nick: &str) -> bool {
    const SPECIAL: &[char] = &['[', ']', '\\', '`', '_', '^', '{', '|', '}'];
    let mut chars = nick.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    nick.len() <= 30
        && (first.is_ascii_alphabetic() || SPECIAL.contains(&first))
        && chars.all(|c| c.is_ascii_alphanumeric() || SPECIAL.contains(&c) || c == '-')
}

/// Channel names open with `#` or `&`, at most 50 bytes, and contain no
/// spaces, commas, or control-G.
pub fn is_valid_channel_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix(['#', '&']) else {
        return false;
    };
    !rest.is_empty() && name.len() <= 50 && !rest.contains([' ', ',', '\x07', '\0'])
}

/// Entry in a client's outbound queue.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A complete IRC line to put on the wire.
    Line(Message),
    /// Flush what has been sent so far and close the connection. QUIT, SendQ
    /// overflow, and server shutdown all end sessions through this marker.
    Quit,
}

/// Sender side of a client's outbound queue, plus its byte accounting.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    tx: mpsc::UnboundedSender<Outbound>,
    queued: Arc<AtomicUsize>,
}

impl ClientHandle {
    pub fn new() -> (ClientHandle, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ClientHandle {
            tx,
            queued: Arc::new(AtomicUsize::new(0)),
        };
        (handle, rx)
    }

    /// Enqueue one line. Growing the queue past [`SENDQ_LIMIT`] condemns the
    /// connection instead: the client gets an ERROR line and a close marker.
    pub fn push(&self, msg: Message) {
        let len = msg.wire_len();
        let before = self.queued.fetch_add(len, Ordering::Relaxed);
        if before > SENDQ_LIMIT {
            // Already condemned by an earlier push.
            return;
        }
        if before + len > SENDQ_LIMIT {
            warn!(queued = before, "outbound queue overflow, dropping client");
            let error = Message::bare("ERROR", vec!["SendQ exceeded".into()]).trailing();
            let _ = self.tx.send(Outbound::Line(error));
            let _ = self.tx.send(Outbound::Quit);
            return;
        }
        let _ = self.tx.send(Outbound::Line(msg));
    }

    /// Ask the connection task to flush and close.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Outbound::Quit);
    }

    /// Return bytes to the queue budget once a line has left the queue.
    pub fn settle(&self, bytes: usize) {
        self.queued.fetch_sub(bytes, Ordering::Relaxed);
    }
}

/// Registration progress for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The server has a password and this connection has not presented it.
    NeedsPass,
    /// Password accepted (or none required); waiting for NICK and USER.
    NeedsIdentity,
    /// Welcome burst sent; the full command set is available.
    Registered,
}

/// One connected user session.
#[derive(Debug)]
pub struct Client {
    pub id: ClientId,
    pub handle: ClientHandle,
    pub reg: Registration,
    pub nick: Option<String>,
    pub username: String,
    pub realname: String,
    /// Folded names of every channel this client is in. Mirror of the
    /// channels' member sets, maintained by the store.
    pub channels: HashSet<String>,
}

impl Client {
    pub fn registered(&self) -> bool {
        self.reg == Registration::Registered
    }

    /// Display nick, with the conventional `*` placeholder until one is set.
    pub fn nick_or_star(&self) -> &str {
        self.nick.as_deref().unwrap_or("*")
    }
}

/// A named chat room.
#[derive(Debug)]
pub struct Channel {
    /// Display spelling, as the first joiner wrote it. Registry keys are the
    /// folded form.
    pub name: String,
    pub topic: String,
    pub modes: ChannelModes,
    pub members: BTreeSet<ClientId>,
    pub operators: BTreeSet<ClientId>,
    pub invited: BTreeSet<ClientId>,
}

impl Channel {
    fn new(name: &str, key: Option<String>) -> Channel {
        Channel {
            name: name.to_owned(),
            topic: String::new(),
            // New channels start topic-locked; a key supplied on the
            // creating JOIN becomes the channel key.
            modes: ChannelModes {
                topic_locked: true,
                key,
                ..ChannelModes::default()
            },
            members: BTreeSet::new(),
            operators: BTreeSet::new(),
            invited: BTreeSet::new(),
        }
    }

    pub fn is_member(&self, id: ClientId) -> bool {
        self.members.contains(&id)
    }

    pub fn is_operator(&self, id: ClientId) -> bool {
        self.operators.contains(&id)
    }

    pub fn is_invited(&self, id: ClientId) -> bool {
        self.invited.contains(&id)
    }

    /// Erase every trace of a client from this channel.
    fn purge(&mut self, id: ClientId) {
        self.members.remove(&id);
        self.operators.remove(&id);
        self.invited.remove(&id);
    }
}

/// Why a nickname was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NickError {
    /// Fails the nickname grammar.
    Erroneous,
    /// Held by another connection.
    InUse,
}

/// What a successful `set_nick` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NickChange {
    /// First nick of the session.
    Set,
    /// Replaced an earlier nick.
    Renamed { from: String },
    /// Same nick as before (case-insensitively); nothing to announce.
    Unchanged,
}

/// The whole server: every client, every channel, the connection password.
#[derive(Debug)]
pub struct ServerState {
    pub password: String,
    clients: HashMap<ClientId, Client>,
    /// Folded nick to owning client.
    nicks: HashMap<String, ClientId>,
    /// Folded channel name to channel.
    channels: HashMap<String, Channel>,
    next_id: ClientId,
}

impl ServerState {
    pub fn new(password: String) -> ServerState {
        ServerState {
            password,
            clients: HashMap::new(),
            nicks: HashMap::new(),
            channels: HashMap::new(),
            next_id: 1,
        }
    }

    /// Admit a fresh connection. Returns its handle for queue accounting and
    /// the receiver the connection task drains.
    pub fn register_client(&mut self) -> (ClientId, ClientHandle, mpsc::UnboundedReceiver<Outbound>) {
        let id = self.next_id;
        self.next_id += 1;
        let (handle, rx) = ClientHandle::new();
        let reg = if self.password.is_empty() {
            Registration::NeedsIdentity
        } else {
            Registration::NeedsPass
        };
        self.clients.insert(
            id,
            Client {
                id,
                handle: handle.clone(),
                reg,
                nick: None,
                username: String::new(),
                realname: String::new(),
                channels: HashSet::new(),
            },
        );
        (id, handle, rx)
    }

    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn client_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    pub fn client_by_nick(&self, nick: &str) -> Option<&Client> {
        self.nicks.get(&fold(nick)).and_then(|id| self.clients.get(id))
    }

    /// Claim `nick` for `id`, enforcing grammar and uniqueness.
    pub fn set_nick(&mut self, id: ClientId, nick: &str) -> Result<NickChange, NickError> {
        if !is_valid_nick(nick) {
            return Err(NickError::Erroneous);
        }
        let folded = fold(nick);
        if let Some(&owner) = self.nicks.get(&folded) {
            if owner != id {
                return Err(NickError::InUse);
            }
        }
        let client = self.clients.get_mut(&id).ok_or(NickError::InUse)?;
        let previous = client.nick.replace(nick.to_owned());
        match previous {
            Some(old) if fold(&old) == folded => {
                // Re-pointing the index is unnecessary; keep the new casing.
                Ok(NickChange::Unchanged)
            }
            Some(old) => {
                self.nicks.remove(&fold(&old));
                self.nicks.insert(folded, id);
                Ok(NickChange::Renamed { from: old })
            }
            None => {
                self.nicks.insert(folded, id);
                Ok(NickChange::Set)
            }
        }
    }

    /// Remove a client from every channel it is in (reaping channels that
    /// empty out), release its nick, and free the record.
    pub fn drop_client(&mut self, id: ClientId) -> Option<Client> {
        let client = self.clients.remove(&id)?;
        if let Some(nick) = &client.nick {
            self.nicks.remove(&fold(nick));
        }
        // Invite lists may hold the id even where membership does not, so
        // sweep every channel.
        self.channels.retain(|_, chan| {
            chan.purge(id);
            !chan.members.is_empty()
        });
        #[cfg(debug_assertions)]
        self.check_invariants();
        Some(client)
    }

    pub fn find_channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&fold(name))
    }

    pub fn find_channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(&fold(name))
    }

    /// Existing channel, or a new one with `creator` as first member and
    /// operator. Channel creation happens nowhere else.
    pub fn find_or_create_channel(
        &mut self,
        name: &str,
        creator: ClientId,
        key: Option<&str>,
    ) -> &mut Channel {
        let folded = fold(name);
        if !self.channels.contains_key(&folded) {
            let mut chan = Channel::new(name, key.map(str::to_owned));
            chan.members.insert(creator);
            chan.operators.insert(creator);
            self.channels.insert(folded.clone(), chan);
            if let Some(client) = self.clients.get_mut(&creator) {
                client.channels.insert(folded.clone());
            }
            #[cfg(debug_assertions)]
            self.check_invariants();
        }
        self.channels.get_mut(&folded).expect("channel just ensured")
    }

    /// Admit `id` to an existing channel, consuming any invitation.
    pub fn add_member(&mut self, name: &str, id: ClientId) {
        let folded = fold(name);
        if let Some(chan) = self.channels.get_mut(&folded) {
            chan.members.insert(id);
            chan.invited.remove(&id);
            if let Some(client) = self.clients.get_mut(&id) {
                client.channels.insert(folded);
            }
        }
        #[cfg(debug_assertions)]
        self.check_invariants();
    }

    /// Take `id` out of a channel, reaping it if it empties.
    pub fn remove_member(&mut self, name: &str, id: ClientId) {
        let folded = fold(name);
        if let Some(chan) = self.channels.get_mut(&folded) {
            chan.purge(id);
            if chan.members.is_empty() {
                self.channels.remove(&folded);
            }
        }
        if let Some(client) = self.clients.get_mut(&id) {
            client.channels.remove(&folded);
        }
        #[cfg(debug_assertions)]
        self.check_invariants();
    }

    /// All live channels in registry order.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Panic if any cross-index invariant is broken. Violations here are
    /// bugs in the store, not runtime errors.
    pub fn check_invariants(&self) {
        for (folded, chan) in &self.channels {
            assert!(
                chan.operators.is_subset(&chan.members),
                "operators outside membership in {folded}"
            );
            assert!(
                chan.invited.is_disjoint(&chan.members),
                "unconsumed invite for a member of {folded}"
            );
            assert!(!chan.members.is_empty(), "empty channel {folded} kept in registry");
            for id in &chan.members {
                let member = self.clients.get(id).expect("member without client record");
                assert!(
                    member.channels.contains(folded),
                    "client {id} missing back-reference to {folded}"
                );
            }
        }
        for (id, client) in &self.clients {
            for folded in &client.channels {
                let chan = self.channels.get(folded).expect("back-reference to dead channel");
                assert!(chan.members.contains(id), "stale membership of {id} in {folded}");
            }
            if let Some(nick) = &client.nick {
                assert_eq!(self.nicks.get(&fold(nick)), Some(id), "nick index out of sync");
            }
        }
        for (folded_nick, id) in &self.nicks {
            let owner = self.clients.get(id).expect("nick held by dead client");
            assert_eq!(
                owner.nick.as_deref().map(fold).as_deref(),
                Some(folded_nick.as_str()),
                "nick index points at the wrong client"
            );
        }
    }
}
