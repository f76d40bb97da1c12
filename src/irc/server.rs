//! Server core: accept loop, per-connection driver, command dispatch.
//!
//! One task per connection drives a `select!` over the framed socket and the
//! client's outbound queue. Handlers never touch a socket: they take the
//! state lock, mutate, and enqueue replies; the queue arm of the select loop
//! is the sole writer. Because every handler runs to completion under the
//! write lock on a single-threaded runtime, a frame's side effects are
//! observed atomically by all later frames.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use super::codec::IrcCodec;
use super::message::Message;
use super::modes::{parse_mode_string, ModeChange, ModeDelta};
use super::replies;
use super::state::{
    is_valid_channel_name, Channel, ClientId, NickChange, NickError, Outbound, Registration,
    ServerState,
};

/// Shared server state. The lock is uncontended in the single-threaded
/// runtime; it exists to hand each dispatch exclusive access.
pub type SharedState = Arc<RwLock<ServerState>>;

/// Verbs an unregistered connection may use; everything else is 451.
const PRE_REGISTRATION: [&str; 6] = ["PASS", "NICK", "USER", "QUIT", "PING", "CAP"];

/// Bind and serve until the listener fails. Callers race this against a
/// shutdown signal.
pub async fn run(port: u16, password: String) -> crate::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "listening");
    serve(listener, password).await
}

/// Accept loop over an already-bound listener.
pub async fn serve(listener: TcpListener, password: String) -> crate::Result<()> {
    let state: SharedState = Arc::new(RwLock::new(ServerState::new(password)));
    loop {
        let (socket, addr) = listener.accept().await?;
        info!(%addr, "new connection");
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            handle_client(socket, state).await;
            info!(%addr, "disconnected");
        });
    }
}

/// Drive one connection: read frames into the dispatcher, drain the outbound
/// queue onto the socket, and clean up through the single drop path however
/// the session ends.
async fn handle_client(socket: TcpStream, state: SharedState) {
    let mut framed = Framed::new(socket, IrcCodec::default());
    let (id, handle, mut rx) = state.write().await.register_client();

    loop {
        tokio::select! {
            // Reads are served before queued writes, matching the
            // read-then-write order of a poll iteration.
            biased;

            frame = framed.next() => match frame {
                Some(Ok(msg)) => {
                    debug!(id, raw = %msg, "frame");
                    dispatch(&state, id, &msg).await;
                }
                Some(Err(e)) => {
                    warn!(id, "read error: {e}");
                    break;
                }
                None => break,
            },

            entry = rx.recv() => match entry {
                Some(Outbound::Line(msg)) => {
                    let bytes = msg.wire_len();
                    if let Err(e) = framed.send(msg).await {
                        warn!(id, "write error: {e}");
                        break;
                    }
                    handle.settle(bytes);
                }
                // Everything enqueued before the marker has been sent.
                Some(Outbound::Quit) | None => break,
            },
        }
    }

    // QUIT already cleaned up; EOF and transport errors do it here.
    cleanup_client(&mut *state.write().await, id, "Connection closed");
}

/// Route one frame to its handler, enforcing the registration gate.
async fn dispatch(state: &SharedState, id: ClientId, msg: &Message) {
    let verb = msg.verb.to_ascii_uppercase();
    let mut st = state.write().await;
    let Some(client) = st.client(id) else {
        // Frames pipelined behind a QUIT land here.
        return;
    };
    if !client.registered() && !PRE_REGISTRATION.contains(&verb.as_str()) {
        let me = client.nick_or_star().to_owned();
        client.handle.push(replies::err_not_registered(&me));
        return;
    }

    match verb.as_str() {
        "PASS" => handle_pass(&mut st, id, msg),
        "NICK" => handle_nick(&mut st, id, msg),
        "USER" => handle_user(&mut st, id, msg),
        "CAP" => handle_cap(&st, id, msg),
        "PING" => handle_ping(&st, id, msg),
        "QUIT" => handle_quit(&mut st, id, msg),
        "JOIN" => handle_join(&mut st, id, msg),
        "PART" => handle_part(&mut st, id, msg),
        "PRIVMSG" => handle_privmsg(&st, id, msg, false),
        "NOTICE" => handle_privmsg(&st, id, msg, true),
        "INVITE" => handle_invite(&mut st, id, msg),
        "KICK" => handle_kick(&mut st, id, msg),
        "TOPIC" => handle_topic(&mut st, id, msg),
        "MODE" => handle_mode(&mut st, id, msg),
        "NAMES" => handle_names(&st, id, msg),
        "LIST" => handle_list(&st, id, msg),
        other => {
            debug!(id, verb = other, "unknown command");
            let me = me(&st, id);
            reply(&st, id, replies::err_unknown_command(&me, other));
        }
    }
}

// ── Plumbing ─────────────────────────────────────────────────────

/// The client's display nick, `*` until one is set.
fn me(st: &ServerState, id: ClientId) -> String {
    st.client(id).map(|c| c.nick_or_star().to_owned()).unwrap_or_else(|| "*".to_owned())
}

/// Enqueue one line for one client.
fn reply(st: &ServerState, id: ClientId, msg: Message) {
    if let Some(client) = st.client(id) {
        client.handle.push(msg);
    }
}

/// Enqueue `msg` on every member of a channel, in membership set order,
/// optionally skipping one client.
fn broadcast(st: &ServerState, chan: &str, skip: Option<ClientId>, msg: &Message) {
    let Some(channel) = st.find_channel(chan) else {
        return;
    };
    for &member in &channel.members {
        if Some(member) == skip {
            continue;
        }
        if let Some(client) = st.client(member) {
            client.handle.push(msg.clone());
        }
    }
}

/// Enqueue `msg` on every client sharing at least one channel with `id`,
/// each at most once, optionally including `id` itself first.
fn notify_shared(st: &ServerState, id: ClientId, msg: &Message, include_self: bool) {
    let Some(client) = st.client(id) else {
        return;
    };
    if include_self {
        client.handle.push(msg.clone());
    }
    let mut seen = BTreeSet::new();
    for name in &client.channels {
        let Some(chan) = st.find_channel(name) else {
            continue;
        };
        for &member in &chan.members {
            if member != id && seen.insert(member) {
                if let Some(peer) = st.client(member) {
                    peer.handle.push(msg.clone());
                }
            }
        }
    }
}

/// Space-separated member nicks in set order, operators marked with `@`.
fn member_names(st: &ServerState, chan: &Channel) -> String {
    chan.members
        .iter()
        .filter_map(|&m| {
            let nick = st.client(m)?.nick.clone()?;
            Some(if chan.is_operator(m) { format!("@{nick}") } else { nick })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Broadcast QUIT to every channel peer (each at most once), then remove the
/// client from the store. Idempotent: the QUIT handler and the connection
/// task's final call both land here.
fn cleanup_client(st: &mut ServerState, id: ClientId, reason: &str) {
    let Some(client) = st.client(id) else {
        return;
    };
    if client.registered() {
        if let Some(nick) = client.nick.clone() {
            let note = Message::user(&nick, "QUIT", vec![reason.to_owned()]).trailing();
            notify_shared(st, id, &note, false);
        }
    }
    st.drop_client(id);
    debug!(id, "client dropped");
}

// ── Registration ─────────────────────────────────────────────────

fn handle_pass(st: &mut ServerState, id: ClientId, msg: &Message) {
    let me = me(st, id);
    let Some(pass) = msg.params.first() else {
        reply(st, id, replies::err_need_more_params(&me, "PASS"));
        return;
    };
    let accepted = *pass == st.password;
    let Some(client) = st.client_mut(id) else {
        return;
    };
    match client.reg {
        Registration::NeedsPass if accepted => client.reg = Registration::NeedsIdentity,
        Registration::NeedsPass => {
            // Wrong password: registration does not advance.
            client.handle.push(replies::err_passwd_mismatch(&me));
        }
        // No password required, or sent again later: accepted silently.
        _ => {}
    }
}

fn handle_nick(st: &mut ServerState, id: ClientId, msg: &Message) {
    let me = me(st, id);
    let Some(client) = st.client(id) else {
        return;
    };
    if client.reg == Registration::NeedsPass {
        reply(st, id, replies::err_passwd_mismatch(&me));
        return;
    }
    let Some(nick) = msg.params.first().filter(|n| !n.is_empty()).cloned() else {
        reply(st, id, replies::err_no_nickname_given(&me));
        return;
    };
    match st.set_nick(id, &nick) {
        Err(NickError::Erroneous) => reply(st, id, replies::err_erroneous_nickname(&me, &nick)),
        Err(NickError::InUse) => reply(st, id, replies::err_nickname_in_use(&me, &nick)),
        Ok(NickChange::Unchanged) => {}
        Ok(NickChange::Renamed { from }) => {
            if st.client(id).is_some_and(|c| c.registered()) {
                let note = Message::user(&from, "NICK", vec![nick]).trailing();
                notify_shared(st, id, &note, true);
            }
        }
        Ok(NickChange::Set) => try_complete_registration(st, id),
    }
}

fn handle_user(st: &mut ServerState, id: ClientId, msg: &Message) {
    let me = me(st, id);
    let Some(client) = st.client(id) else {
        return;
    };
    if client.reg == Registration::NeedsPass {
        reply(st, id, replies::err_passwd_mismatch(&me));
        return;
    }
    if client.registered() {
        return;
    }
    if msg.params.len() < 4 {
        reply(st, id, replies::err_need_more_params(&me, "USER"));
        return;
    }
    if let Some(client) = st.client_mut(id) {
        client.username = msg.params[0].clone();
        client.realname = msg.params[3].clone();
    }
    try_complete_registration(st, id);
}

/// Once both the nick and the USER identity are in, promote the client and
/// send the welcome burst.
fn try_complete_registration(st: &mut ServerState, id: ClientId) {
    let Some(client) = st.client_mut(id) else {
        return;
    };
    if client.reg != Registration::NeedsIdentity || client.username.is_empty() {
        return;
    }
    let Some(nick) = client.nick.clone() else {
        return;
    };
    client.reg = Registration::Registered;
    for msg in replies::welcome_burst(&nick) {
        client.handle.push(msg);
    }
    info!(id, nick = %nick, "registered");
}

fn handle_cap(st: &ServerState, id: ClientId, msg: &Message) {
    // Minimal capability negotiation: an empty LS answer, everything else
    // accepted silently.
    if msg.params.first().is_some_and(|p| p.eq_ignore_ascii_case("LS")) {
        let me = me(st, id);
        reply(st, id, Message::server("CAP", vec![me, "LS".into(), String::new()]));
    }
}

// ── Session commands ─────────────────────────────────────────────

fn handle_ping(st: &ServerState, id: ClientId, msg: &Message) {
    match msg.params.first() {
        Some(token) => reply(st, id, replies::pong(token)),
        None => {
            let me = me(st, id);
            reply(st, id, replies::err_no_origin(&me));
        }
    }
}

fn handle_quit(st: &mut ServerState, id: ClientId, msg: &Message) {
    let reason = msg
        .params
        .first()
        .cloned()
        .unwrap_or_else(|| "Connection closed".to_owned());
    let Some(handle) = st.client(id).map(|c| c.handle.clone()) else {
        return;
    };
    cleanup_client(st, id, &reason);
    handle.shutdown();
}

// ── Channel commands ─────────────────────────────────────────────

/// Outcome of the admission checks for one JOIN target.
enum Admission {
    Create,
    Join,
    AlreadyIn,
    Denied(Message),
}

fn handle_join(st: &mut ServerState, id: ClientId, msg: &Message) {
    let me = me(st, id);
    let Some(targets) = msg.params.first() else {
        reply(st, id, replies::err_need_more_params(&me, "JOIN"));
        return;
    };
    let keys: Vec<&str> = msg
        .params
        .get(1)
        .map(|k| k.split(',').collect())
        .unwrap_or_default();

    for (i, name) in targets.split(',').enumerate() {
        if name.is_empty() {
            continue;
        }
        if !is_valid_channel_name(name) {
            reply(st, id, replies::err_no_such_channel(&me, name));
            continue;
        }
        let key = keys.get(i).copied().filter(|k| !k.is_empty());

        let admission = match st.find_channel(name) {
            None => Admission::Create,
            Some(chan) if chan.is_member(id) => Admission::AlreadyIn,
            Some(chan) if chan.modes.invite_only && !chan.is_invited(id) => {
                Admission::Denied(replies::err_invite_only(&me, name))
            }
            Some(chan) if chan.modes.key.as_deref().is_some_and(|want| key != Some(want)) => {
                Admission::Denied(replies::err_bad_channel_key(&me, name))
            }
            Some(chan) if chan.modes.limit.is_some_and(|l| chan.members.len() >= l) => {
                Admission::Denied(replies::err_channel_is_full(&me, name))
            }
            Some(_) => Admission::Join,
        };
        match admission {
            Admission::AlreadyIn => continue,
            Admission::Denied(err) => {
                reply(st, id, err);
                continue;
            }
            Admission::Create => {
                st.find_or_create_channel(name, id, key);
            }
            Admission::Join => st.add_member(name, id),
        }
        announce_join(st, id, &me, name);
    }
}

/// JOIN broadcast to the whole channel, then topic and names to the joiner.
fn announce_join(st: &ServerState, id: ClientId, me: &str, name: &str) {
    let Some(chan) = st.find_channel(name) else {
        return;
    };
    let display = chan.name.clone();
    broadcast(st, name, None, &Message::user(me, "JOIN", vec![display.clone()]));

    if chan.topic.is_empty() {
        reply(st, id, replies::no_topic(me, &display));
    } else {
        reply(st, id, replies::topic(me, &display, &chan.topic));
    }
    reply(st, id, replies::name_reply(me, &display, &member_names(st, chan)));
    reply(st, id, replies::end_of_names(me, &display));
}

fn handle_part(st: &mut ServerState, id: ClientId, msg: &Message) {
    let me = me(st, id);
    let Some(targets) = msg.params.first() else {
        reply(st, id, replies::err_need_more_params(&me, "PART"));
        return;
    };
    let reason = msg.params.get(1).filter(|r| !r.is_empty()).cloned();

    for name in targets.split(',') {
        if name.is_empty() {
            continue;
        }
        let Some(chan) = st.find_channel(name) else {
            reply(st, id, replies::err_no_such_channel(&me, name));
            continue;
        };
        if !chan.is_member(id) {
            reply(st, id, replies::err_not_on_channel(&me, name));
            continue;
        }
        let mut note = Message::user(&me, "PART", vec![chan.name.clone()]);
        if let Some(reason) = &reason {
            note.params.push(reason.clone());
            note = note.trailing();
        }
        broadcast(st, name, None, &note);
        st.remove_member(name, id);
    }
}

fn handle_privmsg(st: &ServerState, id: ClientId, msg: &Message, notice: bool) {
    let me = me(st, id);
    let verb = if notice { "NOTICE" } else { "PRIVMSG" };
    if msg.params.len() < 2 {
        if !notice {
            reply(st, id, replies::err_need_more_params(&me, verb));
        }
        return;
    }
    let text = &msg.params[1];

    for target in msg.params[0].split(',') {
        if target.is_empty() {
            continue;
        }
        if target.starts_with(['#', '&']) {
            let Some(chan) = st.find_channel(target) else {
                if !notice {
                    reply(st, id, replies::err_no_such_channel(&me, target));
                }
                continue;
            };
            if !chan.is_member(id) {
                if !notice {
                    reply(st, id, replies::err_cannot_send(&me, target));
                }
                continue;
            }
            let note =
                Message::user(&me, verb, vec![chan.name.clone(), text.clone()]).trailing();
            broadcast(st, target, Some(id), &note);
        } else {
            match st.client_by_nick(target) {
                Some(peer) => {
                    let to = peer.nick.clone().unwrap_or_else(|| target.to_owned());
                    peer.handle
                        .push(Message::user(&me, verb, vec![to, text.clone()]).trailing());
                }
                None => {
                    if !notice {
                        reply(st, id, replies::err_no_such_nick(&me, target));
                    }
                }
            }
        }
    }
}

fn handle_invite(st: &mut ServerState, id: ClientId, msg: &Message) {
    let me = me(st, id);
    if msg.params.len() < 2 {
        reply(st, id, replies::err_need_more_params(&me, "INVITE"));
        return;
    }
    let target_nick = &msg.params[0];
    let chan_name = &msg.params[1];

    let Some(chan) = st.find_channel(chan_name) else {
        reply(st, id, replies::err_no_such_channel(&me, chan_name));
        return;
    };
    if !chan.is_member(id) {
        reply(st, id, replies::err_not_on_channel(&me, chan_name));
        return;
    }
    if chan.modes.invite_only && !chan.is_operator(id) {
        reply(st, id, replies::err_chanop_needed(&me, chan_name));
        return;
    }
    let Some(target) = st.client_by_nick(target_nick) else {
        reply(st, id, replies::err_no_such_nick(&me, target_nick));
        return;
    };
    let target_id = target.id;
    let target_display = target.nick.clone().unwrap_or_else(|| target_nick.clone());
    if chan.is_member(target_id) {
        reply(st, id, replies::err_user_on_channel(&me, &target_display, chan_name));
        return;
    }
    let display = chan.name.clone();

    if let Some(chan) = st.find_channel_mut(chan_name) {
        chan.invited.insert(target_id);
    }
    reply(
        st,
        target_id,
        Message::user(&me, "INVITE", vec![target_display.clone(), display.clone()]).trailing(),
    );
    reply(st, id, replies::inviting(&me, &target_display, &display));
}

fn handle_kick(st: &mut ServerState, id: ClientId, msg: &Message) {
    let me = me(st, id);
    if msg.params.len() < 2 {
        reply(st, id, replies::err_need_more_params(&me, "KICK"));
        return;
    }
    let chan_name = &msg.params[0];
    let target_nick = &msg.params[1];
    let reason = msg.params.get(2).cloned().unwrap_or_else(|| me.clone());

    let Some(chan) = st.find_channel(chan_name) else {
        reply(st, id, replies::err_no_such_channel(&me, chan_name));
        return;
    };
    if !chan.is_member(id) {
        reply(st, id, replies::err_not_on_channel(&me, chan_name));
        return;
    }
    if !chan.is_operator(id) {
        reply(st, id, replies::err_chanop_needed(&me, chan_name));
        return;
    }
    let display = chan.name.clone();
    let target_id = match st.client_by_nick(target_nick) {
        Some(peer) if chan.is_member(peer.id) => peer.id,
        _ => {
            reply(
                st,
                id,
                replies::err_user_not_in_channel(&me, target_nick, &display),
            );
            return;
        }
    };
    let target_display = st
        .client(target_id)
        .and_then(|c| c.nick.clone())
        .unwrap_or_else(|| target_nick.clone());

    let note =
        Message::user(&me, "KICK", vec![display, target_display, reason]).trailing();
    broadcast(st, chan_name, None, &note);
    st.remove_member(chan_name, target_id);
}

fn handle_topic(st: &mut ServerState, id: ClientId, msg: &Message) {
    let me = me(st, id);
    let Some(chan_name) = msg.params.first() else {
        reply(st, id, replies::err_need_more_params(&me, "TOPIC"));
        return;
    };
    let Some(chan) = st.find_channel(chan_name) else {
        reply(st, id, replies::err_no_such_channel(&me, chan_name));
        return;
    };
    let display = chan.name.clone();

    let Some(new_topic) = msg.params.get(1) else {
        if chan.topic.is_empty() {
            reply(st, id, replies::no_topic(&me, &display));
        } else {
            reply(st, id, replies::topic(&me, &display, &chan.topic));
        }
        return;
    };
    if !chan.is_member(id) {
        reply(st, id, replies::err_not_on_channel(&me, chan_name));
        return;
    }
    if chan.modes.topic_locked && !chan.is_operator(id) {
        reply(st, id, replies::err_chanop_needed(&me, chan_name));
        return;
    }
    let new_topic = new_topic.clone();
    if let Some(chan) = st.find_channel_mut(chan_name) {
        chan.topic = new_topic.clone();
    }
    let note = Message::user(&me, "TOPIC", vec![display, new_topic]).trailing();
    broadcast(st, chan_name, None, &note);
}

fn handle_mode(st: &mut ServerState, id: ClientId, msg: &Message) {
    let me = me(st, id);
    let Some(target) = msg.params.first() else {
        reply(st, id, replies::err_need_more_params(&me, "MODE"));
        return;
    };
    if !target.starts_with(['#', '&']) {
        // Clients probe their own modes at connect; none are modeled.
        reply(st, id, replies::umode_is(&me));
        return;
    }
    let Some(chan) = st.find_channel(target) else {
        reply(st, id, replies::err_no_such_channel(&me, target));
        return;
    };
    let display = chan.name.clone();

    let Some(modestring) = msg.params.get(1) else {
        reply(st, id, replies::channel_mode_is(&me, &display, &chan.modes));
        return;
    };
    if !chan.is_operator(id) {
        reply(st, id, replies::err_chanop_needed(&me, target));
        return;
    }

    let mut delta = ModeDelta::default();
    for change in parse_mode_string(modestring, &msg.params[2..]) {
        apply_mode_change(st, id, &me, target, &display, change, &mut delta);
    }
    if !delta.is_empty() {
        let mut params = vec![display];
        params.extend(delta.into_params());
        broadcast(st, target, None, &Message::user(&me, "MODE", params));
    }
}

/// Apply one parsed mode change, recording it in `delta` only if it took
/// effect. Changes whose required parameter is missing or invalid are
/// skipped without an error.
fn apply_mode_change(
    st: &mut ServerState,
    id: ClientId,
    me: &str,
    target: &str,
    display: &str,
    change: ModeChange,
    delta: &mut ModeDelta,
) {
    match change.mode {
        'i' => {
            if let Some(chan) = st.find_channel_mut(target) {
                if chan.modes.invite_only != change.setting {
                    chan.modes.invite_only = change.setting;
                    delta.push(change.setting, 'i', None);
                }
            }
        }
        't' => {
            if let Some(chan) = st.find_channel_mut(target) {
                if chan.modes.topic_locked != change.setting {
                    chan.modes.topic_locked = change.setting;
                    delta.push(change.setting, 't', None);
                }
            }
        }
        'k' => {
            if let Some(chan) = st.find_channel_mut(target) {
                if change.setting {
                    if let Some(key) = change.param.filter(|k| !k.is_empty()) {
                        chan.modes.key = Some(key.clone());
                        delta.push(true, 'k', Some(&key));
                    }
                } else if chan.modes.key.take().is_some() {
                    delta.push(false, 'k', None);
                }
            }
        }
        'l' => {
            if let Some(chan) = st.find_channel_mut(target) {
                if change.setting {
                    let Some(limit) = change
                        .param
                        .and_then(|p| p.parse::<usize>().ok())
                        .filter(|&n| n > 0)
                    else {
                        return;
                    };
                    chan.modes.limit = Some(limit);
                    delta.push(true, 'l', Some(&limit.to_string()));
                } else if chan.modes.limit.take().is_some() {
                    delta.push(false, 'l', None);
                }
            }
        }
        'o' => {
            let Some(nick) = change.param else {
                return;
            };
            let Some(target_id) = st.client_by_nick(&nick).map(|c| c.id) else {
                reply(st, id, replies::err_user_not_in_channel(me, &nick, display));
                return;
            };
            if !st.find_channel(target).is_some_and(|c| c.is_member(target_id)) {
                reply(st, id, replies::err_user_not_in_channel(me, &nick, display));
                return;
            }
            if let Some(chan) = st.find_channel_mut(target) {
                let changed = if change.setting {
                    chan.operators.insert(target_id)
                } else {
                    chan.operators.remove(&target_id)
                };
                if changed {
                    delta.push(change.setting, 'o', Some(&nick));
                }
            }
        }
        other => reply(st, id, replies::err_unknown_mode(me, other)),
    }
}

// ── Queries ──────────────────────────────────────────────────────

fn handle_names(st: &ServerState, id: ClientId, msg: &Message) {
    let me = me(st, id);
    match msg.params.first() {
        Some(targets) => {
            for name in targets.split(',') {
                if name.is_empty() {
                    continue;
                }
                if let Some(chan) = st.find_channel(name) {
                    reply(st, id, replies::name_reply(&me, &chan.name, &member_names(st, chan)));
                    reply(st, id, replies::end_of_names(&me, &chan.name));
                } else {
                    reply(st, id, replies::end_of_names(&me, name));
                }
            }
        }
        None => {
            for chan in st.channels() {
                reply(st, id, replies::name_reply(&me, &chan.name, &member_names(st, chan)));
            }
            reply(st, id, replies::end_of_names(&me, "*"));
        }
    }
}

fn handle_list(st: &ServerState, id: ClientId, msg: &Message) {
    let me = me(st, id);
    reply(st, id, replies::list_start(&me));
    match msg.params.first() {
        Some(targets) => {
            for name in targets.split(',') {
                if let Some(chan) = st.find_channel(name) {
                    reply(st, id, replies::list_entry(&me, &chan.name, chan.members.len(), &chan.topic));
                }
            }
        }
        None => {
            for chan in st.channels() {
                reply(st, id, replies::list_entry(&me, &chan.name, chan.members.len(), &chan.topic));
            }
        }
    }
    reply(st, id, replies::list_end(&me));
}
