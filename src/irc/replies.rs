//! Numeric replies and server-originated message builders.
//!
//! Every numeric has the shape `:42.IRC <code> <target> <params...>` where
//! the target is the recipient's nick (`*` before one is set). Handlers emit
//! nothing on the wire themselves; they enqueue what these builders return.

use super::message::Message;
use super::modes::ChannelModes;
use super::{SERVER_NAME, SERVER_VERSION};

fn numeric(code: &str, me: &str, mut rest: Vec<String>, trailing: &str) -> Message {
    let mut params = vec![me.to_owned()];
    params.append(&mut rest);
    params.push(trailing.to_owned());
    Message::server(code, params).trailing()
}

/// The 001-004 burst sent once when registration completes.
pub fn welcome_burst(me: &str) -> Vec<Message> {
    vec![
        numeric(
            "001",
            me,
            vec![],
            &format!("Welcome to the {SERVER_NAME} network, {me}"),
        ),
        numeric(
            "002",
            me,
            vec![],
            &format!("Your host is {SERVER_NAME}, running version {SERVER_VERSION}"),
        ),
        numeric("003", me, vec![], "This server was created today"),
        Message::server(
            "004",
            vec![
                me.to_owned(),
                SERVER_NAME.to_owned(),
                SERVER_VERSION.to_owned(),
                "o".to_owned(),
                "itkl".to_owned(),
            ],
        ),
    ]
}

// ── Command replies ──────────────────────────────────────────────

/// 221 RPL_UMODEIS (stub: no user modes are modeled)
pub fn umode_is(me: &str) -> Message {
    Message::server("221", vec![me.to_owned(), "+".to_owned()])
}

/// 324 RPL_CHANNELMODEIS
pub fn channel_mode_is(me: &str, chan: &str, modes: &ChannelModes) -> Message {
    let mut params = vec![me.to_owned(), chan.to_owned()];
    params.extend(modes.to_mode_string().split(' ').map(str::to_owned));
    Message::server("324", params)
}

/// 331 RPL_NOTOPIC
pub fn no_topic(me: &str, chan: &str) -> Message {
    numeric("331", me, vec![chan.to_owned()], "No topic is set")
}

/// 332 RPL_TOPIC
pub fn topic(me: &str, chan: &str, text: &str) -> Message {
    numeric("332", me, vec![chan.to_owned()], text)
}

/// 341 RPL_INVITING
pub fn inviting(me: &str, nick: &str, chan: &str) -> Message {
    Message::server("341", vec![me.to_owned(), nick.to_owned(), chan.to_owned()])
}

/// 353 RPL_NAMREPLY
pub fn name_reply(me: &str, chan: &str, names: &str) -> Message {
    numeric("353", me, vec!["=".to_owned(), chan.to_owned()], names)
}

/// 366 RPL_ENDOFNAMES
pub fn end_of_names(me: &str, chan: &str) -> Message {
    numeric("366", me, vec![chan.to_owned()], "End of /NAMES list")
}

/// 321 RPL_LISTSTART
pub fn list_start(me: &str) -> Message {
    numeric("321", me, vec!["Channel".to_owned()], "Users  Name")
}

/// 322 RPL_LIST
pub fn list_entry(me: &str, chan: &str, members: usize, topic: &str) -> Message {
    numeric(
        "322",
        me,
        vec![chan.to_owned(), members.to_string()],
        topic,
    )
}

/// 323 RPL_LISTEND
pub fn list_end(me: &str) -> Message {
    numeric("323", me, vec![], "End of /LIST")
}

/// PONG for a PING token.
pub fn pong(token: &str) -> Message {
    Message::server("PONG", vec![SERVER_NAME.to_owned(), token.to_owned()]).trailing()
}

// ── Error numerics ───────────────────────────────────────────────

/// 401 ERR_NOSUCHNICK
pub fn err_no_such_nick(me: &str, nick: &str) -> Message {
    numeric("401", me, vec![nick.to_owned()], "No such nick/channel")
}

/// 403 ERR_NOSUCHCHANNEL
pub fn err_no_such_channel(me: &str, chan: &str) -> Message {
    numeric("403", me, vec![chan.to_owned()], "No such channel")
}

/// 404 ERR_CANNOTSENDTOCHAN
pub fn err_cannot_send(me: &str, chan: &str) -> Message {
    numeric("404", me, vec![chan.to_owned()], "Cannot send to channel")
}

/// 409 ERR_NOORIGIN
pub fn err_no_origin(me: &str) -> Message {
    numeric("409", me, vec![], "No origin specified")
}

/// 421 ERR_UNKNOWNCOMMAND
pub fn err_unknown_command(me: &str, verb: &str) -> Message {
    numeric("421", me, vec![verb.to_owned()], "Unknown command")
}

/// 431 ERR_NONICKNAMEGIVEN
pub fn err_no_nickname_given(me: &str) -> Message {
    numeric("431", me, vec![], "No nickname given")
}

/// 432 ERR_ERRONEUSNICKNAME
pub fn err_erroneous_nickname(me: &str, nick: &str) -> Message {
    numeric("432", me, vec![nick.to_owned()], "Erroneous nickname")
}

/// 433 ERR_NICKNAMEINUSE
pub fn err_nickname_in_use(me: &str, nick: &str) -> Message {
    numeric("433", me, vec![nick.to_owned()], "Nickname is already in use")
}

/// 441 ERR_USERNOTINCHANNEL
pub fn err_user_not_in_channel(me: &str, nick: &str, chan: &str) -> Message {
    numeric(
        "441",
        me,
        vec![nick.to_owned(), chan.to_owned()],
        "They aren't on that channel",
    )
}

/// 442 ERR_NOTONCHANNEL
pub fn err_not_on_channel(me: &str, chan: &str) -> Message {
    numeric("442", me, vec![chan.to_owned()], "You're not on that channel")
}

/// 443 ERR_USERONCHANNEL
pub fn err_user_on_channel(me: &str, nick: &str, chan: &str) -> Message {
    numeric(
        "443",
        me,
        vec![nick.to_owned(), chan.to_owned()],
        "is already on channel",
    )
}

/// 451 ERR_NOTREGISTERED
pub fn err_not_registered(me: &str) -> Message {
    numeric("451", me, vec![], "You have not registered")
}

/// 461 ERR_NEEDMOREPARAMS
pub fn err_need_more_params(me: &str, verb: &str) -> Message {
    numeric("461", me, vec![verb.to_owned()], "Not enough parameters")
}

/// 464 ERR_PASSWDMISMATCH
pub fn err_passwd_mismatch(me: &str) -> Message {
    numeric("464", me, vec![], "Password incorrect")
}

/// 471 ERR_CHANNELISFULL
pub fn err_channel_is_full(me: &str, chan: &str) -> Message {
    numeric("471", me, vec![chan.to_owned()], "Cannot join channel (+l)")
}

/// 472 ERR_UNKNOWNMODE
pub fn err_unknown_mode(me: &str, mode: char) -> Message {
    numeric(
        "472",
        me,
        vec![mode.to_string()],
        "is unknown mode char to me",
    )
}

/// 473 ERR_INVITEONLYCHAN
pub fn err_invite_only(me: &str, chan: &str) -> Message {
    numeric("473", me, vec![chan.to_owned()], "Cannot join channel (+i)")
}

/// 475 ERR_BADCHANNELKEY
pub fn err_bad_channel_key(me: &str, chan: &str) -> Message {
    numeric("475", me, vec![chan.to_owned()], "Cannot join channel (+k)")
}

/// 482 ERR_CHANOPRIVSNEEDED
pub fn err_chanop_needed(me: &str, chan: &str) -> Message {
    numeric("482", me, vec![chan.to_owned()], "You're not channel operator")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numerics_carry_the_server_prefix() {
        let msg = err_invite_only("bob", "#x");
        assert_eq!(msg.to_wire(), ":42.IRC 473 bob #x :Cannot join channel (+i)");
    }

    #[test]
    fn welcome_burst_is_001_through_004() {
        let burst = welcome_burst("alice");
        let codes: Vec<_> = burst.iter().map(|m| m.verb.as_str()).collect();
        assert_eq!(codes, vec!["001", "002", "003", "004"]);
        assert!(burst[0].to_wire().contains("Welcome to the 42.IRC network, alice"));
        assert!(burst[3].to_wire().contains("0.1"));
    }

    #[test]
    fn channel_mode_reply_includes_parameters() {
        let modes = ChannelModes {
            invite_only: true,
            topic_locked: false,
            key: Some("sesame".into()),
            limit: Some(4),
        };
        let msg = channel_mode_is("alice", "#x", &modes);
        assert_eq!(msg.to_wire(), ":42.IRC 324 alice #x +ikl sesame 4");
    }

    #[test]
    fn pong_echoes_the_token() {
        assert_eq!(pong("token42").to_wire(), ":42.IRC PONG 42.IRC :token42");
    }

    #[test]
    fn names_reply_shape() {
        let msg = name_reply("alice", "#x", "@alice bob");
        assert_eq!(msg.to_wire(), ":42.IRC 353 alice = #x :@alice bob");
    }
}
