//! End-to-end sessions against a live server on a loopback socket.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use cove::irc::server;

const PASSWORD: &str = "secret";

/// Bind on an OS-assigned port and serve in the background.
async fn start_server() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move { server::serve(listener, PASSWORD.to_owned()).await });
    port
}

struct Session {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Session {
    async fn connect(port: u16) -> Session {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let (read, writer) = stream.into_split();
        Session {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    /// Connect and complete the PASS/NICK/USER handshake through the 004
    /// numeric.
    async fn register(port: u16, nick: &str) -> Session {
        let mut session = Session::connect(port).await;
        session.send(&format!("PASS {PASSWORD}")).await;
        session.send(&format!("NICK {nick}")).await;
        session.send(&format!("USER {nick} 0 * :{nick}")).await;
        session.expect("001").await;
        session.expect("004").await;
        session
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    /// Read lines until one contains `needle`, returning it.
    async fn expect(&mut self, needle: &str) -> String {
        timeout(Duration::from_secs(2), async {
            loop {
                let line = self
                    .lines
                    .next_line()
                    .await
                    .unwrap()
                    .expect("connection closed while waiting");
                if line.contains(needle) {
                    return line;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}"))
    }

    /// Next line, or None if nothing arrives within the grace period.
    async fn try_next(&mut self) -> Option<String> {
        match timeout(Duration::from_millis(200), self.lines.next_line()).await {
            Ok(Ok(line)) => line,
            _ => None,
        }
    }
}

// ── S1: registration and join ────────────────────────────────────

#[tokio::test]
async fn registration_and_first_join() {
    let port = start_server().await;
    let mut alice = Session::connect(port).await;
    alice.send("PASS secret").await;
    alice.send("NICK alice").await;
    alice.send("USER a 0 * :Alice").await;
    for code in ["001", "002", "003", "004"] {
        let line = alice.expect(code).await;
        assert!(line.starts_with(":42.IRC"), "unexpected prefix: {line}");
    }

    alice.send("JOIN #x").await;
    assert_eq!(alice.expect("JOIN").await, ":alice JOIN #x");
    assert_eq!(
        alice.expect("331").await,
        ":42.IRC 331 alice #x :No topic is set"
    );
    assert_eq!(alice.expect("353").await, ":42.IRC 353 alice = #x :@alice");
    assert_eq!(
        alice.expect("366").await,
        ":42.IRC 366 alice #x :End of /NAMES list"
    );
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let port = start_server().await;
    let mut eve = Session::connect(port).await;
    eve.send("PASS letmein").await;
    eve.expect("464").await;
    // Identity commands still refuse to advance registration.
    eve.send("NICK eve").await;
    eve.expect("464").await;
}

// ── S2: invite-only enforcement ──────────────────────────────────

#[tokio::test]
async fn invite_only_flow() {
    let port = start_server().await;
    let mut alice = Session::register(port, "alice").await;
    alice.send("JOIN #x").await;
    alice.expect("366").await;
    alice.send("MODE #x +i").await;
    alice.expect("MODE #x +i").await;

    let mut bob = Session::register(port, "bob").await;
    bob.send("JOIN #x").await;
    assert_eq!(
        bob.expect("473").await,
        ":42.IRC 473 bob #x :Cannot join channel (+i)"
    );

    alice.send("INVITE bob #x").await;
    assert_eq!(alice.expect("341").await, ":42.IRC 341 alice bob #x");
    assert_eq!(bob.expect("INVITE").await, ":alice INVITE bob :#x");

    bob.send("JOIN #x").await;
    assert_eq!(bob.expect("JOIN").await, ":bob JOIN #x");
    assert_eq!(alice.expect("JOIN").await, ":bob JOIN #x");
}

// ── S3: key and limit ────────────────────────────────────────────

#[tokio::test]
async fn key_then_limit_enforcement() {
    let port = start_server().await;
    let mut alice = Session::register(port, "alice").await;
    alice.send("JOIN #x").await;
    alice.expect("366").await;
    alice.send("MODE #x +kl hunter2 2").await;
    alice.expect("MODE #x +kl hunter2 2").await;

    let mut bob = Session::register(port, "bob").await;
    bob.send("JOIN #x hunter2").await;
    bob.expect("366").await;

    let mut carol = Session::register(port, "carol").await;
    carol.send("JOIN #x").await;
    assert_eq!(
        carol.expect("475").await,
        ":42.IRC 475 carol #x :Cannot join channel (+k)"
    );
    // With the right key the limit check applies: the room is full.
    carol.send("JOIN #x hunter2").await;
    assert_eq!(
        carol.expect("471").await,
        ":42.IRC 471 carol #x :Cannot join channel (+l)"
    );
}

// ── S4: kick ─────────────────────────────────────────────────────

#[tokio::test]
async fn kick_reaches_kicker_and_target() {
    let port = start_server().await;
    let mut alice = Session::register(port, "alice").await;
    alice.send("JOIN #x").await;
    alice.expect("366").await;
    let mut bob = Session::register(port, "bob").await;
    bob.send("JOIN #x").await;
    bob.expect("366").await;
    alice.expect("JOIN").await;

    alice.send("KICK #x bob :bye").await;
    assert_eq!(alice.expect("KICK").await, ":alice KICK #x bob :bye");
    assert_eq!(bob.expect("KICK").await, ":alice KICK #x bob :bye");

    // Bob really is out: speaking in the channel now fails.
    bob.send("PRIVMSG #x :still here?").await;
    bob.expect("404").await;
}

// ── S5: ping ─────────────────────────────────────────────────────

#[tokio::test]
async fn ping_echoes_token() {
    let port = start_server().await;
    let mut alice = Session::register(port, "alice").await;
    alice.send("PING :token42").await;
    assert_eq!(alice.expect("PONG").await, ":42.IRC PONG 42.IRC :token42");
}

// ── S6: quit cascade ─────────────────────────────────────────────

#[tokio::test]
async fn quit_cascades_exactly_once_and_reaps_channels() {
    let port = start_server().await;
    let mut alice = Session::register(port, "alice").await;
    // Alice shares #x with bob and is alone in #y.
    alice.send("JOIN #x,#y").await;
    alice.expect("366").await;
    alice.expect("366").await;
    let mut bob = Session::register(port, "bob").await;
    bob.send("JOIN #x").await;
    bob.expect("366").await;
    alice.expect("JOIN").await;

    alice.send("QUIT :later").await;
    assert_eq!(bob.expect("QUIT").await, ":alice QUIT :later");
    // Exactly once, even while sharing state with another channel.
    assert_eq!(bob.try_next().await, None);

    // Alice's connection closes.
    let eof = timeout(Duration::from_secs(2), alice.lines.next_line()).await;
    assert!(matches!(eof, Ok(Ok(None))), "expected EOF, got {eof:?}");

    // #y emptied out with her; #x lives on with bob.
    bob.send("LIST").await;
    bob.expect(" 321 ").await;
    let mut channels = Vec::new();
    loop {
        let line = bob.expect(":42.IRC 32").await;
        if line.contains(" 323 ") {
            break;
        }
        channels.push(line);
    }
    assert_eq!(channels.len(), 1);
    assert!(channels[0].contains("#x"));
}

// ── Frame handling over the wire ─────────────────────────────────

#[tokio::test]
async fn oversized_frame_is_dropped_silently() {
    let port = start_server().await;
    let mut alice = Session::register(port, "alice").await;
    let long = format!("PRIVMSG #x :{}", "a".repeat(600));
    alice.send(&long).await;
    alice.send("PING :after").await;
    // No error for the oversized frame; the next command still works.
    assert_eq!(alice.expect("PONG").await, ":42.IRC PONG 42.IRC :after");
}

#[tokio::test]
async fn pipelined_commands_in_one_write() {
    let port = start_server().await;
    let mut alice = Session::connect(port).await;
    alice
        .send("PASS secret\r\nNICK alice\r\nUSER a 0 * :Alice\r\nJOIN #x")
        .await;
    alice.expect("001").await;
    assert_eq!(alice.expect("JOIN").await, ":alice JOIN #x");
}
