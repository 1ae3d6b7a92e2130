//! `ImapMailSession` against a scripted local IMAP server.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use mailtether_core::{
    AuthMethod, Error, FolderEvent, ImapMailSession, MailTransport, watch_folder,
};
use mailtether_imap::{Config, Security};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

type Script = Vec<(&'static str, &'static str)>;

/// Serves one connection per script, in order. Each `(expect, reply)` step
/// reads a line starting with `expect` (skipped when empty) and then writes
/// `reply`. The connection is closed after its last step.
async fn serve(scripts: Vec<Script>) -> (Config, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        for script in scripts {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            for (expect, reply) in script {
                if !expect.is_empty() {
                    let line = lines.next_line().await.unwrap().unwrap();
                    assert!(line.starts_with(expect), "expected {expect:?}, got {line:?}");
                }
                write.write_all(reply.as_bytes()).await.unwrap();
            }
        }
    });

    let config = Config::builder("127.0.0.1")
        .security(Security::None)
        .port(port)
        .connect_timeout(Duration::from_secs(5))
        .io_timeout(Duration::from_secs(5))
        .build();
    (config, handle)
}

const GREETING: (&str, &str) = ("", "* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n");
const LOGIN: (&str, &str) = (
    "A0001 LOGIN",
    "A0001 OK [CAPABILITY IMAP4rev1 IDLE] logged in\r\n",
);

#[tokio::test]
async fn connect_probe_and_detect_hangup() {
    let (config, server) = serve(vec![vec![
        GREETING,
        LOGIN,
        ("A0002 NOOP", "A0002 OK NOOP completed\r\n"),
    ]])
    .await;
    let session = ImapMailSession::new("work", config);
    assert!(matches!(session.connection(), Err(Error::NotConnected)));

    let outcome = session
        .connect(AuthMethod::Password, "ann@corp.io", "hunter2")
        .await;
    let connection = outcome.connection().unwrap();
    assert_eq!(connection.username, "ann@corp.io");
    assert!(connection.capabilities.iter().any(|c| c == "IDLE"));
    assert!(session.is_connected());
    assert_eq!(session.connection().unwrap(), *connection);

    assert!(session.probe().await);
    server.await.unwrap();

    // server closed the socket after the NOOP
    assert!(!session.probe().await);
    assert!(!session.is_connected());
    assert!(matches!(session.connection(), Err(Error::NotConnected)));
}

#[tokio::test]
async fn rejected_login_is_a_failed_outcome() {
    let (config, server) = serve(vec![vec![
        GREETING,
        ("A0001 LOGIN", "A0001 NO [AUTHENTICATIONFAILED] invalid credentials\r\n"),
    ]])
    .await;
    let session = ImapMailSession::new("work", config);

    let outcome = session
        .connect(AuthMethod::Password, "ann@corp.io", "wrong")
        .await;
    assert!(!outcome.is_success());
    assert!(matches!(
        outcome.error(),
        Some(Error::Imap(mailtether_imap::Error::Auth(_)))
    ));
    assert!(!session.is_connected());
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_server_fails_without_panicking() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = Config::builder("127.0.0.1")
        .security(Security::None)
        .port(port)
        .connect_timeout(Duration::from_secs(2))
        .build();
    let session = ImapMailSession::new("work", config);
    let outcome = session.connect(AuthMethod::OAuth2, "ann@corp.io", "token").await;
    assert!(matches!(outcome.error(), Some(Error::Imap(_))));
    assert!(!session.probe().await);
}

#[tokio::test]
async fn disconnect_logs_out() {
    let (config, server) = serve(vec![vec![
        GREETING,
        LOGIN,
        ("A0002 LOGOUT", "* BYE see you\r\nA0002 OK LOGOUT completed\r\n"),
    ]])
    .await;
    let session = ImapMailSession::new("work", config);
    assert!(
        session
            .connect(AuthMethod::Password, "ann@corp.io", "hunter2")
            .await
            .is_success()
    );

    session.disconnect().await;
    assert!(!session.is_connected());
    server.await.unwrap();

    // idempotent
    session.disconnect().await;
}

#[tokio::test]
async fn subscription_reports_new_messages() {
    let (config, server) = serve(vec![
        vec![GREETING, LOGIN],
        vec![
            GREETING,
            LOGIN,
            ("A0002 EXAMINE INBOX", "* 3 EXISTS\r\nA0002 OK [READ-ONLY] done\r\n"),
            ("A0003 IDLE", "+ idling\r\n* 4 EXISTS\r\n"),
            ("DONE", "A0003 OK IDLE terminated\r\n"),
            (
                "A0004 FETCH 4 ",
                "* 4 FETCH (BODY[HEADER.FIELDS (SUBJECT FROM)] {38}\r\nSubject: Report\r\nFrom: ann@corp.io\r\n\r\n)\r\nA0004 OK done\r\n",
            ),
            ("A0005 IDLE", "+ idling\r\n"),
        ],
    ])
    .await;
    let session = ImapMailSession::new("work", config).with_idle_timeout(Duration::from_secs(30));
    assert!(
        session
            .connect(AuthMethod::Password, "ann@corp.io", "hunter2")
            .await
            .is_success()
    );

    let mut subscription = session.subscribe("INBOX").await.unwrap();
    assert_eq!(subscription.folder(), "INBOX");

    match subscription.recv().await.unwrap() {
        FolderEvent::NewMessage(message) => {
            assert_eq!(message.seq, 4);
            assert_eq!(message.folder, "INBOX");
            assert_eq!(message.subject.as_deref(), Some("Report"));
            assert_eq!(message.from.as_deref(), Some("ann@corp.io"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    // the server hangs up while idling
    assert!(matches!(
        subscription.recv().await.unwrap(),
        FolderEvent::Disconnected(_)
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn subscribe_before_connect_fails() {
    let session = ImapMailSession::outlook("work");
    assert_eq!(session.config().host, "outlook.office365.com");
    assert_eq!(session.config().port, 993);
    let err = watch_folder(&session, "INBOX", |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));
}
