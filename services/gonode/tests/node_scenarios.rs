//! End-to-end behavior of a running gonode, driven from a peer node

use gonode::{NodeConfig, NodeDriver};
use messaging_actors::{Destination, Mailbox, Node, Pid, Term, DEFAULT_CALL_TIMEOUT};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const NODE: &str = "gonode@localhost";
const SERVER: &str = "go_srv";

struct Running {
    node: Node,
    driver: JoinHandle<anyhow::Result<()>>,
    server: Pid,
    addr: SocketAddr,
}

fn config(enable_rpc: bool) -> NodeConfig {
    NodeConfig {
        epmd_port: 0,
        enable_rpc,
        ..NodeConfig::default()
    }
}

async fn start(config: NodeConfig) -> Running {
    let node = Node::new(NODE, config.cookie.as_str());
    let driver = tokio::spawn(NodeDriver::new(config).run_on(node.clone()));

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let (Some(port), Some(server)) = (node.published_port(), node.whereis(SERVER)) {
            return Running {
                node,
                driver,
                server,
                addr: SocketAddr::from(([127, 0, 0, 1], port)),
            };
        }
        assert!(Instant::now() < deadline, "gonode did not start");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn peer(running: &Running) -> Node {
    let peer = Node::new("peer@localhost", "123");
    peer.connect(running.addr).await.unwrap();
    peer
}

fn go_srv() -> Destination {
    Destination::remote(SERVER, NODE)
}

fn ping(mailbox: &Mailbox) -> Term {
    Term::tuple(vec![Term::atom("ping"), Term::Pid(mailbox.pid().clone())])
}

async fn finished(driver: JoinHandle<anyhow::Result<()>>) {
    tokio::time::timeout(Duration::from_secs(5), driver)
        .await
        .expect("driver did not finish")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_ping_then_stop() {
    let running = start(config(false)).await;
    let peer = peer(&running).await;
    let mut inbox = peer.open_mailbox();

    peer.cast(go_srv(), ping(&inbox)).unwrap();
    let pong = inbox.recv_timeout(Duration::from_secs(5)).await;
    assert_eq!(
        pong,
        Some(Term::tuple(vec![Term::atom("pong"), Term::Pid(running.server.clone())]))
    );

    peer.cast(go_srv(), Term::atom("stop")).unwrap();
    finished(running.driver).await;
    assert_eq!(running.node.whereis(SERVER), None);
}

#[tokio::test]
async fn test_each_ping_gets_exactly_one_pong() {
    let running = start(config(false)).await;
    let peer = peer(&running).await;
    let mut inbox = peer.open_mailbox();

    for _ in 0..3 {
        peer.cast(go_srv(), ping(&inbox)).unwrap();
    }
    for _ in 0..3 {
        assert!(inbox.recv_timeout(Duration::from_secs(5)).await.is_some());
    }
    assert_eq!(inbox.recv_timeout(Duration::from_millis(200)).await, None);

    peer.cast(go_srv(), Term::atom("stop")).unwrap();
    finished(running.driver).await;
}

#[tokio::test]
async fn test_unrecognized_casts_produce_no_messages() {
    let running = start(config(false)).await;
    let peer = peer(&running).await;
    let mut inbox = peer.open_mailbox();

    for junk in [
        Term::atom("hello"),
        Term::tuple(vec![Term::atom("ping")]),
        Term::tuple(vec![Term::atom("ping"), Term::atom("not_a_pid")]),
        Term::tuple(vec![Term::atom("pong"), Term::Pid(inbox.pid().clone())]),
        Term::Integer(3),
    ] {
        peer.cast(go_srv(), junk).unwrap();
    }
    // plain messages are info, not casts
    peer.send(go_srv(), ping(&inbox)).unwrap();

    // the server handles its mailbox in order, so the first thing back must
    // be the answer to this ping
    peer.cast(go_srv(), ping(&inbox)).unwrap();
    let first = inbox.recv_timeout(Duration::from_secs(5)).await;
    assert_eq!(
        first,
        Some(Term::tuple(vec![Term::atom("pong"), Term::Pid(running.server.clone())]))
    );
    assert_eq!(inbox.recv_timeout(Duration::from_millis(200)).await, None);
    assert!(running.node.is_alive(&running.server));

    peer.cast(go_srv(), Term::atom("stop")).unwrap();
    finished(running.driver).await;
}

#[tokio::test]
async fn test_call_echoes_the_request() {
    let running = start(config(false)).await;
    let peer = peer(&running).await;

    for message in [
        Term::atom("hello"),
        Term::Integer(-1),
        Term::tuple(vec![Term::atom("a"), Term::list(vec![Term::Integer(1)])]),
        Term::nil(),
    ] {
        let expected = Term::tuple(vec![Term::atom("ok"), Term::atom("go_reply"), message.clone()]);
        let first = peer.call(go_srv(), message.clone(), DEFAULT_CALL_TIMEOUT).await.unwrap();
        let second = peer.call(go_srv(), message, DEFAULT_CALL_TIMEOUT).await.unwrap();
        assert_eq!(first, expected);
        assert_eq!(second, expected);
    }

    peer.cast(go_srv(), Term::atom("stop")).unwrap();
    finished(running.driver).await;
}

#[tokio::test]
async fn test_repeated_stop_does_not_deadlock() {
    let running = start(config(false)).await;
    let peer = peer(&running).await;

    peer.cast(go_srv(), Term::atom("stop")).unwrap();
    // the link may already be gone by the time the second stop is sent
    let _ = peer.cast(go_srv(), Term::atom("stop"));

    finished(running.driver).await;
}

#[tokio::test]
async fn test_local_repeated_stop_is_ignored() {
    let node = Node::new(NODE, "123");
    let (signal, waiter) = messaging_actors::completion_signal();
    let server = node.spawn(gonode::GoServer::new(SERVER), signal).await.unwrap();

    node.cast(&server, Term::atom("stop")).unwrap();
    node.cast(&server, Term::atom("stop")).unwrap();
    assert_eq!(waiter.wait().await, Some(true));

    // still serving after the second stop
    let reply = node
        .call(&server, Term::atom("still_here"), DEFAULT_CALL_TIMEOUT)
        .await
        .unwrap();
    assert_eq!(
        reply,
        Term::tuple(vec![Term::atom("ok"), Term::atom("go_reply"), Term::atom("still_here")])
    );
    node.shutdown().await;
}

#[tokio::test]
async fn test_rpc_counts_arguments() {
    let running = start(config(true)).await;
    let peer = peer(&running).await;

    for arity in [0usize, 1, 2, 5] {
        let args: Vec<Term> = (0..arity).map(Term::from).collect();
        let reply = peer
            .rpc_call(NODE, "go_rpc", "call", args, DEFAULT_CALL_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(
            reply,
            Term::tuple(vec![Term::atom("gonode"), Term::atom("reply"), Term::from(arity)])
        );
    }

    peer.cast(go_srv(), Term::atom("stop")).unwrap();
    finished(running.driver).await;
}

#[tokio::test]
async fn test_rpc_disabled_by_default() {
    let running = start(config(false)).await;
    assert_eq!(running.node.whereis("rex"), None);

    running.node.cast(&running.server, Term::atom("stop")).unwrap();
    finished(running.driver).await;
}

#[tokio::test]
async fn test_occupied_port_aborts_before_spawn() {
    let blocker = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = blocker.local_addr().unwrap().port();

    let node = Node::new(NODE, "123");
    let config = NodeConfig {
        epmd_port: port,
        ..NodeConfig::default()
    };

    let err = NodeDriver::new(config).run_on(node.clone()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("Cannot publish"));
    assert_eq!(node.whereis(SERVER), None);
    assert_eq!(node.process_count(), 0);
}

#[tokio::test]
async fn test_custom_server_name() {
    let running_config = NodeConfig {
        server_name: "my_srv".to_string(),
        epmd_port: 0,
        ..NodeConfig::default()
    };
    let node = Node::new(NODE, "123");
    let driver = tokio::spawn(NodeDriver::new(running_config).run_on(node.clone()));

    let deadline = Instant::now() + Duration::from_secs(5);
    let server = loop {
        if let Some(pid) = node.whereis("my_srv") {
            break pid;
        }
        assert!(Instant::now() < deadline, "my_srv was not registered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    assert_eq!(node.whereis(SERVER), None);

    node.cast(&server, Term::atom("stop")).unwrap();
    finished(driver).await;
}
