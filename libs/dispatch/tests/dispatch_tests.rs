use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchboard_core::headers::keys;
use switchboard_core::{ErrorType, ResponseCode, PROTOCOL_VERSION};
use switchboard_dispatch::{
    Error, HandshakeState, Multiplexer, RawRequest, Request, ServiceChannel,
};
use switchboard_fabric::codec::BincodeCodec;
use switchboard_fabric::frame::{CallResponse, ErrorFrame, Frame, InitParams};
use switchboard_fabric::transport::{
    Connector, MemoryTransport, TcpTransportListener, Transport,
};
use switchboard_fabric::Channel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Account {
    id: u64,
    owner: String,
}

/// How a fake server at one address behaves
#[derive(Debug, Clone, Copy)]
enum Behavior {
    /// Handshake, then echo every call back with its headers
    Echo,
    /// Accept the dial but never answer the handshake
    Silent,
    /// Answer the handshake with an error frame
    RejectInit,
    /// Fail the dial itself
    Refuse,
    /// Handshake, then swallow calls
    Mute,
    /// Handshake, then drop the connection on the first call
    HangUpOnCall,
    /// Handshake, then answer every call with a Busy error frame
    Busy,
}

/// Addressable fake servers reached through in-memory transports
#[derive(Default)]
struct FakeNetwork {
    behaviors: Mutex<HashMap<SocketAddr, Behavior>>,
    dials: Mutex<HashMap<SocketAddr, usize>>,
}

impl FakeNetwork {
    fn with(self: Arc<Self>, addr: SocketAddr, behavior: Behavior) -> Arc<Self> {
        self.set(addr, behavior);
        self
    }

    fn set(&self, addr: SocketAddr, behavior: Behavior) {
        self.behaviors.lock().unwrap().insert(addr, behavior);
    }

    fn dials(&self, addr: SocketAddr) -> usize {
        self.dials.lock().unwrap().get(&addr).copied().unwrap_or(0)
    }
}

struct FakeConnector(Arc<FakeNetwork>);

#[async_trait::async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, addr: SocketAddr) -> switchboard_fabric::Result<Box<dyn Transport>> {
        *self.0.dials.lock().unwrap().entry(addr).or_default() += 1;
        let behavior = self
            .0
            .behaviors
            .lock()
            .unwrap()
            .get(&addr)
            .copied()
            .unwrap_or(Behavior::Refuse);

        if let Behavior::Refuse = behavior {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )
            .into());
        }

        let (client, server) = MemoryTransport::pair();
        tokio::spawn(serve(server, addr, behavior));
        Ok(Box::new(client))
    }
}

async fn serve(transport: impl Transport + 'static, addr: SocketAddr, behavior: Behavior) {
    let mut channel = Channel::from_transport(transport, BincodeCodec);
    let Ok(Frame::InitRequest(_)) = channel.receive::<Frame>().await else {
        return;
    };

    match behavior {
        Behavior::Silent => std::future::pending::<()>().await,
        Behavior::RejectInit => {
            let _ = channel
                .send(&Frame::Error(ErrorFrame {
                    id: 0,
                    kind: ErrorType::Declined,
                    message: "not accepting connections".to_string(),
                }))
                .await;
            return;
        }
        _ => {
            let identity = InitParams {
                version: PROTOCOL_VERSION,
                host_port: addr.to_string(),
                process_name: "fake-server".to_string(),
            };
            if channel.send(&Frame::InitResponse(identity)).await.is_err() {
                return;
            }
        }
    }

    while let Ok(frame) = channel.receive::<Frame>().await {
        let Frame::CallRequest(call) = frame else {
            continue;
        };
        let reply = match behavior {
            Behavior::Mute => continue,
            Behavior::HangUpOnCall => return,
            Behavior::Busy => Frame::Error(ErrorFrame {
                id: call.id,
                kind: ErrorType::Busy,
                message: "try later".to_string(),
            }),
            _ => {
                let mut transport_headers = call.transport_headers;
                transport_headers.insert("served-by".to_string(), addr.to_string());
                Frame::CallResponse(CallResponse {
                    id: call.id,
                    code: ResponseCode::Ok,
                    headers: call.headers,
                    transport_headers,
                    body: call.body,
                })
            }
        };
        if channel.send(&reply).await.is_err() {
            return;
        }
    }
}

fn addr(last: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, last], 4040))
}

fn multiplexer(network: &Arc<FakeNetwork>) -> Multiplexer {
    Multiplexer::builder("billing")
        .init_timeout(Duration::from_millis(200))
        .request_timeout(Duration::from_secs(2))
        .connector(FakeConnector(network.clone()))
        .build()
}

fn ledger(mux: &Multiplexer, peers: &[SocketAddr]) -> Arc<ServiceChannel> {
    let channel = mux.channel("ledger");
    channel.set_peers(peers.iter().copied());
    channel
}

fn raw(body: &[u8]) -> RawRequest {
    Request::builder("ledger", "echo").body(body.to_vec())
}

fn served_by(headers: &HashMap<String, String>) -> Option<SocketAddr> {
    headers.get("served-by").and_then(|a| a.parse().ok())
}

#[tokio::test]
async fn json_call_round_trips_through_selected_peer() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::Echo);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    let account = Account {
        id: 7,
        owner: "ada".to_string(),
    };
    let request = Request::builder("ledger", "lookup")
        .header("tenant", "acme")
        .body(account.clone());

    let response = channel
        .send_json::<_, Account>(request)
        .await
        .unwrap()
        .await
        .unwrap();

    assert_eq!(response.body(), &account);
    assert!(!response.is_error());
    assert_eq!(response.headers().get("tenant").map(String::as_str), Some("acme"));
    let headers = response.transport_headers();
    assert_eq!(headers.get(keys::ARG_SCHEME).map(String::as_str), Some("json"));
    assert_eq!(headers.get(keys::CALLER_NAME).map(String::as_str), Some("billing"));
}

#[tokio::test]
async fn thrift_call_uses_structured_codec() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::Echo);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    let request = Request::builder("ledger", "lookup").body(Account {
        id: 11,
        owner: "grace".to_string(),
    });
    let response = channel
        .send_thrift::<_, Account>(request)
        .await
        .unwrap()
        .await
        .unwrap();

    assert_eq!(response.body().owner, "grace");
    assert_eq!(
        response
            .transport_headers()
            .get(keys::ARG_SCHEME)
            .map(String::as_str),
        Some("thrift")
    );
}

#[tokio::test]
async fn raw_call_defaults_arg_scheme() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::Echo);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    let response = channel.send_raw(raw(b"ping")).await.unwrap().await.unwrap();

    assert_eq!(response.body(), b"ping");
    let headers = response.transport_headers();
    assert_eq!(headers.get(keys::ARG_SCHEME).map(String::as_str), Some("raw"));
    assert_eq!(headers.get(keys::CALLER_NAME).map(String::as_str), Some("billing"));
}

#[tokio::test]
async fn explicit_arg_scheme_is_not_overwritten() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::Echo);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    let request = Request::builder("ledger", "echo")
        .transport_header(keys::ARG_SCHEME, "thrift")
        .body(b"opaque".to_vec());
    let response = channel.send_raw(request).await.unwrap().await.unwrap();

    assert_eq!(
        response
            .transport_headers()
            .get(keys::ARG_SCHEME)
            .map(String::as_str),
        Some("thrift")
    );
}

#[tokio::test]
async fn no_peers_fails_synchronously() {
    let network = Arc::new(FakeNetwork::default());
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[]);

    assert!(channel.choose_peer().is_none());
    assert!(matches!(
        channel.send_raw(raw(b"ping")).await,
        Err(Error::NoPeerAvailable)
    ));
    assert!(mux.registry().is_empty());
}

#[tokio::test]
async fn explicit_target_bypasses_peer_selection() {
    let network = Arc::new(FakeNetwork::default())
        .with(addr(1), Behavior::Echo)
        .with(addr(2), Behavior::Echo);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(2)]);

    let response = channel
        .send_raw_to(raw(b"direct"), addr(1))
        .await
        .unwrap()
        .await
        .unwrap();

    assert_eq!(served_by(response.transport_headers()), Some(addr(1)));
    assert_eq!(network.dials(addr(1)), 1);
    assert_eq!(network.dials(addr(2)), 0);
    assert!(channel.peers()[0].preferred_connection().is_none());
}

#[tokio::test]
async fn explicit_target_works_without_configured_peers() {
    let network = Arc::new(FakeNetwork::default()).with(addr(3), Behavior::Echo);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[]);

    let response = channel
        .send_raw_to(raw(b"direct"), addr(3))
        .await
        .unwrap()
        .await
        .unwrap();
    assert_eq!(response.body(), b"direct");
}

#[tokio::test]
async fn silent_handshake_resolves_with_connection_timeout() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::Silent);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    let pending = channel.send_raw(raw(b"ping")).await.unwrap();
    match pending.await {
        Err(Error::ConnectionTimeout(waited)) => {
            assert_eq!(waited, Duration::from_millis(200))
        }
        other => panic!("Expected connection timeout, got {:?}", other),
    }

    let connection = mux.registry().get(addr(1)).unwrap();
    assert!(!connection.is_usable());
    assert_eq!(connection.state(), HandshakeState::Failed);
    assert!(channel.peers()[0].preferred_connection().is_none());
}

#[tokio::test]
async fn rejected_handshake_resolves_with_network_error() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::RejectInit);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    let pending = channel.send_raw(raw(b"ping")).await.unwrap();
    match pending.await {
        Err(Error::Network(cause)) => match &*cause {
            Error::Handshake(message) => assert!(message.contains("not accepting")),
            other => panic!("Expected handshake cause, got {:?}", other),
        },
        other => panic!("Expected network error, got {:?}", other),
    }
    assert!(!mux.registry().get(addr(1)).unwrap().is_usable());
}

#[tokio::test]
async fn refused_dial_resolves_with_network_error() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::Refuse);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    let pending = channel.send_raw(raw(b"ping")).await.unwrap();
    match pending.await {
        Err(error @ Error::Network(_)) => assert!(matches!(
            error.network_cause(),
            Some(Error::Fabric(switchboard_fabric::Error::Io(_)))
        )),
        other => panic!("Expected network error, got {:?}", other),
    }
}

#[tokio::test]
async fn unanswered_call_times_out() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::Mute);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    let request = Request::builder("ledger", "echo")
        .timeout(Duration::from_millis(50))
        .body(Vec::new());
    match channel.send_raw(request).await.unwrap().await {
        Err(Error::RequestTimeout { timeout, .. }) => {
            assert_eq!(timeout, Duration::from_millis(50))
        }
        other => panic!("Expected request timeout, got {:?}", other),
    }

    // The connection itself stays healthy
    assert!(mux.registry().get(addr(1)).unwrap().is_usable());
}

#[tokio::test]
async fn remote_error_frame_fails_the_call() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::Busy);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    match channel.send_raw(raw(b"ping")).await.unwrap().await {
        Err(Error::Remote { kind, message }) => {
            assert_eq!(kind, ErrorType::Busy);
            assert_eq!(message, "try later");
        }
        other => panic!("Expected remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn hang_up_fails_pending_call_with_network_error() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::HangUpOnCall);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    let pending = channel.send_raw(raw(b"ping")).await.unwrap();
    assert!(matches!(pending.await, Err(Error::Network(_))));

    let connection = mux.registry().get(addr(1)).unwrap();
    assert!(!connection.is_usable());
    assert!(connection.last_error().is_some());
}

#[tokio::test]
async fn shutdown_fails_in_flight_calls() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::Mute);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    let pending = channel.send_raw(raw(b"ping")).await.unwrap();
    mux.shutdown();

    assert!(matches!(pending.await, Err(Error::Network(_))));
    assert!(mux.registry().is_empty());
}

#[tokio::test]
async fn connections_are_shared_across_calls_and_channels() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::Echo);
    let mux = multiplexer(&network);
    let ledger = ledger(&mux, &[addr(1)]);
    let audit = mux.channel("audit");
    audit.set_peers([addr(1)]);

    for _ in 0..3 {
        ledger.send_raw(raw(b"a")).await.unwrap().await.unwrap();
    }
    let request = Request::builder("audit", "echo").body(b"b".to_vec());
    audit.send_raw(request).await.unwrap().await.unwrap();

    assert_eq!(network.dials(addr(1)), 1);
    assert_eq!(mux.registry().len(), 1);
    assert!(Arc::ptr_eq(&mux.channel("ledger"), &ledger));

    let cached = ledger.peers()[0].preferred_connection().unwrap();
    assert!(Arc::ptr_eq(&cached, &mux.registry().get(addr(1)).unwrap()));
}

#[tokio::test]
async fn identified_peer_short_circuits_selection() {
    let network = Arc::new(FakeNetwork::default())
        .with(addr(1), Behavior::Echo)
        .with(addr(2), Behavior::Echo);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1), addr(2)]);

    let first = channel.send_raw(raw(b"warm")).await.unwrap().await.unwrap();
    let warm = served_by(first.transport_headers()).unwrap();

    // The warm peer has an identified connection and wins every later scan
    for _ in 0..10 {
        assert_eq!(channel.choose_peer().unwrap().address(), warm);
    }
}

#[tokio::test]
async fn failed_connection_is_replaced_on_next_call() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::Silent);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    let first = channel.send_raw(raw(b"ping")).await.unwrap();
    assert!(matches!(first.await, Err(Error::ConnectionTimeout(_))));

    network.set(addr(1), Behavior::Echo);
    let second = channel.send_raw(raw(b"ping")).await.unwrap().await.unwrap();

    assert_eq!(second.body(), b"ping");
    assert_eq!(network.dials(addr(1)), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_are_correlated() {
    let network = Arc::new(FakeNetwork::default()).with(addr(1), Behavior::Echo);
    let mux = multiplexer(&network);
    let channel = ledger(&mux, &[addr(1)]);

    let tasks: Vec<_> = (0..50u32)
        .map(|n| {
            let channel = channel.clone();
            tokio::spawn(async move {
                let body = n.to_be_bytes().to_vec();
                let response = channel.send_raw(raw(&body)).await?.await?;
                Ok::<_, Error>((body, response.into_body()))
            })
        })
        .collect();

    for task in tasks {
        let (sent, received) = task.await.unwrap().unwrap();
        assert_eq!(sent, received);
    }
    assert_eq!(network.dials(addr(1)), 1);
}

#[tokio::test]
async fn tcp_connector_reaches_real_listener() {
    let listener = TcpTransportListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let server_addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (transport, _remote) = listener.accept().await.unwrap();
        serve(transport, server_addr, Behavior::Echo).await;
    });

    let mux = Multiplexer::builder("billing")
        .init_timeout(Duration::from_secs(2))
        .build();
    let channel = mux.channel("ledger");
    channel.set_peers([server_addr]);

    let response = channel.send_raw(raw(b"over tcp")).await.unwrap().await.unwrap();
    assert_eq!(response.body(), b"over tcp");

    let connection = mux.registry().get(server_addr).unwrap();
    let identity = connection.remote_identity().unwrap();
    assert_eq!(identity.process_name, "fake-server");
}
