use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use inbox_api::auth::{AppState, AppStateInner};
use inbox_api::router::build_router;
use inbox_backend::auth::{AuthProvider, LocalAuth};
use inbox_backend::memory::MemoryBackend;
use inbox_backend::seed;
use inbox_gateway::registry::WorkspaceRegistry;
use inbox_types::events::InboxEvent;
use inbox_types::models::Session;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EMAIL: &str = "founder@example.com";
const PASSWORD: &str = "open sesame";

struct Server {
    addr: SocketAddr,
    state: AppState,
    backend: MemoryBackend,
    auth: Arc<LocalAuth>,
    _shutdown: oneshot::Sender<()>,
}

async fn start_server() -> Server {
    let backend = seed::demo_backend().await;
    let auth = Arc::new(LocalAuth::new(EMAIL, PASSWORD, "gateway-test-secret").expect("local auth"));
    let state: AppState = Arc::new(AppStateInner {
        auth: auth.clone(),
        backend: Arc::new(backend.clone()),
        workspaces: WorkspaceRegistry::new(),
        profiles: seed::demo_profiles(),
        secure_cookies: false,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind server");
    let addr = listener.local_addr().expect("server addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server = axum::serve(listener, build_router(state.clone())).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });
    tokio::spawn(async move {
        let _ = server.await;
    });

    Server {
        addr,
        state,
        backend,
        auth,
        _shutdown: shutdown_tx,
    }
}

impl Server {
    async fn sign_in(&self) -> Session {
        self.auth.sign_in(EMAIL, PASSWORD).await.expect("sign in")
    }

    async fn connect(&self, session: &Session) -> Client {
        let mut request = format!("ws://{}/gateway", self.addr)
            .into_client_request()
            .expect("gateway request");
        request.headers_mut().insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("inbox_session={}", session.access_token)).expect("cookie header"),
        );
        let (socket, _) = connect_async(request).await.expect("gateway upgrade");
        socket
    }
}

async fn next_event(socket: &mut Client) -> InboxEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match socket.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    return serde_json::from_str::<InboxEvent>(text.as_str()).expect("gateway event json");
                }
                Some(Ok(_)) => continue,
                other => panic!("gateway closed: {:?}", other),
            }
        }
    })
    .await
    .expect("gateway event")
}

#[tokio::test]
async fn gateway_greets_then_streams_pushed_rows() {
    let server = start_server().await;
    let session = server.sign_in().await;

    let workspace = server.state.workspace(&session).await;
    workspace.refresh().await.unwrap();
    workspace.select("u1").await.unwrap();

    let mut socket = server.connect(&session).await;
    assert_eq!(
        next_event(&mut socket).await,
        InboxEvent::Ready {
            user_id: session.claims.sub.clone()
        }
    );

    let pushed = server.backend.deliver_from_contact("u1", "are you there?").await.unwrap();
    loop {
        if let InboxEvent::MessageAppended { message } = next_event(&mut socket).await {
            assert_eq!(message, pushed);
            break;
        }
    }
}

#[tokio::test]
async fn gateway_only_forwards_the_open_conversation() {
    let server = start_server().await;
    let session = server.sign_in().await;

    let workspace = server.state.workspace(&session).await;
    workspace.refresh().await.unwrap();
    workspace.select("u1").await.unwrap();

    let mut socket = server.connect(&session).await;
    assert!(matches!(next_event(&mut socket).await, InboxEvent::Ready { .. }));

    server.backend.deliver_from_contact("u2", "for bob's thread").await.unwrap();
    let pushed = server.backend.deliver_from_contact("u1", "for alice's thread").await.unwrap();

    match next_event(&mut socket).await {
        InboxEvent::MessageAppended { message } => assert_eq!(message.id, pushed.id),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn gateway_requires_a_session() {
    let server = start_server().await;

    match connect_async(format!("ws://{}/gateway", server.addr)).await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 307),
        other => panic!("expected redirect, got {:?}", other.map(|_| ())),
    }

    let session = server.sign_in().await;
    server.auth.sign_out(&session).await;
    let mut request = format!("ws://{}/gateway", server.addr).into_client_request().unwrap();
    request.headers_mut().insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("inbox_session={}", session.access_token)).unwrap(),
    );
    assert!(connect_async(request).await.is_err());
}
