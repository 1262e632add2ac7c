//! Shared utilities for dispatcher integration tests.

#![allow(dead_code)]

use std::io;
use std::time::Duration;

use futures_util::future::BoxFuture;
use session_dispatcher::config::ServerConfig;
use session_dispatcher::error::{ParseError, ServerError, SpawnError};
use session_dispatcher::net::{Incoming, Transport};
use session_dispatcher::protocol::{OnComplete, Parser, RequestMessage, ResponseMessage, Serializer};
use session_dispatcher::server::Executor;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::{mpsc, Mutex};

/// One scripted outcome of `accept`.
pub type AcceptStep = io::Result<DuplexStream>;

/// Transport whose `accept` results are pushed by the test.
///
/// Once the queue is empty `accept` waits for the next pushed step.
pub struct ScriptedTransport {
    steps: Mutex<mpsc::UnboundedReceiver<AcceptStep>>,
}

/// Test-side handle used to feed a [`ScriptedTransport`].
#[derive(Clone)]
pub struct Script {
    tx: mpsc::UnboundedSender<AcceptStep>,
}

impl Script {
    /// Queue a successful accept and return the client end of the connection.
    pub fn connect(&self) -> DuplexStream {
        let (client, server) = tokio::io::duplex(16 * 1024);
        self.tx.send(Ok(server)).expect("transport dropped");
        client
    }

    /// Queue a failed accept.
    pub fn fail(&self, message: &str) {
        self.tx
            .send(Err(io::Error::other(message.to_string())))
            .expect("transport dropped");
    }
}

impl ScriptedTransport {
    pub fn new() -> (Self, Script) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                steps: Mutex::new(rx),
            },
            Script { tx },
        )
    }

    pub fn with_steps(steps: impl IntoIterator<Item = AcceptStep>) -> (Self, Script) {
        let (transport, script) = Self::new();
        for step in steps {
            script.tx.send(step).expect("receiver alive");
        }
        (transport, script)
    }
}

impl Transport for ScriptedTransport {
    type Stream = DuplexStream;

    async fn bind(_config: &ServerConfig) -> io::Result<Self> {
        Ok(Self::new().0)
    }

    async fn accept(&self) -> io::Result<Incoming<DuplexStream>> {
        let step = self.steps.lock().await.recv().await;
        match step {
            Some(Ok(stream)) => Ok(Incoming::ready(stream, None)),
            Some(Err(e)) => Err(e),
            None => std::future::pending().await,
        }
    }
}

/// Line protocol: `K <body>` keeps the connection, `C <body>` closes it.
#[derive(Debug)]
pub struct LineRequest {
    pub body: String,
    pub keep_alive: bool,
}

impl RequestMessage for LineRequest {
    fn keep_alive(&self) -> bool {
        self.keep_alive
    }
}

pub struct LineResponse {
    pub body: String,
    pub on_complete: Option<OnComplete>,
}

impl LineResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            on_complete: None,
        }
    }
}

impl ResponseMessage for LineResponse {
    fn take_on_complete(&mut self) -> Option<OnComplete> {
        self.on_complete.take()
    }
}

#[derive(Default)]
pub struct LineParser;

impl Parser for LineParser {
    type Request = LineRequest;

    async fn parse<S>(&mut self, stream: &mut S) -> Result<LineRequest, ParseError>
    where
        S: AsyncBufRead + Unpin + Send,
    {
        let mut line = String::new();
        if stream.read_line(&mut line).await? == 0 {
            return Err(ParseError::StreamEmpty);
        }
        let line = line.trim_end();
        match line.split_once(' ') {
            Some(("K", body)) => Ok(LineRequest {
                body: body.to_string(),
                keep_alive: true,
            }),
            Some(("C", body)) => Ok(LineRequest {
                body: body.to_string(),
                keep_alive: false,
            }),
            _ => Err(ParseError::malformed(format!("bad line {:?}", line))),
        }
    }
}

#[derive(Default)]
pub struct LineSerializer;

impl Serializer for LineSerializer {
    type Response = LineResponse;

    async fn serialize<S>(&mut self, stream: &mut S, response: LineResponse) -> io::Result<()>
    where
        S: AsyncWrite + Unpin + Send,
    {
        stream.write_all(response.body.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await
    }
}

/// Error handler that forwards every event to a channel.
pub fn error_channel() -> (
    impl Fn(ServerError) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<ServerError>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |error: ServerError| {
            let _ = tx.send(error);
        },
        rx,
    )
}

/// Receive the next reported error, failing the test after two seconds.
pub async fn next_error(rx: &mut mpsc::UnboundedReceiver<ServerError>) -> ServerError {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for error")
        .expect("error channel closed")
}

/// Assert no further error arrives within a short grace period.
pub async fn assert_no_error(rx: &mut mpsc::UnboundedReceiver<ServerError>) {
    if let Ok(Some(error)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        panic!("unexpected error reported: {}", error);
    }
}

/// Executor that refuses every task.
pub struct RefusingExecutor;

impl Executor for RefusingExecutor {
    fn spawn(&self, _task: BoxFuture<'static, ()>) -> Result<(), SpawnError> {
        Err(SpawnError::new("executor saturated"))
    }
}

/// Read everything the server sends until it closes the connection.
pub async fn read_until_closed(client: &mut DuplexStream) -> String {
    use tokio::io::AsyncReadExt;

    let mut out = String::new();
    tokio::time::timeout(Duration::from_secs(2), client.read_to_string(&mut out))
        .await
        .expect("server did not close the connection")
        .expect("read failed");
    out
}

/// Wait until `check` holds, polling every 10ms for up to two seconds.
pub async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
