use std::io::ErrorKind as IoErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};

use crate::mq::{Broker, BrokerError, ErrorKind, Message, SubscriberId};

use super::protocol::*;
use super::validate::{validate_move_offset, validate_poll, validate_publish, validate_subscribe};

#[derive(Debug, Clone)]
pub struct TcpServerOptions {
    pub listen_addr: SocketAddr,
}

impl Default for TcpServerOptions {
    fn default() -> Self {
        Self { listen_addr: SocketAddr::from(([127, 0, 0, 1], 10083)) }
    }
}

/// 将线上请求适配到代理核心操作的 TCP 服务端
///
/// TCP server adapting wire requests onto broker operations: one task per
/// connection, one response frame per request frame.
#[derive(Clone)]
pub struct TcpServer {
    broker: Arc<Broker>,
    opts: TcpServerOptions,
}

fn response(status: Status) -> FrameMeta {
    FrameMeta { status: Some(status), ..Default::default() }
}

fn invalid_argument(message: &str, violations: Vec<FieldViolation>) -> Frame {
    Frame::new(
        MsgType::Response,
        FrameMeta { error: Some(message.to_string()), violations, ..response(Status::InvalidArgument) },
    )
}

/// 核心错误 → 线上状态 / Map a core error onto a wire status.
pub fn error_frame(err: &BrokerError) -> Frame {
    let (status, violations) = match err.kind() {
        ErrorKind::TopicNotFound => (Status::NotFound, Vec::new()),
        ErrorKind::SubscriberNotFound => (Status::FailedPrecondition, Vec::new()),
        ErrorKind::InvalidOffsetDelta => (
            Status::InvalidArgument,
            vec![FieldViolation::new("delta", FieldViolation::OUT_OF_RANGE)],
        ),
        ErrorKind::InvalidConfiguration | ErrorKind::Internal => (Status::Internal, Vec::new()),
    };
    Frame::new(
        MsgType::Response,
        FrameMeta { error: Some(err.to_string()), violations, ..response(status) },
    )
}

fn parse_subscriber(meta: &FrameMeta) -> Result<SubscriberId, Frame> {
    let raw = meta.subscriber_id.as_deref().unwrap_or_default();
    raw.parse::<SubscriberId>().map_err(|_| {
        invalid_argument(
            "invalid subscriber id",
            vec![FieldViolation::new("subscriber_id", FieldViolation::INVALID_FORMAT)],
        )
    })
}

impl TcpServer {
    pub fn new(broker: Arc<Broker>, opts: TcpServerOptions) -> Self {
        Self { broker, opts }
    }

    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let listener = TcpListener::bind(self.opts.listen_addr).await?;
        info!("代理开始监听: {} / Broker listening on {}", listener.local_addr()?, listener.local_addr()?);
        Ok(listener)
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (socket, addr) = listener.accept().await?;
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_client(socket, addr).await {
                    warn!("连接 {} 异常关闭: {} / Connection {} closed with error: {}", addr, e, addr, e);
                }
            });
        }
    }

    async fn handle_client(&self, socket: TcpStream, addr: SocketAddr) -> anyhow::Result<()> {
        let _ = socket.set_nodelay(true);
        let (mut reader, mut writer) = socket.into_split();
        debug!("客户端已连接: {} / Client connected: {}", addr, addr);
        loop {
            let frame = match read_frame(&mut reader).await {
                Ok(frame) => frame,
                Err(e) => {
                    let eof = e
                        .downcast_ref::<std::io::Error>()
                        .map(|io| io.kind() == IoErrorKind::UnexpectedEof)
                        .unwrap_or(false);
                    if eof {
                        debug!("客户端断开: {} / Client disconnected: {}", addr, addr);
                        return Ok(());
                    }
                    return Err(e);
                }
            };
            let reply = self.dispatch(frame);
            write_frame(&mut writer, &reply).await?;
        }
    }

    /// 处理单个请求帧 / Handle one request frame.
    pub fn dispatch(&self, frame: Frame) -> Frame {
        match frame.msg_type {
            MsgType::Publish => self.publish(&frame),
            MsgType::Subscribe => self.subscribe(&frame.meta),
            MsgType::Poll => self.poll(&frame.meta),
            MsgType::MoveOffset => self.move_offset(&frame.meta),
            MsgType::Response => invalid_argument("unexpected response frame from client", Vec::new()),
        }
    }

    fn publish(&self, frame: &Frame) -> Frame {
        let messages = match frame.messages() {
            Ok(messages) => messages,
            Err(_) => {
                return invalid_argument(
                    "invalid publish request",
                    vec![FieldViolation::new("messages", FieldViolation::INVALID_FORMAT)],
                )
            }
        };
        let violations = validate_publish(&frame.meta, &messages);
        if !violations.is_empty() {
            return invalid_argument("invalid publish request", violations);
        }
        let topic = frame.meta.topic.as_deref().unwrap_or_default();
        match self.broker.publish(topic, messages.into_iter().map(Message::from)) {
            Ok(()) => Frame::new(MsgType::Response, response(Status::Ok)),
            Err(e) => self.failed("publishing", e),
        }
    }

    fn subscribe(&self, meta: &FrameMeta) -> Frame {
        let violations = validate_subscribe(meta);
        if !violations.is_empty() {
            return invalid_argument("invalid subscribe request", violations);
        }
        let topic = meta.topic.as_deref().unwrap_or_default();
        let group = meta.group.as_deref().unwrap_or_default();
        match self.broker.subscribe(topic, group) {
            Ok(id) => Frame::new(
                MsgType::Response,
                FrameMeta { subscriber_id: Some(id.to_string()), ..response(Status::Ok) },
            ),
            Err(e) => self.failed("subscribing", e),
        }
    }

    fn poll(&self, meta: &FrameMeta) -> Frame {
        let violations = validate_poll(meta);
        if !violations.is_empty() {
            return invalid_argument("invalid poll request", violations);
        }
        let id = match parse_subscriber(meta) {
            Ok(id) => id,
            Err(reply) => return reply,
        };
        let limit = meta.limit.unwrap_or(1).max(1) as usize;
        let polled = match self.broker.poll(&id, limit) {
            Ok(polled) => polled,
            Err(e) => return self.failed("polling", e),
        };
        let wire: Vec<WireMessage> = polled.iter().map(WireMessage::from).collect();
        match Frame::new(MsgType::Response, response(Status::Ok)).with_messages(&wire) {
            Ok(reply) => reply,
            Err(e) => self.failed("polling", BrokerError::Internal(e.to_string())),
        }
    }

    fn move_offset(&self, meta: &FrameMeta) -> Frame {
        let violations = validate_move_offset(meta);
        if !violations.is_empty() {
            return invalid_argument("invalid move offset request", violations);
        }
        let id = match parse_subscriber(meta) {
            Ok(id) => id,
            Err(reply) => return reply,
        };
        let delta = meta.delta.unwrap_or(1).max(1) as usize;
        match self.broker.move_offset(&id, delta) {
            Ok(()) => Frame::new(MsgType::Response, response(Status::Ok)),
            Err(e) => self.failed("moving offset", e),
        }
    }

    fn failed(&self, op: &str, err: BrokerError) -> Frame {
        match err.kind() {
            ErrorKind::Internal | ErrorKind::InvalidConfiguration => {
                error!("{} 失败: {} / {} failed: {}", op, err, op, err)
            }
            _ => debug!("{} 失败: {} / {} failed: {}", op, err, op, err),
        }
        error_frame(&err)
    }
}
