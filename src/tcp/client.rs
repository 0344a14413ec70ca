use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::mq::{Message, SubscriberId};

use super::protocol::*;

/// 服务端返回的失败响应
///
/// A non-OK response returned by the broker.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("broker returned {status:?}: {message}")]
pub struct RemoteError {
    pub status: Status,
    pub message: String,
    pub violations: Vec<FieldViolation>,
}

pub struct TcpClientOptions {
    pub server_addr: SocketAddr,
}

impl Default for TcpClientOptions {
    fn default() -> Self {
        Self { server_addr: SocketAddr::from(([127, 0, 0, 1], 10083)) }
    }
}

pub struct TcpClient {
    opts: TcpClientOptions,
    socket: Option<TcpStream>,
}

impl TcpClient {
    pub fn new(opts: TcpClientOptions) -> Self {
        Self { opts, socket: None }
    }

    pub async fn connect(&mut self) -> anyhow::Result<()> {
        let socket = TcpStream::connect(self.opts.server_addr).await?;
        let _ = socket.set_nodelay(true);
        self.socket = Some(socket);
        Ok(())
    }

    pub async fn disconnect(&mut self) -> anyhow::Result<()> {
        if let Some(mut s) = self.socket.take() {
            tokio::io::AsyncWriteExt::shutdown(&mut s).await?;
        }
        Ok(())
    }

    /// 发送请求并等待响应；非 OK 状态转换为 `RemoteError`
    ///
    /// Send a request and wait for its response; non-OK statuses become `RemoteError`.
    async fn call(&mut self, request: Frame) -> anyhow::Result<Frame> {
        let socket = match &mut self.socket {
            Some(s) => s,
            None => anyhow::bail!("not connected"),
        };
        write_frame(&mut *socket, &request).await?;
        let reply = read_frame(&mut *socket).await?;
        if reply.msg_type != MsgType::Response {
            anyhow::bail!("unexpected frame type {:?}", reply.msg_type);
        }
        match reply.meta.status {
            Some(Status::Ok) => Ok(reply),
            Some(status) => Err(RemoteError {
                status,
                message: reply.meta.error.clone().unwrap_or_default(),
                violations: reply.meta.violations.clone(),
            }
            .into()),
            None => anyhow::bail!("response without status"),
        }
    }

    pub async fn publish(&mut self, topic: &str, messages: &[Message]) -> anyhow::Result<()> {
        let wire: Vec<WireMessage> = messages
            .iter()
            .map(|m| WireMessage {
                key: Some(m.key().to_string()),
                payload: Some(m.payload().to_vec()),
                ..Default::default()
            })
            .collect();
        let request = Frame::new(
            MsgType::Publish,
            FrameMeta { topic: Some(topic.to_string()), ..Default::default() },
        )
        .with_messages(&wire)?;
        self.call(request).await?;
        Ok(())
    }

    pub async fn subscribe(&mut self, topic: &str, group: &str) -> anyhow::Result<SubscriberId> {
        let reply = self
            .call(Frame::new(
                MsgType::Subscribe,
                FrameMeta { topic: Some(topic.to_string()), group: Some(group.to_string()), ..Default::default() },
            ))
            .await?;
        let raw = reply
            .meta
            .subscriber_id
            .ok_or_else(|| anyhow::anyhow!("subscribe response without subscriber id"))?;
        Ok(raw.parse()?)
    }

    pub async fn poll(&mut self, subscriber: &SubscriberId, limit: usize) -> anyhow::Result<Vec<Message>> {
        let reply = self
            .call(Frame::new(
                MsgType::Poll,
                FrameMeta {
                    subscriber_id: Some(subscriber.to_string()),
                    limit: Some(i64::try_from(limit)?),
                    ..Default::default()
                },
            ))
            .await?;
        Ok(reply.messages()?.into_iter().map(Message::from).collect())
    }

    pub async fn move_offset(&mut self, subscriber: &SubscriberId, delta: usize) -> anyhow::Result<()> {
        self.call(Frame::new(
            MsgType::MoveOffset,
            FrameMeta {
                subscriber_id: Some(subscriber.to_string()),
                delta: Some(i64::try_from(delta)?),
                ..Default::default()
            },
        ))
        .await?;
        Ok(())
    }
}
