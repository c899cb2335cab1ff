//! ホストとのバイト列リンク
//!
//! 端末コアはバイトの送受信しか見ない。実際の経路は TCP 接続か、
//! 記録済みバイト列の再生（ヘッドレス実行・デバッグ用）。

use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::path::Path;

/// 接続状態の変化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Attached,
    Detached,
}

/// ホストリンク（ノンブロッキング）
pub trait Transport {
    /// 接続・切断を確認する
    fn poll_event(&mut self) -> Option<LinkEvent>;
    /// 受信済みのバイトを `buf` に読む。何もなければ 0
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// 送信する。すぐに書けない分は実装側で保持してよい
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// 保持している未送信分を書き出す
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// ホストが読まずに溜まった未送信バイトの上限。超えたら切断する
pub const MAX_PENDING_SEND: usize = 64 * 1024;

/// TCP で1台のホストを待ち受ける
pub struct TcpTransport {
    listener: TcpListener,
    stream: Option<TcpStream>,
    detached: bool,
    /// ソケットに書き切れなかった送信データ
    pending: Vec<u8>,
}

impl TcpTransport {
    pub fn listen<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        log::info!("Waiting for host on {}", listener.local_addr()?);
        Ok(TcpTransport {
            listener,
            stream: None,
            detached: false,
            pending: Vec::new(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// 未送信のバイト数
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn drop_stream(&mut self) {
        self.pending.clear();
        if self.stream.take().is_some() {
            log::info!("Host disconnected");
            self.detached = true;
        }
    }
}

impl Transport for TcpTransport {
    fn poll_event(&mut self) -> Option<LinkEvent> {
        if self.detached {
            self.detached = false;
            return Some(LinkEvent::Detached);
        }
        if self.stream.is_some() {
            return None;
        }
        match self.listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    log::warn!("Rejecting host {}: {}", peer, e);
                    return None;
                }
                let _ = stream.set_nodelay(true);
                log::info!("Host connected from {}", peer);
                self.stream = Some(stream);
                Some(LinkEvent::Attached)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                log::warn!("Accept failed: {}", e);
                None
            }
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };
        match stream.read(buf) {
            Ok(0) => {
                self.drop_stream();
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => {
                self.drop_stream();
                Err(e)
            }
        }
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.stream.is_none() {
            return Ok(());
        }
        self.pending.extend_from_slice(bytes);
        self.flush()?;
        if self.pending.len() > MAX_PENDING_SEND {
            log::warn!("Host is not reading ({} bytes unsent), dropping link", self.pending.len());
            self.drop_stream();
            return Err(io::Error::new(ErrorKind::WouldBlock, "host stopped reading"));
        }
        Ok(())
    }

    /// 書けるだけ書いて、残りは次回に回す
    fn flush(&mut self) -> io::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };
        let mut written = 0;
        let result = loop {
            if written == self.pending.len() {
                break Ok(());
            }
            match stream.write(&self.pending[written..]) {
                Ok(0) => break Err(io::Error::new(ErrorKind::WriteZero, "host closed the link")),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.pending.drain(..written);
        if result.is_err() {
            self.drop_stream();
        }
        result
    }
}

/// 記録済みのホスト出力を再生する
///
/// 端末からの送信は `sent()` に溜めるだけ。
#[derive(Debug, Clone, Default)]
pub struct ReplayTransport {
    data: Vec<u8>,
    pos: usize,
    attached: bool,
    sent: Vec<u8>,
}

impl ReplayTransport {
    pub fn new(data: Vec<u8>) -> Self {
        ReplayTransport {
            data,
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let data = std::fs::read(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        log::info!("Replaying {} host bytes from {}", data.len(), path.display());
        Ok(Self::new(data))
    }

    /// 全バイトを渡し終えたか
    pub fn is_finished(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn sent(&self) -> &[u8] {
        &self.sent
    }
}

impl Transport for ReplayTransport {
    fn poll_event(&mut self) -> Option<LinkEvent> {
        if self.attached {
            return None;
        }
        self.attached = true;
        Some(LinkEvent::Attached)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.sent.extend_from_slice(bytes);
        Ok(())
    }
}
