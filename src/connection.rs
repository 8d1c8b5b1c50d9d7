use crate::error::{Result, StormAudioError};
use bytes::{Buf, BufMut, BytesMut};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{Decoder, Encoder, Framed};

/// Longest line accepted before the rest of it is discarded
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Newline-delimited text framing.
///
/// Decoding is lossy on invalid UTF-8 and trims surrounding whitespace
/// (including `\r`), so one bad line never ends the stream. Blank lines are
/// skipped.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// How far into the buffer we already searched for `\n`
    next_index: usize,
    /// Dropping an over-long line until its terminator shows up
    discarding: bool,
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');
            let Some(offset) = newline else {
                if src.len() > MAX_LINE_LENGTH {
                    tracing::warn!("Discarding line longer than {} bytes", MAX_LINE_LENGTH);
                    src.clear();
                    self.discarding = true;
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let end = self.next_index + offset;
            self.next_index = 0;
            let raw = src.split_to(end + 1);

            if std::mem::take(&mut self.discarding) {
                continue;
            }

            let line = String::from_utf8_lossy(&raw[..end]).trim().to_string();
            if !line.is_empty() {
                return Ok(Some(line));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        // Unterminated tail before the peer closed
        let tail = String::from_utf8_lossy(src.chunk()).trim().to_string();
        src.clear();
        self.next_index = 0;
        if tail.is_empty() || std::mem::take(&mut self.discarding) {
            Ok(None)
        } else {
            Ok(Some(tail))
        }
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: T, dst: &mut BytesMut) -> io::Result<()> {
        let line = line.as_ref();
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Write half of a processor connection
///
/// Lines are handed to a background task that writes and flushes them in
/// order.
pub struct Connection {
    peer: String,
    line_tx: mpsc::UnboundedSender<String>,
    writer: JoinHandle<()>,
}

/// Read half of a processor connection
pub struct LineReader {
    peer: String,
    stream: SplitStream<Framed<TcpStream, LineCodec>>,
}

/// Open a TCP connection to `address:port`
pub async fn connect(
    address: &str,
    port: u16,
    limit: Duration,
) -> Result<(Connection, LineReader)> {
    let peer = format!("{}:{}", address, port);
    tracing::info!("Connecting to {}", peer);

    let stream = match timeout(limit, TcpStream::connect((address, port))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
            return Err(StormAudioError::ConnectionRefused { address: peer });
        }
        Ok(Err(e)) => return Err(StormAudioError::Io(e)),
        Err(_) => return Err(StormAudioError::ConnectTimeout { address: peer }),
    };
    stream.set_nodelay(true)?;

    let (mut sink, stream) = Framed::new(stream, LineCodec::default()).split();
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();

    let writer_peer = peer.clone();
    let writer = tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            if let Err(e) = sink.send(line).await {
                tracing::error!("[{}] Failed to send line: {}", writer_peer, e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    Ok((
        Connection {
            peer: peer.clone(),
            line_tx,
            writer,
        },
        LineReader { peer, stream },
    ))
}

impl Connection {
    /// Queue a line for sending; the terminator is appended by the codec
    pub fn send(&self, line: &str) -> Result<()> {
        tracing::debug!("[{}] Sending: {}", self.peer, line);
        self.line_tx
            .send(line.to_string())
            .map_err(|_| StormAudioError::ConnectionClosed)
    }

    /// Flush queued lines and close the write side
    pub async fn close(self) {
        drop(self.line_tx);
        let _ = self.writer.await;
    }
}

impl LineReader {
    /// Next line from the peer; `None` once the peer closed or the socket
    /// failed
    pub async fn next_line(&mut self) -> Option<String> {
        match self.stream.next().await? {
            Ok(line) => {
                tracing::debug!("[{}] Received: {}", self.peer, line);
                Some(line)
            }
            Err(e) => {
                tracing::error!("[{}] Read error: {}", self.peer, e);
                None
            }
        }
    }

    /// Feed every line to `on_line` until the connection ends
    pub async fn run<F: FnMut(String)>(mut self, mut on_line: F) {
        while let Some(line) = self.next_line().await {
            on_line(line);
        }
        tracing::info!("[{}] Connection closed by peer", self.peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn decode_all(codec: &mut LineCodec, buf: &mut BytesMut) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = codec.decode(buf).unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_codec_splits_and_trims_lines() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"ssp.mute.on\r\n\nssp.vol.[-45.0]\nssp.inp"[..]);

        assert_eq!(decode_all(&mut codec, &mut buf), vec!["ssp.mute.on", "ssp.vol.[-45.0]"]);

        buf.extend_from_slice(b"ut.[3]\n");
        assert_eq!(decode_all(&mut codec, &mut buf), vec!["ssp.input.[3]"]);
    }

    #[test]
    fn test_codec_survives_invalid_utf8() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"ssp.input.list.[\"Caf\xe9\", 4]\nssp.mute.off\n"[..]);

        let lines = decode_all(&mut codec, &mut buf);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "ssp.mute.off");
    }

    #[test]
    fn test_codec_discards_overlong_lines() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(vec![b'x'; MAX_LINE_LENGTH + 1].as_slice());
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"xxxx\nssp.mute.on\n");
        assert_eq!(decode_all(&mut codec, &mut buf), vec!["ssp.mute.on"]);
    }

    #[test]
    fn test_codec_returns_unterminated_tail_at_eof() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"ssp.power.off"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("ssp.power.off"));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_encoder_appends_newline() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::new();
        codec.encode("ssp.power.on", &mut buf).unwrap();
        assert_eq!(&buf[..], b"ssp.power.on\n");
    }

    #[tokio::test]
    async fn test_round_trip_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64];
            let n = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await.unwrap();
            socket.write_all(b"ssp.power.on\nssp.procstate.[2]\n").await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        let (connection, mut reader) = connect("127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap();
        connection.send("ssp.power.on").unwrap();

        assert_eq!(reader.next_line().await.as_deref(), Some("ssp.power.on"));
        assert_eq!(reader.next_line().await.as_deref(), Some("ssp.procstate.[2]"));
        assert_eq!(server.await.unwrap(), "ssp.power.on\n");

        // Server dropped its socket: EOF
        assert!(reader.next_line().await.is_none());
        connection.close().await;
    }

    #[tokio::test]
    async fn test_refused_connection_is_classified() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = connect("127.0.0.1", port, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(StormAudioError::ConnectionRefused { .. })));
    }
}
