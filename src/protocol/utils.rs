//! pkt-line helpers for the client side of the smart protocol: framing of
//! request lines into a buffer and incremental reading of response lines
//! from a remote process's standard output.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::types::{MAX_PKT_LINE_LEN, PKT_LINE_END_MARKER, ServiceType, TransportError};

/// One frame read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    Data(Bytes),
    /// `0000`
    Flush,
}

impl PktLine {
    /// Payload as text with a single trailing LF removed.
    pub fn as_text(&self) -> Option<String> {
        match self {
            PktLine::Data(data) => {
                let data = data.strip_suffix(b"\n").unwrap_or(&data[..]);
                Some(String::from_utf8_lossy(data).into_owned())
            }
            PktLine::Flush => None,
        }
    }
}

/// Add a packet line string to the buffer with proper length prefix
pub fn add_pkt_line_string(pkt_line_stream: &mut BytesMut, buf_str: String) {
    let buf_str_length = buf_str.len() + 4;
    pkt_line_stream.put(Bytes::from(format!("{buf_str_length:04x}")));
    pkt_line_stream.put(buf_str.as_bytes());
}

pub fn add_flush(pkt_line_stream: &mut BytesMut) {
    pkt_line_stream.put(&PKT_LINE_END_MARKER[..]);
}

/// Read one pkt-line.
///
/// Returns `Ok(None)` when the stream ends cleanly before a new frame.
/// A bad length prefix or a frame cut short is an `AnswerFormat` error
/// attributed to `service`.
pub async fn read_pkt_line<R>(
    reader: &mut R,
    service: ServiceType,
) -> Result<Option<PktLine>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            tracing::warn!("stream ended inside pkt-line length prefix");
            return Err(TransportError::answer_format(service));
        }
        filled += n;
    }

    let pkt_length = std::str::from_utf8(&prefix)
        .ok()
        .and_then(|s| usize::from_str_radix(s, 16).ok())
        .ok_or_else(|| {
            tracing::warn!("Invalid hex packet length: {:?}", prefix);
            TransportError::answer_format(service)
        })?;

    if pkt_length == 0 {
        return Ok(Some(PktLine::Flush));
    }
    if pkt_length < 4 || pkt_length > MAX_PKT_LINE_LEN {
        tracing::warn!("Invalid packet length: {}", pkt_length);
        return Err(TransportError::answer_format(service));
    }

    let mut data = vec![0u8; pkt_length - 4];
    reader.read_exact(&mut data).await.map_err(|e| {
        tracing::warn!("pkt-line of {} bytes cut short: {}", pkt_length, e);
        TransportError::answer_format(service)
    })?;
    tracing::debug!("pkt line: {:?}", String::from_utf8_lossy(&data));

    Ok(Some(PktLine::Data(Bytes::from(data))))
}

/// Quote a repository path as a single shell word.
pub fn quote_path(path: &str) -> String {
    format!("'{}'", path.replace('\'', r"'\''"))
}
