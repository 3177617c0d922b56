//! Tokio codec for bridge message framing.
//!
//! Each message is one JSON document followed by a newline. The codec
//! implements:
//! - [`Decoder`]: extracts complete lines from the byte stream and parses them
//! - [`Encoder`]: serialises any message and appends the newline
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//! use portico_protocol::{BridgeRequest, ClientCodec};
//! use futures::{SinkExt, StreamExt};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpStream::connect("127.0.0.1:64100").await?;
//! let mut framed = Framed::new(stream, ClientCodec::new());
//!
//! framed.send(BridgeRequest::Authenticate { token: "secret".into() }).await?;
//! if let Some(Ok(response)) = framed.next().await {
//!     println!("Received: {:?}", response);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Frame Size
//!
//! Lines longer than the maximum frame size (default: 64 KB) are rejected
//! so a misbehaving peer cannot make the buffer grow without bound.

use std::marker::PhantomData;

use bytes::{BufMut, BytesMut};
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::codec::{Decoder, Encoder};

use crate::{BridgeRequest, BridgeResponse, ProtocolError};

/// Default maximum frame size in bytes (64 KB).
const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

const DELIMITER: u8 = b'\n';

/// Newline-delimited JSON codec decoding messages of type `D`.
///
/// Encoding accepts any serialisable message, so the same codec type serves
/// both ends of a connection with the direction chosen by `D`.
#[derive(Debug)]
pub struct BridgeCodec<D> {
    max_frame_size: usize,
    /// Bytes already scanned for a delimiter in the current buffer.
    next_index: usize,
    _decodes: PhantomData<fn() -> D>,
}

/// Codec used by clients: decodes [`BridgeResponse`].
pub type ClientCodec = BridgeCodec<BridgeResponse>;

/// Codec used by bridges (and test doubles): decodes [`BridgeRequest`].
pub type ServerCodec = BridgeCodec<BridgeRequest>;

impl<D> BridgeCodec<D> {
    /// Create a codec with the default maximum frame size.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a codec with a custom maximum frame size.
    ///
    /// # Example
    ///
    /// ```
    /// use portico_protocol::ClientCodec;
    ///
    /// let codec = ClientCodec::with_max_frame_size(128 * 1024);
    /// assert_eq!(codec.max_frame_size(), 128 * 1024);
    /// ```
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            next_index: 0,
            _decodes: PhantomData,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl<D> Default for BridgeCodec<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DeserializeOwned> Decoder for BridgeCodec<D> {
    type Item = D;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<D>, ProtocolError> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == DELIMITER) else {
                if src.len() > self.max_frame_size {
                    return Err(ProtocolError::FrameTooLarge {
                        size: src.len(),
                        max_size: self.max_frame_size,
                    });
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let line_end = self.next_index + offset;
            self.next_index = 0;

            if line_end > self.max_frame_size {
                return Err(ProtocolError::FrameTooLarge {
                    size: line_end,
                    max_size: self.max_frame_size,
                });
            }

            let line = src.split_to(line_end + 1);
            let payload = trim_line(&line[..line_end]);

            // Blank lines are keep-alives
            if payload.is_empty() {
                continue;
            }

            let message = serde_json::from_slice(payload)?;
            return Ok(Some(message));
        }
    }
}

impl<D, E: Serialize> Encoder<E> for BridgeCodec<D> {
    type Error = ProtocolError;

    fn encode(&mut self, item: E, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let payload = serde_json::to_vec(&item)?;
        if payload.len() > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max_size: self.max_frame_size,
            });
        }

        dst.reserve(payload.len() + 1);
        dst.put_slice(&payload);
        dst.put_u8(DELIMITER);
        Ok(())
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AddressBook;

    #[test]
    fn test_decode_single_message() {
        let mut codec = ClientCodec::new();
        let mut buffer = BytesMut::from(&b"{\"type\":\"auth\",\"code\":200}\n"[..]);

        let message = codec.decode(&mut buffer).unwrap();
        assert_eq!(message, Some(BridgeResponse::Auth { code: 200 }));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decode_partial_then_complete() {
        let mut codec = ClientCodec::new();
        let mut buffer = BytesMut::from(&b"{\"type\":\"ack\","[..]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"\"code\":503}\r\n");
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(BridgeResponse::Ack {
                code: 503,
                message: None
            })
        );
    }

    #[test]
    fn test_decode_two_messages_in_one_read() {
        let mut codec = ServerCodec::new();
        let mut buffer = BytesMut::from(
            &b"{\"type\":\"authenticate\",\"token\":\"t\"}\n\n{\"type\":\"get_config\",\"scope\":\"all\"}\n"[..],
        );

        assert!(matches!(
            codec.decode(&mut buffer).unwrap(),
            Some(BridgeRequest::Authenticate { .. })
        ));
        assert!(matches!(
            codec.decode(&mut buffer).unwrap(),
            Some(BridgeRequest::GetConfig { .. })
        ));
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_decode_invalid_json() {
        let mut codec = ClientCodec::new();
        let mut buffer = BytesMut::from(&b"not json\n"[..]);
        assert!(matches!(
            codec.decode(&mut buffer),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let mut codec = ClientCodec::with_max_frame_size(16);
        let mut buffer = BytesMut::from(&[b'x'; 32][..]);
        assert!(matches!(
            codec.decode(&mut buffer),
            Err(ProtocolError::FrameTooLarge { size: 32, max_size: 16 })
        ));
    }

    #[test]
    fn test_encode_appends_delimiter() {
        let mut codec = ServerCodec::new();
        let mut buffer = BytesMut::new();
        codec
            .encode(
                BridgeResponse::Config {
                    address_book: AddressBook::default(),
                },
                &mut buffer,
            )
            .unwrap();

        assert_eq!(buffer.last(), Some(&b'\n'));
        let mut client = ClientCodec::new();
        assert!(matches!(
            client.decode(&mut buffer).unwrap(),
            Some(BridgeResponse::Config { .. })
        ));
    }
}
