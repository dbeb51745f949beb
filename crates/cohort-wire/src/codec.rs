//! Line-delimited JSON codec.
//!
//! # Wire format
//!
//! Each message is one JSON object followed by `\n`:
//!
//! ```text
//! {"source":0,"sink":1,"tag":7,"payload":[1,2,3,4]}
//! ```
//!
//! Readers frame on the newline and decode the whole line; writers encode
//! and flush one line per message. A clean EOF between records decodes as
//! `None`; an EOF in the middle of a line is a decode failure.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Message, WireError};

/// Encode a message as a single line, without the trailing newline.
pub fn encode(msg: &Message) -> Result<String, WireError> {
    serde_json::to_string(msg).map_err(WireError::Encode)
}

/// Decode a message from one line of input.
pub fn decode(line: &str) -> Result<Message, WireError> {
    serde_json::from_str(line.trim_end()).map_err(WireError::Decode)
}

/// Write one framed message and flush it.
pub async fn write_message<W>(writer: &mut W, msg: &Message) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = encode(msg)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message. Returns `None` on a clean EOF.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>, WireError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    decode(&line).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceCode;
    use serde_json::{json, Value};
    use tokio::io::{AsyncWriteExt, BufReader};

    #[test]
    fn round_trip_simple() {
        let msg = Message::new(0, 1, 7, json!([1, 2, 3, 4]));
        let line = encode(&msg).unwrap();
        assert_eq!(decode(&line).unwrap(), msg);
    }

    #[test]
    fn round_trip_nested_payload() {
        let msg = Message::new(
            3,
            0,
            42,
            json!({"name": "rank 3", "values": [1.5, 2.5], "flags": {"done": true}}),
        );
        let line = encode(&msg).unwrap();
        assert_eq!(decode(&line).unwrap(), msg);
    }

    #[test]
    fn round_trip_service_call() {
        let msg = Message::service_call(ServiceCode::Init, 2, 2, Value::Null);
        let line = encode(&msg).unwrap();
        let back = decode(&line).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.sink, ServiceCode::Init.as_i64());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode("not json"), Err(WireError::Decode(_))));
        assert!(matches!(
            decode(r#"{"source":0}"#),
            Err(WireError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn stream_round_trip() {
        let (mut a, b) = tokio::io::duplex(4096);
        let mut reader = BufReader::new(b);

        let first = Message::new(0, 1, 1, json!("hello"));
        let second = Message::new(0, 1, 2, json!([10, 20]));
        write_message(&mut a, &first).await.unwrap();
        write_message(&mut a, &second).await.unwrap();

        assert_eq!(read_message(&mut reader).await.unwrap(), Some(first));
        assert_eq!(read_message(&mut reader).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn eof_reads_as_none() {
        let (mut a, b) = tokio::io::duplex(4096);
        let mut reader = BufReader::new(b);

        let msg = Message::new(1, 0, 1, Value::Null);
        write_message(&mut a, &msg).await.unwrap();
        drop(a);

        assert_eq!(read_message(&mut reader).await.unwrap(), Some(msg));
        assert_eq!(read_message(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn truncated_line_is_a_decode_error() {
        let (mut a, b) = tokio::io::duplex(4096);
        let mut reader = BufReader::new(b);

        a.write_all(b"{\"source\":0,\"sink\":1,").await.unwrap();
        drop(a);

        assert!(matches!(
            read_message(&mut reader).await,
            Err(WireError::Decode(_))
        ));
    }
}
