use crate::error::{DirectoryError, Result};
use crate::message::{DirectoryMessage, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};

/// Bytes between the length prefix and the payload: version and tag.
const HEADER_LEN: usize = 2;

/// Framing codec for directory messages:
/// `[4 bytes len][1 byte version][1 byte tag][payload]`.
///
/// `len` counts the version byte, the tag and the bincode payload.
pub struct DirectoryCodec;

impl DirectoryCodec {
    /// Serialize and frame one message.
    pub fn encode(msg: &DirectoryMessage) -> Result<Vec<u8>> {
        let payload =
            bincode::serialize(msg).map_err(|e| DirectoryError::Serialization(e.to_string()))?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(DirectoryError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let len = (payload.len() + HEADER_LEN) as u32;
        let mut buf = Vec::with_capacity(4 + HEADER_LEN + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(PROTOCOL_VERSION);
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode one framed message. Returns (message, bytes consumed).
    pub fn decode(data: &[u8]) -> Result<(DirectoryMessage, usize)> {
        let Some((header, rest)) = data.split_first_chunk::<4>() else {
            return Err(DirectoryError::Framing("too short".into()));
        };
        let len = u32::from_be_bytes(*header) as usize;
        if len < HEADER_LEN {
            return Err(DirectoryError::Framing(format!("frame length {len} below header size")));
        }
        if len - HEADER_LEN > MAX_MESSAGE_SIZE {
            return Err(DirectoryError::MessageTooLarge {
                size: len - HEADER_LEN,
                max: MAX_MESSAGE_SIZE,
            });
        }
        if rest.len() < len {
            return Err(DirectoryError::Framing(format!(
                "incomplete: have {}, need {}",
                data.len(),
                4 + len
            )));
        }
        let (version, tag) = (rest[0], rest[1]);
        if version != PROTOCOL_VERSION {
            return Err(DirectoryError::UnsupportedVersion {
                got: version,
                expected: PROTOCOL_VERSION,
            });
        }
        let msg: DirectoryMessage = bincode::deserialize(&rest[HEADER_LEN..len])
            .map_err(|e| DirectoryError::Deserialization(e.to_string()))?;
        if msg.type_tag() != tag {
            return Err(DirectoryError::Framing(format!(
                "tag {tag} does not match {} message",
                msg.type_name()
            )));
        }
        Ok((msg, 4 + len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::WireError;
    use ebb_types::EbbId;

    fn sample() -> Vec<DirectoryMessage> {
        let id = EbbId::new(4, 2);
        vec![
            DirectoryMessage::Get { request_id: 1, id, path: "cfg".into() },
            DirectoryMessage::Set { request_id: 2, id, path: String::new(), value: "v".into() },
            DirectoryMessage::Children { request_id: 3, names: vec!["a".into(), "b".into()] },
            DirectoryMessage::Failed {
                request_id: 4,
                error: WireError::NotFound { id, path: "x".into() },
            },
        ]
    }

    #[test]
    fn frames_decode_back() {
        for msg in sample() {
            let encoded = DirectoryCodec::encode(&msg).unwrap();
            assert_eq!(encoded[4], PROTOCOL_VERSION);
            assert_eq!(encoded[5], msg.type_tag());
            let (decoded, consumed) = DirectoryCodec::decode(&encoded).unwrap();
            assert_eq!(consumed, encoded.len());
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn consecutive_frames_in_one_buffer() {
        let mut buf = Vec::new();
        for msg in sample() {
            buf.extend(DirectoryCodec::encode(&msg).unwrap());
        }
        let mut offset = 0;
        let mut decoded = Vec::new();
        while offset < buf.len() {
            let (msg, used) = DirectoryCodec::decode(&buf[offset..]).unwrap();
            decoded.push(msg);
            offset += used;
        }
        assert_eq!(decoded, sample());
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let encoded = DirectoryCodec::encode(&sample()[0]).unwrap();
        assert!(matches!(
            DirectoryCodec::decode(&encoded[..encoded.len() - 1]),
            Err(DirectoryError::Framing(_))
        ));
        assert!(matches!(DirectoryCodec::decode(&[0, 0]), Err(DirectoryError::Framing(_))));
        assert!(matches!(
            DirectoryCodec::decode(&[0, 0, 0, 0, 1]),
            Err(DirectoryError::Framing(_))
        ));
        assert!(matches!(
            DirectoryCodec::decode(&[0, 0, 0, 1, PROTOCOL_VERSION]),
            Err(DirectoryError::Framing(_))
        ));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut frame = ((MAX_MESSAGE_SIZE + 3) as u32).to_be_bytes().to_vec();
        frame.extend([PROTOCOL_VERSION, 1]);
        assert!(matches!(
            DirectoryCodec::decode(&frame),
            Err(DirectoryError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn mismatched_tag_is_rejected() {
        let mut encoded = DirectoryCodec::encode(&sample()[0]).unwrap();
        encoded[5] = 99;
        assert!(matches!(DirectoryCodec::decode(&encoded), Err(DirectoryError::Framing(_))));
    }

    #[test]
    fn other_protocol_version_is_rejected() {
        let mut encoded = DirectoryCodec::encode(&sample()[1]).unwrap();
        encoded[4] = PROTOCOL_VERSION + 1;
        match DirectoryCodec::decode(&encoded) {
            Err(DirectoryError::UnsupportedVersion { got, expected }) => {
                assert_eq!(got, PROTOCOL_VERSION + 1);
                assert_eq!(expected, PROTOCOL_VERSION);
            }
            other => panic!("expected version error, got {other:?}"),
        }
    }
}
