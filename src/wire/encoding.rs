use async_trait::async_trait;
use prost::{bytes::BufMut, Message};

use super::{proto, BytesBus, MessageBus, WireError};
use crate::messages::VectorMessage;

/// Length of the big endian frame header.
const HEADER_LEN: usize = 2;

#[derive(Debug)]
pub struct ProtoBufEncodingLayer<B: BytesBus> {
    pub bus: B,
}

impl<B: BytesBus> ProtoBufEncodingLayer<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Frame `msg`: a `u16` length followed by the protobuf bytes.
    ///
    /// `encode_length_delimited` would write a LEB128 varint instead.
    pub fn encode(msg: VectorMessage) -> Result<Vec<u8>, WireError> {
        let envelope = proto::Envelope::from(msg);
        let len = envelope.encoded_len();
        if len > u16::MAX as usize {
            return Err(WireError::FrameTooLarge(len));
        }

        let mut buf = Vec::with_capacity(HEADER_LEN + len);
        buf.put_slice(&(len as u16).to_be_bytes());
        envelope
            .encode(&mut buf)
            .map_err(|e| WireError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Inverse of [Self::encode], for exactly one frame.
    pub fn decode(frame: &[u8]) -> Result<VectorMessage, WireError> {
        if frame.len() < HEADER_LEN {
            return Err(WireError::FrameLength {
                announced: HEADER_LEN,
                actual: frame.len(),
            });
        }
        let (header, payload) = frame.split_at(HEADER_LEN);
        let announced = u16::from_be_bytes([header[0], header[1]]) as usize;
        if announced != payload.len() {
            return Err(WireError::FrameLength {
                announced,
                actual: payload.len(),
            });
        }

        let envelope =
            proto::Envelope::decode(payload).map_err(|e| WireError::Decode(e.to_string()))?;
        Ok(envelope.try_into()?)
    }
}

#[async_trait]
impl<B: BytesBus> MessageBus for ProtoBufEncodingLayer<B> {
    async fn send(&self, msg: VectorMessage) -> Result<(), WireError> {
        let recipient = msg.to().clone();
        let frame = Self::encode(msg)?;
        self.bus.send_to(&recipient, &frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::tests::{create_params, funded_channel, parties, propose},
        error::{ChannelUpdateError, UpdateErrorReason},
        messages::{ErrorMessage, UpdateMessage},
        wire::memory::MemoryTransport,
    };

    type Layer = ProtoBufEncodingLayer<MemoryTransport>;

    fn update_message() -> VectorMessage {
        let parties = parties();
        let state = funded_channel(&parties);
        let update = propose(&create_params(&state, 10, 2), Some(&state), &parties[0]);
        VectorMessage::Update(UpdateMessage {
            to: parties[1].identity.clone(),
            from: parties[0].identity.clone(),
            update,
            latest_update: Some(state.latest_update),
        })
    }

    #[test]
    fn frame_header_is_payload_length() {
        let frame = Layer::encode(update_message()).unwrap();
        let len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
        assert_eq!(len, frame.len() - 2);
    }

    #[test]
    fn update_survives_the_wire() {
        let msg = update_message();
        let frame = Layer::encode(msg.clone()).unwrap();
        assert_eq!(Layer::decode(&frame).unwrap(), msg);
    }

    #[test]
    fn error_survives_the_wire() {
        let parties = parties();
        let state = funded_channel(&parties);
        let msg = VectorMessage::Error(ErrorMessage {
            to: parties[0].identity.clone(),
            from: parties[1].identity.clone(),
            error: ChannelUpdateError::for_update(
                UpdateErrorReason::Equivocation,
                &state.latest_update,
                "two states at nonce 2",
            )
            .with_latest_update(Some(state.latest_update.clone())),
        });

        let frame = Layer::encode(msg.clone()).unwrap();
        assert_eq!(Layer::decode(&frame).unwrap(), msg);
    }

    #[test]
    fn truncated_frames_are_rejected() {
        let frame = Layer::encode(update_message()).unwrap();

        assert!(matches!(
            Layer::decode(&frame[..1]),
            Err(WireError::FrameLength { .. })
        ));
        assert!(matches!(
            Layer::decode(&frame[..frame.len() - 1]),
            Err(WireError::FrameLength { .. })
        ));
    }

    #[test]
    fn envelope_without_message_is_rejected() {
        let envelope = proto::Envelope {
            sender: b"alice".to_vec(),
            recipient: b"bob".to_vec(),
            msg: None,
        };
        let payload = envelope.encode_to_vec();
        let mut frame = (payload.len() as u16).to_be_bytes().to_vec();
        frame.extend_from_slice(&payload);

        assert_eq!(
            Layer::decode(&frame),
            Err(WireError::Conversion(
                crate::messages::ConversionError::ExpectedSome
            ))
        );
    }
}
