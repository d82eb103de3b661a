//! 와이어 프레임 정의
//!
//! 고정 16바이트 헤더 + 페이로드, 네트워크 바이트 순서
//!
//! ```text
//! offset 0:  sequence_id     (u32)
//! offset 4:  ack_flag        (u32, 0|1)
//! offset 8:  nak_flag        (u32, 0|1)
//! offset 12: payload_length  (u32)
//! offset 16: payload
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::block::{Block, SequenceId};
use crate::error::FrameError;
use crate::{Error, Result};

/// 헤더 크기 (바이트)
pub const HEADER_SIZE: usize = 16;

/// 프레임 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// 데이터 블록 (송신자 → 그룹)
    Data,

    /// 수신 확인
    Ack,

    /// 재전송 요청
    Nak,
}

/// 프레임 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub sequence_id: SequenceId,
    pub ack: bool,
    pub nak: bool,
    pub payload_len: u32,
}

/// 프레임 (송수신 단위)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    /// 데이터 프레임 생성
    pub fn data(sequence_id: SequenceId, payload: Bytes) -> Self {
        Self {
            header: FrameHeader {
                sequence_id,
                ack: false,
                nak: false,
                payload_len: payload.len() as u32,
            },
            payload,
        }
    }

    /// ACK 프레임 생성
    pub fn ack(sequence_id: SequenceId) -> Self {
        Self::feedback(sequence_id, true, false)
    }

    /// NAK 프레임 생성
    pub fn nak(sequence_id: SequenceId) -> Self {
        Self::feedback(sequence_id, false, true)
    }

    fn feedback(sequence_id: SequenceId, ack: bool, nak: bool) -> Self {
        Self {
            header: FrameHeader {
                sequence_id,
                ack,
                nak,
                payload_len: 0,
            },
            payload: Bytes::new(),
        }
    }

    /// 블록에서 데이터 프레임 생성
    pub fn from_block(block: &Block) -> Self {
        Self::data(block.sequence_id, block.payload.clone())
    }

    pub fn sequence_id(&self) -> SequenceId {
        self.header.sequence_id
    }

    /// 프레임 종류 (ACK 플래그가 NAK보다 우선)
    pub fn kind(&self) -> FrameKind {
        if self.header.ack {
            FrameKind::Ack
        } else if self.header.nak {
            FrameKind::Nak
        } else {
            FrameKind::Data
        }
    }

    /// 인코딩 후 크기
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// 바이트로 직렬화
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// 버퍼에 직렬화
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_u32(self.header.sequence_id);
        buf.put_u32(self.header.ack as u32);
        buf.put_u32(self.header.nak as u32);
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
    }

    /// 크기 제한을 확인하며 직렬화
    pub fn encode_bounded(&self, max_datagram_size: usize) -> Result<Bytes> {
        if self.encoded_len() > max_datagram_size {
            return Err(Error::PayloadTooLarge {
                size: self.payload.len(),
                max_size: max_datagram_size.saturating_sub(HEADER_SIZE),
            });
        }
        Ok(self.to_bytes())
    }

    /// 바이트에서 역직렬화
    pub fn from_bytes(datagram: &[u8]) -> std::result::Result<Self, FrameError> {
        if datagram.len() < HEADER_SIZE {
            return Err(FrameError::Truncated {
                len: datagram.len(),
                min: HEADER_SIZE,
            });
        }

        let mut cursor = datagram;
        let sequence_id = cursor.get_u32();
        let ack = decode_flag("ack_flag", cursor.get_u32())?;
        let nak = decode_flag("nak_flag", cursor.get_u32())?;
        let payload_len = cursor.get_u32();

        if payload_len as usize != cursor.remaining() {
            return Err(FrameError::LengthMismatch {
                declared: payload_len as usize,
                actual: cursor.remaining(),
            });
        }

        Ok(Self {
            header: FrameHeader {
                sequence_id,
                ack,
                nak,
                payload_len,
            },
            payload: Bytes::copy_from_slice(cursor),
        })
    }
}

fn decode_flag(field: &'static str, value: u32) -> std::result::Result<bool, FrameError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(FrameError::InvalidFlag { field, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_frame_layout() {
        let frame = Frame::data(7, Bytes::from_static(b"abc"));
        let bytes = frame.to_bytes();

        assert_eq!(bytes.len(), HEADER_SIZE + 3);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 7]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 3]);
        assert_eq!(&bytes[16..], b"abc");

        let restored = Frame::from_bytes(&bytes).unwrap();
        assert_eq!(restored, frame);
        assert_eq!(restored.kind(), FrameKind::Data);
    }

    #[test]
    fn test_feedback_frames() {
        let ack = Frame::from_bytes(&Frame::ack(0x0102_0304).to_bytes()).unwrap();
        assert_eq!(ack.kind(), FrameKind::Ack);
        assert_eq!(ack.sequence_id(), 0x0102_0304);
        assert!(ack.payload.is_empty());

        let nak = Frame::from_bytes(&Frame::nak(9).to_bytes()).unwrap();
        assert_eq!(nak.kind(), FrameKind::Nak);
    }

    #[test]
    fn test_ack_flag_takes_precedence() {
        let mut raw = Frame::ack(3).to_bytes().to_vec();
        raw[11] = 1; // nak_flag
        let frame = Frame::from_bytes(&raw).unwrap();
        assert!(frame.header.nak);
        assert_eq!(frame.kind(), FrameKind::Ack);
    }

    #[test]
    fn test_truncated_header() {
        let err = Frame::from_bytes(&[0u8; 10]).unwrap_err();
        assert_eq!(err, FrameError::Truncated { len: 10, min: HEADER_SIZE });
    }

    #[test]
    fn test_invalid_flag() {
        let mut raw = Frame::ack(1).to_bytes().to_vec();
        raw[7] = 2;
        assert!(matches!(
            Frame::from_bytes(&raw),
            Err(FrameError::InvalidFlag { field: "ack_flag", value: 2 })
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let mut raw = Frame::data(1, Bytes::from_static(b"hello")).to_bytes().to_vec();
        raw.truncate(raw.len() - 2);
        assert_eq!(
            Frame::from_bytes(&raw).unwrap_err(),
            FrameError::LengthMismatch { declared: 5, actual: 3 }
        );
    }

    #[test]
    fn test_encode_bounded() {
        let frame = Frame::data(0, Bytes::from(vec![0u8; 100]));
        assert!(frame.encode_bounded(HEADER_SIZE + 100).is_ok());
        assert!(matches!(
            frame.encode_bounded(HEADER_SIZE + 99),
            Err(Error::PayloadTooLarge { size: 100, max_size: 99 })
        ));
    }
}
