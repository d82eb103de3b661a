//! 에러 타입 정의

use thiserror::Error;

use crate::block::SequenceId;

/// 프레임 디코딩 실패 사유
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("헤더 부족: {len} bytes (최소 {min} bytes)")]
    Truncated { len: usize, min: usize },

    #[error("유효하지 않은 플래그 값: {field}={value}")]
    InvalidFlag { field: &'static str, value: u32 },

    #[error("페이로드 길이 불일치: declared={declared}, actual={actual}")]
    LengthMismatch { declared: usize, actual: usize },
}

/// SRMP 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("잘못된 프레임: {0}")]
    MalformedFrame(#[from] FrameError),

    #[error("윈도우 밖 피드백: sequence_id={sequence_id}, base={base}, next_seq_num={next_seq_num}")]
    OutOfWindowFeedback {
        sequence_id: SequenceId,
        base: SequenceId,
        next_seq_num: SequenceId,
    },

    #[error("재전송 한도 초과: sequence_id={sequence_id}, attempts={attempts}")]
    ExhaustedRetries {
        sequence_id: SequenceId,
        attempts: u32,
    },

    #[error("페이로드 크기 초과: {size} bytes (최대 {max_size})")]
    PayloadTooLarge { size: usize, max_size: usize },

    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),

    #[error("송신 엔진이 이미 실행 중")]
    AlreadyRunning,
}

impl Error {
    /// 프로토콜 위반 여부 (엄격 모드에서 치명적)
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Error::OutOfWindowFeedback { .. })
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
