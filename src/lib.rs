//! # SRMP (Semi-Reliable Multicast Protocol)
//!
//! UDP 멀티캐스트 위의 신뢰성 송신자
//!
//! ## 핵심 특징
//! - **슬라이딩 윈도우**: 고정 크기 윈도우, base 블록이 확인되면 전진
//! - **ACK/NAK 피드백**: 수신자가 블록별 ACK 또는 NAK 전송
//! - **선택적 재전송**: NAK된 블록만 다시 전송
//! - **타임아웃 재전송**: 단일 타이머가 base 블록을 감시
//! - **혼잡 윈도우**: 전진 시 +1, NAK마다 -1/group_size, 타임아웃 시 최소값

pub mod block;
pub mod config;
pub mod congestion;
pub mod error;
pub mod frame;
pub mod nak;
pub mod sender;
pub mod state;
pub mod stats;
pub mod timer;
pub mod transport;
pub mod window;

use std::net::Ipv4Addr;

pub use block::{Block, BlockSource, SequenceId};
pub use config::{Config, FeedbackPolicy};
pub use congestion::CongestionController;
pub use error::{Error, FrameError, Result};
pub use frame::{Frame, FrameHeader, FrameKind, HEADER_SIZE};
pub use nak::NakRegistry;
pub use sender::{EventReceiver, MulticastSender, SenderSnapshot};
pub use state::{SenderEvent, SenderState};
pub use stats::TransferStats;
pub use timer::{RetransmitTimer, TimerExpired};
pub use transport::{MulticastTransport, Transport};
pub use window::Window;

/// 기본 멀티캐스트 그룹
pub const DEFAULT_GROUP_ADDR: Ipv4Addr = Ipv4Addr::new(239, 0, 0, 1);

/// 기본 멀티캐스트 포트
pub const DEFAULT_GROUP_PORT: u16 = 23456;

/// 기본 최대 데이터그램 크기 (바이트)
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 2048;

/// 기본 블록 크기 (바이트)
pub const DEFAULT_BLOCK_SIZE: usize = 1000;

/// 기본 윈도우 크기
pub const DEFAULT_WINDOW_SIZE: usize = 4;
