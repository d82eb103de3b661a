//! 프로토콜 설정

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::frame::HEADER_SIZE;
use crate::{
    Error, Result, DEFAULT_BLOCK_SIZE, DEFAULT_GROUP_ADDR, DEFAULT_GROUP_PORT,
    DEFAULT_MAX_DATAGRAM_SIZE, DEFAULT_WINDOW_SIZE,
};

/// 윈도우 밖 피드백 처리 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackPolicy {
    /// 프로토콜 위반으로 보고 송신 엔진 중단
    Strict,

    /// 경고 로그 후 폐기
    #[default]
    Lenient,
}

/// SRMP 송신자 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 멀티캐스트 그룹 주소
    pub group_addr: Ipv4Addr,

    /// 멀티캐스트 포트
    pub group_port: u16,

    /// 로컬 바인드 주소 (피드백 수신용)
    pub bind_addr: SocketAddr,

    /// 멀티캐스트 그룹 가입 여부
    /// 수신자가 그룹 주소로 피드백을 보내는 경우 true
    pub join_group: bool,

    /// 멀티캐스트 TTL
    pub multicast_ttl: u32,

    /// 멀티캐스트 루프백 (같은 호스트 수신자용)
    pub multicast_loop: bool,

    /// 최대 데이터그램 크기 (헤더 포함)
    pub max_datagram_size: usize,

    /// 블록 크기 (바이트)
    pub block_size: usize,

    /// 슬라이딩 윈도우 크기 (고정)
    pub window_size: usize,

    /// 재전송 타임아웃 (밀리초)
    pub retransmit_timeout_ms: u64,

    /// 수신자 수 (NAK당 혼잡 윈도우 감소량 = 1 / group_size)
    pub group_size: u32,

    /// 초기 혼잡 윈도우
    pub initial_congestion_window: f64,

    /// 최소 혼잡 윈도우 (1 이상)
    pub min_congestion_window: f64,

    /// 블록당 최대 재전송 횟수 (None이면 무제한)
    pub max_retransmissions: Option<u32>,

    /// 윈도우 밖 피드백 처리 정책
    pub feedback_policy: FeedbackPolicy,

    /// 전송 계층 에러 후 재시도 간격 (밀리초)
    pub transport_retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group_addr: DEFAULT_GROUP_ADDR,
            group_port: DEFAULT_GROUP_PORT,
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
            join_group: false,
            multicast_ttl: 1,
            multicast_loop: true,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            retransmit_timeout_ms: 200,       // 200ms
            group_size: 1,
            initial_congestion_window: 1.0,
            min_congestion_window: 1.0,
            max_retransmissions: Some(32),
            feedback_policy: FeedbackPolicy::Lenient,
            transport_retry_backoff_ms: 10,
        }
    }
}

impl Config {
    /// 원래 동작 그대로: 윈도우 밖 피드백은 치명적, 재전송 무제한
    pub fn reference() -> Self {
        Self {
            max_retransmissions: None,
            feedback_policy: FeedbackPolicy::Strict,
            ..Self::default()
        }
    }

    /// 손실 많은 네트워크용 설정
    pub fn lossy_network() -> Self {
        Self {
            block_size: 1000,
            window_size: 16,
            retransmit_timeout_ms: 500,
            initial_congestion_window: 2.0,
            min_congestion_window: 1.0,
            max_retransmissions: Some(64),
            feedback_policy: FeedbackPolicy::Lenient,
            transport_retry_backoff_ms: 50,
            ..Self::default()
        }
    }

    /// 재전송 타임아웃
    pub fn retransmit_timeout(&self) -> Duration {
        Duration::from_millis(self.retransmit_timeout_ms)
    }

    /// 전송 재시도 간격
    pub fn transport_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.transport_retry_backoff_ms)
    }

    /// 멀티캐스트 목적지 주소
    pub fn group_socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.group_addr, self.group_port))
    }

    /// 데이터그램 하나에 실을 수 있는 최대 페이로드
    pub fn max_payload_size(&self) -> usize {
        self.max_datagram_size.saturating_sub(HEADER_SIZE)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window_size는 1 이상이어야 함".into()));
        }
        if self.group_size == 0 {
            return Err(Error::InvalidConfig("group_size는 1 이상이어야 함".into()));
        }
        if self.block_size == 0 {
            return Err(Error::InvalidConfig("block_size는 1 이상이어야 함".into()));
        }
        if self.block_size > self.max_payload_size() {
            return Err(Error::InvalidConfig(format!(
                "block_size {}가 최대 페이로드 {}를 초과",
                self.block_size,
                self.max_payload_size()
            )));
        }
        if !self.min_congestion_window.is_finite() || self.min_congestion_window < 1.0 {
            return Err(Error::InvalidConfig(
                "min_congestion_window는 1 이상이어야 함".into(),
            ));
        }
        if !self.initial_congestion_window.is_finite()
            || self.initial_congestion_window < self.min_congestion_window
        {
            return Err(Error::InvalidConfig(
                "initial_congestion_window는 min_congestion_window 이상이어야 함".into(),
            ));
        }
        if self.retransmit_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "retransmit_timeout_ms는 1 이상이어야 함".into(),
            ));
        }
        if !self.group_addr.is_multicast() && self.join_group {
            return Err(Error::InvalidConfig(format!(
                "{}는 멀티캐스트 주소가 아님",
                self.group_addr
            )));
        }
        Ok(())
    }
}
