//! 전송 통계

use std::time::{Duration, Instant};

/// 전체 전송 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 전송할 총 블록 수
    pub total_blocks: u64,

    /// 확인(또는 포기)된 블록 수
    pub completed_blocks: u64,

    /// 최초 전송 블록 수
    pub blocks_sent: u64,

    /// 총 전송 바이트 (재전송 포함)
    pub bytes_sent: u64,

    /// NAK로 인한 재전송 수
    pub nak_retransmissions: u64,

    /// 타이머 만료로 인한 재전송 수
    pub timeout_retransmissions: u64,

    /// 타이머 만료 횟수
    pub timer_expirations: u64,

    /// 수신 ACK 수
    pub acks_received: u64,

    /// 수신 NAK 수
    pub naks_received: u64,

    /// base 이전 피드백 (무시됨)
    pub stale_feedback: u64,

    /// 윈도우 밖 피드백
    pub out_of_window_feedback: u64,

    /// 잘못된 프레임 수
    pub malformed_frames: u64,

    /// 피드백이 아닌 프레임 수 (루프백된 데이터 등)
    pub ignored_frames: u64,

    /// 전송 실패 수
    pub send_failures: u64,

    /// 재전송 한도 초과로 포기한 블록 수
    pub abandoned_blocks: u64,

    /// 마지막 NAK 시간
    pub last_nack_time: Option<Instant>,
}

impl TransferStats {
    pub fn new(total_blocks: u64) -> Self {
        Self {
            start_time: Instant::now(),
            total_blocks,
            completed_blocks: 0,
            blocks_sent: 0,
            bytes_sent: 0,
            nak_retransmissions: 0,
            timeout_retransmissions: 0,
            timer_expirations: 0,
            acks_received: 0,
            naks_received: 0,
            stale_feedback: 0,
            out_of_window_feedback: 0,
            malformed_frames: 0,
            ignored_frames: 0,
            send_failures: 0,
            abandoned_blocks: 0,
            last_nack_time: None,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 총 재전송 수
    pub fn retransmissions(&self) -> u64 {
        self.nak_retransmissions + self.timeout_retransmissions
    }

    /// 전체 처리율 (bytes/sec)
    pub fn overall_throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_sent as f64 / elapsed
    }

    /// 재전송 비율 (재전송 / 전체 전송)
    pub fn retransmission_ratio(&self) -> f64 {
        let total = self.blocks_sent + self.retransmissions();
        if total == 0 {
            return 0.0;
        }
        self.retransmissions() as f64 / total as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Blocks: {}/{} | Bytes: {} | Retransmits: {} ({:.1}%) | ACKs: {} | NAKs: {} | Timeouts: {} | Abandoned: {}",
            self.elapsed().as_secs_f64(),
            self.completed_blocks,
            self.total_blocks,
            self.bytes_sent,
            self.retransmissions(),
            self.retransmission_ratio() * 100.0,
            self.acks_received,
            self.naks_received,
            self.timer_expirations,
            self.abandoned_blocks,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new(0)
    }
}
