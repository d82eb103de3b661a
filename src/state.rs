//! 송신 코어 상태 머신
//!
//! 윈도우, 혼잡 윈도우, NAK 레지스트리, 재전송 카운터, 타이머를 한 구조체에 묶는다.
//! 송신 루프 / 피드백 루프 / 타이머 루프는 모두 같은 Mutex 아래에서
//! 이 구조체의 메서드 하나씩을 호출한다. 소켓 I/O는 락 밖에서.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::block::{Block, BlockSource, SequenceId};
use crate::config::{Config, FeedbackPolicy};
use crate::congestion::CongestionController;
use crate::frame::{Frame, FrameKind};
use crate::nak::NakRegistry;
use crate::stats::TransferStats;
use crate::timer::{ExpiryReceiver, RetransmitTimer, TimerExpired};
use crate::window::{Recorded, Window};
use crate::{Error, Result};

/// 운영자에게 전달되는 이벤트
#[derive(Debug, Clone)]
pub enum SenderEvent {
    /// 모든 블록이 확인(또는 포기)됨
    Completed(TransferStats),

    /// 재전송 한도 초과로 블록 전달 실패
    DeliveryFailed {
        sequence_id: SequenceId,
        attempts: u32,
    },
}

/// 송신 코어
#[derive(Debug)]
pub struct SenderState {
    window: Window,
    congestion: CongestionController,
    naks: NakRegistry,
    timer: RetransmitTimer,

    /// 시퀀스 ID -> 재전송 횟수 (base가 지나가면 제거)
    retries: HashMap<SequenceId, u32>,

    max_retransmissions: Option<u32>,
    feedback_policy: FeedbackPolicy,
    total_blocks: usize,
    completed: bool,

    /// 아직 전달되지 않은 운영자 이벤트
    events: Vec<SenderEvent>,

    stats: TransferStats,
}

impl SenderState {
    /// 새 코어 생성, 타이머 만료 수신기를 함께 반환
    ///
    /// 설정은 [`Config::validate`]를 통과해야 한다.
    pub fn new(config: &Config, total_blocks: usize) -> Result<(Self, ExpiryReceiver)> {
        config.validate()?;
        let (timer, expired_rx) = RetransmitTimer::new(config.retransmit_timeout());

        let mut state = Self {
            window: Window::new(config.window_size),
            congestion: CongestionController::new(
                config.initial_congestion_window,
                config.min_congestion_window,
                config.window_size,
                config.group_size,
            ),
            naks: NakRegistry::new(),
            timer,
            retries: HashMap::new(),
            max_retransmissions: config.max_retransmissions,
            feedback_policy: config.feedback_policy,
            total_blocks,
            completed: false,
            events: Vec::new(),
            stats: TransferStats::new(total_blocks as u64),
        };
        state.check_completion();

        Ok((state, expired_rx))
    }

    /// 예산 안에서 다음 블록을 꺼낸다
    ///
    /// `next_seq_num - base < min(window_size, congestion_window)`이고
    /// 블록이 남아 있을 때만 반환.
    pub fn try_send_next(&mut self, source: &BlockSource) -> Option<Block> {
        if self.completed {
            return None;
        }

        let limit = self.window.window_size().min(self.congestion.budget());
        if self.window.in_flight() >= limit {
            return None;
        }

        let block = source.get(self.window.next_seq_num())?.clone();
        let was_empty = self.window.is_empty();
        self.window.mark_sent();

        // 빈 윈도우에 처음 들어간 블록은 온전한 타임아웃을 받는다
        if was_empty || !self.timer.is_armed() {
            self.timer.arm(self.window.base());
        }

        self.stats.blocks_sent += 1;
        self.stats.bytes_sent += block.len() as u64;
        Some(block)
    }

    /// 수신 데이터그램 처리, 재전송할 블록 반환
    ///
    /// 엄격 모드에서 윈도우 밖 피드백은 에러로 반환된다.
    pub fn handle_datagram(&mut self, datagram: &[u8], source: &BlockSource) -> Result<Vec<Block>> {
        match Frame::from_bytes(datagram) {
            Ok(frame) => self.apply_feedback(&frame, source),
            Err(e) => {
                self.stats.malformed_frames += 1;
                debug!("프레임 폐기: {}", Error::from(e));
                Ok(Vec::new())
            }
        }
    }

    /// 디코딩된 프레임 적용
    pub fn apply_feedback(&mut self, frame: &Frame, source: &BlockSource) -> Result<Vec<Block>> {
        let sequence_id = frame.sequence_id();

        match frame.kind() {
            FrameKind::Ack => {
                self.stats.acks_received += 1;
                match self.window.record_ack(sequence_id) {
                    Ok(Recorded::Counted(count)) => {
                        debug!("ACK {} (count={})", sequence_id, count);
                        self.advance();
                        Ok(Vec::new())
                    }
                    Ok(Recorded::Stale) => {
                        self.stats.stale_feedback += 1;
                        Ok(Vec::new())
                    }
                    Err(e) => self.on_violation(e),
                }
            }

            FrameKind::Nak => {
                self.stats.naks_received += 1;
                self.stats.last_nack_time = Some(Instant::now());
                match self.window.record_nak(sequence_id) {
                    Ok(Recorded::Counted(_)) => {
                        self.congestion.on_nak();
                        let count = self.naks.register(sequence_id);
                        debug!(
                            "NAK {} (count={}, cwnd={:.2})",
                            sequence_id,
                            count,
                            self.congestion.window()
                        );
                        Ok(self.drain_naks(source))
                    }
                    Ok(Recorded::Stale) => {
                        self.stats.stale_feedback += 1;
                        Ok(Vec::new())
                    }
                    Err(e) => self.on_violation(e),
                }
            }

            FrameKind::Data => {
                // 루프백된 자신의 데이터 프레임 등
                self.stats.ignored_frames += 1;
                Ok(Vec::new())
            }
        }
    }

    /// 슬롯 0이 해결된 동안 윈도우를 전진
    ///
    /// 한 칸마다 혼잡 윈도우 +1, 새 base로 타이머 재무장.
    pub fn advance(&mut self) {
        let mut moved = false;

        while let Some(passed) = self.window.pop_front() {
            self.retries.remove(&passed);
            self.congestion.on_window_advance();
            self.timer.arm(self.window.base());
            self.stats.completed_blocks += 1;
            moved = true;
        }

        if moved {
            self.naks.discard_below(self.window.base());
            debug!(
                "윈도우 전진: base={}, next_seq_num={}, cwnd={:.2}",
                self.window.base(),
                self.window.next_seq_num(),
                self.congestion.window()
            );
            self.check_completion();
        }
    }

    /// NAK 레지스트리 비우기
    ///
    /// 등록된 ID마다 한 번씩 재전송. base 이전으로 밀린 ID는 버린다.
    pub fn drain_naks(&mut self, source: &BlockSource) -> Vec<Block> {
        let mut blocks = Vec::new();

        while let Some((sequence_id, count)) = self.naks.pop() {
            if sequence_id < self.window.base() {
                debug!("지나간 NAK 폐기: {} (count={})", sequence_id, count);
                continue;
            }
            if let Some(block) = self.prepare_retransmit(sequence_id, source) {
                self.stats.nak_retransmissions += 1;
                blocks.push(block);
            }
        }

        blocks
    }

    /// 타이머 만료 처리, 재전송할 base 블록 반환
    pub fn on_timer_expired(&mut self, event: TimerExpired, source: &BlockSource) -> Option<Block> {
        if !self.timer.is_current(&event) {
            // 재무장/취소와 경합한 만료
            return None;
        }
        self.timer.mark_fired();
        self.stats.timer_expirations += 1;

        if self.completed || self.window.is_empty() {
            return None;
        }

        let base = self.window.base();
        self.congestion.on_timeout();
        warn!(
            "재전송 타임아웃: base={}, cwnd -> {:.2}",
            base,
            self.congestion.window()
        );

        let block = self.prepare_retransmit(base, source)?;
        self.stats.timeout_retransmissions += 1;
        self.timer.arm(base);
        Some(block)
    }

    /// 전송 실패 기록 (블록은 여전히 in-flight, 타이머가 복구)
    pub fn record_send_failure(&mut self) {
        self.stats.send_failures += 1;
    }

    /// 엔진 종료 시 타이머 정리
    pub fn shutdown(&mut self) {
        self.timer.cancel();
    }

    /// 쌓인 운영자 이벤트 꺼내기
    pub fn drain_events(&mut self) -> Vec<SenderEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn congestion(&self) -> &CongestionController {
        &self.congestion
    }

    pub fn naks(&self) -> &NakRegistry {
        &self.naks
    }

    pub fn timer(&self) -> &RetransmitTimer {
        &self.timer
    }

    pub fn retries(&self, sequence_id: SequenceId) -> u32 {
        self.retries.get(&sequence_id).copied().unwrap_or(0)
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    fn prepare_retransmit(&mut self, sequence_id: SequenceId, source: &BlockSource) -> Option<Block> {
        let attempts = self.retries.entry(sequence_id).or_insert(0);
        if let Some(max) = self.max_retransmissions {
            if *attempts >= max {
                let attempts = *attempts;
                self.abandon(sequence_id, attempts);
                return None;
            }
        }
        *attempts += 1;

        let block = source.get(sequence_id)?.clone();
        self.stats.bytes_sent += block.len() as u64;
        Some(block)
    }

    fn abandon(&mut self, sequence_id: SequenceId, attempts: u32) {
        let error = Error::ExhaustedRetries {
            sequence_id,
            attempts,
        };
        warn!("블록 포기: {}", error);

        if self.window.abandon(sequence_id) {
            self.stats.abandoned_blocks += 1;
            self.events.push(SenderEvent::DeliveryFailed {
                sequence_id,
                attempts,
            });
            self.advance();
        }
    }

    fn on_violation(&mut self, error: Error) -> Result<Vec<Block>> {
        self.stats.out_of_window_feedback += 1;
        match self.feedback_policy {
            FeedbackPolicy::Strict => Err(error),
            FeedbackPolicy::Lenient => {
                warn!("피드백 폐기: {}", error);
                Ok(Vec::new())
            }
        }
    }

    fn check_completion(&mut self) {
        if self.completed
            || !self.window.is_empty()
            || (self.window.next_seq_num() as usize) < self.total_blocks
        {
            return;
        }

        self.completed = true;
        self.timer.cancel();
        info!("전송 완료: {}", self.stats.summary());
        self.events.push(SenderEvent::Completed(self.stats.clone()));
    }
}
