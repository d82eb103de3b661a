//! 멀티캐스트 송신자
//!
//! - 송신 루프: 예산이 허락하는 동안 블록 전송, 아니면 Notify 대기
//! - 피드백 루프: ACK/NAK 수신 및 NAK 재전송
//! - 타이머 루프: base 재전송 타이머 만료 처리
//!
//! 세 루프는 하나의 `Mutex<SenderState>`를 공유하고, 락 밖에서 전송한다.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, info, warn};

use crate::block::{Block, BlockSource, SequenceId};
use crate::frame::Frame;
use crate::state::{SenderEvent, SenderState};
use crate::stats::TransferStats;
use crate::timer::ExpiryReceiver;
use crate::transport::Transport;
use crate::{Config, Error, Result};

/// 운영자 이벤트 수신기 타입
pub type EventReceiver = mpsc::UnboundedReceiver<SenderEvent>;

/// 윈도우 상태 스냅샷
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SenderSnapshot {
    pub base: SequenceId,
    pub next_seq_num: SequenceId,
    pub in_flight: usize,
    pub congestion_window: f64,
    pub outstanding_naks: u64,
    pub completed: bool,
}

struct Shared<T> {
    config: Config,
    transport: T,
    source: BlockSource,

    /// 단일 임계 구역
    state: Mutex<SenderState>,

    /// 타이머 루프 전용 (run 중복 실행 방지 겸용)
    expired_rx: tokio::sync::Mutex<ExpiryReceiver>,

    /// 윈도우/혼잡 윈도우 변화 알림
    wake: Notify,

    /// 종료 신호
    stop_tx: watch::Sender<bool>,

    events_tx: mpsc::UnboundedSender<SenderEvent>,
}

/// 멀티캐스트 송신자
pub struct MulticastSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for MulticastSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Transport> MulticastSender<T> {
    /// 새 송신자 생성
    pub fn new(config: Config, source: BlockSource, transport: T) -> Result<(Self, EventReceiver)> {
        let max_block_len = source.max_block_len();
        if max_block_len > config.max_payload_size() {
            return Err(Error::PayloadTooLarge {
                size: max_block_len,
                max_size: config.max_payload_size(),
            });
        }

        let (state, expired_rx) = SenderState::new(&config, source.len())?;
        let (stop_tx, _) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            config,
            transport,
            source,
            state: Mutex::new(state),
            expired_rx: tokio::sync::Mutex::new(expired_rx),
            wake: Notify::new(),
            stop_tx,
            events_tx,
        });

        Ok((Self { shared }, events_rx))
    }

    /// 전송 실행
    ///
    /// 모든 블록이 확인(또는 포기)되거나 [`shutdown`](Self::shutdown)이
    /// 호출되면 통계를 반환. 엄격 모드의 윈도우 밖 피드백은 에러로 끝난다.
    pub async fn run(&self) -> Result<TransferStats> {
        let mut expired_rx = self
            .shared
            .expired_rx
            .try_lock()
            .map_err(|_| Error::AlreadyRunning)?;

        info!(
            "SRMP sender started: {} blocks, window={}, timeout={}ms, group_size={}",
            self.shared.source.len(),
            self.shared.config.window_size,
            self.shared.config.retransmit_timeout_ms,
            self.shared.config.group_size
        );

        let result = tokio::select! {
            r = self.send_loop() => r,
            r = self.feedback_loop() => r,
            r = self.timer_loop(&mut expired_rx) => r,
        };

        self.shared.stop_tx.send_replace(true);
        let events = {
            let mut state = self.shared.state.lock();
            state.shutdown();
            state.drain_events()
        };
        self.emit(events);

        let stats = self.stats();
        info!("SRMP sender stopped: {}", stats.summary());
        result.map(|_| stats)
    }

    /// 종료 신호 (여러 번 호출해도 안전)
    pub fn shutdown(&self) {
        self.shared.stop_tx.send_replace(true);
        self.shared.wake.notify_one();
    }

    /// 통계 반환
    pub fn stats(&self) -> TransferStats {
        self.shared.state.lock().stats().clone()
    }

    /// 현재 윈도우 상태
    pub fn snapshot(&self) -> SenderSnapshot {
        let state = self.shared.state.lock();
        SenderSnapshot {
            base: state.window().base(),
            next_seq_num: state.window().next_seq_num(),
            in_flight: state.window().in_flight(),
            congestion_window: state.congestion().window(),
            outstanding_naks: state.naks().outstanding(),
            completed: state.is_complete(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    async fn send_loop(&self) -> Result<()> {
        let shared = &self.shared;
        let mut stop_rx = shared.stop_tx.subscribe();

        loop {
            if *stop_rx.borrow() {
                return Ok(());
            }

            let (next, completed) = {
                let mut state = shared.state.lock();
                let next = state.try_send_next(&shared.source);
                (next, state.is_complete())
            };

            if completed {
                return Ok(());
            }

            match next {
                Some(block) => self.transmit(&block).await,
                None => {
                    tokio::select! {
                        _ = shared.wake.notified() => {}
                        _ = stop_rx.changed() => return Ok(()),
                    }
                }
            }
        }
    }

    async fn feedback_loop(&self) -> Result<()> {
        let shared = &self.shared;
        let mut stop_rx = shared.stop_tx.subscribe();
        let mut buf = vec![0u8; shared.config.max_datagram_size];

        loop {
            tokio::select! {
                result = shared.transport.recv(&mut buf) => {
                    match result {
                        Ok((len, addr)) => {
                            let (outcome, events) = {
                                let mut state = shared.state.lock();
                                let outcome = state.handle_datagram(&buf[..len], &shared.source);
                                (outcome, state.drain_events())
                            };
                            self.emit(events);

                            match outcome {
                                Ok(blocks) => {
                                    for block in &blocks {
                                        self.transmit(block).await;
                                    }
                                    shared.wake.notify_one();
                                }
                                Err(e) => {
                                    warn!("피드백 처리 중단 ({}): {}", addr, e);
                                    return Err(e);
                                }
                            }
                        }
                        Err(e) => {
                            warn!("수신 에러: {}", e);
                            tokio::time::sleep(shared.config.transport_retry_backoff()).await;
                        }
                    }
                }
                _ = stop_rx.changed() => return Ok(()),
            }
        }
    }

    async fn timer_loop(&self, expired_rx: &mut ExpiryReceiver) -> Result<()> {
        let shared = &self.shared;
        let mut stop_rx = shared.stop_tx.subscribe();

        loop {
            tokio::select! {
                Some(event) = expired_rx.recv() => {
                    let (block, events) = {
                        let mut state = shared.state.lock();
                        let block = state.on_timer_expired(event, &shared.source);
                        (block, state.drain_events())
                    };
                    self.emit(events);

                    if let Some(block) = block {
                        self.transmit(&block).await;
                    }
                    shared.wake.notify_one();
                }
                _ = stop_rx.changed() => return Ok(()),
            }
        }
    }

    /// 블록 전송 (실패해도 in-flight로 남고 타이머가 복구)
    async fn transmit(&self, block: &Block) {
        let datagram = match Frame::from_block(block).encode_bounded(self.shared.config.max_datagram_size) {
            Ok(datagram) => datagram,
            Err(e) => {
                warn!("블록 {} 인코딩 실패: {}", block.sequence_id, e);
                self.shared.state.lock().record_send_failure();
                return;
            }
        };
        match self.shared.transport.send(&datagram).await {
            Ok(_) => debug!("블록 {} 전송 ({} bytes)", block.sequence_id, datagram.len()),
            Err(e) => {
                warn!("블록 {} 전송 실패: {}", block.sequence_id, e);
                self.shared.state.lock().record_send_failure();
            }
        }
    }

    fn emit(&self, events: Vec<SenderEvent>) {
        for event in events {
            if let SenderEvent::DeliveryFailed {
                sequence_id,
                attempts,
            } = &event
            {
                warn!("블록 {} 전달 실패 ({}회 재전송)", sequence_id, attempts);
            }
            // 수신기가 없어도 전송은 계속
            let _ = self.shared.events_tx.send(event);
        }
    }
}
