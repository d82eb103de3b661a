//! base 재전송 타이머
//!
//! 단일 one-shot 타이머. 재무장할 때마다 이전 태스크를 abort하고
//! 세대 번호를 올린다. 만료 알림은 채널로 전달되며, 수신 측은
//! [`RetransmitTimer::is_current`]로 이미 교체된 타이머의 알림을 걸러낸다.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::block::SequenceId;

/// 타이머 만료 알림
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerExpired {
    /// 무장 세대
    pub generation: u64,

    /// 무장 당시 base
    pub base: SequenceId,
}

/// 만료 알림 수신기 타입
pub type ExpiryReceiver = mpsc::UnboundedReceiver<TimerExpired>;

pub struct RetransmitTimer {
    period: Duration,
    generation: u64,
    armed_for: Option<SequenceId>,
    task: Option<JoinHandle<()>>,
    expired_tx: mpsc::UnboundedSender<TimerExpired>,
}

impl RetransmitTimer {
    /// 새 타이머와 만료 알림 수신기 생성
    pub fn new(period: Duration) -> (Self, ExpiryReceiver) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let timer = Self {
            period,
            generation: 0,
            armed_for: None,
            task: None,
            expired_tx,
        };
        (timer, expired_rx)
    }

    /// base에 대해 타이머 (재)무장
    ///
    /// tokio 런타임 안에서 호출해야 한다.
    pub fn arm(&mut self, base: SequenceId) {
        self.cancel();
        self.generation += 1;

        let event = TimerExpired {
            generation: self.generation,
            base,
        };
        let period = self.period;
        let expired_tx = self.expired_tx.clone();

        self.armed_for = Some(base);
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(period).await;
            let _ = expired_tx.send(event);
        }));
    }

    /// 타이머 취소 (여러 번 호출해도 안전)
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.armed_for = None;
    }

    /// 만료 알림이 현재 무장된 타이머의 것인지
    pub fn is_current(&self, event: &TimerExpired) -> bool {
        self.armed_for == Some(event.base) && self.generation == event.generation
    }

    /// 만료 처리 후 무장 해제 상태로 표시
    pub fn mark_fired(&mut self) {
        self.task = None;
        self.armed_for = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_for.is_some()
    }

    pub fn armed_for(&self) -> Option<SequenceId> {
        self.armed_for
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RetransmitTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for RetransmitTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetransmitTimer")
            .field("period", &self.period)
            .field("generation", &self.generation)
            .field("armed_for", &self.armed_for)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_period() {
        let (mut timer, mut rx) = RetransmitTimer::new(Duration::from_millis(200));
        timer.arm(3);
        assert!(timer.is_armed());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.base, 3);
        assert!(timer.is_current(&event));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_invalidates_previous() {
        let (mut timer, mut rx) = RetransmitTimer::new(Duration::from_millis(200));
        timer.arm(0);
        let first_generation = timer.generation();
        timer.arm(1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.base, 1);
        assert_ne!(event.generation, first_generation);

        let stale = TimerExpired {
            generation: first_generation,
            base: 0,
        };
        assert!(!timer.is_current(&stale));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let (mut timer, mut rx) = RetransmitTimer::new(Duration::from_millis(50));
        timer.arm(0);
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_event_after_cancel_is_not_current() {
        let (mut timer, mut rx) = RetransmitTimer::new(Duration::from_millis(10));
        timer.arm(5);
        let event = rx.recv().await.unwrap();

        // 만료 알림이 처리되기 전에 취소된 경우
        timer.cancel();
        assert!(!timer.is_current(&event));
    }
}
