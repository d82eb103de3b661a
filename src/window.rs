//! 슬라이딩 윈도우 상태
//!
//! ```text
//!   base          next_seq_num        base + window_size
//!    │                 │                     │
//! ───┼─────────────────┼─────────────────────┼──▶ sequence space
//!    │ <── in flight ─▶│ <──── sendable ────▶│
//! ```
//!
//! 슬롯 i는 `base + i` 블록의 ACK/NAK 카운터. 소켓 I/O 없음.

use std::collections::VecDeque;

use crate::block::SequenceId;
use crate::{Error, Result};

/// 슬롯별 피드백 카운터
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotFeedback {
    pub ack_count: u32,
    pub nak_count: u32,

    /// 재전송 한도를 넘겨 포기된 블록
    pub abandoned: bool,
}

impl SlotFeedback {
    /// 윈도우가 이 슬롯을 지나갈 수 있는지
    fn is_resolved(&self) -> bool {
        self.ack_count > 0 || self.abandoned
    }
}

/// 피드백 대상 시퀀스 ID의 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPosition {
    /// base 이전 (이미 지나간 블록)
    Stale,

    /// 전송됐고 아직 확인되지 않은 블록 (슬롯 인덱스)
    InFlight(usize),

    /// 윈도우 범위지만 아직 보내지 않은 블록
    Unsent,

    /// 윈도우 범위 밖
    Beyond,
}

/// 피드백 기록 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// 카운터 증가 (증가 후 값)
    Counted(u32),

    /// base 이전 피드백, 무시됨
    Stale,
}

/// 윈도우 상태
#[derive(Debug, Clone)]
pub struct Window {
    /// 가장 오래된 미확인 시퀀스 ID
    base: SequenceId,

    /// 다음에 보낼 시퀀스 ID
    next_seq_num: SequenceId,

    /// 고정 윈도우 크기
    window_size: usize,

    /// 슬롯 카운터 (항상 window_size 개)
    slots: VecDeque<SlotFeedback>,
}

impl Window {
    pub fn new(window_size: usize) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        Self {
            base: 0,
            next_seq_num: 0,
            window_size,
            slots: std::iter::repeat(SlotFeedback::default())
                .take(window_size)
                .collect(),
        }
    }

    pub fn base(&self) -> SequenceId {
        self.base
    }

    pub fn next_seq_num(&self) -> SequenceId {
        self.next_seq_num
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// 전송 후 미확인 블록 수
    pub fn in_flight(&self) -> usize {
        (self.next_seq_num - self.base) as usize
    }

    pub fn is_full(&self) -> bool {
        self.in_flight() >= self.window_size
    }

    pub fn is_empty(&self) -> bool {
        self.base == self.next_seq_num
    }

    /// 시퀀스 ID가 윈도우의 어디에 있는지
    pub fn position(&self, sequence_id: SequenceId) -> SlotPosition {
        if sequence_id < self.base {
            return SlotPosition::Stale;
        }
        let offset = (sequence_id - self.base) as usize;
        if offset >= self.window_size {
            SlotPosition::Beyond
        } else if sequence_id >= self.next_seq_num {
            SlotPosition::Unsent
        } else {
            SlotPosition::InFlight(offset)
        }
    }

    /// next_seq_num 블록을 전송한 것으로 기록
    pub fn mark_sent(&mut self) -> SequenceId {
        debug_assert!(
            !self.is_full(),
            "mark_sent called on a full window ({} / {})",
            self.in_flight(),
            self.window_size
        );
        let sequence_id = self.next_seq_num;
        self.next_seq_num += 1;
        sequence_id
    }

    /// ACK 기록
    pub fn record_ack(&mut self, sequence_id: SequenceId) -> Result<Recorded> {
        let slot = match self.in_flight_slot(sequence_id)? {
            Some(slot) => slot,
            None => return Ok(Recorded::Stale),
        };
        let feedback = &mut self.slots[slot];
        feedback.ack_count += 1;
        Ok(Recorded::Counted(feedback.ack_count))
    }

    /// NAK 기록
    pub fn record_nak(&mut self, sequence_id: SequenceId) -> Result<Recorded> {
        let slot = match self.in_flight_slot(sequence_id)? {
            Some(slot) => slot,
            None => return Ok(Recorded::Stale),
        };
        let feedback = &mut self.slots[slot];
        feedback.nak_count += 1;
        Ok(Recorded::Counted(feedback.nak_count))
    }

    /// 재전송 한도를 넘긴 블록을 포기 처리
    pub fn abandon(&mut self, sequence_id: SequenceId) -> bool {
        match self.position(sequence_id) {
            SlotPosition::InFlight(slot) => {
                self.slots[slot].abandoned = true;
                true
            }
            _ => false,
        }
    }

    /// 슬롯 피드백 조회
    pub fn feedback(&self, sequence_id: SequenceId) -> Option<SlotFeedback> {
        match self.position(sequence_id) {
            SlotPosition::InFlight(slot) => Some(self.slots[slot]),
            _ => None,
        }
    }

    /// 슬롯 0이 해결됐으면 윈도우를 한 칸 민다
    ///
    /// 지나간 base를 반환. base는 next_seq_num을 넘지 않는다.
    pub fn pop_front(&mut self) -> Option<SequenceId> {
        if self.is_empty() || !self.slots[0].is_resolved() {
            return None;
        }
        self.slots.pop_front();
        self.slots.push_back(SlotFeedback::default());
        let passed = self.base;
        self.base += 1;
        Some(passed)
    }

    fn in_flight_slot(&self, sequence_id: SequenceId) -> Result<Option<usize>> {
        match self.position(sequence_id) {
            SlotPosition::InFlight(slot) => Ok(Some(slot)),
            SlotPosition::Stale => Ok(None),
            SlotPosition::Unsent | SlotPosition::Beyond => Err(Error::OutOfWindowFeedback {
                sequence_id,
                base: self.base,
                next_seq_num: self.next_seq_num,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::Rng;

    fn window_with_sent(window_size: usize, sent: usize) -> Window {
        let mut w = Window::new(window_size);
        for _ in 0..sent {
            w.mark_sent();
        }
        w
    }

    #[test]
    fn test_initial_state() {
        let w = Window::new(4);
        assert_eq!(w.base(), 0);
        assert_eq!(w.next_seq_num(), 0);
        assert!(w.is_empty());
        assert!(!w.is_full());
        assert_eq!(w.in_flight(), 0);
    }

    #[test]
    fn test_mark_sent_fills_window() {
        let w = window_with_sent(4, 4);
        assert!(w.is_full());
        assert_eq!(w.in_flight(), 4);
        assert_eq!(w.next_seq_num(), 4);
    }

    #[test]
    fn test_positions() {
        let w = window_with_sent(4, 2);
        assert_eq!(w.position(0), SlotPosition::InFlight(0));
        assert_eq!(w.position(1), SlotPosition::InFlight(1));
        assert_eq!(w.position(2), SlotPosition::Unsent);
        assert_eq!(w.position(3), SlotPosition::Unsent);
        assert_eq!(w.position(4), SlotPosition::Beyond);
    }

    #[test]
    fn test_ack_then_pop() {
        let mut w = window_with_sent(4, 2);
        assert_eq!(w.record_ack(0).unwrap(), Recorded::Counted(1));
        assert_eq!(w.pop_front(), Some(0));
        assert_eq!(w.base(), 1);
        // 슬롯 1은 아직 ACK 없음
        assert_eq!(w.pop_front(), None);
        assert_eq!(w.feedback(1), Some(SlotFeedback::default()));
    }

    #[test]
    fn test_out_of_order_acks_release_together() {
        let mut w = window_with_sent(4, 3);
        w.record_ack(2).unwrap();
        w.record_ack(1).unwrap();
        assert_eq!(w.pop_front(), None);

        w.record_ack(0).unwrap();
        let mut passed = Vec::new();
        while let Some(seq) = w.pop_front() {
            passed.push(seq);
        }
        assert_eq!(passed, vec![0, 1, 2]);
        assert!(w.is_empty());
    }

    #[test]
    fn test_beyond_window_is_violation() {
        let mut w = window_with_sent(4, 4);
        assert!(matches!(
            w.record_ack(4),
            Err(Error::OutOfWindowFeedback { sequence_id: 4, base: 0, next_seq_num: 4 })
        ));
        assert!(w.record_nak(100).is_err());
    }

    #[test]
    fn test_unsent_feedback_is_violation() {
        let mut w = window_with_sent(4, 1);
        assert!(w.record_ack(1).is_err());
        assert_eq!(w.feedback(1), None);
    }

    #[test]
    fn test_stale_ack_is_noop() {
        let mut w = window_with_sent(4, 3);
        w.record_ack(0).unwrap();
        w.pop_front();
        w.record_ack(2).unwrap();

        let before: Vec<_> = (1..3).map(|s| w.feedback(s)).collect();
        assert_eq!(w.record_ack(0).unwrap(), Recorded::Stale);
        assert_eq!(w.record_nak(0).unwrap(), Recorded::Stale);
        let after: Vec<_> = (1..3).map(|s| w.feedback(s)).collect();

        assert_eq!(before, after);
        assert_eq!(w.base(), 1);
    }

    #[test]
    fn test_duplicate_acks_count_per_datagram() {
        let mut w = window_with_sent(4, 1);
        assert_eq!(w.record_ack(0).unwrap(), Recorded::Counted(1));
        assert_eq!(w.record_ack(0).unwrap(), Recorded::Counted(2));
        assert_eq!(w.pop_front(), Some(0));
        assert_eq!(w.pop_front(), None);
    }

    #[test]
    fn test_recycled_slot_starts_clean() {
        let mut w = window_with_sent(2, 2);
        w.record_nak(0).unwrap();
        w.record_ack(0).unwrap();
        w.pop_front();
        w.mark_sent();
        assert_eq!(w.feedback(2), Some(SlotFeedback::default()));
    }

    #[test]
    fn test_abandoned_slot_releases_window() {
        let mut w = window_with_sent(4, 2);
        assert!(w.abandon(0));
        assert_eq!(w.pop_front(), Some(0));
        assert!(!w.abandon(0));
    }

    #[test]
    fn test_base_never_passes_next_seq_num() {
        let mut w = window_with_sent(4, 1);
        w.record_ack(0).unwrap();
        assert_eq!(w.pop_front(), Some(0));
        assert_eq!(w.pop_front(), None);
        assert_eq!(w.base(), w.next_seq_num());
    }

    #[test]
    fn test_randomized_feedback_keeps_invariants() {
        let mut rng = rand::thread_rng();
        let total: SequenceId = 200;
        let mut w = Window::new(8);

        while w.base() < total {
            while !w.is_full() && w.next_seq_num() < total && rng.gen_bool(0.7) {
                w.mark_sent();
            }

            let mut ids: Vec<SequenceId> = (w.base()..w.next_seq_num()).collect();
            ids.shuffle(&mut rng);
            for id in ids.into_iter().take(3) {
                let prev_base = w.base();
                if rng.gen_bool(0.8) {
                    w.record_ack(id).unwrap();
                } else {
                    w.record_nak(id).unwrap();
                }
                while w.pop_front().is_some() {}

                assert!(w.base() >= prev_base);
                assert!(w.base() <= w.next_seq_num());
                assert!(w.in_flight() <= w.window_size());
            }

            // 진행 보장: base에 ACK
            if !w.is_empty() && rng.gen_bool(0.3) {
                w.record_ack(w.base()).unwrap();
                while w.pop_front().is_some() {}
            }
            if w.is_empty() && w.next_seq_num() == total {
                break;
            }
        }

        assert_eq!(w.base(), total);
    }
}
