//! NAK 레지스트리
//!
//! 시퀀스 ID별 누적 NAK 수와 전체 미처리 NAK 수를 관리.
//! drain은 시퀀스 ID 오름차순으로 꺼낸다.

use std::collections::BTreeMap;

use crate::block::SequenceId;

#[derive(Debug, Clone, Default)]
pub struct NakRegistry {
    /// 시퀀스 ID -> 누적 NAK 수
    entries: BTreeMap<SequenceId, u32>,

    /// 전체 미처리 NAK 수
    outstanding: u64,
}

impl NakRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// NAK 등록, 해당 ID의 누적 수 반환
    pub fn register(&mut self, sequence_id: SequenceId) -> u32 {
        self.outstanding += 1;
        let count = self.entries.entry(sequence_id).or_insert(0);
        *count += 1;
        *count
    }

    /// 다음 재전송 대상 꺼내기
    ///
    /// 엔트리가 있고 미처리 NAK이 남아 있을 때만 반환하며,
    /// 꺼낼 때마다 미처리 수를 하나 줄인다.
    pub fn pop(&mut self) -> Option<(SequenceId, u32)> {
        if self.outstanding == 0 {
            return None;
        }
        let entry = self.entries.pop_first()?;
        self.outstanding -= 1;
        Some(entry)
    }

    /// base 이전 엔트리 제거, 제거한 수 반환
    pub fn discard_below(&mut self, base: SequenceId) -> usize {
        let kept = self.entries.split_off(&base);
        let discarded = std::mem::replace(&mut self.entries, kept);
        discarded.len()
    }

    pub fn count(&self, sequence_id: SequenceId) -> Option<u32> {
        self.entries.get(&sequence_id).copied()
    }

    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
