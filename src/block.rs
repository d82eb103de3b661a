//! 블록과 블록 소스 정의
//!
//! - Block: 시퀀스 ID가 붙은 고정 크기 데이터 조각 (불변)
//! - BlockSource: 전송할 블록의 순서 있는 목록 (송신 코어는 읽기만 함)

use std::path::Path;

use bytes::Bytes;

use crate::{Error, Result};

/// 시퀀스 ID (32비트, 와이어 헤더와 동일)
pub type SequenceId = u32;

/// 블록 (전송 단위)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// 시퀀스 ID
    pub sequence_id: SequenceId,

    /// 실제 데이터
    pub payload: Bytes,
}

impl Block {
    pub fn new(sequence_id: SequenceId, payload: Bytes) -> Self {
        Self {
            sequence_id,
            payload,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// 블록 소스
///
/// 시퀀스 ID는 0부터 연속이며 인덱스와 같다.
#[derive(Debug, Clone, Default)]
pub struct BlockSource {
    blocks: Vec<Block>,
}

impl BlockSource {
    /// 데이터를 블록들로 분할
    pub fn from_bytes(data: &[u8], block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidConfig("block_size는 1 이상이어야 함".into()));
        }
        let count = (data.len() + block_size - 1) / block_size;
        check_count(count)?;

        let data = Bytes::copy_from_slice(data);
        let blocks = (0..count)
            .map(|idx| {
                let start = idx * block_size;
                let end = (start + block_size).min(data.len());
                Block::new(idx as SequenceId, data.slice(start..end))
            })
            .collect();

        Ok(Self { blocks })
    }

    /// 파일 내용을 블록들로 분할
    pub fn from_file(path: impl AsRef<Path>, block_size: usize) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data, block_size)
    }

    /// 0으로 채운 테스트용 블록 생성
    pub fn synthetic(count: usize, block_size: usize) -> Result<Self> {
        check_count(count)?;
        let payload = Bytes::from(vec![0u8; block_size]);
        let blocks = (0..count)
            .map(|idx| Block::new(idx as SequenceId, payload.clone()))
            .collect();
        Ok(Self { blocks })
    }

    /// 이미 만들어진 페이로드 목록으로 생성
    pub fn from_payloads<I>(payloads: I) -> Result<Self>
    where
        I: IntoIterator<Item = Bytes>,
    {
        let blocks: Vec<Block> = payloads
            .into_iter()
            .enumerate()
            .map(|(idx, payload)| Block::new(idx as SequenceId, payload))
            .collect();
        check_count(blocks.len())?;
        Ok(Self { blocks })
    }

    /// 시퀀스 ID로 블록 조회
    pub fn get(&self, sequence_id: SequenceId) -> Option<&Block> {
        self.blocks.get(sequence_id as usize)
    }

    /// 총 블록 수
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// 가장 큰 블록 크기
    pub fn max_block_len(&self) -> usize {
        self.blocks.iter().map(Block::len).max().unwrap_or(0)
    }

    /// 총 바이트 수
    pub fn total_bytes(&self) -> u64 {
        self.blocks.iter().map(|b| b.len() as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }
}

fn check_count(count: usize) -> Result<()> {
    if count > SequenceId::MAX as usize {
        return Err(Error::InvalidConfig(format!(
            "블록 수 {}가 시퀀스 공간을 초과",
            count
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_split_into_blocks() {
        let data: Vec<u8> = (0..250).map(|i| i as u8).collect();
        let source = BlockSource::from_bytes(&data, 100).unwrap();

        assert_eq!(source.len(), 3);
        assert_eq!(source.get(0).unwrap().len(), 100);
        assert_eq!(source.get(2).unwrap().len(), 50);
        assert_eq!(source.get(2).unwrap().sequence_id, 2);
        assert!(source.get(3).is_none());

        let rebuilt: Vec<u8> = source.iter().flat_map(|b| b.payload.to_vec()).collect();
        assert_eq!(rebuilt, data);
        assert_eq!(source.total_bytes(), 250);
        assert_eq!(source.max_block_len(), 100);
    }

    #[test]
    fn test_empty_data() {
        let source = BlockSource::from_bytes(&[], 100).unwrap();
        assert!(source.is_empty());
    }

    #[test]
    fn test_zero_block_size_rejected() {
        assert!(BlockSource::from_bytes(b"abc", 0).is_err());
    }

    #[test]
    fn test_synthetic_source() {
        let source = BlockSource::synthetic(20, 1000).unwrap();
        assert_eq!(source.len(), 20);
        assert!(source.iter().all(|b| b.len() == 1000));
        assert!(source.get(19).unwrap().payload.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 2500]).unwrap();
        file.flush().unwrap();

        let source = BlockSource::from_file(file.path(), 1000).unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(source.get(2).unwrap().len(), 500);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = BlockSource::from_file(dir.path().join("missing.bin"), 1000);
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
