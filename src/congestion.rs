//! 단순 혼잡 윈도우
//!
//! RTT 추정 없이 정수형 카운터처럼 동작:
//! - 윈도우 전진마다 +1 (window_size 상한)
//! - NAK마다 -1/group_size (최소값 하한)
//! - 재전송 타이머 만료 시 최소값으로 리셋

#[derive(Debug, Clone)]
pub struct CongestionController {
    /// 현재 혼잡 윈도우
    window: f64,

    /// 하한 (1 이상)
    min_window: f64,

    /// 상한 (슬라이딩 윈도우 크기)
    max_window: f64,

    /// NAK당 감소량
    decrease_step: f64,
}

impl CongestionController {
    pub fn new(initial: f64, min_window: f64, window_size: usize, group_size: u32) -> Self {
        let max_window = window_size as f64;
        let min_window = min_window.max(1.0).min(max_window);
        Self {
            window: initial.clamp(min_window, max_window),
            min_window,
            max_window,
            decrease_step: 1.0 / group_size.max(1) as f64,
        }
    }

    pub fn window(&self) -> f64 {
        self.window
    }

    pub fn min_window(&self) -> f64 {
        self.min_window
    }

    /// 동시에 보낼 수 있는 블록 수 (정수 부분)
    pub fn budget(&self) -> usize {
        (self.window.floor() as usize).max(1)
    }

    // 호출 위치: 윈도우 한 칸 전진
    pub fn on_window_advance(&mut self) {
        self.window = (self.window + 1.0).min(self.max_window);
    }

    // 호출 위치: NAK 수신
    pub fn on_nak(&mut self) {
        self.window = (self.window - self.decrease_step).max(self.min_window);
    }

    // 호출 위치: base 재전송 타이머 만료
    pub fn on_timeout(&mut self) {
        self.window = self.min_window;
    }
}
