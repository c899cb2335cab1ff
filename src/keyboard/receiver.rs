//! キーボード → ホスト方向のビット受信
//!
//! クロックの立ち下がりごとにデータ線を1ビット読む。
//! フレーム: スタート(0), データ8ビット(LSBから), 奇数パリティ, ストップ(1)

/// 受信エラーから復帰するまでのアイドル時間
pub const ERROR_IDLE_US: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    Start,
    /// データビット受信中（受信済みビット数）
    Data(u8),
    Parity,
    Stop,
    Error,
}

/// 1ビット処理した結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxEvent {
    Byte(u8),
    /// 自己診断完了コード。コーデック全体を初期化する
    SelfTest,
    FramingError,
}

#[derive(Debug, Clone)]
pub struct BitReceiver {
    state: RxState,
    data: u8,
    /// 期待するパリティビット
    parity: bool,
    prev_edge_us: u32,
}

impl Default for BitReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl BitReceiver {
    pub fn new() -> Self {
        BitReceiver {
            state: RxState::Start,
            data: 0,
            parity: true,
            prev_edge_us: 0,
        }
    }

    pub fn state(&self) -> RxState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = RxState::Start;
    }

    /// クロック立ち下がりで呼ぶ
    pub fn on_falling_edge(&mut self, bit: bool, now_us: u32) -> Option<RxEvent> {
        let idle = now_us.wrapping_sub(self.prev_edge_us);
        self.prev_edge_us = now_us;
        if self.state == RxState::Error && idle > ERROR_IDLE_US {
            self.state = RxState::Start;
        }

        match self.state {
            RxState::Start => {
                if bit {
                    return self.fail();
                }
                self.state = RxState::Data(0);
                self.data = 0;
                self.parity = true;
                None
            }
            RxState::Data(n) => {
                self.data >>= 1;
                if bit {
                    self.data |= 0x80;
                    self.parity = !self.parity;
                }
                self.state = if n == 7 { RxState::Parity } else { RxState::Data(n + 1) };
                None
            }
            RxState::Parity => {
                if bit != self.parity {
                    return self.fail();
                }
                self.state = RxState::Stop;
                None
            }
            RxState::Stop => {
                self.state = RxState::Start;
                if self.data == super::scancodes::SELF_TEST_PASSED {
                    Some(RxEvent::SelfTest)
                } else {
                    Some(RxEvent::Byte(self.data))
                }
            }
            RxState::Error => None,
        }
    }

    fn fail(&mut self) -> Option<RxEvent> {
        self.state = RxState::Error;
        Some(RxEvent::FramingError)
    }
}

/// 1バイトをフレームのビット列にする（テストとシミュレータ用）
pub fn frame_bits(byte: u8) -> [bool; 11] {
    let mut bits = [false; 11];
    for (i, bit) in bits[1..9].iter_mut().enumerate() {
        *bit = (byte >> i) & 1 != 0;
    }
    bits[9] = byte.count_ones() % 2 == 0;
    bits[10] = true;
    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(rx: &mut BitReceiver, bits: &[bool], t: &mut u32) -> Vec<RxEvent> {
        let mut events = Vec::new();
        for &b in bits {
            *t += 80;
            if let Some(e) = rx.on_falling_edge(b, *t) {
                events.push(e);
            }
        }
        events
    }

    #[test]
    fn test_receive_bytes() {
        let mut rx = BitReceiver::new();
        let mut t = 0;
        for byte in [0x00u8, 0x1C, 0xF0, 0xFF, 0x80] {
            assert_eq!(feed(&mut rx, &frame_bits(byte), &mut t), vec![RxEvent::Byte(byte)]);
            assert_eq!(rx.state(), RxState::Start);
        }
    }

    #[test]
    fn test_self_test_code() {
        let mut rx = BitReceiver::new();
        let mut t = 0;
        assert_eq!(feed(&mut rx, &frame_bits(0xAA), &mut t), vec![RxEvent::SelfTest]);
    }

    #[test]
    fn test_bad_parity_then_recovery() {
        let mut rx = BitReceiver::new();
        let mut t = 0;
        let mut bad = frame_bits(0x1C);
        bad[9] = !bad[9];
        let events = feed(&mut rx, &bad, &mut t);
        assert_eq!(events, vec![RxEvent::FramingError]);
        assert_eq!(rx.state(), RxState::Error);

        // エッジが 1ms 以内に続く限りエラーのまま
        assert_eq!(feed(&mut rx, &frame_bits(0x1C), &mut t), vec![]);
        assert_eq!(rx.state(), RxState::Error);

        t += 2000;
        assert_eq!(feed(&mut rx, &frame_bits(0x32), &mut t), vec![RxEvent::Byte(0x32)]);
    }

    #[test]
    fn test_start_bit_one_is_error() {
        let mut rx = BitReceiver::new();
        let mut t = 0;
        let mut bad = frame_bits(0x1C);
        bad[0] = true;
        assert_eq!(feed(&mut rx, &bad, &mut t), vec![RxEvent::FramingError]);
        t += 1500;
        assert_eq!(feed(&mut rx, &frame_bits(0x1C), &mut t), vec![RxEvent::Byte(0x1C)]);
    }

    #[test]
    fn test_frame_parity_is_odd() {
        for byte in 0..=255u8 {
            let bits = frame_bits(byte);
            let ones = bits[1..10].iter().filter(|&&b| b).count();
            assert_eq!(ones % 2, 1);
            assert!(!bits[0] && bits[10]);
        }
    }
}
