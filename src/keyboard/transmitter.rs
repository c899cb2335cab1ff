//! ホスト → キーボード方向の送信
//!
//! クロック線を 110us 以上 Low にしてからデータ線を Low、クロックを解放すると
//! キーボードがクロックを生成し始める。ホストはクロックが Low の間にデータを置き、
//! キーボードは立ち上がりで読む。最後にキーボードが ACK (0) を返す。

use std::fmt;

use super::Ps2Bus;

/// 送信要求でクロックを Low に保つ時間
pub const REQUEST_HOLD_US: u32 = 110;
/// 最初のクロックを待つ時間（キーボードの応答は遅い）
pub const FIRST_CLOCK_TIMEOUT_US: u32 = 100_000;
/// 各クロック遷移を待つ時間
pub const CLOCK_TIMEOUT_US: u32 = 200;

/// 送信失敗の理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ps2Error {
    /// クロック遷移が来なかった（何ビット目か）
    ClockTimeout { bit: u8, waiting_for_high: bool },
    /// ACK ビットが 0 でなかった
    NoAcknowledge,
}

impl fmt::Display for Ps2Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Ps2Error::ClockTimeout { bit, waiting_for_high } => write!(
                f,
                "keyboard clock timeout at bit {} (waiting for {})",
                bit,
                if *waiting_for_high { "high" } else { "low" }
            ),
            Ps2Error::NoAcknowledge => write!(f, "keyboard did not acknowledge"),
        }
    }
}

impl std::error::Error for Ps2Error {}

/// クロック線が指定レベルになるまで待つ
pub fn wait_clock<B: Ps2Bus + ?Sized>(bus: &mut B, high: bool, timeout_us: u32, bit: u8) -> Result<(), Ps2Error> {
    let start = bus.micros();
    while bus.micros().wrapping_sub(start) < timeout_us {
        if bus.clock_high() == high {
            return Ok(());
        }
    }
    Err(Ps2Error::ClockTimeout { bit, waiting_for_high: high })
}

fn put_data<B: Ps2Bus + ?Sized>(bus: &mut B, high: bool) {
    if high {
        bus.release_data();
    } else {
        bus.pull_data_low();
    }
}

/// 1ビット送る: Low を待ってデータを置き、High を待つ
fn clock_out<B: Ps2Bus + ?Sized>(bus: &mut B, level: bool, bit: u8, low_timeout_us: u32) -> Result<(), Ps2Error> {
    wait_clock(bus, false, low_timeout_us, bit)?;
    put_data(bus, level);
    wait_clock(bus, true, CLOCK_TIMEOUT_US, bit)
}

fn send_bits<B: Ps2Bus + ?Sized>(bus: &mut B, data: u8) -> Result<(), Ps2Error> {
    let mut parity = true;
    for i in 0..8u8 {
        let level = (data >> i) & 1 != 0;
        if level {
            parity = !parity;
        }
        clock_out(bus, level, i, FIRST_CLOCK_TIMEOUT_US)?;
    }
    clock_out(bus, parity, 8, CLOCK_TIMEOUT_US)?;
    clock_out(bus, true, 9, CLOCK_TIMEOUT_US)?;

    bus.release_data();
    wait_clock(bus, false, CLOCK_TIMEOUT_US, 10)?;
    if bus.data_high() {
        return Err(Ps2Error::NoAcknowledge);
    }
    wait_clock(bus, true, CLOCK_TIMEOUT_US, 10)
}

/// 1バイト送信する
///
/// 送信中は受信割り込みを止め、成否にかかわらず戻す。
pub fn send_byte<B: Ps2Bus + ?Sized>(bus: &mut B, data: u8) -> Result<(), Ps2Error> {
    bus.set_edge_interrupt(false);

    bus.pull_clock_low();
    bus.delay_micros(REQUEST_HOLD_US);
    bus.pull_data_low();
    bus.release_clock();

    let result = send_bits(bus, data);
    if result.is_err() {
        bus.release_data();
    }

    bus.set_edge_interrupt(true);
    result
}

/// 再試行の条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// 1回の応答待ち時間
    pub timeout_us: u32,
    /// 試行間の待ち時間
    pub delay_us: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 10,
            timeout_us: 100_000,
            delay_us: 10_000,
        }
    }
}

/// 1回の試行結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt<T> {
    /// 確定。以降は試行しない
    Done(T),
    /// 再試行する（これまでの最新結果）
    Retry(T),
}

impl RetryPolicy {
    /// `attempt` を最大回数まで繰り返し、最後の結果を返す
    pub fn run<B, T, F>(&self, bus: &mut B, initial: T, mut attempt: F) -> T
    where
        B: Ps2Bus + ?Sized,
        F: FnMut(&mut B, &T) -> Attempt<T>,
    {
        let mut last = initial;
        for n in 1..=self.max_attempts {
            match attempt(bus, &last) {
                Attempt::Done(value) => return value,
                Attempt::Retry(value) => last = value,
            }
            if n < self.max_attempts {
                bus.delay_micros(self.delay_us);
            }
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::sim::{Reply, SimulatedKeyboard};

    #[test]
    fn test_send_byte_reaches_device() {
        let mut kb = SimulatedKeyboard::new();
        for byte in [0xED, 0x00, 0xFF, 0x5A] {
            assert_eq!(send_byte(&mut kb, byte), Ok(()));
        }
        assert_eq!(kb.received(), &[0xED, 0x00, 0xFF, 0x5A]);
        assert_eq!(kb.parity_errors(), 0);
        assert!(kb.edge_interrupt_enabled());
        assert!(kb.clock_high() && kb.data_high());
    }

    #[test]
    fn test_unplugged_keyboard_times_out() {
        let mut kb = SimulatedKeyboard::new();
        kb.unplug();
        let err = send_byte(&mut kb, 0xED);
        assert_eq!(err, Err(Ps2Error::ClockTimeout { bit: 0, waiting_for_high: false }));
        assert!(kb.edge_interrupt_enabled());
        assert!(kb.data_high());
    }

    #[test]
    fn test_missing_ack() {
        let mut kb = SimulatedKeyboard::new();
        kb.script(&[Reply::NoAck]);
        assert_eq!(send_byte(&mut kb, 0xF3), Err(Ps2Error::NoAcknowledge));
        assert!(kb.edge_interrupt_enabled());
    }

    #[test]
    fn test_retry_policy_counts_and_delays() {
        let mut kb = SimulatedKeyboard::new();
        let policy = RetryPolicy { max_attempts: 4, timeout_us: 0, delay_us: 500 };
        let mut calls = 0;
        let start = kb.micros();
        let last = policy.run(&mut kb, 0u8, |_, _| {
            calls += 1;
            Attempt::Retry(calls)
        });
        assert_eq!((calls, last), (4, 4));
        // 試行間の3回だけ待つ
        assert!(kb.micros() - start >= 1500 && kb.micros() - start < 2000);

        calls = 0;
        let done = policy.run(&mut kb, 0u8, |_, _| {
            calls += 1;
            if calls == 2 { Attempt::Done(0xFA) } else { Attempt::Retry(0xFE) }
        });
        assert_eq!((calls, done), (2, 0xFA));
    }

    #[test]
    fn test_error_display() {
        let e = Ps2Error::ClockTimeout { bit: 3, waiting_for_high: true };
        assert_eq!(e.to_string(), "keyboard clock timeout at bit 3 (waiting for high)");
        assert_eq!(Ps2Error::NoAcknowledge.to_string(), "keyboard did not acknowledge");
    }
}
