//! キーボードコーデック
//!
//! 2線式（クロック/データ）キーボードとのビット単位の送受信、
//! セット2スキャンコードからキーコードへの変換、LED/リピート設定を行う。
//!
//! 受信はクロック立ち下がり割り込みで1ビットずつ進め、完成したバイトを
//! キューに積む。変換はメインループ側で `get_next_key` を呼んだときに行う。

pub mod receiver;
pub mod scancodes;
pub mod sim;
pub mod translate;
pub mod transmitter;

use crate::ring::RingBuffer;
use receiver::{BitReceiver, RxEvent};
use scancodes as sc;
use translate::{Modifiers, Translation, Translator};
use transmitter::{Attempt, RetryPolicy};

/// スキャンコードキューの容量
pub const QUEUE_SIZE: usize = 64;
/// 応答が得られなかったときの値
pub const NO_RESPONSE: u8 = 0x00;
/// リピート設定の既定値
pub const DEFAULT_REPEAT_RATE: u8 = 6;

/// キーボード線へのアクセス
///
/// 実機では GPIO とマイクロ秒タイマ、テストでは `sim::SimulatedKeyboard`。
/// 線はオープンドレインで、解放すると High に戻る。
pub trait Ps2Bus {
    /// 現在時刻（マイクロ秒、折り返しあり）
    fn micros(&mut self) -> u32;
    fn delay_micros(&mut self, us: u32);

    fn clock_high(&mut self) -> bool;
    fn data_high(&mut self) -> bool;
    fn pull_clock_low(&mut self);
    fn release_clock(&mut self);
    fn pull_data_low(&mut self);
    fn release_data(&mut self);

    /// クロック立ち下がり割り込みの許可/禁止
    fn set_edge_interrupt(&mut self, enabled: bool);
    /// 保留中の立ち下がりを1つ取り出す（そのときのデータ線の値）
    ///
    /// 割り込み禁止中は常に `None`。
    fn take_falling_edge(&mut self) -> Option<bool>;
}

/// キーボードコーデック
#[derive(Debug)]
pub struct Keyboard {
    queue: RingBuffer<QUEUE_SIZE>,
    receiver: BitReceiver,
    translator: Translator,
    policy: RetryPolicy,
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyboard {
    pub fn new() -> Self {
        Keyboard {
            queue: RingBuffer::new(),
            receiver: BitReceiver::new(),
            translator: Translator::new(),
            policy: RetryPolicy::default(),
        }
    }

    /// 応答待ちの条件を差し替える
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 変換状態・受信状態・キューをすべて初期化
    pub fn reset(&mut self) {
        self.translator.reset();
        self.receiver.reset();
        self.queue.clear();
    }

    /// 初期化して LED とリピート設定を送る
    ///
    /// 失敗してもキー入力は使えるので、警告を出して続行する。
    pub fn init<B: Ps2Bus + ?Sized>(&mut self, bus: &mut B, repeat_rate: u8) -> bool {
        self.reset();
        bus.set_edge_interrupt(true);
        let ok = self.send_led_status(bus) && self.set_repeat_rate(bus, repeat_rate);
        if ok {
            log::info!("Keyboard initialized (repeat rate ${:02X})", repeat_rate);
        } else {
            log::warn!("Keyboard initialization failed, continuing without it");
        }
        ok
    }

    pub fn modifiers(&self) -> Modifiers {
        self.translator.modifiers()
    }

    /// キューに溜まっている受信バイト数
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// クロック立ち下がり1回分の処理（割り込みハンドラ）
    pub fn on_clock_edge(&mut self, bit: bool, now_us: u32) {
        match self.receiver.on_falling_edge(bit, now_us) {
            Some(RxEvent::Byte(byte)) => {
                log::trace!("Keyboard byte ${:02X}", byte);
                self.queue.enqueue(byte);
            }
            Some(RxEvent::SelfTest) => {
                log::info!("Keyboard self-test code received, resetting codec");
                self.reset();
            }
            Some(RxEvent::FramingError) => {
                log::debug!("Keyboard framing error, waiting for idle line");
            }
            None => {}
        }
    }

    /// 保留中の立ち下がりをすべて処理し、処理した数を返す
    pub fn service_edges<B: Ps2Bus + ?Sized>(&mut self, bus: &mut B) -> usize {
        let mut count = 0;
        while let Some(bit) = bus.take_falling_edge() {
            let now = bus.micros();
            self.on_clock_edge(bit, now);
            count += 1;
        }
        count
    }

    /// 1バイト送って応答バイトを待つ
    ///
    /// 再送要求 (0xFE) と無応答は再試行する。最後まで応答がなければ
    /// `NO_RESPONSE`、再送要求で終わればその値を返す。
    pub fn send_and_wait_response<B: Ps2Bus + ?Sized>(&mut self, bus: &mut B, byte: u8) -> u8 {
        let policy = self.policy;
        policy.run(bus, NO_RESPONSE, |bus, last| {
            self.queue.clear();
            if let Err(e) = transmitter::send_byte(bus, byte) {
                log::debug!("Sending ${:02X} failed: {}", byte, e);
                return Attempt::Retry(*last);
            }

            let start = bus.micros();
            while self.queue.is_empty() && bus.micros().wrapping_sub(start) < policy.timeout_us {
                self.service_edges(bus);
            }
            match self.queue.dequeue() {
                Some(sc::RESEND) => Attempt::Retry(sc::RESEND),
                Some(response) => Attempt::Done(response),
                None => Attempt::Retry(*last),
            }
        })
    }

    fn command<B: Ps2Bus + ?Sized>(&mut self, bus: &mut B, bytes: [u8; 2]) -> bool {
        for byte in bytes {
            let response = self.send_and_wait_response(bus, byte);
            if response != sc::ACK {
                log::warn!("Keyboard command ${:02X} not acknowledged (${:02X})", byte, response);
                return false;
            }
        }
        true
    }

    /// ロックキーの状態を LED に反映する
    pub fn send_led_status<B: Ps2Bus + ?Sized>(&mut self, bus: &mut B) -> bool {
        let mask = self.translator.modifiers().led_mask();
        self.command(bus, [sc::CMD_SET_LEDS, mask])
    }

    pub fn set_repeat_rate<B: Ps2Bus + ?Sized>(&mut self, bus: &mut B, rate: u8) -> bool {
        self.command(bus, [sc::CMD_SET_TYPEMATIC, rate])
    }

    /// キューを変換して次のキーコードを返す
    ///
    /// ロックキーが切り替わると LED を更新する。この送受信でキューは空になる。
    pub fn get_next_key<B: Ps2Bus + ?Sized>(&mut self, bus: &mut B) -> Option<u16> {
        while let Some(byte) = self.queue.dequeue() {
            match self.translator.translate(byte) {
                Translation::Key(code) => return Some(code),
                Translation::LocksChanged => {
                    self.send_led_status(bus);
                }
                Translation::Pending => {}
            }
        }
        None
    }
}
