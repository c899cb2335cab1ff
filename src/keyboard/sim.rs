//! 2線式キーボードのシミュレータ
//!
//! 実機なしで送受信を動かすための決定的なモデル。時間は `micros()` を呼ぶたびに
//! 1us、`delay_micros()` で指定分だけ進む。
//!
//! ホストからの送信要求（クロック Low 100us 以上 → データ Low → クロック解放）を
//! 受けると半周期 40us のクロックを 11 回生成し、立ち上がりでデータを読み、
//! 11 回目の Low の間に ACK を返す。応答バイトはその後フレーム単位で送り返す。

use std::collections::VecDeque;

use super::receiver::frame_bits;
use super::scancodes as sc;
use super::Ps2Bus;

/// クロック半周期
const HALF_PERIOD_US: u32 = 40;
const PERIOD_US: u32 = HALF_PERIOD_US * 2;
/// 送信要求として認める最小のクロック Low 時間
const MIN_REQUEST_HOLD_US: u32 = 100;
/// 受信完了から応答を始めるまで
const RESPONSE_GAP_US: u32 = 200;
/// フレーム間の最小間隔
const FRAME_GAP_US: u32 = 300;

/// 受け取ったバイトへの応答
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// 0xFA を返し、コマンドとして解釈する
    Ack,
    /// 0xFE（再送要求）
    Resend,
    /// ACK ビットを返さない
    NoAck,
    /// ACK ビットだけ返して応答バイトは送らない
    Silent,
    /// 任意のバイトを返す
    Byte(u8),
}

/// 時刻 `now` が `t` に達しているか（u32 の折り返しをまたいでもよい）
#[inline]
fn reached(now: u32, t: u32) -> bool {
    (now.wrapping_sub(t) as i32) >= 0
}

#[derive(Debug, Clone)]
struct HostTransfer {
    start: u32,
    bits: Vec<bool>,
    reply: Reply,
}

impl HostTransfer {
    /// k 番目のクロックが Low の区間
    fn clock_low_at(&self, now: u32) -> Option<u32> {
        let t = now.wrapping_sub(self.start);
        if t < HALF_PERIOD_US {
            return None;
        }
        let k = (t - HALF_PERIOD_US) / PERIOD_US;
        let phase = (t - HALF_PERIOD_US) % PERIOD_US;
        (k <= 10 && phase < HALF_PERIOD_US).then_some(k)
    }

    fn end(&self) -> u32 {
        self.start.wrapping_add(PERIOD_US * 11)
    }
}

pub struct SimulatedKeyboard {
    now: u32,
    connected: bool,
    host_clock_low: bool,
    host_data_low: bool,
    clock_low_since: u32,
    irq_enabled: bool,
    transfer: Option<HostTransfer>,
    /// キーボード → ホストのビット（立ち下がり時刻, データ）
    outgoing: VecDeque<(u32, bool)>,
    replies: VecDeque<Reply>,
    received: Vec<u8>,
    parity_errors: u32,
    pending_command: Option<u8>,
    leds: u8,
    typematic: Option<u8>,
}

impl Default for SimulatedKeyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedKeyboard {
    pub fn new() -> Self {
        SimulatedKeyboard {
            now: 0,
            connected: true,
            host_clock_low: false,
            host_data_low: false,
            clock_low_since: 0,
            irq_enabled: false,
            transfer: None,
            outgoing: VecDeque::new(),
            replies: VecDeque::new(),
            received: Vec::new(),
            parity_errors: 0,
            pending_command: None,
            leds: 0,
            typematic: None,
        }
    }

    /// キーボードを外す（クロックを一切生成しない）
    pub fn unplug(&mut self) {
        self.connected = false;
    }

    /// 次に受け取るバイトへの応答を順に指定する（指定がなければ Ack）
    pub fn script(&mut self, replies: &[Reply]) {
        self.replies.extend(replies.iter().copied());
    }

    /// ホストから受け取ったバイト
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    pub fn parity_errors(&self) -> u32 {
        self.parity_errors
    }

    /// 最後に設定された LED ビット
    pub fn leds(&self) -> u8 {
        self.leds
    }

    pub fn typematic(&self) -> Option<u8> {
        self.typematic
    }

    pub fn edge_interrupt_enabled(&self) -> bool {
        self.irq_enabled
    }

    /// 時間を進める
    pub fn advance(&mut self, us: u32) {
        self.now = self.now.wrapping_add(us);
        self.sync();
    }

    /// スキャンコード列を送る（1バイト1フレーム）
    pub fn type_scancodes(&mut self, codes: &[u8]) {
        for &code in codes {
            self.queue_bits(&frame_bits(code));
        }
    }

    /// 任意のビット列を1フレームとして送る
    pub fn queue_bits(&mut self, bits: &[bool]) {
        let earliest = self.now.wrapping_add(PERIOD_US);
        self.schedule_frame(earliest, bits);
    }

    /// 直前のフレームから間隔を空けて、ビット列の立ち下がり時刻を積む
    fn schedule_frame(&mut self, earliest: u32, bits: &[bool]) {
        let start = match self.outgoing.back() {
            Some(&(last, _)) => {
                let after_gap = last.wrapping_add(FRAME_GAP_US);
                if reached(earliest, after_gap) { earliest } else { after_gap }
            }
            None => earliest,
        };
        for (i, &bit) in bits.iter().enumerate() {
            self.outgoing.push_back((start.wrapping_add(PERIOD_US * i as u32), bit));
        }
    }

    /// 送信待ちのビットがあるか
    pub fn has_pending_bits(&self) -> bool {
        !self.outgoing.is_empty()
    }

    fn respond(&mut self, byte: u8) {
        let earliest = self.now.wrapping_add(RESPONSE_GAP_US);
        self.schedule_frame(earliest, &frame_bits(byte));
    }

    fn accept(&mut self, byte: u8) {
        match self.pending_command.take() {
            Some(sc::CMD_SET_LEDS) => self.leds = byte,
            Some(sc::CMD_SET_TYPEMATIC) => self.typematic = Some(byte),
            _ => {
                if byte == sc::CMD_SET_LEDS || byte == sc::CMD_SET_TYPEMATIC {
                    self.pending_command = Some(byte);
                }
            }
        }
    }

    /// 受信完了したフレームの処理
    fn finish_transfer(&mut self, transfer: HostTransfer) {
        if transfer.reply == Reply::NoAck {
            return;
        }
        let bits = &transfer.bits;
        let byte = bits[..8].iter().rev().fold(0u8, |acc, &b| (acc << 1) | u8::from(b));
        let ones = bits[..9].iter().filter(|&&b| b).count();
        if ones % 2 != 1 || !bits[9] {
            self.parity_errors += 1;
            self.respond(sc::RESEND);
            return;
        }

        self.received.push(byte);
        match transfer.reply {
            Reply::Ack => {
                self.accept(byte);
                self.respond(sc::ACK);
                if byte == 0xFF {
                    // リセット: 自己診断完了を送る
                    self.respond(sc::SELF_TEST_PASSED);
                }
            }
            Reply::Resend => self.respond(sc::RESEND),
            Reply::Byte(b) => self.respond(b),
            Reply::Silent | Reply::NoAck => {}
        }
    }

    /// 現在時刻までのホスト送信を進める
    fn sync(&mut self) {
        let Some(transfer) = self.transfer.as_mut() else {
            return;
        };
        let data = !self.host_data_low;
        while transfer.bits.len() < 10 {
            let rise = transfer.start.wrapping_add(PERIOD_US * (transfer.bits.len() as u32 + 1));
            if !reached(self.now, rise) {
                break;
            }
            transfer.bits.push(data);
        }
        if reached(self.now, transfer.end()) {
            if let Some(done) = self.transfer.take() {
                self.finish_transfer(done);
            }
        }
    }

    fn ack_active(&self) -> bool {
        match &self.transfer {
            Some(t) => t.reply != Reply::NoAck && t.bits.len() == 10 && t.clock_low_at(self.now) == Some(10),
            None => false,
        }
    }
}

impl Ps2Bus for SimulatedKeyboard {
    fn micros(&mut self) -> u32 {
        self.advance(1);
        self.now
    }

    fn delay_micros(&mut self, us: u32) {
        self.advance(us);
    }

    fn clock_high(&mut self) -> bool {
        self.sync();
        if self.host_clock_low {
            return false;
        }
        match &self.transfer {
            Some(t) => t.clock_low_at(self.now).is_none(),
            None => true,
        }
    }

    fn data_high(&mut self) -> bool {
        self.sync();
        !(self.host_data_low || self.ack_active())
    }

    fn pull_clock_low(&mut self) {
        self.sync();
        if !self.host_clock_low {
            self.clock_low_since = self.now;
        }
        self.host_clock_low = true;
        // 送信中に止められたら中断
        self.transfer = None;
    }

    fn release_clock(&mut self) {
        self.sync();
        let held = self.now.wrapping_sub(self.clock_low_since);
        if self.host_clock_low && self.host_data_low && held >= MIN_REQUEST_HOLD_US && self.connected {
            let reply = self.replies.pop_front().unwrap_or(Reply::Ack);
            self.transfer = Some(HostTransfer {
                start: self.now,
                bits: Vec::with_capacity(10),
                reply,
            });
        }
        self.host_clock_low = false;
    }

    fn pull_data_low(&mut self) {
        self.sync();
        self.host_data_low = true;
    }

    fn release_data(&mut self) {
        self.sync();
        self.host_data_low = false;
    }

    fn set_edge_interrupt(&mut self, enabled: bool) {
        self.irq_enabled = enabled;
    }

    fn take_falling_edge(&mut self) -> Option<bool> {
        self.sync();
        if !self.irq_enabled {
            return None;
        }
        match self.outgoing.front() {
            Some(&(due, bit)) if reached(self.now, due) => {
                self.outgoing.pop_front();
                Some(bit)
            }
            _ => None,
        }
    }
}
