//! 端末全体の結線
//!
//! 割り込み（スキャンライン・転送完了・キーボードエッジ）の処理と、
//! メインループ1周分（ホストバイトのデコード、キー入力の転送）をまとめる。
//!
//! 書き込み側の分担:
//! - キャラクタメモリとレジスタ: メインループ（デコーダ・コンソール）のみ
//! - ビデオエンジンの状態: スキャンライン/転送完了割り込みのみ
//! - ホスト受信キュー: 受信側のみが積み、メインループのみが取り出す

use crate::console::LocalConsole;
use crate::irq::{InterruptController, Interrupts};
use crate::keyboard::{Keyboard, Ps2Bus};
use crate::protocol::{HostDecoder, HostMessage};
use crate::registers::DisplayRegisters;
use crate::ring::RingBuffer;
use crate::timing::VideoStandard;
use crate::transport::{LinkEvent, Transport};
use crate::video::{VideoEngine, VideoSignal};

/// ホスト受信キューの容量
pub const HOST_QUEUE_SIZE: usize = 4096;
/// 1回の受信要求の上限
pub const HOST_CHUNK: usize = 64;
/// メインループ1周でデコードするバイト数（ほとんどのコマンドは3バイト）
pub const BYTES_PER_POLL: usize = 3;

pub struct Terminal {
    regs: DisplayRegisters,
    decoder: HostDecoder,
    video: VideoEngine,
    keyboard: Keyboard,
    irq: InterruptController,
    host_rx: RingBuffer<HOST_QUEUE_SIZE>,
    outbound: Vec<u8>,
    console: LocalConsole,
    host_connected: bool,
}

impl Terminal {
    /// 起動画面を表示した状態で作る
    pub fn new(standard: VideoStandard, dip: u8, ctrl: u8) -> Self {
        let mut regs = DisplayRegisters::new();
        regs.set_dip(dip);
        regs.set_ctrl(ctrl);
        let mut console = LocalConsole::new();
        console.splash(&mut regs);
        // キーボードを初期化するまでエッジ割り込みは止めておく
        let mut irq = InterruptController::new();
        irq.mask(Interrupts::KEYBOARD_EDGE);
        Terminal {
            regs,
            decoder: HostDecoder::new(),
            video: VideoEngine::new(standard),
            keyboard: Keyboard::new(),
            irq,
            host_rx: RingBuffer::new(),
            outbound: Vec::new(),
            console,
            host_connected: false,
        }
    }

    pub fn regs(&self) -> &DisplayRegisters {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut DisplayRegisters {
        &mut self.regs
    }

    pub fn video(&self) -> &VideoEngine {
        &self.video
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn console(&self) -> &LocalConsole {
        &self.console
    }

    pub fn interrupts(&self) -> &InterruptController {
        &self.irq
    }

    pub fn host_connected(&self) -> bool {
        self.host_connected
    }

    /// キーボードを初期化し、エッジ割り込みを有効にする
    pub fn init_keyboard<B: Ps2Bus + ?Sized>(&mut self, bus: &mut B, repeat_rate: u8) -> bool {
        self.irq.unmask(Interrupts::KEYBOARD_EDGE);
        self.keyboard.init(bus, repeat_rate)
    }

    /// ホストが接続された: 以降のキー入力はホストへ送る
    pub fn attach_host(&mut self) {
        log::info!("Host attached");
        self.host_connected = true;
        HostMessage::Connect.encode(&mut self.outbound);
    }

    /// ホストが切断された: ローカルコンソールに戻る
    pub fn detach_host(&mut self) {
        log::info!("Host detached, back to local console");
        self.host_connected = false;
    }

    /// 次の受信要求で受け取ってよいバイト数
    pub fn host_receive_capacity(&self) -> usize {
        self.host_rx.available_capacity().min(HOST_CHUNK)
    }

    /// 受信完了: バイト列をキューに積む
    pub fn receive_from_host(&mut self, bytes: &[u8]) {
        self.host_rx.extend_from_slice(bytes);
    }

    /// 未デコードのホストバイト数
    pub fn host_pending(&self) -> usize {
        self.host_rx.len()
    }

    /// ホストへ送るバイト列を取り出す
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    /// 1スキャンライン分の割り込みを優先度順に処理する
    pub fn run_scanline<S, B>(&mut self, signal: &mut S, bus: &mut B)
    where
        S: VideoSignal + ?Sized,
        B: Ps2Bus + ?Sized,
    {
        self.irq.raise(Interrupts::SCANLINE | Interrupts::KEYBOARD_EDGE);
        while let Some(irq) = self.irq.next() {
            if irq == Interrupts::SCANLINE {
                self.video.on_scanline(&self.regs, signal);
                if self.video.transmit(signal) {
                    self.irq.raise(Interrupts::TRANSFER_COMPLETE);
                }
            } else if irq == Interrupts::TRANSFER_COMPLETE {
                self.video.on_transfer_complete(&self.regs);
            } else if irq == Interrupts::KEYBOARD_EDGE {
                self.keyboard.service_edges(bus);
            }
        }
    }

    /// メインループ1周分
    ///
    /// ホストバイトを最大3つデコードし、キーを1つホストかローカルコンソールへ渡す。
    pub fn poll<B: Ps2Bus + ?Sized>(&mut self, bus: &mut B) {
        for _ in 0..BYTES_PER_POLL {
            match self.host_rx.dequeue() {
                Some(byte) => self.decoder.feed(byte, &mut self.regs),
                None => break,
            }
        }

        let Some(code) = self.keyboard.get_next_key(bus) else {
            return;
        };
        if self.host_connected {
            // 1バイトに収まらない特殊キーは送らない
            if let Some(msg) = HostMessage::key(code) {
                msg.encode(&mut self.outbound);
            }
        } else {
            self.console.handle_key(&mut self.regs, code);
        }
    }

    /// 1フレーム分（スキャンラインごとにメインループも回す）
    pub fn run_frame<S, B>(&mut self, signal: &mut S, bus: &mut B)
    where
        S: VideoSignal + ?Sized,
        B: Ps2Bus + ?Sized,
    {
        for _ in 0..self.video.profile().num_lines {
            self.run_scanline(signal, bus);
            self.poll(bus);
        }
    }

    /// トランスポートとのやりとり（接続確認、受信、送信）
    pub fn pump<T: Transport + ?Sized>(&mut self, transport: &mut T) -> std::io::Result<()> {
        match transport.poll_event() {
            Some(LinkEvent::Attached) => self.attach_host(),
            Some(LinkEvent::Detached) => self.detach_host(),
            None => {}
        }

        let mut buf = [0u8; HOST_CHUNK];
        let want = self.host_receive_capacity();
        if want > 0 {
            let n = transport.receive(&mut buf[..want])?;
            if n > 0 {
                log::trace!("Received {} host bytes", n);
                self.receive_from_host(&buf[..n]);
            }
        }

        // 新しい送信がなくても、前回書き切れなかった分を流す
        if self.outbound.is_empty() {
            transport.flush()?;
        } else {
            let out = self.take_outbound();
            transport.send(&out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameCapture;
    use crate::keyboard::sim::SimulatedKeyboard;
    use crate::transport::ReplayTransport;

    fn terminal() -> (Terminal, SimulatedKeyboard, FrameCapture) {
        let mut term = Terminal::new(VideoStandard::Ntsc, 0x36, 0);
        let mut sim = SimulatedKeyboard::new();
        assert!(term.init_keyboard(&mut sim, 6));
        (term, sim, FrameCapture::new(VideoStandard::Ntsc))
    }

    #[test]
    fn test_frame_reaches_capture() {
        let (mut term, mut sim, mut cap) = terminal();
        term.run_frame(&mut cap, &mut sim);
        assert_eq!(cap.frames_completed(), 1);
        assert_eq!(cap.lines_last_frame(), 208);
        term.run_frame(&mut cap, &mut sim);
        assert_eq!(cap.frames_completed(), 2);
    }

    #[test]
    fn test_keyboard_edges_masked_until_init() {
        let mut term = Terminal::new(VideoStandard::Ntsc, 0x36, 0);
        let mut sim = SimulatedKeyboard::new();
        let mut cap = FrameCapture::new(VideoStandard::Ntsc);
        term.run_scanline(&mut cap, &mut sim);
        // 要求は残るが、マスク中なので取り出されない
        assert!(term.interrupts().pending().is_empty());

        assert!(term.init_keyboard(&mut sim, 6));
        assert_eq!(term.interrupts().pending(), Interrupts::KEYBOARD_EDGE);
        term.run_scanline(&mut cap, &mut sim);
        assert!(term.interrupts().pending().is_empty());
    }

    #[test]
    fn test_host_bytes_decoded_three_per_poll() {
        let (mut term, mut sim, _) = terminal();
        term.attach_host();
        assert_eq!(term.take_outbound(), vec![0x10]);
        term.receive_from_host(&[0x10, 0x05, b'Z', 0x30, 0x21]);
        term.poll(&mut sim);
        assert_eq!(term.regs().cell(5), b'Z');
        assert_eq!(term.host_pending(), 2);
        term.poll(&mut sim);
        assert_eq!(term.regs().ctrl(), 0x21);
    }

    #[test]
    fn test_receive_capacity_is_capped() {
        let (mut term, _, _) = terminal();
        assert_eq!(term.host_receive_capacity(), HOST_CHUNK);
        term.receive_from_host(&[0u8; HOST_QUEUE_SIZE - 10]);
        assert_eq!(term.host_receive_capacity(), 10);
    }

    #[test]
    fn test_keys_go_to_host_when_attached() {
        let (mut term, mut sim, mut cap) = terminal();
        term.attach_host();
        term.take_outbound();
        // 'a' と F1（ホストには送らない）
        sim.type_scancodes(&[0x1C, 0xF0, 0x1C, 0x05]);
        sim.advance(5_000);
        term.run_frame(&mut cap, &mut sim);
        assert_eq!(term.take_outbound(), vec![0x30, b'a']);
    }

    #[test]
    fn test_keys_go_to_console_without_host() {
        let (mut term, mut sim, mut cap) = terminal();
        sim.type_scancodes(&[0x33, 0x43]);
        sim.advance(5_000);
        term.run_frame(&mut cap, &mut sim);
        assert_eq!(term.regs().cell(0), b'h');
        assert_eq!(term.regs().cell(1), b'i');
        assert_eq!(term.console().cursor(), (0, 2));
        assert!(term.take_outbound().is_empty());
    }

    #[test]
    fn test_pump_replay() {
        let (mut term, mut sim, _) = terminal();
        let mut frame = vec![0x20];
        frame.extend(std::iter::repeat(b'*').take(1024));
        frame.extend_from_slice(&[0x40, 0x37]);
        let mut link = ReplayTransport::new(frame);

        term.pump(&mut link).unwrap();
        assert!(term.host_connected());
        assert_eq!(link.sent(), &[0x10]);
        while !link.is_finished() || term.host_pending() > 0 {
            term.pump(&mut link).unwrap();
            term.poll(&mut sim);
        }
        assert!(term.regs().memory().iter().all(|&b| b == b'*'));
        assert_eq!(term.regs().dip().bits(), 0x37);
    }
}
