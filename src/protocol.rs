//! ホスト（Altair シミュレータ）との通信プロトコル
//!
//! ホスト → 端末: 先頭バイトの上位ニブルでコマンドを選ぶ。
//!
//! | コマンド | 後続バイト                | 動作                                 |
//! |----------|---------------------------|--------------------------------------|
//! | `$1n`    | アドレス下位, 値          | メモリ `n*256+下位` に値を書く (n<8) |
//! | `$20`    | 1024 バイト               | 画面全体を書き換え                   |
//! | `$30`    | 値                        | コントロールレジスタ                 |
//! | `$40`    | 値                        | DIPスイッチレジスタ                  |
//!
//! それ以外のバイトは待機状態で読み捨てる。
//!
//! 端末 → ホスト: 接続時に `$10`、キー入力ごとに `$30` + キーコード。

use crate::registers::{DisplayRegisters, MEMORY_SIZE};

const CMD_MEMBYTE: u8 = 0x10;
const CMD_FULLFRAME: u8 = 0x20;
const CMD_CTRL: u8 = 0x30;
const CMD_DIP: u8 = 0x40;

/// 端末 → ホストのメッセージ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMessage {
    Connect,
    Key(u8),
}

impl HostMessage {
    pub const CONNECT: u8 = 0x10;
    pub const KEY: u8 = 0x30;

    /// キーコードから作る。1バイトに収まらない特殊キーは送らない
    pub fn key(keycode: u16) -> Option<Self> {
        u8::try_from(keycode).ok().map(HostMessage::Key)
    }

    pub fn encode(self, out: &mut Vec<u8>) {
        match self {
            HostMessage::Connect => out.push(Self::CONNECT),
            HostMessage::Key(code) => out.extend_from_slice(&[Self::KEY, code]),
        }
    }
}

/// 受信状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    #[default]
    Idle,
    /// アドレス下位待ち（上位は受信済み）
    MemByteAddress { base: u16 },
    MemByteValue { address: u16 },
    /// 画面データ受信中（次に書く位置）
    FullFrame { offset: u16 },
    CtrlValue,
    DipValue,
}

/// ホストコマンドのデコーダ
///
/// 1バイトずつ進める。先読みはしない。
#[derive(Debug, Default)]
pub struct HostDecoder {
    state: DecoderState,
}

impl HostDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::Idle
    }

    /// 1バイト処理する
    pub fn feed(&mut self, byte: u8, regs: &mut DisplayRegisters) {
        self.state = match self.state {
            DecoderState::Idle => match byte & 0xF0 {
                CMD_MEMBYTE => DecoderState::MemByteAddress { base: (byte as u16 & 0x07) * 256 },
                CMD_FULLFRAME => DecoderState::FullFrame { offset: 0 },
                CMD_CTRL => DecoderState::CtrlValue,
                CMD_DIP => DecoderState::DipValue,
                _ => {
                    log::trace!("Ignoring host byte ${:02X}", byte);
                    DecoderState::Idle
                }
            },
            DecoderState::MemByteAddress { base } => DecoderState::MemByteValue { address: base + byte as u16 },
            DecoderState::MemByteValue { address } => {
                regs.write_cell(address as usize, byte);
                DecoderState::Idle
            }
            DecoderState::FullFrame { offset } => {
                regs.write_cell(offset as usize, byte);
                let next = offset + 1;
                if next as usize == MEMORY_SIZE {
                    DecoderState::Idle
                } else {
                    DecoderState::FullFrame { offset: next }
                }
            }
            DecoderState::CtrlValue => {
                regs.set_ctrl(byte);
                DecoderState::Idle
            }
            DecoderState::DipValue => {
                regs.set_dip(byte);
                DecoderState::Idle
            }
        };
    }

    /// まとめて処理する
    pub fn feed_all(&mut self, bytes: &[u8], regs: &mut DisplayRegisters) {
        for &b in bytes {
            self.feed(b, regs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::MemoryBus;

    #[test]
    fn test_membyte_all_pages() {
        let mut regs = DisplayRegisters::new();
        let mut dec = HostDecoder::new();
        for n in 0..8u8 {
            for a in [0u8, 1, 0x7F, 0xFF] {
                let v = n.wrapping_mul(31).wrapping_add(a);
                dec.feed_all(&[0x10 | n, a, v], &mut regs);
                assert!(dec.is_idle());
                assert_eq!(regs.cell(n as usize * 256 + a as usize), v);
            }
        }
        // ページ4-7は1KBで折り返す
        dec.feed_all(&[0x15, 0x03, 0xEE], &mut regs);
        assert_eq!(regs.memory()[256 + 3], 0xEE);
    }

    #[test]
    fn test_membyte_low_bits_only() {
        let mut regs = DisplayRegisters::new();
        let mut dec = HostDecoder::new();
        dec.feed_all(&[0x1B, 0x02, 0x55], &mut regs);
        assert_eq!(regs.cell(3 * 256 + 2), 0x55);
    }

    #[test]
    fn test_fullframe_resumes_across_chunks() {
        let frame: Vec<u8> = (0..1024).map(|i| (i * 7 % 251) as u8).collect();
        for split in [1usize, 3, 64, 1000] {
            let mut regs = DisplayRegisters::new();
            let mut dec = HostDecoder::new();
            dec.feed(0x20, &mut regs);
            for chunk in frame.chunks(split) {
                dec.feed_all(chunk, &mut regs);
            }
            assert!(dec.is_idle());
            assert_eq!(&regs.memory()[..], &frame[..]);
        }
    }

    #[test]
    fn test_registers_and_unknown_bytes() {
        let mut regs = DisplayRegisters::new();
        let mut dec = HostDecoder::new();
        dec.feed_all(&[0x00, 0x55, 0xF3, 0x30, 0x42, 0x40, 0x26], &mut regs);
        assert!(dec.is_idle());
        assert_eq!(regs.ctrl(), 0x42);
        assert_eq!(regs.read(0x401), 0x26);
        assert_eq!(regs.glyphs().blank_below(), 32);
        assert!(regs.memory().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_state_mid_command() {
        let mut regs = DisplayRegisters::new();
        let mut dec = HostDecoder::new();
        dec.feed(0x12, &mut regs);
        assert_eq!(dec.state(), DecoderState::MemByteAddress { base: 0x200 });
        dec.feed(0x10, &mut regs);
        assert_eq!(dec.state(), DecoderState::MemByteValue { address: 0x210 });
        dec.feed(0x99, &mut regs);
        assert!(dec.is_idle());
    }

    #[test]
    fn test_host_message_encoding() {
        let mut out = Vec::new();
        HostMessage::Connect.encode(&mut out);
        HostMessage::key(b'A' as u16).into_iter().for_each(|m| m.encode(&mut out));
        assert_eq!(out, vec![0x10, 0x30, 0x41]);
        assert_eq!(HostMessage::key(0x112), None);
    }
}
