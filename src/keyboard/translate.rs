//! スキャンコード → キーコード変換

use super::scancodes::{self as sc, NONE};

bitflags::bitflags! {
    /// 修飾キーとロックキーの状態
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Modifiers: u16 {
        const SHIFT_L     = 0x0001;
        const SHIFT_R     = 0x0002;
        const CTRL_L      = 0x0004;
        const CTRL_R      = 0x0008;
        const ALT_L       = 0x0010;
        const ALT_R       = 0x0020;
        const CAPS_LOCK   = 0x0040;
        const NUM_LOCK    = 0x0080;
        const SCROLL_LOCK = 0x0100;

        const SHIFT = Self::SHIFT_L.bits() | Self::SHIFT_R.bits();
        const CTRL  = Self::CTRL_L.bits() | Self::CTRL_R.bits();
    }
}

impl Modifiers {
    /// LED コマンド用のビット（Caps=4, Num=2, Scroll=1）
    pub fn led_mask(self) -> u8 {
        (if self.contains(Modifiers::CAPS_LOCK) { 4 } else { 0 })
            | (if self.contains(Modifiers::NUM_LOCK) { 2 } else { 0 })
            | (if self.contains(Modifiers::SCROLL_LOCK) { 1 } else { 0 })
    }
}

/// 1バイト変換した結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    /// キーが確定した
    Key(u16),
    /// ロックキーが切り替わった（LED を更新する）
    LocksChanged,
    /// まだ何も確定していない
    Pending,
}

/// 修飾キー状態を保持する変換器
#[derive(Debug, Clone)]
pub struct Translator {
    modifiers: Modifiers,
    /// 直前のバイトが F0
    break_code: bool,
    /// E0 を受け取った
    extended: bool,
    alt_code: u16,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    pub fn new() -> Self {
        Translator {
            modifiers: Modifiers::NUM_LOCK,
            break_code: false,
            extended: false,
            alt_code: 0,
        }
    }

    /// 全状態を初期化（NumLock は ON）
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn alt_code(&self) -> u16 {
        self.alt_code
    }

    fn lookup(&self, byte: u8) -> u16 {
        let table = if self.modifiers.intersects(Modifiers::SHIFT) {
            &sc::SHIFTED
        } else {
            &sc::PLAIN
        };
        let mut c = table[byte as usize];

        // CapsLock はシフトと無関係に大文字小文字を反転
        if self.modifiers.contains(Modifiers::CAPS_LOCK) {
            if (b'a' as u16..=b'z' as u16).contains(&c) {
                c -= 32;
            } else if (b'A' as u16..=b'Z' as u16).contains(&c) {
                c += 32;
            }
        }

        c = sc::keypad(c, self.modifiers.contains(Modifiers::NUM_LOCK));

        if self.modifiers.intersects(Modifiers::CTRL) {
            if (64..=95).contains(&c) {
                c -= 64;
            } else if (b'a' as u16..=b'z' as u16).contains(&c) {
                c -= b'a' as u16 - 1;
            }
        }
        c
    }

    /// 1バイト変換する
    pub fn translate(&mut self, byte: u8) -> Translation {
        let mut c = NONE;
        if byte == sc::PREFIX_EXTENDED {
            self.extended = true;
        } else if self.extended && byte != sc::PREFIX_BREAK {
            self.extended = false;
            c = sc::extended(byte);
        } else if (byte as usize) < sc::TABLE_SIZE {
            c = self.lookup(byte);
        }

        let pressed = !self.break_code;
        let result = match c {
            sc::SHIFT_L => self.set_modifier(Modifiers::SHIFT_L, pressed),
            sc::SHIFT_R => self.set_modifier(Modifiers::SHIFT_R, pressed),
            sc::CTRL_L => self.set_modifier(Modifiers::CTRL_L, pressed),
            sc::CTRL_R => self.set_modifier(Modifiers::CTRL_R, pressed),
            sc::ALT_R => self.set_modifier(Modifiers::ALT_R, pressed),
            sc::ALT_L if pressed => {
                self.alt_code = 0;
                self.modifiers.insert(Modifiers::ALT_L);
                Translation::Pending
            }
            sc::ALT_L => {
                // 離した時点で入力済みの数値を1キーとして出す
                let code = self.alt_code;
                self.alt_code = 0;
                self.modifiers.remove(Modifiers::ALT_L);
                Translation::Key(code)
            }
            _ if !pressed => Translation::Pending,
            sc::CAPS_LOCK => self.toggle(Modifiers::CAPS_LOCK),
            sc::NUM_LOCK => self.toggle(Modifiers::NUM_LOCK),
            sc::SCROLL_LOCK => self.toggle(Modifiers::SCROLL_LOCK),
            c if self.modifiers.contains(Modifiers::ALT_L) && (b'0' as u16..=b'9' as u16).contains(&c) => {
                self.alt_code = self.alt_code.wrapping_mul(10).wrapping_add(c - b'0' as u16);
                Translation::Pending
            }
            NONE => Translation::Pending,
            c => Translation::Key(c),
        };

        self.break_code = byte == sc::PREFIX_BREAK;
        result
    }

    fn set_modifier(&mut self, flag: Modifiers, pressed: bool) -> Translation {
        self.modifiers.set(flag, pressed);
        Translation::Pending
    }

    fn toggle(&mut self, flag: Modifiers) -> Translation {
        self.modifiers.toggle(flag);
        log::debug!("Lock keys: {:?}", self.modifiers & (Modifiers::CAPS_LOCK | Modifiers::NUM_LOCK | Modifiers::SCROLL_LOCK));
        Translation::LocksChanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(t: &mut Translator, bytes: &[u8]) -> Vec<Translation> {
        bytes
            .iter()
            .map(|&b| t.translate(b))
            .filter(|r| *r != Translation::Pending)
            .collect()
    }

    fn key(c: u8) -> Translation {
        Translation::Key(c as u16)
    }

    #[test]
    fn test_shift_a() {
        let mut t = Translator::new();
        // Shift押下, a押下, a解放, Shift解放
        let out = feed(&mut t, &[0x12, 0x1C, 0xF0, 0x1C, 0xF0, 0x12]);
        assert_eq!(out, vec![key(b'A')]);
        assert_eq!(t.modifiers(), Modifiers::NUM_LOCK);
    }

    #[test]
    fn test_alt_code() {
        let mut t = Translator::new();
        let out = feed(&mut t, &[0x11, 0x16, 0xF0, 0x16, 0x1E, 0xF0, 0x1E, 0x26, 0xF0, 0x26, 0xF0, 0x11]);
        assert_eq!(out, vec![Translation::Key(123)]);
        assert_eq!(t.alt_code(), 0);
        assert!(!t.modifiers().contains(Modifiers::ALT_L));
    }

    #[test]
    fn test_lone_alt_emits_zero() {
        let mut t = Translator::new();
        assert_eq!(feed(&mut t, &[0x11, 0xF0, 0x11]), vec![Translation::Key(0)]);
    }

    #[test]
    fn test_caps_lock_inverts_case() {
        let mut t = Translator::new();
        assert_eq!(feed(&mut t, &[0x58, 0xF0, 0x58]), vec![Translation::LocksChanged]);
        assert_eq!(feed(&mut t, &[0x1C, 0xF0, 0x1C]), vec![key(b'A')]);
        assert_eq!(feed(&mut t, &[0x59, 0x1C, 0xF0, 0x1C, 0xF0, 0x59]), vec![key(b'a')]);
        // 記号は影響を受けない
        assert_eq!(feed(&mut t, &[0x16]), vec![key(b'1')]);
    }

    #[test]
    fn test_num_lock_keypad() {
        let mut t = Translator::new();
        assert_eq!(feed(&mut t, &[0x6C]), vec![key(b'7')]);
        assert_eq!(feed(&mut t, &[0x77, 0xF0, 0x77]), vec![Translation::LocksChanged]);
        assert!(!t.modifiers().contains(Modifiers::NUM_LOCK));
        assert_eq!(feed(&mut t, &[0x6C]), vec![Translation::Key(sc::HOME)]);
        assert_eq!(feed(&mut t, &[0x73]), vec![]);
        assert_eq!(feed(&mut t, &[0x71]), vec![Translation::Key(sc::DELETE)]);
    }

    #[test]
    fn test_ctrl_masks() {
        let mut t = Translator::new();
        assert_eq!(feed(&mut t, &[0x14, 0x21]), vec![key(0x03)]);
        assert_eq!(feed(&mut t, &[0x54]), vec![key(0x1B)]);
        assert_eq!(feed(&mut t, &[0x12, 0x1C]), vec![key(0x01)]);
        assert_eq!(feed(&mut t, &[0xF0, 0x12, 0xF0, 0x14, 0x21]), vec![key(b'c')]);
    }

    #[test]
    fn test_extended_keys() {
        let mut t = Translator::new();
        assert_eq!(feed(&mut t, &[0xE0, 0x75, 0xE0, 0xF0, 0x75]), vec![Translation::Key(sc::CURSOR_UP)]);
        assert_eq!(feed(&mut t, &[0xE0, 0x5A]), vec![key(0x0D)]);
        assert_eq!(feed(&mut t, &[0xE0, 0x70]), vec![Translation::Key(sc::INSERT)]);
        // 右Ctrl
        assert_eq!(feed(&mut t, &[0xE0, 0x14, 0x1C]), vec![key(0x01)]);
        assert_eq!(feed(&mut t, &[0xE0, 0xF0, 0x14, 0x1C]), vec![key(b'a')]);
    }

    #[test]
    fn test_function_keys_and_unknown() {
        let mut t = Translator::new();
        assert_eq!(feed(&mut t, &[0x05, 0x83, 0x07]), vec![
            Translation::Key(sc::F1),
            Translation::Key(sc::F7),
            Translation::Key(sc::F12),
        ]);
        assert_eq!(feed(&mut t, &[0x00, 0x90, 0xFF]), vec![]);
    }

    #[test]
    fn test_led_mask() {
        let m = Modifiers::CAPS_LOCK | Modifiers::SCROLL_LOCK;
        assert_eq!(m.led_mask(), 5);
        assert_eq!(Modifiers::NUM_LOCK.led_mask(), 2);
    }
}
