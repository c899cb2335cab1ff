//! PS/2 スキャンコード（セット2）とキーコード
//!
//! キーコードは 16 ビット。0x00-0xFF は ASCII とその拡張、
//! 0x100 以降はホストへ送らない特殊キー。

/// 変換結果なし
pub const NONE: u16 = 0xFFFF;

pub const F1: u16 = 0x0101;
pub const F2: u16 = 0x0102;
pub const F3: u16 = 0x0103;
pub const F4: u16 = 0x0104;
pub const F5: u16 = 0x0105;
pub const F6: u16 = 0x0106;
pub const F7: u16 = 0x0107;
pub const F8: u16 = 0x0108;
pub const F9: u16 = 0x0109;
pub const F10: u16 = 0x010A;
pub const F11: u16 = 0x010B;
pub const F12: u16 = 0x010C;

pub const HOME: u16 = 0x0110;
pub const END: u16 = 0x0111;
pub const CURSOR_UP: u16 = 0x0112;
pub const CURSOR_DOWN: u16 = 0x0113;
pub const CURSOR_LEFT: u16 = 0x0114;
pub const CURSOR_RIGHT: u16 = 0x0115;
pub const PAGE_UP: u16 = 0x0116;
pub const PAGE_DOWN: u16 = 0x0117;
/// SOLOS キーボードの MODE SELECT として働く
pub const INSERT: u16 = 0x0080;
pub const DELETE: u16 = 0x007F;
pub const PRINT_SCREEN: u16 = 0x011A;

// 内部専用（呼び出し側には返らない）
pub(crate) const SHIFT_L: u16 = 0xFE00;
pub(crate) const SHIFT_R: u16 = 0xFE01;
pub(crate) const CTRL_L: u16 = 0xFE02;
pub(crate) const CTRL_R: u16 = 0xFE03;
pub(crate) const ALT_L: u16 = 0xFE04;
pub(crate) const ALT_R: u16 = 0xFE05;
pub(crate) const CAPS_LOCK: u16 = 0xFE06;
pub(crate) const NUM_LOCK: u16 = 0xFE07;
pub(crate) const SCROLL_LOCK: u16 = 0xFE08;

pub(crate) const KP0: u16 = 0xFF00;
pub(crate) const KP1: u16 = 0xFF01;
pub(crate) const KP2: u16 = 0xFF02;
pub(crate) const KP3: u16 = 0xFF03;
pub(crate) const KP4: u16 = 0xFF04;
pub(crate) const KP5: u16 = 0xFF05;
pub(crate) const KP6: u16 = 0xFF06;
pub(crate) const KP7: u16 = 0xFF07;
pub(crate) const KP8: u16 = 0xFF08;
pub(crate) const KP9: u16 = 0xFF09;
pub(crate) const KPD: u16 = 0xFF0A;

/// 拡張プレフィックス
pub const PREFIX_EXTENDED: u8 = 0xE0;
/// ブレーク（キーを離した）プレフィックス
pub const PREFIX_BREAK: u8 = 0xF0;
/// 自己診断完了（キーボード接続時に送られる）
pub const SELF_TEST_PASSED: u8 = 0xAA;
pub const ACK: u8 = 0xFA;
pub const RESEND: u8 = 0xFE;

/// コマンド: LED 設定
pub const CMD_SET_LEDS: u8 = 0xED;
/// コマンド: リピートレート設定
pub const CMD_SET_TYPEMATIC: u8 = 0xF3;

const fn ch(b: u8) -> u16 {
    b as u16
}

/// 変換表のサイズ
pub const TABLE_SIZE: usize = 136;

/// シフトなし
pub const PLAIN: [u16; TABLE_SIZE] = [
    NONE, F9, NONE, F5, F3, F1, F2, F12, // $00-$07
    NONE, F10, F8, F6, F4, 0x09, ch(b'`'), NONE, // $08-$0F
    NONE, ALT_L, SHIFT_L, NONE, CTRL_L, ch(b'q'), ch(b'1'), NONE, // $10-$17
    NONE, NONE, ch(b'z'), ch(b's'), ch(b'a'), ch(b'w'), ch(b'2'), NONE, // $18-$1F
    NONE, ch(b'c'), ch(b'x'), ch(b'd'), ch(b'e'), ch(b'4'), ch(b'3'), NONE, // $20-$27
    NONE, ch(b' '), ch(b'v'), ch(b'f'), ch(b't'), ch(b'r'), ch(b'5'), NONE, // $28-$2F
    NONE, ch(b'n'), ch(b'b'), ch(b'h'), ch(b'g'), ch(b'y'), ch(b'6'), NONE, // $30-$37
    NONE, NONE, ch(b'm'), ch(b'j'), ch(b'u'), ch(b'7'), ch(b'8'), NONE, // $38-$3F
    NONE, ch(b','), ch(b'k'), ch(b'i'), ch(b'o'), ch(b'0'), ch(b'9'), NONE, // $40-$47
    NONE, ch(b'.'), ch(b'/'), ch(b'l'), ch(b';'), ch(b'p'), ch(b'-'), NONE, // $48-$4F
    NONE, NONE, ch(b'\''), NONE, ch(b'['), ch(b'='), NONE, NONE, // $50-$57
    CAPS_LOCK, SHIFT_R, 0x0D, ch(b']'), NONE, ch(b'\\'), NONE, NONE, // $58-$5F
    NONE, NONE, NONE, NONE, NONE, NONE, 0x08, NONE, // $60-$67
    NONE, KP1, NONE, KP4, KP7, NONE, NONE, NONE, // $68-$6F
    KP0, KPD, KP2, KP5, KP6, KP8, 0x1B, NUM_LOCK, // $70-$77
    F11, ch(b'+'), KP3, ch(b'-'), ch(b'*'), KP9, SCROLL_LOCK, NONE, // $78-$7F
    NONE, NONE, NONE, F7, NONE, NONE, NONE, NONE, // $80-$87
];

/// シフトあり
pub const SHIFTED: [u16; TABLE_SIZE] = [
    NONE, F9, NONE, F5, F3, F1, F2, F12, // $00-$07
    NONE, F10, F8, F6, F4, 0x09, ch(b'~'), NONE, // $08-$0F
    NONE, ALT_L, SHIFT_L, NONE, CTRL_L, ch(b'Q'), ch(b'!'), NONE, // $10-$17
    NONE, NONE, ch(b'Z'), ch(b'S'), ch(b'A'), ch(b'W'), ch(b'@'), NONE, // $18-$1F
    NONE, ch(b'C'), ch(b'X'), ch(b'D'), ch(b'E'), ch(b'$'), ch(b'#'), NONE, // $20-$27
    NONE, ch(b' '), ch(b'V'), ch(b'F'), ch(b'T'), ch(b'R'), ch(b'%'), NONE, // $28-$2F
    NONE, ch(b'N'), ch(b'B'), ch(b'H'), ch(b'G'), ch(b'Y'), ch(b'^'), NONE, // $30-$37
    NONE, NONE, ch(b'M'), ch(b'J'), ch(b'U'), ch(b'&'), ch(b'*'), NONE, // $38-$3F
    NONE, ch(b'<'), ch(b'K'), ch(b'I'), ch(b'O'), ch(b')'), ch(b'('), NONE, // $40-$47
    NONE, ch(b'>'), ch(b'?'), ch(b'L'), ch(b':'), ch(b'P'), ch(b'_'), NONE, // $48-$4F
    NONE, NONE, ch(b'"'), NONE, ch(b'{'), ch(b'+'), NONE, NONE, // $50-$57
    CAPS_LOCK, SHIFT_R, 0x0D, ch(b'}'), NONE, ch(b'|'), NONE, NONE, // $58-$5F
    NONE, NONE, NONE, NONE, NONE, NONE, 0x08, NONE, // $60-$67
    NONE, KP1, NONE, KP4, KP7, NONE, NONE, NONE, // $68-$6F
    KP0, KPD, KP2, KP5, KP6, KP8, 0x1B, NUM_LOCK, // $70-$77
    F11, ch(b'+'), KP3, ch(b'-'), ch(b'*'), KP9, SCROLL_LOCK, NONE, // $78-$7F
    NONE, NONE, NONE, F7, NONE, NONE, NONE, NONE, // $80-$87
];

/// E0 に続くスキャンコード
pub fn extended(code: u8) -> u16 {
    match code {
        0x11 => ALT_R,
        0x14 => CTRL_R,
        0x4A => ch(b'/'),
        0x5A => 0x0D,
        0x69 => END,
        0x6B => CURSOR_LEFT,
        0x6C => HOME,
        0x70 => INSERT,
        0x71 => DELETE,
        0x72 => CURSOR_DOWN,
        0x74 => CURSOR_RIGHT,
        0x75 => CURSOR_UP,
        0x7A => PAGE_DOWN,
        0x7C => PRINT_SCREEN,
        0x7D => PAGE_UP,
        _ => NONE,
    }
}

/// テンキーの変換（NumLock ON で数字、OFF で編集キー）
pub fn keypad(code: u16, num_lock: bool) -> u16 {
    let (digit, edit) = match code {
        KP0 => (b'0', INSERT),
        KP1 => (b'1', END),
        KP2 => (b'2', CURSOR_DOWN),
        KP3 => (b'3', PAGE_DOWN),
        KP4 => (b'4', CURSOR_LEFT),
        KP5 => (b'5', NONE),
        KP6 => (b'6', CURSOR_RIGHT),
        KP7 => (b'7', HOME),
        KP8 => (b'8', CURSOR_UP),
        KP9 => (b'9', PAGE_UP),
        KPD => (b'.', DELETE),
        other => return other,
    };
    if num_lock {
        ch(digit)
    } else {
        edit
    }
}
