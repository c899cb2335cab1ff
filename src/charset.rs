//! 文字セットとグリフテーブル
//!
//! MCM6574 相当の 7x12 フォントから、1スキャン行ぶん(9ピクセル)のビットパターンを
//! 文字コードごとに前計算する。カーソル有効版とカーソル無効版の2面を持ち、
//! DIPスイッチ5+6（文字ブランキング）が変わるたびに作り直す。

/// 1文字の高さ（スキャン行数）。先頭行は常に空白
pub const GLYPH_ROWS: usize = 13;
/// 1文字の幅（ピクセル）。右端2列は常に空白
pub const GLYPH_WIDTH: usize = 9;
/// 1行ぶんのパターンの有効ビット
pub const GLYPH_MASK: u16 = 0x1FF;

/// 7ビット文字セット（ビット6が左端、12行）
pub const FONT_7BIT: [[u8; 12]; 128] = [
    // $00: 制御文字 ^@
    [0x7F, 0x41, 0x41, 0x41, 0x41, 0x41, 0x41, 0x41, 0x7F, 0x00, 0x00, 0x00],
    // $01: 制御文字 ^A
    [0x7F, 0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00, 0x00],
    // $02: 制御文字 ^B
    [0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x7F, 0x00, 0x00, 0x00],
    // $03: 制御文字 ^C
    [0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x7F, 0x00, 0x00, 0x00],
    // $04: 制御文字 ^D
    [0x20, 0x10, 0x08, 0x04, 0x3E, 0x10, 0x08, 0x04, 0x02, 0x00, 0x00, 0x00],
    // $05: 制御文字 ^E
    [0x7F, 0x41, 0x63, 0x55, 0x49, 0x55, 0x63, 0x41, 0x7F, 0x00, 0x00, 0x00],
    // $06: 制御文字 ^F
    [0x00, 0x01, 0x02, 0x04, 0x48, 0x50, 0x60, 0x40, 0x00, 0x00, 0x00, 0x00],
    // $07: 制御文字 ^G
    [0x1C, 0x22, 0x41, 0x41, 0x41, 0x7F, 0x14, 0x14, 0x77, 0x00, 0x00, 0x00],
    // $08: 制御文字 ^H
    [0x10, 0x20, 0x7C, 0x22, 0x11, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00],
    // $09: 制御文字 ^I
    [0x00, 0x08, 0x04, 0x02, 0x7F, 0x02, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00],
    // $0A: 制御文字 ^J
    [0x7F, 0x00, 0x00, 0x00, 0x7F, 0x00, 0x00, 0x00, 0x7F, 0x00, 0x00, 0x00],
    // $0B: 制御文字 ^K
    [0x00, 0x08, 0x08, 0x08, 0x49, 0x2A, 0x1C, 0x08, 0x00, 0x00, 0x00, 0x00],
    // $0C: 制御文字 ^L
    [0x08, 0x08, 0x2A, 0x1C, 0x08, 0x49, 0x2A, 0x1C, 0x08, 0x00, 0x00, 0x00],
    // $0D: 制御文字 ^M
    [0x00, 0x08, 0x10, 0x20, 0x7F, 0x20, 0x10, 0x08, 0x00, 0x00, 0x00, 0x00],
    // $0E: 制御文字 ^N
    [0x1C, 0x22, 0x63, 0x55, 0x49, 0x55, 0x63, 0x22, 0x1C, 0x00, 0x00, 0x00],
    // $0F: 制御文字 ^O
    [0x1C, 0x22, 0x41, 0x41, 0x49, 0x41, 0x41, 0x22, 0x1C, 0x00, 0x00, 0x00],
    // $10: 制御文字 ^P
    [0x7F, 0x41, 0x41, 0x41, 0x7F, 0x41, 0x41, 0x41, 0x7F, 0x00, 0x00, 0x00],
    // $11: 制御文字 ^Q
    [0x1C, 0x2A, 0x49, 0x49, 0x4F, 0x41, 0x41, 0x22, 0x1C, 0x00, 0x00, 0x00],
    // $12: 制御文字 ^R
    [0x1C, 0x22, 0x41, 0x41, 0x4F, 0x49, 0x49, 0x2A, 0x1C, 0x00, 0x00, 0x00],
    // $13: 制御文字 ^S
    [0x1C, 0x22, 0x41, 0x41, 0x79, 0x49, 0x49, 0x2A, 0x1C, 0x00, 0x00, 0x00],
    // $14: 制御文字 ^T
    [0x1C, 0x2A, 0x49, 0x49, 0x79, 0x41, 0x41, 0x22, 0x1C, 0x00, 0x00, 0x00],
    // $15: 制御文字 ^U
    [0x00, 0x11, 0x0A, 0x04, 0x4A, 0x51, 0x60, 0x40, 0x00, 0x00, 0x00, 0x00],
    // $16: 制御文字 ^V
    [0x3E, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x63, 0x00, 0x00, 0x00],
    // $17: 制御文字 ^W
    [0x01, 0x01, 0x01, 0x01, 0x7F, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00],
    // $18: 制御文字 ^X
    [0x7F, 0x41, 0x22, 0x14, 0x08, 0x14, 0x22, 0x41, 0x7F, 0x00, 0x00, 0x00],
    // $19: 制御文字 ^Y
    [0x08, 0x08, 0x08, 0x1C, 0x1C, 0x08, 0x08, 0x08, 0x08, 0x00, 0x00, 0x00],
    // $1A: 制御文字 ^Z
    [0x3C, 0x42, 0x42, 0x40, 0x30, 0x08, 0x08, 0x00, 0x08, 0x00, 0x00, 0x00],
    // $1B: 制御文字 ^[
    [0x1C, 0x22, 0x41, 0x41, 0x7F, 0x41, 0x41, 0x22, 0x1C, 0x00, 0x00, 0x00],
    // $1C: 制御文字 ^\
    [0x7F, 0x49, 0x49, 0x49, 0x79, 0x41, 0x41, 0x41, 0x7F, 0x00, 0x00, 0x00],
    // $1D: 制御文字 ^]
    [0x7F, 0x41, 0x41, 0x41, 0x79, 0x49, 0x49, 0x49, 0x7F, 0x00, 0x00, 0x00],
    // $1E: 制御文字 ^^
    [0x7F, 0x41, 0x41, 0x41, 0x4F, 0x49, 0x49, 0x49, 0x7F, 0x00, 0x00, 0x00],
    // $1F: 制御文字 ^_
    [0x7F, 0x49, 0x49, 0x49, 0x4F, 0x41, 0x41, 0x41, 0x7F, 0x00, 0x00, 0x00],
    // $20: Space
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $21: !
    [0x08, 0x08, 0x08, 0x08, 0x08, 0x00, 0x00, 0x08, 0x08, 0x00, 0x00, 0x00],
    // $22: "
    [0x24, 0x24, 0x24, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $23: #
    [0x14, 0x14, 0x14, 0x7F, 0x14, 0x7F, 0x14, 0x14, 0x14, 0x00, 0x00, 0x00],
    // $24: $
    [0x08, 0x3F, 0x48, 0x48, 0x3E, 0x09, 0x09, 0x7E, 0x08, 0x00, 0x00, 0x00],
    // $25: %
    [0x20, 0x51, 0x22, 0x04, 0x08, 0x10, 0x22, 0x45, 0x02, 0x00, 0x00, 0x00],
    // $26: &
    [0x38, 0x44, 0x44, 0x28, 0x10, 0x29, 0x46, 0x46, 0x39, 0x00, 0x00, 0x00],
    // $27: '
    [0x0C, 0x0C, 0x08, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $28: (
    [0x04, 0x08, 0x10, 0x10, 0x10, 0x10, 0x10, 0x08, 0x04, 0x00, 0x00, 0x00],
    // $29: )
    [0x10, 0x08, 0x04, 0x04, 0x04, 0x04, 0x04, 0x08, 0x10, 0x00, 0x00, 0x00],
    // $2A: *
    [0x00, 0x08, 0x49, 0x2A, 0x1C, 0x2A, 0x49, 0x08, 0x00, 0x00, 0x00, 0x00],
    // $2B: +
    [0x00, 0x08, 0x08, 0x08, 0x7F, 0x08, 0x08, 0x08, 0x00, 0x00, 0x00, 0x00],
    // $2C: ,
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x10, 0x20, 0x00],
    // $2D: -
    [0x00, 0x00, 0x00, 0x00, 0x7F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $2E: .
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x00],
    // $2F: /
    [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x00, 0x00, 0x00, 0x00],
    // $30: 0
    [0x3E, 0x41, 0x43, 0x45, 0x49, 0x51, 0x61, 0x41, 0x3E, 0x00, 0x00, 0x00],
    // $31: 1
    [0x08, 0x18, 0x28, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00, 0x00],
    // $32: 2
    [0x3E, 0x41, 0x01, 0x02, 0x1C, 0x20, 0x40, 0x40, 0x7F, 0x00, 0x00, 0x00],
    // $33: 3
    [0x3E, 0x41, 0x01, 0x01, 0x1E, 0x01, 0x01, 0x41, 0x3E, 0x00, 0x00, 0x00],
    // $34: 4
    [0x02, 0x06, 0x0A, 0x12, 0x22, 0x42, 0x7F, 0x02, 0x02, 0x00, 0x00, 0x00],
    // $35: 5
    [0x7F, 0x40, 0x40, 0x7C, 0x02, 0x01, 0x01, 0x42, 0x3C, 0x00, 0x00, 0x00],
    // $36: 6
    [0x1E, 0x20, 0x40, 0x40, 0x7E, 0x41, 0x41, 0x41, 0x3E, 0x00, 0x00, 0x00],
    // $37: 7
    [0x7F, 0x41, 0x02, 0x04, 0x08, 0x10, 0x10, 0x10, 0x10, 0x00, 0x00, 0x00],
    // $38: 8
    [0x3E, 0x41, 0x41, 0x41, 0x3E, 0x41, 0x41, 0x41, 0x3E, 0x00, 0x00, 0x00],
    // $39: 9
    [0x3E, 0x41, 0x41, 0x41, 0x3F, 0x01, 0x01, 0x02, 0x3C, 0x00, 0x00, 0x00],
    // $3A: :
    [0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x00],
    // $3B: ;
    [0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x18, 0x18, 0x10, 0x20, 0x00],
    // $3C: <
    [0x04, 0x08, 0x10, 0x20, 0x40, 0x20, 0x10, 0x08, 0x04, 0x00, 0x00, 0x00],
    // $3D: =
    [0x00, 0x00, 0x00, 0x3E, 0x00, 0x3E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $3E: >
    [0x10, 0x08, 0x04, 0x02, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00, 0x00, 0x00],
    // $3F: ?
    [0x1E, 0x21, 0x21, 0x01, 0x06, 0x08, 0x08, 0x00, 0x08, 0x00, 0x00, 0x00],
    // $40: @
    [0x1E, 0x21, 0x4D, 0x55, 0x55, 0x5E, 0x40, 0x20, 0x1E, 0x00, 0x00, 0x00],
    // $41: A
    [0x1C, 0x22, 0x41, 0x41, 0x41, 0x7F, 0x41, 0x41, 0x41, 0x00, 0x00, 0x00],
    // $42: B
    [0x7E, 0x21, 0x21, 0x21, 0x3E, 0x21, 0x21, 0x21, 0x7E, 0x00, 0x00, 0x00],
    // $43: C
    [0x1E, 0x21, 0x40, 0x40, 0x40, 0x40, 0x40, 0x21, 0x1E, 0x00, 0x00, 0x00],
    // $44: D
    [0x7C, 0x22, 0x21, 0x21, 0x21, 0x21, 0x21, 0x22, 0x7C, 0x00, 0x00, 0x00],
    // $45: E
    [0x7F, 0x40, 0x40, 0x40, 0x78, 0x40, 0x40, 0x40, 0x7F, 0x00, 0x00, 0x00],
    // $46: F
    [0x7F, 0x40, 0x40, 0x40, 0x78, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00, 0x00],
    // $47: G
    [0x1E, 0x21, 0x40, 0x40, 0x40, 0x4F, 0x41, 0x21, 0x1E, 0x00, 0x00, 0x00],
    // $48: H
    [0x41, 0x41, 0x41, 0x41, 0x7F, 0x41, 0x41, 0x41, 0x41, 0x00, 0x00, 0x00],
    // $49: I
    [0x3E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00, 0x00],
    // $4A: J
    [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x44, 0x38, 0x00, 0x00, 0x00],
    // $4B: K
    [0x41, 0x42, 0x44, 0x48, 0x50, 0x68, 0x44, 0x42, 0x41, 0x00, 0x00, 0x00],
    // $4C: L
    [0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x7F, 0x00, 0x00, 0x00],
    // $4D: M
    [0x41, 0x63, 0x55, 0x49, 0x49, 0x41, 0x41, 0x41, 0x41, 0x00, 0x00, 0x00],
    // $4E: N
    [0x41, 0x61, 0x51, 0x49, 0x45, 0x43, 0x41, 0x41, 0x41, 0x00, 0x00, 0x00],
    // $4F: O
    [0x1C, 0x22, 0x41, 0x41, 0x41, 0x41, 0x41, 0x22, 0x1C, 0x00, 0x00, 0x00],
    // $50: P
    [0x7E, 0x41, 0x41, 0x41, 0x7E, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00, 0x00],
    // $51: Q
    [0x1C, 0x22, 0x41, 0x41, 0x41, 0x49, 0x45, 0x22, 0x1D, 0x00, 0x00, 0x00],
    // $52: R
    [0x7E, 0x41, 0x41, 0x41, 0x7E, 0x48, 0x44, 0x42, 0x41, 0x00, 0x00, 0x00],
    // $53: S
    [0x3E, 0x41, 0x40, 0x40, 0x3E, 0x01, 0x01, 0x41, 0x3E, 0x00, 0x00, 0x00],
    // $54: T
    [0x7F, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x00, 0x00, 0x00],
    // $55: U
    [0x41, 0x41, 0x41, 0x41, 0x41, 0x41, 0x41, 0x41, 0x3E, 0x00, 0x00, 0x00],
    // $56: V
    [0x41, 0x41, 0x41, 0x22, 0x22, 0x14, 0x14, 0x08, 0x08, 0x00, 0x00, 0x00],
    // $57: W
    [0x41, 0x41, 0x41, 0x41, 0x49, 0x49, 0x55, 0x63, 0x41, 0x00, 0x00, 0x00],
    // $58: X
    [0x41, 0x41, 0x22, 0x14, 0x08, 0x14, 0x22, 0x41, 0x41, 0x00, 0x00, 0x00],
    // $59: Y
    [0x41, 0x41, 0x22, 0x14, 0x08, 0x08, 0x08, 0x08, 0x08, 0x00, 0x00, 0x00],
    // $5A: Z
    [0x7F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x7F, 0x00, 0x00, 0x00],
    // $5B: [
    [0x3C, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x3C, 0x00, 0x00, 0x00],
    // $5C: \
    [0x00, 0x40, 0x20, 0x10, 0x08, 0x04, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00],
    // $5D: ]
    [0x3C, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x3C, 0x00, 0x00, 0x00],
    // $5E: ^
    [0x08, 0x14, 0x22, 0x41, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $5F: _
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7F, 0x00, 0x00, 0x00],
    // $60: `
    [0x18, 0x18, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $61: a
    [0x00, 0x00, 0x00, 0x3C, 0x02, 0x3E, 0x42, 0x42, 0x3D, 0x00, 0x00, 0x00],
    // $62: b
    [0x40, 0x40, 0x40, 0x5C, 0x62, 0x42, 0x42, 0x62, 0x5C, 0x00, 0x00, 0x00],
    // $63: c
    [0x00, 0x00, 0x00, 0x3C, 0x42, 0x40, 0x40, 0x42, 0x3C, 0x00, 0x00, 0x00],
    // $64: d
    [0x02, 0x02, 0x02, 0x3A, 0x46, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00, 0x00],
    // $65: e
    [0x00, 0x00, 0x00, 0x3C, 0x42, 0x7E, 0x40, 0x40, 0x3C, 0x00, 0x00, 0x00],
    // $66: f
    [0x0C, 0x12, 0x10, 0x10, 0x7C, 0x10, 0x10, 0x10, 0x10, 0x00, 0x00, 0x00],
    // $67: g
    [0x00, 0x00, 0x00, 0x3A, 0x46, 0x42, 0x46, 0x3A, 0x02, 0x02, 0x42, 0x3C],
    // $68: h
    [0x40, 0x40, 0x40, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00, 0x00],
    // $69: i
    [0x00, 0x08, 0x00, 0x18, 0x08, 0x08, 0x08, 0x08, 0x1C, 0x00, 0x00, 0x00],
    // $6A: j
    [0x00, 0x00, 0x00, 0x06, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x22, 0x1C],
    // $6B: k
    [0x40, 0x40, 0x40, 0x44, 0x48, 0x50, 0x68, 0x44, 0x42, 0x00, 0x00, 0x00],
    // $6C: l
    [0x18, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x1C, 0x00, 0x00, 0x00],
    // $6D: m
    [0x00, 0x00, 0x00, 0x76, 0x49, 0x49, 0x49, 0x49, 0x49, 0x00, 0x00, 0x00],
    // $6E: n
    [0x00, 0x00, 0x00, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00, 0x00],
    // $6F: o
    [0x00, 0x00, 0x00, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00, 0x00],
    // $70: p
    [0x00, 0x00, 0x00, 0x5C, 0x62, 0x42, 0x42, 0x62, 0x5C, 0x40, 0x40, 0x40],
    // $71: q
    [0x00, 0x00, 0x00, 0x3A, 0x46, 0x42, 0x42, 0x46, 0x3A, 0x02, 0x02, 0x02],
    // $72: r
    [0x00, 0x00, 0x00, 0x5C, 0x62, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00, 0x00],
    // $73: s
    [0x00, 0x00, 0x00, 0x3C, 0x42, 0x30, 0x0C, 0x42, 0x3C, 0x00, 0x00, 0x00],
    // $74: t
    [0x00, 0x10, 0x10, 0x7C, 0x10, 0x10, 0x10, 0x12, 0x0C, 0x00, 0x00, 0x00],
    // $75: u
    [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00, 0x00],
    // $76: v
    [0x00, 0x00, 0x00, 0x41, 0x41, 0x41, 0x22, 0x14, 0x08, 0x00, 0x00, 0x00],
    // $77: w
    [0x00, 0x00, 0x00, 0x41, 0x49, 0x49, 0x49, 0x49, 0x36, 0x00, 0x00, 0x00],
    // $78: x
    [0x00, 0x00, 0x00, 0x42, 0x24, 0x18, 0x18, 0x24, 0x42, 0x00, 0x00, 0x00],
    // $79: y
    [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x42, 0x46, 0x3A, 0x02, 0x42, 0x3C],
    // $7A: z
    [0x00, 0x00, 0x00, 0x7E, 0x04, 0x08, 0x10, 0x20, 0x7E, 0x00, 0x00, 0x00],
    // $7B: {
    [0x0E, 0x10, 0x10, 0x10, 0x20, 0x10, 0x10, 0x10, 0x0E, 0x00, 0x00, 0x00],
    // $7C: |
    [0x08, 0x08, 0x08, 0x00, 0x00, 0x08, 0x08, 0x08, 0x00, 0x00, 0x00, 0x00],
    // $7D: }
    [0x18, 0x04, 0x04, 0x04, 0x02, 0x04, 0x04, 0x04, 0x18, 0x00, 0x00, 0x00],
    // $7E: ~
    [0x30, 0x49, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $7F: DEL
    [0x24, 0x49, 0x12, 0x24, 0x49, 0x12, 0x24, 0x49, 0x12, 0x00, 0x00, 0x00],
];

/// どちらのグリフ面を使うか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphVariant {
    /// ビット7の立った文字を反転表示する
    Cursor,
    /// ビット7を無視する
    NoCursor,
}

/// 前計算済みグリフテーブル（13行 x 256コード x 2面）
#[derive(Clone)]
pub struct GlyphTables {
    cursor: Box<[u16; GLYPH_ROWS * 256]>,
    no_cursor: Box<[u16; GLYPH_ROWS * 256]>,
    blank_below: u8,
}

impl Default for GlyphTables {
    fn default() -> Self {
        Self::new()
    }
}

impl GlyphTables {
    /// 全文字表示（しきい値0）で初期化
    pub fn new() -> Self {
        let mut tables = GlyphTables {
            cursor: Box::new([0; GLYPH_ROWS * 256]),
            no_cursor: Box::new([0; GLYPH_ROWS * 256]),
            blank_below: 0,
        };
        tables.rebuild(0);
        tables
    }

    /// テーブルを作り直す
    ///
    /// `blank_below` 未満のコード（下位7ビットで判定）は空白になる。
    /// 128 を指定すると全文字が空白になり、カーソル面ではカーソル文字がブロック表示になる。
    pub fn rebuild(&mut self, blank_below: u8) {
        for row in 0..GLYPH_ROWS {
            for ch in 0..128usize {
                let pattern = if (ch as u16) < blank_below as u16 || row == 0 {
                    0
                } else {
                    (FONT_7BIT[ch][row - 1] as u16) << 2
                };
                let base = row * 256;
                self.no_cursor[base + ch] = pattern;
                self.no_cursor[base + ch + 128] = pattern;
                self.cursor[base + ch] = pattern;
                self.cursor[base + ch + 128] = pattern ^ GLYPH_MASK;
            }
        }
        self.blank_below = blank_below;
        log::debug!("Glyph tables rebuilt (blank below {})", blank_below);
    }

    /// 最後に適用したしきい値
    pub fn blank_below(&self) -> u8 {
        self.blank_below
    }

    /// 指定スキャン行の256コードぶんのパターン
    #[inline]
    pub fn row(&self, variant: GlyphVariant, sub_row: usize) -> &[u16] {
        let base = sub_row * 256;
        match variant {
            GlyphVariant::Cursor => &self.cursor[base..base + 256],
            GlyphVariant::NoCursor => &self.no_cursor[base..base + 256],
        }
    }

    /// 1文字1行のパターン
    #[inline]
    pub fn pattern(&self, variant: GlyphVariant, sub_row: usize, code: u8) -> u16 {
        self.row(variant, sub_row)[code as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_row_and_right_columns_blank() {
        let tables = GlyphTables::new();
        for code in 0..=255u8 {
            assert_eq!(tables.pattern(GlyphVariant::NoCursor, 0, code), 0);
            for row in 0..GLYPH_ROWS {
                assert_eq!(tables.pattern(GlyphVariant::NoCursor, row, code) & 0x3, 0);
            }
        }
    }

    #[test]
    fn test_font_shifted_into_nine_bits() {
        let tables = GlyphTables::new();
        // 'A' の1行目
        let expected = (FONT_7BIT[b'A' as usize][0] as u16) << 2;
        assert_eq!(tables.pattern(GlyphVariant::NoCursor, 1, b'A'), expected);
        assert_eq!(tables.pattern(GlyphVariant::Cursor, 1, b'A'), expected);
        assert_eq!(tables.pattern(GlyphVariant::Cursor, 1, b'A' | 0x80), expected ^ GLYPH_MASK);
        assert_eq!(tables.pattern(GlyphVariant::NoCursor, 1, b'A' | 0x80), expected);
    }

    #[test]
    fn test_blank_threshold() {
        let mut tables = GlyphTables::new();
        tables.rebuild(32);
        assert_eq!(tables.blank_below(), 32);
        for row in 0..GLYPH_ROWS {
            assert_eq!(tables.pattern(GlyphVariant::NoCursor, row, 0x0D), 0);
            // カーソル付き制御文字は全面反転
            assert_eq!(tables.pattern(GlyphVariant::Cursor, row, 0x8D), GLYPH_MASK);
        }
        assert_ne!(tables.pattern(GlyphVariant::NoCursor, 3, b'0'), 0);

        tables.rebuild(128);
        for code in 0..128u8 {
            for row in 0..GLYPH_ROWS {
                assert_eq!(tables.pattern(GlyphVariant::NoCursor, row, code), 0);
                assert_eq!(tables.pattern(GlyphVariant::Cursor, row, code | 0x80), GLYPH_MASK);
            }
        }
    }
}
