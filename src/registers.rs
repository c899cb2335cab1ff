//! 表示レジスタブロック
//!
//! キャラクタメモリ(1KB)、コントロールレジスタ、DIPスイッチレジスタを
//! 1つの連続したアドレス空間として公開する。
//!
//! | アドレス        | 内容                         |
//! |-----------------|------------------------------|
//! | `$000`-`$3FF`   | キャラクタメモリ (64桁x16行) |
//! | `$400`          | コントロールレジスタ         |
//! | `$401`          | DIPスイッチレジスタ          |

use crate::charset::GlyphTables;

/// キャラクタメモリのサイズ
pub const MEMORY_SIZE: usize = 1024;
/// 1行の桁数
pub const COLUMNS: usize = 64;
/// 画面の行数
pub const ROWS: usize = 16;

pub const CTRL_ADDRESS: u16 = 0x400;
pub const DIP_ADDRESS: u16 = 0x401;

/// 電源投入時のDIPスイッチ（通常表示、カーソル反転、全文字表示、CR/VT無効）
pub const DEFAULT_DIP: u8 = 0x36;

/// メモリバスインターフェース
pub trait MemoryBus {
    /// 1バイト読み取り
    fn read(&mut self, address: u16) -> u8;
    /// 1バイト書き込み
    fn write(&mut self, address: u16, value: u8);
}

bitflags::bitflags! {
    /// VDM-1 のDIPスイッチ（SW1がビット0）
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DipSwitches: u8 {
        /// SW1: 画面全体の反転
        const SW1 = 0b0000_0001;
        /// SW2: 表示有効（OFFで全面ブランク）
        const SW2 = 0b0000_0010;
        /// SW3: カーソルを反転表示
        const SW3 = 0b0000_0100;
        /// SW4: カーソルを点滅表示
        const SW4 = 0b0000_1000;
        /// SW5: 文字ブランキング選択
        const SW5 = 0b0001_0000;
        /// SW6: 文字ブランキング選択
        const SW6 = 0b0010_0000;
    }
}

/// SW1+SW2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenMode {
    /// 全面ブランク
    Blank,
    /// 全面反転
    Inverse,
    /// 通常表示
    Normal,
    /// 反転した状態でブランク（全面点灯）
    BlankInverse,
}

/// SW3+SW4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    /// ビット7を無視
    Plain,
    /// ビット7の文字を反転
    Inverted,
    /// 反転と通常を約0.5秒ごとに切り替え（両方ONも点滅扱い）
    Blink,
}

/// SW5+SW6
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharBlanking {
    /// 全文字ブランク
    All,
    /// 制御文字をブランク、CR/VT処理あり
    Control,
    /// 全文字表示、CR/VT処理あり
    CrVt,
    /// 全文字表示、CR/VT処理なし
    None,
}

impl DipSwitches {
    pub fn screen_mode(self) -> ScreenMode {
        match self.bits() & 0x03 {
            0 => ScreenMode::Blank,
            1 => ScreenMode::Inverse,
            2 => ScreenMode::Normal,
            _ => ScreenMode::BlankInverse,
        }
    }

    pub fn cursor_mode(self) -> CursorMode {
        match self.bits() & 0x0C {
            0x00 => CursorMode::Plain,
            0x04 => CursorMode::Inverted,
            _ => CursorMode::Blink,
        }
    }

    pub fn char_blanking(self) -> CharBlanking {
        match self.bits() & 0x30 {
            0x00 => CharBlanking::All,
            0x10 => CharBlanking::CrVt,
            0x20 => CharBlanking::Control,
            _ => CharBlanking::None,
        }
    }
}

impl CharBlanking {
    /// グリフテーブル再構築用のしきい値
    pub fn blank_below(self) -> u8 {
        match self {
            CharBlanking::All => 128,
            CharBlanking::Control => 32,
            CharBlanking::CrVt | CharBlanking::None => 0,
        }
    }

    /// CR/VT を解釈するか
    pub fn control_aware(self) -> bool {
        matches!(self, CharBlanking::Control | CharBlanking::CrVt)
    }
}

/// VDM-1 の表示状態一式
pub struct DisplayRegisters {
    memory: [u8; MEMORY_SIZE],
    ctrl: u8,
    dip: DipSwitches,
    glyphs: GlyphTables,
    /// まだ一度も set_dip されていない
    glyphs_stale: bool,
}

impl Default for DisplayRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayRegisters {
    pub fn new() -> Self {
        DisplayRegisters {
            memory: [0; MEMORY_SIZE],
            ctrl: 0,
            dip: DipSwitches::empty(),
            glyphs: GlyphTables::new(),
            glyphs_stale: true,
        }
    }

    /// キャラクタメモリ全体
    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8; MEMORY_SIZE] {
        &mut self.memory
    }

    /// 1セル書き込み（アドレスは1024で折り返す）
    #[inline]
    pub fn write_cell(&mut self, address: usize, value: u8) {
        self.memory[address % MEMORY_SIZE] = value;
    }

    #[inline]
    pub fn cell(&self, address: usize) -> u8 {
        self.memory[address % MEMORY_SIZE]
    }

    pub fn ctrl(&self) -> u8 {
        self.ctrl
    }

    pub fn set_ctrl(&mut self, value: u8) {
        self.ctrl = value;
    }

    /// 表示開始行（上位ニブル）
    pub fn first_visible_row(&self) -> usize {
        (self.ctrl >> 4) as usize
    }

    /// スクロール量（下位ニブル）
    pub fn scroll_rows(&self) -> usize {
        (self.ctrl & 0x0F) as usize
    }

    pub fn dip(&self) -> DipSwitches {
        self.dip
    }

    /// DIPスイッチ書き込み
    ///
    /// SW5/SW6 が変化した場合（および初回）はグリフテーブルをこの場で作り直す。
    pub fn set_dip(&mut self, value: u8) {
        let new = DipSwitches::from_bits_retain(value);
        let changed = (self.dip.bits() ^ new.bits()) & 0x30 != 0;
        self.dip = new;
        if changed || self.glyphs_stale {
            let threshold = new.char_blanking().blank_below();
            log::debug!("DIP switches = ${:02X}, rebuilding glyphs", value);
            self.glyphs.rebuild(threshold);
            self.glyphs_stale = false;
        }
    }

    pub fn glyphs(&self) -> &GlyphTables {
        &self.glyphs
    }
}

impl MemoryBus for DisplayRegisters {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            0x000..=0x3FF => self.memory[address as usize],
            CTRL_ADDRESS => self.ctrl,
            DIP_ADDRESS => self.dip.bits(),
            _ => 0xFF,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x000..=0x3FF => self.memory[address as usize] = value,
            CTRL_ADDRESS => self.set_ctrl(value),
            DIP_ADDRESS => self.set_dip(value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::GlyphVariant;

    #[test]
    fn test_default_dip_decodes() {
        let dip = DipSwitches::from_bits_retain(DEFAULT_DIP);
        assert_eq!(dip.screen_mode(), ScreenMode::Normal);
        assert_eq!(dip.cursor_mode(), CursorMode::Inverted);
        assert_eq!(dip.char_blanking(), CharBlanking::None);
        assert!(!dip.char_blanking().control_aware());
    }

    #[test]
    fn test_both_cursor_switches_blink() {
        assert_eq!(DipSwitches::from_bits_retain(0x0C).cursor_mode(), CursorMode::Blink);
        assert_eq!(DipSwitches::from_bits_retain(0x08).cursor_mode(), CursorMode::Blink);
    }

    #[test]
    fn test_bus_address_map() {
        let mut regs = DisplayRegisters::new();
        regs.write(0x000, 0x41);
        regs.write(0x3FF, 0x42);
        regs.write(CTRL_ADDRESS, 0x23);
        regs.write(DIP_ADDRESS, 0x36);
        regs.write(0x500, 0x99);
        assert_eq!(regs.read(0x000), 0x41);
        assert_eq!(regs.read(0x3FF), 0x42);
        assert_eq!(regs.read(CTRL_ADDRESS), 0x23);
        assert_eq!(regs.first_visible_row(), 2);
        assert_eq!(regs.scroll_rows(), 3);
        assert_eq!(regs.read(DIP_ADDRESS), 0x36);
        assert_eq!(regs.read(0x402), 0xFF);
        assert_eq!(regs.read(0x500), 0xFF);
    }

    #[test]
    fn test_dip_write_rebuilds_glyphs() {
        let mut regs = DisplayRegisters::new();
        regs.set_dip(0x00);
        assert_eq!(regs.glyphs().blank_below(), 128);
        assert_eq!(regs.glyphs().pattern(GlyphVariant::NoCursor, 4, b'H'), 0);

        // ブランキング以外のビットだけ変えても作り直さない
        regs.set_dip(0x03);
        assert_eq!(regs.glyphs().blank_below(), 128);

        regs.write(DIP_ADDRESS, 0x26);
        assert_eq!(regs.glyphs().blank_below(), 32);
        assert_ne!(regs.glyphs().pattern(GlyphVariant::NoCursor, 4, b'H'), 0);
        assert_eq!(regs.glyphs().pattern(GlyphVariant::NoCursor, 4, 0x0D), 0);
    }

    #[test]
    fn test_cells_wrap() {
        let mut regs = DisplayRegisters::new();
        regs.write_cell(1024 + 5, 7);
        assert_eq!(regs.cell(5), 7);
    }
}
