//! ローカルコンソール（ホスト未接続時のテストモード）
//!
//! キーボード入力をそのまま画面に書き、ファンクションキーでコントロール
//! レジスタと DIP スイッチを操作する。カーソルはセルのビット7を反転して示す。

use crate::keyboard::scancodes as key;
use crate::registers::{DisplayRegisters, COLUMNS, ROWS};

const BANNER_ROW: usize = 6;
const BANNER_COL: usize = 12;
const BANNER: [&str; 4] = [
    "                                        ",
    "  Processor Technology VDM-1 Emulator   ",
    "        64 x 16 video terminal          ",
    "                                        ",
];

#[derive(Debug, Default, Clone)]
pub struct LocalConsole {
    row: usize,
    col: usize,
    /// 最初のキー入力まではカーソルを出さない
    cursor_shown: bool,
}

impl LocalConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn cursor_shown(&self) -> bool {
        self.cursor_shown
    }

    /// 起動画面を描く
    ///
    /// 全セルを文字コードの連番で埋め、中央にバナーを置く。
    pub fn splash(&mut self, regs: &mut DisplayRegisters) {
        self.show_cursor(regs, false);
        for (i, cell) in regs.memory_mut().iter_mut().enumerate() {
            *cell = !(i as u8);
        }
        for address in [0x00, 0x74, 0xF2] {
            regs.write_cell(address, b' ');
        }
        for (i, line) in BANNER.iter().enumerate() {
            self.move_cursor(regs, BANNER_ROW + i, BANNER_COL);
            for b in line.bytes() {
                self.print_char(regs, b as u16);
            }
        }
        self.move_cursor(regs, 0, 0);
    }

    /// キー1つを処理する（カーソルを表示してから）
    pub fn handle_key(&mut self, regs: &mut DisplayRegisters, code: u16) {
        self.show_cursor(regs, true);
        self.print_char(regs, code);
    }

    fn index(row: usize, col: usize) -> usize {
        row * COLUMNS + col
    }

    fn at_cursor(&self, row: usize, col: usize) -> bool {
        self.cursor_shown && row == self.row && col == self.col
    }

    fn set_char(&self, regs: &mut DisplayRegisters, row: usize, col: usize, ch: u8) {
        let ch = if self.at_cursor(row, col) { ch ^ 0x80 } else { ch };
        regs.write_cell(Self::index(row, col), ch);
    }

    fn get_char(&self, regs: &DisplayRegisters, row: usize, col: usize) -> u8 {
        if col >= COLUMNS {
            return b' ';
        }
        let ch = regs.cell(Self::index(row, col));
        if self.at_cursor(row, col) {
            ch ^ 0x80
        } else {
            ch
        }
    }

    fn toggle_cursor_cell(&self, regs: &mut DisplayRegisters) {
        let address = Self::index(self.row, self.col);
        regs.write_cell(address, regs.cell(address) ^ 0x80);
    }

    fn show_cursor(&mut self, regs: &mut DisplayRegisters, show: bool) {
        if show != self.cursor_shown {
            self.toggle_cursor_cell(regs);
        }
        self.cursor_shown = show;
    }

    /// 行・桁は画面サイズで折り返す
    fn move_cursor(&mut self, regs: &mut DisplayRegisters, row: usize, col: usize) {
        if self.cursor_shown {
            self.toggle_cursor_cell(regs);
        }
        self.row = row % ROWS;
        self.col = col % COLUMNS;
        if self.cursor_shown {
            self.toggle_cursor_cell(regs);
        }
    }

    /// 桁方向に進める。画面の先頭/末尾で止まる
    fn advance_cursor(&mut self, regs: &mut DisplayRegisters, delta: isize) {
        let pos = (self.row * COLUMNS + self.col) as isize + delta;
        let last = (ROWS * COLUMNS - 1) as isize;
        let pos = pos.clamp(0, last) as usize;
        self.move_cursor(regs, pos / COLUMNS, pos % COLUMNS);
    }

    fn delete_at_cursor(&mut self, regs: &mut DisplayRegisters) {
        let row = self.row;
        for col in self.col..COLUMNS {
            let next = self.get_char(regs, row, col + 1);
            self.set_char(regs, row, col, next);
        }
        self.set_char(regs, row, COLUMNS - 1, b' ');
    }

    fn insert_at_cursor(&mut self, regs: &mut DisplayRegisters) {
        let row = self.row;
        for col in (self.col + 1..COLUMNS).rev() {
            let prev = self.get_char(regs, row, col - 1);
            self.set_char(regs, row, col, prev);
        }
        self.set_char(regs, row, self.col, b' ');
    }

    /// 行頭: 最初の非空白へ、既にそこなら0桁目へ
    fn home(&mut self, regs: &mut DisplayRegisters) {
        let row = self.row;
        let first = (0..COLUMNS).find(|&c| self.get_char(regs, row, c) != b' ').unwrap_or(0);
        let col = if first == self.col { 0 } else { first };
        self.move_cursor(regs, row, col);
    }

    /// 行末: 最後の非空白の次へ、既にそこなら63桁目へ
    fn end(&mut self, regs: &mut DisplayRegisters) {
        let row = self.row;
        let last = match (0..COLUMNS).rev().find(|&c| self.get_char(regs, row, c) != b' ') {
            Some(c) => (c + 1).min(COLUMNS - 1),
            None => COLUMNS - 1,
        };
        let col = if last == self.col { COLUMNS - 1 } else { last };
        self.move_cursor(regs, row, col);
    }

    fn clear_screen(&mut self, regs: &mut DisplayRegisters) {
        self.show_cursor(regs, false);
        regs.memory_mut().fill(b' ');
        self.move_cursor(regs, 0, 0);
        self.show_cursor(regs, true);
    }

    fn toggle_dip(regs: &mut DisplayRegisters, switch: u16) {
        let mask = 1u8 << (switch - 1);
        let dip = regs.dip().bits();
        regs.set_dip(dip ^ mask);
        log::debug!("Console toggled DIP switch {} -> ${:02X}", switch, regs.dip().bits());
    }

    fn print_char(&mut self, regs: &mut DisplayRegisters, code: u16) {
        let ctrl = regs.ctrl();
        match code {
            0x08 | key::DELETE => {
                if code == 0x08 {
                    self.advance_cursor(regs, -1);
                }
                self.delete_at_cursor(regs);
            }
            0x09 => {
                if self.col < COLUMNS - 1 {
                    self.advance_cursor(regs, 8 - (self.col & 7) as isize);
                }
            }
            0x0A => self.move_cursor(regs, self.row + 1, self.col),
            0x0D => self.move_cursor(regs, self.row + 1, 0),
            key::INSERT => self.insert_at_cursor(regs),
            key::HOME => self.home(regs),
            key::END => self.end(regs),
            key::CURSOR_UP => self.move_cursor(regs, self.row + ROWS - 1, self.col),
            key::CURSOR_DOWN => self.move_cursor(regs, self.row + 1, self.col),
            key::CURSOR_LEFT => self.advance_cursor(regs, -1),
            key::CURSOR_RIGHT => self.advance_cursor(regs, 1),
            key::PAGE_UP => self.move_cursor(regs, 0, self.col),
            key::PAGE_DOWN => self.move_cursor(regs, ROWS - 1, self.col),
            key::PRINT_SCREEN => self.clear_screen(regs),
            // 表示開始行（カーテン）
            key::F1 => regs.set_ctrl(ctrl.wrapping_sub(0x10)),
            key::F2 => regs.set_ctrl(ctrl.wrapping_add(0x10)),
            // スクロール
            key::F3 => regs.set_ctrl((ctrl & 0xF0) | (ctrl.wrapping_sub(1) & 0x0F)),
            key::F4 => regs.set_ctrl((ctrl & 0xF0) | (ctrl.wrapping_add(1) & 0x0F)),
            key::F5..=key::F10 => Self::toggle_dip(regs, code - key::F5 + 1),
            key::F11 => self.set_char(regs, self.row, self.col, 0x0D),
            key::F12 => self.set_char(regs, self.row, self.col, 0x0B),
            c if c < 0x100 => {
                self.set_char(regs, self.row, self.col, c as u8);
                self.advance_cursor(regs, 1);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_text(regs: &DisplayRegisters, row: usize) -> String {
        regs.memory()[row * COLUMNS..(row + 1) * COLUMNS]
            .iter()
            .map(|&b| (b & 0x7F) as char)
            .collect()
    }

    fn blank() -> (DisplayRegisters, LocalConsole) {
        let mut regs = DisplayRegisters::new();
        regs.set_dip(0x36);
        regs.memory_mut().fill(b' ');
        (regs, LocalConsole::new())
    }

    fn type_str(con: &mut LocalConsole, regs: &mut DisplayRegisters, s: &str) {
        for b in s.bytes() {
            con.handle_key(regs, b as u16);
        }
    }

    #[test]
    fn test_splash_screen() {
        let mut regs = DisplayRegisters::new();
        let mut con = LocalConsole::new();
        con.splash(&mut regs);
        assert_eq!(regs.cell(0), b' ');
        assert_eq!(regs.cell(1), 0xFE);
        assert_eq!(regs.cell(0x74), b' ');
        assert!(row_text(&regs, 7).contains("Processor Technology VDM-1"));
        assert!(!con.cursor_shown());
        assert_eq!(con.cursor(), (0, 0));
    }

    #[test]
    fn test_typing_shows_cursor() {
        let (mut regs, mut con) = blank();
        type_str(&mut con, &mut regs, "Hi");
        assert_eq!(regs.cell(0), b'H');
        assert_eq!(regs.cell(1), b'i');
        assert_eq!(regs.cell(2), b' ' | 0x80);
        assert_eq!(con.cursor(), (0, 2));
    }

    #[test]
    fn test_backspace_and_delete_shift_row() {
        let (mut regs, mut con) = blank();
        type_str(&mut con, &mut regs, "abcd");
        con.handle_key(&mut regs, 0x08);
        assert!(row_text(&regs, 0).starts_with("abc "));
        con.handle_key(&mut regs, key::HOME);
        con.handle_key(&mut regs, key::DELETE);
        assert!(row_text(&regs, 0).starts_with("bc  "));
        con.handle_key(&mut regs, key::INSERT);
        assert!(row_text(&regs, 0).starts_with(" bc "));
    }

    #[test]
    fn test_tab_cr_lf() {
        let (mut regs, mut con) = blank();
        type_str(&mut con, &mut regs, "ab\t");
        assert_eq!(con.cursor(), (0, 8));
        con.handle_key(&mut regs, 0x0A);
        assert_eq!(con.cursor(), (1, 8));
        con.handle_key(&mut regs, 0x0D);
        assert_eq!(con.cursor(), (2, 0));
    }

    #[test]
    fn test_cursor_keys_wrap_and_clamp() {
        let (mut regs, mut con) = blank();
        con.handle_key(&mut regs, key::CURSOR_LEFT);
        assert_eq!(con.cursor(), (0, 0));
        con.handle_key(&mut regs, key::CURSOR_UP);
        assert_eq!(con.cursor(), (15, 0));
        con.handle_key(&mut regs, key::CURSOR_LEFT);
        assert_eq!(con.cursor(), (14, 63));
        con.handle_key(&mut regs, key::PAGE_DOWN);
        con.handle_key(&mut regs, key::END);
        assert_eq!(con.cursor(), (15, 63));
        con.handle_key(&mut regs, key::CURSOR_RIGHT);
        assert_eq!(con.cursor(), (15, 63));
        // カーソル表示は常に1セルだけ
        assert_eq!(regs.memory().iter().filter(|&&b| b & 0x80 != 0).count(), 1);
    }

    #[test]
    fn test_home_end_smart_jump() {
        let (mut regs, mut con) = blank();
        type_str(&mut con, &mut regs, "    word");
        con.handle_key(&mut regs, key::HOME);
        assert_eq!(con.cursor(), (0, 4));
        con.handle_key(&mut regs, key::HOME);
        assert_eq!(con.cursor(), (0, 0));
        con.handle_key(&mut regs, key::END);
        assert_eq!(con.cursor(), (0, 8));
        con.handle_key(&mut regs, key::END);
        assert_eq!(con.cursor(), (0, 63));
    }

    #[test]
    fn test_function_keys_drive_registers() {
        let (mut regs, mut con) = blank();
        con.handle_key(&mut regs, key::F2);
        con.handle_key(&mut regs, key::F4);
        con.handle_key(&mut regs, key::F4);
        assert_eq!(regs.ctrl(), 0x12);
        con.handle_key(&mut regs, key::F3);
        con.handle_key(&mut regs, key::F1);
        assert_eq!(regs.ctrl(), 0x01);
        con.handle_key(&mut regs, key::F3);
        con.handle_key(&mut regs, key::F3);
        assert_eq!(regs.ctrl(), 0x0F);

        con.handle_key(&mut regs, key::F5);
        assert_eq!(regs.dip().bits(), 0x37);
        con.handle_key(&mut regs, key::F9);
        assert_eq!(regs.dip().bits(), 0x27);
        assert_eq!(regs.glyphs().blank_below(), 32);
    }

    #[test]
    fn test_control_markers_and_clear() {
        let (mut regs, mut con) = blank();
        type_str(&mut con, &mut regs, "x");
        con.handle_key(&mut regs, key::F11);
        assert_eq!(regs.cell(1), 0x0D | 0x80);
        con.handle_key(&mut regs, key::F12);
        assert_eq!(regs.cell(1), 0x0B | 0x80);
        con.handle_key(&mut regs, key::PRINT_SCREEN);
        assert_eq!(con.cursor(), (0, 0));
        assert_eq!(regs.cell(0), b' ' | 0x80);
        assert!(regs.memory()[1..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn test_special_keys_are_not_printed() {
        let (mut regs, mut con) = blank();
        con.handle_key(&mut regs, 0x0110 + 0x20);
        assert_eq!(con.cursor(), (0, 0));
    }
}
