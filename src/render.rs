//! ラスタ行の描画
//!
//! 1ラスタ行は 64桁 x 9ピクセル = 576 ビット。前半32桁と後半32桁に分け、
//! それぞれ 32 ビットワード 9 個 (288 ビット) に詰める。ワード内は MSB が左端。
//! 9 は 32 を割り切れないので、各文字の置き場所は固定の配置表で決まる。

use crate::charset::{GlyphVariant, GLYPH_ROWS};
use crate::registers::{DisplayRegisters, COLUMNS, ROWS};

/// 半ラインのワード数
pub const WORDS_PER_HALF: usize = 9;
/// 半ラインの文字数
pub const CHARS_PER_HALF: usize = 32;

const VT: u8 = 11;
const CR: u8 = 13;

/// 1文字のビット配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// 先頭ビットを含むワード
    pub word: u8,
    /// 9ビットパターンの左シフト量。負なら次のワードへはみ出す
    pub shift: i8,
}

impl Placement {
    #[inline]
    fn merge(self, out: &mut [u32; WORDS_PER_HALF], pattern: u16) {
        let g = pattern as u32;
        let w = self.word as usize;
        if self.shift >= 0 {
            out[w] |= g << self.shift;
        } else {
            let spill = (-self.shift) as u32;
            out[w] |= g >> spill;
            out[w + 1] |= g << (32 - spill);
        }
    }

    /// 最後のビットを含むワード
    pub fn last_word(self) -> usize {
        self.word as usize + usize::from(self.shift < 0)
    }
}

const fn build_schedule() -> [Placement; CHARS_PER_HALF] {
    let mut table = [Placement { word: 0, shift: 0 }; CHARS_PER_HALF];
    let mut i = 0;
    while i < CHARS_PER_HALF {
        let bit = i * 9;
        table[i] = Placement {
            word: (bit / 32) as u8,
            shift: 23 - (bit % 32) as i8,
        };
        i += 1;
    }
    table
}

/// 32文字ぶんの配置表
pub const PACKING_SCHEDULE: [Placement; CHARS_PER_HALF] = build_schedule();

/// 1物理ラインぶんのピクセル（前半・後半）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineBuffer {
    halves: [[u32; WORDS_PER_HALF]; 2],
}

impl LineBuffer {
    pub fn half(&self, first: bool) -> &[u32; WORDS_PER_HALF] {
        &self.halves[usize::from(!first)]
    }

    pub fn half_mut(&mut self, first: bool) -> &mut [u32; WORDS_PER_HALF] {
        &mut self.halves[usize::from(!first)]
    }

    /// 送出順に並べた 18 ワード
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.halves.iter().flatten().copied()
    }

    /// x (0..576) のピクセルが点灯しているか
    pub fn pixel(&self, x: usize) -> bool {
        let half = &self.halves[x / (WORDS_PER_HALF * 32)];
        let bit = x % (WORDS_PER_HALF * 32);
        (half[bit / 32] >> (31 - bit % 32)) & 1 != 0
    }
}

/// フレーム開始時にレジスタから確定させる描画パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameParams {
    /// この行より上はブランク（カーテン）
    pub blank_before_row: usize,
    pub scroll_rows: usize,
    pub blank_all: bool,
    pub invert_all: bool,
    pub glyphs: GlyphVariant,
}

impl Default for FrameParams {
    fn default() -> Self {
        FrameParams {
            blank_before_row: 0,
            scroll_rows: 0,
            blank_all: false,
            invert_all: false,
            glyphs: GlyphVariant::Cursor,
        }
    }
}

/// CR/VT 処理の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrVtLatches {
    /// 前半で CR/VT が見つかった桁（行全体での位置）
    pub stopped_at: Option<usize>,
    /// 以降の行を全てブランク
    pub vblanked: bool,
}

/// 描画方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineRenderer {
    /// 制御文字を無視して常に全桁を描く
    #[default]
    Plain,
    /// CR で行の残り、VT で画面の残りをブランクにする
    ControlAware(CrVtLatches),
}

#[inline]
fn is_cr_or_vt(code: u8) -> bool {
    matches!(code & 0x7F, VT | CR)
}

impl LineRenderer {
    /// フレーム先頭で方式を選ぶ（ラッチはここでクリアされる）
    pub fn for_frame(control_aware: bool) -> Self {
        if control_aware {
            LineRenderer::ControlAware(CrVtLatches::default())
        } else {
            LineRenderer::Plain
        }
    }

    pub fn latches(&self) -> Option<CrVtLatches> {
        match self {
            LineRenderer::Plain => None,
            LineRenderer::ControlAware(latches) => Some(*latches),
        }
    }

    /// ラスタ行 `line` (0..208) の前半/後半を `out` に描く
    pub fn render_half_line(
        &mut self,
        regs: &DisplayRegisters,
        params: &FrameParams,
        line: usize,
        first: bool,
        out: &mut [u32; WORDS_PER_HALF],
    ) {
        let row = line / GLYPH_ROWS;
        let sub_row = line % GLYPH_ROWS;
        let invert = if params.invert_all { u32::MAX } else { 0 };
        let row_start = ((row + params.scroll_rows) % ROWS) * COLUMNS;
        let half_start = if first { 0 } else { CHARS_PER_HALF };

        if let LineRenderer::ControlAware(latches) = self {
            if first {
                latches.stopped_at = None;
            }
        }

        let curtain = row < params.blank_before_row || params.blank_all;
        let vblanked = matches!(*self, LineRenderer::ControlAware(CrVtLatches { vblanked: true, .. }));
        if curtain || vblanked {
            out.fill(invert);
            return;
        }

        let cells = &regs.memory()[row_start + half_start..row_start + half_start + CHARS_PER_HALF];
        let glyphs = regs.glyphs().row(params.glyphs, sub_row);
        out.fill(0);

        match self {
            LineRenderer::Plain => {
                for (&code, place) in cells.iter().zip(PACKING_SCHEDULE.iter()) {
                    place.merge(out, glyphs[code as usize]);
                }
            }
            LineRenderer::ControlAware(latches) => {
                if latches.stopped_at.is_none() {
                    for (col, (&code, place)) in cells.iter().zip(PACKING_SCHEDULE.iter()).enumerate() {
                        place.merge(out, glyphs[code as usize]);
                        if is_cr_or_vt(code) {
                            latches.stopped_at = Some(half_start + col);
                            break;
                        }
                    }
                }

                // 最終ラスタの後半を終えたら、停止位置以降に VT が残っていないか見る
                if !first && sub_row == GLYPH_ROWS - 1 {
                    if let Some(col) = latches.stopped_at {
                        let row_cells = &regs.memory()[row_start + col..row_start + COLUMNS];
                        if row_cells.iter().any(|&c| c & 0x7F == VT) {
                            log::trace!("VT on row {}, blanking rest of frame", row);
                            latches.vblanked = true;
                        }
                    }
                }
            }
        }

        if invert != 0 {
            for w in out.iter_mut() {
                *w ^= invert;
            }
        }
    }

    /// 前半と後半を続けて描く
    pub fn render_line(&mut self, regs: &DisplayRegisters, params: &FrameParams, line: usize, out: &mut LineBuffer) {
        self.render_half_line(regs, params, line, true, out.half_mut(true));
        self.render_half_line(regs, params, line, false, out.half_mut(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::GLYPH_WIDTH;

    fn registers(dip: u8) -> DisplayRegisters {
        let mut regs = DisplayRegisters::new();
        regs.set_dip(dip);
        regs.memory_mut().fill(b' ');
        regs
    }

    fn glyph_pixels(regs: &DisplayRegisters, code: u8, sub_row: usize) -> Vec<bool> {
        let g = regs.glyphs().pattern(GlyphVariant::Cursor, sub_row, code);
        (0..GLYPH_WIDTH).map(|k| (g >> (8 - k)) & 1 != 0).collect()
    }

    fn cell_pixels(line: &LineBuffer, col: usize) -> Vec<bool> {
        (0..GLYPH_WIDTH).map(|k| line.pixel(col * GLYPH_WIDTH + k)).collect()
    }

    fn row_lit(line: &LineBuffer, cols: std::ops::Range<usize>) -> bool {
        cols.flat_map(|c| c * GLYPH_WIDTH..(c + 1) * GLYPH_WIDTH).any(|x| line.pixel(x))
    }

    #[test]
    fn test_schedule_matches_known_shifts() {
        assert_eq!(PACKING_SCHEDULE[0], Placement { word: 0, shift: 23 });
        assert_eq!(PACKING_SCHEDULE[3], Placement { word: 0, shift: -4 });
        assert_eq!(PACKING_SCHEDULE[4], Placement { word: 1, shift: 19 });
        assert_eq!(PACKING_SCHEDULE[10], Placement { word: 2, shift: 15 });
        assert_eq!(PACKING_SCHEDULE[31], Placement { word: 8, shift: 0 });
        assert_eq!(PACKING_SCHEDULE[31].last_word(), 8);
    }

    #[test]
    fn test_schedule_tiles_half_line_exactly() {
        let mut bits = 0u32;
        let mut out = [0u32; WORDS_PER_HALF];
        for place in PACKING_SCHEDULE.iter() {
            let mut single = [0u32; WORDS_PER_HALF];
            place.merge(&mut single, 0x1FF);
            for (acc, w) in out.iter_mut().zip(single.iter()) {
                assert_eq!(*acc & *w, 0, "overlapping placement");
                *acc |= *w;
            }
            bits += single.iter().map(|w| w.count_ones()).sum::<u32>();
        }
        assert_eq!(bits, 288);
        assert!(out.iter().all(|&w| w == u32::MAX));
    }

    #[test]
    fn test_plain_render_places_glyphs() {
        let mut regs = registers(0x36);
        regs.write_cell(3, b'A');
        regs.write_cell(40, b'Z');
        let params = FrameParams::default();
        let mut line = LineBuffer::default();
        LineRenderer::Plain.render_line(&regs, &params, 5, &mut line);
        assert_eq!(cell_pixels(&line, 3), glyph_pixels(&regs, b'A', 5));
        assert_eq!(cell_pixels(&line, 40), glyph_pixels(&regs, b'Z', 5));
        assert!(!row_lit(&line, 0..3));
    }

    #[test]
    fn test_invert_curtain_and_scroll() {
        let mut regs = registers(0x36);
        regs.write_cell(2 * 64, b'X');
        let mut line = LineBuffer::default();

        let params = FrameParams { invert_all: true, ..FrameParams::default() };
        LineRenderer::Plain.render_line(&regs, &params, 1, &mut line);
        assert!(line.words().all(|w| w == u32::MAX));

        // 2行スクロールすると画面の先頭に X が来る
        let params = FrameParams { scroll_rows: 2, ..FrameParams::default() };
        LineRenderer::Plain.render_line(&regs, &params, 4, &mut line);
        assert_eq!(cell_pixels(&line, 0), glyph_pixels(&regs, b'X', 4));

        let params = FrameParams { scroll_rows: 2, blank_before_row: 1, ..FrameParams::default() };
        LineRenderer::Plain.render_line(&regs, &params, 4, &mut line);
        assert!(line.words().all(|w| w == 0));

        let params = FrameParams { blank_all: true, invert_all: true, ..FrameParams::default() };
        LineRenderer::Plain.render_line(&regs, &params, 4, &mut line);
        assert!(line.words().all(|w| w == u32::MAX));
    }

    #[test]
    fn test_cursor_cell_inverted() {
        let mut regs = registers(0x36);
        regs.write_cell(0, b' ' | 0x80);
        let mut line = LineBuffer::default();
        LineRenderer::Plain.render_line(&regs, &FrameParams::default(), 1, &mut line);
        assert!(cell_pixels(&line, 0).iter().all(|&p| p));

        let params = FrameParams { glyphs: GlyphVariant::NoCursor, ..FrameParams::default() };
        LineRenderer::Plain.render_line(&regs, &params, 1, &mut line);
        assert!(cell_pixels(&line, 0).iter().all(|&p| !p));
    }

    #[test]
    fn test_cr_blanks_rest_of_row_only() {
        let mut regs = registers(0x26);
        for col in 0..64 {
            regs.write_cell(64 + col, b'M');
            regs.write_cell(128 + col, b'M');
        }
        regs.write_cell(64 + 10, CR);
        let params = FrameParams::default();
        let mut renderer = LineRenderer::for_frame(true);
        let mut line = LineBuffer::default();

        // 行1 の全ラスタ
        for l in 13..26 {
            renderer.render_line(&regs, &params, l, &mut line);
            if l % 13 == 5 {
                assert!(row_lit(&line, 0..10));
                assert!(!row_lit(&line, 10..64));
            }
        }
        assert!(!renderer.latches().is_some_and(|l| l.vblanked));

        // 行2 は影響を受けない
        renderer.render_line(&regs, &params, 26 + 5, &mut line);
        assert!(row_lit(&line, 0..64));
        assert_eq!(cell_pixels(&line, 63), glyph_pixels(&regs, b'M', 5));
    }

    #[test]
    fn test_cr_in_second_half() {
        let mut regs = registers(0x26);
        for col in 0..64 {
            regs.write_cell(col, b'M');
        }
        regs.write_cell(40, CR);
        let mut renderer = LineRenderer::for_frame(true);
        let mut line = LineBuffer::default();
        renderer.render_line(&regs, &FrameParams::default(), 5, &mut line);
        assert!(row_lit(&line, 32..40));
        assert!(!row_lit(&line, 40..64));
        assert_eq!(renderer.latches().and_then(|l| l.stopped_at), Some(40));
    }

    #[test]
    fn test_vt_blanks_rest_of_frame() {
        let mut regs = registers(0x26);
        for cell in regs.memory_mut().iter_mut() {
            *cell = b'M';
        }
        // CR が先にあっても、その後ろの VT は有効
        regs.write_cell(64 + 5, CR);
        regs.write_cell(64 + 50, VT);
        let params = FrameParams::default();
        let mut renderer = LineRenderer::for_frame(true);
        let mut line = LineBuffer::default();
        for l in 0..26 {
            renderer.render_line(&regs, &params, l, &mut line);
        }
        assert!(renderer.latches().is_some_and(|l| l.vblanked));
        for l in 26..208 {
            renderer.render_line(&regs, &params, l, &mut line);
            assert!(line.words().all(|w| w == 0), "line {} not blank", l);
        }

        // 次のフレームでラッチは解除される
        let mut renderer = LineRenderer::for_frame(true);
        renderer.render_line(&regs, &params, 26 + 5, &mut line);
        assert!(row_lit(&line, 0..64));
    }

    #[test]
    fn test_plain_mode_ignores_control_codes() {
        let mut regs = registers(0x36);
        for col in 0..64 {
            regs.write_cell(col, b'M');
        }
        regs.write_cell(3, CR);
        let mut line = LineBuffer::default();
        LineRenderer::Plain.render_line(&regs, &FrameParams::default(), 5, &mut line);
        assert!(row_lit(&line, 4..64));
    }
}
