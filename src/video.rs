//! ビデオタイミングエンジン
//!
//! 物理スキャンラインごとの割り込みでライン番号を進め、同期パルスの設定、
//! 先行描画、ラインバッファの送出予約を行う。フレーム先頭（ライン0）で
//! レジスタを読み取り、そのフレームの描画パラメータを確定させる。

use crate::charset::GlyphVariant;
use crate::registers::{CursorMode, DisplayRegisters, ScreenMode};
use crate::render::{FrameParams, LineBuffer, LineRenderer};
use crate::timing::{TimingProfile, VideoStandard, DISPLAY_LINES};

/// 点滅周期（フレーム数）
pub const BLINK_PERIOD: u8 = 30;

/// 次のスキャンラインに反映させる同期信号の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncArm {
    /// コンポジット: 水平同期コンペア値の再設定（長パルス=垂直同期、短パルス=水平同期）
    HsyncCompare(u16),
    /// VGA: 垂直同期線を Low に
    VsyncLow,
    /// VGA: 垂直同期線を High に
    VsyncHigh,
}

/// 映像出力先
pub trait VideoSignal {
    /// 同期信号の設定
    fn arm_sync(&mut self, arm: SyncArm);
    /// 1ラインぶんのピクセルを送出
    fn transmit(&mut self, scanline: u16, line: &LineBuffer);
}

/// ダブルバッファの送出管理
///
/// 片方を送出中、もう片方に次のラインを描く。描画先が送出中のバッファになることはない。
#[derive(Debug, Clone)]
pub struct TransferScheduler {
    buffers: [LineBuffer; 2],
    /// 次のタイマ満了で送出されるバッファ
    armed: Option<usize>,
    composite: bool,
}

impl TransferScheduler {
    pub fn new(standard: VideoStandard) -> Self {
        TransferScheduler {
            buffers: [LineBuffer::default(); 2],
            armed: None,
            composite: standard.is_composite(),
        }
    }

    /// ライン n の送出を予約し、空いている方へ次の内容を描く
    ///
    /// コンポジットはライン n にラスタ n-1 を送出しつつラスタ n を丸ごと描く。
    /// VGA は2ラインで1ラスタを送出し、1ラインにつき半分ずつ描く。
    pub fn schedule(&mut self, n: usize, renderer: &mut LineRenderer, regs: &DisplayRegisters, params: &FrameParams) {
        let tx = if self.composite { usize::from(n & 1 == 0) } else { usize::from(n & 2 == 0) };
        let rx = tx ^ 1;
        self.armed = Some(tx);

        if self.composite {
            if n < DISPLAY_LINES {
                renderer.render_line(regs, params, n, &mut self.buffers[rx]);
            }
        } else if n < DISPLAY_LINES * 2 {
            let first = n & 1 == 0;
            renderer.render_half_line(regs, params, n >> 1, first, self.buffers[rx].half_mut(first));
        }
    }

    /// 表示開始前の先行描画（常にバッファ1へ）
    pub fn prerender(&mut self, renderer: &mut LineRenderer, regs: &DisplayRegisters, params: &FrameParams, first: bool) {
        renderer.render_half_line(regs, params, 0, first, self.buffers[0].half_mut(first));
    }

    /// 予約済みのバッファを取り出して送出を始める
    pub fn start_transfer(&mut self) -> Option<&LineBuffer> {
        self.armed.take().map(|i| &self.buffers[i])
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

/// スキャンライン割り込みで駆動されるタイミングエンジン
pub struct VideoEngine {
    profile: &'static TimingProfile,
    current_line: u16,
    params: FrameParams,
    renderer: LineRenderer,
    scheduler: TransferScheduler,
    blink_counter: u8,
    frame_count: u64,
}

impl VideoEngine {
    pub fn new(standard: VideoStandard) -> Self {
        let profile = standard.profile();
        log::info!(
            "Video timing: {} ({} lines, {} pixels/line)",
            standard.name(),
            profile.num_lines,
            profile.num_pixels
        );
        VideoEngine {
            profile,
            // 最初の割り込みでライン0になる
            current_line: profile.num_lines - 1,
            params: FrameParams::default(),
            renderer: LineRenderer::Plain,
            scheduler: TransferScheduler::new(standard),
            blink_counter: 0,
            frame_count: 0,
        }
    }

    pub fn profile(&self) -> &'static TimingProfile {
        self.profile
    }

    pub fn current_line(&self) -> u16 {
        self.current_line
    }

    pub fn params(&self) -> &FrameParams {
        &self.params
    }

    pub fn renderer(&self) -> &LineRenderer {
        &self.renderer
    }

    /// 開始したフレーム数
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// 表示領域内なら表示ライン番号
    pub fn visible_line(&self) -> Option<u16> {
        let vbp = self.profile.vbp;
        let line = self.current_line;
        (line >= vbp && line < vbp + self.profile.visible_lines()).then(|| line - vbp)
    }

    fn schedule(&mut self, line: u16, regs: &DisplayRegisters) {
        let n = (line + self.profile.render_lead() - self.profile.vbp) as usize;
        self.scheduler.schedule(n, &mut self.renderer, regs, &self.params);
    }

    /// スキャンライン割り込み
    pub fn on_scanline<S: VideoSignal + ?Sized>(&mut self, regs: &DisplayRegisters, signal: &mut S) {
        let p = self.profile;
        self.current_line += 1;
        if self.current_line == p.num_lines {
            self.current_line = 0;
        }
        let line = self.current_line;

        if line == 0 {
            self.begin_frame(regs);
        }

        let composite = p.standard.is_composite();
        if line + p.render_lead() >= p.vbp && line < p.vbp {
            // 表示開始の直前: 最初のラスタを用意しておく
            if composite {
                self.scheduler.prerender(&mut self.renderer, regs, &self.params, true);
                self.scheduler.prerender(&mut self.renderer, regs, &self.params, false);
            } else {
                let first = line + 2 == p.vbp;
                self.scheduler.prerender(&mut self.renderer, regs, &self.params, first);
            }
        } else if line == p.vbp {
            self.schedule(line, regs);
        } else if line == p.vsync_line() {
            let arm = if composite {
                SyncArm::HsyncCompare(p.hsync_start() - p.hsync)
            } else {
                SyncArm::VsyncLow
            };
            signal.arm_sync(arm);
        } else if line == 0 {
            let arm = if composite {
                SyncArm::HsyncCompare(p.hsync_start() + p.hsync)
            } else {
                SyncArm::VsyncHigh
            };
            signal.arm_sync(arm);
        }
    }

    /// 予約済みラインをハードウェアが送出する。送出したら true（転送完了割り込みを上げる）
    pub fn transmit<S: VideoSignal + ?Sized>(&mut self, signal: &mut S) -> bool {
        let line = self.current_line;
        match self.scheduler.start_transfer() {
            Some(buffer) => {
                signal.transmit(line, buffer);
                true
            }
            None => false,
        }
    }

    /// 転送完了割り込み: 表示領域が続くなら次のラインを予約
    pub fn on_transfer_complete(&mut self, regs: &DisplayRegisters) {
        let p = self.profile;
        let next = self.current_line + 1;
        if next > p.vbp && next < p.vbp + p.visible_lines() {
            self.schedule(next, regs);
        }
    }

    /// フレーム先頭でのレジスタ読み取り
    fn begin_frame(&mut self, regs: &DisplayRegisters) {
        let dip = regs.dip();
        let (blank_all, invert_all) = match dip.screen_mode() {
            ScreenMode::Blank => (true, false),
            ScreenMode::Inverse => (false, true),
            ScreenMode::Normal => (false, false),
            ScreenMode::BlankInverse => (true, true),
        };
        let glyphs = match dip.cursor_mode() {
            CursorMode::Plain => GlyphVariant::NoCursor,
            CursorMode::Inverted => GlyphVariant::Cursor,
            CursorMode::Blink => {
                self.blink_counter = (self.blink_counter + 1) % BLINK_PERIOD;
                if self.blink_counter < BLINK_PERIOD / 2 {
                    GlyphVariant::Cursor
                } else {
                    GlyphVariant::NoCursor
                }
            }
        };
        self.params = FrameParams {
            blank_before_row: regs.first_visible_row(),
            scroll_rows: regs.scroll_rows(),
            blank_all,
            invert_all,
            glyphs,
        };
        self.renderer = LineRenderer::for_frame(dip.char_blanking().control_aware());
        self.frame_count += 1;
    }
}
