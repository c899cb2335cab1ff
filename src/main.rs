//! VDM1RS - Processor Technology VDM-1 Emulator in Rust
//!
//! VDM1RS は Altair シミュレータ用の VDM-1 ビデオ端末エミュレータです。
//!
//! # 機能
//! - 64x16 キャラクタ表示（VGA / NTSC / PAL タイミング）
//! - ホストコマンドのデコード（TCP 接続またはバイト列の再生）
//! - キーボード入力（ホストのキーをスキャンコードに変換して送る）
//! - ホスト未接続時のローカルコンソール
//!
//! # 使用方法
//! ```
//! vdm1rs --listen 127.0.0.1:8800
//! vdm1rs --headless --replay session.bin --frames 120 --screenshot out.png
//! ```

use vdm1rs::capture::{FrameCapture, DISPLAY_HEIGHT};
use vdm1rs::config::{Config, VideoSelect};
use vdm1rs::keyboard::sim::SimulatedKeyboard;
use vdm1rs::terminal::Terminal;
use vdm1rs::timing::DISPLAY_PIXELS;
use vdm1rs::transport::{ReplayTransport, TcpTransport, Transport};

use clap::Parser;
use minifb::{Key, Scale, Window, WindowOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// VDM1RS - Processor Technology VDM-1 Emulator in Rust
#[derive(Parser, Debug)]
#[command(name = "vdm1rs")]
#[command(author = "VDM1RS Project")]
#[command(version = "0.2.0")]
#[command(about = "VDM1RS - Processor Technology VDM-1 Emulator in Rust", long_about = None)]
struct Args {
    /// 設定ファイル
    #[arg(short, long)]
    config: Option<String>,

    /// 映像規格 (auto, vga, ntsc, pal)
    #[arg(long)]
    video: Option<String>,

    /// 起動時の DIP スイッチ（16進）
    #[arg(long)]
    dip: Option<String>,

    /// ホストを TCP で待ち受ける
    #[arg(short, long)]
    listen: Option<String>,

    /// 記録済みのホスト出力を再生
    #[arg(short, long)]
    replay: Option<String>,

    /// ヘッドレスモード（ウィンドウなし）
    #[arg(long)]
    headless: bool,

    /// 実行するフレーム数（ヘッドレスモード用）
    #[arg(long, default_value = "60")]
    frames: u64,

    /// 終了時にスクリーンショットを保存（ヘッドレスモード用）
    #[arg(long)]
    screenshot: Option<String>,

    /// ウィンドウ倍率 (1, 2, 4)
    #[arg(long)]
    scale: Option<usize>,

    /// 詳細ログ
    #[arg(short, long)]
    verbose: bool,
}

fn parse_hex(s: &str) -> Option<u8> {
    let s = s.trim_start_matches("0x").trim_start_matches('$');
    u8::from_str_radix(s, 16).ok()
}

/// ホストのキーをセット2スキャンコード（拡張プレフィックス有無, コード）に変換
fn key_to_scancode(key: Key) -> Option<(bool, u8)> {
    let code = match key {
        Key::A => 0x1C, Key::B => 0x32, Key::C => 0x21, Key::D => 0x23,
        Key::E => 0x24, Key::F => 0x2B, Key::G => 0x34, Key::H => 0x33,
        Key::I => 0x43, Key::J => 0x3B, Key::K => 0x42, Key::L => 0x4B,
        Key::M => 0x3A, Key::N => 0x31, Key::O => 0x44, Key::P => 0x4D,
        Key::Q => 0x15, Key::R => 0x2D, Key::S => 0x1B, Key::T => 0x2C,
        Key::U => 0x3C, Key::V => 0x2A, Key::W => 0x1D, Key::X => 0x22,
        Key::Y => 0x35, Key::Z => 0x1A,

        Key::Key0 => 0x45, Key::Key1 => 0x16, Key::Key2 => 0x1E, Key::Key3 => 0x26,
        Key::Key4 => 0x25, Key::Key5 => 0x2E, Key::Key6 => 0x36, Key::Key7 => 0x3D,
        Key::Key8 => 0x3E, Key::Key9 => 0x46,

        Key::Backquote => 0x0E, Key::Minus => 0x4E, Key::Equal => 0x55,
        Key::Backslash => 0x5D, Key::LeftBracket => 0x54, Key::RightBracket => 0x5B,
        Key::Semicolon => 0x4C, Key::Apostrophe => 0x52, Key::Comma => 0x41,
        Key::Period => 0x49, Key::Slash => 0x4A,

        Key::Space => 0x29, Key::Tab => 0x0D, Key::Backspace => 0x66,
        Key::Enter => 0x5A, Key::Escape => 0x76, Key::CapsLock => 0x58,
        Key::LeftShift => 0x12, Key::RightShift => 0x59, Key::LeftCtrl => 0x14,
        Key::LeftAlt => 0x11, Key::NumLock => 0x77, Key::ScrollLock => 0x7E,

        Key::F1 => 0x05, Key::F2 => 0x06, Key::F3 => 0x04, Key::F4 => 0x0C,
        Key::F5 => 0x03, Key::F6 => 0x0B, Key::F7 => 0x83, Key::F8 => 0x0A,
        Key::F9 => 0x01, Key::F10 => 0x09, Key::F11 => 0x78, Key::F12 => 0x07,

        Key::NumPad0 => 0x70, Key::NumPad1 => 0x69, Key::NumPad2 => 0x72,
        Key::NumPad3 => 0x7A, Key::NumPad4 => 0x6B, Key::NumPad5 => 0x73,
        Key::NumPad6 => 0x74, Key::NumPad7 => 0x6C, Key::NumPad8 => 0x75,
        Key::NumPad9 => 0x7D, Key::NumPadDot => 0x71, Key::NumPadPlus => 0x79,
        Key::NumPadMinus => 0x7B, Key::NumPadAsterisk => 0x7C,

        // 拡張キー
        _ => {
            let code = match key {
                Key::RightCtrl => 0x14,
                Key::RightAlt => 0x11,
                Key::Insert => 0x70,
                Key::Delete => 0x71,
                Key::Home => 0x6C,
                Key::End => 0x69,
                Key::PageUp => 0x7D,
                Key::PageDown => 0x7A,
                Key::Up => 0x75,
                Key::Down => 0x72,
                Key::Left => 0x6B,
                Key::Right => 0x74,
                Key::NumPadSlash => 0x4A,
                Key::NumPadEnter => 0x5A,
                _ => return None,
            };
            return Some((true, code));
        }
    };
    Some((false, code))
}

/// 押下/解放をスキャンコード列にする
fn scancode_bytes(extended: bool, code: u8, pressed: bool, out: &mut Vec<u8>) {
    if extended {
        out.push(0xE0);
    }
    if !pressed {
        out.push(0xF0);
    }
    out.push(code);
}

fn open_transport(args: &Args, config: &Config) -> Option<Box<dyn Transport>> {
    if let Some(path) = &args.replay {
        match ReplayTransport::from_file(Path::new(path)) {
            Ok(t) => return Some(Box::new(t)),
            Err(e) => {
                eprintln!("{}", e);
                return None;
            }
        }
    }
    let addr = args.listen.as_ref().or(config.listen.as_ref())?;
    match TcpTransport::listen(addr.as_str()) {
        Ok(t) => Some(Box::new(t)),
        Err(e) => {
            eprintln!("Failed to listen on {}: {}", addr, e);
            None
        }
    }
}

fn main() {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }));
    logger.init();

    let config_path = args.config.as_ref().map(PathBuf::from).unwrap_or_else(vdm1rs::config::get_config_path);
    let mut config = Config::load_from(&config_path);

    // コマンドライン指定を優先
    if let Some(video) = &args.video {
        match VideoSelect::parse(video) {
            Some(v) => config.video = v,
            None => eprintln!("Unknown video standard '{}', using {:?}", video, config.video),
        }
    }
    if let Some(dip) = &args.dip {
        match parse_hex(dip) {
            Some(v) => config.initial_dip = v,
            None => eprintln!("Invalid DIP value '{}'", dip),
        }
    }
    if let Some(scale) = args.scale {
        config.scale = scale;
    }

    let standard = config.video_standard();
    let mut terminal = Terminal::new(standard, config.initial_dip, config.initial_ctrl);
    let mut capture = FrameCapture::new(standard).with_colors(config.foreground, config.background);
    let mut keyboard = SimulatedKeyboard::new();
    terminal.init_keyboard(&mut keyboard, config.keyboard_repeat_rate);

    let mut transport = open_transport(&args, &config);

    if args.headless {
        run_headless(&mut terminal, &mut capture, &mut keyboard, &mut transport, args.frames, args.screenshot.as_deref());
    } else {
        config.ensure_directories();
        run_with_window(&mut terminal, &mut capture, &mut keyboard, &mut transport, &config);
    }
}

fn pump(terminal: &mut Terminal, transport: &mut Option<Box<dyn Transport>>) {
    if let Some(t) = transport.as_mut() {
        if let Err(e) = terminal.pump(t.as_mut()) {
            log::warn!("Host link error: {}", e);
        }
    }
}

fn run_headless(
    terminal: &mut Terminal,
    capture: &mut FrameCapture,
    keyboard: &mut SimulatedKeyboard,
    transport: &mut Option<Box<dyn Transport>>,
    frames: u64,
    screenshot: Option<&str>,
) {
    let start = Instant::now();
    let frame_us = terminal.video().profile().frame_micros();
    for _ in 0..frames {
        pump(terminal, transport);
        keyboard.advance(frame_us);
        terminal.run_frame(capture, keyboard);
    }
    let elapsed = start.elapsed();
    println!(
        "Rendered {} frames in {:?} ({:.1} fps effective)",
        capture.frames_completed(),
        elapsed,
        capture.frames_completed() as f64 / elapsed.as_secs_f64()
    );

    if let Some(path) = screenshot {
        match capture.save_png(Path::new(path)) {
            Ok(()) => println!("Screenshot saved: {}", path),
            Err(e) => eprintln!("Failed to save screenshot: {}", e),
        }
    }
}

fn run_with_window(
    terminal: &mut Terminal,
    capture: &mut FrameCapture,
    keyboard: &mut SimulatedKeyboard,
    transport: &mut Option<Box<dyn Transport>>,
    config: &Config,
) {
    let scale = match config.scale {
        1 => Scale::X1,
        4 => Scale::X4,
        _ => Scale::X2,
    };
    let mut window = match Window::new(
        "VDM1RS - Processor Technology VDM-1",
        DISPLAY_PIXELS,
        DISPLAY_HEIGHT,
        WindowOptions {
            scale,
            ..WindowOptions::default()
        },
    ) {
        Ok(win) => win,
        Err(e) => {
            eprintln!("Failed to create window: {}", e);
            return;
        }
    };

    let frame_us = terminal.video().profile().frame_micros();
    window.set_target_fps((1_000_000 / frame_us as usize).max(1));

    let screenshot_dir = config.screenshot_dir_path();
    let mut prev_keys: Vec<Key> = Vec::new();
    let mut scancodes = Vec::new();

    while window.is_open() {
        // Pause はスクリーンショット（キーボードには送らない）
        if window.is_key_pressed(Key::Pause, minifb::KeyRepeat::No) {
            match capture.save_screenshot(&screenshot_dir) {
                Ok(path) => println!("Screenshot saved: {}", path),
                Err(e) => eprintln!("{}", e),
            }
        }

        // 押下/解放の差分をスキャンコードとして送る
        let current_keys = window.get_keys();
        scancodes.clear();
        for key in &current_keys {
            if !prev_keys.contains(key) {
                if let Some((ext, code)) = key_to_scancode(*key) {
                    scancode_bytes(ext, code, true, &mut scancodes);
                }
            }
        }
        for key in &prev_keys {
            if !current_keys.contains(key) {
                if let Some((ext, code)) = key_to_scancode(*key) {
                    scancode_bytes(ext, code, false, &mut scancodes);
                }
            }
        }
        if !scancodes.is_empty() {
            keyboard.type_scancodes(&scancodes);
        }
        prev_keys = current_keys;

        pump(terminal, transport);
        keyboard.advance(frame_us);
        terminal.run_frame(capture, keyboard);

        let frame = capture.display_frame();
        if let Err(e) = window.update_with_buffer(&frame, DISPLAY_PIXELS, DISPLAY_HEIGHT) {
            log::warn!("Window update failed: {}", e);
        }
    }
}
