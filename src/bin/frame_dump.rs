//! VDM1RS Frame Dump - ホスト出力を再生して画面をテキストで表示
//!
//! 使い方:
//!   frame_dump [OPTIONS] <host.bin>
//!
//! オプション:
//!   -f, --frames <N>     再生後に描画するフレーム数 (default: 2)
//!   -v, --video <STD>    映像規格: vga, ntsc, pal (default: ntsc)
//!   -d, --dip <HEX>      起動時の DIP スイッチ (default: 36)
//!   -p, --png <FILE>     最終フレームを PNG で保存
//!   -h, --help           ヘルプ表示
//!
//! セルの文字はメモリから取るが、空白かどうかは実際に描画されたピクセルで決める。
//! そのため CR/VT ブランクやカーテンの効果がそのまま見える。

use vdm1rs::capture::FrameCapture;
use vdm1rs::charset::{GLYPH_ROWS, GLYPH_WIDTH};
use vdm1rs::config::VideoSelect;
use vdm1rs::keyboard::sim::SimulatedKeyboard;
use vdm1rs::registers::{COLUMNS, DEFAULT_DIP, ROWS};
use vdm1rs::terminal::Terminal;
use vdm1rs::timing::{VideoStandard, DISPLAY_PIXELS};
use vdm1rs::transport::ReplayTransport;
use std::env;
use std::path::Path;

fn print_help() {
    println!("VDM1RS Frame Dump - replay host output and print the screen");
    println!();
    println!("Usage: frame_dump [OPTIONS] <host.bin>");
    println!();
    println!("Options:");
    println!("  -f, --frames <N>      Frames to render after replay (default: 2)");
    println!("  -v, --video <STD>     Video standard: vga, ntsc, pal (default: ntsc)");
    println!("  -d, --dip <HEX>       Initial DIP switches (default: 36)");
    println!("  -p, --png <FILE>      Save the last frame as PNG");
    println!("  -h, --help            Show this help");
}

struct Options {
    input: String,
    frames: u64,
    standard: VideoStandard,
    dip: u8,
    png: Option<String>,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut input = None;
    let mut frames = 2;
    let mut standard = VideoStandard::Ntsc;
    let mut dip = DEFAULT_DIP;
    let mut png = None;

    let mut i = 0;
    while i < args.len() {
        let value = |i: usize| args.get(i + 1).cloned().ok_or_else(|| format!("{} needs a value", args[i]));
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-f" | "--frames" => {
                frames = value(i)?.parse().map_err(|e| format!("Invalid frame count: {}", e))?;
                i += 1;
            }
            "-v" | "--video" => {
                standard = match VideoSelect::parse(&value(i)?) {
                    Some(VideoSelect::Vga) => VideoStandard::Vga,
                    Some(VideoSelect::Pal) => VideoStandard::Pal,
                    Some(VideoSelect::Ntsc) => VideoStandard::Ntsc,
                    _ => return Err(format!("Unknown video standard: {}", args[i + 1])),
                };
                i += 1;
            }
            "-d" | "--dip" => {
                let v = value(i)?;
                dip = u8::from_str_radix(v.trim_start_matches("0x"), 16).map_err(|e| format!("Invalid DIP value: {}", e))?;
                i += 1;
            }
            "-p" | "--png" => {
                png = Some(value(i)?);
                i += 1;
            }
            arg if !arg.starts_with('-') => input = Some(arg.to_string()),
            arg => return Err(format!("Unknown option: {}", arg)),
        }
        i += 1;
    }

    Ok(Options {
        input: input.ok_or("No input file")?,
        frames,
        standard,
        dip,
        png,
    })
}

/// 描画結果からセル1つ分の文字を決める
fn cell_char(frame: &[u32], fg: u32, terminal: &Terminal, row: usize, col: usize) -> char {
    let mut lit = 0;
    for sub in 0..GLYPH_ROWS {
        // 表示フレームは縦2倍
        let y = (row * GLYPH_ROWS + sub) * 2;
        let start = y * DISPLAY_PIXELS + col * GLYPH_WIDTH;
        lit += frame[start..start + GLYPH_WIDTH].iter().filter(|&&p| p == fg).count();
    }
    if lit == 0 {
        return ' ';
    }
    if lit == GLYPH_ROWS * GLYPH_WIDTH {
        return '#';
    }
    let regs = terminal.regs();
    let mem_row = (row + regs.scroll_rows()) % ROWS;
    let code = regs.cell(mem_row * COLUMNS + col) & 0x7F;
    if (0x20..0x7F).contains(&code) {
        code as char
    } else {
        '.'
    }
}

fn main() {
    env_logger::init();

    let opts = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("{}", e);
            print_help();
            std::process::exit(1);
        }
    };

    let mut link = match ReplayTransport::from_file(Path::new(&opts.input)) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let mut terminal = Terminal::new(opts.standard, opts.dip, 0);
    let mut keyboard = SimulatedKeyboard::new();
    let mut capture = FrameCapture::new(opts.standard);

    // 全バイトをデコードし終えるまで回す
    while !link.is_finished() || terminal.host_pending() > 0 {
        if let Err(e) = terminal.pump(&mut link) {
            eprintln!("Replay failed: {}", e);
            std::process::exit(1);
        }
        terminal.poll(&mut keyboard);
    }
    for _ in 0..opts.frames.max(1) {
        terminal.run_frame(&mut capture, &mut keyboard);
    }

    let regs = terminal.regs();
    println!(
        "{} frame, CTRL=${:02X} DIP=${:02X} ({} frames)",
        opts.standard.name(),
        regs.ctrl(),
        regs.dip().bits(),
        capture.frames_completed()
    );
    let frame = capture.display_frame();
    let fg = capture.foreground();
    println!("+{}+", "-".repeat(COLUMNS));
    for row in 0..ROWS {
        let line: String = (0..COLUMNS).map(|col| cell_char(&frame, fg, &terminal, row, col)).collect();
        println!("|{}|", line);
    }
    println!("+{}+", "-".repeat(COLUMNS));

    if let Some(path) = opts.png {
        match capture.save_png(Path::new(&path)) {
            Ok(()) => println!("Saved {}", path),
            Err(e) => eprintln!("Failed to save PNG: {}", e),
        }
    }
}
