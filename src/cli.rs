// ============================================================================
// LayerPaint CLI: headless editing session driven by a Rhai script
// ============================================================================
//
// Usage examples:
//   layerpaint --script demo.rhai --output out.png
//   layerpaint --variant template --template plate_guide.png -s draw.rhai -o out.png
//   layerpaint --variant plate --container 840x200 -s sign.rhai -o plate.png -v
//   layerpaint --config session.json -s draw.rhai -o out.png
//
// No window is opened. The script feeds pointer events into the editor in
// display space exactly like a UI would, then the composite is written as PNG.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use egui::{Pos2, Rect, Vec2};

use crate::config::{CanvasVariant, EngineConfig};
use crate::editor::{Editor, EngineStatus};
use crate::error::EngineResult;
use crate::io::write_png;
use crate::log_info;
use crate::ops::scripting::run_script;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// LayerPaint headless editor.
#[derive(Parser, Debug)]
#[command(
    name = "layerpaint",
    about = "LayerPaint headless layered paint engine",
    long_about = "Run a Rhai script against a layered canvas session and export the\n\
                  flattened result as PNG. Scripts drive pointer events, tools, layers\n\
                  and the transform gizmo.\n\n\
                  Example:\n  \
                  layerpaint --script draw.rhai --output result.png"
)]
pub struct CliArgs {
    /// JSON engine configuration. Fields left out keep their defaults.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Canvas variant: template, plate, or WIDTHxHEIGHT. Overrides the config file.
    #[arg(long, value_name = "VARIANT")]
    pub variant: Option<String>,

    /// Template image. Sets the resolution in the template variant, otherwise
    /// kept as a guide only.
    #[arg(short, long, value_name = "IMAGE")]
    pub template: Option<PathBuf>,

    /// Rhai script to run against the session.
    #[arg(short, long, value_name = "SCRIPT.rhai")]
    pub script: Option<PathBuf>,

    /// Where to write the flattened canvas (PNG).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Display container size the canvas is fitted into, e.g. 800x600.
    /// Defaults to the canvas size.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub container: Option<(f32, f32)>,

    /// Echo log lines and script console output to the terminal.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_size(s: &str) -> Result<(f32, f32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{}'", s))?;
    let w: f32 = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
    let h: f32 = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
    if !(w > 0.0 && h > 0.0 && w.is_finite() && h.is_finite()) {
        return Err(format!("container must be positive, got {}x{}", w, h));
    }
    Ok((w, h))
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run one session and return an OS exit code.
/// `0` = script ran and output was written, `1` = anything failed.
pub fn run(args: CliArgs) -> ExitCode {
    let config = match load_config(args.config.as_deref(), args.variant.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("error: {}", msg);
            return ExitCode::FAILURE;
        }
    };

    let mut editor = match Editor::new(config) {
        Ok(ed) => ed,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some((w, h)) = args.container {
        editor.set_container(Rect::from_min_size(Pos2::ZERO, Vec2::new(w, h)));
    }

    if let Some(path) = &args.template {
        if let Err(e) = editor.load_template_file(path) {
            eprintln!("error: could not load template '{}': {}", path.display(), e);
            if matches!(editor.status(), EngineStatus::Blocked(_)) {
                return ExitCode::FAILURE;
            }
        } else if args.verbose {
            println!("template: {}", path.display());
        }
    }

    let editor = Arc::new(Mutex::new(editor));

    if let Some(path) = &args.script {
        let source = match std::fs::read_to_string(path) {
            Ok(src) => src,
            Err(e) => {
                eprintln!("error: could not read script '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        };
        match run_script(editor.clone(), &source) {
            Ok(out) => {
                if args.verbose {
                    for line in &out.console {
                        println!("  [script] {}", line);
                    }
                    println!("script finished in {}ms", out.elapsed_ms);
                }
            }
            Err(e) => {
                match (e.line, e.column) {
                    (Some(l), Some(c)) => eprintln!("error: script failed at line {}, col {}:", l, c),
                    (Some(l), None) => eprintln!("error: script failed at line {}:", l),
                    _ => eprintln!("error: script failed:"),
                }
                eprintln!("{}", e.friendly_message());
                return ExitCode::FAILURE;
            }
        }
    }

    let editor = editor.lock().unwrap_or_else(|e| e.into_inner());
    match &args.output {
        Some(path) => match export(&editor, path) {
            Ok(len) => {
                if args.verbose {
                    println!("  → {} ({} bytes)", path.display(), len);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: could not write '{}': {}", path.display(), e);
                ExitCode::FAILURE
            }
        },
        None => {
            let res = editor
                .resolution()
                .map_or_else(|| "pending".to_string(), |r| r.to_string());
            println!(
                "canvas {}, {} layers, state {} (no --output given)",
                res,
                editor.layers().len(),
                editor.interaction()
            );
            ExitCode::SUCCESS
        }
    }
}

fn load_config(path: Option<&Path>, variant: Option<&str>) -> Result<EngineConfig, String> {
    let mut config = match path {
        Some(p) => EngineConfig::from_json_file(p).map_err(|e| format!("{} ({})", e, p.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(v) = variant {
        config.variant = CanvasVariant::parse(v)
            .ok_or_else(|| format!("unknown variant '{}'; use template, plate or WIDTHxHEIGHT", v))?;
    }
    Ok(config)
}

fn export(editor: &Editor, path: &Path) -> EngineResult<usize> {
    let bytes = editor.get_composite()?;
    write_png(&bytes, path)?;
    log_info!("Exported composite to {}", path.display());
    Ok(bytes.len())
}
