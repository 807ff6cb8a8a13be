// ============================================================================
// SCRIPTING: sandboxed Rhai driver for a headless editing session
// ============================================================================
//
// Scripts drive the editor the way a pointer-driven UI would: size the
// container, pick tools, feed display-space pointer events, manage layers
// and manipulate floating fragments. Every host function locks the shared
// editor for the duration of one call only.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use egui::{Pos2, Rect, Vec2};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Map, Position, Scope, FLOAT, INT};

use crate::canvas::{BlendMode, CanvasResolution};
use crate::components::layers::{LayerDirection, LayerId};
use crate::components::tools::Tool;
use crate::editor::Editor;
use crate::error::EngineError;
use crate::io::{write_png, CorsMode, ExternalImage};
use crate::ops::gradient::GradientShape;
use crate::{log_err, log_info};

pub type SharedEditor = Arc<Mutex<Editor>>;

type HostResult<T> = Result<T, Box<EvalAltResult>>;

// ============================================================================
// Script error type with line info
// ============================================================================

#[derive(Clone, Debug)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptError {
    fn at(message: String, pos: Position) -> Self {
        Self {
            message,
            line: pos.line().filter(|&l| l > 0),
            column: pos.position().filter(|&c| c > 0),
        }
    }

    /// Message with a hint for the mistakes scripts make most often.
    pub fn friendly_message(&self) -> String {
        let raw = self.message.as_str();
        let cleaned = raw.split(" (line ").next().unwrap_or(raw);
        if raw.contains("Function not found") {
            format!("{}\n  Tip: pointer and fragment calls take numbers, layer calls take a layer handle.", cleaned)
        } else if raw.contains("Too many operations") {
            format!("{}\n  Tip: the script ran too long. Check for loops that never end.", cleaned)
        } else {
            cleaned.to_string()
        }
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let (Some(line), Some(col)) = (self.line, self.column) {
            write!(f, "Line {}, Col {}: {}", line, col, self.message)
        } else if let Some(line) = self.line {
            write!(f, "Line {}: {}", line, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl From<ScriptError> for EngineError {
    fn from(e: ScriptError) -> Self {
        EngineError::Script(e.to_string())
    }
}

/// What a finished script left behind.
#[derive(Clone, Debug, Default)]
pub struct ScriptOutput {
    pub console: Vec<String>,
    pub elapsed_ms: u64,
}

// ============================================================================
// Entry point
// ============================================================================

/// Compile and run `source` against the shared editor.
pub fn run_script(editor: SharedEditor, source: &str) -> Result<ScriptOutput, ScriptError> {
    let start = Instant::now();
    let console = Arc::new(Mutex::new(Vec::new()));
    let engine = create_engine(editor, console.clone());
    let mut scope = Scope::new();

    let result = engine
        .compile(source)
        .map_err(|e| {
            let pos = e.position();
            ScriptError::at(e.to_string(), pos)
        })
        .and_then(|ast| {
            engine
                .run_ast_with_scope(&mut scope, &ast)
                .map_err(|e| ScriptError::at(e.to_string(), e.position()))
        });

    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(()) => {
            log_info!("Script finished in {}ms", elapsed_ms);
            let console = std::mem::take(&mut *console.lock().unwrap_or_else(|e| e.into_inner()));
            Ok(ScriptOutput { console, elapsed_ms })
        }
        Err(e) => {
            log_err!("Script failed: {}", e);
            Err(e)
        }
    }
}

// ============================================================================
// Engine construction with full sandbox + API registration
// ============================================================================

fn create_engine(editor: SharedEditor, console: Arc<Mutex<Vec<String>>>) -> Engine {
    let mut engine = Engine::new();

    // ── Sandbox limits ──
    engine.set_max_operations(50_000_000);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(1_000);

    engine.on_print(move |text| {
        console.lock().unwrap_or_else(|e| e.into_inner()).push(text.to_string());
    });

    // ── Register APIs ──
    register_canvas_api(&mut engine, editor.clone());
    register_tool_api(&mut engine, editor.clone());
    register_pointer_api(&mut engine, editor.clone());
    register_layer_api(&mut engine, editor.clone());
    register_fragment_api(&mut engine, editor);

    engine
}

fn lock(editor: &SharedEditor) -> MutexGuard<'_, Editor> {
    editor.lock().unwrap_or_else(|e| e.into_inner())
}

fn host_err(e: EngineError) -> Box<EvalAltResult> {
    e.to_string().into()
}

/// Scripts mix integer and float literals freely.
fn num(v: &Dynamic) -> HostResult<f32> {
    if let Ok(f) = v.as_float() {
        return Ok(f as f32);
    }
    if let Ok(i) = v.as_int() {
        return Ok(i as f32);
    }
    Err(format!("expected a number, got {}", v.type_name()).into())
}

fn channel(v: INT) -> u8 {
    v.clamp(0, 255) as u8
}

fn point_map(p: Pos2) -> Dynamic {
    let mut map = Map::new();
    map.insert("x".into(), (p.x as FLOAT).into());
    map.insert("y".into(), (p.y as FLOAT).into());
    map.into()
}

// ============================================================================
// Canvas / template / output
// ============================================================================

fn register_canvas_api(engine: &mut Engine, editor: SharedEditor) {
    let e = editor.clone();
    engine.register_fn("container", move |w: Dynamic, h: Dynamic| -> HostResult<()> {
        let size = Vec2::new(num(&w)?, num(&h)?);
        lock(&e).set_container(Rect::from_min_size(Pos2::ZERO, size));
        Ok(())
    });

    let e = editor.clone();
    engine.register_fn("width", move || -> HostResult<INT> {
        let res = lock(&e).resolution().ok_or_else(|| host_err(EngineError::NotReady))?;
        Ok(res.width as INT)
    });

    let e = editor.clone();
    engine.register_fn("height", move || -> HostResult<INT> {
        let res = lock(&e).resolution().ok_or_else(|| host_err(EngineError::NotReady))?;
        Ok(res.height as INT)
    });

    let e = editor.clone();
    engine.register_fn("set_resolution", move |w: INT, h: INT| -> HostResult<()> {
        let (Ok(width), Ok(height)) = (u32::try_from(w), u32::try_from(h)) else {
            return Err(format!("invalid resolution {}x{}", w, h).into());
        };
        lock(&e)
            .set_resolution(CanvasResolution::new(width, height))
            .map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("load_template", move |path: &str| -> HostResult<()> {
        lock(&e).load_template_file(Path::new(path)).map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("is_ready", move || -> bool { lock(&e).is_ready() });

    // Canvas pixel → display point, for scripts that think in canvas space.
    let e = editor.clone();
    engine.register_fn("display_point", move |x: Dynamic, y: Dynamic| -> HostResult<Dynamic> {
        let vp = lock(&e).viewport().ok_or_else(|| host_err(EngineError::NotReady))?;
        let p = vp
            .to_display(Pos2::new(num(&x)?, num(&y)?))
            .ok_or_else(|| host_err(EngineError::NotReady))?;
        Ok(point_map(p))
    });

    let e = editor.clone();
    engine.register_fn("composite_pixel", move |x: INT, y: INT| -> HostResult<Array> {
        let image = lock(&e).composite_image().map_err(host_err)?;
        if x < 0 || y < 0 || x >= image.width() as INT || y >= image.height() as INT {
            return Err(format!("pixel ({}, {}) is outside the canvas", x, y).into());
        }
        let px = image.get_pixel(x as u32, y as u32);
        Ok(px.0.iter().map(|&c| Dynamic::from(c as INT)).collect())
    });

    let e = editor;
    engine.register_fn("save_png", move |path: &str| -> HostResult<()> {
        let bytes = lock(&e).get_composite().map_err(host_err)?;
        write_png(&bytes, Path::new(path)).map_err(host_err)
    });
}

// ============================================================================
// Tools
// ============================================================================

fn register_tool_api(engine: &mut Engine, editor: SharedEditor) {
    let e = editor.clone();
    engine.register_fn("set_tool", move |name: &str| -> HostResult<()> {
        let tool = Tool::from_name(name).ok_or_else(|| format!("unknown tool '{}'", name))?;
        lock(&e).set_tool(tool);
        Ok(())
    });

    let e = editor.clone();
    engine.register_fn("tool", move || -> String { lock(&e).tool().name().to_string() });

    let e = editor.clone();
    engine.register_fn("interaction", move || -> String { lock(&e).interaction().to_string() });

    let e = editor.clone();
    engine.register_fn("set_brush_size", move |size: Dynamic| -> HostResult<()> {
        let size = num(&size)?;
        if !size.is_finite() || size <= 0.0 {
            return Err(format!("brush size must be positive, got {}", size).into());
        }
        lock(&e).tool_properties_mut().size = size;
        Ok(())
    });

    let e = editor.clone();
    engine.register_fn("set_opacity", move |opacity: Dynamic| -> HostResult<()> {
        let opacity = num(&opacity)?;
        lock(&e).tool_properties_mut().opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 1.0 };
        Ok(())
    });

    let e = editor.clone();
    engine.register_fn("set_primary", move |r: INT, g: INT, b: INT, a: INT| {
        lock(&e).tool_properties_mut().primary = [channel(r), channel(g), channel(b), channel(a)];
    });

    let e = editor.clone();
    engine.register_fn("set_secondary", move |r: INT, g: INT, b: INT, a: INT| {
        lock(&e).tool_properties_mut().secondary = [channel(r), channel(g), channel(b), channel(a)];
    });

    let e = editor;
    engine.register_fn("set_gradient_shape", move |name: &str| -> HostResult<()> {
        let shape = GradientShape::from_name(name).ok_or_else(|| format!("unknown gradient shape '{}'", name))?;
        lock(&e).tool_properties_mut().gradient_shape = shape;
        Ok(())
    });
}

// ============================================================================
// Pointer input (display space)
// ============================================================================

fn register_pointer_api(engine: &mut Engine, editor: SharedEditor) {
    let e = editor.clone();
    engine.register_fn("pointer_down", move |x: Dynamic, y: Dynamic| -> HostResult<()> {
        let p = Pos2::new(num(&x)?, num(&y)?);
        lock(&e).pointer_down(p).map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("pointer_move", move |x: Dynamic, y: Dynamic| -> HostResult<()> {
        let p = Pos2::new(num(&x)?, num(&y)?);
        lock(&e).pointer_move(p).map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("pointer_up", move |x: Dynamic, y: Dynamic| -> HostResult<()> {
        let p = Pos2::new(num(&x)?, num(&y)?);
        lock(&e).pointer_up(p).map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("pointer_cancel", move || lock(&e).pointer_cancel());

    // Press, one move, release.
    let e = editor;
    engine.register_fn(
        "drag",
        move |x0: Dynamic, y0: Dynamic, x1: Dynamic, y1: Dynamic| -> HostResult<()> {
            let from = Pos2::new(num(&x0)?, num(&y0)?);
            let to = Pos2::new(num(&x1)?, num(&y1)?);
            let mut ed = lock(&e);
            ed.pointer_down(from).map_err(host_err)?;
            ed.pointer_move(to).map_err(host_err)?;
            ed.pointer_up(to).map_err(host_err)
        },
    );
}

// ============================================================================
// Layers
// ============================================================================

fn register_layer_api(engine: &mut Engine, editor: SharedEditor) {
    engine.register_type_with_name::<LayerId>("Layer");
    engine.register_fn("to_string", |id: &mut LayerId| id.to_string());
    engine.register_fn("to_debug", |id: &mut LayerId| format!("Layer {}", id));
    engine.register_fn("==", |a: LayerId, b: LayerId| a == b);
    engine.register_fn("!=", |a: LayerId, b: LayerId| a != b);

    let e = editor.clone();
    engine.register_fn("layer_count", move || -> INT { lock(&e).layers().len() as INT });

    let e = editor.clone();
    engine.register_fn("layer_at", move |position: INT| -> HostResult<LayerId> {
        usize::try_from(position)
            .ok()
            .and_then(|p| lock(&e).layers().id_at(p))
            .ok_or_else(|| format!("no layer at position {}", position).into())
    });

    let e = editor.clone();
    engine.register_fn("active_layer", move || -> LayerId { lock(&e).layers().active_id() });

    let e = editor.clone();
    engine.register_fn("add_layer", move || -> LayerId { lock(&e).add_layer("") });

    let e = editor.clone();
    engine.register_fn("add_layer", move |name: &str| -> LayerId { lock(&e).add_layer(name) });

    let e = editor.clone();
    engine.register_fn("remove_layer", move |id: LayerId| -> HostResult<bool> {
        lock(&e).remove_layer(id).map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("move_layer_up", move |id: LayerId| -> HostResult<bool> {
        lock(&e).move_layer(id, LayerDirection::Up).map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("move_layer_down", move |id: LayerId| -> HostResult<bool> {
        lock(&e).move_layer(id, LayerDirection::Down).map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("toggle_layer", move |id: LayerId| -> HostResult<bool> {
        lock(&e).toggle_visibility(id).map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("set_layer_opacity", move |id: LayerId, opacity: Dynamic| -> HostResult<()> {
        let opacity = num(&opacity)?;
        lock(&e).set_layer_opacity(id, opacity).map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("rename_layer", move |id: LayerId, name: &str| -> HostResult<()> {
        lock(&e).rename_layer(id, name).map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("set_blend_mode", move |id: LayerId, name: &str| -> HostResult<()> {
        let mode = BlendMode::from_name(name).ok_or_else(|| format!("unknown blend mode '{}'", name))?;
        lock(&e).set_blend_mode(id, mode).map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("select_layer", move |id: LayerId| -> HostResult<()> {
        lock(&e).set_active_layer(id).map_err(host_err)
    });

    let e = editor;
    engine.register_fn("layer_name", move |id: LayerId| -> HostResult<String> {
        lock(&e)
            .layers()
            .get(id)
            .map(|l| l.name.clone())
            .ok_or_else(|| host_err(EngineError::UnknownLayer(id)))
    });
}

// ============================================================================
// External images and the floating fragment
// ============================================================================

fn read_image(path: &str, cors: &str) -> HostResult<ExternalImage> {
    let cors = CorsMode::from_name(cors).ok_or_else(|| format!("unknown cors mode '{}'", cors))?;
    let bytes = std::fs::read(path).map_err(|err| format!("could not read '{}': {}", path, err))?;
    Ok(ExternalImage::new(bytes, cors))
}

fn register_fragment_api(engine: &mut Engine, editor: SharedEditor) {
    let e = editor.clone();
    engine.register_fn("place_image", move |path: &str| -> HostResult<()> {
        let image = read_image(path, "same-origin")?;
        lock(&e).place_external_image(image).map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("place_image", move |path: &str, cors: &str| -> HostResult<()> {
        let image = read_image(path, cors)?;
        lock(&e).place_external_image(image).map_err(host_err)
    });

    // Queue without decoding; `decode_pending` finishes the job.
    let e = editor.clone();
    engine.register_fn("receive_image", move |path: &str, cors: &str| -> HostResult<()> {
        let image = read_image(path, cors)?;
        lock(&e).receive_external_image(image);
        Ok(())
    });

    let e = editor.clone();
    engine.register_fn("decode_pending", move || -> HostResult<bool> {
        lock(&e).process_pending_decode().map_err(host_err)
    });

    let e = editor.clone();
    engine.register_fn("has_fragment", move || -> bool { lock(&e).pending_fragment().is_some() });

    let e = editor.clone();
    engine.register_fn("commit", move || -> HostResult<bool> { lock(&e).commit_fragment().map_err(host_err) });

    let e = editor.clone();
    engine.register_fn("cancel", move || -> bool { lock(&e).cancel_fragment().is_some() });

    let e = editor.clone();
    engine.register_fn("translate", move |dx: Dynamic, dy: Dynamic| -> HostResult<bool> {
        let (dx, dy) = (num(&dx)?, num(&dy)?);
        Ok(lock(&e).translate_fragment(dx, dy))
    });

    let e = editor.clone();
    engine.register_fn("scale", move |sx: Dynamic, sy: Dynamic| -> HostResult<bool> {
        let (sx, sy) = (num(&sx)?, num(&sy)?);
        Ok(lock(&e).set_fragment_scale(sx, sy))
    });

    let e = editor.clone();
    engine.register_fn("rotate", move |degrees: Dynamic| -> HostResult<bool> {
        let degrees = num(&degrees)?;
        Ok(lock(&e).rotate_fragment(degrees))
    });

    let e = editor.clone();
    engine.register_fn("set_rotation", move |degrees: Dynamic| -> HostResult<bool> {
        let degrees = num(&degrees)?;
        Ok(lock(&e).set_fragment_rotation(degrees))
    });

    let e = editor.clone();
    engine.register_fn("mirror_x", move || -> bool { lock(&e).mirror_fragment_x() });

    let e = editor.clone();
    engine.register_fn("mirror_y", move || -> bool { lock(&e).mirror_fragment_y() });

    // Display position of a gizmo handle, or () when nothing floats.
    let e = editor;
    engine.register_fn("handle", move |name: &str| -> Dynamic {
        lock(&e)
            .gizmo_handles()
            .into_iter()
            .find(|(kind, _)| kind.name() == name)
            .map_or(Dynamic::UNIT, |(_, p)| point_map(p))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CanvasVariant, EngineConfig};

    fn shared(width: u32, height: u32) -> SharedEditor {
        let config = EngineConfig {
            variant: CanvasVariant::Fixed { width, height },
            ..Default::default()
        };
        Arc::new(Mutex::new(Editor::new(config).unwrap()))
    }

    #[test]
    fn brush_drag_paints_through_the_editor() {
        let ed = shared(100, 100);
        let src = r#"
            container(100, 100);
            set_tool("brush");
            set_primary(255, 0, 0, 255);
            set_brush_size(6);
            drag(10, 50, 90, 50.0);
        "#;
        run_script(ed.clone(), src).unwrap();
        let image = lock(&ed).composite_image().unwrap();
        assert_eq!(image.get_pixel(50, 50).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(50, 10).0, [255, 255, 255, 255]);
    }

    #[test]
    fn print_is_collected() {
        let out = run_script(shared(10, 10), r#"print("w=" + width()); print(layer_count());"#).unwrap();
        assert_eq!(out.console, vec!["w=10".to_string(), "1".to_string()]);
    }

    #[test]
    fn layer_handles_round_trip() {
        let ed = shared(20, 20);
        let src = r#"
            let a = add_layer("Ink");
            let b = add_layer();
            if active_layer() != b { throw "newest layer should be active"; }
            move_layer_down(b);
            if layer_at(1) != b { throw "move failed"; }
            set_blend_mode(a, "multiply");
            remove_layer(a);
            print(layer_name(b));
        "#;
        let out = run_script(ed.clone(), src).unwrap();
        assert_eq!(out.console, vec!["Layer 3".to_string()]);
        assert_eq!(lock(&ed).layers().len(), 2);
    }

    #[test]
    fn host_errors_carry_the_line() {
        let err = run_script(shared(10, 10), "let x = 1;\nset_tool(\"spray\");").unwrap_err();
        assert_eq!(err.line, Some(2));
        assert!(err.message.contains("unknown tool"));
    }

    #[test]
    fn out_of_range_resolution_is_a_script_error() {
        let ed = shared(10, 10);
        let err = run_script(ed.clone(), "set_resolution(4294967297, 10);").unwrap_err();
        assert!(err.message.contains("invalid resolution"));
        assert!(run_script(ed.clone(), "set_resolution(-3, 10);").is_err());
        assert!(run_script(ed.clone(), "set_resolution(17000, 16000);").is_err());
        assert_eq!(lock(&ed).resolution(), Some(CanvasResolution::new(10, 10)));

        run_script(ed.clone(), "set_resolution(12, 8);").unwrap();
        assert_eq!(lock(&ed).resolution(), Some(CanvasResolution::new(12, 8)));
    }

    #[test]
    fn syntax_errors_are_reported_before_running() {
        let ed = shared(10, 10);
        let err = run_script(ed.clone(), "add_layer(\"x\");\nlet = ;").unwrap_err();
        assert_eq!(err.line, Some(2));
        assert_eq!(lock(&ed).layers().len(), 1);
    }

    #[test]
    fn fragment_calls_are_false_without_a_fragment() {
        let out = run_script(shared(10, 10), "print(translate(1, 2)); print(commit()); print(cancel());").unwrap();
        assert_eq!(out.console, vec!["false", "false", "false"]);
    }
}
