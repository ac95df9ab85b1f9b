use std::env;
use std::process::ExitCode;

use image::RgbaImage;
use rich_pages::{Document, DocumentConfig, Viewport};
use rich_pages_embedded_graphics::{with_embedded_text_measurer, EgRasterizer, PageBitmap};
use rich_pages_render::{
    AssetCache, LayoutDiagnostic, LayoutEngine, PlacedPage, RichTextViewConfig,
};

#[derive(Clone, Debug)]
struct Args {
    input_path: String,
    out_dir: String,
    config_path: Option<String>,
    assets_path: Option<String>,
    width: Option<f32>,
    height: Option<f32>,
    font_size_px: Option<f32>,
    row_spacing: Option<f32>,
}

fn main() -> ExitCode {
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            eprintln!("{}", help_text());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let cfg = parse_args(args)?;
    let markup = std::fs::read_to_string(&cfg.input_path)
        .map_err(|e| format!("unable to read '{}': {}", cfg.input_path, e))?;

    let mut view_cfg = match &cfg.config_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("unable to read '{}': {}", path, e))?;
            RichTextViewConfig::from_json_str(&json).map_err(|e| e.to_string())?
        }
        None => RichTextViewConfig {
            document: DocumentConfig::default(),
            viewport: Viewport::default(),
        },
    };
    if let Some(width) = cfg.width {
        view_cfg.viewport.width = width;
    }
    if let Some(height) = cfg.height {
        view_cfg.viewport.height = height;
    }
    if let Some(size) = cfg.font_size_px {
        view_cfg.document.font_size = size;
    }
    if let Some(spacing) = cfg.row_spacing {
        view_cfg.document.row_spacing = spacing;
    }
    view_cfg.validate().map_err(|e| e.to_string())?;

    let mut engine = with_embedded_text_measurer(LayoutEngine::new());
    if let Some(path) = &cfg.assets_path {
        let cache = load_assets(path)?;
        println!(
            "loaded {} atlas frame(s) and {} object(s) from {}",
            cache.frame_count(),
            cache.object_count(),
            path
        );
        engine = engine.with_asset_resolver(std::sync::Arc::new(cache));
    }
    engine.set_diagnostic_sink(|diag| match diag {
        LayoutDiagnostic::ResourceNotFound { kind, path } => {
            eprintln!("warning: {} '{}' not found", kind, path)
        }
        LayoutDiagnostic::MalformedMarkup(err) => eprintln!("warning: {}", err),
        _ => {}
    });

    let document = Document::new(markup, view_cfg.document, view_cfg.viewport);
    let mut rasterizer = EgRasterizer::new();
    let pages = engine.layout(&document, &mut rasterizer);
    if pages.is_empty() {
        return Err("markup produced no pages".to_string());
    }

    std::fs::create_dir_all(&cfg.out_dir).map_err(|e| e.to_string())?;
    clear_previous_outputs(&cfg.out_dir)?;
    let mut manifest =
        String::from("page\tkind\tpath\tx\ty\twidth\theight\tscale\tplaceholder\n");
    for page in &pages {
        let file_name = format!("page_{:04}.png", page.index + 1);
        let file_path = format!("{}/{}", cfg.out_dir, file_name);
        save_png(&page.surface, &file_path)?;
        append_overlays(&mut manifest, page);
    }
    let manifest_path = format!("{}/overlays.tsv", cfg.out_dir);
    std::fs::write(&manifest_path, manifest).map_err(|e| e.to_string())?;

    let stats = rasterizer.diagnostics();
    println!(
        "rendered {} page(s) to {} ({} runs, {} decorations, manifest: {})",
        pages.len(),
        cfg.out_dir,
        stats.text_runs,
        stats.decorations,
        manifest_path
    );
    Ok(())
}

fn save_png(bitmap: &PageBitmap, path: &str) -> Result<(), String> {
    let image = RgbaImage::from_raw(bitmap.width(), bitmap.height(), bitmap.to_rgba_bytes())
        .ok_or_else(|| format!("bitmap size mismatch for '{}'", path))?;
    image
        .save(path)
        .map_err(|e| format!("unable to write '{}': {}", path, e))
}

fn append_overlays(manifest: &mut String, page: &PlacedPage<PageBitmap>) {
    for overlay in &page.overlays {
        let (x, y) = page.overlay_host_position(overlay);
        let element = &overlay.element;
        manifest.push_str(&format!(
            "{}\t{}\t{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.4}\t{}\n",
            page.index,
            element.kind,
            element.path,
            x,
            y,
            element.width,
            element.height,
            element.scale,
            element.is_placeholder(),
        ));
    }
}

/// Asset list: one `image|object<TAB>path<TAB>width<TAB>height` entry per
/// line; objects may add `<TAB>anchor_x<TAB>anchor_y`.
fn load_assets(path: &str) -> Result<AssetCache, String> {
    let text =
        std::fs::read_to_string(path).map_err(|e| format!("unable to read '{}': {}", path, e))?;
    let mut cache = AssetCache::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let bad_line = || format!("{}:{}: malformed asset entry", path, line_no + 1);
        let number = |idx: usize| -> Result<f32, String> {
            fields
                .get(idx)
                .and_then(|v| v.trim().parse::<f32>().ok())
                .ok_or_else(bad_line)
        };
        let name = fields.get(1).ok_or_else(bad_line)?;
        let result = match fields.first().copied() {
            Some("image") => cache.insert_atlas_frame(name, number(2)?, number(3)?),
            Some("object") => {
                let anchor = if fields.len() >= 6 {
                    (number(4)?, number(5)?)
                } else {
                    (0.5, 0.5)
                };
                cache.insert_object(name, number(2)?, number(3)?, anchor)
            }
            _ => return Err(bad_line()),
        };
        result.map_err(|e| format!("{}:{}: {}", path, line_no + 1, e))?;
    }
    Ok(cache)
}

fn clear_previous_outputs(out_dir: &str) -> Result<(), String> {
    let entries = std::fs::read_dir(out_dir).map_err(|e| e.to_string())?;
    for entry in entries {
        let entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path();
        if path.is_file() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if (name.starts_with("page_") && name.ends_with(".png")) || name == "overlays.tsv" {
                std::fs::remove_file(&path).map_err(|e| e.to_string())?;
            }
        }
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Args, String> {
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h") {
        return Err("help requested".to_string());
    }
    let input_path = args
        .get(1)
        .filter(|v| !v.starts_with("--"))
        .cloned()
        .ok_or_else(|| "missing markup file".to_string())?;

    let mut cfg = Args {
        input_path,
        out_dir: "target/render-pages".to_string(),
        config_path: None,
        assets_path: None,
        width: None,
        height: None,
        font_size_px: None,
        row_spacing: None,
    };

    let mut i = 2usize;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args
            .get(i + 1)
            .ok_or_else(|| format!("{} requires a value", flag))?;
        let parse_f32 = || {
            value
                .parse::<f32>()
                .map_err(|_| format!("invalid {} value '{}'", flag, value))
        };
        match flag {
            "--out" => cfg.out_dir = value.clone(),
            "--config" => cfg.config_path = Some(value.clone()),
            "--assets" => cfg.assets_path = Some(value.clone()),
            "--width" => cfg.width = Some(parse_f32()?),
            "--height" => cfg.height = Some(parse_f32()?),
            "--font-size" => cfg.font_size_px = Some(parse_f32()?),
            "--row-spacing" => cfg.row_spacing = Some(parse_f32()?),
            other => return Err(format!("unknown option '{}'", other)),
        }
        i += 2;
    }
    Ok(cfg)
}

fn help_text() -> &'static str {
    "usage: render-pages <markup-file> [--out DIR] [--config FILE.json] [--assets FILE.tsv]\n\
     \x20                   [--width PX] [--height PX] [--font-size PX] [--row-spacing PX]\n\
     \n\
     Lays out escape-sequence markup and writes one PNG per page plus\n\
     overlays.tsv listing image/object positions in host space."
}
