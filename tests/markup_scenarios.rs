use std::sync::{Arc, Mutex};

use rich_pages::{
    scan, Color, Decoration, Document, DocumentConfig, MarkupError, StyleState, TokenKind,
    Viewport,
};
use rich_pages_render::{LayoutDiagnostic, LayoutEngine, OverlayKind, TextRunCommand};

fn kinds(markup: &str) -> Vec<TokenKind<'_>> {
    scan(markup).map(|token| token.kind).collect()
}

fn runs(markup: &str, viewport: Viewport) -> Vec<TextRunCommand> {
    let doc = Document::new(markup, DocumentConfig::default(), viewport);
    LayoutEngine::new()
        .layout_commands(&doc)
        .into_iter()
        .flat_map(|page| page.surface.text_runs().cloned().collect::<Vec<_>>())
        .collect()
}

#[test]
fn bold_applies_only_until_restore() {
    assert_eq!(
        kinds("江\\b苏\\0省"),
        vec![
            TokenKind::Literal("江"),
            TokenKind::SetBold,
            TokenKind::Literal("苏"),
            TokenKind::Restore,
            TokenKind::Literal("省"),
        ]
    );
    let runs = runs("江\\b苏\\0省", Viewport::default());
    let bold: Vec<_> = runs
        .iter()
        .map(|run| (run.text.as_str(), run.style.font.bold))
        .collect();
    assert_eq!(bold, vec![("江", false), ("苏", true), ("省", false)]);
}

#[test]
fn color_applies_until_restore() {
    let runs = runs("四\\cf00\\c川\\0省", Viewport::default());
    let fills: Vec<_> = runs
        .iter()
        .map(|run| (run.text.as_str(), run.style.fill))
        .collect();
    assert_eq!(
        fills,
        vec![
            ("四", Color::WHITE),
            ("川", Color::rgb(255, 0, 0)),
            ("省", Color::WHITE),
        ]
    );
}

#[test]
fn restore_resets_font_bold_color_and_decoration() {
    let runs = runs("\\fKaiTi\\f\\b\\c0f0\\c\\u甲\\0乙", Viewport::default());
    assert_eq!(&*runs[0].style.font.family, "KaiTi");
    assert_eq!(runs[0].style.decoration, Decoration::Underline);
    let base = StyleState::new(&DocumentConfig::default()).snapshot();
    assert_eq!(runs[1].style, base);
}

#[test]
fn underline_then_strike_leaves_strike_only() {
    let runs = runs("\\u\\d删除", Viewport::default());
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].style.decoration, Decoration::Strike);
}

#[test]
fn unterminated_font_directive_is_dropped() {
    let (tokens, errors) = scan("a\\fKaiTi").collect_with_errors();
    assert!(tokens
        .iter()
        .all(|token| !matches!(token.kind, TokenKind::SetFont(_))));
    assert!(matches!(
        errors.as_slice(),
        [MarkupError::MalformedDirective { .. }]
    ));
    let span = errors[0].span();
    assert_eq!((span.start, span.end), (1, 3));
    assert_eq!(errors[0].to_string(), "malformed \\f directive at 1..3");
    let runs = runs("a\\fKaiTi", Viewport::default());
    assert!(runs.iter().all(|run| &*run.style.font.family == "Arial"));
}

#[test]
fn three_glyphs_wrap_two_then_one() {
    let runs = runs("江苏省", Viewport::new(100.0, 240.0));
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].text, "江苏");
    assert_eq!(runs[1].text, "省");
    assert!(runs[1].baseline_y > runs[0].baseline_y);
    assert_eq!(runs[1].x, 0.0);
}

#[test]
fn rows_never_exceed_viewport_width() {
    let text = "Pack my box with five dozen liquor jugs 江苏省四川省 ".repeat(8);
    let width = 170.0;
    for run in runs(&text, Viewport::new(width, 600.0)) {
        assert!(run.x + run.width <= width, "{:?} overflows", run.text);
    }
}

#[test]
fn unresolved_image_is_reported_once_and_text_continues() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut engine = LayoutEngine::new();
    engine.set_diagnostic_sink(move |diag| sink.lock().expect("sink").push(diag));

    let doc = Document::new(
        "前\\iUI/Missing\\i后",
        DocumentConfig::default(),
        Viewport::default(),
    );
    let pages = engine.layout_commands(&doc);
    assert_eq!(pages.len(), 1);

    let reports: Vec<_> = seen
        .lock()
        .expect("diagnostics")
        .iter()
        .filter_map(|diag| match diag {
            LayoutDiagnostic::ResourceNotFound { kind, path } => Some((*kind, path.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(reports, vec![(OverlayKind::Image, "UI/Missing".to_string())]);

    let page = &pages[0];
    assert_eq!(page.overlays.len(), 1);
    assert!(page.overlays[0].element.is_placeholder());
    assert_eq!(page.overlays[0].element.width, 0.0);
    assert_eq!(page.surface.plain_text(), "前后");
}
