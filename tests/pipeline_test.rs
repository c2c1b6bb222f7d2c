mod common;

use std::rc::Rc;
use std::sync::{Arc, Mutex};

use mp_export::clipboard::TierKind;
use mp_export::config::ExportConfig;
use mp_export::formula::FnRenderer;
use mp_export::pipeline::{CopyStatus, ExportPipeline, Notice};
use mp_export::{ExportError, FormulaEncoding, FormulaError};

use common::{RecordingClipboard, RecordingStatus, create_preview_html, svg_renderer};

const MARKDOWN: &str = "Energy $x^2$ and $y^2$ cost $5.\n\n$$\n\\int f\n$$\n\n```\n$not math$\n```\n";

const BODY: &str = r#"<p>Energy <span class="math math-inline">x^2</span> and <span class="math math-inline">y^2</span> cost $5.</p>
<div class="math math-block">\int f</div>
<script>alert(1)</script>
<p onclick="steal()" id="p1" data-line="4">text</p>
<pre><code>$not math$</code></pre>"#;

#[tokio::test]
async fn test_copy_converts_formulas_in_document_order() {
    let calls: Arc<Mutex<Vec<(String, bool)>>> = Arc::default();
    let recorded = calls.clone();
    let renderer = FnRenderer(move |source: &str, encoding: FormulaEncoding, display: bool| {
        assert_eq!(encoding, FormulaEncoding::Tex);
        recorded.lock().unwrap().push((source.to_string(), display));
        Ok::<_, FormulaError>(r#"<svg width="20" height="10"><rect width="20" height="10"/></svg>"#.to_string())
    });

    let clipboard = Arc::new(RecordingClipboard::default());
    let status = Rc::new(RecordingStatus::default());
    let pipeline = ExportPipeline::builder(ExportConfig::default())
        .formula_renderer(Arc::new(renderer))
        .clipboard(clipboard.clone())
        .status_sink(status.clone())
        .build()
        .unwrap();

    let report = pipeline
        .copy_html(&create_preview_html(BODY), Some(MARKDOWN))
        .await
        .unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            ("x^2".to_string(), false),
            ("y^2".to_string(), false),
            ("\\int f".to_string(), true),
        ]
    );
    assert_eq!(report.formulas.candidates, 3);
    assert_eq!(report.formulas.converted, 3);
    assert_eq!(report.clipboard_tier, Some(TierKind::SingleItem));

    let html = clipboard.last_html().unwrap();
    assert_eq!(html.matches("data:image/svg+xml;base64,").count(), 3);
    assert!(html.contains(r#"class="mp-content-section""#));
    assert!(html.contains("display: block"));
    for removed in ["<script", "onclick", "data-line", r#"id="p1""#, "markdown-preview-view"] {
        assert!(!html.contains(removed), "{removed} survived");
    }
    assert_eq!(report.html_len, html.len());

    assert_eq!(
        *status.statuses.lock().unwrap(),
        vec![CopyStatus::InFlight, CopyStatus::Succeeded]
    );
}

#[tokio::test]
async fn test_prepare_reads_sources_from_the_dom() {
    let pipeline = ExportPipeline::builder(ExportConfig::default())
        .formula_renderer(Arc::new(svg_renderer()))
        .clipboard(Arc::new(RecordingClipboard::default()))
        .build()
        .unwrap();

    let body = r#"<p><span class="mp-math" data-tex="a+b">a+b</span> and <span class="katex"><span class="katex-html">?</span></span></p>"#;
    let prepared = pipeline
        .prepare_html(&create_preview_html(body), None)
        .await
        .unwrap();

    assert_eq!(prepared.report.formulas.candidates, 2);
    assert_eq!(prepared.report.formulas.converted, 1);
    assert_eq!(prepared.report.formulas.misses, 1);
    assert!(prepared.html.contains(r#"alt="a+b""#));
    // The unresolved KaTeX node stays as it was
    assert!(prepared.html.contains(r#"<span class="katex"><span class="katex-html">?</span></span>"#));
    assert!(prepared.plain_text.contains("and"));
}

#[tokio::test]
async fn test_missing_content_section_is_a_contract_violation() {
    let clipboard = Arc::new(RecordingClipboard::default());
    let status = Rc::new(RecordingStatus::default());
    let pipeline = ExportPipeline::builder(ExportConfig::default())
        .clipboard(clipboard.clone())
        .status_sink(status.clone())
        .build()
        .unwrap();

    let err = pipeline
        .copy_html("<div><p>bare preview</p></div>", None)
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::MissingContentSection(_)));
    assert!(err.is_contract_violation());
    assert!(clipboard.item_writes.lock().unwrap().is_empty());
    assert_eq!(
        *status.statuses.lock().unwrap(),
        vec![CopyStatus::InFlight, CopyStatus::Failed]
    );
    let notices = status.notices.lock().unwrap();
    assert!(matches!(notices.as_slice(), [Notice::InvalidPreview(_)]));
}

#[tokio::test]
async fn test_caller_tree_is_not_modified() {
    let pipeline = ExportPipeline::builder(ExportConfig::default())
        .formula_renderer(Arc::new(svg_renderer()))
        .clipboard(Arc::new(RecordingClipboard::default()))
        .build()
        .unwrap();

    let root = mp_export::utils::dom::parse_root_element(&create_preview_html(BODY)).unwrap();
    let before = mp_export::utils::dom::outer_html(&root).unwrap();

    pipeline
        .copy(&root, &mp_export::extract_formula_sources(MARKDOWN))
        .await
        .unwrap();

    assert_eq!(mp_export::utils::dom::outer_html(&root).unwrap(), before);
}

fn font_stylesheet(server: &mockito::Server) -> String {
    format!(
        "@font-face {{ font-family: KaTeX_Main; src: url({}/KaTeX_Main.woff2) format(\"woff2\") }}",
        server.url()
    )
}

#[tokio::test]
async fn test_fonts_are_not_fetched_without_rasterized_formulas() {
    let mut server = mockito::Server::new_async().await;
    let font = server
        .mock("GET", "/KaTeX_Main.woff2")
        .expect(0)
        .create_async()
        .await;

    let pipeline = ExportPipeline::builder(ExportConfig::default())
        .stylesheets(vec![font_stylesheet(&server)])
        .formula_renderer(Arc::new(svg_renderer()))
        .clipboard(Arc::new(RecordingClipboard::default()))
        .build()
        .unwrap();

    let body = r#"<p style="font-family: KaTeX_Main">plain</p><p><span class="mp-math" data-tex="a">a</span></p>"#;
    let prepared = pipeline
        .prepare_html(&create_preview_html(body), None)
        .await
        .unwrap();

    assert_eq!(prepared.report.formulas.converted, 1);
    assert_eq!(prepared.report.fonts.total(), 0);
    font.assert_async().await;
}

#[tokio::test]
async fn test_rasterized_formula_fetches_its_font_once() {
    let mut server = mockito::Server::new_async().await;
    let font = server
        .mock("GET", "/KaTeX_Main.woff2")
        .with_status(200)
        .with_header("content-type", "font/woff2")
        .with_body("wOF2")
        .expect(1)
        .create_async()
        .await;

    let failing = FnRenderer(|_: &str, _: FormulaEncoding, _: bool| {
        Err::<String, _>(FormulaError::Render("Undefined control sequence".into()))
    });
    let pipeline = ExportPipeline::builder(ExportConfig::default())
        .stylesheets(vec![font_stylesheet(&server)])
        .formula_renderer(Arc::new(failing))
        .clipboard(Arc::new(RecordingClipboard::default()))
        .build()
        .unwrap();

    let body = r#"<p><span class="mp-math" data-tex="\bad" style="font-family: KaTeX_Main">a</span>
<span class="mp-math" data-tex="\worse" style="font-family: KaTeX_Main">b</span></p>"#;
    let prepared = pipeline
        .prepare_html(&create_preview_html(body), None)
        .await
        .unwrap();

    assert_eq!(prepared.report.formulas.rasterized, 2);
    assert_eq!(prepared.report.fonts.successes, 1);
    font.assert_async().await;
}

#[tokio::test]
async fn test_unrendered_markdown_formula_does_not_shift_sources() {
    let calls: Arc<Mutex<Vec<String>>> = Arc::default();
    let recorded = calls.clone();
    let renderer = FnRenderer(move |source: &str, _: FormulaEncoding, _: bool| {
        recorded.lock().unwrap().push(source.to_string());
        Ok::<_, FormulaError>(r#"<svg width="10" height="10"></svg>"#.to_string())
    });
    let pipeline = ExportPipeline::builder(ExportConfig::default())
        .formula_renderer(Arc::new(renderer))
        .clipboard(Arc::new(RecordingClipboard::default()))
        .build()
        .unwrap();

    // `$a$` sits in the Markdown but was not rendered into the preview
    let body = r#"<p><span class="mp-math" data-tex="b">b</span> <span class="mp-math" data-tex="c">c</span></p>"#;
    pipeline
        .prepare_html(&create_preview_html(body), Some("$a$ $b$ $c$"))
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["b".to_string(), "c".to_string()]);
}

#[test]
fn test_invalid_config_is_rejected_at_build() {
    let mut config = ExportConfig::default();
    config.formula.oversampling = 0.0;
    assert!(matches!(
        ExportPipeline::builder(config).build(),
        Err(ExportError::Config(_))
    ));
}
