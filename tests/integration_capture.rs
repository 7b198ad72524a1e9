//! End-to-end SVG captures of recorded documents (no network).

mod common;

use common::svg_markup;
use rfcapture::dom::snapshot::StyleSnapshot;
use rfcapture::dom::{DocumentSnapshot, NodeInfo, NodeSnapshot, SourceDocument};
use rfcapture::resource::OfflineFetcher;
use rfcapture::{CloneHook, Capturer, NodeFilter, Options};
use std::sync::Arc;

fn capturer() -> Capturer {
    Capturer::with_fetcher(Arc::new(OfflineFetcher))
}

fn card() -> DocumentSnapshot {
    let mut input = NodeSnapshot::element("input").attr("type", "text");
    input.value = Some("typed by user".into());
    let mut textarea = NodeSnapshot::element("textarea");
    textarea.value = Some("edited".into());

    DocumentSnapshot::new(
        NodeSnapshot::element("div")
            .attr("class", "card secret")
            .css("background-color", "rgb(255, 0, 0)")
            .css("left", "30px")
            .size(200, 100)
            .child(NodeSnapshot::element("h1").child(NodeSnapshot::text_node("Hello & welcome")))
            .child(
                NodeSnapshot::element("aside")
                    .attr("class", "secret")
                    .attr("data-token", "hunter2")
                    .child(NodeSnapshot::text_node("private")),
            )
            .child(input)
            .child(textarea),
    )
    .with_default_style(
        "div",
        StyleSnapshot::new()
            .with("background-color", "rgba(0, 0, 0, 0)")
            .with("left", "auto"),
    )
}

#[tokio::test]
async fn svg_wraps_xhtml_in_foreign_object() {
    let doc = card();
    let uri = capturer()
        .to_svg(&doc, doc.root(), &Options::default())
        .await
        .expect("capture");
    assert!(uri.starts_with("data:image/svg+xml;charset=utf-8,<svg "));

    let markup = svg_markup(&uri);
    assert!(markup.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100">"#));
    assert!(markup.contains(r#"<foreignObject x="0" y="0" width="100%" height="100%"><div xmlns="http://www.w3.org/1999/xhtml" class="card secret""#));
    assert!(markup.contains("background-color: rgb(255, 0, 0);"));
    // Root offsets are reset so the capture starts at its own origin.
    assert!(markup.contains("left: 0px;"));
    assert!(markup.contains("<h1>Hello &amp; welcome</h1>"));
}

#[tokio::test]
async fn filter_excludes_subtrees_but_not_the_root() {
    let doc = card();
    let options = Options {
        filter: Some(NodeFilter::new(|node| {
            !node
                .attribute("class")
                .map(|c| c.split_whitespace().any(|c| c == "secret"))
                .unwrap_or(false)
        })),
        ..Default::default()
    };
    let markup = svg_markup(&capturer().to_svg(&doc, doc.root(), &options).await.unwrap());

    assert!(markup.contains("class=\"card secret\""), "root is never filtered");
    assert!(!markup.contains("<aside"));
    assert!(!markup.contains("hunter2"));
    assert!(!markup.contains("private"));
    assert!(markup.contains("<h1>"));
}

#[tokio::test]
async fn form_values_survive_serialization() {
    let doc = card();
    let markup = svg_markup(&capturer().to_svg(&doc, doc.root(), &Options::default()).await.unwrap());
    assert!(markup.contains(r#"<input type="text" value="typed by user"/>"#));
    assert!(markup.contains("<textarea>edited</textarea>"));
}

#[tokio::test]
async fn pseudo_elements_are_reproduced() {
    let mut root = NodeSnapshot::element("p").size(50, 20);
    root.after = Some(
        StyleSnapshot::new()
            .with("content", "\"!\"")
            .with("color", "rgb(0, 128, 0)"),
    );
    let doc = DocumentSnapshot::new(root.child(NodeSnapshot::text_node("Hi")));
    let markup = svg_markup(&capturer().to_svg(&doc, doc.root(), &Options::default()).await.unwrap());

    let class_start = markup.find("<p xmlns=\"http://www.w3.org/1999/xhtml\" class=\"").expect("class on clone")
        + "<p xmlns=\"http://www.w3.org/1999/xhtml\" class=\"".len();
    let class = &markup[class_start..markup[class_start..].find('"').unwrap() + class_start];
    assert!(class.len() >= 4);
    assert!(markup.contains(&format!(
        "<style>.{}:after{{color: rgb(0, 128, 0); content: \"!\";}}</style>",
        class
    )));
}

#[tokio::test]
async fn svg_children_get_namespace_and_geometry() {
    let doc = DocumentSnapshot::new(
        NodeSnapshot::element("div").size(10, 10).child(
            NodeSnapshot::svg("svg")
                .attr("viewBox", "0 0 10 10")
                .child(NodeSnapshot::svg("rect").attr("width", "5").attr("height", "6")),
        ),
    );
    let markup = svg_markup(&capturer().to_svg(&doc, doc.root(), &Options::default()).await.unwrap());
    assert!(markup.contains(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10">"#));
    assert!(markup.contains(
        r#"<rect xmlns="http://www.w3.org/2000/svg" width="5" height="6" style="width: 5; height: 6;"/>"#
    ));
}

#[tokio::test]
async fn options_and_onclone_shape_the_root() {
    let doc = card();
    let options = Options {
        width: Some(320),
        height: Some(240),
        bgcolor: Some("white".into()),
        style: vec![("transform".into(), "scale(2)".into())],
        onclone: Some(CloneHook::new(|tree| {
            let root = tree.root();
            tree.set_attribute(root, "data-captured", "yes");
        })),
        ..Default::default()
    };
    let markup = svg_markup(&capturer().to_svg(&doc, doc.root(), &options).await.unwrap());
    assert!(markup.contains(r#"width="320" height="240""#));
    assert!(markup.contains("data-captured=\"yes\""));
    // Overrides replace captured values in place and append the rest.
    assert!(markup.contains(
        "style=\"background-color: white; left: 0px; width: 320px; height: 240px; transform: scale(2);\""
    ));
}

#[tokio::test]
async fn cross_origin_sheets_do_not_abort_the_capture() {
    let mut doc = DocumentSnapshot::new(NodeSnapshot::element("div").size(10, 10));
    doc.style_sheets.push(rfcapture::dom::snapshot::StyleSheetSnapshot {
        href: Some("https://fonts.example.com/css".into()),
        css: String::new(),
        cross_origin: true,
    });
    let markup = svg_markup(&capturer().to_svg(&doc, doc.root(), &Options::default()).await.unwrap());
    assert!(!markup.contains("<style>"));
}

#[tokio::test]
async fn invalid_options_are_rejected_before_capturing() {
    let doc = card();
    let options = Options {
        quality: 2.0,
        ..Default::default()
    };
    let err = capturer().to_svg(&doc, doc.root(), &options).await.unwrap_err();
    assert!(matches!(err, rfcapture::Error::ConfigError(_)));
}

fn paragraph(default_color: &str) -> DocumentSnapshot {
    DocumentSnapshot::new(
        NodeSnapshot::element("p")
            .css("color", "rgb(0, 0, 0)")
            .size(40, 10)
            .child(NodeSnapshot::text_node("x")),
    )
    .with_default_style("p", StyleSnapshot::new().with("color", default_color))
}

#[tokio::test]
async fn default_styles_are_not_shared_between_documents() {
    let capturer = capturer();
    let black = paragraph("rgb(0, 0, 0)");
    let red = paragraph("rgb(255, 0, 0)");

    let first = svg_markup(&capturer.to_svg(&black, black.root(), &Options::default()).await.unwrap());
    assert!(!first.contains("color: rgb(0, 0, 0);"));

    let second = svg_markup(&capturer.to_svg(&red, red.root(), &Options::default()).await.unwrap());
    assert!(second.contains("color: rgb(0, 0, 0);"));
}
