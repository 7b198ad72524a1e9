use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rfcapture::clone::CloneEngine;
use rfcapture::dom::{DocumentSnapshot, NodeSnapshot, SourceDocument};
use rfcapture::resource::OfflineFetcher;
use rfcapture::style::DefaultStyleTable;
use rfcapture::{svg, xhtml, Capturer, Options};
use std::sync::Arc;

// Run with:
//    cargo bench --bench pipeline_bench

/// A list of `rows` cards, each with a heading, a paragraph and a form field.
fn sample_document(rows: usize) -> DocumentSnapshot {
    let mut list = NodeSnapshot::element("ul").size(800, 600);
    for i in 0..rows {
        let mut input = NodeSnapshot::element("input").attr("type", "text");
        input.value = Some(format!("value {}", i));
        list = list.child(
            NodeSnapshot::element("li")
                .attr("class", "card")
                .css("color", "rgb(20, 20, 20)")
                .css("padding", "4px")
                .child(NodeSnapshot::element("h2").child(NodeSnapshot::text_node(&format!("Card {}", i))))
                .child(NodeSnapshot::element("p").child(NodeSnapshot::text_node("Lorem ipsum <dolor> & sit amet")))
                .child(input),
        );
    }
    DocumentSnapshot::new(list)
}

fn bench_clone(c: &mut Criterion) {
    let doc = sample_document(200);
    let defaults = DefaultStyleTable::global();

    c.bench_function("clone_tree_200_cards", |b| {
        b.iter(|| {
            let tree = CloneEngine::new(&doc, defaults, None).clone_tree(doc.root()).unwrap();
            black_box(tree.node_count());
        })
    });
}

fn bench_serialize(c: &mut Criterion) {
    let doc = sample_document(200);
    let tree = CloneEngine::new(&doc, DefaultStyleTable::global(), None)
        .clone_tree(doc.root())
        .unwrap();

    c.bench_function("serialize_xhtml_200_cards", |b| {
        b.iter(|| black_box(xhtml::serialize(&tree, tree.root()).unwrap().len()))
    });
    c.bench_function("svg_data_uri_200_cards", |b| {
        b.iter(|| {
            let mut tree = tree.clone();
            black_box(svg::make_svg_data_uri(&mut tree, 800, 600).unwrap().len())
        })
    });
}

fn bench_to_svg(c: &mut Criterion) {
    let doc = sample_document(50);
    let capturer = Capturer::with_fetcher(Arc::new(OfflineFetcher));
    let options = Options::default();
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("to_svg_50_cards", |b| {
        b.iter(|| black_box(rt.block_on(capturer.to_svg(&doc, doc.root(), &options)).unwrap().len()))
    });
}

criterion_group!(benches, bench_clone, bench_serialize, bench_to_svg);
criterion_main!(benches);
