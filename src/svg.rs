//! SVG assembler: wrap the serialized clone in a `foreignObject`.

use crate::clone::CloneTree;
use crate::dom::{SVG_NAMESPACE, XHTML_NAMESPACE};
use crate::{util, xhtml, Result};

pub const SVG_DATA_URI_PREFIX: &str = "data:image/svg+xml;charset=utf-8,";

/// Build the `data:image/svg+xml` URI of `tree` drawn at `width` x `height`.
pub fn make_svg_data_uri(tree: &mut CloneTree, width: u32, height: u32) -> Result<String> {
    let root = tree.root();
    tree.set_attribute(root, "xmlns", XHTML_NAMESPACE);
    let xhtml = util::escape_xhtml(&xhtml::serialize(tree, root)?);
    let foreign_object = format!(
        "<foreignObject x=\"0\" y=\"0\" width=\"100%\" height=\"100%\">{}</foreignObject>",
        xhtml
    );
    let svg = format!(
        "<svg xmlns=\"{}\" width=\"{}\" height=\"{}\">{}</svg>",
        SVG_NAMESPACE, width, height, foreign_object
    );
    Ok(format!("{}{}", SVG_DATA_URI_PREFIX, svg))
}
