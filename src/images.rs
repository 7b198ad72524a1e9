//! Image inliner: embed background images and `<img>` sources of a clone.

use crate::clone::{CloneTree, Namespace, NodeId};
use crate::inliner;
use crate::resource::{data_url, ResourceCache};
use crate::Result;
use futures::future::{join_all, try_join_all};

const BACKGROUND_PROPERTIES: [&str; 2] = ["background", "background-image"];

struct Background {
    id: NodeId,
    property: &'static str,
    value: String,
    important: bool,
}

/// Inline every background `url()` and `<img src>` below the clone root.
///
/// A background that cannot be fetched fails the whole call; an image that
/// cannot be fetched keeps its original `src`.
pub async fn inline_all(tree: &mut CloneTree, cache: &ResourceCache) -> Result<()> {
    let mut backgrounds = Vec::new();
    let mut images = Vec::new();
    for (id, el) in tree.elements() {
        for property in BACKGROUND_PROPERTIES {
            if let Some(value) = el.style.get(property).filter(|v| inliner::should_process(v)) {
                backgrounds.push(Background {
                    id,
                    property,
                    value: value.to_string(),
                    important: el.style.is_important(property),
                });
            }
        }
        if el.namespace == Namespace::Html && el.tag.eq_ignore_ascii_case("img") {
            if let Some(src) = el.attribute("src").filter(|s| !data_url::is_data_url(s)) {
                images.push((id, src.to_string()));
            }
        }
    }

    let inlined = try_join_all(
        backgrounds
            .iter()
            .map(|bg| inliner::inline_all(&bg.value, None, cache)),
    )
    .await?;
    let sources = join_all(images.iter().map(|(_, src)| inline_image(src, cache))).await;

    for (bg, value) in backgrounds.iter().zip(inlined) {
        if let Some(style) = tree.style_mut(bg.id) {
            style.set_property(bg.property, &value, bg.important);
        }
    }
    for ((id, _), src) in images.iter().zip(sources) {
        if let Some(src) = src {
            tree.set_attribute(*id, "src", &src);
        }
    }
    Ok(())
}

async fn inline_image(src: &str, cache: &ResourceCache) -> Option<String> {
    match cache.get_and_encode(src).await {
        Ok(payload) => Some(data_url::data_as_url(&payload, data_url::mime_type(src))),
        Err(e) => {
            log::warn!("image left as-is: {}", e);
            None
        }
    }
}
