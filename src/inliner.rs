//! Resource inliner: replace `url(...)` references in CSS text with `data:`
//! URIs.

use crate::resource::{data_url, ResourceCache};
use crate::Result;
use regex::{Captures, Regex};
use std::sync::OnceLock;
use url::Url;

fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| {
        Regex::new(r#"url\(['"]?([^'"]+?)['"]?\)"#).expect("url() pattern is valid")
    })
}

/// Whether `text` contains at least one `url(...)` reference.
pub fn should_process(text: &str) -> bool {
    url_regex().is_match(text)
}

/// Every non-data URL referenced through `url(...)`, in order of appearance.
pub fn read_urls(text: &str) -> Vec<String> {
    url_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|url| !data_url::is_data_url(url))
        .collect()
}

/// Resolve `url` against `base` the way a `<base href>` would.
pub fn resolve_url(url: &str, base: &str) -> Result<String> {
    let base = Url::parse(base)?;
    Ok(base.join(url)?.to_string())
}

/// Inline a single reference: fetch `url` (resolved against `base_url`) and
/// substitute every `url(<url>)` occurrence in `text` with its data URI.
pub async fn inline(
    text: &str,
    url: &str,
    base_url: Option<&str>,
    cache: &ResourceCache,
) -> Result<String> {
    let target = match base_url {
        Some(base) => resolve_url(url, base)?,
        None => url.to_string(),
    };
    let payload = cache.get_and_encode(&target).await?;
    let data_url = data_url::data_as_url(&payload, data_url::mime_type(url));

    let pattern = format!(r#"(url\(['"]?)({})(['"]?\))"#, regex::escape(url));
    let re = Regex::new(&pattern)
        .map_err(|e| crate::Error::Other(format!("bad url pattern for {}: {}", url, e)))?;
    let replaced = re.replace_all(text, |caps: &Captures<'_>| {
        format!("{}{}{}", &caps[1], data_url, &caps[3])
    });
    Ok(replaced.into_owned())
}

/// Inline every non-data `url(...)` of `text`.
///
/// References are processed one after another so repeated URLs hit the
/// cache entry of the first one. Text without references is returned as-is.
pub async fn inline_all(text: &str, base_url: Option<&str>, cache: &ResourceCache) -> Result<String> {
    if !should_process(text) {
        return Ok(text.to_string());
    }
    let mut current = text.to_string();
    for url in read_urls(text) {
        current = inline(&current, &url, base_url, cache).await?;
    }
    Ok(current)
}
