//! Font-face resolver: collect the document's web fonts and embed them.

use crate::dom::{CssRule, SourceDocument};
use crate::inliner;
use crate::resource::{data_url, ResourceCache};
use crate::style::StyleDeclaration;
use crate::Result;
use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};
use futures::future::try_join_all;

/// One `@font-face` rule that references remote files.
///
/// `family` and `sources` are not needed to embed the rule; they are exposed
/// so hosts can report or preload what a capture is about to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct WebFontRule {
    /// Unquoted `font-family` descriptor
    pub family: String,
    /// Absolute source URL and its `format()` hint, in `src` order
    pub sources: Vec<(String, Option<String>)>,
    pub css_text: String,
    /// URL of the owning stylesheet; relative sources resolve against it
    pub base_url: Option<String>,
}

impl WebFontRule {
    /// `None` unless the rule's `src` references at least one non-data URL.
    pub fn from_rule(css_text: &str, descriptors: &StyleDeclaration, base_url: Option<&str>) -> Option<Self> {
        let src = descriptors.get("src").unwrap_or_default();
        if !inliner::should_process(src) || inliner::read_urls(src).is_empty() {
            return None;
        }

        let sources = parse_sources(src)
            .into_iter()
            .filter(|(url, _)| !data_url::is_data_url(url))
            .map(|(url, format)| {
                let url = match base_url {
                    Some(base) => inliner::resolve_url(&url, base).unwrap_or(url),
                    None => url,
                };
                (url, format)
            })
            .collect();

        Some(Self {
            family: parse_family(descriptors.get("font-family").unwrap_or_default()),
            sources,
            css_text: css_text.to_string(),
            base_url: base_url.map(str::to_string),
        })
    }

    /// The rule's CSS with every remote source replaced by a data URI.
    pub async fn resolve(&self, cache: &ResourceCache) -> Result<String> {
        inliner::inline_all(&self.css_text, self.base_url.as_deref(), cache).await
    }
}

/// `url()` sources of a `src` descriptor with their `format()` hints;
/// `local()` entries are dropped.
fn parse_sources(src: &str) -> Vec<(String, Option<String>)> {
    let mut input = ParserInput::new(src);
    let mut parser = Parser::new(&mut input);
    let mut sources = Vec::new();
    while !parser.is_exhausted() {
        if let Ok(Some(source)) = parser.parse_until_after(Delimiter::Comma, |p| parse_source(p)) {
            sources.push(source);
        }
    }
    sources
}

fn parse_source<'i, 't>(
    input: &mut Parser<'i, 't>,
) -> std::result::Result<Option<(String, Option<String>)>, ParseError<'i, ()>> {
    let token = input.next()?.clone();
    let url = match token {
        Token::UnquotedUrl(url) => url.to_string(),
        Token::Function(name) if name.eq_ignore_ascii_case("url") => {
            input.parse_nested_block(|p| Ok::<_, ParseError<'i, ()>>(p.expect_string()?.to_string()))?
        }
        _ => {
            while input.next().is_ok() {}
            return Ok(None);
        }
    };

    let mut format = None;
    while let Ok(token) = input.next().cloned() {
        if let Token::Function(name) = token {
            if name.eq_ignore_ascii_case("format") {
                let hint = input
                    .parse_nested_block(|p| Ok::<_, ParseError<'i, ()>>(p.expect_ident_or_string()?.to_string()))?;
                format = Some(hint);
            }
        }
    }
    Ok(Some((url, format)))
}

/// First family name of a `font-family` value, unquoted.
fn parse_family(value: &str) -> String {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut words = Vec::new();
    while let Ok(token) = parser.next() {
        match token {
            Token::QuotedString(name) if words.is_empty() => return name.to_string(),
            Token::Ident(word) => words.push(word.to_string()),
            _ => break,
        }
    }
    words.join(" ")
}

/// Every embeddable web font of the document. Stylesheets whose rules
/// cannot be read are skipped.
pub fn read_all<D: SourceDocument + ?Sized>(document: &D) -> Vec<WebFontRule> {
    let mut rules = Vec::new();
    for sheet in document.style_sheets() {
        let sheet = match sheet {
            Ok(sheet) => sheet,
            Err(e) => {
                log::warn!("Error while reading CSS rules: {}", e);
                continue;
            }
        };
        for rule in &sheet.rules {
            if let CssRule::FontFace { css_text, descriptors } = rule {
                if let Some(font) = WebFontRule::from_rule(css_text, descriptors, sheet.href.as_deref()) {
                    rules.push(font);
                }
            }
        }
    }
    rules
}

/// CSS text embedding every web font of the document, one rule per line.
/// Empty when there is nothing to embed.
pub async fn resolve_all<D: SourceDocument + ?Sized>(document: &D, cache: &ResourceCache) -> Result<String> {
    let rules = read_all(document);
    if rules.is_empty() {
        return Ok(String::new());
    }
    log::debug!("embedding {} web font rule(s)", rules.len());
    for rule in &rules {
        let urls: Vec<&str> = rule.sources.iter().map(|(url, _)| url.as_str()).collect();
        log::debug!("font-family {:?} from {}", rule.family, urls.join(", "));
    }
    let css = try_join_all(rules.iter().map(|rule| rule.resolve(cache))).await?;
    Ok(css.join("\n"))
}
