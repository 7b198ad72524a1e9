//! Inline style declarations of cloned elements.

pub mod capture;
pub mod defaults;

pub use capture::StyleCapture;
pub use defaults::DefaultStyleTable;

use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};

/// One `name: value [!important]` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// The inline `style` of a cloned element.
///
/// Setting an existing property replaces it in place; serialization follows
/// insertion order so output is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleDeclaration {
    declarations: Vec<Declaration>,
}

impl StyleDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a declaration block body (`a: b; c: d !important`).
    ///
    /// Semicolons inside quotes or parentheses (`url(data:...;base64,...)`)
    /// do not split declarations. Malformed entries are skipped.
    pub fn from_css_text(css_text: &str) -> Self {
        let mut style = Self::new();
        style.set_css_text(css_text);
        style
    }

    /// Replace every declaration with the parsed `css_text`.
    pub fn set_css_text(&mut self, css_text: &str) {
        let mut input = ParserInput::new(css_text);
        let mut parser = Parser::new(&mut input);
        *self = parse_block(&mut parser);
    }

    pub fn set_property(&mut self, name: &str, value: &str, important: bool) {
        // Custom properties are case sensitive, everything else is not.
        let name = if name.starts_with("--") {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        };
        if let Some(decl) = self.declarations.iter_mut().find(|d| d.name == name) {
            decl.value = value.to_string();
            decl.important = important;
        } else {
            self.declarations.push(Declaration {
                name,
                value: value.to_string(),
                important,
            });
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(name).map(|d| d.value.as_str())
    }

    pub fn is_important(&self, name: &str) -> bool {
        self.find(name).map(|d| d.important).unwrap_or(false)
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Declaration> {
        let idx = self.declarations.iter().position(|d| d.name == name)?;
        Some(self.declarations.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Serialized form used for the `style` attribute and synthetic rules.
    pub fn css_text(&self) -> String {
        let mut out = String::new();
        for decl in &self.declarations {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&decl.name);
            out.push_str(": ");
            out.push_str(&decl.value);
            if decl.important {
                out.push_str(" !important");
            }
            out.push(';');
        }
        out
    }

    fn find(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }
}

/// Read a declaration list up to the end of `input`.
pub(crate) fn parse_block(input: &mut Parser) -> StyleDeclaration {
    let mut style = StyleDeclaration::new();
    while !input.is_exhausted() {
        if let Ok(decl) = input.parse_until_after(Delimiter::Semicolon, |p| parse_declaration(p)) {
            style.set_property(&decl.name, &decl.value, decl.important);
        }
    }
    style
}

fn parse_declaration<'i, 't>(input: &mut Parser<'i, 't>) -> Result<Declaration, ParseError<'i, ()>> {
    let name = input.expect_ident()?.to_string();
    input.expect_colon()?;

    let start = input.position();
    let mut end = start;
    let mut important = false;
    loop {
        match input.next() {
            Ok(&Token::Delim('!')) => {
                if input.try_parse(|p| p.expect_ident_matching("important")).is_ok() {
                    important = true;
                    break;
                }
                end = input.position();
            }
            Ok(token) => {
                let opens_block = matches!(
                    token,
                    Token::Function(_)
                        | Token::ParenthesisBlock
                        | Token::SquareBracketBlock
                        | Token::CurlyBracketBlock
                );
                if opens_block {
                    input.parse_nested_block(|p| {
                        while p.next().is_ok() {}
                        Ok::<_, ParseError<'i, ()>>(())
                    })?;
                }
                end = input.position();
            }
            Err(_) => break,
        }
    }

    let value = input.slice(start..end).trim();
    if value.is_empty() {
        return Err(input.new_custom_error(()));
    }
    Ok(Declaration {
        name,
        value: value.to_string(),
        important,
    })
}
