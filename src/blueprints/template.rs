//! String templates with `{path}` placeholders.
//!
//! A placeholder names a sibling field (`{damage}` or `{self.damage}`), a
//! meta value (`{meta.seed}`, `{meta.<option>}`) or a field of a related
//! blueprint (`{meta.source.name}`, `{meta.parent.name}`). `{{` and `}}`
//! render literal braces.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use super::resolve::ResolveError;
use super::value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("Unbalanced brace at offset {offset} in template `{template}`")]
    Unbalanced { template: String, offset: usize },

    #[error("Empty placeholder in template `{0}`")]
    EmptyPlaceholder(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Path(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let unbalanced = |offset| TemplateError::Unbalanced {
            template: text.to_string(),
            offset,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();
        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut path = String::new();
                    let mut closed = false;
                    for (_, p) in chars.by_ref() {
                        match p {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(unbalanced(offset)),
                            _ => path.push(p),
                        }
                    }
                    if !closed {
                        return Err(unbalanced(offset));
                    }
                    let path = path.trim();
                    if path.is_empty() {
                        return Err(TemplateError::EmptyPlaceholder(text.to_string()));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Path(path.to_string()));
                }
                '}' => return Err(unbalanced(offset)),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: text.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Sibling field names the template reads, directly or through a dotted
    /// path into a nested value. `meta.*` paths read no sibling.
    pub fn field_refs(&self) -> BTreeSet<String> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Path(p) => {
                    let p = p.strip_prefix("self.").unwrap_or(p);
                    let head = p.split_once('.').map_or(p, |(head, _)| head);
                    (head != "meta").then(|| head.to_string())
                }
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub fn render<F>(&self, mut lookup: F) -> Result<String, ResolveError>
    where
        F: FnMut(&str) -> Result<Value, ResolveError>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Path(path) => out.push_str(&lookup(path)?.to_string()),
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
