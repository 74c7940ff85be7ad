//! Prioritized field extraction over a listing card.
//!
//! Each field is described by a list of [`Strategy`] values tried in order;
//! the first one that yields a non-empty value wins.

use scraper::{ElementRef, Selector};

/// Parse a selector known at compile time
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}

/// Rendered text of an element with whitespace collapsed
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: String) -> Option<String> {
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[derive(Debug, Clone)]
pub enum Strategy {
    /// Text of the first element matching the selector
    Text(Selector),
    /// Attribute value of the first element matching the selector
    Attr(Selector, &'static str),
    /// First `scope` element whose text contains `label`; its `inner` child's
    /// text when given, otherwise its own text
    Labelled {
        scope: Selector,
        label: &'static str,
        inner: Option<Selector>,
    },
    /// First `scope` element whose text contains `suffix`, keeping only what
    /// precedes the suffix (`3 KT` -> `3`)
    BeforeSuffix {
        scope: Selector,
        suffix: &'static str,
    },
}

impl Strategy {
    pub fn text(css: &str) -> Self {
        Strategy::Text(selector(css))
    }

    pub fn attr(css: &str, attr: &'static str) -> Self {
        Strategy::Attr(selector(css), attr)
    }

    pub fn labelled(css: &str, label: &'static str, inner: Option<&str>) -> Self {
        Strategy::Labelled {
            scope: selector(css),
            label,
            inner: inner.map(selector),
        }
    }

    pub fn before_suffix(css: &str, suffix: &'static str) -> Self {
        Strategy::BeforeSuffix {
            scope: selector(css),
            suffix,
        }
    }

    pub fn apply(&self, card: ElementRef<'_>) -> Option<String> {
        match self {
            Strategy::Text(sel) => card.select(sel).next().map(element_text).and_then(non_empty),
            Strategy::Attr(sel, attr) => card
                .select(sel)
                .next()
                .and_then(|el| el.value().attr(attr))
                .map(str::to_string)
                .and_then(non_empty),
            Strategy::Labelled { scope, label, inner } => {
                let el = card.select(scope).find(|el| element_text(*el).contains(*label))?;
                match inner {
                    Some(inner) => el.select(inner).next().map(element_text).and_then(non_empty),
                    None => non_empty(element_text(el)),
                }
            }
            Strategy::BeforeSuffix { scope, suffix } => {
                let text = card
                    .select(scope)
                    .map(element_text)
                    .find(|text| text.contains(*suffix))?;
                let head = text.split(*suffix).next().unwrap_or_default();
                non_empty(head.to_string())
            }
        }
    }
}

/// Run strategies in order; the first value wins
pub fn first_match(strategies: &[Strategy], card: ElementRef<'_>) -> Option<String> {
    strategies.iter().find_map(|s| s.apply(card))
}
