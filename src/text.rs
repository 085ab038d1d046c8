use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TypingError};

/// A contiguous run of characters sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    pub style: Option<String>,
    pub text: String,
}

/// The ordered runs of one part. Adjacent runs never share a style and no run is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledText {
    runs: Vec<StyledRun>,
}

impl StyledText {
    pub fn runs(&self) -> &[StyledRun] {
        &self.runs
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.runs.iter().map(|run| run.text.chars().count()).sum()
    }

    pub fn clear(&mut self) {
        self.runs.clear();
    }

    pub fn push_str(&mut self, text: &str, style: Option<&str>) {
        if text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.style.as_deref() == style => last.text.push_str(text),
            _ => self.runs.push(StyledRun {
                style: style.map(str::to_string),
                text: text.to_string(),
            }),
        }
    }

    pub fn push_char(&mut self, c: char, style: Option<&str>) {
        let mut buf = [0u8; 4];
        self.push_str(c.encode_utf8(&mut buf), style);
    }

    /// Remove and return the last character.
    pub fn pop_char(&mut self) -> Option<char> {
        let last = self.runs.last_mut()?;
        let c = last.text.pop();
        if last.text.is_empty() {
            self.runs.pop();
        }
        c
    }

    /// Remove `count` trailing characters, spanning style boundaries as needed.
    ///
    /// Fails without modifying anything if fewer than `count` characters exist.
    pub fn truncate_end(&mut self, count: usize, part: &str) -> Result<()> {
        if count > self.len() {
            return Err(TypingError::EraseBeyondText {
                part: part.to_string(),
            });
        }
        let mut remaining = count;
        while remaining > 0 {
            let Some(last) = self.runs.last_mut() else {
                break;
            };
            let run_len = last.text.chars().count();
            if run_len <= remaining {
                remaining -= run_len;
                self.runs.pop();
            } else {
                let keep = run_len - remaining;
                let cut = last
                    .text
                    .char_indices()
                    .nth(keep)
                    .map(|(idx, _)| idx)
                    .unwrap_or(last.text.len());
                last.text.truncate(cut);
                remaining = 0;
            }
        }
        Ok(())
    }

    /// Characters with their style, in display order.
    pub fn styled_chars(&self) -> impl Iterator<Item = (char, Option<&str>)> + '_ {
        self.runs
            .iter()
            .flat_map(|run| run.text.chars().map(move |c| (c, run.style.as_deref())))
    }

    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    /// Number of leading characters equal in both character and style.
    pub fn common_prefix_len(&self, other: &StyledText) -> usize {
        self.styled_chars()
            .zip(other.styled_chars())
            .take_while(|(a, b)| a == b)
            .count()
    }

    pub fn render(&self, markup: &Markup) -> String {
        let mut out = String::new();
        for run in &self.runs {
            match &run.style {
                Some(style) => out.push_str(&markup.wrap(style, &run.text)),
                None => out.push_str(&run.text),
            }
        }
        out
    }
}

type WrapFn = dyn Fn(&str, &str) -> String + Send + Sync;

/// How a styled run is annotated in a snapshot.
#[derive(Clone)]
pub struct Markup {
    wrap: Arc<WrapFn>,
}

impl Markup {
    pub fn new(wrap: impl Fn(&str, &str) -> String + Send + Sync + 'static) -> Self {
        Self {
            wrap: Arc::new(wrap),
        }
    }

    /// `<span class="STYLE">TEXT</span>`
    pub fn html_span() -> Self {
        Self::new(|style, text| format!("<span class=\"{style}\">{text}</span>"))
    }

    pub fn wrap(&self, style: &str, text: &str) -> String {
        (self.wrap)(style, text)
    }
}

impl Default for Markup {
    fn default() -> Self {
        Self::html_span()
    }
}

impl fmt::Debug for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Markup").finish_non_exhaustive()
    }
}

/// What the sink receives after each display change.
///
/// The variant is fixed for the lifetime of an engine: `Plain` without named parts, `Parts`
/// with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Plain(String),
    Parts(BTreeMap<String, String>),
}

impl Snapshot {
    /// Rendered text of `part`, or of the whole snapshot in `Plain` mode.
    pub fn part(&self, part: &str) -> Option<&str> {
        match self {
            Snapshot::Plain(text) => Some(text),
            Snapshot::Parts(parts) => parts.get(part).map(String::as_str),
        }
    }

    pub fn as_plain(&self) -> Option<&str> {
        match self {
            Snapshot::Plain(text) => Some(text),
            Snapshot::Parts(_) => None,
        }
    }
}
