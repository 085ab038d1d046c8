use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypingError};

/// Row-organized character grid of one keyboard locale.
///
/// Row 0 is the number/symbol row. A character should appear at most once per case grid;
/// lookups take the first match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardLayout {
    /// Unshifted characters, one string per row, top row first.
    pub lower: Vec<String>,
    /// Shifted characters, one string per row, top row first.
    pub upper: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCase {
    Lower,
    Upper,
}

/// Where a character sits on a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPosition {
    pub case: KeyCase,
    pub row: usize,
    pub column: usize,
}

impl KeyboardLayout {
    pub fn new(lower: &[&str], upper: &[&str]) -> Self {
        Self {
            lower: lower.iter().map(|row| row.to_string()).collect(),
            upper: upper.iter().map(|row| row.to_string()).collect(),
        }
    }

    pub fn rows(&self, case: KeyCase) -> &[String] {
        match case {
            KeyCase::Lower => &self.lower,
            KeyCase::Upper => &self.upper,
        }
    }

    /// Locate `c`, searching the lowercase grid before the uppercase one.
    pub fn position_of(&self, c: char) -> Option<KeyPosition> {
        [KeyCase::Lower, KeyCase::Upper].into_iter().find_map(|case| {
            self.rows(case).iter().enumerate().find_map(|(row, keys)| {
                keys.chars()
                    .position(|k| k == c)
                    .map(|column| KeyPosition { case, row, column })
            })
        })
    }

    /// Character at `(row, column)` of the given case grid, if in bounds.
    pub fn char_at(&self, case: KeyCase, row: usize, column: usize) -> Option<char> {
        self.rows(case).get(row)?.chars().nth(column)
    }

    pub fn row_len(&self, case: KeyCase, row: usize) -> usize {
        self.rows(case)
            .get(row)
            .map(|keys| keys.chars().count())
            .unwrap_or(0)
    }
}

pub fn us_qwerty() -> KeyboardLayout {
    KeyboardLayout::new(
        &["1234567890-=", "qwertyuiop[]", "asdfghjkl;", "zxcvbnm,./", " "],
        &["!@#$%^&*()_+", "QWERTYUIOP{}|", "ASDFGHJKL:\"", "ZXCVBNM?", " "],
    )
}

pub fn de_qwertz() -> KeyboardLayout {
    KeyboardLayout::new(
        &["1234567890ß", "qwertzuiopü+", "asdfghjklöä#", "yxcvbnm,.-", " "],
        &["!\"§$%&/()=?", "QWERTZUIOPÜ*", "ASDFGHJKLÖÄ'", "YXCVBNM;:_", " "],
    )
}

/// Locale name to layout mapping, owned by a single engine instance.
#[derive(Debug, Clone)]
pub struct Keyboards {
    layouts: HashMap<String, KeyboardLayout>,
}

impl Default for Keyboards {
    fn default() -> Self {
        let mut layouts = HashMap::new();
        layouts.insert("en".to_string(), us_qwerty());
        layouts.insert("de".to_string(), de_qwertz());
        Self { layouts }
    }
}

impl Keyboards {
    pub fn empty() -> Self {
        Self {
            layouts: HashMap::new(),
        }
    }

    /// Register or overwrite the layout for `locale`. Last write wins.
    pub fn add_keyboard(&mut self, locale: impl Into<String>, layout: KeyboardLayout) {
        self.layouts.insert(locale.into(), layout);
    }

    pub fn get(&self, locale: &str) -> Result<&KeyboardLayout> {
        self.layouts
            .get(locale)
            .ok_or_else(|| TypingError::UnknownLocale {
                locale: locale.to_string(),
            })
    }

    pub fn ensure_locale(&self, locale: &str) -> Result<()> {
        self.get(locale).map(|_| ())
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }
}
