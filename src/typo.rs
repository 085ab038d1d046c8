use rand::seq::SliceRandom;
use rand::Rng;

use crate::keyboard::KeyboardLayout;

/// Anything that is not a letter or digit.
pub fn is_special_char(c: char) -> bool {
    !c.is_alphanumeric()
}

/// Pick a plausible mistyped character next to `intended` on `layout`.
///
/// Only same-case neighbors within one row and two columns are considered. The number row
/// is never hit unless `intended` is on it, and a letter/digit never turns into a symbol (or
/// the other way round). Returns `None` if `intended` is not on the layout or nothing nearby
/// qualifies.
pub fn nearby_char(layout: &KeyboardLayout, intended: char, rng: &mut impl Rng) -> Option<char> {
    let pos = layout.position_of(intended)?;
    let threshold: i64 = if rng.gen_bool(0.5) { 2 } else { 1 };
    let intended_special = is_special_char(intended);

    let mut candidates = Vec::new();
    for dr in -1i64..=1 {
        for dc in -2i64..=2 {
            if (dr == 0 && dc == 0) || dr.abs() + dc.abs() > threshold {
                continue;
            }
            let row = pos.row as i64 + dr;
            let column = pos.column as i64 + dc;
            if row < 0 || column < 0 {
                continue;
            }
            if row == 0 && pos.row != 0 {
                continue;
            }
            let Some(candidate) = layout.char_at(pos.case, row as usize, column as usize) else {
                continue;
            };
            if is_special_char(candidate) != intended_special {
                continue;
            }
            candidates.push(candidate);
        }
    }

    candidates.choose(rng).copied()
}

/// Probability of mistyping the next letter.
///
/// `letters_since_error` grows the base chance quadratically; `consecutive_wrong` is how many
/// wrong letters are already on screen and adds a burst bonus for the first two.
pub fn error_probability(letters_since_error: usize, consecutive_wrong: usize, multiplier: f64) -> f64 {
    if multiplier <= 0.0 {
        return 0.0;
    }
    let n = letters_since_error as f64;
    let escalation = match consecutive_wrong {
        1 => 0.4,
        2 => 0.2,
        _ => 0.0,
    };
    ((n * n / 1000.0 + escalation) * multiplier).clamp(0.0, 1.0)
}
