use rand::rngs::StdRng;
use rand::SeedableRng;

use typed::keyboard::{de_qwertz, us_qwerty, KeyCase, KeyboardLayout, Keyboards};
use typed::typo::{is_special_char, nearby_char};
use typed::TypingError;

fn all_chars(layout: &KeyboardLayout) -> Vec<char> {
    [KeyCase::Lower, KeyCase::Upper]
        .into_iter()
        .flat_map(|case| layout.rows(case).iter().flat_map(|row| row.chars()))
        .collect()
}

fn check_layout(layout: &KeyboardLayout, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for intended in all_chars(layout) {
        let from = layout.position_of(intended).expect("char is on the layout");
        for _ in 0..50 {
            let Some(wrong) = nearby_char(layout, intended, &mut rng) else {
                continue;
            };
            assert_ne!(wrong, intended);
            assert_eq!(
                is_special_char(wrong),
                is_special_char(intended),
                "{intended:?} turned into {wrong:?}"
            );

            let to = layout.position_of(wrong).expect("typo is on the layout");
            if from.row != 0 {
                assert_ne!(to.row, 0, "{intended:?} reached the number row via {wrong:?}");
            }
            assert!(to.row.abs_diff(from.row) <= 1);
        }
    }
}

#[test]
fn us_typos_are_adjacent_and_same_class() {
    check_layout(&us_qwerty(), 1);
}

#[test]
fn de_typos_are_adjacent_and_same_class() {
    check_layout(&de_qwertz(), 2);
}

#[test]
fn letters_never_become_digits() {
    let layout = us_qwerty();
    let mut rng = StdRng::seed_from_u64(99);
    for intended in "qwertyuiopQWERTYUIOP".chars() {
        for _ in 0..100 {
            if let Some(wrong) = nearby_char(&layout, intended, &mut rng) {
                assert!(!wrong.is_ascii_digit(), "{intended:?} -> {wrong:?}");
            }
        }
    }
}

#[test]
fn symbols_become_neighboring_symbols() {
    let layout = us_qwerty();
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..100 {
        let wrong = nearby_char(&layout, '-', &mut rng).expect("'-' has symbol neighbors");
        assert!(['=', '[', ']'].contains(&wrong), "- -> {wrong:?}");
    }
}

#[test]
fn keyboards_registry_reports_unknown_locales() {
    let mut keyboards = Keyboards::empty();
    assert_eq!(
        keyboards.ensure_locale("fr"),
        Err(TypingError::UnknownLocale {
            locale: "fr".to_string()
        })
    );
    keyboards.add_keyboard("fr", KeyboardLayout::new(&["&é\"'(-è_çà)="], &["1234567890°+"]));
    assert!(keyboards.ensure_locale("fr").is_ok());
    assert_eq!(keyboards.locales().collect::<Vec<_>>(), vec!["fr"]);
}
