use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tracing_subscriber::EnvFilter;

use typed::queue::DEFAULT_PART;
use typed::{
    Delay, EraseOptions, KeyboardLayout, SentenceOptions, Snapshot, Typed, TypedConfig, TypingError,
    TypingOverrides,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

fn config() -> TypedConfig {
    TypedConfig {
        typing: TypingOverrides::default()
            .per_letter_delay(Delay::Fixed(1))
            .erase_delay(Delay::Fixed(0))
            .error_delay(Delay::Fixed(0)),
        fast_forward: TypingOverrides::default().per_letter_delay(Delay::Fixed(0)).erase_delay(Delay::Fixed(1)),
        seed: Some(42),
        ..Default::default()
    }
}

/// Engine whose sink records every snapshot it receives.
fn recording(config: TypedConfig) -> (Typed, Arc<Mutex<Vec<Snapshot>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let seen = Arc::clone(&seen);
        move |snapshot: &Snapshot| seen.lock().expect("sink lock").push(snapshot.clone())
    };
    let typed = Typed::new(config, sink).expect("valid config");
    (typed, seen)
}

fn last(seen: &Mutex<Vec<Snapshot>>) -> String {
    seen.lock()
        .expect("sink lock")
        .last()
        .and_then(Snapshot::as_plain)
        .map(str::to_string)
        .expect("at least one plain snapshot")
}

#[tokio::test(start_paused = true)]
async fn types_hello_world() {
    init_tracing();
    let (typed, seen) = recording(config());
    typed
        .type_text("Hello World", SentenceOptions::default())
        .expect("queued");
    typed.run().await.expect("run succeeds");

    assert_eq!(last(&seen), "Hello World");
    assert_eq!(typed.display(DEFAULT_PART).expect("part"), "Hello World");
}

#[tokio::test(start_paused = true)]
async fn multiple_texts_concatenate() {
    init_tracing();
    let (typed, seen) = recording(config());
    typed
        .type_text("Hello World", SentenceOptions::default())
        .and_then(|t| t.type_text(" Hello World", SentenceOptions::default()))
        .and_then(|t| t.type_text(" Hello World", SentenceOptions::default()))
        .expect("queued");
    typed.run().await.expect("run succeeds");

    assert_eq!(last(&seen), "Hello World Hello World Hello World");
}

#[tokio::test(start_paused = true)]
async fn styled_sentence_is_wrapped_once() {
    init_tracing();
    let (typed, seen) = recording(config());
    typed
        .type_text("Hello World", SentenceOptions::default().style("test"))
        .expect("queued");
    typed.run().await.expect("run succeeds");

    assert_eq!(last(&seen), "<span class=\"test\">Hello World</span>");
}

#[tokio::test(start_paused = true)]
async fn first_snapshot_is_empty_display() {
    init_tracing();
    let (typed, seen) = recording(config());
    typed.type_text("ab", SentenceOptions::default()).expect("queued");
    typed.run().await.expect("run succeeds");

    let seen = seen.lock().expect("sink lock");
    assert_eq!(seen.first(), Some(&Snapshot::Plain(String::new())));
}

#[tokio::test(start_paused = true)]
async fn backspace_erases_across_styles() {
    init_tracing();
    let (typed, seen) = recording(config());
    typed
        .type_text("Hello ", SentenceOptions::default())
        .and_then(|t| t.type_text("World", SentenceOptions::default().style("x")))
        .and_then(|t| t.backspace(7, EraseOptions::default()))
        .and_then(|t| t.type_text("p!", SentenceOptions::default()))
        .expect("queued");

    assert_eq!(typed.end_result(DEFAULT_PART).expect("part"), "Hellp!");
    typed.run().await.expect("run succeeds");
    assert_eq!(last(&seen), "Hellp!");
}

#[tokio::test(start_paused = true)]
async fn waits_take_their_time() {
    init_tracing();
    let config = TypedConfig {
        typing: TypingOverrides::default()
            .per_letter_delay(Delay::Fixed(0))
            .error_multiplier(0.0),
        ..Default::default()
    };
    let (typed, seen) = recording(config);
    typed
        .type_text("a", SentenceOptions::default())
        .and_then(|t| t.wait(500, Default::default()))
        .and_then(|t| t.type_text("b", SentenceOptions::default()))
        .expect("queued");

    let started = tokio::time::Instant::now();
    typed.run().await.expect("run succeeds");
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(last(&seen), "ab");
}

#[tokio::test(start_paused = true)]
async fn running_twice_replays_from_scratch() {
    init_tracing();
    let (typed, seen) = recording(config());
    typed.type_text("again", SentenceOptions::default()).expect("queued");
    typed.run().await.expect("first run");
    typed.run().await.expect("second run");

    assert_eq!(last(&seen), "again");
}

#[tokio::test(start_paused = true)]
async fn erase_beyond_text_is_rejected_when_queueing() {
    init_tracing();
    let (typed, _seen) = recording(config());
    typed.type_text("ab", SentenceOptions::default()).expect("queued");

    assert!(matches!(
        typed.backspace(3, EraseOptions::default()),
        Err(TypingError::EraseBeyondText { part }) if part == DEFAULT_PART
    ));
    assert_eq!(typed.end_result(DEFAULT_PART).expect("part"), "ab");
}

#[tokio::test(start_paused = true)]
async fn rejected_erase_leaves_both_run_modes_alike() {
    init_tracing();
    for forced in [false, true] {
        let (typed, seen) = recording(config());
        typed.type_text("ab", SentenceOptions::default()).expect("queued");
        assert!(typed.backspace(3, EraseOptions::default()).is_err());
        if forced {
            typed.fast_forward();
        }
        typed.run().await.expect("run succeeds");
        assert_eq!(last(&seen), "ab", "forced: {forced}");
    }
}

#[tokio::test(start_paused = true)]
async fn error_delay_is_spent_before_correcting() {
    init_tracing();
    let mut elapsed = Vec::new();
    for multiplier in [0.0, 1000.0] {
        let config = TypedConfig {
            typing: TypingOverrides::default()
                .per_letter_delay(Delay::Fixed(0))
                .erase_delay(Delay::Fixed(0))
                .error_delay(Delay::Fixed(50))
                .error_multiplier(multiplier),
            seed: Some(5),
            ..Default::default()
        };
        let (typed, seen) = recording(config);
        typed.type_text("abcdefgh", SentenceOptions::default()).expect("queued");
        let started = tokio::time::Instant::now();
        typed.run().await.expect("run succeeds");
        elapsed.push(started.elapsed());
        assert_eq!(last(&seen), "abcdefgh");
    }

    assert!(elapsed[0] < Duration::from_millis(50), "flawless: {:?}", elapsed[0]);
    assert!(elapsed[1] >= Duration::from_millis(50), "with typos: {:?}", elapsed[1]);
}

#[tokio::test(start_paused = true)]
async fn unknown_locale_faults_only_when_typos_are_possible() {
    init_tracing();
    let mut with_errors = config();
    with_errors.typing.locale = Some("xx".to_string());
    let (typed, _seen) = recording(with_errors.clone());
    typed.type_text("abc", SentenceOptions::default()).expect("queued");
    assert_eq!(
        typed.run().await,
        Err(TypingError::UnknownLocale {
            locale: "xx".to_string()
        })
    );

    with_errors.typing.error_multiplier = Some(0.0);
    let (typed, seen) = recording(with_errors);
    typed.type_text("abc", SentenceOptions::default()).expect("queued");
    typed.run().await.expect("no typos means no keyboard lookup");
    assert_eq!(last(&seen), "abc");
}

#[tokio::test(start_paused = true)]
async fn registered_keyboard_satisfies_locale() {
    init_tracing();
    let mut config = config();
    config.typing.locale = Some("tiny".to_string());
    let (typed, seen) = recording(config);
    typed.add_keyboard("tiny", KeyboardLayout::new(&["12"], &["!@"]));
    typed.type_text("abc", SentenceOptions::default()).expect("queued");
    typed.run().await.expect("locale registered");
    assert_eq!(last(&seen), "abc");
}

#[tokio::test(start_paused = true)]
async fn unknown_part_is_rejected_when_queueing() {
    let (typed, _seen) = recording(config());
    assert_eq!(
        typed
            .type_text("x", SentenceOptions::default().part("nope"))
            .map(|_| ()),
        Err(TypingError::UnknownPart {
            part: "nope".to_string()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_overrides_are_rejected() {
    let (typed, _seen) = recording(config());
    let overrides = TypingOverrides::default().per_letter_delay(Delay::range(9, 3));
    assert!(matches!(
        typed.type_text("x", SentenceOptions::default().overrides(overrides)),
        Err(TypingError::InvalidConfig(_))
    ));

    let config = TypedConfig {
        named_parts: vec!["a".to_string(), "a".to_string()],
        ..Default::default()
    };
    assert!(matches!(
        Typed::new(config, |_: &Snapshot| {}),
        Err(TypingError::InvalidConfig(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn typos_are_corrected_before_moving_on() {
    init_tracing();
    let target = "the quick brown fox jumps over the lazy dog";
    let mut config = config();
    config.typing.error_multiplier = Some(20.0);
    let (typed, seen) = recording(config);
    typed.type_text(target, SentenceOptions::default()).expect("queued");
    typed.run().await.expect("run succeeds");

    let seen = seen.lock().expect("sink lock");
    let shown: Vec<&str> = seen.iter().filter_map(Snapshot::as_plain).collect();
    assert_eq!(shown.last().copied(), Some(target));
    assert!(
        shown.iter().any(|s| !target.starts_with(s)),
        "expected at least one wrong letter on screen"
    );

    // A burst never shows more than three wrong letters past the correct prefix.
    for s in &shown {
        let good = s
            .chars()
            .zip(target.chars())
            .take_while(|(a, b)| a == b)
            .count();
        assert!(s.chars().count() - good <= 3, "burst too long: {s:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn no_special_char_errors_keeps_punctuation_clean() {
    init_tracing();
    let target = "a,b.c;d-e/f";
    let mut config = config();
    config.typing.error_multiplier = Some(1000.0);
    config.typing.no_special_char_errors = Some(true);
    let (typed, seen) = recording(config);
    typed.type_text(target, SentenceOptions::default()).expect("queued");
    typed.run().await.expect("run succeeds");

    let seen = seen.lock().expect("sink lock");
    for s in seen.iter().filter_map(Snapshot::as_plain) {
        for c in s.chars().filter(|c| !c.is_alphanumeric()) {
            assert!(target.contains(c), "unexpected symbol {c:?} in {s:?}");
        }
    }
    assert_eq!(last_plain(&seen), target);
}

fn last_plain(seen: &[Snapshot]) -> &str {
    seen.last()
        .and_then(Snapshot::as_plain)
        .expect("at least one plain snapshot")
}

#[tokio::test(start_paused = true)]
async fn reset_stops_the_run_and_clears_the_display() {
    init_tracing();
    let mut config = config();
    config.typing.per_letter_delay = Some(Delay::Fixed(10));
    config.typing.error_multiplier = Some(0.0);
    let (typed, seen) = recording(config);
    typed
        .type_text("Hello World", SentenceOptions::default())
        .expect("queued");

    let runner = typed.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    tokio::time::sleep(Duration::from_millis(35)).await;
    typed.reset(false).await;
    handle
        .await
        .expect("run task joined")
        .expect("reset ends the run quietly");

    assert_eq!(last(&seen), "");
    assert_eq!(typed.display(DEFAULT_PART).expect("part"), "");
    assert_eq!(typed.end_result(DEFAULT_PART).expect("part"), "Hello World");

    typed.run().await.expect("queue survives a soft reset");
    assert_eq!(last(&seen), "Hello World");
}

#[tokio::test(start_paused = true)]
async fn hard_reset_drops_queued_instructions() {
    init_tracing();
    let (typed, seen) = recording(config());
    typed.type_text("gone", SentenceOptions::default()).expect("queued");
    typed.reset(true).await;

    assert_eq!(typed.end_result(DEFAULT_PART).expect("part"), "");
    typed.run().await.expect("empty run");
    assert_eq!(last(&seen), "");
}

fn last_or_empty(seen: &Mutex<Vec<Snapshot>>) -> String {
    seen.lock()
        .expect("sink lock")
        .last()
        .and_then(Snapshot::as_plain)
        .unwrap_or_default()
        .to_string()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reset_snapshot_is_delivered_last_across_threads() {
    init_tracing();
    for round in 0..20u64 {
        let mut config = config();
        config.typing.error_multiplier = Some(0.0);
        config.reset_grace_ms = Some(1);
        let (typed, seen) = recording(config);
        typed
            .type_text("the quick brown fox jumps over the lazy dog", SentenceOptions::default())
            .expect("queued");

        let runner = typed.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        while last_or_empty(&seen).is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        tokio::time::sleep(Duration::from_millis(round % 3)).await;
        typed.reset(false).await;
        handle
            .await
            .expect("run task joined")
            .expect("reset ends the run quietly");

        assert_eq!(last(&seen), "", "round {round}");
        assert_eq!(typed.display(DEFAULT_PART).expect("part"), "");
    }
}
