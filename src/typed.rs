use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{ensure_config, Result, TypingError};
use crate::keyboard::{KeyboardLayout, Keyboards};
use crate::options::{self, Delay, TypingOverrides, TypingProfile};
use crate::queue::{QueueItem, QueueManager, DEFAULT_PART};
use crate::resetter::{self, Resetter, WaitOutcome, DEFAULT_RESET_GRACE};
use crate::text::{Markup, Snapshot, StyledText};
use crate::typo::{error_probability, is_special_char, nearby_char};

/// Wrong letters typed in a row before a correction is forced. The burst bonus of the error
/// model is zero from the third wrong letter on.
const MAX_TYPO_BURST: usize = 3;

pub type Sink = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// Construction-time configuration of a [`Typed`] engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypedConfig {
    /// Options applied to every instruction unless the instruction overrides them.
    pub typing: TypingOverrides,
    /// Independently animated parts. Empty means a single implicit part.
    pub named_parts: Vec<String>,
    /// Overrides on top of the built-in fast-forward profile.
    pub fast_forward: TypingOverrides,
    pub seed: Option<u64>,
    pub reset_grace_ms: Option<u64>,
}

impl TypedConfig {
    fn validate(&self) -> Result<()> {
        self.typing.validate()?;
        self.fast_forward.validate()?;
        let mut seen = HashSet::new();
        for part in &self.named_parts {
            ensure_config!(!part.is_empty(), "named parts must not be empty");
            ensure_config!(seen.insert(part.as_str()), "duplicate named part: {part}");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SentenceOptions {
    pub part: Option<String>,
    pub style: Option<String>,
    pub overrides: Option<TypingOverrides>,
}

impl SentenceOptions {
    pub fn part(mut self, part: impl Into<String>) -> Self {
        self.part = Some(part.into());
        self
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn overrides(mut self, overrides: TypingOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct EraseOptions {
    pub part: Option<String>,
    pub overrides: Option<TypingOverrides>,
}

impl EraseOptions {
    pub fn part(mut self, part: impl Into<String>) -> Self {
        self.part = Some(part.into());
        self
    }

    pub fn overrides(mut self, overrides: TypingOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    pub part: Option<String>,
}

impl WaitOptions {
    pub fn part(mut self, part: impl Into<String>) -> Self {
        self.part = Some(part.into());
        self
    }
}

#[derive(Debug, Default)]
struct PartState {
    display: StyledText,
    end_result: StyledText,
    letters_since_error: usize,
}

struct State {
    queues: QueueManager,
    ff_queues: QueueManager,
    parts: BTreeMap<String, PartState>,
    fast_forwarding: bool,
    keyboards: Keyboards,
    rng: StdRng,
    /// Bumped on every published display change.
    revision: u64,
}

impl State {
    fn part(&self, part: &str) -> Result<&PartState> {
        self.parts.get(part).ok_or_else(|| TypingError::UnknownPart {
            part: part.to_string(),
        })
    }

    fn part_mut(&mut self, part: &str) -> Result<&mut PartState> {
        self.parts
            .get_mut(part)
            .ok_or_else(|| TypingError::UnknownPart {
                part: part.to_string(),
            })
    }

    fn active_queues(&mut self) -> &mut QueueManager {
        if self.fast_forwarding {
            &mut self.ff_queues
        } else {
            &mut self.queues
        }
    }

    /// Fill the fast-forward queues with the shortest edit from what is shown to what all
    /// queued instructions will produce: erase the mismatched tail, then type the rest one
    /// character at a time.
    fn plan_fast_forward(&mut self) {
        let State {
            parts, ff_queues, ..
        } = self;
        // Queues and part states are created from the same part names.
        for (name, queue) in ff_queues.iter_mut() {
            queue.clear();
            let Some(part) = parts.get(name) else {
                continue;
            };
            let shown = part.display.len();
            let matching = part.display.common_prefix_len(&part.end_result);
            let erase = shown - matching;
            if erase > 0 {
                queue.add(QueueItem::Erase {
                    part: name.to_string(),
                    count: erase,
                    overrides: None,
                });
            }
            let mut typed = 0usize;
            for (c, style) in part.end_result.styled_chars().skip(matching) {
                queue.add(QueueItem::Sentence {
                    part: name.to_string(),
                    text: c.to_string(),
                    style: style.map(str::to_string),
                    overrides: None,
                });
                typed += 1;
            }
            debug!(part = %name, erase, typed, "fast-forward planned");
        }
    }

    /// Stamp the current display with the next revision.
    fn publish(&mut self, named: bool, markup: &Markup) -> Notice {
        self.revision += 1;
        Notice {
            revision: self.revision,
            snapshot: self.render(named, markup),
        }
    }

    fn render(&self, named: bool, markup: &Markup) -> Snapshot {
        if named {
            Snapshot::Parts(
                self.parts
                    .iter()
                    .map(|(name, part)| (name.clone(), part.display.render(markup)))
                    .collect(),
            )
        } else {
            Snapshot::Plain(
                self.parts
                    .get(DEFAULT_PART)
                    .map(|part| part.display.render(markup))
                    .unwrap_or_default(),
            )
        }
    }
}

/// A snapshot taken under the state lock, delivered after it is released.
struct Notice {
    revision: u64,
    snapshot: Snapshot,
}

struct Inner {
    state: Mutex<State>,
    /// Revision of the last snapshot handed to the sink. Held while the sink runs.
    delivered: Mutex<u64>,
    resetter: Resetter,
    sink: Sink,
    markup: Markup,
    part_names: Vec<String>,
    named: bool,
    defaults: TypingProfile,
    construction: TypingOverrides,
    fast_forward: TypingOverrides,
}

/// One step of a part loop, read from the active queue.
struct Step {
    item: QueueItem,
    detail: usize,
    fast_forward: bool,
    profile: TypingProfile,
}

impl Step {
    fn style(&self) -> Option<&str> {
        match &self.item {
            QueueItem::Sentence { style, .. } => style.as_deref(),
            _ => None,
        }
    }
}

/// What a part loop does after an interruption check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Proceed,
    /// Fast-forward took over mid-step; drop the step and read the new queue.
    Abandon,
    /// Full reset; end the loop.
    Stop,
}

impl Flow {
    fn keep_going(self) -> bool {
        self != Flow::Stop
    }
}

#[derive(Clone)]
pub struct TypedBuilder {
    config: TypedConfig,
    markup: Markup,
    keyboards: Keyboards,
    sink: Option<Sink>,
}

impl TypedBuilder {
    pub fn config(mut self, config: TypedConfig) -> Self {
        self.config = config;
        self
    }

    pub fn markup(mut self, markup: Markup) -> Self {
        self.markup = markup;
        self
    }

    pub fn keyboard(mut self, locale: impl Into<String>, layout: KeyboardLayout) -> Self {
        self.keyboards.add_keyboard(locale, layout);
        self
    }

    pub fn sink(mut self, sink: impl Fn(&Snapshot) + Send + Sync + 'static) -> Self {
        let sink: Sink = Arc::new(sink);
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Typed> {
        let TypedBuilder {
            config,
            markup,
            keyboards,
            sink,
        } = self;
        config.validate()?;

        let named = !config.named_parts.is_empty();
        let part_names = if named {
            config.named_parts.clone()
        } else {
            vec![DEFAULT_PART.to_string()]
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let grace = config
            .reset_grace_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RESET_GRACE);
        let fast_forward = merge(&options::fast_forward_defaults(), &config.fast_forward);
        let sink: Sink = match sink {
            Some(sink) => sink,
            None => Arc::new(|_: &Snapshot| {}),
        };

        let state = State {
            queues: QueueManager::new(&part_names),
            ff_queues: QueueManager::new(&part_names),
            parts: part_names
                .iter()
                .map(|name| (name.clone(), PartState::default()))
                .collect(),
            fast_forwarding: false,
            keyboards,
            rng,
            revision: 0,
        };

        Ok(Typed {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                delivered: Mutex::new(0),
                resetter: Resetter::new(grace),
                sink,
                markup,
                part_names,
                named,
                defaults: TypingProfile::default(),
                construction: config.typing,
                fast_forward,
            }),
        })
    }

    /// Turn this builder into a constructor of independent engines.
    ///
    /// Each engine gets its own sink target from `set_up`; every snapshot of that engine is
    /// passed to `update` together with its target.
    pub fn factory<T, S, U>(self, set_up: S, update: U) -> impl Fn() -> Result<Typed>
    where
        T: Send + 'static,
        S: Fn() -> T,
        U: Fn(&mut T, &Snapshot) + Send + Sync + 'static,
    {
        let update = Arc::new(update);
        move || {
            let target = Mutex::new(set_up());
            let update = Arc::clone(&update);
            self.clone()
                .sink(move |snapshot: &Snapshot| {
                    let mut target = target.lock().unwrap_or_else(PoisonError::into_inner);
                    update(&mut target, snapshot);
                })
                .build()
        }
    }
}

fn merge(base: &TypingOverrides, over: &TypingOverrides) -> TypingOverrides {
    TypingOverrides {
        locale: over.locale.clone().or_else(|| base.locale.clone()),
        per_letter_delay: over.per_letter_delay.or(base.per_letter_delay),
        erase_delay: over.erase_delay.or(base.erase_delay),
        error_delay: over.error_delay.or(base.error_delay),
        error_multiplier: over.error_multiplier.or(base.error_multiplier),
        no_special_char_errors: over.no_special_char_errors.or(base.no_special_char_errors),
    }
}

/// Animates text as if typed by a person.
///
/// Instructions are queued with [`type_text`](Typed::type_text),
/// [`backspace`](Typed::backspace) and [`wait`](Typed::wait), then played by
/// [`run`](Typed::run). Every display change is pushed to the sink as a [`Snapshot`].
/// The handle is cheap to clone; clones drive the same engine, so one clone can call
/// [`fast_forward`](Typed::fast_forward) or [`reset`](Typed::reset) while another is running.
#[derive(Clone)]
pub struct Typed {
    inner: Arc<Inner>,
}

impl Typed {
    pub fn builder() -> TypedBuilder {
        TypedBuilder {
            config: TypedConfig::default(),
            markup: Markup::default(),
            keyboards: Keyboards::default(),
            sink: None,
        }
    }

    pub fn new(config: TypedConfig, sink: impl Fn(&Snapshot) + Send + Sync + 'static) -> Result<Self> {
        Self::builder().config(config).sink(sink).build()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn parts(&self) -> &[String] {
        &self.inner.part_names
    }

    /// Queue `text` to be typed letter by letter.
    pub fn type_text(&self, text: &str, options: SentenceOptions) -> Result<&Self> {
        if let Some(overrides) = &options.overrides {
            overrides.validate()?;
        }
        let part = options.part.unwrap_or_else(|| DEFAULT_PART.to_string());
        let mut state = self.state();
        let targets = state.queues.targets(&part)?;
        for target in &targets {
            state
                .part_mut(target)?
                .end_result
                .push_str(text, options.style.as_deref());
        }
        state.queues.add(QueueItem::Sentence {
            part,
            text: text.to_string(),
            style: options.style,
            overrides: options.overrides,
        })?;
        Ok(self)
    }

    /// Queue erasing `count` characters from the end.
    ///
    /// Fails with [`TypingError::EraseBeyondText`], queueing nothing, if a target part will
    /// show fewer than `count` characters by the time the erase runs.
    pub fn backspace(&self, count: usize, options: EraseOptions) -> Result<&Self> {
        if let Some(overrides) = &options.overrides {
            overrides.validate()?;
        }
        let part = options.part.unwrap_or_else(|| DEFAULT_PART.to_string());
        let mut state = self.state();
        let targets = state.queues.targets(&part)?;
        for target in &targets {
            let available = state.part(target)?.end_result.len();
            if count > available {
                warn!(part = %target, count, available, "erase exceeds queued text");
                return Err(TypingError::EraseBeyondText {
                    part: target.clone(),
                });
            }
        }
        for target in &targets {
            state.part_mut(target)?.end_result.truncate_end(count, target)?;
        }
        state.queues.add(QueueItem::Erase {
            part,
            count,
            overrides: options.overrides,
        })?;
        Ok(self)
    }

    /// Queue a pause. Pauses are dropped when fast-forwarding.
    pub fn wait(&self, ms: u64, options: WaitOptions) -> Result<&Self> {
        let part = options.part.unwrap_or_else(|| DEFAULT_PART.to_string());
        self.state().queues.add(QueueItem::Wait { part, ms })?;
        Ok(self)
    }

    /// Register or replace the keyboard layout for `locale` on this engine.
    pub fn add_keyboard(&self, locale: impl Into<String>, layout: KeyboardLayout) {
        let locale = locale.into();
        debug!(locale = %locale, "keyboard registered");
        self.state().keyboards.add_keyboard(locale, layout);
    }

    pub fn is_fast_forwarding(&self) -> bool {
        self.state().fast_forwarding
    }

    /// Rendered text currently shown for `part`.
    pub fn display(&self, part: &str) -> Result<String> {
        Ok(self.state().part(part)?.display.render(&self.inner.markup))
    }

    /// Rendered text `part` will show once every queued instruction has run.
    pub fn end_result(&self, part: &str) -> Result<String> {
        Ok(self.state().part(part)?.end_result.render(&self.inner.markup))
    }

    /// Instructions currently planned by fast-forward for `part`.
    pub fn fast_forward_queue(&self, part: &str) -> Result<Vec<QueueItem>> {
        Ok(self.state().ff_queues.get(part)?.items().to_vec())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state().render(self.inner.named, &self.inner.markup)
    }

    fn publish(&self, state: &mut State) -> Notice {
        state.publish(self.inner.named, &self.inner.markup)
    }

    /// Hand `notice` to the sink unless a newer snapshot already went out. Deliveries are
    /// serialized, so the sink always ends on the latest display.
    fn notify(&self, notice: Notice) {
        let mut delivered = self
            .inner
            .delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if notice.revision <= *delivered {
            trace!(revision = notice.revision, "stale snapshot dropped");
            return;
        }
        *delivered = notice.revision;
        (self.inner.sink)(&notice.snapshot);
    }

    /// Play every queued instruction. Resolves once all part loops have ended, either
    /// drained or stopped by [`reset`](Typed::reset).
    ///
    /// A part whose loop already ended is started again if instructions reached it in the
    /// meantime, including fast-forward corrections, once the other loops have finished.
    pub async fn run(&self) -> Result<()> {
        let reset = self.inner.resetter.reset_token();
        let notice = {
            let mut state = self.state();
            state.queues.reset_indices();
            state.ff_queues.reset_indices();
            for part in state.parts.values_mut() {
                part.display.clear();
                part.letters_since_error = 0;
            }
            if state.fast_forwarding {
                state.plan_fast_forward();
            }
            self.publish(&mut state)
        };
        self.notify(notice);

        let mut pending = self.inner.part_names.clone();
        let mut first_error = None;
        while !pending.is_empty() {
            let loops = pending.iter().map(|part| self.drain(part, &reset));
            let results = join_all(loops).await;

            let mut state = self.state();
            let mut again = Vec::new();
            for (part, result) in pending.iter().zip(results) {
                match result {
                    Err(err) => {
                        first_error.get_or_insert(err);
                    }
                    Ok(()) if !reset.is_cancelled() => {
                        if state.active_queues().get(part)?.item().is_some() {
                            again.push(part.clone());
                        }
                    }
                    Ok(()) => {}
                }
            }
            if !again.is_empty() {
                debug!(parts = ?again, "restarting parts with new instructions");
            }
            pending = again;
        }

        {
            let mut state = self.state();
            state.fast_forwarding = false;
            state.ff_queues.clear();
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Replace the rest of the run with a short corrective sequence that reaches the same end
    /// result. Calling it again before the run finishes does nothing.
    pub fn fast_forward(&self) {
        {
            let mut state = self.state();
            if state.fast_forwarding {
                return;
            }
            state.fast_forwarding = true;
            state.plan_fast_forward();
        }
        self.inner.resetter.single_reset();
    }

    /// Clear the display and stop the current run. Queued instructions are kept unless
    /// `clear_queued` is set.
    pub async fn reset(&self, clear_queued: bool) {
        let notice = {
            let mut state = self.state();
            for part in state.parts.values_mut() {
                part.display.clear();
                if clear_queued {
                    part.end_result.clear();
                }
            }
            state.ff_queues.clear();
            state.fast_forwarding = false;
            if clear_queued {
                state.queues.clear();
            }
            self.inner.resetter.reset_token().cancel();
            self.publish(&mut state)
        };
        debug!(clear_queued, "reset");
        self.notify(notice);
        self.inner.resetter.reset().await;
    }

    async fn drain(&self, part: &str, reset: &CancellationToken) -> Result<()> {
        debug!(part, "part loop started");
        while let Some(step) = self.next_step(part)? {
            let keep_going = match (&step.item, step.item.detail_len()) {
                (QueueItem::Wait { .. }, _) => self.wait_step(part, &step, reset).await?,
                (_, Some(0)) => self.finish_step(part, &step, reset, None)?,
                (QueueItem::Sentence { .. }, _) => self.type_letter(part, &step, reset).await?,
                (QueueItem::Erase { .. }, _) => self.erase_letter(part, &step, reset).await?,
            };
            if !keep_going {
                break;
            }
        }
        debug!(part, "part loop finished");
        Ok(())
    }

    fn next_step(&self, part: &str) -> Result<Option<Step>> {
        let mut state = self.state();
        let fast_forward = state.fast_forwarding;
        let queue = state.active_queues().get(part)?;
        let Some(item) = queue.item().cloned() else {
            return Ok(None);
        };
        let detail = queue.detail_index();
        let profile = options::resolve(
            &self.inner.defaults,
            &self.inner.construction,
            item.overrides(),
            fast_forward.then_some(&self.inner.fast_forward),
        );
        Ok(Some(Step {
            item,
            detail,
            fast_forward,
            profile,
        }))
    }

    fn check(&self, state: &State, step: &Step, reset: &CancellationToken) -> Flow {
        if reset.is_cancelled() {
            Flow::Stop
        } else if state.fast_forwarding != step.fast_forward {
            Flow::Abandon
        } else {
            Flow::Proceed
        }
    }

    /// Apply `edit` to the part unless the step was interrupted, then notify the sink.
    fn mutate(
        &self,
        part: &str,
        step: &Step,
        reset: &CancellationToken,
        edit: impl FnOnce(&mut PartState) -> Result<()>,
    ) -> Result<Flow> {
        let notice = {
            let mut state = self.state();
            let flow = self.check(&state, step, reset);
            if flow != Flow::Proceed {
                return Ok(flow);
            }
            edit(state.part_mut(part)?)?;
            self.publish(&mut state)
        };
        self.notify(notice);
        Ok(Flow::Proceed)
    }

    /// Suspend for a sample of `delay`, then report whether the step may continue.
    async fn pause(&self, delay: Delay, step: &Step, reset: &CancellationToken) -> Flow {
        let ms = delay.sample(&mut self.state().rng);
        let single = self.inner.resetter.single_reset_token();
        if resetter::wait(ms, reset, &single).await == WaitOutcome::SingleReset {
            self.inner.resetter.rearm_single();
        }
        let state = self.state();
        self.check(&state, step, reset)
    }

    fn finish_step(
        &self,
        part: &str,
        step: &Step,
        reset: &CancellationToken,
        max_detail: Option<usize>,
    ) -> Result<bool> {
        let mut state = self.state();
        match self.check(&state, step, reset) {
            Flow::Stop => Ok(false),
            Flow::Abandon => Ok(true),
            Flow::Proceed => Ok(state.active_queues().get_mut(part)?.increment(max_detail, reset)),
        }
    }

    async fn wait_step(&self, part: &str, step: &Step, reset: &CancellationToken) -> Result<bool> {
        let QueueItem::Wait { ms, .. } = step.item else {
            return Ok(false);
        };
        match self.pause(Delay::Fixed(ms), step, reset).await {
            Flow::Proceed => self.finish_step(part, step, reset, None),
            flow => Ok(flow.keep_going()),
        }
    }

    /// Maybe pick a wrong letter in place of `intended`.
    fn maybe_typo(
        &self,
        part: &str,
        intended: char,
        consecutive_wrong: usize,
        profile: &TypingProfile,
    ) -> Result<Option<char>> {
        if profile.error_multiplier <= 0.0 {
            return Ok(None);
        }
        let mut guard = self.state();
        let State {
            keyboards,
            rng,
            parts,
            ..
        } = &mut *guard;
        let layout = keyboards.get(&profile.locale)?;
        if profile.no_special_char_errors && is_special_char(intended) {
            return Ok(None);
        }
        let part_state = parts.get_mut(part).ok_or_else(|| TypingError::UnknownPart {
            part: part.to_string(),
        })?;
        let p = error_probability(
            part_state.letters_since_error,
            consecutive_wrong,
            profile.error_multiplier,
        );
        if !rng.gen_bool(p) {
            return Ok(None);
        }
        let typo = nearby_char(layout, intended, rng);
        if let Some(wrong) = typo {
            part_state.letters_since_error = 0;
            trace!(part, %intended, %wrong, consecutive_wrong, "typo");
        }
        Ok(typo)
    }

    /// Type one letter of the current sentence, possibly preceded by a burst of wrong letters
    /// that are then erased again.
    async fn type_letter(&self, part: &str, step: &Step, reset: &CancellationToken) -> Result<bool> {
        let QueueItem::Sentence { text, .. } = &step.item else {
            return Ok(false);
        };
        let max_detail = step.item.detail_len();
        let lookahead: Vec<char> = text.chars().skip(step.detail).take(MAX_TYPO_BURST + 1).collect();
        let Some(&letter) = lookahead.first() else {
            return self.finish_step(part, step, reset, max_detail);
        };
        let style = step.style();
        let profile = &step.profile;

        // Each wrong letter stands in for the next intended one, as if typing ran ahead.
        let mut wrong: Vec<char> = Vec::new();
        while wrong.len() < MAX_TYPO_BURST {
            let Some(&intended) = lookahead.get(wrong.len()) else {
                break;
            };
            let Some(typo) = self.maybe_typo(part, intended, wrong.len(), profile)? else {
                break;
            };
            let flow = self.mutate(part, step, reset, |p| {
                p.display.push_char(typo, style);
                Ok(())
            })?;
            if flow != Flow::Proceed {
                return Ok(flow.keep_going());
            }
            wrong.push(typo);
            let flow = self.pause(profile.per_letter_delay, step, reset).await;
            if flow != Flow::Proceed {
                return Ok(flow.keep_going());
            }
        }

        if !wrong.is_empty() {
            let flow = self.pause(profile.error_delay, step, reset).await;
            if flow != Flow::Proceed {
                return Ok(flow.keep_going());
            }
        }
        while wrong.pop().is_some() {
            let flow = self.mutate(part, step, reset, |p| {
                p.display
                    .pop_char()
                    .map(|_| ())
                    .ok_or_else(|| TypingError::EraseBeyondText {
                        part: part.to_string(),
                    })
            })?;
            if flow != Flow::Proceed {
                return Ok(flow.keep_going());
            }
            let flow = self.pause(profile.erase_delay, step, reset).await;
            if flow != Flow::Proceed {
                return Ok(flow.keep_going());
            }
        }

        let flow = self.mutate(part, step, reset, |p| {
            p.display.push_char(letter, style);
            p.letters_since_error += 1;
            Ok(())
        })?;
        if flow != Flow::Proceed {
            return Ok(flow.keep_going());
        }
        match self.pause(profile.per_letter_delay, step, reset).await {
            Flow::Proceed => self.finish_step(part, step, reset, max_detail),
            flow => Ok(flow.keep_going()),
        }
    }

    async fn erase_letter(&self, part: &str, step: &Step, reset: &CancellationToken) -> Result<bool> {
        let flow = self.mutate(part, step, reset, |p| {
            p.display
                .pop_char()
                .map(|_| ())
                .ok_or_else(|| TypingError::EraseBeyondText {
                    part: part.to_string(),
                })
        })?;
        if flow != Flow::Proceed {
            return Ok(flow.keep_going());
        }
        match self.pause(step.profile.erase_delay, step, reset).await {
            Flow::Proceed => self.finish_step(part, step, reset, step.item.detail_len()),
            flow => Ok(flow.keep_going()),
        }
    }
}

impl std::fmt::Debug for Typed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Typed")
            .field("parts", &self.inner.part_names)
            .field("named", &self.inner.named)
            .finish_non_exhaustive()
    }
}
