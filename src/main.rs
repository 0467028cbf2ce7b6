//! Code Bubble entry point
//!
//! On the web this drives the DOM front-end from `requestAnimationFrame`.
//! The native build plays one demo round headlessly with the offline reviewer.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use serde::Serialize;
    use serde::de::DeserializeOwned;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{Document, Element, HtmlElement, HtmlTextAreaElement, MouseEvent, PointerEvent};

    use code_bubble::audio::{AudioManager, SoundEffect};
    use code_bubble::consts::*;
    use code_bubble::services::{DistractorResponse, HintResponse, ReviewResponse};
    use code_bubble::sim::{BubbleState, TickInput};
    use code_bubble::{
        LevelSpec, ProgressBook, ServiceError, Session, SessionEvent, SessionPhase, Settings,
        Difficulty, Tuning, lane_x, player_y,
    };

    #[wasm_bindgen(inline_js = "
        export function post_json(url, body) {
            return fetch(url, {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body,
            })
                .catch(e => { throw String(e); })
                .then(r => {
                    if (!r.ok) { throw { status: r.status }; }
                    return r.text();
                });
        }

        export function level_json() {
            const el = document.getElementById('level-data');
            return el ? el.textContent : null;
        }

        export function tuning_json() {
            const el = document.getElementById('tuning-data');
            return el ? el.textContent : null;
        }

        export function user_id() {
            return window.CODE_BUBBLE_USER || 'guest';
        }
    ")]
    extern "C" {
        fn post_json(url: &str, body: &str) -> js_sys::Promise;
        fn level_json() -> Option<String>;
        fn tuning_json() -> Option<String>;
        fn user_id() -> String;
    }

    const DEMO_LEVEL: &str = r#"{
        "id": "demo-hello",
        "title": "Hello, bubbles",
        "problem": "Print the word hi",
        "language": "python",
        "solution": "print('hi')",
        "xp": 20
    }"#;

    /// Rejections carry either `{ status }` or a message string
    fn js_error(e: JsValue) -> ServiceError {
        let status = js_sys::Reflect::get(&e, &JsValue::from_str("status"))
            .ok()
            .and_then(|v| v.as_f64());
        match status {
            Some(status) => ServiceError::Status {
                status: status as u16,
            },
            None => ServiceError::Network(e.as_string().unwrap_or_else(|| format!("{:?}", e))),
        }
    }

    /// POST a JSON request and decode the JSON answer
    async fn call_json<Req: Serialize, Resp: DeserializeOwned>(
        url: &str,
        request: &Req,
    ) -> Result<Resp, ServiceError> {
        let body = serde_json::to_string(request)?;
        let value = JsFuture::from(post_json(url, &body))
            .await
            .map_err(js_error)?;
        let text = value
            .as_string()
            .ok_or_else(|| ServiceError::Network("empty response".to_string()))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Game instance holding all state
    struct Game {
        session: Session,
        settings: Settings,
        progress: ProgressBook,
        audio: AudioManager,
        accumulator: f32,
        last_time: f64,
        input: TickInput,
        /// CSS pixels per field unit
        scale: f32,
        field_left: f32,
        /// DOM nodes by entity id
        bubble_nodes: HashMap<u32, Element>,
        bullet_nodes: HashMap<u32, Element>,
    }

    impl Game {
        fn new(session: Session, settings: Settings) -> Self {
            let mut audio = AudioManager::new();
            audio.apply_settings(&settings);
            let progress = ProgressBook::load();
            log::info!(
                "{} has completed {} levels ({} XP)",
                session.user,
                progress.completed_levels(&session.user).len(),
                progress.total_xp(&session.user)
            );
            Self {
                session,
                settings,
                progress,
                audio,
                accumulator: 0.0,
                last_time: 0.0,
                input: TickInput::default(),
                scale: 1.0,
                field_left: 0.0,
                bubble_nodes: HashMap::new(),
                bullet_nodes: HashMap::new(),
            }
        }

        fn measure_field(&mut self, document: &Document) {
            if let Some(field) = document.get_element_by_id("field") {
                let rect = field.get_bounding_client_rect();
                self.field_left = rect.left() as f32;
                self.scale = (rect.width() as f32 / FIELD_WIDTH).max(0.01);
            }
        }

        /// Convert a client x coordinate to field units
        fn client_to_field_x(&self, client_x: f32) -> f32 {
            (client_x - self.field_left) / self.scale
        }

        /// Run simulation ticks; returns events for the host to act on
        fn update(&mut self, dt: f32) -> Vec<SessionEvent> {
            let dt = dt.min(0.1);
            self.accumulator += dt;

            let mut events = Vec::new();
            let mut substeps = 0;
            while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
                let lives = self.session.state.lives;
                let matched = self.session.state.matched;
                let fired = self.input.fire;

                if let Some(ev) = self.session.tick(&self.input, SIM_DT) {
                    events.push(ev);
                }
                self.accumulator -= SIM_DT;
                substeps += 1;

                // Clear one-shot inputs after processing
                self.input.fire = false;

                let state = &self.session.state;
                if fired {
                    self.audio.play(SoundEffect::Fire);
                }
                if state.matched > matched {
                    self.audio.play(SoundEffect::TokenMatched);
                }
                if state.lives < lives {
                    let wrong = state
                        .bubbles
                        .iter()
                        .any(|b| b.state == BubbleState::HitWrong);
                    self.audio.play(if wrong {
                        SoundEffect::WrongHit
                    } else {
                        SoundEffect::TargetMissed
                    });
                }
            }
            if !self.settings.effective_particles() {
                self.session.state.particles.clear();
            }
            events
        }

        fn on_event(&self, event: &SessionEvent) {
            match event {
                SessionEvent::GameOver => self.audio.play(SoundEffect::GameOver),
                SessionEvent::LevelComplete { xp, first_time } => {
                    self.audio.play(SoundEffect::LevelComplete);
                    log::info!("Level complete (+{} XP, first time: {})", xp, first_time);
                }
                SessionEvent::ReviewFailed { .. } => self.audio.play(SoundEffect::ReviewFailed),
                SessionEvent::ReviewError { message } => log::warn!("Review error: {}", message),
                SessionEvent::ReviewRequested(_) => log::info!("Submitting code for review"),
            }
        }

        /// Sync DOM nodes with the simulation
        fn render(&mut self, document: &Document) {
            let Some(field) = document.get_element_by_id("field") else {
                return;
            };
            let scale = self.scale;
            let state = &self.session.state;

            sync_nodes(
                document,
                &field,
                &mut self.bubble_nodes,
                state.bubbles.iter().map(|b| {
                    let class = match b.state {
                        BubbleState::Active => "bubble",
                        BubbleState::HitCorrect => "bubble hit-correct",
                        BubbleState::HitWrong => "bubble hit-wrong",
                    };
                    (b.id, lane_x(b.lane), b.y, class, Some(b.text.as_str()))
                }),
                scale,
            );
            sync_nodes(
                document,
                &field,
                &mut self.bullet_nodes,
                state
                    .bullets
                    .iter()
                    .map(|b| (b.id, b.pos.x, b.pos.y, "bullet", None)),
                scale,
            );

            if let Some(player) = document.get_element_by_id("player") {
                set_transform(&player, state.player_x * scale, player_y() * scale);
            }
        }

        /// Update HUD and overlays
        fn update_hud(&self, document: &Document) {
            let s = &self.session;
            set_text(document, "hud-lives", &s.state.lives.to_string());
            set_text(
                document,
                "hud-progress",
                &format!("{}/{}", s.state.matched, s.state.tokens.len()),
            );
            set_text(document, "code-buffer", s.code());
            set_text(
                document,
                "hud-xp",
                &self.progress.total_xp(&s.user).to_string(),
            );
            set_text(document, "feedback", s.feedback().unwrap_or(""));
            set_text(document, "error", s.error().unwrap_or(""));
            set_text(document, "hint", s.hint().unwrap_or(""));

            let phase = s.phase();
            show(document, "overlay-reviewing", phase == SessionPhase::Reviewing);
            show(document, "overlay-complete", phase == SessionPhase::LevelComplete);
            show(document, "overlay-gameover", phase == SessionPhase::GameOver);
            show(document, "manual-editor", phase == SessionPhase::Manual);
            show(
                document,
                "resubmit-panel",
                phase == SessionPhase::Playing && s.feedback().is_some(),
            );
            if s.solution_revealed() {
                set_text(document, "solution", &s.level.solution);
            }
        }
    }

    fn set_transform(el: &Element, x: f32, y: f32) {
        if let Some(el) = el.dyn_ref::<HtmlElement>() {
            let _ = el.style().set_property(
                "transform",
                &format!("translate({:.1}px, {:.1}px) translate(-50%, -50%)", x, y),
            );
        }
    }

    fn set_text(document: &Document, id: &str, text: &str) {
        if let Some(el) = document.get_element_by_id(id) {
            if el.text_content().as_deref() != Some(text) {
                el.set_text_content(Some(text));
            }
        }
    }

    fn show(document: &Document, id: &str, visible: bool) {
        if let Some(el) = document.get_element_by_id(id) {
            let _ = el.class_list().toggle_with_force("hidden", !visible);
        }
    }

    /// Create, move and remove one DOM node per entity
    fn sync_nodes<'a>(
        document: &Document,
        parent: &Element,
        nodes: &mut HashMap<u32, Element>,
        entities: impl Iterator<Item = (u32, f32, f32, &'static str, Option<&'a str>)>,
        scale: f32,
    ) {
        let mut seen = Vec::new();
        for (id, x, y, class, text) in entities {
            seen.push(id);
            let node = match nodes.get(&id) {
                Some(node) => node.clone(),
                None => {
                    let Ok(node) = document.create_element("div") else {
                        continue;
                    };
                    if let Some(text) = text {
                        node.set_text_content(Some(text));
                    }
                    let _ = parent.append_child(&node);
                    nodes.insert(id, node.clone());
                    node
                }
            };
            if node.class_name() != class {
                node.set_class_name(class);
            }
            set_transform(&node, x * scale, y * scale);
        }
        nodes.retain(|id, node| {
            let keep = seen.contains(id);
            if !keep {
                node.remove();
            }
            keep
        });
    }

    fn spawn_review(game: Rc<RefCell<Game>>, request: code_bubble::services::ReviewRequest) {
        let Some(ticket) = game.borrow().session.review_ticket() else {
            log::warn!("Review requested with nothing pending");
            return;
        };
        wasm_bindgen_futures::spawn_local(async move {
            let result = call_json::<_, ReviewResponse>("/api/review", &request).await;
            let mut g = game.borrow_mut();
            let g = &mut *g;
            match g
                .session
                .resolve_review(ticket, result, &mut g.progress, js_sys::Date::now())
            {
                Ok(event) => g.on_event(&event),
                // Round was restarted while the review was in flight
                Err(e) => log::info!("Dropping stale review: {}", e),
            }
        });
    }

    fn spawn_hint(game: Rc<RefCell<Game>>) {
        let request = game.borrow().session.hint_request();
        wasm_bindgen_futures::spawn_local(async move {
            let result = call_json::<_, HintResponse>("/api/hint", &request).await;
            game.borrow_mut().session.apply_hint(result);
        });
    }

    fn spawn_distractors(game: Rc<RefCell<Game>>) {
        let request = game.borrow().session.distractor_request();
        wasm_bindgen_futures::spawn_local(async move {
            let result = call_json::<_, DistractorResponse>("/api/distractors", &request)
                .await
                .map(DistractorResponse::into_vec);
            game.borrow_mut().session.apply_distractors(result);
        });
    }

    fn load_level() -> LevelSpec {
        if let Some(json) = level_json() {
            match LevelSpec::from_json(&json) {
                Ok(level) => return level,
                Err(e) => log::warn!("Bad level data, using demo level: {}", e),
            }
        }
        // The demo level is a constant and always parses
        LevelSpec::from_json(DEMO_LEVEL).expect("demo level is valid")
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Code Bubble starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        let settings = Settings::load();
        let level = load_level();
        let seed = js_sys::Date::now() as u64;
        let tuning = match tuning_json() {
            Some(json) => Tuning::from_json(&json).unwrap_or_else(|e| {
                log::warn!("Bad tuning data, using difficulty preset: {}", e);
                settings.tuning()
            }),
            None => settings.tuning(),
        };
        let session = Session::new(user_id(), level, tuning, seed);
        let ai_distractors = settings.ai_distractors;

        let game = Rc::new(RefCell::new(Game::new(session, settings)));
        game.borrow_mut().measure_field(&document);

        log::info!("Game initialized with seed: {}", seed);

        if ai_distractors {
            spawn_distractors(game.clone());
        }

        setup_input_handlers(&document, game.clone());
        setup_buttons(&document, game.clone());

        // Start game loop
        request_animation_frame(game);

        log::info!("Code Bubble running!");
    }

    fn setup_input_handlers(document: &Document, game: Rc<RefCell<Game>>) {
        let Some(field) = document.get_element_by_id("field") else {
            log::error!("No #field element; input disabled");
            return;
        };

        // Pointer movement positions the player
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
                let mut g = game.borrow_mut();
                let x = g.client_to_field_x(event.client_x() as f32);
                g.input.pointer_x = Some(x);
            });
            let _ = field
                .add_event_listener_with_callback("pointermove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Click/tap fires, unless it landed on a button
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let on_button = event
                    .target()
                    .and_then(|t| t.dyn_into::<Element>().ok())
                    .and_then(|el| el.closest("button").ok().flatten())
                    .is_some();
                if on_button {
                    return;
                }
                let mut g = game.borrow_mut();
                let x = g.client_to_field_x(event.client_x() as f32);
                g.input.pointer_x = Some(x);
                g.input.fire = true;
            });
            let _ =
                field.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Re-measure on resize
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                if let Some(document) = web_sys::window().and_then(|w| w.document()) {
                    game.borrow_mut().measure_field(&document);
                }
            });
            if let Some(window) = web_sys::window() {
                let _ = window
                    .add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
            }
            closure.forget();
        }
    }

    fn on_click(document: &Document, id: &str, handler: impl FnMut() + 'static) {
        let Some(el) = document.get_element_by_id(id) else {
            return;
        };
        let mut handler = handler;
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| handler());
        let _ = el.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn textarea_value(id: &str) -> Option<String> {
        web_sys::window()?
            .document()?
            .get_element_by_id(id)?
            .dyn_into::<HtmlTextAreaElement>()
            .ok()
            .map(|t| t.value())
    }

    fn setup_buttons(document: &Document, game: Rc<RefCell<Game>>) {
        {
            let game = game.clone();
            on_click(document, "retry-btn", move || {
                game.borrow_mut().session.restart();
            });
        }
        {
            let game = game.clone();
            on_click(document, "manual-btn", move || {
                let mut g = game.borrow_mut();
                if let Err(e) = g.session.switch_to_manual() {
                    log::warn!("{}", e);
                    return;
                }
                let code = g.session.code().to_string();
                drop(g);
                if let Some(editor) = web_sys::window()
                    .and_then(|w| w.document())
                    .and_then(|d| d.get_element_by_id("manual-code"))
                    .and_then(|el| el.dyn_into::<HtmlTextAreaElement>().ok())
                {
                    editor.set_value(&code);
                }
            });
        }
        {
            let game = game.clone();
            on_click(document, "reveal-btn", move || {
                if let Err(e) = game.borrow_mut().session.reveal_solution() {
                    log::warn!("{}", e);
                }
            });
        }
        {
            let game = game.clone();
            on_click(document, "submit-manual-btn", move || {
                let code = textarea_value("manual-code").unwrap_or_default();
                let request = game.borrow_mut().session.submit_manual(code);
                match request {
                    Ok(request) => spawn_review(game.clone(), request),
                    Err(e) => log::warn!("{}", e),
                }
            });
        }
        {
            let game = game.clone();
            on_click(document, "resubmit-btn", move || {
                let mut g = game.borrow_mut();
                if let Some(code) = textarea_value("resubmit-code") {
                    if let Err(e) = g.session.edit_code(code) {
                        log::warn!("{}", e);
                        return;
                    }
                }
                let request = g.session.retry_review();
                drop(g);
                match request {
                    Ok(request) => spawn_review(game.clone(), request),
                    Err(e) => log::warn!("{}", e),
                }
            });
        }
        {
            let game = game.clone();
            on_click(document, "hint-btn", move || spawn_hint(game.clone()));
        }
        {
            let game = game.clone();
            on_click(document, "mute-btn", move || {
                let mut g = game.borrow_mut();
                g.settings.muted = !g.settings.muted;
                let g = &mut *g;
                g.audio.apply_settings(&g.settings);
                g.settings.save();
            });
        }
        {
            let game = game.clone();
            on_click(document, "difficulty-btn", move || {
                let mut g = game.borrow_mut();
                g.settings.difficulty = match g.settings.difficulty {
                    Difficulty::Easy => Difficulty::Normal,
                    Difficulty::Normal => Difficulty::Hard,
                    Difficulty::Hard => Difficulty::Easy,
                };
                g.settings.save();
                let label = g.settings.difficulty.as_str();
                log::info!("Difficulty set to {} (applies to the next level)", label);
                if let Some(document) = web_sys::window().and_then(|w| w.document()) {
                    set_text(&document, "difficulty-btn", label);
                }
            });
        }
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        let events = {
            let mut g = game.borrow_mut();

            // Calculate delta time
            let dt = if g.last_time > 0.0 {
                ((time - g.last_time) / 1000.0) as f32
            } else {
                SIM_DT
            };
            g.last_time = time;

            let events = g.update(dt);
            for event in &events {
                g.on_event(event);
            }
            if let Some(document) = web_sys::window().and_then(|w| w.document()) {
                g.render(&document);
                g.update_hud(&document);
            }
            events
        };

        for event in events {
            if let SessionEvent::ReviewRequested(request) = event {
                spawn_review(game.clone(), request);
            }
        }

        request_animation_frame(game);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Code Bubble (native) starting...");
    log::info!("The browser front-end is the wasm32 build; running a headless demo round");

    let mut args = std::env::args().skip(1);
    let solution = args.next().unwrap_or_else(|| "print('hi')".to_string());
    let difficulty = match args.next() {
        Some(name) => code_bubble::Difficulty::from_str(&name).unwrap_or_else(|| {
            log::warn!("Unknown difficulty {:?}, using Normal", name);
            code_bubble::Difficulty::Normal
        }),
        None => code_bubble::Settings::load().difficulty,
    };
    log::info!("Difficulty: {}", difficulty.as_str());
    let outcome = demo_round(&solution, difficulty);
    println!("{}", outcome);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Autoplay one round against the offline reviewer and describe the outcome
#[cfg(not(target_arch = "wasm32"))]
fn demo_round(solution: &str, difficulty: code_bubble::Difficulty) -> String {
    use code_bubble::consts::SIM_DT;
    use code_bubble::services::{OfflineDistractors, OfflineHints, OfflineReviewer};
    use code_bubble::sim::TickInput;
    use code_bubble::{LevelSpec, ProgressBook, Session, SessionEvent, Tuning};

    let level = LevelSpec {
        id: "demo".to_string(),
        title: "Demo".to_string(),
        problem: String::new(),
        language: "python".to_string(),
        solution: solution.to_string(),
        starter_code: String::new(),
        xp: 20,
    };
    let mut session = Session::new("demo", level, Tuning::for_difficulty(difficulty), 0x5EED);
    session.distractors_with(&OfflineDistractors);
    let mut progress = ProgressBook::new();
    let input = TickInput {
        auto_aim: true,
        ..Default::default()
    };

    // Ten simulated minutes is far more than any demo solution needs
    let mut outcome = None;
    for _ in 0..(600.0 / SIM_DT) as u32 {
        match session.tick(&input, SIM_DT) {
            Some(SessionEvent::ReviewRequested(_)) => {
                outcome = Some(
                    match session.review_with(&OfflineReviewer, &mut progress, 0.0) {
                        Ok(event) => format!("{:?}\ncode: {}", event, session.code()),
                        Err(e) => format!("review failed: {}", e),
                    },
                );
                break;
            }
            Some(SessionEvent::GameOver) => {
                session.hint_with(&OfflineHints {
                    solution: solution.to_string(),
                });
                outcome = Some(format!(
                    "game over after {} tokens\nhint: {}",
                    session.state.matched,
                    session.hint().unwrap_or("")
                ));
                break;
            }
            _ => {}
        }
    }

    match session.state.snapshot_json() {
        Ok(json) => log::debug!("Final state: {}", json),
        Err(e) => log::warn!("Could not snapshot state: {}", e),
    }
    log::info!(
        "Demo finished after {} ticks, {} XP earned",
        session.state.time_ticks,
        progress.total_xp(&session.user)
    );
    outcome.unwrap_or_else(|| format!("round unfinished after {} tokens", session.state.matched))
}
