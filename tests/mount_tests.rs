//! Integration tests for the two-phase mount, driven by an in-memory host.
//!
//! Tokio time is paused, so timers (settle delay, probe timeout) fire as soon
//! as every task is idle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use mailframe::config::RenderConfig;
use mailframe::error::RenderError;
use mailframe::model::attachment::Attachment;
use mailframe::model::content::EmailContent;
use mailframe::render::document::{FrameSpec, Sandbox, FRAME_CLASS};
use mailframe::render::mount::{AttachedFrame, FrameId, FrameStyle};
use mailframe::render::sanitize::{AmmoniaSanitizer, HtmlSanitizer};
use mailframe::render::theme::HostTheme;
use mailframe::render::{FrameEvent, FrameHost, RenderEnv, Renderer};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Probe { id: FrameId, width: u32 },
    Mount { container: u32, id: FrameId, height: u32, srcdoc: String },
    Placeholder { container: u32, text: String },
    Remove(FrameId),
    SetHeight(FrameId, u32),
}

struct FakeFrame {
    events: mpsc::UnboundedSender<FrameEvent>,
    scroll_height: Option<u32>,
}

#[derive(Default)]
struct State {
    next_id: FrameId,
    frames: HashMap<FrameId, FakeFrame>,
    ops: Vec<Op>,
    /// Scroll height reported by newly attached frames.
    content_height: Option<u32>,
    container_height: Option<u32>,
    probes_load: bool,
    frames_load: bool,
    /// Called with the container after every visible mount, outside the state lock.
    on_mount: Option<Arc<dyn Fn(u32) + Send + Sync>>,
}

struct FakeHost {
    state: Mutex<State>,
}

impl FakeHost {
    fn new(content_height: Option<u32>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                next_id: 1,
                content_height,
                probes_load: true,
                frames_load: true,
                ..State::default()
            }),
        })
    }

    fn with(&self, f: impl FnOnce(&mut State)) {
        f(&mut self.state.lock().unwrap());
    }

    fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    fn send(&self, id: FrameId, event: FrameEvent) {
        let state = self.state.lock().unwrap();
        state.frames[&id].events.send(event).unwrap();
    }

    fn set_scroll_height(&self, id: FrameId, height: u32) {
        self.state
            .lock()
            .unwrap()
            .frames
            .get_mut(&id)
            .unwrap()
            .scroll_height = Some(height);
    }

    fn probes(&self) -> Vec<FrameId> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Probe { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    fn mounts(&self) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|op| matches!(op, Op::Mount { .. }))
            .collect()
    }
}

fn attach(state: &mut State, loads: bool) -> AttachedFrame {
    let id = state.next_id;
    state.next_id += 1;
    let (tx, rx) = mpsc::unbounded_channel();
    if loads {
        tx.send(FrameEvent::Loaded).unwrap();
    }
    state.frames.insert(
        id,
        FakeFrame {
            events: tx,
            scroll_height: state.content_height,
        },
    );
    AttachedFrame { id, events: rx }
}

impl FrameHost for FakeHost {
    type Container = u32;

    fn container_width(&self, _container: &u32) -> u32 {
        640
    }

    fn container_height(&self, _container: &u32) -> Option<u32> {
        self.state.lock().unwrap().container_height
    }

    fn show_placeholder(&self, container: &u32, text: &str) {
        self.state.lock().unwrap().ops.push(Op::Placeholder {
            container: *container,
            text: text.to_string(),
        });
    }

    fn attach_probe(&self, spec: &FrameSpec, width: u32) -> AttachedFrame {
        assert_eq!(spec.sandbox, Sandbox::Probe);
        let mut state = self.state.lock().unwrap();
        let loads = state.probes_load;
        let frame = attach(&mut state, loads);
        state.ops.push(Op::Probe { id: frame.id, width });
        frame
    }

    fn mount(&self, container: &u32, spec: &FrameSpec, style: &FrameStyle) -> AttachedFrame {
        assert_eq!(spec.sandbox, Sandbox::Visible);
        assert_eq!(style.class, FRAME_CLASS);
        let mut state = self.state.lock().unwrap();
        let loads = state.frames_load;
        let frame = attach(&mut state, loads);
        state.ops.push(Op::Mount {
            container: *container,
            id: frame.id,
            height: style.height,
            srcdoc: spec.srcdoc.clone(),
        });
        let on_mount = state.on_mount.clone();
        drop(state);
        if let Some(callback) = on_mount {
            callback(*container);
        }
        frame
    }

    fn remove(&self, frame: FrameId) {
        let mut state = self.state.lock().unwrap();
        if state.frames.remove(&frame).is_some() {
            state.ops.push(Op::Remove(frame));
        }
    }

    fn body_scroll_height(&self, frame: FrameId) -> Option<u32> {
        self.state
            .lock()
            .unwrap()
            .frames
            .get(&frame)
            .and_then(|f| f.scroll_height)
    }

    fn set_height(&self, frame: FrameId, height: u32) {
        self.state
            .lock()
            .unwrap()
            .ops
            .push(Op::SetHeight(frame, height));
    }
}

fn sanitizer() -> Option<Arc<dyn HtmlSanitizer>> {
    Some(Arc::new(AmmoniaSanitizer::email()))
}

fn dark() -> RenderEnv {
    RenderEnv {
        host_theme: HostTheme::Dark,
        system_prefers_dark: true,
    }
}

/// Let spawned render tasks run until they block.
async fn run_pending() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// ─── Two-phase mount ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_probe_measures_then_mounts() {
    let host = FakeHost::new(Some(480));
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), RenderConfig::default());

    let mut handle = renderer
        .render(&7, &EmailContent::html("<p>Hello</p>"), dark())
        .unwrap();
    assert_eq!(handle.measured().await.unwrap(), 496);
    let view = handle.mounted().await.unwrap();
    assert_eq!(view.initial_height, 496);

    let ops = host.ops();
    let probe = host.probes()[0];
    assert_eq!(ops[0], Op::Probe { id: probe, width: 640 });
    assert_eq!(ops[1], Op::Remove(probe));
    match &ops[2] {
        Op::Mount {
            container,
            id,
            height,
            srcdoc,
        } => {
            assert_eq!(*container, 7);
            assert_eq!(*id, view.frame);
            assert_eq!(*height, 496);
            assert!(srcdoc.contains("<p>Hello</p>"));
            assert!(srcdoc.contains("background:#2a2a2a!important"));
        }
        other => panic!("expected mount, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_zero_probe_height_falls_back_to_container() {
    let host = FakeHost::new(Some(0));
    host.with(|s| s.container_height = Some(250));
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), RenderConfig::default());

    let mut handle = renderer
        .render(&1, &EmailContent::text("hi"), dark())
        .unwrap();
    assert_eq!(handle.measured().await.unwrap(), 266);
}

#[tokio::test(start_paused = true)]
async fn test_no_heights_fall_back_to_default() {
    let host = FakeHost::new(None);
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), RenderConfig::default());

    let mut handle = renderer
        .render(&1, &EmailContent::text("hi"), dark())
        .unwrap();
    assert_eq!(handle.measured().await.unwrap(), 316);
}

// ─── Live fixups ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_fixups_follow_image_and_resize_events() {
    let host = FakeHost::new(Some(300));
    let config = RenderConfig {
        settle_delay_ms: 60_000,
        ..RenderConfig::default()
    };
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), config);

    let handle = renderer
        .render(&1, &EmailContent::html("<p>x</p>"), dark())
        .unwrap();
    let mut view = handle.mounted().await.unwrap();
    assert_eq!(view.current_height(), 316);

    host.set_scroll_height(view.frame, 900);
    host.send(view.frame, FrameEvent::ImageLoaded);
    view.height.changed().await.unwrap();
    assert_eq!(view.current_height(), 916);

    host.set_scroll_height(view.frame, 700);
    host.send(view.frame, FrameEvent::BodyResized);
    view.height.changed().await.unwrap();
    assert_eq!(view.current_height(), 716);

    let sets: Vec<_> = host
        .ops()
        .into_iter()
        .filter(|op| matches!(op, Op::SetHeight(..)))
        .collect();
    assert_eq!(
        sets,
        vec![Op::SetHeight(view.frame, 916), Op::SetHeight(view.frame, 716)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_settle_delay_remeasures_once() {
    let host = FakeHost::new(Some(200));
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), RenderConfig::default());

    let handle = renderer
        .render(&1, &EmailContent::html("<p>x</p>"), dark())
        .unwrap();
    let mut view = handle.mounted().await.unwrap();
    host.set_scroll_height(view.frame, 350);

    view.height.changed().await.unwrap();
    assert_eq!(view.current_height(), 366);
}

#[tokio::test(start_paused = true)]
async fn test_tracking_stops_when_frame_removed() {
    let host = FakeHost::new(Some(200));
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), RenderConfig::default());

    let mut handle = renderer
        .render(&3, &EmailContent::html("<p>x</p>"), dark())
        .unwrap();
    handle.measured().await.unwrap();
    run_pending().await;
    assert!(renderer.is_rendering(&3));

    let frame = match host.mounts().pop() {
        Some(Op::Mount { id, .. }) => id,
        other => panic!("expected mount, got {other:?}"),
    };
    host.remove(frame);
    run_pending().await;
    assert!(handle.is_finished());
    assert!(!renderer.is_rendering(&3));
}

#[tokio::test(start_paused = true)]
async fn test_huge_scroll_height_saturates() {
    let host = FakeHost::new(Some(u32::MAX));
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), RenderConfig::default());

    let mut handle = renderer
        .render(&1, &EmailContent::html("<p>x</p>"), dark())
        .unwrap();
    assert_eq!(handle.measured().await.unwrap(), u32::MAX);
    let mut view = handle.mounted().await.unwrap();

    host.send(view.frame, FrameEvent::ImageLoaded);
    view.height.changed().await.unwrap();
    assert_eq!(view.current_height(), u32::MAX);
}

#[tokio::test(start_paused = true)]
async fn test_host_can_query_renderer_while_mounting() {
    let host = FakeHost::new(Some(100));
    let renderer = Arc::new(Renderer::new(
        Arc::clone(&host),
        sanitizer(),
        RenderConfig::default(),
    ));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (r, s) = (Arc::clone(&renderer), Arc::clone(&seen));
    host.with(|state| {
        state.on_mount = Some(Arc::new(move |container: u32| {
            s.lock().unwrap().push(r.is_rendering(&container));
        }));
    });

    let handle = renderer
        .render(&4, &EmailContent::html("<p>x</p>"), dark())
        .unwrap();
    handle.mounted().await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![true]);
}

// ─── Probe timeout ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_probe_timeout_mounts_at_fallback_height() {
    let host = FakeHost::new(Some(480));
    host.with(|s| {
        s.probes_load = false;
        s.container_height = Some(420);
    });
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), RenderConfig::default());

    let start = tokio::time::Instant::now();
    let mut handle = renderer
        .render(&1, &EmailContent::html("<p>x</p>"), dark())
        .unwrap();
    assert_eq!(handle.measured().await.unwrap(), 436);
    assert!(start.elapsed() >= std::time::Duration::from_millis(5_000));

    let view = handle.mounted().await.unwrap();
    let probe = host.probes()[0];
    assert!(host.ops().contains(&Op::Remove(probe)));
    assert_eq!(view.initial_height, 436);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_probe_wait_never_mounts() {
    let host = FakeHost::new(Some(480));
    host.with(|s| s.probes_load = false);
    let config = RenderConfig {
        probe_timeout_ms: 0,
        ..RenderConfig::default()
    };
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), config);

    let handle = renderer
        .render(&1, &EmailContent::html("<p>x</p>"), dark())
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(3_600)).await;
    assert!(host.mounts().is_empty());
    assert!(!handle.is_finished());

    handle.cancel();
    run_pending().await;
    assert!(host.ops().contains(&Op::Remove(host.probes()[0])));
}

// ─── Cancellation ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_newer_render_cancels_older() {
    let host = FakeHost::new(Some(100));
    host.with(|s| s.probes_load = false);
    let config = RenderConfig {
        probe_timeout_ms: 0,
        ..RenderConfig::default()
    };
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), config);

    let first = renderer
        .render(&1, &EmailContent::html("<p>first</p>"), dark())
        .unwrap();
    run_pending().await;
    let second = renderer
        .render(&1, &EmailContent::html("<p>second</p>"), dark())
        .unwrap();
    run_pending().await;

    let probes = host.probes();
    assert_eq!(probes.len(), 2);
    assert!(host.ops().contains(&Op::Remove(probes[0])));
    assert!(matches!(first.mounted().await, Err(RenderError::Cancelled)));

    host.send(probes[1], FrameEvent::Loaded);
    let view = second.mounted().await.unwrap();
    assert_eq!(view.initial_height, 116);

    let mounts = host.mounts();
    assert_eq!(mounts.len(), 1);
    match &mounts[0] {
        Op::Mount { srcdoc, .. } => {
            assert!(srcdoc.contains("second"));
            assert!(!srcdoc.contains("first"));
        }
        other => panic!("expected mount, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_renders_in_different_containers_are_independent() {
    let host = FakeHost::new(Some(100));
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), RenderConfig::default());

    let a = renderer
        .render(&1, &EmailContent::html("<p>a</p>"), dark())
        .unwrap();
    let b = renderer
        .render(&2, &EmailContent::html("<p>b</p>"), dark())
        .unwrap();
    assert!(a.mounted().await.is_ok());
    assert!(b.mounted().await.is_ok());
    assert_eq!(host.mounts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_by_container() {
    let host = FakeHost::new(Some(100));
    host.with(|s| s.probes_load = false);
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), RenderConfig::default());

    let handle = renderer
        .render(&5, &EmailContent::html("<p>x</p>"), dark())
        .unwrap();
    run_pending().await;
    renderer.cancel(&5);
    assert!(!renderer.is_rendering(&5));
    assert!(matches!(handle.mounted().await, Err(RenderError::Cancelled)));
    assert!(host.mounts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_task_starts_clears_state() {
    let host = FakeHost::new(Some(100));
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), RenderConfig::default());

    let handle = renderer
        .render(&9, &EmailContent::html("<p>x</p>"), dark())
        .unwrap();
    handle.cancel();
    run_pending().await;

    assert!(handle.is_finished());
    assert!(!renderer.is_rendering(&9));
    assert!(host.ops().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_handle_cancel_clears_state() {
    let host = FakeHost::new(Some(100));
    host.with(|s| s.probes_load = false);
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), RenderConfig::default());

    let handle = renderer
        .render(&9, &EmailContent::html("<p>x</p>"), dark())
        .unwrap();
    run_pending().await;
    assert!(renderer.is_rendering(&9));

    handle.cancel();
    run_pending().await;
    assert!(!renderer.is_rendering(&9));
    assert!(host.ops().contains(&Op::Remove(host.probes()[0])));
}

// ─── Large emails ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_large_email_skips_probe() {
    let host = FakeHost::new(Some(5_000));
    let renderer = Renderer::new(Arc::clone(&host), sanitizer(), RenderConfig::default());

    let html = format!("<p>{}</p>", "lorem ipsum ".repeat(6_000));
    let mut handle = renderer
        .render(&1, &EmailContent::html(html), dark())
        .unwrap();
    assert_eq!(handle.measured().await.unwrap(), 800);
    let mut view = handle.mounted().await.unwrap();

    assert!(host.probes().is_empty());
    match &host.ops()[0] {
        Op::Placeholder { container, text } => {
            assert_eq!(*container, 1);
            assert!(text.starts_with("Loading large email ("), "{text}");
            assert!(text.ends_with("KB)..."), "{text}");
        }
        other => panic!("expected placeholder, got {other:?}"),
    }

    view.height.changed().await.unwrap();
    assert_eq!(view.current_height(), 5_016);
}

// ─── Sanitizer policy ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_missing_sanitizer_fails_before_touching_host() {
    let host = FakeHost::new(Some(100));
    let renderer = Renderer::new(Arc::clone(&host), None, RenderConfig::default());

    let content = EmailContent::html(r#"<p>x</p><img src="cid:a">"#)
        .with_attachments(vec![Attachment::inline_cid("a")]);
    let err = renderer.render(&1, &content, dark()).unwrap_err();
    assert!(matches!(err, RenderError::SanitizerUnavailable));
    assert!(host.ops().is_empty());
    assert!(!renderer.is_rendering(&1));
}
