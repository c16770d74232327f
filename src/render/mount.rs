//! Two-phase asynchronous mount of a prepared email into a host container.
//!
//! The document is first loaded into a hidden off-screen probe frame so its
//! natural height can be measured; the probe is removed and a visible frame
//! is mounted at that height. After the visible frame loads, its height is
//! re-applied whenever an image loads or the body resizes, and once more
//! after a short settle delay.
//!
//! Each render runs as one Tokio task. A new render for the same container
//! cancels the previous one, so the container always ends up showing the
//! most recent email.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};

use super::document::{FrameSpec, Sandbox, FRAME_CLASS, HEIGHT_TRANSITION};
use super::sanitize::{HtmlSanitizer, UnsanitizedPolicy};
use super::{prepare, PreparedEmail, RenderEnv};
use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::i18n;
use crate::model::content::EmailContent;

/// Host-assigned frame identifier.
pub type FrameId = u64;

/// Lifecycle notifications for one frame, sent by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// The frame's document finished loading.
    Loaded,
    /// An image inside the frame finished loading.
    ImageLoaded,
    /// The frame's body changed size.
    BodyResized,
}

/// A frame the host has created, with its event stream.
///
/// The host drops the sender side when the frame is removed.
#[derive(Debug)]
pub struct AttachedFrame {
    pub id: FrameId,
    pub events: mpsc::UnboundedReceiver<FrameEvent>,
}

/// Presentation of the visible frame element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStyle {
    pub class: &'static str,
    /// Initial height in pixels; width is always 100% of the container.
    pub height: u32,
    pub transition: &'static str,
}

/// The embedding surface: creates frames, measures them, and reports their events.
///
/// Implementations may call back into the [`Renderer`] from any method.
pub trait FrameHost: Send + Sync + 'static {
    /// Handle to an element that receives rendered emails.
    type Container: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Current client width of the container, in pixels.
    fn container_width(&self, container: &Self::Container) -> u32;

    /// Current height of the container, if it has been laid out.
    fn container_height(&self, container: &Self::Container) -> Option<u32>;

    /// Replace the container's contents with a text placeholder.
    fn show_placeholder(&self, container: &Self::Container, text: &str);

    /// Attach a hidden, off-screen frame of the given width outside any container.
    fn attach_probe(&self, spec: &FrameSpec, width: u32) -> AttachedFrame;

    /// Replace the container's contents with a visible frame.
    fn mount(
        &self,
        container: &Self::Container,
        spec: &FrameSpec,
        style: &FrameStyle,
    ) -> AttachedFrame;

    /// Detach a frame. Removing an unknown frame is a no-op.
    fn remove(&self, frame: FrameId);

    /// `scrollHeight` of the frame's body, if its document is accessible.
    fn body_scroll_height(&self, frame: FrameId) -> Option<u32>;

    /// Apply a new height to a frame.
    fn set_height(&self, frame: FrameId, height: u32);
}

/// A mounted visible frame.
#[derive(Debug, Clone)]
pub struct MountedView {
    pub frame: FrameId,
    /// Height the frame was mounted with.
    pub initial_height: u32,
    /// Latest height applied by the live fixups.
    pub height: watch::Receiver<u32>,
}

impl MountedView {
    /// Most recently applied height.
    pub fn current_height(&self) -> u32 {
        *self.height.borrow()
    }
}

/// Completion signals of one render.
///
/// Dropping the handle does not cancel the render.
#[derive(Debug)]
pub struct RenderHandle {
    measured: Option<oneshot::Receiver<u32>>,
    measured_value: Option<u32>,
    mounted: Option<oneshot::Receiver<MountedView>>,
    task: Option<JoinHandle<Result<()>>>,
    abort: AbortHandle,
}

impl RenderHandle {
    /// Wait for the initial height (probe measurement, timeout fallback, or
    /// the large-email default).
    pub async fn measured(&mut self) -> Result<u32> {
        if let Some(height) = self.measured_value {
            return Ok(height);
        }
        let Some(rx) = self.measured.take() else {
            return Err(RenderError::Cancelled);
        };
        match rx.await {
            Ok(height) => {
                self.measured_value = Some(height);
                Ok(height)
            }
            Err(_) => Err(self.task_error().await),
        }
    }

    /// Wait for the visible frame to be mounted.
    pub async fn mounted(mut self) -> Result<MountedView> {
        let Some(rx) = self.mounted.take() else {
            return Err(RenderError::Cancelled);
        };
        match rx.await {
            Ok(view) => Ok(view),
            Err(_) => Err(self.task_error().await),
        }
    }

    /// Cancel this render. The container is left untouched if it has not
    /// been mounted yet; a probe frame is removed.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// `true` once the render task, including live height tracking, has ended.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    async fn task_error(&mut self) -> RenderError {
        match self.task.take() {
            Some(task) => match task.await {
                Ok(Err(e)) => e,
                _ => RenderError::Cancelled,
            },
            None => RenderError::Cancelled,
        }
    }
}

struct InFlight {
    generation: u64,
    abort: Option<AbortHandle>,
}

/// State shared between the renderer and its tasks.
struct Shared<H: FrameHost> {
    host: Arc<H>,
    config: RenderConfig,
    inflight: Mutex<HashMap<H::Container, InFlight>>,
    /// Held across container writes. Separate from `inflight` so hosts may
    /// call back into the renderer from inside `mount`/`show_placeholder`.
    host_writes: Mutex<()>,
}

impl<H: FrameHost> Shared<H> {
    fn inflight(&self) -> MutexGuard<'_, HashMap<H::Container, InFlight>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, container: &H::Container, generation: u64) -> bool {
        self.inflight()
            .get(container)
            .is_some_and(|entry| entry.generation == generation)
    }

    /// Run `f` against the host unless a newer render owns the container.
    ///
    /// Container writes are serialized and the generation is checked inside
    /// that critical section, so a newer render always writes last. The
    /// `inflight` map itself is not locked while `f` runs.
    fn if_current<T>(
        &self,
        container: &H::Container,
        generation: u64,
        f: impl FnOnce(&H) -> T,
    ) -> Result<T> {
        let _writes = self.host_writes.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_current(container, generation) {
            return Err(RenderError::Cancelled);
        }
        Ok(f(&self.host))
    }

    fn finish(&self, container: &H::Container, generation: u64) {
        let mut inflight = self.inflight();
        if inflight
            .get(container)
            .is_some_and(|entry| entry.generation == generation)
        {
            inflight.remove(container);
        }
    }
}

/// Removes a frame when dropped, including when the owning task is aborted.
struct FrameGuard<H: FrameHost> {
    host: Arc<H>,
    id: FrameId,
}

impl<H: FrameHost> Drop for FrameGuard<H> {
    fn drop(&mut self) {
        self.host.remove(self.id);
    }
}

/// Clears the container's in-flight entry when the render task ends or is aborted.
struct InFlightGuard<H: FrameHost> {
    shared: Arc<Shared<H>>,
    container: H::Container,
    generation: u64,
}

impl<H: FrameHost> Drop for InFlightGuard<H> {
    fn drop(&mut self) {
        self.shared.finish(&self.container, self.generation);
    }
}

/// Renders emails into host containers.
pub struct Renderer<H: FrameHost> {
    shared: Arc<Shared<H>>,
    sanitizer: Option<Arc<dyn HtmlSanitizer>>,
    policy: UnsanitizedPolicy,
    next_generation: AtomicU64,
}

impl<H: FrameHost> Renderer<H> {
    /// Create a renderer.
    ///
    /// With `sanitizer` set to `None`, `config.unsanitized` decides whether
    /// renders fail or embed the HTML unsanitized.
    pub fn new(host: Arc<H>, sanitizer: Option<Arc<dyn HtmlSanitizer>>, config: RenderConfig) -> Self {
        let policy = config.unsanitized;
        Self {
            shared: Arc::new(Shared {
                host,
                config,
                inflight: Mutex::new(HashMap::new()),
                host_writes: Mutex::new(()),
            }),
            sanitizer,
            policy,
            next_generation: AtomicU64::new(1),
        }
    }

    /// The host this renderer mounts into.
    pub fn host(&self) -> &Arc<H> {
        &self.shared.host
    }

    /// Render `content` into `container`.
    ///
    /// Returns as soon as the document is prepared; measuring and mounting
    /// continue on a spawned task. Any render already in flight for the same
    /// container is cancelled. Must be called from within a Tokio runtime.
    pub fn render(
        &self,
        container: &H::Container,
        content: &EmailContent,
        env: RenderEnv,
    ) -> Result<RenderHandle> {
        let prepared = prepare(content, env, self.sanitizer.as_deref(), self.policy)?;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        if let Some(previous) = self.shared.inflight().insert(
            container.clone(),
            InFlight {
                generation,
                abort: None,
            },
        ) {
            tracing::debug!(?container, superseded = previous.generation, "Cancelling in-flight render");
            if let Some(abort) = previous.abort {
                abort.abort();
            }
        }

        let (measured_tx, measured_rx) = oneshot::channel();
        let (mounted_tx, mounted_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let target = container.clone();
        // Built outside the future so the entry is cleared even if the task
        // is aborted before its first poll.
        let inflight = InFlightGuard {
            shared: Arc::clone(&shared),
            container: target.clone(),
            generation,
        };
        let task = tokio::spawn(async move {
            let _inflight = inflight;
            let result = run(&shared, &target, generation, prepared, measured_tx, mounted_tx).await;
            if let Err(e) = &result {
                tracing::debug!(container = ?target, error = %e, "Render ended early");
            }
            result
        });

        let abort = task.abort_handle();
        if let Some(entry) = self.shared.inflight().get_mut(container) {
            if entry.generation == generation {
                entry.abort = Some(abort.clone());
            }
        }

        Ok(RenderHandle {
            measured: Some(measured_rx),
            measured_value: None,
            mounted: Some(mounted_rx),
            task: Some(task),
            abort,
        })
    }

    /// Cancel whatever render is in flight for `container`.
    pub fn cancel(&self, container: &H::Container) {
        if let Some(entry) = self.shared.inflight().remove(container) {
            if let Some(abort) = entry.abort {
                abort.abort();
            }
        }
    }

    /// `true` while a render task for `container` is running.
    pub fn is_rendering(&self, container: &H::Container) -> bool {
        self.shared.inflight().contains_key(container)
    }
}

async fn run<H: FrameHost>(
    shared: &Arc<Shared<H>>,
    container: &H::Container,
    generation: u64,
    prepared: PreparedEmail,
    measured_tx: oneshot::Sender<u32>,
    mounted_tx: oneshot::Sender<MountedView>,
) -> Result<()> {
    let config = &shared.config;
    let host = &shared.host;
    let large = prepared.body.len() > config.large_email_threshold;

    let initial_height = if large {
        tracing::debug!(bytes = prepared.body.len(), "Large email, skipping height probe");
        let text = i18n::loading_placeholder(prepared.body.len());
        shared.if_current(container, generation, |host| {
            host.show_placeholder(container, &text);
        })?;
        config.large_email_initial_height
    } else {
        measure(shared, container, &prepared.document).await?
    };
    let _ = measured_tx.send(initial_height);

    let spec = FrameSpec {
        srcdoc: prepared.document,
        sandbox: Sandbox::Visible,
    };
    let style = FrameStyle {
        class: FRAME_CLASS,
        height: initial_height,
        transition: HEIGHT_TRANSITION,
    };
    let mut frame =
        shared.if_current(container, generation, |host| host.mount(container, &spec, &style))?;
    tracing::debug!(frame = frame.id, height = initial_height, "Mounted email frame");

    let (height_tx, height_rx) = watch::channel(initial_height);
    let _ = mounted_tx.send(MountedView {
        frame: frame.id,
        initial_height,
        height: height_rx,
    });

    let settle = if large {
        config.large_email_remeasure()
    } else {
        config.settle_delay()
    };
    track_height(&**host, &mut frame, initial_height, config.height_padding, settle, &height_tx).await;
    Ok(())
}

/// Load the document off-screen and return its padded natural height.
async fn measure<H: FrameHost>(
    shared: &Arc<Shared<H>>,
    container: &H::Container,
    document: &str,
) -> Result<u32> {
    let host = &shared.host;
    let config = &shared.config;
    let spec = FrameSpec {
        srcdoc: document.to_string(),
        sandbox: Sandbox::Probe,
    };
    let mut probe = host.attach_probe(&spec, host.container_width(container));
    let guard = FrameGuard {
        host: Arc::clone(host),
        id: probe.id,
    };

    let scroll_height = match wait_for_load(&mut probe.events, config.probe_timeout()).await {
        LoadOutcome::Loaded => host.body_scroll_height(probe.id),
        LoadOutcome::TimedOut => {
            tracing::warn!(
                frame = probe.id,
                timeout_ms = config.probe_timeout_ms,
                "Height probe did not load in time, mounting at fallback height"
            );
            None
        }
        LoadOutcome::Detached => return Err(RenderError::HostDetached(probe.id)),
    };
    drop(guard);

    let height = scroll_height
        .filter(|h| *h > 0)
        .or_else(|| host.container_height(container).filter(|h| *h > 0))
        .unwrap_or(config.fallback_height);
    Ok(height.saturating_add(config.height_padding))
}

enum LoadOutcome {
    Loaded,
    TimedOut,
    Detached,
}

async fn wait_for_load(
    events: &mut mpsc::UnboundedReceiver<FrameEvent>,
    timeout: Option<Duration>,
) -> LoadOutcome {
    let loaded = async {
        while let Some(event) = events.recv().await {
            if event == FrameEvent::Loaded {
                return LoadOutcome::Loaded;
            }
        }
        LoadOutcome::Detached
    };
    match timeout {
        Some(limit) => tokio::time::timeout(limit, loaded)
            .await
            .unwrap_or(LoadOutcome::TimedOut),
        None => loaded.await,
    }
}

/// Keep the visible frame sized to its content until the host drops it.
async fn track_height<H: FrameHost>(
    host: &H,
    frame: &mut AttachedFrame,
    fallback: u32,
    padding: u32,
    settle: Duration,
    height_tx: &watch::Sender<u32>,
) {
    let id = frame.id;
    let fix = || {
        let height = host
            .body_scroll_height(id)
            .filter(|h| *h > 0)
            .unwrap_or(fallback)
            .saturating_add(padding);
        host.set_height(id, height);
        height_tx.send_replace(height);
    };

    if let LoadOutcome::Detached = wait_for_load(&mut frame.events, None).await {
        tracing::debug!(frame = id, "Frame removed before it loaded");
        return;
    }

    let settle = tokio::time::sleep(settle);
    tokio::pin!(settle);
    let mut settled = false;
    loop {
        tokio::select! {
            () = &mut settle, if !settled => {
                settled = true;
                fix();
            }
            event = frame.events.recv() => match event {
                Some(_) => fix(),
                None => break,
            },
        }
    }
    tracing::trace!(frame = id, "Stopped tracking frame height");
}
