use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use nodescape_base::{Error, Guid, RenderConfig, Result};
use nodescape_geometry::Quadrilateral;
use tracing::{debug, info, warn};

use crate::coordinator::CoordinatorRegistry;
use crate::data::{DrawSink, FrameOutput, GraphicsData, RendererKind};
use crate::graph::GraphViewProvider;
use crate::input::InputEvent;
use crate::procedures::GraphicsConfiguration;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RendererCommand {
    Input(InputEvent),
    Repaint,
    MoveBounds(Quadrilateral),
    Shutdown,
}

pub struct Renderer {
    data: GraphicsData,
    configuration: GraphicsConfiguration,
    sink: Box<dyn DrawSink>,
    initialized: bool,
}

impl Renderer {
    pub fn new(
        kind: RendererKind,
        view: Guid,
        config: RenderConfig,
        provider: Arc<dyn GraphViewProvider>,
        registry: Arc<CoordinatorRegistry>,
        sink: Box<dyn DrawSink>,
    ) -> Self {
        Self {
            data: GraphicsData::new(kind, view, config, provider, registry),
            configuration: GraphicsConfiguration::for_kind(kind),
            sink,
            initialized: false,
        }
    }

    pub fn kind(&self) -> RendererKind {
        self.data.kind
    }

    pub fn data(&self) -> &GraphicsData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut GraphicsData {
        &mut self.data
    }

    pub fn handle(&mut self, command: RendererCommand) {
        match command {
            RendererCommand::Input(event) => self.data.pending_input.push(event),
            RendererCommand::Repaint => self.data.repaint_requested = true,
            RendererCommand::MoveBounds(bounds) => {
                if self.data.kind == RendererKind::BirdsEye {
                    self.data.birds_eye.drag_bounds(bounds);
                } else {
                    warn!(view = %self.data.view, "bounds drag sent to the main renderer, ignoring");
                }
            }
            RendererCommand::Shutdown => {}
        }
    }

    pub fn render_frame(&mut self) -> &FrameOutput {
        if !self.initialized {
            self.configuration.initialize(&mut self.data);
            self.initialized = true;
        }
        self.data.frame += 1;
        self.configuration.execute(&mut self.data);
        self.sink.present(&self.data.output);
        &self.data.output
    }

    /// Releases coordinator claims and cached geometry. Safe to call twice.
    pub fn dispose(&mut self) {
        if self.initialized {
            self.configuration.dispose(&mut self.data);
            self.initialized = false;
        }
    }

    pub fn spawn(self) -> RendererHandle {
        let kind = self.data.kind;
        let view = self.data.view;
        let scheduler = self.data.config.scheduler.clone();
        let provider = Arc::clone(&self.data.provider);

        let (commands, inbox) = mpsc::channel();
        let (done_tx, done) = mpsc::channel();
        let (stop_poll, poll_stop) = mpsc::channel::<()>();

        let frame_interval = scheduler.frame_interval();
        let render = thread::spawn(move || {
            run_loop(self, inbox, frame_interval);
            let _ = done_tx.send(());
        });

        let poll_sender = commands.clone();
        let poll_interval = scheduler.poll_interval();
        let poll = thread::spawn(move || poll_revisions(provider, poll_sender, poll_stop, poll_interval));

        info!(?kind, %view, "renderer started");
        RendererHandle {
            kind,
            view,
            commands,
            done,
            stop_poll: Some(stop_poll),
            render: Some(render),
            poll: Some(poll),
            shutdown_timeout: scheduler.shutdown_timeout(),
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn run_loop(mut renderer: Renderer, inbox: Receiver<RendererCommand>, frame_interval: Duration) {
    let mut next_frame = Instant::now();
    loop {
        let wait = next_frame.saturating_duration_since(Instant::now());
        match inbox.recv_timeout(wait) {
            Ok(RendererCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => renderer.handle(command),
            Err(RecvTimeoutError::Timeout) => {}
        }
        if Instant::now() >= next_frame {
            let frame = renderer.render_frame();
            debug!(kind = ?frame.kind, frame = frame.frame, commands = frame.commands.len(), "frame drawn");
            next_frame = Instant::now() + frame_interval;
        }
    }
    renderer.dispose();
}

fn poll_revisions(
    provider: Arc<dyn GraphViewProvider>,
    commands: Sender<RendererCommand>,
    stop: Receiver<()>,
    interval: Duration,
) {
    let mut seen = provider.revision();
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => break,
        }
        let revision = provider.revision();
        if revision != seen {
            seen = revision;
            if commands.send(RendererCommand::Repaint).is_err() {
                break;
            }
        }
    }
}

pub struct RendererHandle {
    kind: RendererKind,
    view: Guid,
    commands: Sender<RendererCommand>,
    done: Receiver<()>,
    stop_poll: Option<Sender<()>>,
    render: Option<JoinHandle<()>>,
    poll: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl RendererHandle {
    pub fn kind(&self) -> RendererKind {
        self.kind
    }

    pub fn view(&self) -> Guid {
        self.view
    }

    pub fn send(&self, command: RendererCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::RendererStopped)
    }

    pub fn input(&self, event: InputEvent) -> Result<()> {
        self.send(RendererCommand::Input(event))
    }

    pub fn move_bounds(&self, bounds: Quadrilateral) -> Result<()> {
        self.send(RendererCommand::MoveBounds(bounds))
    }

    /// Stops the poller and the render loop, waiting up to the configured
    /// timeout. Returns `false` if the render thread was abandoned.
    pub fn shutdown(mut self) -> bool {
        self.stop()
    }

    fn stop(&mut self) -> bool {
        let Some(render) = self.render.take() else {
            return true;
        };
        self.stop_poll.take();
        let _ = self.commands.send(RendererCommand::Shutdown);

        match self.done.recv_timeout(self.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if render.join().is_err() {
                    warn!(kind = ?self.kind, view = %self.view, "render thread panicked");
                }
                if let Some(poll) = self.poll.take() {
                    let _ = poll.join();
                }
                info!(kind = ?self.kind, view = %self.view, "renderer stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    kind = ?self.kind,
                    view = %self.view,
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "renderer did not stop in time, abandoning its thread"
                );
                false
            }
        }
    }
}

impl Drop for RendererHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
