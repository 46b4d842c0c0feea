use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes},
};

use crate::config::{Config, SinkKind};
use crate::error::AppError;
use crate::frame::FramePipeline;
use crate::gfx::{GpuContext, GpuFrameBackend};
use crate::performance::PerformanceMonitor;
use crate::simulation::{FlockDescriptor, SimulationState};
use crate::telemetry::{
    telemetry_channel, ColumnarSink, LogPublisher, PerAxisSink, SinkWorker, SnapshotSink,
    TelemetryChannel,
};

const WINDOW_TITLE: &str = "boidcast";
const WINDOW_SIZE: PhysicalSize<u32> = PhysicalSize::new(1024, 768);

type BoxedSink = Box<dyn SnapshotSink>;

pub struct BoidcastApp {
    event_loop: EventLoop<()>,
    app_state: AppState,
    sink_worker: SinkWorker<BoxedSink>,
}

struct AppState {
    config: Config,
    window: Option<Arc<Window>>,
    pipeline: Option<FramePipeline<GpuFrameBackend>>,
    /// Held until the GPU backend takes it over.
    telemetry: Option<TelemetryChannel>,
    monitor: PerformanceMonitor,
    failure: Option<AppError>,
}

impl BoidcastApp {
    /// Creates the event loop and starts the telemetry sink thread.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let event_loop = EventLoop::new()?;

        let (telemetry, receiver) = telemetry_channel(config.staging_slots);
        let sink: BoxedSink = match config.sink {
            SinkKind::Columnar => {
                Box::new(ColumnarSink::new(LogPublisher::new(config.broker.clone())))
            }
            SinkKind::PerAxis => {
                Box::new(PerAxisSink::new(LogPublisher::new(config.broker.clone())))
            }
        };
        let sink_worker = SinkWorker::spawn(receiver, sink)?;

        Ok(Self {
            event_loop,
            app_state: AppState {
                config,
                window: None,
                pipeline: None,
                telemetry: Some(telemetry),
                monitor: PerformanceMonitor::new(),
                failure: None,
            },
            sink_worker,
        })
    }

    /// Runs until the window closes or a fatal error occurs.
    ///
    /// GPU resources are released and the sink thread is drained and joined
    /// before this returns.
    pub fn run(self) -> Result<(), AppError> {
        let Self {
            event_loop,
            mut app_state,
            sink_worker,
        } = self;

        event_loop.set_control_flow(ControlFlow::Poll);
        let loop_result = event_loop.run_app(&mut app_state);

        app_state.shutdown();
        let failure = app_state.failure.take();
        drop(app_state);

        if let Some(summary) = sink_worker.join() {
            log::info!("Sink handled {} snapshots", summary.handled);
        }

        loop_result?;
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let window = Arc::new(
            event_loop.create_window(
                WindowAttributes::default()
                    .with_title(WINDOW_TITLE)
                    .with_inner_size(WINDOW_SIZE),
            )?,
        );
        self.window = Some(window.clone());

        let context = pollster::block_on(GpuContext::new(
            window,
            self.config.force_fallback_adapter,
        ))?;

        let flock = FlockDescriptor {
            particle_count: self.config.particle_count,
            seed: self.config.seed,
            params: self.config.params,
            mode: self.config.buffering,
        };
        let state = SimulationState::new(context.device(), context.format(), &flock)?;

        // a channel nobody consumes counts every snapshot as dropped
        let telemetry = self
            .telemetry
            .take()
            .unwrap_or_else(|| telemetry_channel(self.config.staging_slots).0);
        let backend = GpuFrameBackend::new(context, state, self.config.staging_slots, telemetry);
        self.pipeline = Some(
            FramePipeline::new(backend, self.config.buffering)
                .with_readback_interval(self.config.readback_interval),
        );
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: AppError) {
        self.record_failure(error);
        event_loop.exit();
    }

    /// Keeps the first error and drops the pipeline, so a redraw queued before
    /// the exit finds nothing to tick.
    fn record_failure(&mut self, error: AppError) {
        log::error!("{error}");
        if self.failure.is_none() {
            self.failure = Some(error);
        }
        self.shutdown();
    }

    /// Drops the pipeline, which releases GPU resources and closes the
    /// telemetry channel.
    fn shutdown(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            let stats = pipeline.stats();
            log::info!("Shutting down after {} frames: {}", pipeline.frame(), stats);
        }
        self.telemetry = None;
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };

        self.monitor.begin_frame();
        if let Some(window) = self.window.as_ref() {
            window.pre_present_notify();
        }
        let result = pipeline.tick();
        self.monitor.end_frame();

        let backend = pipeline.backend();
        let dropped = backend.telemetry().dropped();
        self.monitor.log_if_due(pipeline.stats(), backend.ring_stats(), dropped);

        if let Err(error) = result {
            self.fail(event_loop, error.into());
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(error) = self.init(event_loop) {
            self.fail(event_loop, error);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    winit::event::KeyEvent {
                        physical_key: winit::keyboard::PhysicalKey::Code(key_code),
                        ..
                    },
                ..
            } => {
                if matches!(key_code, winit::keyboard::KeyCode::Escape) {
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(pipeline) = self.pipeline.as_mut() {
                    pipeline.backend_mut().resize(width, height);
                }
            }
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;

    fn app_state() -> AppState {
        let (telemetry, _receiver) = telemetry_channel(2);
        AppState {
            config: Config::default(),
            window: None,
            pipeline: None,
            telemetry: Some(telemetry),
            monitor: PerformanceMonitor::new(),
            failure: None,
        }
    }

    #[test]
    fn test_failure_shuts_down_and_keeps_first_error() {
        let mut state = app_state();
        state.record_failure(FrameError::Fatal("device lost".to_string()).into());
        state.record_failure(FrameError::Fatal("queue lost".to_string()).into());

        assert!(state.pipeline.is_none());
        assert!(state.telemetry.is_none());
        match state.failure {
            Some(AppError::Frame(FrameError::Fatal(message))) => assert_eq!(message, "device lost"),
            other => panic!("unexpected failure: {other:?}"),
        }
    }
}
