//! Render server for the Mandelbrot explorer.
//!
//! Renders are long-running CPU work, so the server runs them on its own thread pool and hands
//! results back through a future (full renders) or a frame stream (progressive renders).
//!
//! Only the most recent request matters to an interactive caller. Submitting a request cancels
//! whichever request was submitted before it; the cancelled render resolves to
//! [`Error::Cancelled`] as soon as its worker notices.

use std::{
    fmt::Display,
    future::Future,
    sync::{mpsc, Mutex},
};

use image::RgbImage;
use mbx_core::{CancelToken, RenderRequest, RenderedImage, SuccessiveRefiner};

mod oneshot;

/// Receives fractional progress in `[0, 1]` from a full render.
pub type ProgressSink = Box<dyn FnMut(f64) + Send>;

/// Errors that can occur during execution.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    InvalidArgument(String),
    /// Superseded by a later request, or explicitly cancelled.
    Cancelled,
    Internal(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::Cancelled => write!(f, "render cancelled"),
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<mbx_core::Error> for Error {
    fn from(err: mbx_core::Error) -> Self {
        match err {
            mbx_core::Error::InvalidArgument(msg) => Error::InvalidArgument(msg),
            mbx_core::Error::Cancelled => Error::Cancelled,
            mbx_core::Error::Internal(msg) => Error::Internal(msg),
        }
    }
}

pub type Completion = Result<RenderedImage, Error>;

/// One update from a progressive render.
#[derive(Clone, Debug)]
pub enum Frame {
    /// A refinement pass completed; `pixels` is a snapshot of the image at that block size.
    Step { chunk_size: usize, pixels: RgbImage },
    /// Every pass completed.
    Finished(RenderedImage),
}

/// The frames of a progressive render, in the order they were produced.
///
/// The iterator ends after [`Frame::Finished`] or after the first error.
pub struct Refinement {
    frames: mpsc::Receiver<Result<Frame, Error>>,
    cancel: CancelToken,
}

impl Refinement {
    /// Stops the refinement after its current pass.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Iterator for Refinement {
    type Item = Result<Frame, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.frames.recv().ok()
    }
}

impl Drop for Refinement {
    fn drop(&mut self) {
        // Nobody is listening for further frames.
        self.cancel.cancel();
    }
}

enum Job {
    Render {
        request: RenderRequest,
        progress: Option<ProgressSink>,
        cancel: CancelToken,
        result: oneshot::Sender<Completion>,
    },
    Refine {
        refiner: SuccessiveRefiner,
        cancel: CancelToken,
        frames: mpsc::Sender<Result<Frame, Error>>,
    },
}

pub struct RenderServer {
    queue: mpsc::Sender<Job>,
    current: Mutex<CancelToken>,
}

impl RenderServer {
    pub fn new() -> Result<Self, Error> {
        Self::with_threads(rayon::current_num_threads())
    }

    pub fn with_threads(threads: usize) -> Result<Self, Error> {
        if threads < 1 {
            return Err(Error::InvalidArgument(
                "must provide >=1 thread".to_string(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|err| Error::Internal(format!("error creating thread pool: {}", err)))?;

        let (queue, recv) = mpsc::channel();
        // The dispatch thread is free-running. It shuts down when the input queue closes.
        std::thread::spawn(move || dispatch(pool, recv));

        Ok(RenderServer {
            queue,
            current: Mutex::new(CancelToken::new()),
        })
    }

    /// Renders the full image on the pool.
    ///
    /// Invalid requests resolve to [`Error::InvalidArgument`] without touching the pool (or
    /// cancelling anything). With a progress sink the render completes columns in order, each
    /// column split across the pool; without one, rows are split across the pool.
    pub fn render(
        &self,
        request: RenderRequest,
        progress: Option<ProgressSink>,
    ) -> impl Future<Output = Completion> {
        let (result, recv) = oneshot::channel();
        match request.validate() {
            Err(err) => result.send(Err(err.into())),
            Ok(_) => {
                let cancel = self.supersede();
                self.submit(Job::Render {
                    request,
                    progress,
                    cancel,
                    result,
                });
            }
        }
        async move {
            match recv.await {
                Ok(v) => v,
                Err(e) => Err(Error::Internal(e.to_string())),
            }
        }
    }

    /// Starts a progressive render. Frames arrive coarse to fine.
    pub fn refine(&self, request: RenderRequest) -> Refinement {
        let (frames, recv) = mpsc::channel();
        let refinement = |cancel| Refinement {
            frames: recv,
            cancel,
        };
        let refiner = match SuccessiveRefiner::new(request) {
            Ok(refiner) => refiner,
            Err(err) => {
                // The receiver is still held, so this cannot fail.
                let _ = frames.send(Err(err.into()));
                return refinement(CancelToken::new());
            }
        };
        let cancel = self.supersede();
        self.submit(Job::Refine {
            refiner,
            cancel: cancel.clone(),
            frames,
        });
        refinement(cancel)
    }

    /// Cancels the in-flight request, if any, and installs a token for the next one.
    fn supersede(&self) -> CancelToken {
        let next = CancelToken::new();
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = std::mem::replace(&mut *current, next.clone());
        if !previous.is_cancelled() {
            previous.cancel();
        }
        next
    }

    fn submit(&self, job: Job) {
        if let Err(mpsc::SendError(job)) = self.queue.send(job) {
            let err = Error::Internal("rendering server has terminated".to_string());
            match job {
                Job::Render { result, .. } => result.send(Err(err)),
                Job::Refine { frames, .. } => {
                    let _ = frames.send(Err(err));
                }
            }
        }
    }
}

fn dispatch(pool: rayon::ThreadPool, receiver: mpsc::Receiver<Job>) {
    let span = tracing::info_span!("dispatch thread");
    let _guard = span.enter();

    for job in receiver.iter() {
        // spawn_fifo so that requests start in the order submitted; a superseded request
        // then drops out quickly rather than starving the newer one.
        match job {
            Job::Render {
                request,
                progress,
                cancel,
                result,
            } => {
                tracing::info!(
                    width = request.size.width,
                    height = request.size.height,
                    iterations = request.max_iterations,
                    "dispatching render"
                );
                // Columns or rows of the render are spread through this pool.
                pool.spawn_fifo(move || render(request, progress, cancel, result));
            }
            Job::Refine {
                refiner,
                cancel,
                frames,
            } => {
                tracing::info!(chunk = refiner.chunk_size(), "dispatching refinement");
                pool.spawn_fifo(move || refine(refiner, cancel, frames));
            }
        }
    }
}

fn render(
    request: RenderRequest,
    mut progress: Option<ProgressSink>,
    cancel: CancelToken,
    result: oneshot::Sender<Completion>,
) {
    if result.is_closed() {
        // The caller dropped the future; nothing to compute for.
        cancel.cancel();
    }
    let outcome = match progress.as_mut() {
        Some(sink) => {
            let sink: &mut dyn FnMut(f64) = sink;
            RenderedImage::render(&request, Some(sink), &cancel)
        }
        None => RenderedImage::render_parallel(&request, &cancel),
    };
    let outcome = outcome.map_err(|err| {
        match &err {
            mbx_core::Error::Cancelled => tracing::warn!("render superseded"),
            err => tracing::error!("render failed: for parameters {:?}: {}", &request, err),
        }
        Error::from(err)
    });
    result.send(outcome);
}

fn refine(
    mut refiner: SuccessiveRefiner,
    cancel: CancelToken,
    frames: mpsc::Sender<Result<Frame, Error>>,
) {
    let span = tracing::info_span!("refine", chunk = refiner.chunk_size());
    let _guard = span.enter();

    loop {
        let step = match refiner.refine_cancellable(&cancel) {
            Ok(Some(step)) => step,
            Ok(None) => break,
            Err(err) => {
                if err == mbx_core::Error::Cancelled {
                    tracing::warn!("refinement superseded");
                } else {
                    tracing::error!("refinement failed: {}", err);
                }
                let _ = frames.send(Err(err.into()));
                return;
            }
        };
        let frame = Frame::Step {
            chunk_size: step.chunk_size,
            pixels: refiner.pixels().clone(),
        };
        if frames.send(Ok(frame)).is_err() {
            tracing::debug!("refinement receiver dropped");
            return;
        }
    }

    let finished = refiner.into_image().map(Frame::Finished).map_err(|err| {
        tracing::error!("refinement failed: {}", err);
        Error::from(err)
    });
    let _ = frames.send(finished);
}
