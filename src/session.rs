//! Setup state machine for a cut.
//!
//! A cut is defined in three steps: pick a reference template, draw a line
//! on it, pick the side to keep. [`Session`] tracks which step has been
//! reached and only hands out a [`CutSpec`] once all three are done.
//!
//! ```text
//! Idle --TemplateSelected--> AwaitingLine --LineDrawn--> AwaitingSide --SidePicked--> Ready
//! ```
//!
//! Selecting a new template from any state restarts at `AwaitingLine`,
//! drawing a new line from `AwaitingSide` or `Ready` returns to
//! `AwaitingSide`, picking a side again in `Ready` replaces the side, and
//! `Reset` always returns to `Idle`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::batch::{collect_images, BatchOptions, BatchProcessor, BatchResult, CancelToken};
use crate::error::CutError;
use crate::geometry::{fit_line, FittedLine, Point, Side};
use crate::mask::CutSpec;
use crate::template::ReferenceTemplate;

/// Problems that block a step before any file is touched
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no template selected")]
    NoTemplate,

    #[error("no cut line drawn")]
    NoLine,

    #[error("no side selected")]
    NoSide,

    #[error("{0:?} is not a directory")]
    RootNotFound(PathBuf),

    #[error("no images found under {0:?}")]
    NoFiles(PathBuf),

    #[error(transparent)]
    Cut(#[from] CutError),
}

/// Input driving the session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    TemplateSelected(ReferenceTemplate),
    /// Two raw points in template coordinates
    LineDrawn { start: Point, end: Point },
    /// A point on the side to keep
    SidePicked(Point),
    /// The side to keep, given directly
    SideChosen(Side),
    Reset,
}

#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingLine {
        template: ReferenceTemplate,
    },
    AwaitingSide {
        template: ReferenceTemplate,
        line: FittedLine,
    },
    Ready {
        template: ReferenceTemplate,
        line: FittedLine,
        spec: CutSpec,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingLine { .. } => "awaiting line",
            SessionState::AwaitingSide { .. } => "awaiting side",
            SessionState::Ready { .. } => "ready",
        }
    }

    pub fn template(&self) -> Option<&ReferenceTemplate> {
        match self {
            SessionState::Idle => None,
            SessionState::AwaitingLine { template }
            | SessionState::AwaitingSide { template, .. }
            | SessionState::Ready { template, .. } => Some(template),
        }
    }

    pub fn line(&self) -> Option<FittedLine> {
        match self {
            SessionState::AwaitingSide { line, .. } | SessionState::Ready { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub fn cut_spec(&self) -> Option<&CutSpec> {
        match self {
            SessionState::Ready { spec, .. } => Some(spec),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready { .. })
    }
}

/// Holds the template and cut while they are being set up
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply one event. A rejected event leaves the state as it was.
    pub fn handle(&mut self, event: SessionEvent) -> Result<&SessionState, SessionError> {
        let current = std::mem::take(&mut self.state);
        match transition(current, event) {
            Ok(next) => {
                info!(state = next.name(), "Session advanced");
                self.state = next;
                Ok(&self.state)
            }
            Err((previous, err)) => {
                self.state = previous;
                Err(err)
            }
        }
    }

    /// Decode `path` and make it the template. Nothing changes if it cannot be read.
    pub fn select_template(&mut self, path: impl AsRef<Path>) -> Result<&SessionState, SessionError> {
        let template = ReferenceTemplate::open(path)?;
        self.handle(SessionEvent::TemplateSelected(template))
    }

    pub fn draw_line(&mut self, start: Point, end: Point) -> Result<&SessionState, SessionError> {
        self.handle(SessionEvent::LineDrawn { start, end })
    }

    pub fn pick_side(&mut self, point: Point) -> Result<&SessionState, SessionError> {
        self.handle(SessionEvent::SidePicked(point))
    }

    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        info!("Session reset");
    }

    /// The frozen template and cut, or the first missing step
    pub fn ready(&self) -> Result<(&ReferenceTemplate, &CutSpec), SessionError> {
        match &self.state {
            SessionState::Idle => Err(SessionError::NoTemplate),
            SessionState::AwaitingLine { .. } => Err(SessionError::NoLine),
            SessionState::AwaitingSide { .. } => Err(SessionError::NoSide),
            SessionState::Ready { template, spec, .. } => Ok((template, spec)),
        }
    }

    /// Cut every supported image under `root` in place
    pub fn run_batch(
        &self,
        root: &Path,
        options: BatchOptions,
        cancel: CancelToken,
    ) -> Result<BatchResult, SessionError> {
        let (template, spec) = self.ready()?;

        if !root.is_dir() {
            return Err(SessionError::RootNotFound(root.to_path_buf()));
        }

        let files = collect_images(root);
        if files.is_empty() {
            return Err(SessionError::NoFiles(root.to_path_buf()));
        }

        let processor = BatchProcessor::new(template, spec, options)?.with_cancel(cancel);
        Ok(processor.run_files(&files))
    }
}

fn transition(
    state: SessionState,
    event: SessionEvent,
) -> Result<SessionState, (SessionState, SessionError)> {
    use SessionEvent as E;
    use SessionState as S;

    match (state, event) {
        (_, E::Reset) => Ok(S::Idle),
        (_, E::TemplateSelected(template)) => Ok(S::AwaitingLine { template }),

        (S::Idle, E::LineDrawn { .. } | E::SidePicked(_) | E::SideChosen(_)) => {
            Err((S::Idle, SessionError::NoTemplate))
        }

        (
            S::AwaitingLine { template }
            | S::AwaitingSide { template, .. }
            | S::Ready { template, .. },
            E::LineDrawn { start, end },
        ) => {
            let line = fit_line(start, end, template.bounds());
            info!(?line, "Cut line fitted");
            Ok(S::AwaitingSide { template, line })
        }

        (state @ S::AwaitingLine { .. }, E::SidePicked(_) | E::SideChosen(_)) => {
            Err((state, SessionError::NoLine))
        }

        (
            S::AwaitingSide { template, line } | S::Ready { template, line, .. },
            E::SidePicked(point),
        ) => {
            let side = line.line().equation().side_of(point);
            Ok(ready(template, line, side))
        }

        (
            S::AwaitingSide { template, line } | S::Ready { template, line, .. },
            E::SideChosen(side),
        ) => Ok(ready(template, line, side)),
    }
}

fn ready(template: ReferenceTemplate, line: FittedLine, side: Side) -> SessionState {
    info!(%side, "Keep side selected");
    let spec = CutSpec::new(line.line(), side, template.bounds());
    SessionState::Ready {
        template,
        line,
        spec,
    }
}
