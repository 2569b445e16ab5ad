pub mod batch;
pub mod cli;
pub mod error;
pub mod geometry;
pub mod mask;
pub mod session;
pub mod template;

pub use batch::{BatchOptions, BatchProcessor, BatchResult, CancelToken, FileOutcome};
pub use cli::Cli;
pub use error::CutError;
pub use geometry::{fit_line, side_of, FittedLine, ImageBounds, Line, Point, Side};
pub use mask::{cut, CutSpec, KeepMask};
pub use session::{Session, SessionError, SessionEvent, SessionState};
pub use template::ReferenceTemplate;
