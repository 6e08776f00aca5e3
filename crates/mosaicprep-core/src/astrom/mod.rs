pub mod propagate;
pub mod xmatch;
pub mod offset;

pub use offset::{solve_offset, AstrometricOffset};
pub use propagate::{propagate_catalog, PropagatedStar};
pub use xmatch::{match_frame, DetectedSource, MatchedResidual};
