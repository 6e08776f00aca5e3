pub mod repeats;
pub mod builder;
pub mod subtract;

pub use builder::{build_backgrounds, prepare_frame, BackgroundModel, PreparedFrame};
pub use repeats::{select_build_frames, RepeatAssignment, RepeatPlan};
pub use subtract::{subtract_frame, SubtractedFrame};
