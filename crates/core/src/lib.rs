#![forbid(unsafe_code)]

pub mod grading;
pub mod lang;
pub mod model;
pub mod time;

pub use grading::{GradeLabel, GradeResult, TokenDiff, diff_tokens, grade, normalize, similarity};
pub use lang::Lang;
pub use time::Clock;
