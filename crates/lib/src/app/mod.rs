//! Application descriptions: the JSON input the command line tool
//! synthesizes.

mod load;
mod types;

pub use load::{AppError, build_tree, load_app};
pub use types::*;
