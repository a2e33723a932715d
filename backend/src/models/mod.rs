mod comparison;
mod feed;
mod topic;
mod view;

pub use comparison::*;
pub use feed::*;
pub use topic::*;
pub use view::*;
