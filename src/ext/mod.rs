mod path_ext;

pub use path_ext::{BestEffortPathExt, best_effort_path_display, component_depth};
