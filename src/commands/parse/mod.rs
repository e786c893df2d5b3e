mod cells;
mod run;
mod walker;

pub use run::run;
pub use walker::{DEFAULT_IGNORED_HEADING, MarkdownTableParser, ParseOptions};

use cells::*;
