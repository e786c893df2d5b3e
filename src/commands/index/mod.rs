mod run;
mod store;
#[cfg(test)]
mod tests;

pub use run::run;
pub use store::{
    DB_FILE_NAME, count_embeddings_by_model, count_records, load_index, load_record,
    open_read_only_connection, semantic_index_status,
};

use store::*;
