pub(crate) mod extract; // Table/schema references from pasted SQL
pub(crate) mod logic; // Submit-and-watch orchestration
pub(crate) mod request; // Restore request model and validation

pub use extract::{schemas_from_text, tables_from_text};
pub use logic::{run_restore_flow, watch_job};
pub use request::{DatabaseMode, RestoreForm, RestoreKind, RestoreRequest, convert_slashes};
