mod command_input;
mod input;
mod key_result;
mod record_form;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use key_result::KeyResult;
pub use record_form::{FieldKind, FieldSpec, FormEvent, FormSpec, RecordForm};
pub use search_input::{SearchEvent, SearchInput};
