//! Record ID definitions.

use crate::define_id;

define_id!(NoteId, "note");
define_id!(TaskId, "task");
