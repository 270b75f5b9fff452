//! Love notes exchanged between the two members of a couple.

mod model;

pub use model::{NewNote, Note, NoteType, MAX_TEXT_LEN};
