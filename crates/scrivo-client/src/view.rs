//! The platform text widget boundary.

use scrivo_types::{AuthorId, BlockFormat, CharFormat, DocumentUri, ListFormat, Profile};

/// What the editor needs from the rendering widget.
///
/// Indices are symbol-sequence indices; block and list arguments are the
/// positions of their first characters, which is how platform rich-text
/// widgets address them.
///
/// The view owns exactly one trailing paragraph terminator of its own, which
/// is why the editor never forwards a symbol flagged `is_last`.
pub trait EditorView {
    fn insert_char(&mut self, index: usize, ch: char, format: &CharFormat);
    fn remove_char(&mut self, index: usize);
    fn apply_char_format(&mut self, index: usize, format: &CharFormat);
    fn apply_block_format(&mut self, block_position: usize, format: &BlockFormat);

    fn create_list(&mut self, block_position: usize, format: &ListFormat);
    fn add_block_to_list(&mut self, block_position: usize, list_position: usize);
    fn remove_block_from_list(&mut self, block_position: usize);

    /// Highlight `range` (end exclusive) in the color of `author`.
    fn set_extra_selection(&mut self, author: AuthorId, range: (usize, usize));
    /// Re-derive author highlights after the sequence shifted.
    fn refresh_selections(&mut self);

    fn document_opened(&mut self, name: &str, uri: &DocumentUri);
}

/// Presence surface of the widget: the participant roster and remote carets.
pub trait PresenceView {
    fn add_presence(&mut self, profile: &Profile);
    fn update_presence(&mut self, profile: &Profile);
    fn remove_presence(&mut self, author: AuthorId);
    fn cursor_moved(&mut self, author: AuthorId, index: usize);
}
