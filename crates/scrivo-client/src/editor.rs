//! The document editor: LOCAL view events in, REMOTE messages in, one
//! replicated document underneath.

use tokio::sync::mpsc;
use tracing::trace;

use scrivo_crdt::{Document, FracPos, Symbol};
use scrivo_protocol::Message;
use scrivo_types::{
    Alignment, AuthorId, BlockFormat, CharFormat, ListFormat, TextBlockId, TextListId,
};

use crate::view::EditorView;

/// Per-client bridge between the view and the replicated document.
///
/// LOCAL operations (named by what the user did) mutate the document and emit
/// a message on the outbox. REMOTE operations (named `remote_*`) mutate the
/// document and reflect the change into the view. Both classes run on the
/// single thread that owns this editor.
pub struct DocumentEditor<V> {
    document: Document,
    view: V,
    author: AuthorId,
    outbox: mpsc::UnboundedSender<Message>,
}

impl<V: EditorView> DocumentEditor<V> {
    pub fn new(
        document: Document,
        view: V,
        author: AuthorId,
        outbox: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self {
            document,
            view,
            author,
            outbox,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    fn send(&self, message: Message) {
        // A closed outbox means the connection is going away; edits already
        // applied locally will be reconciled on the next open.
        if self.outbox.send(message).is_err() {
            trace!("outbox closed, dropping outbound edit");
        }
    }

    /// Replay the full document into a fresh view: characters, then lists,
    /// then block formats.
    pub fn open_document(&mut self) {
        for i in 0..self.document.len().saturating_sub(1) {
            if let Some(symbol) = self.document.get(i) {
                self.view.insert_char(i, symbol.ch, &symbol.format);
            }
        }

        let list_ids: Vec<TextListId> = self.document.lists().map(|l| l.id).collect();
        for list_id in list_ids {
            let blocks = self.document.ordered_list_blocks(&list_id);
            let Some(format) = self.document.get_list(&list_id).map(|l| l.format.clone()) else {
                continue;
            };
            let Some((first, rest)) = blocks.split_first() else {
                continue;
            };
            let Some(first_start) = self.document.block_start(first) else {
                continue;
            };
            self.view.create_list(first_start, &format);
            for block in rest {
                if let Some(start) = self.document.block_start(block) {
                    self.view.add_block_to_list(start, first_start);
                }
            }
        }

        let block_ids: Vec<TextBlockId> = self.document.blocks().map(|b| b.id).collect();
        for block_id in block_ids {
            if let (Some(start), Some(block)) = (
                self.document.block_start(&block_id),
                self.document.get_block(&block_id),
            ) {
                self.view.apply_block_format(start, &block.format.clone());
            }
        }

        let name = self.document.name().to_string();
        let uri = self.document.uri().clone();
        self.view.document_opened(&name, &uri);
    }

    // ── Char operations ─────────────────────────────────────────────────────

    /// REMOTE: insert a symbol. The view is only touched when the symbol
    /// actually landed and is not the trailing terminator (the view keeps its
    /// own).
    pub fn remote_insert(&mut self, symbol: Symbol, is_last: bool) {
        let ch = symbol.ch;
        let format = symbol.format.clone();
        if let Some(index) = self.document.insert(symbol) {
            if !is_last {
                self.view.insert_char(index, ch, &format);
                self.view.refresh_selections();
            }
        }
    }

    /// REMOTE: remove by position; no-op when already gone.
    pub fn remote_remove(&mut self, pos: FracPos) {
        if let Some(index) = self.document.remove(&pos) {
            self.view.remove_char(index);
            self.view.refresh_selections();
        }
    }

    /// LOCAL: the user typed `ch` at `index`.
    pub fn insert_char_at(&mut self, ch: char, format: CharFormat, index: usize, is_last: bool) {
        let pos = self.document.new_fractional_pos(index, self.author);
        let symbol = if ch == '\n' {
            let block = self.document.next_block_id(self.author);
            Symbol::newline(format, pos, block)
        } else {
            Symbol::new(ch, format, pos)
        };
        self.document.insert(symbol.clone());
        self.send(Message::CharInsert { symbol, is_last });
    }

    /// LOCAL: the user deleted the character at `index`. Out-of-range is
    /// skipped (the view may race its own trailing terminator).
    pub fn delete_char_at(&mut self, index: usize) {
        if index >= self.document.len() {
            return;
        }
        if let Some(pos) = self.document.remove_at_index(index) {
            self.send(Message::CharDelete { pos });
        }
    }

    // ── Char formats ────────────────────────────────────────────────────────

    /// LOCAL: restyle the character at `index`.
    pub fn change_char_format(&mut self, index: usize, format: CharFormat) {
        let Some(pos) = self.document.get(index).map(|s| s.pos.clone()) else {
            return;
        };
        self.document.format_symbol(&pos, format.clone());
        self.send(Message::CharFormat { pos, format });
    }

    /// REMOTE: apply a char format. Idempotent: if the local state already
    /// matches (this client originated the change), nothing happens — which
    /// makes the server's format echo harmless.
    pub fn remote_char_format(&mut self, pos: FracPos, format: CharFormat) {
        if let Some((_, symbol)) = self.document.find(&pos) {
            if symbol.format == format {
                return;
            }
        }
        if let Some(index) = self.document.format_symbol(&pos, format.clone()) {
            self.view.apply_char_format(index, &format);
        }
    }

    // ── Block operations ────────────────────────────────────────────────────

    /// LOCAL: set the alignment of every block in the selection.
    pub fn change_block_alignment(&mut self, start: usize, end: usize, alignment: Alignment) {
        for block_id in self.document.blocks_between(start, end) {
            let Some(mut format) = self.document.get_block(&block_id).map(|b| b.format.clone())
            else {
                continue;
            };
            format.set_alignment(alignment);
            self.document.format_block(&block_id, format.clone());
            self.send(Message::BlockEdit {
                block: block_id,
                format,
            });
        }
    }

    /// LOCAL: set the line height of every block in the selection.
    pub fn change_block_line_height(&mut self, start: usize, end: usize, height: f64, mode: u32) {
        for block_id in self.document.blocks_between(start, end) {
            let Some(mut format) = self.document.get_block(&block_id).map(|b| b.format.clone())
            else {
                continue;
            };
            format.set_line_height(height, mode);
            self.document.format_block(&block_id, format.clone());
            self.send(Message::BlockEdit {
                block: block_id,
                format,
            });
        }
    }

    /// LOCAL: overwrite the format of every block in the selection.
    pub fn change_block_format(&mut self, start: usize, end: usize, format: BlockFormat) {
        for block_id in self.document.blocks_between(start, end) {
            self.document.format_block(&block_id, format.clone());
            self.send(Message::BlockEdit {
                block: block_id,
                format: format.clone(),
            });
        }
    }

    /// REMOTE: apply a block format, with the same idempotent early-out as
    /// char formats.
    pub fn remote_block_format(&mut self, block: TextBlockId, format: BlockFormat) {
        if let Some(existing) = self.document.get_block(&block) {
            if existing.format == format {
                return;
            }
        }
        if self.document.format_block(&block, format.clone()).is_some() {
            if let Some(start) = self.document.block_start(&block) {
                self.view.apply_block_format(start, &format);
            }
        }
    }

    // ── List operations ─────────────────────────────────────────────────────

    /// REMOTE: adjust a block's list membership.
    pub fn remote_list_edit(
        &mut self,
        block: TextBlockId,
        list: Option<TextListId>,
        format: ListFormat,
    ) {
        // The block may be gone locally already.
        let Some(current) = self.document.get_block(&block).map(|b| b.list) else {
            return;
        };

        if current == list {
            if list.is_none() {
                // Still told to the view: after a block split the widget may
                // have reintroduced an implicit list this client never knew
                // about.
                if let Some(start) = self.document.block_start(&block) {
                    self.view.remove_block_from_list(start);
                }
            }
            return;
        }

        let Some(block_start) = self.document.block_start(&block) else {
            return;
        };
        match list {
            None => self.view.remove_block_from_list(block_start),
            Some(list_id) => match self.document.list_start(&list_id) {
                Some(list_start) => self.view.add_block_to_list(block_start, list_start),
                None => self.view.create_list(block_start, &format),
            },
        }

        self.document.edit_block_list(block, list, format);
    }

    /// LOCAL: start a new list containing the block at `index`.
    pub fn create_list_at(&mut self, index: usize, format: ListFormat) {
        let Some(block) = self.document.block_at_index(index) else {
            return;
        };
        let list_id = self.document.next_list_id(self.author);
        self.document.edit_block_list(block, Some(list_id), format.clone());
        self.send(Message::ListEdit {
            block,
            list: Some(list_id),
            format,
        });
    }

    /// LOCAL: the widget assigned a freshly split block to an existing list.
    pub fn assign_block_to_list(&mut self, block_position: usize, list_position: usize) {
        let Some(block) = self.document.block_at_index(block_position) else {
            return;
        };
        let Some(list_id) = self.document.list_at_index(list_position) else {
            return;
        };
        let Some(format) = self.document.get_list(&list_id).map(|l| l.format.clone()) else {
            return;
        };
        self.document.add_block_to_list(block, list_id);
        self.send(Message::ListEdit {
            block,
            list: Some(list_id),
            format,
        });
    }

    /// LOCAL: detach the block at `block_position` from its list.
    pub fn remove_block_from_list(&mut self, block_position: usize) {
        let Some(block) = self.document.block_at_index(block_position) else {
            return;
        };
        if self.document.get_block(&block).and_then(|b| b.list).is_some() {
            self.document.remove_block_from_list(block);
        }
        self.send(Message::ListEdit {
            block,
            list: None,
            format: ListFormat::new(),
        });
    }

    /// LOCAL: the list button. Applies `format` to the selected blocks, or
    /// detaches them when `format` is the undefined style.
    ///
    /// Lists that continue past the selection are split: their trailing
    /// blocks move to a fresh list inheriting the old format, so they stay
    /// contiguous whatever happens to the middle.
    ///
    /// The whole operation mutates the local document synchronously and emits
    /// its messages back-to-back; a remote edit can still interleave between
    /// them at the workspace, which serializes whatever arrives. That window
    /// is accepted.
    pub fn toggle_list(&mut self, start: usize, end: usize, format: ListFormat) {
        let selected = self.document.blocks_between(start, end);
        let removing = format.is_undefined();

        // Lists with at least one block inside the selection.
        let mut involved: Vec<TextListId> = Vec::new();
        for block_id in &selected {
            if let Some(list_id) = self.document.get_block(block_id).and_then(|b| b.list) {
                if !involved.contains(&list_id) {
                    involved.push(list_id);
                }
            }
        }

        for list_id in involved {
            let Some(old_format) = self.document.get_list(&list_id).map(|l| l.format.clone())
            else {
                continue;
            };
            let list_blocks = self.document.ordered_list_blocks(&list_id);

            let mut selection_begun = false;
            let mut selection_ended = false;
            let mut split_list: Option<TextListId> = None;

            for block_id in list_blocks {
                let in_selection = selected.contains(&block_id);

                if !selection_begun {
                    // Blocks before the selection stay in their list.
                    if in_selection {
                        selection_begun = true;
                        if removing {
                            self.detach_and_notify(block_id, &format);
                        }
                    }
                } else if !selection_ended {
                    if !in_selection {
                        selection_ended = true;
                        // The list resumes past the selection: everything
                        // from here on moves to a fresh list keeping the old
                        // format.
                        let new_id = self.document.next_list_id(self.author);
                        self.document
                            .edit_block_list(block_id, Some(new_id), old_format.clone());
                        if let Some(start) = self.document.block_start(&block_id) {
                            self.view.create_list(start, &old_format);
                        }
                        self.send(Message::ListEdit {
                            block: block_id,
                            list: Some(new_id),
                            format: old_format.clone(),
                        });
                        split_list = Some(new_id);
                    } else if removing {
                        self.detach_and_notify(block_id, &format);
                    }
                } else {
                    let Some(new_id) = split_list else {
                        continue;
                    };
                    self.document
                        .edit_block_list(block_id, Some(new_id), old_format.clone());
                    if let (Some(start), Some(list_start)) = (
                        self.document.block_start(&block_id),
                        self.document.list_start(&new_id),
                    ) {
                        self.view.add_block_to_list(start, list_start);
                    }
                    self.send(Message::ListEdit {
                        block: block_id,
                        list: Some(new_id),
                        format: old_format.clone(),
                    });
                }
            }
        }

        // A real list style gathers every selected block into one new list,
        // in selection order.
        if !removing {
            let new_id = self.document.next_list_id(self.author);
            let mut first = true;
            for block_id in selected {
                let Some(start) = self.document.block_start(&block_id) else {
                    continue;
                };
                if first {
                    self.view.create_list(start, &format);
                } else if let Some(list_start) = self.document.list_start(&new_id) {
                    self.view.add_block_to_list(start, list_start);
                }
                self.document.edit_block_list(block_id, Some(new_id), format.clone());
                first = false;
                self.send(Message::ListEdit {
                    block: block_id,
                    list: Some(new_id),
                    format: format.clone(),
                });
            }
        }
    }

    fn detach_and_notify(&mut self, block_id: TextBlockId, format: &ListFormat) {
        self.document.remove_block_from_list(block_id);
        if let Some(start) = self.document.block_start(&block_id) {
            self.view.remove_block_from_list(start);
        }
        self.send(Message::ListEdit {
            block: block_id,
            list: None,
            format: format.clone(),
        });
    }

    // ── Author highlights ───────────────────────────────────────────────────

    /// Recompute per-author colored ranges: one range per maximal run of
    /// symbols by the same author, trailing terminator excluded.
    pub fn generate_extra_selections(&mut self) {
        let len = self.document.len();
        if len <= 1 {
            return;
        }

        let mut run_author = match self.document.get(0) {
            Some(s) => s.author(),
            None => return,
        };
        let mut run_start = 0;
        for i in 1..len - 1 {
            let author = match self.document.get(i) {
                Some(s) => s.author(),
                None => break,
            };
            if author != run_author {
                self.view.set_extra_selection(run_author, (run_start, i));
                run_author = author;
                run_start = i;
            }
        }
        self.view.set_extra_selection(run_author, (run_start, len - 1));
    }
}

// ============================================================================
// Tests
// ============================================================================
