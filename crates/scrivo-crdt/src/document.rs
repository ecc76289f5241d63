//! The document: symbol sequence plus block and list tables.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use scrivo_types::{AuthorId, BlockFormat, CharFormat, DocumentUri, ListFormat, TextBlockId, TextListId};

use crate::error::DocumentError;
use crate::pos::{BASE, FracPos};
use crate::symbol::Symbol;
use crate::Result;

/// A paragraph container, owned by the newline symbol that terminates it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub id: TextBlockId,
    pub format: BlockFormat,
    pub list: Option<TextListId>,
}

impl TextBlock {
    pub fn new(id: TextBlockId, format: BlockFormat) -> Self {
        Self {
            id,
            format,
            list: None,
        }
    }
}

/// An ordered group of blocks sharing one list format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextList {
    pub id: TextListId,
    pub format: ListFormat,
    members: Vec<TextBlockId>,
}

impl TextList {
    pub fn new(id: TextListId, format: ListFormat) -> Self {
        Self {
            id,
            format,
            members: Vec::new(),
        }
    }

    /// Member blocks in attachment order; use
    /// [`Document::ordered_list_blocks`] for document order.
    pub fn members(&self) -> &[TextBlockId] {
        &self.members
    }

    pub fn contains(&self, block: &TextBlockId) -> bool {
        self.members.contains(block)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The replicated document state.
///
/// Symbols are kept strictly sorted by fractional position. The sequence is
/// never empty: a sentinel newline minted by the system author at `[BASE]`
/// terminates the trailing block and outlives every edit.
///
/// Deleted positions are remembered in a tombstone set so that insert and
/// delete commute even when a delete overtakes the insert it refers to.
#[derive(Clone, Debug)]
pub struct Document {
    name: String,
    uri: DocumentUri,
    symbols: Vec<Symbol>,
    blocks: HashMap<TextBlockId, TextBlock>,
    lists: HashMap<TextListId, TextList>,
    tombstones: BTreeSet<FracPos>,
    block_counter: u32,
    list_counter: u32,
}

impl Document {
    pub fn new(name: impl Into<String>, uri: DocumentUri) -> Self {
        let mut doc = Self {
            name: name.into(),
            uri,
            symbols: Vec::new(),
            blocks: HashMap::new(),
            lists: HashMap::new(),
            tombstones: BTreeSet::new(),
            block_counter: 0,
            list_counter: 0,
        };

        // The terminal block and its sentinel newline are minted by the
        // system author with fixed components, so every replica agrees on
        // them without any exchange.
        let terminal = doc.next_block_id(AuthorId::SYSTEM);
        doc.blocks.insert(terminal, TextBlock::new(terminal, BlockFormat::default()));
        doc.symbols.push(Symbol::newline(
            CharFormat::new(),
            FracPos::new(vec![BASE], AuthorId::SYSTEM),
            terminal,
        ));
        doc
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> &DocumentUri {
        &self.uri
    }

    /// The owning username, embedded in the URI.
    pub fn owner(&self) -> &str {
        &self.uri.author
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Never true: the sentinel newline is permanent.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn get(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    /// Locate a symbol by exact position.
    pub fn find(&self, pos: &FracPos) -> Option<(usize, &Symbol)> {
        let idx = self.index_of(pos).ok()?;
        Some((idx, &self.symbols[idx]))
    }

    /// Full text, trailing sentinel newline included.
    pub fn text(&self) -> String {
        self.symbols.iter().map(|s| s.ch).collect()
    }

    pub fn get_block(&self, id: &TextBlockId) -> Option<&TextBlock> {
        self.blocks.get(id)
    }

    pub fn get_list(&self, id: &TextListId) -> Option<&TextList> {
        self.lists.get(id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &TextBlock> {
        self.blocks.values()
    }

    pub fn lists(&self) -> impl Iterator<Item = &TextList> {
        self.lists.values()
    }

    fn index_of(&self, pos: &FracPos) -> std::result::Result<usize, usize> {
        self.symbols.binary_search_by(|s| s.pos.cmp(pos))
    }

    // ── Id generation ───────────────────────────────────────────────────────

    /// Mint a block id for `author`. Counters only move forward, also past
    /// any remotely observed id, so ids are never reused within a document.
    pub fn next_block_id(&mut self, author: AuthorId) -> TextBlockId {
        let id = TextBlockId::new(self.block_counter, author);
        self.block_counter += 1;
        id
    }

    pub fn next_list_id(&mut self, author: AuthorId) -> TextListId {
        let id = TextListId::new(self.list_counter, author);
        self.list_counter += 1;
        id
    }

    fn observe_block_id(&mut self, id: TextBlockId) {
        self.block_counter = self.block_counter.max(id.counter + 1);
    }

    fn observe_list_id(&mut self, id: TextListId) {
        self.list_counter = self.list_counter.max(id.counter + 1);
    }

    /// Mint a position between the symbols at `index - 1` and `index`.
    pub fn new_fractional_pos(&self, index: usize, author: AuthorId) -> FracPos {
        let lower = index
            .checked_sub(1)
            .and_then(|i| self.symbols.get(i))
            .map(|s| &s.pos);
        let upper = self.symbols.get(index).map(|s| &s.pos);
        FracPos::between(lower, upper, author)
    }

    // ── Symbol mutations ────────────────────────────────────────────────────

    /// Insert a symbol at the index its position dictates.
    ///
    /// Returns the landing index, or `None` when nothing changed: the
    /// position is already present (message redelivery) or was already
    /// deleted (a delete overtook this insert).
    ///
    /// A newline symbol births its carried block, inheriting the enclosing
    /// block's format and no list membership.
    pub fn insert(&mut self, mut symbol: Symbol) -> Option<usize> {
        let idx = match self.index_of(&symbol.pos) {
            Ok(_) => return None,
            Err(idx) => idx,
        };
        if self.tombstones.contains(&symbol.pos) {
            return None;
        }

        if symbol.is_newline() {
            let Some(block_id) = symbol.block else {
                warn!(pos = ?symbol.pos, "dropping newline symbol without a block id");
                return None;
            };
            self.observe_block_id(block_id);
            if !self.blocks.contains_key(&block_id) {
                let inherited = self
                    .block_at_index(idx)
                    .and_then(|id| self.blocks.get(&id))
                    .map(|b| b.format.clone())
                    .unwrap_or_default();
                self.blocks.insert(block_id, TextBlock::new(block_id, inherited));
            }
        } else {
            // Only newlines own blocks.
            symbol.block = None;
        }

        self.symbols.insert(idx, symbol);
        Some(idx)
    }

    /// Remove the symbol with this exact position.
    ///
    /// Returns its prior index, or `None` if absent — a remote delete of a
    /// missing symbol is silently accepted and tombstoned so a late insert of
    /// the same position stays dead. The sentinel newline is never removed.
    pub fn remove(&mut self, pos: &FracPos) -> Option<usize> {
        let idx = match self.index_of(pos) {
            Ok(idx) => idx,
            Err(_) => {
                self.tombstones.insert(pos.clone());
                return None;
            }
        };
        if idx + 1 == self.symbols.len() {
            // The last symbol is the sentinel by invariant.
            return None;
        }

        let symbol = self.symbols.remove(idx);
        self.tombstones.insert(symbol.pos.clone());
        if let Some(block_id) = symbol.block {
            self.drop_block(block_id);
        }
        Some(idx)
    }

    /// Local-side delete: resolve the index to the position to broadcast.
    pub fn remove_at_index(&mut self, index: usize) -> Option<FracPos> {
        let pos = self.symbols.get(index)?.pos.clone();
        self.remove(&pos)?;
        Some(pos)
    }

    /// Overwrite a symbol's char format. Last-writer-wins under the server
    /// total order; a missing target is silently tolerated.
    pub fn format_symbol(&mut self, pos: &FracPos, format: CharFormat) -> Option<usize> {
        let idx = self.index_of(pos).ok()?;
        self.symbols[idx].format = format;
        Some(idx)
    }

    // ── Block operations ────────────────────────────────────────────────────

    /// Overwrite a block's format, returning the block's position.
    pub fn format_block(&mut self, id: &TextBlockId, format: BlockFormat) -> Option<usize> {
        let block = self.blocks.get_mut(id)?;
        block.format = format;
        self.block_position(id)
    }

    /// The block containing the symbol at `index`: the owner of the first
    /// newline at or after it.
    pub fn block_at_index(&self, index: usize) -> Option<TextBlockId> {
        self.symbols.get(index..)?.iter().find_map(|s| s.block)
    }

    /// Index of the block's terminating newline.
    pub fn block_position(&self, id: &TextBlockId) -> Option<usize> {
        self.symbols.iter().position(|s| s.block == Some(*id))
    }

    /// Index of the block's first character — how views address blocks.
    pub fn block_start(&self, id: &TextBlockId) -> Option<usize> {
        let newline = self.block_position(id)?;
        let start = self.symbols[..newline]
            .iter()
            .rposition(|s| s.is_newline())
            .map(|i| i + 1)
            .unwrap_or(0);
        Some(start)
    }

    /// All blocks whose character range intersects `[start, end]`, starting
    /// with the block containing `start`.
    pub fn blocks_between(&self, start: usize, end: usize) -> Vec<TextBlockId> {
        let len = self.symbols.len();
        if len == 0 || start >= len {
            return Vec::new();
        }
        let end = end.min(len - 1);
        let mut result = Vec::new();
        let mut i = start.min(end);
        while let Some(id) = self.block_at_index(i) {
            let Some(newline) = self.block_position(&id) else {
                break;
            };
            result.push(id);
            if newline >= end {
                break;
            }
            i = newline + 1;
        }
        result
    }

    // ── List operations ─────────────────────────────────────────────────────

    /// Index of a list's first block.
    pub fn list_position(&self, id: &TextListId) -> Option<usize> {
        let list = self.lists.get(id)?;
        list.members.iter().filter_map(|b| self.block_position(b)).min()
    }

    /// Index of the first character of a list's first block.
    pub fn list_start(&self, id: &TextListId) -> Option<usize> {
        let first = self.ordered_list_blocks(id).into_iter().next()?;
        self.block_start(&first)
    }

    /// The list of the block containing the symbol at `index`.
    pub fn list_at_index(&self, index: usize) -> Option<TextListId> {
        let block = self.block_at_index(index)?;
        self.blocks.get(&block)?.list
    }

    /// List members sorted by block position.
    pub fn ordered_list_blocks(&self, id: &TextListId) -> Vec<TextBlockId> {
        let Some(list) = self.lists.get(id) else {
            return Vec::new();
        };
        let mut positioned: Vec<(usize, TextBlockId)> = list
            .members
            .iter()
            .filter_map(|b| self.block_position(b).map(|p| (p, *b)))
            .collect();
        positioned.sort_by_key(|(p, _)| *p);
        positioned.into_iter().map(|(_, b)| b).collect()
    }

    /// Adjust a block's list membership.
    ///
    /// `None` detaches; an existing list id attaches; a new list id creates
    /// the list with `format` and attaches. A vanished block is silently
    /// tolerated.
    pub fn edit_block_list(
        &mut self,
        block_id: TextBlockId,
        list_id: Option<TextListId>,
        format: ListFormat,
    ) {
        if !self.blocks.contains_key(&block_id) {
            return;
        }
        match list_id {
            None => self.remove_block_from_list(block_id),
            Some(list_id) => {
                self.observe_list_id(list_id);
                if !self.lists.contains_key(&list_id) {
                    self.lists.insert(list_id, TextList::new(list_id, format));
                }
                self.add_block_to_list(block_id, list_id);
            }
        }
    }

    /// Attach a block to an existing list, detaching it from any other first.
    pub fn add_block_to_list(&mut self, block_id: TextBlockId, list_id: TextListId) {
        let Some(prev) = self.blocks.get(&block_id).map(|b| b.list) else {
            return;
        };
        if prev == Some(list_id) || !self.lists.contains_key(&list_id) {
            return;
        }
        if let Some(prev) = prev {
            self.detach_member(block_id, prev);
        }
        if let Some(block) = self.blocks.get_mut(&block_id) {
            block.list = Some(list_id);
        }
        if let Some(list) = self.lists.get_mut(&list_id) {
            if !list.members.contains(&block_id) {
                list.members.push(block_id);
            }
        }
    }

    /// Detach a block from its list, if any.
    pub fn remove_block_from_list(&mut self, block_id: TextBlockId) {
        let Some(Some(list_id)) = self.blocks.get(&block_id).map(|b| b.list) else {
            return;
        };
        if let Some(block) = self.blocks.get_mut(&block_id) {
            block.list = None;
        }
        self.detach_member(block_id, list_id);
    }

    fn detach_member(&mut self, block_id: TextBlockId, list_id: TextListId) {
        if let Some(list) = self.lists.get_mut(&list_id) {
            list.members.retain(|b| *b != block_id);
            if list.members.is_empty() {
                self.lists.remove(&list_id);
            }
        }
    }

    fn drop_block(&mut self, id: TextBlockId) {
        if let Some(block) = self.blocks.remove(&id) {
            if let Some(list_id) = block.list {
                self.detach_member(id, list_id);
            }
        }
    }

    // ── Snapshot ────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            name: self.name.clone(),
            uri: self.uri.clone(),
            symbols: self.symbols.clone(),
            blocks: self.blocks.values().cloned().collect(),
            lists: self.lists.values().cloned().collect(),
            tombstones: self.tombstones.iter().cloned().collect(),
            block_counter: self.block_counter,
            list_counter: self.list_counter,
        }
    }

    /// Rebuild from a snapshot, validating the structural invariants.
    pub fn from_snapshot(snapshot: DocumentSnapshot) -> Result<Self> {
        let DocumentSnapshot {
            name,
            uri,
            symbols,
            blocks,
            lists,
            tombstones,
            block_counter,
            list_counter,
        } = snapshot;

        if symbols.is_empty() {
            return Err(DocumentError::Snapshot("no symbols (sentinel missing)".into()));
        }
        if !symbols.windows(2).all(|w| w[0].pos < w[1].pos) {
            return Err(DocumentError::Snapshot("symbols not strictly sorted".into()));
        }
        let last = &symbols[symbols.len() - 1];
        if !last.is_newline() {
            return Err(DocumentError::Snapshot("last symbol is not a newline".into()));
        }

        let blocks: HashMap<TextBlockId, TextBlock> =
            blocks.into_iter().map(|b| (b.id, b)).collect();
        let lists: HashMap<TextListId, TextList> = lists.into_iter().map(|l| (l.id, l)).collect();

        for symbol in &symbols {
            if let Some(block_id) = symbol.block {
                if !blocks.contains_key(&block_id) {
                    return Err(DocumentError::Snapshot(format!(
                        "newline references unknown block {block_id}"
                    )));
                }
            }
        }
        for block in blocks.values() {
            if let Some(list_id) = block.list {
                let ok = lists.get(&list_id).is_some_and(|l| l.contains(&block.id));
                if !ok {
                    return Err(DocumentError::Snapshot(format!(
                        "block {} references list {list_id} that does not contain it",
                        block.id
                    )));
                }
            }
        }

        Ok(Self {
            name,
            uri,
            symbols,
            blocks,
            lists,
            tombstones: tombstones.into_iter().collect(),
            block_counter,
            list_counter,
        })
    }
}

/// Serializable full document state: the DocumentReady bootstrap payload and
/// the persisted on-disk form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub name: String,
    pub uri: DocumentUri,
    pub symbols: Vec<Symbol>,
    pub blocks: Vec<TextBlock>,
    pub lists: Vec<TextList>,
    pub tombstones: Vec<FracPos>,
    pub block_counter: u32,
    pub list_counter: u32,
}

impl DocumentSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(postcard::to_stdvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::new("test", DocumentUri::new("alice", 0, "test"))
    }

    fn sym(doc: &Document, ch: char, index: usize, author: u32) -> Symbol {
        Symbol::new(
            ch,
            CharFormat::new(),
            doc.new_fractional_pos(index, AuthorId(author)),
        )
    }

    /// Type `text` at the end of the document (before the sentinel).
    fn type_text(doc: &mut Document, text: &str, author: u32) {
        for ch in text.chars() {
            let index = doc.len() - 1;
            let pos = doc.new_fractional_pos(index, AuthorId(author));
            let symbol = if ch == '\n' {
                let block = doc.next_block_id(AuthorId(author));
                Symbol::newline(CharFormat::new(), pos, block)
            } else {
                Symbol::new(ch, CharFormat::new(), pos)
            };
            doc.insert(symbol);
        }
    }

    fn assert_block_invariant(doc: &Document) {
        // Every block id is referenced by exactly one newline and vice versa.
        let mut referenced = Vec::new();
        for s in doc.symbols() {
            if let Some(id) = s.block {
                assert!(s.is_newline());
                assert!(doc.get_block(&id).is_some(), "{id} missing from block map");
                referenced.push(id);
            }
        }
        let mut unique = referenced.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), referenced.len(), "block referenced twice");
        assert_eq!(unique.len(), doc.blocks().count(), "orphan block in map");
    }

    fn assert_list_invariant(doc: &Document) {
        for block in doc.blocks() {
            if let Some(list_id) = block.list {
                let list = doc.get_list(&list_id).expect("list exists");
                assert!(list.contains(&block.id));
            }
        }
        for list in doc.lists() {
            assert!(!list.is_empty(), "empty list not removed");
            for member in list.members() {
                assert_eq!(doc.get_block(member).and_then(|b| b.list), Some(list.id));
            }
        }
    }

    #[test]
    fn test_new_document_has_sentinel() {
        let d = doc();
        assert_eq!(d.len(), 1);
        assert_eq!(d.text(), "\n");
        assert_block_invariant(&d);
    }

    #[test]
    fn test_typing_appends_in_order() {
        let mut d = doc();
        type_text(&mut d, "hello", 1);
        assert_eq!(d.text(), "hello\n");
        assert!(d.symbols().windows(2).all(|w| w[0].pos < w[1].pos));
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut d = doc();
        let s = sym(&d, 'x', 0, 1);
        assert_eq!(d.insert(s.clone()), Some(0));
        assert_eq!(d.insert(s), None);
        assert_eq!(d.text(), "x\n");
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut d = doc();
        let ghost = FracPos::new(vec![12], AuthorId(5));
        assert_eq!(d.remove(&ghost), None);
        assert_eq!(d.text(), "\n");
    }

    #[test]
    fn test_insert_delete_commute() {
        let mut ab = doc();
        let mut ba = doc();
        let s = sym(&ab, 'x', 0, 1);

        ab.insert(s.clone());
        ab.remove(&s.pos);

        ba.remove(&s.pos);
        assert_eq!(ba.insert(s), None);

        assert_eq!(ab.text(), ba.text());
        assert_eq!(ab.len(), ba.len());
    }

    #[test]
    fn test_sentinel_cannot_be_removed() {
        let mut d = doc();
        let sentinel_pos = d.get(0).unwrap().pos.clone();
        assert_eq!(d.remove(&sentinel_pos), None);
        assert_eq!(d.remove_at_index(0), None);
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn test_concurrent_inserts_order_by_author() {
        // Two authors race on index 0 with digit-equal positions.
        let mut alice = doc();
        let mut bob = doc();

        let a = Symbol::new('x', CharFormat::new(), FracPos::new(vec![32], AuthorId(1)));
        let b = Symbol::new('x', CharFormat::new(), FracPos::new(vec![32], AuthorId(2)));

        alice.insert(a.clone());
        alice.insert(b.clone());
        bob.insert(b);
        bob.insert(a);

        assert_eq!(alice.text(), "xx\n");
        assert_eq!(bob.text(), "xx\n");
        assert_eq!(alice.get(0).unwrap().author(), AuthorId(1));
        assert_eq!(bob.get(0).unwrap().author(), AuthorId(1));
    }

    #[test]
    fn test_convergence_under_shuffled_delivery() {
        use rand::seq::SliceRandom;

        // Build a pool of insert ops from one writer, then deliver the same
        // multiset of inserts and deletes to two fresh replicas in different
        // orders.
        let mut source = doc();
        type_text(&mut source, "the quick brown fox", 1);
        let inserts: Vec<Symbol> = source.symbols()[..source.len() - 1].to_vec();
        let deletes: Vec<FracPos> = inserts.iter().step_by(3).map(|s| s.pos.clone()).collect();

        let mut ops: Vec<(bool, usize)> = (0..inserts.len())
            .map(|i| (true, i))
            .chain((0..deletes.len()).map(|i| (false, i)))
            .collect();

        let mut rng = rand::thread_rng();
        let mut first: Option<String> = None;
        for _ in 0..8 {
            ops.shuffle(&mut rng);
            let mut replica = doc();
            for &(is_insert, i) in &ops {
                if is_insert {
                    replica.insert(inserts[i].clone());
                } else {
                    replica.remove(&deletes[i]);
                }
            }
            let text = replica.text();
            match &first {
                None => first = Some(text),
                Some(expected) => assert_eq!(&text, expected),
            }
        }
    }

    #[test]
    fn test_newline_births_block() {
        let mut d = doc();
        type_text(&mut d, "ab\ncd", 1);
        assert_eq!(d.text(), "ab\ncd\n");
        assert_eq!(d.blocks().count(), 2);
        assert_block_invariant(&d);

        // The new block terminates at the inserted newline.
        let block = d.block_at_index(0).unwrap();
        assert_eq!(d.block_position(&block), Some(2));
    }

    #[test]
    fn test_newline_removal_kills_block() {
        let mut d = doc();
        type_text(&mut d, "ab\ncd", 1);
        let newline_pos = d.get(2).unwrap().pos.clone();
        d.remove(&newline_pos);
        assert_eq!(d.text(), "abcd\n");
        assert_eq!(d.blocks().count(), 1);
        assert_block_invariant(&d);
    }

    #[test]
    fn test_block_inherits_enclosing_format() {
        let mut d = doc();
        type_text(&mut d, "ab", 1);
        let terminal = d.block_at_index(0).unwrap();
        let mut fmt = BlockFormat::new();
        fmt.set_alignment(scrivo_types::Alignment::Center);
        d.format_block(&terminal, fmt.clone());

        // Splitting the block inherits its format.
        let pos = d.new_fractional_pos(1, AuthorId(1));
        let block = d.next_block_id(AuthorId(1));
        d.insert(Symbol::newline(CharFormat::new(), pos, block));
        assert_eq!(d.get_block(&block).unwrap().format, fmt);
    }

    #[test]
    fn test_format_symbol_lww() {
        let mut d = doc();
        type_text(&mut d, "x", 1);
        let pos = d.get(0).unwrap().pos.clone();

        let mut bold = CharFormat::new();
        bold.set_bold(true);
        let mut italic = CharFormat::new();
        italic.set_italic(true);

        assert_eq!(d.format_symbol(&pos, bold), Some(0));
        assert_eq!(d.format_symbol(&pos, italic.clone()), Some(0));
        assert_eq!(d.get(0).unwrap().format, italic);

        let ghost = FracPos::new(vec![60], AuthorId(9));
        assert_eq!(d.format_symbol(&ghost, CharFormat::new()), None);
    }

    #[test]
    fn test_blocks_between() {
        let mut d = doc();
        type_text(&mut d, "aa\nbb\ncc", 1);
        // Layout: a a \n b b \n c c <sentinel>
        let b1 = d.block_at_index(0).unwrap();
        let b2 = d.block_at_index(3).unwrap();
        let b3 = d.block_at_index(6).unwrap();

        assert_eq!(d.blocks_between(0, 1), vec![b1]);
        assert_eq!(d.blocks_between(0, 4), vec![b1, b2]);
        assert_eq!(d.blocks_between(1, 7), vec![b1, b2, b3]);
        assert_eq!(d.blocks_between(4, 4), vec![b2]);
    }

    #[test]
    fn test_edit_block_list_lifecycle() {
        let mut d = doc();
        type_text(&mut d, "aa\nbb", 1);
        let b1 = d.block_at_index(0).unwrap();
        let b2 = d.block_at_index(3).unwrap();

        // Create a list with a new id, attach both blocks.
        let list_id = d.next_list_id(AuthorId(1));
        let fmt = ListFormat::with_style(scrivo_types::ListStyle::Decimal);
        d.edit_block_list(b1, Some(list_id), fmt.clone());
        d.edit_block_list(b2, Some(list_id), fmt.clone());
        assert_list_invariant(&d);
        assert_eq!(d.ordered_list_blocks(&list_id), vec![b1, b2]);
        assert_eq!(d.list_position(&list_id), Some(2));

        // Detach one; the list survives with the other.
        d.edit_block_list(b1, None, ListFormat::new());
        assert_list_invariant(&d);
        assert_eq!(d.ordered_list_blocks(&list_id), vec![b2]);

        // Detach the last; the list dies.
        d.edit_block_list(b2, None, ListFormat::new());
        assert_eq!(d.lists().count(), 0);
        assert_list_invariant(&d);
    }

    #[test]
    fn test_edit_block_list_missing_block_is_silent() {
        let mut d = doc();
        let ghost = TextBlockId::new(42, AuthorId(9));
        d.edit_block_list(ghost, None, ListFormat::new());
        d.edit_block_list(ghost, Some(TextListId::new(0, AuthorId(9))), ListFormat::new());
        assert_eq!(d.lists().count(), 0);
    }

    #[test]
    fn test_block_moves_between_lists() {
        let mut d = doc();
        type_text(&mut d, "aa\nbb", 1);
        let b1 = d.block_at_index(0).unwrap();

        let l1 = d.next_list_id(AuthorId(1));
        let l2 = d.next_list_id(AuthorId(1));
        d.edit_block_list(b1, Some(l1), ListFormat::with_style(scrivo_types::ListStyle::Disc));
        d.edit_block_list(b1, Some(l2), ListFormat::with_style(scrivo_types::ListStyle::Decimal));

        // l1 emptied out and died; b1 lives in l2.
        assert!(d.get_list(&l1).is_none());
        assert_eq!(d.get_block(&b1).unwrap().list, Some(l2));
        assert_list_invariant(&d);
    }

    #[test]
    fn test_removing_listed_block_updates_list() {
        let mut d = doc();
        type_text(&mut d, "aa\nbb", 1);
        let b1 = d.block_at_index(0).unwrap();
        let list_id = d.next_list_id(AuthorId(1));
        d.edit_block_list(b1, Some(list_id), ListFormat::with_style(scrivo_types::ListStyle::Disc));

        let newline_pos = d.get(2).unwrap().pos.clone();
        d.remove(&newline_pos);
        assert!(d.get_block(&b1).is_none());
        assert!(d.get_list(&list_id).is_none());
        assert_block_invariant(&d);
        assert_list_invariant(&d);
    }

    #[test]
    fn test_remote_list_id_advances_counter() {
        let mut d = doc();
        type_text(&mut d, "aa", 1);
        let b1 = d.block_at_index(0).unwrap();
        d.edit_block_list(b1, Some(TextListId::new(7, AuthorId(2))), ListFormat::new());
        let minted = d.next_list_id(AuthorId(1));
        assert!(minted.counter > 7);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut d = doc();
        type_text(&mut d, "aa\nbb\ncc", 1);
        let b2 = d.block_at_index(3).unwrap();
        let list_id = d.next_list_id(AuthorId(1));
        d.edit_block_list(b2, Some(list_id), ListFormat::with_style(scrivo_types::ListStyle::Disc));
        d.remove_at_index(0);

        let bytes = d.snapshot().to_bytes().unwrap();
        let restored = Document::from_snapshot(DocumentSnapshot::from_bytes(&bytes).unwrap()).unwrap();

        assert_eq!(restored.text(), d.text());
        assert_eq!(restored.blocks().count(), d.blocks().count());
        assert_eq!(restored.ordered_list_blocks(&list_id), vec![b2]);
        assert_block_invariant(&restored);
        assert_list_invariant(&restored);
    }

    #[test]
    fn test_snapshot_validation_rejects_unsorted() {
        let d = doc();
        let mut snap = d.snapshot();
        snap.symbols.push(Symbol::new(
            'x',
            CharFormat::new(),
            FracPos::new(vec![1], AuthorId(1)),
        ));
        assert!(Document::from_snapshot(snap).is_err());
    }

    #[test]
    fn test_snapshot_validation_rejects_unknown_block() {
        let d = doc();
        let mut snap = d.snapshot();
        snap.blocks.clear();
        assert!(Document::from_snapshot(snap).is_err());
    }
}
