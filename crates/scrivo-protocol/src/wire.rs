//! Body encoding for every message kind.
//!
//! All integers are big-endian. Strings and blobs are `u32`-prefixed.
//! Optional fields are a `u8` presence flag followed by the value. Fractional
//! positions are a `u16` component count followed by `u32` components.
//! Format maps are a `u16` entry count followed by `u16 id | u8 tag | value`
//! entries; ids this peer does not understand are carried in the map as-is.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use scrivo_crdt::{DocumentSnapshot, FracPos, Symbol};
use scrivo_types::{
    AuthorId, BlockFormat, CharFormat, FormatMap, ListFormat, Profile, PropValue, TextBlockId,
    TextListId,
};

use crate::error::ProtocolError;
use crate::message::{FailureKind, Message, MessageKind};
use crate::Result;

// ── Value tags for format map entries ───────────────────────────────────────

const TAG_BOOL: u8 = 0;
const TAG_UINT: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_TEXT: u8 = 4;

// ── Primitive readers (never advance past the end) ──────────────────────────

fn need(buf: &Bytes, n: usize) -> Result<()> {
    if buf.remaining() < n {
        return Err(ProtocolError::Truncated);
    }
    Ok(())
}

fn get_u8(buf: &mut Bytes) -> Result<u8> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

fn get_u16(buf: &mut Bytes) -> Result<u16> {
    need(buf, 2)?;
    Ok(buf.get_u16())
}

fn get_u32(buf: &mut Bytes) -> Result<u32> {
    need(buf, 4)?;
    Ok(buf.get_u32())
}

fn get_i64(buf: &mut Bytes) -> Result<i64> {
    need(buf, 8)?;
    Ok(buf.get_i64())
}

fn get_f64(buf: &mut Bytes) -> Result<f64> {
    need(buf, 8)?;
    Ok(buf.get_f64())
}

fn get_bool(buf: &mut Bytes) -> Result<bool> {
    Ok(get_u8(buf)? != 0)
}

// ── Strings and blobs ───────────────────────────────────────────────────────

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn get_string(buf: &mut Bytes) -> Result<String> {
    let len = get_u32(buf)? as usize;
    need(buf, len)?;
    let bytes = buf.copy_to_bytes(len);
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn put_blob(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn get_blob(buf: &mut Bytes) -> Result<Vec<u8>> {
    let len = get_u32(buf)? as usize;
    need(buf, len)?;
    Ok(buf.copy_to_bytes(len).to_vec())
}

// ── Optionals ───────────────────────────────────────────────────────────────

fn put_opt<T: ?Sized>(buf: &mut BytesMut, value: Option<&T>, put: impl FnOnce(&mut BytesMut, &T)) {
    match value {
        Some(v) => {
            buf.put_u8(1);
            put(buf, v);
        }
        None => buf.put_u8(0),
    }
}

fn get_opt<T>(buf: &mut Bytes, get: impl FnOnce(&mut Bytes) -> Result<T>) -> Result<Option<T>> {
    match get_u8(buf)? {
        0 => Ok(None),
        _ => Ok(Some(get(buf)?)),
    }
}

// ── Domain fields ───────────────────────────────────────────────────────────

fn put_pos(buf: &mut BytesMut, pos: &FracPos) {
    let components = pos.components();
    buf.put_u16(components.len() as u16);
    for c in components {
        buf.put_u32(*c);
    }
}

fn get_pos(buf: &mut Bytes) -> Result<FracPos> {
    let count = get_u16(buf)? as usize;
    if count == 0 {
        return Err(ProtocolError::Malformed("empty fractional position".into()));
    }
    let mut components = Vec::with_capacity(count);
    for _ in 0..count {
        components.push(get_u32(buf)?);
    }
    Ok(FracPos::from_components(components))
}

fn put_format_map(buf: &mut BytesMut, map: &FormatMap) {
    buf.put_u16(map.len() as u16);
    for (id, value) in map.iter() {
        buf.put_u16(id);
        match value {
            PropValue::Bool(b) => {
                buf.put_u8(TAG_BOOL);
                buf.put_u8(*b as u8);
            }
            PropValue::Uint(v) => {
                buf.put_u8(TAG_UINT);
                buf.put_u32(*v);
            }
            PropValue::Int(v) => {
                buf.put_u8(TAG_INT);
                buf.put_i64(*v);
            }
            PropValue::Float(v) => {
                buf.put_u8(TAG_FLOAT);
                buf.put_f64(*v);
            }
            PropValue::Text(s) => {
                buf.put_u8(TAG_TEXT);
                put_string(buf, s);
            }
        }
    }
}

fn get_format_map(buf: &mut Bytes) -> Result<FormatMap> {
    let count = get_u16(buf)?;
    let mut map = FormatMap::new();
    for _ in 0..count {
        let id = get_u16(buf)?;
        let value = match get_u8(buf)? {
            TAG_BOOL => PropValue::Bool(get_u8(buf)? != 0),
            TAG_UINT => PropValue::Uint(get_u32(buf)?),
            TAG_INT => PropValue::Int(get_i64(buf)?),
            TAG_FLOAT => PropValue::Float(get_f64(buf)?),
            TAG_TEXT => PropValue::Text(get_string(buf)?),
            tag => return Err(ProtocolError::BadValueTag(tag)),
        };
        map.set(id, value);
    }
    Ok(map)
}

fn put_block_id(buf: &mut BytesMut, id: &TextBlockId) {
    buf.put_u32(id.counter);
    buf.put_u32(id.author.0);
}

fn get_block_id(buf: &mut Bytes) -> Result<TextBlockId> {
    let counter = get_u32(buf)?;
    let author = AuthorId(get_u32(buf)?);
    Ok(TextBlockId::new(counter, author))
}

fn put_list_id(buf: &mut BytesMut, id: &TextListId) {
    buf.put_u32(id.counter);
    buf.put_u32(id.author.0);
}

fn get_list_id(buf: &mut Bytes) -> Result<TextListId> {
    let counter = get_u32(buf)?;
    let author = AuthorId(get_u32(buf)?);
    Ok(TextListId::new(counter, author))
}

fn put_symbol(buf: &mut BytesMut, symbol: &Symbol) {
    buf.put_u32(symbol.ch as u32);
    put_format_map(buf, &symbol.format.props);
    put_pos(buf, &symbol.pos);
    put_opt(buf, symbol.block.as_ref(), |b, id| put_block_id(b, id));
}

fn get_symbol(buf: &mut Bytes) -> Result<Symbol> {
    let scalar = get_u32(buf)?;
    let ch = char::from_u32(scalar).ok_or(ProtocolError::BadChar(scalar))?;
    let format = CharFormat {
        props: get_format_map(buf)?,
    };
    let pos = get_pos(buf)?;
    let block = get_opt(buf, get_block_id)?;
    Ok(Symbol {
        ch,
        format,
        pos,
        block,
    })
}

fn put_profile(buf: &mut BytesMut, profile: &Profile) {
    buf.put_u32(profile.author_id.0);
    put_string(buf, &profile.username);
    put_string(buf, &profile.nickname);
    put_opt(buf, profile.icon.as_deref(), |b, icon| put_blob(b, icon));
}

fn get_profile(buf: &mut Bytes) -> Result<Profile> {
    Ok(Profile {
        author_id: AuthorId(get_u32(buf)?),
        username: get_string(buf)?,
        nickname: get_string(buf)?,
        icon: get_opt(buf, get_blob)?,
    })
}

fn put_uri(buf: &mut BytesMut, uri: &scrivo_types::DocumentUri) {
    put_string(buf, &uri.to_string());
}

fn get_uri(buf: &mut Bytes) -> Result<scrivo_types::DocumentUri> {
    let raw = get_string(buf)?;
    raw.parse()
        .map_err(|e| ProtocolError::Malformed(format!("document URI: {e}")))
}

// ── Message bodies ──────────────────────────────────────────────────────────

impl Message {
    pub(crate) fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            Message::LoginRequest { username } => put_string(buf, username),
            Message::LoginChallenge { salt, nonce } => {
                put_string(buf, salt);
                put_string(buf, nonce);
            }
            Message::LoginUnlock { token } => put_string(buf, token),
            Message::LoginGranted { profile } => put_profile(buf, profile),
            Message::LoginDenied { reason } => put_string(buf, reason),
            Message::Logout => {}

            Message::AccountCreate {
                username,
                nickname,
                icon,
                password,
            } => {
                put_string(buf, username);
                put_string(buf, nickname);
                put_opt(buf, icon.as_deref(), |b, i| put_blob(b, i));
                put_string(buf, password);
            }
            Message::AccountUpdate {
                nickname,
                icon,
                password,
            } => {
                put_opt(buf, nickname.as_deref(), |b, s| put_string(b, s));
                put_opt(buf, icon.as_deref(), |b, i| put_blob(b, i));
                put_opt(buf, password.as_deref(), |b, s| put_string(b, s));
            }
            Message::AccountConfirmed { profile } => put_profile(buf, profile),
            Message::AccountDenied { reason } => put_string(buf, reason),

            Message::DocumentCreate { name } => put_string(buf, name),
            Message::DocumentOpen { uri }
            | Message::DocumentRemove { uri }
            | Message::DocumentDismissed { uri } => put_uri(buf, uri),
            Message::DocumentClose => {}
            Message::DocumentReady { snapshot } => {
                let bytes = snapshot
                    .to_bytes()
                    .map_err(|e| ProtocolError::Malformed(format!("snapshot: {e}")))?;
                put_blob(buf, &bytes);
            }

            Message::CharInsert { symbol, is_last } => {
                put_symbol(buf, symbol);
                buf.put_u8(*is_last as u8);
            }
            Message::CharDelete { pos } => put_pos(buf, pos),
            Message::CharFormat { pos, format } => {
                put_pos(buf, pos);
                put_format_map(buf, &format.props);
            }
            Message::BlockEdit { block, format } => {
                put_block_id(buf, block);
                put_format_map(buf, &format.props);
            }
            Message::ListEdit {
                block,
                list,
                format,
            } => {
                put_block_id(buf, block);
                put_opt(buf, list.as_ref(), |b, id| put_list_id(b, id));
                put_format_map(buf, &format.props);
            }

            Message::CursorMove { author, index } => {
                buf.put_u32(author.0);
                buf.put_u32(*index);
            }
            Message::PresenceAdd { profile } | Message::PresenceUpdate { profile } => {
                put_profile(buf, profile)
            }
            Message::PresenceRemove { author } => buf.put_u32(author.0),

            Message::Failure { kind, context } => {
                buf.put_u8(*kind as u8);
                put_string(buf, context);
            }
        }
        Ok(())
    }

    pub(crate) fn decode_body(kind: MessageKind, buf: &mut Bytes) -> Result<Message> {
        let message = match kind {
            MessageKind::LoginRequest => Message::LoginRequest {
                username: get_string(buf)?,
            },
            MessageKind::LoginChallenge => Message::LoginChallenge {
                salt: get_string(buf)?,
                nonce: get_string(buf)?,
            },
            MessageKind::LoginUnlock => Message::LoginUnlock {
                token: get_string(buf)?,
            },
            MessageKind::LoginGranted => Message::LoginGranted {
                profile: get_profile(buf)?,
            },
            MessageKind::LoginDenied => Message::LoginDenied {
                reason: get_string(buf)?,
            },
            MessageKind::Logout => Message::Logout,

            MessageKind::AccountCreate => Message::AccountCreate {
                username: get_string(buf)?,
                nickname: get_string(buf)?,
                icon: get_opt(buf, get_blob)?,
                password: get_string(buf)?,
            },
            MessageKind::AccountUpdate => Message::AccountUpdate {
                nickname: get_opt(buf, get_string)?,
                icon: get_opt(buf, get_blob)?,
                password: get_opt(buf, get_string)?,
            },
            MessageKind::AccountConfirmed => Message::AccountConfirmed {
                profile: get_profile(buf)?,
            },
            MessageKind::AccountDenied => Message::AccountDenied {
                reason: get_string(buf)?,
            },

            MessageKind::DocumentCreate => Message::DocumentCreate {
                name: get_string(buf)?,
            },
            MessageKind::DocumentOpen => Message::DocumentOpen { uri: get_uri(buf)? },
            MessageKind::DocumentRemove => Message::DocumentRemove { uri: get_uri(buf)? },
            MessageKind::DocumentDismissed => Message::DocumentDismissed { uri: get_uri(buf)? },
            MessageKind::DocumentClose => Message::DocumentClose,
            MessageKind::DocumentReady => {
                let bytes = get_blob(buf)?;
                let snapshot = DocumentSnapshot::from_bytes(&bytes)
                    .map_err(|e| ProtocolError::Malformed(format!("snapshot: {e}")))?;
                Message::DocumentReady { snapshot }
            }

            MessageKind::CharInsert => Message::CharInsert {
                symbol: get_symbol(buf)?,
                is_last: get_bool(buf)?,
            },
            MessageKind::CharDelete => Message::CharDelete { pos: get_pos(buf)? },
            MessageKind::CharFormat => Message::CharFormat {
                pos: get_pos(buf)?,
                format: CharFormat {
                    props: get_format_map(buf)?,
                },
            },
            MessageKind::BlockEdit => Message::BlockEdit {
                block: get_block_id(buf)?,
                format: BlockFormat {
                    props: get_format_map(buf)?,
                },
            },
            MessageKind::ListEdit => Message::ListEdit {
                block: get_block_id(buf)?,
                list: get_opt(buf, get_list_id)?,
                format: ListFormat {
                    props: get_format_map(buf)?,
                },
            },

            MessageKind::CursorMove => Message::CursorMove {
                author: AuthorId(get_u32(buf)?),
                index: get_u32(buf)?,
            },
            MessageKind::PresenceAdd => Message::PresenceAdd {
                profile: get_profile(buf)?,
            },
            MessageKind::PresenceUpdate => Message::PresenceUpdate {
                profile: get_profile(buf)?,
            },
            MessageKind::PresenceRemove => Message::PresenceRemove {
                author: AuthorId(get_u32(buf)?),
            },

            MessageKind::Failure => {
                let raw = get_u8(buf)?;
                let kind = FailureKind::from_repr(raw)
                    .ok_or_else(|| ProtocolError::Malformed(format!("failure kind {raw}")))?;
                Message::Failure {
                    kind,
                    context: get_string(buf)?,
                }
            }
        };
        Ok(message)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(message: Message) -> Message {
        let mut buf = BytesMut::new();
        message.encode_body(&mut buf).unwrap();
        let mut bytes = buf.freeze();
        let decoded = Message::decode_body(message.kind(), &mut bytes).unwrap();
        assert!(!bytes.has_remaining(), "trailing bytes after {:?}", decoded.kind());
        decoded
    }

    fn profile() -> Profile {
        Profile {
            author_id: AuthorId(3),
            username: "alice".into(),
            nickname: "Alice".into(),
            icon: Some(vec![1, 2, 3]),
        }
    }

    #[test]
    fn test_login_family_roundtrip() {
        for message in [
            Message::LoginRequest { username: "alice".into() },
            Message::LoginChallenge { salt: "ab12".into(), nonce: "ffee".into() },
            Message::LoginUnlock { token: "deadbeef".into() },
            Message::LoginGranted { profile: profile() },
            Message::LoginDenied { reason: "wrong password".into() },
            Message::Logout,
        ] {
            assert_eq!(roundtrip(message.clone()), message);
        }
    }

    #[test]
    fn test_account_family_roundtrip() {
        for message in [
            Message::AccountCreate {
                username: "bob".into(),
                nickname: "Bob".into(),
                icon: None,
                password: "hunter2".into(),
            },
            Message::AccountUpdate {
                nickname: Some("Bobby".into()),
                icon: Some(vec![9]),
                password: None,
            },
            Message::AccountConfirmed { profile: profile() },
            Message::AccountDenied { reason: "taken".into() },
        ] {
            assert_eq!(roundtrip(message.clone()), message);
        }
    }

    #[test]
    fn test_edit_family_roundtrip() {
        let mut format = CharFormat::new();
        format.set_bold(true);
        format.set_font_family("mono");

        let symbol = Symbol::new('é', format.clone(), FracPos::new(vec![32, 7], AuthorId(1)));
        let newline = Symbol::newline(
            CharFormat::new(),
            FracPos::new(vec![40], AuthorId(2)),
            TextBlockId::new(5, AuthorId(2)),
        );

        for message in [
            Message::CharInsert { symbol, is_last: false },
            Message::CharInsert { symbol: newline, is_last: true },
            Message::CharDelete { pos: FracPos::new(vec![50], AuthorId(1)) },
            Message::CharFormat { pos: FracPos::new(vec![40], AuthorId(1)), format },
            Message::BlockEdit {
                block: TextBlockId::new(1, AuthorId(1)),
                format: BlockFormat::new(),
            },
            Message::ListEdit {
                block: TextBlockId::new(1, AuthorId(1)),
                list: Some(TextListId::new(2, AuthorId(1))),
                format: ListFormat::with_style(scrivo_types::ListStyle::Decimal),
            },
            Message::ListEdit {
                block: TextBlockId::new(1, AuthorId(1)),
                list: None,
                format: ListFormat::new(),
            },
        ] {
            assert_eq!(roundtrip(message.clone()), message);
        }
    }

    #[test]
    fn test_document_and_presence_roundtrip() {
        let uri: scrivo_types::DocumentUri = "alice_1_notes".parse().unwrap();
        let snapshot = scrivo_crdt::Document::new("notes", uri.clone()).snapshot();

        for message in [
            Message::DocumentCreate { name: "notes".into() },
            Message::DocumentOpen { uri: uri.clone() },
            Message::DocumentRemove { uri: uri.clone() },
            Message::DocumentDismissed { uri },
            Message::DocumentClose,
            Message::DocumentReady { snapshot },
            Message::CursorMove { author: AuthorId(2), index: 14 },
            Message::PresenceAdd { profile: profile() },
            Message::PresenceUpdate { profile: profile() },
            Message::PresenceRemove { author: AuthorId(3) },
            Message::Failure {
                kind: FailureKind::DocumentNotFound,
                context: "alice_1_gone".into(),
            },
        ] {
            assert_eq!(roundtrip(message.clone()), message);
        }
    }

    #[test]
    fn test_symbol_fields_survive_roundtrip() {
        // Symbol equality is position-only, so check the other fields by
        // hand.
        let mut format = CharFormat::new();
        format.set_underline(true);
        let block = TextBlockId::new(3, AuthorId(2));
        let symbol = Symbol::newline(format.clone(), FracPos::new(vec![9, 2], AuthorId(2)), block);

        match roundtrip(Message::CharInsert { symbol, is_last: true }) {
            Message::CharInsert { symbol, is_last } => {
                assert_eq!(symbol.ch, '\n');
                assert_eq!(symbol.format, format);
                assert_eq!(symbol.block, Some(block));
                assert_eq!(symbol.pos.components(), &[9, 2, 2]);
                assert!(is_last);
            }
            other => panic!("wrong kind: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_unknown_format_property_survives() {
        let mut format = CharFormat::new();
        format.props.set(0x4242, PropValue::Text("from the future".into()));
        format.props.set(0x4343, PropValue::Int(-5));
        let message = Message::CharFormat {
            pos: FracPos::new(vec![1], AuthorId(1)),
            format: format.clone(),
        };
        match roundtrip(message) {
            Message::CharFormat { format: decoded, .. } => assert_eq!(decoded, format),
            other => panic!("wrong kind: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_truncated_body() {
        let mut buf = BytesMut::new();
        Message::LoginRequest { username: "alice".into() }
            .encode_body(&mut buf)
            .unwrap();
        let mut short = buf.freeze().slice(0..6);
        let err = Message::decode_body(MessageKind::LoginRequest, &mut short).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated));
    }

    #[test]
    fn test_bad_value_tag() {
        let mut buf = BytesMut::new();
        buf.put_u16(1); // one entry
        buf.put_u16(7); // property id
        buf.put_u8(99); // bogus tag
        let err = get_format_map(&mut buf.freeze()).unwrap_err();
        assert!(matches!(err, ProtocolError::BadValueTag(99)));
    }
}
