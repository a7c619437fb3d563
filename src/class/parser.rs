use std::sync::Arc;

use nom::{
    IResult, Parser as _,
    bytes::complete::take,
    multi::count,
    number::complete::{be_u16, be_u32, u8 as be_u8},
};

use super::structs::{
    Attribute, CodeAttribute, Klass, MemberRef, PoolEntry, generic_at, utf8_at,
};
use crate::{
    consts::{CODE_ATTRIBUTE, MemberAccessFlag},
    error::{Result, VmError},
};

// Pool entry tags, from Oracle's spec sheet.
const UTF_8: u8 = 1;
const CONST_DOUBLE: u8 = 6;
const CLASS: u8 = 7;
const STRING: u8 = 8;
const FIELD_REF: u8 = 9;
const METHOD_REF: u8 = 10;
const INTERFACE_REF: u8 = 11;
const NAME_TYPE_REF: u8 = 12;

/// Maps a nom failure onto the structural-error half of the taxonomy.
trait Structural<'a, T> {
    fn structural(self, what: &str) -> Result<(&'a [u8], T)>;
}

impl<'a, T> Structural<'a, T> for IResult<&'a [u8], T> {
    fn structural(self, what: &str) -> Result<(&'a [u8], T)> {
        self.map_err(|_| VmError::MalformedClass(format!("truncated or invalid {what}")))
    }
}

/// Deserializes one class file into a [`Klass`].
///
/// The layout is fixed: header, constant pool, class metadata, field table,
/// method table, class attributes. Every multi-byte value is big-endian and
/// every count prefixes the records it counts; the format never backtracks.
pub fn parse(input: &[u8]) -> Result<Klass> {
    let (input, (minor, major)) = parse_header(input)?;
    log::debug!("class file version {major}.{minor}");

    let (input, constant_pool) = parse_constant_pool(input)?;
    let (input, this_class) = parse_meta(input)?;
    let (input, fields) = parse_members(input, &constant_pool, "field table")?;
    let (input, methods) = parse_members(input, &constant_pool, "method table")?;
    let (input, attributes) = parse_attributes(input, &constant_pool)?;

    if !input.is_empty() {
        return Err(VmError::MalformedClass(format!(
            "{} trailing bytes after class attributes",
            input.len()
        )));
    }

    let name = resolve_name(&constant_pool, this_class)?;
    log::debug!(
        "parsed class {name}: {} pool entries, {} fields, {} methods",
        constant_pool.len(),
        fields.len(),
        methods.len()
    );
    Ok(Klass::new(name, constant_pool, fields, methods, attributes))
}

fn parse_header(input: &[u8]) -> Result<(&[u8], (u16, u16))> {
    // Magic and version are consumed but never validated.
    let (input, _magic) = be_u32(input).structural("magic header")?;
    let (input, minor) = be_u16(input).structural("minor version")?;
    let (input, major) = be_u16(input).structural("major version")?;
    Ok((input, (minor, major)))
}

fn parse_constant_pool(input: &[u8]) -> Result<(&[u8], Vec<PoolEntry>)> {
    let (input, entry_count) = be_u16(input).structural("constant pool count")?;

    // The declared count is one larger than the number of live entries;
    // slot 0 is reserved by the 1-based indexing convention.
    let live = (entry_count as usize).saturating_sub(1);
    let mut pool = Vec::with_capacity(live);

    let mut input = input;
    while pool.len() < live {
        let entry;
        (input, entry) = parse_constant(input)?;
        pool.push(entry);
    }

    Ok((input, pool))
}

fn parse_constant(mut input: &[u8]) -> Result<(&[u8], PoolEntry)> {
    let tag;
    (input, tag) = be_u8(input).structural("pool entry tag")?;
    let entry = match tag {
        UTF_8 => {
            let length;
            (input, length) = be_u16(input).structural("Utf8 length")?;
            let bytes;
            (input, bytes) = take(length)(input).structural("Utf8 bytes")?;
            let s = cesu8::from_java_cesu8(bytes).map_err(|_| {
                VmError::MalformedClass("invalid modified UTF-8 constant".to_string())
            })?;
            PoolEntry::Utf8(Arc::from(s.as_ref()))
        }
        CONST_DOUBLE => {
            // The two 16-bit words are kept verbatim; nothing in the VM
            // reassembles them into a float.
            let (high, low);
            (input, high) = be_u16(input).structural("double high word")?;
            (input, low) = be_u16(input).structural("double low word")?;
            PoolEntry::Entry { high, low }
        }
        CLASS | STRING => {
            let index;
            (input, index) = be_u16(input).structural("name index")?;
            PoolEntry::Entry {
                high: index,
                low: 0,
            }
        }
        FIELD_REF | METHOD_REF | INTERFACE_REF | NAME_TYPE_REF => {
            let (high, low);
            (input, high) = be_u16(input).structural("reference class index")?;
            (input, low) = be_u16(input).structural("reference name-and-type index")?;
            PoolEntry::Entry { high, low }
        }
        _ => {
            return Err(VmError::MalformedClass(format!("invalid tag: {tag}")));
        }
    };
    Ok((input, entry))
}

/// Class-level metadata. Only the this-class index is retained; access
/// flags, the super-class index and the interface list are discarded.
fn parse_meta(input: &[u8]) -> Result<(&[u8], u16)> {
    let (input, _access_flags) = be_u16(input).structural("class access flags")?;
    let (input, this_class) = be_u16(input).structural("this-class index")?;
    let (input, _super_class) = be_u16(input).structural("super-class index")?;
    let (input, interface_count) = be_u16(input).structural("interface count")?;
    let (input, _interfaces) = count(be_u16, interface_count as usize)
        .parse(input)
        .structural("interface table")?;
    Ok((input, this_class))
}

fn parse_members<'a>(
    input: &'a [u8],
    pool: &[PoolEntry],
    what: &str,
) -> Result<(&'a [u8], Vec<MemberRef>)> {
    let (mut input, length) = be_u16(input).structural(what)?;
    let mut members = Vec::with_capacity(length as usize);
    for _ in 0..length {
        let member;
        (input, member) = parse_member(input, pool)?;
        members.push(member);
    }
    Ok((input, members))
}

fn parse_member<'a>(input: &'a [u8], pool: &[PoolEntry]) -> Result<(&'a [u8], MemberRef)> {
    let (input, access_flags) = be_u16(input).structural("member access flags")?;
    let (input, name_index) = be_u16(input).structural("member name index")?;
    let (input, descriptor_index) = be_u16(input).structural("member descriptor index")?;
    let (input, attributes) = parse_attributes(input, pool)?;
    Ok((
        input,
        MemberRef {
            access_flags: MemberAccessFlag::from_bits_retain(access_flags),
            name_index,
            descriptor_index,
            attributes,
        },
    ))
}

fn parse_attributes<'a>(input: &'a [u8], pool: &[PoolEntry]) -> Result<(&'a [u8], Vec<Attribute>)> {
    let (mut input, length) = be_u16(input).structural("attribute count")?;
    let mut attributes = Vec::with_capacity(length as usize);
    for _ in 0..length {
        let attribute;
        (input, attribute) = parse_attribute(input, pool)?;
        attributes.push(attribute);
    }
    Ok((input, attributes))
}

fn parse_attribute<'a>(input: &'a [u8], pool: &[PoolEntry]) -> Result<(&'a [u8], Attribute)> {
    let (input, name_index) = be_u16(input).structural("attribute name index")?;
    let (input, length) = be_u32(input).structural("attribute length")?;
    let name = Arc::clone(utf8_at(pool, name_index)?);

    if name.as_ref() == CODE_ATTRIBUTE {
        let (input, code) = parse_code_attribute(input, pool)?;
        Ok((
            input,
            Attribute {
                name,
                length,
                code: Some(code),
            },
        ))
    } else {
        // Unknown attributes are opaque: skip exactly `length` bytes.
        let (input, _payload) = take(length)(input).structural("attribute payload")?;
        Ok((
            input,
            Attribute {
                name,
                length,
                code: None,
            },
        ))
    }
}

fn parse_code_attribute<'a>(
    input: &'a [u8],
    pool: &[PoolEntry],
) -> Result<(&'a [u8], CodeAttribute)> {
    let (input, max_stack) = be_u16(input).structural("max stack")?;
    let (input, max_locals) = be_u16(input).structural("max locals")?;
    let (input, code_length) = be_u32(input).structural("code length")?;
    let (input, code) = take(code_length)(input).structural("code body")?;

    let (input, exception_count) = be_u16(input).structural("exception table length")?;
    let (input, _exceptions) = count(take(8usize), exception_count as usize)
        .parse(input)
        .structural("exception table")?;

    let (mut input, nested_count) = be_u16(input).structural("nested attribute count")?;
    for _ in 0..nested_count {
        // Same grammar, then dropped.
        (input, _) = parse_attribute(input, pool)?;
    }

    Ok((
        input,
        CodeAttribute {
            max_stack,
            max_locals,
            code: code.to_vec(),
        },
    ))
}

fn resolve_name(pool: &[PoolEntry], this_class: u16) -> Result<Arc<str>> {
    let (name_index, _) = generic_at(pool, this_class)?;
    Ok(Arc::clone(utf8_at(pool, name_index)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pool_tag_aborts_parsing() {
        let mut bytes = vec![0xca, 0xfe, 0xba, 0xbe, 0x00, 0x00, 0x00, 0x34];
        bytes.extend_from_slice(&2u16.to_be_bytes()); // one live entry
        bytes.push(99); // not a known tag

        let err = parse(&bytes).unwrap_err();
        assert!(matches!(err, VmError::MalformedClass(ref msg) if msg == "invalid tag: 99"));
    }

    #[test]
    fn truncated_header_is_structural() {
        let err = parse(&[0xca, 0xfe]).unwrap_err();
        assert!(matches!(err, VmError::MalformedClass(_)));
    }

    #[test]
    fn truncated_utf8_entry_is_structural() {
        let mut bytes = vec![0xca, 0xfe, 0xba, 0xbe, 0x00, 0x00, 0x00, 0x34];
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.push(UTF_8);
        bytes.extend_from_slice(&10u16.to_be_bytes()); // claims 10 bytes
        bytes.extend_from_slice(b"abc"); // delivers 3

        let err = parse(&bytes).unwrap_err();
        assert!(matches!(err, VmError::MalformedClass(_)));
    }
}
