use std::sync::Arc;

use crate::{
    consts::{ENTRY_POINT_DESCRIPTOR, MemberAccessFlag},
    descriptor::parse_method_descriptor,
    error::{Result, VmError},
};

/// One slot of a class's constant table.
///
/// The format stores several logically distinct entry kinds (class refs,
/// string refs, field/method refs, name-and-type pairs, raw double words)
/// as the same two-field shape; they are only told apart by how other
/// entries index into them. We keep that shape as [`PoolEntry::Entry`] and
/// let every consumption site check the variant it expects.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    Utf8(Arc<str>),
    Entry { high: u16, low: u16 },
}

impl PoolEntry {
    fn kind(&self) -> &'static str {
        match self {
            PoolEntry::Utf8(_) => "Utf8 constant",
            PoolEntry::Entry { .. } => "generic entry",
        }
    }
}

/// The parsed body of a `Code` attribute: raw instruction bytes plus the
/// frame sizing needed to execute them. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    pub(crate) max_stack: u16,
    pub(crate) max_locals: u16,
    pub(crate) code: Vec<u8>,
}

impl CodeAttribute {
    pub fn byte_code(&self) -> &[u8] {
        &self.code
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }
}

/// A named attribute. Only `Code` payloads are retained; every other kind
/// is skip-read to its declared length and dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub(crate) name: Arc<str>,
    pub(crate) length: u32,
    pub(crate) code: Option<CodeAttribute>,
}

impl Attribute {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code_attribute(&self) -> Option<&CodeAttribute> {
        self.code.as_ref()
    }
}

/// A field or method declaration: flags, pool indices for name and
/// descriptor, and the declaration's own attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRef {
    pub(crate) access_flags: MemberAccessFlag,
    pub(crate) name_index: u16,
    pub(crate) descriptor_index: u16,
    pub(crate) attributes: Vec<Attribute>,
}

impl MemberRef {
    pub fn access_flags(&self) -> MemberAccessFlag {
        self.access_flags
    }

    pub fn name_index(&self) -> u16 {
        self.name_index
    }

    pub fn descriptor_index(&self) -> u16 {
        self.descriptor_index
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub(crate) fn code_attribute(&self) -> Option<&CodeAttribute> {
        self.attributes.iter().find_map(|a| a.code.as_ref())
    }
}

/// A fully parsed class: constant pool, member tables, class-level
/// attributes, the resolved class name, and the position of the entry-point
/// method if one was located. Immutable after construction; the interpreter
/// only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Klass {
    name: Arc<str>,
    constant_pool: Vec<PoolEntry>,
    fields: Vec<MemberRef>,
    methods: Vec<MemberRef>,
    attributes: Vec<Attribute>,
    entry_method: Option<usize>,
}

impl Klass {
    pub(crate) fn new(
        name: Arc<str>,
        constant_pool: Vec<PoolEntry>,
        fields: Vec<MemberRef>,
        methods: Vec<MemberRef>,
        attributes: Vec<Attribute>,
    ) -> Self {
        let entry_method = find_entry_method(&constant_pool, &methods);
        Klass {
            name,
            constant_pool,
            fields,
            methods,
            attributes,
            entry_method,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &[PoolEntry] {
        &self.constant_pool
    }

    pub fn fields(&self) -> &[MemberRef] {
        &self.fields
    }

    pub fn methods(&self) -> &[MemberRef] {
        &self.methods
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// The code body of the `public static` method whose descriptor is the
    /// canonical entry-point signature, if the class declares one.
    pub fn entry_point(&self) -> Option<&CodeAttribute> {
        self.methods
            .get(self.entry_method?)
            .and_then(MemberRef::code_attribute)
    }

    /// Looks up a pool slot by its 1-based index.
    pub fn constant(&self, index: u16) -> Result<&PoolEntry> {
        constant_at(&self.constant_pool, index)
    }

    /// Resolves a method/field-ref index to the `(name_index,
    /// descriptor_index)` pair of its name-and-type entry.
    pub fn resolve_low_high(&self, index: u16) -> Result<(u16, u16)> {
        let (_, name_and_type) = self.generic(index)?;
        self.generic(name_and_type)
    }

    /// Loads a string constant: a generic entry whose first field indexes
    /// the backing `Utf8` entry.
    pub fn load_constant(&self, index: u16) -> Result<Arc<str>> {
        let (string_index, _) = self.generic(index)?;
        utf8_at(&self.constant_pool, string_index).cloned()
    }

    /// Finds the method matching both pool indices and returns its code
    /// body along with the number of argument slots its descriptor calls
    /// for.
    pub fn invoke(&self, name_index: u16, descriptor_index: u16) -> Result<(&CodeAttribute, usize)> {
        let not_found = || VmError::MethodNotFound {
            name_index,
            descriptor_index,
        };
        let method = self
            .methods
            .iter()
            .find(|m| m.name_index == name_index && m.descriptor_index == descriptor_index)
            .ok_or_else(not_found)?;
        let code = method.code_attribute().ok_or_else(not_found)?;

        let descriptor = utf8_at(&self.constant_pool, descriptor_index)?;
        let arg_count = parse_method_descriptor(descriptor)?.arg_slots();
        Ok((code, arg_count))
    }

    fn generic(&self, index: u16) -> Result<(u16, u16)> {
        generic_at(&self.constant_pool, index)
    }
}

pub(crate) fn generic_at(pool: &[PoolEntry], index: u16) -> Result<(u16, u16)> {
    match constant_at(pool, index)? {
        PoolEntry::Entry { high, low } => Ok((*high, *low)),
        other => Err(VmError::mismatch("generic entry", other.kind())),
    }
}

pub(crate) fn constant_at(pool: &[PoolEntry], index: u16) -> Result<&PoolEntry> {
    index
        .checked_sub(1)
        .and_then(|i| pool.get(i as usize))
        .ok_or_else(|| {
            VmError::MalformedClass(format!(
                "constant pool index {index} out of range (pool size {})",
                pool.len()
            ))
        })
}

pub(crate) fn utf8_at(pool: &[PoolEntry], index: u16) -> Result<&Arc<str>> {
    match constant_at(pool, index)? {
        PoolEntry::Utf8(s) => Ok(s),
        other => Err(VmError::mismatch("Utf8 constant", other.kind())),
    }
}

/// Scans the method table for the program entry point: descriptor exactly
/// equal to the reserved signature and flags exactly `public static`.
fn find_entry_method(pool: &[PoolEntry], methods: &[MemberRef]) -> Option<usize> {
    methods.iter().position(|m| {
        m.access_flags == MemberAccessFlag::entry_point()
            && utf8_at(pool, m.descriptor_index)
                .is_ok_and(|d| d.as_ref() == ENTRY_POINT_DESCRIPTOR)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::CODE_ATTRIBUTE;

    fn utf8(s: &str) -> PoolEntry {
        PoolEntry::Utf8(Arc::from(s))
    }

    fn entry(high: u16, low: u16) -> PoolEntry {
        PoolEntry::Entry { high, low }
    }

    fn method(flags: MemberAccessFlag, name_index: u16, descriptor_index: u16) -> MemberRef {
        MemberRef {
            access_flags: flags,
            name_index,
            descriptor_index,
            attributes: vec![Attribute {
                name: Arc::from(CODE_ATTRIBUTE),
                length: 13,
                code: Some(CodeAttribute {
                    max_stack: 1,
                    max_locals: 1,
                    code: vec![0xb1],
                }),
            }],
        }
    }

    fn public_static() -> MemberAccessFlag {
        MemberAccessFlag::entry_point()
    }

    #[test]
    fn resolve_low_high_follows_the_reference_chain() {
        // 1: methodref -> 2: name-and-type -> (3, 4)
        let pool = vec![entry(9, 2), entry(3, 4), utf8("run"), utf8("()V")];
        let klass = Klass::new(Arc::from("A"), pool, vec![], vec![], vec![]);
        assert_eq!(klass.resolve_low_high(1).unwrap(), (3, 4));
    }

    #[test]
    fn resolve_low_high_rejects_utf8() {
        let pool = vec![utf8("oops")];
        let klass = Klass::new(Arc::from("A"), pool, vec![], vec![], vec![]);
        assert!(matches!(
            klass.resolve_low_high(1),
            Err(VmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn load_constant_resolves_the_string_entry() {
        let pool = vec![entry(2, 0), utf8("hello")];
        let klass = Klass::new(Arc::from("A"), pool, vec![], vec![], vec![]);
        assert_eq!(klass.load_constant(1).unwrap().as_ref(), "hello");
    }

    #[test]
    fn pool_indices_are_one_based_and_bounds_checked() {
        let pool = vec![utf8("only")];
        let klass = Klass::new(Arc::from("A"), pool, vec![], vec![], vec![]);
        assert!(klass.constant(1).is_ok());
        assert!(matches!(
            klass.constant(0),
            Err(VmError::MalformedClass(_))
        ));
        assert!(matches!(
            klass.constant(2),
            Err(VmError::MalformedClass(_))
        ));
    }

    #[test]
    fn invoke_matches_on_both_indices() {
        let pool = vec![utf8("add"), utf8("(II)I")];
        let methods = vec![method(MemberAccessFlag::from_bits_retain(0x0008), 1, 2)];
        let klass = Klass::new(Arc::from("A"), pool, vec![], methods, vec![]);

        let (code, arg_count) = klass.invoke(1, 2).unwrap();
        assert_eq!(code.byte_code(), &[0xb1]);
        assert_eq!(arg_count, 2);

        assert!(matches!(
            klass.invoke(2, 2),
            Err(VmError::MethodNotFound { .. })
        ));
    }

    #[test]
    fn entry_point_requires_exact_flags() {
        let pool = vec![utf8("main"), utf8(ENTRY_POINT_DESCRIPTOR)];
        // public-only does not qualify, public static does.
        let public_only = MemberAccessFlag::from_bits_retain(0x0001);
        let klass = Klass::new(
            Arc::from("A"),
            pool.clone(),
            vec![],
            vec![method(public_only, 1, 2), method(public_static(), 1, 2)],
            vec![],
        );
        assert_eq!(klass.entry_method, Some(1));

        // public static final carries an extra bit and is rejected.
        let too_many = MemberAccessFlag::from_bits_retain(0x0019);
        let klass = Klass::new(
            Arc::from("A"),
            pool,
            vec![],
            vec![method(too_many, 1, 2)],
            vec![],
        );
        assert_eq!(klass.entry_point(), None);
    }

    #[test]
    fn entry_point_requires_the_exact_descriptor() {
        let pool = vec![utf8("main"), utf8("([Ljava/lang/String;)I")];
        let klass = Klass::new(
            Arc::from("A"),
            pool,
            vec![],
            vec![method(public_static(), 1, 2)],
            vec![],
        );
        assert_eq!(klass.entry_point(), None);
    }
}
