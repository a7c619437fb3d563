bitflags::bitflags! {
    /// Access-flag bitmask shared by field and method declarations. Only
    /// the exact `PUBLIC | STATIC` combination is ever acted on (the
    /// entry-point check); everything else is carried verbatim.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct MemberAccessFlag: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

impl MemberAccessFlag {
    /// The exact flag set a program-entry method must carry.
    pub fn entry_point() -> Self {
        MemberAccessFlag::PUBLIC | MemberAccessFlag::STATIC
    }
}

/// The descriptor every program-entry method must have.
pub const ENTRY_POINT_DESCRIPTOR: &str = "([Ljava/lang/String;)V";

/// Attribute name marking an executable code body.
pub const CODE_ATTRIBUTE: &str = "Code";
