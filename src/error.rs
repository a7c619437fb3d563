use thiserror::Error;

/// Result type for VM operations.
pub type Result<T> = std::result::Result<T, VmError>;

/// Every failure the parser or the interpreter can produce. There is no
/// recovery path: each of these propagates to the top level, which reports
/// it and halts.
#[derive(Error, Debug)]
pub enum VmError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed class: {0}")]
    MalformedClass(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("could not look up method (name index {name_index}, descriptor index {descriptor_index})")]
    MethodNotFound {
        name_index: u16,
        descriptor_index: u16,
    },

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("no public static entry method in class {0}")]
    EntryPointNotFound(String),

    #[error("unsupported opcode: {0:#04x}")]
    UnsupportedOpcode(u8),
}

impl VmError {
    pub(crate) fn mismatch(expected: &'static str, found: impl Into<String>) -> Self {
        VmError::TypeMismatch {
            expected,
            found: found.into(),
        }
    }
}
