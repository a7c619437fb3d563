use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, VmError};

/// Shared array handle. `newarray` allocates one of these; copies made by
/// `dup`/`astore`/argument passing all alias the same storage.
pub type ArrayRef = Arc<Mutex<Vec<Value>>>;

/// A runtime value, one per operand-stack or local slot. Longs and doubles
/// occupy a single slot.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(u16),
    Str(Arc<str>),
    Array(ArrayRef),
}

impl Value {
    pub fn new_array(length: usize) -> Value {
        Value::Array(Arc::new(Mutex::new(vec![Value::Null; length])))
    }

    pub fn int(self) -> Result<i32> {
        match self {
            Value::Int(v) => Ok(v),
            other => Err(VmError::mismatch("int", other.kind())),
        }
    }

    pub fn long(self) -> Result<i64> {
        match self {
            Value::Long(v) => Ok(v),
            other => Err(VmError::mismatch("long", other.kind())),
        }
    }

    pub fn float(self) -> Result<f32> {
        match self {
            Value::Float(v) => Ok(v),
            other => Err(VmError::mismatch("float", other.kind())),
        }
    }

    pub fn double(self) -> Result<f64> {
        match self {
            Value::Double(v) => Ok(v),
            other => Err(VmError::mismatch("double", other.kind())),
        }
    }

    pub fn array(self) -> Result<ArrayRef> {
        match self {
            Value::Array(v) => Ok(v),
            other => Err(VmError::mismatch("array", other.kind())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
        }
    }

    /// Long and double values are "wide" for the stack-shuffling opcodes
    /// (`pop2`, `dup2`), which treat one wide value like a pair.
    pub(crate) fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }
}

/// One method activation: an operand stack and the local-variable array.
/// Locals get one slot beyond the declared maximum; some compilers
/// under-count `max_locals` and the VM tolerates them.
#[derive(Debug)]
pub struct Frame {
    stack: Vec<Value>,
    locals: Vec<Value>,
}

impl Frame {
    pub fn new(max_locals: u16) -> Frame {
        Frame {
            stack: Vec::new(),
            locals: vec![Value::Null; max_locals as usize + 1],
        }
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Popping an empty stack is a VM bug, not an input condition.
    pub fn pop(&mut self) -> Value {
        self.stack.pop().expect("operand stack underflow")
    }

    pub fn local(&self, index: usize) -> Value {
        self.locals[index].clone()
    }

    pub fn set_local(&mut self, index: usize, value: Value) {
        self.locals[index] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_enforce_the_variant() {
        assert_eq!(Value::Int(7).int().unwrap(), 7);
        assert!(matches!(
            Value::Int(7).long(),
            Err(VmError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Value::Null.array(),
            Err(VmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn locals_initialize_to_null_with_a_spare_slot() {
        let frame = Frame::new(2);
        for index in 0..3 {
            assert!(matches!(frame.local(index), Value::Null));
        }
    }

    #[test]
    #[should_panic(expected = "operand stack underflow")]
    fn popping_an_empty_stack_panics() {
        Frame::new(0).pop();
    }

    #[test]
    fn array_handles_alias() {
        let array = Value::new_array(1);
        let alias = array.clone().array().unwrap();
        alias.lock()[0] = Value::Int(5);
        let original = array.array().unwrap();
        assert!(matches!(original.lock()[0], Value::Int(5)));
    }
}
