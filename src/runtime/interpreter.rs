//! The bytecode interpreter.
//!
//! One [`Frame`] per method activation; `invokestatic` recurses into
//! [`Interpreter::call`] and pushes the callee's return value (if any) on
//! the caller's operand stack. Every executed instruction emits one trace
//! line on stdout; that trace is part of the VM's observable output, not
//! diagnostics, so it bypasses the `log` facade.

mod frame;
mod instructions;

pub use frame::{ArrayRef, Frame, Value};

use std::collections::HashMap;

use crate::{
    class::{CodeAttribute, Klass},
    error::{Result, VmError},
};

use instructions as inst;

/// Holds the loaded classes and drives execution of the entry method.
#[derive(Debug)]
pub struct Interpreter {
    classes: HashMap<String, Klass>,
    main_class: String,
}

impl Interpreter {
    /// Single-class mode: the given class is the main class.
    pub fn new(klass: Klass) -> Interpreter {
        let main_class = klass.name().to_string();
        Interpreter {
            classes: HashMap::from([(main_class.clone(), klass)]),
            main_class,
        }
    }

    /// Multi-class mode: execution starts in the named class.
    pub fn with_main_class(
        classes: impl IntoIterator<Item = Klass>,
        main_class: impl Into<String>,
    ) -> Interpreter {
        Interpreter {
            classes: classes
                .into_iter()
                .map(|klass| (klass.name().to_string(), klass))
                .collect(),
            main_class: main_class.into(),
        }
    }

    /// Runs the main class's entry method to completion.
    pub fn run(&self) -> Result<Option<Value>> {
        let klass = self
            .classes
            .get(&self.main_class)
            .ok_or_else(|| VmError::ClassNotFound(self.main_class.clone()))?;
        let code = klass
            .entry_point()
            .ok_or_else(|| VmError::EntryPointNotFound(self.main_class.clone()))?;
        log::debug!("entering {}", self.main_class);
        self.call(klass, code, vec![])
    }

    /// Executes one code body in a fresh frame. Arguments land in the low
    /// local slots; static calls resolve in the class that owns the code
    /// being executed.
    fn call(&self, klass: &Klass, code: &CodeAttribute, args: Vec<Value>) -> Result<Option<Value>> {
        println!(
            "Executing {} instructions ({} args)",
            code.byte_code().len(),
            args.len()
        );
        let mut frame = Frame::new(code.max_locals());
        for (slot, value) in args.into_iter().enumerate() {
            frame.set_local(slot, value);
        }
        Executor {
            vm: self,
            klass,
            code: code.byte_code(),
            frame,
            pc: 0,
        }
        .run()
    }
}

/// State of one executing code body.
struct Executor<'a> {
    vm: &'a Interpreter,
    klass: &'a Klass,
    code: &'a [u8],
    frame: Frame,
    pc: usize,
}

impl Executor<'_> {
    fn run(mut self) -> Result<Option<Value>> {
        while self.pc < self.code.len() {
            let base = self.pc;
            let op = self.code[self.pc];
            println!("{base}: {op:x}");
            self.pc += 1;

            match op {
                inst::NOP | inst::BREAKPOINT => {}
                inst::ACONST_NULL => self.frame.push(Value::Null),
                op @ inst::ICONST_M1..=inst::ICONST_5 => {
                    self.frame.push(Value::Int(op as i32 - inst::ICONST_0 as i32));
                }
                op @ inst::LCONST_0..=inst::LCONST_1 => {
                    self.frame.push(Value::Long((op - inst::LCONST_0) as i64));
                }
                op @ inst::FCONST_0..=inst::FCONST_2 => {
                    self.frame.push(Value::Float((op - inst::FCONST_0) as f32));
                }
                op @ inst::DCONST_0..=inst::DCONST_1 => {
                    self.frame.push(Value::Double((op - inst::DCONST_0) as f64));
                }
                inst::BIPUSH => {
                    let value = self.get_u8_arg() as i8;
                    self.frame.push(Value::Int(value as i32));
                }
                inst::SIPUSH => {
                    let value = self.get_u16_arg() as i16;
                    self.frame.push(Value::Int(value as i32));
                }
                inst::LDC => {
                    let index = self.get_u8_arg();
                    let constant = self.klass.load_constant(index as u16)?;
                    self.frame.push(Value::Str(constant));
                }

                inst::ILOAD..=inst::ALOAD => {
                    let index = self.get_u8_arg() as usize;
                    let value = self.frame.local(index);
                    self.frame.push(value);
                }
                op @ inst::ILOAD_0..=inst::ALOAD_3 => {
                    let value = self.frame.local(((op - inst::ILOAD_0) % 4) as usize);
                    self.frame.push(value);
                }
                inst::ISTORE..=inst::ASTORE => {
                    let index = self.get_u8_arg() as usize;
                    let value = self.frame.pop();
                    self.frame.set_local(index, value);
                }
                op @ inst::ISTORE_0..=inst::ASTORE_3 => {
                    let value = self.frame.pop();
                    self.frame.set_local(((op - inst::ISTORE_0) % 4) as usize, value);
                }

                inst::IALOAD
                | inst::LALOAD
                | inst::FALOAD
                | inst::DALOAD
                | inst::AALOAD
                | inst::BALOAD
                | inst::SALOAD => {
                    let element = self.load_element()?;
                    self.frame.push(element);
                }
                inst::CALOAD => {
                    // Chars widen back to int on load.
                    let element = match self.load_element()? {
                        Value::Char(c) => c as i32,
                        other => other.int()?,
                    };
                    self.frame.push(Value::Int(element));
                }
                inst::IASTORE => {
                    let value = self.frame.pop().int()?;
                    self.store_element(Value::Int(value))?;
                }
                inst::LASTORE => {
                    let value = self.frame.pop().long()?;
                    self.store_element(Value::Long(value))?;
                }
                inst::FASTORE => {
                    let value = self.frame.pop().float()?;
                    self.store_element(Value::Float(value))?;
                }
                inst::DASTORE => {
                    let value = self.frame.pop().double()?;
                    self.store_element(Value::Double(value))?;
                }
                inst::AASTORE => {
                    let value = self.frame.pop();
                    self.store_element(value)?;
                }
                inst::BASTORE => {
                    let value = self.frame.pop().int()?;
                    self.store_element(Value::Int(value as i8 as i32))?;
                }
                inst::CASTORE => {
                    let value = self.frame.pop().int()?;
                    self.store_element(Value::Char(value as u16))?;
                }
                inst::SASTORE => {
                    let value = self.frame.pop().int()?;
                    self.store_element(Value::Int(value as i16 as i32))?;
                }

                inst::POP => {
                    self.frame.pop();
                }
                inst::POP2 => {
                    if !self.frame.pop().is_wide() {
                        self.frame.pop();
                    }
                }
                inst::DUP => {
                    let top = self.frame.pop();
                    self.frame.push(top.clone());
                    self.frame.push(top);
                }
                inst::DUP2 => {
                    let top = self.frame.pop();
                    if top.is_wide() {
                        self.frame.push(top.clone());
                        self.frame.push(top);
                    } else {
                        let under = self.frame.pop();
                        self.frame.push(under.clone());
                        self.frame.push(top.clone());
                        self.frame.push(under);
                        self.frame.push(top);
                    }
                }
                inst::SWAP => {
                    let top = self.frame.pop();
                    let under = self.frame.pop();
                    self.frame.push(top);
                    self.frame.push(under);
                }

                inst::IADD => self.int_math(|a, b| a.wrapping_add(b))?,
                inst::ISUB => self.int_math(|a, b| a.wrapping_sub(b))?,
                inst::IMUL => self.int_math(|a, b| a.wrapping_mul(b))?,
                // A zero divisor is a fatal arithmetic fault.
                inst::IDIV => self.int_math(|a, b| a / b)?,
                inst::IREM => self.int_math(|a, b| a % b)?,
                inst::IAND => self.int_math(|a, b| a & b)?,
                inst::IOR => self.int_math(|a, b| a | b)?,
                inst::IXOR => self.int_math(|a, b| a ^ b)?,
                inst::ISHL => self.int_math(|a, b| a << (b & 0x1f))?,
                inst::ISHR => self.int_math(|a, b| a >> (b & 0x1f))?,
                inst::INEG => {
                    let value = self.frame.pop().int()?;
                    self.frame.push(Value::Int(value.wrapping_neg()));
                }

                inst::LADD => self.long_math(|a, b| a.wrapping_add(b))?,
                inst::LSUB => self.long_math(|a, b| a.wrapping_sub(b))?,
                inst::LMUL => self.long_math(|a, b| a.wrapping_mul(b))?,
                inst::LDIV => self.long_math(|a, b| a / b)?,
                inst::LREM => self.long_math(|a, b| a % b)?,
                inst::LAND => self.long_math(|a, b| a & b)?,
                inst::LOR => self.long_math(|a, b| a | b)?,
                inst::LXOR => self.long_math(|a, b| a ^ b)?,
                inst::LSHL => {
                    let shift = self.frame.pop().int()?;
                    let value = self.frame.pop().long()?;
                    self.frame.push(Value::Long(value << (shift & 0x3f)));
                }
                inst::LSHR => {
                    let shift = self.frame.pop().int()?;
                    let value = self.frame.pop().long()?;
                    self.frame.push(Value::Long(value >> (shift & 0x3f)));
                }
                inst::LNEG => {
                    let value = self.frame.pop().long()?;
                    self.frame.push(Value::Long(value.wrapping_neg()));
                }

                inst::FADD => self.float_math(|a, b| a + b)?,
                inst::FSUB => self.float_math(|a, b| a - b)?,
                inst::FMUL => self.float_math(|a, b| a * b)?,
                inst::FDIV => self.float_math(|a, b| a / b)?,
                inst::FREM => self.float_math(|a, b| a % b)?,
                inst::FNEG => {
                    let value = self.frame.pop().float()?;
                    self.frame.push(Value::Float(-value));
                }

                inst::DADD => self.double_math(|a, b| a + b)?,
                inst::DSUB => self.double_math(|a, b| a - b)?,
                inst::DMUL => self.double_math(|a, b| a * b)?,
                inst::DDIV => self.double_math(|a, b| a / b)?,
                inst::DREM => self.double_math(|a, b| a % b)?,
                inst::DNEG => {
                    let value = self.frame.pop().double()?;
                    self.frame.push(Value::Double(-value));
                }

                inst::IINC => {
                    let index = self.get_u8_arg() as usize;
                    let delta = self.get_u8_arg() as i8 as i32;
                    let value = self.frame.local(index).int()?;
                    self.frame.set_local(index, Value::Int(value.wrapping_add(delta)));
                }

                inst::I2L => {
                    let v = self.frame.pop().int()?;
                    self.frame.push(Value::Long(v as i64));
                }
                inst::I2F => {
                    let v = self.frame.pop().int()?;
                    self.frame.push(Value::Float(v as f32));
                }
                inst::I2D => {
                    let v = self.frame.pop().int()?;
                    self.frame.push(Value::Double(v as f64));
                }
                inst::L2I => {
                    let v = self.frame.pop().long()?;
                    self.frame.push(Value::Int(v as i32));
                }
                inst::L2F => {
                    let v = self.frame.pop().long()?;
                    self.frame.push(Value::Float(v as f32));
                }
                inst::L2D => {
                    let v = self.frame.pop().long()?;
                    self.frame.push(Value::Double(v as f64));
                }
                inst::F2I => {
                    let v = self.frame.pop().float()?;
                    self.frame.push(Value::Int(v as i32));
                }
                inst::F2L => {
                    let v = self.frame.pop().float()?;
                    self.frame.push(Value::Long(v as i64));
                }
                inst::F2D => {
                    let v = self.frame.pop().float()?;
                    self.frame.push(Value::Double(v as f64));
                }
                inst::D2I => {
                    let v = self.frame.pop().double()?;
                    self.frame.push(Value::Int(v as i32));
                }
                inst::D2L => {
                    let v = self.frame.pop().double()?;
                    self.frame.push(Value::Long(v as i64));
                }
                inst::D2F => {
                    let v = self.frame.pop().double()?;
                    self.frame.push(Value::Float(v as f32));
                }
                inst::I2B => {
                    let v = self.frame.pop().int()?;
                    self.frame.push(Value::Int(v as i8 as i32));
                }
                inst::I2C => {
                    let v = self.frame.pop().int()?;
                    self.frame.push(Value::Int(v as u16 as i32));
                }
                inst::I2S => {
                    let v = self.frame.pop().int()?;
                    self.frame.push(Value::Int(v as i16 as i32));
                }

                op @ inst::IFEQ..=inst::IFLE => {
                    let value = self.frame.pop().int()?;
                    let taken = int_condition(op - inst::IFEQ, value, 0);
                    self.branch(base, taken);
                }
                op @ inst::IF_ICMPEQ..=inst::IF_ICMPLE => {
                    let b = self.frame.pop().int()?;
                    let a = self.frame.pop().int()?;
                    self.branch(base, int_condition(op - inst::IF_ICMPEQ, a, b));
                }
                inst::IFNULL => {
                    let is_null = matches!(self.frame.pop(), Value::Null);
                    self.branch(base, is_null);
                }
                inst::IFNONNULL => {
                    let is_null = matches!(self.frame.pop(), Value::Null);
                    self.branch(base, !is_null);
                }
                inst::GOTO => self.branch(base, true),
                inst::GOTO_W => {
                    // Unlike the narrow branches this is an absolute target.
                    let target = self.get_u32_arg();
                    self.pc = target as usize;
                }

                inst::IRETURN => return Ok(Some(Value::Int(self.frame.pop().int()?))),
                inst::LRETURN => return Ok(Some(Value::Long(self.frame.pop().long()?))),
                inst::FRETURN => return Ok(Some(Value::Float(self.frame.pop().float()?))),
                inst::DRETURN => return Ok(Some(Value::Double(self.frame.pop().double()?))),
                inst::ARETURN => return Ok(Some(self.frame.pop())),
                inst::RETURN => return Ok(None),

                inst::INVOKESTATIC => {
                    let index = self.get_u16_arg();
                    let (name_index, descriptor_index) = self.klass.resolve_low_high(index)?;
                    let (code, arg_count) = self.klass.invoke(name_index, descriptor_index)?;
                    // Arguments sit on the stack first-pushed lowest, so
                    // popping fills the slots back to front.
                    let mut args = vec![Value::Null; arg_count];
                    for slot in (0..arg_count).rev() {
                        args[slot] = self.frame.pop();
                    }
                    if let Some(value) = self.vm.call(self.klass, code, args)? {
                        self.frame.push(value);
                    }
                }

                inst::NEWARRAY => {
                    // The element-type operand is read but not enforced.
                    let _atype = self.get_u8_arg();
                    let length = self.frame.pop().int()?;
                    self.frame.push(Value::new_array(length as usize));
                }
                inst::ARRAYLENGTH => {
                    let array = self.frame.pop().array()?;
                    let length = array.lock().len();
                    self.frame.push(Value::Int(length as i32));
                }

                op => return Err(VmError::UnsupportedOpcode(op)),
            }
        }
        // Ran off the end of the code body without an explicit return.
        Ok(None)
    }

    fn get_u8_arg(&mut self) -> u8 {
        let value = self.code[self.pc];
        self.pc += 1;
        value
    }

    fn get_u16_arg(&mut self) -> u16 {
        let bytes = [self.code[self.pc], self.code[self.pc + 1]];
        self.pc += 2;
        u16::from_be_bytes(bytes)
    }

    fn get_u32_arg(&mut self) -> u32 {
        let bytes = [
            self.code[self.pc],
            self.code[self.pc + 1],
            self.code[self.pc + 2],
            self.code[self.pc + 3],
        ];
        self.pc += 4;
        u32::from_be_bytes(bytes)
    }

    /// Reads the branch displacement and, when taken, moves `pc` relative
    /// to the opcode's own index. A fall-through ends up 3 bytes along.
    fn branch(&mut self, base: usize, taken: bool) {
        let offset = self.get_u16_arg() as i16;
        if taken {
            self.pc = base.wrapping_add_signed(offset as isize);
        }
    }

    fn load_element(&mut self) -> Result<Value> {
        let index = self.frame.pop().int()?;
        let array = self.frame.pop().array()?;
        let element = array.lock()[index as usize].clone();
        Ok(element)
    }

    fn store_element(&mut self, value: Value) -> Result<()> {
        let index = self.frame.pop().int()?;
        let array = self.frame.pop().array()?;
        array.lock()[index as usize] = value;
        Ok(())
    }

    fn int_math(&mut self, f: impl FnOnce(i32, i32) -> i32) -> Result<()> {
        let b = self.frame.pop().int()?;
        let a = self.frame.pop().int()?;
        self.frame.push(Value::Int(f(a, b)));
        Ok(())
    }

    fn long_math(&mut self, f: impl FnOnce(i64, i64) -> i64) -> Result<()> {
        let b = self.frame.pop().long()?;
        let a = self.frame.pop().long()?;
        self.frame.push(Value::Long(f(a, b)));
        Ok(())
    }

    fn float_math(&mut self, f: impl FnOnce(f32, f32) -> f32) -> Result<()> {
        let b = self.frame.pop().float()?;
        let a = self.frame.pop().float()?;
        self.frame.push(Value::Float(f(a, b)));
        Ok(())
    }

    fn double_math(&mut self, f: impl FnOnce(f64, f64) -> f64) -> Result<()> {
        let b = self.frame.pop().double()?;
        let a = self.frame.pop().double()?;
        self.frame.push(Value::Double(f(a, b)));
        Ok(())
    }
}

/// Shared comparison table for `if<cond>` and `if_icmp<cond>`; `kind` is
/// the opcode's offset within its family (eq, ne, lt, ge, gt, le).
fn int_condition(kind: u8, a: i32, b: i32) -> bool {
    match kind {
        0 => a == b,
        1 => a != b,
        2 => a < b,
        3 => a >= b,
        4 => a > b,
        _ => a <= b,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        class::{Attribute, MemberRef, PoolEntry},
        consts::{CODE_ATTRIBUTE, ENTRY_POINT_DESCRIPTOR, MemberAccessFlag},
    };

    fn utf8(s: &str) -> PoolEntry {
        PoolEntry::Utf8(Arc::from(s))
    }

    fn entry(high: u16, low: u16) -> PoolEntry {
        PoolEntry::Entry { high, low }
    }

    fn code_attr(code: Vec<u8>) -> Attribute {
        Attribute {
            name: Arc::from(CODE_ATTRIBUTE),
            length: code.len() as u32 + 12,
            code: Some(CodeAttribute {
                max_stack: 8,
                max_locals: 8,
                code,
            }),
        }
    }

    fn method(flags: MemberAccessFlag, name_index: u16, descriptor_index: u16, code: Vec<u8>) -> MemberRef {
        MemberRef {
            access_flags: flags,
            name_index,
            descriptor_index,
            attributes: vec![code_attr(code)],
        }
    }

    /// Appends the entry method's name and descriptor to `pool` and builds
    /// the member record around `code`.
    fn main_method(pool: &mut Vec<PoolEntry>, code: Vec<u8>) -> MemberRef {
        pool.push(utf8("main"));
        let name_index = pool.len() as u16;
        pool.push(utf8(ENTRY_POINT_DESCRIPTOR));
        method(MemberAccessFlag::entry_point(), name_index, name_index + 1, code)
    }

    fn run_class(
        mut pool: Vec<PoolEntry>,
        mut methods: Vec<MemberRef>,
        main_code: Vec<u8>,
    ) -> Result<Option<Value>> {
        methods.push(main_method(&mut pool, main_code));
        let klass = Klass::new(Arc::from("Main"), pool, vec![], methods, vec![]);
        Interpreter::new(klass).run()
    }

    fn run_main(code: Vec<u8>) -> Result<Option<Value>> {
        run_class(vec![], vec![], code)
    }

    fn int_result(result: Result<Option<Value>>) -> i32 {
        match result.unwrap() {
            Some(Value::Int(v)) => v,
            other => panic!("expected an int result, got {other:?}"),
        }
    }

    #[test]
    fn iadd_pushes_the_sum() {
        // iconst_2, iconst_3, iadd, ireturn
        let result = run_main(vec![0x05, 0x06, 0x60, 0xac]);
        assert_eq!(int_result(result), 5);
    }

    #[test]
    fn int_arithmetic_wraps() {
        // iconst_1, bipush 31, ishl (-> i32::MIN), iconst_m1, iadd, ireturn
        let result = run_main(vec![0x04, 0x10, 0x1f, 0x78, 0x02, 0x60, 0xac]);
        assert_eq!(int_result(result), i32::MAX);
    }

    #[test]
    #[should_panic(expected = "divide by zero")]
    fn idiv_by_zero_is_fatal() {
        // iconst_1, iconst_0, idiv
        let _ = run_main(vec![0x04, 0x03, 0x6c, 0xac]);
    }

    #[test]
    fn conditional_branch_is_relative_to_the_opcode() {
        // 0: iconst_0
        // 1: ifeq +5        -> lands on index 6
        // 4: iconst_1
        // 5: ireturn
        // 6: iconst_2
        // 7: ireturn
        let taken = run_main(vec![0x03, 0x99, 0x00, 0x05, 0x04, 0xac, 0x05, 0xac]);
        assert_eq!(int_result(taken), 2);

        // Same body with a non-zero operand falls through 3 bytes.
        let fall_through = run_main(vec![0x04, 0x99, 0x00, 0x05, 0x04, 0xac, 0x05, 0xac]);
        assert_eq!(int_result(fall_through), 1);
    }

    #[test]
    fn backward_branch_loops() {
        // Sums 0..5 with if_icmplt: local 1 = i, local 2 = acc.
        // 0: iconst_0, 1: istore_1, 2: iconst_0, 3: istore_2
        // 4: iload_1, 5: iload_2, 6: iadd, 7: istore_2
        // 8: iinc 1 1
        // 11: iload_1, 12: iconst_5, 13: if_icmplt -9 (back to 4)
        // 16: iload_2, 17: ireturn
        let code = vec![
            0x03, 0x3c, 0x03, 0x3d, 0x1b, 0x1c, 0x60, 0x3d, 0x84, 0x01, 0x01, 0x1b, 0x08, 0xa1,
            0xff, 0xf7, 0x1c, 0xac,
        ];
        assert_eq!(int_result(run_main(code)), 10);
    }

    #[test]
    fn goto_w_is_an_absolute_target() {
        // 0: goto_w 8, 5: iconst_1, 6: ireturn, 7: nop, 8: iconst_2, 9: ireturn
        let code = vec![0xc8, 0x00, 0x00, 0x00, 0x08, 0x04, 0xac, 0x00, 0x05, 0xac];
        assert_eq!(int_result(run_main(code)), 2);
    }

    #[test]
    fn invokestatic_marshals_arguments_in_push_order() {
        // 3: methodref -> nt at 4; 4: nt -> ("sub", "(II)I")
        let pool = vec![
            utf8("unused"),
            utf8("unused"),
            entry(0, 4),
            entry(5, 6),
            utf8("sub"),
            utf8("(II)I"),
        ];
        // sub: iload_0, iload_1, isub, ireturn
        let sub = method(
            MemberAccessFlag::from_bits_retain(0x0008),
            5,
            6,
            vec![0x1a, 0x1b, 0x64, 0xac],
        );
        // main: bipush 10, bipush 32, invokestatic #3, ireturn
        let main_code = vec![0x10, 0x0a, 0x10, 0x20, 0xb8, 0x00, 0x03, 0xac];
        // First-pushed lands in slot 0, so this is 10 - 32.
        assert_eq!(int_result(run_class(pool, vec![sub], main_code)), -22);
    }

    #[test]
    fn static_sum_of_two_arguments_yields_42() {
        let pool = vec![entry(0, 2), entry(3, 4), utf8("add"), utf8("(II)I")];
        // add: iload_0, iload_1, iadd, ireturn
        let add = method(
            MemberAccessFlag::from_bits_retain(0x0008),
            3,
            4,
            vec![0x1a, 0x1b, 0x60, 0xac],
        );
        // main: bipush 10, bipush 32, invokestatic #1, ireturn
        let main_code = vec![0x10, 0x0a, 0x10, 0x20, 0xb8, 0x00, 0x01, 0xac];
        assert_eq!(int_result(run_class(pool, vec![add], main_code)), 42);
    }

    #[test]
    fn invokestatic_pushes_the_return_value() {
        let pool = vec![entry(0, 2), entry(3, 4), utf8("answer"), utf8("()I")];
        // answer: bipush 42, ireturn
        let answer = method(
            MemberAccessFlag::from_bits_retain(0x0008),
            3,
            4,
            vec![0x10, 0x2a, 0xac],
        );
        // main: invokestatic #1, ireturn
        let main_code = vec![0xb8, 0x00, 0x01, 0xac];
        assert_eq!(int_result(run_class(pool, vec![answer], main_code)), 42);
    }

    #[test]
    fn invokestatic_to_a_missing_method_fails() {
        let pool = vec![entry(0, 2), entry(3, 4), utf8("gone"), utf8("()V")];
        let result = run_class(pool, vec![], vec![0xb8, 0x00, 0x01, 0xb1]);
        assert!(matches!(result, Err(VmError::MethodNotFound { .. })));
    }

    #[test]
    fn dup_aliases_the_array_handle() {
        // iconst_1, newarray int, dup, astore_1,
        // iconst_0, bipush 7, iastore,
        // aload_1, iconst_0, iaload, ireturn
        let code = vec![
            0x04, 0xbc, 0x0a, 0x59, 0x4c, 0x03, 0x10, 0x07, 0x4f, 0x2b, 0x03, 0x2e, 0xac,
        ];
        assert_eq!(int_result(run_main(code)), 7);
    }

    #[test]
    fn arraylength_reads_the_allocation_size() {
        // iconst_3, newarray int, arraylength, ireturn
        let code = vec![0x06, 0xbc, 0x0a, 0xbe, 0xac];
        assert_eq!(int_result(run_main(code)), 3);
    }

    #[test]
    fn char_elements_round_trip_through_the_array() {
        // iconst_1, newarray char, dup, astore_1,
        // iconst_0, bipush 65, castore,
        // aload_1, iconst_0, caload, ireturn
        let code = vec![
            0x04, 0xbc, 0x05, 0x59, 0x4c, 0x03, 0x10, 0x41, 0x55, 0x2b, 0x03, 0x34, 0xac,
        ];
        assert_eq!(int_result(run_main(code)), 65);
    }

    #[test]
    fn ldc_pushes_the_string_constant() {
        // 1: string entry -> 2: Utf8
        let pool = vec![entry(2, 0), utf8("hi")];
        // ldc #1, areturn
        let result = run_class(pool, vec![], vec![0x12, 0x01, 0xb0]).unwrap();
        assert!(matches!(result, Some(Value::Str(ref s)) if s.as_ref() == "hi"));
    }

    #[test]
    fn narrowing_conversions_truncate() {
        // sipush 200, i2b, ireturn
        assert_eq!(int_result(run_main(vec![0x11, 0x00, 0xc8, 0x91, 0xac])), -56);
        // sipush -1, i2c, ireturn
        assert_eq!(
            int_result(run_main(vec![0x11, 0xff, 0xff, 0x92, 0xac])),
            0xffff
        );
    }

    #[test]
    fn long_shift_takes_an_int_count() {
        // lconst_1, iconst_3, lshl, lreturn
        let result = run_main(vec![0x0a, 0x06, 0x79, 0xad]).unwrap();
        assert!(matches!(result, Some(Value::Long(8))));
    }

    #[test]
    fn swap_reorders_the_top_two() {
        // iconst_1, iconst_2, swap, isub, ireturn  -> 2 - 1
        assert_eq!(int_result(run_main(vec![0x04, 0x05, 0x5f, 0x64, 0xac])), 1);
    }

    #[test]
    fn running_off_the_end_returns_nothing() {
        let result = run_main(vec![0x00]).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn unknown_opcodes_are_rejected() {
        let result = run_main(vec![0xfe]);
        assert!(matches!(result, Err(VmError::UnsupportedOpcode(0xfe))));
    }

    #[test]
    fn type_confusion_is_reported() {
        // iconst_1, arraylength
        let result = run_main(vec![0x04, 0xbe, 0xb1]);
        assert!(matches!(result, Err(VmError::TypeMismatch { .. })));
    }

    #[test]
    fn missing_main_class_is_reported() {
        let vm = Interpreter::with_main_class(vec![], "Missing");
        assert!(matches!(vm.run(), Err(VmError::ClassNotFound(ref name)) if name == "Missing"));
    }

    #[test]
    fn class_without_entry_method_is_reported() {
        let klass = Klass::new(Arc::from("NoMain"), vec![], vec![], vec![], vec![]);
        let vm = Interpreter::new(klass);
        assert!(matches!(
            vm.run(),
            Err(VmError::EntryPointNotFound(ref name)) if name == "NoMain"
        ));
    }
}
