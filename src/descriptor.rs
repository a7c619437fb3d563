//! Field and method descriptor grammar.
//!
//! Descriptors are the compact strings the class file uses to encode types,
//! e.g. `(IJD)V` for a method taking an int, a long and a double and
//! returning nothing.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_until,
    character::complete::{char, one_of},
    combinator::{eof, map},
    multi::many0,
    sequence::delimited,
};

use crate::error::{Result, VmError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor(pub(crate) FieldType);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub(crate) parameters: Vec<FieldType>,
    pub(crate) return_type: ReturnType,
}

pub type ReturnType = Option<FieldType>;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Object(String),
    Short,
    Boolean,
    Array(Box<FieldType>),
}

impl MethodDescriptor {
    /// Number of argument slots a caller must marshal for this method.
    ///
    /// Only primitive parameters count; object and array parameters
    /// contribute nothing. Reference arguments are never marshaled, so the
    /// entry-point signature takes zero slots.
    pub fn arg_slots(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| !matches!(p, FieldType::Object(_) | FieldType::Array(_)))
            .count()
    }
}

/// Parses a full method descriptor, failing with `MalformedClass` on any
/// deviation from the grammar.
pub fn parse_method_descriptor(input: &str) -> Result<MethodDescriptor> {
    method_descriptor(input)
        .map(|(_, descriptor)| descriptor)
        .map_err(|_| VmError::MalformedClass(format!("invalid method descriptor: {input}")))
}

pub fn parse_field_descriptor(input: &str) -> Result<FieldDescriptor> {
    let (rest, field_type) = field_type(input)
        .map_err(|_| VmError::MalformedClass(format!("invalid field descriptor: {input}")))?;
    eof::<_, nom::error::Error<&str>>(rest)
        .map_err(|_| VmError::MalformedClass(format!("invalid field descriptor: {input}")))?;
    Ok(FieldDescriptor(field_type))
}

fn method_descriptor(input: &str) -> IResult<&str, MethodDescriptor> {
    let (input, parameters) = delimited(char('('), many0(field_type), char(')')).parse(input)?;
    let (input, return_type) = return_type_descriptor(input)?;
    eof(input)?;
    Ok((
        input,
        MethodDescriptor {
            parameters,
            return_type,
        },
    ))
}

fn return_type_descriptor(input: &str) -> IResult<&str, ReturnType> {
    alt((map(field_type, Some), void_type)).parse(input)
}

fn field_type(input: &str) -> IResult<&str, FieldType> {
    alt((base_type, object_type, array_type)).parse(input)
}

fn base_type(input: &str) -> IResult<&str, FieldType> {
    let (input, ch) = one_of("BCDFIJSZ")(input)?;
    let field_type = match ch {
        'B' => FieldType::Byte,
        'C' => FieldType::Char,
        'D' => FieldType::Double,
        'F' => FieldType::Float,
        'I' => FieldType::Int,
        'J' => FieldType::Long,
        'S' => FieldType::Short,
        'Z' => FieldType::Boolean,
        _ => unreachable!(),
    };
    Ok((input, field_type))
}

fn object_type(input: &str) -> IResult<&str, FieldType> {
    let (input, _) = char('L')(input)?;
    let (input, class_name) = take_until(";")(input)?;
    let (input, _) = char(';')(input)?;
    Ok((input, FieldType::Object(class_name.to_string())))
}

fn array_type(input: &str) -> IResult<&str, FieldType> {
    let (input, _) = char('[')(input)?;
    let (input, field_type) = field_type(input)?;
    Ok((input, FieldType::Array(Box::new(field_type))))
}

fn void_type(input: &str) -> IResult<&str, Option<FieldType>> {
    let (input, _) = char('V')(input)?;
    Ok((input, None))
}
