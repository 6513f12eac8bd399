//! Line classification and the typed instruction set.
//!
//! Every source line is parsed once into a [`Line`]. Forms are recognised by
//! their mnemonic and operand shapes; anything else becomes
//! [`Line::Invalid`] and kills the contract when execution reaches it.

use crate::api::{ApiFunction, CallShape};
use std::fmt;

/// Binary operators of the `OP @a $b` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Bor,
    And,
    Xor,
    Mod,
    Shl,
    Shr,
}

impl ArithOp {
    fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Some(match mnemonic {
            "ADD" => ArithOp::Add,
            "SUB" => ArithOp::Sub,
            "MUL" => ArithOp::Mul,
            "DIV" => ArithOp::Div,
            "BOR" => ArithOp::Bor,
            "AND" => ArithOp::And,
            "XOR" => ArithOp::Xor,
            "MOD" => ArithOp::Mod,
            "SHL" => ArithOp::Shl,
            "SHR" => ArithOp::Shr,
            _ => return None,
        })
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            ArithOp::Add => "ADD",
            ArithOp::Sub => "SUB",
            ArithOp::Mul => "MUL",
            ArithOp::Div => "DIV",
            ArithOp::Bor => "BOR",
            ArithOp::And => "AND",
            ArithOp::Xor => "XOR",
            ArithOp::Mod => "MOD",
            ArithOp::Shl => "SHL",
            ArithOp::Shr => "SHR",
        }
    }
}

/// Two-operand branch conditions, compared as signed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl Comparison {
    fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Some(match mnemonic {
            "BGT" => Comparison::Gt,
            "BLT" => Comparison::Lt,
            "BGE" => Comparison::Ge,
            "BLE" => Comparison::Le,
            "BEQ" => Comparison::Eq,
            "BNE" => Comparison::Ne,
            _ => return None,
        })
    }

    pub fn holds(&self, left: i64, right: i64) -> bool {
        match self {
            Comparison::Gt => left > right,
            Comparison::Lt => left < right,
            Comparison::Ge => left >= right,
            Comparison::Le => left <= right,
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Comparison::Gt => "BGT",
            Comparison::Lt => "BLT",
            Comparison::Ge => "BGE",
            Comparison::Le => "BLE",
            Comparison::Eq => "BEQ",
            Comparison::Ne => "BNE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `SET @a #literal`
    SetValue { target: String, value: u64 },
    /// `SET @a $b`
    SetVar { target: String, source: String },
    Clear(String),
    Increment(String),
    Decrement(String),
    Not(String),
    Arith { op: ArithOp, target: String, source: String },
    /// `SET @a $($b)`
    LoadIndirect { target: String, pointer: String },
    /// `SET @a $($b + $c)`
    LoadIndexed { target: String, base: String, offset: String },
    /// `SET @($a) $b`
    StoreIndirect { pointer: String, source: String },
    /// `SET @($a + $b) $c`
    StoreIndexed { base: String, offset: String, source: String },
    Push(String),
    Pop(String),
    JumpSub(String),
    Return,
    Jump(String),
    SetErrorHandler(String),
    SetPcs,
    Nop,
    BranchZero { source: String, label: String },
    BranchNotZero { source: String, label: String },
    Branch { cond: Comparison, left: String, right: String, label: String },
    /// `MDV @a $b $c`: `a = a * b / c`
    MulDiv { target: String, multiplier: String, divisor: String },
    Sleep(Option<String>),
    FinishIfZero(String),
    StopIfZero(String),
    Finish,
    Stop,
    Call {
        function: ApiFunction,
        result: Option<String>,
        args: Vec<String>,
    },
}

/// Deploy-time directive lines (`^...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Comment,
    Declare(String),
    Const { target: String, value: u64 },
    Program { key: String, value: String },
    /// Known directive with the wrong operands
    Malformed,
    Unknown,
}

impl Instruction {
    /// Memory variables the instruction names, in operand order.
    pub fn cell_names(&self) -> Vec<&str> {
        let names: Vec<&String> = match self {
            Instruction::SetValue { target, .. }
            | Instruction::Clear(target)
            | Instruction::Increment(target)
            | Instruction::Decrement(target)
            | Instruction::Not(target)
            | Instruction::Push(target)
            | Instruction::Pop(target)
            | Instruction::FinishIfZero(target)
            | Instruction::StopIfZero(target)
            | Instruction::Sleep(Some(target))
            | Instruction::BranchZero { source: target, .. }
            | Instruction::BranchNotZero { source: target, .. } => vec![target],
            Instruction::SetVar { target, source } | Instruction::Arith { target, source, .. } => {
                vec![target, source]
            }
            Instruction::LoadIndirect { target, pointer } => vec![target, pointer],
            Instruction::StoreIndirect { pointer, source } => vec![pointer, source],
            Instruction::LoadIndexed {
                target,
                base,
                offset,
            } => vec![target, base, offset],
            Instruction::StoreIndexed {
                base,
                offset,
                source,
            } => vec![base, offset, source],
            Instruction::Branch { left, right, .. } => vec![left, right],
            Instruction::MulDiv {
                target,
                multiplier,
                divisor,
            } => vec![target, multiplier, divisor],
            Instruction::Call { result, args, .. } => result.iter().chain(args).collect(),
            Instruction::JumpSub(_)
            | Instruction::Return
            | Instruction::Jump(_)
            | Instruction::SetErrorHandler(_)
            | Instruction::SetPcs
            | Instruction::Nop
            | Instruction::Sleep(None)
            | Instruction::Finish
            | Instruction::Stop => Vec::new(),
        };
        names.into_iter().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Blank,
    Label(String),
    Directive(Directive),
    Code(Instruction),
    Invalid,
}

impl Line {
    /// Lines the interpreter stops on. Invalid lines count so that reaching
    /// one is a fault rather than being silently skipped.
    pub fn is_executable(&self) -> bool {
        matches!(self, Line::Code(_) | Line::Invalid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    /// `@name`
    Cell(String),
    /// `$name`
    Value(String),
    /// `@($a)` or `@($a + $b)`
    CellPtr(String, Option<String>),
    /// `$($a)` or `$($a + $b)`
    ValuePtr(String, Option<String>),
    /// `:label`
    Label(String),
    /// `#` followed by 16 hex digits
    Literal(u64),
}

pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Splits on whitespace, keeping parenthesised groups in one piece.
fn split_words(text: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.checked_sub(1)?;
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c if c.is_whitespace() => {}
            c => current.push(c),
        }
    }
    if depth != 0 {
        return None;
    }
    if !current.is_empty() {
        words.push(current);
    }
    Some(words)
}

fn value_name(text: &str) -> Option<String> {
    let name = text.strip_prefix('$')?;
    is_valid_name(name).then(|| name.to_string())
}

/// Parses the inside of `( $a )` or `( $a + $b )`, spaces already removed.
fn pointer_operand(inner: &str) -> Option<(String, Option<String>)> {
    match inner.split_once('+') {
        Some((base, offset)) => Some((value_name(base)?, Some(value_name(offset)?))),
        None => Some((value_name(inner)?, None)),
    }
}

fn parse_token(word: &str) -> Option<Token> {
    if let Some(rest) = word.strip_prefix('@') {
        if let Some(inner) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            let (base, offset) = pointer_operand(inner)?;
            return Some(Token::CellPtr(base, offset));
        }
        return is_valid_name(rest).then(|| Token::Cell(rest.to_string()));
    }
    if let Some(rest) = word.strip_prefix('$') {
        if let Some(inner) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            let (base, offset) = pointer_operand(inner)?;
            return Some(Token::ValuePtr(base, offset));
        }
        return is_valid_name(rest).then(|| Token::Value(rest.to_string()));
    }
    if let Some(rest) = word.strip_prefix(':') {
        return is_valid_name(rest).then(|| Token::Label(rest.to_string()));
    }
    if let Some(rest) = word.strip_prefix('#') {
        if rest.len() != 16 || !rest.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return u64::from_str_radix(rest, 16).ok().map(Token::Literal);
    }
    Some(Token::Word(word.to_string()))
}

fn tokenize(text: &str) -> Option<Vec<Token>> {
    split_words(text)?
        .iter()
        .map(|word| parse_token(word))
        .collect()
}

/// Classifies one source line.
pub fn parse_line(text: &str) -> Line {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    if let Some(directive) = trimmed.strip_prefix('^') {
        return Line::Directive(parse_directive(directive));
    }
    if let Some(label) = trimmed.strip_suffix(':') {
        if is_valid_name(label) {
            return Line::Label(label.to_string());
        }
        return Line::Invalid;
    }
    match tokenize(trimmed).and_then(|tokens| parse_instruction(&tokens)) {
        Some(instruction) => Line::Code(instruction),
        None => Line::Invalid,
    }
}

fn parse_directive(text: &str) -> Directive {
    let words: Vec<&str> = text.split_whitespace().collect();
    match words.as_slice() {
        ["comment", ..] => Directive::Comment,
        ["declare", name] if is_valid_name(name) => Directive::Declare(name.to_string()),
        ["declare", ..] => Directive::Malformed,
        ["const", rest @ ..] => match tokenize(&rest.join(" ")).as_deref() {
            Some([Token::Word(set), Token::Cell(target), Token::Literal(value)]) if set == "SET" => {
                Directive::Const {
                    target: target.clone(),
                    value: *value,
                }
            }
            _ => Directive::Malformed,
        },
        ["program", key, value @ ..] if !value.is_empty() => Directive::Program {
            key: key.to_string(),
            value: value.join(" "),
        },
        ["program", ..] => Directive::Malformed,
        _ => Directive::Unknown,
    }
}

fn parse_instruction(tokens: &[Token]) -> Option<Instruction> {
    use Token::*;

    let (Word(mnemonic), operands) = tokens.split_first()? else {
        return None;
    };
    let instruction = match (mnemonic.as_str(), operands) {
        ("SET", [Cell(a), Literal(v)]) => Instruction::SetValue {
            target: a.clone(),
            value: *v,
        },
        ("SET", [Cell(a), Value(b)]) => Instruction::SetVar {
            target: a.clone(),
            source: b.clone(),
        },
        ("SET", [Cell(a), ValuePtr(b, None)]) => Instruction::LoadIndirect {
            target: a.clone(),
            pointer: b.clone(),
        },
        ("SET", [Cell(a), ValuePtr(b, Some(c))]) => Instruction::LoadIndexed {
            target: a.clone(),
            base: b.clone(),
            offset: c.clone(),
        },
        ("SET", [CellPtr(a, None), Value(b)]) => Instruction::StoreIndirect {
            pointer: a.clone(),
            source: b.clone(),
        },
        ("SET", [CellPtr(a, Some(b)), Value(c)]) => Instruction::StoreIndexed {
            base: a.clone(),
            offset: b.clone(),
            source: c.clone(),
        },
        ("CLR", [Cell(a)]) => Instruction::Clear(a.clone()),
        ("INC", [Cell(a)]) => Instruction::Increment(a.clone()),
        ("DEC", [Cell(a)]) => Instruction::Decrement(a.clone()),
        ("NOT", [Cell(a)]) => Instruction::Not(a.clone()),
        ("PSH", [Value(a)]) => Instruction::Push(a.clone()),
        ("POP", [Cell(a)]) => Instruction::Pop(a.clone()),
        ("JSR", [Label(l)]) => Instruction::JumpSub(l.clone()),
        ("RET", []) => Instruction::Return,
        ("JMP", [Label(l)]) => Instruction::Jump(l.clone()),
        ("ERR", [Label(l)]) => Instruction::SetErrorHandler(l.clone()),
        ("PCS", []) => Instruction::SetPcs,
        ("NOP", []) => Instruction::Nop,
        ("BZR", [Value(a), Label(l)]) => Instruction::BranchZero {
            source: a.clone(),
            label: l.clone(),
        },
        ("BNZ", [Value(a), Label(l)]) => Instruction::BranchNotZero {
            source: a.clone(),
            label: l.clone(),
        },
        ("MDV", [Cell(a), Value(b), Value(c)]) => Instruction::MulDiv {
            target: a.clone(),
            multiplier: b.clone(),
            divisor: c.clone(),
        },
        ("SLP", []) => Instruction::Sleep(None),
        ("SLP", [Value(a)]) => Instruction::Sleep(Some(a.clone())),
        ("FIZ", [Value(a)]) => Instruction::FinishIfZero(a.clone()),
        ("STZ", [Value(a)]) => Instruction::StopIfZero(a.clone()),
        ("FIN", []) => Instruction::Finish,
        ("STP", []) => Instruction::Stop,
        ("FUN", operands) => return parse_call(operands),
        (other, [Cell(a), Value(b)]) => Instruction::Arith {
            op: ArithOp::from_mnemonic(other)?,
            target: a.clone(),
            source: b.clone(),
        },
        (other, [Value(a), Value(b), Label(l)]) => Instruction::Branch {
            cond: Comparison::from_mnemonic(other)?,
            left: a.clone(),
            right: b.clone(),
            label: l.clone(),
        },
        _ => return None,
    };
    Some(instruction)
}

fn parse_call(operands: &[Token]) -> Option<Instruction> {
    use Token::*;

    let (result, name, args): (Option<&String>, &String, &[Token]) = match operands {
        [Cell(r), Word(name), args @ ..] => (Some(r), name, args),
        [Word(name), args @ ..] => (None, name, args),
        _ => return None,
    };
    let args = args
        .iter()
        .map(|token| match token {
            Value(name) => Some(name.clone()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    let function = ApiFunction::from_name(name)?;
    let shape = match (result.is_some(), args.len()) {
        (false, 0) => CallShape::F0,
        (false, 1) => CallShape::F1,
        (false, 2) => CallShape::F2,
        (true, 0) => CallShape::R0,
        (true, 2) => CallShape::R2,
        _ => return None,
    };
    if function.shape() != shape {
        return None;
    }
    Some(Instruction::Call {
        function,
        result: result.cloned(),
        args,
    })
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::SetValue { target, value } => write!(f, "SET @{target} #{value:016x}"),
            Instruction::SetVar { target, source } => write!(f, "SET @{target} ${source}"),
            Instruction::Clear(a) => write!(f, "CLR @{a}"),
            Instruction::Increment(a) => write!(f, "INC @{a}"),
            Instruction::Decrement(a) => write!(f, "DEC @{a}"),
            Instruction::Not(a) => write!(f, "NOT @{a}"),
            Instruction::Arith { op, target, source } => {
                write!(f, "{} @{target} ${source}", op.mnemonic())
            }
            Instruction::LoadIndirect { target, pointer } => {
                write!(f, "SET @{target} $(${pointer})")
            }
            Instruction::LoadIndexed {
                target,
                base,
                offset,
            } => write!(f, "SET @{target} $(${base} + ${offset})"),
            Instruction::StoreIndirect { pointer, source } => {
                write!(f, "SET @(${pointer}) ${source}")
            }
            Instruction::StoreIndexed {
                base,
                offset,
                source,
            } => write!(f, "SET @(${base} + ${offset}) ${source}"),
            Instruction::Push(a) => write!(f, "PSH ${a}"),
            Instruction::Pop(a) => write!(f, "POP @{a}"),
            Instruction::JumpSub(l) => write!(f, "JSR :{l}"),
            Instruction::Return => write!(f, "RET"),
            Instruction::Jump(l) => write!(f, "JMP :{l}"),
            Instruction::SetErrorHandler(l) => write!(f, "ERR :{l}"),
            Instruction::SetPcs => write!(f, "PCS"),
            Instruction::Nop => write!(f, "NOP"),
            Instruction::BranchZero { source, label } => write!(f, "BZR ${source} :{label}"),
            Instruction::BranchNotZero { source, label } => write!(f, "BNZ ${source} :{label}"),
            Instruction::Branch {
                cond,
                left,
                right,
                label,
            } => write!(f, "{} ${left} ${right} :{label}", cond.mnemonic()),
            Instruction::MulDiv {
                target,
                multiplier,
                divisor,
            } => write!(f, "MDV @{target} ${multiplier} ${divisor}"),
            Instruction::Sleep(None) => write!(f, "SLP"),
            Instruction::Sleep(Some(a)) => write!(f, "SLP ${a}"),
            Instruction::FinishIfZero(a) => write!(f, "FIZ ${a}"),
            Instruction::StopIfZero(a) => write!(f, "STZ ${a}"),
            Instruction::Finish => write!(f, "FIN"),
            Instruction::Stop => write!(f, "STP"),
            Instruction::Call {
                function,
                result,
                args,
            } => {
                write!(f, "FUN ")?;
                if let Some(result) = result {
                    write!(f, "@{result} ")?;
                }
                write!(f, "{}", function.name())?;
                for arg in args {
                    write!(f, " ${arg}")?;
                }
                Ok(())
            }
        }
    }
}
