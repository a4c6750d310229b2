/// Recursive descent parser for Stoat
///
/// Parsing runs in two passes over the token stream. The first registers
/// every structure, constant, memory and function signature and skips
/// bodies, so functions can be called before they are defined. The second
/// builds function bodies and the top-level program.
use crate::ast::instruction::{Access, BinaryOp, Op};
use crate::ast::pins::PinnedItem;
use crate::ast::types::{PrimitiveKind, Structure, Typing};
use crate::ast::{Arms, Branching, Builder, Function, FunctionCall, Loop, Node, Program, SourceLoc};
use crate::codegen::DataSection;
use crate::config::CompilerConfig;
use crate::error::{ErrorKind, Result};
use crate::parser::lexer::{Keyword, Lexer, Token, TokenKind};
use crate::parser::scope::{Definition, FunctionSignature, Scope, is_reserved};
use crate::typechecker::Contract;
use std::rc::Rc;

/// A function found by the first pass
#[derive(Debug, Clone)]
struct FunctionDecl {
    name: String,
    signature: FunctionSignature,
    location: SourceLoc,
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    scope: Scope,
    builder: Builder,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self> {
        Self::new_with_filename(input, "<input>")
    }

    pub fn new_with_filename(input: &str, filename: &str) -> Result<Self> {
        Self::with_config(input, filename, &CompilerConfig::default())
    }

    pub fn with_config(input: &str, filename: &str, config: &CompilerConfig) -> Result<Self> {
        let tokens = Lexer::new(input, filename).tokenize()?;
        Ok(Parser {
            tokens,
            current: 0,
            scope: Scope::new(),
            builder: Builder::new(config),
        })
    }

    /// Build the program tree and its data tables
    pub fn parse(mut self) -> Result<(Program, DataSection)> {
        let declarations = self.collect_definitions()?;
        tracing::debug!(functions = declarations.len(), "collected definitions");

        self.current = 0;
        let location = self.peek().location.clone();
        let mut functions = Vec::with_capacity(declarations.len());
        let mut body = Vec::new();

        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Keyword(Keyword::Colon) => {
                    let decl = declarations.get(functions.len()).ok_or_else(|| {
                        ErrorKind::malformed("function definition was not registered").at(&self.peek().location)
                    })?;
                    functions.push(self.parse_function(decl)?);
                }
                TokenKind::Keyword(Keyword::Struct | Keyword::Const | Keyword::Memory) => {
                    self.skip_definition();
                }
                // A bare `;` terminates top-level code
                TokenKind::Keyword(Keyword::Semicolon) => {
                    self.advance();
                }
                _ => self.parse_statement(&mut body)?,
            }
        }

        let main = Function {
            label: "_start".to_string(),
            name: "main".to_string(),
            contract: Contract::empty(),
            named_inputs: false,
            body,
            pinned_slots: 0..0,
            location,
        };
        Ok((Program { functions, main }, self.builder.finish()))
    }

    // First pass

    fn collect_definitions(&mut self) -> Result<Vec<FunctionDecl>> {
        let mut functions = Vec::new();

        while !self.is_at_end() {
            let token = self.advance().clone();
            match token.kind {
                TokenKind::Keyword(Keyword::Struct) => self.define_struct(&token.location)?,
                TokenKind::Keyword(Keyword::Const) => self.define_const(&token.location)?,
                TokenKind::Keyword(Keyword::Memory) => self.define_memory(&token.location)?,
                TokenKind::Keyword(Keyword::Colon) => {
                    let decl = self.declare_function(functions.len(), &token.location)?;
                    functions.push(decl);
                }
                _ => {}
            }
        }

        Ok(functions)
    }

    /// `struct Name field:Type ... ;`
    fn define_struct(&mut self, opener: &SourceLoc) -> Result<()> {
        let name = self.expect_word("expected a structure name after `struct`")?;
        let mut fields: Vec<(String, PrimitiveKind)> = Vec::new();

        for token in self.collect_until_semicolon(opener, "`struct`")? {
            let (field, type_name) = match (&token.kind, token.lexeme.split_once(':')) {
                (TokenKind::Word, Some((field, type_name))) if !field.is_empty() => (field, type_name),
                _ => {
                    return Err(ErrorKind::malformed(format!("expected `field:Type` in `{}`, found `{}`", name.lexeme, token.lexeme))
                        .at(&token.location));
                }
            };
            let typing = self.scope.resolve_typing(type_name, &token.location)?;
            let kind = typing.kind().ok_or_else(|| {
                ErrorKind::malformed(format!("field `{}` must be a single word, found {}", field, typing)).at(&token.location)
            })?;
            if fields.iter().any(|(existing, _)| existing == field) {
                return Err(ErrorKind::malformed(format!("field `{}` appears twice in `{}`", field, name.lexeme)).at(&token.location));
            }
            fields.push((field.to_string(), kind));
        }

        if fields.is_empty() {
            return Err(ErrorKind::malformed(format!("`{}` needs at least one field", name.lexeme)).at(&name.location));
        }

        let layout: Vec<(&str, PrimitiveKind)> = fields.iter().map(|(f, k)| (f.as_str(), *k)).collect();
        let structure = Rc::new(Structure::new(name.lexeme.as_str(), &layout));
        self.scope.define(&name.lexeme, Definition::Struct(structure), &name.location)
    }

    /// `const NAME expr ;`
    fn define_const(&mut self, opener: &SourceLoc) -> Result<()> {
        let name = self.expect_word("expected a constant name after `const`")?;
        let tokens = self.collect_until_semicolon(opener, "`const`")?;
        let value = self.const_eval(&tokens, &name)?;
        self.scope.define(&name.lexeme, Definition::Const(value), &name.location)
    }

    /// `memory name size ;`, or `memory name Struct ;` for a typed region
    fn define_memory(&mut self, opener: &SourceLoc) -> Result<()> {
        let name = self.expect_word("expected a memory name after `memory`")?;
        let tokens = self.collect_until_semicolon(opener, "`memory`")?;

        let (typing, size) = match tokens.as_slice() {
            [only] if only.kind == TokenKind::Word && self.scope.structure(&only.lexeme).is_some() => {
                let typing = self.scope.resolve_typing(&only.lexeme, &only.location)?;
                let size = typing.size();
                (Typing::pointer_to(typing), size)
            }
            _ => {
                let size = self.const_eval(&tokens, &name)?;
                let size = usize::try_from(size).map_err(|_| {
                    ErrorKind::malformed(format!("memory `{}` has negative size {}", name.lexeme, size)).at(&name.location)
                })?;
                (Typing::POINTER, size)
            }
        };

        let label = self.builder.add_memory(&name.lexeme, size);
        self.scope
            .define(&name.lexeme, Definition::Memory { label, typing }, &name.location)
    }

    /// `: name ( inputs -- outputs )`, then skip the body
    fn declare_function(&mut self, id: usize, opener: &SourceLoc) -> Result<FunctionDecl> {
        let name = self.expect_word("expected a function name after `:`")?;
        self.expect_keyword(
            Keyword::LeftParen,
            &format!("expected `(` to open the signature of `{}`", name.lexeme),
        )?;

        let mut named = Vec::new();
        let mut anonymous = Vec::new();
        loop {
            let token = self.advance().clone();
            match token.kind {
                TokenKind::Keyword(Keyword::Dashes) => break,
                TokenKind::Word => match token.lexeme.split_once(':') {
                    Some((param, type_name)) => {
                        self.check_binding_name(param, &token.location)?;
                        let typing = self.scope.resolve_typing(type_name, &token.location)?;
                        named.push((param.to_string(), typing));
                    }
                    None => anonymous.push(self.scope.resolve_typing(&token.lexeme, &token.location)?),
                },
                _ => {
                    return Err(ErrorKind::malformed(format!(
                        "expected an input type or `--` in the signature of `{}`, found `{}`",
                        name.lexeme, token.lexeme
                    ))
                    .at(&token.location));
                }
            }
        }

        let mut outputs = Vec::new();
        loop {
            let token = self.advance().clone();
            match token.kind {
                TokenKind::Keyword(Keyword::RightParen) => break,
                TokenKind::Word => outputs.push(self.scope.resolve_typing(&token.lexeme, &token.location)?),
                _ => {
                    return Err(ErrorKind::malformed(format!(
                        "expected an output type or `)` in the signature of `{}`, found `{}`",
                        name.lexeme, token.lexeme
                    ))
                    .at(&token.location));
                }
            }
        }

        let (inputs, params) = match (named.is_empty(), anonymous.is_empty()) {
            (true, _) => (anonymous, None),
            (false, true) => (named.iter().map(|(_, t)| t.clone()).collect(), Some(named)),
            (false, false) => {
                return Err(ErrorKind::malformed(format!(
                    "signature of `{}` mixes named and anonymous inputs",
                    name.lexeme
                ))
                .at(&name.location));
            }
        };

        self.skip_block(opener, &format!("definition of `{}`", name.lexeme))?;

        let signature = FunctionSignature {
            id,
            label: format!("fn_{}", id),
            contract: Contract::new(inputs, outputs),
            params,
        };
        self.scope
            .define(&name.lexeme, Definition::Function(signature.clone()), &name.location)?;
        Ok(FunctionDecl {
            name: name.lexeme,
            signature,
            location: name.location,
        })
    }

    /// Skip to the `;` closing the block opened at `opener`, honoring nesting
    fn skip_block(&mut self, opener: &SourceLoc, what: &str) -> Result<()> {
        let mut depth = 1usize;
        loop {
            let token = self.advance().clone();
            match token.kind {
                TokenKind::Keyword(Keyword::If | Keyword::Loop | Keyword::Bind) => depth += 1,
                TokenKind::Keyword(Keyword::Semicolon) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                TokenKind::Eof => return Err(unterminated(what, &[Keyword::Semicolon], opener)),
                _ => {}
            }
        }
    }

    fn collect_until_semicolon(&mut self, opener: &SourceLoc, what: &str) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.advance().clone();
            match token.kind {
                TokenKind::Keyword(Keyword::Semicolon) => return Ok(tokens),
                TokenKind::Eof => return Err(unterminated(what, &[Keyword::Semicolon], opener)),
                _ => tokens.push(token),
            }
        }
    }

    /// Evaluate a postfix constant expression
    fn const_eval(&self, tokens: &[Token], name: &Token) -> Result<i64> {
        let mut stack: Vec<i64> = Vec::new();

        for token in tokens {
            match &token.kind {
                TokenKind::Int(value) => stack.push(*value),
                TokenKind::Word => {
                    if let Some(op) = BinaryOp::from_symbol(&token.lexeme) {
                        let available = stack.len();
                        let (Some(b), Some(a)) = (stack.pop(), stack.pop()) else {
                            return Err(ErrorKind::StackUnderflow {
                                op: token.lexeme.clone(),
                                required: 2,
                                available,
                            }
                            .at(&token.location));
                        };
                        let value = fold(op, a, b).ok_or_else(|| {
                            ErrorKind::malformed(format!("`{} {} {}` overflows or divides by zero", a, b, token.lexeme))
                                .at(&token.location)
                        })?;
                        stack.push(value);
                        continue;
                    }
                    match self.scope.get(&token.lexeme) {
                        Some(Definition::Const(value)) => stack.push(*value),
                        Some(Definition::Struct(structure)) => stack.push(structure.size() as i64),
                        _ => {
                            return Err(ErrorKind::UnresolvedIdentifier {
                                name: token.lexeme.clone(),
                            }
                            .at(&token.location));
                        }
                    }
                }
                _ => {
                    return Err(ErrorKind::malformed(format!(
                        "`{}` is not allowed in a constant expression",
                        token.lexeme
                    ))
                    .at(&token.location));
                }
            }
        }

        match stack.as_slice() {
            [value] => Ok(*value),
            _ => Err(ErrorKind::malformed(format!(
                "`{}` must evaluate to exactly one value, found {}",
                name.lexeme,
                stack.len()
            ))
            .at(&name.location)),
        }
    }

    // Second pass

    fn skip_definition(&mut self) {
        while !self.is_at_end() {
            if self.advance().kind == TokenKind::Keyword(Keyword::Semicolon) {
                break;
            }
        }
    }

    fn parse_function(&mut self, decl: &FunctionDecl) -> Result<Function> {
        let opener = self.advance().location.clone();
        while !self.is_at_end() {
            if self.advance().kind == TokenKind::Keyword(Keyword::RightParen) {
                break;
            }
        }

        let first_slot = self.builder.next_slot();
        let mut pins = Vec::new();
        if let Some(params) = &decl.signature.params {
            for (name, typing) in params {
                pins.push(self.builder.pin(name, typing.clone(), &decl.location)?);
            }
        }

        let mut body: Vec<Node> = pins
            .iter()
            .rev()
            .map(|item| Node::instruction(Op::Pin(item.clone()), &decl.location))
            .collect();
        let (statements, _) = self.parse_block(&[Keyword::Semicolon], &format!("definition of `{}`", decl.name), &opener)?;
        body.extend(statements);
        self.release_pins(&pins, &mut body, &decl.location);

        tracing::debug!(function = %decl.name, contract = %decl.signature.contract, "parsed function");
        Ok(Function {
            label: decl.signature.label.clone(),
            name: decl.name.clone(),
            contract: decl.signature.contract.clone(),
            named_inputs: decl.signature.params.is_some(),
            body,
            pinned_slots: first_slot..self.builder.next_slot(),
            location: decl.location.clone(),
        })
    }

    /// Emit Unpins for `pins`, innermost last, and end their scopes
    fn release_pins(&mut self, pins: &[PinnedItem], body: &mut Vec<Node>, location: &SourceLoc) {
        for item in pins {
            body.push(Node::instruction(Op::Unpin(item.clone()), location));
        }
        for item in pins.iter().rev() {
            self.builder.unpin(&item.name);
        }
    }

    /// Parse statements up to one of `terminators`, which is consumed and returned
    fn parse_block(&mut self, terminators: &[Keyword], what: &str, opener: &SourceLoc) -> Result<(Vec<Node>, Keyword)> {
        let mut nodes = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Keyword(keyword) if terminators.contains(&keyword) => {
                    self.advance();
                    return Ok((nodes, keyword));
                }
                TokenKind::Eof => return Err(unterminated(what, terminators, opener)),
                _ => self.parse_statement(&mut nodes)?,
            }
        }
    }

    fn parse_statement(&mut self, out: &mut Vec<Node>) -> Result<()> {
        let token = self.advance().clone();
        let location = &token.location;

        let node = match token.kind {
            TokenKind::Int(value) => Node::instruction(Op::PushNumber(value), location),
            TokenKind::Str(bytes) => {
                let len = bytes.len();
                let label = self.builder.add_string(bytes);
                Node::instruction(Op::PushStr { label, len }, location)
            }
            TokenKind::CStr(bytes) => {
                let label = self.builder.add_cstring(bytes);
                Node::instruction(Op::PushCStr { label }, location)
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if(location)?,
            TokenKind::Keyword(Keyword::Loop) => self.parse_loop(location)?,
            TokenKind::Keyword(Keyword::Bind) => return self.parse_bind(location, out),
            TokenKind::Keyword(keyword) => {
                return Err(ErrorKind::malformed(format!("unexpected `{}`", keyword)).at(location));
            }
            TokenKind::Word => self.resolve_word(&token.lexeme, location)?,
            TokenKind::Eof => return Err(ErrorKind::malformed("unexpected end of input").at(location)),
        };

        out.push(node);
        Ok(())
    }

    /// `if <yes> ;`, `if <yes> else <no> ;` or `if else <no> ;`
    fn parse_if(&mut self, location: &SourceLoc) -> Result<Node> {
        let label = self.builder.next_label();
        let (yes, terminator) = self.parse_block(&[Keyword::Else, Keyword::Semicolon], "`if`", location)?;

        let arms = if terminator == Keyword::Else {
            let (no, _) = self.parse_block(&[Keyword::Semicolon], "`else`", location)?;
            if yes.is_empty() {
                Arms::No(no)
            } else {
                Arms::Both(yes, no)
            }
        } else {
            Arms::Yes(yes)
        };

        Ok(Node::Branching(Branching {
            arms,
            label,
            location: location.clone(),
        }))
    }

    /// `loop i[:Type] <condition> do <body> ;`
    fn parse_loop(&mut self, location: &SourceLoc) -> Result<Node> {
        let token = self.expect_word("expected an iterator name after `loop`")?;
        let (name, typing) = self.parse_binding(&token, Typing::NUMBER)?;
        let iterator = self.builder.pin(&name, typing, &token.location)?;
        let label = self.builder.next_label();

        let (condition, _) = self.parse_block(&[Keyword::Do], "`loop` condition", location)?;
        let (body, _) = self.parse_block(&[Keyword::Semicolon], "`loop`", location)?;
        self.builder.unpin(&name);

        Ok(Node::Loop(Loop {
            iterator,
            condition,
            body,
            label,
            location: location.clone(),
        }))
    }

    /// `bind a b:Type in <body> ;`, with `b` taken from the top of the stack
    fn parse_bind(&mut self, location: &SourceLoc, out: &mut Vec<Node>) -> Result<()> {
        let mut pins = Vec::new();
        loop {
            let token = self.advance().clone();
            match token.kind {
                TokenKind::Keyword(Keyword::In) => break,
                TokenKind::Word => {
                    let (name, typing) = self.parse_binding(&token, Typing::RUNTIME)?;
                    pins.push(self.builder.pin(&name, typing, &token.location)?);
                }
                TokenKind::Eof => return Err(unterminated("`bind`", &[Keyword::In], location)),
                _ => {
                    return Err(ErrorKind::malformed(format!("expected a name or `in` in `bind`, found `{}`", token.lexeme))
                        .at(&token.location));
                }
            }
        }
        if pins.is_empty() {
            return Err(ErrorKind::malformed("`bind` needs at least one name").at(location));
        }

        for item in pins.iter().rev() {
            out.push(Node::instruction(Op::Pin(item.clone()), location));
        }
        let (body, _) = self.parse_block(&[Keyword::Semicolon], "`bind`", location)?;
        out.extend(body);
        self.release_pins(&pins, out, location);
        Ok(())
    }

    /// `name` or `name:Type`
    fn parse_binding(&self, token: &Token, default: Typing) -> Result<(String, Typing)> {
        let (name, typing) = match token.lexeme.split_once(':') {
            Some((name, type_name)) => (name, self.scope.resolve_typing(type_name, &token.location)?),
            None => (token.lexeme.as_str(), default),
        };
        self.check_binding_name(name, &token.location)?;
        Ok((name.to_string(), typing))
    }

    fn check_binding_name(&self, name: &str, location: &SourceLoc) -> Result<()> {
        if name.is_empty() || name.contains('.') || name.ends_with('!') || name.ends_with('@') {
            return Err(ErrorKind::malformed(format!("`{}` is not a valid pin name", name)).at(location));
        }
        if is_reserved(name) {
            return Err(ErrorKind::malformed(format!("`{}` is a builtin and cannot be pinned", name)).at(location));
        }
        Ok(())
    }

    /// Resolve a word: pins, builtins, structure operations, then global definitions
    fn resolve_word(&self, word: &str, location: &SourceLoc) -> Result<Node> {
        if let Some(item) = self.builder.lookup(word) {
            return Ok(Node::instruction(Op::PushPinned(item.clone()), location));
        }
        if let Some(item) = word.strip_suffix('!').and_then(|name| self.builder.lookup(name)) {
            return Ok(Node::instruction(Op::UpdatePinned(item.clone()), location));
        }

        if let Some(op) = Op::builtin(word) {
            return Ok(Node::instruction(op, location));
        }

        if let Some(structure) = word.strip_suffix('@').and_then(|name| self.scope.structure(name)) {
            return Ok(Node::instruction(Op::Load(Access::Struct(structure.clone())), location));
        }
        if let Some(structure) = word.strip_suffix('!').and_then(|name| self.scope.structure(name)) {
            return Ok(Node::instruction(Op::Store(Access::Struct(structure.clone())), location));
        }
        if let Some((struct_name, field_name)) = word.split_once('.') {
            if let Some(structure) = self.scope.structure(struct_name) {
                let field = structure.field(field_name).cloned().ok_or_else(|| {
                    ErrorKind::UnresolvedIdentifier {
                        name: word.to_string(),
                    }
                    .at(location)
                })?;
                return Ok(Node::instruction(
                    Op::FieldOffset {
                        structure: structure.clone(),
                        field,
                    },
                    location,
                ));
            }
        }

        match self.scope.get(word) {
            Some(Definition::Function(signature)) => Ok(Node::Function(FunctionCall {
                label: signature.label.clone(),
                name: word.to_string(),
                contract: signature.contract.clone(),
                location: location.clone(),
            })),
            Some(Definition::Const(value)) => Ok(Node::instruction(Op::PushNumber(*value), location)),
            Some(Definition::Memory { label, typing }) => Ok(Node::instruction(
                Op::PushMemory {
                    label: label.clone(),
                    typing: typing.clone(),
                },
                location,
            )),
            Some(Definition::Struct(_)) => Err(ErrorKind::malformed(format!(
                "`{0}` is a structure; use `{0}@`, `{0}!` or `{0}.field`",
                word
            ))
            .at(location)),
            None => Err(ErrorKind::UnresolvedIdentifier {
                name: word.to_string(),
            }
            .at(location)),
        }
    }

    // Helper methods

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
            return &self.tokens[self.current - 1];
        }
        self.peek()
    }

    fn expect_word(&mut self, message: &str) -> Result<Token> {
        if self.peek().kind == TokenKind::Word {
            Ok(self.advance().clone())
        } else {
            Err(ErrorKind::malformed(message).at(&self.peek().location))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword, message: &str) -> Result<()> {
        if self.peek().kind == TokenKind::Keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(ErrorKind::malformed(message).at(&self.peek().location))
        }
    }
}

fn unterminated(what: &str, expected: &[Keyword], opener: &SourceLoc) -> crate::error::Error {
    let expected: Vec<String> = expected.iter().map(|k| format!("`{}`", k)).collect();
    ErrorKind::malformed(format!("unterminated {}: expected {}", what, expected.join(" or "))).at(opener)
}

fn fold(op: BinaryOp, a: i64, b: i64) -> Option<i64> {
    let shift = || u32::try_from(b).ok();
    match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Mod => a.checked_rem(b),
        BinaryOp::And => Some(a & b),
        BinaryOp::Or => Some(a | b),
        BinaryOp::Xor => Some(a ^ b),
        BinaryOp::Shl => a.checked_shl(shift()?),
        BinaryOp::Shr => a.checked_shr(shift()?),
        BinaryOp::Eq => Some(i64::from(a == b)),
        BinaryOp::Ne => Some(i64::from(a != b)),
        BinaryOp::Lt => Some(i64::from(a < b)),
        BinaryOp::Gt => Some(i64::from(a > b)),
        BinaryOp::Le => Some(i64::from(a <= b)),
        BinaryOp::Ge => Some(i64::from(a >= b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<(Program, DataSection)> {
        Parser::new_with_filename(input, "test.stoat")?.parse()
    }

    fn ops(nodes: &[Node]) -> Vec<Op> {
        nodes
            .iter()
            .filter_map(|node| match node {
                Node::Instruction(instruction) => Some(instruction.op.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_top_level() {
        let (program, _) = parse("1 2 + print ;").unwrap();
        assert!(program.functions.is_empty());
        assert_eq!(
            ops(&program.main.body),
            vec![
                Op::PushNumber(1),
                Op::PushNumber(2),
                Op::Binary(BinaryOp::Add),
                Op::Print
            ]
        );
    }

    #[test]
    fn test_parse_simple_function() {
        let input = ": square ( Number -- Number ) dup * ;";
        let (program, _) = parse(input).unwrap();

        assert_eq!(program.functions.len(), 1);
        let square = &program.functions[0];
        assert_eq!(square.name, "square");
        assert_eq!(square.label, "fn_0");
        assert_eq!(square.body.len(), 2);
        assert!(!square.named_inputs);
        assert_eq!(square.contract.to_string(), "( Number -- Number )");
    }

    #[test]
    fn test_forward_reference_and_recursion() {
        let input = "5 countdown ;\n: countdown ( Number -- ) dup print dup if 1 - countdown else drop ; ;";
        let (program, _) = parse(input).unwrap();
        match &program.main.body[1] {
            Node::Function(call) => assert_eq!(call.label, "fn_0"),
            other => panic!("Expected a call, got {:?}", other),
        }
    }

    #[test]
    fn test_named_inputs_pin_top_first() {
        let (program, _) = parse(": sub2 ( a:Number b:Number -- Number ) a b - ;").unwrap();
        let body = ops(&program.functions[0].body);
        let names: Vec<String> = body.iter().map(Op::name).collect();
        assert_eq!(
            names,
            ["pin b", "pin a", "a", "b", "-", "unpin a", "unpin b"]
        );
        assert_eq!(program.functions[0].pinned_slots, 0..2);
    }

    #[test]
    fn test_mixed_signature_is_rejected() {
        let err = parse(": f ( a:Number Number -- ) ;").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedSyntax { .. }));
    }

    #[test]
    fn test_bind_shadowing() {
        let (program, _) = parse("1 bind x in 2 bind x in x print ; x print ;").unwrap();
        let pushed: Vec<usize> = ops(&program.main.body)
            .into_iter()
            .filter_map(|op| match op {
                Op::PushPinned(item) => Some(item.slot),
                _ => None,
            })
            .collect();
        assert_eq!(pushed, vec![1, 0]);
    }

    #[test]
    fn test_pin_update() {
        let (program, _) = parse("1 bind x in x 1 + x! x print ;").unwrap();
        assert!(
            ops(&program.main.body)
                .iter()
                .any(|op| matches!(op, Op::UpdatePinned(item) if item.name == "x"))
        );
    }

    #[test]
    fn test_struct_words() {
        let input = "struct Point x:Number y:Number ;\nmemory origin Point ;\norigin Point@ origin Point.y @ + + print ;";
        let (program, data) = parse(input).unwrap();
        let body = ops(&program.main.body);
        assert!(matches!(&body[0], Op::PushMemory { typing, .. } if typing.to_string() == "*Point"));
        assert!(matches!(&body[1], Op::Load(Access::Struct(s)) if s.name == "Point"));
        assert!(matches!(&body[3], Op::FieldOffset { field, .. } if field.offset == 8));
        assert_eq!(data.memories()[0].size, 16);
    }

    #[test]
    fn test_constants_fold() {
        let input = "struct Pair a:Number b:Pointer ;\nconst N 4 ;\nconst BYTES N Pair * 1 + ;\nmemory buf BYTES ;\nBYTES print ;";
        let (program, data) = parse(input).unwrap();
        assert_eq!(ops(&program.main.body)[0], Op::PushNumber(65));
        assert_eq!(data.memories()[0].size, 65);
    }

    #[test]
    fn test_constant_must_be_single_value() {
        let err = parse("const X 1 2 ;").unwrap_err();
        assert_eq!(err.location, SourceLoc::new(1, 7, "test.stoat"));
        assert!(matches!(err.kind, ErrorKind::MalformedSyntax { .. }));
    }

    #[test]
    fn test_missing_semicolon_points_at_opener() {
        let err = parse("1\n  if 2 print").unwrap_err();
        assert_eq!(err.location, SourceLoc::new(2, 3, "test.stoat"));
        match err.kind {
            ErrorKind::MalformedSyntax { message } => assert!(message.contains("`if`")),
            other => panic!("Expected MalformedSyntax, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_identifier() {
        let err = parse("1 frobnicate").unwrap_err();
        assert_eq!(err.location, SourceLoc::new(1, 3, "test.stoat"));
        assert_eq!(
            err.kind,
            ErrorKind::UnresolvedIdentifier {
                name: "frobnicate".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_function() {
        let err = parse(": f ( -- ) ;\n: f ( -- ) ;").unwrap_err();
        assert_eq!(err.location, SourceLoc::new(2, 3, "test.stoat"));
        assert!(matches!(
            err.kind,
            ErrorKind::DuplicateDefinition { previous, .. } if previous == SourceLoc::new(1, 3, "test.stoat")
        ));
    }

    #[test]
    fn test_if_shapes() {
        let (program, _) = parse("1 if 2 print ; 0 if else 3 print ; 1 if 4 else 5 ; print").unwrap();
        let arms: Vec<&Arms> = program
            .main
            .body
            .iter()
            .filter_map(|node| match node {
                Node::Branching(branch) => Some(&branch.arms),
                _ => None,
            })
            .collect();
        assert!(matches!(arms[0], Arms::Yes(_)));
        assert!(matches!(arms[1], Arms::No(_)));
        assert!(matches!(arms[2], Arms::Both(_, _)));
    }

    #[test]
    fn test_loop_iterator_defaults_to_number() {
        let (program, _) = parse("0 loop i 10 < do i 1 + ; drop").unwrap();
        match &program.main.body[1] {
            Node::Loop(node) => {
                assert_eq!(node.iterator.typing, Typing::NUMBER);
                assert_eq!(node.condition.len(), 2);
                assert_eq!(node.body.len(), 3);
            }
            other => panic!("Expected a loop, got {:?}", other),
        }
    }

    #[test]
    fn test_string_literals_are_interned() {
        let (program, data) = parse(r#""hi" "hi" c"hi" drop drop drop drop drop"#).unwrap();
        assert_eq!(data.strings().len(), 2);
        assert!(matches!(&ops(&program.main.body)[0], Op::PushStr { len: 2, .. }));
    }
}
