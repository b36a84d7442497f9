//! Reader for grammars written in a subset of the Lark syntax.
//!
//! ```text
//! start: value
//! ?value: object | array | NUMBER | "true" | "false" | "null"
//! array: "[" [value ("," value)*] "]"
//! object: "{" [pair ("," pair)*] "}"
//! pair: ESCAPED_STRING ":" value
//! %import common.NUMBER
//! %import common.ESCAPED_STRING
//! ```
//!
//! Grammars are scannerless: terminals are ordinary rules over bytes, so whitespace must be
//! spelled out where it is allowed and `%ignore` is not supported.

use rustc_hash::FxHashMap;

use super::{ByteSet, Grammar, SymIdx};
use crate::dfa::Dfa;
use crate::{Error, Result};

/// Largest count accepted by `item ~ n` and `item ~ n..m`.
pub const MAX_REPEAT: usize = 1000;

/// Terminals available through `%import common.NAME`.
static COMMON_TERMINALS: &[(&str, &str)] = &[
    ("DIGIT", r"[0-9]"),
    ("HEXDIGIT", r"[a-fA-F0-9]"),
    ("INT", r"[0-9]+"),
    ("SIGNED_INT", r"[+-]?[0-9]+"),
    ("DECIMAL", r"[0-9]+\.[0-9]*|\.[0-9]+"),
    ("FLOAT", r"([0-9]+\.[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+"),
    ("SIGNED_FLOAT", r"[+-]?(([0-9]+\.[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+)"),
    ("NUMBER", r"([0-9]+\.[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?|[0-9]+([eE][+-]?[0-9]+)?"),
    ("SIGNED_NUMBER", r"[+-]?(([0-9]+\.[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?|[0-9]+([eE][+-]?[0-9]+)?)"),
    ("LCASE_LETTER", r"[a-z]"),
    ("UCASE_LETTER", r"[A-Z]"),
    ("LETTER", r"[a-zA-Z]"),
    ("WORD", r"[a-zA-Z]+"),
    ("CNAME", r"[_a-zA-Z][_a-zA-Z0-9]*"),
    ("WS_INLINE", r"[ \t]+"),
    ("WS", r"[ \t\f\r\n]+"),
    ("CR", r"\r"),
    ("LF", r"\n"),
    ("NEWLINE", r"(\r?\n)+"),
    ("ESCAPED_STRING", r#""([^"\\]|\\.)*""#),
];

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Name(String),
    Number(usize),
    Str { value: String, insensitive: bool },
    Regex { pattern: String, flags: String },
    Directive(String),
    Colon,
    Pipe,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Question,
    Star,
    Plus,
    Tilde,
    Dot,
    DotDot,
    Arrow,
    Comma,
    Newline,
    Eof,
}

fn syntax_error(line: usize, reason: impl Into<String>) -> Error {
    Error::CfgSyntax {
        line,
        reason: reason.into(),
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    fn tokenize(source: &str) -> Result<Vec<(Tok, usize)>> {
        let mut lexer = Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        };
        let mut tokens = vec![];
        loop {
            let token = lexer.next_token()?;
            let done = token == Tok::Eof;
            // A newline token belongs to the line it ends.
            let line = if token == Tok::Newline {
                lexer.line - 1
            } else {
                lexer.line
            };
            tokens.push((token, line));
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.pos += 1;
        Some(c)
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn next_token(&mut self) -> Result<Tok> {
        loop {
            match self.peek(0) {
                Some(' ' | '\t' | '\r') => self.pos += 1,
                Some('\\') if self.peek(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                Some('/') if self.peek(1) == Some('/') => self.skip_line(),
                Some('#') => self.skip_line(),
                _ => break,
            }
        }

        let Some(c) = self.bump() else {
            return Ok(Tok::Eof);
        };
        let token = match c {
            '\n' => {
                self.line += 1;
                Tok::Newline
            }
            ':' => Tok::Colon,
            '|' => Tok::Pipe,
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '[' => Tok::LBracket,
            ']' => Tok::RBracket,
            '?' => Tok::Question,
            '*' => Tok::Star,
            '+' => Tok::Plus,
            '~' => Tok::Tilde,
            ',' => Tok::Comma,
            '.' if self.peek(0) == Some('.') => {
                self.pos += 1;
                Tok::DotDot
            }
            '.' => Tok::Dot,
            '-' if self.peek(0) == Some('>') => {
                self.pos += 1;
                Tok::Arrow
            }
            '!' => return self.next_token(),
            '"' => self.string()?,
            '/' => self.regex()?,
            '%' => {
                let name = self.word();
                if name.is_empty() {
                    return Err(syntax_error(self.line, "expected a directive after '%'"));
                }
                Tok::Directive(name)
            }
            c if c.is_ascii_digit() => {
                self.pos -= 1;
                let digits = self.word();
                let number = digits
                    .parse()
                    .map_err(|_| syntax_error(self.line, format!("invalid number '{digits}'")))?;
                Tok::Number(number)
            }
            c if c == '_' || c.is_ascii_alphabetic() => {
                self.pos -= 1;
                Tok::Name(self.word())
            }
            c => return Err(syntax_error(self.line, format!("unexpected character {c:?}"))),
        };
        Ok(token)
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek(0) {
            if c == '_' || c.is_ascii_alphanumeric() {
                word.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        word
    }

    fn string(&mut self) -> Result<Tok> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(syntax_error(self.line, "unterminated string")),
                Some('"') => break,
                Some('\\') => value.push(self.escape()?),
                Some(c) => value.push(c),
            }
        }
        let insensitive = self.peek(0) == Some('i');
        if insensitive {
            self.pos += 1;
        }
        Ok(Tok::Str { value, insensitive })
    }

    fn escape(&mut self) -> Result<char> {
        let line = self.line;
        let c = match self.bump() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('f') => '\x0c',
            Some('0') => '\0',
            Some('x') => self.hex_char(2)?,
            Some('u') => self.hex_char(4)?,
            Some('U') => self.hex_char(8)?,
            Some(c @ ('\\' | '"' | '\'' | '/')) => c,
            Some(c) => return Err(syntax_error(line, format!("unknown escape '\\{c}'"))),
            None => return Err(syntax_error(line, "unterminated string")),
        };
        Ok(c)
    }

    fn hex_char(&mut self, len: usize) -> Result<char> {
        let digits: String = (0..len).filter_map(|_| self.bump()).collect();
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| syntax_error(self.line, format!("invalid escape code '{digits}'")))
    }

    fn regex(&mut self) -> Result<Tok> {
        let mut pattern = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(syntax_error(self.line, "unterminated regex")),
                Some('/') => break,
                Some('\\') if self.peek(0) == Some('/') => {
                    self.pos += 1;
                    pattern.push('/');
                }
                Some('\\') => {
                    pattern.push('\\');
                    if let Some(c) = self.bump() {
                        pattern.push(c);
                    }
                }
                Some(c) => pattern.push(c),
            }
        }
        let mut flags = String::new();
        while let Some(c @ ('i' | 'm' | 's' | 'x' | 'u')) = self.peek(0) {
            flags.push(c);
            self.pos += 1;
        }
        Ok(Tok::Regex { pattern, flags })
    }
}

/// Reads a grammar whose start symbol is the rule named `start`.
pub fn parse(source: &str) -> Result<Grammar> {
    let tokens = Lexer::tokenize(source)?;
    let mut reader = Reader {
        tokens,
        pos: 0,
        grammar: Grammar::new(),
        defined: FxHashMap::default(),
        referenced: vec![],
        regexes: FxHashMap::default(),
    };
    reader.read()?;
    Ok(reader.grammar)
}

struct Reader {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    grammar: Grammar,
    /// Line of the definition of every rule, terminal or import.
    defined: FxHashMap<String, usize>,
    /// First reference to every name, checked once everything is read.
    referenced: Vec<(String, usize)>,
    regexes: FxHashMap<String, SymIdx>,
}

impl Reader {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    fn bump(&mut self) -> Tok {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Tok) -> Result<()> {
        let line = self.line();
        let found = self.bump();
        if found == expected {
            Ok(())
        } else {
            Err(syntax_error(
                line,
                format!("expected {expected:?}, found {found:?}"),
            ))
        }
    }

    fn skip_newlines(&mut self) {
        while *self.peek() == Tok::Newline {
            self.bump();
        }
    }

    fn read(&mut self) -> Result<()> {
        loop {
            self.skip_newlines();
            let line = self.line();
            match self.bump() {
                Tok::Eof => break,
                Tok::Question => {
                    let Tok::Name(name) = self.bump() else {
                        return Err(syntax_error(line, "expected a rule name after '?'"));
                    };
                    self.rule(name, line)?
                }
                Tok::Name(name) => self.rule(name, line)?,
                Tok::Directive(directive) => self.directive(&directive, line)?,
                other => return Err(syntax_error(line, format!("unexpected {other:?}"))),
            }
        }

        if !self.defined.contains_key("start") {
            return Err(syntax_error(1, "missing rule 'start'"));
        }
        for (name, line) in &self.referenced {
            if !self.defined.contains_key(name) {
                return Err(syntax_error(*line, format!("undefined symbol '{name}'")));
            }
        }
        Ok(())
    }

    fn define(&mut self, name: &str, line: usize) -> Result<SymIdx> {
        if self.defined.insert(name.to_string(), line).is_some() {
            return Err(syntax_error(line, format!("'{name}' is defined twice")));
        }
        Ok(self.grammar.symbol(name))
    }

    fn rule(&mut self, name: String, line: usize) -> Result<()> {
        if *self.peek() == Tok::Dot {
            // priority
            self.bump();
            if !matches!(self.bump(), Tok::Number(_)) {
                return Err(syntax_error(line, "expected a priority after '.'"));
            }
        }
        self.expect(Tok::Colon)?;
        let lhs = self.define(&name, line)?;
        for alternative in self.expansions(false)? {
            self.grammar.add_rule(lhs, alternative);
        }
        match self.bump() {
            Tok::Newline | Tok::Eof => Ok(()),
            other => Err(syntax_error(line, format!("unexpected {other:?} in rule '{name}'"))),
        }
    }

    fn directive(&mut self, directive: &str, line: usize) -> Result<()> {
        match directive {
            "import" => self.import(line),
            "ignore" => Err(syntax_error(
                line,
                "%ignore is not supported, allow whitespace explicitly in the rules",
            )),
            other => Err(syntax_error(line, format!("unsupported directive %{other}"))),
        }
    }

    /// `%import common.NAME [-> ALIAS]` or `%import common (NAME, ...)`.
    fn import(&mut self, line: usize) -> Result<()> {
        let module = match self.bump() {
            Tok::Name(module) => module,
            other => return Err(syntax_error(line, format!("unexpected {other:?} in %import"))),
        };
        if module != "common" {
            return Err(syntax_error(
                line,
                format!("only imports from 'common' are supported, not '{module}'"),
            ));
        }

        let mut imports = vec![];
        match self.bump() {
            Tok::Dot => {
                let Tok::Name(name) = self.bump() else {
                    return Err(syntax_error(line, "expected a terminal name in %import"));
                };
                let alias = if *self.peek() == Tok::Arrow {
                    self.bump();
                    match self.bump() {
                        Tok::Name(alias) => alias,
                        other => return Err(syntax_error(line, format!("unexpected {other:?}"))),
                    }
                } else {
                    name.clone()
                };
                imports.push((name, alias));
            }
            Tok::LParen => loop {
                match self.bump() {
                    Tok::Name(name) => imports.push((name.clone(), name)),
                    other => return Err(syntax_error(line, format!("unexpected {other:?}"))),
                }
                match self.bump() {
                    Tok::Comma => {}
                    Tok::RParen => break,
                    other => return Err(syntax_error(line, format!("unexpected {other:?}"))),
                }
            },
            other => return Err(syntax_error(line, format!("unexpected {other:?} in %import"))),
        }

        for (name, alias) in imports {
            let Some((_, regex)) = COMMON_TERMINALS.iter().find(|(common, _)| *common == name)
            else {
                return Err(syntax_error(line, format!("unknown terminal common.{name}")));
            };
            let lhs = self.define(&alias, line)?;
            let root = self.regex(regex, line)?;
            self.grammar.add_rule(lhs, vec![root]);
        }
        match self.bump() {
            Tok::Newline | Tok::Eof => Ok(()),
            other => Err(syntax_error(line, format!("unexpected {other:?} after %import"))),
        }
    }

    fn regex(&mut self, regex: &str, line: usize) -> Result<SymIdx> {
        if let Some(sym) = self.regexes.get(regex) {
            return Ok(*sym);
        }
        let dfa = Dfa::new(regex)
            .map_err(|e| syntax_error(line, format!("invalid regex /{regex}/: {e}")))?;
        let sym = self.grammar.add_dfa("__regex", &dfa);
        self.regexes.insert(regex.to_string(), sym);
        Ok(sym)
    }

    /// Alternatives separated by `|`. At the top level of a rule an alternative may start on a
    /// new line with a leading `|`.
    fn expansions(&mut self, in_group: bool) -> Result<Vec<Vec<SymIdx>>> {
        let mut alternatives = vec![self.alternative(in_group)?];
        loop {
            if !in_group && *self.peek() == Tok::Newline {
                let mut ahead = self.pos;
                while self.tokens[ahead].0 == Tok::Newline {
                    ahead += 1;
                }
                if self.tokens[ahead].0 == Tok::Pipe {
                    self.pos = ahead;
                }
            }
            if *self.peek() != Tok::Pipe {
                return Ok(alternatives);
            }
            self.bump();
            alternatives.push(self.alternative(in_group)?);
        }
    }

    fn alternative(&mut self, in_group: bool) -> Result<Vec<SymIdx>> {
        let mut symbols = vec![];
        loop {
            if in_group {
                self.skip_newlines();
            }
            match self.peek() {
                Tok::Pipe | Tok::RParen | Tok::RBracket | Tok::Newline | Tok::Eof => {
                    return Ok(symbols)
                }
                Tok::Arrow => {
                    // alias, irrelevant for recognition
                    self.bump();
                    let line = self.line();
                    if !matches!(self.bump(), Tok::Name(_)) {
                        return Err(syntax_error(line, "expected an alias name after '->'"));
                    }
                }
                _ => symbols.extend(self.item()?),
            }
        }
    }

    fn item(&mut self) -> Result<Vec<SymIdx>> {
        let line = self.line();
        let atom = self.atom()?;
        let item = match self.peek() {
            Tok::Question => {
                self.bump();
                let sym = self.grammar.fresh_symbol("__opt");
                self.grammar.add_rule(sym, atom);
                self.grammar.add_rule(sym, vec![]);
                vec![sym]
            }
            Tok::Star => {
                self.bump();
                let sym = self.grammar.fresh_symbol("__star");
                self.grammar.add_rule(sym, [vec![sym], atom].concat());
                self.grammar.add_rule(sym, vec![]);
                vec![sym]
            }
            Tok::Plus => {
                self.bump();
                let sym = self.grammar.fresh_symbol("__plus");
                self.grammar.add_rule(sym, [vec![sym], atom.clone()].concat());
                self.grammar.add_rule(sym, atom);
                vec![sym]
            }
            Tok::Tilde => {
                self.bump();
                let Tok::Number(min) = self.bump() else {
                    return Err(syntax_error(line, "expected a count after '~'"));
                };
                let max = if *self.peek() == Tok::DotDot {
                    self.bump();
                    match self.bump() {
                        Tok::Number(max) if max >= min => max,
                        _ => return Err(syntax_error(line, "invalid repetition range")),
                    }
                } else {
                    min
                };
                if max > MAX_REPEAT {
                    return Err(syntax_error(
                        line,
                        format!("repetition count {max} exceeds {MAX_REPEAT}"),
                    ));
                }
                // `min` copies, then a chain of `max - min` nested optional copies.
                let mut rhs = atom.repeat(min);
                let mut tail = vec![];
                for _ in min..max {
                    let optional = self.grammar.fresh_symbol("__repeat");
                    self.grammar.add_rule(optional, vec![]);
                    self.grammar.add_rule(optional, [atom.as_slice(), tail.as_slice()].concat());
                    tail = vec![optional];
                }
                rhs.extend(tail);
                let sym = self.grammar.fresh_symbol("__repeat");
                self.grammar.add_rule(sym, rhs);
                vec![sym]
            }
            _ => atom,
        };
        Ok(item)
    }

    fn atom(&mut self) -> Result<Vec<SymIdx>> {
        let line = self.line();
        match self.bump() {
            Tok::LParen => {
                let alternatives = self.expansions(true)?;
                self.skip_newlines();
                self.expect(Tok::RParen)?;
                if alternatives.len() == 1 {
                    return Ok(alternatives.into_iter().flatten().collect());
                }
                let sym = self.grammar.fresh_symbol("__group");
                for alternative in alternatives {
                    self.grammar.add_rule(sym, alternative);
                }
                Ok(vec![sym])
            }
            Tok::LBracket => {
                let alternatives = self.expansions(true)?;
                self.skip_newlines();
                self.expect(Tok::RBracket)?;
                let sym = self.grammar.fresh_symbol("__maybe");
                for alternative in alternatives {
                    self.grammar.add_rule(sym, alternative);
                }
                self.grammar.add_rule(sym, vec![]);
                Ok(vec![sym])
            }
            Tok::Str { value, insensitive } => {
                if *self.peek() == Tok::DotDot {
                    self.bump();
                    let Tok::Str { value: end, .. } = self.bump() else {
                        return Err(syntax_error(line, "expected a string after '..'"));
                    };
                    return self.range(&value, &end, line);
                }
                if value.is_empty() {
                    return Err(syntax_error(line, "empty string literal"));
                }
                if insensitive {
                    Ok(value
                        .bytes()
                        .map(|b| {
                            let folded = [b.to_ascii_lowercase(), b.to_ascii_uppercase()];
                            self.grammar.terminal(ByteSet::from_bytes(folded))
                        })
                        .collect())
                } else {
                    Ok(self.grammar.literal(value.as_bytes()))
                }
            }
            Tok::Regex { pattern, flags } => {
                let regex = if flags.is_empty() {
                    pattern
                } else {
                    format!("(?{flags}){pattern}")
                };
                Ok(vec![self.regex(&regex, line)?])
            }
            Tok::Name(name) => {
                if !self.referenced.iter().any(|(known, _)| *known == name) {
                    self.referenced.push((name.clone(), line));
                }
                Ok(vec![self.grammar.symbol(&name)])
            }
            other => Err(syntax_error(line, format!("unexpected {other:?}"))),
        }
    }

    /// `"a".."z"`, both ends being single characters.
    fn range(&mut self, start: &str, end: &str, line: usize) -> Result<Vec<SymIdx>> {
        let mut start_chars = start.chars();
        let mut end_chars = end.chars();
        match (
            start_chars.next(),
            start_chars.next(),
            end_chars.next(),
            end_chars.next(),
        ) {
            (Some(first), None, Some(last), None) if first <= last => {
                let regex = format!(
                    "[{}-{}]",
                    regex::escape(&first.to_string()),
                    regex::escape(&last.to_string())
                );
                Ok(vec![self.regex(&regex, line)?])
            }
            _ => Err(syntax_error(line, "a range needs two ordered single characters")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cfg::Parser;
    use crate::vocabulary::Recognizer;

    fn accepts(source: &str, input: &str) -> bool {
        let grammar = parse(source).expect("Grammar failed");
        let mut parser = Parser::new(Arc::new(grammar.compile()));
        input.bytes().all(|b| parser.try_push_byte(b)) && parser.is_accepting()
    }

    #[test]
    fn literals_and_alternatives() {
        let source = r#"
            // yes or no, shouting allowed
            start: answer "!"*
            answer: "yes"
                  | "no"i   # any case
        "#;
        for input in ["yes", "no", "NO", "nO!!", "yes!"] {
            assert!(accepts(source, input), "{input}");
        }
        for input in ["YES", "maybe", "", "!"] {
            assert!(!accepts(source, input), "{input}");
        }
    }

    #[test]
    fn groups_and_repetitions() {
        let source = r#"
            start: "[" [item ("," item)*] "]"
            item: "a"+ | ("b" "c") ~ 2 | "d" ~ 1..2
        "#;
        for input in ["[]", "[a]", "[aaa,bcbc]", "[d,dd,a]"] {
            assert!(accepts(source, input), "{input}");
        }
        for input in ["[", "[,]", "[bc]", "[ddd]", "[a,]"] {
            assert!(!accepts(source, input), "{input}");
        }
    }

    #[test]
    fn long_repetition_ranges() {
        let source = format!(r#"start: "x" ~ 2..{MAX_REPEAT}"#);
        let grammar = parse(&source).expect("Grammar failed");
        let compiled = grammar.compile();
        let mut parser = Parser::new(Arc::new(compiled));
        assert!(!parser.is_accepting());
        for count in 1..=MAX_REPEAT {
            assert!(parser.try_push_byte(b'x'), "{count}");
            assert_eq!(parser.is_accepting(), count >= 2, "{count}");
        }
        assert!(!parser.try_push_byte(b'x'));
    }

    #[test]
    fn regexes_ranges_and_imports() {
        let source = r#"
            start: key WS_INLINE? "=" WS_INLINE? value
            key: /[a-z_]+/
            value: SIGNED_NUMBER | ESCAPED_STRING | "a".."c"
            %import common.SIGNED_NUMBER
            %import common (ESCAPED_STRING, WS_INLINE)
        "#;
        for input in ["x=1", "max_len = -2.5e3", r#"name= "a \"b\"""#, "v=b"] {
            assert!(accepts(source, input), "{input}");
        }
        for input in ["X=1", "x=", "x=d", r#"x="open"#] {
            assert!(!accepts(source, input), "{input}");
        }
    }

    #[test]
    fn regex_flags_and_aliases() {
        let source = r#"
            ?start: greeting -> hello
            greeting.2: /hel+o/i
        "#;
        assert!(accepts(source, "HeLLo"));
        assert!(!accepts(source, "heo"));
    }

    #[test]
    fn syntax_errors() {
        for (source, line) in [
            ("start: \"a\"\n%ignore WS", 2),
            ("start: missing", 1),
            ("value: \"a\"", 1),
            ("start: \"a\"\nstart: \"b\"", 2),
            ("start: \"a\n", 1),
            ("start: /[a/", 1),
            ("\n\nstart: (\"a\"", 3),
            ("start: \"a\"\n%import common.NOPE", 2),
            ("start: \"a\" @", 1),
            ("start: \"a\" ~ 0..100000", 1),
            ("\nstart: \"a\" ~ 1001", 2),
        ] {
            match parse(source) {
                Err(Error::CfgSyntax { line: found, .. }) => assert_eq!(found, line, "{source}"),
                Err(e) => unreachable!("{source}: unexpected error {e}"),
                Ok(grammar) => unreachable!("{source}: parsed into {grammar:?}"),
            }
        }
    }
}
