//! Template parser using nom.
//!
//! Parsing happens in two passes: the source is first cut into a flat list of
//! text runs and actions (applying `{{-`/`-}}` trimming), then the control
//! actions are folded into a tree of [`Node`]s.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, digit1, multispace0, multispace1, satisfy},
    combinator::{cut, map, not, opt, peek, recognize, value, verify},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use super::{Command, Node, Operand, Pipeline, TemplateError};

const KEYWORDS: [&str; 8] = ["if", "else", "end", "range", "with", "true", "false", "nil"];

#[derive(Debug, Clone, PartialEq)]
enum ActionKind {
    Comment,
    If(Pipeline),
    ElseIf(Pipeline),
    Else,
    End,
    Range(Pipeline),
    With(Pipeline),
    Output(Pipeline),
}

#[derive(Debug)]
enum Item {
    Text(String),
    Action { kind: ActionKind, offset: usize },
}

/// Parse template text into nodes.
pub(super) fn parse(name: &str, source: &str) -> Result<Vec<Node>, TemplateError> {
    let items = lex(name, source)?;
    let mut builder = TreeBuilder {
        name,
        source,
        items: items.into_iter().peekable(),
    };
    let (nodes, end) = builder.list()?;
    match end {
        Terminator::Eof => Ok(nodes),
        Terminator::End(offset) => Err(builder.error(offset, "unexpected {{end}}")),
        Terminator::Else(offset) | Terminator::ElseIf(_, offset) => {
            Err(builder.error(offset, "unexpected {{else}}"))
        }
    }
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

fn parse_error(name: &str, source: &str, offset: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Parse {
        name: name.to_string(),
        line: line_of(source, offset),
        message: message.into(),
    }
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Cut the source into text runs and actions.
fn lex(name: &str, source: &str) -> Result<Vec<Item>, TemplateError> {
    let mut items = Vec::new();
    let mut rest = source;
    let mut trim_next = false;

    while !rest.is_empty() {
        let (text, after) = match rest.find("{{") {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };
        let text = if trim_next {
            text.trim_start_matches(is_space)
        } else {
            text
        };
        if !text.is_empty() {
            items.push(Item::Text(text.to_string()));
        }
        trim_next = false;
        if after.is_empty() {
            break;
        }

        let offset = source.len() - after.len();
        match action(after) {
            Ok((remaining, (trim_left, kind, trim_right))) => {
                if trim_left {
                    if let Some(Item::Text(prev)) = items.last_mut() {
                        let trimmed = prev.trim_end_matches(is_space).len();
                        prev.truncate(trimmed);
                        if prev.is_empty() {
                            items.pop();
                        }
                    }
                }
                if kind != ActionKind::Comment {
                    items.push(Item::Action { kind, offset });
                }
                trim_next = trim_right;
                rest = remaining;
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let at = source.len() - e.input.len();
                let message = if !after.contains("}}") {
                    "unclosed action".to_string()
                } else {
                    let snippet: String = e.input.chars().take(16).collect();
                    format!("unexpected \"{}\" in action", snippet)
                };
                return Err(parse_error(name, source, at, message));
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(parse_error(name, source, offset, "unclosed action"));
            }
        }
    }
    Ok(items)
}

/// Parse one `{{ ... }}` action, returning its trim flags.
fn action(input: &str) -> IResult<&str, (bool, ActionKind, bool)> {
    let (input, _) = tag("{{")(input)?;
    let (input, trim_left) = map(opt(terminated(char('-'), peek(satisfy(is_space)))), |t| {
        t.is_some()
    })(input)?;
    let (input, _) = multispace0(input)?;
    let (input, kind) = alt((comment, action_body))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, trim_right) = map(opt(terminated(char('-'), peek(tag("}}")))), |t| t.is_some())(input)?;
    let (input, _) = cut(tag("}}"))(input)?;
    Ok((input, (trim_left, kind, trim_right)))
}

fn comment(input: &str) -> IResult<&str, ActionKind> {
    value(
        ActionKind::Comment,
        delimited(tag("/*"), take_until("*/"), tag("*/")),
    )(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(satisfy(is_ident_char)))
}

fn action_body(input: &str) -> IResult<&str, ActionKind> {
    alt((
        map(
            preceded(
                tuple((keyword("else"), multispace1, keyword("if"), multispace1)),
                cut(pipeline),
            ),
            ActionKind::ElseIf,
        ),
        value(ActionKind::Else, keyword("else")),
        value(ActionKind::End, keyword("end")),
        map(preceded(pair(keyword("if"), multispace1), cut(pipeline)), ActionKind::If),
        map(
            preceded(pair(keyword("range"), multispace1), cut(pipeline)),
            ActionKind::Range,
        ),
        map(
            preceded(pair(keyword("with"), multispace1), cut(pipeline)),
            ActionKind::With,
        ),
        map(pipeline, ActionKind::Output),
    ))(input)
}

fn pipeline(input: &str) -> IResult<&str, Pipeline> {
    let (input, decl) = opt(declaration)(input)?;
    let (input, first) = command(input)?;
    let (input, rest) = many0(preceded(
        tuple((multispace0, char('|'), multispace0)),
        command,
    ))(input)?;

    let mut commands = vec![first];
    commands.extend(rest);
    Ok((
        input,
        Pipeline {
            decl: decl.unwrap_or_default(),
            commands,
        },
    ))
}

/// `$x :=` or `$i, $v :=`.
fn declaration(input: &str) -> IResult<&str, Vec<String>> {
    terminated(
        separated_list1(tuple((multispace0, char(','), multispace0)), variable_name),
        tuple((multispace0, tag(":="), multispace0)),
    )(input)
}

fn variable_name(input: &str) -> IResult<&str, String> {
    map(recognize(pair(char('$'), identifier)), String::from)(input)
}

/// Whitespace-separated operands; a function call is its name followed by
/// its arguments.
fn command(input: &str) -> IResult<&str, Command> {
    let (mut input, first) = operand(input)?;
    let mut args = vec![first];
    loop {
        let (rest, ws) = multispace0(input)?;
        if ws.is_empty()
            || rest.is_empty()
            || rest.starts_with('|')
            || rest.starts_with(')')
            || rest.starts_with("}}")
            || rest.starts_with("-}}")
        {
            break;
        }
        match operand(rest) {
            Ok((remaining, op)) => {
                args.push(op);
                input = remaining;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((input, Command { args }))
}

fn operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(preceded(char('.'), field_path), Operand::Field),
        map(
            pair(
                recognize(pair(char('$'), opt(identifier))),
                many0(preceded(char('.'), identifier)),
            ),
            |(name, path)| Operand::Variable(name.to_string(), path),
        ),
        map(string_literal, Operand::Str),
        map(raw_string, Operand::Str),
        number,
        value(Operand::Bool(true), keyword("true")),
        value(Operand::Bool(false), keyword("false")),
        value(Operand::Nil, keyword("nil")),
        map(
            pair(
                delimited(
                    pair(char('('), multispace0),
                    pipeline,
                    pair(multispace0, char(')')),
                ),
                many0(preceded(char('.'), identifier)),
            ),
            |(p, path)| Operand::Sub(Box::new(p), path),
        ),
        map(
            verify(identifier, |s: &String| !KEYWORDS.contains(&s.as_str())),
            Operand::Func,
        ),
    ))(input)
}

/// After the leading dot: `a.b.c`, or nothing for the dot itself.
fn field_path(input: &str) -> IResult<&str, Vec<String>> {
    let (input, first) = opt(identifier)(input)?;
    match first {
        None => Ok((input, Vec::new())),
        Some(first) => {
            let (input, rest) = many0(preceded(char('.'), identifier))(input)?;
            let mut path = vec![first];
            path.extend(rest);
            Ok((input, path))
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            satisfy(|c| c.is_alphabetic() || c == '_'),
            take_while(is_ident_char),
        )),
        String::from,
    )(input)
}

fn number(input: &str) -> IResult<&str, Operand> {
    let (input, num) = terminated(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
        ))),
        not(satisfy(is_ident_char)),
    )(input)?;

    let operand = if num.contains('.') {
        num.parse().map(Operand::Float).ok()
    } else {
        num.parse().map(Operand::Int).ok()
    };
    match operand {
        Some(op) => Ok((input, op)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn raw_string(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('`'), take_while(|c| c != '`'), char('`')),
        String::from,
    )(input)
}

/// Double-quoted string with `\"`, `\\`, `\n`, `\t` and `\r` escapes.
fn string_literal(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('"')(input)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None | Some('\n') => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    rest,
                    nom::error::ErrorKind::Char,
                )));
            }
            Some('"') => return Ok((chars.as_str(), out)),
            Some('\\') => {
                let escaped = match chars.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some(c @ ('"' | '\\' | '\'')) => c,
                    _ => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            rest,
                            nom::error::ErrorKind::Escaped,
                        )));
                    }
                };
                out.push(escaped);
            }
            Some(c) => out.push(c),
        }
        rest = chars.as_str();
    }
}

enum Terminator {
    Eof,
    End(usize),
    Else(usize),
    ElseIf(Pipeline, usize),
}

struct TreeBuilder<'a> {
    name: &'a str,
    source: &'a str,
    items: std::iter::Peekable<std::vec::IntoIter<Item>>,
}

impl TreeBuilder<'_> {
    fn error(&self, offset: usize, message: &str) -> TemplateError {
        parse_error(self.name, self.source, offset, message)
    }

    /// Nodes up to the next `end`, `else` or the end of input.
    fn list(&mut self) -> Result<(Vec<Node>, Terminator), TemplateError> {
        let mut nodes = Vec::new();
        while let Some(item) = self.items.next() {
            match item {
                Item::Text(text) => nodes.push(Node::Text(text)),
                Item::Action { kind, offset } => match kind {
                    ActionKind::Output(p) => nodes.push(Node::Output(p)),
                    ActionKind::End => return Ok((nodes, Terminator::End(offset))),
                    ActionKind::Else => return Ok((nodes, Terminator::Else(offset))),
                    ActionKind::ElseIf(p) => return Ok((nodes, Terminator::ElseIf(p, offset))),
                    ActionKind::If(p) => nodes.push(self.if_block(p, offset)?),
                    ActionKind::Range(pipeline) => {
                        let (body, otherwise) = self.block_with_else("range", offset)?;
                        nodes.push(Node::Range {
                            pipeline,
                            body,
                            otherwise,
                        });
                    }
                    ActionKind::With(pipeline) => {
                        let (body, otherwise) = self.block_with_else("with", offset)?;
                        nodes.push(Node::With {
                            pipeline,
                            body,
                            otherwise,
                        });
                    }
                    ActionKind::Comment => {}
                },
            }
        }
        Ok((nodes, Terminator::Eof))
    }

    fn if_block(&mut self, first: Pipeline, offset: usize) -> Result<Node, TemplateError> {
        let mut branches = Vec::new();
        let mut condition = first;
        loop {
            let (body, end) = self.list()?;
            branches.push((condition, body));
            match end {
                Terminator::End(_) => {
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    });
                }
                Terminator::ElseIf(next, _) => condition = next,
                Terminator::Else(_) => {
                    let otherwise = self.closing_list("if", offset)?;
                    return Ok(Node::If {
                        branches,
                        otherwise,
                    });
                }
                Terminator::Eof => return Err(self.error(offset, "unexpected EOF in {{if}}")),
            }
        }
    }

    fn block_with_else(
        &mut self,
        keyword: &str,
        offset: usize,
    ) -> Result<(Vec<Node>, Vec<Node>), TemplateError> {
        let (body, end) = self.list()?;
        match end {
            Terminator::End(_) => Ok((body, Vec::new())),
            Terminator::Else(_) => Ok((body, self.closing_list(keyword, offset)?)),
            Terminator::ElseIf(_, at) => {
                Err(self.error(at, &format!("{{{{else if}}}} in {{{{{}}}}}", keyword)))
            }
            Terminator::Eof => {
                Err(self.error(offset, &format!("unexpected EOF in {{{{{}}}}}", keyword)))
            }
        }
    }

    /// The `else` branch, which must be closed by `end`.
    fn closing_list(&mut self, keyword: &str, offset: usize) -> Result<Vec<Node>, TemplateError> {
        let (nodes, end) = self.list()?;
        match end {
            Terminator::End(_) => Ok(nodes),
            Terminator::Eof => {
                Err(self.error(offset, &format!("unexpected EOF in {{{{{}}}}}", keyword)))
            }
            Terminator::Else(at) | Terminator::ElseIf(_, at) => {
                Err(self.error(at, "expected {{end}} after {{else}}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_trims() {
        let nodes = parse("t", "a \n{{- .x -}}\n b").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::Text("a".to_string()));
        assert_eq!(nodes[2], Node::Text("b".to_string()));
    }

    #[test]
    fn test_negative_number_is_not_trim() {
        let nodes = parse("t", "{{-3}}").unwrap();
        match &nodes[0] {
            Node::Output(p) => assert_eq!(p.commands[0].args[0], Operand::Int(-3)),
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_function_call_with_pipe() {
        let nodes = parse("t", r#"{{ subquery "x" | printf "%s" }}"#).unwrap();
        match &nodes[0] {
            Node::Output(p) => {
                assert_eq!(p.commands.len(), 2);
                assert_eq!(
                    p.commands[0].args,
                    vec![Operand::Func("subquery".into()), Operand::Str("x".into())]
                );
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_declaration() {
        let nodes = parse("t", "{{ range $i, $v := .list }}{{ end }}").unwrap();
        match &nodes[0] {
            Node::Range { pipeline, .. } => {
                assert_eq!(pipeline.decl, vec!["$i".to_string(), "$v".to_string()]);
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_string_escapes() {
        let (_, s) = string_literal(r#""a\"b\n""#).unwrap();
        assert_eq!(s, "a\"b\n");
    }

    #[test]
    fn test_stray_else() {
        assert!(parse("t", "{{ else }}").is_err());
    }
}
