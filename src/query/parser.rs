use clap::ValueEnum;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_till, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, opt},
    multi::many0,
    sequence::{delimited, preceded},
};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::tree::Query;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::stem::Stem;
use crate::termgen::{STEM_PREFIX, normalize_word, raw_words, should_stem};
use crate::TermPos;

/// Gap used by `NEAR` when no explicit `NEAR/n` is given.
pub const DEFAULT_NEAR_GAP: u32 = 10;

/// Which query words get stemmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StemStrategy {
    /// No stemming.
    None,
    /// Stem words which don't start with a capital letter and aren't in a
    /// phrase; stemmed terms carry the `Z` prefix.
    #[default]
    Some,
    /// Stem every word, without the `Z` prefix.
    All,
    /// Stem every word, with the `Z` prefix.
    AllZ,
}

/// Operator joining words that have no explicit operator between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DefaultOp {
    #[default]
    Or,
    And,
}

/// Optional query syntax features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseFlags {
    /// `AND`, `OR`, `XOR`, `NOT`, `NEAR` and brackets.
    pub boolean: bool,
    /// Double-quoted phrases.
    pub phrase: bool,
    /// `+required` and `-excluded` words.
    pub love_hate: bool,
    /// Trailing `*` wildcards. Requires a database.
    pub wildcard: bool,
    /// Allow a query to start with `NOT`.
    pub pure_not: bool,
}

impl Default for ParseFlags {
    fn default() -> Self {
        Self {
            boolean: true,
            phrase: true,
            love_hate: true,
            wildcard: false,
            pure_not: false,
        }
    }
}

/// Parsed query syntax before terms are generated.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Empty,
    Word(String),
    Phrase(Vec<String>),
    Wildcard(String),
    Group(Vec<(Sign, Node)>),
    Near { operands: Vec<Node>, gap: u32 },
    And(Vec<Node>),
    Or(Vec<Node>),
    Xor(Vec<Node>),
    AndNot(Box<Node>, Box<Node>),
    PureNot(Box<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Plain,
    Love,
    Hate,
}

#[derive(Clone, Copy)]
enum AndOp {
    And,
    AndNot,
}

fn is_keyword(word: &str) -> bool {
    matches!(word, "AND" | "OR" | "NOT" | "XOR" | "NEAR") || word.starts_with("NEAR/")
}

struct Grammar {
    flags: ParseFlags,
}

impl Grammar {
    fn query<'a>(&self, input: &'a str) -> IResult<&'a str, Node> {
        self.or_expression(input)
    }

    fn or_expression<'a>(&self, input: &'a str) -> IResult<&'a str, Node> {
        let (input, first) = self.xor_expression(input)?;
        if !self.flags.boolean {
            return Ok((input, first));
        }

        let (input, rest) = many0(preceded(
            (multispace1, tag("OR"), multispace1),
            |i| self.xor_expression(i),
        ))
        .parse(input)?;

        if rest.is_empty() {
            return Ok((input, first));
        }
        let mut operands = vec![first];
        operands.extend(rest);
        Ok((input, Node::Or(operands)))
    }

    fn xor_expression<'a>(&self, input: &'a str) -> IResult<&'a str, Node> {
        let (input, first) = self.and_expression(input)?;
        if !self.flags.boolean {
            return Ok((input, first));
        }

        let (input, rest) = many0(preceded(
            (multispace1, tag("XOR"), multispace1),
            |i| self.and_expression(i),
        ))
        .parse(input)?;

        if rest.is_empty() {
            return Ok((input, first));
        }
        let mut operands = vec![first];
        operands.extend(rest);
        Ok((input, Node::Xor(operands)))
    }

    fn and_expression<'a>(&self, input: &'a str) -> IResult<&'a str, Node> {
        let (mut input, mut acc) = if self.flags.boolean && self.flags.pure_not {
            alt((
                map(
                    preceded((tag("NOT"), multispace1), |i| self.group(i)),
                    |node| Node::PureNot(Box::new(node)),
                ),
                |i| self.group(i),
            ))
            .parse(input)?
        } else {
            self.group(input)?
        };
        if !self.flags.boolean {
            return Ok((input, acc));
        }

        loop {
            let op: IResult<&str, AndOp> = alt((
                map(
                    (multispace1, tag("AND"), multispace1, tag("NOT"), multispace1),
                    |_| AndOp::AndNot,
                ),
                map((multispace1, tag("AND"), multispace1), |_| AndOp::And),
                map((multispace1, tag("NOT"), multispace1), |_| AndOp::AndNot),
            ))
            .parse(input);
            let Ok((rest, op)) = op else { break };
            let Ok((rest, rhs)) = self.group(rest) else {
                break;
            };
            input = rest;
            acc = match (op, acc) {
                (AndOp::And, Node::And(mut operands)) => {
                    operands.push(rhs);
                    Node::And(operands)
                }
                (AndOp::And, lhs) => Node::And(vec![lhs, rhs]),
                (AndOp::AndNot, lhs) => Node::AndNot(Box::new(lhs), Box::new(rhs)),
            };
        }
        Ok((input, acc))
    }

    /// Words with no explicit operator between them.
    fn group<'a>(&self, input: &'a str) -> IResult<&'a str, Node> {
        let (input, first) = self.signed_item(input)?;
        let (input, rest) = many0(preceded(multispace0, |i| self.signed_item(i))).parse(input)?;

        if rest.is_empty() && first.0 == Sign::Plain {
            return Ok((input, first.1));
        }
        let mut items = vec![first];
        items.extend(rest);
        Ok((input, Node::Group(items)))
    }

    fn signed_item<'a>(&self, input: &'a str) -> IResult<&'a str, (Sign, Node)> {
        if self.flags.love_hate {
            let signs = [('+', Sign::Love), ('-', Sign::Hate)];
            for (ch, sign) in signs {
                if let Some(rest) = input.strip_prefix(ch) {
                    if let Ok((rest, node)) = self.near_chain(rest) {
                        return Ok((rest, (sign, node)));
                    }
                }
            }
        }
        let (input, node) = self.near_chain(input)?;
        Ok((input, (Sign::Plain, node)))
    }

    fn near_chain<'a>(&self, input: &'a str) -> IResult<&'a str, Node> {
        let (mut input, first) = self.atom(input)?;
        if !self.flags.boolean {
            return Ok((input, first));
        }

        let mut operands = vec![first];
        let mut gap = None;
        loop {
            let Ok((rest, this_gap)) = self.near_operator(input) else {
                break;
            };
            let Ok((rest, next)) = self.atom(rest) else {
                break;
            };
            gap.get_or_insert(this_gap);
            operands.push(next);
            input = rest;
        }

        if operands.len() == 1 {
            return Ok((input, operands.pop().unwrap_or(Node::Empty)));
        }
        Ok((
            input,
            Node::Near {
                operands,
                gap: gap.unwrap_or(DEFAULT_NEAR_GAP),
            },
        ))
    }

    fn near_operator<'a>(&self, input: &'a str) -> IResult<&'a str, u32> {
        let (input, (_, _, gap, _)) = (
            multispace1,
            tag("NEAR"),
            opt(preceded(char('/'), digit1)),
            multispace1,
        )
            .parse(input)?;
        let gap = gap
            .and_then(|digits: &str| digits.parse().ok())
            .unwrap_or(DEFAULT_NEAR_GAP);
        Ok((input, gap))
    }

    fn atom<'a>(&self, input: &'a str) -> IResult<&'a str, Node> {
        if self.flags.boolean && input.starts_with('(') {
            return self.parenthesized_expression(input);
        }
        if self.flags.phrase && input.starts_with('"') {
            return self.phrase(input);
        }
        self.word_token(input)
    }

    fn parenthesized_expression<'a>(&self, input: &'a str) -> IResult<&'a str, Node> {
        delimited(
            char('('),
            preceded(multispace0, |i| self.query(i)),
            preceded(multispace0, char(')')),
        )
        .parse(input)
    }

    /// A quoted phrase. A missing closing quote runs to the end of the query.
    fn phrase<'a>(&self, input: &'a str) -> IResult<&'a str, Node> {
        let (input, _) = char('"')(input)?;
        let (input, content) = take_till(|c: char| c == '"')(input)?;
        let (input, _) = opt(char('"')).parse(input)?;
        let words = raw_words(content).map(str::to_string).collect();
        Ok((input, Node::Phrase(words)))
    }

    fn word_token<'a>(&self, input: &'a str) -> IResult<&'a str, Node> {
        let (rest, token) = take_while1(|c: char| !self.is_delimiter(c))(input)?;

        if self.flags.boolean && is_keyword(token) {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }

        if self.flags.wildcard {
            if let Some(prefix) = token.strip_suffix('*') {
                let mut words = raw_words(prefix);
                if let (Some(word), None) = (words.next(), words.next()) {
                    if word == prefix {
                        return Ok((rest, Node::Wildcard(word.to_string())));
                    }
                }
            }
        }

        let words: Vec<String> = raw_words(token).map(str::to_string).collect();
        let node = match words.len() {
            0 => Node::Empty,
            1 => Node::Word(words.into_iter().next().unwrap_or_default()),
            _ => Node::Phrase(words),
        };
        Ok((rest, node))
    }

    fn is_delimiter(&self, c: char) -> bool {
        c.is_whitespace()
            || (self.flags.boolean && (c == '(' || c == ')'))
            || (self.flags.phrase && c == '"')
    }
}

/// Turns free text into a [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryParser<'db> {
    stemmer: Stem,
    strategy: StemStrategy,
    default_op: DefaultOp,
    flags: ParseFlags,
    database: Option<&'db Database>,
}

impl<'db> QueryParser<'db> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stemmer(&mut self, stemmer: Stem) {
        self.stemmer = stemmer;
    }

    pub fn set_stemming_strategy(&mut self, strategy: StemStrategy) {
        self.strategy = strategy;
    }

    pub fn set_default_op(&mut self, op: DefaultOp) {
        self.default_op = op;
    }

    pub fn default_op(&self) -> DefaultOp {
        self.default_op
    }

    pub fn set_flags(&mut self, flags: ParseFlags) {
        self.flags = flags;
    }

    /// Database used to expand wildcards.
    pub fn set_database(&mut self, database: &'db Database) {
        self.database = Some(database);
    }

    pub fn description(&self) -> String {
        format!(
            "QueryParser(stemmer={}, strategy={:?}, default_op={:?})",
            self.stemmer.description(),
            self.strategy,
            self.default_op
        )
    }

    pub fn parse_query(&self, query_string: &str) -> Result<Query> {
        let input = query_string.trim();
        if input.is_empty() {
            return Ok(Query::MatchNothing);
        }

        let grammar = Grammar { flags: self.flags };
        let node = match grammar.query(input) {
            Ok((remaining, node)) if remaining.trim().is_empty() => node,
            Ok((remaining, _)) => return Err(syntax_error(remaining.trim_start())),
            Err(_) => return Err(syntax_error(input)),
        };
        trace!(?node, "Parsed query syntax");

        let mut pos: TermPos = 0;
        self.lower(&node, &mut pos)
    }

    fn lower(&self, node: &Node, pos: &mut TermPos) -> Result<Query> {
        match node {
            Node::Empty => Ok(Query::MatchNothing),
            Node::Word(word) => Ok(self.word_term(word, pos, true)),
            Node::Phrase(words) => Ok(self.phrase(words, pos)),
            Node::Wildcard(prefix) => {
                if self.database.is_none() {
                    return Err(Error::QueryParser(
                        "QueryParser::set_database() must be called when using wildcards"
                            .to_string(),
                    ));
                }
                *pos += 1;
                Ok(Query::Wildcard {
                    prefix: normalize_word(prefix),
                })
            }
            Node::Group(items) => self.lower_group(items, pos),
            Node::Near { operands, gap } => {
                let mut terms = Vec::new();
                for operand in operands {
                    match operand {
                        Node::Word(word) => terms.push(self.word_term(word, pos, false)),
                        Node::Phrase(words) => {
                            for word in words {
                                terms.push(self.word_term(word, pos, false));
                            }
                        }
                        Node::Empty => {}
                        _ => return Err(syntax_error("NEAR")),
                    }
                }
                Ok(match terms.len() {
                    0 => Query::MatchNothing,
                    1 => terms.pop().unwrap_or_default(),
                    n => Query::Near {
                        subqueries: terms,
                        window: gap + n as u32 - 1,
                    },
                })
            }
            Node::And(operands) => Ok(Query::and(self.lower_all(operands, pos)?)),
            Node::Or(operands) => Ok(Query::or(self.lower_all(operands, pos)?)),
            Node::Xor(operands) => Ok(Query::xor(self.lower_all(operands, pos)?)),
            Node::AndNot(left, right) => {
                let left = self.lower(left, pos)?;
                let right = self.lower(right, pos)?;
                Ok(Query::and_not(left, right))
            }
            Node::PureNot(inner) => {
                let inner = self.lower(inner, pos)?;
                Ok(Query::and_not(Query::MatchAll, inner))
            }
        }
    }

    fn lower_all(&self, nodes: &[Node], pos: &mut TermPos) -> Result<Vec<Query>> {
        nodes.iter().map(|node| self.lower(node, pos)).collect()
    }

    fn lower_group(&self, items: &[(Sign, Node)], pos: &mut TermPos) -> Result<Query> {
        let mut required = Vec::new();
        let mut optional = Vec::new();
        let mut excluded = Vec::new();
        for (sign, node) in items {
            let query = self.lower(node, pos)?;
            match sign {
                Sign::Love => required.push(query),
                Sign::Hate => excluded.push(query),
                Sign::Plain if self.default_op == DefaultOp::And => required.push(query),
                Sign::Plain => optional.push(query),
            }
        }

        let has_positive = !(required.is_empty() && optional.is_empty());
        let base = match (required.is_empty(), optional.is_empty()) {
            (true, true) => Query::MatchAll,
            (true, false) => Query::or(optional),
            (false, true) => Query::and(required),
            (false, false) => Query::and_maybe(Query::and(required), Query::or(optional)),
        };

        if excluded.is_empty() {
            return Ok(if has_positive { base } else { Query::MatchNothing });
        }
        Ok(Query::and_not(base, Query::or(excluded)))
    }

    fn phrase(&self, words: &[String], pos: &mut TermPos) -> Query {
        let mut terms: Vec<Query> = words
            .iter()
            .map(|word| self.word_term(word, pos, false))
            .collect();
        match terms.len() {
            0 => Query::MatchNothing,
            1 => terms.pop().unwrap_or_default(),
            n => Query::Phrase {
                subqueries: terms,
                window: n as u32,
            },
        }
    }

    fn word_term(&self, raw: &str, pos: &mut TermPos, stem_allowed: bool) -> Query {
        *pos += 1;
        let word = normalize_word(raw);
        if !stem_allowed || self.stemmer.is_none() {
            return Query::term_at(word, *pos);
        }

        let name = match self.strategy {
            StemStrategy::None => word,
            StemStrategy::Some => {
                let capitalised = raw.chars().next().is_some_and(char::is_uppercase);
                if capitalised || !should_stem(&word) {
                    word
                } else {
                    format!("{STEM_PREFIX}{}", self.stemmer.stem(&word))
                }
            }
            StemStrategy::All => self.stemmer.stem(&word),
            StemStrategy::AllZ => format!("{STEM_PREFIX}{}", self.stemmer.stem(&word)),
        };
        Query::term_at(name, *pos)
    }
}

fn syntax_error(at: &str) -> Error {
    let first = at.split_whitespace().next().unwrap_or(at);
    let message = if at.starts_with('(') {
        "Syntax: unmatched '('".to_string()
    } else if at.starts_with(')') {
        "Syntax: unmatched ')'".to_string()
    } else if first.starts_with("NEAR") {
        "Syntax: <expression> NEAR <expression>".to_string()
    } else if at.starts_with("NOT") && !at.starts_with("NOT ") {
        format!("Syntax: unexpected input '{at}'")
    } else if is_keyword(first) {
        format!("Syntax: <expression> {first} <expression>")
    } else {
        format!("Syntax: unexpected input '{at}'")
    };
    Error::QueryParser(message)
}
