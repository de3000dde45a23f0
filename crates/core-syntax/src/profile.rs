//! Keyword profile tokenization.
//!
//! A profile is a declarative word-class table: terminators, routers,
//! operations, enclosure and literal pairs, exclusion (comment) delimiters,
//! and keyword classes. Profiles are loaded from JSON files matching the
//! original configuration layout; `Profile::lambda` is the built-in
//! fallback used when a file's type cannot be matched.
//!
//! The tokenizer is a pure function from line content to typed fields. It
//! is not a parser: literal and exclusion contexts are tracked per line
//! only, which is the precision the display pipeline requires.

use serde::Deserialize;

use crate::fields::{Field, FieldClass};

/// A delimiter pair expressed either as a two-element array or as a
/// two-character string in the profile JSON.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Pair {
    Split(Vec<String>),
    Joined(String),
}

impl Pair {
    pub fn open(&self) -> String {
        match self {
            Pair::Split(v) => v.first().cloned().unwrap_or_default(),
            Pair::Joined(s) => {
                let n = s.chars().count() / 2;
                s.chars().take(n.max(1)).collect()
            }
        }
    }

    pub fn close(&self) -> String {
        match self {
            Pair::Split(v) => v.get(1).cloned().unwrap_or_default(),
            Pair::Joined(s) => {
                let n = s.chars().count() / 2;
                s.chars().skip(n.max(1)).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Profile {
    pub terminators: Vec<String>,
    pub routers: Vec<String>,
    pub operations: Vec<String>,
    pub enclosures: Vec<Pair>,
    pub literals: Vec<Pair>,
    pub exclusions: Vec<Pair>,
    pub keyword: Vec<String>,
    pub coreword: Vec<String>,
    pub metaword: Vec<String>,
}

impl Profile {
    /// Parse a profile from its JSON representation.
    pub fn from_json(data: &str) -> Result<Profile, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Syntax profile used when a file type could not be matched.
    pub fn lambda() -> Profile {
        Profile {
            terminators: [";", ",", ":"].map(String::from).to_vec(),
            routers: [".", "->", "<-"].map(String::from).to_vec(),
            operations: {
                let mut ops: Vec<String> =
                    "+-*/~&!%^|<>".chars().map(|c| c.to_string()).collect();
                ops.extend(
                    [":=", "!=", "==", "===", "<=", ">=", "<<", ">>", "\\\\", "\\\""]
                        .map(String::from),
                );
                ops
            },
            enclosures: vec![
                Pair::Joined("[]".into()),
                Pair::Joined("()".into()),
                Pair::Joined("{}".into()),
            ],
            literals: vec![Pair::Joined("\"\"".into())],
            exclusions: vec![],
            keyword: vec![],
            coreword: vec![],
            metaword: vec![],
        }
    }

    /// Profile for prompt instruction vectors.
    pub fn instruction_vectors() -> Profile {
        Profile {
            terminators: ["&", "|", "&&", "||"].map(String::from).to_vec(),
            routers: ["/", "-", "--"].map(String::from).to_vec(),
            operations: [">", "<", ">>", "<=", ">=", ">>="].map(String::from).to_vec(),
            enclosures: vec![
                Pair::Joined("()".into()),
                Pair::Joined("[]".into()),
                Pair::Joined("{}".into()),
            ],
            literals: vec![Pair::Joined("\"\"".into())],
            exclusions: vec![
                Pair::Split(vec!["#".into(), "".into()]),
                Pair::Split(vec!["|&".into(), "&|".into()]),
            ],
            keyword: vec![],
            coreword: vec![],
            metaword: vec!["cd".into()],
        }
    }

    fn classify_word(&self, word: &str) -> FieldClass {
        if self.keyword.iter().any(|k| k == word) {
            FieldClass::InclusionKeyword
        } else if self.coreword.iter().any(|k| k == word) {
            FieldClass::InclusionCoreword
        } else if self.metaword.iter().any(|k| k == word) {
            FieldClass::InclusionMetaword
        } else {
            FieldClass::InclusionIdentifier
        }
    }

    /// Longest operator-class token matching the head of `rest`, searched
    /// across terminators, routers, and operations.
    fn match_operator(&self, rest: &str) -> Option<(FieldClass, usize)> {
        let mut best: Option<(FieldClass, usize)> = None;
        let classes = [
            (&self.terminators, FieldClass::InclusionTerminator),
            (&self.routers, FieldClass::InclusionRouter),
            (&self.operations, FieldClass::InclusionOperation),
        ];
        for (table, class) in classes {
            for tok in table.iter() {
                if !tok.is_empty()
                    && rest.starts_with(tok.as_str())
                    && best.map(|(_, l)| tok.len() > l).unwrap_or(true)
                {
                    best = Some((class, tok.len()));
                }
            }
        }
        best
    }

    fn match_pair_open<'a>(&'a self, table: &'a [Pair], rest: &str) -> Option<(String, String)> {
        let mut best: Option<(String, String)> = None;
        for p in table {
            let open = p.open();
            if !open.is_empty()
                && rest.starts_with(open.as_str())
                && best
                    .as_ref()
                    .map(|(o, _)| open.len() > o.len())
                    .unwrap_or(true)
            {
                best = Some((open, p.close()));
            }
        }
        best
    }

    /// Structure `content` into typed fields.
    ///
    /// The concatenation of the field texts always equals `content`.
    pub fn structure(&self, content: &str) -> Vec<Field> {
        let mut out: Vec<Field> = Vec::new();
        let mut rest = content;

        enum Ctx {
            Inclusion,
            Literal(String),
            Exclusion(String),
        }
        let mut ctx = Ctx::Inclusion;

        let push = |out: &mut Vec<Field>, class: FieldClass, text: &str| {
            if text.is_empty() {
                return;
            }
            match out.last_mut() {
                Some((c, t)) if *c == class => t.push_str(text),
                _ => out.push((class, text.to_string())),
            }
        };

        while !rest.is_empty() {
            match &ctx {
                Ctx::Literal(stop) => {
                    if !stop.is_empty() && rest.starts_with(stop.as_str()) {
                        push(&mut out, FieldClass::LiteralStop, &rest[..stop.len()]);
                        rest = &rest[stop.len()..];
                        ctx = Ctx::Inclusion;
                    } else {
                        let Some(c) = rest.chars().next() else { break };
                        let class = if c == ' ' {
                            FieldClass::LiteralSpace
                        } else {
                            FieldClass::LiteralWords
                        };
                        push(&mut out, class, &rest[..c.len_utf8()]);
                        rest = &rest[c.len_utf8()..];
                    }
                }
                Ctx::Exclusion(stop) => {
                    if !stop.is_empty() && rest.starts_with(stop.as_str()) {
                        push(&mut out, FieldClass::ExclusionStop, &rest[..stop.len()]);
                        rest = &rest[stop.len()..];
                        ctx = Ctx::Inclusion;
                    } else {
                        let Some(c) = rest.chars().next() else { break };
                        let class = if c == ' ' {
                            FieldClass::ExclusionSpace
                        } else {
                            FieldClass::ExclusionWords
                        };
                        push(&mut out, class, &rest[..c.len_utf8()]);
                        rest = &rest[c.len_utf8()..];
                    }
                }
                Ctx::Inclusion => {
                    if let Some((open, close)) = self.match_pair_open(&self.literals, rest) {
                        push(&mut out, FieldClass::LiteralStart, &rest[..open.len()]);
                        rest = &rest[open.len()..];
                        ctx = Ctx::Literal(close);
                        continue;
                    }
                    if let Some((open, close)) = self.match_pair_open(&self.exclusions, rest) {
                        push(&mut out, FieldClass::ExclusionStart, &rest[..open.len()]);
                        rest = &rest[open.len()..];
                        ctx = Ctx::Exclusion(close);
                        continue;
                    }

                    let Some(c) = rest.chars().next() else { break };
                    if c == ' ' {
                        push(&mut out, FieldClass::InclusionSpace, &rest[..1]);
                        rest = &rest[1..];
                        continue;
                    }

                    let mut enclosure = None;
                    for p in &self.enclosures {
                        let open = p.open();
                        let close = p.close();
                        if !open.is_empty() && rest.starts_with(open.as_str()) {
                            enclosure = Some((FieldClass::InclusionStartEnclosure, open.len()));
                            break;
                        }
                        if !close.is_empty() && rest.starts_with(close.as_str()) {
                            enclosure = Some((FieldClass::InclusionStopEnclosure, close.len()));
                            break;
                        }
                    }
                    if let Some((class, len)) = enclosure {
                        out.push((class, rest[..len].to_string()));
                        rest = &rest[len..];
                        continue;
                    }

                    if let Some((class, len)) = self.match_operator(rest) {
                        out.push((class, rest[..len].to_string()));
                        rest = &rest[len..];
                        continue;
                    }

                    if c.is_alphanumeric() || c == '_' {
                        let end = rest
                            .char_indices()
                            .find(|(_, ch)| !(ch.is_alphanumeric() || *ch == '_'))
                            .map(|(i, _)| i)
                            .unwrap_or(rest.len());
                        let word = &rest[..end];
                        out.push((self.classify_word(word), word.to_string()));
                        rest = &rest[end..];
                        continue;
                    }

                    // Unclassified codepoint; isolate as a fragment.
                    push(&mut out, FieldClass::InclusionFragment, &rest[..c.len_utf8()]);
                    rest = &rest[c.len_utf8()..];
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(fields: &[Field]) -> String {
        fields.iter().map(|(_, t)| t.as_str()).collect()
    }

    #[test]
    fn lambda_classifies_operators_and_words() {
        let p = Profile::lambda();
        let fields = p.structure("a := b + 10");
        assert_eq!(texts(&fields), "a := b + 10");
        assert!(
            fields
                .iter()
                .any(|(c, t)| *c == FieldClass::InclusionOperation && t == ":=")
        );
        assert!(
            fields
                .iter()
                .any(|(c, t)| *c == FieldClass::InclusionIdentifier && t == "a")
        );
    }

    #[test]
    fn longest_operator_wins() {
        let p = Profile::lambda();
        let fields = p.structure("a === b");
        assert!(
            fields
                .iter()
                .any(|(c, t)| *c == FieldClass::InclusionOperation && t == "===")
        );
    }

    #[test]
    fn literal_region_isolated() {
        let p = Profile::lambda();
        let fields = p.structure("x = \"some text\" + y");
        assert!(fields.iter().any(|(c, _)| *c == FieldClass::LiteralStart));
        assert!(
            fields
                .iter()
                .any(|(c, t)| *c == FieldClass::LiteralWords && t.contains("some"))
        );
        assert!(fields.iter().any(|(c, _)| *c == FieldClass::LiteralStop));
        assert_eq!(texts(&fields), "x = \"some text\" + y");
    }

    #[test]
    fn open_literal_runs_to_end() {
        let p = Profile::lambda();
        let fields = p.structure("before \"unterminated");
        assert_eq!(texts(&fields), "before \"unterminated");
        assert!(fields.iter().all(|(c, _)| *c != FieldClass::LiteralStop));
    }

    #[test]
    fn comment_to_end_of_line() {
        let p = Profile::instruction_vectors();
        let fields = p.structure("ls -l # trailing note");
        let comment_start = fields
            .iter()
            .position(|(c, _)| *c == FieldClass::ExclusionStart)
            .expect("comment start");
        assert!(
            fields[comment_start..]
                .iter()
                .all(|(c, _)| c.is_exclusion())
        );
    }

    #[test]
    fn keyword_classification() {
        let p = Profile {
            keyword: vec!["fn".into()],
            coreword: vec!["self".into()],
            metaword: vec!["use".into()],
            ..Profile::lambda()
        };
        let fields = p.structure("fn use self other");
        let classes: Vec<FieldClass> = fields
            .iter()
            .filter(|(c, _)| *c != FieldClass::InclusionSpace)
            .map(|(c, _)| *c)
            .collect();
        assert_eq!(
            classes,
            vec![
                FieldClass::InclusionKeyword,
                FieldClass::InclusionMetaword,
                FieldClass::InclusionCoreword,
                FieldClass::InclusionIdentifier,
            ]
        );
    }

    #[test]
    fn enclosures_split() {
        let p = Profile::lambda();
        let fields = p.structure("f(x)");
        let classes: Vec<FieldClass> = fields.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            classes,
            vec![
                FieldClass::InclusionIdentifier,
                FieldClass::InclusionStartEnclosure,
                FieldClass::InclusionIdentifier,
                FieldClass::InclusionStopEnclosure,
            ]
        );
    }

    #[test]
    fn profile_json_round_trip() {
        let data = r#"{
            "terminators": [";"],
            "routers": ["."],
            "operations": ["+", "=="],
            "enclosures": [["(", ")"], "[]"],
            "literals": [["\"", "\""]],
            "keyword": ["if", "else"]
        }"#;
        let p = Profile::from_json(data).unwrap();
        assert_eq!(p.keyword.len(), 2);
        assert_eq!(p.enclosures[1].open(), "[");
        assert_eq!(p.enclosures[1].close(), "]");
        let fields = p.structure("if (x); else");
        assert!(
            fields
                .iter()
                .any(|(c, t)| *c == FieldClass::InclusionKeyword && t == "if")
        );
    }
}
