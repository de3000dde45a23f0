//! Prompt instruction vectors.
//!
//! A command procedure is a sequence of instructions separated by the
//! terminator classes `& && &+ &- &* &#`, with the `|`-family terminators
//! (`| || |# ||#`) forming compositions whose parts feed one another.
//! Redirection operators attach selections and files to instruction ports;
//! the combination operator `^` expresses input and output at once and is
//! always split into its pair before execution.
//!
//! Parsing is a shift-reduce over terminator classes: fields accumulate
//! until a terminator reduces them into an instruction, instructions
//! reduce into compositions at `|` boundaries, and `||` switches
//! precedence by composing the procedure so far with the structure of the
//! remainder.

use core_syntax::Profile;

/// The execution condition attached to a procedure step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// Run only when the previous step exited zero.
    Completed,
    /// Run only when the previous step exited non-zero.
    Failed,
    Never,
}

impl Condition {
    fn of(terminator: &str) -> Condition {
        match terminator {
            "&+" => Condition::Completed,
            "&-" => Condition::Failed,
            "&#" => Condition::Never,
            _ => Condition::Always,
        }
    }

    /// Whether the step is skipped given the previous exit status.
    pub fn skips(&self, status: i32) -> bool {
        match self {
            Condition::Always => false,
            Condition::Never => true,
            Condition::Completed => status != 0,
            Condition::Failed => status == 0,
        }
    }
}

/// A redirect operator of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub operator: String,
    pub port: Option<u32>,
    pub operand: String,
}

impl Redirection {
    pub fn new(operator: impl Into<String>, port: Option<u32>, operand: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            port,
            operand: operand.into(),
        }
    }

    /// Identify the default port from the operator.
    pub fn default_port(&self) -> Option<u32> {
        if self.operator.contains("<<") {
            // Inline source document.
            Some(3)
        } else if self.operator.contains('<') {
            Some(0)
        } else if self.operator.contains('>') {
            Some(1)
        } else if self.operator.contains('^') {
            None
        } else {
            None
        }
    }

    /// Deconstruct a `^` combination into its input and output pair,
    /// eliminating combinations from downstream processing.
    pub fn split(&self) -> (Redirection, Redirection) {
        debug_assert!(self.operator.starts_with('^'));
        let (suffix, out) = if let Some(rest) = self.operator.strip_prefix("^>") {
            (rest, ">>")
        } else {
            (&self.operator[1..], ">")
        };

        (
            Redirection::new(format!("<{suffix}"), Some(0), self.operand.clone()),
            Redirection::new(format!("{out}{suffix}"), Some(1), self.operand.clone()),
        )
    }
}

/// One instruction: its argument vector and redirections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Instruction {
    pub fields: Vec<String>,
    pub redirects: Vec<Redirection>,
}

impl Instruction {
    /// The first field of the instruction.
    pub fn title(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or("[-]")
    }

    pub fn empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn invokes(&self, name: &str) -> bool {
        self.fields.first().map(|f| f == name).unwrap_or(false)
    }

    fn isolate(parts: Vec<FieldExpr>) -> Instruction {
        let mut fields = Vec::new();
        let mut redirects: Vec<Redirection> = Vec::new();

        for p in parts {
            match p {
                FieldExpr::Plain(f) => fields.push(f),
                FieldExpr::Redirect {
                    operator,
                    port,
                    operand,
                } => {
                    if operator == "<<" {
                        // Text extends a previous source redirect on the
                        // same port instead of stacking.
                        if let Some(r) = redirects
                            .iter_mut()
                            .find(|r| r.operator == "<<" && r.port == port)
                        {
                            r.operand.push_str(&operand);
                            continue;
                        }
                    }
                    redirects.push(Redirection::new(operator, port, operand));
                }
            }
        }

        Instruction { fields, redirects }
    }
}

/// An expression node of a parsed procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Instruction(Instruction),
    Composition(Composition),
    Procedure(Procedure),
}

impl Step {
    pub fn title(&self) -> String {
        match self {
            Step::Instruction(i) => i.title().to_string(),
            Step::Composition(c) => c.title(),
            Step::Procedure(p) => p.title(),
        }
    }
}

/// A series of instructions each providing the input of the following.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Composition {
    pub parts: Vec<Step>,
}

impl Composition {
    pub fn title(&self) -> String {
        match (self.parts.first(), self.parts.last()) {
            (Some(a), Some(b)) => format!("{}->{}", a.title(), b.title()),
            _ => "[-]".to_string(),
        }
    }
}

/// A series of steps executed sequentially under conditions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Procedure {
    pub steps: Vec<Step>,
    pub conditions: Vec<Condition>,
}

impl Procedure {
    pub fn title(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.title())
            .collect::<Vec<_>>()
            .join("+")
    }

    pub fn empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iterate(&self) -> impl Iterator<Item = (&Step, Condition)> {
        self.steps.iter().zip(self.conditions.iter().copied())
    }
}

/// An isolated prompt field: plain text or a redirect expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldExpr {
    Plain(String),
    Redirect {
        operator: String,
        port: Option<u32>,
        operand: String,
    },
}

const TERMINATORS: &[&str] = &["||#", "|#", "&&", "||", "&+", "&-", "&*", "&#", "&", "|"];

const REDIRECT_OPERATORS: &[&str] = &[
    ">>=", "<<", ">>", "<=", ">=", "<+", "<-", "<|", "<*", ">+", ">-", ">|", ">*", "^>", "<", ">",
    "^",
];

fn match_prefix<'a>(table: &[&'a str], s: &str) -> Option<&'a str> {
    table.iter().find(|t| s.starts_with(**t)).copied()
}

/// Scan the raw prompt text into terminated field groups.
///
/// The keyword profile isolates literals and comments; this pass then
/// groups fields between terminators, folding redirect operators into
/// field expressions with their optional leading port number.
fn terminate(text: &str) -> Vec<(String, Vec<FieldExpr>)> {
    let profile = Profile::instruction_vectors();
    let tokens = profile.structure(text);

    let mut out: Vec<(String, Vec<FieldExpr>)> = Vec::new();
    let mut fields: Vec<FieldExpr> = Vec::new();
    let mut word = String::new();
    let mut pending_redirect: Option<(String, Option<u32>)> = None;

    let flush_word = |word: &mut String,
                      fields: &mut Vec<FieldExpr>,
                      pending: &mut Option<(String, Option<u32>)>| {
        if word.is_empty() && pending.is_none() {
            return;
        }
        match pending.take() {
            Some((operator, port)) => fields.push(FieldExpr::Redirect {
                operator,
                port,
                operand: std::mem::take(word),
            }),
            None => {
                if !word.is_empty() {
                    fields.push(FieldExpr::Plain(std::mem::take(word)));
                }
            }
        }
    };

    let mut i = 0;
    let flat: String = tokens
        .iter()
        .map(|(c, t)| {
            if c.is_exclusion() {
                // Comments vanish from the vector.
                " ".repeat(t.chars().count())
            } else {
                t.clone()
            }
        })
        .collect();
    let chars: Vec<char> = flat.chars().collect();

    // Literal regions must not react to operators; recover their spans.
    let mut literal = vec![false; chars.len()];
    {
        let mut pos = 0;
        for (c, t) in &tokens {
            let n = t.chars().count();
            if c.is_literal() {
                for l in literal.iter_mut().skip(pos).take(n) {
                    *l = true;
                }
            }
            pos += n;
        }
    }

    while i < chars.len() {
        let rest: String = chars[i..].iter().collect();
        let c = chars[i];

        if literal[i] {
            if c != '"' {
                word.push(c);
            }
            i += 1;
            continue;
        }

        if c == ' ' {
            if word.is_empty() && pending_redirect.is_some() {
                // An operator awaiting its operand; the next word binds.
                i += 1;
                continue;
            }
            flush_word(&mut word, &mut fields, &mut pending_redirect);
            i += 1;
            continue;
        }

        if c == '\\' && i + 1 < chars.len() {
            // Escapes protect the following codepoint.
            word.push(chars[i + 1]);
            i += 2;
            continue;
        }

        if let Some(term) = match_prefix(TERMINATORS, &rest) {
            flush_word(&mut word, &mut fields, &mut pending_redirect);
            out.push((term.to_string(), std::mem::take(&mut fields)));
            i += term.chars().count();
            continue;
        }

        if let Some(op) = match_prefix(REDIRECT_OPERATORS, &rest) {
            // An optional numeric word directly before the operator is
            // the port selector.
            let port = if pending_redirect.is_none() && !word.is_empty() {
                word.parse::<u32>().ok().inspect(|_| word.clear())
            } else {
                None
            };
            flush_word(&mut word, &mut fields, &mut pending_redirect);
            pending_redirect = Some((op.to_string(), port));
            i += op.chars().count();
            continue;
        }

        word.push(c);
        i += 1;
    }

    flush_word(&mut word, &mut fields, &mut pending_redirect);
    if !fields.is_empty() {
        out.push((String::new(), fields));
    }
    out
}

fn reduce(groups: &mut std::vec::IntoIter<(String, Vec<FieldExpr>)>) -> Procedure {
    let mut steps: Vec<Step> = Vec::new();
    let mut conditions: Vec<Condition> = Vec::new();

    while let Some((term, fields)) = groups.next() {
        let inst = Instruction::isolate(fields);

        match term.as_str() {
            "" | "&" | "&&" | "&*" | "&+" | "&-" | "&#" => {
                steps.push(Step::Instruction(inst));
                conditions.push(Condition::of(&term));
            }
            "|" | "|#" => {
                // A composition: accumulate parts until a non-pipe
                // terminator closes it.
                let mut parts: Vec<Step> = Vec::new();
                let mut head: Vec<Redirection> = Vec::new();
                let mut tail: Vec<Redirection> = Vec::new();

                if inst.empty() && !inst.redirects.is_empty() {
                    // A redirect-only leader distributes its standard
                    // redirections across the composition's edges.
                    for r in inst.redirects {
                        let port = r.port.or_else(|| r.default_port());
                        if r.operator.starts_with('^') {
                            let (ri, ro) = r.split();
                            head.push(ri);
                            tail.push(ro);
                        } else if port == Some(0) && r.operator.starts_with('<') {
                            head.push(r);
                        } else if port == Some(1) && r.operator.starts_with('>') {
                            tail.push(r);
                        } else {
                            head.push(r);
                        }
                    }
                } else {
                    parts.push(Step::Instruction(inst));
                }

                let mut skip = term == "|#";
                let mut closing = Condition::Always;

                while let Some((ct, cfields)) = groups.next() {
                    let part = Instruction::isolate(cfields);
                    if skip {
                        skip = false;
                    } else {
                        parts.push(Step::Instruction(part));
                    }

                    match ct.as_str() {
                        "|" => continue,
                        "|#" => {
                            skip = true;
                            continue;
                        }
                        "||" | "||#" => {
                            // Precedence switch inside a composition: the
                            // remainder reduces independently and joins as
                            // a trailing part.
                            let mut rest = reduce(groups);
                            if ct == "||#" && !rest.steps.is_empty() {
                                rest.steps.remove(0);
                                rest.conditions.remove(0);
                            }
                            if !rest.empty() {
                                parts.push(Step::Procedure(rest));
                            }
                            break;
                        }
                        other => {
                            closing = Condition::of(other);
                            break;
                        }
                    }
                }

                // Re-attach the distributed redirects to the edges.
                if !head.is_empty() {
                    if let Some(Step::Instruction(first)) = parts.first_mut() {
                        first.redirects.extend(head);
                    }
                }
                if !tail.is_empty() {
                    if let Some(Step::Instruction(last)) = parts.last_mut() {
                        last.redirects.extend(tail);
                    }
                }

                if parts.len() == 1 {
                    steps.push(parts.remove(0));
                } else {
                    steps.push(Step::Composition(Composition { parts }));
                }
                conditions.push(closing);
            }
            "||" | "||#" => {
                // Precedence switch: the procedure so far leads a
                // composition with the structure of the remainder.
                if !inst.empty() || !inst.redirects.is_empty() {
                    steps.push(Step::Instruction(inst));
                    conditions.push(Condition::Always);
                }
                let lead = Procedure { steps, conditions };
                let mut rest = reduce(groups);
                if term == "||#" && !rest.steps.is_empty() {
                    rest.steps.remove(0);
                    rest.conditions.remove(0);
                }

                let mut parts: Vec<Step> = vec![Step::Procedure(lead)];
                if !rest.empty() {
                    parts.push(Step::Procedure(rest));
                }
                return Procedure {
                    steps: vec![Step::Composition(Composition { parts })],
                    conditions: vec![Condition::Always],
                };
            }
            _ => {
                steps.push(Step::Instruction(inst));
                conditions.push(Condition::Always);
            }
        }
    }

    // Drop trailing empty instructions produced by dangling terminators.
    while let Some(Step::Instruction(i)) = steps.last() {
        if i.empty() && i.redirects.is_empty() {
            steps.pop();
            conditions.pop();
        } else {
            break;
        }
    }

    Procedure { steps, conditions }
}

/// Parse a prompt command line into its procedure.
pub fn structure(text: &str) -> Procedure {
    let groups = terminate(text);
    reduce(&mut groups.into_iter())
}

/// The prompt's revision stack.
///
/// Revision merge discards consecutive equal revisions and keeps the
/// latest; stepping moves through the deduplicated history.
#[derive(Debug, Default, Clone)]
pub struct Revisions {
    entries: Vec<String>,
    cursor: usize,
}

impl Revisions {
    pub fn record(&mut self, command: impl Into<String>) {
        let command = command.into();
        if command.is_empty() {
            return;
        }
        if self.entries.last() == Some(&command) {
            // Consecutive equals merge to the latest.
            self.cursor = self.entries.len();
            return;
        }
        self.entries.push(command);
        self.cursor = self.entries.len();
    }

    /// Step backwards (`n < 0`) or forwards through the history.
    pub fn revise(&mut self, n: isize) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let target = self.cursor as isize + n;
        let target = target.clamp(0, self.entries.len() as isize - 1) as usize;
        self.cursor = target;
        self.entries.get(target).map(String::as_str)
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(p: &Procedure, i: usize) -> &Instruction {
        match &p.steps[i] {
            Step::Instruction(inst) => inst,
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    #[test]
    fn single_instruction() {
        let p = structure("make all");
        assert_eq!(p.steps.len(), 1);
        assert_eq!(inst(&p, 0).fields, vec!["make", "all"]);
        assert_eq!(p.conditions[0], Condition::Always);
    }

    #[test]
    fn sequential_conditions() {
        let p = structure("configure & build &+ test &- report &# never");
        assert_eq!(p.steps.len(), 5);
        assert_eq!(
            p.conditions,
            vec![
                Condition::Always,
                Condition::Completed,
                Condition::Failed,
                Condition::Never,
                Condition::Always,
            ]
        );
        assert!(inst(&p, 4).invokes("never"));
    }

    #[test]
    fn composition_parts() {
        let p = structure("sort | uniq | head");
        assert_eq!(p.steps.len(), 1);
        match &p.steps[0] {
            Step::Composition(c) => {
                assert_eq!(c.parts.len(), 3);
                assert_eq!(c.title(), "sort->head");
            }
            other => panic!("expected composition, got {other:?}"),
        }
    }

    #[test]
    fn composition_then_sequence() {
        let p = structure("grep err | wc &+ echo ok");
        assert_eq!(p.steps.len(), 2);
        assert!(matches!(p.steps[0], Step::Composition(_)));
        assert_eq!(p.conditions[1], Condition::Completed);
        assert!(inst(&p, 1).invokes("echo"));
    }

    #[test]
    fn redirects_isolated_from_fields() {
        let p = structure("run > out.log < in.txt");
        let i = inst(&p, 0);
        assert_eq!(i.fields, vec!["run"]);
        assert_eq!(i.redirects.len(), 2);
        assert_eq!(i.redirects[0].operator, ">");
        assert_eq!(i.redirects[0].operand, "out.log");
        assert_eq!(i.redirects[1].operator, "<");
        assert_eq!(i.redirects[1].operand, "in.txt");
    }

    #[test]
    fn redirect_ports() {
        let p = structure("cmd 2> errors");
        let i = inst(&p, 0);
        assert_eq!(i.redirects[0].port, Some(2));
        assert_eq!(i.redirects[0].operand, "errors");

        let d = Redirection::new("<", None, "x");
        assert_eq!(d.default_port(), Some(0));
        let d = Redirection::new(">>", None, "x");
        assert_eq!(d.default_port(), Some(1));
        let d = Redirection::new("<<", None, "doc");
        assert_eq!(d.default_port(), Some(3));
    }

    #[test]
    fn heredoc_redirects_extend() {
        let p = structure("cmd << one << two");
        let i = inst(&p, 0);
        assert_eq!(i.redirects.len(), 1);
        assert_eq!(i.redirects[0].operand, "onetwo");
    }

    #[test]
    fn combination_splits() {
        let r = Redirection::new("^", None, "buffer");
        let (input, output) = r.split();
        assert_eq!(input.operator, "<");
        assert_eq!(input.port, Some(0));
        assert_eq!(output.operator, ">");
        assert_eq!(output.port, Some(1));
        assert_eq!(output.operand, "buffer");

        let r = Redirection::new("^>", None, "acc");
        let (_, output) = r.split();
        assert_eq!(output.operator, ">>");
    }

    #[test]
    fn precedence_switch() {
        let p = structure("a | b || c");
        // The remainder composes with the pipeline as a trailing part.
        match &p.steps[0] {
            Step::Composition(c) => {
                assert!(c.parts.len() >= 3);
            }
            other => panic!("expected composition, got {other:?}"),
        }
    }

    #[test]
    fn literals_protect_operators() {
        let p = structure("echo \"a | b > c\"");
        let i = inst(&p, 0);
        assert_eq!(i.fields.len(), 2);
        assert!(i.redirects.is_empty());
        assert_eq!(i.fields[1], "a | b > c");
    }

    #[test]
    fn comments_excluded() {
        let p = structure("build # everything after is noise | x > y");
        assert_eq!(p.steps.len(), 1);
        let i = inst(&p, 0);
        assert_eq!(i.fields, vec!["build"]);
        assert!(i.redirects.is_empty());
    }

    #[test]
    fn condition_skip_semantics() {
        assert!(!Condition::Always.skips(0));
        assert!(!Condition::Always.skips(9));
        assert!(Condition::Never.skips(0));
        assert!(Condition::Completed.skips(1));
        assert!(!Condition::Completed.skips(0));
        assert!(Condition::Failed.skips(0));
        assert!(!Condition::Failed.skips(2));
    }

    #[test]
    fn revisions_merge_consecutive_equals() {
        let mut r = Revisions::default();
        r.record("make");
        r.record("make");
        r.record("make test");
        r.record("make test");
        assert_eq!(r.len(), 2);
        assert_eq!(r.latest(), Some("make test"));

        assert_eq!(r.revise(-1), Some("make test"));
        assert_eq!(r.revise(-1), Some("make"));
        assert_eq!(r.revise(-1), Some("make"), "clamped at the oldest");
        assert_eq!(r.revise(1), Some("make test"));
    }
}
