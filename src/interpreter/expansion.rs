//! The expansion engine: turns a [`WordNode`] into its final argument
//! string(s) against the current [`ExecutionContext`]. The pass order —
//! brace → variable/substitution/arithmetic → concat → glob — is
//! load-bearing: swapping brace and variable would let `{$A,$B}` behave
//! differently than real shells, and globbing after concatenation is
//! what keeps `"*.t"xt` from globbing.

use std::future::Future;
use std::pin::Pin;

use crate::ast::{ArithBinOp, ArithExpr, ArithUnOp, WordNode};
use regex_lite::Regex;

use super::engine::Engine;
use super::types::ExecutionContext;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Whether a leaf node's expanded value is eligible to drive glob
/// expansion. Quoted fragments do not participate in globbing: `Quoted`
/// and single-quoted `Literal` text never are eligible; everything that
/// can carry a runtime value in unquoted position is.
fn is_glob_eligible(node: &WordNode) -> bool {
    matches!(
        node,
        WordNode::Glob(_) | WordNode::Unquoted(_) | WordNode::Variable(_) | WordNode::Substitution(_) | WordNode::Arithmetic(_)
    )
}

/// Something went wrong evaluating a word — an expansion-time failure
/// (invalid arithmetic, etc). Always becomes an `sh: …` stderr line and
/// exit code 1 for the enclosing command; never aborts the run the way a
/// lex/parse error does.
#[derive(Debug, Clone)]
pub struct ExpansionError(pub String);

impl std::fmt::Display for ExpansionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Engine {
    /// Expands a single top-level word into one or more argument strings.
    /// Brace expansion and glob expansion are the only steps that can
    /// multiply one word into many; everything else maps 1:1.
    pub async fn expand_word(
        &self,
        word: &WordNode,
        ctx: &mut ExecutionContext,
    ) -> Result<Vec<String>, ExpansionError> {
        let parts = flatten(word);
        let templates = brace_expand_parts(&parts);

        let mut out = Vec::with_capacity(templates.len());
        for template in templates {
            let mut combined = String::new();
            let mut glob_eligible = false;
            for part in &template {
                match part {
                    Part::Literal(s, eligible) => {
                        combined.push_str(s);
                        glob_eligible |= *eligible;
                    }
                    Part::Node(node) => {
                        glob_eligible |= is_glob_eligible(node);
                        combined.push_str(&self.expand_single(node, ctx).await?);
                    }
                }
            }
            if glob_eligible && has_unescaped_glob_chars(&combined) {
                out.extend(self.glob_expand(&combined, ctx).await);
            } else {
                out.push(combined);
            }
        }
        Ok(out)
    }

    /// Expands a `case` arm pattern: variable/substitution/arithmetic and
    /// brace expansion run, but the result is never matched against the
    /// filesystem — `case` patterns use glob *syntax* against the subject
    /// string, not pathname expansion, so `*)` must stay the literal
    /// two-character pattern rather than list every file in `cwd`.
    pub async fn expand_case_pattern(
        &self,
        word: &WordNode,
        ctx: &mut ExecutionContext,
    ) -> Result<Vec<String>, ExpansionError> {
        let parts = flatten(word);
        let templates = brace_expand_parts(&parts);
        let mut out = Vec::with_capacity(templates.len());
        for template in templates {
            let mut combined = String::new();
            for part in &template {
                match part {
                    Part::Literal(s, _) => combined.push_str(s),
                    Part::Node(node) => combined.push_str(&self.expand_single(node, ctx).await?),
                }
            }
            out.push(combined);
        }
        Ok(out)
    }

    /// Expands a whole word list (a command's argv, a `for` item list,
    /// …), flattening each word's possibly-multiple expansions into one
    /// argument stream.
    pub async fn expand_words(
        &self,
        words: &[WordNode],
        ctx: &mut ExecutionContext,
    ) -> Result<Vec<String>, ExpansionError> {
        let mut out = Vec::new();
        for word in words {
            out.extend(self.expand_word(word, ctx).await?);
        }
        Ok(out)
    }

    /// Expands a node that isn't a top-level brace group — the
    /// "variable/substitution/arithmetic" step of the pipeline. `Concat`
    /// only reaches here nested inside a `Quoted` wrapper (a top-level
    /// `Concat` is unwrapped into separate parts by [`flatten`] before
    /// this is ever called); `Quoted` recurses into its inner node,
    /// evaluating its value without re-entering brace/glob expansion.
    fn expand_single<'a>(&'a self, node: &'a WordNode, ctx: &'a mut ExecutionContext) -> BoxFuture<'a, Result<String, ExpansionError>> {
        Box::pin(async move {
            match node {
                WordNode::Literal(s) | WordNode::Unquoted(s) => Ok(s.clone()),
                WordNode::Glob(pattern) => Ok(pattern.clone()),
                WordNode::Variable(name) => Ok(ctx.get_var(name).unwrap_or("").to_string()),
                WordNode::Substitution(ast) => self.run_substitution(ast, ctx).await,
                WordNode::Arithmetic(expr) => {
                    let value = eval_arith(expr, ctx)?;
                    Ok(value.to_string())
                }
                WordNode::Quoted(inner) => self.expand_single(inner, ctx).await,
                WordNode::Concat(parts) => {
                    let mut combined = String::new();
                    for part in parts {
                        combined.push_str(&self.expand_single(part, ctx).await?);
                    }
                    Ok(combined)
                }
            }
        })
    }

    /// Expands a word the way an assignment right-hand side does: variable,
    /// command-substitution, and arithmetic expansion run, but brace and
    /// glob expansion do not — an assignment is always exactly one word,
    /// never multiplied or pathname-expanded.
    pub async fn expand_word_scalar(
        &self,
        word: &WordNode,
        ctx: &mut ExecutionContext,
    ) -> Result<String, ExpansionError> {
        let mut combined = String::new();
        for part in flatten(word) {
            combined.push_str(&self.expand_single(part, ctx).await?);
        }
        Ok(combined)
    }

    /// Runs a `$(...)` sub-AST to completion with a fresh `OutputCollector`
    /// wired to its stdout, inheriting env/cwd but never leaking
    /// mutations back to the caller. Trailing newlines are stripped from
    /// the captured text, matching every POSIX shell's command
    /// substitution.
    pub(crate) async fn run_substitution(
        &self,
        ast: &crate::ast::AstNode,
        ctx: &mut ExecutionContext,
    ) -> Result<String, ExpansionError> {
        let mut child_ctx = ctx.fork();
        let collector = crate::streams::OutputCollector::with_limit(self.limits.max_output_bytes);
        let stdout = crate::streams::Stdout::collector(collector.clone(), false);
        let stderr = crate::streams::Stderr::null();
        self.exec_node(&mut child_ctx, ast, crate::streams::Stdin::empty(), stdout, stderr)
            .await
            .map_err(|e| ExpansionError(e.to_string()))?;
        let bytes = collector.bytes().await;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.trim_end_matches('\n').to_string())
    }

    /// Translates `pattern` to a regex and matches it against every path
    /// the filesystem knows about. Returns the sorted absolute matches,
    /// or the literal pattern unchanged if nothing matched (this crate's
    /// `nullglob` is always off).
    async fn glob_expand(&self, pattern: &str, ctx: &ExecutionContext) -> Vec<String> {
        let absolute = if pattern.starts_with('/') {
            pattern.to_string()
        } else {
            self.fs.resolve_path(&ctx.cwd, pattern)
        };
        let regex = match Regex::new(&glob_to_regex(&absolute)) {
            Ok(r) => r,
            Err(_) => return vec![pattern.to_string()],
        };
        let mut matches: Vec<String> =
            self.fs.get_all_paths().into_iter().filter(|p| regex.is_match(p)).collect();
        if matches.is_empty() {
            return vec![pattern.to_string()];
        }
        matches.sort();
        matches.dedup();
        matches
    }
}

/// One piece of a (possibly brace-multiplied) word template. The `bool`
/// on `Literal` tracks whether the text it replaced was glob-eligible
/// (it only ever comes from brace-expanding an `Unquoted`/`Glob` part).
enum Part<'a> {
    Literal(String, bool),
    Node(&'a WordNode),
}

/// Flattens a word into its ordered list of parts: a bare node becomes a
/// single-element list, `Concat`/`MergedCluster` contents are listed in
/// order.
fn flatten(word: &WordNode) -> Vec<&WordNode> {
    match word {
        WordNode::Concat(parts) => parts.iter().collect(),
        other => vec![other],
    }
}

/// Brace-expands `{a,b,c}` groups inside `Literal`/`Unquoted`/`Glob` parts
/// (quoted fragments arrive as `Literal` only when they came from a
/// single/double-quoted token — brace expansion runs only on unquoted
/// text, which this crate also extends to `Glob` text: the lexer's
/// Word-vs-Glob split is a lexing nicety, not a brace-eligibility
/// boundary, so `file{1,2}*.txt` still brace-expands before the `*`
/// globs, in a single explicit pass — see DESIGN.md), then takes the
/// cartesian product across parts that had more than one alternative so
/// non-brace parts (variables, substitutions, globs) still expand
/// independently per resulting word.
fn brace_expand_parts(parts: &[&WordNode]) -> Vec<Vec<Part<'_>>> {
    let mut templates: Vec<Vec<Part>> = vec![Vec::new()];
    for part in parts {
        let alternatives: Vec<String> = match part {
            WordNode::Unquoted(text) | WordNode::Glob(text) => {
                let expanded = expand_braces(text);
                if expanded.len() == 1 && expanded[0] == *text {
                    Vec::new() // no brace group present — keep as a live node
                } else {
                    expanded
                }
            }
            _ => Vec::new(),
        };

        if alternatives.is_empty() {
            for t in &mut templates {
                t.push(Part::Node(part));
            }
        } else {
            let mut next = Vec::with_capacity(templates.len() * alternatives.len());
            for t in &templates {
                for alt in &alternatives {
                    let mut cloned: Vec<Part> = t.iter().map(clone_part).collect();
                    cloned.push(Part::Literal(alt.clone(), true));
                    next.push(cloned);
                }
            }
            templates = next;
        }
    }
    templates
}

fn clone_part<'a>(part: &Part<'a>) -> Part<'a> {
    match part {
        Part::Literal(s, eligible) => Part::Literal(s.clone(), *eligible),
        Part::Node(n) => Part::Node(n),
    }
}

/// Expands top-level `{a,b,c}` groups in `text` into their literal
/// alternatives. Nested groups expand outside-in. Returns `vec![text]`
/// unchanged (by value-equality to the input) when there is no brace
/// group to expand.
fn expand_braces(text: &str) -> Vec<String> {
    if let Some((prefix, group, suffix)) = find_top_level_group(text) {
        let options = split_top_level_commas(&group);
        if options.len() < 2 {
            // `{solo}` with no comma is not a brace group in POSIX shells.
            return vec![text.to_string()];
        }
        let mut out = Vec::new();
        for option in options {
            for suffix_expanded in expand_braces(&suffix) {
                out.push(format!("{prefix}{option}{suffix_expanded}"));
            }
        }
        // Re-scan each result for further (previously nested) groups.
        out.into_iter().flat_map(|s| expand_braces(&s)).collect()
    } else {
        vec![text.to_string()]
    }
}

/// Finds the first top-level `{...}` group in `text`, returning
/// `(prefix, inner, suffix)`.
fn find_top_level_group(text: &str) -> Option<(String, String, String)> {
    let bytes: Vec<char> = text.chars().collect();
    let start = bytes.iter().position(|&c| c == '{')?;
    let mut depth = 0i32;
    let mut end = None;
    for (i, &c) in bytes.iter().enumerate().skip(start) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    let prefix: String = bytes[..start].iter().collect();
    let inner: String = bytes[start + 1..end].iter().collect();
    let suffix: String = bytes[end + 1..].iter().collect();
    Some((prefix, inner, suffix))
}

fn split_top_level_commas(text: &str) -> Vec<String> {
    let mut depth = 0i32;
    let mut current = String::new();
    let mut out = Vec::new();
    for c in text.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                out.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    out.push(current);
    out
}

/// Whether `s` contains an unescaped glob metacharacter — used to decide
/// whether a brace alternative that introduced `*`/`?`/`[...]` should
/// still glob-expand even though the originating token wasn't lexed as a
/// `Glob` (see the brace/glob interaction note above).
fn has_unescaped_glob_chars(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[')
}

/// Translates a shell glob pattern to an anchored regex: `*` → `[^/]*`,
/// `**` → `.*`, `?` → `[^/]`, `[...]` passes through with `!` negation
/// rewritten to `^`, other regex metacharacters escaped.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for cc in chars.by_ref() {
                    out.push(cc);
                    if cc == ']' {
                        break;
                    }
                }
            }
            '.' | '+' | '^' | '$' | '(' | ')' | '|' | '\\' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}

/// Evaluates a `$((...))` expression. Undefined or non-numeric variables
/// resolve to `0` (see DESIGN.md): it composes with `i64` arithmetic and
/// is the more testable of the two defensible choices.
pub fn eval_arith(expr: &ArithExpr, ctx: &ExecutionContext) -> Result<i64, ExpansionError> {
    match expr {
        ArithExpr::Number(n) => Ok(*n),
        ArithExpr::Var(name) => Ok(ctx.get_var(name).and_then(|v| v.trim().parse::<i64>().ok()).unwrap_or(0)),
        ArithExpr::Unary(op, inner) => {
            let v = eval_arith(inner, ctx)?;
            Ok(match op {
                ArithUnOp::Neg => -v,
                ArithUnOp::Not => (v == 0) as i64,
            })
        }
        ArithExpr::Binary(op, left, right) => {
            let l = eval_arith(left, ctx)?;
            let r = eval_arith(right, ctx)?;
            Ok(match op {
                ArithBinOp::Add => l + r,
                ArithBinOp::Sub => l - r,
                ArithBinOp::Mul => l * r,
                ArithBinOp::Div => {
                    if r == 0 {
                        return Err(ExpansionError("division by 0".to_string()));
                    }
                    l / r
                }
                ArithBinOp::Mod => {
                    if r == 0 {
                        return Err(ExpansionError("division by 0".to_string()));
                    }
                    l % r
                }
                ArithBinOp::Eq => (l == r) as i64,
                ArithBinOp::Ne => (l != r) as i64,
                ArithBinOp::Lt => (l < r) as i64,
                ArithBinOp::Le => (l <= r) as i64,
                ArithBinOp::Gt => (l > r) as i64,
                ArithBinOp::Ge => (l >= r) as i64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brace_expansion_splits_on_top_level_commas() {
        assert_eq!(expand_braces("a{b,c,d}e"), vec!["abe", "ace", "ade"]);
    }

    #[test]
    fn brace_expansion_nested() {
        assert_eq!(expand_braces("{a,b{1,2}}"), vec!["a", "b1", "b2"]);
    }

    #[test]
    fn solo_brace_without_comma_is_literal() {
        assert_eq!(expand_braces("{solo}"), vec!["{solo}"]);
    }

    #[test]
    fn glob_translation_handles_star_and_question() {
        assert_eq!(glob_to_regex("/a*.txt"), "^/a[^/]*\\.txt$");
        assert_eq!(glob_to_regex("/a?.txt"), "^/a[^/].txt$");
    }

    #[test]
    fn glob_translation_double_star_crosses_segments() {
        assert_eq!(glob_to_regex("/a/**/b"), "^/a/.*/b$");
    }
}
