//! Main parse loop: turns logical lines into scope assignments, explicit
//! rule declarations, inference rules, and `.PHONY` hints, following
//! `!include` into nested scopes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::ast::{CommandModifiers, InferenceRule, RawRecipeLine, ScopeId, VarFlavor};
use crate::error::{EngineError, SourceLocation};
use crate::lexer::{decode_source, logical_lines, LogicalLine, NoPseudoVars, VariableResolver};

use super::directives::{eval_if_expr, is_defined, ConditionalStack};
use super::scope::ScopeArena;
use super::types::{ExplicitRuleDecl, ParsedMakefile};

pub struct ParseContext<'a> {
    pub overrides: &'a HashMap<String, String>,
    pub env: &'a HashMap<String, String>,
}

struct ParseState<'a> {
    ctx: ParseContext<'a>,
    scopes: ScopeArena,
    rules: Vec<ExplicitRuleDecl>,
    phony_names: Vec<String>,
    default_target: Option<String>,
}

/// Parse `path` (and anything it `!include`s) into a [`ParsedMakefile`].
pub fn parse_makefile(path: &Path, ctx: ParseContext<'_>) -> Result<ParsedMakefile, EngineError> {
    let mut state = ParseState {
        ctx,
        scopes: ScopeArena::new(),
        rules: Vec::new(),
        phony_names: Vec::new(),
        default_target: None,
    };
    let directory = path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let root_scope = state.scopes.create(directory, None);
    parse_file(&mut state, path, root_scope)?;

    Ok(ParsedMakefile {
        scopes: state.scopes,
        rules: state.rules,
        root_scope,
        default_target: state.default_target,
        phony_names: state.phony_names,
    })
}

fn parse_file(state: &mut ParseState<'_>, path: &Path, scope: ScopeId) -> Result<(), EngineError> {
    let bytes = std::fs::read(path).map_err(|e| EngineError::IoError {
        operation: format!("reading makefile '{}'", path.display()),
        source: e,
    })?;
    let source = decode_source(&bytes);
    let lines = logical_lines(&source);
    parse_lines(state, path, &lines, scope)
}

fn parse_lines(
    state: &mut ParseState<'_>,
    path: &Path,
    lines: &[LogicalLine],
    scope: ScopeId,
) -> Result<(), EngineError> {
    let mut conditional = ConditionalStack::new();
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        let loc = SourceLocation {
            file: path.to_path_buf(),
            line: line.line,
            column: 1,
        };

        if line.is_recipe {
            // A recipe line with no preceding rule header is a parse error
            // unless we're inside a skipped conditional branch.
            if conditional.honoring() {
                return Err(EngineError::ParseError {
                    message: "recipe line with no target".to_string(),
                    location: loc,
                });
            }
            i += 1;
            continue;
        }

        let trimmed = line.text.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        if let Some(directive) = trimmed.strip_prefix('!') {
            handle_directive(state, path, scope, directive.trim(), &mut conditional, &loc)?;
            i += 1;
            continue;
        }

        if !conditional.honoring() {
            i += 1;
            continue;
        }

        if let Some((name, raw_value, flavor)) = try_parse_assignment(&line.text) {
            let resolver = make_resolver(state, scope);
            let value = match flavor {
                VarFlavor::Eager => {
                    resolver
                        .expand(&raw_value, &NoPseudoVars, &loc)?
                        .text
                }
                VarFlavor::Lazy => raw_value,
            };
            state.scopes.set_variable(scope, &name, value, flavor);
            i += 1;
            continue;
        }

        if let Some(colon_idx) = find_rule_colon(&line.text) {
            let lhs = line.text[..colon_idx].to_string();
            let rhs = line.text[colon_idx + 1..].to_string();
            let resolver = make_resolver(state, scope);
            let lhs_expanded = resolver.expand(&lhs, &NoPseudoVars, &loc)?.text;
            let rhs_expanded = resolver.expand(&rhs, &NoPseudoVars, &loc)?.text;

            // Collect the tab-indented recipe lines immediately following.
            let mut recipe_lines = Vec::new();
            let mut j = i + 1;
            while j < lines.len() && lines[j].is_recipe {
                recipe_lines.push(parse_recipe_line(&lines[j].text));
                j += 1;
            }

            if let Some(inference) = try_parse_inference_header(&lhs_expanded) {
                let rule = InferenceRule {
                    from_ext: inference.0,
                    to_ext: inference.1,
                    recipe: recipe_lines,
                };
                state.scopes.get_mut(scope).inference_rules.push(rule);
                i = j;
                continue;
            }

            let targets: Vec<&str> = lhs_expanded.split_whitespace().collect();
            let deps: Vec<String> = rhs_expanded.split_whitespace().map(|s| s.to_string()).collect();

            for target_name in targets {
                if target_name.eq_ignore_ascii_case(".PHONY") {
                    state.phony_names.extend(deps.iter().cloned());
                    continue;
                }
                let is_first_with_deps =
                    state.default_target.is_none() && !deps.is_empty();
                if is_first_with_deps {
                    state.default_target = Some(target_name.to_string());
                }
                state.rules.push(ExplicitRuleDecl {
                    scope,
                    target_name: target_name.to_string(),
                    deps: deps.clone(),
                    recipe: if recipe_lines_is_empty(&recipe_lines) {
                        None
                    } else {
                        Some(recipe_lines.clone())
                    },
                    location: loc.clone(),
                });
            }
            i = j;
            continue;
        }

        return Err(EngineError::ParseError {
            message: format!("unrecognized construct: '{}'", line.text),
            location: loc,
        });
    }
    Ok(())
}

fn recipe_lines_is_empty(lines: &[RawRecipeLine]) -> bool {
    lines.is_empty()
}

fn make_resolver<'a>(state: &'a ParseState<'_>, scope: ScopeId) -> VariableResolver<'a> {
    VariableResolver {
        overrides: state.ctx.overrides,
        scope_chain: state.scopes.variable_chain(scope),
        env: state.ctx.env,
    }
}

fn handle_directive(
    state: &mut ParseState<'_>,
    path: &Path,
    scope: ScopeId,
    directive: &str,
    conditional: &mut ConditionalStack,
    loc: &SourceLocation,
) -> Result<(), EngineError> {
    let (keyword, rest) = split_first_word(directive);
    match keyword.to_ascii_lowercase().as_str() {
        "if" => {
            let resolver = make_resolver(state, scope);
            let expanded = resolver.expand(rest, &NoPseudoVars, loc)?.text;
            conditional.push_if(eval_if_expr(&expanded));
        }
        "ifdef" => {
            let resolver = make_resolver(state, scope);
            conditional.push_if(is_defined(rest.trim(), &resolver, loc));
        }
        "ifndef" => {
            let resolver = make_resolver(state, scope);
            conditional.push_if(!is_defined(rest.trim(), &resolver, loc));
        }
        "elseif" => {
            let resolver = make_resolver(state, scope);
            let expanded = resolver.expand(rest, &NoPseudoVars, loc)?.text;
            conditional.elseif_branch(eval_if_expr(&expanded));
        }
        "elseifdef" => {
            let resolver = make_resolver(state, scope);
            let defined = is_defined(rest.trim(), &resolver, loc);
            conditional.elseif_branch(defined);
        }
        "elseifndef" => {
            let resolver = make_resolver(state, scope);
            let defined = is_defined(rest.trim(), &resolver, loc);
            conditional.elseif_branch(!defined);
        }
        "else" => {
            conditional.else_branch();
        }
        "endif" => {
            if conditional.pop_endif().is_none() {
                return Err(EngineError::ParseError {
                    message: "!endif without matching !if".to_string(),
                    location: loc.clone(),
                });
            }
        }
        "include" if conditional.honoring() => {
            let resolver = make_resolver(state, scope);
            let included = resolver.expand(rest.trim(), &NoPseudoVars, loc)?.text;
            let included_path = resolve_include_path(state.scopes.directory(scope), &included);
            let child_scope = state
                .scopes
                .create(
                    included_path
                        .parent()
                        .map(|p| p.to_path_buf())
                        .unwrap_or_else(|| PathBuf::from(".")),
                    Some(scope),
                );
            parse_file(state, &included_path, child_scope)?;
        }
        "error" if conditional.honoring() => {
            let resolver = make_resolver(state, scope);
            let message = resolver.expand(rest, &NoPseudoVars, loc)?.text;
            return Err(EngineError::ParseError {
                message,
                location: loc.clone(),
            });
        }
        "message" if conditional.honoring() => {
            let resolver = make_resolver(state, scope);
            let message = resolver.expand(rest, &NoPseudoVars, loc)?.text;
            eprintln!("{}", message);
        }
        _ => {}
    }
    Ok(())
}

fn resolve_include_path(base_dir: &Path, included: &str) -> PathBuf {
    let candidate = Path::new(included);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    }
}

fn split_first_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    }
}

/// `NAME = value` (lazy) or `NAME := value` (eager). Rejects anything
/// whose left-hand side isn't a bare identifier, so rule headers and
/// recipe-internal `=` (e.g. inside a quoted argument) are not mistaken
/// for assignments.
fn try_parse_assignment(line: &str) -> Option<(String, String, VarFlavor)> {
    let eq_idx = line.find('=')?;
    let (flavor, name_end) = if eq_idx > 0 && line.as_bytes()[eq_idx - 1] == b':' {
        (VarFlavor::Eager, eq_idx - 1)
    } else {
        (VarFlavor::Lazy, eq_idx)
    };
    let name = line[..name_end].trim();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    let value = line[eq_idx + 1..].trim_start().to_string();
    Some((name.to_string(), value, flavor))
}

/// Find the colon that separates a rule's target list from its
/// prerequisite list: the first `:` immediately followed by whitespace
/// or end-of-line. This deliberately does not treat a drive-letter colon
/// (`C:\path`, always followed by a path separator) as a rule separator.
fn find_rule_colon(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        if b != b':' {
            continue;
        }
        if idx + 1 == bytes.len() || bytes[idx + 1].is_ascii_whitespace() {
            return Some(idx);
        }
    }
    None
}

/// `.ext1.ext2` with no intervening whitespace: an inference-rule header.
fn try_parse_inference_header(lhs: &str) -> Option<(String, String)> {
    let lhs = lhs.trim();
    if !lhs.starts_with('.') || lhs.contains(char::is_whitespace) {
        return None;
    }
    let rest = &lhs[1..];
    let dot_idx = rest.find('.')?;
    let from_ext = rest[..dot_idx].to_string();
    let to_ext = rest[dot_idx + 1..].to_string();
    if from_ext.is_empty() || to_ext.is_empty() {
        return None;
    }
    Some((from_ext, to_ext))
}

fn parse_recipe_line(text: &str) -> RawRecipeLine {
    let body = text.strip_prefix('\t').unwrap_or(text);
    let mut modifiers = CommandModifiers::default();
    let mut rest = body;
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            Some('@') => {
                modifiers.silent = true;
                rest = chars.as_str();
            }
            Some('-') => {
                modifiers.ignore_errors = true;
                rest = chars.as_str();
            }
            Some('+') => {
                modifiers.force_subshell = true;
                rest = chars.as_str();
            }
            _ => break,
        }
    }
    RawRecipeLine {
        modifiers,
        text: rest.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_detects_lazy_and_eager() {
        let (name, value, flavor) = try_parse_assignment("CC = gcc").unwrap();
        assert_eq!(name, "CC");
        assert_eq!(value, "gcc");
        assert_eq!(flavor, VarFlavor::Lazy);

        let (name, value, flavor) = try_parse_assignment("CFLAGS := -O2").unwrap();
        assert_eq!(name, "CFLAGS");
        assert_eq!(value, "-O2");
        assert_eq!(flavor, VarFlavor::Eager);
    }

    #[test]
    fn rule_colon_ignores_drive_letters() {
        assert_eq!(find_rule_colon("all: build"), Some(3));
        assert!(find_rule_colon("copy C:\\src D:\\dst").is_none());
    }

    #[test]
    fn inference_header_parses_extensions() {
        assert_eq!(
            try_parse_inference_header(".c.obj"),
            Some(("c".to_string(), "obj".to_string()))
        );
        assert_eq!(try_parse_inference_header("all"), None);
    }

    #[test]
    fn recipe_line_strips_combined_sigils() {
        let parsed = parse_recipe_line("\t@-echo hi");
        assert!(parsed.modifiers.silent);
        assert!(parsed.modifiers.ignore_errors);
        assert_eq!(parsed.text, "echo hi");
    }
}
