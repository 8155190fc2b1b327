//! In-proc evaluation of `if [not] exist <path> <command>` and
//! `if [/i] [not] A==B <command>`, the bounded subset of conditional
//! dispatch the distilled spec calls out by name rather than delegating
//! to a sub-shell.

use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfCondition {
    Exist { path: String, negate: bool },
    Equal { lhs: String, rhs: String, negate: bool, case_insensitive: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStatement {
    pub condition: IfCondition,
    pub remainder: Vec<String>,
}

/// Parse the argv of an `if ...` command (argv[0] == "if"). Returns
/// `None` if the condition grammar is not recognized; callers should
/// treat an unparsable `if` as a fatal classification error rather than
/// silently falling through.
pub fn parse_if(argv: &[String]) -> Option<IfStatement> {
    let mut i = 1;
    let mut negate = false;
    let mut case_insensitive = false;
    loop {
        match argv.get(i).map(|s| s.as_str()) {
            Some("not") => {
                negate = true;
                i += 1;
            }
            Some("/i") => {
                case_insensitive = true;
                i += 1;
            }
            _ => break,
        }
    }

    if argv.get(i).map(|s| s.eq_ignore_ascii_case("exist")) == Some(true) {
        let path = argv.get(i + 1)?.clone();
        let remainder = argv.get(i + 2..)?.to_vec();
        if remainder.is_empty() {
            return None;
        }
        return Some(IfStatement {
            condition: IfCondition::Exist { path, negate },
            remainder,
        });
    }

    let candidate = argv.get(i)?;
    let (lhs, rhs) = split_equality(candidate)?;
    let remainder = argv.get(i + 1..)?.to_vec();
    if remainder.is_empty() {
        return None;
    }
    Some(IfStatement {
        condition: IfCondition::Equal { lhs, rhs, negate, case_insensitive },
        remainder,
    })
}

fn split_equality(token: &str) -> Option<(String, String)> {
    let idx = token.find("==")?;
    let (lhs, rest) = token.split_at(idx);
    Some((lhs.to_string(), rest[2..].to_string()))
}

/// Evaluate `condition` against `cwd` for path existence checks.
pub fn evaluate(condition: &IfCondition, cwd: &Path) -> bool {
    let raw = match condition {
        IfCondition::Exist { path, negate } => {
            let resolved = cwd.join(path);
            let exists = resolved.metadata().is_ok();
            *negate ^ exists
        }
        IfCondition::Equal { lhs, rhs, negate, case_insensitive } => {
            let eq = if *case_insensitive {
                lhs.eq_ignore_ascii_case(rhs)
            } else {
                lhs == rhs
            };
            *negate ^ eq
        }
    };
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_exist_condition() {
        let stmt = parse_if(&["if".into(), "exist".into(), "a.txt".into(), "echo".into(), "hi".into()]).unwrap();
        assert_eq!(stmt.condition, IfCondition::Exist { path: "a.txt".into(), negate: false });
        assert_eq!(stmt.remainder, vec!["echo", "hi"]);
    }

    #[test]
    fn parses_negated_exist() {
        let stmt = parse_if(&["if".into(), "not".into(), "exist".into(), "a.txt".into(), "echo".into()]).unwrap();
        assert_eq!(stmt.condition, IfCondition::Exist { path: "a.txt".into(), negate: true });
    }

    #[test]
    fn parses_case_insensitive_equality() {
        let stmt = parse_if(&["if".into(), "/i".into(), "A==a".into(), "echo".into(), "yes".into()]).unwrap();
        assert_eq!(
            stmt.condition,
            IfCondition::Equal { lhs: "A".into(), rhs: "a".into(), negate: false, case_insensitive: true }
        );
    }

    #[test]
    fn evaluate_exist_checks_relative_to_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.txt"), b"x").unwrap();
        assert!(evaluate(
            &IfCondition::Exist { path: "present.txt".into(), negate: false },
            dir.path()
        ));
        assert!(!evaluate(
            &IfCondition::Exist { path: "missing.txt".into(), negate: false },
            dir.path()
        ));
    }

    #[test]
    fn evaluate_equality_respects_negation() {
        assert!(evaluate(
            &IfCondition::Equal { lhs: "a".into(), rhs: "b".into(), negate: true, case_insensitive: false },
            Path::new(".")
        ));
    }
}
