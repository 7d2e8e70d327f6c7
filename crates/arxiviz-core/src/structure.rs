//! Structural gate: import repair, API renames, forbidden constructs, syntax.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::gate::{StructureCheck, StructureReport};
use crate::inspect;

/// APIs removed from Manim Community, with their replacements.
const RENAMED_APIS: &[(&str, &str)] = &[
    ("ShowCreation", "Create"),
    ("TextMobject", "Text"),
    ("TexMobject", "MathTex"),
    ("FadeInFrom", "FadeIn"),
];

static RENAME_RES: LazyLock<Vec<(Regex, &'static str, &'static str)>> = LazyLock::new(|| {
    RENAMED_APIS
        .iter()
        .map(|(old, new)| {
            let re = Regex::new(&format!(r"\b{old}\b")).expect("static regex");
            (re, *old, *new)
        })
        .collect()
});

static FORBIDDEN: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?m)^\s*(?:import|from)\s+os\b", "imports the os module"),
        (r"(?m)^\s*(?:import|from)\s+subprocess\b", "imports the subprocess module"),
        (r"(?m)(?:^|[^.\w])exec\s*\(", "calls exec()"),
        (r"(?m)(?:^|[^.\w])eval\s*\(", "calls eval()"),
        (r"__import__\s*\(", "calls __import__()"),
        (r"(?m)(?:^|[^.\w])open\s*\(", "calls open()"),
    ]
    .into_iter()
    .map(|(pattern, what)| (Regex::new(pattern).expect("static regex"), what))
    .collect()
});

static CONSTRUCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"def\s+construct\s*\(\s*self\b").expect("static regex"));

static BLOCK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:async\s+)?(?:def|class|if|elif|else|for|while|with|try|except|finally)\b",
    )
    .expect("static regex")
});

/// Lightweight static checks over generated scene code.
#[derive(Debug, Clone, Default)]
pub struct StructuralValidator;

impl StructuralValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, code: &str) -> StructureReport {
        let mut fixed = Vec::new();
        let mut issues = Vec::new();

        let (mut rewritten, inserted) = inspect::ensure_manim_import(code);
        if inserted {
            fixed.push("Added missing `from manim import *`".to_string());
        }

        for (re, old, new) in RENAME_RES.iter() {
            if re.is_match(&rewritten) {
                rewritten = re.replace_all(&rewritten, *new).into_owned();
                fixed.push(format!("Replaced removed API `{old}` with `{new}`"));
            }
        }

        let bare = blank_strings_and_comments(&rewritten);
        for (re, what) in FORBIDDEN.iter() {
            if re.is_match(&bare) {
                issues.push(format!("Disallowed construct: code {what}"));
            }
        }

        if inspect::scene_base_classes(&rewritten).is_empty() {
            issues.push("No Scene subclass found".to_string());
        } else if !CONSTRUCT_RE.is_match(&rewritten) {
            issues.push("Scene class has no construct(self) method".to_string());
        }

        issues.extend(scan_syntax(&rewritten));

        debug!(
            fixed = fixed.len(),
            issues = issues.len(),
            "structural validation finished"
        );

        StructureReport {
            valid: issues.is_empty(),
            code: rewritten,
            issues,
            fixed,
        }
    }
}

impl StructureCheck for StructuralValidator {
    fn check(&self, code: &str) -> StructureReport {
        self.validate(code)
    }
}

#[derive(Default)]
struct LogicalLine {
    start: usize,
    text: String,
    top_level_colon: bool,
}

impl LogicalLine {
    fn finish(&mut self, next_start: usize, issues: &mut Vec<String>) {
        let trimmed = self.text.trim();
        if BLOCK_HEADER_RE.is_match(trimmed) && !self.top_level_colon {
            issues.push(format!(
                "line {}: block header is missing a trailing ':'",
                self.start
            ));
        }
        self.text.clear();
        self.top_level_colon = false;
        self.start = next_start;
    }
}

/// Source with comments removed and string literal bodies blanked.
///
/// Quotes and newlines are kept, so line structure survives.
fn blank_strings_and_comments(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '"' | '\'' => {
                let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                let width = if triple { 3 } else { 1 };
                out.extend(std::iter::repeat(c).take(width));
                i += width;
                while i < chars.len() {
                    let ch = chars[i];
                    if ch == '\\' {
                        out.push_str("  ");
                        i += 2;
                        continue;
                    }
                    let closes = if triple {
                        ch == c && chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c)
                    } else {
                        ch == c || ch == '\n'
                    };
                    if closes {
                        break;
                    }
                    out.push(if ch == '\n' { '\n' } else { ' ' });
                    i += 1;
                }
                if i < chars.len() {
                    if chars[i] == '\n' {
                        continue;
                    }
                    out.extend(std::iter::repeat(c).take(width));
                    i += width;
                }
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

fn matching_open(close: char) -> char {
    match close {
        ')' => '(',
        ']' => '[',
        _ => '{',
    }
}

/// Heuristic syntax scan: brackets, string literals, block headers.
///
/// Handles comments, escapes, single and triple quoted strings and
/// backslash continuations. It does not understand indentation.
pub fn scan_syntax(code: &str) -> Vec<String> {
    let chars: Vec<char> = code.chars().collect();
    let mut issues = Vec::new();
    let mut brackets: Vec<(char, usize)> = Vec::new();
    // (quote char, triple, start line)
    let mut string: Option<(char, bool, usize)> = None;
    let mut line = 1usize;
    let mut logical = LogicalLine {
        start: 1,
        ..Default::default()
    };

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if let Some((quote, triple, start)) = string {
            match c {
                '\\' => {
                    if chars.get(i + 1) == Some(&'\n') {
                        line += 1;
                    }
                    i += 2;
                    continue;
                }
                '\n' if !triple => {
                    issues.push(format!("line {start}: unterminated string literal"));
                    string = None;
                }
                '\n' => {
                    line += 1;
                    i += 1;
                    continue;
                }
                _ if c == quote => {
                    if !triple {
                        string = None;
                        i += 1;
                        continue;
                    }
                    if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                        string = None;
                        i += 3;
                        continue;
                    }
                    i += 1;
                    continue;
                }
                _ => {
                    i += 1;
                    continue;
                }
            }
        }

        match c {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '"' | '\'' => {
                let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                string = Some((c, triple, line));
                logical.text.push_str("\"\"");
                i += if triple { 3 } else { 1 };
                continue;
            }
            '\\' if chars.get(i + 1) == Some(&'\n') => {
                line += 1;
                i += 2;
                continue;
            }
            '(' | '[' | '{' => brackets.push((c, line)),
            ')' | ']' | '}' => match brackets.pop() {
                Some((open, _)) if open == matching_open(c) => {}
                Some((open, open_line)) => issues.push(format!(
                    "line {line}: '{c}' does not match '{open}' opened on line {open_line}"
                )),
                None => issues.push(format!("line {line}: unmatched '{c}'")),
            },
            ':' if brackets.is_empty() => logical.top_level_colon = true,
            '\n' => {
                line += 1;
                if brackets.is_empty() {
                    logical.finish(line, &mut issues);
                }
                i += 1;
                continue;
            }
            _ => {}
        }

        logical.text.push(c);
        i += 1;
    }

    if let Some((_, _, start)) = string {
        issues.push(format!("line {start}: unterminated string literal"));
    }
    logical.finish(line, &mut issues);
    for (open, open_line) in brackets {
        issues.push(format!("line {open_line}: '{open}' is never closed"));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"from manim import *

class Demo(Scene):
    def construct(self):
        title = Text("Attention: a # not comment")
        items = {
            "q": 1,
            "k": 2,
        }
        if len(items) > 1:
            self.play(Write(title))
        else:
            self.wait()
        doc = """multi
        line ( unbalanced inside string
        """
"#;

    #[test]
    fn test_valid_code_passes_unchanged() {
        let report = StructuralValidator::new().validate(GOOD);
        assert!(report.valid, "issues: {:?}", report.issues);
        assert!(report.fixed.is_empty());
        assert_eq!(report.code, GOOD);
    }

    #[test]
    fn test_missing_import_is_auto_fixed() {
        let code = "class Demo(Scene):\n    def construct(self):\n        self.wait()\n";
        let report = StructuralValidator::new().validate(code);
        assert!(report.valid);
        assert_eq!(report.fixed.len(), 1);
        assert!(report.code.starts_with("from manim import *"));
    }

    #[test]
    fn test_removed_apis_are_renamed() {
        let code = "from manim import *\nclass Demo(Scene):\n    def construct(self):\n        self.play(ShowCreation(TextMobject(\"hi\")))\n";
        let report = StructuralValidator::new().validate(code);
        assert!(report.valid);
        assert!(report.code.contains("Create(Text(\"hi\"))"));
        assert_eq!(report.fixed.len(), 2);
    }

    #[test]
    fn test_forbidden_constructs_reject() {
        let code = "from manim import *\nimport os\nclass Demo(Scene):\n    def construct(self):\n        eval(\"1\")\n";
        let report = StructuralValidator::new().validate(code);
        assert!(!report.valid);
        assert_eq!(report.issues.len(), 2);
        assert!(report.issues[0].contains("os module"));
    }

    #[test]
    fn test_forbidden_words_inside_strings_are_allowed() {
        let code = r#"from manim import *
class Demo(Scene):
    def construct(self):
        label = Text("exec (x) then open (file)")
        note = '''
import os
eval(1)
'''
        self.play(Write(label))
"#;
        let report = StructuralValidator::new().validate(code);
        assert!(report.valid, "issues: {:?}", report.issues);
    }

    #[test]
    fn test_blank_strings_keeps_code_and_lines() {
        let bare = blank_strings_and_comments("a = \"x#y\"  # c\nb = '''p\nq''' + eval(2)\n");
        assert_eq!(bare, "a = \"   \"  \nb = ''' \n ''' + eval(2)\n");
    }

    #[test]
    fn test_method_named_open_is_allowed() {
        let code = "from manim import *\nclass Demo(Scene):\n    def construct(self):\n        self.camera.frame.open()\n";
        assert!(StructuralValidator::new().validate(code).valid);
    }

    #[test]
    fn test_missing_scene_class() {
        let code = "from manim import *\nx = 1\n";
        let report = StructuralValidator::new().validate(code);
        assert_eq!(report.issues, vec!["No Scene subclass found"]);
    }

    #[test]
    fn test_scan_syntax_brackets() {
        let issues = scan_syntax("x = foo(1, [2, 3)\n");
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("does not match"));

        let issues = scan_syntax("x = 1)\n");
        assert_eq!(issues, vec!["line 1: unmatched ')'"]);

        let issues = scan_syntax("x = (1,\n2\n");
        assert_eq!(issues, vec!["line 1: '(' is never closed"]);
    }

    #[test]
    fn test_scan_syntax_strings() {
        let issues = scan_syntax("x = \"open\ny = 2\n");
        assert_eq!(issues, vec!["line 1: unterminated string literal"]);

        let issues = scan_syntax("x = '''never closed\n");
        assert_eq!(issues, vec!["line 1: unterminated string literal"]);

        assert!(scan_syntax("x = 'it\\'s fine'\n").is_empty());
    }

    #[test]
    fn test_scan_syntax_block_headers() {
        let issues = scan_syntax("def f(x)\n    return x\n");
        assert_eq!(issues, vec!["line 1: block header is missing a trailing ':'"]);

        assert!(scan_syntax("def f(\n    x,\n    y,\n):\n    pass\n").is_empty());
        assert!(scan_syntax("if x: y = 1\nwith_x = 2\n").is_empty());
        assert!(scan_syntax("d = {'a': 1}\nelse_value = d['a']\n").is_empty());
    }
}
