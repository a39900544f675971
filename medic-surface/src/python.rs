//! Line-oriented public surface extraction for Python agents.
//!
//! This is not a Python parser. It recognises the shapes that make up a
//! module's public contract: top-level `def`s, top-level classes and their
//! methods, decorators, and UPPERCASE module constants. Names with a leading
//! underscore are private, except dunder methods such as `__init__`.
//! Signatures may span several lines; triple-quoted strings are skipped.

use crate::surface::{ApiSurface, ClassSurface, FunctionSignature, Parameter, SurfaceExtractor};
use medic_core::SurfaceError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

struct Patterns {
    def_keyword: Regex,
    def_name: Regex,
    class: Regex,
    constant: Regex,
    decorator: Regex,
}

static PATTERNS: Lazy<Result<Patterns, regex::Error>> = Lazy::new(|| {
    Ok(Patterns {
        def_keyword: Regex::new(r"^\s*(?:async\s+)?def\b")?,
        def_name: Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(")?,
        class: Regex::new(r"^\s*class\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:\((.*)\))?\s*:")?,
        constant: Regex::new(r"^([A-Z][A-Z0-9_]*)\s*(?::[^=]+)?=\s*([^=].*?)\s*$")?,
        decorator: Regex::new(r"^\s*@\s*([A-Za-z_][A-Za-z0-9_.]*)")?,
    })
});

const TRIPLE_QUOTES: [&str; 2] = ["\"\"\"", "'''"];

#[derive(Debug, Default, Clone, Copy)]
pub struct PythonSurfaceExtractor;

impl PythonSurfaceExtractor {
    pub fn new() -> Self {
        Self
    }
}

struct ClassContext {
    name: String,
    indent: usize,
    body_indent: Option<usize>,
    public: bool,
}

fn is_public(name: &str) -> bool {
    !name.starts_with('_') || (name.len() > 4 && name.starts_with("__") && name.ends_with("__"))
}

fn parse_error(snapshot: &'static str, line: usize, reason: impl Into<String>) -> SurfaceError {
    SurfaceError::CodeParse {
        snapshot,
        line,
        reason: reason.into(),
    }
}

impl SurfaceExtractor for PythonSurfaceExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extract(&self, code: &str, snapshot: &'static str) -> Result<ApiSurface, SurfaceError> {
        let patterns = PATTERNS
            .as_ref()
            .map_err(|e| parse_error(snapshot, 0, format!("surface patterns unavailable: {e}")))?;
        let lines: Vec<&str> = code.lines().collect();

        let mut surface = ApiSurface::default();
        let mut decorators: Vec<String> = Vec::new();
        let mut class: Option<ClassContext> = None;
        let mut open_string: Option<(&'static str, usize)> = None;

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            let line_no = i + 1;
            i += 1;

            if let Some((delimiter, _)) = open_string {
                if line.matches(delimiter).count() % 2 == 1 {
                    open_string = None;
                }
                continue;
            }

            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let indent = line.len() - trimmed.len();

            if class.as_ref().is_some_and(|c| indent <= c.indent) {
                class = None;
            }
            if let Some(ctx) = class.as_mut() {
                ctx.body_indent.get_or_insert(indent);
            }

            if let Some(caps) = patterns.decorator.captures(line) {
                decorators.push(caps[1].to_string());
                continue;
            }

            if let Some(caps) = patterns.class.captures(line) {
                let name = caps[1].to_string();
                if indent == 0 {
                    let public = is_public(&name);
                    if public {
                        let bases = caps
                            .get(2)
                            .map(|m| split_top_level(m.as_str(), ','))
                            .unwrap_or_default()
                            .into_iter()
                            .map(|b| b.trim().to_string())
                            .filter(|b| !b.is_empty() && !b.contains('='))
                            .collect();
                        surface.classes.insert(
                            name.clone(),
                            ClassSurface {
                                name: name.clone(),
                                bases,
                                methods: BTreeMap::new(),
                            },
                        );
                    }
                    class = Some(ClassContext {
                        name,
                        indent,
                        body_indent: None,
                        public,
                    });
                }
                decorators.clear();
                continue;
            }

            if patterns.def_keyword.is_match(line) {
                let caps = patterns
                    .def_name
                    .captures(line)
                    .ok_or_else(|| parse_error(snapshot, line_no, "malformed function definition"))?;
                let name = caps[1].to_string();
                let open_at = caps.get(0).map(|m| m.end()).unwrap_or(line.len());
                let (params_text, rest, last_line) = read_signature(&lines, line_no - 1, open_at)
                    .ok_or_else(|| {
                        parse_error(
                            snapshot,
                            line_no,
                            format!("unbalanced parentheses in signature of `{name}`"),
                        )
                    })?;
                i = last_line + 1;

                let in_class = class.as_ref().filter(|c| Some(indent) == c.body_indent);
                let is_method = in_class.is_some();
                let target = match in_class {
                    Some(ctx) if ctx.public && is_public(&name) => Some(ctx.name.clone()),
                    Some(_) => None,
                    None if indent == 0 && is_public(&name) => Some(String::new()),
                    None => None,
                };

                if let Some(owner) = target {
                    let mut params = parse_params(&params_text)
                        .map_err(|reason| parse_error(snapshot, line_no, reason))?;
                    if is_method
                        && params
                            .first()
                            .is_some_and(|p| p.name == "self" || p.name == "cls")
                    {
                        params.remove(0);
                    }
                    let signature = FunctionSignature {
                        name: name.clone(),
                        params,
                        return_annotation: return_annotation(&rest),
                        decorators: std::mem::take(&mut decorators),
                    };
                    if owner.is_empty() {
                        surface.functions.insert(name, signature);
                    } else if let Some(class_surface) = surface.classes.get_mut(&owner) {
                        class_surface.methods.insert(name, signature);
                    }
                }
                decorators.clear();
                continue;
            }

            if indent == 0 {
                if let Some(caps) = patterns.constant.captures(line) {
                    surface
                        .constants
                        .insert(caps[1].to_string(), strip_comment(&caps[2]).to_string());
                }
            }
            decorators.clear();

            for delimiter in TRIPLE_QUOTES {
                if trimmed.matches(delimiter).count() % 2 == 1 {
                    open_string = Some((delimiter, line_no));
                    break;
                }
            }
        }

        if let Some((_, start)) = open_string {
            return Err(parse_error(
                snapshot,
                start,
                "unterminated triple-quoted string",
            ));
        }
        Ok(surface)
    }
}

/// Collect the parameter list starting just after the opening parenthesis at
/// `open_at` on line `start`. Returns the parameter text, the remainder of the
/// line after the closing parenthesis and the index of that line.
fn read_signature(lines: &[&str], start: usize, open_at: usize) -> Option<(String, String, usize)> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut params = String::new();
    let mut line_idx = start;
    let mut text = lines.get(start)?.get(open_at..)?;

    loop {
        for (pos, ch) in text.char_indices() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
                params.push(ch);
                continue;
            }
            match ch {
                '\'' | '"' => quote = Some(ch),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((params, text[pos + 1..].to_string(), line_idx));
                    }
                }
                '#' => break,
                _ => {}
            }
            params.push(ch);
        }
        params.push(' ');
        line_idx += 1;
        text = lines.get(line_idx)?;
    }
}

/// Split on `sep` outside brackets and string literals.
fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for ch in text.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                c if c == sep && depth == 0 => {
                    parts.push(std::mem::take(&mut current));
                    continue;
                }
                _ => {}
            },
        }
        current.push(ch);
    }
    parts.push(current);
    parts
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn parse_params(text: &str) -> Result<Vec<Parameter>, String> {
    let mut params = Vec::new();
    for raw in split_top_level(text, ',') {
        let part = raw.trim();
        if part.is_empty() || part == "/" || part == "*" {
            continue;
        }
        let (variadic, body) = if let Some(rest) = part.strip_prefix("**") {
            (true, rest)
        } else if let Some(rest) = part.strip_prefix('*') {
            (true, rest)
        } else {
            (false, part)
        };
        let has_default = split_top_level(body, '=').len() > 1;
        let name = body
            .split([':', '='])
            .next()
            .unwrap_or_default()
            .trim();
        if !is_identifier(name) {
            return Err(format!("invalid parameter `{part}`"));
        }
        params.push(Parameter {
            name: if variadic {
                part[..part.len() - body.len()].to_string() + name
            } else {
                name.to_string()
            },
            has_default,
            variadic,
        });
    }
    Ok(params)
}

fn return_annotation(rest: &str) -> Option<String> {
    let after_arrow = rest.trim_start().strip_prefix("->")?;
    let annotation = split_top_level(after_arrow, ':')
        .into_iter()
        .next()
        .unwrap_or_default();
    let annotation = annotation.trim();
    (!annotation.is_empty()).then(|| annotation.to_string())
}

fn strip_comment(value: &str) -> &str {
    if value.contains('"') || value.contains('\'') {
        return value;
    }
    value.split('#').next().unwrap_or(value).trim_end()
}
