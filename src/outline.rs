/*!
 * Structural outline of Python sources
 *
 * A line-oriented reader that recognizes `class` and `def` headers by
 * indentation. It lists top-level functions, classes with their methods and
 * nested classes, decorators and leading docstrings.
 */

use std::fs;
use std::io::{self, Write};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Entry;

static FUNC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)\s*(?:->\s*(.+?))?\s*:\s*(?:#.*)?$",
    )
    .expect("function pattern is valid")
});

static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^class\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:\((.*)\))?\s*:")
        .expect("class pattern is valid")
});

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// A function or method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub returns: Option<String>,
    pub is_async: bool,
    pub decorators: Vec<String>,
    pub docstring: Option<String>,
    pub line: usize,
}

impl Function {
    /// `name(a: int, b = 2) -> str`
    pub fn signature(&self) -> String {
        let mut signature = format!("{}({})", self.name, self.params.join(", "));
        if let Some(returns) = &self.returns {
            signature.push_str(" -> ");
            signature.push_str(returns);
        }
        signature
    }
}

/// A class with its direct members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub name: String,
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    pub docstring: Option<String>,
    pub methods: Vec<Function>,
    pub nested: Vec<(String, Option<String>)>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Class(Class),
    Function(Function),
}

/// A class still being filled in
struct OpenClass {
    indent: usize,
    body_indent: Option<usize>,
    nested: bool,
    class: Class,
}

/// Extract the outline symbols of a Python source file
pub fn parse_python(source: &str) -> Vec<Symbol> {
    let lines: Vec<&str> = source.lines().collect();
    let mut symbols = Vec::new();
    let mut open: Vec<OpenClass> = Vec::new();
    let mut decorators: Vec<String> = Vec::new();
    let mut in_string: Option<&'static str> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if let Some(delim) = in_string {
            if line.contains(delim) {
                in_string = None;
            }
            i += 1;
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            i += 1;
            continue;
        }
        let indent = line.len() - trimmed.len();

        while open.last().map_or(false, |top| indent <= top.indent) {
            close_class(&mut open, &mut symbols);
        }
        if let Some(top) = open.last_mut() {
            if top.body_indent.is_none() {
                top.body_indent = Some(indent);
            }
        }

        if let Some(decorator) = trimmed.strip_prefix('@') {
            decorators.push(decorator.trim().to_string());
            i += 1;
            continue;
        }

        let is_def = trimmed.starts_with("def ") || trimmed.starts_with("async def ");
        let is_class = trimmed.starts_with("class ");
        if !is_def && !is_class {
            decorators.clear();
            in_string = opened_string(trimmed);
            i += 1;
            continue;
        }

        let (header, last) = gather_header(&lines, i);
        let (docstring, next) = extract_docstring(&lines, last + 1);
        let pending = std::mem::take(&mut decorators);
        let at_class_body = open
            .last()
            .map_or(false, |top| top.body_indent == Some(indent));

        if is_class {
            if let Some(caps) = CLASS_RE.captures(&header) {
                let class = Class {
                    name: caps[1].to_string(),
                    bases: caps
                        .get(2)
                        .map(|m| split_top_level(m.as_str()))
                        .unwrap_or_default(),
                    decorators: pending,
                    docstring,
                    methods: Vec::new(),
                    nested: Vec::new(),
                    line: i + 1,
                };

                if indent == 0 || at_class_body {
                    if let Some(parent) = open.last_mut().filter(|_| at_class_body) {
                        parent
                            .class
                            .nested
                            .push((class.name.clone(), class.docstring.clone()));
                    }
                    open.push(OpenClass {
                        indent,
                        body_indent: None,
                        nested: at_class_body,
                        class,
                    });
                }
            }
        } else if let Some(caps) = FUNC_RE.captures(&header) {
            let function = Function {
                name: caps[2].to_string(),
                params: split_top_level(&caps[3]),
                returns: caps.get(4).map(|m| collapse(m.as_str())),
                is_async: caps.get(1).is_some(),
                decorators: pending,
                docstring,
                line: i + 1,
            };

            if at_class_body {
                if let Some(top) = open.last_mut() {
                    top.class.methods.push(function);
                }
            } else if indent == 0 {
                symbols.push(Symbol::Function(function));
            }
        }

        i = next;
    }

    while !open.is_empty() {
        close_class(&mut open, &mut symbols);
    }

    symbols.sort_by_key(|symbol| match symbol {
        Symbol::Class(class) => class.line,
        Symbol::Function(function) => function.line,
    });
    symbols
}

fn close_class(open: &mut Vec<OpenClass>, symbols: &mut Vec<Symbol>) {
    if let Some(done) = open.pop() {
        if !done.nested {
            symbols.push(Symbol::Class(done.class));
        }
    }
}

/// Join continuation lines until the header's brackets balance and it ends with `:`
fn gather_header(lines: &[&str], start: usize) -> (String, usize) {
    let mut header = lines[start].trim().to_string();
    let mut last = start;

    while !header_complete(&header) && last + 1 < lines.len() {
        last += 1;
        header.push(' ');
        header.push_str(lines[last].trim());
    }

    (header, last)
}

fn header_complete(header: &str) -> bool {
    let depth: i32 = header
        .chars()
        .map(|c| match c {
            '(' | '[' | '{' => 1,
            ')' | ']' | '}' => -1,
            _ => 0,
        })
        .sum();
    let code = header.split(" #").next().unwrap_or(header).trim_end();
    depth <= 0 && code.ends_with(':')
}

/// Read a docstring starting at the first non-blank line from `start`.
///
/// Returns the docstring, if any, and the index of the first line after it.
fn extract_docstring(lines: &[&str], start: usize) -> (Option<String>, usize) {
    let mut i = start;
    while i < lines.len() && lines[i].trim().is_empty() {
        i += 1;
    }
    if i >= lines.len() {
        return (None, start);
    }

    let first = lines[i].trim();
    let body = first.trim_start_matches(|c| matches!(c, 'r' | 'R' | 'u' | 'U'));

    for delim in ["\"\"\"", "'''"] {
        if let Some(rest) = body.strip_prefix(delim) {
            if let Some(end) = rest.find(delim) {
                return (Some(rest[..end].trim().to_string()), i + 1);
            }

            let mut doc = vec![rest.trim().to_string()];
            let mut j = i + 1;
            while j < lines.len() {
                let line = lines[j].trim();
                if let Some(end) = line.find(delim) {
                    doc.push(line[..end].trim().to_string());
                    return (Some(doc.join("\n").trim().to_string()), j + 1);
                }
                doc.push(line.to_string());
                j += 1;
            }
            return (Some(doc.join("\n").trim().to_string()), j);
        }
    }

    for quote in ['"', '\''] {
        if body.len() >= 2 && body.starts_with(quote) && body.ends_with(quote) {
            return (Some(body[1..body.len() - 1].to_string()), i + 1);
        }
    }

    (None, start)
}

/// Triple-quoted string left open on this line, if any
fn opened_string(line: &str) -> Option<&'static str> {
    ["\"\"\"", "'''"]
        .into_iter()
        .find(|delim| line.matches(delim).count() % 2 == 1)
}

/// Split on commas outside brackets and quotes, collapsing whitespace
fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' | '}' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|part| collapse(&part))
        .filter(|part| !part.is_empty())
        .collect()
}

fn collapse(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").to_string()
}

fn push_docstring(output: &mut Vec<String>, docstring: &str, indent: &str, limit: usize) {
    let lines: Vec<&str> = docstring.trim().lines().collect();
    output.push(format!("{}DOCSTRING:", indent));
    for line in lines.iter().take(limit) {
        output.push(format!("{}  {}", indent, line.trim()));
    }
    if lines.len() > limit {
        output.push(format!("{}  ... ({} more lines)", indent, lines.len() - limit));
    }
}

/// Render symbols in the outline text format
pub fn format_outline(symbols: &[Symbol]) -> String {
    if symbols.is_empty() {
        return "No Python symbols found.".to_string();
    }

    let mut output = Vec::new();
    for symbol in symbols {
        match symbol {
            Symbol::Class(class) => {
                let mut header = format!("\nCLASS: {}", class.name);
                if !class.bases.is_empty() {
                    header.push_str(&format!("({})", class.bases.join(", ")));
                }
                output.push(header);
                if !class.decorators.is_empty() {
                    output.push(format!("  DECORATORS: {}", class.decorators.join(", ")));
                }
                if let Some(doc) = &class.docstring {
                    push_docstring(&mut output, doc, "  ", 3);
                }

                for method in &class.methods {
                    let prefix = if method.is_async { "ASYNC METHOD" } else { "METHOD" };
                    output.push(format!("\n  {}: {}", prefix, method.signature()));
                    if !method.decorators.is_empty() {
                        output.push(format!("    DECORATORS: {}", method.decorators.join(", ")));
                    }
                    if let Some(doc) = &method.docstring {
                        push_docstring(&mut output, doc, "    ", 2);
                    }
                }

                for (name, doc) in &class.nested {
                    output.push(format!("\n  NESTED CLASS: {}", name));
                    if let Some(doc) = doc {
                        let short: String = doc.chars().take(100).collect();
                        output.push(format!("    DOCSTRING: {}...", short));
                    }
                }
            }
            Symbol::Function(function) => {
                let prefix = if function.is_async { "ASYNC FUNCTION" } else { "FUNCTION" };
                output.push(format!("\n{}: {}", prefix, function.signature()));
                if !function.decorators.is_empty() {
                    output.push(format!("  DECORATORS: {}", function.decorators.join(", ")));
                }
                if let Some(doc) = &function.docstring {
                    push_docstring(&mut output, doc, "  ", 3);
                }
            }
        }
    }

    output.join("\n")
}

/// Write the `## Python Code Outline` section for every `.py` entry
pub fn write_outline<W: Write>(entries: &[Entry], out: &mut W) -> io::Result<()> {
    out.write_all(b"## Python Code Outline\n")?;

    let python_files: Vec<&Entry> = entries
        .iter()
        .filter(|e| e.is_file())
        .filter(|e| {
            e.absolute_path
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("py"))
        })
        .collect();

    if python_files.is_empty() {
        return out.write_all(b"\nNo Python files found for outline generation.\n\n");
    }

    tracing::info!("Generating outlines for {} Python files", python_files.len());

    for entry in python_files {
        write!(out, "\n### File: {}\n", entry.display())?;
        match fs::read(&entry.absolute_path) {
            Ok(bytes) => {
                let source = String::from_utf8_lossy(&bytes);
                writeln!(out, "{}", format_outline(&parse_python(&source)))?;
            }
            Err(e) => {
                tracing::error!("Error processing Python file {}: {}", entry.display(), e);
                writeln!(out, "ERROR: Failed to process file: {}", e)?;
            }
        }
    }

    out.write_all(b"\n")
}
