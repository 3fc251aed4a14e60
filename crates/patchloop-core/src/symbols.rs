//! Tree-sitter symbol extraction for the repository map.
//!
//! Each recognised file yields one line per top-level symbol (functions with
//! parameter names, types) plus methods nested one level deeper.

use std::cell::RefCell;
use std::path::Path;
use tracing::warn;
use tree_sitter::{Node, Parser, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
    JavaScript,
    TypeScript,
    Tsx,
    Python,
    Go,
}

impl Language {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "rs" => Some(Language::Rust),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "py" | "pyi" => Some(Language::Python),
            "go" => Some(Language::Go),
            _ => None,
        }
    }
}

/// Result of scanning one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSymbols {
    /// Symbol lines; nested symbols carry two spaces of indentation per level
    Parsed(Vec<String>),
    /// The file is not UTF-8 or its syntax tree contains errors
    ParseError,
}

// Parsers are reused per thread; creating one per file is comparatively slow.
thread_local! {
    static RUST_PARSER: RefCell<Parser> = RefCell::new(parser_for("rust", &tree_sitter_rust::LANGUAGE.into()));
    static JS_PARSER: RefCell<Parser> = RefCell::new(parser_for("javascript", &tree_sitter_javascript::LANGUAGE.into()));
    static TS_PARSER: RefCell<Parser> =
        RefCell::new(parser_for("typescript", &tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()));
    static TSX_PARSER: RefCell<Parser> = RefCell::new(parser_for("tsx", &tree_sitter_typescript::LANGUAGE_TSX.into()));
    static PYTHON_PARSER: RefCell<Parser> = RefCell::new(parser_for("python", &tree_sitter_python::LANGUAGE.into()));
    static GO_PARSER: RefCell<Parser> = RefCell::new(parser_for("go", &tree_sitter_go::LANGUAGE.into()));
}

/// A parser without a language returns no tree, so files of that language
/// map as parse errors
fn parser_for(name: &str, language: &tree_sitter::Language) -> Parser {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(language) {
        warn!(language = name, error = %e, "Grammar rejected by tree-sitter; files will not be mapped");
    }
    parser
}

fn parse(content: &str, language: Language) -> Option<Tree> {
    match language {
        Language::Rust => RUST_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        Language::JavaScript => JS_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        Language::TypeScript => TS_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        Language::Tsx => TSX_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        Language::Python => PYTHON_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        Language::Go => GO_PARSER.with(|p| p.borrow_mut().parse(content, None)),
    }
}

/// Extract symbol lines from raw file bytes
pub fn extract_symbols(bytes: &[u8], language: Language) -> FileSymbols {
    let Ok(content) = std::str::from_utf8(bytes) else {
        return FileSymbols::ParseError;
    };
    let Some(tree) = parse(content, language) else {
        return FileSymbols::ParseError;
    };
    let root = tree.root_node();
    if root.has_error() {
        return FileSymbols::ParseError;
    }

    let mut out = Vec::new();
    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        match language {
            Language::Python => python_item(node, content, 0, &mut out),
            Language::Rust => rust_item(node, content, 0, &mut out),
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                js_item(node, content, 0, &mut out)
            }
            Language::Go => go_item(node, content, &mut out),
        }
    }
    FileSymbols::Parsed(out)
}

fn text<'a>(node: Node, src: &'a str) -> &'a str {
    node.utf8_text(src.as_bytes()).unwrap_or_default()
}

fn field_text<'a>(node: Node, field: &str, src: &'a str) -> &'a str {
    node.child_by_field_name(field)
        .map(|n| text(n, src))
        .unwrap_or_default()
}

fn push(out: &mut Vec<String>, depth: usize, line: String) {
    out.push(format!("{}{}", "  ".repeat(depth), line));
}

/// Parameter names of a parameter-list node, types and defaults dropped
fn param_names(params: Option<Node>, src: &str) -> String {
    let Some(params) = params else {
        return String::new();
    };
    // Single-identifier arrow functions: `x => x + 1`
    if params.kind() == "identifier" {
        return text(params, src).to_string();
    }

    let mut names = Vec::new();
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        match child.kind() {
            "comment" => {}
            "identifier" | "self_parameter" => names.push(text(child, src).to_string()),
            "typed_parameter" => {
                if let Some(first) = child.named_child(0) {
                    names.push(text(first, src).to_string());
                }
            }
            "parameter_declaration" | "variadic_parameter_declaration" => {
                let mut c = child.walk();
                names.extend(
                    child
                        .children_by_field_name("name", &mut c)
                        .map(|n| text(n, src).to_string()),
                );
            }
            _ => {
                let named = child
                    .child_by_field_name("name")
                    .or_else(|| child.child_by_field_name("pattern"))
                    .or_else(|| child.child_by_field_name("left"));
                let name = match named {
                    Some(n) => text(n, src),
                    None => text(child, src),
                };
                names.push(name.lines().next().unwrap_or_default().to_string());
            }
        }
    }
    names.join(", ")
}

fn python_item(node: Node, src: &str, depth: usize, out: &mut Vec<String>) {
    match node.kind() {
        "decorated_definition" => {
            if let Some(def) = node.child_by_field_name("definition") {
                python_item(def, src, depth, out);
            }
        }
        "function_definition" => push(
            out,
            depth,
            format!(
                "def {}({})",
                field_text(node, "name", src),
                param_names(node.child_by_field_name("parameters"), src)
            ),
        ),
        "class_definition" => {
            push(out, depth, format!("class {}", field_text(node, "name", src)));
            if depth == 0 {
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.named_children(&mut cursor) {
                        python_item(child, src, depth + 1, out);
                    }
                }
            }
        }
        _ => {}
    }
}

fn rust_item(node: Node, src: &str, depth: usize, out: &mut Vec<String>) {
    match node.kind() {
        "function_item" | "function_signature_item" => push(
            out,
            depth,
            format!(
                "fn {}({})",
                field_text(node, "name", src),
                param_names(node.child_by_field_name("parameters"), src)
            ),
        ),
        "struct_item" => push(out, depth, format!("struct {}", field_text(node, "name", src))),
        "enum_item" => push(out, depth, format!("enum {}", field_text(node, "name", src))),
        "union_item" => push(out, depth, format!("union {}", field_text(node, "name", src))),
        "type_item" => push(out, depth, format!("type {}", field_text(node, "name", src))),
        "mod_item" => push(out, depth, format!("mod {}", field_text(node, "name", src))),
        "trait_item" | "impl_item" => {
            let header = if node.kind() == "trait_item" {
                format!("trait {}", field_text(node, "name", src))
            } else if node.child_by_field_name("trait").is_some() {
                format!(
                    "impl {} for {}",
                    field_text(node, "trait", src),
                    field_text(node, "type", src)
                )
            } else {
                format!("impl {}", field_text(node, "type", src))
            };
            push(out, depth, header);

            if depth == 0 {
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.named_children(&mut cursor) {
                        if matches!(child.kind(), "function_item" | "function_signature_item") {
                            rust_item(child, src, depth + 1, out);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

fn js_item(node: Node, src: &str, depth: usize, out: &mut Vec<String>) {
    match node.kind() {
        "export_statement" => {
            if let Some(decl) = node.child_by_field_name("declaration") {
                js_item(decl, src, depth, out);
            }
        }
        "function_declaration" | "generator_function_declaration" | "function_signature" => push(
            out,
            depth,
            format!(
                "function {}({})",
                field_text(node, "name", src),
                param_names(node.child_by_field_name("parameters"), src)
            ),
        ),
        "class_declaration" | "abstract_class_declaration" => {
            push(out, depth, format!("class {}", field_text(node, "name", src)));
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for member in body.named_children(&mut cursor) {
                    if matches!(member.kind(), "method_definition" | "method_signature") {
                        push(
                            out,
                            depth + 1,
                            format!(
                                "{}({})",
                                field_text(member, "name", src),
                                param_names(member.child_by_field_name("parameters"), src)
                            ),
                        );
                    }
                }
            }
        }
        "interface_declaration" => {
            push(out, depth, format!("interface {}", field_text(node, "name", src)))
        }
        "type_alias_declaration" => {
            push(out, depth, format!("type {}", field_text(node, "name", src)))
        }
        "enum_declaration" => push(out, depth, format!("enum {}", field_text(node, "name", src))),
        "lexical_declaration" | "variable_declaration" => {
            // `const f = (a, b) => ...` and `const f = function (a) {...}`
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                let Some(value) = declarator.child_by_field_name("value") else {
                    continue;
                };
                if !matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
                    continue;
                }
                let params = value
                    .child_by_field_name("parameters")
                    .or_else(|| value.child_by_field_name("parameter"));
                push(
                    out,
                    depth,
                    format!(
                        "function {}({})",
                        field_text(declarator, "name", src),
                        param_names(params, src)
                    ),
                );
            }
        }
        _ => {}
    }
}

fn go_item(node: Node, src: &str, out: &mut Vec<String>) {
    match node.kind() {
        "function_declaration" => push(
            out,
            0,
            format!(
                "func {}({})",
                field_text(node, "name", src),
                param_names(node.child_by_field_name("parameters"), src)
            ),
        ),
        "method_declaration" => {
            let receiver = node
                .child_by_field_name("receiver")
                .and_then(|r| r.named_child(0))
                .map(|p| field_text(p, "type", src))
                .unwrap_or_default();
            push(
                out,
                1,
                format!(
                    "func ({}) {}({})",
                    receiver,
                    field_text(node, "name", src),
                    param_names(node.child_by_field_name("parameters"), src)
                ),
            );
        }
        "type_declaration" => {
            let mut cursor = node.walk();
            for spec in node.named_children(&mut cursor) {
                if !matches!(spec.kind(), "type_spec" | "type_alias") {
                    continue;
                }
                let kind = match spec.child_by_field_name("type").map(|t| t.kind()) {
                    Some("struct_type") => " struct",
                    Some("interface_type") => " interface",
                    _ => "",
                };
                push(
                    out,
                    0,
                    format!("type {}{}", field_text(spec, "name", src), kind),
                );
            }
        }
        _ => {}
    }
}
