//! Script parsing and import specifier extraction.

use std::fmt;
use std::ops::Range;

use tree_sitter::{Node, Parser, Tree};

/// A module specifier string literal in an import or re-export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    /// Specifier text without quotes.
    pub value: String,
    /// Byte span of the literal, quotes included.
    pub span: Range<usize>,
}

/// Parse tree of a script module.
///
/// Parsing recovers from syntax errors, so a tree exists for any input the
/// parser accepts; specifiers inside well-formed statements are still found.
pub struct ScriptAst {
    tree: Tree,
    imports: Vec<ImportSpecifier>,
}

impl ScriptAst {
    /// Parse TypeScript (a superset of the JavaScript we see). `None` when
    /// the parser cannot be set up or gives up.
    pub fn parse(source: &str) -> Option<Self> {
        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()) {
            tracing::warn!(error = %e, "failed to load script grammar");
            return None;
        }
        let tree = parser.parse(source, None)?;
        let imports = collect_imports(tree.root_node(), source);
        Some(Self { tree, imports })
    }

    /// Import and export-from specifiers in document order.
    pub fn imports(&self) -> &[ImportSpecifier] {
        &self.imports
    }

    /// The specifier literal enclosing `offset`, end inclusive.
    pub fn specifier_at(&self, offset: usize) -> Option<&ImportSpecifier> {
        self.imports
            .iter()
            .find(|s| s.span.start <= offset && offset <= s.span.end)
    }

    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }
}

impl fmt::Debug for ScriptAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptAst")
            .field("imports", &self.imports)
            .field("has_errors", &self.has_errors())
            .finish()
    }
}

fn collect_imports(root: Node, source: &str) -> Vec<ImportSpecifier> {
    let mut imports = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if matches!(node.kind(), "import_statement" | "export_statement") {
            if let Some(literal) = node.child_by_field_name("source") {
                let span = literal.byte_range();
                let value = source[span.clone()]
                    .trim_matches(|c: char| c == '"' || c == '\'')
                    .to_string();
                imports.push(ImportSpecifier { value, span });
                continue;
            }
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
    imports.sort_by_key(|s| s.span.start);
    imports
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(source: &str) -> Vec<String> {
        ScriptAst::parse(source)
            .unwrap()
            .imports()
            .iter()
            .map(|s| s.value.clone())
            .collect()
    }

    #[test]
    fn finds_imports_and_reexports() {
        let source = "import a from './a';\nexport { b } from \"./b\";\nexport const c = 1;\nimport './side.css';\n";
        assert_eq!(values(source), vec!["./a", "./b", "./side.css"]);
    }

    #[test]
    fn no_imports() {
        let ast = ScriptAst::parse("const x = 1;").unwrap();
        assert!(ast.imports().is_empty());
        assert!(!ast.has_errors());
    }

    #[test]
    fn recovers_from_syntax_errors() {
        let source = "import x from './x';\nconst = ;\n";
        let ast = ScriptAst::parse(source).unwrap();
        assert!(ast.has_errors());
        assert_eq!(ast.imports()[0].value, "./x");
    }

    #[test]
    fn specifier_at_offset() {
        let source = "import { y } from './y';";
        let ast = ScriptAst::parse(source).unwrap();
        let inside = source.find("./y").unwrap() + 1;
        assert_eq!(ast.specifier_at(inside).unwrap().value, "./y");
        assert!(ast.specifier_at(0).is_none());
    }
}
