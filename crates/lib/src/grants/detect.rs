//! Syntax-tree based capability detection.

use indexmap::IndexSet;
use oxc_allocator::Allocator;
use oxc_ast::ast::{BindingIdentifier, Expression, IdentifierName, IdentifierReference, StaticMemberExpression};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_span::SourceType;
use thiserror::Error;
use tracing::debug;

/// Errors raised while detecting capabilities.
#[derive(Debug, Error)]
pub enum DetectError {
  /// The compiled body is not valid JavaScript.
  #[error("failed to parse compiled output for capability detection:\n{}", messages.join("\n"))]
  Parse { messages: Vec<String> },
}

/// Collect the catalog entries referenced by `code`.
///
/// Every identifier is matched by name, and every `object.property` access on
/// a plain identifier is matched in its dotted form. The result holds entries
/// in order of first appearance and is always a subset of `catalog`.
pub fn detect(code: &str, catalog: &[&str]) -> Result<IndexSet<String>, DetectError> {
  let allocator = Allocator::default();
  let parsed = Parser::new(&allocator, code, SourceType::mjs()).parse();

  if parsed.panicked || !parsed.errors.is_empty() {
    return Err(DetectError::Parse {
      messages: parsed.errors.iter().map(|e| e.to_string()).collect(),
    });
  }

  let mut visitor = CapabilityVisitor {
    catalog,
    found: IndexSet::new(),
  };
  visitor.visit_program(&parsed.program);

  debug!(grants = ?visitor.found, "detected capabilities");
  Ok(visitor.found)
}

struct CapabilityVisitor<'c> {
  catalog: &'c [&'c str],
  found: IndexSet<String>,
}

impl CapabilityVisitor<'_> {
  fn check(&mut self, name: &str) {
    if self.catalog.contains(&name) && !self.found.contains(name) {
      self.found.insert(name.to_string());
    }
  }
}

impl<'a> Visit<'a> for CapabilityVisitor<'_> {
  fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
    self.check(it.name.as_str());
  }

  fn visit_identifier_name(&mut self, it: &IdentifierName<'a>) {
    self.check(it.name.as_str());
  }

  fn visit_binding_identifier(&mut self, it: &BindingIdentifier<'a>) {
    self.check(it.name.as_str());
  }

  fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
    if let Expression::Identifier(object) = &it.object {
      let dotted = format!("{}.{}", object.name.as_str(), it.property.name.as_str());
      self.check(&dotted);
    }
    walk::walk_static_member_expression(self, it);
  }
}
