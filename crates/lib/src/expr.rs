//! Deploy-time expressions.
//!
//! Values such as bucket names or image URIs are not always known when a
//! template is synthesized. [`Expr`] keeps them symbolic: either a resolved
//! literal or an expression tree that the deployment engine evaluates.
//! Rendering to template JSON happens in one place,
//! [`Expr::to_template_value`], so values are never string-encoded twice.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Value, json};

use crate::placeholder::has_placeholders;

/// Pseudo parameter names understood by the deployment engine.
pub mod pseudo {
  pub const ACCOUNT_ID: &str = "AWS::AccountId";
  pub const REGION: &str = "AWS::Region";
  pub const PARTITION: &str = "AWS::Partition";
  pub const URL_SUFFIX: &str = "AWS::URLSuffix";
}

/// A value that is either fully resolved or evaluated at deploy time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
  /// A fully resolved string.
  Literal(String),
  /// Reference to a template parameter or pseudo parameter.
  Ref(String),
  /// A string with `${...}` markers substituted at deploy time.
  Sub(String),
  /// Element `index` of a list-valued expression.
  Select { index: usize, list: Box<Expr> },
  /// A string expression split on a delimiter.
  Split { delimiter: String, source: Box<Expr> },
  /// Parts joined with a delimiter.
  Join { delimiter: String, parts: Vec<Expr> },
}

impl Expr {
  pub fn literal(value: impl Into<String>) -> Self {
    Expr::Literal(value.into())
  }

  pub fn reference(name: impl Into<String>) -> Self {
    Expr::Ref(name.into())
  }

  pub fn account_id() -> Self {
    Expr::Ref(pseudo::ACCOUNT_ID.to_string())
  }

  pub fn region() -> Self {
    Expr::Ref(pseudo::REGION.to_string())
  }

  pub fn url_suffix() -> Self {
    Expr::Ref(pseudo::URL_SUFFIX.to_string())
  }

  /// A literal when `value` has no `${...}` markers, a [`Expr::Sub`] otherwise.
  pub fn sub_if_needed(value: impl Into<String>) -> Self {
    let value = value.into();
    // `${!` escapes are only unescaped by the deployment engine inside a Sub
    if has_placeholders(&value) || value.contains("${!") {
      Expr::Sub(value)
    } else {
      Expr::Literal(value)
    }
  }

  pub fn split(delimiter: impl Into<String>, source: Expr) -> Self {
    Expr::Split {
      delimiter: delimiter.into(),
      source: Box::new(source),
    }
  }

  pub fn select(index: usize, list: Expr) -> Self {
    Expr::Select {
      index,
      list: Box::new(list),
    }
  }

  /// Concatenate parts, folding adjacent literals and flattening nested
  /// concatenations. A single remaining part is returned as is.
  pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
    let mut folded: Vec<Expr> = Vec::new();

    for part in parts {
      let pieces = match part {
        Expr::Join { delimiter, parts } if delimiter.is_empty() => parts,
        other => vec![other],
      };
      for piece in pieces {
        if let Expr::Literal(s) = &piece {
          if s.is_empty() {
            continue;
          }
          if let Some(Expr::Literal(prev)) = folded.last_mut() {
            prev.push_str(s);
            continue;
          }
        }
        folded.push(piece);
      }
    }

    match folded.len() {
      0 => Expr::Literal(String::new()),
      1 => folded.remove(0),
      _ => Expr::Join {
        delimiter: String::new(),
        parts: folded,
      },
    }
  }

  pub fn is_resolved(&self) -> bool {
    matches!(self, Expr::Literal(_))
  }

  pub fn as_literal(&self) -> Option<&str> {
    match self {
      Expr::Literal(s) => Some(s),
      _ => None,
    }
  }

  /// The literal value, or `default` when the expression is unresolved.
  pub fn resolved_or<'a>(&'a self, default: &'a str) -> &'a str {
    self.as_literal().unwrap_or(default)
  }

  /// Text usable inside a [`Expr::Sub`] string, if the expression has one.
  ///
  /// Literals have their `${` escaped; references become `${Name}`.
  pub fn to_sub_fragment(&self) -> Option<String> {
    match self {
      Expr::Literal(s) => Some(s.replace("${", "${!")),
      Expr::Ref(name) => Some(format!("${{{name}}}")),
      Expr::Sub(s) => Some(s.clone()),
      _ => None,
    }
  }

  /// Render as a template value (a string or an intrinsic function object).
  pub fn to_template_value(&self) -> Value {
    match self {
      Expr::Literal(s) => Value::String(s.clone()),
      Expr::Ref(name) => json!({ "Ref": name }),
      Expr::Sub(s) => json!({ "Fn::Sub": s }),
      Expr::Select { index, list } => json!({ "Fn::Select": [index, list.to_template_value()] }),
      Expr::Split { delimiter, source } => json!({ "Fn::Split": [delimiter, source.to_template_value()] }),
      Expr::Join { delimiter, parts } => {
        let parts: Vec<Value> = parts.iter().map(Expr::to_template_value).collect();
        json!({ "Fn::Join": [delimiter, parts] })
      }
    }
  }
}

impl From<&str> for Expr {
  fn from(value: &str) -> Self {
    Expr::Literal(value.to_string())
  }
}

impl From<String> for Expr {
  fn from(value: String) -> Self {
    Expr::Literal(value)
  }
}

impl Serialize for Expr {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.to_template_value().serialize(serializer)
  }
}

/// Plain text with `${...}` markers left in place, used for assembly
/// properties, logs and CLI output.
impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Expr::Literal(s) | Expr::Sub(s) => write!(f, "{s}"),
      Expr::Ref(name) => write!(f, "${{{name}}}"),
      Expr::Select { index, list } => write!(f, "select({index}, {list})"),
      Expr::Split { delimiter, source } => write!(f, "split('{delimiter}', {source})"),
      Expr::Join { delimiter, parts } if delimiter.is_empty() => {
        for part in parts {
          write!(f, "{part}")?;
        }
        Ok(())
      }
      Expr::Join { delimiter, parts } => {
        let rendered: Vec<String> = parts.iter().map(ToString::to_string).collect();
        write!(f, "join('{delimiter}', [{}])", rendered.join(", "))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sub_only_when_markers_present() {
    assert_eq!(Expr::sub_if_needed("plain-bucket"), Expr::literal("plain-bucket"));
    assert_eq!(
      Expr::sub_if_needed("cdk-${AWS::Region}"),
      Expr::Sub("cdk-${AWS::Region}".to_string())
    );
    assert_eq!(Expr::sub_if_needed("cost-$5"), Expr::literal("cost-$5"));
    assert_eq!(
      Expr::sub_if_needed("raw-${!Literal}"),
      Expr::Sub("raw-${!Literal}".to_string())
    );
    // unclosed markers are left for the deployment engine to reject
    assert_eq!(Expr::sub_if_needed("oops-${"), Expr::Sub("oops-${".to_string()));
  }

  #[test]
  fn concat_folds_literals() {
    let e = Expr::concat([Expr::literal("a"), Expr::literal("b"), Expr::literal("")]);
    assert_eq!(e, Expr::literal("ab"));
  }

  #[test]
  fn concat_keeps_symbolic_parts() {
    let e = Expr::concat([
      Expr::literal("https://s3."),
      Expr::region(),
      Expr::literal("."),
      Expr::url_suffix(),
    ]);
    assert_eq!(
      e.to_template_value(),
      json!({ "Fn::Join": ["", ["https://s3.", {"Ref": "AWS::Region"}, ".", {"Ref": "AWS::URLSuffix"}]] })
    );
    assert_eq!(e.to_string(), "https://s3.${AWS::Region}.${AWS::URLSuffix}");
  }

  #[test]
  fn concat_flattens_nested_joins() {
    let inner = Expr::concat([Expr::reference("P"), Expr::literal("/x")]);
    let outer = Expr::concat([Expr::literal("s3://"), inner]);
    match outer {
      Expr::Join { parts, .. } => assert_eq!(parts.len(), 3),
      other => panic!("expected join, got {other:?}"),
    }
  }

  #[test]
  fn select_split_render() {
    let key = Expr::select(0, Expr::split("||", Expr::reference("KeyParam")));
    assert_eq!(
      key.to_template_value(),
      json!({ "Fn::Select": [0, { "Fn::Split": ["||", { "Ref": "KeyParam" }] }] })
    );
  }

  #[test]
  fn sub_fragment_escapes_literals() {
    assert_eq!(Expr::literal("a${b}").to_sub_fragment().unwrap(), "a${!b}");
    assert_eq!(Expr::region().to_sub_fragment().unwrap(), "${AWS::Region}");
    assert!(Expr::select(0, Expr::reference("x")).to_sub_fragment().is_none());
  }

  #[test]
  fn resolved_or_default() {
    assert_eq!(Expr::literal("eu-west-1").resolved_or("current_region"), "eu-west-1");
    assert_eq!(Expr::region().resolved_or("current_region"), "current_region");
  }
}
