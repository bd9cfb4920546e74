//! Placeholder parsing and substitution for bootstrap configuration strings.
//!
//! Bucket names, repository names and role ARNs are configured as templates
//! that reference values which may not be known at synthesis time. This
//! module parses those templates and substitutes the values that are known.
//!
//! # Placeholder Formats
//!
//! - `${Qualifier}` - the bootstrap qualifier, always known at synthesis time
//! - `${AWS::AccountId}` - the target account, known only for pinned stacks
//! - `${AWS::Region}` - the target region, known only for pinned stacks
//! - `${AWS::Partition}` - the target partition, never known at synthesis time
//!
//! Any other `${Name}` marker is preserved verbatim so that it can be resolved
//! by the deployment engine.
//!
//! # Escaping
//!
//! `${!Name}` is the template escape for a literal `${Name}` and passes
//! through unchanged.
//!
//! # Example
//!
//! ```
//! use stacksynth_lib::placeholder::{Specialization, specialize};
//!
//! let bucket = specialize(
//!   "cdk-${Qualifier}-assets-${AWS::AccountId}-${AWS::Region}",
//!   &Specialization { qualifier: "hnb659fds", account: Some("123456789012"), region: None },
//! )
//! .unwrap();
//! assert_eq!(bucket, "cdk-hnb659fds-assets-123456789012-${AWS::Region}");
//! ```

use thiserror::Error;

/// A parsed placeholder reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  /// `${Qualifier}`
  Qualifier,

  /// `${AWS::AccountId}`
  AccountId,

  /// `${AWS::Region}`
  Region,

  /// `${AWS::Partition}`
  Partition,

  /// Any other `${Name}` marker, resolved at deploy time.
  Other(String),
}

impl Placeholder {
  /// The name between `${` and `}`.
  pub fn name(&self) -> &str {
    match self {
      Placeholder::Qualifier => "Qualifier",
      Placeholder::AccountId => "AWS::AccountId",
      Placeholder::Region => "AWS::Region",
      Placeholder::Partition => "AWS::Partition",
      Placeholder::Other(name) => name,
    }
  }

  fn from_name(name: &str) -> Self {
    match name {
      "Qualifier" => Placeholder::Qualifier,
      "AWS::AccountId" => Placeholder::AccountId,
      "AWS::Region" => Placeholder::Region,
      "AWS::Partition" => Placeholder::Partition,
      other => Placeholder::Other(other.to_string()),
    }
  }

  /// The marker text, e.g. `${AWS::Region}`.
  pub fn marker(&self) -> String {
    format!("${{{}}}", self.name())
  }
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A placeholder to be resolved
  Placeholder(Placeholder),
}

/// Errors that can occur during placeholder parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("empty placeholder at position {0}")]
  Empty(usize),
}

/// Supplies values for placeholders.
///
/// Returning `None` leaves the marker in the output for deploy-time resolution.
pub trait Resolver {
  fn resolve(&self, placeholder: &Placeholder) -> Option<&str>;
}

/// Parse a string containing placeholders into segments.
///
/// # Errors
///
/// Returns an error if a `${` is never closed or encloses nothing.
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' || !matches!(chars.peek(), Some((_, '{'))) {
      literal.push(ch);
      continue;
    }
    chars.next(); // consume the {

    // "${!" is the template escape, keep it as literal text
    if let Some((_, '!')) = chars.peek() {
      chars.next();
      literal.push_str("${!");
      continue;
    }

    let mut name = String::new();
    let mut found_close = false;
    for (_, c) in chars.by_ref() {
      if c == '}' {
        found_close = true;
        break;
      }
      name.push(c);
    }

    if !found_close {
      return Err(PlaceholderError::Unclosed(pos));
    }
    if name.is_empty() {
      return Err(PlaceholderError::Empty(pos));
    }

    if !literal.is_empty() {
      segments.push(Segment::Literal(std::mem::take(&mut literal)));
    }
    segments.push(Segment::Placeholder(Placeholder::from_name(&name)));
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Substitute every placeholder the resolver knows, keeping the rest as markers.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  Ok(substitute_segments(&segments, resolver))
}

/// Substitute placeholders in pre-parsed segments.
pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> String {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(p) => match resolver.resolve(p) {
        Some(value) => result.push_str(value),
        None => result.push_str(&p.marker()),
      },
    }
  }

  result
}

/// Placeholders still present in `input`, in order of appearance.
pub fn placeholders(input: &str) -> Result<Vec<Placeholder>, PlaceholderError> {
  Ok(
    parse(input)?
      .into_iter()
      .filter_map(|s| match s {
        Segment::Placeholder(p) => Some(p),
        Segment::Literal(_) => None,
      })
      .collect(),
  )
}

/// Whether any `${...}` marker remains in `input`.
///
/// Malformed input counts as containing placeholders.
pub fn has_placeholders(input: &str) -> bool {
  placeholders(input).map(|p| !p.is_empty()).unwrap_or(true)
}

/// Values known for a stack at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specialization<'a> {
  pub qualifier: &'a str,
  /// Concrete account, or `None` for an environment-agnostic stack.
  pub account: Option<&'a str>,
  /// Concrete region, or `None` for an environment-agnostic stack.
  pub region: Option<&'a str>,
}

struct QualifierResolver<'a>(&'a str);

impl Resolver for QualifierResolver<'_> {
  fn resolve(&self, placeholder: &Placeholder) -> Option<&str> {
    match placeholder {
      Placeholder::Qualifier => Some(self.0),
      _ => None,
    }
  }
}

struct EnvironmentResolver<'a> {
  account: Option<&'a str>,
  region: Option<&'a str>,
}

impl Resolver for EnvironmentResolver<'_> {
  fn resolve(&self, placeholder: &Placeholder) -> Option<&str> {
    match placeholder {
      Placeholder::AccountId => self.account,
      Placeholder::Region => self.region,
      // The partition (aws, aws-cn, aws-us-gov, ...) is only known where the
      // template is deployed.
      Placeholder::Partition => None,
      _ => None,
    }
  }
}

/// Replace placeholders as far as the known values allow.
///
/// The qualifier is replaced first, then account and region when they are
/// concrete. `${AWS::Partition}` is always left in place.
pub fn specialize(input: &str, spec: &Specialization<'_>) -> Result<String, PlaceholderError> {
  let qualified = substitute(input, &QualifierResolver(spec.qualifier))?;
  substitute(
    &qualified,
    &EnvironmentResolver {
      account: spec.account,
      region: spec.region,
    },
  )
}
