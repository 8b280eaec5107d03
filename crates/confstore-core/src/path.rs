//! Locations inside a JSON value (or inside the form projected from it).
//!
//! Rendered in dot/bracket notation: `servers[0].host`. The empty path is the
//! document root.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
  Index(usize),
  Key(String),
}

/// A sequence of [`Segment`]s from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ValuePath(Vec<Segment>);

impl ValuePath {
  pub fn root() -> Self { Self(Vec::new()) }

  pub fn is_root(&self) -> bool { self.0.is_empty() }

  pub fn segments(&self) -> &[Segment] { &self.0 }

  /// A new path one key deeper.
  pub fn key(&self, name: impl Into<String>) -> Self {
    let mut next = self.clone();
    next.0.push(Segment::Key(name.into()));
    next
  }

  /// A new path one array index deeper.
  pub fn index(&self, i: usize) -> Self {
    let mut next = self.clone();
    next.0.push(Segment::Index(i));
    next
  }

  pub fn push(&mut self, segment: Segment) { self.0.push(segment); }

  pub fn pop(&mut self) -> Option<Segment> { self.0.pop() }

  /// The path without its last segment, or `None` at the root.
  pub fn parent(&self) -> Option<Self> {
    let (_, init) = self.0.split_last()?;
    Some(Self(init.to_vec()))
  }

  pub fn last(&self) -> Option<&Segment> { self.0.last() }

  /// Convert a JSON Pointer (`/servers/0/host`) into a path, reading `value`
  /// to tell array indices from numeric object keys.
  pub fn from_pointer(pointer: &str, value: &Value) -> Self {
    let mut path = Self::root();
    let mut current = Some(value);
    for token in pointer.split('/').skip(1) {
      let token = token.replace("~1", "/").replace("~0", "~");
      match (current, token.parse::<usize>()) {
        (Some(Value::Array(items)), Ok(i)) => {
          current = items.get(i);
          path.0.push(Segment::Index(i));
        }
        (Some(Value::Object(map)), _) => {
          current = map.get(&token);
          path.0.push(Segment::Key(token));
        }
        _ => {
          current = None;
          path.0.push(Segment::Key(token));
        }
      }
    }
    path
  }
}

impl From<Vec<Segment>> for ValuePath {
  fn from(segments: Vec<Segment>) -> Self { Self(segments) }
}

fn is_plain_key(key: &str) -> bool {
  !key.is_empty()
    && key
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl fmt::Display for ValuePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, segment) in self.0.iter().enumerate() {
      match segment {
        Segment::Index(n) => write!(f, "[{n}]")?,
        Segment::Key(k) if is_plain_key(k) => {
          if i > 0 {
            f.write_str(".")?;
          }
          f.write_str(k)?;
        }
        Segment::Key(k) => write!(f, "[{k:?}]")?,
      }
    }
    Ok(())
  }
}

impl Serialize for ValuePath {
  fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn renders_dot_and_bracket_notation() {
    let path = ValuePath::root().key("servers").index(0).key("host");
    assert_eq!(path.to_string(), "servers[0].host");
  }

  #[test]
  fn root_renders_empty() {
    assert_eq!(ValuePath::root().to_string(), "");
    assert_eq!(ValuePath::root().index(2).to_string(), "[2]");
  }

  #[test]
  fn unusual_keys_are_quoted() {
    let path = ValuePath::root().key("a.b").key("c");
    assert_eq!(path.to_string(), "[\"a.b\"].c");
  }

  #[test]
  fn pointers_follow_the_value_shape() {
    let value = serde_json::json!({ "hosts": [{ "0": "a" }], "a/b": 1 });
    let path = ValuePath::from_pointer("/hosts/0/0", &value);
    assert_eq!(
      path.segments(),
      [Segment::Key("hosts".into()), Segment::Index(0), Segment::Key("0".into())]
    );
    assert_eq!(ValuePath::from_pointer("/a~1b", &value), ValuePath::root().key("a/b"));
    assert!(ValuePath::from_pointer("", &value).is_root());
  }

  #[test]
  fn parent_drops_last_segment() {
    let path = ValuePath::root().key("a").index(3);
    assert_eq!(path.parent(), Some(ValuePath::root().key("a")));
    assert_eq!(ValuePath::root().parent(), None);
  }
}
