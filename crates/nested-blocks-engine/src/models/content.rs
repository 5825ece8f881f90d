use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Raw form data of a block, keyed by full bracketed field name
pub type RawContent = BTreeMap<String, Value>;

static SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\[\]]+").expect("segment pattern is valid"));

/// Bracketed field-name path such as `fields[blocks][12]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Namespace(Vec<String>);

impl Namespace {
    pub fn parse(value: &str) -> Self {
        Self(
            SEGMENT
                .find_iter(value)
                .map(|m| m.as_str().to_string())
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// This namespace with one more segment appended
    pub fn child(&self, segment: impl fmt::Display) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    /// Full input name for a field of a block living in this namespace.
    ///
    /// `fields[blocks][12]` with `["title"]` gives `fields[blocks][12][fields][title]`.
    pub fn field_name(&self, path: &[&str]) -> String {
        let mut name = self.child("fields");
        name.0.extend(path.iter().map(|s| s.to_string()));
        name.to_string()
    }

    /// Segments of `name` below this namespace, skipping the segment right after it
    fn relative<'a>(&self, name: &'a [String]) -> Option<&'a [String]> {
        if name.len() <= self.len() + 1 || !name.starts_with(&self.0) {
            return None;
        }
        Some(&name[self.len() + 1..])
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut segments = self.0.iter();
        if let Some(first) = segments.next() {
            write!(f, "{first}")?;
        }
        for segment in segments {
            write!(f, "[{segment}]")?;
        }
        Ok(())
    }
}

impl From<String> for Namespace {
    fn from(value: String) -> Self {
        Namespace::parse(&value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.to_string()
    }
}

/// Assemble raw field data into a nested object relative to `namespace`.
///
/// Names outside the namespace are skipped. The first segment below the namespace
/// (`fields` for block content) is dropped, so `fields[blocks][12][fields][title]` under
/// `fields[blocks][12]` lands at `{"title": ...}`.
pub fn assemble_content(namespace: &Namespace, raw: &RawContent) -> Value {
    let mut root = Map::new();

    for (name, value) in raw {
        let segments = Namespace::parse(name);
        if let Some(path) = namespace.relative(segments.segments()) {
            set_path(&mut root, path, value.clone());
        }
    }

    Value::Object(root)
}

fn set_path(target: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = target;
    for key in parents {
        let slot = current
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }

    current.insert(last.clone(), value);
}

/// Rewrite every field name under `from` so it lives under `to` instead
pub fn rename_namespace(raw: &RawContent, from: &Namespace, to: &Namespace) -> RawContent {
    raw.iter()
        .filter_map(|(name, value)| {
            let segments = Namespace::parse(name);
            let rest = segments.segments().strip_prefix(from.segments())?;
            let mut renamed = to.clone();
            renamed.0.extend(rest.iter().cloned());
            Some((renamed.to_string(), value.clone()))
        })
        .collect()
}
