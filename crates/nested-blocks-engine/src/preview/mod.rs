/*!
# Collapsed block previews

When a block collapses its body is hidden and a one-line summary of its fields is shown
instead. The summary is built field by field, in layout order, by a [`FieldFormatter`]
looked up by the field's type. Hosts can replace any formatter or add their own field types.

Formatters return HTML fragments. Text taken from field values must be escaped with
[`escape`]; each non-empty fragment is wrapped in a `preview_section` span.
*/

mod standard;

use crate::models::block_type::{FieldDef, FieldLayout};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Escape `&`, `<`, `>`, quotes and `/` for HTML output
pub fn escape(text: &str) -> String {
    html_escape::encode_safe(text).into_owned()
}

/// Renders one field value into an HTML fragment. `None` or empty output is skipped.
pub trait FieldFormatter {
    fn format(&self, field: &FieldDef, value: &Value) -> Option<String>;
}

impl<F> FieldFormatter for F
where
    F: Fn(&FieldDef, &Value) -> Option<String>,
{
    fn format(&self, field: &FieldDef, value: &Value) -> Option<String> {
        self(field, value)
    }
}

/// Formatters keyed by field type
pub struct PreviewRegistry {
    formatters: HashMap<String, Box<dyn FieldFormatter>>,
}

impl PreviewRegistry {
    /// A registry with no formatters at all
    pub fn empty() -> Self {
        Self {
            formatters: HashMap::new(),
        }
    }

    /// A registry with the built-in formatters for the standard field types
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        standard::register_all(&mut registry);
        registry
    }

    /// Install `formatter` for `field_type`, replacing any previous one
    pub fn register(
        &mut self,
        field_type: impl Into<String>,
        formatter: impl FieldFormatter + 'static,
    ) -> &mut Self {
        self.formatters.insert(field_type.into(), Box::new(formatter));
        self
    }

    pub fn supports(&self, field_type: &str) -> bool {
        self.formatters.contains_key(field_type)
    }

    /// Summarize block `content` (relative field data) following `layout`
    pub fn summarize(&self, layout: &FieldLayout, content: &Value) -> String {
        let mut preview = String::new();

        for field in layout.fields() {
            let Some(value) = content.get(&field.handle) else {
                continue;
            };
            let Some(formatter) = self.formatters.get(&field.field_type) else {
                continue;
            };
            if let Some(fragment) = formatter.format(field, value)
                && !fragment.is_empty()
            {
                preview.push_str(r#"<span class="preview_section">"#);
                preview.push_str(&fragment);
                preview.push_str("</span>");
            }
        }

        preview
    }
}

impl Default for PreviewRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for PreviewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut field_types: Vec<&String> = self.formatters.keys().collect();
        field_types.sort();
        f.debug_struct("PreviewRegistry")
            .field("field_types", &field_types)
            .finish()
    }
}
