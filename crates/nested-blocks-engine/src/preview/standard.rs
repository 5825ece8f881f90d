//! Formatters for the standard field types.
//!
//! Values are read the way hosts submit them: text fields as strings or numbers, option
//! fields as the selected label, multi-value fields as arrays of labels, and relation fields
//! as arrays of titles or of objects with a `title`. Asset fields are arrays of objects that
//! may also carry a `srcset` for a thumbnail.

use super::{escape, PreviewRegistry};
use crate::models::block_type::FieldDef;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<.*?>").expect("tag pattern is valid"));

pub(super) fn register_all(registry: &mut PreviewRegistry) {
    for field_type in ["PlainText", "Number", "Dropdown", "RadioButtons", "PositionSelect"] {
        registry.register(field_type, text);
    }
    for field_type in ["Checkboxes", "MultiSelect"] {
        registry.register(field_type, list);
    }
    for field_type in ["Entries", "Categories", "Tags", "Users"] {
        registry.register(field_type, elements);
    }
    registry
        .register("RichText", rich_text)
        .register("Assets", assets)
        .register("Lightswitch", lightswitch)
        .register("Date", date)
        .register("Color", color);
}

/// Display text of a scalar value
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text(_: &FieldDef, value: &Value) -> Option<String> {
    scalar(value).map(|s| escape(&s))
}

fn list(_: &FieldDef, value: &Value) -> Option<String> {
    let items: Vec<String> = value.as_array()?.iter().filter_map(scalar).collect();
    Some(escape(&items.join(", ")))
}

fn elements(_: &FieldDef, value: &Value) -> Option<String> {
    let titles: Vec<String> = value
        .as_array()?
        .iter()
        .filter_map(|element| match element {
            Value::Object(fields) => fields.get("title").and_then(scalar),
            other => scalar(other),
        })
        .map(|title| escape(&title))
        .collect();
    Some(titles.join(", "))
}

/// Tags are dropped and entities decoded, then the remaining text is escaped again
fn rich_text(_: &FieldDef, value: &Value) -> Option<String> {
    let html = value.as_str()?;
    let stripped = TAG.replace_all(html, "");
    let text = html_escape::decode_html_entities(&stripped);
    Some(escape(text.trim()))
}

/// Thumbnails for every asset; a lone asset also shows its title
fn assets(_: &FieldDef, value: &Value) -> Option<String> {
    let assets = value.as_array()?;
    let mut parts: Vec<String> = assets
        .iter()
        .filter_map(|asset| asset.get("srcset").and_then(Value::as_str))
        .map(|srcset| format!(r#"<img sizes="30px" srcset="{}">"#, escape(srcset)))
        .collect();

    if let [asset] = assets.as_slice() {
        let title = match asset {
            Value::Object(fields) => fields.get("title").and_then(scalar),
            other => scalar(other),
        };
        parts.extend(title.map(|title| escape(&title)));
    }
    Some(parts.join(" "))
}

fn lightswitch(field: &FieldDef, value: &Value) -> Option<String> {
    let on = match value {
        Value::Bool(on) => *on,
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Number(n) => n.as_i64() != Some(0),
        _ => false,
    };
    let status = if on { "status live" } else { "status" };
    Some(format!(
        r#"<span class="{status}"></span>{}"#,
        escape(&field.label)
    ))
}

fn date(_: &FieldDef, value: &Value) -> Option<String> {
    let (date, time) = match value {
        Value::Object(parts) => (
            parts.get("date").and_then(scalar),
            parts.get("time").and_then(scalar),
        ),
        other => (scalar(other), None),
    };
    let joined = match (date, time) {
        (Some(date), Some(time)) => format!("{date} {time}"),
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => return None,
    };
    Some(escape(&joined))
}

fn color(_: &FieldDef, value: &Value) -> Option<String> {
    let color = scalar(value)?;
    Some(format!(
        r#"<div class="preview_color" style="background-color: {}"></div>"#,
        escape(&color)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn field(field_type: &str) -> FieldDef {
        FieldDef {
            handle: "f".into(),
            label: "Featured".into(),
            field_type: field_type.into(),
        }
    }

    #[rstest]
    #[case::plain_text("PlainText", json!("a < b"), Some("a &lt; b"))]
    #[case::number("Number", json!(42), Some("42"))]
    #[case::dropdown("Dropdown", json!("Large"), Some("Large"))]
    #[case::checkboxes("Checkboxes", json!(["Red", "Blue"]), Some("Red, Blue"))]
    #[case::entries("Entries", json!([{"title": "Home"}, "About & Us"]), Some("Home, About &amp; Us"))]
    #[case::rich_text("RichText", json!("<p>Hi <em>there</em></p>\n"), Some("Hi there"))]
    #[case::rich_text_unclosed_tag("RichText", json!("<p>hi</p><img src=x onerror=alert(1) "), Some("hi&lt;img src=x onerror=alert(1)"))]
    #[case::rich_text_entity("RichText", json!("<p>Fish &amp; chips</p>"), Some("Fish &amp; chips"))]
    #[case::single_asset("Assets", json!([{"title": "Logo", "srcset": "a.png 1x"}]), Some(r#"<img sizes="30px" srcset="a.png 1x"> Logo"#))]
    #[case::many_assets("Assets", json!([{"title": "A", "srcset": "a.png 1x"}, {"title": "B", "srcset": "b.png 1x"}]), Some(r#"<img sizes="30px" srcset="a.png 1x"> <img sizes="30px" srcset="b.png 1x">"#))]
    #[case::asset_without_thumbnail("Assets", json!([{"title": "<Doc>"}]), Some("&lt;Doc&gt;"))]
    #[case::lightswitch_on("Lightswitch", json!(true), Some(r#"<span class="status live"></span>Featured"#))]
    #[case::lightswitch_off("Lightswitch", json!("0"), Some(r#"<span class="status"></span>Featured"#))]
    #[case::date_and_time("Date", json!({"date": "2024-05-01", "time": "10:00"}), Some("2024-05-01 10:00"))]
    #[case::date_only("Date", json!({"date": "2024-05-01"}), Some("2024-05-01"))]
    #[case::empty_date("Date", json!({}), None)]
    #[case::color("Color", json!("#ff0000"), Some(r##"<div class="preview_color" style="background-color: #ff0000"></div>"##))]
    fn test_standard_formatters(
        #[case] field_type: &str,
        #[case] value: Value,
        #[case] expected: Option<&str>,
    ) {
        let registry = PreviewRegistry::standard();
        let field = field(field_type);
        let formatter = registry.formatters.get(field_type).unwrap();

        assert_eq!(formatter.format(&field, &value).as_deref(), expected);
    }

    #[test]
    fn test_every_standard_type_is_registered() {
        let registry = PreviewRegistry::standard();
        for field_type in [
            "PlainText",
            "Number",
            "RichText",
            "Dropdown",
            "RadioButtons",
            "PositionSelect",
            "Checkboxes",
            "MultiSelect",
            "Entries",
            "Categories",
            "Tags",
            "Users",
            "Lightswitch",
            "Date",
            "Color",
            "Assets",
        ] {
            assert!(registry.supports(field_type), "{field_type}");
        }
    }
}
