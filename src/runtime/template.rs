/// Prompt template rendering
///
/// Replaces `{{path}}` and `{{{path}}}` placeholders with values from the answers.
/// Paths are dotted (`api.items.0.name`) and descend into objects and arrays. Missing
/// values render as the empty string; no escaping is applied.

use crate::diagram::Answers;
use serde_json::Value;

pub fn render_template(template: &str, answers: &Answers) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start..];
        let (open, close) = if after_open.starts_with("{{{") {
            ("{{{", "}}}")
        } else {
            ("{{", "}}")
        };

        let body = &after_open[open.len()..];
        let Some(end) = body.find(close) else {
            // Unterminated placeholder stays literal
            output.push_str(after_open);
            return output;
        };

        output.push_str(&lookup(body[..end].trim(), answers));
        rest = &body[end + close.len()..];
    }

    output.push_str(rest);
    output
}

fn lookup(path: &str, answers: &Answers) -> String {
    let mut segments = path.split('.');
    let Some(first) = segments.next().and_then(|key| answers.get(key)) else {
        return String::new();
    };

    let value = segments.try_fold(first, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    });

    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
