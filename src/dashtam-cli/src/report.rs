//! Command output in the configured style.

use dashtam_login::OutputStyle;

use crate::styled_output::{MessageType, bold, styled_label};

/// Titled set of fields, with a JSON form for machine output.
#[derive(Debug, Clone)]
pub struct Report {
    title: String,
    fields: Vec<(String, String, Option<MessageType>)>,
    json: serde_json::Value,
}

impl Report {
    pub fn new(title: impl Into<String>, json: serde_json::Value) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
            json,
        }
    }

    pub fn field(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((label.into(), value.into(), None));
        self
    }

    /// A field whose value is highlighted in rich output.
    pub fn highlighted(
        mut self,
        label: impl Into<String>,
        value: impl Into<String>,
        kind: MessageType,
    ) -> Self {
        self.fields.push((label.into(), value.into(), Some(kind)));
        self
    }

    /// Render for `style`.
    pub fn render(&self, style: OutputStyle) -> String {
        match style {
            OutputStyle::Json => {
                serde_json::to_string_pretty(&self.json).unwrap_or_else(|_| self.json.to_string())
            }
            OutputStyle::Plain => self
                .fields
                .iter()
                .map(|(label, value, _)| format!("{label}: {value}"))
                .collect::<Vec<_>>()
                .join("\n"),
            OutputStyle::Rich => {
                let width = self.fields.iter().map(|(l, _, _)| l.len()).max().unwrap_or(0);
                let mut out = bold(&self.title);
                for (label, value, kind) in &self.fields {
                    let value = match kind {
                        Some(kind) => styled_label(*kind, value),
                        None => value.clone(),
                    };
                    let label = styled_label(MessageType::Dim, &format!("{label:<width$}"));
                    out.push_str(&format!("\n  {label}  {value}"));
                }
                out
            }
        }
    }

    pub fn print(&self, style: OutputStyle) {
        println!("{}", self.render(style));
    }
}

/// Human description of the time until `at`, e.g. `in 14m` or `3h ago`.
pub fn relative_time(at: chrono::DateTime<chrono::Utc>, now: chrono::DateTime<chrono::Utc>) -> String {
    let delta = at - now;
    let secs = delta.num_seconds().abs();
    let amount = if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    };
    if delta.num_seconds() >= 0 {
        format!("in {amount}")
    } else {
        format!("{amount} ago")
    }
}
