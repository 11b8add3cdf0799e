//! Templates for new notes
//!
//! Supports simple variable substitution using `{{variable}}` syntax.
//! Variables can include format specifiers for dates: `{{date:%Y-%m-%d}}`.
//! Templates live as markdown files under the workspace meta folder
//! (`.notegrove/templates/`); a built-in template is used when none is
//! configured.

use chrono::{Local, NaiveDate};
use indexmap::IndexMap;
use std::path::Path;

use crate::config::Config;
use crate::error::{NotegroveError, Result};
use crate::fs::FileSystem;

/// Available template variables and their descriptions
pub const TEMPLATE_VARIABLES: &[(&str, &str)] = &[
    ("title", "The note title"),
    ("filename", "The filename without extension"),
    (
        "date",
        "Current date (default: %Y-%m-%d). Use {{date:%B %d, %Y}} for custom format",
    ),
    (
        "time",
        "Current time (default: %H:%M). Use {{time:%H:%M:%S}} for custom format",
    ),
    ("year", "Current year (4 digits)"),
    ("month", "Current month (2 digits)"),
    ("month_name", "Current month name (e.g., January)"),
    ("day", "Current day (2 digits)"),
    ("weekday", "Current weekday name (e.g., Monday)"),
];

/// Built-in template applied when no workspace template is configured
pub const DEFAULT_NOTE_TEMPLATE: &str = "# {{title}}\n\n";

/// A named note template
#[derive(Debug, Clone)]
pub struct Template {
    /// Template name (derived from filename)
    pub name: String,
    /// Raw template content (before variable substitution)
    pub raw_content: String,
}

impl Template {
    /// Create a new template from raw content
    pub fn new(name: impl Into<String>, raw_content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_content: raw_content.into(),
        }
    }

    /// Load a template from a file
    pub fn from_file<FS: FileSystem>(fs: &FS, path: &Path) -> Result<Self> {
        let content = fs
            .read_to_string(path)
            .map_err(|e| NotegroveError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self::new(name, content))
    }

    /// The built-in default template
    pub fn builtin() -> Self {
        Self::new("note", DEFAULT_NOTE_TEMPLATE)
    }

    /// Render the template with the given context
    pub fn render(&self, context: &TemplateContext) -> String {
        substitute_variables(&self.raw_content, context)
    }
}

/// Context for template variable substitution
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Title for the note
    pub title: Option<String>,
    /// Filename (without extension)
    pub filename: Option<String>,
    /// Date to use (defaults to today)
    pub date: Option<NaiveDate>,
    /// Custom variables
    pub custom: IndexMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the filename
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the date
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Add a custom variable
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// Get the effective date (provided or today)
    fn effective_date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Get the effective title (provided, filename, or "Untitled")
    fn effective_title(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.filename.clone())
            .unwrap_or_else(|| "Untitled".to_string())
    }
}

/// Substitute template variables in a string
fn substitute_variables(content: &str, context: &TemplateContext) -> String {
    let mut result = content.to_string();
    let now = Local::now();
    let date = context.effective_date();

    // Format-specifier variants first, e.g. {{date:%Y-%m-%d}}
    result = substitute_formatted_variables(&result, "date", |fmt| date.format(fmt).to_string());
    result = substitute_formatted_variables(&result, "time", |fmt| now.format(fmt).to_string());

    let replacements: Vec<(&str, String)> = vec![
        ("title", context.effective_title()),
        ("filename", context.filename.clone().unwrap_or_default()),
        ("date", date.format("%Y-%m-%d").to_string()),
        ("time", now.format("%H:%M").to_string()),
        ("year", date.format("%Y").to_string()),
        ("month", date.format("%m").to_string()),
        ("month_name", date.format("%B").to_string()),
        ("day", date.format("%d").to_string()),
        ("weekday", date.format("%A").to_string()),
    ];

    for (var, value) in replacements {
        let pattern = format!("{{{{{}}}}}", var);
        result = result.replace(&pattern, &value);
    }

    for (key, value) in &context.custom {
        let pattern = format!("{{{{{}}}}}", key);
        result = result.replace(&pattern, value);
    }

    result
}

/// Substitute variables with format specifiers like {{var:FORMAT}}
fn substitute_formatted_variables<F>(content: &str, var_name: &str, formatter: F) -> String
where
    F: Fn(&str) -> String,
{
    let mut result = content.to_string();
    let prefix = format!("{{{{{}:", var_name);

    while let Some(start) = result.find(&prefix) {
        let rest = &result[start + prefix.len()..];
        if let Some(end) = rest.find("}}") {
            let format_str = &rest[..end];
            let full_pattern = format!("{{{{{}:{}}}}}", var_name, format_str);
            let replacement = formatter(format_str);
            result = result.replace(&full_pattern, &replacement);
        } else {
            break;
        }
    }

    result
}

/// Names of the templates stored in a workspace
pub fn list_templates<FS: FileSystem>(fs: &FS, config: &Config, root: &Path) -> Vec<String> {
    let dir = config.template_dir(root);
    if !fs.is_dir(&dir) {
        return Vec::new();
    }
    match fs.list_entries(&dir) {
        Ok(entries) => entries
            .into_iter()
            .filter(|e| !e.is_dir && config.is_note_file(&e.name))
            .map(|e| config.strip_note_ext(&e.name).to_string())
            .collect(),
        Err(e) => {
            log::warn!("Failed to list templates in {:?}: {}", dir, e);
            Vec::new()
        }
    }
}

/// Resolve the template for new notes.
///
/// Uses the configured workspace template when present; falls back to the
/// built-in with a warning when it is configured but missing or unreadable.
pub fn resolve_new_note_template<FS: FileSystem>(
    fs: &FS,
    config: &Config,
    root: &Path,
) -> Template {
    let Some(name) = &config.new_note_template else {
        return Template::builtin();
    };
    let path = config
        .template_dir(root)
        .join(format!("{name}{}", config.note_extension));
    match Template::from_file(fs, &path) {
        Ok(template) => template,
        Err(e) => {
            log::warn!("Configured template '{}' unavailable: {}", name, e);
            Template::builtin()
        }
    }
}
