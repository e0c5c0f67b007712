//! Validation schema builder.
//!
//! A template compiles into one [`ValidationRule`] per field. Rules are pure:
//! they look at a single value and either accept it or describe what is wrong
//! with it. Field errors are returned as data and never raised.

use chrono::{DateTime, NaiveDate, NaiveTime};
use std::collections::{BTreeMap, HashMap};

use crate::config::FormsConfig;
use crate::types::{
    FieldDescriptor, FieldError, FieldErrorKind, FieldKind, FieldValue, FileHandle, Template,
};

/// Render a byte count the way upload widgets display it (`"5 MB"`).
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", size);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// Parsed HTML-style `accept` list: `.ext`, `type/*` or exact MIME types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptFilter {
    raw: String,
    extensions: Vec<String>,
    mime_prefixes: Vec<String>,
    mime_types: Vec<String>,
}

impl AcceptFilter {
    /// Parse a comma separated accept list. Returns `None` when it names nothing.
    pub fn parse(accept: &str) -> Option<Self> {
        let mut filter = Self {
            raw: accept.trim().to_string(),
            extensions: Vec::new(),
            mime_prefixes: Vec::new(),
            mime_types: Vec::new(),
        };

        for entry in accept.split(',').map(|e| e.trim().to_lowercase()) {
            if entry.is_empty() {
                continue;
            }
            if entry.starts_with('.') {
                filter.extensions.push(entry);
            } else if let Some(prefix) = entry.strip_suffix("/*") {
                filter.mime_prefixes.push(format!("{}/", prefix));
            } else {
                filter.mime_types.push(entry);
            }
        }

        if filter.extensions.is_empty()
            && filter.mime_prefixes.is_empty()
            && filter.mime_types.is_empty()
        {
            None
        } else {
            Some(filter)
        }
    }

    /// The list as written in the template.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `file` matches any entry. Files without a MIME type are matched
    /// by a type guessed from their extension.
    pub fn accepts(&self, file: &FileHandle) -> bool {
        let extension = file.extension();
        if let Some(ext) = &extension {
            if self.extensions.iter().any(|e| e == ext) {
                return true;
            }
        }

        let mime = file
            .mime
            .as_ref()
            .map(|m| m.trim().to_lowercase())
            .or_else(|| extension.as_deref().and_then(guess_mime).map(str::to_string));

        match mime {
            Some(mime) => {
                self.mime_types.iter().any(|m| *m == mime)
                    || self.mime_prefixes.iter().any(|p| mime.starts_with(p.as_str()))
            }
            None => false,
        }
    }
}

fn guess_mime(extension: &str) -> Option<&'static str> {
    let mime = match extension {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".heic" => "image/heic",
        ".pdf" => "application/pdf",
        ".csv" => "text/csv",
        ".txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

/// Size and type limits for a file field.
///
/// Used both by the schema rule and by the render dispatcher when files are
/// picked, so the two checks always share thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConstraints {
    pub max_size: u64,
    pub accept: Option<AcceptFilter>,
}

impl FileConstraints {
    pub fn for_field(field: &FieldDescriptor, config: &FormsConfig) -> Self {
        Self {
            max_size: config.max_file_size,
            accept: field.accept.as_deref().and_then(AcceptFilter::parse),
        }
    }

    /// Check a selection. Size is checked before type.
    pub fn check(&self, field_id: &str, files: &[FileHandle]) -> Result<(), FieldError> {
        if files.iter().any(|f| f.size > self.max_size) {
            return Err(FieldError::new(
                field_id,
                FieldErrorKind::FileTooLarge,
                format!(
                    "One or more files exceed the maximum size of {}",
                    format_file_size(self.max_size)
                ),
            ));
        }

        if let Some(filter) = &self.accept {
            if let Some(rejected) = files.iter().find(|f| !filter.accepts(f)) {
                return Err(FieldError::new(
                    field_id,
                    FieldErrorKind::TypeMismatch,
                    format!(
                        "{} is not an accepted file type ({})",
                        rejected.name,
                        filter.as_str()
                    ),
                ));
            }
        }

        Ok(())
    }
}

/// Compiled check for a single field.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    field_id: String,
    label: String,
    kind: FieldKind,
    required: bool,
    multiple: bool,
    options: Vec<String>,
    files: Option<FileConstraints>,
}

impl ValidationRule {
    fn compile(field: &FieldDescriptor, config: &FormsConfig) -> Self {
        Self {
            field_id: field.id.clone(),
            label: field.label.clone(),
            kind: field.kind,
            required: field.required,
            multiple: field.multiple,
            options: field.options.iter().map(|o| o.value.clone()).collect(),
            files: (field.kind == FieldKind::File).then(|| FileConstraints::for_field(field, config)),
        }
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// File limits, for file fields only.
    pub fn file_constraints(&self) -> Option<&FileConstraints> {
        self.files.as_ref()
    }

    /// Check one value. `None` and blank values count as absent.
    pub fn check(&self, value: Option<&FieldValue>) -> Result<(), FieldError> {
        // NaN and infinities have no JSON form and would make the record unloadable.
        if let Some(FieldValue::Number(n)) = value {
            if !n.is_finite() {
                return Err(self.mismatch("Must be a finite number"));
            }
        }

        if self.kind == FieldKind::Checkbox {
            let checked = value.map(coerce_bool).unwrap_or(false);
            return if self.required && !checked {
                Err(self.required_error())
            } else {
                Ok(())
            };
        }

        let value = match value.filter(|v| !v.is_blank()) {
            Some(value) => value,
            None if self.required => return Err(self.required_error()),
            None => return Ok(()),
        };

        match self.kind {
            FieldKind::Text | FieldKind::Textarea | FieldKind::Other => match value.as_text() {
                Some(_) => Ok(()),
                None => Err(self.mismatch("Must be text")),
            },
            FieldKind::Number => {
                let numeric = match value {
                    FieldValue::Number(n) => n.is_finite(),
                    FieldValue::Text(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
                    _ => false,
                };
                if numeric {
                    Ok(())
                } else {
                    Err(self.mismatch("Must be a number"))
                }
            }
            FieldKind::Date => match value {
                FieldValue::Text(s) if parses_as_date(s.trim()) => Ok(()),
                _ => Err(self.mismatch("Invalid date")),
            },
            FieldKind::Time => match value {
                FieldValue::Text(s) if parses_as_time(s.trim()) => Ok(()),
                _ => Err(self.mismatch("Invalid time")),
            },
            FieldKind::Select => self.check_select(value),
            FieldKind::File => self.check_files(value),
            FieldKind::Checkbox => Ok(()),
        }
    }

    fn check_select(&self, value: &FieldValue) -> Result<(), FieldError> {
        match value {
            FieldValue::List(items) if self.multiple => {
                match items.iter().find(|item| !self.options.contains(item)) {
                    Some(bad) => Err(self.invalid_option(bad)),
                    None => Ok(()),
                }
            }
            FieldValue::List(_) | FieldValue::Files(_) => {
                Err(self.mismatch("Expected a single choice"))
            }
            scalar => match scalar.as_text() {
                Some(choice) if self.options.iter().any(|o| o.as_str() == &*choice) => {
                    Ok(())
                }
                Some(choice) => Err(self.invalid_option(&choice)),
                None => Err(self.mismatch("Expected a single choice")),
            },
        }
    }

    fn check_files(&self, value: &FieldValue) -> Result<(), FieldError> {
        let files = match value {
            FieldValue::Files(files) => files,
            _ => return Err(self.mismatch("Expected uploaded files")),
        };
        if !self.multiple && files.len() > 1 {
            return Err(self.mismatch("Only one file may be attached"));
        }
        match &self.files {
            Some(constraints) => constraints.check(&self.field_id, files),
            None => Ok(()),
        }
    }

    fn required_error(&self) -> FieldError {
        FieldError::new(
            &self.field_id,
            FieldErrorKind::Required,
            format!("{} is required", self.label),
        )
    }

    fn mismatch(&self, message: &str) -> FieldError {
        FieldError::new(&self.field_id, FieldErrorKind::TypeMismatch, message)
    }

    fn invalid_option(&self, choice: &str) -> FieldError {
        FieldError::new(
            &self.field_id,
            FieldErrorKind::InvalidOption,
            format!("'{}' is not a valid option for {}", choice, self.label),
        )
    }
}

pub(crate) fn coerce_bool(value: &FieldValue) -> bool {
    match value {
        FieldValue::Bool(b) => *b,
        FieldValue::Number(n) => n.is_finite() && *n != 0.0,
        FieldValue::Text(s) => {
            let lower = s.trim().to_lowercase();
            lower == "true" || lower == "1" || lower == "yes" || lower == "on"
        }
        FieldValue::List(items) => !items.is_empty(),
        FieldValue::Files(files) => !files.is_empty(),
    }
}

fn parses_as_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(s).is_ok()
}

fn parses_as_time(s: &str) -> bool {
    NaiveTime::parse_from_str(s, "%H:%M").is_ok()
        || NaiveTime::parse_from_str(s, "%H:%M:%S").is_ok()
}

/// Executable validator for one template: exactly one rule per field, in
/// display order.
#[derive(Debug, Clone)]
pub struct ValidationSchema {
    template_id: String,
    rules: Vec<ValidationRule>,
}

impl ValidationSchema {
    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn rule(&self, field_id: &str) -> Option<&ValidationRule> {
        self.rules.iter().find(|r| r.field_id == field_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule against `values`, keyed by field id.
    pub fn validate(&self, values: &HashMap<String, FieldValue>) -> BTreeMap<String, FieldError> {
        self.rules
            .iter()
            .filter_map(|rule| rule.check(values.get(&rule.field_id)).err())
            .map(|error| (error.field_id.clone(), error))
            .collect()
    }
}

/// Compile a template into its validation schema. Deterministic for the same
/// template and configuration.
pub fn build_validation_schema(template: &Template, config: &FormsConfig) -> ValidationSchema {
    ValidationSchema {
        template_id: template.id.clone(),
        rules: template
            .fields
            .iter()
            .map(|field| ValidationRule::compile(field, config))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn qty_template() -> Template {
        Template::new(
            "t1",
            "Quantity",
            "sampling",
            vec![FieldDescriptor::number("qty", "Quantity").required()],
        )
        .unwrap()
    }

    fn values(pairs: &[(&str, FieldValue)]) -> HashMap<String, FieldValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn kinds(errors: &BTreeMap<String, FieldError>) -> Vec<(&str, FieldErrorKind)> {
        errors
            .iter()
            .map(|(id, e)| (id.as_str(), e.kind))
            .collect()
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
    }

    #[test]
    fn test_one_rule_per_field() {
        let template = crate::catalog::builtin_templates().unwrap().remove(1);
        let schema = build_validation_schema(&template, &FormsConfig::default());
        assert_eq!(schema.len(), template.fields.len());
        for (rule, field) in schema.rules().iter().zip(&template.fields) {
            assert_eq!(rule.field_id(), field.id);
        }
    }

    #[test]
    fn test_required_number_missing() {
        let schema = build_validation_schema(&qty_template(), &FormsConfig::default());
        let errors = schema.validate(&HashMap::new());
        assert_eq!(kinds(&errors), vec![("qty", FieldErrorKind::Required)]);
        assert_eq!(errors["qty"].message, "Quantity is required");
    }

    #[test]
    fn test_number_type_mismatch() {
        let schema = build_validation_schema(&qty_template(), &FormsConfig::default());
        let errors = schema.validate(&values(&[("qty", "abc".into())]));
        assert_eq!(kinds(&errors), vec![("qty", FieldErrorKind::TypeMismatch)]);
    }

    #[test]
    fn test_number_accepts_numbers_and_numeric_text() {
        let schema = build_validation_schema(&qty_template(), &FormsConfig::default());
        assert!(schema.validate(&values(&[("qty", 12.into())])).is_empty());
        assert!(schema.validate(&values(&[("qty", " 4.5 ".into())])).is_empty());
        assert!(!schema.validate(&values(&[("qty", "NaN".into())])).is_empty());
        assert!(!schema.validate(&values(&[("qty", true.into())])).is_empty());
    }

    #[test]
    fn test_select_invalid_option() {
        let template = Template::new(
            "t2",
            "Condition",
            "inventory",
            vec![FieldDescriptor::select("cond", "Condition", ["Good", "Poor"])
                .unwrap()
                .required()],
        )
        .unwrap();
        let schema = build_validation_schema(&template, &FormsConfig::default());
        let errors = schema.validate(&values(&[("cond", "Fair".into())]));
        assert_eq!(kinds(&errors), vec![("cond", FieldErrorKind::InvalidOption)]);
        assert!(schema.validate(&values(&[("cond", "Good".into())])).is_empty());
    }

    #[test]
    fn test_multi_select_checks_each_entry() {
        let field = FieldDescriptor::select("hazards", "Hazards", ["Lead", "Asbestos"])
            .unwrap()
            .multiple();
        let rule = ValidationRule::compile(&field, &FormsConfig::default());
        let ok = FieldValue::List(vec!["Lead".into(), "Asbestos".into()]);
        let bad = FieldValue::List(vec!["Lead".into(), "Radon".into()]);
        assert!(rule.check(Some(&ok)).is_ok());
        assert_eq!(
            rule.check(Some(&bad)).unwrap_err().kind,
            FieldErrorKind::InvalidOption
        );
    }

    #[test]
    fn test_text_whitespace_is_missing() {
        let rule = ValidationRule::compile(
            &FieldDescriptor::text("color", "Color").required(),
            &FormsConfig::default(),
        );
        assert_eq!(
            rule.check(Some(&"   ".into())).unwrap_err().kind,
            FieldErrorKind::Required
        );
        assert!(rule.check(Some(&"White".into())).is_ok());
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        let config = FormsConfig::default();
        let note = ValidationRule::compile(&FieldDescriptor::textarea("note", "Note"), &config);
        let reading = ValidationRule::compile(&FieldDescriptor::number("r", "Reading"), &config);
        let flag = ValidationRule::compile(&FieldDescriptor::checkbox("f", "Flag"), &config);

        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let value = FieldValue::Number(value);
            for rule in [&note, &reading, &flag] {
                assert_eq!(
                    rule.check(Some(&value)).unwrap_err().kind,
                    FieldErrorKind::TypeMismatch
                );
            }
            assert!(!coerce_bool(&value));
        }
        assert!(note.check(Some(&FieldValue::Number(2.5))).is_ok());
    }

    #[test]
    fn test_date_and_time_parsing() {
        let config = FormsConfig::default();
        let date = ValidationRule::compile(&FieldDescriptor::date("d", "Date"), &config);
        assert!(date.check(Some(&"2025-01-20".into())).is_ok());
        assert!(date.check(Some(&"2025-01-20T08:30:00Z".into())).is_ok());
        assert_eq!(
            date.check(Some(&"2025-02-30".into())).unwrap_err().kind,
            FieldErrorKind::TypeMismatch
        );

        let time = ValidationRule::compile(&FieldDescriptor::time("t", "Time"), &config);
        assert!(time.check(Some(&"08:30".into())).is_ok());
        assert!(time.check(Some(&"17:05:59".into())).is_ok());
        assert!(time.check(Some(&"25:00".into())).is_err());
        assert!(time.check(None).is_ok());
    }

    #[test]
    fn test_required_checkbox_must_be_checked() {
        let rule = ValidationRule::compile(
            &FieldDescriptor::checkbox("ack", "Acknowledged").required(),
            &FormsConfig::default(),
        );
        assert_eq!(rule.check(None).unwrap_err().kind, FieldErrorKind::Required);
        assert!(rule.check(Some(&false.into())).is_err());
        assert!(rule.check(Some(&true.into())).is_ok());
        assert!(rule.check(Some(&"yes".into())).is_ok());

        let optional = ValidationRule::compile(
            &FieldDescriptor::checkbox("followUp", "Follow-up"),
            &FormsConfig::default(),
        );
        assert!(optional.check(Some(&"garbage".into())).is_ok());
    }

    #[test]
    fn test_file_size_boundary() {
        let config = FormsConfig::default();
        let rule = ValidationRule::compile(
            &FieldDescriptor::file("photos", "Photos").multiple(),
            &config,
        );
        let exact = FieldValue::Files(vec![FileHandle::new("a.jpg", config.max_file_size)]);
        let over = FieldValue::Files(vec![FileHandle::new("b.jpg", config.max_file_size + 1)]);
        assert!(rule.check(Some(&exact)).is_ok());
        let err = rule.check(Some(&over)).unwrap_err();
        assert_eq!(err.kind, FieldErrorKind::FileTooLarge);
        assert_eq!(err.message, "One or more files exceed the maximum size of 5 MB");
    }

    #[test]
    fn test_file_required_and_accept() {
        let rule = ValidationRule::compile(
            &FieldDescriptor::file("scan", "Lab Scan")
                .required()
                .accept("application/pdf, image/*"),
            &FormsConfig::default(),
        );
        assert_eq!(
            rule.check(Some(&FieldValue::Files(vec![]))).unwrap_err().kind,
            FieldErrorKind::Required
        );
        let pdf = FieldValue::Files(vec![FileHandle::new("lab.pdf", 10)]);
        let png = FieldValue::Files(vec![FileHandle::new("x", 10).with_mime("image/png")]);
        let doc = FieldValue::Files(vec![FileHandle::new("notes.docx", 10)]);
        assert!(rule.check(Some(&pdf)).is_ok());
        assert!(rule.check(Some(&png)).is_ok());
        assert_eq!(
            rule.check(Some(&doc)).unwrap_err().kind,
            FieldErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_single_file_field_rejects_several() {
        let rule =
            ValidationRule::compile(&FieldDescriptor::file("scan", "Scan"), &FormsConfig::default());
        let two = FieldValue::Files(vec![FileHandle::new("a.pdf", 1), FileHandle::new("b.pdf", 1)]);
        assert_eq!(
            rule.check(Some(&two)).unwrap_err().kind,
            FieldErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_accept_filter_extensions() {
        let filter = AcceptFilter::parse(".csv,.PDF").unwrap();
        assert!(filter.accepts(&FileHandle::new("results.pdf", 1)));
        assert!(filter.accepts(&FileHandle::new("data.CSV", 1)));
        assert!(!filter.accepts(&FileHandle::new("photo.jpg", 1)));
        assert!(AcceptFilter::parse(" , ").is_none());
    }

    #[test]
    fn test_valid_values_for_every_required_field_yield_no_errors() {
        let templates = crate::catalog::builtin_templates().unwrap();
        let config = FormsConfig::default();
        for template in &templates {
            let schema = build_validation_schema(template, &config);
            let mut values = HashMap::new();
            for field in template.fields.iter().filter(|f| f.required) {
                let value = match field.kind {
                    FieldKind::Number => FieldValue::Number(1.0),
                    FieldKind::Date => "2025-01-20".into(),
                    FieldKind::Time => "09:00".into(),
                    FieldKind::Select => field.options[0].value.as_str().into(),
                    FieldKind::Checkbox => true.into(),
                    FieldKind::File => FieldValue::Files(vec![FileHandle::new("p.jpg", 1)]),
                    FieldKind::Text | FieldKind::Textarea | FieldKind::Other => "value".into(),
                };
                values.insert(field.id.clone(), value);
            }
            assert!(schema.validate(&values).is_empty(), "template {}", template.id);
        }
    }
}
