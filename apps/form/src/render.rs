//! Dynamic field renderer.
//!
//! Maps each [`FieldDescriptor`] to the functional contract of an input
//! control and lays the controls out two per row. [`FormBinding`] owns the
//! values and error map those controls are bound to.

use chrono::NaiveDate;
use thiserror::Error;

use crate::messages;
use crate::rules::{CompiledSchema, FieldErrors};
use crate::schema::{FieldDescriptor, FieldKind, FormSchema, SchemaError};
use crate::values::{FieldValue, FormValues};

pub const TEXTAREA_ROWS: u8 = 4;
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Single-line input; `input_type` is the keyboard/validation hint.
    Input { input_type: &'static str },
    /// Date picker whose value is an ISO `YYYY-MM-DD` string.
    Date,
    TextArea { rows: u8 },
    /// Toggle with its label rendered inline.
    Checkbox { checked: bool },
    /// Closed list; the first option is always the empty placeholder.
    Select { options: Vec<SelectOption> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    Half,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedField {
    pub name: String,
    pub id: String,
    pub label: String,
    /// Whether the label sits on its own row above the control.
    pub label_row: bool,
    pub required_marker: Option<&'static str>,
    pub placeholder: Option<String>,
    pub control: Control,
    pub value: String,
    pub error: Option<String>,
    pub aria_invalid: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedForm {
    pub rows: Vec<Vec<RenderedField>>,
}

impl RenderedForm {
    pub fn fields(&self) -> impl Iterator<Item = &RenderedField> {
        self.rows.iter().flatten()
    }

    pub fn field(&self, name: &str) -> Option<&RenderedField> {
        self.fields().find(|f| f.name == name)
    }
}

fn control_for(field: &FieldDescriptor, value: Option<&FieldValue>) -> Control {
    match &field.kind {
        FieldKind::Text => Control::Input { input_type: "text" },
        FieldKind::Email => Control::Input { input_type: "email" },
        FieldKind::Phone => Control::Input { input_type: "tel" },
        FieldKind::Date => Control::Date,
        FieldKind::MultilineText => Control::TextArea {
            rows: TEXTAREA_ROWS,
        },
        FieldKind::Checkbox => Control::Checkbox {
            checked: matches!(value, Some(FieldValue::Bool(true))),
        },
        FieldKind::SingleSelect => {
            let current = value.map(|v| v.as_text().into_owned()).unwrap_or_default();
            let placeholder = SelectOption {
                value: String::new(),
                label: messages::SELECT_PLACEHOLDER.to_string(),
                selected: current.is_empty(),
            };
            let options = std::iter::once(placeholder)
                .chain(field.options().iter().map(|o| SelectOption {
                    value: o.clone(),
                    label: o.clone(),
                    selected: *o == current,
                }))
                .collect();
            Control::Select { options }
        }
        FieldKind::Unknown(kind) => {
            tracing::debug!(field = %field.name, kind = %kind, "unknown field kind, rendering as text");
            Control::Input { input_type: "text" }
        }
    }
}

pub fn render_field(
    field: &FieldDescriptor,
    value: Option<&FieldValue>,
    error: Option<&str>,
) -> RenderedField {
    let checkbox = field.kind.is_checkbox();
    let display = match value {
        Some(FieldValue::Text(s)) => s.clone(),
        _ => String::new(),
    };

    RenderedField {
        name: field.name.clone(),
        id: field.name.clone(),
        label: field.label.clone(),
        label_row: !checkbox,
        required_marker: (field.required && !checkbox).then_some(messages::REQUIRED_MARKER),
        placeholder: field.placeholder.clone(),
        control: control_for(field, value),
        value: display,
        error: error.map(str::to_string),
        aria_invalid: error.is_some(),
        span: if checkbox { Span::Full } else { Span::Half },
    }
}

/// Renders the whole schema in order. Half-width fields pair up; a full-width
/// field always starts a new row, leaving any unpaired field alone on its row.
pub fn render_form(schema: &FormSchema, values: &FormValues, errors: &FieldErrors) -> RenderedForm {
    let mut rows = Vec::new();
    let mut pending: Option<RenderedField> = None;

    for field in &schema.fields {
        let rendered = render_field(
            field,
            values.get(&field.name),
            errors.get(&field.name).map(String::as_str),
        );
        match rendered.span {
            Span::Full => {
                if let Some(half) = pending.take() {
                    rows.push(vec![half]);
                }
                rows.push(vec![rendered]);
            }
            Span::Half => match pending.take() {
                Some(half) => rows.push(vec![half, rendered]),
                None => pending = Some(rendered),
            },
        }
    }
    if let Some(half) = pending {
        rows.push(vec![half]);
    }

    RenderedForm { rows }
}

/// A value emitted by a control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldInput {
    Text(String),
    Checked(bool),
    Date(NaiveDate),
    Cleared,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("no field named '{0}' in the current schema")]
    UnknownField(String),

    #[error("field '{field}' of kind '{kind}' cannot take {input}")]
    KindMismatch {
        field: String,
        kind: String,
        input: &'static str,
    },
}

/// Coerces a control's output to the stored value for `field`'s kind.
/// `Ok(None)` means "no value" and removes the entry.
fn coerce(field: &FieldDescriptor, input: FieldInput) -> Result<Option<FieldValue>, BindingError> {
    let mismatch = |input: &'static str| BindingError::KindMismatch {
        field: field.name.clone(),
        kind: field.kind.as_str().to_string(),
        input,
    };

    match (&field.kind, input) {
        (_, FieldInput::Cleared) => Ok(None),
        (FieldKind::Checkbox, FieldInput::Checked(b)) => Ok(Some(FieldValue::Bool(b))),
        (FieldKind::Checkbox, _) => Err(mismatch("a text value")),
        (_, FieldInput::Checked(_)) => Err(mismatch("a boolean")),
        (FieldKind::Date, FieldInput::Date(d)) => {
            Ok(Some(FieldValue::Text(d.format(DATE_FORMAT).to_string())))
        }
        (_, FieldInput::Date(_)) => Err(mismatch("a date")),
        (FieldKind::Date, FieldInput::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map(|d| Some(FieldValue::Text(d.format(DATE_FORMAT).to_string())))
                .map_err(|_| mismatch("a non-ISO date"))
        }
        (FieldKind::SingleSelect, FieldInput::Text(s)) if s.is_empty() => Ok(None),
        (_, FieldInput::Text(s)) => Ok(Some(FieldValue::Text(s))),
    }
}

/// Form state bound to one schema: values, compiled checks, and the error map.
/// Built fresh for every schema fetch; nothing carries over between schemas.
#[derive(Debug, Clone)]
pub struct FormBinding {
    schema: FormSchema,
    compiled: CompiledSchema,
    values: FormValues,
    errors: FieldErrors,
}

impl FormBinding {
    pub fn new(schema: FormSchema) -> Result<Self, SchemaError> {
        let compiled = CompiledSchema::compile(&schema)?;
        Ok(Self {
            schema,
            compiled,
            values: FormValues::new(),
            errors: FieldErrors::new(),
        })
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Stores a control's new value and re-runs that field's checks.
    pub fn change(&mut self, name: &str, input: FieldInput) -> Result<(), BindingError> {
        let field = self
            .schema
            .field(name)
            .ok_or_else(|| BindingError::UnknownField(name.to_string()))?;
        match coerce(field, input)? {
            Some(value) => self.values.set(name, value),
            None => {
                self.values.remove(name);
            }
        }
        self.revalidate(name);
        Ok(())
    }

    pub fn blur(&mut self, name: &str) -> Result<(), BindingError> {
        if self.schema.field(name).is_none() {
            return Err(BindingError::UnknownField(name.to_string()));
        }
        self.revalidate(name);
        Ok(())
    }

    fn revalidate(&mut self, name: &str) {
        let error = self
            .compiled
            .field(name)
            .and_then(|f| f.first_error(self.values.get(name)));
        match error {
            Some(message) => {
                self.errors.insert(name.to_string(), message);
            }
            None => {
                self.errors.remove(name);
            }
        }
    }

    /// Re-runs every field's checks. Returns true when the form is valid.
    pub fn validate_all(&mut self) -> bool {
        self.errors = self.compiled.validate(&self.values);
        self.errors.is_empty()
    }

    /// Attaches an externally produced message (e.g. from the server) to a
    /// field. Returns false when the schema has no such field.
    pub fn set_error(&mut self, name: &str, message: impl Into<String>) -> bool {
        if self.schema.field(name).is_none() {
            return false;
        }
        self.errors.insert(name.to_string(), message.into());
        true
    }

    pub fn reset(&mut self) {
        self.values.clear();
        self.errors.clear();
    }

    pub fn render(&self) -> RenderedForm {
        render_form(&self.schema, &self.values, &self.errors)
    }
}
