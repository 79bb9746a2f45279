//! Form Fields
//!
//! Recursive field model for remediation forms. A field holds either a
//! scalar value, a nested group of fields, or a choice between option
//! fields. Serialization and validation walk the same tree.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::ValidationError;
use crate::model::{Authenticator, Message};

/// The value carried by a field.
#[derive(Clone, Debug)]
pub enum FieldValue {
    /// Plain value; `None` until set.
    Scalar(Option<Value>),
    /// Nested group of fields, e.g. a credentials bundle.
    Group(Form),
    /// Selectable options; at most one is selected.
    Choice {
        options: Vec<Field>,
        selected: Option<usize>,
    },
}

/// A single form field.
#[derive(Clone)]
pub struct Field {
    /// Wire name. Unnamed fields are groups merged into their parent.
    pub name: Option<String>,
    /// Display label.
    pub label: Option<String>,
    /// Wire type (`string`, `boolean`, `object`, ...).
    pub kind: Option<String>,
    pub required: bool,
    pub visible: bool,
    pub mutable: bool,
    pub secret: bool,
    /// Messages attached to this field.
    pub messages: Vec<Message>,
    /// Authenticator this field (or option) relates to.
    pub authenticator: Option<Arc<Authenticator>>,
    value: FieldValue,
}

impl Field {
    /// Create a visible, mutable, optional field.
    pub fn new(name: Option<String>, value: FieldValue) -> Self {
        Self {
            name,
            label: None,
            kind: None,
            required: false,
            visible: true,
            mutable: true,
            secret: false,
            messages: Vec::new(),
            authenticator: None,
            value,
        }
    }

    /// Named scalar field.
    pub fn scalar(name: impl Into<String>, value: Option<Value>) -> Self {
        Self::new(Some(name.into()), FieldValue::Scalar(value))
    }

    /// Named group field.
    pub fn group(name: impl Into<String>, form: Form) -> Self {
        Self::new(Some(name.into()), FieldValue::Group(form))
    }

    /// Named choice field with nothing selected.
    pub fn choice(name: impl Into<String>, options: Vec<Field>) -> Self {
        Self::new(
            Some(name.into()),
            FieldValue::Choice {
                options,
                selected: None,
            },
        )
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_mutable(mut self, mutable: bool) -> Self {
        self.mutable = mutable;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_secret(mut self, secret: bool) -> Self {
        self.secret = secret;
        self
    }

    pub fn with_authenticator(mut self, authenticator: Option<Arc<Authenticator>>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Name, falling back to the label.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.label.as_deref())
            .unwrap_or_default()
    }

    pub fn field_value(&self) -> &FieldValue {
        &self.value
    }

    /// Scalar value, if this is a scalar field.
    pub fn value(&self) -> Option<&Value> {
        match &self.value {
            FieldValue::Scalar(value) => value.as_ref(),
            _ => None,
        }
    }

    /// Whether the field will contribute something when submitted.
    pub fn has_value(&self) -> bool {
        match &self.value {
            FieldValue::Scalar(value) => value.is_some(),
            FieldValue::Group(_) => true,
            FieldValue::Choice { selected, .. } => selected.is_some(),
        }
    }

    /// Set a scalar value, or select the option whose value matches.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<(), ValidationError> {
        if !self.mutable {
            return Err(ValidationError::ImmutableParameter {
                name: self.display_name().to_string(),
            });
        }

        let name = self.display_name().to_string();
        let value = value.into();
        match &mut self.value {
            FieldValue::Scalar(current) => {
                *current = Some(value);
                Ok(())
            }
            FieldValue::Choice { options, selected } => {
                let index = options
                    .iter()
                    .position(|option| option.value() == Some(&value))
                    .ok_or(ValidationError::InvalidOption { name })?;
                *selected = Some(index);
                Ok(())
            }
            FieldValue::Group(_) => Err(ValidationError::InvalidParameter { name }),
        }
    }

    /// Clear a scalar value or deselect the current option.
    pub fn clear_value(&mut self) -> Result<(), ValidationError> {
        if !self.mutable {
            return Err(ValidationError::ImmutableParameter {
                name: self.display_name().to_string(),
            });
        }

        match &mut self.value {
            FieldValue::Scalar(current) => *current = None,
            FieldValue::Choice { selected, .. } => *selected = None,
            FieldValue::Group(_) => {}
        }
        Ok(())
    }

    /// Nested group, if this is a group field.
    pub fn form(&self) -> Option<&Form> {
        match &self.value {
            FieldValue::Group(form) => Some(form),
            _ => None,
        }
    }

    pub fn form_mut(&mut self) -> Option<&mut Form> {
        match &mut self.value {
            FieldValue::Group(form) => Some(form),
            _ => None,
        }
    }

    pub fn options(&self) -> &[Field] {
        match &self.value {
            FieldValue::Choice { options, .. } => options,
            _ => &[],
        }
    }

    pub fn options_mut(&mut self) -> &mut [Field] {
        match &mut self.value {
            FieldValue::Choice { options, .. } => options,
            _ => &mut [],
        }
    }

    pub fn selected_index(&self) -> Option<usize> {
        match &self.value {
            FieldValue::Choice { selected, .. } => *selected,
            _ => None,
        }
    }

    pub fn selected_option(&self) -> Option<&Field> {
        self.selected_index().and_then(|i| self.options().get(i))
    }

    pub fn selected_option_mut(&mut self) -> Option<&mut Field> {
        let index = self.selected_index()?;
        self.options_mut().get_mut(index)
    }

    /// Select the option at `index`.
    pub fn select_option(&mut self, index: usize) -> Result<(), ValidationError> {
        if !self.mutable {
            return Err(ValidationError::ImmutableParameter {
                name: self.display_name().to_string(),
            });
        }

        let name = self.display_name().to_string();
        match &mut self.value {
            FieldValue::Choice { options, selected } if index < options.len() => {
                *selected = Some(index);
                Ok(())
            }
            _ => Err(ValidationError::InvalidOption { name }),
        }
    }

    /// Select the option with the given label.
    pub fn select_option_by_label(&mut self, label: &str) -> Result<(), ValidationError> {
        let index = self
            .options()
            .iter()
            .position(|option| option.label.as_deref() == Some(label));
        self.select_by_position(index)
    }

    /// Select the option relating to the authenticator with the given id.
    pub fn select_authenticator(&mut self, authenticator_id: &str) -> Result<(), ValidationError> {
        let index = self.options().iter().position(|option| {
            option
                .authenticator
                .as_ref()
                .and_then(|a| a.id.as_deref())
                == Some(authenticator_id)
        });
        self.select_by_position(index)
    }

    fn select_by_position(&mut self, index: Option<usize>) -> Result<(), ValidationError> {
        match index {
            Some(index) => self.select_option(index),
            None => Err(ValidationError::InvalidOption {
                name: self.display_name().to_string(),
            }),
        }
    }

    /// Form that dotted paths descend into: the group itself, or the
    /// selected option's group.
    fn child_form(&self) -> Option<&Form> {
        match &self.value {
            FieldValue::Group(form) => Some(form),
            FieldValue::Choice { .. } => self.selected_option().and_then(|o| o.form()),
            FieldValue::Scalar(_) => None,
        }
    }

    fn child_form_mut(&mut self) -> Option<&mut Form> {
        if matches!(self.value, FieldValue::Choice { .. }) {
            return self.selected_option_mut().and_then(|o| o.form_mut());
        }
        self.form_mut()
    }

    fn serialized_value(&self) -> Result<Option<Value>, ValidationError> {
        let missing = || ValidationError::MissingRequiredParameter {
            name: self.display_name().to_string(),
        };

        match &self.value {
            FieldValue::Scalar(Some(value)) => Ok(Some(value.clone())),
            FieldValue::Scalar(None) if self.required => Err(missing()),
            FieldValue::Scalar(None) => Ok(None),
            FieldValue::Group(form) => Ok(Some(Value::Object(form.to_json()?))),
            FieldValue::Choice { .. } => match self.selected_option() {
                Some(option) => match option.serialized_value()? {
                    None if self.required => Err(missing()),
                    value => Ok(value),
                },
                None if self.required => Err(missing()),
                None => Ok(None),
            },
        }
    }

    fn write_into(&self, map: &mut Map<String, Value>) -> Result<(), ValidationError> {
        let Some(value) = self.serialized_value()? else {
            return Ok(());
        };

        match (&self.name, value) {
            (Some(name), value) => {
                map.insert(name.clone(), value);
            }
            // Unnamed groups merge into the parent; later keys overwrite earlier ones.
            (None, Value::Object(object)) => map.extend(object),
            (None, _) => {
                return Err(ValidationError::InvalidParameter {
                    name: self.display_name().to_string(),
                })
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("Field");
        debug
            .field("name", &self.name)
            .field("label", &self.label)
            .field("required", &self.required)
            .field("mutable", &self.mutable);
        if self.secret {
            debug.field("value", &"[REDACTED]");
        } else {
            debug.field("value", &self.value);
        }
        debug
            .field(
                "authenticator",
                &self.authenticator.as_ref().and_then(|a| a.id.as_deref()),
            )
            .finish()
    }
}

/// Ordered sequence of fields.
#[derive(Clone, Debug, Default)]
pub struct Form {
    fields: Vec<Field>,
}

impl Form {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields meant to be shown to the user.
    pub fn visible_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.visible)
    }

    /// Look up a field by name or dotted path (`credentials.passcode`).
    ///
    /// Children of unnamed groups are addressed as if they belonged to this
    /// form. Paths descend into groups and into the selected option of a
    /// choice field.
    pub fn get(&self, path: &str) -> Option<&Field> {
        let (head, rest) = split_path(path);
        let indices = self.position(head)?;
        let field = self.field_at(&indices)?;
        match rest {
            None => Some(field),
            Some(rest) => field.child_form()?.get(rest),
        }
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Field> {
        let (head, rest) = split_path(path);
        let indices = self.position(head)?;
        let field = self.field_at_mut(&indices)?;
        match rest {
            None => Some(field),
            Some(rest) => field.child_form_mut()?.get_mut(rest),
        }
    }

    /// Set the value of the field at `path`.
    pub fn set_value(&mut self, path: &str, value: impl Into<Value>) -> Result<(), ValidationError> {
        self.get_mut(path)
            .ok_or_else(|| ValidationError::InvalidParameter {
                name: path.to_string(),
            })?
            .set_value(value)
    }

    /// Select an option of the choice field at `path`.
    pub fn select_option(&mut self, path: &str, index: usize) -> Result<(), ValidationError> {
        self.get_mut(path)
            .ok_or_else(|| ValidationError::InvalidParameter {
                name: path.to_string(),
            })?
            .select_option(index)
    }

    /// All field messages, depth first.
    pub fn messages(&self) -> Vec<&Message> {
        let mut messages = Vec::new();
        for field in &self.fields {
            messages.extend(field.messages.iter());
            if let Some(form) = field.child_form() {
                messages.extend(form.messages());
            }
        }
        messages
    }

    /// Check required values without building a body.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.to_json().map(|_| ())
    }

    /// Serialize field values keyed by field name.
    pub fn to_json(&self) -> Result<Map<String, Value>, ValidationError> {
        let mut map = Map::new();
        for field in &self.fields {
            field.write_into(&mut map)?;
        }
        Ok(map)
    }

    fn position(&self, name: &str) -> Option<Vec<usize>> {
        for (index, field) in self.fields.iter().enumerate() {
            if field.name.as_deref() == Some(name) {
                return Some(vec![index]);
            }
            if field.name.is_none() {
                if let Some(mut inner) = field.form().and_then(|form| form.position(name)) {
                    inner.insert(0, index);
                    return Some(inner);
                }
            }
        }
        None
    }

    fn field_at(&self, indices: &[usize]) -> Option<&Field> {
        let (first, rest) = indices.split_first()?;
        let field = self.fields.get(*first)?;
        if rest.is_empty() {
            return Some(field);
        }
        field.form()?.field_at(rest)
    }

    fn field_at_mut(&mut self, indices: &[usize]) -> Option<&mut Field> {
        let (first, rest) = indices.split_first()?;
        let field = self.fields.get_mut(*first)?;
        if rest.is_empty() {
            return Some(field);
        }
        field.form_mut()?.field_at_mut(rest)
    }
}

impl<'a> IntoIterator for &'a Form {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}
