// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! RFC822-style control file primitives.

See <https://www.debian.org/doc/debian-policy/ch-controlfields.html> for the
canonical description of the format. Only the subset needed to read the
`control` member of binary packages is implemented: paragraphs of fields
with case-insensitive names and folded continuation lines.
*/

use {
    crate::error::{ReliquaryError, Result},
    std::io::BufRead,
};

/// A single field in a control paragraph.
///
/// The value retains its original formatting: continuation lines are stored
/// with their embedded newline and leading space.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControlField {
    name: String,
    value: String,
}

impl ControlField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The name of this field, as originally cased.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw string value, including any folded lines.
    pub fn value_str(&self) -> &str {
        &self.value
    }
}

/// A paragraph in a control file.
///
/// A paragraph is an ordered series of fields. Field names are case
/// insensitive on read and case preserving on set. A paragraph holds at most
/// one occurrence of a given field.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ControlParagraph {
    fields: Vec<ControlField>,
}

impl ControlParagraph {
    /// Whether the paragraph has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Set the value of a field, replacing any same-named field.
    pub fn set_field(&mut self, field: ControlField) {
        self.fields
            .retain(|f| !f.name.eq_ignore_ascii_case(&field.name));
        self.fields.push(field);
    }

    /// Set the value of a field from name and value strings.
    pub fn set_field_from_string(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set_field(ControlField::new(name, value));
    }

    /// Whether a named field is present.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Obtain the field with the given name, compared case-insensitively.
    pub fn field(&self, name: &str) -> Option<&ControlField> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Obtain the raw string value of the named field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value_str())
    }

    /// Obtain the value of the named field or a required-field error.
    pub fn required_field_str(&self, name: &'static str) -> Result<&str> {
        self.field_str(name)
            .ok_or(ReliquaryError::ControlRequiredFieldMissing(name))
    }

    /// Iterate over fields in insertion order.
    pub fn iter_fields(&self) -> impl Iterator<Item = &ControlField> {
        self.fields.iter()
    }

}

impl std::fmt::Display for ControlParagraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for field in &self.fields {
            writeln!(f, "{}: {}", field.name, field.value)?;
        }

        Ok(())
    }
}

/// Holds parsing state for control files.
///
/// Instances are fed lines of text and emit [ControlParagraph] instances as
/// they are completed.
#[derive(Clone, Debug, Default)]
pub struct ControlFileParser {
    paragraph: ControlParagraph,
    field: Option<String>,
}

impl ControlFileParser {
    /// Write a line to the parser.
    ///
    /// If the line terminates an in-progress paragraph, that paragraph is
    /// returned. `Err` is returned if the control file is invalid.
    pub fn write_line(&mut self, line: &str) -> Result<Option<ControlParagraph>> {
        let is_empty_line = line.trim().is_empty();
        let is_indented = line.starts_with(' ') && line.len() > 1;

        let current_field = self.field.take();

        // Empty lines terminate the paragraph. Flush any pending state.
        if is_empty_line {
            if let Some(field) = current_field {
                self.flush_field(field)?;
            }

            return Ok(if self.paragraph.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.paragraph))
            });
        }

        match (current_field, is_indented) {
            // An unindented line begins a new field; flush the previous one.
            (Some(field), false) => {
                self.flush_field(field)?;
                self.field = Some(line.to_string());
                Ok(None)
            }

            // First field of a paragraph.
            (None, _) => {
                self.field = Some(line.to_string());
                Ok(None)
            }

            // An indented line continues the pending field.
            (Some(field), true) => {
                self.field = Some(field + line);
                Ok(None)
            }
        }
    }

    /// Finish parsing, consuming self.
    pub fn finish(mut self) -> Result<Option<ControlParagraph>> {
        if let Some(field) = self.field.take() {
            self.flush_field(field)?;
        }

        Ok(if self.paragraph.is_empty() {
            None
        } else {
            Some(self.paragraph)
        })
    }

    fn flush_field(&mut self, raw: String) -> Result<()> {
        let mut parts = raw.splitn(2, ':');

        let name = parts.next().ok_or_else(|| {
            ReliquaryError::ControlParseError(format!("error parsing line '{}'; missing colon", raw))
        })?;
        let value = parts
            .next()
            .ok_or_else(|| {
                ReliquaryError::ControlParseError(format!(
                    "error parsing field '{}'; could not detect value",
                    raw
                ))
            })?
            .trim();

        self.paragraph.set_field_from_string(name, value);

        Ok(())
    }
}

/// A streaming reader of [ControlParagraph] bound to a [BufRead].
///
/// Instances can be consumed as an iterator; each step reads one full
/// paragraph from the underlying reader.
pub struct ControlParagraphReader<R: BufRead> {
    reader: R,
    parser: Option<ControlFileParser>,
}

impl<R: BufRead> ControlParagraphReader<R> {
    /// Create a new instance bound to a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parser: Some(ControlFileParser::default()),
        }
    }

    fn get_next(&mut self) -> Result<Option<ControlParagraph>> {
        let mut parser = self.parser.take().expect("parser should be present");

        loop {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line)?;

            if bytes_read != 0 {
                if let Some(paragraph) = parser.write_line(&line)? {
                    self.parser.replace(parser);
                    return Ok(Some(paragraph));
                }
            } else {
                return parser.finish();
            }
        }
    }
}

impl<R: BufRead> Iterator for ControlParagraphReader<R> {
    type Item = Result<ControlParagraph>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.parser.is_none() {
            None
        } else {
            match self.get_next() {
                Ok(Some(paragraph)) => Some(Ok(paragraph)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        }
    }
}
