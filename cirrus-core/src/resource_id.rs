//! Resource ID - Hierarchical resource identifiers
//!
//! Resource Manager identifies every resource by an absolute path made of
//! `marker/value` pairs:
//!
//! ```text
//! /subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers/{namespace}/{marker}/{value}...
//! ```
//!
//! An [`IdFormat`] describes one such shape. Parsing is strict: markers are
//! matched case-sensitively, every value must be present, and nothing may
//! follow the last expected segment. Formatting is the exact inverse of parsing.

use std::fmt;

use crate::error::ParseError;

/// Character that may never appear in a segment value.
///
/// Composite identifier separators contain it, which keeps splitting unambiguous.
pub const RESERVED_CHARACTER: char = '|';

const SUBSCRIPTIONS: Segment = Segment::new("subscriptions", "subscriptionId");
const RESOURCE_GROUPS: Segment = Segment::new("resourceGroups", "resourceGroupName");
const PROVIDERS: Segment = Segment::new("providers", "providerNamespace");

/// A `marker/value` pair expected by an [`IdFormat`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Literal path component preceding the value (e.g., "diskPools")
    pub marker: &'static str,
    /// Name of the value, used in errors and lookups (e.g., "diskPoolName")
    pub field: &'static str,
}

impl Segment {
    pub const fn new(marker: &'static str, field: &'static str) -> Self {
        Self { marker, field }
    }
}

/// Shape of one kind of hierarchical identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdFormat {
    /// Human readable name (e.g., "Disk Pool")
    pub name: &'static str,
    /// Provider namespace following the `providers` marker, if any
    pub provider: Option<&'static str>,
    /// Segments following the provider namespace, in canonical order
    pub segments: &'static [Segment],
}

impl IdFormat {
    pub const fn new(
        name: &'static str,
        provider: &'static str,
        segments: &'static [Segment],
    ) -> Self {
        Self {
            name,
            provider: Some(provider),
            segments,
        }
    }
}

/// Format of a resource group ID
pub const RESOURCE_GROUP: IdFormat = IdFormat {
    name: "Resource Group",
    provider: None,
    segments: &[],
};

/// A parsed or constructed hierarchical identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HierarchicalId {
    format: IdFormat,
    subscription_id: String,
    resource_group_name: String,
    values: Vec<String>,
}

impl HierarchicalId {
    /// Build an ID from known parts, applying the same rules as [`HierarchicalId::parse`]
    pub fn new(
        format: &IdFormat,
        subscription_id: impl Into<String>,
        resource_group_name: impl Into<String>,
        values: Vec<String>,
    ) -> Result<Self, ParseError> {
        let subscription_id = subscription_id.into();
        let resource_group_name = resource_group_name.into();

        validate_value(&SUBSCRIPTIONS, &subscription_id)?;
        validate_value(&RESOURCE_GROUPS, &resource_group_name)?;

        if values.len() > format.segments.len() {
            let extra = values[format.segments.len()..].join("/");
            return Err(ParseError::TrailingSegments(format!("/{}", extra)));
        }
        for (i, segment) in format.segments.iter().enumerate() {
            match values.get(i) {
                Some(value) => validate_value(segment, value)?,
                None => return Err(ParseError::missing(segment.field)),
            }
        }

        Ok(Self {
            format: *format,
            subscription_id,
            resource_group_name,
            values,
        })
    }

    /// Parse an ID of the given format
    pub fn parse(input: &str, format: &IdFormat) -> Result<Self, ParseError> {
        let path = input
            .strip_prefix('/')
            .ok_or_else(|| ParseError::NotAbsolute(input.to_string()))?;
        let mut reader = SegmentReader {
            components: path.split('/'),
        };

        let subscription_id = reader.value_after(&SUBSCRIPTIONS)?;
        let resource_group_name = reader.value_after(&RESOURCE_GROUPS)?;

        if let Some(namespace) = format.provider {
            let actual = reader.value_after(&PROVIDERS)?;
            if actual != namespace {
                return Err(ParseError::UnexpectedValue {
                    segment: PROVIDERS.field.to_string(),
                    expected: namespace.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        let mut values = Vec::with_capacity(format.segments.len());
        for segment in format.segments {
            values.push(reader.value_after(segment)?.to_string());
        }

        let rest: Vec<&str> = reader.components.collect();
        if !rest.is_empty() {
            return Err(ParseError::TrailingSegments(format!("/{}", rest.join("/"))));
        }

        Self::new(format, subscription_id, resource_group_name, values)
    }

    pub fn format(&self) -> &IdFormat {
        &self.format
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group_name(&self) -> &str {
        &self.resource_group_name
    }

    /// Values of the format's segments, in canonical order
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Look up a segment value by its field name
    pub fn value(&self, field: &str) -> Option<&str> {
        self.format
            .segments
            .iter()
            .position(|s| s.field == field)
            .map(|i| self.values[i].as_str())
    }

    /// Name of the addressed resource (the last segment value)
    pub fn name(&self) -> &str {
        self.values
            .last()
            .map(String::as_str)
            .unwrap_or(&self.resource_group_name)
    }

    /// Field name and value pairs, leading fields included
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![
            (SUBSCRIPTIONS.field, self.subscription_id.as_str()),
            (RESOURCE_GROUPS.field, self.resource_group_name.as_str()),
        ];
        fields.extend(
            self.format
                .segments
                .iter()
                .zip(&self.values)
                .map(|(segment, value)| (segment.field, value.as_str())),
        );
        fields
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

impl fmt::Display for HierarchicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{}/{}/{}/{}",
            SUBSCRIPTIONS.marker, self.subscription_id, RESOURCE_GROUPS.marker, self.resource_group_name
        )?;
        if let Some(namespace) = self.format.provider {
            write!(f, "/{}/{}", PROVIDERS.marker, namespace)?;
        }
        for (segment, value) in self.format.segments.iter().zip(&self.values) {
            write!(f, "/{}/{}", segment.marker, value)?;
        }
        Ok(())
    }
}

/// A Rust type bound to one [`IdFormat`]
///
/// Implementors wrap a [`HierarchicalId`] and expose named accessors.
pub trait TypedResourceId: Sized {
    const FORMAT: IdFormat;

    fn from_hierarchical(id: HierarchicalId) -> Self;

    fn as_hierarchical(&self) -> &HierarchicalId;

    fn parse(input: &str) -> Result<Self, ParseError> {
        HierarchicalId::parse(input, &Self::FORMAT).map(Self::from_hierarchical)
    }

    /// Canonical string form of this ID
    fn id(&self) -> String {
        self.as_hierarchical().to_string()
    }
}

struct SegmentReader<'a> {
    components: std::str::Split<'a, char>,
}

impl<'a> SegmentReader<'a> {
    /// Consume `marker/value` and return the value
    fn value_after(&mut self, segment: &Segment) -> Result<&'a str, ParseError> {
        match self.components.next() {
            Some(marker) if marker == segment.marker => {}
            _ => return Err(ParseError::missing(segment.field)),
        }
        match self.components.next() {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ParseError::missing(segment.field)),
        }
    }
}

fn validate_value(segment: &Segment, value: &str) -> Result<(), ParseError> {
    if value.is_empty() {
        return Err(ParseError::missing(segment.field));
    }
    if let Some(character) = value.chars().find(|c| *c == '/' || *c == RESERVED_CHARACTER) {
        return Err(ParseError::InvalidCharacter {
            segment: segment.field.to_string(),
            character,
        });
    }
    Ok(())
}
