//! Composite ID - Two hierarchical identifiers joined by a private separator
//!
//! Some relationships (a disk attached to a pool, a LUN inside a target) are
//! stored by the provider as a list field on the primary resource rather than
//! as resources of their own. They are addressed by joining the primary ID and
//! the secondary ID with a separator such as `/managedDisks|`:
//!
//! ```text
//! {primary ID}/managedDisks|{secondary ID}
//! ```
//!
//! Every separator contains [`RESERVED_CHARACTER`], which no formatted
//! [`HierarchicalId`] can contain, so splitting on the first occurrence is exact.

use std::fmt;

use crate::error::{Half, ParseError};
use crate::resource_id::{HierarchicalId, IdFormat, RESERVED_CHARACTER, TypedResourceId};

/// Token joining the two halves of a [`CompositeId`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Separator(&'static str);

impl Separator {
    /// Panics (at compile time when used in a `const`) unless `token` contains
    /// [`RESERVED_CHARACTER`].
    pub const fn new(token: &'static str) -> Self {
        let bytes = token.as_bytes();
        let mut found = false;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == RESERVED_CHARACTER as u8 {
                found = true;
            }
            i += 1;
        }
        assert!(found, "composite separator must contain '|'");
        Self(token)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// An ordered pair of hierarchical IDs addressing a relationship
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeId {
    primary: HierarchicalId,
    secondary: HierarchicalId,
    separator: Separator,
}

impl CompositeId {
    pub fn compose(primary: HierarchicalId, secondary: HierarchicalId, separator: Separator) -> Self {
        Self {
            primary,
            secondary,
            separator,
        }
    }

    pub fn parse(
        input: &str,
        separator: Separator,
        primary_format: &IdFormat,
        secondary_format: &IdFormat,
    ) -> Result<Self, ParseError> {
        let (primary, secondary) = split(input, separator)?;

        let primary = HierarchicalId::parse(primary, primary_format)
            .map_err(|e| ParseError::in_half(Half::Primary, e))?;
        let secondary = HierarchicalId::parse(secondary, secondary_format)
            .map_err(|e| ParseError::in_half(Half::Secondary, e))?;

        Ok(Self::compose(primary, secondary, separator))
    }

    pub fn primary(&self) -> &HierarchicalId {
        &self.primary
    }

    pub fn secondary(&self) -> &HierarchicalId {
        &self.secondary
    }

    pub fn separator(&self) -> Separator {
        self.separator
    }

    pub fn into_parts(self) -> (HierarchicalId, HierarchicalId) {
        (self.primary, self.secondary)
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.primary, self.separator, self.secondary)
    }
}

/// Split a composite ID string into its two halves without parsing them
pub fn split(input: &str, separator: Separator) -> Result<(&str, &str), ParseError> {
    let (primary, secondary) =
        input
            .split_once(separator.as_str())
            .ok_or_else(|| ParseError::SeparatorNotFound {
                input: input.to_string(),
                separator: separator.to_string(),
            })?;

    if primary.is_empty() || secondary.is_empty() || secondary.contains(separator.as_str()) {
        return Err(ParseError::MalformedComposite(input.to_string()));
    }
    Ok((primary, secondary))
}

/// A Rust type bound to a separator and two typed IDs
pub trait TypedCompositeId: Sized {
    type Primary: TypedResourceId;
    type Secondary: TypedResourceId;

    const SEPARATOR: Separator;

    fn from_parts(primary: Self::Primary, secondary: Self::Secondary) -> Self;

    fn primary(&self) -> &Self::Primary;

    fn secondary(&self) -> &Self::Secondary;

    fn parse(input: &str) -> Result<Self, ParseError> {
        let composite = CompositeId::parse(
            input,
            Self::SEPARATOR,
            &Self::Primary::FORMAT,
            &Self::Secondary::FORMAT,
        )?;
        let (primary, secondary) = composite.into_parts();
        Ok(Self::from_parts(
            Self::Primary::from_hierarchical(primary),
            Self::Secondary::from_hierarchical(secondary),
        ))
    }

    fn to_composite(&self) -> CompositeId {
        CompositeId::compose(
            self.primary().as_hierarchical().clone(),
            self.secondary().as_hierarchical().clone(),
            Self::SEPARATOR,
        )
    }

    /// Canonical string form of this ID
    fn id(&self) -> String {
        self.to_composite().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_id::Segment;

    const POOL: IdFormat = IdFormat::new(
        "Disk Pool",
        "Ns",
        &[Segment::new("pools", "poolName")],
    );
    const DISK: IdFormat = IdFormat::new("Disk", "Ns", &[Segment::new("disks", "diskName")]);
    const MANAGED_DISKS: Separator = Separator::new("/managedDisks|");

    const PRIMARY: &str = "/subscriptions/s1/resourceGroups/rg1/providers/Ns/pools/p1";
    const SECONDARY: &str = "/subscriptions/s1/resourceGroups/rg1/providers/Ns/disks/d1";

    #[test]
    fn test_compose_and_parse() {
        let primary = HierarchicalId::parse(PRIMARY, &POOL).unwrap();
        let secondary = HierarchicalId::parse(SECONDARY, &DISK).unwrap();
        let composite = CompositeId::compose(primary.clone(), secondary.clone(), MANAGED_DISKS);

        let formatted = composite.to_string();
        assert_eq!(
            formatted,
            "/subscriptions/s1/resourceGroups/rg1/providers/Ns/pools/p1/managedDisks|/subscriptions/s1/resourceGroups/rg1/providers/Ns/disks/d1"
        );
        assert_eq!(formatted.matches(MANAGED_DISKS.as_str()).count(), 1);

        let parsed = CompositeId::parse(&formatted, MANAGED_DISKS, &POOL, &DISK).unwrap();
        assert_eq!(parsed, composite);
        assert_eq!(parsed.primary(), &primary);
        assert_eq!(parsed.secondary(), &secondary);
    }

    #[test]
    fn test_separator_not_found() {
        let input = format!("{}/managedDisks/{}", PRIMARY, SECONDARY);
        assert!(matches!(
            CompositeId::parse(&input, MANAGED_DISKS, &POOL, &DISK),
            Err(ParseError::SeparatorNotFound { .. })
        ));
    }

    #[test]
    fn test_malformed_composite() {
        for input in [
            format!("/managedDisks|{}", SECONDARY),
            format!("{}/managedDisks|", PRIMARY),
            format!("{}/managedDisks|{}/managedDisks|{}", PRIMARY, SECONDARY, SECONDARY),
        ] {
            assert_eq!(
                CompositeId::parse(&input, MANAGED_DISKS, &POOL, &DISK),
                Err(ParseError::MalformedComposite(input.clone()))
            );
        }
    }

    #[test]
    fn test_half_errors_are_tagged() {
        let input = format!("{}/managedDisks|{}", PRIMARY, PRIMARY);
        match CompositeId::parse(&input, MANAGED_DISKS, &POOL, &DISK) {
            Err(ParseError::InHalf { half, source }) => {
                assert_eq!(half, Half::Secondary);
                assert_eq!(*source, ParseError::MissingSegment("diskName".to_string()));
            }
            other => panic!("Expected InHalf error, got {:?}", other),
        }

        let input = format!("{}/extra/managedDisks|{}", PRIMARY, SECONDARY);
        match CompositeId::parse(&input, MANAGED_DISKS, &POOL, &DISK) {
            Err(ParseError::InHalf { half, .. }) => assert_eq!(half, Half::Primary),
            other => panic!("Expected InHalf error, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "composite separator must contain '|'")]
    fn test_separator_requires_reserved_character() {
        let _ = Separator::new("/managedDisks/");
    }
}
