//! Header name derivation from `SetHeader*` property names.

use crate::errors::FlowError;
use regex::Regex;
use std::sync::LazyLock;

/// Prefix every header-contributing property name starts with.
pub const SET_HEADER_PREFIX: &str = "SetHeader";

/// Lower-cased marker used to discover header-contributing properties.
pub const SET_HEADER_MARKER: &str = "setheader";

// A segment starts at an upper-case letter and runs up to the next one.
#[allow(clippy::unwrap_used)]
static SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new("[A-Z][^A-Z]*").unwrap());

/// Returns true if a property name marks a header contribution.
#[must_use]
pub fn is_set_header_property(name: &str) -> bool {
    name.to_lowercase().contains(SET_HEADER_MARKER)
}

/// Derives the response header a property contributes to.
///
/// `SetHeader<Component><HeaderName>` maps to `<HeaderName>`: the prefix is
/// stripped, then the first capitalized segment (the component) is removed.
///
/// # Errors
///
/// Returns [`FlowError::NotSetHeaderProperty`] if the name does not start with
/// `SetHeader`, and [`FlowError::HeaderPropertyFormat`] if the remainder does
/// not start with an upper-case letter or has no segment after the component.
///
/// # Examples
///
/// ```
/// use evidenceflow::headers::response_header_name;
///
/// assert_eq!(response_header_name("SetHeaderBrowserAccept-CH").unwrap(), "Accept-CH");
/// ```
pub fn response_header_name(property: &str) -> Result<String, FlowError> {
    let Some(rest) = property.strip_prefix(SET_HEADER_PREFIX) else {
        return Err(FlowError::NotSetHeaderProperty {
            property: property.to_string(),
        });
    };

    let format_error = || FlowError::HeaderPropertyFormat {
        property: property.to_string(),
    };

    if !rest.starts_with(|c: char| c.is_ascii_uppercase()) {
        return Err(format_error());
    }

    let mut segments = SEGMENT.find_iter(rest).map(|m| m.as_str());
    let component = segments.next().ok_or_else(format_error)?;
    if segments.next().is_none() {
        return Err(format_error());
    }

    Ok(rest.replacen(component, "", 1))
}
