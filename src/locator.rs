//! Element locators: a strategy plus a selector string.
//!
//! Every strategy is translated to a CSS selector before it reaches the
//! browser, so the driver only ever issues `querySelectorAll` queries.

use std::fmt;

/// How to find zero or more elements in the current rendering context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Match by `id` attribute.
    Id(String),
    /// Match by `name` attribute.
    Name(String),
    /// Match by tag name.
    Tag(String),
    /// Raw CSS selector.
    Css(String),
}

impl Locator {
    pub fn id(value: impl Into<String>) -> Self {
        Locator::Id(value.into())
    }

    pub fn name(value: impl Into<String>) -> Self {
        Locator::Name(value.into())
    }

    pub fn tag(value: impl Into<String>) -> Self {
        Locator::Tag(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Locator::Css(value.into())
    }

    /// CSS selector equivalent of this locator.
    ///
    /// Id and name use attribute-selector form so values containing CSS
    /// metacharacters (dots, colons) stay valid.
    pub fn to_css(&self) -> String {
        match self {
            Locator::Id(id) => format!("[id=\"{}\"]", id),
            Locator::Name(name) => format!("[name=\"{}\"]", name),
            Locator::Tag(tag) => tag.clone(),
            Locator::Css(css) => css.clone(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "id={}", id),
            Locator::Name(name) => write!(f, "name={}", name),
            Locator::Tag(tag) => write!(f, "tag={}", tag),
            Locator::Css(css) => write!(f, "css={}", css),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_uses_attribute_selector() {
        assert_eq!(Locator::id("target").to_css(), "[id=\"target\"]");
        // Ids with dots would break the #-shorthand form
        assert_eq!(Locator::id("user.name").to_css(), "[id=\"user.name\"]");
    }

    #[test]
    fn name_and_tag_translate() {
        assert_eq!(Locator::name("password").to_css(), "[name=\"password\"]");
        assert_eq!(Locator::tag("iframe").to_css(), "iframe");
    }

    #[test]
    fn css_passes_through() {
        assert_eq!(Locator::css("form input.primary").to_css(), "form input.primary");
    }

    #[test]
    fn display_names_the_strategy() {
        assert_eq!(Locator::id("target").to_string(), "id=target");
        assert_eq!(Locator::css("#x").to_string(), "css=#x");
    }
}
