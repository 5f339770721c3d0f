//! Local chat rich-text markup helpers.
//!
//! The host chat renders a small HTML-like tag vocabulary. Only the pieces
//! needed for nametag styling live here.

/// Wrap text in bold tags.
pub fn bold(text: &str) -> String {
    format!("<b>{text}</b>")
}

/// Wrap text in a color tag with an RRGGBBAA hex value.
pub fn color(hex: &str, text: &str) -> String {
    format!("<color=#{hex}>{text}</color>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold() {
        assert_eq!(bold("Alice"), "<b>Alice</b>");
    }

    #[test]
    fn test_color() {
        assert_eq!(color("7289DAFF", "Alice"), "<color=#7289DAFF>Alice</color>");
    }

    #[test]
    fn test_nested_composition() {
        let styled = bold(&color("7289DAFF", "Alice"));
        assert_eq!(styled, "<b><color=#7289DAFF>Alice</color></b>");
    }
}
