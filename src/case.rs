//! Identifier case conversion: PascalCase column names -> camelCase request fields and SQL parameter names.

/// Lower the first character of a column name.
/// e.g. "FirstName" -> "firstName", "PlayerUuid" -> "playerUuid"
pub fn to_camel_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowers_leading_character_only() {
        assert_eq!(to_camel_case("FirstName"), "firstName");
        assert_eq!(to_camel_case("PlayerUuid"), "playerUuid");
        assert_eq!(to_camel_case("birthDate"), "birthDate");
        assert_eq!(to_camel_case(""), "");
    }
}
