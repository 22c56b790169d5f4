//! SQL dialect of the backing database and the placeholder style derived from it.

use std::fmt;
use std::str::FromStr;

/// Dialect reported by database metadata (`database_dialect` option).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// GoogleSQL: named `@param` placeholders.
    #[default]
    GoogleStandardSql,
    /// PostgreSQL-compatible: positional `$n` placeholders.
    PostgreSql,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::GoogleStandardSql => "GOOGLE_STANDARD_SQL",
            Dialect::PostgreSql => "POSTGRESQL",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDialect(pub String);

impl fmt::Display for UnknownDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown database dialect '{}'", self.0)
    }
}

impl std::error::Error for UnknownDialect {}

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GOOGLE_STANDARD_SQL" | "GOOGLESQL" | "STANDARD" => Ok(Dialect::GoogleStandardSql),
            "POSTGRESQL" | "POSTGRES" => Ok(Dialect::PostgreSql),
            // Older databases report an unspecified dialect; they are GoogleSQL.
            "" | "DATABASE_DIALECT_UNSPECIFIED" => Ok(Dialect::GoogleStandardSql),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamStyle {
    /// `@name`
    Named,
    /// `$1, $2, ...`
    Positional,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metadata_values() {
        assert_eq!("POSTGRESQL".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
        assert_eq!("GOOGLE_STANDARD_SQL".parse::<Dialect>().unwrap(), Dialect::GoogleStandardSql);
        assert_eq!("DATABASE_DIALECT_UNSPECIFIED".parse::<Dialect>().unwrap(), Dialect::GoogleStandardSql);
        assert!("MYSQL".parse::<Dialect>().is_err());
    }

    #[test]
    fn display_round_trips_metadata_names() {
        assert_eq!(Dialect::PostgreSql.to_string(), "POSTGRESQL");
        assert_eq!(Dialect::GoogleStandardSql.to_string(), "GOOGLE_STANDARD_SQL");
    }
}
