use std::fmt::{Display, Formatter};

/// One resolution request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TableLocationQuery {
    pub database_name: String,
    pub table_name: String,
}

impl TableLocationQuery {
    pub fn new(database_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            table_name: table_name.into(),
        }
    }
}

impl Display for TableLocationQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database_name, self.table_name)
    }
}

/// Outcome of a successful lookup.
///
/// `Found("")` is a table registered without a storage location, which is not
/// the same thing as a table that does not exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableLocation {
    Found(String),
    NotFound,
}

impl TableLocation {
    pub fn into_option(self) -> Option<String> {
        match self {
            Self::Found(location) => Some(location),
            Self::NotFound => None,
        }
    }
}

impl From<Option<String>> for TableLocation {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::NotFound, Self::Found)
    }
}
