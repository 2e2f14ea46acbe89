// document constants
pub const DOC_KEY: &str = "_key";

// field path constants
pub const DEFAULT_FIELD_SEPARATOR: &str = ".";
pub const NAME_SEPARATOR: &str = "|";

// query keywords
pub const KW_FOR: &str = "FOR";
pub const KW_IN: &str = "IN";
pub const KW_FILTER: &str = "FILTER";
pub const KW_SORT: &str = "SORT";
pub const KW_LIMIT: &str = "LIMIT";
pub const KW_RETURN: &str = "RETURN";
pub const KW_AND: &str = "AND";
pub const KW_ASC: &str = "ASC";
pub const KW_DESC: &str = "DESC";
