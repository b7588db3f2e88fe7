use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Error)]
pub enum ParseError {
    /// The metadata block is not valid YAML.
    #[error("Invalid YAML in frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The metadata block parsed, but not to a mapping.
    #[error("Frontmatter must be a mapping, found {found}")]
    NotAMapping { found: &'static str },
}

impl ParseError {
    pub fn not_a_mapping(node: &serde_yaml::Value) -> Self {
        let found = match node {
            serde_yaml::Value::Null => "null",
            serde_yaml::Value::Bool(_) => "a boolean",
            serde_yaml::Value::Number(_) => "a number",
            serde_yaml::Value::String(_) => "a string",
            serde_yaml::Value::Sequence(_) => "a list",
            serde_yaml::Value::Mapping(_) => "a mapping",
            serde_yaml::Value::Tagged(_) => "a tagged value",
        };
        Self::NotAMapping { found }
    }
}
