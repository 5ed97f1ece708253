use std::fmt;
use std::str::FromStr;

use crate::kernel::definition::ComponentDefinition;
use crate::kernel::error::{Error, Result};

/// Dotted identifier scoping which component definitions are discovered,
/// e.g. `com.elsa`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_identifier(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `id` falls under this namespace at any depth.
    ///
    /// `com.elsa` contains `com.elsa` and `com.elsa.quiz.scoring` but not
    /// `com.elsabeth`.
    pub fn contains(&self, id: &str) -> bool {
        id == self.0
            || id
                .strip_prefix(self.0.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Namespace::new(s)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks that `value` is a non-empty sequence of dot separated segments made
/// of ASCII alphanumerics, `_` or `-`.
pub fn validate_identifier(value: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidIdentifier {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    if value.is_empty() {
        return Err(invalid("identifier is empty"));
    }
    for segment in value.split('.') {
        if segment.is_empty() {
            return Err(invalid("empty segment"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("segments may only contain ASCII letters, digits, '_' or '-'"));
        }
    }
    Ok(())
}

/// Explicit registration list of component definitions.
///
/// Definitions keep their registration order; discovery and tie-breaking in
/// the dependency graph rely on it.
#[derive(Debug, Default)]
pub struct ComponentCatalog {
    definitions: Vec<ComponentDefinition>,
}

impl ComponentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, rejecting invalid and duplicate ids.
    pub fn register(&mut self, definition: ComponentDefinition) -> Result<()> {
        validate_identifier(definition.id())?;
        if self.contains(definition.id()) {
            return Err(Error::DuplicateComponent {
                id: definition.id().to_string(),
            });
        }
        log::debug!("Registered component definition '{}'", definition.id());
        self.definitions.push(definition);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, definition: ComponentDefinition) -> Result<Self> {
        self.register(definition)?;
        Ok(self)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.definitions.iter().any(|d| d.id() == id)
    }

    /// Definitions under `namespace`, in registration order.
    pub fn discover(&self, namespace: &Namespace) -> Vec<&ComponentDefinition> {
        self.definitions
            .iter()
            .filter(|d| namespace.contains(d.id()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
