use std::fmt::Display;
use std::sync::Arc;

use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::model::Model;
use crate::query::Query;

/// Name used for the synthetic self-referential relationship the set-algebra
/// wraps paginated queries with.
pub(crate) const SELF_RELATIONSHIP: &str = "self";

/// A relationship descriptor between two models.
///
/// A relationship maps a list of source key fields on the owning model onto
/// a list of target key fields on the target model, and knows its inverse.
/// It is a cheap handle sharing state through `Arc`.
#[derive(Clone)]
pub struct Relationship {
    inner: Arc<RelationshipInner>,
}

struct RelationshipInner {
    name: String,
    source: Model,
    target: Model,
    source_key: Vec<String>,
    target_key: Vec<String>,
    inverse_name: String,
}

impl Relationship {
    /// Creates a new relationship.
    ///
    /// The source/target key lists must be the same, non-zero length and
    /// every named field must exist on its model.
    pub fn new(
        name: &str,
        source: Model,
        target: Model,
        source_key: &[&str],
        target_key: &[&str],
        inverse_name: &str,
    ) -> QuarryResult<Relationship> {
        if source_key.is_empty() || source_key.len() != target_key.len() {
            log::error!(
                "Relationship '{}' needs matching source/target key lists",
                name
            );
            return Err(QuarryError::new(
                &format!(
                    "Relationship '{}' needs matching source/target key lists",
                    name
                ),
                ErrorKind::ValidationError,
            ));
        }

        for key in source_key {
            if source.field(key).is_none() {
                return Err(unknown_key_error(name, key, &source));
            }
        }
        for key in target_key {
            if target.field(key).is_none() {
                return Err(unknown_key_error(name, key, &target));
            }
        }

        Ok(Relationship {
            inner: Arc::new(RelationshipInner {
                name: name.to_string(),
                source,
                target,
                source_key: source_key.iter().map(|k| k.to_string()).collect(),
                target_key: target_key.iter().map(|k| k.to_string()).collect(),
                inverse_name: inverse_name.to_string(),
            }),
        })
    }

    /// Builds the synthetic one-to-many relationship mapping the model's own
    /// primary key to itself.
    ///
    /// This is the subject the set-algebra uses to turn a paginated or
    /// joined query into a membership comparison.
    pub fn self_referential(model: &Model) -> QuarryResult<Relationship> {
        if model.key().is_empty() {
            log::error!(
                "Model '{}' has no key; cannot build self relationship",
                model.name()
            );
            return Err(QuarryError::new(
                &format!(
                    "Model '{}' has no key; cannot build self relationship",
                    model.name()
                ),
                ErrorKind::ValidationError,
            ));
        }

        let key: Vec<&str> = model.key().iter().map(|k| k.as_str()).collect();
        Relationship::new(
            SELF_RELATIONSHIP,
            model.clone(),
            model.clone(),
            &key,
            &key,
            SELF_RELATIONSHIP,
        )
    }

    /// The relationship name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The owning model.
    pub fn source(&self) -> &Model {
        &self.inner.source
    }

    /// The target model.
    pub fn target(&self) -> &Model {
        &self.inner.target
    }

    /// The key field names on the owning side.
    pub fn source_key(&self) -> &[String] {
        &self.inner.source_key
    }

    /// The key field names on the target side.
    pub fn target_key(&self) -> &[String] {
        &self.inner.target_key
    }

    /// The inverse relationship: target and source swapped, key lists
    /// swapped, names exchanged.
    pub fn inverse(&self) -> QuarryResult<Relationship> {
        let source_key: Vec<&str> = self.inner.target_key.iter().map(|k| k.as_str()).collect();
        let target_key: Vec<&str> = self.inner.source_key.iter().map(|k| k.as_str()).collect();
        Relationship::new(
            &self.inner.inverse_name,
            self.inner.target.clone(),
            self.inner.source.clone(),
            &source_key,
            &target_key,
            &self.inner.name,
        )
    }

    /// A fresh query over the relationship's target model.
    pub fn query(&self) -> Query {
        Query::new(self.inner.target.clone())
    }
}

fn unknown_key_error(name: &str, key: &str, model: &Model) -> QuarryError {
    log::error!(
        "Relationship '{}' references unknown field '{}' on model '{}'",
        name,
        key,
        model.name()
    );
    QuarryError::new(
        &format!(
            "Relationship '{}' references unknown field '{}' on model '{}'",
            name,
            key,
            model.name()
        ),
        ErrorKind::InvalidFieldName,
    )
}

impl PartialEq for Relationship {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name
            && self.inner.source == other.inner.source
            && self.inner.target == other.inner.target
            && self.inner.source_key == other.inner.source_key
            && self.inner.target_key == other.inner.target_key
    }
}

impl Eq for Relationship {}

impl Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner.name)
    }
}

impl std::fmt::Debug for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Relationship({}: {} -> {})",
            self.inner.name,
            self.inner.source.name(),
            self.inner.target.name()
        )
    }
}
