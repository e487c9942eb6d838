use std::fmt::Display;
use std::sync::Arc;

use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::model::{Field, Relationship};

/// A model descriptor: the named set of scalar fields, key fields and
/// relationships a query or condition is resolved against.
///
/// `Model` is a cheap handle; all clones share the same underlying state
/// through `Arc<ModelInner>`. Relationships are registered after
/// construction (they need a finished model on both ends), guarded by the
/// crate's `Atomic` lock.
///
/// Two models compare equal when they have the same name; the set-algebra
/// uses this to reject combining queries over different models.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

struct ModelInner {
    name: String,
    key: Vec<String>,
    fields: Vec<Field>,
    relationships: Atomic<Vec<Relationship>>,
}

impl Model {
    /// Starts building a model with the given name.
    pub fn builder(name: &str) -> ModelBuilder {
        ModelBuilder {
            name: name.to_string(),
            key: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// The model name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The names of the primary key fields.
    pub fn key(&self) -> &[String] {
        &self.inner.key
    }

    /// All declared scalar fields.
    pub fn fields(&self) -> &[Field] {
        &self.inner.fields
    }

    /// The names of all declared scalar fields, in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        self.inner
            .fields
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    /// Looks up a scalar field by name.
    pub fn field(&self, name: &str) -> Option<Field> {
        self.inner.fields.iter().find(|f| f.name() == name).cloned()
    }

    /// The primary key fields themselves.
    pub fn key_fields(&self) -> Vec<Field> {
        self.inner
            .key
            .iter()
            .filter_map(|name| self.field(name))
            .collect()
    }

    /// Looks up a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<Relationship> {
        self.inner
            .relationships
            .read_with(|rels| rels.iter().find(|r| r.name() == name).cloned())
    }

    /// Registers a relationship on this model.
    ///
    /// Fails when the name collides with an existing field or relationship.
    pub fn add_relationship(&self, relationship: Relationship) -> QuarryResult<()> {
        if self.field(relationship.name()).is_some() || self.relationship(relationship.name()).is_some()
        {
            log::error!(
                "Name '{}' already taken on model '{}'",
                relationship.name(),
                self.name()
            );
            return Err(QuarryError::new(
                &format!(
                    "Name '{}' already taken on model '{}'",
                    relationship.name(),
                    self.name()
                ),
                ErrorKind::ValidationError,
            ));
        }

        self.inner
            .relationships
            .write_with(|rels| rels.push(relationship));
        Ok(())
    }

    /// Declares a one-to-many relationship to `target` and registers it.
    pub fn has_many(
        &self,
        name: &str,
        target: &Model,
        source_key: &[&str],
        target_key: &[&str],
        inverse_name: &str,
    ) -> QuarryResult<Relationship> {
        let relationship = Relationship::new(
            name,
            self.clone(),
            target.clone(),
            source_key,
            target_key,
            inverse_name,
        )?;
        self.add_relationship(relationship.clone())?;
        Ok(relationship)
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name
    }
}

impl Eq for Model {}

impl Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner.name)
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Model({})", self.inner.name)
    }
}

/// Builder for [Model].
pub struct ModelBuilder {
    name: String,
    key: Vec<String>,
    fields: Vec<Field>,
}

impl ModelBuilder {
    /// Declares a scalar field.
    pub fn field(mut self, field: Field) -> ModelBuilder {
        self.fields.push(field);
        self
    }

    /// Declares the primary key field names.
    pub fn key(mut self, key: &[&str]) -> ModelBuilder {
        self.key = key.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Finishes the model.
    ///
    /// Fails when the name is empty, a field name is duplicated, or a key
    /// field was not declared.
    pub fn build(self) -> QuarryResult<Model> {
        if self.name.is_empty() {
            log::error!("Model name cannot be empty");
            return Err(QuarryError::new(
                "Model name cannot be empty",
                ErrorKind::ValidationError,
            ));
        }

        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name() == field.name()) {
                return Err(QuarryError::new(
                    &format!("Duplicate field '{}' on model '{}'", field.name(), self.name),
                    ErrorKind::ValidationError,
                ));
            }
        }

        for key in &self.key {
            if !self.fields.iter().any(|f| f.name() == key.as_str()) {
                log::error!("Key field '{}' is not declared on model '{}'", key, self.name);
                return Err(QuarryError::new(
                    &format!(
                        "Key field '{}' is not declared on model '{}'",
                        key, self.name
                    ),
                    ErrorKind::InvalidFieldName,
                ));
            }
        }

        Ok(Model {
            inner: Arc::new(ModelInner {
                name: self.name,
                key: self.key,
                fields: self.fields,
                relationships: atomic(Vec::new()),
            }),
        })
    }
}
