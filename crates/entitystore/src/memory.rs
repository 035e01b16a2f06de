//! In-memory backend.
//!
//! Rows live in a [`DashMap`] keyed by model type, in insertion order.
//! Identities are UUID strings. The store is ready from construction and
//! `connect` performs no I/O.

use async_trait::async_trait;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, instrument};
use uuid::Uuid;

use entitystore_common::config::StoreSettings;
use entitystore_common::metrics::{record_operation, record_rows_materialized, Outcome};
use entitystore_common::{PreconditionError, Result, StoreError};

use crate::core::{Capabilities, ConnectOptions, Filter, Operation, Order, SortDirection, Store, Value};
use crate::entity::{AttributeType, Entity};
use crate::identity::{self, Intent};
use crate::list::EntityCollection;
use crate::materializer::append_rows;
use crate::translator::{day_bounds, filter_day, id_filter_value};

const STORE_TYPE: &str = "MemoryStore";

#[derive(Debug, Clone)]
struct StoredRow {
    id: String,
    fields: HashMap<String, Value>,
}

impl StoredRow {
    fn value(&self, model: &Entity, name: &str) -> Value {
        if model.is_identity(name) {
            Value::String(self.id.clone())
        } else {
            self.fields.get(name).cloned().unwrap_or_default()
        }
    }
}

fn fields_of(entity: &Entity) -> HashMap<String, Value> {
    entity
        .attributes
        .iter()
        .skip(1)
        .map(|a| (a.name.clone(), a.value.clone()))
        .collect()
}

/// Total order over values: `Null` first, then by kind, then by value.
/// Integers and floats compare numerically.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Date(_) => 4,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        _ if rank(a) == 2 && rank(b) == 2 => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        },
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Store holding entities in process memory.
pub struct MemoryStore {
    settings: StoreSettings,
    name: String,
    models: DashMap<String, Vec<StoredRow>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(StoreSettings::with_store_type(STORE_TYPE))
    }

    #[must_use]
    pub fn with_settings(settings: StoreSettings) -> Self {
        let name = settings.display_name();
        Self {
            settings,
            name,
            models: DashMap::new(),
        }
    }

    /// Build from loose settings; unknown keys are rejected.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Ok(Self::with_settings(StoreSettings::from_pairs(STORE_TYPE, pairs)?))
    }

    /// Number of stored entities of `model_type`
    #[must_use]
    pub fn count(&self, model_type: &str) -> usize {
        self.models.get(model_type).map_or(0, |rows| rows.len())
    }

    fn finish<T>(&self, operation: Operation, started: Instant, result: Result<T>) -> Result<T> {
        record_operation(&self.settings.store_type, operation.as_str(), Outcome::of(&result), started);
        if let Err(e) = &result {
            debug!(store = %self.name, operation = operation.as_str(), "Operation failed: {}", e);
        }
        result
    }

    fn put(&self, entity: &mut Entity) -> Result<()> {
        entity.ensure_valid()?;
        let assigned = match identity::resolve(entity) {
            Intent::Create => {
                let id = Uuid::new_v4().to_string();
                self.models
                    .entry(entity.model_type.clone())
                    .or_default()
                    .push(StoredRow {
                        id: id.clone(),
                        fields: fields_of(entity),
                    });
                Some(id)
            }
            Intent::Update(id) => {
                let mut rows = self
                    .models
                    .get_mut(&entity.model_type)
                    .ok_or(StoreError::ModelNotFound)?;
                let row = rows
                    .iter_mut()
                    .find(|row| row.id == id)
                    .ok_or(StoreError::ModelNotFound)?;
                row.fields = fields_of(entity);
                None
            }
            Intent::Malformed => return Err(identity::malformed(Operation::PutModel).into()),
        };
        if let Some(id) = assigned {
            debug!(model = %entity.model_type, id = %id, "Inserted entity");
            entity.set_identity(Value::String(id));
        }
        Ok(())
    }

    fn get(&self, entity: &mut Entity) -> Result<()> {
        entity.ensure_valid()?;
        if entity.identity().is_empty() {
            return Err(PreconditionError::IdNotSet.into());
        }
        let Intent::Update(id) = identity::resolve(entity) else {
            return Err(identity::malformed(Operation::GetModel).into());
        };
        let stored = self
            .models
            .get(&entity.model_type)
            .and_then(|rows| rows.iter().find(|row| row.id == id).cloned())
            .ok_or(StoreError::ModelNotFound)?;

        for attribute in entity.attributes.iter_mut().skip(1) {
            attribute.value = stored.fields.get(&attribute.name).cloned().unwrap_or_default();
        }
        Ok(())
    }

    fn delete(&self, entity: &mut Entity) -> Result<()> {
        entity.ensure_valid()?;
        let Intent::Update(id) = identity::resolve(entity) else {
            return Err(identity::malformed(Operation::DeleteModel).into());
        };
        let removed = self.models.get_mut(&entity.model_type).is_some_and(|mut rows| {
            let before = rows.len();
            rows.retain(|row| row.id != id);
            rows.len() < before
        });
        if !removed {
            return Err(StoreError::IdNotFound.into());
        }
        entity.set_identity(Value::Null);
        Ok(())
    }

    fn list(&self, list: &mut EntityCollection, filter: &Filter, order: Option<&Order>) -> Result<()> {
        list.model().ensure_valid()?;
        list.clear();

        let model = list.model();
        let conditions = filter
            .iter()
            .map(|(name, value)| Condition::new(model, name, value))
            .collect::<std::result::Result<Vec<_>, StoreError>>()?;

        let mut matched: Vec<StoredRow> = self
            .models
            .get(&model.model_type)
            .map(|rows| {
                rows.iter()
                    .filter(|row| conditions.iter().all(|c| c.matches(model, row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order {
            matched.sort_by(|a, b| {
                order
                    .iter()
                    .map(|(name, direction)| {
                        let ordering = compare_values(&a.value(model, name), &b.value(model, name));
                        match direction {
                            SortDirection::Ascending => ordering,
                            SortDirection::Descending => ordering.reverse(),
                        }
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }

        let rows: Vec<Vec<Value>> = matched
            .iter()
            .map(|row| {
                model
                    .attributes
                    .iter()
                    .map(|a| row.value(model, &a.name))
                    .collect()
            })
            .collect();
        let count = append_rows(list, rows);
        record_rows_materialized(&self.settings.store_type, count);
        debug!(model = %list.model().model_type, rows = count, "Loaded list");
        Ok(())
    }
}

/// One filter entry, resolved against the model
enum Condition<'a> {
    Equals(&'a str, &'a Value),
    SameDay(&'a str, chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>),
}

impl<'a> Condition<'a> {
    fn new(model: &Entity, name: &'a str, value: &'a Value) -> std::result::Result<Self, StoreError> {
        match model.attribute_type(name) {
            Some(AttributeType::Date) if !value.is_null() => {
                let (lower, upper) = day_bounds(filter_day(name, value)?)?;
                Ok(Condition::SameDay(name, lower, upper))
            }
            Some(AttributeType::Id) => {
                id_filter_value(name, value)?;
                Ok(Condition::Equals(name, value))
            }
            _ => Ok(Condition::Equals(name, value)),
        }
    }

    fn matches(&self, model: &Entity, row: &StoredRow) -> bool {
        match self {
            Condition::Equals(name, expected) => {
                compare_values(&row.value(model, name), expected) == Ordering::Equal
            }
            Condition::SameDay(name, lower, upper) => row
                .value(model, name)
                .as_date()
                .is_some_and(|d| *lower <= d && d <= *upper),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn store_type(&self) -> &str {
        &self.settings.store_type
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ready()
    }

    async fn connect(&self, location: &str, _options: Option<ConnectOptions>) -> Result<()> {
        debug!(store = %self.name, location, "Memory store needs no connection");
        Ok(())
    }

    #[instrument(skip(self, entity), fields(store = %self.name, model = %entity.model_type))]
    async fn put_model(&self, entity: &mut Entity) -> Result<()> {
        let started = Instant::now();
        let result = self.put(entity);
        self.finish(Operation::PutModel, started, result)
    }

    #[instrument(skip(self, entity), fields(store = %self.name, model = %entity.model_type))]
    async fn get_model(&self, entity: &mut Entity) -> Result<()> {
        let started = Instant::now();
        let result = self.get(entity);
        self.finish(Operation::GetModel, started, result)
    }

    #[instrument(skip(self, entity), fields(store = %self.name, model = %entity.model_type))]
    async fn delete_model(&self, entity: &mut Entity) -> Result<()> {
        let started = Instant::now();
        let result = self.delete(entity);
        self.finish(Operation::DeleteModel, started, result)
    }

    #[instrument(skip_all, fields(store = %self.name, model = %list.model().model_type))]
    async fn get_list(
        &self,
        list: &mut EntityCollection,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.list(list, filter, order);
        self.finish(Operation::GetList, started, result)
    }
}
