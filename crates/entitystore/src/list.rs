//! Materialized query results.

use crate::core::Value;
use crate::entity::Entity;

/// Ordered rows of attribute values, aligned to the schema entity's
/// attribute order, with a cursor.
///
/// Stores clear and refill a collection in place; they never replace it.
#[derive(Debug, Clone)]
pub struct EntityCollection {
    model: Entity,
    rows: Vec<Vec<Value>>,
    cursor: Option<usize>,
}

impl EntityCollection {
    /// Empty collection of entities shaped like `model`
    #[must_use]
    pub fn new(model: Entity) -> Self {
        Self {
            model,
            rows: Vec::new(),
            cursor: None,
        }
    }

    /// Schema entity used for type lookups and column order
    #[must_use]
    pub fn model(&self) -> &Entity {
        &self.model
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.cursor = None;
    }

    /// Append a row without moving the cursor
    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Index of the current row, `None` when empty
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn move_first(&mut self) -> bool {
        self.move_to(0)
    }

    pub fn move_last(&mut self) -> bool {
        match self.rows.len() {
            0 => {
                self.cursor = None;
                false
            }
            n => self.move_to(n - 1),
        }
    }

    pub fn move_next(&mut self) -> bool {
        match self.cursor {
            Some(i) => self.move_to(i + 1),
            None => self.move_first(),
        }
    }

    pub fn move_previous(&mut self) -> bool {
        match self.cursor {
            Some(i) if i > 0 => self.move_to(i - 1),
            _ => false,
        }
    }

    fn move_to(&mut self, index: usize) -> bool {
        if index < self.rows.len() {
            self.cursor = Some(index);
            true
        } else {
            false
        }
    }

    /// Value of the named attribute in the current row
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        let column = self.model.attributes.iter().position(|a| a.name == name)?;
        self.rows.get(self.cursor?)?.get(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::AttributeType;

    fn collection() -> EntityCollection {
        let mut list = EntityCollection::new(
            Entity::new("Person").with_attribute("name", AttributeType::String),
        );
        list.push_row(vec![Value::from("a1"), Value::from("Ann")]);
        list.push_row(vec![Value::from("b2"), Value::from("Bob")]);
        list
    }

    #[test]
    fn test_cursor_navigation() {
        let mut list = collection();
        assert_eq!(list.cursor(), None);
        assert_eq!(list.get("name"), None);

        assert!(list.move_last());
        assert_eq!(list.get("name"), Some(&Value::from("Bob")));
        assert!(!list.move_next());
        assert!(list.move_previous());
        assert_eq!(list.get("id"), Some(&Value::from("a1")));
        assert!(!list.move_previous());
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut list = collection();
        list.move_first();
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.cursor(), None);
        assert!(!list.move_last());
    }
}
