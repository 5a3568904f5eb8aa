use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, trace};

use crate::analyzer::Analyzer;
use crate::capture::{Record, SchemaRecord};
use crate::error::DataQualityIssue;
use crate::stats::IssueTally;
use crate::types::{ClassId, FieldId};

/// What a numeric identifier stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub identifier: FieldId,
    pub name: String,
    /// The data table the field was declared in
    pub table: String,
    pub prop_type: String,
}

/// A server class and the data table it is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityClass {
    pub id: ClassId,
    pub name: String,
    pub table: String,
}

/// Identifier and class registry folded from every schema record of a
/// capture, in encounter order.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    fields: BTreeMap<FieldId, FieldDescriptor>,
    classes: BTreeMap<ClassId, EntityClass>,
    table_names: Vec<String>,
    seen_tables: HashSet<String>,
    schema_records: usize,
    issues: IssueTally,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one schema record into the catalog.
    ///
    /// A field identifier that is redefined under a different name or table
    /// takes the new definition. A class id that is redefined keeps its first
    /// definition. Both are reported.
    pub fn ingest(&mut self, record: &SchemaRecord) {
        self.schema_records += 1;

        for table in &record.tables {
            if self.seen_tables.insert(table.name.clone()) {
                self.table_names.push(table.name.clone());
            }

            for prop in &table.props {
                let descriptor = FieldDescriptor {
                    identifier: prop.identifier,
                    name: prop.name.clone(),
                    table: table.name.clone(),
                    prop_type: prop.prop_type.clone(),
                };

                if let Some(previous) = self.fields.insert(prop.identifier, descriptor) {
                    if previous.name != prop.name || previous.table != table.name {
                        self.issues.record(DataQualityIssue::SchemaConflict {
                            identifier: prop.identifier,
                            old_table: previous.table,
                            old_name: previous.name,
                            new_table: table.name.clone(),
                            new_name: prop.name.clone(),
                        });
                    }
                }
            }
        }

        for class in &record.server_classes {
            match self.classes.get(&class.id) {
                Some(existing) if existing.name == class.name && existing.table == class.data_table => {
                    trace!("class {} re-sent unchanged", class.id);
                }
                Some(existing) => {
                    let issue = DataQualityIssue::ClassConflict {
                        class_id: class.id,
                        old_name: existing.name.clone(),
                        new_name: class.name.clone(),
                    };
                    self.issues.record(issue);
                }
                None => {
                    self.classes.insert(
                        class.id,
                        EntityClass {
                            id: class.id,
                            name: class.name.clone(),
                            table: class.data_table.clone(),
                        },
                    );
                }
            }
        }
    }

    pub fn lookup_field(&self, identifier: FieldId) -> Option<&FieldDescriptor> {
        self.fields.get(&identifier)
    }

    pub fn class(&self, class_id: ClassId) -> Option<&EntityClass> {
        self.classes.get(&class_id)
    }

    pub fn class_by_name(&self, name: &str) -> Option<&EntityClass> {
        self.classes.values().find(|class| class.name == name)
    }

    /// Unknown class ids are never named anything.
    pub fn class_is_named(&self, class_id: ClassId, expected_name: &str) -> bool {
        self.classes
            .get(&class_id)
            .is_some_and(|class| class.name == expected_name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn fields_in_table<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'a FieldDescriptor> + 'a {
        self.fields.values().filter(move |field| field.table == table)
    }

    /// Identifier to descriptor map, ordered by identifier.
    pub fn identifier_map(&self) -> &BTreeMap<FieldId, FieldDescriptor> {
        &self.fields
    }

    pub fn classes(&self) -> impl Iterator<Item = &EntityClass> {
        self.classes.values()
    }

    /// Every table name, in the order first seen.
    pub fn table_names(&self) -> &[String] {
        &self.table_names
    }

    pub fn schema_records(&self) -> usize {
        self.schema_records
    }

    pub fn issues(&self) -> &IssueTally {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Analyzer for Catalog {
    fn process(&mut self, record: &Record) {
        if let Record::DataTables(schema) = record {
            self.ingest(schema);
        }
    }

    fn finish(&mut self) {
        info!(
            "catalog holds {} identifiers in {} tables and {} classes from {} schema records",
            self.fields.len(),
            self.table_names.len(),
            self.classes.len(),
            self.schema_records
        );
    }
}
