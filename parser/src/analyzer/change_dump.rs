use serde::Serialize;
use std::io::Write;
use tracing::warn;

use crate::analyzer::Analyzer;
use crate::analyzer::catalog::Catalog;
use crate::capture::{PropValue, Record};
use crate::types::{ClassId, FieldId, SlotId, Tick};

/// One property change with its identifier resolved against the catalog.
#[derive(Debug, Serialize)]
pub struct ResolvedChange<'a> {
    pub tick: Tick,
    pub entity_index: SlotId,
    pub server_class: ClassId,
    pub class_name: Option<&'a str>,
    pub identifier: FieldId,
    pub table: Option<&'a str>,
    pub name: Option<&'a str>,
    pub prop_type: Option<&'a str>,
    pub value: &'a PropValue,
    pub index: i64,
}

pub struct ChangeDumpBuilder<'a> {
    catalog: &'a Catalog,
}

impl<'a> ChangeDumpBuilder<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn build<W: Write + 'a>(self, output: W) -> ChangeDump<'a> {
        ChangeDump {
            catalog: self.catalog,
            output: Box::new(output),
            written: 0,
            error: None,
        }
    }
}

/// Writes every property change in a capture as a JSON line.
pub struct ChangeDump<'a> {
    catalog: &'a Catalog,
    output: Box<dyn Write + 'a>,
    written: usize,
    error: Option<std::io::Error>,
}

impl ChangeDump<'_> {
    /// Lines written, or the first write error.
    pub fn into_result(self) -> std::io::Result<usize> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.written),
        }
    }

    fn write_line(&mut self, change: &ResolvedChange<'_>) {
        let line = match serde_json::to_string(change) {
            Ok(line) => line,
            Err(e) => {
                warn!("failed to encode change for identifier {}: {e}", change.identifier);
                return;
            }
        };
        match writeln!(self.output, "{line}") {
            Ok(()) => self.written += 1,
            Err(e) => self.error = Some(e),
        }
    }
}

impl Analyzer for ChangeDump<'_> {
    fn finish(&mut self) {
        if self.error.is_none() {
            if let Err(e) = self.output.flush() {
                self.error = Some(e);
            }
        }
    }

    fn process(&mut self, record: &Record) {
        if self.error.is_some() {
            return;
        }
        let Record::Message(message) = record else {
            return;
        };

        let catalog = self.catalog;
        for entity in message.entities() {
            let class_name = catalog.class(entity.server_class).map(|c| c.name.as_str());
            for prop in &entity.props {
                let field = catalog.lookup_field(prop.identifier);
                let change = ResolvedChange {
                    tick: message.tick,
                    entity_index: entity.entity_index,
                    server_class: entity.server_class,
                    class_name,
                    identifier: prop.identifier,
                    table: field.map(|f| f.table.as_str()),
                    name: field.map(|f| f.name.as_str()),
                    prop_type: field.map(|f| f.prop_type.as_str()),
                    value: &prop.value,
                    index: prop.index,
                };
                self.write_line(&change);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureDocument;
    use serde_json::json;

    #[test]
    fn dumps_resolved_and_unknown_changes() {
        let doc = CaptureDocument::from_json_value(json!([
            {"type": "DataTables", "tables": [{"name": "DT_BasePlayer", "props": [
                {"identifier": 30, "name": "m_iHealth", "prop_type": "Int"}
            ]}], "server_classes": [{"id": 1, "name": "CTFPlayer", "data_table": "DT_TFPlayer"}]},
            {"type": "Message", "tick": 7, "messages": [
                {"type": "PacketEntities", "entities": [
                    {"server_class": 1, "entity_index": 2, "props": [
                        {"identifier": 30, "value": 125, "index": 0},
                        {"identifier": 31, "value": 1.5, "index": 1}
                    ]}
                ]}
            ]}
        ]))
        .unwrap();

        let mut catalog = Catalog::new();
        catalog.process_all(doc.records());

        let mut out = Vec::new();
        let mut dump = ChangeDumpBuilder::new(&catalog).build(&mut out);
        dump.process_all(doc.records());
        assert_eq!(dump.into_result().unwrap(), 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines[0]["name"], "m_iHealth");
        assert_eq!(lines[0]["table"], "DT_BasePlayer");
        assert_eq!(lines[0]["class_name"], "CTFPlayer");
        assert_eq!(lines[0]["value"], 125);
        assert_eq!(lines[1]["identifier"], 31);
        assert!(lines[1]["name"].is_null());
    }
}
