use serde::Serialize;
use std::cell::{RefCell, RefMut};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::analyzer::Analyzer;
use crate::capture::{Message, Record};
use crate::types::Tick;

#[derive(Debug, Default, Clone, Serialize)]
pub struct SurveyStats {
    pub total_records: usize,
    pub malformed_records: usize,
    pub record_types: BTreeMap<&'static str, usize>,
    pub message_types: BTreeMap<&'static str, usize>,
    pub tables: usize,
    pub fields: usize,
    pub server_classes: usize,
    pub entity_updates: usize,
    pub prop_changes: usize,
    pub first_tick: Option<Tick>,
    pub last_tick: Option<Tick>,
    pub out_of_order_ticks: usize,
}

impl SurveyStats {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct SurveyBuilder {
    stats: Rc<RefCell<SurveyStats>>,
}

impl SurveyBuilder {
    pub fn new(stats: Rc<RefCell<SurveyStats>>) -> Self {
        Self { stats }
    }

    /// `malformed` is the number of records dropped while loading the capture.
    pub fn build(&self, malformed: usize) -> Box<dyn Analyzer> {
        {
            let mut stats: RefMut<_> = self.stats.borrow_mut();
            stats.malformed_records = malformed;
        }
        Box::new(Survey {
            stats: self.stats.clone(),
        })
    }
}

struct Survey {
    stats: Rc<RefCell<SurveyStats>>,
}

impl Analyzer for Survey {
    fn finish(&mut self) {}

    fn process(&mut self, record: &Record) {
        let mut stats: RefMut<_> = self.stats.borrow_mut();
        stats.total_records += 1;
        *stats.record_types.entry(record.into()).or_default() += 1;

        match record {
            Record::DataTables(schema) => {
                stats.tables += schema.tables.len();
                stats.fields += schema.tables.iter().map(|t| t.props.len()).sum::<usize>();
                stats.server_classes += schema.server_classes.len();
            }
            Record::Message(message) => {
                if stats.last_tick.is_some_and(|last| message.tick < last) {
                    stats.out_of_order_ticks += 1;
                } else {
                    stats.last_tick = Some(message.tick);
                }
                stats.first_tick.get_or_insert(message.tick);

                for sub in &message.messages {
                    *stats.message_types.entry(sub.into()).or_default() += 1;
                    if let Message::PacketEntities(packet) = sub {
                        stats.entity_updates += packet.entities.len();
                        stats.prop_changes +=
                            packet.entities.iter().map(|e| e.props.len()).sum::<usize>();
                    }
                }
            }
            Record::Other => {}
        }
    }
}
