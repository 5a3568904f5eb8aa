use tracing::{Level, info, span};

use crate::analyzer::Analyzer;
use crate::analyzer::attributor::Attributor;
use crate::analyzer::catalog::Catalog;
use crate::analyzer::identity::{IdentityTimelineBuilder, SlotIdentityTimeline};
use crate::capture::CaptureDocument;
use crate::config::ExtractorConfig;
use crate::snapshot::ExtractionResult;
use crate::stats::ExtractionStats;

/// Everything produced by one run: the result plus the catalog and timeline
/// it was resolved against.
#[derive(Debug)]
pub struct Extraction {
    catalog: Catalog,
    timeline: SlotIdentityTimeline,
    result: ExtractionResult,
    stats: ExtractionStats,
}

impl Extraction {
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn timeline(&self) -> &SlotIdentityTimeline {
        &self.timeline
    }

    pub fn result(&self) -> &ExtractionResult {
        &self.result
    }

    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    pub fn into_result(self) -> ExtractionResult {
        self.result
    }
}

/// Runs catalog ingestion, identity timeline construction and attribution
/// over a capture, in that order.
#[derive(Debug, Default, Clone)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn run(&self, document: &CaptureDocument) -> Extraction {
        let span = span!(Level::INFO, "extraction");
        let _enter = span.enter();

        let records = document.records();
        let mut stats = ExtractionStats {
            total_records: records.len() + document.malformed_record_count(),
            message_records: document.message_records().count(),
            ..Default::default()
        };
        // Already logged when the document was loaded
        for issue in document.malformed() {
            stats.issues.tally(issue);
        }

        // The timeline is built from the whole capture before attribution so
        // that every tick can be resolved against identities known up to it.
        let catalog = {
            let span = span!(Level::INFO, "catalog");
            let _enter = span.enter();
            let mut catalog = Catalog::new();
            catalog.process_all(records);
            catalog
        };
        stats.schema_records = catalog.schema_records();
        stats.issues.merge(catalog.issues());

        let timeline = {
            let span = span!(Level::INFO, "identity timeline");
            let _enter = span.enter();
            let mut builder = IdentityTimelineBuilder::new(&catalog, &self.config);
            builder.process_all(records);
            let (timeline, issues) = builder.into_parts();
            stats.issues.merge(&issues);
            timeline
        };

        let (result, issues) = Attributor::new(&catalog, &timeline, &self.config).attribute(records);
        stats.issues.merge(&issues);
        stats.ticks = result.len();
        stats.snapshots = result.snapshot_count();

        info!(
            "extracted {} snapshots over {} ticks with {} data-quality issues",
            stats.snapshots,
            stats.ticks,
            stats.issues.total()
        );

        Extraction {
            catalog,
            timeline,
            result,
            stats,
        }
    }
}

/// Shorthand for `Extractor::new(config).run(document)`.
pub fn extract(document: &CaptureDocument, config: ExtractorConfig) -> Extraction {
    Extractor::new(config).run(document)
}
