//! Python 2 compatibility analysis: rule catalogs, the line matcher, the
//! directory aggregator and the migration report.

pub mod aggregator;
pub mod catalog;
pub mod guide;
pub mod matcher;
pub mod report;

pub use aggregator::{scan_directory, scan_files, ScanOptions};
pub use catalog::{find_rule, hazards, rules, Guard, PatternRule};
pub use matcher::{scan, Matcher};
pub use report::{build_report, Bucket, MigrationReport, ReportPolicy};
