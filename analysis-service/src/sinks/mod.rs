pub mod collect;
pub mod csv_report;

pub use collect::CollectSink;
pub use csv_report::CsvReportSink;
