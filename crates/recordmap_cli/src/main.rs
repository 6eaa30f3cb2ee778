//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `recordmap_core` linkage and the insert/dedup/delete loop
//!   against a real SQLite store.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `recordmap_cli [db_path] [log_dir]`. The database is in-memory when
//! `db_path` is omitted or `-`; file logging starts only when `log_dir` (an
//! absolute path) is given.

use recordmap_core::{
    core_version, default_log_level, init_logging, InsertOutcome, LogConfig, Mappable,
    MappingEngine, Predicate, Record, RelatedModels, SqliteStore,
};
use std::process::ExitCode;

struct Sample {
    key: &'static str,
    children: Vec<SampleChild>,
}

struct SampleChild {
    parent_key: &'static str,
    index: i64,
}

impl Mappable for Sample {
    fn entity_type(&self) -> Option<&str> {
        Some("Sample")
    }

    fn uniqueness_predicate(&self) -> Option<Predicate> {
        Some(Predicate::eq("key", self.key))
    }

    fn populate(&self, record: &mut Record) {
        record.set("key", self.key);
    }

    fn related_models(&self) -> RelatedModels<'_> {
        vec![self
            .children
            .iter()
            .map(|child| Box::new(child) as Box<dyn Mappable + '_>)
            .collect()]
    }
}

impl Mappable for SampleChild {
    fn entity_type(&self) -> Option<&str> {
        Some("SampleChild")
    }

    fn uniqueness_predicate(&self) -> Option<Predicate> {
        Some(Predicate::eq("parent_key", self.parent_key).and(Predicate::eq("index", self.index)))
    }

    fn populate(&self, record: &mut Record) {
        record.set("parent_key", self.parent_key).set("index", self.index);
    }
}

fn main() -> ExitCode {
    println!("recordmap_core version={}", core_version());

    let mut args = std::env::args().skip(1);
    let db_path = args.next().filter(|path| path != "-");
    let log_dir = args.next();

    match run(db_path, log_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("recordmap_cli error={message}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: Option<String>, log_dir: Option<String>) -> Result<(), String> {
    if let Some(dir) = log_dir {
        init_logging(&LogConfig::new(default_log_level(), dir))
            .map_err(|err| err.to_string())?;
    }

    let mut store = match db_path.as_deref() {
        Some(path) => SqliteStore::open(path),
        None => SqliteStore::open_in_memory(),
    }
    .map_err(|err| err.to_string())?;
    for entity in ["Sample", "SampleChild"] {
        store.register_entity(entity).map_err(|err| err.to_string())?;
    }

    let mut engine = MappingEngine::new(store);
    let sample = Sample {
        key: "smoke",
        children: (0..2)
            .map(|index| SampleChild {
                parent_key: "smoke",
                index,
            })
            .collect(),
    };

    for attempt in 1..=2 {
        let outcome = engine.insert(&sample).map_err(|err| err.to_string())?;
        let status = match outcome {
            InsertOutcome::Inserted(report) => format!("inserted created={}", report.created_count()),
            InsertOutcome::AlreadyPresent { matched } => format!("present matched={matched}"),
            InsertOutcome::Skipped(reason) => format!("skipped reason={reason}"),
        };
        println!("insert attempt={attempt} {status}");
    }

    let deleted = engine.delete(&sample).map_err(|err| err.to_string())?;
    println!("delete count={}", deleted.deleted_count());
    Ok(())
}
