//! Conversion run integration tests.
//!
//! These tests drive whole runs through `ConversionRun` with mock converters
//! and the content-tagged mock identifier:
//! - Multi-hop conversion and the generation count
//! - Files without a target, without a route, or already in their target
//! - Merge groups capped by size
//! - Attachments joining the run
//! - Documentation and run log contents

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use archivist_core::{
    config::{Config, FolderOverride, FormatSetting},
    converter::ConverterRegistry,
    report::{read_documentation, Documentation},
    runlog::{JsonLinesStore, MemoryStore, RunLogStore, Severity},
    scheduler::ProgressMode,
    testing::{read_tag, MockConverter, MockIdentifier},
    ConversionRun, FinalStatus, FormatCode, RunOutcome,
};

/// Test helper owning the input/output folders and the run log.
struct TestHarness {
    dir: TempDir,
    config: Config,
    converters: ConverterRegistry,
    store: Arc<MemoryStore>,
}

impl TestHarness {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.run.input_folder = dir.path().join("input");
        config.run.output_folder = dir.path().join("output");
        config.run.temp_dir = dir.path().join("tmp");
        config.run.documentation_path = dir.path().join("documentation.json");
        config.run.log_path = dir.path().join("logs/run.jsonl");
        config.run.max_threads = 4;
        config.orchestrator.progress = ProgressMode::Off;

        Self {
            dir,
            config,
            converters: ConverterRegistry::new(),
            store: Arc::new(MemoryStore::new()),
        }
    }

    fn input(&self) -> PathBuf {
        self.config.run.input_folder.clone()
    }

    fn output(&self) -> PathBuf {
        self.config.run.output_folder.clone()
    }

    fn register(&mut self, converter: MockConverter) -> Arc<MockConverter> {
        let converter = Arc::new(converter);
        self.converters.register(converter.clone());
        converter
    }

    fn target(&mut self, source: &str, target: &str) {
        self.config.formats.push(FormatSetting {
            name: source.to_string(),
            pronoms: vec![FormatCode::from(source)],
            default_target: Some(FormatCode::from(target)),
            do_not_convert: false,
        });
    }

    async fn input_file(&self, relative: &str, format: &str) {
        MockIdentifier::write_tagged(&self.input().join(relative), format)
            .await
            .expect("Failed to write input file");
    }

    async fn execute(&self) -> RunOutcome {
        ConversionRun::new(self.config.clone())
            .with_converters(self.converters.clone())
            .with_identifier(Arc::new(MockIdentifier::new()))
            .with_run_log_store(self.store.clone())
            .execute()
            .await
            .expect("Run failed to start")
    }

    async fn documentation(&self) -> Documentation {
        read_documentation(&self.config.run.documentation_path)
            .await
            .expect("Failed to read documentation")
    }
}

fn entry_named<'a>(
    entries: &'a [archivist_core::report::FileEntry],
    name: &str,
) -> &'a archivist_core::report::FileEntry {
    entries
        .iter()
        .find(|e| Path::new(&e.original_path).file_name().and_then(|n| n.to_str()) == Some(name))
        .unwrap_or_else(|| panic!("no entry for {}", name))
}

#[tokio::test]
async fn test_two_hop_route_converts_in_two_generations() {
    let mut harness = TestHarness::new();
    let office = harness.register(MockConverter::new("office").with_conversion("fmt/40", "fmt/412"));
    let pdfa = harness.register(MockConverter::new("pdfa").with_conversion("fmt/412", "fmt/477"));
    harness.target("fmt/40", "fmt/477");
    harness.input_file("letters/a.doc", "fmt/40").await;

    let outcome = harness.execute().await;

    assert_eq!(outcome.schedule.generations, 2);
    assert_eq!(outcome.summary.converted, 1);
    assert_eq!(office.conversion_count().await, 1);
    assert_eq!(pdfa.conversion_count().await, 1);
    assert!(outcome.is_clean());

    let doc = harness.documentation().await;
    let entry = entry_named(&doc.files, "a.doc");
    assert_eq!(entry.status, FinalStatus::Converted);
    assert!(entry.is_converted);
    assert_eq!(entry.converted_by, vec!["office", "pdfa"]);
    assert_eq!(entry.original.pronom.as_str(), "fmt/40");
    assert_eq!(entry.new.as_ref().unwrap().pronom.as_str(), "fmt/477");

    let new_path = harness.output().join(entry.new_path.as_ref().unwrap());
    assert_eq!(read_tag(&new_path).await.unwrap().as_str(), "fmt/477");
    assert!(!harness.output().join("letters/a.doc").exists());
    assert!(harness.input().join("letters/a.doc").exists());
}

#[tokio::test]
async fn test_file_without_target_is_never_dispatched() {
    let mut harness = TestHarness::new();
    let office = harness.register(MockConverter::new("office").with_conversion("fmt/40", "fmt/477"));
    harness.target("fmt/40", "fmt/477");
    harness.input_file("a.doc", "fmt/40").await;
    harness.input_file("misc/b.xls", "fmt/61").await;

    let outcome = harness.execute().await;

    assert_eq!(outcome.summary.output_not_set, 1);
    assert_eq!(office.conversion_count().await, 1);

    let doc = harness.documentation().await;
    let entry = entry_named(&doc.no_target, "b.xls");
    assert_eq!(entry.status, FinalStatus::OutputNotSet);
    assert!(entry.target.is_none());
    assert!(entry.converted_by.is_empty());
    assert!(harness.output().join("misc/b.xls").exists());
}

#[tokio::test]
async fn test_file_in_target_format_is_converted_without_dispatch() {
    let mut harness = TestHarness::new();
    let office = harness.register(MockConverter::new("office").with_conversion("fmt/40", "fmt/477"));
    harness.config.formats.push(FormatSetting {
        name: "PDF/A".to_string(),
        pronoms: vec![FormatCode::from("fmt/477")],
        default_target: None,
        do_not_convert: true,
    });
    harness.input_file("done.pdf", "fmt/477").await;

    let outcome = harness.execute().await;

    assert_eq!(outcome.schedule.generations, 0);
    assert_eq!(office.conversion_count().await, 0);
    let doc = harness.documentation().await;
    let entry = entry_named(&doc.files, "done.pdf");
    assert!(entry.is_converted);
    assert!(entry.converted_by.is_empty());
}

#[tokio::test]
async fn test_unroutable_file_is_unsupported() {
    let mut harness = TestHarness::new();
    harness.register(MockConverter::new("office").with_conversion("fmt/40", "fmt/477"));
    harness.target("fmt/40", "fmt/477");
    harness.target("fmt/999", "fmt/477");
    harness.input_file("a.doc", "fmt/40").await;
    harness.input_file("odd.xyz", "fmt/999").await;

    let outcome = harness.execute().await;

    assert_eq!(outcome.schedule.files_unsupported, 1);
    assert_eq!(outcome.summary.not_supported, 1);
    let doc = harness.documentation().await;
    let entry = entry_named(&doc.unsupported, "odd.xyz");
    assert_eq!(entry.target.as_ref().unwrap().as_str(), "fmt/477");

    let warnings: Vec<_> = harness
        .store
        .read_all()
        .unwrap()
        .into_iter()
        .filter(|r| r.entry.severity == Severity::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].entry.pronom.as_ref().unwrap().as_str(), "fmt/999");
}

#[tokio::test]
async fn test_merge_groups_split_by_size() {
    let mut harness = TestHarness::new();
    harness.register(MockConverter::new("images").with_merge(&["fmt/13"], "fmt/477"));
    harness.config.run.max_merge_size_mb = 1;
    harness.config.folders.push(FolderOverride {
        path: PathBuf::from("scans"),
        pronoms: vec![FormatCode::from("fmt/13")],
        output: Some(FormatCode::from("fmt/477")),
        merge: true,
    });
    for name in ["scans/p1.png", "scans/p2.png"] {
        MockIdentifier::write_tagged_sized(&harness.input().join(name), "fmt/13", 600 * 1024)
            .await
            .unwrap();
    }

    let outcome = harness.execute().await;

    assert_eq!(outcome.merge.groups, 2);
    assert_eq!(outcome.merge.outputs.len(), 2);
    assert_eq!(outcome.summary.merged, 2);
    assert_eq!(outcome.schedule.generations, 0);

    let doc = harness.documentation().await;
    assert_eq!(doc.merged.len(), 2);
    for merged in &doc.merged {
        assert_eq!(merged.members.len(), 1);
        assert!(merged.output.is_converted);
        assert!(merged.output.added_during_run);
        assert!(merged.members[0].new_path.is_none());
    }
    assert!(!harness.output().join("scans/p1.png").exists());
    assert!(harness.output().join("scans/merged-001.pdf").exists());
}

#[tokio::test]
async fn test_attachments_join_the_run() {
    let mut harness = TestHarness::new();
    harness.register(
        MockConverter::new("mail")
            .with_conversion("fmt/950", "fmt/477")
            .with_attachment("photo.png", "fmt/13"),
    );
    let images = harness.register(MockConverter::new("images").with_conversion("fmt/13", "fmt/477"));
    harness.target("fmt/950", "fmt/477");
    harness.target("fmt/13", "fmt/477");
    harness.input_file("inbox/mail.eml", "fmt/950").await;

    let outcome = harness.execute().await;

    assert_eq!(outcome.schedule.generations, 2);
    assert_eq!(outcome.schedule.files_derived, 1);
    assert_eq!(images.conversion_count().await, 1);
    assert_eq!(outcome.summary.converted, 2);

    let doc = harness.documentation().await;
    let mail = entry_named(&doc.files, "mail.eml");
    let attachment = entry_named(&doc.files, "photo.png");
    assert_eq!(attachment.parent, Some(mail.id));
    assert!(attachment.added_during_run);
    assert!(attachment.is_converted);
    assert!(attachment.original_path.contains("mail_attachments"));
}

#[tokio::test]
async fn test_failed_run_records_errors_in_log_file() {
    let mut harness = TestHarness::new();
    let office = harness.register(
        MockConverter::new("office")
            .with_conversion("fmt/40", "fmt/477")
            .with_wrong_output("fmt/18"),
    );
    harness.target("fmt/40", "fmt/477");
    harness.input_file("a.doc", "fmt/40").await;

    let log_path = harness.config.run.log_path.clone();
    let outcome = ConversionRun::new(harness.config.clone())
        .with_converters(harness.converters.clone())
        .with_identifier(Arc::new(MockIdentifier::new()))
        .execute()
        .await
        .unwrap();

    assert!(!outcome.is_clean());
    assert_eq!(outcome.summary.failed, 1);
    assert_eq!(office.conversion_count().await, 3);
    assert_eq!(outcome.log_path, log_path);

    // Output never verified, so the input stays in place.
    assert_eq!(
        read_tag(&harness.output().join("a.doc")).await.unwrap().as_str(),
        "fmt/40"
    );

    let store = JsonLinesStore::open(&log_path).unwrap();
    let records = store.read_all().unwrap();
    assert!(records.iter().any(|r| r.entry.severity == Severity::Error
        && r.entry.converter.as_deref() == Some("office")));
    assert!(harness.dir.path().join("documentation.json").exists());
}
