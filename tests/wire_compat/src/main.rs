fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use coldstash_protocol::{
        ArchiveMeta, Inventory, InventoryReport, JobAction, JobParameters, JobRecord,
        JobStatusCode, MultipartUpload, RetrievalTier, VaultSummary,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_job_list() {
        let jobs = roundtrip_test::<Vec<JobRecord>>("job_list.json");
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].action, JobAction::ArchiveRetrieval);
        assert_eq!(jobs[0].archive_size, Some(103));
        assert!(jobs[0].completion_date.is_some());
        assert_eq!(jobs[1].status_code, Some(JobStatusCode::InProgress));
        assert!(jobs[1].completion_date.is_none());
    }

    #[test]
    fn service_job_list_ignores_unknown_fields() {
        let json = load_fixture("job_list_service.json");
        let jobs: Vec<JobRecord> = serde_json::from_value(json["JobList"].clone()).unwrap();
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.job_id, "job-a");
        assert_eq!(job.description.as_deref(), Some("album.tar"));
        assert!(job.is_for_vault("photos"));
        assert_eq!(job.archive_size, Some(1_048_576));
    }

    #[test]
    fn fixture_vault_list() {
        let vaults = roundtrip_test::<Vec<VaultSummary>>("vault_list.json");
        assert_eq!(vaults[0].name, "photos");
        assert_eq!(vaults[0].archive_count, 2);
        assert!(vaults[1].arn.is_none());
    }

    #[test]
    fn fixture_inventory_report() {
        let report = roundtrip_test::<InventoryReport>("inventory_report.json");
        let inventory = Inventory::from(report);
        assert_eq!(
            inventory.archive_list[0].filename.as_deref(),
            Some("album.tar")
        );
        assert!(inventory.archive_list[1].filename.is_none());
    }

    #[test]
    fn fixture_multipart_uploads() {
        let uploads = roundtrip_test::<Vec<MultipartUpload>>("multipart_uploads.json");
        assert_eq!(uploads[0].part_size_in_bytes, 1_048_576);
        assert!(ArchiveMeta::description_matches(
            uploads[0].archive_description.as_deref(),
            "album.tar"
        ));
    }

    #[test]
    fn fixture_job_parameters() {
        let params = roundtrip_test::<JobParameters>("job_parameters.json");
        assert_eq!(params.action, JobAction::ArchiveRetrieval);
        assert_eq!(params.tier, Some(RetrievalTier::Bulk));
    }

    #[test]
    fn fixture_archive_meta() {
        let meta = roundtrip_test::<ArchiveMeta>("archive_meta.json");
        assert_eq!(meta, ArchiveMeta::new("album.tar"));

        // The description string form parses back to the same value.
        let description = meta.to_description();
        assert_eq!(ArchiveMeta::parse(&description).unwrap(), meta);
    }
}
