use std::collections::HashMap;
use std::sync::Arc;

use telescope_hir::{CancellationToken, DocumentType, UpdateOutcome};
use telescope_service::{
    DocumentReport, LanguageService, MemoryFileSystem, ReportKind, TelescopeConfig,
};
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn service_with_folder(fs: &MemoryFileSystem) -> LanguageService {
    let service = LanguageService::new(Arc::new(fs.clone()));
    service.set_workspace_folders(vec![url("file:///work")]);
    service
}

fn result_ids(entries: &[telescope_service::WorkspaceReportEntry]) -> HashMap<Url, String> {
    entries
        .iter()
        .map(|entry| (entry.uri.clone(), entry.result_id.clone()))
        .collect()
}

const CLEAN_ROOT: &str = "\
openapi: 3.1.0
info:
  title: t
  version: \"1\"
";

#[tokio::test]
async fn parse_and_classify_a_minimal_root() {
    let fs = MemoryFileSystem::new();
    let service = service_with_folder(&fs);
    let uri = url("file:///work/a.yaml");

    let outcome = service.update_document(&uri, CLEAN_ROOT, "yaml", Some(1));
    assert!(matches!(
        outcome,
        UpdateOutcome::Updated {
            doc_type: DocumentType::Root
        }
    ));

    let cancel = CancellationToken::new();
    let report = service
        .compute_document_diagnostics(&uri, None, &cancel)
        .await
        .unwrap();
    match report {
        DocumentReport::Full { items, .. } => assert!(items.is_empty()),
        DocumentReport::Unchanged { .. } => panic!("first query must be full"),
    }
}

#[tokio::test]
async fn external_refs_are_discovered_through_the_scan() {
    let fs = MemoryFileSystem::new();
    fs.write(
        &url("file:///work/main.yaml"),
        "openapi: 3.1.0\ninfo:\n  title: t\n  version: \"1\"\npaths:\n  /p:\n    $ref: './sub.yaml#/x'\n",
    );
    fs.write(&url("file:///work/sub.yaml"), "x: 1\n");
    let service = service_with_folder(&fs);

    let cancel = CancellationToken::new();
    let entries = service
        .compute_workspace_diagnostics(&HashMap::new(), &cancel)
        .await
        .unwrap();

    // The scan found the root and pulled its fragment into the project.
    let uris: Vec<_> = entries.iter().map(|entry| entry.uri.as_str()).collect();
    assert!(uris.contains(&"file:///work/main.yaml"));
    assert!(uris.contains(&"file:///work/sub.yaml"));
}

#[tokio::test]
async fn result_ids_are_reused_until_content_changes() {
    let fs = MemoryFileSystem::new();
    let service = service_with_folder(&fs);
    let uri = url("file:///work/a.yaml");
    service.update_document(&uri, CLEAN_ROOT, "yaml", Some(1));

    let cancel = CancellationToken::new();
    let first = service
        .compute_document_diagnostics(&uri, None, &cancel)
        .await
        .unwrap();
    let DocumentReport::Full { result_id: r1, .. } = first else {
        panic!("first query must be full");
    };

    let second = service
        .compute_document_diagnostics(&uri, Some(&r1), &cancel)
        .await
        .unwrap();
    match second {
        DocumentReport::Unchanged { result_id } => assert_eq!(result_id, r1),
        DocumentReport::Full { .. } => panic!("unchanged content must reuse the result id"),
    }

    // A content change produces a fresh id.
    service.update_document(
        &uri,
        "openapi: 3.1.0\ninfo:\n  title: t2\n  version: \"1\"\n",
        "yaml",
        Some(2),
    );
    let third = service
        .compute_document_diagnostics(&uri, Some(&r1), &cancel)
        .await
        .unwrap();
    match third {
        DocumentReport::Full { result_id, .. } => assert_ne!(result_id, r1),
        DocumentReport::Unchanged { .. } => panic!("changed content must be full"),
    }
}

#[tokio::test]
async fn editing_a_fragment_invalidates_its_root_but_not_others() {
    let fs = MemoryFileSystem::new();
    let main = url("file:///work/main.yaml");
    let sub = url("file:///work/sub.yaml");
    let other = url("file:///work/other.yaml");
    fs.write(
        &main,
        "openapi: 3.1.0\ninfo:\n  title: t\n  version: \"1\"\npaths:\n  /p:\n    $ref: './sub.yaml#/x'\n",
    );
    fs.write(&sub, "x: 1\n");
    fs.write(&other, CLEAN_ROOT);
    let service = service_with_folder(&fs);

    let cancel = CancellationToken::new();
    let first = service
        .compute_workspace_diagnostics(&HashMap::new(), &cancel)
        .await
        .unwrap();
    let previous = result_ids(&first);
    assert!(previous.contains_key(&main));
    assert!(previous.contains_key(&sub));
    assert!(previous.contains_key(&other));

    // Unchanged inputs: everything reconciles to Unchanged.
    let repeat = service
        .compute_workspace_diagnostics(&previous, &cancel)
        .await
        .unwrap();
    assert!(repeat
        .iter()
        .all(|entry| entry.kind == ReportKind::Unchanged));

    // Edit the fragment: its root and itself turn Full with new ids.
    service.update_document(&sub, "x: 2\n", "yaml", None);
    let after = service
        .compute_workspace_diagnostics(&previous, &cancel)
        .await
        .unwrap();

    let kind_of = |uri: &Url| {
        after
            .iter()
            .find(|entry| &entry.uri == uri)
            .map(|entry| entry.kind)
            .unwrap()
    };
    assert_eq!(kind_of(&main), ReportKind::Full);
    assert_eq!(kind_of(&sub), ReportKind::Full);
    assert_eq!(kind_of(&other), ReportKind::Unchanged);

    let id_of = |uri: &Url| {
        after
            .iter()
            .find(|entry| &entry.uri == uri)
            .map(|entry| entry.result_id.clone())
            .unwrap()
    };
    assert_ne!(Some(&id_of(&main)), previous.get(&main));
    assert_ne!(Some(&id_of(&sub)), previous.get(&sub));
    assert_eq!(Some(&id_of(&other)), previous.get(&other));
}

#[tokio::test]
async fn duplicate_operation_ids_surface_in_workspace_reports() {
    let fs = MemoryFileSystem::new();
    let a = url("file:///work/a.yaml");
    let b = url("file:///work/b.yaml");
    fs.write(
        &a,
        "openapi: 3.1.0\ninfo:\n  title: a\n  version: \"1\"\npaths:\n  /a:\n    get:\n      operationId: op\n      responses:\n        \"200\":\n          description: ok\n",
    );
    fs.write(
        &b,
        "openapi: 3.1.0\ninfo:\n  title: b\n  version: \"1\"\npaths:\n  /b:\n    get:\n      operationId: op\n      responses:\n        \"200\":\n          description: ok\n",
    );
    let service = service_with_folder(&fs);

    let cancel = CancellationToken::new();
    let entries = service
        .compute_workspace_diagnostics(&HashMap::new(), &cancel)
        .await
        .unwrap();

    let mut duplicate_count = 0;
    for entry in &entries {
        let Some(items) = &entry.items else { continue };
        for diagnostic in items {
            if diagnostic.code == "operationid-unique" {
                duplicate_count += 1;
                assert!(diagnostic.message.contains("op"));
                assert_eq!(diagnostic.related_information.len(), 1);
            }
        }
    }
    assert_eq!(duplicate_count, 2);
}

#[tokio::test]
async fn watcher_events_feed_the_next_query() {
    let fs = MemoryFileSystem::new();
    let service = service_with_folder(&fs);
    let cancel = CancellationToken::new();

    // First query scans an empty workspace.
    let empty = service
        .compute_workspace_diagnostics(&HashMap::new(), &cancel)
        .await
        .unwrap();
    assert!(empty.is_empty());

    // A root appears on disk; the watcher queues it for the next query.
    fs.write(&url("file:///work/new.yaml"), CLEAN_ROOT);
    let entries = service
        .compute_workspace_diagnostics(&HashMap::new(), &cancel)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].uri.as_str(), "file:///work/new.yaml");
}

#[tokio::test]
async fn cancellation_discards_partial_work() {
    let fs = MemoryFileSystem::new();
    let service = service_with_folder(&fs);
    let uri = url("file:///work/a.yaml");
    service.update_document(&uri, CLEAN_ROOT, "yaml", None);

    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(service
        .compute_document_diagnostics(&uri, None, &cancel)
        .await
        .is_err());
    assert!(service
        .compute_workspace_diagnostics(&HashMap::new(), &cancel)
        .await
        .is_err());
}

#[tokio::test]
async fn config_changes_are_signature_gated() {
    let fs = MemoryFileSystem::new();
    let service = service_with_folder(&fs);

    // Identical config: no change.
    assert!(!service.set_config(TelescopeConfig::default()));
    // A different ruleset changes the signature.
    assert!(service.load_config_text("openapi:\n  base: ['minimal']\n"));
    // Reloading the same text is a no-op again.
    assert!(!service.load_config_text("openapi:\n  base: ['minimal']\n"));
    // Malformed config falls back to defaults.
    assert!(service.load_config_text("openapi: [broken"));
}

#[tokio::test]
async fn out_of_scope_documents_get_empty_reports() {
    let fs = MemoryFileSystem::new();
    let service = service_with_folder(&fs);
    service.load_config_text("openapi:\n  patterns: ['api/**/*.yaml']\n");

    let outside = url("file:///work/docs/readme.yaml");
    service.update_document(&outside, CLEAN_ROOT, "yaml", None);

    let cancel = CancellationToken::new();
    let report = service
        .compute_document_diagnostics(&outside, None, &cancel)
        .await
        .unwrap();
    match report {
        DocumentReport::Full { items, .. } => assert!(items.is_empty()),
        DocumentReport::Unchanged { .. } => panic!("scope miss must be a full empty report"),
    }
}
