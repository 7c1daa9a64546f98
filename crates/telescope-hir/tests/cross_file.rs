use std::collections::BTreeSet;

use telescope_hir::{uri, Workspace};
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

const MAIN: &str = "\
openapi: 3.1.0
info:
  title: Split spec
  version: \"1.0\"
paths:
  /pets:
    $ref: './paths/pets.yaml'
components:
  schemas:
    Error:
      $ref: '#/components/schemas/Problem'
    Problem:
      type: object
";

const PETS: &str = "\
get:
  operationId: listPets
  responses:
    \"200\":
      description: ok
      content:
        application/json:
          schema:
            $ref: '../models/pet.yaml#/Pet'
";

const PET_MODEL: &str = "\
Pet:
  type: object
  properties:
    name:
      type: string
";

fn split_workspace() -> (Workspace, Url, Url, Url) {
    let mut workspace = Workspace::default();
    let main = url("file:///work/main.yaml");
    let pets = url("file:///work/paths/pets.yaml");
    let model = url("file:///work/models/pet.yaml");

    workspace.update_document(&main, MAIN, "yaml", Some(1));
    workspace.update_document(&pets, PETS, "yaml", Some(1));
    workspace.update_document(&model, PET_MODEL, "yaml", Some(1));
    (workspace, main, pets, model)
}

#[test]
fn dependencies_follow_directory_relative_resolution() {
    let (workspace, main, pets, model) = split_workspace();

    assert_eq!(
        workspace.graph().dependencies_of(&main),
        BTreeSet::from([pets.clone()])
    );
    assert_eq!(
        workspace.graph().dependencies_of(&pets),
        BTreeSet::from([model.clone()])
    );
    assert_eq!(
        workspace.graph().dependents_of(&model),
        BTreeSet::from([pets.clone()])
    );
    assert_eq!(workspace.linked_uris(&main), vec![model, pets]);
}

/// Every recorded edge, when re-resolved from its origin, lands on the same
/// target document and pointer.
#[test]
fn edge_resolution_is_closed() {
    let (workspace, main, pets, model) = split_workspace();

    for doc in [&main, &pets, &model] {
        for edge in workspace.graph().edges_from(doc) {
            if edge.remote {
                continue;
            }
            let target = uri::resolve_reference(&edge.from_uri, &edge.raw_ref, None)
                .expect("recorded edge must re-resolve");
            assert_eq!(target.uri, edge.target_uri);
            assert_eq!(target.pointer, edge.target_pointer);

            let resolved = workspace
                .deref(doc, &edge.raw_ref)
                .expect("recorded edge must deref");
            assert_eq!(resolved.entry.uri().as_ref(), &edge.target_uri);
        }
    }
}

#[test]
fn fragment_documents_report_their_root() {
    let (workspace, main, pets, model) = split_workspace();

    assert!(workspace.is_root(&main));
    assert_eq!(workspace.roots_for(&model), BTreeSet::from([main.clone()]));
    assert_eq!(workspace.primary_root(&pets), Some(main.clone()));
    assert_eq!(workspace.project_members(&main), vec![main, model, pets]);
}

#[test]
fn operation_ids_are_indexed_across_fragments() {
    let (workspace, _, pets, _) = split_workspace();
    let occurrences = workspace.operation_ids().occurrences("listPets");
    assert_eq!(occurrences.len(), 1);
    assert_eq!(occurrences[0].uri.as_ref(), &pets);
    assert!(workspace.operation_ids().is_unique("listPets"));
}
