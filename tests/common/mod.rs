#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use sheet_ingest::{
    migration::{MigrationDefinition, MigrationGroup},
    request::Request,
    store::MigrationStore,
    yaml_provider,
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a single-sheet workbook. Cells that parse as numbers are stored
    /// as numeric cells, empty strings are left blank.
    pub fn write_workbook(&self, name: &str, sheet: &str, rows: &[&[&str]]) -> PathBuf {
        self.write_workbook_sheets(name, &[(sheet, rows)])
    }

    /// Writes a workbook with one worksheet per `(name, rows)` entry, in order.
    pub fn write_workbook_sheets(&self, name: &str, sheets: &[(&str, &[&[&str]])]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut workbook = Workbook::new();
        for (sheet, rows) in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(*sheet).expect("sheet name");
            for (r, row) in rows.iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    if cell.is_empty() {
                        continue;
                    }
                    match cell.parse::<f64>() {
                        Ok(number) => worksheet
                            .write_number(r as u32, c as u16, number)
                            .expect("write number"),
                        Err(_) => worksheet
                            .write_string(r as u32, c as u16, *cell)
                            .expect("write string"),
                    };
                }
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }
}

/// The `isi` template group: `isi_node` and `isi_file` (which looks up nodes)
/// plus `shared_term`, a migration of another group both may reference.
pub fn seed_templates(store: &dyn MigrationStore) {
    let group: MigrationGroup = yaml_provider::from_str(
        r#"
id: isi
label: Islandora spreadsheet ingest
description: Template migrations
source_type: Spreadsheet
shared_configuration:
  source:
    plugin: spreadsheet
    header_row: 0
    row_index_column: row
    keys:
      row:
        type: integer
"#,
    )
    .expect("template group");
    store.save_group(&group).expect("save template group");

    for document in [
        r#"
id: isi_node
label: Nodes
migration_group: isi
uuid: 6f1c2f0e
source:
  plugin: spreadsheet
process:
  title: title
  type:
    plugin: default_value
    default_value: islandora_object
destination:
  plugin: entity:node
migration_dependencies:
  required: [shared_term]
  optional: []
"#,
        r#"
id: isi_file
label: Files
migration_group: isi
source:
  plugin: spreadsheet
process:
  uri: file
  node:
    - plugin: migration_lookup
      migration: [isi_node, shared_term]
      source: node_ref
      source_ids:
        isi_node: [node_ref]
destination:
  plugin: entity:file
migration_dependencies:
  required: [isi_node, shared_term]
"#,
        r#"
id: shared_term
label: Terms
migration_group: taxonomy
destination:
  plugin: entity:taxonomy_term
"#,
    ] {
        let migration: MigrationDefinition =
            yaml_provider::from_str(document).expect("template migration");
        store.save(&migration).expect("save template migration");
    }
}

/// An active request mapping both template migrations.
pub fn active_request() -> Request {
    yaml_provider::from_str(
        r#"
id: batch
label: First batch
sheet:
  file: [/data/batch.xlsx]
  sheet: Items
originalMapping: "migration_group:isi"
active: true
mappings:
  isi_node:
    original_migration_id: isi_node
    mappings:
      title:
        pipeline: Title
      parent:
        pipeline:
          - plugin: migration_lookup
            migration: isi_node
            source: Parent
  isi_file:
    original_migration_id: isi_file
    mappings:
      uri:
        pipeline:
          - source: File
          - plugin: callback
            callable: trim
            source: "@uri"
      node:
        pipeline:
          plugin: migration_lookup
          migration: [isi_node, shared_term]
          source: Parent
          source_ids:
            isi_node: [Parent]
"#,
    )
    .expect("request")
}
