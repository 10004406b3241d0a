use arbor_sync::{DocumentId, Path, SyncError, ViewSink};
use serde_json::Value;

/// Prints load results to the terminal.
pub struct TerminalSink;

impl ViewSink for TerminalSink {
    fn rendered(&self, doc_id: &DocumentId, path: &Path, result: Result<String, SyncError>) {
        match result {
            Ok(markup) => println!("── {doc_id} /{path} ──\n{markup}"),
            Err(e) => eprintln!("render {doc_id} /{path}: {e}"),
        }
    }

    fn structured(&self, doc_id: &DocumentId, path: &Path, result: Result<Value, SyncError>) {
        match result {
            Ok(tree) => match serde_json::to_string_pretty(&tree) {
                Ok(pretty) => println!("{pretty}"),
                Err(_) => println!("{tree}"),
            },
            Err(e) => eprintln!("tree {doc_id} /{path}: {e}"),
        }
    }
}
