//! Line commands.

use arbor_sync::{InsertPayload, Path};

pub const HELP: &str = "\
commands:
  list                      list documents
  new                       create a document and open it
  open <id> [path]          open a document at a path
  refresh                   reload the current view
  insert <path> <text|json> insert text, or a JSON node
  quick <path> <element|text>
                            insert an element by name, or text
  embed <path> <id>         insert another document under a node
  delete [path]             delete a node (the whole tree without a path)
  drop                      delete the current document
  parent                    show the document embedding this one
  search <query>            search the current document
  import <json|@file>       import a JSON tree as a new document
  status                    connection and selection
  help
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    List,
    New,
    Open { doc_id: String, path: Path },
    Refresh,
    Insert { path: Path, payload: InsertPayload },
    Quick { path: Path, raw: String },
    Embed { path: Path, doc_id: String },
    Delete { path: Path },
    Drop,
    Parent,
    Search(String),
    Import(ImportSource),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    Inline(String),
    File(String),
}

/// Parse one line. Blank lines are `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (command, rest) = split_word(line);

    let input = match command {
        "list" | "ls" => Input::List,
        "new" => Input::New,
        "open" => {
            let (doc_id, rest) = split_word(rest);
            if doc_id.is_empty() {
                return Err("usage: open <id> [path]".into());
            }
            Input::Open {
                doc_id: doc_id.to_owned(),
                path: parse_path(rest)?,
            }
        }
        "refresh" => Input::Refresh,
        "insert" => {
            let (path, value) = split_word(rest);
            if value.is_empty() {
                return Err("usage: insert <path> <text|json>".into());
            }
            Input::Insert {
                path: parse_path(path)?,
                payload: InsertPayload::parse_input(value),
            }
        }
        "quick" => {
            let (path, raw) = split_word(rest);
            if raw.is_empty() {
                return Err("usage: quick <path> <element|text>".into());
            }
            Input::Quick {
                path: parse_path(path)?,
                raw: raw.to_owned(),
            }
        }
        "embed" => {
            let (path, doc_id) = split_word(rest);
            if doc_id.is_empty() || doc_id.contains(char::is_whitespace) {
                return Err("usage: embed <path> <id>".into());
            }
            Input::Embed {
                path: parse_path(path)?,
                doc_id: doc_id.to_owned(),
            }
        }
        "drop" => Input::Drop,
        "parent" => Input::Parent,
        "delete" | "rm" => Input::Delete {
            path: parse_path(rest)?,
        },
        "search" => Input::Search(rest.to_owned()),
        "import" => match rest.strip_prefix('@') {
            Some(file) if !file.is_empty() => Input::Import(ImportSource::File(file.to_owned())),
            _ if rest.is_empty() => return Err("usage: import <json|@file>".into()),
            _ => Input::Import(ImportSource::Inline(rest.to_owned())),
        },
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("unknown command {other:?}, try help")),
    };
    Ok(Some(input))
}

fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

fn parse_path(raw: &str) -> Result<Path, String> {
    raw.parse().map_err(|e: arbor_sync::ValidationError| e.to_string())
}
