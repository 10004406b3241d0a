//! Application state: the view controller, the sync task, and the loop that
//! multiplexes terminal input with sync events.

use std::sync::Arc;

use arbor_sync::{
    ClientConfig, CurrentDocument, DocumentId, DocumentView, HttpDocumentService, Path, SyncClient,
    SyncEvent,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::input::{self, ImportSource, Input};
use crate::sink::TerminalSink;

pub struct AppState {
    view: DocumentView<HttpDocumentService>,
    client: SyncClient,
    events: mpsc::Receiver<SyncEvent>,
}

enum Wake {
    Line(std::io::Result<Option<String>>),
    Event(Option<SyncEvent>),
}

impl AppState {
    /// Must be called inside a tokio runtime.
    pub fn init(config: &ClientConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let current = CurrentDocument::new();
        let service = Arc::new(HttpDocumentService::new(config)?);
        let view = DocumentView::new(service, current.clone(), Arc::new(TerminalSink));

        let mut client = SyncClient::spawn(config, &current);
        let events = client.take_event_rx().ok_or("sync event receiver already taken")?;

        Ok(Self { view, client, events })
    }

    pub async fn run(mut self, open: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(doc_id) = open {
            self.view.load(DocumentId::from(doc_id), Path::root()).await;
        } else {
            println!("{}", input::HELP);
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let wake = tokio::select! {
                line = lines.next_line() => Wake::Line(line),
                event = self.events.recv() => Wake::Event(event),
            };

            match wake {
                Wake::Line(line) => {
                    let Some(line) = line? else { break };
                    match input::parse(&line) {
                        Ok(Some(Input::Quit)) => break,
                        Ok(Some(command)) => self.dispatch(command).await,
                        Ok(None) => {}
                        Err(msg) => eprintln!("{msg}"),
                    }
                }
                Wake::Event(Some(event)) => self.on_sync_event(event),
                Wake::Event(None) => {
                    log::warn!("Sync task ended");
                    break;
                }
            }
        }

        self.client.shutdown().await;
        Ok(())
    }

    fn on_sync_event(&self, event: SyncEvent) {
        match event {
            SyncEvent::Connected => println!("[online]"),
            SyncEvent::Disconnected => println!("[offline, reconnecting]"),
            SyncEvent::DocumentUpdated { doc_id, action } => {
                log::info!("Document {doc_id} changed ({action}), refreshing");
                let view = self.view.clone();
                tokio::spawn(async move {
                    view.refresh().await;
                });
            }
        }
    }

    async fn dispatch(&self, command: Input) {
        let view = &self.view;
        match command {
            Input::List => match view.documents().await {
                Ok(ids) if ids.is_empty() => println!("no documents"),
                Ok(ids) => {
                    for id in ids {
                        println!("{id}");
                    }
                }
                Err(e) => eprintln!("list: {e}"),
            },
            Input::New => match view.create().await {
                Ok(id) => println!("created {id}"),
                Err(e) => eprintln!("new: {e}"),
            },
            Input::Open { doc_id, path } => {
                view.load(DocumentId::from(doc_id), path).await;
            }
            Input::Refresh => {
                if view.refresh().await.is_none() {
                    eprintln!("no document selected");
                }
            }
            Input::Insert { path, payload } => {
                if let Err(e) = view.insert(path, payload).await {
                    eprintln!("insert: {e}");
                }
            }
            Input::Quick { path, raw } => {
                if let Err(e) = view.quick_insert(path, &raw).await {
                    eprintln!("insert: {e}");
                }
            }
            Input::Embed { path, doc_id } => {
                if let Err(e) = view.insert_document(path, DocumentId::from(doc_id)).await {
                    eprintln!("embed: {e}");
                }
            }
            Input::Delete { path } => {
                if let Err(e) = view.delete(path).await {
                    eprintln!("delete: {e}");
                }
            }
            Input::Drop => match view.delete_document().await {
                Ok(response) => println!("{response}"),
                Err(e) => eprintln!("drop: {e}"),
            },
            Input::Parent => match view.parent().await {
                Ok(parent) => println!("{parent}"),
                Err(e) => eprintln!("parent: {e}"),
            },
            Input::Search(query) => match view.search(&query).await {
                Ok(results) if results.is_empty() => println!("no matches"),
                Ok(results) => {
                    for result in results {
                        println!("{result}");
                    }
                }
                Err(e) => eprintln!("search: {e}"),
            },
            Input::Import(source) => {
                let raw = match source {
                    ImportSource::Inline(raw) => raw,
                    ImportSource::File(file) => match tokio::fs::read_to_string(&file).await {
                        Ok(raw) => raw,
                        Err(e) => {
                            eprintln!("import: {file}: {e}");
                            return;
                        }
                    },
                };
                match view.import_str(&raw).await {
                    Ok(id) => println!("imported {id}"),
                    Err(e) => eprintln!("import: {e}"),
                }
            }
            Input::Status => {
                let doc = view
                    .current()
                    .map_or_else(|| "none".to_owned(), |id| id.to_string());
                println!(
                    "channel {:?} ({}), document {doc}, path /{}",
                    self.client.connection_state(),
                    self.client.ws_url(),
                    view.view_path().await
                );
            }
            Input::Help => println!("{}", input::HELP),
            Input::Quit => {}
        }
    }
}
