//! MediaWiki XML dump reader.
//!
//! Streams a `pages-articles` export (plain or bzip2 compressed) and drives a
//! `PageHandler`. Namespace names come from the dump's `siteinfo` section so
//! page titles can be split into namespace and title.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::{debug, info, warn};

use crate::consumer::page_collector::{PageHandler, PageSource, MAIN_NAMESPACE};
use crate::errors::PipelineError;

const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Streaming reader over a MediaWiki XML dump.
pub struct DumpReader {
    path: PathBuf,
    reader: Reader<Box<dyn BufRead + Send>>,
}

/// Per-page values that arrive in separate elements.
#[derive(Debug, Default)]
struct OpenPage {
    raw_title: Option<String>,
    namespace_key: Option<i64>,
    title_sent: bool,
}

impl DumpReader {
    /// Open a dump file. Files ending in `.bz2` are decompressed on the fly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;

        let is_bz2 = path.extension().is_some_and(|e| e == "bz2");
        let input: Box<dyn BufRead + Send> = if is_bz2 {
            Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, BzDecoder::new(file)))
        } else {
            Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file))
        };

        info!(path = %path.display(), compressed = is_bz2, "Opened dump");
        Ok(Self {
            path,
            reader: Reader::from_reader(input),
        })
    }

    /// Read from an in-memory or already opened source.
    pub fn from_reader(input: impl BufRead + Send + 'static) -> Self {
        Self {
            path: PathBuf::from("<memory>"),
            reader: Reader::from_reader(Box::new(input) as Box<dyn BufRead + Send>),
        }
    }

    fn parse(&mut self, handler: &mut dyn PageHandler) -> Result<u64, PipelineError> {
        let mut buf = Vec::with_capacity(8192);
        let mut text = String::new();
        let mut path: Vec<String> = Vec::new();
        let mut namespaces: HashMap<i64, String> = HashMap::new();
        let mut namespace_key: Option<i64> = None;
        let mut page: Option<OpenPage> = None;
        let mut pages = 0u64;

        loop {
            buf.clear();
            let event = self.reader.read_event_into(&mut buf).map_err(|e| {
                PipelineError::parse(format!(
                    "{} at byte {}: {}",
                    self.path.display(),
                    self.reader.buffer_position(),
                    e
                ))
            })?;

            match event {
                Event::Start(ref e) => {
                    let name = element_name(e);
                    text.clear();

                    match name.as_str() {
                        "page" => {
                            handler.on_page_start();
                            page = Some(OpenPage::default());
                        }
                        "namespace" => namespace_key = attribute_key(e),
                        _ => {}
                    }
                    path.push(name);
                }
                Event::Empty(ref e) => {
                    // Self-closing <namespace key="0" /> is the main namespace.
                    if element_name(e) == "namespace" {
                        if let Some(key) = attribute_key(e) {
                            namespaces.insert(key, String::new());
                        }
                    }
                }
                Event::Text(ref e) => {
                    text.push_str(&e.unescape()?);
                }
                Event::CData(ref e) => {
                    text.push_str(&String::from_utf8_lossy(e));
                }
                Event::End(_) => {
                    let name = path.pop().unwrap_or_default();
                    let parent = path.last().map(String::as_str).unwrap_or_default();

                    match (parent, name.as_str()) {
                        ("namespaces", "namespace") => {
                            if let Some(key) = namespace_key.take() {
                                namespaces.insert(key, text.trim().to_string());
                            }
                        }
                        ("page", "title") => {
                            if let Some(ref mut open) = page {
                                open.raw_title = Some(text.clone());
                            }
                        }
                        ("page", "ns") => {
                            if let Some(ref mut open) = page {
                                open.namespace_key = text.trim().parse().ok();
                                send_title(handler, open, &namespaces);
                            }
                        }
                        ("page", "id") => {
                            if let Ok(id) = text.trim().parse() {
                                handler.set_page_id(id);
                            }
                        }
                        ("revision", "id") => {
                            if let Ok(id) = text.trim().parse() {
                                handler.set_revision(id);
                            }
                        }
                        ("revision", "timestamp") => handler.set_timestamp(text.trim()),
                        ("contributor", "username") => handler.set_author(text.trim()),
                        ("revision", "text") => handler.set_text(&text),
                        (_, "page") => {
                            if let Some(mut open) = page.take() {
                                send_title(handler, &mut open, &namespaces);
                            }
                            handler.on_page_end()?;
                            pages += 1;
                        }
                        (_, "siteinfo") => {
                            debug!(namespaces = namespaces.len(), "Read site info");
                        }
                        _ => {}
                    }
                    text.clear();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(pages)
    }
}

impl PageSource for DumpReader {
    fn read(mut self, handler: &mut dyn PageHandler) -> Result<(), PipelineError> {
        let result = self.parse(handler);
        handler.on_close();

        match result {
            Ok(pages) => {
                info!(pages, path = %self.path.display(), "Finished reading dump");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Dump reading stopped");
                Err(e)
            }
        }
    }
}

/// Report the title of an open page once, resolving its namespace.
///
/// Titles in the dump carry their namespace prefix (`Talk:apple`); the handler
/// receives the bare title and the namespace name.
fn send_title(handler: &mut dyn PageHandler, page: &mut OpenPage, namespaces: &HashMap<i64, String>) {
    if page.title_sent {
        return;
    }
    let Some(raw_title) = page.raw_title.as_deref() else {
        return;
    };

    let namespace = page
        .namespace_key
        .and_then(|key| namespaces.get(&key))
        .cloned()
        .or_else(|| namespace_from_prefix(raw_title, namespaces))
        .unwrap_or_default();

    let title = if namespace.is_empty() {
        raw_title
    } else {
        raw_title
            .strip_prefix(namespace.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(raw_title)
    };

    let namespace = if namespace.is_empty() {
        MAIN_NAMESPACE
    } else {
        namespace.as_str()
    };

    handler.set_title(title, namespace);
    page.title_sent = true;
}

/// Guess the namespace of a title from its prefix when the dump has no `<ns>` element.
fn namespace_from_prefix(title: &str, namespaces: &HashMap<i64, String>) -> Option<String> {
    let (prefix, _) = title.split_once(':')?;
    namespaces
        .values()
        .find(|name| !name.is_empty() && name.as_str() == prefix)
        .cloned()
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attribute_key(e: &BytesStart<'_>) -> Option<i64> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"key")
        .and_then(|attr| String::from_utf8_lossy(&attr.value).trim().parse().ok())
}
