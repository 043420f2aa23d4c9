//! Shared fixtures for integration tests

#![allow(dead_code)]

use chapter_feed::{Config, TaskId, TaskState, TaskStatus};
use chapter_feed::ChapterService;
use lopdf::{Document, Object, Stream, StringFormat, dictionary};
use std::path::Path;
use std::time::Duration;

/// Build a PDF with `pages` pages, each carrying one line of text, and an
/// outline of `(title, 1-indexed page)` bookmarks in the given order
pub fn pdf_with_outline(pages: usize, bookmarks: &[(&str, usize)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let page_ids: Vec<_> = (0..pages)
        .map(|n| {
            let content = format!("BT /F1 12 Tf 72 720 Td (Page {} text.) Tj ET", n + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            })
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::from(*id)).collect::<Vec<_>>(),
            "Count" => pages as i64,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };

    if !bookmarks.is_empty() {
        let outlines_id = doc.new_object_id();
        let item_ids: Vec<_> = bookmarks.iter().map(|_| doc.new_object_id()).collect();

        for (i, (title, page)) in bookmarks.iter().enumerate() {
            let mut item = dictionary! {
                "Title" => Object::String(title.as_bytes().to_vec(), StringFormat::Literal),
                "Parent" => outlines_id,
                "Dest" => vec![page_ids[page - 1].into(), "Fit".into()],
            };
            if i > 0 {
                item.set("Prev", item_ids[i - 1]);
            }
            if i + 1 < item_ids.len() {
                item.set("Next", item_ids[i + 1]);
            }
            doc.objects.insert(item_ids[i], Object::Dictionary(item));
        }

        doc.objects.insert(
            outlines_id,
            Object::Dictionary(dictionary! {
                "Type" => "Outlines",
                "First" => item_ids[0],
                "Last" => item_ids[item_ids.len() - 1],
                "Count" => item_ids.len() as i64,
            }),
        );
        catalog.set("Outlines", outlines_id);
    }

    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize fixture pdf");
    bytes
}

/// Config rooted in `dir` with fast retries
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.cache_dir = dir.join("cache");
    config.storage.database_path = dir.join("test.db");
    config.fetch.retry.max_attempts = 1;
    config.fetch.retry.initial_delay = Duration::from_millis(1);
    config.fetch.retry.jitter = false;
    config
}

/// Poll until `url`'s task leaves Processing
pub async fn wait_until_finished(service: &ChapterService, url: &str) -> TaskStatus {
    let id = TaskId::from_source(url);
    tokio::time::timeout(Duration::from_secs(20), async {
        loop {
            let status = service.status(&id).await.expect("status");
            if matches!(status.state, TaskState::Completed | TaskState::Failed) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("task did not finish in time")
}
