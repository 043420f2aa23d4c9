//! RSS rendering of a completed chapter list
//!
//! Each chapter becomes one item whose link points at the sub-document
//! endpoint for its page range.

use crate::config::FeedConfig;
use crate::types::ChapterRecord;
use rss::{Channel, Guid, Item};

/// Content type of rendered feeds
pub const RSS_CONTENT_TYPE: &str = "application/rss+xml";

/// Link to the sub-document endpoint for one chapter
///
/// `base_url` is the public root of the service; a trailing slash is optional.
pub fn chapter_link(base_url: &str, file: &str, chapter: &ChapterRecord) -> String {
    format!(
        "{}/pdf-chapter?file={}&start_page={}&end_page={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(file),
        chapter.start_page,
        chapter.end_page
    )
}

/// Renders chapter lists as RSS 2.0 channels
#[derive(Clone, Debug)]
pub struct FeedRenderer {
    title: String,
    description: String,
}

impl FeedRenderer {
    /// Create a renderer using the configured channel metadata
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            title: config.title.clone(),
            description: config.description.clone(),
        }
    }

    /// Build the channel for a source document
    ///
    /// `file` is the cached document name the chapter links refer to.
    pub fn channel(
        &self,
        source_url: &str,
        base_url: &str,
        file: &str,
        chapters: &[ChapterRecord],
    ) -> Channel {
        let items = chapters
            .iter()
            .map(|chapter| {
                let link = chapter_link(base_url, file, chapter);

                let mut guid = Guid::default();
                guid.set_value(link.clone());
                guid.set_permalink(true);

                let mut item = Item::default();
                item.set_title(chapter.title.clone());
                item.set_link(link);
                item.set_description(chapter.description.clone());
                item.set_guid(guid);
                item
            })
            .collect::<Vec<_>>();

        let mut channel = Channel::default();
        channel.set_title(self.title.clone());
        channel.set_link(source_url);
        channel.set_description(self.description.clone());
        channel.set_generator(format!("chapter-feed {}", env!("CARGO_PKG_VERSION")));
        channel.set_items(items);
        channel
    }

    /// Render the channel as an XML string
    pub fn render(
        &self,
        source_url: &str,
        base_url: &str,
        file: &str,
        chapters: &[ChapterRecord],
    ) -> String {
        self.channel(source_url, base_url, file, chapters).to_string()
    }
}
