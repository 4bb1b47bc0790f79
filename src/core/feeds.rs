use atom_syndication::{Entry, Feed, Link, Text};
use chrono::{FixedOffset, Offset, Utc};
use rss::{Channel, Guid, Item};

use crate::models::config::Config;
use crate::models::Post;

/// 订阅源中的文章数量
pub const FEED_SIZE: usize = 20;

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// 生成 RSS 2.0
pub fn rss_feed(config: &Config, posts: &[Post]) -> String {
    let mut channel = Channel::default();
    channel.set_title(config.title.clone());
    channel.set_link(config.absolute_url("/blog/"));
    channel.set_description(config.description.clone().unwrap_or_default());

    for post in posts.iter().take(FEED_SIZE) {
        let link = config.absolute_url(&post.url());
        let mut item = Item::default();
        item.set_title(post.title.clone());
        item.set_link(link.clone());
        item.set_guid(Guid {
            value: link,
            permalink: true,
        });
        if let Some(published) = post.publication.published_at {
            item.set_pub_date(published.to_rfc2822());
        }
        item.set_author(post.author.display_name.clone());
        item.set_description(post.excerpt.clone());
        channel.items.push(item);
    }

    channel.to_string()
}

/// 生成 Atom
pub fn atom_feed(config: &Config, posts: &[Post]) -> String {
    let offset = utc_offset();
    let mut feed = Feed::default();
    feed.set_title(config.title.clone());
    feed.set_id(config.absolute_url("/blog/"));
    if let Some(subtitle) = &config.subtitle {
        feed.set_subtitle(Text::plain(subtitle.clone()));
    }
    let updated = posts
        .iter()
        .map(|p| p.updated_at)
        .max()
        .unwrap_or_else(Utc::now);
    feed.set_updated(updated.with_timezone(&offset));

    let mut self_link = Link::default();
    self_link.set_href(config.absolute_url("/blog/feed.atom"));
    self_link.set_rel("self".to_string());
    feed.set_links(vec![self_link]);

    for post in posts.iter().take(FEED_SIZE) {
        let url = config.absolute_url(&post.url());
        let mut entry = Entry::default();
        entry.set_id(url.clone());
        entry.set_title(Text::plain(post.title.clone()));

        let mut link = Link::default();
        link.set_href(url);
        link.set_rel("alternate".to_string());
        entry.set_links(vec![link]);

        entry.set_updated(post.updated_at.with_timezone(&offset));
        entry.set_published(post.publication.published_at.map(|d| d.with_timezone(&offset)));
        entry.set_summary(Some(Text::plain(post.excerpt.clone())));
        feed.entries.push(entry);
    }

    feed.to_string()
}
