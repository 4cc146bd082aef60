use crate::config::SiteSettings;
use crate::models::Post;
use crate::parser;
use chrono::{NaiveDate, TimeZone, Utc};
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};

const FEED_ITEMS: usize = 15;

/// `2025-03-14` → RFC 2822 at midnight UTC. Unparsable dates get no
/// `pubDate` so the feed never depends on the build time.
fn format_rss_date(date_str: &str) -> Option<String> {
    let day = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?).to_rfc2822())
}

/// Feed of the newest posts. `posts` must already be sorted newest first.
pub fn generate_rss(posts: &[Post], settings: &SiteSettings, base_url: &str) -> String {
    let items: Vec<_> = posts
        .iter()
        .take(FEED_ITEMS)
        .map(|p| {
            let link = format!("{}/blog/{}.html", base_url, p.slug);
            ItemBuilder::default()
                .title(Some(p.title.clone()))
                .link(Some(link.clone()))
                .guid(Some(GuidBuilder::default().value(link).permalink(true).build()))
                .description(Some(parser::strip_markdown(&p.body).chars().take(500).collect()))
                .pub_date(format_rss_date(&p.date))
                .build()
        })
        .collect();

    ChannelBuilder::default()
        .title(settings.site_name.clone())
        .link(format!("{}/", base_url))
        .description(settings.meta_description.clone())
        .items(items)
        .build()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn post(slug: &str, date: &str) -> Post {
        Post {
            slug: slug.into(),
            title: format!("About {slug}"),
            date: date.into(),
            body: "Some **bold** news.".into(),
            source: PathBuf::from(format!("{slug}.txt")),
        }
    }

    #[test]
    fn feed_has_absolute_links_and_dates() {
        let settings = SiteSettings::default();
        let xml = generate_rss(&[post("kickoff", "2025-03-14")], &settings, "https://alife.example");
        assert!(xml.contains("<link>https://alife.example/blog/kickoff.html</link>"));
        assert!(xml.contains("<pubDate>Fri, 14 Mar 2025 00:00:00 +0000</pubDate>"));
        assert!(xml.contains("<description><![CDATA[Some bold news.]]></description>"));
        assert!(xml.contains("<title>Artificial Life Institute</title>"));
    }

    #[test]
    fn undated_posts_have_no_pub_date() {
        let xml = generate_rss(&[post("draft", "soon")], &SiteSettings::default(), "https://a.example");
        assert!(!xml.contains("<pubDate>"));
    }
}
