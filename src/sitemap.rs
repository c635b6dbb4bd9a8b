//! Sitemap resolution.
//!
//! Turns a seed URL into the flat list of target URLs. Three formats are
//! auto-detected, in order: an XML sitemap index (`<sitemap><loc>`), an XML
//! URL set (`<url><loc>`), and line-delimited plain text. The first parser
//! that yields a non-empty list wins.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct SitemapIndex {
    #[serde(default, rename = "sitemap")]
    sitemaps: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct UrlSet {
    #[serde(default, rename = "url")]
    urls: Vec<Entry>,
}

/// One `<sitemap>` or `<url>` element. Optional children such as `lastmod`,
/// `changefreq`, and `priority` are ignored.
#[derive(Debug, Deserialize)]
struct Entry {
    loc: String,
}

pub struct SitemapResolver {
    client: Client,
}

impl SitemapResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetches the seed document and extracts its target URLs.
    ///
    /// The configured headers are applied verbatim; the client injects the
    /// default user agent when none is supplied. Anything other than a 200
    /// response fails resolution. Sitemap-index entries are returned as-is,
    /// without fetching the nested sitemaps.
    pub async fn resolve(
        &self,
        sitemap_url: &str,
        headers: &[(String, String)],
    ) -> Result<Vec<String>> {
        let mut request = self.client.get(sitemap_url);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|e| Error::SitemapFetch {
            url: sitemap_url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::SitemapFetch {
                url: sitemap_url.to_string(),
                reason: format!("unexpected status code: {}", status.as_u16()),
            });
        }

        let body = response.text().await.map_err(|e| Error::SitemapFetch {
            url: sitemap_url.to_string(),
            reason: e.to_string(),
        })?;

        parse_payload(&body)
    }
}

/// Tries the supported sitemap formats against a fetched body.
pub fn parse_payload(body: &str) -> Result<Vec<String>> {
    if let Ok(index) = quick_xml::de::from_str::<SitemapIndex>(body) {
        if !index.sitemaps.is_empty() {
            return Ok(index.sitemaps.into_iter().map(|e| e.loc).collect());
        }
    }

    if let Ok(set) = quick_xml::de::from_str::<UrlSet>(body) {
        if !set.urls.is_empty() {
            return Ok(set.urls.into_iter().map(|e| e.loc).collect());
        }
    }

    let urls: Vec<String> = body
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
        .map(str::to_string)
        .collect();

    if urls.is_empty() {
        return Err(Error::SitemapFormat);
    }
    Ok(urls)
}

/// Accepts absolute http(s) URLs with a non-empty host; everything else is
/// dropped before crawling.
pub fn is_valid_url(candidate: &str) -> bool {
    if candidate.is_empty() {
        return false;
    }

    match Url::parse(candidate) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_url_set() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
    <url>
        <loc>https://example.com/</loc>
        <lastmod>2024-01-01</lastmod>
        <changefreq>daily</changefreq>
        <priority>0.8</priority>
    </url>
    <url>
        <loc>https://example.com/about</loc>
    </url>
    <url>
        <loc>https://example.com/contact</loc>
    </url>
</urlset>"#;

        let urls = parse_payload(body).expect("urlset should parse");
        assert_eq!(
            urls,
            vec![
                "https://example.com/",
                "https://example.com/about",
                "https://example.com/contact",
            ]
        );
    }

    #[test]
    fn parses_sitemap_index() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
    <sitemap>
        <loc>https://example.com/sitemap-posts.xml</loc>
        <lastmod>2024-01-01</lastmod>
    </sitemap>
    <sitemap>
        <loc>https://example.com/sitemap-pages.xml</loc>
    </sitemap>
</sitemapindex>"#;

        let urls = parse_payload(body).expect("index should parse");
        assert_eq!(
            urls,
            vec![
                "https://example.com/sitemap-posts.xml",
                "https://example.com/sitemap-pages.xml",
            ]
        );
    }

    #[test]
    fn parses_plain_text() {
        let body = "https://example.com/\n  https://example.com/about  \n\nnot a url\nftp://example.com/file\nhttp://example.com/news\n";

        let urls = parse_payload(body).expect("plain text should parse");
        assert_eq!(
            urls,
            vec![
                "https://example.com/",
                "https://example.com/about",
                "http://example.com/news",
            ]
        );
    }

    #[test]
    fn url_set_length_matches_loc_count() {
        let mut body = String::from("<urlset>");
        for i in 0..50 {
            body.push_str(&format!("<url><loc>https://example.com/page{i}</loc></url>"));
        }
        body.push_str("</urlset>");

        let urls = parse_payload(&body).expect("urlset should parse");
        assert_eq!(urls.len(), 50);
    }

    #[test]
    fn empty_url_set_is_a_format_error() {
        let body = r#"<?xml version="1.0"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"></urlset>"#;
        assert!(matches!(parse_payload(body), Err(Error::SitemapFormat)));
    }

    #[test]
    fn unrecognized_payload_is_a_format_error() {
        assert!(matches!(
            parse_payload("<html><body>hello</body></html>"),
            Err(Error::SitemapFormat)
        ));
        assert!(matches!(parse_payload(""), Err(Error::SitemapFormat)));
    }

    #[test]
    fn index_takes_precedence_over_plain_text() {
        // An XML index whose body also happens to contain http lines must be
        // treated as an index.
        let body = r#"<sitemapindex>
<sitemap><loc>https://example.com/a.xml</loc></sitemap>
</sitemapindex>"#;

        let urls = parse_payload(body).expect("index should parse");
        assert_eq!(urls, vec!["https://example.com/a.xml"]);
    }

    #[test]
    fn validates_urls() {
        assert!(is_valid_url("https://example.com/"));
        assert!(is_valid_url("http://example.com/page?q=1"));

        assert!(!is_valid_url(""));
        assert!(!is_valid_url("/relative/path"));
        assert!(!is_valid_url("ftp://example.com/file"));
        assert!(!is_valid_url("example.com/no-scheme"));
        assert!(!is_valid_url("https://"));
    }
}
