use regex::Regex;
use reqwest::{Client, Url};
use std::time::Duration;

pub const PREDUS2_URL: &str = "https://honiglab.c2b2.columbia.edu/hfpd/html/predus.html";
pub const PREDUS2_RESULTS_URL: &str = "https://honiglab.c2b2.columbia.edu/hfpd/tmp/";
pub const PSIVER_URL: &str = "https://psiver.mizuguchilab.org/PSIVER/";
pub const PROMATE_URL: &str = "http://bioinfo41.weizmann.ac.il/promate-bin/processBSF.cgi";
pub const PREDICTPROTEIN_URL: &str = "https://predictprotein.org";
pub const PREDICTPROTEIN_API: &str = "https://predictprotein.org/api/ppc_fetch";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub fn build_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("cport/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
}

/// GETs `url` and returns the body, treating HTTP error statuses as errors.
pub async fn get_text(client: &Client, url: &str) -> Result<String, reqwest::Error> {
    client.get(url).send().await?.error_for_status()?.text().await
}

/// First capture group of `pattern` in `text`.
pub fn capture_first(pattern: &str, text: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .captures(text)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

/// Target of the first `<form>` on a page, if it declares one.
pub fn form_action(page: &str) -> Option<String> {
    capture_first(r#"(?is)<form[^>]*?action\s*=\s*["']([^"']*)["']"#, page)
        .filter(|action| !action.is_empty())
}

pub fn links(page: &str) -> Vec<String> {
    Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#)
        .map(|re| {
            re.captures_iter(page)
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Resolves a possibly relative `href` against the page it was found on.
pub fn resolve(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}

/// `url` with its last path segment removed, without the trailing slash.
pub fn parent_url(url: &str) -> &str {
    match url.rfind('/') {
        Some(i) => &url[..i],
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_action_reads_the_first_form() {
        let page = r#"<html><FORM method="post" ACTION="/cgi-bin/predus.cgi"><input name="pdbid"></form>
<form action="other.cgi"></form></html>"#;
        assert_eq!(form_action(page).as_deref(), Some("/cgi-bin/predus.cgi"));
        assert_eq!(form_action("<form method=\"post\"></form>"), None);
    }

    #[test]
    fn links_collects_every_href() {
        let page = r#"<a href="a.html">A</a> <a HREF='b/c.gz'>B</a>"#;
        assert_eq!(links(page), vec!["a.html", "b/c.gz"]);
    }

    #[test]
    fn resolve_handles_relative_and_absolute_links() {
        assert_eq!(
            resolve("https://host/dir/page.html", "result.txt"),
            "https://host/dir/result.txt"
        );
        assert_eq!(
            resolve("https://host/dir/page.html", "/top.txt"),
            "https://host/top.txt"
        );
        assert_eq!(
            resolve("https://host/dir/page.html", "https://other/x"),
            "https://other/x"
        );
    }

    #[test]
    fn parent_url_strips_last_segment() {
        assert_eq!(
            parent_url("http://host/promate/tmp/123/index.html"),
            "http://host/promate/tmp/123"
        );
    }
}
