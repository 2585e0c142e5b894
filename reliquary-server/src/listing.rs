// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! HTML rendering for directory listing pages.

Path segments are restricted to a safe character set by the path arbiter,
so entry names can be interpolated without further escaping.
*/

use axum::response::Html;
use chrono::Utc;

/// One entry on a directory listing page.
#[derive(Clone, Debug)]
pub struct ListingItem {
    pub url: String,
    pub text: String,
    pub cls: &'static str,
}

impl ListingItem {
    pub fn folder(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            cls: "folder",
        }
    }

    pub fn file(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            cls: "file",
        }
    }
}

/// Render a directory listing page in the style of the Debian archive
/// browser.
pub fn directory_listing(page_title: &str, items: &[ListingItem], show_updir: bool) -> Html<String> {
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html>\n<head><title>");
    out.push_str(page_title);
    out.push_str("</title></head>\n<body>\n<h1>");
    out.push_str(page_title);
    out.push_str("</h1>\n<hr/>\n<ul>\n");

    if show_updir {
        out.push_str("<li class=\"updir\"><a href=\"../\">../</a></li>\n");
    }

    for item in items {
        out.push_str(&format!(
            "<li class=\"{}\"><a href=\"{}\">{}</a></li>\n",
            item.cls, item.url, item.text
        ));
    }

    out.push_str("</ul>\n<hr/>\n<small>generated ");
    out.push_str(&Utc::now().format("%Y-%m-%d %H:%M:%S").to_string());
    out.push_str("</small>\n</body>\n</html>\n");

    Html(out)
}

/// Render an nginx-autoindex-compatible page from preformatted lines.
pub fn autoindex_page(display_path: &str, lines: &[String]) -> Html<String> {
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html>\n<head><title>Index of ");
    out.push_str(display_path);
    out.push_str("</title></head>\n<body>\n<h1>Index of ");
    out.push_str(display_path);
    out.push_str("</h1>\n<hr/><pre><a href=\"../\">../</a>\n");

    for line in lines {
        out.push_str(line);
        out.push('\n');
    }

    out.push_str("</pre><hr/>\n</body>\n</html>\n");

    Html(out)
}

/// Render a PEP-503 simple index page from anchor lines.
pub fn simple_page(lines: &[String]) -> Html<String> {
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html>\n<head><title>Simple Index</title></head>\n<body>\n");

    for line in lines {
        out.push_str(line);
        out.push('\n');
    }

    out.push_str("</body>\n</html>\n");

    Html(out)
}
