//! Server-rendered pages.

use crate::catalog::CatalogEntry;
use crate::flash::Notice;
use crate::image_folder::ALLOWED_EXTENSIONS;
use std::fmt::Write as _;
use url::Url;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0 auto; max-width: 960px; padding: 1rem; color: #222; }
header { display: flex; justify-content: space-between; align-items: center; }
a { color: #7a1f3d; }
.notice { padding: .75rem 1rem; border-radius: 4px; margin: 1rem 0; }
.notice-success { background: #e6f4ea; border: 1px solid #8bc79b; }
.notice-warning { background: #fff4e5; border: 1px solid #f0b35b; }
.search { display: flex; gap: .5rem; margin: 1rem 0; }
.search input { flex: 1; padding: .4rem; }
.saree { border-top: 1px solid #ddd; padding: 1rem 0; }
.images { display: flex; flex-wrap: wrap; gap: .5rem; }
.images img { width: 160px; height: 160px; object-fit: cover; border-radius: 4px; }
.muted { color: #777; }
form.add label { display: block; margin: 1rem 0 .25rem; font-weight: 600; }
form.add input[type=text] { width: 100%; padding: .4rem; }
"#;

const SCAN_SCRIPT: &str = r#"
document.getElementById('qr-input').addEventListener('change', async (event) => {
  const file = event.target.files[0];
  if (!file) return;
  const status = document.getElementById('qr-status');
  const body = new FormData();
  body.append('qr_image', file);
  status.textContent = 'Decoding...';
  try {
    const response = await fetch('/decode-qr', { method: 'POST', body });
    const data = await response.json();
    if (data.ok && data.results.length > 0) {
      document.getElementById('saree_id').value = data.results[0];
      status.textContent = 'Scanned: ' + data.results[0];
    } else {
      status.textContent = data.error || 'No QR code found';
    }
  } catch (err) {
    status.textContent = 'Scan failed: ' + err;
  }
  event.target.value = '';
});
"#;

/// Catalog listing with the search box
pub fn index_page(entries: &[CatalogEntry], query: &str, notice: Option<&Notice>) -> String {
    let mut body = String::new();

    let _ = write!(
        body,
        r#"<form class="search" method="get" action="/">
<input type="search" name="q" value="{}" placeholder="Search by Saree ID">
<button type="submit">Search</button>
</form>"#,
        escape_html(query)
    );

    if entries.is_empty() {
        if query.is_empty() {
            body.push_str(r#"<p class="muted">No sarees yet. <a href="/add">Add the first one</a>.</p>"#);
        } else {
            let _ = write!(
                body,
                r#"<p class="muted">No sarees match &ldquo;{}&rdquo;.</p>"#,
                escape_html(query)
            );
        }
    }

    for entry in entries {
        let _ = write!(
            body,
            r#"<section class="saree"><h2>{}</h2>"#,
            escape_html(&entry.identifier)
        );

        if entry.images.is_empty() {
            body.push_str(r#"<p class="muted">No images.</p>"#);
        } else {
            body.push_str(r#"<div class="images">"#);
            for image in &entry.images {
                let src = escape_html(&image_url(&entry.identifier, image));
                let _ = write!(
                    body,
                    r#"<a href="{src}"><img src="{src}" alt="{}" loading="lazy"></a>"#,
                    escape_html(image)
                );
            }
            body.push_str("</div>");
        }

        body.push_str("</section>");
    }

    layout("Sarees", notice, &body)
}

/// Form for registering a saree and uploading its images
pub fn add_page(notice: Option<&Notice>) -> String {
    let accept = ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(",");

    let mut body = String::new();
    let _ = write!(
        body,
        r#"<form class="add" method="post" action="/add" enctype="multipart/form-data">
<label for="saree_id">Saree ID</label>
<input type="text" id="saree_id" name="saree_id" autocomplete="off" autofocus>
<label for="qr-input">Scan a QR code instead</label>
<input type="file" id="qr-input" accept="image/*" capture="environment">
<p id="qr-status" class="muted"></p>
<label for="images">Images</label>
<input type="file" id="images" name="images" accept="{accept}" multiple>
<p><button type="submit">Save</button> <a href="/">Cancel</a></p>
</form>"#
    );
    body.push_str("<script>");
    body.push_str(SCAN_SCRIPT);
    body.push_str("</script>");

    layout("Add saree", notice, &body)
}

/// Generic page for unexpected failures
pub fn error_page(message: &str) -> String {
    let body = format!(
        r#"<p>{}</p><p><a href="/">Back to the catalog</a></p>"#,
        escape_html(message)
    );
    layout("Something went wrong", None, &body)
}

fn layout(title: &str, notice: Option<&Notice>, body: &str) -> String {
    let mut page = String::with_capacity(body.len() + STYLE.len() + 512);

    let _ = write!(
        page,
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
<header><h1><a href="/">Saree Catalog</a></h1><a href="/add">Add saree</a></header>
"#,
        title = escape_html(title),
    );

    if let Some(notice) = notice {
        let _ = write!(
            page,
            r#"<div class="notice notice-{}" role="status">{}</div>"#,
            notice.level.as_str(),
            escape_html(&notice.message)
        );
    }

    page.push_str("<main>");
    page.push_str(body);
    page.push_str("</main>\n</body>\n</html>\n");
    page
}

/// Download path for a stored image, percent-encoded per segment
pub fn image_url(identifier: &str, file_name: &str) -> String {
    let mut url = Url::parse("http://catalog.invalid/uploads/").expect("static base URL is valid");

    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(identifier).push(file_name);
    }

    url.path().to_string()
}

/// Escape text for use in HTML content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
